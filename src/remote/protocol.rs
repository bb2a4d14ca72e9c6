//! IPC protocol for worker-observer communication.
//!
//! Messages are serialized as JSON with length-prefixed framing. Every
//! payload is plain data; nothing runtime-specific crosses the boundary.

use serde::{Deserialize, Serialize};

use crate::api::ReplayResponse;
use crate::sync::{QueueEntry, QueueEvent, ReplayRequest, SyncMeta};

/// Request sent from an observer process to the worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum WorkerRequest {
    /// Check whether the worker is alive.
    Ping,
    /// Graceful shutdown.
    Shutdown,
    /// Fetch the live entries of a queue.
    GetSyncSet { queue_name: String },
    /// Run one replay cycle for a queue.
    DoSyncSet { queue_name: String },
    /// Queue a request without attempting it.
    AddRequest {
        queue_name: String,
        request: ReplayRequest,
    },
    /// Attempt a request now, queueing it on a retryable failure.
    ExecuteOrQueue {
        queue_name: String,
        request: ReplayRequest,
    },
    /// Upgrade this connection to an event stream for a queue.
    Subscribe { queue_name: String },
    /// Store externally provided data in a queue's response cache.
    PutCache {
        queue_name: String,
        target: String,
        data: serde_json::Value,
    },
}

/// Response sent from the worker to an observer process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum WorkerResponse {
    /// The worker is alive.
    Pong,
    /// Shutdown acknowledged.
    ShuttingDown,
    /// Live entries of a queue, in enqueue order.
    Entries { entries: Vec<QueueEntry> },
    /// A replay cycle completed with these counters.
    SyncDone { meta: SyncMeta },
    /// A request was queued under this id.
    Added { request_id: String },
    /// The request completed without queueing.
    Executed { response: ReplayResponse },
    /// The request failed retryably and was queued under this id.
    Queued { request_id: String },
    /// The connection is now an event stream.
    Subscribed,
    /// One broadcast event on a subscribed connection.
    Event { event: QueueEvent },
    /// Cache write acknowledged.
    CachePut,
    /// The named queue is not registered. Distinct from an empty queue.
    UnknownQueue { queue_name: String },
    /// Generic failure, fatal to this call only.
    Error { message: String },
}

/// IPC message framing.
///
/// Messages are framed as:
/// - 4 bytes: message length (big-endian u32)
/// - N bytes: JSON-encoded message
pub mod framing {
    use std::io::{Read, Write};

    use serde::de::DeserializeOwned;
    use serde::Serialize;

    /// Maximum message size (1MB) to prevent malformed frames from
    /// causing unbounded allocations.
    const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

    /// Read one framed message from the given reader.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, an oversized frame, or a payload
    /// that does not deserialize.
    pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> std::io::Result<T> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_MESSAGE_SIZE {
            return Err(std::io::Error::other(format!(
                "message too large: {} bytes (max {})",
                len, MAX_MESSAGE_SIZE
            )));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;

        serde_json::from_slice(&buf)
            .map_err(|e| std::io::Error::other(format!("deserialize error: {}", e)))
    }

    /// Write one framed message to the given writer.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or a message that does not fit the
    /// frame.
    pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> std::io::Result<()> {
        let json = serde_json::to_vec(message)
            .map_err(|e| std::io::Error::other(format!("serialize error: {}", e)))?;
        let len =
            u32::try_from(json.len()).map_err(|_| std::io::Error::other("message too large"))?;
        writer.write_all(&len.to_be_bytes())?;
        writer.write_all(&json)?;
        writer.flush()?;
        Ok(())
    }
}
