//! Replay transport for re-issuing queued requests.
//!
//! The HTTP API queued requests target is an external collaborator; the
//! queue core only sees the `ReplayTransport` trait.

mod transport;

pub use transport::{HttpTransport, ReplayResponse, ReplayTransport, TransportError, TransportErrorKind};
