//! Manual replay trigger command.

use crate::cli::args::OutputFormat;
use crate::config::Paths;
use crate::error::RequeueError;
use crate::output::format_sync_result;
use crate::remote::RemoteProxy;

/// Trigger one replay cycle and report its final counters.
///
/// Fails loudly if the queue is not registered on the worker; that is an
/// error for this call only, the worker itself is unaffected.
///
/// # Errors
///
/// Returns an error if the worker is unreachable, the queue is unknown,
/// or the cycle aborts on a storage failure.
pub fn sync(queue: &str, format: OutputFormat) -> Result<String, RequeueError> {
    let proxy = RemoteProxy::for_paths(&Paths::new()?);
    let meta = proxy.trigger_sync(queue)?;
    format_sync_result(&meta, format)
}
