//! Shell completions generation.

use clap::CommandFactory;
use clap_complete::Shell;

use crate::cli::args::Cli;
use crate::error::RequeueError;

/// Generate a completion script for the given shell.
///
/// # Errors
///
/// Returns an error if the generated script is not valid UTF-8.
pub fn completions(shell: Shell) -> Result<String, RequeueError> {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, "requeue", &mut buf);
    String::from_utf8(buf).map_err(|e| RequeueError::Config(format!("UTF-8 error: {e}")))
}
