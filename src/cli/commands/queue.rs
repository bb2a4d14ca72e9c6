//! Queue inspection and request submission commands.

use colored::Colorize;
use serde_json::json;

use crate::cli::args::{OutputFormat, RequestArgs};
use crate::config::Paths;
use crate::error::RequeueError;
use crate::output::{format_entries, format_status, to_json};
use crate::remote::RemoteProxy;
use crate::sync::{ExecuteOutcome, Method, ReplayRequest};

/// Attempt a request now; the worker queues it on a retryable failure.
///
/// # Errors
///
/// Returns an error if the worker is unreachable, the queue is unknown,
/// or the request fails in a non-retryable way.
pub fn send(args: RequestArgs, format: OutputFormat) -> Result<String, RequeueError> {
    let request = parse_request(&args)?;
    let proxy = RemoteProxy::for_paths(&Paths::new()?);

    match proxy.execute_or_queue(&args.queue, request)? {
        ExecuteOutcome::Completed(response) => match format {
            OutputFormat::Json => to_json(&json!({
                "queued": false,
                "status": response.status,
                "data": response.body,
            })),
            OutputFormat::Pretty => Ok(format!(
                "{} {} {}",
                "✓".green(),
                response.status,
                serde_json::to_string(&response.body)?
            )),
        },
        ExecuteOutcome::Queued { request_id } => match format {
            OutputFormat::Json => to_json(&json!({
                "queued": true,
                "request_id": request_id,
            })),
            OutputFormat::Pretty => Ok(format!(
                "{} Network unavailable; request queued as {}",
                "○".yellow(),
                &request_id[..12.min(request_id.len())]
            )),
        },
    }
}

/// Queue a request without attempting it.
///
/// # Errors
///
/// Returns an error if the worker is unreachable or the queue is unknown.
pub fn add(args: RequestArgs, format: OutputFormat) -> Result<String, RequeueError> {
    let request = parse_request(&args)?;
    let proxy = RemoteProxy::for_paths(&Paths::new()?);

    let request_id = proxy.add_request(&args.queue, request)?;

    match format {
        OutputFormat::Json => to_json(&json!({"request_id": request_id})),
        OutputFormat::Pretty => Ok(format!(
            "Queued request {} on \"{}\"",
            &request_id[..12.min(request_id.len())],
            args.queue
        )),
    }
}

/// List a queue's live entries.
///
/// # Errors
///
/// Returns an error if the worker is unreachable or the queue is unknown.
pub fn list(queue: &str, format: OutputFormat) -> Result<String, RequeueError> {
    let proxy = RemoteProxy::for_paths(&Paths::new()?);
    let entries = proxy.get_entries(queue)?;
    format_entries(&entries, queue, format)
}

/// Show a queue's backlog summary.
///
/// # Errors
///
/// Returns an error if the worker is unreachable or the queue is unknown.
pub fn status(queue: &str, format: OutputFormat) -> Result<String, RequeueError> {
    let proxy = RemoteProxy::for_paths(&Paths::new()?);
    let entries = proxy.get_entries(queue)?;
    format_status(&entries, queue, format)
}

/// Build a request from CLI arguments.
fn parse_request(args: &RequestArgs) -> Result<ReplayRequest, RequeueError> {
    let method = parse_method(&args.method)?;

    let body = args
        .body
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| RequeueError::Config(format!("Invalid JSON body: {e}")))?;

    Ok(ReplayRequest::new(method, args.target.clone(), body))
}

fn parse_method(s: &str) -> Result<Method, RequeueError> {
    match s.to_lowercase().as_str() {
        "get" => Ok(Method::Get),
        "post" => Ok(Method::Post),
        "put" => Ok(Method::Put),
        "patch" => Ok(Method::Patch),
        "delete" => Ok(Method::Delete),
        other => Err(RequeueError::Config(format!("Unknown HTTP method: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_args(method: &str, body: Option<&str>) -> RequestArgs {
        RequestArgs {
            method: method.to_string(),
            target: "/api/todos".to_string(),
            body: body.map(ToString::to_string),
            queue: "default".to_string(),
        }
    }

    #[test]
    fn test_parse_request_with_body() {
        let request = parse_request(&request_args("post", Some("{\"text\":\"buy milk\"}"))).unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body, Some(serde_json::json!({"text": "buy milk"})));
    }

    #[test]
    fn test_parse_request_rejects_bad_json() {
        let err = parse_request(&request_args("post", Some("not json"))).unwrap_err();
        assert!(matches!(err, RequeueError::Config(_)));
    }

    #[test]
    fn test_parse_request_rejects_unknown_method() {
        let err = parse_request(&request_args("teleport", None)).unwrap_err();
        assert!(matches!(err, RequeueError::Config(_)));
    }
}
