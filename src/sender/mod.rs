//! The retry loop behind [`send`](crate::send).
//!
//! Each attempt is classified as a success, a retryable failure (transport
//! error, empty body, 5xx, no status) or a terminal failure (4xx). Retryable
//! failures wait `retry_delay_seconds * attempt` before the next attempt;
//! terminal ones end the loop at once.

use crate::error::{FailureKind, TransportError};
use crate::http_client::HttpClient;
use crate::model::{Method, Payload, PreparedRequest, RawResponse};
use crate::options::RequestOptions;
use crate::outcome::{Body, Failure, Outcome, Success};
use crate::request::prepare;
use crate::sleeper::Sleeper;
use reqwest::StatusCode;
use tracing::{debug, error, warn};

#[cfg(test)]
mod tests;

#[derive(Debug, PartialEq)]
enum Verdict {
    Success(RawResponse),
    Retryable(AttemptError),
    Terminal(AttemptError),
}

#[derive(Debug, PartialEq)]
struct AttemptError {
    kind: FailureKind,
    message: String,
    status: Option<u16>,
}

fn classify(result: Result<RawResponse, TransportError>) -> Verdict {
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            return Verdict::Retryable(AttemptError {
                kind: FailureKind::Transport,
                message: err.to_string(),
                status: None,
            })
        }
    };
    let status = response.status;

    if (400..500).contains(&status) {
        return Verdict::Terminal(AttemptError {
            kind: FailureKind::ClientError,
            message: describe_status(status),
            status: Some(status),
        });
    }
    if status >= 500 {
        return Verdict::Retryable(AttemptError {
            kind: FailureKind::ServerError,
            message: describe_status(status),
            status: Some(status),
        });
    }
    if status < 200 {
        return Verdict::Retryable(AttemptError {
            kind: FailureKind::Transport,
            message: String::from("No response received"),
            status: if status == 0 { None } else { Some(status) },
        });
    }
    if response.body.is_empty() {
        return Verdict::Retryable(AttemptError {
            kind: FailureKind::Transport,
            message: String::from("Empty response body"),
            status: Some(status),
        });
    }
    Verdict::Success(response)
}

fn describe_status(status: u16) -> String {
    match StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
    {
        Some(reason) => format!("HTTP {} {}", status, reason),
        None => format!("HTTP {}", status),
    }
}

fn decode(response: RawResponse, options: &RequestOptions, attempts: u32) -> Success {
    let RawResponse {
        status,
        body: raw,
        ..
    } = &response;
    let wants_json = options.decode_json && (response.is_json() || options.force_json_decode);
    let body = if wants_json {
        match serde_json::from_str(raw) {
            Ok(value) => Body::Json(value),
            Err(err) => {
                debug!(error = %err, "response body is not valid JSON, returning raw body");
                Body::Text(raw.clone())
            }
        }
    } else {
        Body::Text(raw.clone())
    };
    Success {
        body,
        raw: raw.clone(),
        status: *status,
        attempts,
    }
}

/// Runs the retry loop for one call with an explicit client and sleeper.
///
/// [`send`](crate::send) is this with a fresh `ReqwestHttpClient` and a
/// `ThreadSleeper`.
pub fn send_with<C, S>(
    client: &C,
    sleeper: &S,
    url: &str,
    payload: &Payload,
    method: Method,
    options: &RequestOptions,
) -> Outcome
where
    C: HttpClient + ?Sized,
    S: Sleeper + ?Sized,
{
    let failure = |kind: FailureKind, message: String, status: Option<u16>, attempts: u32| {
        Outcome::Failure(Failure {
            kind,
            message,
            status,
            url: String::from(url),
            method,
            attempts,
            json_shaped: options.decode_json,
        })
    };

    let request = match prepare(url, payload, method, options) {
        Ok(request) => request,
        Err(err) => {
            error!(url, %method, error = %err, "rejected request before sending");
            return failure(FailureKind::InvalidInput, err.to_string(), None, 0);
        }
    };

    let mut attempt = 0;
    let mut last_error: Option<AttemptError> = None;
    while attempt < options.retry_count {
        attempt += 1;
        match classify(execute(client, &request, attempt)) {
            Verdict::Success(response) => {
                debug!(attempt, url, %method, status = response.status, "attempt succeeded");
                return Outcome::Success(decode(response, options, attempt));
            }
            Verdict::Terminal(err) => {
                error!(
                    attempt,
                    url,
                    %method,
                    status = ?err.status,
                    error = %err.message,
                    "peer rejected the request, not retrying"
                );
                return failure(err.kind, err.message, err.status, attempt);
            }
            Verdict::Retryable(err) => {
                warn!(
                    attempt,
                    retry_count = options.retry_count,
                    url,
                    %method,
                    status = ?err.status,
                    error = %err.message,
                    "attempt failed"
                );
                last_error = Some(err);
                if attempt < options.retry_count {
                    let wait = options.backoff(attempt);
                    debug!(attempt, wait_ms = wait.as_millis() as u64, "backing off");
                    sleeper.sleep(wait);
                }
            }
        }
    }

    let (message, status) = match last_error {
        Some(err) => (err.message, err.status),
        None => (String::from("No attempts made"), None),
    };
    error!(attempts = attempt, url, %method, error = %message, "giving up on request");
    failure(FailureKind::ExhaustedRetries, message, status, attempt)
}

fn execute<C>(
    client: &C,
    request: &PreparedRequest,
    attempt: u32,
) -> Result<RawResponse, TransportError>
where
    C: HttpClient + ?Sized,
{
    debug!(attempt, url = %request.url, method = %request.method, "sending attempt");
    client.execute(request)
}
