use crate::error::{FailureKind, TransportError};
use crate::http_client::HttpClient;
use crate::model::{Encoding, Method, Payload, PreparedRequest, RawResponse};
use crate::options::RequestOptions;
use crate::outcome::{Body, Outcome};
use crate::sender::{classify, send_with, AttemptError, Verdict};
use crate::sleeper::RecordingSleeper;
use crate::ClientConfig;
use serde_json::json;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replies with a fixed script of results, one per attempt.
struct ScriptedClient {
    replies: RefCell<VecDeque<Result<RawResponse, TransportError>>>,
    seen: RefCell<Vec<PreparedRequest>>,
}

impl ScriptedClient {
    fn new(replies: Vec<Result<RawResponse, TransportError>>) -> Self {
        ScriptedClient {
            replies: RefCell::new(replies.into()),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self::new(vec![])
    }

    fn calls(&self) -> usize {
        self.seen.borrow().len()
    }
}

impl HttpClient for ScriptedClient {
    fn create(_config: ClientConfig) -> Result<Self, TransportError> {
        Ok(Self::failing())
    }

    fn execute(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        self.seen.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect(String::from("connection refused"))))
    }
}

fn reply(status: u16, content_type: Option<&str>, body: &str) -> Result<RawResponse, TransportError> {
    Ok(RawResponse {
        status,
        content_type: content_type.map(String::from),
        body: String::from(body),
    })
}

fn options(retry_count: u32) -> RequestOptions {
    RequestOptions {
        retry_count,
        ..RequestOptions::default()
    }
}

fn run(client: &ScriptedClient, sleeper: &RecordingSleeper, options: &RequestOptions) -> Outcome {
    send_with(
        client,
        sleeper,
        "http://items.local/api/items",
        &Payload::new(),
        Method::Get,
        options,
    )
}

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.contents())
}

#[test]
fn permanent_transport_failure_uses_every_attempt() {
    for n in 1..=5 {
        let client = ScriptedClient::failing();
        let sleeper = RecordingSleeper::default();

        let outcome = run(&client, &sleeper, &options(n));

        assert_eq!(client.calls(), n as usize);
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::ExhaustedRetries);
        assert_eq!(failure.attempts, n);
        assert_eq!(failure.status, None);
        assert!(failure.message.contains("connection refused"));
    }
}

#[test]
fn client_error_is_never_retried() {
    let client = ScriptedClient::new(vec![
        reply(404, Some("application/json"), r#"{"error":"missing"}"#),
        reply(200, None, "unreachable"),
    ]);
    let sleeper = RecordingSleeper::default();

    let outcome = run(&client, &sleeper, &options(5));

    assert_eq!(client.calls(), 1);
    assert!(sleeper.waits().is_empty());
    let failure = outcome.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::ClientError);
    assert_eq!(failure.status, Some(404));
    assert_eq!(failure.message, "HTTP 404 Not Found");
    assert_eq!(failure.attempts, 1);
}

#[test]
fn server_errors_then_success() {
    let client = ScriptedClient::new(vec![
        reply(500, None, "boom"),
        reply(503, None, ""),
        reply(200, Some("text/plain"), "ok"),
    ]);
    let sleeper = RecordingSleeper::default();

    let outcome = run(&client, &sleeper, &options(3));

    assert_eq!(client.calls(), 3);
    let success = outcome.success().unwrap();
    assert_eq!(success.attempts, 3);
    assert_eq!(success.status, 200);
    assert_eq!(success.body, Body::Text(String::from("ok")));
}

#[test]
fn backoff_is_linear_in_the_attempt_number() {
    let client = ScriptedClient::failing();
    let sleeper = RecordingSleeper::default();
    let options = RequestOptions {
        retry_count: 4,
        retry_delay_seconds: 2,
        ..RequestOptions::default()
    };

    run(&client, &sleeper, &options);

    assert_eq!(
        sleeper.waits(),
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(6),
        ]
    );
}

#[test]
fn no_wait_after_success() {
    let client = ScriptedClient::new(vec![reply(200, None, "ok")]);
    let sleeper = RecordingSleeper::default();

    run(&client, &sleeper, &options(3));

    assert!(sleeper.waits().is_empty());
}

#[test]
fn empty_body_is_retried() {
    let client = ScriptedClient::new(vec![reply(200, None, ""), reply(200, None, "filled")]);
    let sleeper = RecordingSleeper::default();

    let outcome = run(&client, &sleeper, &options(3));

    assert_eq!(client.calls(), 2);
    assert_eq!(outcome.attempts(), 2);
    assert_eq!(outcome.success().unwrap().raw, "filled");
}

#[test]
fn exhausted_retries_keep_last_status() {
    let client = ScriptedClient::new(vec![
        reply(502, None, "bad gateway"),
        reply(503, None, "unavailable"),
    ]);
    let sleeper = RecordingSleeper::default();

    let outcome = run(&client, &sleeper, &options(2));

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::ExhaustedRetries);
    assert_eq!(failure.status, Some(503));
    assert_eq!(failure.message, "HTTP 503 Service Unavailable");
    assert_eq!(sleeper.waits(), vec![Duration::from_secs(1)]);
}

#[test]
fn zero_retry_count_makes_no_attempt() {
    let client = ScriptedClient::new(vec![reply(200, None, "ok")]);
    let sleeper = RecordingSleeper::default();

    let outcome = run(&client, &sleeper, &options(0));

    assert_eq!(client.calls(), 0);
    let failure = outcome.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::ExhaustedRetries);
    assert_eq!(failure.attempts, 0);
}

#[test]
fn json_body_is_decoded() {
    let client = ScriptedClient::new(vec![reply(
        200,
        Some("application/json; charset=utf-8"),
        r#"{"success":true,"items":[]}"#,
    )]);
    let options = RequestOptions {
        decode_json: true,
        ..RequestOptions::default()
    };

    let outcome = run(&client, &RecordingSleeper::default(), &options);

    assert_eq!(
        outcome.success().unwrap().body,
        Body::Json(json!({"success": true, "items": []}))
    );
}

#[test]
fn json_is_left_alone_without_decode_flag() {
    let client = ScriptedClient::new(vec![reply(
        200,
        Some("application/json"),
        r#"{"success":true}"#,
    )]);

    let outcome = run(&client, &RecordingSleeper::default(), &options(3));

    assert_eq!(
        outcome.success().unwrap().body,
        Body::Text(String::from(r#"{"success":true}"#))
    );
}

#[test]
fn forced_decode_ignores_content_type() {
    let client = ScriptedClient::new(vec![reply(200, Some("text/html"), r#"{"id": 3}"#)]);
    let options = RequestOptions {
        decode_json: true,
        force_json_decode: true,
        ..RequestOptions::default()
    };

    let outcome = run(&client, &RecordingSleeper::default(), &options);

    assert_eq!(outcome.success().unwrap().body, Body::Json(json!({"id": 3})));
}

#[test]
fn non_json_content_type_is_not_decoded_without_force() {
    let client = ScriptedClient::new(vec![reply(200, Some("text/html"), r#"{"id": 3}"#)]);
    let options = RequestOptions {
        decode_json: true,
        ..RequestOptions::default()
    };

    let outcome = run(&client, &RecordingSleeper::default(), &options);

    assert_eq!(
        outcome.success().unwrap().body,
        Body::Text(String::from(r#"{"id": 3}"#))
    );
}

#[test]
fn unparsable_json_falls_back_to_raw_body() {
    let client = ScriptedClient::new(vec![reply(
        200,
        Some("application/json"),
        "Fatal error: Uncaught PDOException",
    )]);
    let options = RequestOptions {
        decode_json: true,
        ..RequestOptions::default()
    };

    let outcome = run(&client, &RecordingSleeper::default(), &options);

    let success = outcome.success().unwrap();
    assert_eq!(
        success.body,
        Body::Text(String::from("Fatal error: Uncaught PDOException"))
    );
    assert_eq!(success.attempts, 1);
}

#[test]
fn malformed_url_fails_without_attempts() {
    let client = ScriptedClient::new(vec![reply(200, None, "ok")]);
    let sleeper = RecordingSleeper::default();

    let outcome = send_with(
        &client,
        &sleeper,
        "not a url",
        &Payload::new(),
        Method::Get,
        &options(3),
    );

    assert_eq!(client.calls(), 0);
    let failure = outcome.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::InvalidInput);
    assert_eq!(failure.attempts, 0);
    assert_eq!(failure.url, "not a url");
}

#[test]
fn failure_is_json_shaped_when_decoding_was_requested() {
    let client = ScriptedClient::failing();
    let options = RequestOptions {
        retry_count: 1,
        decode_json: true,
        ..RequestOptions::default()
    };

    let outcome = send_with(
        &client,
        &RecordingSleeper::default(),
        "http://items.local/api/items",
        &Payload::new(),
        Method::Post,
        &options,
    );

    let value = outcome.into_value().unwrap();
    assert_eq!(value["success"], json!(false));
    assert_eq!(value["url"], json!("http://items.local/api/items"));
    assert_eq!(value["method"], json!("POST"));
    assert!(value["error"].as_str().unwrap().contains("connection refused"));
}

#[test]
fn same_request_is_replayed_on_every_attempt() {
    let client = ScriptedClient::new(vec![reply(500, None, "boom"), reply(200, None, "ok")]);
    let mut payload = Payload::new();
    payload.insert(String::from("item_id"), json!(12));
    let options = RequestOptions {
        encoding: Encoding::Json,
        ..RequestOptions::default()
    };

    send_with(
        &client,
        &RecordingSleeper::default(),
        "http://items.local/api/claim",
        &payload,
        Method::Post,
        &options,
    );

    let seen = client.seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
    assert_eq!(seen[0].body.as_deref(), Some(r#"{"item_id":12}"#));
}

#[test]
fn classification() {
    let retryable = |status| matches!(classify(reply(status, None, "x")), Verdict::Retryable(_));
    assert!(retryable(500));
    assert!(retryable(599));
    assert!(retryable(0));
    assert!(matches!(
        classify(reply(0, None, "x")),
        Verdict::Retryable(AttemptError { status: None, .. })
    ));
    assert!(matches!(
        classify(reply(400, None, "")),
        Verdict::Terminal(AttemptError {
            kind: FailureKind::ClientError,
            ..
        })
    ));
    assert!(matches!(
        classify(reply(499, None, "x")),
        Verdict::Terminal(_)
    ));
    assert!(matches!(classify(reply(204, None, "")), Verdict::Retryable(_)));
    assert!(matches!(classify(reply(302, None, "moved")), Verdict::Success(_)));
    assert!(matches!(
        classify(Err(TransportError::Timeout(String::from("slow")))),
        Verdict::Retryable(AttemptError {
            kind: FailureKind::Transport,
            ..
        })
    ));
}

#[test]
fn every_failed_attempt_and_the_final_failure_are_logged() {
    let client = ScriptedClient::failing();
    let sleeper = RecordingSleeper::default();

    let (outcome, logs) = with_captured_logs(|| run(&client, &sleeper, &options(3)));

    assert!(outcome.is_failure());
    let failed: Vec<&str> = logs.lines().filter(|l| l.contains("attempt failed")).collect();
    assert_eq!(failed.len(), 3);
    assert!(failed.iter().all(|l| l.contains("WARN")));
    assert!(failed[0].contains("attempt=1"));
    assert!(failed[2].contains("attempt=3"));
    assert!(failed[0].contains("http://items.local/api/items"));
    let summary: Vec<&str> = logs.lines().filter(|l| l.contains("giving up on request")).collect();
    assert_eq!(summary.len(), 1);
    assert!(summary[0].contains("ERROR"));
    assert!(summary[0].contains("attempts=3"));
}

#[test]
fn rejected_request_logs_once_without_a_summary() {
    let client = ScriptedClient::new(vec![reply(403, None, "forbidden")]);
    let sleeper = RecordingSleeper::default();

    let (_, logs) = with_captured_logs(|| run(&client, &sleeper, &options(3)));

    assert_eq!(logs.matches("peer rejected the request").count(), 1);
    assert!(!logs.contains("attempt failed"));
    assert!(!logs.contains("giving up on request"));
}
