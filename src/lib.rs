//! # peer-request
//!
//! peer-request is a resilient HTTP client for calling peer services. One call
//! to [`send`] issues a GET or POST, retries transient failures with a linear
//! backoff, gives up at once when the peer answers with a 4xx, and always
//! hands back an [`Outcome`] instead of an error.
//!
//! ```no_run
//! use peer_request::{send, Method, Payload, RequestOptions};
//! use serde_json::json;
//!
//! let mut payload = Payload::new();
//! payload.insert(String::from("user_id"), json!(5));
//!
//! let options = RequestOptions {
//!     decode_json: true,
//!     ..RequestOptions::default()
//! };
//! let outcome = send("http://items.local/api/items", &payload, Method::Get, &options);
//!
//! // With `decode_json` set a failure is the JSON error object
//! // {"success": false, "error": ..., "url": ..., "method": ...}.
//! let value = outcome.into_value().unwrap_or_else(|failure| failure.to_json());
//! println!("{}", value);
//! ```
//!
//! ## Retries
//!
//! | attempt result              | what happens                          |
//! |-----------------------------|---------------------------------------|
//! | connection error or timeout | retried                               |
//! | empty body                  | retried                               |
//! | 5xx                         | retried                               |
//! | 4xx                         | returned at once, never retried       |
//! | anything else               | success                               |
//!
//! The wait after attempt `n` is `retry_delay_seconds * n`. Redirects are
//! followed up to five hops and the final response is the one classified.
//!
//! ## Command line
//!
//! ```text,no_run
//! $ peer-request -X POST -j -d item_id=12 -d note="left at desk" --decode-json http://items.local/api/claim
//! ```

#[macro_use]
extern crate anyhow;

use std::time::Duration;

use crate::http_client::reqwest::ReqwestHttpClient;
use crate::http_client::HttpClient;
use crate::sleeper::ThreadSleeper;

pub mod error;
pub mod fan_out;
pub mod http_client;
pub mod model;
pub mod options;
pub mod outcome;
pub mod request;
pub mod sender;
pub mod sleeper;

pub use crate::error::{FailureKind, InvalidInput, TransportError};
pub use crate::fan_out::{send_all, Target};
pub use crate::model::{Encoding, Method, Payload};
pub use crate::options::RequestOptions;
pub use crate::outcome::{Body, Failure, Outcome, Success};
pub use crate::sender::send_with;

pub type Result<T> = anyhow::Result<T>;

pub const MAX_REDIRECTS: usize = 5;

/// Settings for one HTTP client. `None` timeouts never expire.
pub struct ClientConfig {
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub verify_tls: bool,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::from(&RequestOptions::default())
    }
}

impl From<&RequestOptions> for ClientConfig {
    fn from(options: &RequestOptions) -> Self {
        ClientConfig {
            timeout: options.timeout(),
            connect_timeout: options.connect_timeout(),
            verify_tls: options.verify_tls,
            user_agent: options.user_agent.clone(),
            max_redirects: MAX_REDIRECTS,
        }
    }
}

/// Sends one request to a peer service, retrying per `options`.
///
/// Builds its own HTTP client, so concurrent calls share nothing.
pub fn send(url: &str, payload: &Payload, method: Method, options: &RequestOptions) -> Outcome {
    match ReqwestHttpClient::create(ClientConfig::from(options)) {
        Ok(client) => send_with(&client, &ThreadSleeper, url, payload, method, options),
        Err(err) => {
            tracing::error!(url, %method, error = %err, "could not build HTTP client");
            Outcome::Failure(Failure {
                kind: FailureKind::Transport,
                message: err.to_string(),
                status: None,
                url: String::from(url),
                method,
                attempts: 0,
                json_shaped: options.decode_json,
            })
        }
    }
}
