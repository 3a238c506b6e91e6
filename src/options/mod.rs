use crate::model::Encoding;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;


pub const DEFAULT_USER_AGENT: &str = concat!("peer-request/", env!("CARGO_PKG_VERSION"));

/// Per-call settings for `send`.
///
/// Field names follow the camelCase keys accepted in an options file, and any
/// key left out of the file keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestOptions {
    pub retry_count: u32,
    /// Linear backoff multiplier: the wait after attempt `n` is `n` times this.
    pub retry_delay_seconds: u64,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub decode_json: bool,
    /// Decode the body as JSON even when the content type says otherwise.
    pub force_json_decode: bool,
    #[serde(rename = "verifyTLS")]
    pub verify_tls: bool,
    pub encoding: Encoding,
    pub user_agent: String,
}

impl Default for RequestOptions {
    fn default() -> Self {
        RequestOptions {
            retry_count: 3,
            retry_delay_seconds: 1,
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            decode_json: false,
            force_json_decode: false,
            verify_tls: false,
            encoding: Encoding::Form,
            user_agent: String::from(DEFAULT_USER_AGENT),
        }
    }
}

impl RequestOptions {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = read_to_string(path)
            .with_context(|| format!("Failed reading options file: {:?}", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed parsing options file: {:?}", path))
    }

    /// How long to wait after `attempt` (1-based) failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.retry_delay_seconds.saturating_mul(u64::from(attempt)))
    }

    /// The per-attempt timeout. Zero seconds means no timeout.
    pub fn timeout(&self) -> Option<Duration> {
        non_zero_seconds(self.timeout_seconds)
    }

    /// The connect timeout. Zero seconds means no timeout.
    pub fn connect_timeout(&self) -> Option<Duration> {
        non_zero_seconds(self.connect_timeout_seconds)
    }
}

fn non_zero_seconds(seconds: u64) -> Option<Duration> {
    match seconds {
        0 => None,
        seconds => Some(Duration::from_secs(seconds)),
    }
}
