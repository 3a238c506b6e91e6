use crate::error::FailureKind;
use crate::model::Method;
use serde_json::{json, Value};


/// The result of one `send` call. Every path through the client ends here;
/// nothing is raised past it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Success),
    Failure(Failure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Success {
    pub body: Body,
    pub raw: String,
    pub status: u16,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    /// Status of the last response received, if any attempt got that far.
    pub status: Option<u16>,
    pub url: String,
    pub method: Method,
    pub attempts: u32,
    /// Set when the caller asked for JSON decoding; such callers get the
    /// failure as a JSON error object rather than as an error.
    pub json_shaped: bool,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Success(success) => success.attempts,
            Outcome::Failure(failure) => failure.attempts,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Success(success) => Some(success.status),
            Outcome::Failure(failure) => failure.status,
        }
    }

    pub fn success(&self) -> Option<&Success> {
        match self {
            Outcome::Success(success) => Some(success),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }

    /// Converts the outcome into the value a downstream consumer sees.
    ///
    /// A success yields its decoded JSON, or the raw body as a JSON string. A
    /// failure yields the `{success, error, url, method}` object when JSON
    /// decoding was requested and stays an error otherwise.
    pub fn into_value(self) -> Result<Value, Failure> {
        match self {
            Outcome::Success(Success {
                body: Body::Json(value),
                ..
            }) => Ok(value),
            Outcome::Success(Success {
                body: Body::Text(text),
                ..
            }) => Ok(Value::String(text)),
            Outcome::Failure(failure) if failure.json_shaped => Ok(failure.to_json()),
            Outcome::Failure(failure) => Err(failure),
        }
    }

    /// Same as `into_value`, but a failure always becomes the JSON error
    /// object.
    pub fn to_json(&self) -> Value {
        match self {
            Outcome::Success(success) => match &success.body {
                Body::Json(value) => value.clone(),
                Body::Text(text) => Value::String(text.clone()),
            },
            Outcome::Failure(failure) => failure.to_json(),
        }
    }
}

impl Failure {
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "error": self.message,
            "url": self.url,
            "method": self.method.to_string(),
        })
    }
}

impl std::error::Error for Failure {}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} failed after {} attempt(s) ({}): {}",
            self.method, self.url, self.attempts, self.kind, self.message
        )
    }
}
