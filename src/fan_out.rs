use crate::error::FailureKind;
use crate::model::{Method, Payload};
use crate::options::RequestOptions;
use crate::outcome::{Failure, Outcome};
use crate::send;
use std::thread;
use tracing::error;

/// One call in a fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub url: String,
    pub payload: Payload,
    pub method: Method,
}

impl Target {
    pub fn get(url: &str) -> Self {
        Target {
            url: String::from(url),
            payload: Payload::new(),
            method: Method::Get,
        }
    }
}

/// Sends every target on its own thread and returns the outcomes in input
/// order. The calls share nothing but `options`.
pub fn send_all(targets: &[Target], options: &RequestOptions) -> Vec<(String, Outcome)> {
    thread::scope(|scope| {
        let handles: Vec<_> = targets
            .iter()
            .map(|target| {
                scope.spawn(move || send(&target.url, &target.payload, target.method, options))
            })
            .collect();

        targets
            .iter()
            .zip(handles)
            .map(|(target, handle)| {
                let outcome = handle.join().unwrap_or_else(|_| {
                    error!(url = %target.url, "request thread panicked");
                    Outcome::Failure(Failure {
                        kind: FailureKind::Transport,
                        message: String::from("Request thread panicked"),
                        status: None,
                        url: target.url.clone(),
                        method: target.method,
                        attempts: 0,
                        json_shaped: options.decode_json,
                    })
                });
                (target.url.clone(), outcome)
            })
            .collect()
    })
}
