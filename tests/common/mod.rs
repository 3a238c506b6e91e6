#![allow(dead_code)]

use peer_request::{Payload, RequestOptions};
use serde_json::Value;
use std::net::TcpListener;

/// Options with no real backoff so retry tests stay fast.
pub fn fast_options(retry_count: u32) -> RequestOptions {
    RequestOptions {
        retry_count,
        retry_delay_seconds: 0,
        timeout_seconds: 5,
        connect_timeout_seconds: 2,
        ..RequestOptions::default()
    }
}

/// A URL on a local port nothing listens on.
pub fn closed_port_url(path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}{path}", port = port, path = path)
}

pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => panic!("payload must be an object"),
    }
}
