//! # peer-request
//!
//! Sends one request to a peer service through the resilient client and
//! prints the outcome as JSON.
//!
//! ```text,no_run
//! $ peer-request -d user_id=5 --decode-json http://items.local/api/items
//! {
//!   "success": true,
//!   "items": []
//! }
//! ```
//!
//! On failure the JSON error object is printed and the exit status is 1:
//!
//! ```text,no_run
//! $ peer-request -r 2 --retry-delay 0 http://127.0.0.1:9/down
//! {
//!   "success": false,
//!   "error": "Connection failed: ...",
//!   "url": "http://127.0.0.1:9/down",
//!   "method": "GET"
//! }
//! ```
//!
//! Options can also come from a JSON file; flags given on the command line win.
//!
//! **peer.json**
//! ```text,no_run
//! {
//!     "retryCount": 5,
//!     "retryDelaySeconds": 2,
//!     "decodeJson": true
//! }
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG`.

use anyhow::{Context, Result};
use clap::{App, Arg, ArgMatches};
use peer_request::request::parse_payload;
use peer_request::{send, Encoding, Method, RequestOptions};
use std::io::{stdout, Write};
use std::path::Path;
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peer_request=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let matches = App::new("peer-request")
        .version(VERSION)
        .about("Sends a request to a peer service, retrying transient failures")
        .arg(Arg::with_name("URL").required(true).index(1))
        .arg(
            Arg::with_name("METHOD")
                .short("X")
                .long("method")
                .takes_value(true)
                .possible_values(&["GET", "POST", "get", "post"])
                .default_value("GET")
                .help("The HTTP method"),
        )
        .arg(
            Arg::with_name("DATA")
                .short("d")
                .long("data")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("A payload field as key=value; the value is read as JSON when it parses"),
        )
        .arg(
            Arg::with_name("JSON")
                .short("j")
                .long("json")
                .help("Send the POST body as JSON instead of form-encoded"),
        )
        .arg(
            Arg::with_name("RETRIES")
                .short("r")
                .long("retries")
                .takes_value(true)
                .validator(is_valid_number)
                .help("How many attempts to make in total"),
        )
        .arg(
            Arg::with_name("RETRY_DELAY")
                .long("retry-delay")
                .takes_value(true)
                .validator(is_valid_number)
                .help("Seconds of backoff, multiplied by the attempt number"),
        )
        .arg(
            Arg::with_name("TIMEOUT")
                .short("t")
                .long("timeout")
                .takes_value(true)
                .validator(is_valid_number)
                .help("Seconds allowed for each attempt"),
        )
        .arg(
            Arg::with_name("CONNECT_TIMEOUT")
                .long("connect-timeout")
                .takes_value(true)
                .validator(is_valid_number)
                .help("Seconds allowed for connecting"),
        )
        .arg(
            Arg::with_name("DECODE_JSON")
                .long("decode-json")
                .help("Decode JSON responses"),
        )
        .arg(
            Arg::with_name("FORCE_JSON")
                .long("force-json")
                .help("Decode the response as JSON whatever its content type"),
        )
        .arg(
            Arg::with_name("VERIFY_TLS")
                .long("verify-tls")
                .help("Verify the peer's TLS certificate"),
        )
        .arg(
            Arg::with_name("OPTIONS_FILE")
                .short("c")
                .long("options-file")
                .takes_value(true)
                .help("A file containing a JSON object with request options"),
        )
        .usage("peer-request [OPTIONS] <URL>")
        .get_matches();

    let url = matches.value_of("URL").unwrap_or_default();
    let method = Method::from_str(matches.value_of("METHOD").unwrap_or("GET"))?;
    let options = options(&matches)?;
    let payload = parse_payload(matches.values_of("DATA").into_iter().flatten())?;

    let outcome = send(url, &payload, method, &options);
    let failed = outcome.is_failure();

    let mut stdout = stdout();
    let rendered = serde_json::to_string_pretty(&outcome.to_json())?;
    writeln!(stdout, "{}", rendered).with_context(|| "Failed writing outcome")?;
    stdout.flush()?;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn options(matches: &ArgMatches) -> Result<RequestOptions> {
    let mut options = match matches.value_of("OPTIONS_FILE") {
        Some(path) => RequestOptions::from_file(Path::new(path))?,
        None => RequestOptions::default(),
    };

    if let Some(retries) = number(matches, "RETRIES")? {
        options.retry_count = retries as u32;
    }
    if let Some(delay) = number(matches, "RETRY_DELAY")? {
        options.retry_delay_seconds = delay;
    }
    if let Some(timeout) = number(matches, "TIMEOUT")? {
        options.timeout_seconds = timeout;
    }
    if let Some(timeout) = number(matches, "CONNECT_TIMEOUT")? {
        options.connect_timeout_seconds = timeout;
    }
    if matches.is_present("JSON") {
        options.encoding = Encoding::Json;
    }
    if matches.is_present("DECODE_JSON") {
        options.decode_json = true;
    }
    if matches.is_present("FORCE_JSON") {
        options.decode_json = true;
        options.force_json_decode = true;
    }
    if matches.is_present("VERIFY_TLS") {
        options.verify_tls = true;
    }
    Ok(options)
}

fn number(matches: &ArgMatches, name: &str) -> Result<Option<u64>> {
    matches
        .value_of(name)
        .map(|value| {
            value
                .parse::<u64>()
                .with_context(|| format!("{} is not a valid number: {}", name, value))
        })
        .transpose()
}

fn is_valid_number(val: String) -> Result<(), String> {
    match val.parse::<u32>() {
        Ok(_) => Ok(()),
        Err(_) => Err(String::from("Value is not a valid non-negative integer")),
    }
}
