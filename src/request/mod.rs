use crate::error::InvalidInput;
use crate::model::{Encoding, Method, Payload, PreparedRequest};
use crate::options::RequestOptions;
use crate::Result;
use serde_json::Value;
use url::form_urlencoded::Serializer;
use url::Url;


const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

pub fn prepare(
    url: &str,
    payload: &Payload,
    method: Method,
    options: &RequestOptions,
) -> std::result::Result<PreparedRequest, InvalidInput> {
    let mut url = parse_url(url)?;

    match method {
        Method::Get => {
            if !payload.is_empty() {
                append_query(&mut url, &form_encode(payload));
            }
            Ok(PreparedRequest {
                method,
                url,
                headers: vec![(String::from("Accept"), String::from("*/*"))],
                body: None,
            })
        }
        Method::Post => {
            let (body, content_type, accept) = match options.encoding {
                Encoding::Form => (form_encode(payload), FORM_CONTENT_TYPE, "*/*"),
                Encoding::Json => (
                    serde_json::to_string(payload)
                        .map_err(|e| InvalidInput::Payload(e.to_string()))?,
                    JSON_CONTENT_TYPE,
                    JSON_CONTENT_TYPE,
                ),
            };
            Ok(PreparedRequest {
                method,
                url,
                headers: vec![
                    (String::from("Content-Type"), String::from(content_type)),
                    (String::from("Accept"), String::from(accept)),
                ],
                body: Some(body),
            })
        }
    }
}

pub fn parse_url(url: &str) -> std::result::Result<Url, InvalidInput> {
    let parsed = Url::parse(url.trim()).map_err(|e| InvalidInput::Url {
        url: String::from(url),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(InvalidInput::Scheme(String::from(scheme))),
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(InvalidInput::Url {
            url: String::from(url),
            reason: String::from("missing host"),
        });
    }
    Ok(parsed)
}

fn append_query(url: &mut Url, query: &str) {
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{}&{}", existing, query),
        _ => String::from(query),
    };
    url.set_query(Some(&query));
}

/// Encodes `payload` as `application/x-www-form-urlencoded`.
///
/// Nested arrays and objects become bracketed keys (`tags[0]=a`,
/// `owner[id]=5`), booleans become `1`/`0` and nulls are left out.
pub fn form_encode(payload: &Payload) -> String {
    let mut pairs = Vec::new();
    for (key, value) in payload {
        flatten(key.clone(), value, &mut pairs);
    }
    let mut serializer = Serializer::new(String::new());
    for (key, value) in &pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

fn flatten(key: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(flag) => pairs.push((key, String::from(if *flag { "1" } else { "0" }))),
        Value::Number(number) => pairs.push((key, number.to_string())),
        Value::String(text) => pairs.push((key, text.clone())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten(format!("{}[{}]", key, index), item, pairs);
            }
        }
        Value::Object(fields) => {
            for (name, item) in fields {
                flatten(format!("{}[{}]", key, name), item, pairs);
            }
        }
    }
}

/// Parses a `key=value` payload field as given on the command line. The value
/// is taken as JSON when it parses as JSON and as a plain string otherwise.
pub fn parse_field(field: &str) -> Result<(String, Value)> {
    let (key, value) = field
        .split_once('=')
        .ok_or_else(|| anyhow!("Payload field '{}' must look like key=value", field))?;
    if key.is_empty() {
        return Err(anyhow!("Payload field '{}' has an empty key", field));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(String::from(value)));
    Ok((String::from(key), value))
}

pub fn parse_payload<'a, I>(fields: I) -> Result<Payload>
where
    I: IntoIterator<Item = &'a str>,
{
    fields.into_iter().map(parse_field).collect()
}
