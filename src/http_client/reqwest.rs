use crate::error::TransportError;
use crate::http_client::HttpClient;
use crate::model::{Method, PreparedRequest, RawResponse};
use crate::ClientConfig;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use std::convert::{TryFrom, TryInto};

pub struct ReqwestHttpClient {
    client: Client,
}

impl HttpClient for ReqwestHttpClient {
    fn create(config: ClientConfig) -> Result<ReqwestHttpClient, TransportError>
    where
        Self: Sized,
    {
        let max_redirects = config.max_redirects;
        // `previous` holds the original URL too, so hop n sees n entries.
        let redirects = Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                attempt.error(format!("stopped after {} redirects", max_redirects))
            } else {
                attempt.follow()
            }
        });

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .redirect(redirects)
            .danger_accept_invalid_certs(!config.verify_tls)
            .user_agent(config.user_agent);
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Builder(e.to_string()))?;

        Ok(ReqwestHttpClient { client })
    }

    fn execute(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        let PreparedRequest {
            method,
            url,
            headers,
            body,
        } = request;
        let verb = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let request_builder = headers.iter().fold(
            self.client.request(verb, url.clone()),
            |builder, (name, value)| builder.header(name.as_str(), value.as_str()),
        );
        let request_builder = match body {
            Some(body) => request_builder.body(body.clone()),
            None => request_builder,
        };
        let response = request_builder.send()?;

        response.try_into()
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_redirect() {
            TransportError::Redirect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

impl TryFrom<reqwest::blocking::Response> for RawResponse {
    type Error = TransportError;

    fn try_from(response: reqwest::blocking::Response) -> Result<Self, TransportError> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        let body = response.text()?;
        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}
