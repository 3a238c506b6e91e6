use crate::error::TransportError;
use crate::model::{PreparedRequest, RawResponse};
use crate::ClientConfig;


pub mod reqwest;

/// Performs exactly one attempt: one request, redirects followed, no retries.
pub trait HttpClient {
    fn create(config: ClientConfig) -> Result<Self, TransportError>
    where
        Self: Sized;

    fn execute(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError>;
}
