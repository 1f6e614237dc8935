use bytes::Bytes;
use prost::Message;
use tonic::{Code, Status};
use tracing::error;

use super::proto::ShortenResponse;
use crate::shortener::ServiceError;

/// Message of the status returned for a tombstoned short key.
pub const GONE_MESSAGE: &str = "short url has been deleted";

impl From<ServiceError> for Status {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidArgument(message) => Status::invalid_argument(message),
            ServiceError::NotFound => Status::not_found(err.to_string()),
            ServiceError::Gone => Status::not_found(GONE_MESSAGE),
            ServiceError::Unauthenticated => Status::unauthenticated(err.to_string()),
            ServiceError::Forbidden => Status::permission_denied(err.to_string()),
            ServiceError::Overloaded => Status::resource_exhausted(err.to_string()),
            ServiceError::ShuttingDown => Status::unavailable(err.to_string()),
            ServiceError::Unavailable(_) | ServiceError::Internal(_) => {
                error!(error = %err, "RPC failed");
                Status::internal("internal server error")
            }
        }
    }
}

/// `AlreadyExists` carrying the existing short URL as message and as an
/// encoded [`ShortenResponse`] in the details.
pub fn already_exists(short_url: String) -> Status {
    let details = ShortenResponse {
        short_url: short_url.clone(),
    }
    .encode_to_vec();
    Status::with_details(Code::AlreadyExists, short_url, Bytes::from(details))
}
