use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use crate::shortener::{ServiceError, ShortenerService};

pub struct RedirectState {
    pub service: Arc<ShortenerService>,
}

/// Redirect to the original URL
pub async fn redirect_url(
    State(state): State<Arc<RedirectState>>,
    Path(short_key): Path<String>,
) -> Response {
    match state.service.resolve(&short_key).await {
        Ok(original_url) => Redirect::temporary(&original_url).into_response(),
        Err(ServiceError::NotFound) => (StatusCode::NOT_FOUND, "URL not found").into_response(),
        Err(ServiceError::Gone) => (StatusCode::GONE, "This link has been deleted").into_response(),
        Err(ServiceError::InvalidArgument(message)) => {
            (StatusCode::BAD_REQUEST, message).into_response()
        }
        Err(err) => {
            tracing::error!(short_key = %short_key, error = %err, "Failed to resolve short url");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}
