use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::UserId;
use crate::models::{BatchItem, BatchResult, ShortenRequest, ShortenResponse, StatsSnapshot};
use crate::shortener::ShortenerService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ShortenerService>,
}

/// `POST /` with the URL as a plain-text body.
pub async fn shorten_text(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    body: String,
) -> Response {
    match state.service.shorten(&user_id, &body).await {
        Ok(shortened) if shortened.is_new => {
            (StatusCode::CREATED, shortened.short_url).into_response()
        }
        Ok(shortened) => (StatusCode::CONFLICT, shortened.short_url).into_response(),
        Err(err) => ApiError::from(err).into_text_response(),
    }
}

/// `POST /api/shorten`
pub async fn shorten_json(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    payload: Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ShortenResponse>), ApiError> {
    let Json(request) = payload?;
    let shortened = state.service.shorten(&user_id, &request.url).await?;

    let status = if shortened.is_new {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    };
    Ok((
        status,
        Json(ShortenResponse {
            result: shortened.short_url,
        }),
    ))
}

/// `POST /api/shorten/batch`
pub async fn shorten_batch(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    payload: Result<Json<Vec<BatchItem>>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<BatchResult>>), ApiError> {
    let Json(items) = payload?;
    let results = state.service.batch_shorten(&user_id, items).await?;
    Ok((StatusCode::CREATED, Json(results)))
}

/// `GET /api/user/urls`
pub async fn list_user_urls(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> Result<Response, ApiError> {
    let urls = state.service.list_user_urls(&user_id).await?;
    if urls.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(urls).into_response())
}

/// `DELETE /api/user/urls` with a JSON array of short keys.
pub async fn delete_user_urls(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    payload: Result<Json<Vec<String>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(short_keys) = payload?;
    state.service.enqueue_delete(&user_id, short_keys)?;
    Ok(StatusCode::ACCEPTED)
}

/// `GET /ping`
pub async fn ping(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.service.ping().await?;
    Ok(StatusCode::OK)
}

/// `GET /api/internal/stats`
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsSnapshot>, ApiError> {
    Ok(Json(state.service.stats().await?))
}
