use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers::{redirect_url, RedirectState};
use crate::shortener::ShortenerService;

pub fn create_redirect_router(service: Arc<ShortenerService>) -> Router {
    let state = Arc::new(RedirectState { service });

    Router::new()
        .route("/{short_key}", get(redirect_url))
        .with_state(state)
}
