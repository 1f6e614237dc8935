use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, decompression::RequestDecompressionLayer,
    trace::TraceLayer,
};

use super::handlers::{
    delete_user_urls, list_user_urls, ping, shorten_batch, shorten_json, shorten_text, stats,
    AppState,
};
use crate::auth::{lenient_auth, strict_auth, trusted_subnet_guard, TokenIssuer, TrustedSubnet};
use crate::redirect::create_redirect_router;
use crate::shortener::ShortenerService;

/// Build the full HTTP surface: shortening, user URLs, internal stats and
/// the redirect route.
pub fn create_router(
    service: Arc<ShortenerService>,
    tokens: Arc<TokenIssuer>,
    subnet: Arc<TrustedSubnet>,
) -> Router {
    let state = AppState {
        service: Arc::clone(&service),
    };

    let shortening = Router::new()
        .route("/", post(shorten_text))
        .route("/api/shorten", post(shorten_json))
        .route("/api/shorten/batch", post(shorten_batch))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&tokens),
            lenient_auth,
        ));

    let user_urls = Router::new()
        .route("/api/user/urls", get(list_user_urls).delete(delete_user_urls))
        .route_layer(middleware::from_fn_with_state(tokens, strict_auth));

    let internal = Router::new()
        .route("/api/internal/stats", get(stats))
        .route_layer(middleware::from_fn_with_state(subnet, trusted_subnet_guard));

    Router::new()
        .route("/ping", get(ping))
        .merge(shortening)
        .merge(user_urls)
        .merge(internal)
        .with_state(state)
        .merge(create_redirect_router(service))
        .layer(CompressionLayer::new())
        .layer(RequestDecompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}
