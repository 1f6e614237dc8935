use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{client_ip, TokenIssuer, TrustedSubnet};
use crate::api::error::ApiError;
use crate::shortener::ServiceError;

/// Cookie carrying the user token on the HTTP surface.
pub const TOKEN_COOKIE: &str = "token";

/// Authenticated caller, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

fn token_from_cookies(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == TOKEN_COOKIE).then_some(value)
        })
}

fn verified_user(tokens: &TokenIssuer, headers: &HeaderMap) -> Option<String> {
    let token = token_from_cookies(headers)?;
    match tokens.verify(token) {
        Ok(user_id) => Some(user_id),
        Err(err) => {
            debug!(error = %err, "Rejected token cookie");
            None
        }
    }
}

fn attach_cookie(response: &mut Response, token: &str) {
    match HeaderValue::from_str(&format!("{TOKEN_COOKIE}={token}; Path=/; HttpOnly")) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(err) => error!(error = %err, "Issued token is not a valid header value"),
    }
}

fn mint(tokens: &TokenIssuer) -> Result<(String, String), Response> {
    tokens.issue_new_user().map_err(|err| {
        error!(error = %err, "Failed to issue user token");
        ApiError::from(ServiceError::Internal(err.into())).into_response()
    })
}

/// Accept a valid token or silently mint a new user.
pub async fn lenient_auth(
    State(tokens): State<Arc<TokenIssuer>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(user_id) = verified_user(&tokens, request.headers()) {
        request.extensions_mut().insert(UserId(user_id));
        return next.run(request).await;
    }

    let (user_id, token) = match mint(&tokens) {
        Ok(minted) => minted,
        Err(response) => return response,
    };
    debug!(user_id = %user_id, "Issued token to new user");
    request.extensions_mut().insert(UserId(user_id));

    let mut response = next.run(request).await;
    attach_cookie(&mut response, &token);
    response
}

/// Require a valid token; otherwise reject with 401 and a fresh token.
pub async fn strict_auth(
    State(tokens): State<Arc<TokenIssuer>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(user_id) = verified_user(&tokens, request.headers()) {
        request.extensions_mut().insert(UserId(user_id));
        return next.run(request).await;
    }

    let (_, token) = match mint(&tokens) {
        Ok(minted) => minted,
        Err(response) => return response,
    };
    let mut response = ApiError::from(ServiceError::Unauthenticated).into_response();
    attach_cookie(&mut response, &token);
    response
}

/// Admit only clients inside the trusted subnet.
pub async fn trusted_subnet_guard(
    State(subnet): State<Arc<TrustedSubnet>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client = client_ip::from_headers(request.headers(), peer);

    if subnet.allows(client) {
        return next.run(request).await;
    }

    warn!(
        client = ?client,
        path = %request.uri().path(),
        "Rejected request from outside the trusted subnet"
    );
    ApiError::from(ServiceError::Forbidden).into_response()
}
