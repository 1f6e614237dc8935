//! HTTP surface integration tests
//!
//! These drive the full router (auth middleware, compression layers and the
//! redirect route) with in-memory storage and a fast delete pipeline.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use http_body_util::BodyExt;
use shorty::api::create_router;
use shorty::auth::{TokenIssuer, TrustedSubnet};
use shorty::deleter::{DeleteConfig, DeletePipeline};
use shorty::models::{BatchResult, ShortenResponse, StatsSnapshot, UserUrl};
use shorty::shortener::{RandomKeyGenerator, ShortenerService};
use shorty::storage::{MemoryStorage, Storage};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const BASE_URL: &str = "http://localhost:8080";

struct TestApp {
    router: Router,
    pipeline: Arc<DeletePipeline>,
}

fn create_app(subnet: TrustedSubnet) -> TestApp {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let config = DeleteConfig {
        batch_window: Duration::from_millis(10),
        ..DeleteConfig::default()
    };
    let pipeline = Arc::new(DeletePipeline::new(Arc::clone(&storage), config).unwrap());
    pipeline.start().unwrap();

    let service = Arc::new(ShortenerService::new(
        storage,
        Arc::new(RandomKeyGenerator),
        Arc::clone(&pipeline),
        BASE_URL,
    ));
    let tokens = Arc::new(TokenIssuer::new(b"test-secret"));
    let router = create_router(service, tokens, Arc::new(subnet));

    TestApp { router, pipeline }
}

fn default_app() -> TestApp {
    create_app(TrustedSubnet::default())
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// `token=...` part of the Set-Cookie header, usable as a Cookie header.
fn token_cookie(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn body_text(response: axum::response::Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

fn post_text(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "text/plain");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn key_of(short_url: &str) -> String {
    short_url.rsplit('/').next().unwrap().to_string()
}

#[tokio::test]
async fn test_shorten_text_then_redirect() {
    let app = default_app();

    let response = app
        .send(post_text("/", "https://example.com/some/long/path", None))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(token_cookie(&response).unwrap().starts_with("token="));
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("HttpOnly"));

    let short_url = body_text(response).await;
    assert!(short_url.starts_with(&format!("{BASE_URL}/")));
    let key = key_of(&short_url);
    assert_eq!(key.len(), 8);

    let response = app.send(get(&format!("/{key}"), None)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://example.com/some/long/path"
    );

    let response = app.send(get("/zzzzzzzz", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_url_with_control_characters_still_redirects() {
    let app = default_app();

    let response = app
        .send(json_request(
            "POST",
            "/api/shorten",
            r#"{"url":"https://example.com/a\nb"}"#,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: ShortenResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();

    let response = app.send(get(&format!("/{}", key_of(&created.result)), None)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "https://example.com/ab");
}

#[tokio::test]
async fn test_duplicate_shorten_returns_conflict() {
    let app = default_app();

    let response = app
        .send(json_request(
            "POST",
            "/api/shorten",
            r#"{"url":"https://example.com/dup"}"#,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = token_cookie(&response).unwrap();
    let first: ShortenResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();

    let response = app
        .send(json_request(
            "POST",
            "/api/shorten",
            r#"{"url":"https://example.com/dup"}"#,
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    // A valid token is not reissued
    assert!(token_cookie(&response).is_none());
    let second: ShortenResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(second.result, first.result);

    // Plain-text endpoint answers the same conflict in text
    let response = app
        .send(post_text("/", "https://example.com/dup", Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_text(response).await, first.result);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let app = default_app();

    let cases = [
        r#"{"url":"not a url"}"#,
        r#"{"url":"https://example.com","extra":true}"#,
        r#"{"url": "#,
        r#"{}"#,
    ];
    for body in cases {
        let response = app
            .send(json_request("POST", "/api/shorten", body, None))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        let error: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(error["error"].is_string());
    }

    let response = app.send(post_text("/", "nope", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(json_request("POST", "/api/shorten/batch", "[]", None))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_batch_shorten_preserves_order() {
    let app = default_app();

    let body = r#"[
        {"correlation_id":"first","original_url":"https://example.com/1"},
        {"correlation_id":"second","original_url":"https://example.com/2"},
        {"correlation_id":"again","original_url":"https://example.com/1"}
    ]"#;
    let response = app
        .send(json_request("POST", "/api/shorten/batch", body, None))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let results: Vec<BatchResult> = serde_json::from_slice(&body_bytes(response).await).unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.correlation_id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second", "again"]);
    assert_eq!(results[0].short_url, results[2].short_url);
    assert_ne!(results[0].short_url, results[1].short_url);
}

#[tokio::test]
async fn test_user_urls_require_a_token() {
    let app = default_app();

    let response = app.send(get("/api/user/urls", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookie = token_cookie(&response).expect("fresh token on rejection");

    // The fresh token works but the new user owns nothing yet
    let response = app.send(get("/api/user/urls", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(get("/api/user/urls", Some("token=forged.token.value")))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_then_redirect_is_gone() {
    let app = default_app();

    let response = app
        .send(post_text("/", "https://example.com/to-delete", None))
        .await;
    let cookie = token_cookie(&response).unwrap();
    let key = key_of(&body_text(response).await);

    app.send(post_text("/", "https://example.com/to-keep", Some(&cookie)))
        .await;

    let response = app.send(get("/api/user/urls", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let urls: Vec<UserUrl> = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(urls.len(), 2);

    let response = app
        .send(json_request(
            "DELETE",
            "/api/user/urls",
            &format!(r#"["{key}"]"#),
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let mut status = StatusCode::TEMPORARY_REDIRECT;
    for _ in 0..100 {
        status = app.send(get(&format!("/{key}"), None)).await.status();
        if status == StatusCode::GONE {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, StatusCode::GONE);

    let response = app.send(get("/api/user/urls", Some(&cookie))).await;
    let urls: Vec<UserUrl> = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].original_url, "https://example.com/to-keep");
}

#[tokio::test]
async fn test_foreign_delete_is_ignored() {
    let app = default_app();

    let response = app
        .send(post_text("/", "https://example.com/mine", None))
        .await;
    let owner = token_cookie(&response).unwrap();
    let key = key_of(&body_text(response).await);

    let response = app
        .send(post_text("/", "https://example.com/theirs", None))
        .await;
    let intruder = token_cookie(&response).unwrap();

    let response = app
        .send(json_request(
            "DELETE",
            "/api/user/urls",
            &format!(r#"["{key}"]"#),
            Some(&intruder),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Drain the pipeline so the request has been fully applied
    app.pipeline.stop(Duration::from_secs(5)).await;

    let response = app.send(get(&format!("/{key}"), None)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let response = app.send(get("/api/user/urls", Some(&owner))).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Once stopped, deletes are refused with 503
    let response = app
        .send(json_request(
            "DELETE",
            "/api/user/urls",
            &format!(r#"["{key}"]"#),
            Some(&owner),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_stats_behind_trusted_subnet() {
    let subnet = TrustedSubnet::new(Some("10.0.0.0/8".parse().unwrap()), false);
    let app = create_app(subnet);

    app.send(post_text("/", "https://example.com/a", None)).await;
    app.send(post_text("/", "https://example.com/b", None)).await;

    let request = Request::builder()
        .uri("/api/internal/stats")
        .header("x-forwarded-for", "10.1.2.3, 192.168.0.1")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats: StatsSnapshot = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(stats, StatsSnapshot { urls: 2, users: 2 });

    let request = Request::builder()
        .uri("/api/internal/stats")
        .header("x-real-ip", "192.168.1.10")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::FORBIDDEN);

    // No address at all
    let response = app.send(get("/api/internal/stats", None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_stats_when_subnet_unconfigured() {
    let open = create_app(TrustedSubnet::new(None, false));
    assert_eq!(
        open.send(get("/api/internal/stats", None)).await.status(),
        StatusCode::OK
    );

    let closed = create_app(TrustedSubnet::new(None, true));
    assert_eq!(
        closed.send(get("/api/internal/stats", None)).await.status(),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_ping() {
    let app = default_app();
    assert_eq!(app.send(get("/ping", None)).await.status(), StatusCode::OK);
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

#[tokio::test]
async fn test_gzip_request_and_response() {
    let app = default_app();

    let body = gzip(br#"{"url":"https://example.com/compressed"}"#);
    let request = Request::builder()
        .method("POST")
        .uri("/api/shorten")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(body))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = token_cookie(&response).unwrap();

    let request = Request::builder()
        .uri("/api/user/urls")
        .header(header::COOKIE, &cookie)
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    let compressed = body_bytes(response).await;
    let urls: Vec<UserUrl> = serde_json::from_slice(&gunzip(&compressed)).unwrap();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].original_url, "https://example.com/compressed");
}
