//! Integration tests for the HTTP surface.

#![cfg(feature = "axum-integration")]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use media_resolver::extractor::mock::MockExtractor;
use media_resolver::factory::mock::MockBrowserFactory;
use media_resolver::integrations::axum::{AppState, router};
use media_resolver::prelude::*;
use tower::ServiceExt;

fn state_with(config: ResolverConfig, extractor: MockExtractor) -> AppState {
    let resolver = ScrapeOrchestrator::builder()
        .config(config)
        .factory(Box::new(MockBrowserFactory::new().with_metadata(
            serde_json::json!({ "title": "Clip", "username": "someone" }),
        )))
        .extractor(extractor)
        .build()
        .unwrap();

    AppState::new(Arc::new(resolver)).unwrap()
}

fn default_state() -> AppState {
    state_with(
        ResolverConfig::default(),
        MockExtractor::returning(["https://cdn.example/clip.mp4"]),
    )
}

/// State whose download proxy may reach the local upstreams.
fn download_state() -> AppState {
    state_with(
        ResolverConfigBuilder::new()
            .allow_private_downloads(true)
            .build()
            .unwrap(),
        MockExtractor::returning(["https://cdn.example/clip.mp4"]),
    )
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn serve_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

// ============================================================================
// Resolution
// ============================================================================

/// Test that a valid URL resolves to a success payload.
#[tokio::test]
async fn test_resolve_success() {
    let response = router(default_state())
        .oneshot(post_json(
            "/api/resolve",
            r#"{"url":"https://www.instagram.com/reel/Cx1_ab/"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["type"], "reel");
    assert_eq!(json["title"], "Clip");
    assert_eq!(json["downloadUrl"], "https://cdn.example/clip.mp4");
    assert_eq!(json["mediaType"], "video");
}

/// Test that a missing or malformed body is a 400 JSON failure.
#[tokio::test]
async fn test_resolve_bad_request() {
    let app = router(default_state());

    for body in ["{}", "not json", r#"{"url":"https://example.com/p/ABC/"}"#] {
        let response = app
            .clone()
            .oneshot(post_json("/api/resolve", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "INVALID_INPUT");
        assert!(json["message"].as_str().is_some());
    }
}

/// Test that the kind route enforces its kind.
#[tokio::test]
async fn test_resolve_kind_route() {
    let app = router(default_state());

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/resolve/reel",
            r#"{"url":"https://www.instagram.com/p/ABC123/"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/resolve/post",
            r#"{"url":"https://www.instagram.com/p/ABC123/"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["type"], "post");

    let response = app
        .oneshot(post_json(
            "/api/resolve/story",
            r#"{"url":"https://www.instagram.com/p/ABC123/"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test that the profile route accepts a bare username.
#[tokio::test]
async fn test_resolve_profile_by_username() {
    let state = state_with(
        ResolverConfig::default(),
        MockExtractor::returning([
            "https://instagram.fabc1-1.fna.fbcdn.net/v/t51.2885-19/1_n.jpg?oh=1&oe=2",
        ]),
    );

    let response = router(state)
        .oneshot(post_json("/api/resolve/profile", r#"{"username":"@someone"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["type"], "profile");
    assert_eq!(json["mediaType"], "image");
}

/// Test that no matching candidate is a 404.
#[tokio::test]
async fn test_resolve_no_media_found() {
    let state = state_with(
        ResolverConfig::default(),
        MockExtractor::returning(["https://cdn.example/cover.jpg"]),
    );

    let response = router(state)
        .oneshot(post_json(
            "/api/resolve",
            r#"{"url":"https://www.instagram.com/reel/Cx1_ab/"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "NO_MEDIA_FOUND");
}

// ============================================================================
// Rate Limiting
// ============================================================================

/// Test that the limiter answers 429 with Retry-After.
#[tokio::test]
async fn test_rate_limit_exceeded() {
    let config = ResolverConfigBuilder::new()
        .rate_limit(Duration::from_secs(60), 2)
        .build()
        .unwrap();
    let app = router(state_with(
        config,
        MockExtractor::returning(["https://cdn.example/clip.mp4"]),
    ));
    let body = r#"{"url":"https://www.instagram.com/reel/Cx1_ab/"}"#;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json("/api/resolve", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(post_json("/api/resolve", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(json_body(response).await["code"], "RATE_LIMITED");
}

/// Test that trusted forwarded addresses are limited separately.
#[tokio::test]
async fn test_rate_limit_per_forwarded_client() {
    let config = ResolverConfigBuilder::new()
        .rate_limit(Duration::from_secs(60), 1)
        .build()
        .unwrap();
    let state = state_with(
        config,
        MockExtractor::returning(["https://cdn.example/clip.mp4"]),
    )
    .trust_proxy_headers(true);
    let app = router(state.clone());

    let request = |client: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/resolve")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", client)
            .body(Body::from(
                r#"{"url":"https://www.instagram.com/reel/Cx1_ab/"}"#,
            ))
            .unwrap()
    };

    let a = app.clone().oneshot(request("203.0.113.1")).await.unwrap();
    let b = app.clone().oneshot(request("203.0.113.2")).await.unwrap();
    let a_again = app.oneshot(request("203.0.113.1")).await.unwrap();

    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    assert_eq!(a_again.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(state.limiter.tracked_clients(), 2);
}

// ============================================================================
// Health and Stats
// ============================================================================

/// Test health before and after shutdown.
#[tokio::test]
async fn test_health() {
    let state = default_state();
    let app = router(state.clone());

    let response = app.clone().oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");

    state.resolver.shutdown_async().await;

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

/// Test that stats report pool, queue, cache and limiter counts.
#[tokio::test]
async fn test_stats() {
    let app = router(default_state());

    app.clone()
        .oneshot(post_json(
            "/api/resolve",
            r#"{"url":"https://www.instagram.com/reel/Cx1_ab/"}"#,
        ))
        .await
        .unwrap();

    let response = app.oneshot(get_request("/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["cachedEntries"], 1);
    assert_eq!(json["trackedClients"], 1);
    assert_eq!(json["pool"]["capacity"], 5);
    assert_eq!(json["pool"]["in_use"], 0);
    assert_eq!(json["queue"]["concurrency"], 5);
}

// ============================================================================
// Downloads
// ============================================================================

/// Test that a download streams the upstream body with attachment headers.
#[tokio::test]
async fn test_download_streams_media() {
    let upstream = serve_upstream(Router::new().route(
        "/clip.mp4",
        get(|| async { ([(header::CONTENT_TYPE, "video/mp4")], vec![1u8; 2048]) }),
    ))
    .await;

    let uri = format!(
        "/download?url={}&filename=clip.mp4",
        urlencoding::encode(&format!("{}/clip.mp4", upstream))
    );
    let response = router(download_state())
        .oneshot(get_request(&uri))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "2048");
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap();
    assert!(disposition.starts_with("attachment; filename=\"clip.mp4\""));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body.len(), 2048);
}

/// Test the profile picture download default filename.
#[tokio::test]
async fn test_download_pic_default_filename() {
    let upstream = serve_upstream(Router::new().route(
        "/pic.jpg",
        get(|| async { ([(header::CONTENT_TYPE, "image/jpeg")], "jpeg") }),
    ))
    .await;

    let uri = format!(
        "/download-pic?url={}",
        urlencoding::encode(&format!("{}/pic.jpg", upstream))
    );
    let response = router(download_state())
        .oneshot(get_request(&uri))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap();
    assert!(disposition.contains("filename=\"profile-pic.jpg\""));
}

/// Test download failures before streaming starts.
#[tokio::test]
async fn test_download_failures() {
    let upstream = serve_upstream(Router::new().route(
        "/gone",
        get(|| async { StatusCode::NOT_FOUND }),
    ))
    .await;
    let app = router(download_state());

    let response = app.clone().oneshot(get_request("/download")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let uri = format!(
        "/download?url={}",
        urlencoding::encode(&format!("{}/gone", upstream))
    );
    let response = app.oneshot(get_request(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = json_body(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "DOWNLOAD_FAILED");
}

/// Test that the default proxy refuses to fetch from the local network.
#[tokio::test]
async fn test_download_refuses_private_hosts() {
    let upstream = serve_upstream(Router::new().route(
        "/internal",
        get(|| async { "internal" }),
    ))
    .await;

    let uri = format!(
        "/download?url={}",
        urlencoding::encode(&format!("{}/internal", upstream))
    );
    let response = router(default_state())
        .oneshot(get_request(&uri))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["success"], false);
}

// ============================================================================
// Video quick info
// ============================================================================

/// Test that quick info answers with the video title and thumbnail.
#[tokio::test]
async fn test_quick_info() {
    let upstream = serve_upstream(Router::new().route(
        "/videos",
        get(|| async {
            axum::Json(serde_json::json!({
                "items": [{
                    "snippet": {
                        "title": "A video",
                        "thumbnails": { "high": { "url": "https://i.ytimg.com/vi/x/hq.jpg" } }
                    }
                }]
            }))
        }),
    ))
    .await;
    let client = VideoInfoClient::new(&format!("{}/videos", upstream), "key").unwrap();
    let app = router(default_state().video_info(client));

    let uri = format!(
        "/quick-info?url={}",
        urlencoding::encode("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
    );
    let response = app.clone().oneshot(get_request(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["title"], "A video");
    assert_eq!(json["thumbnail"], "https://i.ytimg.com/vi/x/hq.jpg");
    assert_eq!(json["videoId"], "dQw4w9WgXcQ");

    let response = app
        .clone()
        .oneshot(get_request("/quick-info"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let uri = format!(
        "/quick-info?url={}",
        urlencoding::encode("https://www.instagram.com/p/ABC/")
    );
    let response = app.oneshot(get_request(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test that quick info without an API key is a configuration error.
#[tokio::test]
async fn test_quick_info_without_key() {
    let uri = format!(
        "/quick-info?url={}",
        urlencoding::encode("https://youtu.be/dQw4w9WgXcQ")
    );
    let response = router(default_state())
        .oneshot(get_request(&uri))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["code"], "CONFIGURATION_ERROR");
}
