use std::{sync::Arc, time::Duration};

use axum::http::HeaderName;
use httpmock::MockServer;
use reqwest::Url;
use shapemask::{
    application::{
        orchestrator::ShapeMaskOrchestrator,
        outcome::{Failure, Outcome},
        ports::{AccessChecker, AccessError, MaskCache, MaskRenderer, RenderError},
    },
    cache::{CacheConfig, build_mask_cache},
    config::UpstreamSettings,
    domain::mask::ShapeMaskContext,
    infra::upstream::{HttpAccessChecker, HttpMaskRenderer, UpstreamClient},
};
use shapemask_api_types::ShapeMaskRequest;

const SESSION: &str = "session-abc";

fn settings(server: &MockServer) -> UpstreamSettings {
    let base = Url::parse(&server.url("/")).expect("mock url");
    UpstreamSettings {
        access_url: base.clone(),
        render_url: base,
        timeout: Duration::from_secs(5),
        session_header: HeaderName::from_static("x-session-key"),
    }
}

fn clients(server: &MockServer) -> (HttpAccessChecker, HttpMaskRenderer) {
    let settings = settings(server);
    let upstream = UpstreamClient::new(&settings).expect("client builds");
    (
        HttpAccessChecker::new(upstream.clone(), settings.access_url),
        HttpMaskRenderer::new(upstream, settings.render_url),
    )
}

fn context(request: ShapeMaskRequest) -> ShapeMaskContext {
    ShapeMaskContext::from_request(request).expect("valid context")
}

#[tokio::test]
async fn access_check_reads_flag_and_forwards_session() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/shapes/42/readable")
            .header("x-session-key", SESSION);
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"readable":true}"#);
    });

    let (access, _) = clients(&server);
    let readable = access
        .can_read(&context(ShapeMaskRequest::new(42u64, SESSION)))
        .await
        .expect("access check succeeds");

    assert!(readable);
    mock.assert();
}

#[tokio::test]
async fn access_refusal_is_classified() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/shapes/42/readable");
        then.status(403).body("Session expired");
    });
    server.mock(|when, then| {
        when.method("GET").path("/shapes/43/readable");
        then.status(401);
    });

    let (access, _) = clients(&server);

    match access
        .can_read(&context(ShapeMaskRequest::new(42u64, SESSION)))
        .await
    {
        Err(AccessError::Downstream(failure)) => {
            assert_eq!(failure, Failure::new(403, "Session expired"));
        }
        other => panic!("expected classified failure, got {other:?}"),
    }

    match access
        .can_read(&context(ShapeMaskRequest::new(43u64, SESSION)))
        .await
    {
        Err(AccessError::Downstream(failure)) => {
            assert_eq!(failure, Failure::new(401, "Unauthorized"));
        }
        other => panic!("expected classified failure, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_access_reply_is_unclassified() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/shapes/42/readable");
        then.status(200).body("yes");
    });

    let (access, _) = clients(&server);
    let result = access
        .can_read(&context(ShapeMaskRequest::new(42u64, SESSION)))
        .await;
    assert!(matches!(result, Err(AccessError::Internal(_))));
}

#[tokio::test]
async fn renderer_sends_color_and_flip() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/shapes/42/mask")
            .query_param("color", "FF0000")
            .query_param("flip", "hv")
            .header("x-session-key", SESSION);
        then.status(200)
            .header("content-type", "image/png")
            .body("png-bytes");
    });

    let (_, renderer) = clients(&server);
    let request = ShapeMaskRequest::new(42u64, SESSION)
        .with_color("#ff0000")
        .with_flip(true, true);
    let mask = renderer
        .render(&context(request))
        .await
        .expect("render succeeds");

    assert_eq!(mask.as_deref(), Some(&b"png-bytes"[..]));
    mock.assert();
}

#[tokio::test]
async fn renderer_maps_missing_and_failed_replies() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/shapes/1/mask");
        then.status(404);
    });
    server.mock(|when, then| {
        when.method("GET").path("/shapes/2/mask");
        then.status(200);
    });
    server.mock(|when, then| {
        when.method("GET").path("/shapes/3/mask");
        then.status(502).body("bad gateway");
    });

    let (_, renderer) = clients(&server);

    let absent = renderer
        .render(&context(ShapeMaskRequest::new(1u64, SESSION)))
        .await
        .expect("404 is not an error");
    assert!(absent.is_none());

    let empty = renderer
        .render(&context(ShapeMaskRequest::new(2u64, SESSION)))
        .await
        .expect("empty body is not an error");
    assert!(empty.is_none());

    match renderer
        .render(&context(ShapeMaskRequest::new(3u64, SESSION)))
        .await
    {
        Err(RenderError::Upstream { status, message }) => {
            assert_eq!(status, 502);
            assert_eq!(message, "bad gateway");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn second_request_is_served_from_cache() {
    let server = MockServer::start();
    let access = server.mock(|when, then| {
        when.method("GET").path("/shapes/42/readable");
        then.status(200).body(r#"{"readable":true}"#);
    });
    let render = server.mock(|when, then| {
        when.method("GET").path("/shapes/42/mask");
        then.status(200).body("png-bytes");
    });

    let cache = build_mask_cache(&CacheConfig::default());
    let (access_checker, renderer) = clients(&server);
    let masks = ShapeMaskOrchestrator::new(
        cache.clone(),
        Arc::new(access_checker),
        Arc::new(renderer),
    );
    let raw = ShapeMaskRequest::new(42u64, SESSION)
        .with_color("FF0000")
        .to_bytes()
        .expect("request encodes");

    let first = masks.handle(&raw).await;
    assert_eq!(first, Outcome::Success("png-bytes".into()));

    // The write is detached; wait for it to land.
    let mut cached = None;
    for _ in 0..100 {
        cached = cache
            .get("shape:42:color=FF0000")
            .await
            .expect("in-memory cache never fails");
        if cached.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(cached.is_some(), "rendered mask was cached");

    let second = masks.handle(&raw).await;
    assert_eq!(second, Outcome::Success("png-bytes".into()));

    render.assert_hits(1);
    access.assert_hits(2);
}
