mod common;

use std::sync::Arc;

use brrtdispatch::dispatcher::DispatchCore;
use brrtdispatch::middleware::{
    AuthMiddleware, CorsMiddlewareBuilder, MetricsMiddleware, TracingMiddleware,
};
use brrtdispatch::{Endpoint, RequestContext, ViewResult};
use common::capture::capture;
use common::{echo_endpoint, request, sink, Recorder};
use http::{Method, StatusCode};
use tracing::Level;

fn authed_request(target: &str, token: Option<&str>) -> RequestContext {
    let mut builder = RequestContext::builder(Method::GET, target);
    if let Some(token) = token {
        builder = builder.header("Authorization", token);
    }
    builder.build()
}

#[test]
fn test_metrics_counts_requests_errors_and_short_circuits() {
    let recorder = Recorder::new();
    let metrics = Arc::new(MetricsMiddleware::new());
    let mut builder = DispatchCore::builder();
    builder.register("/echo", "GET", echo_endpoint(&recorder)).unwrap();
    let shared: Arc<MetricsMiddleware> = Arc::clone(&metrics);
    builder.register_middleware(shared);
    builder.register_middleware(Arc::new(AuthMiddleware::bearer("s3cret")));
    let core = builder.build().unwrap();

    core.dispatch(
        &mut authed_request("/echo?name=a", Some("Bearer s3cret")),
        &mut sink(),
    );
    core.dispatch(&mut authed_request("/echo", Some("Bearer s3cret")), &mut sink());
    core.dispatch(&mut authed_request("/echo?name=b", None), &mut sink());
    core.dispatch(&mut request(Method::GET, "/unknown"), &mut sink());

    // the routing miss never reaches middleware
    assert_eq!(metrics.request_count(), 3);
    assert_eq!(metrics.completed_count(), 3);
    assert_eq!(metrics.short_circuit_count(), 2);
    assert_eq!(metrics.auth_failures(), 1);
    assert_eq!(metrics.error_count(), 1);
    assert_eq!(metrics.handler_counts("echo"), Some((3, 1)));
    assert!(metrics.handler_counts("missing").is_none());
    assert!(metrics.handler_latency("echo").is_some());
    assert!(metrics.handler_latency("missing").is_none());
}

#[test]
fn test_auth_rejects_without_invoking_handler() {
    let recorder = Recorder::new();
    let mut builder = DispatchCore::builder();
    builder.register("/echo", "GET", echo_endpoint(&recorder)).unwrap();
    builder.register_middleware(Arc::new(AuthMiddleware::bearer("s3cret")));
    let core = builder.build().unwrap();
    let mut res = sink();

    let outcome = core.dispatch(
        &mut authed_request("/echo?name=a", Some("Bearer wrong")),
        &mut res,
    );

    assert_eq!(outcome.status, StatusCode::UNAUTHORIZED);
    assert!(!outcome.handler_invoked);
    assert_eq!(recorder.count("handler:echo"), 0);
    assert_eq!(res.json().unwrap()["error"], "Unauthorized");
}

#[test]
fn test_auth_custom_header() {
    let recorder = Recorder::new();
    let mut builder = DispatchCore::builder();
    builder.register("/echo", "GET", echo_endpoint(&recorder)).unwrap();
    builder.register_middleware(Arc::new(AuthMiddleware::new("k-123").with_header("x-api-key")));
    let core = builder.build().unwrap();

    let mut ctx = RequestContext::builder(Method::GET, "/echo?name=a")
        .header("X-Api-Key", "k-123")
        .build();
    let outcome = core.dispatch(&mut ctx, &mut sink());

    assert!(outcome.is_success());
    assert_eq!(recorder.count("handler:echo"), 1);
}

#[test]
fn test_cors_preflight_short_circuits() {
    let recorder = Recorder::new();
    let mut builder = DispatchCore::builder();
    builder.register("/echo", "*", echo_endpoint(&recorder)).unwrap();
    builder.register_middleware(Arc::new(
        CorsMiddlewareBuilder::new()
            .allowed_origins(&["https://app.example.com"])
            .allowed_methods(&[Method::GET, Method::POST])
            .build()
            .unwrap(),
    ));
    let core = builder.build().unwrap();
    let mut ctx = RequestContext::builder(Method::OPTIONS, "/echo")
        .header("Origin", "https://app.example.com")
        .header("Access-Control-Request-Method", "POST")
        .build();
    let mut res = sink();

    let outcome = core.dispatch(&mut ctx, &mut res);

    assert_eq!(outcome.status, StatusCode::NO_CONTENT);
    assert!(!outcome.handler_invoked);
    assert_eq!(
        res.header("access-control-allow-origin"),
        Some("https://app.example.com")
    );
    assert_eq!(recorder.count("handler:echo"), 0);
}

#[test]
fn test_cors_headers_survive_successful_render() {
    let recorder = Recorder::new();
    let mut builder = DispatchCore::builder();
    builder.register("/echo", "GET", echo_endpoint(&recorder)).unwrap();
    builder.register_middleware(Arc::new(
        CorsMiddlewareBuilder::new()
            .allowed_origins(&["https://app.example.com"])
            .build()
            .unwrap(),
    ));
    let core = builder.build().unwrap();
    let mut ctx = RequestContext::builder(Method::GET, "/echo?name=z")
        .header("Origin", "https://app.example.com")
        .build();
    let mut res = sink();

    core.dispatch(&mut ctx, &mut res);

    assert_eq!(
        res.header("access-control-allow-origin"),
        Some("https://app.example.com")
    );
    assert_eq!(res.json().unwrap()["message"], "Hello, z");
}

#[test]
fn test_cors_rejects_unknown_origin() {
    let recorder = Recorder::new();
    let mut builder = DispatchCore::builder();
    builder.register("/echo", "GET", echo_endpoint(&recorder)).unwrap();
    builder.register_middleware(Arc::new(
        CorsMiddlewareBuilder::new()
            .allowed_origins(&["https://app.example.com"])
            .build()
            .unwrap(),
    ));
    let core = builder.build().unwrap();
    let mut ctx = RequestContext::builder(Method::GET, "/echo?name=z")
        .header("Origin", "https://evil.example.net")
        .build();

    let outcome = core.dispatch(&mut ctx, &mut sink());

    assert_eq!(outcome.status, StatusCode::FORBIDDEN);
    assert_eq!(recorder.count("handler:echo"), 0);
}

#[test]
fn test_tracing_reports_finished_request() {
    let recorder = Recorder::new();
    let mut builder = DispatchCore::builder();
    builder.register("/echo", "GET", echo_endpoint(&recorder)).unwrap();
    builder.register_middleware(Arc::new(TracingMiddleware::new()));
    let core = builder.build().unwrap();

    let (outcome, logs) =
        capture(|| core.dispatch(&mut request(Method::GET, "/echo"), &mut sink()));

    assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
    let finished: Vec<_> = logs
        .at(Level::INFO)
        .into_iter()
        .filter(|e| e.message == "Request finished")
        .collect();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].field("status"), Some("400"));
    assert_eq!(finished[0].field("handler_invoked"), Some("false"));
}

#[test]
fn test_handler_events_nest_under_request_span() {
    let mut builder = DispatchCore::builder();
    builder
        .register(
            "/work",
            "GET",
            Endpoint::declarative("work", |_args| {
                tracing::info!("doing work");
                Ok(ViewResult::new("work").into())
            }),
        )
        .unwrap();
    builder.register_middleware(Arc::new(TracingMiddleware::new()));
    let core = builder.build().unwrap();

    let (outcome, logs) =
        capture(|| core.dispatch(&mut request(Method::GET, "/work"), &mut sink()));

    assert!(outcome.is_success());
    let work = logs
        .events()
        .into_iter()
        .find(|e| e.message == "doing work")
        .unwrap();
    assert_eq!(work.spans, vec!["request", "handler"]);
}

#[test]
fn test_handler_span_without_tracing_middleware() {
    let mut builder = DispatchCore::builder();
    builder
        .register(
            "/work",
            "GET",
            Endpoint::declarative("work", |_args| {
                tracing::info!("doing work");
                Ok(ViewResult::new("work").into())
            }),
        )
        .unwrap();
    let core = builder.build().unwrap();

    let (_, logs) = capture(|| core.dispatch(&mut request(Method::GET, "/work"), &mut sink()));

    let work = logs
        .events()
        .into_iter()
        .find(|e| e.message == "doing work")
        .unwrap();
    assert_eq!(work.spans, vec!["handler"]);
}
