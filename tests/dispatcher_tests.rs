mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use brrtdispatch::context::ResponseSink;
use brrtdispatch::dispatcher::{DispatchCore, ErrorResolver};
use brrtdispatch::error::{ConfigError, DispatchError};
use brrtdispatch::handler::{Endpoint, HandlerDescriptor, HandlerResult, HandlerReturn};
use brrtdispatch::invoker::{AdapterSelector, Invoker};
use brrtdispatch::middleware::{Flow, Middleware};
use brrtdispatch::result::{Renderer, ViewResult};
use brrtdispatch::{DispatchConfig, ParameterSpec, RequestContext, RequestId, Session};
use common::{echo_endpoint, request, sink, Behavior, Recorder, RecordingMiddleware};
use http::{Method, StatusCode};
use parking_lot::Mutex;

fn echo_core(recorder: &Recorder) -> DispatchCore {
    let mut builder = DispatchCore::builder();
    builder.register("/echo", "GET", echo_endpoint(recorder)).unwrap();
    builder.build().unwrap()
}

#[test]
fn test_echo_renders_greeting() {
    let recorder = Recorder::new();
    let core = echo_core(&recorder);
    let mut ctx = request(Method::GET, "/echo?name=World");
    let mut res = sink();

    let outcome = core.dispatch(&mut ctx, &mut res);

    assert!(outcome.is_success());
    assert!(outcome.handler_invoked);
    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(outcome.handler.as_deref(), Some("echo"));
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.json().unwrap()["message"], "Hello, World");
}

#[test]
fn test_echo_without_name_is_bad_request() {
    let recorder = Recorder::new();
    let core = echo_core(&recorder);
    let mut ctx = request(Method::GET, "/echo");
    let mut res = sink();

    let outcome = core.dispatch(&mut ctx, &mut res);

    assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
    assert!(!outcome.handler_invoked);
    assert_eq!(recorder.count("handler:echo"), 0);
    assert!(matches!(outcome.error, Some(DispatchError::Binding(_))));
    let body = res.json().unwrap();
    assert_eq!(body["error"], "missing_parameter");
    assert_eq!(body["request_id"], ctx.request_id().to_string());
}

#[test]
fn test_routing_miss_is_not_found() {
    let core = echo_core(&Recorder::new());
    let mut ctx = request(Method::GET, "/nowhere");
    let mut res = sink();

    let outcome = core.dispatch(&mut ctx, &mut res);

    assert_eq!(outcome.status, StatusCode::NOT_FOUND);
    assert!(outcome.handler.is_none());
    assert!(matches!(outcome.error, Some(DispatchError::RoutingMiss { .. })));
}

#[test]
fn test_wrong_verb_is_method_not_allowed() {
    let core = echo_core(&Recorder::new());
    let mut ctx = request(Method::POST, "/echo?name=x");
    let mut res = sink();

    let outcome = core.dispatch(&mut ctx, &mut res);

    assert_eq!(outcome.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.header("allow"), Some("GET"));
}

#[test]
fn test_handler_error_is_resolved_as_500() {
    let mut builder = DispatchCore::builder();
    builder
        .register(
            "/boom",
            "*",
            Endpoint::declarative("boom", |_| anyhow::bail!("database is down")),
        )
        .unwrap();
    let core = builder.build().unwrap();
    let mut ctx = request(Method::DELETE, "/boom");
    let mut res = sink();

    let outcome = core.dispatch(&mut ctx, &mut res);

    assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(outcome.handler_invoked);
    let body = res.json().unwrap();
    assert_eq!(body["error"], "handler_invocation");
    assert!(body.get("detail").is_none());
}

#[test]
fn test_exposed_details_include_handler_error() {
    let mut builder = DispatchCore::builder();
    builder
        .register(
            "/boom",
            "GET",
            Endpoint::declarative("boom", |_| anyhow::bail!("database is down")),
        )
        .unwrap();
    let core = builder
        .with_config(DispatchConfig {
            expose_error_details: true,
            ..DispatchConfig::default()
        })
        .build()
        .unwrap();
    let mut res = sink();

    core.dispatch(&mut request(Method::GET, "/boom"), &mut res);

    let detail = res.json().unwrap()["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("database is down"));
}

#[test]
fn test_handler_panic_is_contained() {
    let recorder = Recorder::new();
    let mut builder = DispatchCore::builder();
    builder
        .register(
            "/panic",
            "GET",
            Endpoint::declarative("panic", |_| panic!("handler exploded")),
        )
        .unwrap();
    builder.register_middleware(RecordingMiddleware::new("A", &recorder, Behavior::Continue));
    let core = builder.build().unwrap();
    let mut res = sink();

    let outcome = core.dispatch(&mut request(Method::GET, "/panic"), &mut res);

    assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
    match outcome.error {
        Some(DispatchError::HandlerInvocation { source, .. }) => {
            assert!(source.to_string().contains("handler exploded"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(recorder.phase("post"), Vec::<String>::new());
    assert_eq!(recorder.phase("after"), vec!["after:A"]);
}

#[test]
fn test_empty_view_name_is_render_error() {
    let mut builder = DispatchCore::builder();
    builder
        .register(
            "/blank",
            "GET",
            Endpoint::declarative("blank", |_| Ok(ViewResult::new("  ").into())),
        )
        .unwrap();
    let core = builder.build().unwrap();
    let mut res = sink();

    let outcome = core.dispatch(&mut request(Method::GET, "/blank"), &mut res);

    assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json().unwrap()["error"], "render");
}

struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render(
        &self,
        view: &ViewResult,
        _ctx: &RequestContext,
        _res: &mut dyn ResponseSink,
    ) -> anyhow::Result<()> {
        anyhow::bail!("template {} not found", view.name)
    }
}

#[test]
fn test_renderer_failure_is_500() {
    let recorder = Recorder::new();
    let mut builder = DispatchCore::builder();
    builder.register("/echo", "GET", echo_endpoint(&recorder)).unwrap();
    let core = builder
        .with_renderer(Arc::new(FailingRenderer))
        .build()
        .unwrap();
    let mut res = sink();

    let outcome = core.dispatch(&mut request(Method::GET, "/echo?name=x"), &mut res);

    assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(matches!(outcome.error, Some(DispatchError::Render(_))));
    assert_eq!(recorder.count("handler:echo"), 1);
}

#[test]
fn test_direct_result_skips_rendering() {
    let mut builder = DispatchCore::builder();
    builder
        .register(
            "/raw",
            "GET",
            Endpoint::declarative("raw", |args| {
                let res = args.response();
                res.set_status(StatusCode::ACCEPTED);
                res.add_header("content-type", "text/plain");
                res.write_body(b"queued");
                Ok(HandlerReturn::Written)
            }),
        )
        .unwrap();
    let core = builder
        .with_renderer(Arc::new(FailingRenderer))
        .build()
        .unwrap();
    let mut res = sink();

    let outcome = core.dispatch(&mut request(Method::GET, "/raw"), &mut res);

    assert!(outcome.is_success());
    assert_eq!(outcome.status, StatusCode::ACCEPTED);
    assert_eq!(res.body_string(), "queued");
}

#[test]
fn test_legacy_route_serves_any_verb() {
    let mut builder = DispatchCore::builder();
    builder
        .register_legacy(
            "/legacy/ping",
            Endpoint::legacy("ping", |ctx, res| {
                res.add_header("content-type", "text/plain");
                res.write_body(format!("pong {}", ctx.method()).as_bytes());
                Ok(HandlerReturn::Written)
            }),
        )
        .unwrap();
    let core = builder.build().unwrap();

    for method in [Method::GET, Method::PUT, Method::PATCH] {
        let mut res = sink();
        let outcome = core.dispatch(&mut request(method.clone(), "/legacy/ping"), &mut res);
        assert!(outcome.is_success());
        assert_eq!(res.body_string(), format!("pong {method}"));
    }
}

struct Counter {
    base: i64,
}

impl Counter {
    fn add(&self, args: &mut brrtdispatch::Args<'_>) -> HandlerResult {
        let by: i64 = args.take("by")?;
        Ok(ViewResult::new("sum").with("total", self.base + by).into())
    }
}

#[test]
fn test_owner_bound_method() {
    let mut builder = DispatchCore::builder();
    let descriptor = builder
        .register(
            "/add",
            "GET",
            Endpoint::method("add", Arc::new(Counter { base: 40 }), Counter::add)
                .param(ParameterSpec::named::<i64>("by").default_value("2")),
        )
        .unwrap();
    assert!(descriptor.owner().unwrap().ends_with("Counter"));
    let core = builder.build().unwrap();
    let mut res = sink();

    core.dispatch(&mut request(Method::GET, "/add"), &mut res);

    assert_eq!(res.json().unwrap()["total"], 42);
}

#[test]
fn test_build_fails_without_invoker() {
    let mut builder = DispatchCore::builder();
    builder
        .register("/echo", "GET", echo_endpoint(&Recorder::new()))
        .unwrap();
    let err = builder
        .with_selector(AdapterSelector::empty())
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        ConfigError::NoInvoker {
            handler: "echo".to_string(),
            shape: "declarative",
        }
    );
}

struct ShoutingInvoker;

impl Invoker for ShoutingInvoker {
    fn name(&self) -> &'static str {
        "shouting"
    }

    fn supports(&self, descriptor: &HandlerDescriptor) -> bool {
        descriptor.name() == "echo"
    }

    fn invoke(
        &self,
        _descriptor: &HandlerDescriptor,
        _args: brrtdispatch::binding::BoundArgs,
        _ctx: &RequestContext,
        _res: &mut dyn ResponseSink,
    ) -> HandlerResult {
        Ok(ViewResult::new("echo").with("message", "HELLO").into())
    }
}

#[test]
fn test_custom_invoker_takes_priority() {
    let recorder = Recorder::new();
    let mut builder = DispatchCore::builder();
    builder.register("/echo", "GET", echo_endpoint(&recorder)).unwrap();
    let core = builder.with_invoker(Arc::new(ShoutingInvoker)).build().unwrap();
    let mut res = sink();

    core.dispatch(&mut request(Method::GET, "/echo?name=x"), &mut res);

    assert_eq!(res.json().unwrap()["message"], "HELLO");
    assert_eq!(recorder.count("handler:echo"), 0);
}

struct PlainResolver;

impl ErrorResolver for PlainResolver {
    fn resolve(
        &self,
        error: &DispatchError,
        _ctx: &RequestContext,
        res: &mut dyn ResponseSink,
    ) -> anyhow::Result<()> {
        res.reset();
        res.set_status(error.status());
        res.write_body(error.kind().as_bytes());
        Ok(())
    }
}

#[test]
fn test_custom_error_resolver() {
    let core = DispatchCore::builder()
        .with_error_resolver(Arc::new(PlainResolver))
        .build()
        .unwrap();
    let mut res = sink();

    let outcome = core.dispatch(&mut request(Method::GET, "/missing"), &mut res);

    assert_eq!(outcome.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body_string(), "routing_miss");
}

struct BrokenResolver;

impl ErrorResolver for BrokenResolver {
    fn resolve(
        &self,
        _error: &DispatchError,
        _ctx: &RequestContext,
        _res: &mut dyn ResponseSink,
    ) -> anyhow::Result<()> {
        anyhow::bail!("resolver broke")
    }
}

#[test]
fn test_failing_resolver_falls_back_to_status() {
    let core = DispatchCore::builder()
        .with_error_resolver(Arc::new(BrokenResolver))
        .build()
        .unwrap();
    let mut res = sink();

    let outcome = core.dispatch(&mut request(Method::GET, "/missing"), &mut res);

    assert_eq!(outcome.status, StatusCode::NOT_FOUND);
    assert!(res.body().is_empty());
}

#[test]
fn test_concurrent_dispatch_shares_one_core() {
    let recorder = Recorder::new();
    let core = echo_core(&recorder);

    thread::scope(|scope| {
        for worker in 0..8 {
            let core = &core;
            scope.spawn(move || {
                for i in 0..50 {
                    let mut ctx = request(Method::GET, &format!("/echo?name=w{worker}-{i}"));
                    let mut res = sink();
                    let outcome = core.dispatch(&mut ctx, &mut res);
                    assert!(outcome.is_success());
                    assert_eq!(
                        res.json().unwrap()["message"],
                        format!("Hello, w{worker}-{i}")
                    );
                }
            });
        }
    });

    assert_eq!(recorder.count("handler:echo"), 400);
}

#[test]
fn test_configured_request_id_header_is_honoured() {
    let mut builder = DispatchCore::builder().with_config(DispatchConfig {
        request_id_header: "x-correlation-id".to_string(),
        ..DispatchConfig::default()
    });
    builder
        .register(
            "/whoami",
            "GET",
            Endpoint::declarative("whoami", |args| {
                let id = args.request().request_id().to_string();
                Ok(ViewResult::new("whoami").with("request_id", id).into())
            }),
        )
        .unwrap();
    let core = builder.build().unwrap();
    let sent = RequestId::new();
    let mut ctx = core
        .context_builder(Method::GET, "/whoami")
        .header("X-Correlation-Id", &sent.to_string())
        .build();
    let mut res = sink();

    core.dispatch(&mut ctx, &mut res);

    assert_eq!(ctx.request_id(), sent);
    assert_eq!(res.json().unwrap()["request_id"], sent.to_string());
}

#[derive(Default)]
struct MemorySession {
    values: Mutex<HashMap<String, String>>,
}

impl Session for MemorySession {
    fn id(&self) -> &str {
        "sess-1"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.values.lock().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> Option<String> {
        self.values.lock().remove(key)
    }
}

struct LoginMiddleware;

impl Middleware for LoginMiddleware {
    fn name(&self) -> &'static str {
        "login"
    }

    fn pre(
        &self,
        ctx: &mut RequestContext,
        _res: &mut dyn ResponseSink,
        _handler: &HandlerDescriptor,
    ) -> anyhow::Result<Flow> {
        if let Some(session) = ctx.session() {
            session.set("user", "alice".to_string());
        }
        Ok(Flow::Continue)
    }
}

#[test]
fn test_session_is_shared_by_middleware_and_handler() {
    let mut builder = DispatchCore::builder();
    builder
        .register(
            "/profile",
            "GET",
            Endpoint::declarative("profile", |args| {
                let session = args
                    .request()
                    .session()
                    .ok_or_else(|| anyhow::anyhow!("no session attached"))?;
                let user = session.get("user").unwrap_or_default();
                session.remove("user");
                Ok(ViewResult::new("profile")
                    .with("session", session.id().to_string())
                    .with("user", user)
                    .into())
            }),
        )
        .unwrap();
    builder.register_middleware(Arc::new(LoginMiddleware));
    let core = builder.build().unwrap();
    let session = Arc::new(MemorySession::default());
    let shared: Arc<MemorySession> = Arc::clone(&session);
    let mut ctx = RequestContext::builder(Method::GET, "/profile")
        .session(shared)
        .build();
    let mut res = sink();

    let outcome = core.dispatch(&mut ctx, &mut res);

    assert!(outcome.is_success());
    let body = res.json().unwrap();
    assert_eq!(body["session"], "sess-1");
    assert_eq!(body["user"], "alice");
    assert!(session.get("user").is_none());
}

#[test]
fn test_session_missing_is_handler_error() {
    let mut builder = DispatchCore::builder();
    builder
        .register(
            "/profile",
            "GET",
            Endpoint::declarative("profile", |args| {
                args.request()
                    .session()
                    .ok_or_else(|| anyhow::anyhow!("no session attached"))?;
                Ok(HandlerReturn::Nothing)
            }),
        )
        .unwrap();
    let core = builder.build().unwrap();

    let outcome = core.dispatch(&mut request(Method::GET, "/profile"), &mut sink());

    assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(matches!(outcome.error, Some(DispatchError::HandlerInvocation { .. })));
}

struct Greeter {
    greeting: &'static str,
}

impl Greeter {
    fn greet(&self, ctx: &RequestContext, res: &mut dyn ResponseSink) -> HandlerResult {
        res.write_body(format!("{} from {}", self.greeting, ctx.path()).as_bytes());
        Ok(HandlerReturn::Written)
    }
}

#[test]
fn test_owner_bound_legacy_method() {
    let mut builder = DispatchCore::builder();
    let descriptor = builder
        .register_legacy(
            "/legacy/greet",
            Endpoint::legacy_method("greet", Arc::new(Greeter { greeting: "hi" }), Greeter::greet),
        )
        .unwrap();
    assert!(descriptor.owner().unwrap().ends_with("Greeter"));
    let core = builder.build().unwrap();
    let mut res = sink();

    let outcome = core.dispatch(&mut request(Method::DELETE, "/legacy/greet"), &mut res);

    assert!(outcome.is_success());
    assert_eq!(res.body_string(), "hi from /legacy/greet");
}
