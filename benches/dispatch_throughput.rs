use std::hint::black_box;
use std::sync::Arc;

use brrtdispatch::context::{BufferedResponse, RequestContext};
use brrtdispatch::dispatcher::DispatchCore;
use brrtdispatch::handler::{Endpoint, HandlerReturn};
use brrtdispatch::middleware::MetricsMiddleware;
use brrtdispatch::{Bindable, ParameterSpec, ViewResult};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use http::Method;

#[derive(Debug, Default, Bindable)]
struct Query {
    limit: u32,
    offset: u32,
    sort: String,
}

fn build_core(middleware: usize) -> DispatchCore {
    let mut builder = DispatchCore::builder();
    builder
        .register(
            "/echo",
            "GET",
            Endpoint::declarative("echo", |args| {
                let name: String = args.take("name")?;
                Ok(ViewResult::new("echo")
                    .with("message", format!("Hello, {name}"))
                    .into())
            })
            .param(ParameterSpec::named::<String>("name")),
        )
        .unwrap();
    builder
        .register(
            "/pets",
            "GET",
            Endpoint::declarative("list_pets", |args| {
                let q: Query = args.take_object("query")?;
                Ok(ViewResult::new("pets")
                    .with("limit", q.limit)
                    .with("offset", q.offset)
                    .with("sort", q.sort)
                    .into())
            })
            .param(ParameterSpec::object::<Query>("query")),
        )
        .unwrap();
    builder
        .register_legacy(
            "/legacy/ping",
            Endpoint::legacy("ping", |_, res| {
                res.write_body(b"pong");
                Ok(HandlerReturn::Written)
            }),
        )
        .unwrap();
    for _ in 0..middleware {
        builder.register_middleware(Arc::new(MetricsMiddleware::new()));
    }
    builder.build().unwrap()
}

fn bench_dispatch(c: &mut Criterion) {
    let core = build_core(0);
    let requests = [
        (Method::GET, "/echo?name=World"),
        (Method::GET, "/pets?limit=10&offset=20&sort=name"),
        (Method::POST, "/legacy/ping"),
        (Method::GET, "/missing"),
    ];

    c.bench_function("dispatch_mixed", |b| {
        b.iter(|| {
            for (method, target) in &requests {
                let mut ctx = RequestContext::new(method.clone(), target);
                let mut res = BufferedResponse::new();
                black_box(core.dispatch(&mut ctx, &mut res));
            }
        })
    });
}

fn bench_middleware_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("middleware_depth");
    for depth in [0usize, 1, 4, 16] {
        let core = build_core(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &core, |b, core| {
            b.iter(|| {
                let mut ctx = RequestContext::new(Method::GET, "/echo?name=World");
                let mut res = BufferedResponse::new();
                black_box(core.dispatch(&mut ctx, &mut res));
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_middleware_depth);
criterion_main!(benches);
