#![allow(dead_code)]

use std::sync::Arc;

use brrtdispatch::context::{BufferedResponse, RequestContext, ResponseSink};
use brrtdispatch::handler::{Endpoint, HandlerDescriptor};
use brrtdispatch::middleware::{Completion, Flow, Middleware};
use brrtdispatch::result::{DispatchResult, ViewResult};
use brrtdispatch::ParameterSpec;
use http::{Method, StatusCode};
use parking_lot::Mutex;

/// Shared, ordered log of hook calls.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Entries for one phase, e.g. `"after"` → `["after:B", "after:A"]`.
    pub fn phase(&self, phase: &str) -> Vec<String> {
        let prefix = format!("{phase}:");
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(&prefix))
            .collect()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

/// How a [`RecordingMiddleware`] behaves in each hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behavior {
    Continue,
    /// Writes `403` and stops the chain.
    Stop,
    FailPre,
    PanicPre,
    FailPost,
    FailAfter,
    /// Adds `touched_by: <label>` to view models in post.
    TouchModel,
}

pub struct RecordingMiddleware {
    pub label: &'static str,
    pub recorder: Recorder,
    pub behavior: Behavior,
}

impl RecordingMiddleware {
    pub fn new(label: &'static str, recorder: &Recorder, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            label,
            recorder: recorder.clone(),
            behavior,
        })
    }
}

impl Middleware for RecordingMiddleware {
    fn name(&self) -> &'static str {
        self.label
    }

    fn pre(
        &self,
        _ctx: &mut RequestContext,
        res: &mut dyn ResponseSink,
        _handler: &HandlerDescriptor,
    ) -> anyhow::Result<Flow> {
        self.recorder.push(format!("pre:{}", self.label));
        match self.behavior {
            Behavior::Stop => {
                res.set_status(StatusCode::FORBIDDEN);
                res.write_body(b"stopped");
                Ok(Flow::Stop)
            }
            Behavior::FailPre => anyhow::bail!("{} refused", self.label),
            Behavior::PanicPre => panic!("{} blew up", self.label),
            _ => Ok(Flow::Continue),
        }
    }

    fn post(
        &self,
        _ctx: &mut RequestContext,
        _res: &mut dyn ResponseSink,
        _handler: &HandlerDescriptor,
        result: &mut DispatchResult,
    ) -> anyhow::Result<()> {
        self.recorder.push(format!("post:{}", self.label));
        match self.behavior {
            Behavior::FailPost => anyhow::bail!("{} post failed", self.label),
            Behavior::TouchModel => {
                if let Some(view) = result.view_mut() {
                    view.insert("touched_by", self.label);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn after(
        &self,
        _ctx: &mut RequestContext,
        _res: &mut dyn ResponseSink,
        completion: &Completion<'_>,
    ) -> anyhow::Result<()> {
        self.recorder.push(format!("after:{}", self.label));
        self.recorder
            .push(format!("status:{}:{}", self.label, completion.status.as_u16()));
        if self.behavior == Behavior::FailAfter {
            anyhow::bail!("{} after failed", self.label);
        }
        Ok(())
    }
}

/// `echo(name)` → view `echo` with `message: "Hello, <name>"`.
pub fn echo_endpoint(recorder: &Recorder) -> Endpoint {
    let recorder = recorder.clone();
    Endpoint::declarative("echo", move |args| {
        recorder.push("handler:echo");
        let name: String = args.take("name")?;
        Ok(ViewResult::new("echo")
            .with("message", format!("Hello, {name}"))
            .into())
    })
    .param(ParameterSpec::named::<String>("name"))
}

pub fn request(method: Method, target: &str) -> RequestContext {
    RequestContext::new(method, target)
}

pub fn sink() -> BufferedResponse {
    BufferedResponse::new()
}

pub mod capture {
    use std::fmt;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer};
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::registry::LookupSpan;

    #[derive(Debug, Clone)]
    pub struct CapturedEvent {
        pub level: Level,
        pub message: String,
        pub fields: Vec<(String, String)>,
        /// Enclosing span names, outermost first.
        pub spans: Vec<String>,
    }

    impl CapturedEvent {
        pub fn field(&self, name: &str) -> Option<&str> {
            self.fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }
    }

    #[derive(Clone, Default)]
    pub struct CaptureLayer {
        events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    struct FieldCollector<'a>(&'a mut CapturedEvent);

    impl Visit for FieldCollector<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "message" {
                self.0.message = value.to_string();
            } else {
                self.0
                    .fields
                    .push((field.name().to_string(), value.to_string()));
            }
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                self.0.message = format!("{value:?}");
            } else {
                self.0
                    .fields
                    .push((field.name().to_string(), format!("{value:?}")));
            }
        }
    }

    impl<S> Layer<S> for CaptureLayer
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
            let spans = ctx
                .event_scope(event)
                .map(|scope| scope.from_root().map(|s| s.name().to_string()).collect())
                .unwrap_or_default();
            let mut captured = CapturedEvent {
                level: *event.metadata().level(),
                message: String::new(),
                fields: Vec::new(),
                spans,
            };
            event.record(&mut FieldCollector(&mut captured));
            self.events.lock().push(captured);
        }
    }

    impl CaptureLayer {
        pub fn events(&self) -> Vec<CapturedEvent> {
            self.events.lock().clone()
        }

        pub fn at(&self, level: Level) -> Vec<CapturedEvent> {
            self.events()
                .into_iter()
                .filter(|e| e.level == level)
                .collect()
        }
    }

    /// Run `f` with a thread-local subscriber that records every event.
    pub fn capture<R>(f: impl FnOnce() -> R) -> (R, CaptureLayer) {
        let layer = CaptureLayer::default();
        let subscriber = tracing_subscriber::registry().with(layer.clone());
        let out = tracing::subscriber::with_default(subscriber, f);
        (out, layer)
    }
}
