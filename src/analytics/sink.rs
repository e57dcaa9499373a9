//! Destinations for formatted commands.
//!
//! A sink receives tracker-qualified command names (`send`, `secondary.set`, ...) followed by
//! their JSON arguments, mirroring the calling convention of the analytics.js command queue. The
//! provider picks one sink at construction time:
//!
//! - a live sink ([`CallbackSink`], [`GlobalGaSink`] on the web, or the native
//!   [`MeasurementProtocolSink`](crate::analytics::MeasurementProtocolSink)),
//! - [`TestModeSink`], which records calls instead of performing I/O,
//! - [`NoopSink`], which drops everything.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// Capability interface for the analytics collection backend. Calls are fire-and-forget.
pub trait AnalyticsSink: Send + Sync {
    fn call(&self, command: &str, args: &[Value]);
}

/// One recorded sink invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkCall {
    pub command: String,
    pub args: Vec<Value>,
}

impl SinkCall {
    /// First argument of the call, usually the field object.
    pub fn fields(&self) -> Option<&Value> {
        self.args.first()
    }
}

type SinkCallback = Arc<dyn Fn(&str, &[Value]) + Send + Sync + 'static>;

/// Live sink backed by a caller-supplied function.
#[derive(Clone)]
pub struct CallbackSink {
    callback: SinkCallback,
}

impl CallbackSink {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&str, &[Value]) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSink").finish_non_exhaustive()
    }
}

impl AnalyticsSink for CallbackSink {
    fn call(&self, command: &str, args: &[Value]) {
        (self.callback)(command, args);
    }
}

/// Records every call for later inspection. Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct TestModeSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
}

impl TestModeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls recorded for the given tracker-qualified command name.
    pub fn calls_for(&self, command: &str) -> Vec<SinkCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.command == command)
            .cloned()
            .collect()
    }

    pub fn take_calls(&self) -> Vec<SinkCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl AnalyticsSink for TestModeSink {
    fn call(&self, command: &str, args: &[Value]) {
        self.calls.lock().unwrap().push(SinkCall {
            command: command.to_string(),
            args: args.to_vec(),
        });
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl AnalyticsSink for NoopSink {
    fn call(&self, _command: &str, _args: &[Value]) {}
}

/// Stand-in used when no live backend has been supplied; every call only warns.
#[derive(Clone, Copy, Debug, Default)]
pub struct DetachedSink;

impl AnalyticsSink for DetachedSink {
    fn call(&self, command: &str, _args: &[Value]) {
        log::warn!(
            "analytics sink is not available; `{command}` was dropped. Initialize the provider with a live sink or load analytics.js first"
        );
    }
}

/// Forwards commands to the page-global `ga` function installed by analytics.js.
#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct GlobalGaSink;

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
impl AnalyticsSink for GlobalGaSink {
    fn call(&self, command: &str, args: &[Value]) {
        use js_sys::{Array, Function};
        use wasm_bindgen::{JsCast, JsValue};

        let global = js_sys::global();
        let ga = match js_sys::Reflect::get(&global, &JsValue::from_str("ga"))
            .ok()
            .and_then(|value| value.dyn_into::<Function>().ok())
        {
            Some(ga) => ga,
            None => {
                log::warn!("analytics.js must be loaded before `{command}` can be sent");
                return;
            }
        };

        let call_args = Array::new();
        call_args.push(&JsValue::from_str(command));
        for arg in args {
            let value = js_sys::JSON::parse(&arg.to_string()).unwrap_or(JsValue::UNDEFINED);
            call_args.push(&value);
        }

        if let Err(err) = ga.apply(&JsValue::NULL, &call_args) {
            log::warn!("ga(`{command}`) threw: {err:?}");
        }
    }
}

/// Live sink used when the caller does not provide one.
pub fn default_live_sink() -> Arc<dyn AnalyticsSink> {
    #[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
    {
        Arc::new(GlobalGaSink)
    }

    #[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
    {
        Arc::new(DetachedSink)
    }
}
