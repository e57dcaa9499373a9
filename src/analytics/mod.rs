//! # Google Analytics provider
//!
//! Validates and formats analytics commands (`pageview`, `modalview`, `event`, `timing`,
//! `exception`, `set`, `send`) and forwards them to a tracker command sink, once for the default
//! tracker and once per named tracker.
//!
//! It also maps state changes to synthetic events: each configured event names a dotted path
//! pattern (`%` matches any single segment), and every truthy value written to a matching path
//! fires one `event` through the module's `setEvent` dispatch point.
//!
//! ## Features
//!
//! - Argument validation with [`AnalyticsErrorCode::InvalidArgument`] for fatal problems and
//!   logged warnings for malformed optional fields
//! - Title-casing and potential email redaction of category, action and label text
//! - Multiple trackers, debug mirroring and a capturing test mode
//! - Live sinks: caller callback, Measurement Protocol (native) or the global `ga` function
//!   (`wasm-web` feature)
//! - A no-op provider for headless runtimes
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use ga_state_provider::analytics::*;
//! use ga_state_provider::host::StateChange;
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ModuleConfig::from_json_str(
//!         r#"{
//!             "tracking": "UA-000000-1",
//!             "testMode": true,
//!             "events": { "search": { "signal": "search.query", "action": "Query" } }
//!         }"#,
//!     )?;
//!     let module = AnalyticsModule::new("analytics", config, None)?;
//!
//!     module.provider().pageview("/home", &TrackerTarget::none(), Some("Home"))?;
//!
//!     let state = json!({ "search": { "query": "rust" } });
//!     let fired = module.on_flush(&[StateChange::from_dotted("search.query")], &state)?;
//!     assert_eq!(fired, 1);
//!
//!     let capture = module.test_capture().expect("test mode captures calls");
//!     println!("captured {} commands", capture.calls().len());
//!     Ok(())
//! }
//! ```

mod api;
mod command;
mod config;
pub mod constants;
pub mod error;
mod format;
mod module;
mod sink;
mod state_events;
#[cfg(not(target_arch = "wasm32"))]
mod transport;

pub use api::{
    initialize_provider, AnalyticsProvider, GoogleAnalytics, NoopAnalytics, ProviderOptions,
    TrackerConfig,
};
pub use command::{Command, EventArgs, ExceptionArgs, HitType, TimingArgs, TrackerTarget};
pub use config::{ModuleConfig, TrackingSetup, CONFIG_ENV_VAR};
pub use error::{AnalyticsError, AnalyticsErrorCode, AnalyticsResult};
pub use format::{format_text, is_truthy, to_title_case};
pub use module::AnalyticsModule;
#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
pub use sink::GlobalGaSink;
pub use sink::{
    default_live_sink, AnalyticsSink, CallbackSink, DetachedSink, NoopSink, SinkCall, TestModeSink,
};
pub use state_events::{
    EventDescriptor, PathSegment, SetEventObserver, SetEventSignal, SignalPattern, StateEvent,
    StateEventMapper,
};
#[cfg(not(target_arch = "wasm32"))]
pub use transport::{
    protocol_params, MeasurementProtocolConfig, MeasurementProtocolDispatcher,
    MeasurementProtocolEndpoint, MeasurementProtocolSink,
};
