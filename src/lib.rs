//! # ga-state-provider
//!
//! A Google Analytics provider for state-driven applications.
//!
//! - [`analytics`]: command validation and formatting, sinks, trackers, the declarative
//!   state-change event mapper and the host-facing [`analytics::AnalyticsModule`].
//! - [`host`]: the state primitives the module reads from (`StateReader`, `StateChange`).
//! - [`platform`]: runtime detection and background task helpers for native and wasm targets.
//!
//! Logging goes through the [`log`] facade; install any logger to see validation warnings and
//! the `debug` command mirror.

pub mod analytics;
pub mod host;
pub mod platform;
