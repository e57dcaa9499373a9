use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::analytics::command::{Command, EventArgs, ExceptionArgs, TimingArgs, TrackerTarget};
use crate::analytics::constants::AUTO_COOKIE_DOMAIN;
use crate::analytics::error::{invalid_argument, AnalyticsResult};
use crate::analytics::sink::{default_live_sink, AnalyticsSink, TestModeSink};
use crate::platform::environment::{detect_runtime, Runtime};

/// The full analytics command surface.
///
/// Every operation validates its arguments before anything is forwarded, so a failed call never
/// reaches a sink. Successful calls forward once to the default tracker and once per extra
/// tracker in the [`TrackerTarget`].
pub trait AnalyticsProvider: Send + Sync + fmt::Debug {
    /// Forwards an arbitrary command to the sink without formatting.
    fn command(&self, command: &str, args: &[Value]) -> AnalyticsResult<()>;

    fn set(&self, fields: &Value, trackers: &TrackerTarget) -> AnalyticsResult<()>;

    /// Sends `fields` as-is. No validation is applied.
    fn send(&self, fields: &Value, trackers: &TrackerTarget) -> AnalyticsResult<()>;

    fn pageview(&self, path: &str, trackers: &TrackerTarget, title: Option<&str>) -> AnalyticsResult<()>;

    fn modalview(&self, name: &str, trackers: &TrackerTarget) -> AnalyticsResult<()>;

    fn timing(&self, args: &TimingArgs, trackers: &TrackerTarget) -> AnalyticsResult<()>;

    fn event(&self, args: &EventArgs, trackers: &TrackerTarget) -> AnalyticsResult<()>;

    fn exception(&self, args: &ExceptionArgs, trackers: &TrackerTarget) -> AnalyticsResult<()>;

    /// The capture sink when the provider runs in test mode.
    fn test_capture(&self) -> Option<TestModeSink> {
        None
    }
}

/// Formatting and diagnostics options, fixed when the provider is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderOptions {
    /// Mirrors every dispatched command to the log at `info` level.
    pub debug: bool,
    /// Title-cases category, action, label and timing text.
    pub title_case: bool,
    /// Routes every call to a [`TestModeSink`] instead of the live sink.
    pub test_mode: bool,
    /// Overrides runtime detection.
    pub runtime: Option<Runtime>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            debug: false,
            title_case: true,
            test_mode: false,
            runtime: None,
        }
    }
}

impl ProviderOptions {
    pub fn test_mode() -> Self {
        Self {
            test_mode: true,
            ..Default::default()
        }
    }

    /// Folds per-tracker overrides in: any tracker may turn debugging on or title casing off.
    fn merge_tracker(&mut self, tracker: &TrackerConfig) {
        if tracker.debug == Some(true) {
            self.debug = true;
        }
        if tracker.title_case == Some(false) {
            self.title_case = false;
        }
    }
}

/// One tracker identity to create at initialization.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerConfig {
    #[serde(default)]
    pub tracking_id: String,
    /// Passed verbatim as the tracker creation options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ga_options: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_case: Option<bool>,
}

impl TrackerConfig {
    pub fn new(tracking_id: impl Into<String>) -> Self {
        Self {
            tracking_id: tracking_id.into(),
            ..Default::default()
        }
    }

    pub fn with_ga_options(mut self, ga_options: Map<String, Value>) -> Self {
        self.ga_options = Some(ga_options);
        self
    }

    fn validate(&self) -> AnalyticsResult<()> {
        if self.tracking_id.trim().is_empty() {
            return Err(invalid_argument("tracking_id is required in initialize()"));
        }
        Ok(())
    }

    fn create_args(&self) -> [Value; 2] {
        let options = match &self.ga_options {
            Some(options) => Value::Object(options.clone()),
            None => Value::String(AUTO_COOKIE_DOMAIN.to_string()),
        };
        [Value::String(self.tracking_id.clone()), options]
    }
}

/// Validating provider that formats commands and forwards them to a sink.
#[derive(Clone)]
pub struct GoogleAnalytics {
    options: ProviderOptions,
    sink: Arc<dyn AnalyticsSink>,
    capture: Option<TestModeSink>,
}

impl fmt::Debug for GoogleAnalytics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleAnalytics")
            .field("options", &self.options)
            .field("test_mode", &self.capture.is_some())
            .finish()
    }
}

impl GoogleAnalytics {
    /// Builds a provider on top of `sink`. When `options.test_mode` is set the sink is replaced
    /// by a fresh [`TestModeSink`].
    pub fn new(options: ProviderOptions, sink: Arc<dyn AnalyticsSink>) -> Self {
        if options.test_mode {
            return Self::with_test_capture(options);
        }
        Self {
            options,
            sink,
            capture: None,
        }
    }

    pub fn with_test_capture(options: ProviderOptions) -> Self {
        let capture = TestModeSink::new();
        Self {
            options: ProviderOptions {
                test_mode: true,
                ..options
            },
            sink: Arc::new(capture.clone()),
            capture: Some(capture),
        }
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// Issues `create` for every tracker. All configs are validated before any is created.
    pub fn initialize(&self, trackers: &[TrackerConfig]) -> AnalyticsResult<()> {
        if trackers.is_empty() {
            return Err(invalid_argument("tracking_id is required in initialize()"));
        }
        for tracker in trackers {
            tracker.validate()?;
        }
        for tracker in trackers {
            let args = tracker.create_args();
            self.sink.call("create", &args);
            self.debug_log("create", &args, &TrackerTarget::none());
        }
        Ok(())
    }

    fn forward(&self, command: &str, args: &[Value], trackers: &TrackerTarget) {
        self.sink.call(command, args);
        for qualified in trackers.qualified(command) {
            self.sink.call(&qualified, args);
        }
        self.debug_log(command, args, trackers);
    }

    fn dispatch(&self, command: Command, trackers: &TrackerTarget) {
        self.forward(command.sink_command(), &[command.to_field_object()], trackers);
    }

    fn debug_log(&self, command: &str, args: &[Value], trackers: &TrackerTarget) {
        if !self.options.debug {
            return;
        }
        log::info!("called ga('{command}', ...);");
        log::info!("with arguments: {}", Value::Array(args.to_vec()));
        if !trackers.is_empty() {
            log::info!("with trackers: {:?}", trackers.names());
        }
    }
}

impl AnalyticsProvider for GoogleAnalytics {
    fn command(&self, command: &str, args: &[Value]) -> AnalyticsResult<()> {
        if command.trim().is_empty() {
            return Err(invalid_argument("ga command must be a non-empty string"));
        }
        self.forward(command, args, &TrackerTarget::none());
        Ok(())
    }

    fn set(&self, fields: &Value, trackers: &TrackerTarget) -> AnalyticsResult<()> {
        let command = Command::set(fields)?;
        self.dispatch(command, trackers);
        Ok(())
    }

    fn send(&self, fields: &Value, trackers: &TrackerTarget) -> AnalyticsResult<()> {
        self.forward("send", std::slice::from_ref(fields), trackers);
        Ok(())
    }

    fn pageview(&self, path: &str, trackers: &TrackerTarget, title: Option<&str>) -> AnalyticsResult<()> {
        let command = Command::pageview(path, title)?;
        self.dispatch(command, trackers);
        Ok(())
    }

    fn modalview(&self, name: &str, trackers: &TrackerTarget) -> AnalyticsResult<()> {
        let command = Command::modalview(name)?;
        self.dispatch(command, trackers);
        Ok(())
    }

    fn timing(&self, args: &TimingArgs, trackers: &TrackerTarget) -> AnalyticsResult<()> {
        let command = Command::timing(args, self.options.title_case)?;
        self.dispatch(command, trackers);
        Ok(())
    }

    fn event(&self, args: &EventArgs, trackers: &TrackerTarget) -> AnalyticsResult<()> {
        let command = Command::event(args, self.options.title_case)?;
        self.dispatch(command, trackers);
        Ok(())
    }

    fn exception(&self, args: &ExceptionArgs, trackers: &TrackerTarget) -> AnalyticsResult<()> {
        let command = Command::exception(args, self.options.title_case);
        self.dispatch(command, trackers);
        Ok(())
    }

    fn test_capture(&self) -> Option<TestModeSink> {
        self.capture.clone()
    }
}

/// Provider used outside an interactive runtime: every operation returns immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAnalytics;

impl AnalyticsProvider for NoopAnalytics {
    fn command(&self, _command: &str, _args: &[Value]) -> AnalyticsResult<()> {
        Ok(())
    }

    fn set(&self, _fields: &Value, _trackers: &TrackerTarget) -> AnalyticsResult<()> {
        Ok(())
    }

    fn send(&self, _fields: &Value, _trackers: &TrackerTarget) -> AnalyticsResult<()> {
        Ok(())
    }

    fn pageview(&self, _path: &str, _trackers: &TrackerTarget, _title: Option<&str>) -> AnalyticsResult<()> {
        Ok(())
    }

    fn modalview(&self, _name: &str, _trackers: &TrackerTarget) -> AnalyticsResult<()> {
        Ok(())
    }

    fn timing(&self, _args: &TimingArgs, _trackers: &TrackerTarget) -> AnalyticsResult<()> {
        Ok(())
    }

    fn event(&self, _args: &EventArgs, _trackers: &TrackerTarget) -> AnalyticsResult<()> {
        Ok(())
    }

    fn exception(&self, _args: &ExceptionArgs, _trackers: &TrackerTarget) -> AnalyticsResult<()> {
        Ok(())
    }
}

/// Selects and initializes a provider.
///
/// Test mode always yields a capturing [`GoogleAnalytics`]. Otherwise a headless runtime yields
/// [`NoopAnalytics`] without touching any sink, and an interactive one creates every tracker on
/// `live_sink` (or the platform default when `None`).
pub fn initialize_provider(
    trackers: &[TrackerConfig],
    options: ProviderOptions,
    live_sink: Option<Arc<dyn AnalyticsSink>>,
) -> AnalyticsResult<Arc<dyn AnalyticsProvider>> {
    let runtime = options.runtime.unwrap_or_else(detect_runtime);
    if !options.test_mode && !runtime.is_interactive() {
        return Ok(Arc::new(NoopAnalytics));
    }

    let mut options = options;
    for tracker in trackers {
        options.merge_tracker(tracker);
    }

    let provider = GoogleAnalytics::new(options, live_sink.unwrap_or_else(default_live_sink));
    provider.initialize(trackers)?;
    Ok(Arc::new(provider))
}
