//! Module configuration as supplied by the host application.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::analytics::api::{ProviderOptions, TrackerConfig};
use crate::analytics::error::{invalid_argument, AnalyticsResult};
use crate::analytics::state_events::EventDescriptor;
use crate::host::split_path;
use crate::platform::environment::Runtime;

/// Environment variable holding a JSON configuration object, or a path to a JSON file.
pub const CONFIG_ENV_VAR: &str = "GA_PROVIDER_CONFIG";

/// Either a single tracking id or a list of tracker configurations.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TrackingSetup {
    Id(String),
    Trackers(Vec<TrackerConfig>),
}

impl TrackingSetup {
    /// Tracker configurations to create. A bare id inherits the module-level `gaOptions`.
    pub fn tracker_configs(&self, ga_options: Option<&Map<String, Value>>) -> Vec<TrackerConfig> {
        match self {
            TrackingSetup::Id(id) => vec![TrackerConfig {
                tracking_id: id.clone(),
                ga_options: ga_options.cloned(),
                ..Default::default()
            }],
            TrackingSetup::Trackers(trackers) => trackers.clone(),
        }
    }
}

/// ```json
/// {
///   "tracking": "UA-000000-1",
///   "titleCase": false,
///   "gaOptions": { "userId": "session.user.id" },
///   "events": {
///     "search": { "signal": "search.query", "action": "Query" }
///   }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModuleConfig {
    #[serde(default)]
    pub tracking: Option<TrackingSetup>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_title_case")]
    pub title_case: bool,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub runtime: Option<Runtime>,
    /// Tracker creation options. `userId` is a dotted state path resolved after startup.
    #[serde(default)]
    pub ga_options: Option<Map<String, Value>>,
    #[serde(default)]
    pub events: BTreeMap<String, EventDescriptor>,
}

fn default_title_case() -> bool {
    true
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            tracking: None,
            debug: false,
            title_case: true,
            test_mode: false,
            runtime: None,
            ga_options: None,
            events: BTreeMap::new(),
        }
    }
}

impl ModuleConfig {
    pub fn new(tracking_id: impl Into<String>) -> Self {
        Self {
            tracking: Some(TrackingSetup::Id(tracking_id.into())),
            ..Default::default()
        }
    }

    pub fn with_event(mut self, name: impl Into<String>, descriptor: EventDescriptor) -> Self {
        self.events.insert(name.into(), descriptor);
        self
    }

    pub fn with_user_id_path(mut self, path: impl Into<String>) -> Self {
        self.ga_options
            .get_or_insert_with(Map::new)
            .insert("userId".to_string(), Value::String(path.into()));
        self
    }

    pub fn from_json_str(raw: &str) -> AnalyticsResult<Self> {
        serde_json::from_str(raw)
            .map_err(|err| invalid_argument(format!("invalid analytics module configuration: {err}")))
    }

    /// Loads the configuration named by `GA_PROVIDER_CONFIG`, if set.
    pub fn from_env() -> AnalyticsResult<Option<Self>> {
        match env::var(CONFIG_ENV_VAR) {
            Ok(raw) if !raw.trim().is_empty() => Self::from_source(&raw).map(Some),
            _ => Ok(None),
        }
    }

    /// Parses inline JSON, or reads the file at `raw` when it is not a JSON object.
    pub fn from_source(raw: &str) -> AnalyticsResult<Self> {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') {
            return Self::from_json_str(trimmed);
        }

        let path = Path::new(trimmed);
        let contents = fs::read_to_string(path).map_err(|err| {
            invalid_argument(format!(
                "failed to read analytics configuration from {}: {err}",
                path.display()
            ))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn provider_options(&self) -> ProviderOptions {
        ProviderOptions {
            debug: self.debug,
            title_case: self.title_case,
            test_mode: self.test_mode,
            runtime: self.runtime,
        }
    }

    /// State path of the user id, from `gaOptions.userId`.
    pub fn user_id_path(&self) -> Option<Vec<String>> {
        self.ga_options
            .as_ref()?
            .get("userId")?
            .as_str()
            .filter(|path| !path.trim().is_empty())
            .map(|path| split_path(path.trim()))
    }

    /// Tracker configurations with the `userId` path removed from the creation options; the
    /// resolved id is applied with `set` once known.
    pub fn tracker_configs(&self) -> Vec<TrackerConfig> {
        let ga_options = self.ga_options.clone().and_then(|mut options| {
            options.remove("userId");
            (!options.is_empty()).then_some(options)
        });
        self.tracking
            .as_ref()
            .map(|tracking| tracking.tracker_configs(ga_options.as_ref()))
            .unwrap_or_default()
    }
}
