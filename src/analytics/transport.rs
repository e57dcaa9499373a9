//! Native live sink that posts hits to the Universal Analytics Measurement Protocol.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use url::Url;

use crate::analytics::constants::{DEFAULT_TRACKER_NAME, DIMENSION_PREFIX, METRIC_PREFIX};
use crate::analytics::error::{internal_error, invalid_argument, network_error, AnalyticsResult};
use crate::analytics::sink::AnalyticsSink;
use crate::platform::runtime::spawn_detached;

const PROTOCOL_VERSION: &str = "1";

/// Supported endpoints for the Measurement Protocol.
#[derive(Clone, Debug)]
pub enum MeasurementProtocolEndpoint {
    /// Production collection endpoint: <https://www.google-analytics.com/collect>
    Collect,
    /// Validation endpoint: <https://www.google-analytics.com/debug/collect>
    DebugCollect,
    /// Custom endpoint (primarily for testing).
    Custom(String),
}

impl MeasurementProtocolEndpoint {
    fn as_str(&self) -> &str {
        match self {
            MeasurementProtocolEndpoint::Collect => "https://www.google-analytics.com/collect",
            MeasurementProtocolEndpoint::DebugCollect => {
                "https://www.google-analytics.com/debug/collect"
            }
            MeasurementProtocolEndpoint::Custom(url) => url,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MeasurementProtocolConfig {
    endpoint: MeasurementProtocolEndpoint,
    timeout: Duration,
    client_id: Option<String>,
}

impl Default for MeasurementProtocolConfig {
    fn default() -> Self {
        Self {
            endpoint: MeasurementProtocolEndpoint::Collect,
            timeout: Duration::from_secs(10),
            client_id: None,
        }
    }
}

impl MeasurementProtocolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: MeasurementProtocolEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fixes the anonymous client id instead of generating a random one.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

/// Posts encoded hits to the configured endpoint.
#[derive(Clone, Debug)]
pub struct MeasurementProtocolDispatcher {
    client: Client,
    endpoint: Url,
}

impl MeasurementProtocolDispatcher {
    pub fn new(config: &MeasurementProtocolConfig) -> AnalyticsResult<Self> {
        let endpoint = Url::parse(config.endpoint.as_str()).map_err(|err| {
            invalid_argument(format!(
                "invalid measurement protocol endpoint `{}`: {err}",
                config.endpoint.as_str()
            ))
        })?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| internal_error(format!("failed to build HTTP client: {err}")))?;

        Ok(Self { client, endpoint })
    }

    /// Sends one hit and waits for the response.
    pub fn send_hit(&self, params: &[(String, String)]) -> AnalyticsResult<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .form(params)
            .send()
            .map_err(|err| network_error(format!("failed to send analytics hit: {err}")))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response
            .text()
            .unwrap_or_else(|_| "<unavailable response body>".to_string());

        let message = match status {
            StatusCode::BAD_REQUEST => {
                format!("measurement protocol rejected the hit (400). Response: {body}")
            }
            _ => format!("measurement protocol request failed with status {status}. Response: {body}"),
        };

        Err(network_error(message))
    }
}

#[derive(Clone, Debug, Default)]
struct TrackerState {
    tracking_id: String,
    fields: Map<String, Value>,
}

/// Sink that keeps per-tracker state from `create`/`set` commands and turns every `send` into a
/// Measurement Protocol hit. Hits are posted on the background runtime's blocking pool; failures
/// are only logged.
#[derive(Debug)]
pub struct MeasurementProtocolSink {
    dispatcher: MeasurementProtocolDispatcher,
    client_id: String,
    trackers: Mutex<BTreeMap<String, TrackerState>>,
}

impl MeasurementProtocolSink {
    pub fn new(config: MeasurementProtocolConfig) -> AnalyticsResult<Self> {
        let dispatcher = MeasurementProtocolDispatcher::new(&config)?;
        let client_id = config.client_id.unwrap_or_else(generate_client_id);
        Ok(Self {
            dispatcher,
            client_id,
            trackers: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn dispatcher(&self) -> &MeasurementProtocolDispatcher {
        &self.dispatcher
    }

    fn create(&self, tracker: &str, args: &[Value]) {
        let Some(tracking_id) = args.first().and_then(Value::as_str) else {
            log::warn!("`create` requires a tracking id; ignoring");
            return;
        };
        let mut fields = args
            .get(1)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let name = fields
            .remove("name")
            .and_then(|name| name.as_str().map(str::to_string))
            .unwrap_or_else(|| tracker.to_string());

        let mut trackers = self.trackers.lock().unwrap();
        if let Some(existing) = trackers.get(&name) {
            log::warn!(
                "tracker `{name}` already exists for {}; ignoring `create` for {tracking_id}",
                existing.tracking_id
            );
            return;
        }
        trackers.insert(
            name,
            TrackerState {
                tracking_id: tracking_id.to_string(),
                fields,
            },
        );
    }

    fn set(&self, tracker: &str, args: &[Value]) {
        let mut trackers = self.trackers.lock().unwrap();
        let Some(state) = trackers.get_mut(tracker) else {
            log::warn!("tracker `{tracker}` has not been created; ignoring `set`");
            return;
        };
        match (args.first(), args.get(1)) {
            (Some(Value::Object(fields)), _) => {
                for (key, value) in fields {
                    state.fields.insert(key.clone(), value.clone());
                }
            }
            (Some(Value::String(key)), Some(value)) => {
                state.fields.insert(key.clone(), value.clone());
            }
            _ => log::warn!("unsupported `set` arguments for tracker `{tracker}`"),
        }
    }

    /// Encodes the protocol parameters a `send` on `tracker` would post.
    pub(crate) fn hit_params(&self, tracker: &str, args: &[Value]) -> Option<Vec<(String, String)>> {
        let hit = match (args.first(), args.get(1)) {
            (Some(Value::Object(fields)), _) => fields.clone(),
            (Some(Value::String(hit_type)), page) => {
                let mut fields = Map::new();
                fields.insert("hitType".to_string(), Value::String(hit_type.clone()));
                if let Some(page) = page {
                    fields.insert("page".to_string(), page.clone());
                }
                fields
            }
            _ => {
                log::warn!("unsupported `send` arguments for tracker `{tracker}`");
                return None;
            }
        };

        let trackers = self.trackers.lock().unwrap();
        let Some(state) = trackers.get(tracker) else {
            log::warn!("tracker `{tracker}` has not been created; ignoring `send`");
            return None;
        };

        let mut fields = state.fields.clone();
        fields.extend(hit);
        Some(protocol_params(&state.tracking_id, &self.client_id, &fields))
    }
}

impl AnalyticsSink for MeasurementProtocolSink {
    fn call(&self, command: &str, args: &[Value]) {
        let (tracker, name) = command
            .split_once('.')
            .unwrap_or((DEFAULT_TRACKER_NAME, command));

        match name {
            "create" => self.create(tracker, args),
            "set" => self.set(tracker, args),
            "send" => {
                let Some(params) = self.hit_params(tracker, args) else {
                    return;
                };
                let dispatcher = self.dispatcher.clone();
                spawn_detached(async move {
                    let posted =
                        tokio::task::spawn_blocking(move || dispatcher.send_hit(&params)).await;
                    match posted {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => log::warn!("{err}"),
                        Err(err) => log::warn!("measurement protocol hit task failed: {err}"),
                    }
                });
            }
            other => log::debug!("measurement protocol sink ignores `{other}`"),
        }
    }
}

/// Maps command fields onto Measurement Protocol parameter names. Unknown fields are skipped.
pub fn protocol_params(
    tracking_id: &str,
    client_id: &str,
    fields: &Map<String, Value>,
) -> Vec<(String, String)> {
    let client_id = fields
        .get("clientId")
        .and_then(Value::as_str)
        .unwrap_or(client_id);

    let mut params = vec![
        ("v".to_string(), PROTOCOL_VERSION.to_string()),
        ("tid".to_string(), tracking_id.to_string()),
        ("cid".to_string(), client_id.to_string()),
    ];
    for (key, value) in fields {
        if let Some(name) = protocol_param_name(key) {
            params.push((name, protocol_value(value)));
        }
    }
    params
}

fn protocol_param_name(field: &str) -> Option<String> {
    let name = match field {
        "hitType" => "t",
        "page" => "dp",
        "title" => "dt",
        "location" => "dl",
        "eventCategory" => "ec",
        "eventAction" => "ea",
        "eventLabel" => "el",
        "eventValue" => "ev",
        "nonInteraction" => "ni",
        "timingCategory" => "utc",
        "timingVar" => "utv",
        "timingValue" => "utt",
        "timingLabel" => "utl",
        "exDescription" => "exd",
        "exFatal" => "exf",
        "userId" => "uid",
        other => return indexed_param(other),
    };
    Some(name.to_string())
}

fn indexed_param(field: &str) -> Option<String> {
    let (prefix, index) = if let Some(index) = field.strip_prefix(DIMENSION_PREFIX) {
        ("cd", index)
    } else if let Some(index) = field.strip_prefix(METRIC_PREFIX) {
        ("cm", index)
    } else {
        return None;
    };
    let index: u32 = index.parse().ok()?;
    Some(format!("{prefix}{index}"))
}

fn protocol_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        other => other.to_string(),
    }
}

fn generate_client_id() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(32)
        .collect()
}
