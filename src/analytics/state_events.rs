//! Declarative mapping from state mutations to analytics events.
//!
//! Each configured event names a dotted state path pattern (`"cart.%.quantity"`, where `%` matches
//! any single key). When a change batch touches a path with the same number of segments and equal
//! literal segments, and the new value at that path is truthy, the event fires through the
//! module's [`SetEventSignal`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::analytics::api::AnalyticsProvider;
use crate::analytics::command::{EventArgs, TrackerTarget};
use crate::analytics::constants::{DEFAULT_STATE_CHANGE_ACTION, WILDCARD_SEGMENT};
use crate::analytics::error::{invalid_argument, AnalyticsError, AnalyticsResult};
use crate::analytics::format::is_truthy;
use crate::host::{StateChange, StateReader};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Literal(String),
    Wildcard,
}

impl PathSegment {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            PathSegment::Literal(name) => name == key,
            PathSegment::Wildcard => true,
        }
    }
}

/// A compiled state path pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SignalPattern {
    segments: Vec<PathSegment>,
}

impl SignalPattern {
    pub fn parse(pattern: &str) -> AnalyticsResult<Self> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(invalid_argument("event signal path must not be empty"));
        }

        let segments = pattern
            .split('.')
            .map(|segment| match segment {
                "" => Err(invalid_argument(format!(
                    "event signal path `{pattern}` contains an empty segment"
                ))),
                WILDCARD_SEGMENT => Ok(PathSegment::Wildcard),
                literal => Ok(PathSegment::Literal(literal.to_string())),
            })
            .collect::<AnalyticsResult<Vec<_>>>()?;

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn matches<S: AsRef<str>>(&self, path: &[S]) -> bool {
        path.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(path)
                .all(|(segment, key)| segment.matches(key.as_ref()))
    }
}

impl FromStr for SignalPattern {
    type Err = AnalyticsError;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        Self::parse(pattern)
    }
}

impl fmt::Display for SignalPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Literal(name) => f.write_str(name)?,
                PathSegment::Wildcard => f.write_str(WILDCARD_SEGMENT)?,
            }
        }
        Ok(())
    }
}

/// Configuration form of a state-driven event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub signal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Value>,
    /// Additional event fields merged into every payload.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventDescriptor {
    pub fn new(signal: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            action: None,
            category: None,
            label: None,
            extra: Map::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<Value>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A named event with its compiled pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct StateEvent {
    name: String,
    pattern: SignalPattern,
    action: Option<String>,
    category: Option<String>,
    label: Option<Value>,
    extra: Map<String, Value>,
}

impl StateEvent {
    pub fn compile(name: impl Into<String>, descriptor: &EventDescriptor) -> AnalyticsResult<Self> {
        Ok(Self {
            name: name.into(),
            pattern: SignalPattern::parse(&descriptor.signal)?,
            action: descriptor.action.clone().filter(|action| !action.is_empty()),
            category: descriptor.category.clone().filter(|category| !category.is_empty()),
            label: descriptor.label.clone().filter(is_truthy),
            extra: descriptor.extra.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &SignalPattern {
        &self.pattern
    }

    /// Event properties for a change whose new value is `value`.
    pub fn payload(&self, value: &Value) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert(
            "action".to_string(),
            Value::String(
                self.action
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STATE_CHANGE_ACTION.to_string()),
            ),
        );
        payload.insert(
            "category".to_string(),
            Value::String(self.category.clone().unwrap_or_else(|| self.name.clone())),
        );
        payload.insert(
            "label".to_string(),
            self.label.clone().unwrap_or_else(|| value.clone()),
        );
        for (key, value) in &self.extra {
            payload.insert(key.clone(), value.clone());
        }
        payload
    }
}

pub type SetEventObserver = Arc<dyn Fn(&Map<String, Value>) + Send + Sync + 'static>;

/// The single dispatch point for synthetic events. Every payload is traced and shown to the
/// registered observers before it is sent as an `event` command.
pub struct SetEventSignal {
    path: String,
    provider: Arc<dyn AnalyticsProvider>,
    observers: RwLock<Vec<SetEventObserver>>,
}

impl fmt::Debug for SetEventSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetEventSignal")
            .field("path", &self.path)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

impl SetEventSignal {
    pub fn new(module_name: &str, provider: Arc<dyn AnalyticsProvider>) -> Self {
        Self {
            path: format!("{module_name}.setEvent"),
            provider,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Signal path, `<module>.setEvent`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&Map<String, Value>) + Send + Sync + 'static,
    {
        match self.observers.write() {
            Ok(mut observers) => observers.push(Arc::new(observer)),
            Err(poisoned) => {
                log::warn!("{} observer list was poisoned; recovering it", self.path);
                poisoned.into_inner().push(Arc::new(observer));
            }
        }
    }

    pub fn fire(&self, props: Map<String, Value>) -> AnalyticsResult<()> {
        log::debug!("{} fired with {}", self.path, Value::Object(props.clone()));
        let observers = match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for observer in &observers {
            observer(&props);
        }

        let args = EventArgs::from_props(props)?;
        self.provider.event(&args, &TrackerTarget::none())
    }
}

/// Matches change batches against the configured events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateEventMapper {
    events: Vec<StateEvent>,
}

impl StateEventMapper {
    pub fn new(events: Vec<StateEvent>) -> Self {
        Self { events }
    }

    pub fn from_descriptors(descriptors: &BTreeMap<String, EventDescriptor>) -> AnalyticsResult<Self> {
        let events = descriptors
            .iter()
            .map(|(name, descriptor)| StateEvent::compile(name.clone(), descriptor))
            .collect::<AnalyticsResult<Vec<_>>>()?;
        Ok(Self { events })
    }

    pub fn events(&self) -> &[StateEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn matching<'a>(&'a self, path: &'a [String]) -> impl Iterator<Item = &'a StateEvent> + 'a {
        self.events
            .iter()
            .filter(move |event| event.pattern.matches(path))
    }

    /// Handles one change batch and returns how many events fired. Matches whose new value is
    /// falsy are skipped.
    pub fn on_flush(
        &self,
        changes: &[StateChange],
        state: &dyn StateReader,
        signal: &SetEventSignal,
    ) -> AnalyticsResult<usize> {
        let mut fired = 0;
        for change in changes {
            for event in self.matching(change.path()) {
                let Some(value) = state.get(change.path()).filter(is_truthy) else {
                    continue;
                };
                signal.fire(event.payload(&value))?;
                fired += 1;
            }
        }
        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::api::{GoogleAnalytics, ProviderOptions};
    use crate::analytics::sink::TestModeSink;
    use serde_json::json;
    use std::sync::Mutex;

    fn path(dotted: &str) -> Vec<String> {
        crate::host::split_path(dotted)
    }

    fn signal() -> (SetEventSignal, TestModeSink) {
        let provider = GoogleAnalytics::with_test_capture(ProviderOptions {
            title_case: false,
            ..Default::default()
        });
        let capture = provider.test_capture().unwrap();
        (SetEventSignal::new("analytics", Arc::new(provider)), capture)
    }

    #[test]
    fn subscribe_recovers_poisoned_observer_list() {
        let (signal, capture) = signal();
        let signal = Arc::new(signal);
        let poisoner = signal.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.observers.write().unwrap();
            panic!("observer list poisoned on purpose");
        })
        .join();
        assert!(signal.observers.is_poisoned());

        let seen = Arc::new(Mutex::new(0usize));
        let counter = seen.clone();
        signal.subscribe(move |_| *counter.lock().unwrap() += 1);

        let mut props = Map::new();
        props.insert("category".into(), json!("cart"));
        props.insert("action".into(), json!("add"));
        signal.fire(props).unwrap();

        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(capture.calls_for("send").len(), 1);
    }

    #[test]
    fn wildcard_pattern_matches_same_length_paths() {
        let pattern: SignalPattern = "a.%.c".parse().unwrap();
        assert!(pattern.matches(&path("a.b.c")));
        assert!(pattern.matches(&path("a.zzz.c")));
        assert!(!pattern.matches(&path("a.b.d")));
        assert!(!pattern.matches(&path("a.b")));
        assert!(!pattern.matches(&path("a.b.c.d")));
        assert_eq!(pattern.to_string(), "a.%.c");
        assert_eq!(pattern.segments()[1], PathSegment::Wildcard);
    }

    #[test]
    fn rejects_malformed_patterns() {
        assert!(SignalPattern::parse("").unwrap_err().is_invalid_argument());
        assert!(SignalPattern::parse("a..b").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn payload_uses_fallbacks() {
        let event = StateEvent::compile("search", &EventDescriptor::new("search.query")).unwrap();
        let payload = event.payload(&json!("shoes"));
        assert_eq!(
            Value::Object(payload),
            json!({"action": "stateChange", "category": "search", "label": "shoes"})
        );
    }

    #[test]
    fn payload_prefers_configured_metadata() {
        let descriptor = EventDescriptor::new("cart.total")
            .with_action("Updated")
            .with_category("Checkout")
            .with_label("total")
            .with_field("nonInteraction", true)
            .with_field("dimension4", "web");
        let event = StateEvent::compile("cart", &descriptor).unwrap();
        let payload = event.payload(&json!(10));
        assert_eq!(
            Value::Object(payload),
            json!({
                "action": "Updated",
                "category": "Checkout",
                "label": "total",
                "nonInteraction": true,
                "dimension4": "web"
            })
        );
    }

    #[test]
    fn descriptor_reads_extra_fields_from_config() {
        let descriptor: EventDescriptor = serde_json::from_value(json!({
            "signal": "app.page",
            "category": "Navigation",
            "dimension1": "spa"
        }))
        .unwrap();
        assert_eq!(descriptor.signal, "app.page");
        assert_eq!(descriptor.category.as_deref(), Some("Navigation"));
        assert_eq!(descriptor.extra.get("dimension1"), Some(&json!("spa")));
        assert!(descriptor.action.is_none());
    }

    #[test]
    fn falsy_values_do_not_fire() {
        let (signal, capture) = signal();
        let mapper = StateEventMapper::from_descriptors(&BTreeMap::from([(
            "abc".to_string(),
            EventDescriptor::new("a.%.c"),
        )]))
        .unwrap();
        let changes = [StateChange::from_dotted("a.b.c")];

        for value in [json!(0), json!(""), json!(null), json!(false)] {
            let state = json!({"a": {"b": {"c": value}}});
            assert_eq!(mapper.on_flush(&changes, &state, &signal).unwrap(), 0);
        }
        let empty = json!({});
        assert_eq!(mapper.on_flush(&changes, &empty, &signal).unwrap(), 0);
        assert!(capture.calls().is_empty());
    }

    #[test]
    fn truthy_value_fires_once_with_value_label() {
        let (signal, capture) = signal();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observed = seen.clone();
        signal.subscribe(move |props| observed.lock().unwrap().push(props.clone()));

        let mapper = StateEventMapper::from_descriptors(&BTreeMap::from([(
            "abc".to_string(),
            EventDescriptor::new("a.%.c"),
        )]))
        .unwrap();
        let state = json!({"a": {"b": {"c": "x"}}});
        let fired = mapper
            .on_flush(&[StateChange::from_dotted("a.b.c")], &state, &signal)
            .unwrap();

        assert_eq!(fired, 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["label"], "x");

        let sends = capture.calls_for("send");
        assert_eq!(sends.len(), 1);
        assert_eq!(
            sends[0].fields(),
            Some(&json!({
                "hitType": "event",
                "eventAction": "stateChange",
                "eventCategory": "abc",
                "eventLabel": "x"
            }))
        );
    }

    #[test]
    fn overlapping_patterns_fire_independently() {
        let (signal, capture) = signal();
        let mapper = StateEventMapper::from_descriptors(&BTreeMap::from([
            ("exact".to_string(), EventDescriptor::new("user.plan")),
            ("any_user_field".to_string(), EventDescriptor::new("user.%")),
            ("other".to_string(), EventDescriptor::new("cart.%")),
        ]))
        .unwrap();
        let state = json!({"user": {"plan": "pro"}});

        let fired = mapper
            .on_flush(&[StateChange::from_dotted("user.plan")], &state, &signal)
            .unwrap();
        assert_eq!(fired, 2);
        assert_eq!(capture.calls_for("send").len(), 2);
        assert_eq!(mapper.matching(&path("user.plan")).count(), 2);
    }

    #[test]
    fn every_change_in_a_batch_is_checked() {
        let (signal, capture) = signal();
        let mapper = StateEventMapper::from_descriptors(&BTreeMap::from([(
            "tab".to_string(),
            EventDescriptor::new("tabs.%.active"),
        )]))
        .unwrap();
        let state = json!({"tabs": {"home": {"active": true}, "help": {"active": false}, "news": {"active": true}}});
        let changes = [
            StateChange::from_dotted("tabs.home.active"),
            StateChange::from_dotted("tabs.help.active"),
            StateChange::from_dotted("tabs.news.active"),
            StateChange::from_dotted("tabs.news"),
        ];

        assert_eq!(mapper.on_flush(&changes, &state, &signal).unwrap(), 2);
        assert_eq!(capture.calls().len(), 2);
    }
}
