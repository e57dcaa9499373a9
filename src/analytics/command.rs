//! Normalized analytics commands and the validating constructors for every hit type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::analytics::constants::{
    DIMENSION_PREFIX, METRIC_PREFIX, MODAL_PATH_PREFIX, TRANSPORT_VALUES,
};
use crate::analytics::error::{internal_error, invalid_argument, AnalyticsResult};
use crate::analytics::format::{
    format_text, remove_leading_slash, remove_trailing_slash, truthy_text,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitType {
    Pageview,
    Event,
    Timing,
    Exception,
    Set,
}

impl HitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HitType::Pageview => "pageview",
            HitType::Event => "event",
            HitType::Timing => "timing",
            HitType::Exception => "exception",
            HitType::Set => "set",
        }
    }
}

/// Names of the extra trackers a command is replayed against, besides the default tracker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackerTarget(Vec<String>);

impl TrackerTarget {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Command names for every extra tracker, e.g. `secondary.send`.
    pub(crate) fn qualified<'a>(&'a self, command: &'a str) -> impl Iterator<Item = String> + 'a {
        self.0.iter().map(move |name| format!("{name}.{command}"))
    }
}

impl<S: Into<String>> FromIterator<S> for TrackerTarget {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Arguments accepted by [`Command::event`]. Every field is loosely typed so values read from
/// application state can be validated the same way as caller-built ones.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_interaction: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Value>,
    /// Unrecognized keys; only `dimension*` and `metric*` entries are forwarded.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventArgs {
    pub fn new(category: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            category: Some(Value::String(category.into())),
            action: Some(Value::String(action.into())),
            ..Default::default()
        }
    }

    /// Builds the arguments from a loosely-typed property object such as a signal payload.
    pub fn from_props(props: Map<String, Value>) -> AnalyticsResult<Self> {
        serde_json::from_value(Value::Object(props))
            .map_err(|err| internal_error(format!("failed to read event properties: {err}")))
    }

    pub fn with_label(mut self, label: impl Into<Value>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_non_interaction(mut self, non_interaction: impl Into<Value>) -> Self {
        self.non_interaction = Some(non_interaction.into());
        self
    }

    pub fn with_transport(mut self, transport: impl Into<Value>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Value>,
}

impl TimingArgs {
    pub fn new(category: impl Into<String>, variable: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            category: Some(Value::String(category.into())),
            variable: Some(Value::String(variable.into())),
            value: Some(value.into()),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<Value>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<Value>,
}

impl ExceptionArgs {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(Value::String(description.into())),
            fatal: None,
        }
    }

    pub fn with_fatal(mut self, fatal: impl Into<Value>) -> Self {
        self.fatal = Some(fatal.into());
        self
    }
}

/// A validated analytics command. The hit type is fixed at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    hit_type: HitType,
    fields: Map<String, Value>,
}

impl Command {
    fn new(hit_type: HitType) -> Self {
        Self {
            hit_type,
            fields: Map::new(),
        }
    }

    pub fn hit_type(&self) -> HitType {
        self.hit_type
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Sink command this record is forwarded with (`set` or `send`).
    pub fn sink_command(&self) -> &'static str {
        match self.hit_type {
            HitType::Set => "set",
            _ => "send",
        }
    }

    /// Field object handed to the sink. `send` hits carry their `hitType`.
    pub fn to_field_object(&self) -> Value {
        let mut object = Map::new();
        if self.hit_type != HitType::Set {
            object.insert(
                "hitType".to_string(),
                Value::String(self.hit_type.as_str().to_string()),
            );
        }
        for (key, value) in &self.fields {
            object.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(object)
    }

    /// Raw tracker `set`. `fields` must be an object; an empty one only warns.
    pub fn set(fields: &Value) -> AnalyticsResult<Self> {
        let object = match fields {
            Value::Null => return Err(invalid_argument("`fields` is required in set()")),
            Value::Object(object) => object,
            _ => return Err(invalid_argument("Expected `fields` arg to be an object")),
        };
        if object.is_empty() {
            log::warn!("empty `fields` given to set()");
        }

        let mut command = Self::new(HitType::Set);
        command.fields = object.clone();
        Ok(command)
    }

    pub fn pageview(path: &str, title: Option<&str>) -> AnalyticsResult<Self> {
        if path.is_empty() {
            return Err(invalid_argument("path is required in pageview()"));
        }
        let path = path.trim();
        if path.is_empty() {
            return Err(invalid_argument("path cannot be an empty string in pageview()"));
        }

        let mut command = Self::new(HitType::Pageview);
        command.insert("page", path);
        if let Some(title) = title.filter(|title| !title.is_empty()) {
            command.insert("title", title);
        }
        Ok(command)
    }

    /// A pageview on `/modal/<name>`, for modals that replace a page in the user's flow.
    pub fn modalview(name: &str) -> AnalyticsResult<Self> {
        if name.is_empty() {
            return Err(invalid_argument("modal name is required in modalview()"));
        }
        let name = remove_trailing_slash(remove_leading_slash(name.trim()));
        if name.is_empty() {
            return Err(invalid_argument(
                "modal name cannot be an empty string or a single / in modalview()",
            ));
        }

        let mut command = Self::new(HitType::Pageview);
        command.insert("page", format!("{MODAL_PATH_PREFIX}{name}"));
        Ok(command)
    }

    pub fn timing(args: &TimingArgs, title_case: bool) -> AnalyticsResult<Self> {
        let category = truthy_text(args.category.as_ref());
        let variable = truthy_text(args.variable.as_ref());
        let value = args
            .value
            .as_ref()
            .filter(|value| value.as_f64().is_some_and(|n| n != 0.0));
        let (Some(category), Some(variable), Some(value)) = (category, variable, value) else {
            return Err(invalid_argument(
                "args.category, args.variable AND args.value are required in timing() AND args.value has to be a number",
            ));
        };

        let mut command = Self::new(HitType::Timing);
        command.insert("timingCategory", format_text(&category, title_case));
        command.insert("timingVar", format_text(&variable, title_case));
        command.insert("timingValue", value.clone());
        if let Some(label) = truthy_text(args.label.as_ref()) {
            command.insert("timingLabel", format_text(&label, title_case));
        }
        Ok(command)
    }

    pub fn event(args: &EventArgs, title_case: bool) -> AnalyticsResult<Self> {
        let (Some(category), Some(action)) = (
            truthy_text(args.category.as_ref()),
            truthy_text(args.action.as_ref()),
        ) else {
            return Err(invalid_argument(
                "args.category AND args.action are required in event()",
            ));
        };

        let mut command = Self::new(HitType::Event);
        command.insert("eventCategory", format_text(&category, title_case));
        command.insert("eventAction", format_text(&action, title_case));

        if let Some(label) = truthy_text(args.label.as_ref()) {
            command.insert("eventLabel", format_text(&label, title_case));
        }

        if let Some(value) = non_null(&args.value) {
            if value.is_number() {
                command.insert("eventValue", value.clone());
            } else {
                log::warn!("Expected `args.value` arg to be a Number.");
            }
        }

        if let Some(non_interaction) = non_null(&args.non_interaction) {
            if non_interaction.is_boolean() {
                command.insert("nonInteraction", non_interaction.clone());
            } else {
                log::warn!("`args.nonInteraction` must be a boolean.");
            }
        }

        if let Some(transport) = non_null(&args.transport) {
            match transport.as_str() {
                Some(name) => {
                    if !TRANSPORT_VALUES.contains(&name) {
                        log::warn!(
                            "`args.transport` must be either one of these values: `beacon`, `xhr` or `image`"
                        );
                    }
                    command.insert("transport", name);
                }
                None => log::warn!("`args.transport` must be a string."),
            }
        }

        for (key, value) in &args.extra {
            if key.starts_with(DIMENSION_PREFIX) || key.starts_with(METRIC_PREFIX) {
                command.insert(key.clone(), value.clone());
            }
        }

        Ok(command)
    }

    pub fn exception(args: &ExceptionArgs, title_case: bool) -> Self {
        let mut command = Self::new(HitType::Exception);

        if let Some(description) = truthy_text(args.description.as_ref()) {
            command.insert("exDescription", format_text(&description, title_case));
        }

        if let Some(fatal) = non_null(&args.fatal) {
            if fatal.is_boolean() {
                command.insert("exFatal", fatal.clone());
            } else {
                log::warn!("`args.fatal` must be a boolean.");
            }
        }

        command
    }
}

/// JSON `null` counts as an absent optional argument.
fn non_null(value: &Option<Value>) -> Option<&Value> {
    value.as_ref().filter(|value| !value.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pageview_trims_path_and_keeps_title() {
        let command = Command::pageview("  /about ", Some("About us")).unwrap();
        assert_eq!(command.hit_type(), HitType::Pageview);
        assert_eq!(command.field("page"), Some(&json!("/about")));
        assert_eq!(command.field("title"), Some(&json!("About us")));
        assert_eq!(
            command.to_field_object(),
            json!({"hitType": "pageview", "page": "/about", "title": "About us"})
        );
    }

    #[test]
    fn pageview_rejects_blank_paths() {
        for path in ["", "   "] {
            let err = Command::pageview(path, None).unwrap_err();
            assert!(err.is_invalid_argument());
        }
    }

    #[test]
    fn modalview_builds_modal_page() {
        let command = Command::modalview("/foo/").unwrap();
        assert_eq!(command.field("page"), Some(&json!("/modal/foo")));
        let command = Command::modalview(" add-or-edit-club ").unwrap();
        assert_eq!(command.field("page"), Some(&json!("/modal/add-or-edit-club")));
    }

    #[test]
    fn modalview_rejects_single_slash() {
        assert!(Command::modalview("/").unwrap_err().is_invalid_argument());
        assert!(Command::modalview(" ").unwrap_err().is_invalid_argument());
        assert!(Command::modalview("").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn event_requires_category_and_action() {
        let args = EventArgs {
            category: Some(json!("c")),
            ..Default::default()
        };
        assert!(Command::event(&args, true).unwrap_err().is_invalid_argument());

        let command = Command::event(&EventArgs::new("c", "a"), true).unwrap();
        assert_eq!(command.field("eventCategory"), Some(&json!("C")));
        assert_eq!(command.field("eventAction"), Some(&json!("A")));

        let command = Command::event(&EventArgs::new("c", "a"), false).unwrap();
        assert_eq!(command.field("eventCategory"), Some(&json!("c")));
    }

    #[test]
    fn event_drops_malformed_optional_fields() {
        let args = EventArgs::new("c", "a")
            .with_value("not-a-number")
            .with_non_interaction("yes")
            .with_transport(3);
        let command = Command::event(&args, true).unwrap();
        assert!(command.field("eventValue").is_none());
        assert!(command.field("nonInteraction").is_none());
        assert!(command.field("transport").is_none());
    }

    #[test]
    fn event_keeps_unknown_transport_string() {
        let args = EventArgs::new("c", "a")
            .with_value(3)
            .with_non_interaction(true)
            .with_transport("carrier-pigeon");
        let command = Command::event(&args, true).unwrap();
        assert_eq!(command.field("eventValue"), Some(&json!(3)));
        assert_eq!(command.field("nonInteraction"), Some(&json!(true)));
        assert_eq!(command.field("transport"), Some(&json!("carrier-pigeon")));
    }

    #[test]
    fn event_forwards_dimensions_and_metrics_only() {
        let args = EventArgs::new("c", "a")
            .with_field("dimension1", "x")
            .with_field("metricFoo", 1)
            .with_field("other1", "dropped");
        let command = Command::event(&args, true).unwrap();
        assert_eq!(command.field("dimension1"), Some(&json!("x")));
        assert_eq!(command.field("metricFoo"), Some(&json!(1)));
        assert!(command.field("other1").is_none());
    }

    #[test]
    fn event_args_read_from_props() {
        let props = json!({
            "category": "Cart",
            "action": "add",
            "label": 42,
            "dimension3": "blue",
            "signal": "cart.items"
        });
        let Value::Object(props) = props else {
            unreachable!()
        };
        let args = EventArgs::from_props(props).unwrap();
        let command = Command::event(&args, false).unwrap();
        assert_eq!(command.field("eventLabel"), Some(&json!("42")));
        assert_eq!(command.field("dimension3"), Some(&json!("blue")));
        assert!(command.field("signal").is_none());
    }

    #[test]
    fn timing_requires_numeric_value() {
        let missing_value = TimingArgs {
            category: Some(json!("load")),
            variable: Some(json!("bundle")),
            ..Default::default()
        };
        assert!(Command::timing(&missing_value, true).is_err());
        assert!(Command::timing(&TimingArgs::new("load", "bundle", "12"), true).is_err());

        let command = Command::timing(&TimingArgs::new("load", "bundle", 120).with_label("cold"), true).unwrap();
        assert_eq!(command.hit_type(), HitType::Timing);
        assert_eq!(command.field("timingCategory"), Some(&json!("Load")));
        assert_eq!(command.field("timingVar"), Some(&json!("Bundle")));
        assert_eq!(command.field("timingValue"), Some(&json!(120)));
        assert_eq!(command.field("timingLabel"), Some(&json!("Cold")));
    }

    #[test]
    fn exception_fields_are_optional() {
        let command = Command::exception(&ExceptionArgs::default(), true);
        assert_eq!(command.to_field_object(), json!({"hitType": "exception"}));

        let command = Command::exception(&ExceptionArgs::new("db down").with_fatal("no"), true);
        assert_eq!(command.field("exDescription"), Some(&json!("Db Down")));
        assert!(command.field("exFatal").is_none());

        let command = Command::exception(&ExceptionArgs::default().with_fatal(true), true);
        assert_eq!(command.field("exFatal"), Some(&json!(true)));
    }

    #[test]
    fn set_validates_field_object() {
        assert!(Command::set(&Value::Null).unwrap_err().is_invalid_argument());
        assert!(Command::set(&json!("userId")).unwrap_err().is_invalid_argument());

        let command = Command::set(&json!({})).unwrap();
        assert_eq!(command.sink_command(), "set");
        assert_eq!(command.to_field_object(), json!({}));

        let command = Command::set(&json!({"userId": "u-1"})).unwrap();
        assert_eq!(command.to_field_object(), json!({"userId": "u-1"}));
    }

    #[test]
    fn tracker_target_qualifies_commands() {
        let target: TrackerTarget = ["secondary", "rollup"].into_iter().collect();
        let names: Vec<String> = target.qualified("send").collect();
        assert_eq!(names, vec!["secondary.send", "rollup.send"]);
        assert!(TrackerTarget::none().is_empty());
    }
}
