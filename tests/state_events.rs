#![cfg(not(target_arch = "wasm32"))]

use std::sync::{Arc, RwLock};

use ga_state_provider::analytics::{AnalyticsModule, EventDescriptor, ModuleConfig, SignalPattern};
use ga_state_provider::host::{StateChange, StateReader};
use serde_json::{json, Value};

fn module(config_json: &str) -> AnalyticsModule {
    let config = ModuleConfig::from_json_str(config_json).expect("valid config");
    AnalyticsModule::new("analytics", config, None).expect("module")
}

fn sent_events(module: &AnalyticsModule) -> Vec<Value> {
    module
        .test_capture()
        .expect("test mode")
        .calls_for("send")
        .iter()
        .filter_map(|call| call.fields().cloned())
        .collect()
}

#[test]
fn wildcard_pattern_matches_one_segment_per_marker() {
    let pattern: SignalPattern = "a.%.c".parse().unwrap();
    assert!(pattern.matches(&["a", "b", "c"]));
    assert!(!pattern.matches(&["a", "b", "d"]));
    assert!(!pattern.matches(&["a", "b"]));
}

#[test]
fn falsy_values_never_fire() {
    let module = module(
        r#"{"tracking": "UA-1", "testMode": true, "events": {"abc": {"signal": "a.%.c"}}}"#,
    );
    for value in [json!(0), json!(""), Value::Null, json!(false)] {
        let state = json!({"a": {"b": {"c": value}}});
        let fired = module.on_flush(&[StateChange::from_dotted("a.b.c")], &state).unwrap();
        assert_eq!(fired, 0);
    }
    assert!(sent_events(&module).is_empty());
}

#[test]
fn truthy_value_becomes_the_label() {
    let module = module(
        r#"{"tracking": "UA-1", "testMode": true, "titleCase": false,
            "events": {"abc": {"signal": "a.%.c", "dimension3": "web"}}}"#,
    );
    let state = json!({"a": {"b": {"c": "x"}}});

    let fired = module.on_flush(&[StateChange::from_dotted("a.b.c")], &state).unwrap();

    assert_eq!(fired, 1);
    assert_eq!(
        sent_events(&module),
        vec![json!({
            "hitType": "event",
            "eventCategory": "abc",
            "eventAction": "stateChange",
            "eventLabel": "x",
            "dimension3": "web"
        })]
    );
}

#[test]
fn overlapping_patterns_fire_independently() {
    let config = ModuleConfig {
        test_mode: true,
        ..ModuleConfig::new("UA-1")
    }
    .with_event("exact", EventDescriptor::new("cart.items.count").with_action("Count"))
    .with_event("any", EventDescriptor::new("cart.%.count").with_label("changed"));
    let module = AnalyticsModule::new("shop", config, None).unwrap();
    let state = RwLock::new(json!({"cart": {"items": {"count": 3}}}));

    let fired = module
        .on_flush(&[StateChange::new(["cart", "items", "count"])], &state)
        .unwrap();

    assert_eq!(fired, 2);
    let events = sent_events(&module);
    assert_eq!(events.len(), 2);
    assert!(events.iter().any(|event| event["eventLabel"] == "Changed"));
    assert!(events.iter().any(|event| event["eventAction"] == "Count"));
}

#[tokio::test(flavor = "current_thread")]
async fn user_id_is_applied_after_model_initialization() {
    let module = module(
        r#"{"tracking": "UA-1", "testMode": true, "gaOptions": {"userId": "session.uid", "sampleRate": 50}}"#,
    );
    let capture = module.test_capture().unwrap();
    assert_eq!(
        capture.calls_for("create")[0].args,
        vec![json!("UA-1"), json!({"sampleRate": 50})]
    );

    let state: Arc<dyn StateReader> = Arc::new(json!({"session": {"uid": "user-7"}}));
    module.on_model_initialized(state);

    assert_eq!(module.resolved_user_id().await.as_deref(), Some("user-7"));
    assert_eq!(capture.calls_for("set")[0].fields(), Some(&json!({"userId": "user-7"})));
}
