#![cfg(all(target_arch = "wasm32", feature = "wasm-web"))]

use ga_state_provider::analytics::{
    initialize_provider, AnalyticsSink, GlobalGaSink, ProviderOptions, TrackerConfig, TrackerTarget,
};
use ga_state_provider::platform::environment::Runtime;
use js_sys::{Array, Function, Reflect};
use serde_json::json;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn install_recording_ga() -> Array {
    let calls = Array::new();
    let global = js_sys::global();
    Reflect::set(&global, &JsValue::from_str("__gaCalls"), &calls).unwrap();
    let ga = Function::new_no_args("globalThis.__gaCalls.push(Array.from(arguments));");
    Reflect::set(&global, &JsValue::from_str("ga"), &ga).unwrap();
    calls
}

#[wasm_bindgen_test]
fn global_sink_forwards_to_window_ga() {
    let calls = install_recording_ga();

    GlobalGaSink.call("send", &[json!({"hitType": "pageview", "page": "/home"})]);

    assert_eq!(calls.length(), 1);
    let call = Array::from(&calls.get(0));
    assert_eq!(call.get(0).as_string().as_deref(), Some("send"));
    let page = Reflect::get(&call.get(1), &JsValue::from_str("page")).unwrap();
    assert_eq!(page.as_string().as_deref(), Some("/home"));
}

#[wasm_bindgen_test]
fn provider_uses_global_ga_by_default() {
    let calls = install_recording_ga();
    let options = ProviderOptions {
        runtime: Some(Runtime::Interactive),
        ..Default::default()
    };

    let provider = initialize_provider(&[TrackerConfig::new("UA-WASM")], options, None).unwrap();
    provider
        .pageview("/wasm", &TrackerTarget::new(["second"]), None)
        .unwrap();

    let commands: Vec<String> = calls
        .iter()
        .filter_map(|call| Array::from(&call).get(0).as_string())
        .collect();
    assert_eq!(commands, vec!["create", "send", "second.send"]);
}
