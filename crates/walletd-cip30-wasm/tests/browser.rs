//! Run with `wasm-pack test --headless --firefox`.

use std::time::Duration;

use js_sys::{Object, Reflect};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;
use walletd_cip30::{Timer, WalletProvider};
use walletd_cip30_wasm::provider::wallet_api_error;
use walletd_cip30_wasm::{BrowserProvider, BrowserTimer};

wasm_bindgen_test_configure!(run_in_browser);

fn object(entries: &[(&str, JsValue)]) -> JsValue {
    let object = Object::new();
    for (key, value) in entries {
        Reflect::set(&object, &JsValue::from_str(key), value).unwrap();
    }
    object.into()
}

#[wasm_bindgen_test]
fn test_api_error_keeps_code_and_info() {
    let err = wallet_api_error(object(&[
        ("code", JsValue::from_f64(2.0)),
        ("info", JsValue::from_str("user declined")),
    ]));
    assert_eq!(err.code, Some(2));
    assert_eq!(err.info, "user declined");
}

#[wasm_bindgen_test]
fn test_plain_string_rejection() {
    let err = wallet_api_error(JsValue::from_str("boom"));
    assert_eq!(err.code, None);
    assert_eq!(err.info, "boom");
}

#[wasm_bindgen_test]
fn test_provider_reads_wallet_entries() {
    let nami = object(&[
        ("name", JsValue::from_str("Nami")),
        ("apiVersion", JsValue::from_str("0.1.0")),
    ]);
    let provider = BrowserProvider::new(object(&[("nami", nami)]));
    assert!(provider.is_available());
    let info = provider.wallet_info("nami").unwrap();
    assert_eq!(info["name"], "Nami");
    assert!(provider.wallet_info("eternl").is_none());
}

#[wasm_bindgen_test]
fn test_missing_namespace() {
    assert!(!BrowserProvider::new(JsValue::UNDEFINED).is_available());
}

#[wasm_bindgen_test]
async fn test_short_sleep_resolves() {
    BrowserTimer.sleep(Duration::from_millis(5)).await;
}

#[wasm_bindgen_test]
fn test_dropped_sleep_clears_its_timeout() {
    js_sys::eval(
        "const clear = window.clearTimeout; \
         window.clearTimeout = function (handle) { \
             window.__clearedTimeout = handle; \
             return clear.call(window, handle); \
         };",
    )
    .unwrap();

    drop(BrowserTimer.sleep(Duration::from_secs(60)));

    let window: JsValue = web_sys::window().unwrap().into();
    let cleared = Reflect::get(&window, &JsValue::from_str("__clearedTimeout")).unwrap();
    assert!(cleared.as_f64().is_some());
}
