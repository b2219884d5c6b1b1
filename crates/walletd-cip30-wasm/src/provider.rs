//! `window.cardano` bindings.
//!
//! Wallet entries are plain JS objects, so everything goes through
//! `Reflect` and `Function::apply`; promises are awaited with `JsFuture`.

use async_trait::async_trait;
use js_sys::{Array, Function, Promise, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use walletd_cip30::{Cip30Api, WalletApiError, WalletApiResult, WalletProvider};

/// Fields copied out of a wallet entry into its descriptor
const INFO_FIELDS: [&str; 3] = ["name", "icon", "apiVersion"];

fn property(target: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

/// Converts a rejection into the CIP-30 `{code, info}` shape
pub fn wallet_api_error(value: JsValue) -> WalletApiError {
    let code = property(&value, "code")
        .and_then(|code| code.as_f64())
        .map(|code| code as i32);
    let info = property(&value, "info")
        .and_then(|info| info.as_string())
        .or_else(|| value.as_string())
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|err| String::from(err.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"));
    WalletApiError::new(code, info)
}

async fn call(target: &JsValue, method: &str, args: &Array) -> WalletApiResult<JsValue> {
    let function: Function = property(target, method)
        .and_then(|f| f.dyn_into().ok())
        .ok_or_else(|| WalletApiError::new(None, format!("{method} is not a function")))?;
    let result = function.apply(target, args).map_err(wallet_api_error)?;
    JsFuture::from(Promise::resolve(&result))
        .await
        .map_err(wallet_api_error)
}

fn expect_string(method: &str, value: JsValue) -> WalletApiResult<String> {
    value
        .as_string()
        .ok_or_else(|| WalletApiError::new(None, format!("{method} did not return a string")))
}

fn string_list(value: JsValue) -> Vec<String> {
    if value.is_undefined() || value.is_null() {
        return Vec::new();
    }
    Array::from(&value)
        .iter()
        .filter_map(|item| item.as_string())
        .collect()
}

/// The injected `cardano` namespace
#[derive(Debug, Clone)]
pub struct BrowserProvider {
    cardano: Option<JsValue>,
}

impl BrowserProvider {
    /// Reads `window.cardano`
    pub fn from_window() -> Self {
        let cardano = web_sys::window().and_then(|window| property(&window, "cardano"));
        Self { cardano }
    }

    /// Wraps an explicit namespace object
    pub fn new(cardano: JsValue) -> Self {
        let cardano = (!cardano.is_undefined() && !cardano.is_null()).then_some(cardano);
        Self { cardano }
    }

    fn entry(&self, key: &str) -> Option<JsValue> {
        self.cardano.as_ref().and_then(|cardano| property(cardano, key))
    }
}

#[async_trait(?Send)]
impl WalletProvider for BrowserProvider {
    fn is_available(&self) -> bool {
        self.cardano.is_some()
    }

    fn wallet_info(&self, key: &str) -> Option<serde_json::Value> {
        let entry = self.entry(key)?;
        let mut info = serde_json::Map::new();
        for field in INFO_FIELDS {
            if let Some(value) = property(&entry, field).and_then(|v| v.as_string()) {
                info.insert(field.to_string(), serde_json::Value::String(value));
            }
        }
        Some(serde_json::Value::Object(info))
    }

    async fn enable(&self, key: &str) -> WalletApiResult<Box<dyn Cip30Api>> {
        let entry = self
            .entry(key)
            .ok_or_else(|| WalletApiError::new(None, format!("wallet {key} is not injected")))?;
        let handle = call(&entry, "enable", &Array::new()).await?;
        Ok(Box::new(BrowserWalletApi { handle }))
    }
}

/// The handle `enable()` resolved to
#[derive(Debug, Clone)]
pub struct BrowserWalletApi {
    handle: JsValue,
}

impl BrowserWalletApi {
    async fn call0(&self, method: &str) -> WalletApiResult<JsValue> {
        call(&self.handle, method, &Array::new()).await
    }
}

#[async_trait(?Send)]
impl Cip30Api for BrowserWalletApi {
    async fn get_network_id(&self) -> WalletApiResult<u8> {
        let value = self.call0("getNetworkId").await?;
        value
            .as_f64()
            .filter(|id| (0.0..=15.0).contains(id))
            .map(|id| id as u8)
            .ok_or_else(|| WalletApiError::new(None, "getNetworkId did not return a network id"))
    }

    async fn get_balance(&self) -> WalletApiResult<String> {
        expect_string("getBalance", self.call0("getBalance").await?)
    }

    async fn get_utxos(&self) -> WalletApiResult<Vec<String>> {
        Ok(string_list(self.call0("getUtxos").await?))
    }

    async fn get_change_address(&self) -> WalletApiResult<String> {
        expect_string("getChangeAddress", self.call0("getChangeAddress").await?)
    }

    async fn get_used_addresses(&self) -> WalletApiResult<Vec<String>> {
        Ok(string_list(self.call0("getUsedAddresses").await?))
    }

    async fn get_unused_addresses(&self) -> WalletApiResult<Vec<String>> {
        Ok(string_list(self.call0("getUnusedAddresses").await?))
    }

    async fn get_reward_addresses(&self) -> WalletApiResult<Vec<String>> {
        Ok(string_list(self.call0("getRewardAddresses").await?))
    }

    async fn sign_tx(&self, tx_hex: &str, partial_sign: bool) -> WalletApiResult<String> {
        let args = Array::of2(&JsValue::from_str(tx_hex), &JsValue::from_bool(partial_sign));
        expect_string("signTx", call(&self.handle, "signTx", &args).await?)
    }

    async fn submit_tx(&self, tx_hex: &str) -> WalletApiResult<String> {
        let args = Array::of1(&JsValue::from_str(tx_hex));
        expect_string("submitTx", call(&self.handle, "submitTx", &args).await?)
    }
}
