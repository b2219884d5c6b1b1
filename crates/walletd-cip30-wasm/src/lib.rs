//! # WalletD CIP-30 WASM
//!
//! WebAssembly bindings for the WalletD CIP-30 Cardano connector.
//!
//! ## Usage in JavaScript/TypeScript
//!
//! ```javascript
//! import init, { CardanoConnector } from 'walletd-cip30-wasm';
//!
//! async function main() {
//!     await init();
//!
//!     const connector = new CardanoConnector(["Nami", "Eternl"], 1);
//!     if (connector.detectSupportedWallets() > 0) {
//!         await connector.connectWallet("Nami");
//!         const assets = await connector.getTokensAndBalance("Nami");
//!         console.log(assets);
//!     }
//! }
//! ```
//!
//! Rejected promises carry `{ code, kind, message }`; `code` is the
//! numeric error code of the core crate.

use std::future::Future;
use std::rc::Rc;

use futures::lock::Mutex;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use walletd_cip30::{CardanoError, ConnectorConfig, InjectedWalletConnector, TransferMetadata};

pub mod logging;
pub mod provider;
pub mod timer;

pub use provider::{BrowserProvider, BrowserWalletApi};
pub use timer::BrowserTimer;

// Initialize panic hook for better error messages in browser console
#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the WASM module: panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    set_panic_hook();

    logging::init_logging(tracing::Level::INFO);
}

/// Returns the WalletD CIP-30 WASM version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Serialize)]
struct ErrorPayload {
    code: u32,
    kind: String,
    message: String,
}

fn to_js_error(err: CardanoError) -> JsValue {
    let code = err.code();
    let payload = ErrorPayload {
        code: code as u32,
        kind: format!("{code:?}"),
        message: err.to_string(),
    };
    serde_wasm_bindgen::to_value(&payload).unwrap_or_else(|_| JsValue::from_str(&payload.message))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(JsValue::from)
}

// ============================================================================
// Connector
// ============================================================================

type Inner = InjectedWalletConnector<BrowserProvider>;

/// CIP-30 connector bound to `window.cardano`
#[wasm_bindgen]
pub struct CardanoConnector {
    inner: Rc<Mutex<Inner>>,
}

#[wasm_bindgen]
impl CardanoConnector {
    /// `config` is an optional `ConnectorConfig` object; its
    /// `expectedNetworkId` is overridden by the argument.
    #[wasm_bindgen(constructor)]
    pub fn new(
        supporting_wallets: Vec<String>,
        expected_network_id: u8,
        config: JsValue,
    ) -> Result<CardanoConnector, JsError> {
        let mut config: ConnectorConfig = if config.is_undefined() || config.is_null() {
            ConnectorConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(|e| JsError::new(&e.to_string()))?
        };
        config.expected_network_id = expected_network_id;

        let candidates: Vec<&str> = supporting_wallets.iter().map(String::as_str).collect();
        let inner = InjectedWalletConnector::with_timer(
            BrowserProvider::from_window(),
            &candidates,
            config,
            Rc::new(BrowserTimer),
        );
        Ok(Self {
            inner: Rc::new(Mutex::new(inner)),
        })
    }

    fn spawn<F, Fut>(&self, run: F) -> js_sys::Promise
    where
        F: FnOnce(Rc<Mutex<Inner>>) -> Fut,
        Fut: Future<Output = Result<JsValue, JsValue>> + 'static,
    {
        future_to_promise(run(self.inner.clone()))
    }

    /// Number of installed wallets among the candidates
    #[wasm_bindgen(js_name = detectSupportedWallets)]
    pub fn detect_supported_wallets(&self) -> Result<usize, JsValue> {
        let mut inner = self
            .inner
            .try_lock()
            .ok_or_else(|| JsValue::from_str("connector is busy"))?;
        inner.detect_supported_wallets().map_err(to_js_error)
    }

    /// Descriptors found by the last detection
    #[wasm_bindgen(js_name = supportedWallets)]
    pub fn supported_wallets(&self) -> Result<JsValue, JsValue> {
        let inner = self
            .inner
            .try_lock()
            .ok_or_else(|| JsValue::from_str("connector is busy"))?;
        to_js(&inner.supported_wallets())
    }

    /// Resolves to the wallet's network id
    #[wasm_bindgen(js_name = connectWallet)]
    pub fn connect_wallet(&self, wallet_name: String) -> js_sys::Promise {
        self.spawn(|inner| async move {
            let mut inner = inner.lock().await;
            let session = inner.connect_wallet(&wallet_name).await.map_err(to_js_error)?;
            Ok(JsValue::from(session.network_id()))
        })
    }

    #[wasm_bindgen(js_name = getTokensAndBalance)]
    pub fn get_tokens_and_balance(&self, wallet_identifier: String) -> js_sys::Promise {
        self.spawn(|inner| async move {
            let mut inner = inner.lock().await;
            let assets = inner
                .get_tokens_and_balance(&wallet_identifier)
                .await
                .map_err(to_js_error)?;
            to_js(&assets)
        })
    }

    /// Resolves to the first asset under the policy, or `undefined`
    #[wasm_bindgen(js_name = getBalanceByPolicy)]
    pub fn get_balance_by_policy(&self, wallet_identifier: String, policy_id: String) -> js_sys::Promise {
        self.spawn(|inner| async move {
            let mut inner = inner.lock().await;
            let asset = inner
                .get_balance_by_policy(&wallet_identifier, &policy_id)
                .await
                .map_err(to_js_error)?;
            to_js(&asset)
        })
    }

    #[wasm_bindgen(js_name = getChangeAddress)]
    pub fn get_change_address(&self) -> js_sys::Promise {
        self.spawn(|inner| async move {
            let inner = inner.lock().await;
            let address = inner.get_change_address().await.map_err(to_js_error)?;
            Ok(JsValue::from_str(&address))
        })
    }

    /// Resolves to the first used address, or `undefined`
    #[wasm_bindgen(js_name = getUsedAddresses)]
    pub fn get_used_addresses(&self) -> js_sys::Promise {
        self.spawn(|inner| async move {
            let inner = inner.lock().await;
            let address = inner.get_used_addresses().await.map_err(to_js_error)?;
            to_js(&address)
        })
    }

    /// Resolves to the transaction hash
    #[wasm_bindgen(js_name = transferTokens)]
    pub fn transfer_tokens(
        &self,
        wallet_name: String,
        recipient: String,
        policy_hex: String,
        asset_name_hex: String,
        quantity: String,
    ) -> js_sys::Promise {
        self.spawn(|inner| async move {
            let mut inner = inner.lock().await;
            let tx_hash = inner
                .transfer_tokens(&wallet_name, &recipient, &policy_hex, &asset_name_hex, &quantity)
                .await
                .map_err(to_js_error)?;
            Ok(JsValue::from_str(tx_hash.as_str()))
        })
    }

    /// `metadata` is `{ signature, registrationId, airdropWindowId }`
    #[wasm_bindgen(js_name = transferTokensWithMetadata)]
    pub fn transfer_tokens_with_metadata(
        &self,
        wallet_name: String,
        recipient: String,
        lovelace: String,
        metadata: JsValue,
    ) -> js_sys::Promise {
        self.spawn(|inner| async move {
            let metadata: TransferMetadata = serde_wasm_bindgen::from_value(metadata)
                .map_err(|e| to_js_error(CardanoError::InvalidMetadata(e.to_string())))?;
            let mut inner = inner.lock().await;
            let tx_hash = inner
                .transfer_tokens_with_metadata(&wallet_name, &recipient, &lovelace, metadata)
                .await
                .map_err(to_js_error)?;
            Ok(JsValue::from_str(tx_hash.as_str()))
        })
    }
}
