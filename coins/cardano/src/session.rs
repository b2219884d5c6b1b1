//! Wallet session: the only channel to an injected CIP-30 wallet.
//!
//! [`WalletProvider`] stands for the `window.cardano` object and
//! [`Cip30Api`] for the handle `enable()` resolves to. Both traits speak
//! hex strings exactly like the extension does; [`WalletSession`] wraps a
//! handle with typed proxies, deadlines and error context.
//!
//! Proxies never retry. A declined signature or a rejected submission is
//! surfaced as [`CardanoError::WalletOperation`] and the caller decides.

use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use crate::address::CardanoAddress;
use crate::config::network_name;
use crate::error::{CardanoError, Result};
use crate::ledger::{LedgerObject, TransactionUnspentOutput, TransactionWitnessSet, Value};
use crate::timeout::{with_timeout, TimeoutConfig, Timer};

/// Error object a wallet rejects a call with (`{code, info}`)
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{info}")]
pub struct WalletApiError {
    pub code: Option<i32>,
    pub info: String,
}

impl WalletApiError {
    pub fn new(code: Option<i32>, info: impl Into<String>) -> Self {
        Self {
            code,
            info: info.into(),
        }
    }
}

pub type WalletApiResult<T> = std::result::Result<T, WalletApiError>;

/// The enabled wallet handle. Payloads are hex-encoded CBOR.
#[async_trait(?Send)]
pub trait Cip30Api {
    async fn get_network_id(&self) -> WalletApiResult<u8>;

    async fn get_balance(&self) -> WalletApiResult<String>;

    async fn get_utxos(&self) -> WalletApiResult<Vec<String>>;

    async fn get_change_address(&self) -> WalletApiResult<String>;

    async fn get_used_addresses(&self) -> WalletApiResult<Vec<String>>;

    async fn get_unused_addresses(&self) -> WalletApiResult<Vec<String>>;

    async fn get_reward_addresses(&self) -> WalletApiResult<Vec<String>>;

    /// Returns a witness set
    async fn sign_tx(&self, tx_hex: &str, partial_sign: bool) -> WalletApiResult<String>;

    /// Returns the transaction hash
    async fn submit_tx(&self, tx_hex: &str) -> WalletApiResult<String>;
}

/// The injected `cardano` namespace
#[async_trait(?Send)]
pub trait WalletProvider {
    /// False when no wallet extension injected anything at all
    fn is_available(&self) -> bool;

    /// Metadata the extension publishes under `key`, if it is installed
    fn wallet_info(&self, key: &str) -> Option<serde_json::Value>;

    /// Runs the enable handshake; may wait on a user prompt
    async fn enable(&self, key: &str) -> WalletApiResult<Box<dyn Cip30Api>>;
}

/// An installed wallet found during detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDescriptor {
    /// The candidate name as the caller spelled it
    pub wallet_identifier: String,
    /// Extension metadata (name, icon, apiVersion, ...)
    pub info: serde_json::Value,
}

/// Transaction hash returned by `submitTx`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TxHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Looks up each candidate (case-insensitively) and keeps the installed ones
pub fn detect_supported_wallets<P: WalletProvider + ?Sized>(
    provider: &P,
    candidates: &[&str],
) -> Result<Vec<WalletDescriptor>> {
    if !provider.is_available() {
        tracing::error!("no injected cardano provider");
        return Err(CardanoError::WalletProviderUnavailable);
    }
    let wallets: Vec<_> = candidates
        .iter()
        .filter_map(|candidate| {
            let key = candidate.to_lowercase();
            provider
                .wallet_info(&key)
                .filter(|info| !info.is_null())
                .map(|info| WalletDescriptor {
                    wallet_identifier: candidate.to_string(),
                    info,
                })
        })
        .collect();
    tracing::info!(
        candidates = candidates.len(),
        supported = wallets.len(),
        "detected wallets"
    );
    Ok(wallets)
}

fn wallet_error(operation: &'static str, err: WalletApiError) -> CardanoError {
    tracing::error!(operation, code = ?err.code, info = %err.info, "wallet rejected call");
    CardanoError::WalletOperation {
        operation,
        code: err.code,
        info: err.info,
    }
}

/// An enabled wallet
pub struct WalletSession {
    api: Box<dyn Cip30Api>,
    provider_key: String,
    network_id: u8,
    timeouts: TimeoutConfig,
    timer: Rc<dyn Timer>,
    pipeline: Mutex<()>,
}

impl fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSession")
            .field("provider_key", &self.provider_key)
            .field("network_id", &self.network_id)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl WalletSession {
    /// Enables `wallet_name` and checks it is on `expected_network_id`
    pub async fn connect<P: WalletProvider + ?Sized>(
        provider: &P,
        wallet_name: &str,
        expected_network_id: Option<u8>,
        timeouts: TimeoutConfig,
        timer: Rc<dyn Timer>,
    ) -> Result<Self> {
        if !provider.is_available() {
            tracing::error!("no injected cardano provider");
            return Err(CardanoError::WalletProviderUnavailable);
        }
        let key = wallet_name.to_lowercase();
        if provider.wallet_info(&key).map_or(true, |info| info.is_null()) {
            tracing::error!(wallet = %wallet_name, "wallet extension not installed");
            return Err(CardanoError::WalletNotFound(wallet_name.to_string()));
        }

        tracing::info!(wallet = %key, "enabling wallet");
        let api = with_timeout(timer.as_ref(), timeouts.prompt(), "enable", provider.enable(&key))
            .await?
            .map_err(|e| wallet_error("enable", e))?;

        let network_id = with_timeout(
            timer.as_ref(),
            timeouts.request(),
            "getNetworkId",
            api.get_network_id(),
        )
        .await?
        .map_err(|e| wallet_error("getNetworkId", e))?;

        if let Some(expected) = expected_network_id {
            if network_id != expected {
                tracing::error!(expected, actual = network_id, "wallet on the wrong network");
                return Err(CardanoError::NetworkMismatch {
                    expected,
                    actual: network_id,
                    current: network_name(network_id),
                    suggested: network_name(expected),
                });
            }
        }

        tracing::info!(wallet = %key, network_id, "wallet connected");
        Ok(Self {
            api,
            provider_key: key,
            network_id,
            timeouts,
            timer,
            pipeline: Mutex::new(()),
        })
    }

    /// Lowercased provider key, e.g. `nami`
    pub fn provider_key(&self) -> &str {
        &self.provider_key
    }

    /// Network id reported at connect time
    pub fn network_id(&self) -> u8 {
        self.network_id
    }

    /// Serialises build pipelines on this session. Input selection and
    /// signing consume live UTXOs and must not interleave.
    pub async fn lock_pipeline(&self) -> MutexGuard<'_, ()> {
        self.pipeline.lock().await
    }

    pub async fn query_network_id(&self) -> Result<u8> {
        self.request("getNetworkId", self.api.get_network_id()).await
    }

    pub async fn raw_balance(&self) -> Result<String> {
        self.request("getBalance", self.api.get_balance()).await
    }

    pub async fn balance(&self) -> Result<Value> {
        Ok(Value::from_hex(&self.raw_balance().await?)?)
    }

    /// Current UTXO set, fetched fresh on every call
    pub async fn utxos(&self) -> Result<Vec<TransactionUnspentOutput>> {
        let raw = self.request("getUtxos", self.api.get_utxos()).await?;
        let utxos = raw
            .iter()
            .map(|hex| TransactionUnspentOutput::from_hex(hex))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        tracing::debug!(count = utxos.len(), "fetched utxos");
        Ok(utxos)
    }

    pub async fn change_address(&self) -> Result<CardanoAddress> {
        let raw = self
            .request("getChangeAddress", self.api.get_change_address())
            .await?;
        CardanoAddress::from_hex(&raw)
    }

    pub async fn used_addresses(&self) -> Result<Vec<CardanoAddress>> {
        let raw = self
            .request("getUsedAddresses", self.api.get_used_addresses())
            .await?;
        raw.iter().map(|hex| CardanoAddress::from_hex(hex)).collect()
    }

    pub async fn unused_addresses(&self) -> Result<Vec<CardanoAddress>> {
        let raw = self
            .request("getUnusedAddresses", self.api.get_unused_addresses())
            .await?;
        raw.iter().map(|hex| CardanoAddress::from_hex(hex)).collect()
    }

    pub async fn reward_addresses(&self) -> Result<Vec<CardanoAddress>> {
        let raw = self
            .request("getRewardAddresses", self.api.get_reward_addresses())
            .await?;
        raw.iter().map(|hex| CardanoAddress::from_hex(hex)).collect()
    }

    /// Asks the wallet to witness `tx_hex`
    pub async fn sign_witnesses(
        &self,
        tx_hex: &str,
        partial_sign: bool,
    ) -> Result<TransactionWitnessSet> {
        let raw = self
            .prompt("signTx", self.api.sign_tx(tx_hex, partial_sign))
            .await?;
        Ok(TransactionWitnessSet::from_hex(&raw)?)
    }

    pub async fn submit(&self, tx_hex: &str) -> Result<TxHash> {
        let hash = self.prompt("submitTx", self.api.submit_tx(tx_hex)).await?;
        tracing::info!(tx_hash = %hash, "transaction submitted");
        Ok(TxHash::new(hash))
    }

    async fn request<T>(
        &self,
        operation: &'static str,
        call: impl std::future::Future<Output = WalletApiResult<T>>,
    ) -> Result<T> {
        with_timeout(self.timer.as_ref(), self.timeouts.request(), operation, call)
            .await?
            .map_err(|e| wallet_error(operation, e))
    }

    async fn prompt<T>(
        &self,
        operation: &'static str,
        call: impl std::future::Future<Output = WalletApiResult<T>>,
    ) -> Result<T> {
        with_timeout(self.timer.as_ref(), self.timeouts.prompt(), operation, call)
            .await?
            .map_err(|e| wallet_error(operation, e))
    }
}
