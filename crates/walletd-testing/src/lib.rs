//! # WalletD Testing Infrastructure
//!
//! Testing utilities for the WalletD CIP-30 connector:
//! - A scripted CIP-30 wallet and `window.cardano` provider
//! - Ledger fixtures (keys, addresses, UTXOs, token values)
//! - Edge case inputs for caller validation
//! - Property-based testing strategies
//!
//! ## Usage
//!
//! ```rust,ignore
//! use walletd_testing::*;
//!
//! let wallet = MockWallet::new(0).with_utxo(Value::new(5_000_000));
//! let provider = MockProvider::new().with_wallet("nami", wallet.clone());
//!
//! // drive the connector, then inspect what the wallet saw
//! assert_eq!(wallet.count(MockCall::SubmitTx), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use proptest::prelude::*;
use walletd_cip30::ledger::{
    AssetName, LedgerObject, MultiAsset, PolicyId, Transaction, TransactionInput,
    TransactionOutput, TransactionUnspentOutput, TransactionWitnessSet, Value, Vkeywitness,
};
use walletd_cip30::{
    CardanoAddress, Cip30Api, TransferMetadata, WalletApiError, WalletApiResult, WalletProvider,
};

// ============================================================================
// Edge Case Inputs
// ============================================================================

/// Known native assets and their CIP-14 fingerprints
pub struct EdgeCaseUnits;

impl EdgeCaseUnits {
    /// Policy id used by the CIP-14 test vectors
    pub const POLICY: &'static str = "7eae28af2208be856f7a119668ae52a49b73725e326dc16579dcc373";

    /// `PATATE` as hex
    pub const PATATE_HEX: &'static str = "504154415445";

    /// Fingerprint of (POLICY, "")
    pub const EMPTY_NAME_FINGERPRINT: &'static str = "asset1rjklcrnsdzqp65wjgrg55sy9723kw09mlgvlc3";

    /// Fingerprint of (POLICY, PATATE_HEX)
    pub const PATATE_FINGERPRINT: &'static str = "asset13n25uv0yaf5kus35fm2k86cqy60z58d9xmde92";

    /// Units that must be rejected before any wallet call
    pub fn invalid() -> Vec<String> {
        vec![
            String::new(),
            "abcd".into(),
            // one char short of a policy id
            Self::POLICY[..55].into(),
            // odd-length name
            format!("{}5", Self::POLICY),
            format!("{}zz", Self::POLICY),
            // 33-byte name
            format!("{}{}", Self::POLICY, "41".repeat(33)),
        ]
    }
}

/// Edge case addresses
pub struct EdgeCaseAddresses;

impl EdgeCaseAddresses {
    /// Byron mainnet address (base58)
    pub const BYRON_MAINNET: &'static str =
        "Ae2tdPwUPEZFRbyhz3cpfC2CumGzNkFBN2L42rcUc2yjQpEkxDbkPodpMAi";

    /// Addresses that must be rejected before any wallet call
    pub fn invalid() -> Vec<&'static str> {
        vec![
            "",
            "not_an_address",
            "addr1qinvalid",
            "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq",
            "0x742d35Cc6634C0532925a3b844Bc9e7595f5fFb9",
        ]
    }
}

/// Edge case amounts
pub struct EdgeCaseAmounts;

impl EdgeCaseAmounts {
    /// Lovelace per ADA
    pub const ONE_ADA: u64 = 1_000_000;

    /// Minimum ADA of a pure-ADA output at 34482 lovelace per word
    pub const ADA_ONLY_MIN: u64 = 29 * 34_482;

    /// Quantity strings that are not positive u64 integers
    pub fn invalid_quantities() -> Vec<&'static str> {
        vec!["", "0", "-1", "1.5", "1e6", "abc", "0x10", "18446744073709551616"]
    }
}

// ============================================================================
// Ledger Fixtures
// ============================================================================

/// Deterministic ed25519 payment key with its enterprise address
#[derive(Debug, Clone)]
pub struct WalletKey {
    signing_key: SigningKey,
    network_id: u8,
}

impl WalletKey {
    /// Key derived from a fixed seed byte
    pub fn from_seed(seed: u8, network_id: u8) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&[seed; 32]),
            network_id,
        }
    }

    /// Enterprise address of the key
    pub fn address(&self) -> CardanoAddress {
        CardanoAddress::enterprise(self.signing_key.verifying_key().as_bytes(), self.network_id)
    }

    /// Vkey witness over `message`
    pub fn witness(&self, message: &[u8]) -> Vkeywitness {
        let signature = self.signing_key.sign(message);
        Vkeywitness::new(
            self.signing_key.verifying_key().to_bytes(),
            signature.to_bytes(),
        )
    }
}

/// Bech32 address of a fresh enterprise key, for use as a recipient
pub fn recipient_address(seed: u8, network_id: u8) -> String {
    CardanoAddress::enterprise_from_key_hash([seed; 28], network_id)
        .to_bech32()
        .unwrap_or_default()
}

/// Bech32 reward (`stake`) address for a key hash of `seed` bytes
pub fn reward_address(seed: u8, network_id: u8) -> String {
    let mut bytes = vec![0xe0 | (network_id & 0x0f)];
    bytes.extend_from_slice(&[seed; 28]);
    CardanoAddress::from_bytes(&bytes)
        .ok()
        .and_then(|address| address.to_bech32().ok())
        .unwrap_or_default()
}

/// Builds a UTXO `[tx_id; 32]#index` at `address`
pub fn utxo(tx_id: u8, index: u64, address: &CardanoAddress, value: Value) -> TransactionUnspentOutput {
    TransactionUnspentOutput::new(
        TransactionInput::new([tx_id; 32], index),
        TransactionOutput::new(address.clone(), value),
    )
    .expect("fixture utxo encodes")
}

/// Value carrying `coin` and one token
pub fn token_value(coin: u64, policy_hex: &str, name_hex: &str, quantity: u64) -> Value {
    let mut assets = MultiAsset::new();
    assets.set_asset(
        PolicyId::from_hex(policy_hex).expect("fixture policy id"),
        AssetName::from_hex(name_hex).expect("fixture asset name"),
        quantity,
    );
    Value::with_assets(coin, assets)
}

// ============================================================================
// Mock CIP-30 Wallet
// ============================================================================

/// Wallet calls the mock records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MockCall {
    /// `enable()`
    Enable,
    /// `getNetworkId()`
    GetNetworkId,
    /// `getBalance()`
    GetBalance,
    /// `getUtxos()`
    GetUtxos,
    /// `getChangeAddress()`
    GetChangeAddress,
    /// `getUsedAddresses()`
    GetUsedAddresses,
    /// `getUnusedAddresses()`
    GetUnusedAddresses,
    /// `getRewardAddresses()`
    GetRewardAddresses,
    /// `signTx()`
    SignTx,
    /// `submitTx()`
    SubmitTx,
}

#[derive(Debug)]
struct MockState {
    network_id: u8,
    key: WalletKey,
    utxos: Vec<TransactionUnspentOutput>,
    balance_hex: Option<String>,
    reward_addresses: Vec<CardanoAddress>,
    failures: BTreeMap<MockCall, WalletApiError>,
    hangs: Vec<MockCall>,
    empty_witnesses: bool,
    calls: Vec<MockCall>,
    submitted: Vec<String>,
}

/// Scripted CIP-30 wallet. Clones share state, so a test can keep one
/// clone for inspection while the connector owns another.
#[derive(Debug, Clone)]
pub struct MockWallet {
    state: Rc<RefCell<MockState>>,
}

impl MockWallet {
    /// Empty wallet on `network_id` with a fixed payment key
    pub fn new(network_id: u8) -> Self {
        Self {
            state: Rc::new(RefCell::new(MockState {
                network_id,
                key: WalletKey::from_seed(7, network_id),
                utxos: Vec::new(),
                balance_hex: None,
                reward_addresses: Vec::new(),
                failures: BTreeMap::new(),
                hangs: Vec::new(),
                empty_witnesses: false,
                calls: Vec::new(),
                submitted: Vec::new(),
            })),
        }
    }

    /// Adds a UTXO at the wallet's own address
    pub fn with_utxo(self, value: Value) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let address = state.key.address();
            let id = state.utxos.len() as u8 + 1;
            state.utxos.push(utxo(id, 0, &address, value));
        }
        self
    }

    /// Reports this hex blob from `getBalance` instead of the UTXO total
    pub fn with_balance_hex(self, hex: impl Into<String>) -> Self {
        self.state.borrow_mut().balance_hex = Some(hex.into());
        self
    }

    /// Adds a reward address
    pub fn with_reward_address(self, address: CardanoAddress) -> Self {
        self.state.borrow_mut().reward_addresses.push(address);
        self
    }

    /// Makes `call` reject with `{code, info}`
    pub fn fail(self, call: MockCall, code: i32, info: &str) -> Self {
        self.state
            .borrow_mut()
            .failures
            .insert(call, WalletApiError::new(Some(code), info));
        self
    }

    /// Makes `call` never resolve
    pub fn hang_on(self, call: MockCall) -> Self {
        self.state.borrow_mut().hangs.push(call);
        self
    }

    /// Answers `signTx` with an empty witness set
    pub fn with_empty_witnesses(self) -> Self {
        self.state.borrow_mut().empty_witnesses = true;
        self
    }

    /// The wallet's payment (and change) address
    pub fn address(&self) -> CardanoAddress {
        self.state.borrow().key.address()
    }

    /// Current UTXO set
    pub fn utxos(&self) -> Vec<TransactionUnspentOutput> {
        self.state.borrow().utxos.clone()
    }

    /// Every call in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.borrow().calls.clone()
    }

    /// Number of times `call` was made
    pub fn count(&self, call: MockCall) -> usize {
        self.state.borrow().calls.iter().filter(|c| **c == call).count()
    }

    /// Transactions accepted by `submitTx`
    pub fn submitted(&self) -> Vec<Transaction> {
        self.state
            .borrow()
            .submitted
            .iter()
            .filter_map(|hex| Transaction::from_hex(hex).ok())
            .collect()
    }

    async fn enter(&self, call: MockCall) -> WalletApiResult<()> {
        let (hang, failure) = {
            let mut state = self.state.borrow_mut();
            state.calls.push(call);
            (state.hangs.contains(&call), state.failures.get(&call).cloned())
        };
        if hang {
            std::future::pending::<()>().await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn balance_hex(&self) -> WalletApiResult<String> {
        let state = self.state.borrow();
        if let Some(hex) = &state.balance_hex {
            return Ok(hex.clone());
        }
        let total = state
            .utxos
            .iter()
            .try_fold(Value::new(0), |acc, utxo| acc.checked_add(utxo.amount()))
            .ok_or_else(|| internal("balance overflow"))?;
        total.to_hex().map_err(|e| internal(&e.to_string()))
    }
}

fn internal(info: &str) -> WalletApiError {
    WalletApiError::new(Some(-2), info)
}

fn invalid_request(info: &str) -> WalletApiError {
    WalletApiError::new(Some(-1), info)
}

#[async_trait(?Send)]
impl Cip30Api for MockWallet {
    async fn get_network_id(&self) -> WalletApiResult<u8> {
        self.enter(MockCall::GetNetworkId).await?;
        Ok(self.state.borrow().network_id)
    }

    async fn get_balance(&self) -> WalletApiResult<String> {
        self.enter(MockCall::GetBalance).await?;
        self.balance_hex()
    }

    async fn get_utxos(&self) -> WalletApiResult<Vec<String>> {
        self.enter(MockCall::GetUtxos).await?;
        Ok(self.state.borrow().utxos.iter().map(|u| u.raw_hex()).collect())
    }

    async fn get_change_address(&self) -> WalletApiResult<String> {
        self.enter(MockCall::GetChangeAddress).await?;
        Ok(self.address().to_hex())
    }

    async fn get_used_addresses(&self) -> WalletApiResult<Vec<String>> {
        self.enter(MockCall::GetUsedAddresses).await?;
        Ok(vec![self.address().to_hex()])
    }

    async fn get_unused_addresses(&self) -> WalletApiResult<Vec<String>> {
        self.enter(MockCall::GetUnusedAddresses).await?;
        Ok(Vec::new())
    }

    async fn get_reward_addresses(&self) -> WalletApiResult<Vec<String>> {
        self.enter(MockCall::GetRewardAddresses).await?;
        Ok(self
            .state
            .borrow()
            .reward_addresses
            .iter()
            .map(CardanoAddress::to_hex)
            .collect())
    }

    async fn sign_tx(&self, tx_hex: &str, _partial_sign: bool) -> WalletApiResult<String> {
        self.enter(MockCall::SignTx).await?;
        let tx = Transaction::from_hex(tx_hex).map_err(|e| invalid_request(&e.to_string()))?;
        let hash = tx.body.hash().map_err(|e| internal(&e.to_string()))?;

        let state = self.state.borrow();
        let mut witnesses = TransactionWitnessSet::new();
        if !state.empty_witnesses {
            witnesses.set_vkeys(vec![state.key.witness(&hash)]);
        }
        witnesses.to_hex().map_err(|e| internal(&e.to_string()))
    }

    async fn submit_tx(&self, tx_hex: &str) -> WalletApiResult<String> {
        self.enter(MockCall::SubmitTx).await?;
        let tx = Transaction::from_hex(tx_hex).map_err(|e| invalid_request(&e.to_string()))?;
        let hash = tx.body.hash_hex().map_err(|e| internal(&e.to_string()))?;

        let mut state = self.state.borrow_mut();
        // spent inputs leave the set
        state.utxos.retain(|u| !tx.body.inputs.contains(&u.input));
        state.submitted.push(tx_hex.to_string());
        Ok(hash)
    }
}

// ============================================================================
// Mock Provider
// ============================================================================

/// Stand-in for `window.cardano`
#[derive(Debug, Clone)]
pub struct MockProvider {
    available: bool,
    wallets: BTreeMap<String, MockWallet>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Injected namespace with no wallets
    pub fn new() -> Self {
        Self {
            available: true,
            wallets: BTreeMap::new(),
        }
    }

    /// No `window.cardano` at all
    pub fn unavailable() -> Self {
        Self {
            available: false,
            wallets: BTreeMap::new(),
        }
    }

    /// Installs `wallet` under the lowercase key `key`
    pub fn with_wallet(mut self, key: &str, wallet: MockWallet) -> Self {
        self.wallets.insert(key.to_lowercase(), wallet);
        self
    }
}

#[async_trait(?Send)]
impl WalletProvider for MockProvider {
    fn is_available(&self) -> bool {
        self.available
    }

    fn wallet_info(&self, key: &str) -> Option<serde_json::Value> {
        self.wallets.get(key).map(|_| {
            serde_json::json!({
                "name": key,
                "apiVersion": "0.1.0",
                "icon": "data:image/svg+xml;base64,",
            })
        })
    }

    async fn enable(&self, key: &str) -> WalletApiResult<Box<dyn Cip30Api>> {
        let wallet = self
            .wallets
            .get(key)
            .cloned()
            .ok_or_else(|| invalid_request("wallet not installed"))?;
        wallet.enter(MockCall::Enable).await?;
        Ok(Box::new(wallet))
    }
}

// ============================================================================
// Property-Based Testing Strategies
// ============================================================================

/// Any 28-byte policy id
pub fn policy_id() -> impl Strategy<Value = PolicyId> {
    prop::array::uniform28(any::<u8>()).prop_map(PolicyId::new)
}

/// Any asset name up to 32 bytes
pub fn asset_name() -> impl Strategy<Value = AssetName> {
    prop::collection::vec(any::<u8>(), 0..=32)
        .prop_map(|bytes| AssetName::new(bytes).expect("at most 32 bytes"))
}

/// Non-empty multi-asset with quantities that cannot overflow when summed
pub fn multi_asset() -> impl Strategy<Value = MultiAsset> {
    prop::collection::vec((policy_id(), asset_name(), 1u64..=u64::MAX >> 8), 1..6).prop_map(
        |triples| {
            let mut assets = MultiAsset::new();
            for (policy, name, quantity) in triples {
                assets.set_asset(policy, name, quantity);
            }
            assets
        },
    )
}

/// Values with and without assets
pub fn value() -> impl Strategy<Value = Value> {
    (0u64..=45_000_000_000_000_000, prop::option::of(multi_asset()))
        .prop_map(|(coin, assets)| Value::with_assets(coin, assets.unwrap_or_default()))
}

/// Positive quantity strings
pub fn valid_quantity() -> impl Strategy<Value = String> {
    (1u64..=u64::MAX).prop_map(|q| q.to_string())
}

/// Metadata payloads of arbitrary (possibly short) hex lengths
pub fn transfer_metadata() -> impl Strategy<Value = TransferMetadata> {
    ("[0-9a-f]{0,140}", "[0-9a-f]{0,100}", "[0-9]{1,6}")
        .prop_map(|(signature, registration, window)| {
            TransferMetadata::new(signature, registration, window)
        })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_balance_sums_utxos() {
        let wallet = MockWallet::new(0)
            .with_utxo(Value::new(2_000_000))
            .with_utxo(token_value(3_000_000, EdgeCaseUnits::POLICY, EdgeCaseUnits::PATATE_HEX, 5));
        let balance = Value::from_hex(&wallet.get_balance().await.unwrap()).unwrap();
        assert_eq!(balance.coin, 5_000_000);
        assert!(balance.has_assets());
        assert_eq!(wallet.count(MockCall::GetBalance), 1);
    }

    #[tokio::test]
    async fn test_mock_failure_is_reported() {
        let wallet = MockWallet::new(1).fail(MockCall::SignTx, 2, "user declined");
        let err = wallet.sign_tx("00", true).await.unwrap_err();
        assert_eq!(err.code, Some(2));
        assert_eq!(wallet.calls(), vec![MockCall::SignTx]);
    }

    #[tokio::test]
    async fn test_provider_enables_installed_wallets_only() {
        let provider = MockProvider::new().with_wallet("Nami", MockWallet::new(0));
        assert!(provider.wallet_info("nami").is_some());
        assert!(provider.wallet_info("eternl").is_none());
        assert!(provider.enable("nami").await.is_ok());
        assert!(provider.enable("eternl").await.is_err());
    }

    #[test]
    fn test_key_witness_verifies() {
        let key = WalletKey::from_seed(9, 0);
        assert!(key.witness(b"body hash").verify(b"body hash"));
        assert!(!key.address().is_mainnet());
    }

    proptest! {
        #[test]
        fn test_multi_asset_is_never_empty(assets in multi_asset()) {
            prop_assert!(!assets.is_empty());
        }

        #[test]
        fn test_metadata_fields_fit_text_limit(metadata in transfer_metadata()) {
            for (_, value) in metadata.fields() {
                prop_assert!(value.len() <= 64);
            }
        }
    }
}
