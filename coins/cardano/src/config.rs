use serde::{Deserialize, Serialize};

use crate::builder::{CoinSelectionStrategy, LinearFee};
use crate::error::Result;
use crate::timeout::TimeoutConfig;

/// Cardano network IDs
pub const MAINNET_NETWORK_ID: u8 = 1;
pub const TESTNET_NETWORK_ID: u8 = 0; // Preview/Preprod

/// Lovelace is the smallest unit (1 ADA = 1,000,000 Lovelace)
pub const LOVELACE_PER_ADA: u64 = 1_000_000;

/// Display name of a network id. Wallets report 0 for every test network;
/// any other id is shown as is.
pub fn network_name(network_id: u8) -> String {
    match network_id {
        TESTNET_NETWORK_ID => "Testnet".to_string(),
        MAINNET_NETWORK_ID => "Mainnet".to_string(),
        other => format!("network {other}"),
    }
}

/// Address types in Cardano
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    Base,       // Payment + staking key
    Enterprise, // Payment key only (no staking)
    Pointer,    // Payment + stake pool pointer
    Reward,     // Staking rewards address
    Byron,      // Legacy Byron addresses
}

/// Ledger protocol parameters consumed by every builder call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolParameters {
    /// Lovelace per byte
    pub fee_coefficient_a: u64,
    /// Constant lovelace per transaction
    pub fee_coefficient_b: u64,
    /// Certificate deposits. Transfers carry no certificates, so the
    /// builder never charges these.
    pub pool_deposit: u64,
    pub key_deposit: u64,
    pub max_value_size: u32,
    pub max_tx_size: u32,
    pub coins_per_utxo_word: u64,
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self {
            fee_coefficient_a: 44,
            fee_coefficient_b: 155_381,
            pool_deposit: 500_000_000,
            key_deposit: 2_000_000,
            max_value_size: 5_000,
            max_tx_size: 16_384,
            coins_per_utxo_word: 34_482,
        }
    }
}

impl ProtocolParameters {
    pub fn linear_fee(&self) -> LinearFee {
        LinearFee::new(self.fee_coefficient_a, self.fee_coefficient_b)
    }
}

/// Connector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorConfig {
    pub protocol_parameters: ProtocolParameters,
    /// Network the dApp expects the wallet to be on
    pub expected_network_id: u8,
    pub timeouts: TimeoutConfig,
    /// Selection strategy code for token transfers
    pub token_transfer_strategy: u8,
    /// Selection strategy code for metadata transfers
    pub metadata_transfer_strategy: u8,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            protocol_parameters: ProtocolParameters::default(),
            expected_network_id: MAINNET_NETWORK_ID,
            timeouts: TimeoutConfig::default(),
            token_transfer_strategy: CoinSelectionStrategy::RandomImproveMultiAsset as u8,
            metadata_transfer_strategy: CoinSelectionStrategy::LargestFirst as u8,
        }
    }
}

impl ConnectorConfig {
    pub fn new(expected_network_id: u8) -> Self {
        Self {
            expected_network_id,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn token_strategy(&self) -> Result<CoinSelectionStrategy> {
        CoinSelectionStrategy::try_from(self.token_transfer_strategy)
    }

    pub fn metadata_strategy(&self) -> Result<CoinSelectionStrategy> {
        CoinSelectionStrategy::try_from(self.metadata_transfer_strategy)
    }
}
