use crate::config::ProtocolParameters;
use crate::ledger::Coin;

/// `fee = coefficient * size + constant`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearFee {
    pub coefficient: Coin,
    pub constant: Coin,
}

impl LinearFee {
    pub fn new(coefficient: Coin, constant: Coin) -> Self {
        Self {
            coefficient,
            constant,
        }
    }

    pub fn fee_for_size(&self, size: usize) -> Coin {
        self.coefficient
            .saturating_mul(size as u64)
            .saturating_add(self.constant)
    }
}

/// Builder context derived from protocol parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBuilderConfig {
    pub fee_algo: LinearFee,
    pub max_value_size: u32,
    pub max_tx_size: u32,
    pub coins_per_utxo_word: Coin,
    /// Split asset change from pure ADA change when both can stand alone
    pub prefer_pure_change: bool,
}

impl TransactionBuilderConfig {
    pub fn new(params: &ProtocolParameters) -> Self {
        Self {
            fee_algo: params.linear_fee(),
            max_value_size: params.max_value_size,
            max_tx_size: params.max_tx_size,
            coins_per_utxo_word: params.coins_per_utxo_word,
            prefer_pure_change: true,
        }
    }

    pub fn with_prefer_pure_change(mut self, prefer: bool) -> Self {
        self.prefer_pure_change = prefer;
        self
    }
}

impl From<&ProtocolParameters> for TransactionBuilderConfig {
    fn from(params: &ProtocolParameters) -> Self {
        Self::new(params)
    }
}

impl Default for TransactionBuilderConfig {
    fn default() -> Self {
        Self::new(&ProtocolParameters::default())
    }
}
