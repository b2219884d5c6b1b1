//! Transaction assembly.
//!
//! One call of [`TransactionAssembler::assemble`] walks
//! Configure → BuildOutputs → SelectInputs → Change → Finalize on its own
//! [`TransactionDraft`]. The first error ends the attempt; a new attempt
//! starts again from Configure with a fresh UTXO set.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::address::CardanoAddress;
use crate::asset::{encode_multi_asset, parse_quantity, split_unit, AssetRequest};
use crate::builder::{CoinSelectionStrategy, TransactionBuilder, TransactionBuilderConfig};
use crate::config::{AddressType, ProtocolParameters};
use crate::error::{CardanoError, Result};
use crate::ledger::{
    AuxiliaryData, Coin, GeneralTransactionMetadata, LedgerObject, MultiAsset, Transaction,
    TransactionBody, TransactionOutput, TransactionUnspentOutput, Value,
};
use crate::metadata::TransferMetadata;

/// What a transfer sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TransferAsset {
    /// Quantity is in lovelace
    Ada,
    /// Quantity is in the token's base unit; the output carries the
    /// minimum ADA on top
    Native { unit: String },
}

/// Unvalidated transfer as a caller describes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub recipient: String,
    pub asset: TransferAsset,
    pub quantity: String,
    pub metadata: Option<TransferMetadata>,
    pub strategy: CoinSelectionStrategy,
}

impl TransferRequest {
    pub fn ada(recipient: impl Into<String>, lovelace: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            asset: TransferAsset::Ada,
            quantity: lovelace.into(),
            metadata: None,
            strategy: CoinSelectionStrategy::RandomImproveMultiAsset,
        }
    }

    pub fn native(
        recipient: impl Into<String>,
        policy_hex: &str,
        asset_name_hex: &str,
        quantity: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            asset: TransferAsset::Native {
                unit: format!("{policy_hex}{asset_name_hex}"),
            },
            quantity: quantity.into(),
            metadata: None,
            strategy: CoinSelectionStrategy::RandomImproveMultiAsset,
        }
    }

    pub fn with_metadata(mut self, metadata: TransferMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_strategy(mut self, strategy: CoinSelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Checks every caller-supplied field. Touches no wallet.
    pub fn validate(&self) -> Result<ValidatedTransfer> {
        let recipient = CardanoAddress::parse(&self.recipient)?;
        if recipient.address_type() == AddressType::Reward {
            return Err(CardanoError::InvalidAddress(format!(
                "{}: reward addresses cannot receive payments",
                self.recipient
            )));
        }
        let quantity = parse_quantity(&self.quantity)?;

        let assets = match &self.asset {
            TransferAsset::Ada => None,
            TransferAsset::Native { unit } => {
                split_unit(unit)?;
                Some(encode_multi_asset(&[AssetRequest::new(
                    unit.clone(),
                    self.quantity.clone(),
                )])?)
            }
        };

        let metadata = match &self.metadata {
            Some(_) if assets.is_some() => {
                return Err(CardanoError::InvalidMetadata(
                    "metadata transfers carry ADA only".into(),
                ))
            }
            Some(metadata) => Some(metadata.to_general_metadata()?),
            None => None,
        };

        Ok(ValidatedTransfer {
            recipient,
            assets,
            quantity,
            metadata,
            strategy: self.strategy,
        })
    }
}

/// A transfer whose inputs all parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransfer {
    pub recipient: CardanoAddress,
    /// Native assets to send; `None` for ADA
    pub assets: Option<MultiAsset>,
    /// Lovelace for ADA transfers, token units otherwise
    pub quantity: u64,
    pub metadata: Option<GeneralTransactionMetadata>,
    pub strategy: CoinSelectionStrategy,
}

/// Assembly steps, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssemblyStep {
    Configure,
    BuildOutputs,
    SelectInputs,
    Change,
    Finalize,
}

impl fmt::Display for AssemblyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssemblyStep::Configure => "configure",
            AssemblyStep::BuildOutputs => "build-outputs",
            AssemblyStep::SelectInputs => "select-inputs",
            AssemblyStep::Change => "change",
            AssemblyStep::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// Per-call accumulator. Never outlives the assemble call that made it.
#[derive(Debug)]
pub struct TransactionDraft {
    builder: TransactionBuilder,
    change_address: CardanoAddress,
    step: AssemblyStep,
}

impl TransactionDraft {
    fn new(config: TransactionBuilderConfig, change_address: CardanoAddress) -> Self {
        Self {
            builder: TransactionBuilder::new(config),
            change_address,
            step: AssemblyStep::Configure,
        }
    }

    fn advance(&mut self, step: AssemblyStep) {
        tracing::debug!(from = %self.step, to = %step, "assembly step");
        self.step = step;
    }

    pub fn step(&self) -> AssemblyStep {
        self.step
    }

    pub fn outputs(&self) -> &[TransactionOutput] {
        self.builder.outputs()
    }

    pub fn selected_inputs(&self) -> &[TransactionUnspentOutput] {
        self.builder.inputs()
    }

    pub fn change_address(&self) -> &CardanoAddress {
        &self.change_address
    }

    pub fn metadata(&self) -> Option<&GeneralTransactionMetadata> {
        self.builder.auxiliary_data().and_then(AuxiliaryData::metadata)
    }
}

/// Body plus auxiliary data, ready for the wallet to sign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    transaction: Transaction,
    input_total: Coin,
}

impl UnsignedTransaction {
    pub fn body(&self) -> &TransactionBody {
        &self.transaction.body
    }

    pub fn auxiliary_data(&self) -> Option<&AuxiliaryData> {
        self.transaction.auxiliary_data.as_ref()
    }

    pub fn fee(&self) -> Coin {
        self.transaction.body.fee
    }

    /// Lovelace consumed by the selected inputs
    pub fn input_total(&self) -> Coin {
        self.input_total
    }

    pub fn tx_hash(&self) -> Result<String> {
        Ok(self.transaction.body.hash_hex()?)
    }

    /// Transaction with an empty witness set, as sent to `signTx`
    pub fn to_hex(&self) -> Result<String> {
        Ok(self.transaction.to_hex()?)
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }
}

/// Builds unsigned transactions from validated transfers
#[derive(Debug, Clone, Default)]
pub struct TransactionAssembler {
    config: TransactionBuilderConfig,
}

impl TransactionAssembler {
    pub fn new(params: &ProtocolParameters) -> Self {
        Self {
            config: TransactionBuilderConfig::new(params),
        }
    }

    pub fn with_config(config: TransactionBuilderConfig) -> Self {
        Self { config }
    }

    pub fn assemble(
        &self,
        transfer: &ValidatedTransfer,
        utxos: &[TransactionUnspentOutput],
        change_address: &CardanoAddress,
    ) -> Result<UnsignedTransaction> {
        self.assemble_with_rng(transfer, utxos, change_address, &mut rand::thread_rng())
    }

    pub fn assemble_with_rng<R: Rng + ?Sized>(
        &self,
        transfer: &ValidatedTransfer,
        utxos: &[TransactionUnspentOutput],
        change_address: &CardanoAddress,
        rng: &mut R,
    ) -> Result<UnsignedTransaction> {
        let mut draft = TransactionDraft::new(self.config.clone(), change_address.clone());
        let result = Self::run(&mut draft, transfer, utxos, rng);
        if let Err(err) = &result {
            tracing::error!(step = %draft.step(), error = %err, "transaction assembly failed");
        }
        result
    }

    fn run<R: Rng + ?Sized>(
        draft: &mut TransactionDraft,
        transfer: &ValidatedTransfer,
        utxos: &[TransactionUnspentOutput],
        rng: &mut R,
    ) -> Result<UnsignedTransaction> {
        if transfer.recipient.network_id() != draft.change_address.network_id() {
            return Err(CardanoError::InvalidAddress(format!(
                "recipient is on network {} but the wallet is on {}",
                transfer.recipient.network_id(),
                draft.change_address.network_id()
            )));
        }

        if let Some(metadata) = &transfer.metadata {
            draft.builder.set_metadata(metadata.clone());
        }

        draft.advance(AssemblyStep::BuildOutputs);
        let amount = match &transfer.assets {
            None => Value::new(transfer.quantity),
            Some(assets) => {
                let value = Value::with_assets(0, assets.clone());
                let coin = draft.builder.min_ada_for(&value);
                Value::with_assets(coin, assets.clone())
            }
        };
        draft
            .builder
            .add_output(TransactionOutput::new(transfer.recipient.clone(), amount))?;

        draft.advance(AssemblyStep::SelectInputs);
        draft
            .builder
            .add_inputs_from_with_rng(utxos, transfer.strategy, rng)?;

        draft.advance(AssemblyStep::Change);
        let change_address = draft.change_address.clone();
        draft.builder.add_change_if_needed(&change_address)?;

        draft.advance(AssemblyStep::Finalize);
        let transaction = draft.builder.build_tx()?;
        let input_total = draft.builder.explicit_input()?.coin;

        tracing::info!(
            inputs = draft.selected_inputs().len(),
            outputs = draft.outputs().len(),
            fee = transaction.body.fee,
            metadata = transfer.metadata.is_some(),
            "assembled transaction"
        );
        Ok(UnsignedTransaction {
            transaction,
            input_total,
        })
    }
}
