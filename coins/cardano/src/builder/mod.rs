//! Transaction builder.
//!
//! Accumulates outputs, selects inputs from a wallet's UTXO set, balances
//! the transaction with a linear fee and a change output, and produces an
//! unsigned body. Fees are estimated on a copy of the transaction where
//! the fee and change coin are encoded at their widest (`u64::MAX`) and
//! every required signer has a placeholder witness, so the final encoding
//! can only be smaller than the one the fee was priced for.

mod config;
mod min_ada;
mod selection;

use std::collections::BTreeSet;

use rand::Rng;

pub use config::{LinearFee, TransactionBuilderConfig};
pub use min_ada::{bundle_size, min_ada_required};
pub use selection::CoinSelectionStrategy;

use crate::address::{CardanoAddress, Credential};
use crate::config::AddressType;
use crate::error::{CardanoError, Result};
use crate::ledger::{
    AuxiliaryData, Coin, GeneralTransactionMetadata, LedgerObject, MultiAsset, Transaction,
    TransactionBody, TransactionOutput, TransactionUnspentOutput, TransactionWitnessSet, Value,
};
use selection::{preselect, sort_largest_first, take_largest_holding, total_value};

const LOVELACE: &str = "lovelace";

/// Placeholder wide enough for any coin amount
const MAX_COIN: Coin = u64::MAX;

#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    config: TransactionBuilderConfig,
    inputs: Vec<TransactionUnspentOutput>,
    outputs: Vec<TransactionOutput>,
    fee: Option<Coin>,
    ttl: Option<u64>,
    auxiliary_data: Option<AuxiliaryData>,
    /// Candidates left over by selection, used to top up change
    pending: Vec<TransactionUnspentOutput>,
}

impl TransactionBuilder {
    pub fn new(config: TransactionBuilderConfig) -> Self {
        Self {
            config,
            inputs: Vec::new(),
            outputs: Vec::new(),
            fee: None,
            ttl: None,
            auxiliary_data: None,
            pending: Vec::new(),
        }
    }

    pub fn config(&self) -> &TransactionBuilderConfig {
        &self.config
    }

    pub fn inputs(&self) -> &[TransactionUnspentOutput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TransactionOutput] {
        &self.outputs
    }

    pub fn fee(&self) -> Option<Coin> {
        self.fee
    }

    pub fn set_ttl(&mut self, ttl: u64) {
        self.ttl = Some(ttl);
    }

    pub fn set_metadata(&mut self, metadata: GeneralTransactionMetadata) {
        self.auxiliary_data = Some(AuxiliaryData::with_metadata(metadata));
    }

    pub fn auxiliary_data(&self) -> Option<&AuxiliaryData> {
        self.auxiliary_data.as_ref()
    }

    /// Minimum lovelace for an output holding `value` under this config
    pub fn min_ada_for(&self, value: &Value) -> Coin {
        min_ada_required(value, false, self.config.coins_per_utxo_word)
    }

    /// Adds an output after checking its minimum ADA and value size
    pub fn add_output(&mut self, output: TransactionOutput) -> Result<()> {
        let minimum = self.min_ada_for(&output.amount);
        if output.amount.coin < minimum {
            return Err(CardanoError::OutputBelowMinimum {
                coin: output.amount.coin,
                minimum,
            });
        }
        self.check_value_size(&output.amount)?;
        self.outputs.push(output);
        Ok(())
    }

    pub fn add_input(&mut self, utxo: TransactionUnspentOutput) {
        if !self.inputs.iter().any(|u| u.input == utxo.input) {
            self.inputs.push(utxo);
        }
    }

    /// Selects inputs covering the outputs and the fee they imply
    pub fn add_inputs_from(
        &mut self,
        utxos: &[TransactionUnspentOutput],
        strategy: CoinSelectionStrategy,
    ) -> Result<()> {
        self.add_inputs_from_with_rng(utxos, strategy, &mut rand::thread_rng())
    }

    pub fn add_inputs_from_with_rng<R: Rng + ?Sized>(
        &mut self,
        utxos: &[TransactionUnspentOutput],
        strategy: CoinSelectionStrategy,
        rng: &mut R,
    ) -> Result<()> {
        let pool: Vec<_> = utxos
            .iter()
            .filter(|u| !self.inputs.iter().any(|s| s.input == u.input))
            .cloned()
            .collect();

        let wanted = self.explicit_output()?;
        let held = self.explicit_input()?;
        let target = Value::with_assets(
            wanted.coin.saturating_sub(held.coin),
            wanted.assets().saturating_sub(&held.assets()),
        );

        let (selected, rest) = preselect(strategy, pool, &target, rng);
        self.inputs.extend(selected);
        self.pending = rest;

        loop {
            let fee = self.min_fee()?;
            let have = self.explicit_input()?;
            let need = self.explicit_output()?;

            if let Some((policy, name, required, _)) = have.assets().shortfall(&need.assets()) {
                let (policy, name) = (*policy, name.clone());
                match take_largest_holding(&mut self.pending, &policy, &name) {
                    Some(utxo) => self.inputs.push(utxo),
                    None => {
                        let available = self.available_total(utxos)?.assets().get_asset(&policy, &name);
                        let asset = format!("{}{}", policy.to_hex(), name.to_hex());
                        tracing::error!(%asset, required, available, "insufficient token balance");
                        return Err(CardanoError::InsufficientFunds {
                            asset,
                            required,
                            available,
                        });
                    }
                }
                continue;
            }

            let required = need.coin.saturating_add(fee);
            if have.coin >= required {
                break;
            }
            if self.pending.is_empty() {
                let available = self.available_total(utxos)?.coin;
                tracing::error!(required, available, "insufficient ADA balance");
                return Err(CardanoError::InsufficientFunds {
                    asset: LOVELACE.to_string(),
                    required,
                    available,
                });
            }
            self.inputs.push(self.pending.remove(0));
        }

        tracing::debug!(
            ?strategy,
            inputs = self.inputs.len(),
            "selected inputs"
        );
        Ok(())
    }

    /// Sum of selected inputs
    pub fn explicit_input(&self) -> Result<Value> {
        total_value(&self.inputs)
    }

    /// Sum of outputs added so far
    pub fn explicit_output(&self) -> Result<Value> {
        let mut coin: Coin = 0;
        let mut assets = MultiAsset::new();
        for output in &self.outputs {
            coin = coin
                .checked_add(output.amount.coin)
                .ok_or_else(|| CardanoError::TransactionBuild("output total overflows".into()))?;
            if let Some(ma) = &output.amount.multiasset {
                assets = assets
                    .checked_add(ma)
                    .ok_or_else(|| CardanoError::TransactionBuild("output assets overflow".into()))?;
            }
        }
        Ok(Value::with_assets(coin, assets))
    }

    /// Minimum fee for the transaction as it stands
    pub fn min_fee(&self) -> Result<Coin> {
        self.fee_with_outputs(&self.outputs)
    }

    /// Adds change to `address` so that inputs = outputs + fee.
    /// Returns whether a change output was added.
    pub fn add_change_if_needed(&mut self, address: &CardanoAddress) -> Result<bool> {
        loop {
            let input = self.explicit_input()?;
            let output = self.explicit_output()?;

            if let Some((policy, name, required, available)) =
                input.assets().shortfall(&output.assets())
            {
                return Err(CardanoError::InsufficientFunds {
                    asset: format!("{}{}", policy.to_hex(), name.to_hex()),
                    required,
                    available,
                });
            }
            let leftover_assets = input.assets().saturating_sub(&output.assets());
            let fee_without_change = self.min_fee()?;

            let Some(residual) = input.coin.checked_sub(output.coin) else {
                if self.top_up()? {
                    continue;
                }
                return Err(CardanoError::InsufficientFunds {
                    asset: LOVELACE.to_string(),
                    required: output.coin.saturating_add(fee_without_change),
                    available: input.coin,
                });
            };

            if leftover_assets.is_empty() && residual == fee_without_change {
                self.fee = Some(residual);
                tracing::debug!(fee = residual, "exact fit, no change output");
                return Ok(false);
            }

            match self.plan_change(address, residual, leftover_assets)? {
                Ok((change, fee)) => {
                    let coin: Coin = change.iter().map(|o| o.amount.coin).sum();
                    tracing::debug!(fee, change = coin, outputs = change.len(), "added change");
                    self.outputs.extend(change);
                    self.fee = Some(fee);
                    return Ok(true);
                }
                Err((change, minimum)) => {
                    if self.top_up()? {
                        continue;
                    }
                    tracing::error!(change, minimum, "change below minimum UTXO value");
                    return Err(CardanoError::ChangeBelowMinimum { change, minimum });
                }
            }
        }
    }

    /// Works out change outputs for `residual` lovelace and leftover
    /// assets. Assets too large for one output are spread over several,
    /// each carrying its own minimum ADA. The inner error carries
    /// (change, minimum) when the change cannot stand on its own.
    #[allow(clippy::type_complexity)]
    fn plan_change(
        &self,
        address: &CardanoAddress,
        residual: Coin,
        leftover_assets: MultiAsset,
    ) -> Result<std::result::Result<(Vec<TransactionOutput>, Coin), (Coin, Coin)>> {
        let bundles = self.split_change_assets(&leftover_assets)?;
        let mins: Vec<Coin> = bundles
            .iter()
            .map(|bundle| self.min_ada_for(&Value::with_assets(0, bundle.clone())))
            .collect();
        let asset_min = mins.iter().fold(0, |sum: Coin, m| sum.saturating_add(*m));
        let pure_min = self.min_ada_for(&Value::new(0));
        let widest: Vec<_> = bundles
            .iter()
            .map(|bundle| {
                TransactionOutput::new(address.clone(), Value::with_assets(MAX_COIN, bundle.clone()))
            })
            .collect();
        let at_minimum = || -> Vec<TransactionOutput> {
            bundles
                .iter()
                .zip(&mins)
                .map(|(bundle, min)| {
                    TransactionOutput::new(address.clone(), Value::with_assets(*min, bundle.clone()))
                })
                .collect()
        };

        if self.config.prefer_pure_change && !bundles.is_empty() {
            let mut priced = widest.clone();
            priced.push(TransactionOutput::new(address.clone(), Value::new(MAX_COIN)));
            let fee = self.fee_with_extra(&priced)?;
            let pure = residual
                .checked_sub(fee)
                .and_then(|rest| rest.checked_sub(asset_min));
            if let Some(pure) = pure.filter(|p| *p >= pure_min) {
                let mut change = at_minimum();
                change.push(TransactionOutput::new(address.clone(), Value::new(pure)));
                return Ok(Ok((change, fee)));
            }
        }

        if bundles.is_empty() {
            let priced = [TransactionOutput::new(address.clone(), Value::new(MAX_COIN))];
            let fee = self.fee_with_extra(&priced)?;
            return Ok(match residual.checked_sub(fee) {
                Some(change) if change >= pure_min => Ok((
                    vec![TransactionOutput::new(address.clone(), Value::new(change))],
                    fee,
                )),
                other => Err((other.unwrap_or(0), pure_min)),
            });
        }

        let fee = self.fee_with_extra(&widest)?;
        match residual.checked_sub(fee) {
            Some(change) if change >= asset_min => {
                let mut outputs = at_minimum();
                // surplus rides on the last bundle
                if let Some(last) = outputs.last_mut() {
                    last.amount.coin += change - asset_min;
                }
                Ok(Ok((outputs, fee)))
            }
            other => Ok(Err((other.unwrap_or(0), asset_min))),
        }
    }

    /// Splits `assets` into bundles that each fit `max_value_size` at the
    /// widest coin. A policy stays in one bundle unless it cannot fit
    /// alone, in which case its assets are placed one by one.
    fn split_change_assets(&self, assets: &MultiAsset) -> Result<Vec<MultiAsset>> {
        let max = self.config.max_value_size as usize;
        let fits = |bundle: &MultiAsset| -> Result<bool> {
            Ok(Value::with_assets(MAX_COIN, bundle.clone()).to_bytes()?.len() <= max)
        };

        let mut pieces = Vec::new();
        for (policy, group) in assets.iter() {
            let mut whole = MultiAsset::new();
            whole.insert(*policy, group.clone());
            if fits(&whole)? {
                pieces.push(whole);
                continue;
            }
            for (name, quantity) in group.iter() {
                let mut single = MultiAsset::new();
                single.set_asset(*policy, name.clone(), *quantity);
                pieces.push(single);
            }
        }

        let mut bundles = Vec::new();
        let mut current = MultiAsset::new();
        for piece in pieces {
            let merged = current
                .checked_add(&piece)
                .ok_or_else(|| CardanoError::TransactionBuild("change assets overflow".into()))?;
            if current.is_empty() || fits(&merged)? {
                current = merged;
            } else {
                bundles.push(std::mem::replace(&mut current, piece));
            }
        }
        if !current.is_empty() {
            bundles.push(current);
        }

        for bundle in &bundles {
            self.check_value_size(&Value::with_assets(MAX_COIN, bundle.clone()))?;
        }
        if bundles.len() > 1 {
            tracing::debug!(bundles = bundles.len(), "change assets split across outputs");
        }
        Ok(bundles)
    }

    /// Moves the largest unselected candidate into the inputs
    fn top_up(&mut self) -> Result<bool> {
        if self.pending.is_empty() {
            return Ok(false);
        }
        sort_largest_first(&mut self.pending);
        let utxo = self.pending.remove(0);
        tracing::debug!(input = %utxo.input.transaction_id_hex(), index = utxo.input.index, "pulling extra input for change");
        self.inputs.push(utxo);
        Ok(true)
    }

    /// Body with the fee fixed by [`Self::add_change_if_needed`]
    pub fn build(&self) -> Result<TransactionBody> {
        let fee = self.fee.ok_or_else(|| {
            CardanoError::TransactionBuild("fee not set; call add_change_if_needed first".into())
        })?;
        if self.inputs.is_empty() {
            return Err(CardanoError::TransactionBuild("no inputs".into()));
        }
        if self.outputs.is_empty() {
            return Err(CardanoError::TransactionBuild("no outputs".into()));
        }

        let input = self.explicit_input()?;
        let output = self.explicit_output()?;
        let balanced = output.coin.checked_add(fee) == Some(input.coin)
            && input.assets() == output.assets();
        if !balanced {
            return Err(CardanoError::TransactionBuild(format!(
                "unbalanced: inputs {} lovelace, outputs {} + fee {}",
                input.coin, output.coin, fee
            )));
        }

        let body = self.body(&self.outputs, fee)?;
        let size = self.priced_transaction(body.clone())?.size()?;
        if size > self.config.max_tx_size as usize {
            tracing::error!(size, max = self.config.max_tx_size, "transaction too large");
            return Err(CardanoError::TransactionTooLarge {
                size,
                max: self.config.max_tx_size,
            });
        }
        Ok(body)
    }

    /// Unsigned transaction: body, empty witness set, auxiliary data
    pub fn build_tx(&self) -> Result<Transaction> {
        let body = self.build()?;
        Ok(Transaction::new(
            body,
            TransactionWitnessSet::new(),
            self.auxiliary_data.clone(),
        ))
    }

    fn body(&self, outputs: &[TransactionOutput], fee: Coin) -> Result<TransactionBody> {
        let mut inputs: Vec<_> = self.inputs.iter().map(|u| u.input).collect();
        inputs.sort();
        let auxiliary_data_hash = match &self.auxiliary_data {
            Some(aux) => Some(aux.hash()?),
            None => None,
        };
        Ok(TransactionBody {
            inputs,
            outputs: outputs.to_vec(),
            fee,
            ttl: self.ttl,
            auxiliary_data_hash,
        })
    }

    /// The transaction with placeholder witnesses, as the fee prices it
    fn priced_transaction(&self, body: TransactionBody) -> Result<Transaction> {
        Ok(Transaction::new(
            body,
            TransactionWitnessSet::with_fake_vkeys(self.witness_count()),
            self.auxiliary_data.clone(),
        ))
    }

    fn fee_with_outputs(&self, outputs: &[TransactionOutput]) -> Result<Coin> {
        let tx = self.priced_transaction(self.body(outputs, MAX_COIN)?)?;
        Ok(self.config.fee_algo.fee_for_size(tx.size()?))
    }

    fn fee_with_extra(&self, extra: &[TransactionOutput]) -> Result<Coin> {
        let mut outputs = self.outputs.clone();
        outputs.extend_from_slice(extra);
        self.fee_with_outputs(&outputs)
    }

    /// One vkey witness per distinct payment key; Byron inputs need a
    /// larger bootstrap witness, priced as two.
    fn witness_count(&self) -> usize {
        let mut keys = BTreeSet::new();
        let mut byron = BTreeSet::new();
        for utxo in &self.inputs {
            let address = utxo.address();
            match address.payment_credential() {
                Some(Credential::KeyHash(hash)) => {
                    keys.insert(hash);
                }
                Some(Credential::ScriptHash(_)) => {}
                None if address.address_type() == AddressType::Byron => {
                    byron.insert(address.as_bytes().to_vec());
                }
                None => {}
            }
        }
        keys.len() + 2 * byron.len()
    }

    fn check_value_size(&self, value: &Value) -> Result<()> {
        let size = value.to_bytes()?.len();
        if size > self.config.max_value_size as usize {
            return Err(CardanoError::ValueTooLarge {
                size,
                max: self.config.max_value_size,
            });
        }
        Ok(())
    }

    fn available_total(&self, utxos: &[TransactionUnspentOutput]) -> Result<Value> {
        let mut all: Vec<_> = utxos.to_vec();
        for input in &self.inputs {
            if !all.iter().any(|u| u.input == input.input) {
                all.push(input.clone());
            }
        }
        total_value(&all)
    }
}
