//! Input selection strategies (CIP-2).
//!
//! A strategy only picks a starting set. The builder then tops the set up
//! with the largest remaining inputs until outputs plus fee are covered.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CardanoError, Result};
use crate::ledger::{AssetName, Coin, MultiAsset, PolicyId, TransactionUnspentOutput, Value};

/// Selection strategy, numbered like the wallet-side builder codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CoinSelectionStrategy {
    LargestFirst = 0,
    RandomImprove = 1,
    LargestFirstMultiAsset = 2,
    RandomImproveMultiAsset = 3,
}

impl CoinSelectionStrategy {
    pub fn is_random(self) -> bool {
        matches!(self, Self::RandomImprove | Self::RandomImproveMultiAsset)
    }

    pub fn is_multi_asset(self) -> bool {
        matches!(self, Self::LargestFirstMultiAsset | Self::RandomImproveMultiAsset)
    }
}

impl TryFrom<u8> for CoinSelectionStrategy {
    type Error = CardanoError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::LargestFirst),
            1 => Ok(Self::RandomImprove),
            2 => Ok(Self::LargestFirstMultiAsset),
            3 => Ok(Self::RandomImproveMultiAsset),
            other => Err(CardanoError::TransactionBuild(format!(
                "unknown coin selection strategy {other}"
            ))),
        }
    }
}

/// Splits `pool` into a starting selection toward `target` and the rest.
/// The rest comes back sorted by coin, largest first.
pub(crate) fn preselect<R: Rng + ?Sized>(
    strategy: CoinSelectionStrategy,
    mut pool: Vec<TransactionUnspentOutput>,
    target: &Value,
    rng: &mut R,
) -> (Vec<TransactionUnspentOutput>, Vec<TransactionUnspentOutput>) {
    let mut selected = Vec::new();

    if strategy.is_random() {
        pool.shuffle(rng);
    }

    if strategy.is_multi_asset() {
        let wanted = target.assets();
        for (policy, name, quantity) in wanted.triples() {
            while held(&selected, policy, name) < quantity {
                let pick = if strategy.is_random() {
                    take_random_holding(&mut pool, policy, name, rng)
                } else {
                    take_largest_holding(&mut pool, policy, name)
                };
                match pick {
                    Some(utxo) => selected.push(utxo),
                    None => break,
                }
            }
        }
    }

    if strategy.is_random() {
        random_improve(&mut selected, &mut pool, target.coin);
    }

    sort_largest_first(&mut pool);
    (selected, pool)
}

/// Random phase then improvement toward twice the target without passing
/// three times it. `pool` must already be shuffled.
fn random_improve(
    selected: &mut Vec<TransactionUnspentOutput>,
    pool: &mut Vec<TransactionUnspentOutput>,
    target: Coin,
) {
    let mut total = coin_sum(selected);
    while total < target {
        let Some(utxo) = pool.pop() else {
            return;
        };
        total = total.saturating_add(utxo.coin());
        selected.push(utxo);
    }

    let ideal = target.saturating_mul(2);
    let upper = target.saturating_mul(3);
    let mut i = 0;
    while i < pool.len() && total < ideal {
        let candidate = total.saturating_add(pool[i].coin());
        if candidate <= upper && ideal.abs_diff(candidate) < ideal.abs_diff(total) {
            total = candidate;
            selected.push(pool.swap_remove(i));
        } else {
            i += 1;
        }
    }
}

pub(crate) fn sort_largest_first(pool: &mut [TransactionUnspentOutput]) {
    pool.sort_by(|a, b| b.coin().cmp(&a.coin()).then_with(|| a.input.cmp(&b.input)));
}

/// Removes the input holding the most of one asset
pub(crate) fn take_largest_holding(
    pool: &mut Vec<TransactionUnspentOutput>,
    policy: &PolicyId,
    name: &AssetName,
) -> Option<TransactionUnspentOutput> {
    let (index, _) = pool
        .iter()
        .enumerate()
        .map(|(i, utxo)| (i, utxo.amount().assets().get_asset(policy, name)))
        .filter(|(_, quantity)| *quantity > 0)
        .max_by_key(|(_, quantity)| *quantity)?;
    Some(pool.remove(index))
}

fn take_random_holding<R: Rng + ?Sized>(
    pool: &mut Vec<TransactionUnspentOutput>,
    policy: &PolicyId,
    name: &AssetName,
    rng: &mut R,
) -> Option<TransactionUnspentOutput> {
    let holders: Vec<usize> = pool
        .iter()
        .enumerate()
        .filter(|(_, utxo)| utxo.amount().assets().get_asset(policy, name) > 0)
        .map(|(i, _)| i)
        .collect();
    let index = *holders.choose(rng)?;
    Some(pool.remove(index))
}

fn held(selected: &[TransactionUnspentOutput], policy: &PolicyId, name: &AssetName) -> u64 {
    selected
        .iter()
        .map(|utxo| utxo.amount().assets().get_asset(policy, name))
        .fold(0u64, u64::saturating_add)
}

fn coin_sum(utxos: &[TransactionUnspentOutput]) -> Coin {
    utxos.iter().map(|u| u.coin()).fold(0, Coin::saturating_add)
}

/// Total value of a set of inputs
pub(crate) fn total_value(utxos: &[TransactionUnspentOutput]) -> Result<Value> {
    let mut coin: Coin = 0;
    let mut assets = MultiAsset::new();
    for utxo in utxos {
        coin = coin
            .checked_add(utxo.coin())
            .ok_or_else(|| CardanoError::TransactionBuild("input total overflows".into()))?;
        if let Some(ma) = &utxo.amount().multiasset {
            assets = assets
                .checked_add(ma)
                .ok_or_else(|| CardanoError::TransactionBuild("input assets overflow".into()))?;
        }
    }
    Ok(Value::with_assets(coin, assets))
}
