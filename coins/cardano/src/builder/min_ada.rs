//! Alonzo-era minimum ADA per output.
//!
//! `min = (27 + size(value) + dataHash?10:0) * coinsPerUtxoWord`, where
//! size is measured in 8-byte words: 2 for a pure ADA value, otherwise
//! `6 + ceil((12 * assets + Σ distinct name lengths + 28 * policies) / 8)`.

use std::collections::BTreeSet;

use crate::ledger::{Coin, Value};

const UTXO_ENTRY_SIZE_WITHOUT_VAL: u64 = 27;
const DATA_HASH_SIZE: u64 = 10;
const ADA_ONLY_SIZE: u64 = 2;
const BUNDLE_BASE: u64 = 6;
const ASSET_WEIGHT: u64 = 12;
const POLICY_ID_SIZE: u64 = 28;

/// Size of a value in words as the minimum-ADA rule counts it
pub fn bundle_size(value: &Value) -> u64 {
    let Some(multiasset) = value.multiasset.as_ref().filter(|ma| !ma.is_empty()) else {
        return ADA_ONLY_SIZE;
    };
    let assets = multiasset.asset_count() as u64;
    let policies = multiasset.iter().filter(|(_, a)| !a.is_empty()).count() as u64;
    let names: BTreeSet<&[u8]> = multiasset
        .triples()
        .map(|(_, name, _)| name.as_bytes())
        .collect();
    let name_bytes: u64 = names.iter().map(|n| n.len() as u64).sum();

    let bytes = assets * ASSET_WEIGHT + name_bytes + policies * POLICY_ID_SIZE;
    BUNDLE_BASE + bytes.div_ceil(8)
}

/// Minimum lovelace an output carrying `value` must hold
pub fn min_ada_required(value: &Value, has_data_hash: bool, coins_per_utxo_word: Coin) -> Coin {
    let data_hash = if has_data_hash { DATA_HASH_SIZE } else { 0 };
    let words = UTXO_ENTRY_SIZE_WITHOUT_VAL + bundle_size(value) + data_hash;
    coins_per_utxo_word.saturating_mul(words)
}
