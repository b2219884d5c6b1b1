use std::collections::BTreeMap;
use std::fmt;

use minicbor::data::Type;
use minicbor::{Decoder, Encoder};

use super::{container_done, decode_fixed_bytes, LedgerError, LedgerObject, LedgerResult};

/// Lovelace amount
pub type Coin = u64;

/// 28-byte minting policy hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolicyId([u8; 28]);

impl PolicyId {
    pub const LEN: usize = 28;

    pub fn new(bytes: [u8; 28]) -> Self {
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> LedgerResult<Self> {
        let raw = <[u8; 28]>::try_from(bytes).map_err(|_| {
            LedgerError::invalid("policy id", format!("expected 28 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(raw))
    }

    pub fn from_hex(hex_str: &str) -> LedgerResult<Self> {
        Self::from_bytes(&hex::decode(hex_str)?)
    }

    pub fn as_bytes(&self) -> &[u8; 28] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Asset name under a policy, at most 32 bytes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetName(Vec<u8>);

impl AssetName {
    pub const MAX_LEN: usize = 32;

    pub fn new(bytes: Vec<u8>) -> LedgerResult<Self> {
        if bytes.len() > Self::MAX_LEN {
            return Err(LedgerError::invalid(
                "asset name",
                format!("{} bytes exceeds the {} byte limit", bytes.len(), Self::MAX_LEN),
            ));
        }
        Ok(Self(bytes))
    }

    pub fn from_hex(hex_str: &str) -> LedgerResult<Self> {
        Self::new(hex::decode(hex_str)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Quantities per asset name under one policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assets(BTreeMap<AssetName, u64>);

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: AssetName, quantity: u64) -> Option<u64> {
        self.0.insert(name, quantity)
    }

    pub fn get(&self, name: &AssetName) -> Option<u64> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetName, &u64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Native assets grouped by policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiAsset(BTreeMap<PolicyId, Assets>);

impl MultiAsset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, policy: PolicyId, assets: Assets) -> Option<Assets> {
        self.0.insert(policy, assets)
    }

    pub fn get(&self, policy: &PolicyId) -> Option<&Assets> {
        self.0.get(policy)
    }

    /// Sets one quantity; a zero quantity removes the entry
    pub fn set_asset(&mut self, policy: PolicyId, name: AssetName, quantity: u64) {
        if quantity == 0 {
            if let Some(assets) = self.0.get_mut(&policy) {
                assets.0.remove(&name);
                if assets.is_empty() {
                    self.0.remove(&policy);
                }
            }
            return;
        }
        self.0.entry(policy).or_default().insert(name, quantity);
    }

    pub fn get_asset(&self, policy: &PolicyId, name: &AssetName) -> u64 {
        self.0
            .get(policy)
            .and_then(|assets| assets.get(name))
            .unwrap_or(0)
    }

    /// Iterates policies in map order
    pub fn iter(&self) -> impl Iterator<Item = (&PolicyId, &Assets)> {
        self.0.iter()
    }

    /// Iterates every (policy, name, quantity) triple
    pub fn triples(&self) -> impl Iterator<Item = (&PolicyId, &AssetName, u64)> {
        self.0.iter().flat_map(|(policy, assets)| {
            assets.iter().map(move |(name, quantity)| (policy, name, *quantity))
        })
    }

    /// Number of policies
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Assets::is_empty)
    }

    /// Number of distinct (policy, name) pairs
    pub fn asset_count(&self) -> usize {
        self.0.values().map(Assets::len).sum()
    }

    pub fn checked_add(&self, other: &MultiAsset) -> Option<MultiAsset> {
        let mut sum = self.clone();
        for (policy, name, quantity) in other.triples() {
            let total = sum.get_asset(policy, name).checked_add(quantity)?;
            sum.set_asset(*policy, name.clone(), total);
        }
        Some(sum)
    }

    /// Per-asset subtraction keeping only strictly positive leftovers
    pub fn saturating_sub(&self, other: &MultiAsset) -> MultiAsset {
        let mut rest = MultiAsset::new();
        for (policy, name, quantity) in self.triples() {
            let left = quantity.saturating_sub(other.get_asset(policy, name));
            rest.set_asset(*policy, name.clone(), left);
        }
        rest
    }

    /// First asset of `required` this multi-asset holds less of, as
    /// (policy, name, required, held)
    pub fn shortfall<'a>(
        &self,
        required: &'a MultiAsset,
    ) -> Option<(&'a PolicyId, &'a AssetName, u64, u64)> {
        required.triples().find_map(|(policy, name, quantity)| {
            let held = self.get_asset(policy, name);
            (held < quantity).then_some((policy, name, quantity, held))
        })
    }

    pub fn covers(&self, required: &MultiAsset) -> bool {
        self.shortfall(required).is_none()
    }
}

impl LedgerObject for MultiAsset {
    const NAME: &'static str = "multiasset";

    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()> {
        let policies: Vec<_> = self.0.iter().filter(|(_, a)| !a.is_empty()).collect();
        e.map(policies.len() as u64)?;
        for (policy, assets) in policies {
            e.bytes(policy.as_bytes())?;
            e.map(assets.len() as u64)?;
            for (name, quantity) in assets.iter() {
                e.bytes(name.as_bytes())?.u64(*quantity)?;
            }
        }
        Ok(())
    }

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self> {
        let mut multiasset = MultiAsset::new();
        let len = d.map()?;
        let mut i = 0;
        while !container_done(d, len, i)? {
            let policy = PolicyId::new(decode_fixed_bytes::<28>(d, "policy id")?);
            let mut assets = Assets::new();
            let inner = d.map()?;
            let mut j = 0;
            while !container_done(d, inner, j)? {
                let name = AssetName::new(d.bytes()?.to_vec())?;
                let quantity = d.u64()?;
                assets.insert(name, quantity);
                j += 1;
            }
            multiasset.insert(policy, assets);
            i += 1;
        }
        Ok(multiasset)
    }
}

/// Lovelace plus optional native assets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    pub coin: Coin,
    pub multiasset: Option<MultiAsset>,
}

impl Value {
    pub fn new(coin: Coin) -> Self {
        Self {
            coin,
            multiasset: None,
        }
    }

    /// An empty multi-asset collapses to a pure-ADA value
    pub fn with_assets(coin: Coin, multiasset: MultiAsset) -> Self {
        Self {
            coin,
            multiasset: (!multiasset.is_empty()).then_some(multiasset),
        }
    }

    pub fn has_assets(&self) -> bool {
        self.multiasset.as_ref().is_some_and(|ma| !ma.is_empty())
    }

    pub fn assets(&self) -> MultiAsset {
        self.multiasset.clone().unwrap_or_default()
    }

    pub fn checked_add(&self, other: &Value) -> Option<Value> {
        let coin = self.coin.checked_add(other.coin)?;
        let assets = self.assets().checked_add(&other.assets())?;
        Some(Value::with_assets(coin, assets))
    }
}

impl LedgerObject for Value {
    const NAME: &'static str = "value";

    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()> {
        match &self.multiasset {
            Some(ma) if !ma.is_empty() => {
                e.array(2)?.u64(self.coin)?;
                ma.encode(e)
            }
            _ => {
                e.u64(self.coin)?;
                Ok(())
            }
        }
    }

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self> {
        match d.datatype()? {
            Type::Array | Type::ArrayIndef => {
                let len = d.array()?;
                if let Some(n) = len {
                    if n != 2 {
                        return Err(LedgerError::invalid("value", format!("array of {n} items")));
                    }
                }
                let coin = d.u64()?;
                let multiasset = MultiAsset::decode(d)?;
                if len.is_none() && !container_done(d, None, 2)? {
                    return Err(LedgerError::invalid("value", "more than two items"));
                }
                Ok(Value::with_assets(coin, multiasset))
            }
            _ => Ok(Value::new(d.u64()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(byte: u8) -> PolicyId {
        PolicyId::new([byte; 28])
    }

    fn name(s: &str) -> AssetName {
        AssetName::new(s.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_pure_coin_encodes_as_uint() {
        let bytes = Value::new(1_000_000).to_bytes().unwrap();
        // major type 0, 4-byte argument
        assert_eq!(bytes, vec![0x1a, 0x00, 0x0f, 0x42, 0x40]);
    }

    #[test]
    fn test_multiasset_value_decodes() {
        let mut ma = MultiAsset::new();
        ma.set_asset(policy(1), name("TOKEN"), 42);
        let value = Value::with_assets(2_000_000, ma);

        let decoded = Value::from_bytes(&value.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.coin, 2_000_000);
        assert_eq!(decoded.assets().get_asset(&policy(1), &name("TOKEN")), 42);
    }

    #[test]
    fn test_empty_multiasset_collapses() {
        let value = Value::with_assets(5, MultiAsset::new());
        assert!(value.multiasset.is_none());
        assert!(!value.has_assets());
    }

    #[test]
    fn test_set_asset_zero_removes() {
        let mut ma = MultiAsset::new();
        ma.set_asset(policy(1), name("A"), 10);
        ma.set_asset(policy(1), name("A"), 0);
        assert!(ma.is_empty());
        assert_eq!(ma.len(), 0);
    }

    #[test]
    fn test_saturating_sub_and_shortfall() {
        let mut held = MultiAsset::new();
        held.set_asset(policy(1), name("A"), 10);
        held.set_asset(policy(2), name("B"), 3);

        let mut wanted = MultiAsset::new();
        wanted.set_asset(policy(1), name("A"), 4);
        assert!(held.covers(&wanted));

        let rest = held.saturating_sub(&wanted);
        assert_eq!(rest.get_asset(&policy(1), &name("A")), 6);
        assert_eq!(rest.get_asset(&policy(2), &name("B")), 3);

        wanted.set_asset(policy(2), name("B"), 5);
        let (p, n, required, have) = held.shortfall(&wanted).unwrap();
        assert_eq!((*p, n.clone(), required, have), (policy(2), name("B"), 5, 3));
    }

    #[test]
    fn test_checked_add_overflow() {
        let mut a = MultiAsset::new();
        a.set_asset(policy(1), name("A"), u64::MAX);
        let mut b = MultiAsset::new();
        b.set_asset(policy(1), name("A"), 1);
        assert!(a.checked_add(&b).is_none());
    }

    #[test]
    fn test_asset_name_limit() {
        assert!(AssetName::new(vec![0u8; 32]).is_ok());
        assert!(AssetName::new(vec![0u8; 33]).is_err());
    }

    #[test]
    fn test_policy_id_length() {
        assert!(PolicyId::from_hex(&"ab".repeat(28)).is_ok());
        assert!(PolicyId::from_hex(&"ab".repeat(27)).is_err());
    }
}
