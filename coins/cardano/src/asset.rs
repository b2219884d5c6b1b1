//! Native asset codec.
//!
//! Turns the hex-encoded value a wallet reports from `getBalance` into flat
//! [`AssetEntry`] records, and turns transfer requests keyed by `unit`
//! (policy id hex followed by asset name hex) back into a [`MultiAsset`].

use bech32::{Bech32, Hrp};
use blake2::digest::consts::U20;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

use crate::error::{CardanoError, Result};
use crate::ledger::{AssetName, LedgerObject, MultiAsset, PolicyId, Value};

/// Hex length of a policy id
pub const POLICY_ID_HEX_LEN: usize = PolicyId::LEN * 2;

const FINGERPRINT_HRP: &str = "asset";

/// One native asset held by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    /// Policy id hex followed by asset name hex
    pub unit: String,
    pub policy: String,
    pub asset_name: String,
    /// Asset name decoded as 7-bit ASCII
    pub name: String,
    pub fingerprint: String,
    /// Base-unit quantity as a decimal string
    pub quantity: String,
}

impl AssetEntry {
    pub fn new(policy: &PolicyId, name: &AssetName, quantity: u64) -> Result<Self> {
        let policy_hex = policy.to_hex();
        let name_hex = name.to_hex();
        Ok(Self {
            unit: format!("{policy_hex}{name_hex}"),
            fingerprint: fingerprint_of(policy, name)?,
            name: hex_to_ascii(name.as_bytes()),
            policy: policy_hex,
            asset_name: name_hex,
            quantity: quantity.to_string(),
        })
    }
}

/// A `{unit, quantity}` pair to put into a multi-asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRequest {
    pub unit: String,
    pub quantity: String,
}

impl AssetRequest {
    pub fn new(unit: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            quantity: quantity.into(),
        }
    }
}

impl From<&AssetEntry> for AssetRequest {
    fn from(entry: &AssetEntry) -> Self {
        Self::new(entry.unit.clone(), entry.quantity.clone())
    }
}

/// Decodes a `getBalance` result. ADA-only balances yield no entries.
pub fn decode_balance(raw_hex: &str) -> Result<Vec<AssetEntry>> {
    let value = Value::from_hex(raw_hex)?;
    entries_from_value(&value)
}

/// Flattens the multi-asset part of a value, in map order
pub fn entries_from_value(value: &Value) -> Result<Vec<AssetEntry>> {
    let Some(multiasset) = &value.multiasset else {
        return Ok(Vec::new());
    };
    multiasset
        .triples()
        .map(|(policy, name, quantity)| AssetEntry::new(policy, name, quantity))
        .collect()
}

/// Groups requests by policy into a multi-asset. Repeated units are summed.
pub fn encode_multi_asset(requests: &[AssetRequest]) -> Result<MultiAsset> {
    let mut multiasset = MultiAsset::new();
    for request in requests {
        let (policy, name) = split_unit(&request.unit)?;
        let quantity = parse_quantity(&request.quantity)?;
        let total = multiasset
            .get_asset(&policy, &name)
            .checked_add(quantity)
            .ok_or_else(|| {
                CardanoError::InvalidQuantity(format!("total for {} overflows", request.unit))
            })?;
        multiasset.set_asset(policy, name, total);
    }
    Ok(multiasset)
}

/// Splits a unit into its 28-byte policy id and asset name
pub fn split_unit(unit: &str) -> Result<(PolicyId, AssetName)> {
    let invalid = |reason: &str| CardanoError::InvalidAssetUnit(format!("{unit}: {reason}"));

    if unit.len() < POLICY_ID_HEX_LEN {
        return Err(invalid("shorter than a policy id"));
    }
    if unit.len() % 2 != 0 || !unit.is_ascii() {
        return Err(invalid("not a whole number of hex bytes"));
    }
    let (policy_hex, name_hex) = unit.split_at(POLICY_ID_HEX_LEN);
    let policy = PolicyId::from_hex(policy_hex).map_err(|e| invalid(&e.to_string()))?;
    let name = AssetName::from_hex(name_hex).map_err(|e| invalid(&e.to_string()))?;
    Ok((policy, name))
}

/// Parses a strictly positive base-unit quantity
pub fn parse_quantity(quantity: &str) -> Result<u64> {
    let trimmed = quantity.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CardanoError::InvalidQuantity(format!(
            "{quantity:?} is not a whole number"
        )));
    }
    match trimmed.parse::<u64>() {
        Ok(0) => Err(CardanoError::InvalidQuantity("quantity must be positive".into())),
        Ok(value) => Ok(value),
        Err(e) => Err(CardanoError::InvalidQuantity(format!("{quantity}: {e}"))),
    }
}

/// CIP-14 fingerprint from hex parts
pub fn fingerprint(policy_hex: &str, asset_name_hex: &str) -> Result<String> {
    let policy = PolicyId::from_hex(policy_hex)
        .map_err(|e| CardanoError::InvalidAssetUnit(format!("{policy_hex}: {e}")))?;
    let name = AssetName::from_hex(asset_name_hex)
        .map_err(|e| CardanoError::InvalidAssetUnit(format!("{asset_name_hex}: {e}")))?;
    fingerprint_of(&policy, &name)
}

/// CIP-14: bech32("asset", blake2b-160(policy ‖ name))
pub fn fingerprint_of(policy: &PolicyId, name: &AssetName) -> Result<String> {
    let mut hasher = Blake2b::<U20>::new();
    hasher.update(policy.as_bytes());
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let hrp = Hrp::parse(FINGERPRINT_HRP)
        .map_err(|e| CardanoError::InvalidAssetUnit(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, &digest).map_err(|e| CardanoError::InvalidAssetUnit(e.to_string()))
}

/// Decodes name bytes the way a 7-bit ASCII decoder does (high bit dropped)
pub fn hex_to_ascii(bytes: &[u8]) -> String {
    bytes.iter().map(|b| char::from(b & 0x7f)).collect()
}

/// Renders a base-unit quantity with `decimals` fractional digits,
/// trailing zeros trimmed (`1500000`, 6 -> `1.5`)
pub fn from_base_units(quantity: &str, decimals: u32) -> Result<String> {
    let digits = quantity.trim().trim_start_matches('0');
    if !quantity.trim().bytes().all(|b| b.is_ascii_digit()) || quantity.trim().is_empty() {
        return Err(CardanoError::InvalidQuantity(format!(
            "{quantity:?} is not a whole number"
        )));
    }
    let decimals = decimals as usize;
    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        Ok(whole.to_string())
    } else {
        Ok(format!("{whole}.{fraction}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "7eae28af2208be856f7a119668ae52a49b73725e326dc16579dcc373";

    fn balance_hex(coin: u64, assets: &[(&str, &[u8], u64)]) -> String {
        let mut multiasset = MultiAsset::new();
        for (policy, name, quantity) in assets {
            multiasset.set_asset(
                PolicyId::from_hex(policy).unwrap(),
                AssetName::new(name.to_vec()).unwrap(),
                *quantity,
            );
        }
        Value::with_assets(coin, multiasset).to_hex().unwrap()
    }

    #[test]
    fn test_fingerprint_vectors() {
        assert_eq!(
            fingerprint(POLICY, "").unwrap(),
            "asset1rjklcrnsdzqp65wjgrg55sy9723kw09mlgvlc3"
        );
        assert_eq!(
            fingerprint(POLICY, "504154415445").unwrap(),
            "asset13n25uv0yaf5kus35fm2k86cqy60z58d9xmde92"
        );
    }

    #[test]
    fn test_ada_only_balance_is_empty() {
        let raw = Value::new(12_000_000).to_hex().unwrap();
        assert!(decode_balance(&raw).unwrap().is_empty());
    }

    #[test]
    fn test_decode_balance_entries() {
        let raw = balance_hex(5_000_000, &[(POLICY, b"PATATE", 150)]);
        let entries = decode_balance(&raw).unwrap();
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.unit, format!("{POLICY}504154415445"));
        assert_eq!(entry.policy, POLICY);
        assert_eq!(entry.asset_name, "504154415445");
        assert_eq!(entry.name, "PATATE");
        assert_eq!(entry.quantity, "150");
        assert_eq!(entry.fingerprint, "asset13n25uv0yaf5kus35fm2k86cqy60z58d9xmde92");
        assert_eq!(&entry.unit[..POLICY_ID_HEX_LEN], entry.policy);
        assert_eq!(&entry.unit[POLICY_ID_HEX_LEN..], entry.asset_name);
    }

    #[test]
    fn test_encode_multi_asset_groups_and_sums() {
        let other = "ab".repeat(28);
        let requests = vec![
            AssetRequest::new(format!("{POLICY}4141"), "10"),
            AssetRequest::new(format!("{POLICY}4242"), "3"),
            AssetRequest::new(other, "7"),
            AssetRequest::new(format!("{POLICY}4141"), "5"),
        ];
        let multiasset = encode_multi_asset(&requests).unwrap();
        assert_eq!(multiasset.len(), 2);
        assert_eq!(multiasset.asset_count(), 3);

        let policy = PolicyId::from_hex(POLICY).unwrap();
        let aa = AssetName::from_hex("4141").unwrap();
        assert_eq!(multiasset.get_asset(&policy, &aa), 15);
    }

    #[test]
    fn test_encode_multi_asset_rejects_bad_units() {
        let short = AssetRequest::new("abcd", "1");
        assert!(matches!(
            encode_multi_asset(&[short]),
            Err(CardanoError::InvalidAssetUnit(_))
        ));

        let odd = AssetRequest::new(format!("{POLICY}414"), "1");
        assert!(matches!(
            encode_multi_asset(&[odd]),
            Err(CardanoError::InvalidAssetUnit(_))
        ));

        let not_hex = AssetRequest::new(format!("{POLICY}zz"), "1");
        assert!(matches!(
            encode_multi_asset(&[not_hex]),
            Err(CardanoError::InvalidAssetUnit(_))
        ));

        let long_name = AssetRequest::new(format!("{POLICY}{}", "00".repeat(33)), "1");
        assert!(matches!(
            encode_multi_asset(&[long_name]),
            Err(CardanoError::InvalidAssetUnit(_))
        ));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("42").unwrap(), 42);
        assert!(parse_quantity("0").is_err());
        assert!(parse_quantity("-1").is_err());
        assert!(parse_quantity("1.5").is_err());
        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("99999999999999999999999").is_err());
    }

    #[test]
    fn test_round_trip_through_requests() {
        let raw = balance_hex(
            2_000_000,
            &[(POLICY, b"A", 1), (POLICY, b"B", 2), (&"cd".repeat(28), b"", 3)],
        );
        let entries = decode_balance(&raw).unwrap();
        let requests: Vec<AssetRequest> = entries.iter().map(AssetRequest::from).collect();
        let encoded = encode_multi_asset(&requests).unwrap();
        let original = Value::from_hex(&raw).unwrap().assets();
        assert_eq!(encoded, original);
    }

    #[test]
    fn test_hex_to_ascii_masks_high_bit() {
        assert_eq!(hex_to_ascii(b"TOKEN"), "TOKEN");
        assert_eq!(hex_to_ascii(&[0xc1]), "A");
    }

    #[test]
    fn test_from_base_units() {
        assert_eq!(from_base_units("1500000", 6).unwrap(), "1.5");
        assert_eq!(from_base_units("2000000", 6).unwrap(), "2");
        assert_eq!(from_base_units("1", 6).unwrap(), "0.000001");
        assert_eq!(from_base_units("0", 6).unwrap(), "0");
        assert_eq!(from_base_units("123", 0).unwrap(), "123");
        assert!(from_base_units("1e6", 6).is_err());
    }
}
