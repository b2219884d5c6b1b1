//! Property tests for the asset codec and metadata layout

use proptest::prelude::*;
use walletd_cip30::asset::{fingerprint_of, split_unit};
use walletd_cip30::ledger::{LedgerObject, TransactionMetadatum, Value};
use walletd_cip30::{decode_balance, encode_multi_asset, AssetRequest, METADATA_LABEL};
use walletd_testing::{multi_asset, transfer_metadata, valid_quantity, value};

fn clamp(text: &str, start: usize, end: usize) -> &str {
    let end = end.min(text.len());
    let start = start.min(end);
    &text[start..end]
}

proptest! {
    #[test]
    fn prop_pure_ada_balance_decodes_empty(coin in any::<u64>()) {
        let hex = Value::new(coin).to_hex().unwrap();
        prop_assert!(decode_balance(&hex).unwrap().is_empty());
    }

    #[test]
    fn prop_units_split_back_into_policy_and_name(assets in multi_asset()) {
        let hex = Value::with_assets(2_000_000, assets.clone()).to_hex().unwrap();
        let entries = decode_balance(&hex).unwrap();
        prop_assert_eq!(entries.len(), assets.asset_count());
        for entry in &entries {
            prop_assert_eq!(entry.unit.len(), 56 + entry.asset_name.len());
            prop_assert_eq!(&entry.unit[..56], entry.policy.as_str());
            prop_assert_eq!(&entry.unit[56..], entry.asset_name.as_str());
            let (policy, name) = split_unit(&entry.unit).unwrap();
            prop_assert_eq!(assets.get_asset(&policy, &name).to_string(), entry.quantity.clone());
        }
    }

    #[test]
    fn prop_fingerprint_is_stable(assets in multi_asset()) {
        for (policy, name, _) in assets.triples() {
            let first = fingerprint_of(policy, name).unwrap();
            prop_assert_eq!(&first, &fingerprint_of(policy, name).unwrap());
            prop_assert!(first.starts_with("asset1"));
        }
    }

    #[test]
    fn prop_decoded_balance_reencodes(balance in value()) {
        let entries = decode_balance(&balance.to_hex().unwrap()).unwrap();
        let requests: Vec<AssetRequest> = entries.iter().map(AssetRequest::from).collect();
        let encoded = encode_multi_asset(&requests).unwrap();
        prop_assert_eq!(encoded, balance.assets());
    }

    #[test]
    fn prop_quantities_survive_encoding(quantity in valid_quantity()) {
        let unit = format!("{}{}", "ab".repeat(28), "01");
        let encoded = encode_multi_asset(&[AssetRequest::new(unit.clone(), quantity.clone())]).unwrap();
        let (policy, name) = split_unit(&unit).unwrap();
        prop_assert_eq!(encoded.get_asset(&policy, &name).to_string(), quantity);
    }

    #[test]
    fn prop_metadata_slices_inputs(metadata in transfer_metadata()) {
        let general = metadata.to_general_metadata().unwrap();
        let map = general
            .get(METADATA_LABEL)
            .and_then(TransactionMetadatum::as_map)
            .unwrap();
        prop_assert_eq!(map.len(), 6);

        let field = |key: &str| map.get_str(key).and_then(TransactionMetadatum::as_text).unwrap().to_string();
        let sig = &metadata.signature;
        let reg = &metadata.registration_id;
        prop_assert_eq!(field("s1"), clamp(sig, 0, 64));
        prop_assert_eq!(field("s2"), clamp(sig, 64, 128));
        prop_assert_eq!(field("s3"), clamp(sig, 128, 130));
        prop_assert_eq!(field("wid"), metadata.window_id.clone());
        prop_assert_eq!(field("r1"), clamp(reg, 0, 64));
        prop_assert_eq!(field("r2"), clamp(reg, 64, 88));
    }
}
