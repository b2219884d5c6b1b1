#![no_main]

use libfuzzer_sys::fuzz_target;
use walletd_cip30::asset::AssetRequest;
use walletd_cip30::{decode_balance, encode_multi_asset};

fuzz_target!(|data: &[u8]| {
    // Arbitrary wallet output must never panic the decoder
    let Ok(entries) = decode_balance(&hex::encode(data)) else {
        return;
    };

    for entry in &entries {
        assert_eq!(entry.unit.len(), 56 + entry.asset_name.len());
        assert!(entry.fingerprint.starts_with("asset1"));
    }

    // Whatever decoded with a positive quantity must encode back
    let requests: Vec<AssetRequest> = entries
        .iter()
        .filter(|entry| entry.quantity != "0")
        .map(AssetRequest::from)
        .collect();
    let encoded = encode_multi_asset(&requests).expect("decoded entries re-encode");
    assert_eq!(encoded.asset_count(), requests.len());
});
