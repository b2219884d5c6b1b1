#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use walletd_cip30::CardanoAddress;

#[derive(Debug, Arbitrary)]
enum AddressInput {
    Text(String),
    Bytes(Vec<u8>),
}

fuzz_target!(|input: AddressInput| {
    let parsed = match input {
        AddressInput::Text(text) => CardanoAddress::parse(&text),
        AddressInput::Bytes(bytes) => CardanoAddress::from_hex(&hex::encode(bytes)),
    };
    let Ok(address) = parsed else {
        return;
    };

    // Accepted addresses render and parse back to themselves
    if let Ok(rendered) = address.to_bech32() {
        let reparsed = CardanoAddress::parse(&rendered).expect("rendered address parses");
        assert_eq!(reparsed, address);
    }
    assert_eq!(CardanoAddress::from_hex(&address.to_hex()).ok(), Some(address));
});
