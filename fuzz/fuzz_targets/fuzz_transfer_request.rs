#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use walletd_cip30::{TransferMetadata, TransferRequest};

#[derive(Debug, Arbitrary)]
struct RequestInput {
    recipient: String,
    unit: Option<String>,
    quantity: String,
    metadata: Option<(String, String, String)>,
}

fuzz_target!(|input: RequestInput| {
    let mut request = match input.unit {
        Some(unit) => {
            let (policy, name) = unit.split_at(unit.char_indices().nth(56).map_or(unit.len(), |(i, _)| i));
            TransferRequest::native(input.recipient, policy, name, input.quantity)
        }
        None => TransferRequest::ada(input.recipient, input.quantity),
    };
    if let Some((signature, registration, window)) = input.metadata {
        request = request.with_metadata(TransferMetadata::new(signature, registration, window));
    }

    // Validation either succeeds or reports an input error
    if let Err(err) = request.validate() {
        assert!(err.is_input_error(), "{err:?}");
    }
});
