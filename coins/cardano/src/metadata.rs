//! Fixed metadata layout for registration transfers.
//!
//! Label 1 carries a six-key text map, always in this order:
//!
//! | key   | content                                   |
//! |-------|-------------------------------------------|
//! | `s1`  | signature hex chars `0..64`   (r)         |
//! | `s2`  | signature hex chars `64..128` (s)         |
//! | `s3`  | signature hex chars `128..130` (v)        |
//! | `wid` | airdrop window id                         |
//! | `r1`  | registration id chars `0..64`             |
//! | `r2`  | registration id chars `64..88`            |
//!
//! Short inputs are not an error: a slice past the end is an empty string.

use serde::{Deserialize, Serialize};

use crate::error::{CardanoError, Result};
use crate::ledger::{GeneralTransactionMetadata, MetadataMap, TransactionMetadatum};

/// Metadata label the map is stored under
pub const METADATA_LABEL: u64 = 1;

/// Caller-supplied metadata payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMetadata {
    pub signature: String,
    #[serde(rename = "registrationId")]
    pub registration_id: String,
    #[serde(rename = "airdropWindowId")]
    pub window_id: String,
}

impl TransferMetadata {
    pub fn new(
        signature: impl Into<String>,
        registration_id: impl Into<String>,
        window_id: impl Into<String>,
    ) -> Self {
        Self {
            signature: signature.into(),
            registration_id: registration_id.into(),
            window_id: window_id.into(),
        }
    }

    /// The six (key, value) pairs in wire order
    pub fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("s1", slice_chars(&self.signature, 0, 64)),
            ("s2", slice_chars(&self.signature, 64, 128)),
            ("s3", slice_chars(&self.signature, 128, 130)),
            ("wid", self.window_id.as_str()),
            ("r1", slice_chars(&self.registration_id, 0, 64)),
            ("r2", slice_chars(&self.registration_id, 64, 88)),
        ]
    }

    /// Builds the label-1 metadata
    pub fn to_general_metadata(&self) -> Result<GeneralTransactionMetadata> {
        let mut map = MetadataMap::new();
        for (key, value) in self.fields() {
            map.insert(text(key)?, text(value)?);
        }
        let mut metadata = GeneralTransactionMetadata::new();
        metadata.insert(METADATA_LABEL, TransactionMetadatum::Map(map));
        Ok(metadata)
    }
}

fn text(value: &str) -> Result<TransactionMetadatum> {
    TransactionMetadatum::new_text(value).map_err(|e| CardanoError::InvalidMetadata(e.to_string()))
}

/// Character slice `[start, end)` clamped to the string
fn slice_chars(value: &str, start: usize, end: usize) -> &str {
    let byte_at = |n: usize| {
        value
            .char_indices()
            .nth(n)
            .map(|(i, _)| i)
            .unwrap_or(value.len())
    };
    let from = byte_at(start);
    let to = byte_at(end).max(from);
    &value[from..to]
}
