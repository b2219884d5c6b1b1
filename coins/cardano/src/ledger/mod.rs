//! Ledger primitives and their CBOR wire form.
//!
//! CIP-30 wallets exchange every ledger object as hex-encoded CBOR. This
//! module covers the subset the connector composes: values and multi-assets,
//! inputs/outputs/UTXOs, transaction bodies, vkey witness sets, auxiliary
//! metadata and complete transactions.

use std::convert::Infallible;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use minicbor::data::Type;
use minicbor::{Decoder, Encoder};
use thiserror::Error;

pub mod metadata;
pub mod transaction;
pub mod value;
pub mod witness;

pub use metadata::{AuxiliaryData, GeneralTransactionMetadata, MetadataMap, TransactionMetadatum};
pub use transaction::{
    Transaction, TransactionBody, TransactionInput, TransactionOutput, TransactionUnspentOutput,
};
pub use value::{AssetName, Assets, Coin, MultiAsset, PolicyId, Value};
pub use witness::{TransactionWitnessSet, Vkeywitness};

/// Errors raised while encoding or decoding ledger objects
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("CBOR decode error: {0}")]
    Decode(#[from] minicbor::decode::Error),

    #[error("CBOR encode error: {0}")]
    Encode(String),

    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Invalid {what}: {reason}")]
    Invalid { what: &'static str, reason: String },

    #[error("Trailing bytes after {0}")]
    TrailingBytes(&'static str),
}

impl From<minicbor::encode::Error<Infallible>> for LedgerError {
    fn from(err: minicbor::encode::Error<Infallible>) -> Self {
        LedgerError::Encode(err.to_string())
    }
}

impl LedgerError {
    pub(crate) fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        LedgerError::Invalid {
            what,
            reason: reason.into(),
        }
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// A ledger object with a canonical CBOR encoding
pub trait LedgerObject: Sized {
    /// Name used in error messages
    const NAME: &'static str;

    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()>;

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self>;

    fn to_bytes(&self) -> LedgerResult<Vec<u8>> {
        let mut e = Encoder::new(Vec::new());
        self.encode(&mut e)?;
        Ok(e.into_writer())
    }

    fn to_hex(&self) -> LedgerResult<String> {
        Ok(hex::encode(self.to_bytes()?))
    }

    /// Decodes exactly one object; trailing bytes are rejected
    fn from_bytes(bytes: &[u8]) -> LedgerResult<Self> {
        let mut d = Decoder::new(bytes);
        let value = Self::decode(&mut d)?;
        if d.position() != bytes.len() {
            return Err(LedgerError::TrailingBytes(Self::NAME));
        }
        Ok(value)
    }

    fn from_hex(hex_str: &str) -> LedgerResult<Self> {
        Self::from_bytes(&hex::decode(hex_str.trim())?)
    }
}

/// Blake2b-256, the ledger's hash for bodies and auxiliary data
pub fn blake2b_256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(bytes);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

/// Returns true once a container holding `len` entries (or an indefinite
/// one, `None`) has been fully read after `index` entries. Consumes the
/// break marker of indefinite containers.
pub(crate) fn container_done(
    d: &mut Decoder<'_>,
    len: Option<u64>,
    index: u64,
) -> LedgerResult<bool> {
    match len {
        Some(n) => Ok(index >= n),
        None => {
            if d.datatype()? == Type::Break {
                d.set_position(d.position() + 1);
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }
}

/// Skips the optional set tag (258) newer eras put in front of sets
pub(crate) fn skip_set_tag(d: &mut Decoder<'_>) -> LedgerResult<()> {
    if d.datatype()? == Type::Tag {
        d.tag()?;
    }
    Ok(())
}

/// Decodes a CBOR array of `T`, definite or indefinite
pub(crate) fn decode_array<T: LedgerObject>(d: &mut Decoder<'_>) -> LedgerResult<Vec<T>> {
    skip_set_tag(d)?;
    let len = d.array()?;
    let mut items = Vec::new();
    let mut i = 0;
    while !container_done(d, len, i)? {
        items.push(T::decode(d)?);
        i += 1;
    }
    Ok(items)
}

pub(crate) fn decode_fixed_bytes<const N: usize>(
    d: &mut Decoder<'_>,
    what: &'static str,
) -> LedgerResult<[u8; N]> {
    let bytes = d.bytes()?;
    <[u8; N]>::try_from(bytes).map_err(|_| {
        LedgerError::invalid(what, format!("expected {} bytes, got {}", N, bytes.len()))
    })
}
