use std::collections::BTreeMap;

use minicbor::data::{Int, Type};
use minicbor::{Decoder, Encoder};

use super::{blake2b_256, container_done, LedgerError, LedgerObject, LedgerResult};

/// Longest text or bytes metadatum the ledger accepts
pub const MAX_METADATUM_LEN: usize = 64;

/// A metadata value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionMetadatum {
    Map(MetadataMap),
    List(Vec<TransactionMetadatum>),
    /// Any CBOR integer, `-2^64..=2^64-1`
    Int(i128),
    Bytes(Vec<u8>),
    Text(String),
}

impl TransactionMetadatum {
    pub fn new_text(text: impl Into<String>) -> LedgerResult<Self> {
        let text = text.into();
        if text.len() > MAX_METADATUM_LEN {
            return Err(LedgerError::invalid(
                "metadata text",
                format!("{} bytes exceeds {}", text.len(), MAX_METADATUM_LEN),
            ));
        }
        Ok(Self::Text(text))
    }

    pub fn new_bytes(bytes: Vec<u8>) -> LedgerResult<Self> {
        if bytes.len() > MAX_METADATUM_LEN {
            return Err(LedgerError::invalid(
                "metadata bytes",
                format!("{} bytes exceeds {}", bytes.len(), MAX_METADATUM_LEN),
            ));
        }
        Ok(Self::Bytes(bytes))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MetadataMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl LedgerObject for TransactionMetadatum {
    const NAME: &'static str = "metadatum";

    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()> {
        match self {
            Self::Map(map) => map.encode(e)?,
            Self::List(items) => {
                e.array(items.len() as u64)?;
                for item in items {
                    item.encode(e)?;
                }
            }
            Self::Int(n) => {
                let int = Int::try_from(*n).map_err(|_| {
                    LedgerError::invalid(Self::NAME, format!("{n} is outside the CBOR integer range"))
                })?;
                e.int(int)?;
            }
            Self::Bytes(bytes) => {
                e.bytes(bytes)?;
            }
            Self::Text(text) => {
                e.str(text)?;
            }
        }
        Ok(())
    }

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self> {
        match d.datatype()? {
            Type::Map | Type::MapIndef => Ok(Self::Map(MetadataMap::decode(d)?)),
            Type::Array | Type::ArrayIndef => {
                let len = d.array()?;
                let mut items = Vec::new();
                let mut i = 0;
                while !container_done(d, len, i)? {
                    items.push(Self::decode(d)?);
                    i += 1;
                }
                Ok(Self::List(items))
            }
            Type::U8
            | Type::U16
            | Type::U32
            | Type::U64
            | Type::I8
            | Type::I16
            | Type::I32
            | Type::I64
            | Type::Int => Ok(Self::Int(i128::from(d.int()?))),
            Type::Bytes => Self::new_bytes(d.bytes()?.to_vec()),
            Type::String => Self::new_text(d.str()?),
            other => Err(LedgerError::invalid(
                Self::NAME,
                format!("unsupported CBOR type {other:?}"),
            )),
        }
    }
}

/// Metadata map; keeps insertion order on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMap {
    entries: Vec<(TransactionMetadatum, TransactionMetadatum)>,
}

impl MetadataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces in place; returns the previous value
    pub fn insert(
        &mut self,
        key: TransactionMetadatum,
        value: TransactionMetadatum,
    ) -> Option<TransactionMetadatum> {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &TransactionMetadatum) -> Option<&TransactionMetadatum> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Looks up a text key
    pub fn get_str(&self, key: &str) -> Option<&TransactionMetadatum> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &TransactionMetadatum> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LedgerObject for MetadataMap {
    const NAME: &'static str = "metadata map";

    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()> {
        e.map(self.entries.len() as u64)?;
        for (key, value) in &self.entries {
            key.encode(e)?;
            value.encode(e)?;
        }
        Ok(())
    }

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self> {
        let mut map = MetadataMap::new();
        let len = d.map()?;
        let mut i = 0;
        while !container_done(d, len, i)? {
            let key = TransactionMetadatum::decode(d)?;
            let value = TransactionMetadatum::decode(d)?;
            map.insert(key, value);
            i += 1;
        }
        Ok(map)
    }
}

/// Metadata by label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneralTransactionMetadata(BTreeMap<u64, TransactionMetadatum>);

impl GeneralTransactionMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: u64, metadatum: TransactionMetadatum) -> Option<TransactionMetadatum> {
        self.0.insert(label, metadatum)
    }

    pub fn get(&self, label: u64) -> Option<&TransactionMetadatum> {
        self.0.get(&label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl LedgerObject for GeneralTransactionMetadata {
    const NAME: &'static str = "transaction metadata";

    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()> {
        e.map(self.0.len() as u64)?;
        for (label, metadatum) in &self.0 {
            e.u64(*label)?;
            metadatum.encode(e)?;
        }
        Ok(())
    }

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self> {
        let mut metadata = GeneralTransactionMetadata::new();
        let len = d.map()?;
        let mut i = 0;
        while !container_done(d, len, i)? {
            let label = d.u64()?;
            metadata.insert(label, TransactionMetadatum::decode(d)?);
            i += 1;
        }
        Ok(metadata)
    }
}

/// Auxiliary data. Encoded in the Shelley form (a bare metadata map);
/// the later array and tagged forms are accepted on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryData {
    metadata: Option<GeneralTransactionMetadata>,
}

impl AuxiliaryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(metadata: GeneralTransactionMetadata) -> Self {
        Self {
            metadata: Some(metadata),
        }
    }

    pub fn metadata(&self) -> Option<&GeneralTransactionMetadata> {
        self.metadata.as_ref()
    }

    /// Blake2b-256 of the encoding, committed to in the body
    pub fn hash(&self) -> LedgerResult<[u8; 32]> {
        Ok(blake2b_256(&self.to_bytes()?))
    }
}

impl LedgerObject for AuxiliaryData {
    const NAME: &'static str = "auxiliary data";

    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()> {
        match &self.metadata {
            Some(metadata) => metadata.encode(e),
            None => {
                e.map(0)?;
                Ok(())
            }
        }
    }

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self> {
        match d.datatype()? {
            Type::Map | Type::MapIndef => Ok(Self::with_metadata(GeneralTransactionMetadata::decode(d)?)),
            // [metadata, native scripts]
            Type::Array | Type::ArrayIndef => {
                let len = d.array()?;
                let metadata = GeneralTransactionMetadata::decode(d)?;
                let mut i = 1;
                while !container_done(d, len, i)? {
                    d.skip()?;
                    i += 1;
                }
                Ok(Self::with_metadata(metadata))
            }
            // 259({0: metadata, ..scripts})
            Type::Tag => {
                d.tag()?;
                let len = d.map()?;
                let mut aux = AuxiliaryData::new();
                let mut i = 0;
                while !container_done(d, len, i)? {
                    match d.u64()? {
                        0 => aux.metadata = Some(GeneralTransactionMetadata::decode(d)?),
                        _ => d.skip()?,
                    }
                    i += 1;
                }
                Ok(aux)
            }
            other => Err(LedgerError::invalid(
                Self::NAME,
                format!("unexpected CBOR type {other:?}"),
            )),
        }
    }
}
