use minicbor::data::Type;
use minicbor::{Decoder, Encoder};

use super::{
    blake2b_256, container_done, decode_array, decode_fixed_bytes, AuxiliaryData, Coin,
    LedgerError, LedgerObject, LedgerResult, TransactionWitnessSet, Value,
};
use crate::address::CardanoAddress;

/// Reference to an output of an earlier transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionInput {
    pub transaction_id: [u8; 32],
    pub index: u64,
}

impl TransactionInput {
    pub fn new(transaction_id: [u8; 32], index: u64) -> Self {
        Self {
            transaction_id,
            index,
        }
    }

    pub fn transaction_id_hex(&self) -> String {
        hex::encode(self.transaction_id)
    }
}

impl LedgerObject for TransactionInput {
    const NAME: &'static str = "transaction input";

    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()> {
        e.array(2)?.bytes(&self.transaction_id)?.u64(self.index)?;
        Ok(())
    }

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self> {
        let len = d.array()?;
        let transaction_id = decode_fixed_bytes::<32>(d, "transaction id")?;
        let index = d.u64()?;
        if !container_done(d, len, 2)? {
            return Err(LedgerError::invalid(Self::NAME, "more than two items"));
        }
        Ok(Self::new(transaction_id, index))
    }
}

/// An output: address plus value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutput {
    pub address: CardanoAddress,
    pub amount: Value,
}

impl TransactionOutput {
    pub fn new(address: CardanoAddress, amount: Value) -> Self {
        Self { address, amount }
    }
}

impl LedgerObject for TransactionOutput {
    const NAME: &'static str = "transaction output";

    /// Always the legacy `[address, value]` form
    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()> {
        e.array(2)?.bytes(self.address.as_bytes())?;
        self.amount.encode(e)
    }

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self> {
        match d.datatype()? {
            Type::Array | Type::ArrayIndef => {
                let len = d.array()?;
                let address = CardanoAddress::from_bytes(d.bytes()?)?;
                let amount = Value::decode(d)?;
                // legacy datum hash
                let mut i = 2;
                while !container_done(d, len, i)? {
                    d.skip()?;
                    i += 1;
                }
                Ok(Self::new(address, amount))
            }
            Type::Map | Type::MapIndef => {
                let len = d.map()?;
                let mut address = None;
                let mut amount = None;
                let mut i = 0;
                while !container_done(d, len, i)? {
                    match d.u64()? {
                        0 => address = Some(CardanoAddress::from_bytes(d.bytes()?)?),
                        1 => amount = Some(Value::decode(d)?),
                        // datum option, script reference
                        _ => d.skip()?,
                    }
                    i += 1;
                }
                match (address, amount) {
                    (Some(address), Some(amount)) => Ok(Self::new(address, amount)),
                    _ => Err(LedgerError::invalid(Self::NAME, "missing address or value")),
                }
            }
            other => Err(LedgerError::invalid(
                Self::NAME,
                format!("unexpected CBOR type {other:?}"),
            )),
        }
    }
}

/// A spendable output as reported by the wallet, with the bytes it came in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionUnspentOutput {
    pub input: TransactionInput,
    pub output: TransactionOutput,
    raw: Vec<u8>,
}

impl TransactionUnspentOutput {
    pub fn new(input: TransactionInput, output: TransactionOutput) -> LedgerResult<Self> {
        let mut e = Encoder::new(Vec::new());
        e.array(2)?;
        input.encode(&mut e)?;
        output.encode(&mut e)?;
        Ok(Self {
            input,
            output,
            raw: e.into_writer(),
        })
    }

    pub fn coin(&self) -> Coin {
        self.output.amount.coin
    }

    pub fn amount(&self) -> &Value {
        &self.output.amount
    }

    pub fn address(&self) -> &CardanoAddress {
        &self.output.address
    }

    /// The serialized form, as accepted back by the wallet
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn raw_hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

impl LedgerObject for TransactionUnspentOutput {
    const NAME: &'static str = "unspent output";

    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()> {
        e.array(2)?;
        self.input.encode(e)?;
        self.output.encode(e)
    }

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self> {
        let start = d.position();
        let len = d.array()?;
        let input = TransactionInput::decode(d)?;
        let output = TransactionOutput::decode(d)?;
        if !container_done(d, len, 2)? {
            return Err(LedgerError::invalid(Self::NAME, "more than two items"));
        }
        let raw = d.input()[start..d.position()].to_vec();
        Ok(Self { input, output, raw })
    }
}

/// The signed part of a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionBody {
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub fee: Coin,
    pub ttl: Option<u64>,
    pub auxiliary_data_hash: Option<[u8; 32]>,
}

impl TransactionBody {
    /// Blake2b-256 of the encoded body; the transaction id
    pub fn hash(&self) -> LedgerResult<[u8; 32]> {
        Ok(blake2b_256(&self.to_bytes()?))
    }

    pub fn hash_hex(&self) -> LedgerResult<String> {
        Ok(hex::encode(self.hash()?))
    }
}

impl LedgerObject for TransactionBody {
    const NAME: &'static str = "transaction body";

    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()> {
        let entries = 3 + self.ttl.is_some() as u64 + self.auxiliary_data_hash.is_some() as u64;
        e.map(entries)?;

        e.u64(0)?.array(self.inputs.len() as u64)?;
        for input in &self.inputs {
            input.encode(e)?;
        }

        e.u64(1)?.array(self.outputs.len() as u64)?;
        for output in &self.outputs {
            output.encode(e)?;
        }

        e.u64(2)?.u64(self.fee)?;

        if let Some(ttl) = self.ttl {
            e.u64(3)?.u64(ttl)?;
        }
        if let Some(hash) = &self.auxiliary_data_hash {
            e.u64(7)?.bytes(hash)?;
        }
        Ok(())
    }

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self> {
        let mut body = TransactionBody::default();
        let len = d.map()?;
        let mut i = 0;
        while !container_done(d, len, i)? {
            match d.u64()? {
                0 => body.inputs = decode_array(d)?,
                1 => body.outputs = decode_array(d)?,
                2 => body.fee = d.u64()?,
                3 => body.ttl = Some(d.u64()?),
                7 => body.auxiliary_data_hash = Some(decode_fixed_bytes::<32>(d, "auxiliary data hash")?),
                key => {
                    tracing::debug!(key, "skipping unsupported transaction body field");
                    d.skip()?;
                }
            }
            i += 1;
        }
        Ok(body)
    }
}

/// A complete transaction: body, witnesses, validity flag, auxiliary data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub body: TransactionBody,
    pub witness_set: TransactionWitnessSet,
    pub is_valid: bool,
    pub auxiliary_data: Option<AuxiliaryData>,
}

impl Transaction {
    pub fn new(
        body: TransactionBody,
        witness_set: TransactionWitnessSet,
        auxiliary_data: Option<AuxiliaryData>,
    ) -> Self {
        Self {
            body,
            witness_set,
            is_valid: true,
            auxiliary_data,
        }
    }

    /// Encoded size in bytes
    pub fn size(&self) -> LedgerResult<usize> {
        Ok(self.to_bytes()?.len())
    }
}

impl LedgerObject for Transaction {
    const NAME: &'static str = "transaction";

    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()> {
        e.array(4)?;
        self.body.encode(e)?;
        self.witness_set.encode(e)?;
        e.bool(self.is_valid)?;
        match &self.auxiliary_data {
            Some(aux) => aux.encode(e),
            None => {
                e.null()?;
                Ok(())
            }
        }
    }

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self> {
        let len = d.array()?;
        let body = TransactionBody::decode(d)?;
        let witness_set = TransactionWitnessSet::decode(d)?;
        // Mary-era transactions have no validity flag
        let is_valid = match len {
            Some(3) => true,
            _ if d.datatype()? == Type::Bool => d.bool()?,
            _ => true,
        };
        let auxiliary_data = if d.datatype()? == Type::Null {
            d.null()?;
            None
        } else {
            Some(AuxiliaryData::decode(d)?)
        };
        let read = if len == Some(3) { 3 } else { 4 };
        if !container_done(d, len, read)? {
            return Err(LedgerError::invalid(Self::NAME, "unexpected trailing items"));
        }
        Ok(Self {
            body,
            witness_set,
            is_valid,
            auxiliary_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::CardanoAddress;

    fn address() -> CardanoAddress {
        CardanoAddress::enterprise_from_key_hash([9u8; 28], 0)
    }

    fn body() -> TransactionBody {
        TransactionBody {
            inputs: vec![TransactionInput::new([1u8; 32], 0)],
            outputs: vec![TransactionOutput::new(address(), Value::new(2_000_000))],
            fee: 170_000,
            ttl: None,
            auxiliary_data_hash: None,
        }
    }

    #[test]
    fn test_body_decodes_to_same_fields() {
        let decoded = TransactionBody::from_bytes(&body().to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, body());
    }

    #[test]
    fn test_body_hash_is_stable() {
        assert_eq!(body().hash().unwrap(), body().hash().unwrap());
        let mut other = body();
        other.fee += 1;
        assert_ne!(body().hash().unwrap(), other.hash().unwrap());
    }

    #[test]
    fn test_utxo_keeps_raw_bytes() {
        let utxo = TransactionUnspentOutput::new(
            TransactionInput::new([3u8; 32], 1),
            TransactionOutput::new(address(), Value::new(5_000_000)),
        )
        .unwrap();
        let decoded = TransactionUnspentOutput::from_hex(&utxo.raw_hex()).unwrap();
        assert_eq!(decoded.raw_bytes(), utxo.raw_bytes());
        assert_eq!(decoded.coin(), 5_000_000);
        assert_eq!(decoded.input.index, 1);
    }

    #[test]
    fn test_map_form_output_decodes() {
        // {0: address, 1: 3000000, 2: [0, h'aa']}
        let mut e = Encoder::new(Vec::new());
        e.map(3).unwrap();
        e.u64(0).unwrap().bytes(address().as_bytes()).unwrap();
        e.u64(1).unwrap().u64(3_000_000).unwrap();
        e.u64(2).unwrap().array(2).unwrap().u64(0).unwrap().bytes(&[0xaa]).unwrap();
        let bytes = e.into_writer();

        let output = TransactionOutput::from_bytes(&bytes).unwrap();
        assert_eq!(output.amount.coin, 3_000_000);
        assert_eq!(output.address, address());
    }

    #[test]
    fn test_transaction_without_aux_encodes_null() {
        let tx = Transaction::new(body(), TransactionWitnessSet::new(), None);
        let bytes = tx.to_bytes().unwrap();
        assert_eq!(bytes[0], 0x84);
        assert_eq!(*bytes.last().unwrap(), 0xf6);

        let decoded = Transaction::from_bytes(&bytes).unwrap();
        assert!(decoded.is_valid);
        assert!(decoded.auxiliary_data.is_none());
        assert_eq!(decoded.body, body());
    }
}
