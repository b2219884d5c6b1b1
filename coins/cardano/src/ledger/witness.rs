use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use minicbor::{Decoder, Encoder};

use super::{container_done, decode_array, decode_fixed_bytes, LedgerError, LedgerObject, LedgerResult};

/// Verification key plus ed25519 signature over a body hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vkeywitness {
    pub vkey: [u8; 32],
    pub signature: [u8; 64],
}

impl Vkeywitness {
    pub fn new(vkey: [u8; 32], signature: [u8; 64]) -> Self {
        Self { vkey, signature }
    }

    /// Checks the signature against `message` (a transaction body hash)
    pub fn verify(&self, message: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.vkey) else {
            return false;
        };
        let signature = Signature::from_bytes(&self.signature);
        key.verify(message, &signature).is_ok()
    }
}

impl LedgerObject for Vkeywitness {
    const NAME: &'static str = "vkey witness";

    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()> {
        e.array(2)?.bytes(&self.vkey)?.bytes(&self.signature)?;
        Ok(())
    }

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self> {
        let len = d.array()?;
        let vkey = decode_fixed_bytes::<32>(d, "verification key")?;
        let signature = decode_fixed_bytes::<64>(d, "signature")?;
        if !container_done(d, len, 2)? {
            return Err(LedgerError::invalid(Self::NAME, "more than two items"));
        }
        Ok(Self::new(vkey, signature))
    }
}

/// Witness set. Only verification-key witnesses are modelled; other
/// witness kinds are skipped on decode and their map keys remembered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionWitnessSet {
    vkeys: Option<Vec<Vkeywitness>>,
    skipped: Vec<u64>,
}

impl TransactionWitnessSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder witnesses of the real size, used for fee estimation
    pub fn with_fake_vkeys(count: usize) -> Self {
        let witness = Vkeywitness::new([0u8; 32], [0u8; 64]);
        Self {
            vkeys: (count > 0).then(|| vec![witness; count]),
            skipped: Vec::new(),
        }
    }

    pub fn vkeys(&self) -> Option<&[Vkeywitness]> {
        self.vkeys.as_deref()
    }

    pub fn set_vkeys(&mut self, vkeys: Vec<Vkeywitness>) {
        self.vkeys = (!vkeys.is_empty()).then_some(vkeys);
    }

    /// Map keys of witness kinds that were present but not decoded
    pub fn skipped_kinds(&self) -> &[u64] {
        &self.skipped
    }
}

impl LedgerObject for TransactionWitnessSet {
    const NAME: &'static str = "witness set";

    fn encode(&self, e: &mut Encoder<Vec<u8>>) -> LedgerResult<()> {
        match &self.vkeys {
            Some(vkeys) => {
                e.map(1)?.u64(0)?.array(vkeys.len() as u64)?;
                for witness in vkeys {
                    witness.encode(e)?;
                }
            }
            None => {
                e.map(0)?;
            }
        }
        Ok(())
    }

    fn decode(d: &mut Decoder<'_>) -> LedgerResult<Self> {
        let mut set = TransactionWitnessSet::new();
        let len = d.map()?;
        let mut i = 0;
        while !container_done(d, len, i)? {
            match d.u64()? {
                0 => set.set_vkeys(decode_array(d)?),
                kind => {
                    d.skip()?;
                    set.skipped.push(kind);
                }
            }
            i += 1;
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    #[test]
    fn test_witness_verifies_body_hash() {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let message = [0xabu8; 32];
        let witness = Vkeywitness::new(
            key.verifying_key().to_bytes(),
            key.sign(&message).to_bytes(),
        );
        assert!(witness.verify(&message));
        assert!(!witness.verify(&[0u8; 32]));
    }

    #[test]
    fn test_other_witness_kinds_are_skipped() {
        // {0: [[vkey, sig]], 1: [native script placeholder]}
        let witness = Vkeywitness::new([1u8; 32], [2u8; 64]);
        let mut e = Encoder::new(Vec::new());
        e.map(2).unwrap().u64(0).unwrap().array(1).unwrap();
        witness.encode(&mut e).unwrap();
        e.u64(1).unwrap().array(1).unwrap().array(2).unwrap().u64(0).unwrap().bytes(&[0u8; 28]).unwrap();

        let set = TransactionWitnessSet::from_bytes(&e.into_writer()).unwrap();
        assert_eq!(set.vkeys().unwrap(), &[witness]);
        assert_eq!(set.skipped_kinds(), &[1]);
    }

    #[test]
    fn test_tagged_vkey_set_decodes() {
        // {0: 258([[vkey, sig]])}
        let witness = Vkeywitness::new([3u8; 32], [4u8; 64]);
        let mut bytes = vec![0xa1, 0x00, 0xd9, 0x01, 0x02, 0x81];
        bytes.extend(witness.to_bytes().unwrap());

        let set = TransactionWitnessSet::from_bytes(&bytes).unwrap();
        assert_eq!(set.vkeys().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_set_encodes_empty_map() {
        assert_eq!(TransactionWitnessSet::new().to_bytes().unwrap(), vec![0xa0]);
        assert!(TransactionWitnessSet::with_fake_vkeys(0).vkeys().is_none());
        assert_eq!(TransactionWitnessSet::with_fake_vkeys(2).vkeys().unwrap().len(), 2);
    }
}
