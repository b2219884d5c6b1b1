use std::fmt;

use bech32::{Bech32, Hrp};
use blake2::digest::consts::U28;
use blake2::{Blake2b, Digest};
use minicbor::Decoder;

use crate::config::{AddressType, MAINNET_NETWORK_ID, TESTNET_NETWORK_ID};
use crate::error::{CardanoError, Result};
use crate::ledger::{container_done, LedgerError, LedgerResult};

/// Key or script hash a credential commits to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Credential {
    KeyHash([u8; 28]),
    ScriptHash([u8; 28]),
}

impl Credential {
    pub fn hash(&self) -> &[u8; 28] {
        match self {
            Credential::KeyHash(hash) | Credential::ScriptHash(hash) => hash,
        }
    }
}

/// Cardano address, kept in its raw ledger form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardanoAddress {
    bytes: Vec<u8>,
    address_type: AddressType,
    network_id: u8,
}

impl CardanoAddress {
    /// Parses the raw bytes wallets hand out (hex-decoded)
    pub fn from_bytes(bytes: &[u8]) -> LedgerResult<Self> {
        let header = *bytes
            .first()
            .ok_or_else(|| LedgerError::invalid("address", "empty"))?;
        let kind = header >> 4;
        let network_id = header & 0x0f;

        let address_type = match kind {
            0..=3 => AddressType::Base,
            4 | 5 => AddressType::Pointer,
            6 | 7 => AddressType::Enterprise,
            8 => AddressType::Byron,
            14 | 15 => AddressType::Reward,
            _ => {
                return Err(LedgerError::invalid(
                    "address",
                    format!("unknown header type {kind}"),
                ))
            }
        };

        let length_ok = match address_type {
            AddressType::Base => bytes.len() == 57,
            AddressType::Pointer => bytes.len() > 29,
            AddressType::Enterprise | AddressType::Reward => bytes.len() == 29,
            AddressType::Byron => true,
        };
        if !length_ok {
            return Err(LedgerError::invalid(
                "address",
                format!("{} bytes is not a valid {:?} address", bytes.len(), address_type),
            ));
        }

        let network_id = if address_type == AddressType::Byron {
            byron_network_id(bytes)?
        } else {
            network_id
        };

        Ok(Self {
            bytes: bytes.to_vec(),
            address_type,
            network_id,
        })
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| CardanoError::InvalidAddress(format!("{hex_str}: {e}")))?;
        Self::from_bytes(&bytes).map_err(|e| CardanoError::InvalidAddress(e.to_string()))
    }

    /// Parses a bech32 Shelley address
    pub fn from_bech32(address: &str) -> Result<Self> {
        let (hrp, data) = bech32::decode(address)
            .map_err(|e| CardanoError::InvalidAddress(format!("{address}: {e}")))?;
        let parsed = Self::from_bytes(&data)
            .map_err(|e| CardanoError::InvalidAddress(format!("{address}: {e}")))?;
        if hrp.as_str() != parsed.hrp() {
            return Err(CardanoError::InvalidAddress(format!(
                "{address}: prefix {} does not match {:?} address on network {}",
                hrp.as_str(),
                parsed.address_type,
                parsed.network_id
            )));
        }
        Ok(parsed)
    }

    /// Parses any user-facing form: bech32, or base58 for Byron
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(CardanoError::InvalidAddress("empty address".into()));
        }
        if address.contains('1') && (address.starts_with("addr") || address.starts_with("stake")) {
            return Self::from_bech32(address);
        }
        let bytes = bs58::decode(address)
            .into_vec()
            .map_err(|e| CardanoError::InvalidAddress(format!("{address}: {e}")))?;
        let parsed = Self::from_bytes(&bytes)
            .map_err(|e| CardanoError::InvalidAddress(format!("{address}: {e}")))?;
        if parsed.address_type != AddressType::Byron {
            return Err(CardanoError::InvalidAddress(format!(
                "{address}: base58 encoding is only used by Byron addresses"
            )));
        }
        Ok(parsed)
    }

    /// Enterprise address for a payment key hash
    pub fn enterprise_from_key_hash(payment_key_hash: [u8; 28], network_id: u8) -> Self {
        let mut bytes = Vec::with_capacity(29);
        bytes.push(0x60 | (network_id & 0x0f));
        bytes.extend_from_slice(&payment_key_hash);
        Self {
            bytes,
            address_type: AddressType::Enterprise,
            network_id,
        }
    }

    /// Enterprise address for a payment public key
    pub fn enterprise(payment_pubkey: &[u8], network_id: u8) -> Self {
        Self::enterprise_from_key_hash(Self::hash_key(payment_pubkey), network_id)
    }

    /// Base address from payment and staking key hashes
    pub fn base_from_key_hashes(payment: [u8; 28], staking: [u8; 28], network_id: u8) -> Self {
        let mut bytes = Vec::with_capacity(57);
        bytes.push(network_id & 0x0f);
        bytes.extend_from_slice(&payment);
        bytes.extend_from_slice(&staking);
        Self {
            bytes,
            address_type: AddressType::Base,
            network_id,
        }
    }

    /// Hash a public key using Blake2b-224
    pub fn hash_key(pubkey: &[u8]) -> [u8; 28] {
        let mut hasher = Blake2b::<U28>::new();
        hasher.update(pubkey);
        let mut hash = [0u8; 28];
        hash.copy_from_slice(&hasher.finalize());
        hash
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    pub fn network_id(&self) -> u8 {
        self.network_id
    }

    pub fn is_mainnet(&self) -> bool {
        self.network_id == MAINNET_NETWORK_ID
    }

    /// The credential that must witness spends from this address.
    /// Byron and reward addresses have none.
    pub fn payment_credential(&self) -> Option<Credential> {
        let kind = self.bytes[0] >> 4;
        if kind > 7 {
            return None;
        }
        let mut hash = [0u8; 28];
        hash.copy_from_slice(&self.bytes[1..29]);
        // odd header types carry a script payment part
        Some(if kind & 1 == 1 {
            Credential::ScriptHash(hash)
        } else {
            Credential::KeyHash(hash)
        })
    }

    fn hrp(&self) -> &'static str {
        match (self.address_type, self.network_id == MAINNET_NETWORK_ID) {
            (AddressType::Reward, true) => "stake",
            (AddressType::Reward, false) => "stake_test",
            (_, true) => "addr",
            (_, false) => "addr_test",
        }
    }

    /// User-facing form: bech32, or base58 for Byron
    pub fn to_bech32(&self) -> Result<String> {
        if self.address_type == AddressType::Byron {
            return Ok(bs58::encode(&self.bytes).into_string());
        }
        let hrp = Hrp::parse(self.hrp())
            .map_err(|e| CardanoError::InvalidAddress(e.to_string()))?;
        bech32::encode::<Bech32>(hrp, &self.bytes)
            .map_err(|e| CardanoError::InvalidAddress(e.to_string()))
    }

    /// Validate a Cardano address string
    pub fn validate(address: &str) -> bool {
        Self::parse(address).is_ok()
    }
}

impl fmt::Display for CardanoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_bech32() {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => f.write_str(&self.to_hex()),
        }
    }
}

/// Byron payload: [24(bytes .cbor [root, attributes, type]), crc32].
/// Attribute 2 (protocol magic) is only present off mainnet.
fn byron_network_id(bytes: &[u8]) -> LedgerResult<u8> {
    let mut d = Decoder::new(bytes);
    d.array()?;
    d.tag()?;
    let payload = d.bytes()?;
    d.u32()?;
    if d.position() != bytes.len() {
        return Err(LedgerError::TrailingBytes("byron address"));
    }

    let mut inner = Decoder::new(payload);
    inner.array()?;
    inner.bytes()?;
    let len = inner.map()?;
    let mut network_id = MAINNET_NETWORK_ID;
    let mut i = 0;
    while !container_done(&mut inner, len, i)? {
        match inner.u64()? {
            2 => {
                inner.bytes()?;
                network_id = TESTNET_NETWORK_ID;
            }
            _ => inner.skip()?,
        }
        i += 1;
    }
    inner.u64()?;
    Ok(network_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test key (32 bytes for Ed25519 public key)
    fn test_pubkey() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    // Byron mainnet address from the ledger test vectors
    const BYRON_MAINNET: &str =
        "Ae2tdPwUPEZFRbyhz3cpfC2CumGzNkFBN2L42rcUc2yjQpEkxDbkPodpMAi";

    #[test]
    fn test_hash_key() {
        let hash = CardanoAddress::hash_key(&test_pubkey());
        assert_eq!(hash.len(), 28);
        assert_eq!(hash, CardanoAddress::hash_key(&test_pubkey()));
    }

    #[test]
    fn test_enterprise_address_mainnet() {
        let addr = CardanoAddress::enterprise(&test_pubkey(), MAINNET_NETWORK_ID);
        assert!(addr.to_bech32().unwrap().starts_with("addr1"));
        assert_eq!(addr.address_type(), AddressType::Enterprise);
        assert!(addr.is_mainnet());
    }

    #[test]
    fn test_enterprise_address_testnet() {
        let addr = CardanoAddress::enterprise(&test_pubkey(), TESTNET_NETWORK_ID);
        assert!(addr.to_bech32().unwrap().starts_with("addr_test1"));
        assert!(!addr.is_mainnet());
    }

    #[test]
    fn test_base_address_bech32_is_parsed_back() {
        let payment = CardanoAddress::hash_key(&test_pubkey());
        let staking = [0xffu8; 28];
        let addr = CardanoAddress::base_from_key_hashes(payment, staking, MAINNET_NETWORK_ID);
        let encoded = addr.to_bech32().unwrap();
        assert!(encoded.starts_with("addr1"));

        let parsed = CardanoAddress::parse(&encoded).unwrap();
        assert_eq!(parsed, addr);
        assert_eq!(parsed.address_type(), AddressType::Base);
        assert_eq!(parsed.payment_credential(), Some(Credential::KeyHash(payment)));
    }

    #[test]
    fn test_from_hex_matches_bytes() {
        let addr = CardanoAddress::enterprise(&test_pubkey(), TESTNET_NETWORK_ID);
        let parsed = CardanoAddress::from_hex(&addr.to_hex()).unwrap();
        assert_eq!(parsed, addr);
        assert_eq!(parsed.network_id(), TESTNET_NETWORK_ID);
    }

    #[test]
    fn test_reward_address_has_no_payment_credential() {
        let mut bytes = vec![0xe1];
        bytes.extend_from_slice(&[5u8; 28]);
        let addr = CardanoAddress::from_bytes(&bytes).unwrap();
        assert_eq!(addr.address_type(), AddressType::Reward);
        assert!(addr.to_bech32().unwrap().starts_with("stake1"));
        assert!(addr.payment_credential().is_none());
    }

    #[test]
    fn test_script_enterprise_credential() {
        let mut bytes = vec![0x71];
        bytes.extend_from_slice(&[6u8; 28]);
        let addr = CardanoAddress::from_bytes(&bytes).unwrap();
        assert_eq!(addr.payment_credential(), Some(Credential::ScriptHash([6u8; 28])));
    }

    #[test]
    fn test_byron_address_round_trips_through_base58() {
        let addr = CardanoAddress::parse(BYRON_MAINNET).unwrap();
        assert_eq!(addr.address_type(), AddressType::Byron);
        assert!(addr.is_mainnet());
        assert!(addr.payment_credential().is_none());
        assert_eq!(addr.to_bech32().unwrap(), BYRON_MAINNET);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let mut bytes = vec![0x61];
        bytes.extend_from_slice(&[1u8; 20]);
        assert!(CardanoAddress::from_bytes(&bytes).is_err());
        assert!(CardanoAddress::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_validate_addresses() {
        let addr = CardanoAddress::enterprise(&test_pubkey(), MAINNET_NETWORK_ID);
        assert!(CardanoAddress::validate(&addr.to_bech32().unwrap()));
        assert!(!CardanoAddress::validate("invalid"));
        assert!(!CardanoAddress::validate("btc1qxyz"));
        assert!(!CardanoAddress::validate("0x1234567890"));
        assert!(!CardanoAddress::validate(""));
    }

    #[test]
    fn test_mismatched_prefix_rejected() {
        let addr = CardanoAddress::enterprise(&test_pubkey(), MAINNET_NETWORK_ID);
        let hrp = Hrp::parse("addr_test").unwrap();
        let forged = bech32::encode::<Bech32>(hrp, addr.as_bytes()).unwrap();
        assert!(matches!(
            CardanoAddress::parse(&forged),
            Err(CardanoError::InvalidAddress(_))
        ));
    }
}
