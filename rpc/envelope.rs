//! Signed on-chain envelope for the relayer's own submissions.
//!
//! The relayer pays for every invocation with a legacy (type 0) transaction,
//! replay-protected per EIP-155: the signing payload is
//! `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])` and the
//! broadcast form carries `v = recovery_id + chainId * 2 + 35`.

use alloy_primitives::{Address, Bytes, B256, U256};
use rlp::RlpStream;
use secp256k1::SecretKey;

use crate::crypto;

/// Unsigned legacy transaction, always a call (never contract creation)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub chain_id: u64,
}

/// Raw bytes ready for `eth_sendRawTransaction`, plus their hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    pub raw: Bytes,
    pub hash: B256,
}

impl LegacyTransaction {
    pub fn signing_hash(&self) -> B256 {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&self.chain_id);
        stream.append_empty_data();
        stream.append_empty_data();
        crypto::keccak256(stream.out())
    }

    pub fn sign(&self, key: &SecretKey) -> SignedEnvelope {
        let signature = crypto::sign_hash(&self.signing_hash(), key);
        let v = u64::from(signature[64]) + self.chain_id * 2 + 35;

        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&v);
        stream.append(&trim_leading_zeros(&signature[..32]));
        stream.append(&trim_leading_zeros(&signature[32..64]));

        let raw = stream.out().to_vec();
        SignedEnvelope {
            hash: crypto::keccak256(&raw),
            raw: raw.into(),
        }
    }

    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&U256::from(self.gas_price).to_be_bytes_trimmed_vec());
        stream.append(&self.gas_limit);
        stream.append(&self.to.to_vec());
        stream.append(&self.value.to_be_bytes_trimmed_vec());
        stream.append(&self.data.to_vec());
    }
}

/// RLP integers are minimal big-endian
fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Worked example from EIP-155
    fn eip155_example() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: Address::repeat_byte(0x35),
            value: U256::from(1_000_000_000_000_000_000u128),
            data: Bytes::new(),
            chain_id: 1,
        }
    }

    fn eip155_key() -> SecretKey {
        SecretKey::from_slice(&[0x46; 32]).unwrap()
    }

    #[test]
    fn test_signing_hash_matches_eip155_example() {
        assert_eq!(
            hex::encode(eip155_example().signing_hash()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_signed_envelope_matches_eip155_example() {
        let envelope = eip155_example().sign(&eip155_key());
        assert_eq!(
            hex::encode(&envelope.raw),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
        assert_eq!(envelope.hash, crypto::keccak256(&envelope.raw));
    }

    #[test]
    fn test_chain_id_lands_in_v() {
        let mut tx = eip155_example();
        tx.chain_id = 100;

        let envelope = tx.sign(&eip155_key());
        let decoded = rlp::Rlp::new(&envelope.raw);
        let v: u64 = decoded.val_at(6).unwrap();

        assert!(v == 235 || v == 236);
    }

    #[test]
    fn test_trim_leading_zeros() {
        assert_eq!(trim_leading_zeros(&[0, 0, 1, 0]), vec![1, 0]);
        assert!(trim_leading_zeros(&[0, 0]).is_empty());
    }
}
