//! secp256k1 helpers shared by admission checks and the relayer's own signing.
//!
//! Signatures travel as 65 bytes `r || s || v`. `v` is accepted both as a raw
//! recovery id (0/1) and in the legacy Ethereum form (27/28).

use alloy_primitives::{Address, B256};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};

/// Length of an `r || s || v` signature
pub const SIGNATURE_LENGTH: usize = 65;

pub fn keccak256(data: impl AsRef<[u8]>) -> B256 {
    let mut hasher = Keccak256::new();
    hasher.update(data.as_ref());
    let digest: [u8; 32] = hasher.finalize().into();
    B256::from(digest)
}

/// Ethereum address of a public key: last 20 bytes of keccak(X || Y)
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

pub fn secret_key_to_address(secret_key: &SecretKey) -> Address {
    let secp = Secp256k1::signing_only();
    public_key_to_address(&PublicKey::from_secret_key(&secp, secret_key))
}

/// Map `v` to a recovery id, accepting 0/1 and 27/28
pub fn normalize_v(v: u8) -> Option<u8> {
    match v {
        0 | 1 => Some(v),
        27 | 28 => Some(v - 27),
        _ => None,
    }
}

/// Structural check only: length, non-zero `r` and `s`, known `v`
pub fn is_valid_signature(signature: &[u8]) -> bool {
    if signature.len() != SIGNATURE_LENGTH {
        return false;
    }

    let r_is_zero = signature[..32].iter().all(|b| *b == 0);
    let s_is_zero = signature[32..64].iter().all(|b| *b == 0);

    !r_is_zero && !s_is_zero && normalize_v(signature[64]).is_some()
}

/// Recover the signer of a 32-byte digest, or `None` if the signature is unusable
pub fn recover_address(hash: &B256, signature: &[u8]) -> Option<Address> {
    if !is_valid_signature(signature) {
        return None;
    }

    let recovery_id = RecoveryId::from_i32(normalize_v(signature[64])? as i32).ok()?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id).ok()?;
    let message = Message::from_digest(hash.0);

    let public_key = Secp256k1::verification_only()
        .recover_ecdsa(&message, &recoverable)
        .ok()?;

    Some(public_key_to_address(&public_key))
}

/// Sign a 32-byte digest, returning `r || s || v` with `v` in {0, 1}
pub fn sign_hash(hash: &B256, secret_key: &SecretKey) -> [u8; SIGNATURE_LENGTH] {
    let secp = Secp256k1::signing_only();
    let signature = secp.sign_ecdsa_recoverable(&Message::from_digest(hash.0), secret_key);
    let (recovery_id, compact) = signature.serialize_compact();

    let mut out = [0u8; SIGNATURE_LENGTH];
    out[..64].copy_from_slice(&compact);
    out[64] = recovery_id.to_i32() as u8;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(byte: u8) -> SecretKey {
        SecretKey::from_slice(&[byte; 32]).unwrap()
    }

    #[test]
    fn test_keccak_empty_input() {
        assert_eq!(
            hex::encode(keccak256([])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_sign_and_recover() {
        let key = test_key(0x11);
        let hash = keccak256(b"relay me");

        let signature = sign_hash(&hash, &key);
        assert!(is_valid_signature(&signature));
        assert_eq!(recover_address(&hash, &signature), Some(secret_key_to_address(&key)));
    }

    #[test]
    fn test_random_keys_recover_themselves() {
        let mut rng = rand::thread_rng();
        for _ in 0..16 {
            let key = SecretKey::new(&mut rng);
            let hash = keccak256(key.secret_bytes());
            let signature = sign_hash(&hash, &key);
            assert_eq!(recover_address(&hash, &signature), Some(secret_key_to_address(&key)));
        }
    }

    #[test]
    fn test_recover_accepts_legacy_v() {
        let key = test_key(0x22);
        let hash = keccak256(b"legacy v");

        let mut signature = sign_hash(&hash, &key);
        signature[64] += 27;

        assert_eq!(recover_address(&hash, &signature), Some(secret_key_to_address(&key)));
    }

    #[test]
    fn test_different_digest_recovers_different_signer() {
        let key = test_key(0x33);
        let signature = sign_hash(&keccak256(b"one"), &key);

        let recovered = recover_address(&keccak256(b"two"), &signature);
        assert_ne!(recovered, Some(secret_key_to_address(&key)));
    }

    #[test]
    fn test_malformed_signatures_rejected() {
        let hash = keccak256(b"x");

        assert!(!is_valid_signature(&[1u8; 64]));
        assert!(recover_address(&hash, &[1u8; 64]).is_none());

        let mut zero_r = [1u8; SIGNATURE_LENGTH];
        zero_r[..32].fill(0);
        zero_r[64] = 0;
        assert!(!is_valid_signature(&zero_r));

        let mut bad_v = sign_hash(&hash, &test_key(0x44));
        bad_v[64] = 5;
        assert!(!is_valid_signature(&bad_v));
        assert!(recover_address(&hash, &bad_v).is_none());
    }
}
