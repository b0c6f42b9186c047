/// Relayer Account
///
/// The relayer's own signing key and its local nonce cursor. One value is
/// created at startup and moved into the relayer loop, which is its only writer.

use std::fmt;

use alloy_primitives::Address;
use secp256k1::SecretKey;
use thiserror::Error;

use crate::crypto;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("private key is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("private key is not a valid secp256k1 scalar: {0}")]
    InvalidKey(#[from] secp256k1::Error),
}

pub struct RelayerAccount {
    secret_key: SecretKey,
    address: Address,
    /// Lowest nonce not yet used by a successful broadcast from this process
    next_nonce: u64,
}

impl fmt::Debug for RelayerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayerAccount")
            .field("address", &self.address)
            .field("next_nonce", &self.next_nonce)
            .finish_non_exhaustive()
    }
}

impl RelayerAccount {
    pub fn new(secret_key: SecretKey) -> Self {
        Self {
            address: crypto::secret_key_to_address(&secret_key),
            secret_key,
            next_nonce: 0,
        }
    }

    /// Parse a hex key, with or without `0x`
    pub fn from_hex(raw: &str) -> Result<Self, AccountError> {
        let raw = raw.trim();
        let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))?;
        Ok(Self::new(SecretKey::from_slice(&bytes)?))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Nonce for the next envelope: the node's pending count unless we are already past it
    pub fn nonce_for(&self, chain_pending: u64) -> u64 {
        chain_pending.max(self.next_nonce)
    }

    /// Advance the cursor after a broadcast the node accepted
    pub fn mark_used(&mut self, nonce: u64) {
        self.next_nonce = self.next_nonce.max(nonce + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";

    #[test]
    fn test_from_hex_derives_address() {
        let account = RelayerAccount::from_hex(KEY).unwrap();
        assert_eq!(
            account.address(),
            "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F".parse::<Address>().unwrap()
        );

        let bare = RelayerAccount::from_hex(KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(bare.address(), account.address());
    }

    #[test]
    fn test_invalid_keys_rejected() {
        assert!(matches!(RelayerAccount::from_hex("0xzz"), Err(AccountError::InvalidHex(_))));
        assert!(matches!(RelayerAccount::from_hex("0x00"), Err(AccountError::InvalidKey(_))));
    }

    #[test]
    fn test_nonce_cursor_never_goes_backwards() {
        let mut account = RelayerAccount::from_hex(KEY).unwrap();
        assert_eq!(account.nonce_for(4), 4);

        account.mark_used(4);
        // node has not seen the broadcast yet
        assert_eq!(account.nonce_for(4), 5);
        // node is ahead, e.g. another process used the key
        assert_eq!(account.nonce_for(9), 9);

        account.mark_used(2);
        assert_eq!(account.nonce_for(0), 5);
    }

    #[test]
    fn test_debug_hides_key() {
        let account = RelayerAccount::from_hex(KEY).unwrap();
        assert!(!format!("{:?}", account).contains("4646"));
    }
}
