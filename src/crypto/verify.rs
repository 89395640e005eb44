//! Key-level split and hash-checked reconstruction.

use sha2::{Digest, Sha256};

use crate::crypto::key::EncryptionKey;
use crate::crypto::shamir::{self, Share};
use crate::error::{RecoveryError, RecoveryResult};

/// Shares of an encryption key plus the hash that authenticates reconstruction.
#[derive(Debug)]
pub struct SplitKey {
    pub shares: Vec<Share>,
    pub verification_hash: String,
}

/// Lowercase hex SHA-256.
pub fn hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Split a key into `total_shares` shares with threshold `threshold`.
///
/// The raw export is scrubbed on every exit path, including split failure.
pub fn split_encryption_key(
    key: &EncryptionKey,
    total_shares: usize,
    threshold: usize,
) -> RecoveryResult<SplitKey> {
    let raw = key.export_raw();
    let shares = shamir::split(&raw, total_shares, threshold)?;
    let verification_hash = hash(&raw);
    Ok(SplitKey {
        shares,
        verification_hash,
    })
}

/// Reconstruct a key from shares.
///
/// When `expected_hash` is `None` the result is NOT authenticated: a set of
/// shares below threshold will silently produce a wrong key.
pub fn reconstruct_encryption_key(
    shares: &[Share],
    expected_hash: Option<&str>,
) -> RecoveryResult<EncryptionKey> {
    let raw = shamir::combine(shares)?;

    if let Some(expected) = expected_hash
        && !hash(&raw).eq_ignore_ascii_case(expected)
    {
        return Err(RecoveryError::Verification("hash mismatch".to_string()));
    }

    EncryptionKey::from_bytes(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_known_vector() {
        assert_eq!(
            hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_split_and_reconstruct_with_hash() {
        let key = EncryptionKey::generate(32).unwrap();
        let split = split_encryption_key(&key, 5, 3).unwrap();
        assert_eq!(split.shares.len(), 5);
        assert_eq!(split.verification_hash, hash(&key.export_raw()));

        let restored =
            reconstruct_encryption_key(&split.shares[1..4], Some(&split.verification_hash))
                .unwrap();
        assert_eq!(restored, key);
    }

    #[test]
    fn test_below_threshold_fails_hash_check() {
        let key = EncryptionKey::generate(32).unwrap();
        let split = split_encryption_key(&key, 5, 3).unwrap();

        let err = reconstruct_encryption_key(&split.shares[..2], Some(&split.verification_hash))
            .unwrap_err();
        assert!(matches!(err, RecoveryError::Verification(ref msg) if msg == "hash mismatch"));
    }

    #[test]
    fn test_blind_reconstruction_without_hash() {
        let key = EncryptionKey::generate(16).unwrap();
        let split = split_encryption_key(&key, 3, 3).unwrap();

        // Two of three shares: accepted, but wrong.
        let wrong = reconstruct_encryption_key(&split.shares[..2], None).unwrap();
        assert_ne!(wrong, key);
    }

    #[test]
    fn test_split_rejects_bad_threshold() {
        let key = EncryptionKey::generate(8).unwrap();
        assert!(matches!(
            split_encryption_key(&key, 3, 4),
            Err(RecoveryError::InvalidThreshold { .. })
        ));
    }
}
