//! Opaque handle for the symmetric key being protected.

use std::fmt;

use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use crate::error::{RecoveryError, RecoveryResult};

/// Opaque symmetric key handle.
///
/// Raw bytes live in a scrubbing buffer and never show up in `Debug` output.
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl EncryptionKey {
    pub fn from_bytes(bytes: &[u8]) -> RecoveryResult<Self> {
        if bytes.is_empty() {
            return Err(RecoveryError::Validation(
                "Encryption key must not be empty".to_string(),
            ));
        }
        Ok(Self {
            bytes: Zeroizing::new(bytes.to_vec()),
        })
    }

    /// Generate `len` random bytes from the OS CSPRNG.
    pub fn generate(len: usize) -> RecoveryResult<Self> {
        if len == 0 {
            return Err(RecoveryError::Validation(
                "Encryption key length must be positive".to_string(),
            ));
        }
        let mut bytes = Zeroizing::new(vec![0u8; len]);
        OsRng.fill_bytes(&mut bytes);
        Ok(Self { bytes })
    }

    /// Copy of the raw key bytes, scrubbed when the returned buffer drops.
    pub fn export_raw(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.bytes.to_vec())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl PartialEq for EncryptionKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.as_slice() == other.bytes.as_slice()
    }
}

impl Eq for EncryptionKey {}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}
