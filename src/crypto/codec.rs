//! Share transport encoding.
//!
//! Wire layout before base64 (standard alphabet, padded):
//!
//! ```text
//! [version: u8 = 1][index: u8][data: N bytes]
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use zeroize::Zeroizing;

use crate::crypto::shamir::Share;
use crate::error::{RecoveryError, RecoveryResult};

/// Current share format version.
pub const SHARE_FORMAT_VERSION: u8 = 1;

/// Version byte + index byte + at least one data byte.
const MIN_ENCODED_LEN: usize = 3;

/// Encode a share into its transport string.
pub fn encode(share: &Share) -> String {
    let mut bytes = Zeroizing::new(Vec::with_capacity(2 + share.data.len()));
    bytes.push(SHARE_FORMAT_VERSION);
    bytes.push(share.index);
    bytes.extend_from_slice(&share.data);
    STANDARD.encode(bytes.as_slice())
}

/// Decode a transport string back into a share.
pub fn decode(encoded: &str) -> RecoveryResult<Share> {
    let bytes = Zeroizing::new(
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| RecoveryError::Format(format!("Invalid base64: {e}")))?,
    );

    if bytes.len() < MIN_ENCODED_LEN {
        return Err(RecoveryError::Format(format!(
            "Share too short: {} bytes",
            bytes.len()
        )));
    }

    let version = bytes[0];
    if version != SHARE_FORMAT_VERSION {
        return Err(RecoveryError::Version {
            found: version,
            expected: SHARE_FORMAT_VERSION,
        });
    }

    let index = bytes[1];
    if index == 0 {
        return Err(RecoveryError::Format(
            "Share index 0 is reserved".to_string(),
        ));
    }

    Ok(Share::new(index, bytes[2..].to_vec()))
}
