//! Shamir secret sharing over GF(256).
//!
//! Every byte of the secret is protected by its own random polynomial of
//! degree `threshold - 1`, evaluated at `x = 1..=total_shares`.
//!
//! ## Reconstruction is unverified
//!
//! [`combine`] is purely mechanical. It does not know the threshold the shares
//! were split with, so handing it fewer than `threshold` shares still returns
//! a byte sequence of the right length that has nothing to do with the
//! secret. Anything that needs the real secret back must go through
//! [`crate::crypto::reconstruct_encryption_key`] with the verification hash.

use std::collections::HashSet;
use std::fmt;

use rand_core::{OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::gf256;
use crate::error::{RecoveryError, RecoveryResult};

/// Largest share count representable with non-zero `u8` evaluation points.
pub const MAX_SHARES: usize = 255;

/// Smallest threshold that is not just copying the secret.
pub const MIN_THRESHOLD: usize = 2;

/// One evaluation point of a split secret.
///
/// `index` is the x-coordinate (never 0, which would be the secret itself).
/// `data` holds one byte per secret byte and is scrubbed on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    pub index: u8,
    pub data: Vec<u8>,
}

impl Share {
    pub fn new(index: u8, data: Vec<u8>) -> Self {
        Self { index, data }
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index)
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

/// Validate a (total, threshold) pair.
pub fn validate_parameters(total_shares: usize, threshold: usize) -> RecoveryResult<()> {
    if threshold < MIN_THRESHOLD || threshold > total_shares {
        return Err(RecoveryError::InvalidThreshold {
            threshold,
            total: total_shares,
        });
    }
    if total_shares > MAX_SHARES {
        return Err(RecoveryError::Config(format!(
            "Cannot create more than {MAX_SHARES} shares, got {total_shares}"
        )));
    }
    Ok(())
}

/// Split `secret` into `total_shares` shares, any `threshold` of which
/// reconstruct it.
///
/// Share indices are exactly `1..=total_shares`.
pub fn split(secret: &[u8], total_shares: usize, threshold: usize) -> RecoveryResult<Vec<Share>> {
    validate_parameters(total_shares, threshold)?;

    // Safety: validated <= MAX_SHARES above
    #[allow(clippy::cast_possible_truncation)]
    let mut shares: Vec<Share> = (1..=total_shares)
        .map(|index| Share::new(index as u8, Vec::with_capacity(secret.len())))
        .collect();

    let mut coefficients = Zeroizing::new(vec![0u8; threshold]);
    for &byte in secret {
        // Fresh polynomial per column: reusing coefficients across bytes leaks
        // the XOR of secret bytes.
        coefficients[0] = byte;
        OsRng.fill_bytes(&mut coefficients[1..]);

        for share in &mut shares {
            share
                .data
                .push(gf256::evaluate_polynomial(&coefficients, share.index));
        }
    }

    tracing::trace!(
        total_shares,
        threshold,
        secret_len = secret.len(),
        "Split secret into shares"
    );

    Ok(shares)
}

/// Interpolate the secret from `shares` at `x = 0`.
///
/// Requires at least two shares, equal data lengths, and distinct non-zero
/// indices. **Does not verify the result**: see the module docs.
pub fn combine(shares: &[Share]) -> RecoveryResult<Zeroizing<Vec<u8>>> {
    if shares.len() < MIN_THRESHOLD {
        return Err(RecoveryError::Validation(format!(
            "Need at least {MIN_THRESHOLD} shares to combine, got {}",
            shares.len()
        )));
    }

    let secret_len = shares[0].data.len();
    let mut seen = HashSet::with_capacity(shares.len());
    for share in shares {
        if share.index == 0 {
            return Err(RecoveryError::Validation(
                "Share index 0 is reserved".to_string(),
            ));
        }
        if share.data.len() != secret_len {
            return Err(RecoveryError::Validation(format!(
                "Share lengths differ: expected {secret_len}, got {}",
                share.data.len()
            )));
        }
        if !seen.insert(share.index) {
            return Err(RecoveryError::Validation(format!(
                "Duplicate share index: {}",
                share.index
            )));
        }
    }

    let mut secret = Zeroizing::new(Vec::with_capacity(secret_len));
    let mut points = Zeroizing::new(vec![(0u8, 0u8); shares.len()]);
    for position in 0..secret_len {
        for (point, share) in points.iter_mut().zip(shares) {
            *point = (share.index, share.data[position]);
        }
        secret.push(gf256::interpolate_at_zero(&points)?);
    }

    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_secret(len: usize) -> Vec<u8> {
        let mut secret = vec![0u8; len];
        OsRng.fill_bytes(&mut secret);
        secret
    }

    /// Pick `count` distinct shares at random.
    fn random_subset(shares: &[Share], count: usize) -> Vec<Share> {
        let mut pool: Vec<Share> = shares.to_vec();
        let mut picked = Vec::with_capacity(count);
        while picked.len() < count {
            let pick = (OsRng.next_u32() as usize) % pool.len();
            picked.push(pool.swap_remove(pick));
        }
        picked
    }

    #[test]
    fn test_split_assigns_sequential_indices() {
        let shares = split(b"secret", 5, 3).unwrap();
        let indices: Vec<u8> = shares.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
        assert!(shares.iter().all(|s| s.data.len() == 6));
    }

    #[test]
    fn test_round_trip_random_subsets() {
        let secret = random_secret(32);
        for (total, threshold) in [(2, 2), (3, 2), (5, 3), (5, 5), (10, 4), (255, 7)] {
            let shares = split(&secret, total, threshold).unwrap();
            for _ in 0..5 {
                let subset = random_subset(&shares, threshold);
                assert_eq!(combine(&subset).unwrap().as_slice(), secret.as_slice());
            }
        }
    }

    #[test]
    fn test_more_than_threshold_still_reconstructs() {
        let secret = random_secret(16);
        let shares = split(&secret, 5, 3).unwrap();
        assert_eq!(combine(&shares).unwrap().as_slice(), secret.as_slice());
    }

    #[test]
    fn test_below_threshold_does_not_reconstruct() {
        let secret = random_secret(32);
        let shares = split(&secret, 5, 3).unwrap();

        let partial = combine(&shares[..2]).unwrap();
        assert_eq!(partial.len(), secret.len());
        assert_ne!(partial.as_slice(), secret.as_slice());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            split(b"x", 5, 1),
            Err(RecoveryError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            split(b"x", 2, 3),
            Err(RecoveryError::InvalidThreshold { .. })
        ));
        assert!(matches!(split(b"x", 256, 3), Err(RecoveryError::Config(_))));
    }

    #[test]
    fn test_combine_rejects_duplicate_indices() {
        let shares = split(b"secret", 3, 2).unwrap();
        let duplicated = vec![shares[0].clone(), shares[0].clone()];
        assert!(matches!(
            combine(&duplicated),
            Err(RecoveryError::Validation(_))
        ));
    }

    #[test]
    fn test_combine_rejects_bad_input() {
        let shares = split(b"secret", 3, 2).unwrap();

        assert!(matches!(
            combine(&shares[..1]),
            Err(RecoveryError::Validation(_))
        ));

        let mut truncated = shares[1].clone();
        truncated.data.pop();
        assert!(matches!(
            combine(&[shares[0].clone(), truncated]),
            Err(RecoveryError::Validation(_))
        ));

        let zero = Share::new(0, shares[1].data.clone());
        assert!(matches!(
            combine(&[shares[0].clone(), zero]),
            Err(RecoveryError::Validation(_))
        ));
    }

    #[test]
    fn test_debug_redacts_share_data() {
        let share = Share::new(4, vec![0xAA; 8]);
        let rendered = format!("{share:?}");
        assert!(rendered.contains("index: 4"));
        assert!(!rendered.contains("170"));
    }
}
