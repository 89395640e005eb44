//! Cryptographic primitives: field arithmetic, secret sharing, share
//! transport encoding, and key-level verification.

pub mod codec;
pub mod gf256;
pub mod key;
pub mod shamir;
pub mod verify;

pub use codec::{SHARE_FORMAT_VERSION, decode, encode};
pub use key::EncryptionKey;
pub use shamir::{Share, combine, split};
pub use verify::{SplitKey, hash, reconstruct_encryption_key, split_encryption_key};
