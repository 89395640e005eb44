// Crate-level lint configuration
// Allow noisy pedantic/cargo lints that aren't worth fixing individually
#![allow(clippy::multiple_crate_versions)] // Transitive deps, can't easily fix
#![allow(clippy::missing_errors_doc)] // Would require extensive doc changes
#![allow(clippy::missing_panics_doc)] // Would require extensive doc changes
#![allow(clippy::must_use_candidate)] // Too many false positives for internal APIs
#![allow(clippy::module_name_repetitions)] // e.g. RecoveryError in the error module
#![allow(clippy::doc_markdown)] // Too strict about backticks in docs

//! Guardian Recovery Engine
//!
//! Threshold secret sharing and guardian-based social recovery for Zentity
//! vault encryption keys.
//!
//! ## Architecture
//!
//! - **Crypto** (`crypto`): GF(256) arithmetic, Shamir split/combine, the
//!   versioned share transport encoding, and hash-checked key
//!   reconstruction.
//!
//! - **Registry** (`recovery::registry`): Guardians, share metadata and the
//!   active configuration. Owns all state behind a single lock.
//!
//! - **Protocol** (`recovery::protocol`): One time-locked recovery request at
//!   a time, collecting guardian shares until the threshold is met.
//!
//! - **Expiry** (`recovery::expiry`): Optional share lifetimes with
//!   deduplicated warnings and share regeneration.
//!
//! - **Storage** (`storage`): Snapshot persistence on ReDB.
//!
//! ## Security Model
//!
//! - **t-of-n threshold**: Any `t` guardians can recover, fewer learn nothing
//! - **Time lock**: Shares are refused until the lock on a request elapses
//! - **Verification hash**: A reconstructed key is only returned if it hashes
//!   to the value recorded at setup
//! - **Scrubbing**: Shares, raw key exports and collected payloads are zeroized
//!   on drop

pub mod config;
pub mod crypto;
pub mod error;
pub mod recovery;
pub mod storage;

pub mod telemetry {
    //! Console tracing setup.

    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    use crate::config::LogFormat;

    /// Initialize tracing. Format comes from `RECOVERY_LOG_FORMAT`.
    pub fn init_tracing() {
        init_tracing_with(LogFormat::from_env());
    }

    pub fn init_tracing_with(format: LogFormat) {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "guardian_recovery=info,expiry_monitor=info".into());
        let json = format == LogFormat::Json;

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json.then(|| tracing_subscriber::fmt::layer().json()))
            .with((!json).then(|| tracing_subscriber::fmt::layer()))
            .init();
    }

    /// Flush hook for shutdown. Console output needs nothing.
    pub fn shutdown_tracing() {}
}

// Re-export commonly used types
pub use config::Settings;
pub use crypto::{EncryptionKey, Share};
pub use error::{RecoveryError, RecoveryResult};
pub use recovery::{
    ExpiryMonitor, GuardianDescriptor, GuardianRegistry, RecoveryOptions, RecoveryStatus,
};
pub use storage::{StateStore, Storage};
