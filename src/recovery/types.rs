//! Recovery domain types.
//!
//! Everything here is plain data owned by the registry. Types that carry an
//! encoded share scrub it on drop.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::recovery::events::EventLog;

// ============================================================================
// Guardians
// ============================================================================

/// Caller input describing one guardian at setup time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianDescriptor {
    pub address: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl GuardianDescriptor {
    pub fn new(address: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            label: label.into(),
            did: None,
            email: None,
        }
    }

    pub fn with_did(mut self, did: impl Into<String>) -> Self {
        self.did = Some(did.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guardian {
    pub id: String,
    /// Chain address the guardian signs with.
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub added_at: DateTime<Utc>,
    /// Content pointer of the share once it has been handed out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_cid: Option<String>,
    pub share_index: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified: Option<DateTime<Utc>>,
}

impl Guardian {
    pub fn matches_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address.trim())
    }
}

/// Partial update applied by `update_guardian`. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianUpdate {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub did: Option<String>,
}

// ============================================================================
// Shares
// ============================================================================

/// Encoded share held on behalf of one guardian.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianShare {
    pub guardian_id: String,
    pub encoded_share: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Drop for GuardianShare {
    fn drop(&mut self) {
        self.encoded_share.zeroize();
    }
}

impl fmt::Debug for GuardianShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardianShare")
            .field("guardian_id", &self.guardian_id)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Public bookkeeping for one share. Never contains share material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareInfo {
    pub index: u8,
    pub guardian_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_pointer: Option<String>,
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distributed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Everything a distribution layer needs to deliver one share.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ShareDistribution {
    pub guardian_id: String,
    pub guardian_address: String,
    pub label: String,
    pub share_index: u8,
    pub encoded_share: String,
}

impl Drop for ShareDistribution {
    fn drop(&mut self) {
        self.encoded_share.zeroize();
    }
}

impl fmt::Debug for ShareDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareDistribution")
            .field("guardian_id", &self.guardian_id)
            .field("guardian_address", &self.guardian_address)
            .field("label", &self.label)
            .field("share_index", &self.share_index)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExpiryPolicy {
    #[default]
    Disabled,
    Enabled {
        days: u32,
    },
}

impl ExpiryPolicy {
    pub fn days(&self) -> Option<u32> {
        match self {
            Self::Disabled => None,
            Self::Enabled { days } => Some(*days),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShamirConfig {
    pub total_shares: u8,
    pub threshold: u8,
    /// Hex SHA-256 of the key the shares reconstruct.
    pub verification_hash: String,
    pub shares: Vec<ShareInfo>,
    #[serde(default)]
    pub expiry: ExpiryPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialConfig {
    /// Guardian ids, in share index order.
    pub guardians: Vec<String>,
    pub time_lock_hours: u32,
    pub required_votes: u8,
}

/// Active recovery setup: Shamir parameters plus the guardian quorum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    pub enabled: bool,
    pub shamir: ShamirConfig,
    pub social: SocialConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Setup options for `initialize_recovery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryOptions {
    /// `None` picks a simple majority plus one.
    pub threshold: Option<usize>,
    pub time_lock_hours: u32,
    pub expiry: ExpiryPolicy,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            threshold: None,
            time_lock_hours: DEFAULT_TIME_LOCK_HOURS,
            expiry: ExpiryPolicy::Disabled,
        }
    }
}

/// Default wait between initiation and share collection.
pub const DEFAULT_TIME_LOCK_HOURS: u32 = 72;

/// Default share lifetime when expiry is enabled.
pub const DEFAULT_EXPIRY_DAYS: u32 = 365;

impl RecoveryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_time_lock_hours(mut self, hours: u32) -> Self {
        self.time_lock_hours = hours;
        self
    }

    pub fn with_expiry_days(mut self, days: u32) -> Self {
        self.expiry = ExpiryPolicy::Enabled { days };
        self
    }

    pub fn with_expiry(mut self, expiry: ExpiryPolicy) -> Self {
        self.expiry = expiry;
        self
    }
}

// ============================================================================
// Recovery requests
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    TimeLocked,
    CollectingShares,
    Ready,
    Completed,
    Cancelled,
    /// Reserved. Stalled requests are never expired automatically.
    Expired,
}

impl RecoveryStatus {
    /// Whether the request still blocks a new one from starting.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::TimeLocked | Self::CollectingShares | Self::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeLocked => "time_locked",
            Self::CollectingShares => "collecting_shares",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A share handed in by a guardian during a recovery.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedShare {
    pub guardian_id: String,
    pub guardian_address: String,
    pub submitted_at: DateTime<Utc>,
    /// Encoded payload. Cleared once the request is terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_data: Option<String>,
    /// Decoded index matches the guardian's assigned index.
    pub verified: bool,
}

impl CollectedShare {
    /// Scrub and drop the payload.
    pub fn clear_share_data(&mut self) {
        if let Some(mut data) = self.share_data.take() {
            data.zeroize();
        }
    }
}

impl Drop for CollectedShare {
    fn drop(&mut self) {
        self.clear_share_data();
    }
}

impl fmt::Debug for CollectedShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectedShare")
            .field("guardian_id", &self.guardian_id)
            .field("guardian_address", &self.guardian_address)
            .field("submitted_at", &self.submitted_at)
            .field("has_share_data", &self.share_data.is_some())
            .field("verified", &self.verified)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRequest {
    pub id: String,
    /// Guardian id of the initiator.
    pub initiated_by: String,
    pub initiated_at: DateTime<Utc>,
    pub status: RecoveryStatus,
    pub time_lock_end: DateTime<Utc>,
    pub collected_shares: Vec<CollectedShare>,
    pub required_shares: usize,
    pub target_did: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RecoveryRequest {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn has_submission_from(&self, guardian_id: &str) -> bool {
        self.collected_shares
            .iter()
            .any(|share| share.guardian_id == guardian_id)
    }

    pub(crate) fn clear_collected_data(&mut self) {
        for share in &mut self.collected_shares {
            share.clear_share_data();
        }
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Full registry state, the unit of export/import and persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoverySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RecoveryConfig>,
    #[serde(default)]
    pub guardians: Vec<Guardian>,
    #[serde(default)]
    pub shares: Vec<GuardianShare>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RecoveryRequest>,
    #[serde(default)]
    pub events: EventLog,
}
