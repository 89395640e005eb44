//! Guardian registry: owns guardians, share metadata, the active recovery
//! configuration and the single recovery request.
//!
//! All state sits behind one mutex. Mutating operations work on a draft copy
//! that replaces the live state only after the operation and the optional
//! store write have both succeeded.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::crypto::{self, EncryptionKey, shamir};
use crate::error::{RecoveryError, RecoveryResult};
use crate::recovery::clock::Clock;
use crate::recovery::events::{RecoveryEvent, RecoveryEventType};
use crate::recovery::types::{
    ExpiryPolicy, Guardian, GuardianDescriptor, GuardianShare, GuardianUpdate, RecoveryConfig,
    RecoveryOptions, RecoveryRequest, RecoverySnapshot, ShamirConfig, ShareDistribution,
    ShareInfo, SocialConfig,
};
use crate::storage::StateStore;

pub const MIN_GUARDIANS: usize = 3;
pub const MAX_GUARDIANS: usize = 5;
pub const MIN_TIME_LOCK_HOURS: u32 = 24;

/// Simple majority plus one: 3 -> 3, 4 -> 3, 5 -> 4.
pub fn default_threshold(guardian_count: usize) -> usize {
    guardian_count.div_ceil(2) + 1
}

pub struct GuardianRegistry {
    state: Mutex<RecoverySnapshot>,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn StateStore>>,
}

impl GuardianRegistry {
    /// In-memory registry with no persistence.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(RecoverySnapshot::default()),
            clock,
            store: None,
        }
    }

    /// Registry backed by `store`, restoring whatever snapshot it holds.
    pub fn with_store(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> RecoveryResult<Self> {
        let snapshot = store.load()?.unwrap_or_default();
        validate_snapshot(&snapshot)?;

        tracing::info!(
            configured = snapshot.config.is_some(),
            guardians = snapshot.guardians.len(),
            active_request = snapshot.request.as_ref().is_some_and(RecoveryRequest::is_active),
            "Restored recovery state"
        );

        Ok(Self {
            state: Mutex::new(snapshot),
            clock,
            store: Some(store),
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ========================================================================
    // State plumbing
    // ========================================================================

    fn lock(&self) -> RecoveryResult<MutexGuard<'_, RecoverySnapshot>> {
        self.state
            .lock()
            .map_err(|_| RecoveryError::Internal("Registry lock poisoned".to_string()))
    }

    pub(crate) fn read<T>(&self, f: impl FnOnce(&RecoverySnapshot) -> T) -> RecoveryResult<T> {
        let state = self.lock()?;
        Ok(f(&state))
    }

    /// Run `op` against a draft of the state and commit it on success.
    pub(crate) fn mutate<T>(
        &self,
        op: impl FnOnce(&mut RecoverySnapshot, DateTime<Utc>) -> RecoveryResult<T>,
    ) -> RecoveryResult<T> {
        let mut state = self.lock()?;
        let mut draft = state.clone();
        let now = self.clock.now();

        let output = op(&mut draft, now)?;

        if let Some(store) = &self.store {
            store.save(&draft)?;
            tracing::debug!("Persisted recovery state");
        }

        *state = draft;
        Ok(output)
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Split `key` across `guardians` and install the resulting configuration.
    ///
    /// Replaces any previous configuration, which invalidates previously
    /// distributed shares. Refused while a recovery request is active.
    pub fn initialize_recovery(
        &self,
        key: &EncryptionKey,
        guardians: &[GuardianDescriptor],
        options: RecoveryOptions,
    ) -> RecoveryResult<RecoveryConfig> {
        let total = guardians.len();
        if !(MIN_GUARDIANS..=MAX_GUARDIANS).contains(&total) {
            return Err(RecoveryError::Config(format!(
                "Need between {MIN_GUARDIANS} and {MAX_GUARDIANS} guardians, got {total}"
            )));
        }
        validate_descriptors(guardians)?;

        let threshold = options.threshold.unwrap_or_else(|| default_threshold(total));
        shamir::validate_parameters(total, threshold)?;

        if options.time_lock_hours < MIN_TIME_LOCK_HOURS {
            return Err(RecoveryError::Config(format!(
                "Time lock must be at least {MIN_TIME_LOCK_HOURS} hours, got {}",
                options.time_lock_hours
            )));
        }
        if let ExpiryPolicy::Enabled { days: 0 } = options.expiry {
            return Err(RecoveryError::Config(
                "Expiry must be at least 1 day".to_string(),
            ));
        }

        let total_u8 = to_u8(total)?;
        let threshold_u8 = to_u8(threshold)?;

        let config = self.mutate(|draft, now| {
            ensure_no_active_request(draft)?;

            let split = crypto::split_encryption_key(key, total, threshold)?;
            let expires_at = expiry_deadline(options.expiry, now)?;

            let mut new_guardians = Vec::with_capacity(total);
            let mut new_shares = Vec::with_capacity(total);
            let mut share_infos = Vec::with_capacity(total);

            for (descriptor, share) in guardians.iter().zip(&split.shares) {
                let guardian_id = Uuid::new_v4().to_string();

                new_guardians.push(Guardian {
                    id: guardian_id.clone(),
                    address: descriptor.address.trim().to_string(),
                    did: descriptor.did.clone(),
                    label: descriptor.label.trim().to_string(),
                    email: descriptor.email.clone(),
                    added_at: now,
                    share_cid: None,
                    share_index: share.index,
                    last_verified: None,
                });
                new_shares.push(GuardianShare {
                    guardian_id: guardian_id.clone(),
                    encoded_share: crypto::encode(share),
                    created_at: now,
                    expires_at,
                });
                share_infos.push(ShareInfo {
                    index: share.index,
                    guardian_id,
                    distribution_pointer: None,
                    acknowledged: false,
                    distributed_at: None,
                    expires_at,
                });
            }

            let config = RecoveryConfig {
                enabled: true,
                shamir: ShamirConfig {
                    total_shares: total_u8,
                    threshold: threshold_u8,
                    verification_hash: split.verification_hash.clone(),
                    shares: share_infos,
                    expiry: options.expiry,
                    expires_at,
                },
                social: SocialConfig {
                    guardians: new_guardians.iter().map(|g| g.id.clone()).collect(),
                    time_lock_hours: options.time_lock_hours,
                    required_votes: threshold_u8,
                },
                created_at: now,
                updated_at: now,
            };

            draft.config = Some(config.clone());
            draft.guardians = new_guardians;
            draft.shares = new_shares;
            draft.request = None;

            record(
                draft,
                RecoveryEventType::RecoveryConfigured,
                now,
                json!({
                    "total_shares": total,
                    "threshold": threshold,
                    "time_lock_hours": options.time_lock_hours,
                    "expires_at": expires_at,
                }),
                None,
            );

            Ok(config)
        })?;

        tracing::info!(
            total_shares = total,
            threshold,
            time_lock_hours = options.time_lock_hours,
            expiry_days = ?options.expiry.days(),
            "Recovery configured"
        );

        Ok(config)
    }

    /// Rebuild every share for the same key and the same (N, K), with a fresh
    /// expiry window. The key itself is not rotated.
    pub(crate) fn regenerate_shares(&self, key: &EncryptionKey) -> RecoveryResult<RecoveryConfig> {
        let config = self.mutate(|draft, now| {
            ensure_no_active_request(draft)?;
            let config = draft.config.as_mut().ok_or(RecoveryError::NotConfigured)?;

            let raw = key.export_raw();
            if !crypto::hash(&raw).eq_ignore_ascii_case(&config.shamir.verification_hash) {
                return Err(RecoveryError::Verification(
                    "Key does not match the configured verification hash".to_string(),
                ));
            }

            let total = usize::from(config.shamir.total_shares);
            let threshold = usize::from(config.shamir.threshold);
            let split = crypto::split_encryption_key(key, total, threshold)?;
            let expires_at = expiry_deadline(config.shamir.expiry, now)?;

            for share in &split.shares {
                let info = config
                    .shamir
                    .shares
                    .iter_mut()
                    .find(|info| info.index == share.index)
                    .ok_or_else(|| {
                        RecoveryError::Internal(format!("No share slot for index {}", share.index))
                    })?;
                info.acknowledged = false;
                info.distributed_at = None;
                info.distribution_pointer = None;
                info.expires_at = expires_at;

                let guardian_id = info.guardian_id.clone();
                if let Some(guardian) = draft.guardians.iter_mut().find(|g| g.id == guardian_id) {
                    guardian.share_cid = None;
                    guardian.last_verified = None;
                }

                let slot = draft
                    .shares
                    .iter_mut()
                    .find(|s| s.guardian_id == guardian_id)
                    .ok_or_else(|| RecoveryError::GuardianNotFound(guardian_id.clone()))?;
                *slot = GuardianShare {
                    guardian_id,
                    encoded_share: crypto::encode(share),
                    created_at: now,
                    expires_at,
                };
            }

            config.shamir.expires_at = expires_at;
            config.updated_at = now;
            let config = config.clone();

            record(
                draft,
                RecoveryEventType::SharesRegenerated,
                now,
                json!({
                    "total_shares": total,
                    "threshold": threshold,
                    "expires_at": expires_at,
                }),
                None,
            );

            Ok(config)
        })?;

        tracing::info!(
            total_shares = config.shamir.total_shares,
            threshold = config.shamir.threshold,
            "Recovery shares regenerated"
        );

        Ok(config)
    }

    // ========================================================================
    // Guardian bookkeeping
    // ========================================================================

    pub fn update_guardian(
        &self,
        guardian_id: &str,
        update: GuardianUpdate,
    ) -> RecoveryResult<Guardian> {
        let guardian = self.mutate(|draft, now| {
            let guardian = find_guardian_mut(draft, guardian_id)?;

            let mut changed = Vec::new();
            if let Some(label) = update.label {
                let label = label.trim().to_string();
                if label.is_empty() {
                    return Err(RecoveryError::Validation(
                        "Guardian label must not be empty".to_string(),
                    ));
                }
                guardian.label = label;
                changed.push("label");
            }
            if let Some(email) = update.email {
                guardian.email = Some(email);
                changed.push("email");
            }
            if let Some(did) = update.did {
                guardian.did = Some(did);
                changed.push("did");
            }
            let guardian = guardian.clone();

            record(
                draft,
                RecoveryEventType::GuardianUpdated,
                now,
                json!({ "guardian_id": guardian.id, "fields": changed }),
                None,
            );
            Ok(guardian)
        })?;

        tracing::info!(guardian_id = %guardian.id, "Guardian updated");
        Ok(guardian)
    }

    /// Record that a guardian confirmed they hold their share.
    pub fn acknowledge_share(&self, guardian_id: &str) -> RecoveryResult<ShareInfo> {
        let info = self.mutate(|draft, now| {
            if draft.config.is_none() {
                return Err(RecoveryError::NotConfigured);
            }
            let guardian = find_guardian_mut(draft, guardian_id)?;
            guardian.last_verified = Some(now);

            let info = find_share_info_mut(draft, guardian_id)?;
            info.acknowledged = true;
            let info = info.clone();

            record(
                draft,
                RecoveryEventType::ShareAcknowledged,
                now,
                json!({ "guardian_id": guardian_id, "share_index": info.index }),
                Some(guardian_id.to_string()),
            );
            Ok(info)
        })?;

        tracing::info!(guardian_id = %guardian_id, share_index = info.index, "Share acknowledged");
        Ok(info)
    }

    /// The encoded share held for a guardian.
    pub fn get_guardian_share(&self, guardian_id: &str) -> RecoveryResult<GuardianShare> {
        self.read(|state| {
            if !state.guardians.iter().any(|g| g.id == guardian_id) {
                return Err(RecoveryError::GuardianNotFound(guardian_id.to_string()));
            }
            state
                .shares
                .iter()
                .find(|s| s.guardian_id == guardian_id)
                .cloned()
                .ok_or_else(|| RecoveryError::GuardianNotFound(guardian_id.to_string()))
        })?
    }

    /// One delivery record per guardian, in share index order.
    pub fn prepare_share_distributions(&self) -> RecoveryResult<Vec<ShareDistribution>> {
        self.read(|state| {
            let config = state.config.as_ref().ok_or(RecoveryError::NotConfigured)?;

            config
                .social
                .guardians
                .iter()
                .map(|guardian_id| {
                    let guardian = state
                        .guardians
                        .iter()
                        .find(|g| &g.id == guardian_id)
                        .ok_or_else(|| RecoveryError::GuardianNotFound(guardian_id.clone()))?;
                    let share = state
                        .shares
                        .iter()
                        .find(|s| &s.guardian_id == guardian_id)
                        .ok_or_else(|| RecoveryError::GuardianNotFound(guardian_id.clone()))?;

                    Ok(ShareDistribution {
                        guardian_id: guardian.id.clone(),
                        guardian_address: guardian.address.clone(),
                        label: guardian.label.clone(),
                        share_index: guardian.share_index,
                        encoded_share: share.encoded_share.clone(),
                    })
                })
                .collect::<RecoveryResult<Vec<_>>>()
        })?
    }

    /// Record that a guardian's share was delivered, optionally with the
    /// content pointer it was published under.
    pub fn mark_share_distributed(
        &self,
        guardian_id: &str,
        pointer: Option<String>,
    ) -> RecoveryResult<ShareInfo> {
        let info = self.mutate(|draft, now| {
            if draft.config.is_none() {
                return Err(RecoveryError::NotConfigured);
            }
            let guardian = find_guardian_mut(draft, guardian_id)?;
            guardian.share_cid.clone_from(&pointer);

            let info = find_share_info_mut(draft, guardian_id)?;
            info.distributed_at = Some(now);
            info.distribution_pointer.clone_from(&pointer);
            let info = info.clone();

            record(
                draft,
                RecoveryEventType::ShareDistributed,
                now,
                json!({
                    "guardian_id": guardian_id,
                    "share_index": info.index,
                    "pointer": pointer,
                }),
                None,
            );
            Ok(info)
        })?;

        tracing::info!(guardian_id = %guardian_id, share_index = info.index, "Share distributed");
        Ok(info)
    }

    // ========================================================================
    // Read accessors
    // ========================================================================

    pub fn config(&self) -> RecoveryResult<Option<RecoveryConfig>> {
        self.read(|state| state.config.clone())
    }

    pub fn guardians(&self) -> RecoveryResult<Vec<Guardian>> {
        self.read(|state| state.guardians.clone())
    }

    pub fn guardian(&self, guardian_id: &str) -> RecoveryResult<Guardian> {
        self.read(|state| {
            state
                .guardians
                .iter()
                .find(|g| g.id == guardian_id)
                .cloned()
                .ok_or_else(|| RecoveryError::GuardianNotFound(guardian_id.to_string()))
        })?
    }

    /// The request that currently blocks a new one, if any.
    pub fn active_request(&self) -> RecoveryResult<Option<RecoveryRequest>> {
        self.read(|state| state.request.clone().filter(RecoveryRequest::is_active))
    }

    /// The most recent request, terminal or not.
    pub fn current_request(&self) -> RecoveryResult<Option<RecoveryRequest>> {
        self.read(|state| state.request.clone())
    }

    /// Last `limit` events, oldest first.
    pub fn get_events(&self, limit: usize) -> RecoveryResult<Vec<RecoveryEvent>> {
        self.read(|state| state.events.recent(limit))
    }

    // ========================================================================
    // Export / import
    // ========================================================================

    pub fn export_state(&self) -> RecoveryResult<RecoverySnapshot> {
        self.read(Clone::clone)
    }

    /// Replace the whole state with `snapshot` after validating it.
    pub fn import_state(&self, snapshot: RecoverySnapshot) -> RecoveryResult<()> {
        validate_snapshot(&snapshot)?;

        self.mutate(|draft, now| {
            *draft = snapshot;
            record(
                draft,
                RecoveryEventType::StateImported,
                now,
                json!({
                    "configured": draft.config.is_some(),
                    "guardians": draft.guardians.len(),
                }),
                None,
            );
            Ok(())
        })?;

        tracing::info!("Recovery state imported");
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn record(
    state: &mut RecoverySnapshot,
    event_type: RecoveryEventType,
    now: DateTime<Utc>,
    data: serde_json::Value,
    actor: Option<String>,
) {
    state
        .events
        .push(RecoveryEvent::new(event_type, now, data, actor));
}

pub(crate) fn ensure_no_active_request(state: &RecoverySnapshot) -> RecoveryResult<()> {
    match &state.request {
        Some(request) if request.is_active() => {
            Err(RecoveryError::AlreadyInProgress(request.id.clone()))
        }
        _ => Ok(()),
    }
}

pub(crate) fn find_guardian_mut<'a>(
    state: &'a mut RecoverySnapshot,
    guardian_id: &str,
) -> RecoveryResult<&'a mut Guardian> {
    state
        .guardians
        .iter_mut()
        .find(|g| g.id == guardian_id)
        .ok_or_else(|| RecoveryError::GuardianNotFound(guardian_id.to_string()))
}

fn find_share_info_mut<'a>(
    state: &'a mut RecoverySnapshot,
    guardian_id: &str,
) -> RecoveryResult<&'a mut ShareInfo> {
    state
        .config
        .as_mut()
        .ok_or(RecoveryError::NotConfigured)?
        .shamir
        .shares
        .iter_mut()
        .find(|info| info.guardian_id == guardian_id)
        .ok_or_else(|| RecoveryError::GuardianNotFound(guardian_id.to_string()))
}

fn expiry_deadline(
    policy: ExpiryPolicy,
    now: DateTime<Utc>,
) -> RecoveryResult<Option<DateTime<Utc>>> {
    let Some(days) = policy.days() else {
        return Ok(None);
    };
    now.checked_add_signed(Duration::days(i64::from(days)))
        .map(Some)
        .ok_or_else(|| RecoveryError::Config(format!("Expiry of {days} days is out of range")))
}

fn to_u8(value: usize) -> RecoveryResult<u8> {
    u8::try_from(value).map_err(|_| {
        RecoveryError::Config(format!("Value out of range for a share count: {value}"))
    })
}

fn validate_descriptors(guardians: &[GuardianDescriptor]) -> RecoveryResult<()> {
    let mut seen = HashSet::with_capacity(guardians.len());
    for descriptor in guardians {
        let address = descriptor.address.trim();
        if address.is_empty() {
            return Err(RecoveryError::Config(
                "Guardian address must not be empty".to_string(),
            ));
        }
        if !seen.insert(address.to_ascii_lowercase()) {
            return Err(RecoveryError::Config(format!(
                "Duplicate guardian address: {address}"
            )));
        }
    }
    Ok(())
}

/// Structural invariants of a snapshot about to become the live state.
fn validate_snapshot(snapshot: &RecoverySnapshot) -> RecoveryResult<()> {
    let Some(config) = &snapshot.config else {
        if !snapshot.guardians.is_empty() || !snapshot.shares.is_empty() {
            return Err(RecoveryError::Config(
                "Guardians present without a recovery configuration".to_string(),
            ));
        }
        if snapshot.request.as_ref().is_some_and(RecoveryRequest::is_active) {
            return Err(RecoveryError::Config(
                "Active request present without a recovery configuration".to_string(),
            ));
        }
        return Ok(());
    };
    validate_config(config)?;

    let guardians = &snapshot.guardians;
    let mut guardian_ids = HashSet::with_capacity(guardians.len());
    for guardian in guardians {
        if !guardian_ids.insert(guardian.id.as_str()) {
            return Err(RecoveryError::Config(format!(
                "Duplicate guardian id: {}",
                guardian.id
            )));
        }
    }
    if guardians.len() != config.social.guardians.len() {
        return Err(RecoveryError::Config(format!(
            "Guardian count {} does not match quorum size {}",
            guardians.len(),
            config.social.guardians.len()
        )));
    }
    let mut quorum = HashSet::with_capacity(config.social.guardians.len());
    for guardian_id in &config.social.guardians {
        if !guardian_ids.contains(guardian_id.as_str()) || !quorum.insert(guardian_id.as_str()) {
            return Err(RecoveryError::Config(format!(
                "Quorum member is not a unique known guardian: {guardian_id}"
            )));
        }
    }

    let mut indices = HashSet::with_capacity(config.shamir.shares.len());
    let mut owners = HashSet::with_capacity(config.shamir.shares.len());
    for info in &config.shamir.shares {
        if info.index == 0 || !indices.insert(info.index) {
            return Err(RecoveryError::Config(format!(
                "Share index {} is zero or repeated",
                info.index
            )));
        }
        let guardian = guardians
            .iter()
            .find(|g| g.id == info.guardian_id)
            .ok_or_else(|| {
                RecoveryError::Config(format!(
                    "Share {} belongs to unknown guardian {}",
                    info.index, info.guardian_id
                ))
            })?;
        if !owners.insert(info.guardian_id.as_str()) {
            return Err(RecoveryError::Config(format!(
                "Guardian {} owns more than one share record",
                info.guardian_id
            )));
        }
        if guardian.share_index != info.index {
            return Err(RecoveryError::Config(format!(
                "Share {} is assigned to guardian {} holding index {}",
                info.index, guardian.id, guardian.share_index
            )));
        }
    }

    if snapshot.shares.len() != guardians.len() {
        return Err(RecoveryError::Config(format!(
            "Expected {} encoded shares, found {}",
            guardians.len(),
            snapshot.shares.len()
        )));
    }
    for guardian in guardians {
        let held = snapshot
            .shares
            .iter()
            .filter(|share| share.guardian_id == guardian.id)
            .count();
        if held != 1 {
            return Err(RecoveryError::Config(format!(
                "Guardian {} holds {held} encoded shares",
                guardian.id
            )));
        }
    }

    if let Some(request) = snapshot.request.as_ref().filter(|r| r.is_active())
        && request.required_shares != usize::from(config.shamir.threshold)
    {
        return Err(RecoveryError::Config(format!(
            "Active request requires {} shares, threshold is {}",
            request.required_shares, config.shamir.threshold
        )));
    }

    Ok(())
}

/// Parameter invariants of a configuration.
fn validate_config(config: &RecoveryConfig) -> RecoveryResult<()> {
    let total = usize::from(config.shamir.total_shares);
    let threshold = usize::from(config.shamir.threshold);
    shamir::validate_parameters(total, threshold)?;

    if config.social.guardians.len() != total {
        return Err(RecoveryError::Config(format!(
            "Share count {total} does not match guardian count {}",
            config.social.guardians.len()
        )));
    }
    if config.shamir.shares.len() != total {
        return Err(RecoveryError::Config(format!(
            "Share count {total} does not match share records {}",
            config.shamir.shares.len()
        )));
    }
    if config.social.required_votes != config.shamir.threshold {
        return Err(RecoveryError::Config(format!(
            "Required votes {} differ from threshold {}",
            config.social.required_votes, config.shamir.threshold
        )));
    }
    if config.social.time_lock_hours < MIN_TIME_LOCK_HOURS {
        return Err(RecoveryError::Config(format!(
            "Time lock must be at least {MIN_TIME_LOCK_HOURS} hours"
        )));
    }
    if config.shamir.verification_hash.is_empty() {
        return Err(RecoveryError::Config(
            "Missing verification hash".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::clock::ManualClock;

    fn descriptors(n: usize) -> Vec<GuardianDescriptor> {
        (0..n)
            .map(|i| GuardianDescriptor::new(format!("0xGuardian{i}"), format!("Guardian {i}")))
            .collect()
    }

    fn registry() -> (GuardianRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (GuardianRegistry::new(clock.clone()), clock)
    }

    #[test]
    fn test_default_threshold() {
        assert_eq!(default_threshold(3), 3);
        assert_eq!(default_threshold(4), 3);
        assert_eq!(default_threshold(5), 4);
    }

    #[test]
    fn test_initialize_uses_default_threshold() {
        let (registry, _) = registry();
        let key = EncryptionKey::generate(32).unwrap();

        let config = registry
            .initialize_recovery(&key, &descriptors(5), RecoveryOptions::default())
            .unwrap();
        assert_eq!(config.shamir.total_shares, 5);
        assert_eq!(config.shamir.threshold, 4);
        assert_eq!(config.social.required_votes, 4);
        assert_eq!(config.social.time_lock_hours, 72);

        let config = registry
            .initialize_recovery(&key, &descriptors(3), RecoveryOptions::default())
            .unwrap();
        assert_eq!(config.shamir.threshold, 3);
    }

    #[test]
    fn test_initialize_creates_records_in_index_order() {
        let (registry, _) = registry();
        let key = EncryptionKey::generate(32).unwrap();
        let config = registry
            .initialize_recovery(&key, &descriptors(4), RecoveryOptions::default())
            .unwrap();

        let guardians = registry.guardians().unwrap();
        assert_eq!(guardians.len(), 4);
        for (position, guardian) in guardians.iter().enumerate() {
            assert_eq!(usize::from(guardian.share_index), position + 1);
            assert_eq!(config.social.guardians[position], guardian.id);
            assert_eq!(config.shamir.shares[position].guardian_id, guardian.id);

            let share = registry.get_guardian_share(&guardian.id).unwrap();
            let decoded = crypto::decode(&share.encoded_share).unwrap();
            assert_eq!(decoded.index, guardian.share_index);
        }
        assert_eq!(config.shamir.verification_hash, crypto::hash(&key.export_raw()));

        let events = registry.get_events(10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, RecoveryEventType::RecoveryConfigured);
    }

    #[test]
    fn test_initialize_validation_leaves_state_untouched() {
        let (registry, _) = registry();
        let key = EncryptionKey::generate(32).unwrap();

        let err = registry
            .initialize_recovery(&key, &descriptors(2), RecoveryOptions::default())
            .unwrap_err();
        assert!(matches!(err, RecoveryError::Config(_)));

        let err = registry
            .initialize_recovery(&key, &descriptors(6), RecoveryOptions::default())
            .unwrap_err();
        assert!(matches!(err, RecoveryError::Config(_)));

        let err = registry
            .initialize_recovery(
                &key,
                &descriptors(3),
                RecoveryOptions::default().with_threshold(4),
            )
            .unwrap_err();
        assert!(matches!(err, RecoveryError::InvalidThreshold { .. }));

        let err = registry
            .initialize_recovery(
                &key,
                &descriptors(3),
                RecoveryOptions::default().with_time_lock_hours(23),
            )
            .unwrap_err();
        assert!(matches!(err, RecoveryError::Config(_)));

        let err = registry
            .initialize_recovery(
                &key,
                &descriptors(3),
                RecoveryOptions::default().with_expiry_days(0),
            )
            .unwrap_err();
        assert!(matches!(err, RecoveryError::Config(_)));

        let mut duplicated = descriptors(3);
        duplicated[2].address = "0XGUARDIAN0".to_string();
        let err = registry
            .initialize_recovery(&key, &duplicated, RecoveryOptions::default())
            .unwrap_err();
        assert!(matches!(err, RecoveryError::Config(_)));

        assert!(registry.config().unwrap().is_none());
        assert!(registry.guardians().unwrap().is_empty());
        assert!(registry.get_events(10).unwrap().is_empty());
    }

    #[test]
    fn test_expiry_sets_absolute_deadline() {
        let (registry, clock) = registry();
        let key = EncryptionKey::generate(32).unwrap();
        let config = registry
            .initialize_recovery(
                &key,
                &descriptors(3),
                RecoveryOptions::default().with_expiry_days(30),
            )
            .unwrap();

        let expected = clock.now() + Duration::days(30);
        assert_eq!(config.shamir.expires_at, Some(expected));
        assert!(
            config
                .shamir
                .shares
                .iter()
                .all(|info| info.expires_at == Some(expected))
        );
    }

    #[test]
    fn test_guardian_bookkeeping() {
        let (registry, clock) = registry();
        let key = EncryptionKey::generate(32).unwrap();
        registry
            .initialize_recovery(&key, &descriptors(3), RecoveryOptions::default())
            .unwrap();
        let guardian = registry.guardians().unwrap().remove(0);

        let updated = registry
            .update_guardian(
                &guardian.id,
                GuardianUpdate {
                    label: Some("Alice".to_string()),
                    email: Some("alice@example.com".to_string()),
                    did: None,
                },
            )
            .unwrap();
        assert_eq!(updated.label, "Alice");
        assert_eq!(updated.email.as_deref(), Some("alice@example.com"));

        let info = registry.acknowledge_share(&guardian.id).unwrap();
        assert!(info.acknowledged);
        assert_eq!(
            registry.guardian(&guardian.id).unwrap().last_verified,
            Some(clock.now())
        );

        let info = registry
            .mark_share_distributed(&guardian.id, Some("bafy123".to_string()))
            .unwrap();
        assert_eq!(info.distributed_at, Some(clock.now()));
        assert_eq!(info.distribution_pointer.as_deref(), Some("bafy123"));
        assert_eq!(
            registry.guardian(&guardian.id).unwrap().share_cid.as_deref(),
            Some("bafy123")
        );

        let distributions = registry.prepare_share_distributions().unwrap();
        assert_eq!(distributions.len(), 3);
        assert_eq!(distributions[0].guardian_id, guardian.id);
        assert_eq!(distributions[0].share_index, 1);
    }

    #[test]
    fn test_unknown_guardian_and_missing_config() {
        let (registry, _) = registry();

        assert!(matches!(
            registry.prepare_share_distributions(),
            Err(RecoveryError::NotConfigured)
        ));
        assert!(matches!(
            registry.mark_share_distributed("nope", None),
            Err(RecoveryError::NotConfigured)
        ));
        assert!(matches!(
            registry.acknowledge_share("nope"),
            Err(RecoveryError::NotConfigured)
        ));

        let key = EncryptionKey::generate(32).unwrap();
        registry
            .initialize_recovery(&key, &descriptors(3), RecoveryOptions::default())
            .unwrap();

        assert!(matches!(
            registry.update_guardian("nope", GuardianUpdate::default()),
            Err(RecoveryError::GuardianNotFound(_))
        ));
        assert!(matches!(
            registry.get_guardian_share("nope"),
            Err(RecoveryError::GuardianNotFound(_))
        ));
        assert!(matches!(
            registry.acknowledge_share("nope"),
            Err(RecoveryError::GuardianNotFound(_))
        ));
    }

    #[test]
    fn test_import_rejects_invalid_config() {
        let (registry, _) = registry();
        let key = EncryptionKey::generate(32).unwrap();
        registry
            .initialize_recovery(&key, &descriptors(3), RecoveryOptions::default())
            .unwrap();

        let mut snapshot = registry.export_state().unwrap();
        if let Some(config) = snapshot.config.as_mut() {
            config.social.required_votes = 2;
        }
        assert!(matches!(
            registry.import_state(snapshot),
            Err(RecoveryError::Config(_))
        ));

        let fresh = GuardianRegistry::new(Arc::new(ManualClock::default()));
        fresh.import_state(registry.export_state().unwrap()).unwrap();
        assert_eq!(fresh.config().unwrap(), registry.config().unwrap());
        assert_eq!(
            fresh.get_events(1).unwrap()[0].event_type,
            RecoveryEventType::StateImported
        );
    }

    /// Export an initialized 5-of-3 state, break it, and expect the import to fail.
    fn assert_import_rejected(corrupt: impl FnOnce(&mut RecoverySnapshot)) {
        let (registry, _) = registry();
        let key = EncryptionKey::generate(32).unwrap();
        registry
            .initialize_recovery(&key, &descriptors(5), RecoveryOptions::default())
            .unwrap();

        let mut snapshot = registry.export_state().unwrap();
        corrupt(&mut snapshot);
        assert!(matches!(
            registry.import_state(snapshot),
            Err(RecoveryError::Config(_))
        ));
        assert_eq!(registry.guardians().unwrap().len(), 5);
    }

    #[test]
    fn test_import_rejects_unknown_quorum_member() {
        assert_import_rejected(|snapshot| {
            let config = snapshot.config.as_mut().unwrap();
            config.social.guardians[0] = "0xghost".to_string();
        });
    }

    #[test]
    fn test_import_rejects_share_record_for_unknown_guardian() {
        assert_import_rejected(|snapshot| {
            let config = snapshot.config.as_mut().unwrap();
            config.shamir.shares[1].guardian_id = "0xghost".to_string();
        });
    }

    #[test]
    fn test_import_rejects_share_index_mismatch() {
        assert_import_rejected(|snapshot| {
            snapshot.guardians[0].share_index = 4;
        });
    }

    #[test]
    fn test_import_rejects_duplicate_share_indices() {
        assert_import_rejected(|snapshot| {
            let config = snapshot.config.as_mut().unwrap();
            config.shamir.shares[1].index = config.shamir.shares[0].index;
            snapshot.guardians[1].share_index = snapshot.guardians[0].share_index;
        });
    }

    #[test]
    fn test_import_rejects_zero_share_index() {
        assert_import_rejected(|snapshot| {
            let config = snapshot.config.as_mut().unwrap();
            config.shamir.shares[2].index = 0;
            snapshot.guardians[2].share_index = 0;
        });
    }

    #[test]
    fn test_import_rejects_missing_encoded_shares() {
        assert_import_rejected(|snapshot| snapshot.shares.clear());
    }

    #[test]
    fn test_import_rejects_guardian_holding_two_shares() {
        assert_import_rejected(|snapshot| {
            let owner = snapshot.shares[0].guardian_id.clone();
            snapshot.shares[1].guardian_id = owner;
        });
    }

    #[test]
    fn test_import_rejects_active_request_with_wrong_required_shares() {
        let (registry, _) = registry();
        let key = EncryptionKey::generate(32).unwrap();
        registry
            .initialize_recovery(&key, &descriptors(5), RecoveryOptions::default())
            .unwrap();
        let initiator = registry.guardians().unwrap()[0].id.clone();
        registry
            .initiate_recovery(&initiator, "did:example:1")
            .unwrap();

        let valid = registry.export_state().unwrap();
        let mut snapshot = valid.clone();
        if let Some(request) = snapshot.request.as_mut() {
            request.required_shares = 1;
        }
        assert!(matches!(
            registry.import_state(snapshot),
            Err(RecoveryError::Config(_))
        ));
        registry.import_state(valid).unwrap();
    }

    #[test]
    fn test_import_rejects_guardians_without_config() {
        assert_import_rejected(|snapshot| snapshot.config = None);
    }
}
