//! Share expiry monitoring.
//!
//! Shares configured with an expiry policy are classified by days remaining:
//!
//! | days remaining | severity  |
//! |----------------|-----------|
//! | `<= 0`         | expired   |
//! | `<= 7`         | urgent    |
//! | `<= 30`        | warning   |
//! | otherwise      | (silent)  |
//!
//! A notification is raised once per guardian, severity and calendar week.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptionKey;
use crate::error::{RecoveryError, RecoveryResult};
use crate::recovery::registry::GuardianRegistry;
use crate::recovery::types::RecoveryConfig;

pub const URGENT_DAYS: i64 = 7;
pub const WARNING_DAYS: i64 = 30;

const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirySeverity {
    Warning,
    Urgent,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryNotification {
    pub guardian_id: String,
    pub guardian_address: String,
    pub label: String,
    pub share_index: u8,
    pub expires_at: DateTime<Utc>,
    pub days_remaining: i64,
    pub severity: ExpirySeverity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryReport {
    /// Notifications not yet raised this week.
    pub notifications: Vec<ExpiryNotification>,
    /// Whether any share is expired right now, deduplicated or not.
    pub has_expired_shares: bool,
    pub checked_at: DateTime<Utc>,
}

/// Whole days until `expires_at`, rounded up.
pub fn days_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (expires_at - now).num_seconds();
    if seconds > 0 {
        (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
    } else {
        // truncation toward zero is already the ceiling here
        seconds / SECONDS_PER_DAY
    }
}

pub fn classify(days_remaining: i64) -> Option<ExpirySeverity> {
    match days_remaining {
        d if d <= 0 => Some(ExpirySeverity::Expired),
        d if d <= URGENT_DAYS => Some(ExpirySeverity::Urgent),
        d if d <= WARNING_DAYS => Some(ExpirySeverity::Warning),
        _ => None,
    }
}

type NotificationKey = (String, ExpirySeverity, i64);

/// Watches share expiry for one registry and remembers what it already
/// reported.
#[derive(Debug, Default)]
pub struct ExpiryMonitor {
    notified: Mutex<HashSet<NotificationKey>>,
}

impl ExpiryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RecoveryResult<std::sync::MutexGuard<'_, HashSet<NotificationKey>>> {
        self.notified
            .lock()
            .map_err(|_| RecoveryError::Internal("Expiry monitor lock poisoned".to_string()))
    }

    pub fn check_expiry(&self, registry: &GuardianRegistry) -> RecoveryResult<ExpiryReport> {
        let mut notified = self.lock()?;
        let now = registry.now();
        let week = now.timestamp().div_euclid(SECONDS_PER_WEEK);
        notified.retain(|(_, _, bucket)| *bucket == week);

        let candidates = registry.read(|state| {
            let Some(config) = &state.config else {
                return Vec::new();
            };
            config
                .shamir
                .shares
                .iter()
                .filter_map(|info| {
                    let expires_at = info.expires_at?;
                    let guardian = state.guardians.iter().find(|g| g.id == info.guardian_id)?;
                    let days = days_remaining(expires_at, now);
                    let severity = classify(days)?;
                    Some(ExpiryNotification {
                        guardian_id: guardian.id.clone(),
                        guardian_address: guardian.address.clone(),
                        label: guardian.label.clone(),
                        share_index: info.index,
                        expires_at,
                        days_remaining: days,
                        severity,
                    })
                })
                .collect::<Vec<_>>()
        })?;

        let has_expired_shares = candidates
            .iter()
            .any(|n| n.severity == ExpirySeverity::Expired);

        let notifications: Vec<_> = candidates
            .into_iter()
            .filter(|n| notified.insert((n.guardian_id.clone(), n.severity, week)))
            .collect();

        for notification in &notifications {
            tracing::warn!(
                guardian_id = %notification.guardian_id,
                share_index = notification.share_index,
                days_remaining = notification.days_remaining,
                severity = ?notification.severity,
                "Guardian share expiring"
            );
        }

        tracing::debug!(
            raised = notifications.len(),
            has_expired_shares,
            "Expiry check finished"
        );

        Ok(ExpiryReport {
            notifications,
            has_expired_shares,
            checked_at: now,
        })
    }

    /// Re-split `key` with the configured (N, K) and a fresh expiry window,
    /// then forget every notification raised so far.
    pub fn regenerate_shares(
        &self,
        registry: &GuardianRegistry,
        key: &EncryptionKey,
    ) -> RecoveryResult<RecoveryConfig> {
        let mut notified = self.lock()?;
        let config = registry.regenerate_shares(key)?;
        notified.clear();
        Ok(config)
    }
}
