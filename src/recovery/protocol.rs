//! Recovery request state machine.
//!
//! ```text
//! time_locked -> collecting_shares -> ready -> completed
//!      \________________\_______________\____-> cancelled
//! ```
//!
//! At most one request is active at a time. A request never expires on its
//! own; the owner cancels a stalled one.

use chrono::Duration;
use serde_json::json;
use uuid::Uuid;

use crate::crypto::{self, EncryptionKey, Share};
use crate::error::{RecoveryError, RecoveryResult};
use crate::recovery::events::RecoveryEventType;
use crate::recovery::registry::{GuardianRegistry, ensure_no_active_request, record};
use crate::recovery::types::{CollectedShare, RecoveryRequest, RecoverySnapshot, RecoveryStatus};

fn active_request_mut(state: &mut RecoverySnapshot) -> RecoveryResult<&mut RecoveryRequest> {
    state
        .request
        .as_mut()
        .filter(|request| request.is_active())
        .ok_or(RecoveryError::NoPendingRequest)
}

impl GuardianRegistry {
    /// Open a recovery request on behalf of the guardian at `guardian_address`.
    ///
    /// Shares are accepted once `time_lock_hours` have passed.
    pub fn initiate_recovery(
        &self,
        guardian_address: &str,
        target_did: &str,
    ) -> RecoveryResult<RecoveryRequest> {
        let request = self.mutate(|draft, now| {
            let config = draft.config.as_ref().ok_or(RecoveryError::NotConfigured)?;
            ensure_no_active_request(draft)?;

            let guardian = draft
                .guardians
                .iter()
                .find(|g| g.matches_address(guardian_address))
                .ok_or_else(|| RecoveryError::GuardianNotFound(guardian_address.to_string()))?;

            let time_lock_end = now
                .checked_add_signed(Duration::hours(i64::from(config.social.time_lock_hours)))
                .ok_or_else(|| RecoveryError::Config("Time lock is out of range".to_string()))?;

            let request = RecoveryRequest {
                id: Uuid::new_v4().to_string(),
                initiated_by: guardian.id.clone(),
                initiated_at: now,
                status: RecoveryStatus::TimeLocked,
                time_lock_end,
                collected_shares: Vec::new(),
                required_shares: usize::from(config.shamir.threshold),
                target_did: target_did.to_string(),
                cancelled_at: None,
                completed_at: None,
            };
            let initiator = guardian.id.clone();

            draft.request = Some(request.clone());
            record(
                draft,
                RecoveryEventType::RecoveryInitiated,
                now,
                json!({
                    "request_id": request.id,
                    "target_did": request.target_did,
                    "time_lock_end": request.time_lock_end,
                    "required_shares": request.required_shares,
                }),
                Some(initiator),
            );
            Ok(request)
        })?;

        tracing::info!(
            request_id = %request.id,
            initiated_by = %request.initiated_by,
            time_lock_end = %request.time_lock_end,
            "Recovery initiated"
        );

        Ok(request)
    }

    /// Cancel the active request and scrub any collected share data.
    pub fn cancel_recovery(&self) -> RecoveryResult<RecoveryRequest> {
        let request = self.mutate(|draft, now| {
            let request = active_request_mut(draft)?;
            request.status = RecoveryStatus::Cancelled;
            request.cancelled_at = Some(now);
            request.clear_collected_data();
            let request = request.clone();

            record(
                draft,
                RecoveryEventType::RecoveryCancelled,
                now,
                json!({
                    "request_id": request.id,
                    "collected": request.collected_shares.len(),
                }),
                None,
            );
            Ok(request)
        })?;

        tracing::info!(request_id = %request.id, "Recovery cancelled");
        Ok(request)
    }

    /// Accept a guardian's encoded share for the active request.
    pub fn submit_share(
        &self,
        guardian_address: &str,
        encoded_share: &str,
    ) -> RecoveryResult<RecoveryRequest> {
        let (request, guardian_id, verified) = self.mutate(|draft, now| {
            let time_lock_end = active_request_mut(draft)?.time_lock_end;
            if now < time_lock_end {
                return Err(RecoveryError::TimeLockActive {
                    ends_at: time_lock_end,
                });
            }

            let guardian = draft
                .guardians
                .iter()
                .find(|g| g.matches_address(guardian_address))
                .ok_or_else(|| RecoveryError::GuardianNotFound(guardian_address.to_string()))?;
            let guardian_id = guardian.id.clone();
            let guardian_address = guardian.address.clone();
            let share_index = guardian.share_index;

            let request = active_request_mut(draft)?;
            if request.has_submission_from(&guardian_id) {
                return Err(RecoveryError::DuplicateSubmission(guardian_id));
            }

            let decoded = crypto::decode(encoded_share)?;
            let verified = decoded.index == share_index;
            if !verified {
                tracing::warn!(
                    guardian_id = %guardian_id,
                    expected_index = share_index,
                    submitted_index = decoded.index,
                    "Submitted share index does not match assignment"
                );
            }

            request.collected_shares.push(CollectedShare {
                guardian_id: guardian_id.clone(),
                guardian_address,
                submitted_at: now,
                share_data: Some(encoded_share.trim().to_string()),
                verified,
            });
            request.status = if request.collected_shares.len() >= request.required_shares {
                RecoveryStatus::Ready
            } else {
                RecoveryStatus::CollectingShares
            };
            let request = request.clone();

            record(
                draft,
                RecoveryEventType::ShareSubmitted,
                now,
                json!({
                    "request_id": request.id,
                    "guardian_id": guardian_id,
                    "verified": verified,
                    "collected": request.collected_shares.len(),
                    "required": request.required_shares,
                }),
                Some(guardian_id.clone()),
            );
            Ok((request, guardian_id, verified))
        })?;

        tracing::info!(
            request_id = %request.id,
            guardian_id = %guardian_id,
            verified,
            collected = request.collected_shares.len(),
            required = request.required_shares,
            status = %request.status,
            "Share submitted"
        );

        Ok(request)
    }

    /// Reconstruct the key from the collected shares and close the request.
    ///
    /// The result is checked against the configured verification hash; a
    /// collection that does not reproduce the key fails and leaves the
    /// request in place.
    pub fn complete_recovery(&self) -> RecoveryResult<EncryptionKey> {
        let (key, request_id) = self.mutate(|draft, now| {
            let expected_hash = draft
                .config
                .as_ref()
                .ok_or(RecoveryError::NotConfigured)?
                .shamir
                .verification_hash
                .clone();

            let request = active_request_mut(draft)?;
            let collected = request.collected_shares.len();
            if request.status != RecoveryStatus::Ready || collected < request.required_shares {
                return Err(RecoveryError::NotReady {
                    collected,
                    required: request.required_shares,
                });
            }

            let shares = request
                .collected_shares
                .iter()
                .map(|entry| {
                    let data = entry.share_data.as_deref().ok_or_else(|| {
                        RecoveryError::Validation(format!(
                            "Share data missing for guardian {}",
                            entry.guardian_id
                        ))
                    })?;
                    crypto::decode(data)
                })
                .collect::<RecoveryResult<Vec<Share>>>()?;

            let key = crypto::reconstruct_encryption_key(&shares, Some(&expected_hash))?;

            request.status = RecoveryStatus::Completed;
            request.completed_at = Some(now);
            request.clear_collected_data();
            let request_id = request.id.clone();

            record(
                draft,
                RecoveryEventType::RecoveryCompleted,
                now,
                json!({ "request_id": request_id, "shares_used": collected }),
                None,
            );
            Ok((key, request_id))
        })?;

        tracing::info!(request_id = %request_id, "Recovery completed");
        Ok(key)
    }
}
