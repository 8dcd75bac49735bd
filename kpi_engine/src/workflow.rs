//! Review lifecycle of an observation.
//!
//! An observation starts `Pending`. A reviewer decides it once (approve,
//! reject with a reason, or send back for revision); a soft delete is the
//! only other way out. There is no resubmission edge: a rejected entry is
//! superseded by a new observation, never moved backward.

use log::debug;

use crate::config::*;

/// Reason attached to a revision request when the reviewer gives none.
pub const DEFAULT_REVISION_REASON: &str = "please re-check the data";

/// A requested transition on one observation.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ReviewAction {
    Approve,
    Reject { reason: String },
    RequestRevision { reason: Option<String> },
    SoftDelete,
}

impl ReviewAction {
    pub fn name(&self) -> &'static str {
        match self {
            ReviewAction::Approve => "approve",
            ReviewAction::Reject { .. } => "reject",
            ReviewAction::RequestRevision { .. } => "request revision on",
            ReviewAction::SoftDelete => "delete",
        }
    }
}

/// The single-document write produced by a permitted transition. The store
/// merges the populated fields into the document, last write wins.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReviewUpdate {
    pub status: EntryStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub rejection_reason: Option<String>,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<String>,
    pub previous_status: Option<EntryStatus>,
}

impl ReviewUpdate {
    fn decision(status: EntryStatus, caller: &Caller, now: &str, reason: Option<String>) -> ReviewUpdate {
        ReviewUpdate {
            status,
            reviewed_by: Some(caller.id.clone()),
            reviewed_at: Some(now.to_string()),
            rejection_reason: reason,
            deleted_by: None,
            deleted_at: None,
            previous_status: None,
        }
    }

    /// Merges this update into an observation value, mirroring what the
    /// store does to the document.
    pub fn apply_to(&self, obs: &mut Observation) {
        obs.status = self.status;
        if self.reviewed_by.is_some() {
            obs.reviewed_by = self.reviewed_by.clone();
            obs.reviewed_at = self.reviewed_at.clone();
        }
        if self.rejection_reason.is_some() {
            obs.rejection_reason = self.rejection_reason.clone();
        }
        if self.deleted_by.is_some() {
            obs.deleted_by = self.deleted_by.clone();
            obs.deleted_at = self.deleted_at.clone();
            obs.previous_status = self.previous_status;
        }
    }
}

fn can_review(caller: &Caller) -> bool {
    matches!(caller.role, Some(Role::Reviewer) | Some(Role::Admin))
}

fn check_review_gate(obs: &Observation, action: &ReviewAction, caller: &Caller) -> Result<(), KpiError> {
    if !can_review(caller) {
        return Err(KpiError::Unauthorized { action: action.name().to_string() });
    }
    if obs.status != EntryStatus::Pending {
        return Err(KpiError::InvalidTransition {
            from: obs.status,
            action: action.name().to_string(),
        });
    }
    Ok(())
}

/// Checks the role gate and the state machine for one requested transition
/// and produces the document update to write. All checks happen here,
/// before any store write is attempted.
pub fn review_update(
    obs: &Observation,
    action: &ReviewAction,
    caller: &Caller,
    now: &str,
) -> Result<ReviewUpdate, KpiError> {
    // No transition ever leaves the deleted state.
    if obs.status == EntryStatus::Deleted {
        return Err(KpiError::InvalidTransition {
            from: EntryStatus::Deleted,
            action: action.name().to_string(),
        });
    }
    debug!(
        "review_update: {:?} on {:?} ({:?}) by {:?}",
        action.name(),
        obs.id,
        obs.status,
        caller.id
    );
    match action {
        ReviewAction::Approve => {
            check_review_gate(obs, action, caller)?;
            Ok(ReviewUpdate::decision(EntryStatus::Approved, caller, now, None))
        }
        ReviewAction::Reject { reason } => {
            check_review_gate(obs, action, caller)?;
            if reason.trim().is_empty() {
                return Err(KpiError::MissingRejectionReason);
            }
            Ok(ReviewUpdate::decision(
                EntryStatus::Rejected,
                caller,
                now,
                Some(reason.clone()),
            ))
        }
        ReviewAction::RequestRevision { reason } => {
            check_review_gate(obs, action, caller)?;
            let reason = reason
                .clone()
                .unwrap_or_else(|| DEFAULT_REVISION_REASON.to_string());
            Ok(ReviewUpdate::decision(
                EntryStatus::RevisionRequested,
                caller,
                now,
                Some(reason),
            ))
        }
        ReviewAction::SoftDelete => {
            // Admins may delete at any point; the submitter only while the
            // entry has not left pending.
            let permitted = caller.role == Some(Role::Admin)
                || (caller.id == obs.submitted_by && obs.status == EntryStatus::Pending);
            if !permitted {
                return Err(KpiError::Unauthorized { action: action.name().to_string() });
            }
            Ok(ReviewUpdate {
                status: EntryStatus::Deleted,
                reviewed_by: None,
                reviewed_at: None,
                rejection_reason: None,
                deleted_by: Some(caller.id.clone()),
                deleted_at: Some(now.to_string()),
                previous_status: Some(obs.status),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "2567-11-02T10:00:00Z";

    fn pending() -> Observation {
        Observation {
            id: "e-000001".to_string(),
            indicator_id: "7.1.1".to_string(),
            fiscal_year: 2567,
            period: "annual".to_string(),
            value: Some(82.0),
            target: Some(80.0),
            dimension: None,
            dimension_value: None,
            unit: "percent".to_string(),
            notes: String::new(),
            submitted_by: "staff@vet.example".to_string(),
            submitted_at: "2567-10-01T09:00:00Z".to_string(),
            status: EntryStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            deleted_by: None,
            deleted_at: None,
            previous_status: None,
            resubmission_of: None,
        }
    }

    fn with_status(status: EntryStatus) -> Observation {
        let mut obs = pending();
        obs.status = status;
        obs
    }

    fn reviewer() -> Caller {
        Caller::new("reviewer@vet.example", Some(Role::Reviewer))
    }

    fn admin() -> Caller {
        Caller::new("admin@vet.example", Some(Role::Admin))
    }

    fn submitter() -> Caller {
        Caller::new("staff@vet.example", Some(Role::User))
    }

    #[test]
    fn reviewer_approves_a_pending_entry() {
        let update = review_update(&pending(), &ReviewAction::Approve, &reviewer(), NOW).unwrap();
        assert_eq!(update.status, EntryStatus::Approved);
        assert_eq!(update.reviewed_by.as_deref(), Some("reviewer@vet.example"));
        assert_eq!(update.reviewed_at.as_deref(), Some(NOW));
        assert_eq!(update.rejection_reason, None);
    }

    #[test]
    fn plain_user_cannot_review() {
        let err = review_update(&pending(), &ReviewAction::Approve, &submitter(), NOW).unwrap_err();
        assert!(matches!(err, KpiError::Unauthorized { .. }));
        let no_role = Caller::new("anonymous@vet.example", None);
        let err = review_update(&pending(), &ReviewAction::Approve, &no_role, NOW).unwrap_err();
        assert!(matches!(err, KpiError::Unauthorized { .. }));
    }

    #[test]
    fn rejection_requires_a_reason() {
        let err = review_update(
            &pending(),
            &ReviewAction::Reject { reason: "  ".to_string() },
            &admin(),
            NOW,
        )
        .unwrap_err();
        assert_eq!(err, KpiError::MissingRejectionReason);

        let update = review_update(
            &pending(),
            &ReviewAction::Reject { reason: "duplicate of e-000007".to_string() },
            &admin(),
            NOW,
        )
        .unwrap();
        assert_eq!(update.status, EntryStatus::Rejected);
        assert_eq!(update.rejection_reason.as_deref(), Some("duplicate of e-000007"));
    }

    #[test]
    fn revision_request_falls_back_to_the_default_reason() {
        let update = review_update(
            &pending(),
            &ReviewAction::RequestRevision { reason: None },
            &reviewer(),
            NOW,
        )
        .unwrap();
        assert_eq!(update.status, EntryStatus::RevisionRequested);
        assert_eq!(update.rejection_reason.as_deref(), Some(DEFAULT_REVISION_REASON));
    }

    #[test]
    fn decisions_are_one_shot() {
        for status in [
            EntryStatus::Approved,
            EntryStatus::Rejected,
            EntryStatus::RevisionRequested,
        ] {
            let err =
                review_update(&with_status(status), &ReviewAction::Approve, &reviewer(), NOW)
                    .unwrap_err();
            assert!(matches!(err, KpiError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn submitter_deletes_own_pending_entry_only() {
        let update =
            review_update(&pending(), &ReviewAction::SoftDelete, &submitter(), NOW).unwrap();
        assert_eq!(update.status, EntryStatus::Deleted);
        assert_eq!(update.deleted_by.as_deref(), Some("staff@vet.example"));
        assert_eq!(update.previous_status, Some(EntryStatus::Pending));

        let err = review_update(
            &with_status(EntryStatus::Approved),
            &ReviewAction::SoftDelete,
            &submitter(),
            NOW,
        )
        .unwrap_err();
        assert!(matches!(err, KpiError::Unauthorized { .. }));
    }

    #[test]
    fn admin_deletes_regardless_of_status() {
        for status in [
            EntryStatus::Pending,
            EntryStatus::Approved,
            EntryStatus::Rejected,
            EntryStatus::RevisionRequested,
        ] {
            let update =
                review_update(&with_status(status), &ReviewAction::SoftDelete, &admin(), NOW)
                    .unwrap();
            assert_eq!(update.status, EntryStatus::Deleted);
            assert_eq!(update.previous_status, Some(status));
        }
    }

    #[test]
    fn someone_elses_entry_is_not_deletable_by_a_user() {
        let other = Caller::new("other@vet.example", Some(Role::User));
        let err = review_update(&pending(), &ReviewAction::SoftDelete, &other, NOW).unwrap_err();
        assert!(matches!(err, KpiError::Unauthorized { .. }));
    }

    #[test]
    fn nothing_leaves_the_deleted_state() {
        let deleted = with_status(EntryStatus::Deleted);
        for action in [
            ReviewAction::Approve,
            ReviewAction::Reject { reason: "x".to_string() },
            ReviewAction::RequestRevision { reason: None },
            ReviewAction::SoftDelete,
        ] {
            let err = review_update(&deleted, &action, &admin(), NOW).unwrap_err();
            assert!(matches!(
                err,
                KpiError::InvalidTransition { from: EntryStatus::Deleted, .. }
            ));
        }
    }

    #[test]
    fn apply_to_merges_like_the_store() {
        let mut obs = pending();
        let update = review_update(
            &obs.clone(),
            &ReviewAction::Reject { reason: "wrong period".to_string() },
            &reviewer(),
            NOW,
        )
        .unwrap();
        update.apply_to(&mut obs);
        assert_eq!(obs.status, EntryStatus::Rejected);
        assert_eq!(obs.reviewed_by.as_deref(), Some("reviewer@vet.example"));
        assert_eq!(obs.rejection_reason.as_deref(), Some("wrong period"));
        assert_eq!(obs.deleted_by, None);
    }
}
