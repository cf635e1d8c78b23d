//! Loan application status workflow.
//!
//! The only real invariants in the system live here: an application moves
//! Pending -> Verified -> Approved, with Rejected reachable from Pending
//! (verifier) and Verified (admin). Rejected and Approved are terminal.
//! These methods mutate the in-memory record only; persisting the result
//! (with the version guard) is the caller's job.

use chrono::{DateTime, Utc};

use crate::error::ApiError;
use crate::types::{LoanApplication, LoanStatus};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Loan application is not in pending status")]
    NotPending,
    #[error("Verifiers can only reject pending applications")]
    VerifierRejectNotPending,
    #[error("Admins can only reject verified applications")]
    AdminRejectNotVerified,
    #[error("Only verified applications can be approved")]
    NotVerified,
    #[error("Rejection reason is required")]
    MissingReason,
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::MissingReason => ApiError::Validation(e.to_string()),
            other => ApiError::InvalidTransition(other.to_string()),
        }
    }
}

fn non_empty_reason(reason: Option<&str>) -> Result<String, TransitionError> {
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => Ok(r.to_string()),
        _ => Err(TransitionError::MissingReason),
    }
}

impl LoanApplication {
    /// Pending -> Verified, recording the acting verifier.
    pub fn verify(
        &mut self,
        verifier_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status != LoanStatus::Pending {
            return Err(TransitionError::NotPending);
        }
        self.status = LoanStatus::Verified;
        self.verified_by = Some(verifier_id.to_string());
        self.verification_date = Some(now.to_rfc3339());
        self.updated_at = now.to_rfc3339();
        Ok(())
    }

    /// Verified -> Approved, recording the acting admin.
    pub fn approve(&mut self, admin_id: &str, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != LoanStatus::Verified {
            return Err(TransitionError::NotVerified);
        }
        self.status = LoanStatus::Approved;
        self.approved_by = Some(admin_id.to_string());
        self.approval_date = Some(now.to_rfc3339());
        self.updated_at = now.to_rfc3339();
        Ok(())
    }

    /// Pending -> Rejected by a verifier; the reason is mandatory.
    pub fn reject_by_verifier(
        &mut self,
        verifier_id: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let reason = non_empty_reason(reason)?;
        if self.status != LoanStatus::Pending {
            return Err(TransitionError::VerifierRejectNotPending);
        }
        self.status = LoanStatus::Rejected;
        self.rejection_reason = Some(reason);
        self.verified_by = Some(verifier_id.to_string());
        self.verification_date = Some(now.to_rfc3339());
        self.updated_at = now.to_rfc3339();
        Ok(())
    }

    /// Verified -> Rejected by an admin; the reason is mandatory. The
    /// approver reference records who rejected and when.
    pub fn reject_by_admin(
        &mut self,
        admin_id: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let reason = non_empty_reason(reason)?;
        if self.status != LoanStatus::Verified {
            return Err(TransitionError::AdminRejectNotVerified);
        }
        self.status = LoanStatus::Rejected;
        self.rejection_reason = Some(reason);
        self.approved_by = Some(admin_id.to_string());
        self.approval_date = Some(now.to_rfc3339());
        self.updated_at = now.to_rfc3339();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CreateLoanRequest;

    fn pending_app() -> LoanApplication {
        LoanApplication::new(
            CreateLoanRequest {
                applicant_name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
                phone: "9876543210".to_string(),
                address: "123 Main St, City".to_string(),
                loan_amount: 50000.0,
                purpose: "Home Renovation".to_string(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn verify_moves_pending_to_verified_and_records_the_verifier() {
        let mut app = pending_app();
        app.verify("verifier-1", Utc::now()).unwrap();
        assert_eq!(app.status, LoanStatus::Verified);
        assert_eq!(app.verified_by.as_deref(), Some("verifier-1"));
        assert!(app.verification_date.is_some());
        assert!(app.approved_by.is_none());
    }

    #[test]
    fn verify_only_succeeds_from_pending() {
        let mut app = pending_app();
        app.verify("verifier-1", Utc::now()).unwrap();

        let before = app.clone();
        assert_eq!(
            app.verify("verifier-2", Utc::now()),
            Err(TransitionError::NotPending)
        );
        // A refused transition leaves the record untouched.
        assert_eq!(app.status, before.status);
        assert_eq!(app.verified_by, before.verified_by);
        assert_eq!(app.updated_at, before.updated_at);
    }

    #[test]
    fn approve_requires_verified() {
        let mut app = pending_app();
        assert_eq!(
            app.approve("admin-1", Utc::now()),
            Err(TransitionError::NotVerified)
        );
        assert_eq!(app.status, LoanStatus::Pending);

        app.verify("verifier-1", Utc::now()).unwrap();
        app.approve("admin-1", Utc::now()).unwrap();
        assert_eq!(app.status, LoanStatus::Approved);
        assert_eq!(app.approved_by.as_deref(), Some("admin-1"));
        assert!(app.approval_date.is_some());
    }

    #[test]
    fn rejected_and_approved_are_terminal() {
        let mut rejected = pending_app();
        rejected
            .reject_by_verifier("verifier-1", Some("insufficient income"), Utc::now())
            .unwrap();
        assert!(rejected.verify("verifier-1", Utc::now()).is_err());
        assert!(rejected.approve("admin-1", Utc::now()).is_err());
        assert!(rejected
            .reject_by_admin("admin-1", Some("again"), Utc::now())
            .is_err());
        assert_eq!(rejected.status, LoanStatus::Rejected);

        let mut approved = pending_app();
        approved.verify("verifier-1", Utc::now()).unwrap();
        approved.approve("admin-1", Utc::now()).unwrap();
        assert!(approved.verify("verifier-2", Utc::now()).is_err());
        assert!(approved.approve("admin-2", Utc::now()).is_err());
        assert!(approved
            .reject_by_verifier("verifier-1", Some("late"), Utc::now())
            .is_err());
        assert!(approved
            .reject_by_admin("admin-1", Some("late"), Utc::now())
            .is_err());
        assert_eq!(approved.status, LoanStatus::Approved);
    }

    #[test]
    fn verifier_rejection_stores_the_reason_verbatim() {
        let mut app = pending_app();
        app.reject_by_verifier("verifier-1", Some("insufficient income"), Utc::now())
            .unwrap();
        assert_eq!(app.status, LoanStatus::Rejected);
        assert_eq!(app.rejection_reason.as_deref(), Some("insufficient income"));
        assert_eq!(app.verified_by.as_deref(), Some("verifier-1"));

        // The follow-up approval must be refused.
        assert_eq!(
            app.approve("admin-1", Utc::now()),
            Err(TransitionError::NotVerified)
        );
    }

    #[test]
    fn rejection_without_a_reason_is_refused_and_changes_nothing() {
        let mut app = pending_app();
        let before = app.clone();

        assert_eq!(
            app.reject_by_verifier("verifier-1", None, Utc::now()),
            Err(TransitionError::MissingReason)
        );
        assert_eq!(
            app.reject_by_verifier("verifier-1", Some("   "), Utc::now()),
            Err(TransitionError::MissingReason)
        );
        assert_eq!(app.status, before.status);
        assert!(app.rejection_reason.is_none());
        assert_eq!(app.updated_at, before.updated_at);
    }

    #[test]
    fn admin_rejection_requires_verified_and_records_the_admin() {
        let mut app = pending_app();
        assert_eq!(
            app.reject_by_admin("admin-1", Some("risk too high"), Utc::now()),
            Err(TransitionError::AdminRejectNotVerified)
        );

        app.verify("verifier-1", Utc::now()).unwrap();
        app.reject_by_admin("admin-1", Some("risk too high"), Utc::now())
            .unwrap();
        assert_eq!(app.status, LoanStatus::Rejected);
        assert_eq!(app.approved_by.as_deref(), Some("admin-1"));
        assert!(app.approval_date.is_some());
        assert_eq!(app.rejection_reason.as_deref(), Some("risk too high"));
    }

    #[test]
    fn verifier_cannot_reject_a_verified_application() {
        let mut app = pending_app();
        app.verify("verifier-1", Utc::now()).unwrap();
        assert_eq!(
            app.reject_by_verifier("verifier-2", Some("too slow"), Utc::now()),
            Err(TransitionError::VerifierRejectNotPending)
        );
        assert_eq!(app.status, LoanStatus::Verified);
    }
}
