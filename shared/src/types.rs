use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum amount accepted on a loan application
pub const MIN_LOAN_AMOUNT: f64 = 1000.0;

// ========== USER ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Borrower,
    Verifier,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Borrower => "borrower",
            Role::Verifier => "verifier",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "borrower" => Some(Role::Borrower),
            "verifier" => Some(Role::Verifier),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Stored user record. The password hash lives only in the DynamoDB item,
/// never in this struct, so a `User` is always safe to serialize to clients.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "id")]
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
}

impl User {
    pub fn new(name: &str, email: &str, role: Role, now: DateTime<Utc>) -> User {
        User {
            user_id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            role,
            created_at: now.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

// ========== LOAN APPLICATION ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Pending,
    Verified,
    Rejected,
    Approved,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Verified => "verified",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Option<LoanStatus> {
        match s {
            "pending" => Some(LoanStatus::Pending),
            "verified" => Some(LoanStatus::Verified),
            "rejected" => Some(LoanStatus::Rejected),
            "approved" => Some(LoanStatus::Approved),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoanApplication {
    #[serde(rename = "id")]
    pub loan_id: String,
    pub applicant_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub loan_amount: f64,
    pub purpose: String,
    pub status: LoanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Compare-and-swap counter for status transitions; internal only.
    #[serde(skip_serializing, default = "initial_version")]
    pub version: u64,
}

fn initial_version() -> u64 {
    1
}

impl LoanApplication {
    pub fn new(req: CreateLoanRequest, now: DateTime<Utc>) -> LoanApplication {
        let ts = now.to_rfc3339();
        LoanApplication {
            loan_id: Uuid::new_v4().to_string(),
            applicant_name: req.applicant_name.trim().to_string(),
            email: req.email.trim().to_lowercase(),
            phone: req.phone.trim().to_string(),
            address: req.address.trim().to_string(),
            loan_amount: req.loan_amount,
            purpose: req.purpose.trim().to_string(),
            status: LoanStatus::Pending,
            verified_by: None,
            verification_date: None,
            approved_by: None,
            approval_date: None,
            rejection_reason: None,
            created_at: ts.clone(),
            updated_at: ts,
            version: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanRequest {
    pub applicant_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub loan_amount: f64,
    pub purpose: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RejectLoanRequest {
    pub rejection_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loan_status_round_trips_through_strings() {
        for status in [
            LoanStatus::Pending,
            LoanStatus::Verified,
            LoanStatus::Rejected,
            LoanStatus::Approved,
        ] {
            assert_eq!(LoanStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(LoanStatus::parse("cancelled"), None);
    }

    #[test]
    fn new_application_starts_pending_with_trimmed_fields() {
        let req = CreateLoanRequest {
            applicant_name: "  John Doe ".to_string(),
            email: "John@Example.com".to_string(),
            phone: "9876543210".to_string(),
            address: "123 Main St, City".to_string(),
            loan_amount: 50000.0,
            purpose: " Home Renovation ".to_string(),
        };
        let app = LoanApplication::new(req, Utc::now());
        assert_eq!(app.status, LoanStatus::Pending);
        assert_eq!(app.applicant_name, "John Doe");
        assert_eq!(app.email, "john@example.com");
        assert_eq!(app.purpose, "Home Renovation");
        assert_eq!(app.version, 1);
        assert!(app.verified_by.is_none());
        assert!(app.approved_by.is_none());
    }

    #[test]
    fn serialized_application_uses_camel_case_and_hides_version() {
        let req = CreateLoanRequest {
            applicant_name: "Jane Smith".to_string(),
            email: "jane@example.com".to_string(),
            phone: "8765432109".to_string(),
            address: "456 Oak Ave, Town".to_string(),
            loan_amount: 100000.0,
            purpose: "Education".to_string(),
        };
        let app = LoanApplication::new(req, Utc::now());
        let value = serde_json::to_value(&app).unwrap();
        assert_eq!(value["applicantName"], "Jane Smith");
        assert_eq!(value["loanAmount"], 100000.0);
        assert_eq!(value["status"], "pending");
        assert!(value.get("version").is_none());
        assert!(value.get("rejectionReason").is_none());
    }
}
