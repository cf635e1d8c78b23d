use chrono::Utc;
use lambda_http::http::StatusCode;
use lambda_http::{Body, Response};

use crate::error::{json_response, ApiError};
use crate::types::{
    CreateLoanRequest, LoanApplication, LoanStatus, RejectLoanRequest, Role, User,
    MIN_LOAN_AMOUNT,
};
use crate::{parse_body, store, AppState};

fn validate_submission(req: &CreateLoanRequest) -> Result<(), ApiError> {
    let required = [
        (req.applicant_name.as_str(), "Applicant name is required"),
        (req.phone.as_str(), "Phone is required"),
        (req.address.as_str(), "Address is required"),
        (req.purpose.as_str(), "Purpose is required"),
    ];
    for (value, message) in required {
        if value.trim().is_empty() {
            return Err(ApiError::Validation(message.to_string()));
        }
    }
    if req.email.trim().is_empty() || !req.email.contains('@') {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }
    if !req.loan_amount.is_finite() || req.loan_amount < MIN_LOAN_AMOUNT {
        return Err(ApiError::Validation(format!(
            "Loan amount must be at least {}",
            MIN_LOAN_AMOUNT
        )));
    }
    Ok(())
}

/// POST /loans - public submission, always starts out pending.
pub async fn create_application(state: &AppState, body: &Body) -> Result<Response<Body>, ApiError> {
    let req: CreateLoanRequest = parse_body(body)?;
    validate_submission(&req)?;

    let app = LoanApplication::new(req, Utc::now());
    store::put_loan(&state.dynamo, &state.config.table_name, &app).await?;

    tracing::info!("Loan application {} submitted", app.loan_id);

    json_response(
        StatusCode::CREATED,
        &serde_json::json!({
            "message": "Loan application submitted successfully",
            "application": app,
        }),
    )
}

/// Which applications a role gets to list: verifiers work the pending
/// queue, admins the verified queue, everyone else sees the full set.
fn listing_filter(role: Role) -> Option<LoanStatus> {
    match role {
        Role::Verifier => Some(LoanStatus::Pending),
        Role::Admin => Some(LoanStatus::Verified),
        Role::Borrower => None,
    }
}

/// GET /loans - role-filtered listing, newest first.
pub async fn list_applications(state: &AppState, user: &User) -> Result<Response<Body>, ApiError> {
    let applications = store::scan_loans(
        &state.dynamo,
        &state.config.table_name,
        listing_filter(user.role),
    )
    .await?;
    json_response(
        StatusCode::OK,
        &serde_json::json!({ "applications": applications }),
    )
}

/// GET /loans/{id}.
pub async fn get_application(
    state: &AppState,
    loan_id: &str,
) -> Result<Response<Body>, ApiError> {
    let app = load(state, loan_id).await?;
    json_response(StatusCode::OK, &serde_json::json!({ "application": app }))
}

/// PUT /loans/{id}/verify - verifier moves a pending application forward.
pub async fn verify_application(
    state: &AppState,
    user: &User,
    loan_id: &str,
) -> Result<Response<Body>, ApiError> {
    let mut app = load(state, loan_id).await?;
    let expected_version = app.version;
    app.verify(&user.user_id, Utc::now())?;
    app.version += 1;
    store::put_loan_guarded(&state.dynamo, &state.config.table_name, &app, expected_version)
        .await?;

    tracing::info!("Loan application {} verified by {}", loan_id, user.user_id);

    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "message": "Loan application verified successfully",
            "application": app,
        }),
    )
}

/// PUT /loans/{id}/approve - admin finalizes a verified application.
pub async fn approve_application(
    state: &AppState,
    user: &User,
    loan_id: &str,
) -> Result<Response<Body>, ApiError> {
    let mut app = load(state, loan_id).await?;
    let expected_version = app.version;
    app.approve(&user.user_id, Utc::now())?;
    app.version += 1;
    store::put_loan_guarded(&state.dynamo, &state.config.table_name, &app, expected_version)
        .await?;

    tracing::info!("Loan application {} approved by {}", loan_id, user.user_id);

    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "message": "Loan application approved successfully",
            "application": app,
        }),
    )
}

/// PUT /loans/{id}/reject-verifier and /loans/{id}/reject-admin. The stage
/// rejected from depends on the caller's role; the routes are role-gated
/// before this is reached.
pub async fn reject_application(
    state: &AppState,
    user: &User,
    loan_id: &str,
    body: &Body,
) -> Result<Response<Body>, ApiError> {
    let req: RejectLoanRequest = if matches!(body, Body::Empty) {
        RejectLoanRequest::default()
    } else {
        parse_body(body)?
    };
    let reason = req.rejection_reason.as_deref();

    let mut app = load(state, loan_id).await?;
    let expected_version = app.version;
    match user.role {
        Role::Verifier => app.reject_by_verifier(&user.user_id, reason, Utc::now())?,
        Role::Admin => app.reject_by_admin(&user.user_id, reason, Utc::now())?,
        Role::Borrower => {
            return Err(ApiError::Forbidden(
                "Access denied: Insufficient permissions".to_string(),
            ))
        }
    }
    app.version += 1;
    store::put_loan_guarded(&state.dynamo, &state.config.table_name, &app, expected_version)
        .await?;

    tracing::info!("Loan application {} rejected by {}", loan_id, user.user_id);

    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "message": "Loan application rejected successfully",
            "application": app,
        }),
    )
}

async fn load(state: &AppState, loan_id: &str) -> Result<LoanApplication, ApiError> {
    store::get_loan(&state.dynamo, &state.config.table_name, loan_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Loan application not found".to_string()))
}
