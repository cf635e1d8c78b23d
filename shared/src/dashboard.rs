//! Read-side aggregation for the dashboard. Every request recomputes from
//! a full scan; counts therefore always match the collection at read time.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike};
use lambda_http::http::StatusCode;
use lambda_http::{Body, Response};
use serde::Serialize;

use crate::error::{json_response, ApiError};
use crate::types::{LoanApplication, LoanStatus};
use crate::{store, AppState};

const RECENT_LIMIT: usize = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_pending: u64,
    pub total_verified: u64,
    pub total_approved: u64,
    pub total_rejected: u64,
    pub total_applications: u64,
    pub total_loan_amount: f64,
    pub recent_applications: Vec<LoanApplication>,
    pub monthly_data: Vec<MonthlyCount>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MonthlyCount {
    pub year: i32,
    pub month: u32,
    pub count: u64,
}

/// Fold the whole collection into dashboard numbers. Expects applications
/// sorted newest first (as `store::scan_loans` returns them).
pub fn summarize(applications: &[LoanApplication]) -> DashboardStats {
    let mut total_pending = 0;
    let mut total_verified = 0;
    let mut total_approved = 0;
    let mut total_rejected = 0;
    let mut total_loan_amount = 0.0;
    let mut monthly: BTreeMap<(i32, u32), u64> = BTreeMap::new();

    for app in applications {
        match app.status {
            LoanStatus::Pending => total_pending += 1,
            LoanStatus::Verified => total_verified += 1,
            LoanStatus::Approved => {
                total_approved += 1;
                total_loan_amount += app.loan_amount;
            }
            LoanStatus::Rejected => total_rejected += 1,
        }
        if let Ok(created) = DateTime::parse_from_rfc3339(&app.created_at) {
            *monthly.entry((created.year(), created.month())).or_insert(0) += 1;
        }
    }

    DashboardStats {
        total_pending,
        total_verified,
        total_approved,
        total_rejected,
        total_applications: applications.len() as u64,
        total_loan_amount,
        recent_applications: applications.iter().take(RECENT_LIMIT).cloned().collect(),
        monthly_data: monthly
            .into_iter()
            .map(|((year, month), count)| MonthlyCount { year, month, count })
            .collect(),
    }
}

/// GET /loans/dashboard.
pub async fn get_dashboard(state: &AppState) -> Result<Response<Body>, ApiError> {
    let applications =
        store::scan_loans(&state.dynamo, &state.config.table_name, None).await?;
    let stats = summarize(&applications);
    json_response(StatusCode::OK, &serde_json::json!({ "stats": stats }))
}
