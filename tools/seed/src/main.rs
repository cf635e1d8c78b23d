//! Seeds the table with the demo admin, verifier and a few pending
//! applications so a fresh environment has something to click on.

use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::Utc;
use creditsea_shared::error::ApiError;
use creditsea_shared::types::{CreateLoanRequest, LoanApplication, Role, User};
use creditsea_shared::{password, store};

const SEED_PASSWORD: &str = "Password123";

async fn seed_user(
    client: &DynamoClient,
    table_name: &str,
    name: &str,
    email: &str,
    role: Role,
) -> Result<(), ApiError> {
    let user = User::new(name, email, role, Utc::now());
    let password_hash = password::hash(SEED_PASSWORD)?;
    match store::create_user(client, table_name, &user, &password_hash).await {
        Ok(()) => {
            tracing::info!("Created {} user {}", role.as_str(), email);
            Ok(())
        }
        Err(ApiError::Validation(_)) => {
            tracing::info!("User {} already exists, skipping", email);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

// Re-running the seed must not duplicate the samples; each insert would
// get a fresh id, so presence of any application means we already ran.
fn loans_already_seeded(existing: &[LoanApplication]) -> bool {
    !existing.is_empty()
}

fn sample_loans() -> Vec<CreateLoanRequest> {
    vec![
        CreateLoanRequest {
            applicant_name: "John Doe".to_string(),
            email: "john@example.com".to_string(),
            phone: "9876543210".to_string(),
            address: "123 Main St, City".to_string(),
            loan_amount: 50000.0,
            purpose: "Home Renovation".to_string(),
        },
        CreateLoanRequest {
            applicant_name: "Jane Smith".to_string(),
            email: "jane@example.com".to_string(),
            phone: "8765432109".to_string(),
            address: "456 Oak Ave, Town".to_string(),
            loan_amount: 100000.0,
            purpose: "Education".to_string(),
        },
        CreateLoanRequest {
            applicant_name: "Robert Johnson".to_string(),
            email: "robert@example.com".to_string(),
            phone: "7654321098".to_string(),
            address: "789 Pine Rd, Village".to_string(),
            loan_amount: 75000.0,
            purpose: "Business Expansion".to_string(),
        },
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().init();

    let table_name =
        std::env::var("TABLE_NAME").unwrap_or_else(|_| "creditsea-loans".to_string());

    let aws_config = aws_config::load_from_env().await;
    let client = DynamoClient::new(&aws_config);

    seed_user(
        &client,
        &table_name,
        "Admin User",
        "admin@creditsea.com",
        Role::Admin,
    )
    .await?;
    seed_user(
        &client,
        &table_name,
        "Verifier User",
        "verifier@creditsea.com",
        Role::Verifier,
    )
    .await?;

    let existing = store::scan_loans(&client, &table_name, None).await?;
    if loans_already_seeded(&existing) {
        tracing::info!(
            "Found {} loan applications, skipping samples",
            existing.len()
        );
    } else {
        for request in sample_loans() {
            let app = LoanApplication::new(request, Utc::now());
            store::put_loan(&client, &table_name, &app).await?;
            tracing::info!("Created loan application for {}", app.applicant_name);
        }
    }

    tracing::info!("Seeding complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_only_inserted_into_an_empty_table() {
        assert!(!loans_already_seeded(&[]));

        let seeded: Vec<LoanApplication> = sample_loans()
            .into_iter()
            .map(|req| LoanApplication::new(req, Utc::now()))
            .collect();
        assert!(loans_already_seeded(&seeded));
    }
}
