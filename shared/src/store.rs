//! Single-table DynamoDB access. Users, their email-uniqueness markers and
//! loan applications share one table, discriminated by `entity_type` so
//! list endpoints can use filtered scans.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;

use crate::error::ApiError;
use crate::types::{LoanApplication, LoanStatus, Role, User};

const ENTITY_USER: &str = "USER";
const ENTITY_EMAIL: &str = "EMAIL";
const ENTITY_LOAN: &str = "LOAN";

fn user_key(user_id: &str) -> String {
    format!("USER#{}", user_id)
}

fn email_key(email: &str) -> String {
    format!("EMAIL#{}", email.trim().to_lowercase())
}

fn loan_key(loan_id: &str) -> String {
    format!("LOAN#{}", loan_id)
}

fn s(item: &HashMap<String, AttributeValue>, attr: &str) -> Option<String> {
    item.get(attr).and_then(|v| v.as_s().ok()).cloned()
}

fn n_f64(item: &HashMap<String, AttributeValue>, attr: &str) -> Option<f64> {
    item.get(attr)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<f64>().ok())
}

fn n_u64(item: &HashMap<String, AttributeValue>, attr: &str) -> Option<u64> {
    item.get(attr)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<u64>().ok())
}

// ========== ITEM MAPPING ==========

pub fn user_to_item(user: &User, password_hash: &str) -> HashMap<String, AttributeValue> {
    let pk = user_key(&user.user_id);
    HashMap::from([
        ("PK".to_string(), AttributeValue::S(pk.clone())),
        ("SK".to_string(), AttributeValue::S(pk)),
        (
            "entity_type".to_string(),
            AttributeValue::S(ENTITY_USER.to_string()),
        ),
        (
            "user_id".to_string(),
            AttributeValue::S(user.user_id.clone()),
        ),
        ("name".to_string(), AttributeValue::S(user.name.clone())),
        ("email".to_string(), AttributeValue::S(user.email.clone())),
        (
            "password_hash".to_string(),
            AttributeValue::S(password_hash.to_string()),
        ),
        (
            "role".to_string(),
            AttributeValue::S(user.role.as_str().to_string()),
        ),
        (
            "created_at".to_string(),
            AttributeValue::S(user.created_at.clone()),
        ),
    ])
}

pub fn user_from_item(item: &HashMap<String, AttributeValue>) -> Option<User> {
    Some(User {
        user_id: s(item, "user_id")?,
        name: s(item, "name")?,
        email: s(item, "email")?,
        role: Role::parse(&s(item, "role")?)?,
        created_at: s(item, "created_at")?,
    })
}

fn item_password_hash(item: &HashMap<String, AttributeValue>) -> Option<String> {
    s(item, "password_hash")
}

pub fn loan_to_item(app: &LoanApplication) -> HashMap<String, AttributeValue> {
    let pk = loan_key(&app.loan_id);
    let mut item = HashMap::from([
        ("PK".to_string(), AttributeValue::S(pk.clone())),
        ("SK".to_string(), AttributeValue::S(pk)),
        (
            "entity_type".to_string(),
            AttributeValue::S(ENTITY_LOAN.to_string()),
        ),
        ("loan_id".to_string(), AttributeValue::S(app.loan_id.clone())),
        (
            "applicant_name".to_string(),
            AttributeValue::S(app.applicant_name.clone()),
        ),
        ("email".to_string(), AttributeValue::S(app.email.clone())),
        ("phone".to_string(), AttributeValue::S(app.phone.clone())),
        (
            "address".to_string(),
            AttributeValue::S(app.address.clone()),
        ),
        (
            "loan_amount".to_string(),
            AttributeValue::N(app.loan_amount.to_string()),
        ),
        (
            "purpose".to_string(),
            AttributeValue::S(app.purpose.clone()),
        ),
        (
            "status".to_string(),
            AttributeValue::S(app.status.as_str().to_string()),
        ),
        (
            "created_at".to_string(),
            AttributeValue::S(app.created_at.clone()),
        ),
        (
            "updated_at".to_string(),
            AttributeValue::S(app.updated_at.clone()),
        ),
        (
            "version".to_string(),
            AttributeValue::N(app.version.to_string()),
        ),
    ]);
    if let Some(verified_by) = &app.verified_by {
        item.insert(
            "verified_by".to_string(),
            AttributeValue::S(verified_by.clone()),
        );
    }
    if let Some(verification_date) = &app.verification_date {
        item.insert(
            "verification_date".to_string(),
            AttributeValue::S(verification_date.clone()),
        );
    }
    if let Some(approved_by) = &app.approved_by {
        item.insert(
            "approved_by".to_string(),
            AttributeValue::S(approved_by.clone()),
        );
    }
    if let Some(approval_date) = &app.approval_date {
        item.insert(
            "approval_date".to_string(),
            AttributeValue::S(approval_date.clone()),
        );
    }
    if let Some(rejection_reason) = &app.rejection_reason {
        item.insert(
            "rejection_reason".to_string(),
            AttributeValue::S(rejection_reason.clone()),
        );
    }
    item
}

pub fn loan_from_item(item: &HashMap<String, AttributeValue>) -> Option<LoanApplication> {
    Some(LoanApplication {
        loan_id: s(item, "loan_id")?,
        applicant_name: s(item, "applicant_name")?,
        email: s(item, "email")?,
        phone: s(item, "phone")?,
        address: s(item, "address")?,
        loan_amount: n_f64(item, "loan_amount")?,
        purpose: s(item, "purpose")?,
        status: LoanStatus::parse(&s(item, "status")?)?,
        verified_by: s(item, "verified_by"),
        verification_date: s(item, "verification_date"),
        approved_by: s(item, "approved_by"),
        approval_date: s(item, "approval_date"),
        rejection_reason: s(item, "rejection_reason"),
        created_at: s(item, "created_at")?,
        updated_at: s(item, "updated_at")?,
        version: n_u64(item, "version").unwrap_or(1),
    })
}

// ========== USERS ==========

/// Store a new user. The email marker item is written first with a
/// conditional put, so a duplicate email fails before the user item exists.
pub async fn create_user(
    client: &DynamoClient,
    table_name: &str,
    user: &User,
    password_hash: &str,
) -> Result<(), ApiError> {
    let email_pk = email_key(&user.email);
    client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(email_pk.clone()))
        .item("SK", AttributeValue::S(email_pk))
        .item(
            "entity_type",
            AttributeValue::S(ENTITY_EMAIL.to_string()),
        )
        .item("user_id", AttributeValue::S(user.user_id.clone()))
        .condition_expression("attribute_not_exists(PK)")
        .send()
        .await
        .map_err(|e| {
            if e.as_service_error()
                .is_some_and(|se| se.is_conditional_check_failed_exception())
            {
                ApiError::Validation("User with this email already exists".to_string())
            } else {
                e.into()
            }
        })?;

    client
        .put_item()
        .table_name(table_name)
        .set_item(Some(user_to_item(user, password_hash)))
        .send()
        .await?;
    Ok(())
}

pub async fn get_user(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Option<User>, ApiError> {
    let pk = user_key(user_id);
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await?;
    Ok(result.item().and_then(user_from_item))
}

/// Look up a user by email, returning the record and its password hash.
pub async fn find_user_by_email(
    client: &DynamoClient,
    table_name: &str,
    email: &str,
) -> Result<Option<(User, String)>, ApiError> {
    let pk = email_key(email);
    let marker = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await?;
    let user_id = match marker.item().and_then(|item| s(item, "user_id")) {
        Some(id) => id,
        None => return Ok(None),
    };

    let pk = user_key(&user_id);
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await?;
    match result.item() {
        Some(item) => match (user_from_item(item), item_password_hash(item)) {
            (Some(user), Some(hash)) => Ok(Some((user, hash))),
            _ => Err(ApiError::Internal(format!(
                "Stored user item for {} is malformed",
                user_id
            ))),
        },
        None => Ok(None),
    }
}

/// Remove a user and the email marker that reserved their address.
pub async fn delete_user(
    client: &DynamoClient,
    table_name: &str,
    user: &User,
) -> Result<(), ApiError> {
    let pk = user_key(&user.user_id);
    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await?;

    let pk = email_key(&user.email);
    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await?;
    Ok(())
}

pub async fn scan_users(
    client: &DynamoClient,
    table_name: &str,
    role: Option<Role>,
) -> Result<Vec<User>, ApiError> {
    let items = scan_entities(client, table_name, ENTITY_USER, role.map(|r| r.as_str())).await?;
    let mut users: Vec<User> = items.iter().filter_map(user_from_item).collect();
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(users)
}

// ========== LOAN APPLICATIONS ==========

pub async fn put_loan(
    client: &DynamoClient,
    table_name: &str,
    app: &LoanApplication,
) -> Result<(), ApiError> {
    client
        .put_item()
        .table_name(table_name)
        .set_item(Some(loan_to_item(app)))
        .send()
        .await?;
    Ok(())
}

/// Persist a transitioned application, guarded against concurrent updates.
/// `expected_version` is the version the record had when it was read; the
/// write only succeeds if nobody else transitioned it in between.
pub async fn put_loan_guarded(
    client: &DynamoClient,
    table_name: &str,
    app: &LoanApplication,
    expected_version: u64,
) -> Result<(), ApiError> {
    client
        .put_item()
        .table_name(table_name)
        .set_item(Some(loan_to_item(app)))
        .condition_expression("version = :expected")
        .expression_attribute_values(":expected", AttributeValue::N(expected_version.to_string()))
        .send()
        .await
        .map_err(|e| {
            if e.as_service_error()
                .is_some_and(|se| se.is_conditional_check_failed_exception())
            {
                ApiError::Conflict(
                    "Loan application was updated concurrently, please retry".to_string(),
                )
            } else {
                e.into()
            }
        })?;
    Ok(())
}

pub async fn get_loan(
    client: &DynamoClient,
    table_name: &str,
    loan_id: &str,
) -> Result<Option<LoanApplication>, ApiError> {
    let pk = loan_key(loan_id);
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await?;
    Ok(result.item().and_then(loan_from_item))
}

/// Full filtered scan, optionally narrowed to one status. Newest first.
pub async fn scan_loans(
    client: &DynamoClient,
    table_name: &str,
    status: Option<LoanStatus>,
) -> Result<Vec<LoanApplication>, ApiError> {
    let items =
        scan_entities(client, table_name, ENTITY_LOAN, status.map(|st| st.as_str())).await?;
    let mut loans: Vec<LoanApplication> = items.iter().filter_map(loan_from_item).collect();
    loans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(loans)
}

/// Paginated scan over one entity type, optionally filtered by status/role.
async fn scan_entities(
    client: &DynamoClient,
    table_name: &str,
    entity_type: &str,
    status: Option<&str>,
) -> Result<Vec<HashMap<String, AttributeValue>>, ApiError> {
    let mut items = Vec::new();
    let mut last_key: Option<HashMap<String, AttributeValue>> = None;
    loop {
        let mut request = client
            .scan()
            .table_name(table_name)
            .expression_attribute_values(":type", AttributeValue::S(entity_type.to_string()));
        if let Some(value) = status {
            // "status" and "role" are reserved words in DynamoDB expressions
            let attr = if entity_type == ENTITY_USER { "role" } else { "status" };
            request = request
                .filter_expression("entity_type = :type AND #f = :f")
                .expression_attribute_names("#f", attr)
                .expression_attribute_values(":f", AttributeValue::S(value.to_string()));
        } else {
            request = request.filter_expression("entity_type = :type");
        }
        if let Some(key) = last_key.take() {
            request = request.set_exclusive_start_key(Some(key));
        }

        let output = request.send().await?;
        items.extend(output.items().iter().cloned());
        last_key = output.last_evaluated_key().cloned();
        if last_key.is_none() {
            break;
        }
    }
    Ok(items)
}
