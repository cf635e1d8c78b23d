use chrono::Utc;
use lambda_http::http::StatusCode;
use lambda_http::{Body, Response};

use crate::error::{json_response, ApiError};
use crate::types::{CreateAdminRequest, Role, User};
use crate::{parse_body, password, store, AppState};

/// GET /users/all - every user, password hashes never leave the store.
pub async fn list_users(state: &AppState) -> Result<Response<Body>, ApiError> {
    let users = store::scan_users(&state.dynamo, &state.config.table_name, None).await?;
    json_response(StatusCode::OK, &serde_json::json!({ "users": users }))
}

/// GET /users/admins.
pub async fn list_admins(state: &AppState) -> Result<Response<Body>, ApiError> {
    let admins =
        store::scan_users(&state.dynamo, &state.config.table_name, Some(Role::Admin)).await?;
    json_response(StatusCode::OK, &serde_json::json!({ "admins": admins }))
}

/// POST /users/admin - an existing admin provisions another one.
pub async fn create_admin(state: &AppState, body: &Body) -> Result<Response<Body>, ApiError> {
    let req: CreateAdminRequest = parse_body(body)?;
    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "Name, email and password are required".to_string(),
        ));
    }

    let admin = User::new(&req.name, &req.email, Role::Admin, Utc::now());
    let password_hash = password::hash(&req.password)?;
    store::create_user(&state.dynamo, &state.config.table_name, &admin, &password_hash).await?;

    tracing::info!("Admin {} created", admin.user_id);

    json_response(
        StatusCode::CREATED,
        &serde_json::json!({
            "message": "Admin created successfully",
            "admin": admin,
        }),
    )
}

/// DELETE /users/{userId}. Admins cannot delete their own account.
pub async fn delete_user(
    state: &AppState,
    acting: &User,
    user_id: &str,
) -> Result<Response<Body>, ApiError> {
    let target = store::get_user(&state.dynamo, &state.config.table_name, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    check_self_deletion(acting, &target)?;

    store::delete_user(&state.dynamo, &state.config.table_name, &target).await?;

    tracing::info!("User {} deleted by {}", user_id, acting.user_id);

    json_response(
        StatusCode::OK,
        &serde_json::json!({ "message": "User deleted successfully" }),
    )
}

fn check_self_deletion(acting: &User, target: &User) -> Result<(), ApiError> {
    if acting.user_id == target.user_id {
        return Err(ApiError::Validation(
            "Cannot delete your own account".to_string(),
        ));
    }
    Ok(())
}
