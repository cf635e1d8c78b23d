use chrono::Utc;
use lambda_http::http::StatusCode;
use lambda_http::{Body, Request, Response};

use crate::error::{json_response, ApiError};
use crate::types::{LoginRequest, RegisterRequest, Role, User};
use crate::{parse_body, password, store, token, AppState};

/// Resolve the caller from the `Authorization: Bearer <token>` header.
/// Fails if the header is missing, the token does not verify, or the
/// referenced user no longer exists.
pub async fn authenticate(state: &AppState, event: &Request) -> Result<User, ApiError> {
    let header = event
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthenticated("Authentication required".to_string()))?;
    let raw_token = header.strip_prefix("Bearer ").unwrap_or(header).trim();

    let claims = token::verify(raw_token, &state.config.jwt_secret, Utc::now())
        .map_err(|_| ApiError::Unauthenticated("Authentication failed".to_string()))?;

    store::get_user(&state.dynamo, &state.config.table_name, &claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("Invalid authentication token".to_string()))
}

/// Role gate. Pure membership check, no lookups.
pub fn authorize(user: &User, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Access denied: Insufficient permissions".to_string(),
        ))
    }
}

fn validate_credentials(name: &str, email: &str, password: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation("Name is required".to_string()));
    }
    if email.trim().is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }
    if password.is_empty() {
        return Err(ApiError::Validation("Password is required".to_string()));
    }
    Ok(())
}

/// POST /auth/register. Public, but creating an admin account requires the
/// caller to be an authenticated admin.
pub async fn register(
    state: &AppState,
    caller: Option<&User>,
    body: &Body,
) -> Result<Response<Body>, ApiError> {
    let req: RegisterRequest = parse_body(body)?;
    validate_credentials(&req.name, &req.email, &req.password)?;

    let role = req.role.unwrap_or(Role::Verifier);
    if role == Role::Admin && caller.map(|u| u.role) != Some(Role::Admin) {
        return Err(ApiError::Forbidden(
            "Only admins can create admin accounts".to_string(),
        ));
    }

    let user = User::new(&req.name, &req.email, role, Utc::now());
    let password_hash = password::hash(&req.password)?;
    store::create_user(&state.dynamo, &state.config.table_name, &user, &password_hash).await?;

    tracing::info!("Registered {} user {}", role.as_str(), user.user_id);

    let issued = token::issue(
        &user.user_id,
        &state.config.jwt_secret,
        Utc::now(),
        state.config.token_ttl_hours,
    );
    json_response(
        StatusCode::CREATED,
        &serde_json::json!({
            "message": "User registered successfully",
            "token": issued,
            "user": user,
        }),
    )
}

/// POST /auth/login.
pub async fn login(state: &AppState, body: &Body) -> Result<Response<Body>, ApiError> {
    let req: LoginRequest = parse_body(body)?;

    tracing::info!("Login attempt for {}", req.email);

    let found = store::find_user_by_email(&state.dynamo, &state.config.table_name, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("Invalid email or password".to_string()))?;
    let (user, stored_hash) = found;

    if !password::verify(&req.password, &stored_hash)? {
        return Err(ApiError::Unauthenticated(
            "Invalid email or password".to_string(),
        ));
    }

    let issued = token::issue(
        &user.user_id,
        &state.config.jwt_secret,
        Utc::now(),
        state.config.token_ttl_hours,
    );
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "message": "Login successful",
            "token": issued,
            "user": user,
        }),
    )
}

/// GET /auth/profile (also served as GET /users/profile).
pub fn profile(user: &User) -> Result<Response<Body>, ApiError> {
    json_response(StatusCode::OK, &serde_json::json!({ "user": user }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_role(role: Role) -> User {
        User::new("Test User", "test@creditsea.com", role, Utc::now())
    }

    #[test]
    fn authorize_checks_role_membership() {
        let verifier = user_with_role(Role::Verifier);
        assert!(authorize(&verifier, &[Role::Verifier]).is_ok());
        assert!(authorize(&verifier, &[Role::Verifier, Role::Admin]).is_ok());
        assert!(matches!(
            authorize(&verifier, &[Role::Admin]),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn credentials_must_be_present() {
        assert!(validate_credentials("Jo", "jo@example.com", "pw").is_ok());
        assert!(validate_credentials("", "jo@example.com", "pw").is_err());
        assert!(validate_credentials("Jo", "", "pw").is_err());
        assert!(validate_credentials("Jo", "not-an-email", "pw").is_err());
        assert!(validate_credentials("Jo", "jo@example.com", "").is_err());
    }
}
