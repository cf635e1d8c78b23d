use creditsea_shared::error::ApiError;
use creditsea_shared::types::Role;
use creditsea_shared::{auth, dashboard, loans, users, AppState};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, Response,
};
use std::sync::Arc;

/// Main Lambda handler - routes requests to auth, loan and user endpoints.
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    tracing::info!("API invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Access-Control-Allow-Origin", "*")
            .header(
                "Access-Control-Allow-Methods",
                "GET,POST,PUT,DELETE,OPTIONS",
            )
            .header(
                "Access-Control-Allow-Headers",
                "Content-Type,Authorization",
            )
            .body(Body::Empty)
            .map_err(Box::new)?);
    }

    match route(&event, &state).await {
        Ok(response) => Ok(response),
        Err(e) => Ok(e.into_response()),
    }
}

async fn route(event: &Request, state: &AppState) -> Result<Response<Body>, ApiError> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    // The frontend mounts everything under /api; accept both shapes.
    let parts: &[&str] = match parts.as_slice() {
        ["api", rest @ ..] => rest,
        all => all,
    };

    match (method, parts) {
        // --- AUTH ---
        // POST /auth/register - public; creating admins requires an admin token
        (&Method::POST, ["auth", "register"]) => {
            // A missing or invalid token means an anonymous caller; a store
            // failure while resolving a valid token must surface as an error.
            let caller = match auth::authenticate(state, event).await {
                Ok(user) => Some(user),
                Err(ApiError::Unauthenticated(_)) => None,
                Err(e) => return Err(e),
            };
            auth::register(state, caller.as_ref(), body).await
        }
        // POST /auth/login
        (&Method::POST, ["auth", "login"]) => auth::login(state, body).await,
        // GET /auth/profile (also exposed as GET /users/profile)
        (&Method::GET, ["auth", "profile"]) | (&Method::GET, ["users", "profile"]) => {
            let user = auth::authenticate(state, event).await?;
            auth::profile(&user)
        }

        // --- LOANS ---
        // POST /loans - public application submission
        (&Method::POST, ["loans"]) => loans::create_application(state, body).await,
        // GET /loans - role-filtered listing
        (&Method::GET, ["loans"]) => {
            let user = auth::authenticate(state, event).await?;
            loans::list_applications(state, &user).await
        }
        // GET /loans/dashboard - aggregated stats
        (&Method::GET, ["loans", "dashboard"]) => {
            auth::authenticate(state, event).await?;
            dashboard::get_dashboard(state).await
        }
        // GET /loans/{id}
        (&Method::GET, ["loans", loan_id]) => {
            auth::authenticate(state, event).await?;
            loans::get_application(state, loan_id).await
        }
        // PUT /loans/{id}/verify - verifier only
        (&Method::PUT, ["loans", loan_id, "verify"]) => {
            let user = auth::authenticate(state, event).await?;
            auth::authorize(&user, &[Role::Verifier])?;
            loans::verify_application(state, &user, loan_id).await
        }
        // PUT /loans/{id}/reject-verifier - verifier only
        (&Method::PUT, ["loans", loan_id, "reject-verifier"]) => {
            let user = auth::authenticate(state, event).await?;
            auth::authorize(&user, &[Role::Verifier])?;
            loans::reject_application(state, &user, loan_id, body).await
        }
        // PUT /loans/{id}/reject-admin - admin only
        (&Method::PUT, ["loans", loan_id, "reject-admin"]) => {
            let user = auth::authenticate(state, event).await?;
            auth::authorize(&user, &[Role::Admin])?;
            loans::reject_application(state, &user, loan_id, body).await
        }
        // PUT /loans/{id}/approve - admin only
        (&Method::PUT, ["loans", loan_id, "approve"]) => {
            let user = auth::authenticate(state, event).await?;
            auth::authorize(&user, &[Role::Admin])?;
            loans::approve_application(state, &user, loan_id).await
        }

        // --- USERS (admin only) ---
        // GET /users/all
        (&Method::GET, ["users", "all"]) => {
            let user = auth::authenticate(state, event).await?;
            auth::authorize(&user, &[Role::Admin])?;
            users::list_users(state).await
        }
        // GET /users/admins
        (&Method::GET, ["users", "admins"]) => {
            let user = auth::authenticate(state, event).await?;
            auth::authorize(&user, &[Role::Admin])?;
            users::list_admins(state).await
        }
        // POST /users/admin
        (&Method::POST, ["users", "admin"]) => {
            let user = auth::authenticate(state, event).await?;
            auth::authorize(&user, &[Role::Admin])?;
            users::create_admin(state, body).await
        }
        // DELETE /users/{userId}
        (&Method::DELETE, ["users", user_id]) => {
            let user = auth::authenticate(state, event).await?;
            auth::authorize(&user, &[Role::Admin])?;
            users::delete_user(state, &user, user_id).await
        }

        _ => {
            tracing::warn!("No route matched - Method: {} Path: {}", method, path);
            Err(ApiError::NotFound("Not found".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::config::{BehaviorVersion, Region};
    use aws_sdk_dynamodb::Client as DynamoClient;
    use chrono::Utc;
    use creditsea_shared::Config;

    fn test_state() -> Arc<AppState> {
        let dynamo_config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        AppState::new(
            DynamoClient::from_conf(dynamo_config),
            Config {
                table_name: "test-table".to_string(),
                jwt_secret: "test-secret".to_string(),
                token_ttl_hours: 24,
            },
        )
    }

    fn request(method: Method, path: &str, body: Body) -> Request {
        lambda_http::http::Request::builder()
            .method(method)
            .uri(path)
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn preflight_requests_are_answered() {
        let response = function_handler(
            request(Method::OPTIONS, "/loans", Body::Empty),
            test_state(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn listing_loans_requires_a_token() {
        let response = function_handler(request(Method::GET, "/loans", Body::Empty), test_state())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn api_prefix_is_accepted() {
        let response = function_handler(
            request(Method::GET, "/api/loans", Body::Empty),
            test_state(),
        )
        .await
        .unwrap();
        // 401 (not 404) proves the route matched behind the prefix.
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn transitions_require_a_token() {
        for path in [
            "/loans/abc/verify",
            "/loans/abc/reject-verifier",
            "/loans/abc/reject-admin",
            "/loans/abc/approve",
        ] {
            let response =
                function_handler(request(Method::PUT, path, Body::Empty), test_state())
                    .await
                    .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", path);
        }
    }

    #[tokio::test]
    async fn garbled_tokens_are_rejected_before_any_lookup() {
        let req = lambda_http::http::Request::builder()
            .method(Method::GET)
            .uri("/auth/profile")
            .header("Authorization", "Bearer not.a.token")
            .body(Body::Empty)
            .unwrap();
        let response = function_handler(req, test_state()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_routes_return_not_found() {
        let response = function_handler(
            request(Method::GET, "/nothing/here", Body::Empty),
            test_state(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn anonymous_admin_registration_is_forbidden() {
        let body = serde_json::json!({
            "name": "Eve",
            "email": "eve@example.com",
            "password": "Password123",
            "role": "admin"
        });
        let response = function_handler(
            request(Method::POST, "/auth/register", Body::Text(body.to_string())),
            test_state(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn failed_caller_lookup_is_not_treated_as_anonymous() {
        // The token verifies against the test secret, so resolving the
        // caller reaches the store; with no store available that must be a
        // server error, not a silent downgrade to an anonymous caller.
        let token = creditsea_shared::token::issue("some-admin", "test-secret", Utc::now(), 24);
        let body = serde_json::json!({
            "name": "Eve",
            "email": "eve@example.com",
            "password": "Password123",
            "role": "admin"
        });
        let req = lambda_http::http::Request::builder()
            .method(Method::POST)
            .uri("/auth/register")
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::Text(body.to_string()))
            .unwrap();
        let response = function_handler(req, test_state()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn malformed_login_body_is_a_validation_error() {
        let response = function_handler(
            request(
                Method::POST,
                "/auth/login",
                Body::Text("not json".to_string()),
            ),
            test_state(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_loan_submission_is_rejected() {
        let body = serde_json::json!({
            "applicantName": "John Doe",
            "email": "john@example.com",
            "phone": "9876543210",
            "address": "123 Main St",
            "loanAmount": 500.0,
            "purpose": "Too small"
        });
        let response = function_handler(
            request(Method::POST, "/loans", Body::Text(body.to_string())),
            test_state(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
