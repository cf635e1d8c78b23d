pub mod auth;
pub mod dashboard;
pub mod error;
pub mod loans;
pub mod password;
pub mod store;
pub mod token;
pub mod types;
pub mod users;
pub mod workflow;

use std::sync::Arc;

use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::Body;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl Config {
    /// Load from the environment. `JWT_SECRET` is mandatory; the table name
    /// and token lifetime have defaults.
    pub fn from_env() -> Result<Config, String> {
        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set".to_string())?;
        let table_name =
            std::env::var("TABLE_NAME").unwrap_or_else(|_| "creditsea-loans".to_string());
        let token_ttl_hours = std::env::var("TOKEN_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(24);
        Ok(Config {
            table_name,
            jwt_secret,
            token_ttl_hours,
        })
    }
}

/// Shared application state
pub struct AppState {
    pub dynamo: DynamoClient,
    pub config: Config,
}

impl AppState {
    pub fn new(dynamo: DynamoClient, config: Config) -> Arc<Self> {
        Arc::new(Self { dynamo, config })
    }
}

/// Parse a JSON request body; anything unparsable is a validation error.
pub fn parse_body<T: DeserializeOwned>(body: &Body) -> Result<T, ApiError> {
    let body_str = match body {
        Body::Text(text) => text.as_str(),
        Body::Binary(bytes) => std::str::from_utf8(bytes).unwrap_or(""),
        Body::Empty => "",
    };
    serde_json::from_str(body_str)
        .map_err(|e| ApiError::Validation(format!("Invalid request body: {}", e)))
}
