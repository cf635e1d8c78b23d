use lambda_http::http::StatusCode;
use lambda_http::{Body, Response};

/// Error taxonomy for every API handler. Each variant maps to one HTTP
/// status; the body is always `{"message": "..."}` like the rest of the API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render the error as a JSON response. Internal details are logged,
    /// never sent to the client.
    pub fn into_response(self) -> Response<Body> {
        if let ApiError::Internal(detail) = &self {
            tracing::error!("Internal error: {}", detail);
        }
        let message = match &self {
            ApiError::Internal(_) => "Server error".to_string(),
            other => other.to_string(),
        };
        let body = serde_json::json!({ "message": message }).to_string();
        Response::builder()
            .status(self.status_code())
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(body.into())
            .unwrap_or_else(|_| {
                let mut resp = Response::new(Body::Empty);
                *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                resp
            })
    }
}

impl From<lambda_http::http::Error> for ApiError {
    fn from(e: lambda_http::http::Error) -> Self {
        ApiError::Internal(format!("Failed to build response: {}", e))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Internal(format!("JSON serialization failed: {}", e))
    }
}

impl<E, R> From<aws_sdk_dynamodb::error::SdkError<E, R>> for ApiError
where
    E: std::fmt::Debug,
    R: std::fmt::Debug,
{
    fn from(e: aws_sdk_dynamodb::error::SdkError<E, R>) -> Self {
        ApiError::Internal(format!("DynamoDB request failed: {:?}", e))
    }
}

/// Build a JSON success response with the standard headers.
pub fn json_response<T: serde::Serialize>(
    status: StatusCode,
    payload: &T,
) -> Result<Response<Body>, ApiError> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(payload)?.into())?)
}
