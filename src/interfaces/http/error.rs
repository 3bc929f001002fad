use crate::domain::validation::ValidationErrors;
use crate::error::PaymentError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Everything a handler can fail with, mapped onto HTTP.
#[derive(Debug)]
pub enum ApiError {
    Payment(PaymentError),
    InvalidQuery(ValidationErrors),
    MalformedBody(String),
}

impl From<PaymentError> for ApiError {
    fn from(error: PaymentError) -> Self {
        Self::Payment(error)
    }
}

impl ApiError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            Self::InvalidQuery(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "Invalid query parameters".to_string(),
                    details: serde_json::to_value(errors).ok(),
                },
            ),
            Self::MalformedBody(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "Invalid request body".to_string(),
                    details: Some(serde_json::json!({ "body": [message] })),
                },
            ),
            Self::Payment(PaymentError::ValidationError(errors)) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "Validation failed".to_string(),
                    details: serde_json::to_value(errors).ok(),
                },
            ),
            Self::Payment(PaymentError::InvalidCursor(message)) => {
                let mut errors = ValidationErrors::new();
                errors.add("cursor", message);
                Self::InvalidQuery(errors).status_and_body()
            }
            Self::Payment(e @ PaymentError::NotFound(_)) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: e.to_string(),
                    details: None,
                },
            ),
            Self::Payment(e) if e.is_transient() => {
                tracing::error!(error = %e, "Dependency unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        error: "Service temporarily unavailable".to_string(),
                        details: None,
                    },
                )
            }
            Self::Payment(e) => {
                tracing::error!(error = %e, "Unhandled error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "Internal server error".to_string(),
                        details: None,
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}
