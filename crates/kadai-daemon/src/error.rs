//! HTTP error mapping. Every handler returns `Result<_, ApiError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kadai_db::StoreError;
use kadai_lifecycle::TransitionError;
use kadai_shop::{CatalogError, CheckoutError, OrderActionError, ValidationErrors};
use kadai_storage::StorageError;
use tracing::error;

use crate::api_types::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    IllegalTransition(TransitionError),

    #[error("{0}")]
    StatusConflict(String),

    /// Another checkout for the same cart has not finished.
    #[error("{0}")]
    CheckoutInProgress(String),

    /// The object store refused or could not be reached.
    #[error("{0}")]
    Upload(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::IllegalTransition(_)
            | ApiError::StatusConflict(_)
            | ApiError::CheckoutInProgress(_) => StatusCode::CONFLICT,
            ApiError::Upload(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_failed",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::NotFound(_) => "not_found",
            ApiError::IllegalTransition(_) => "illegal_transition",
            ApiError::StatusConflict(_) => "status_conflict",
            ApiError::CheckoutInProgress(_) => "checkout_in_progress",
            ApiError::Upload(_) => "upload_failed",
            ApiError::Internal(_) => "backend_error",
        }
    }

    /// A single-field validation failure.
    pub fn field(field: &str, message: &str) -> Self {
        let mut e = ValidationErrors::new();
        e.push(field, message);
        ApiError::Validation(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: match &self {
                ApiError::Validation(_) => "Please correct the highlighted fields.".to_string(),
                other => other.to_string(),
            },
            code: self.code().to_string(),
            fields: match self {
                ApiError::Validation(v) => v.fields,
                _ => Vec::new(),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        ApiError::Validation(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            StoreError::StatusConflict { .. } => ApiError::StatusConflict(e.to_string()),
            StoreError::Backend(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Rejected(msg) => ApiError::Upload(msg),
            other => ApiError::Upload(other.to_string()),
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::Invalid(v) => ApiError::Validation(v),
            CheckoutError::Upload(s) => s.into(),
            CheckoutError::Store(s) => s.into(),
            CheckoutError::InProgress => {
                ApiError::CheckoutInProgress(CheckoutError::InProgress.to_string())
            }
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Invalid(v) => ApiError::Validation(v),
            CatalogError::Upload(s) => s.into(),
            CatalogError::Store(s) => s.into(),
        }
    }
}

impl From<OrderActionError> for ApiError {
    fn from(e: OrderActionError) -> Self {
        match e {
            OrderActionError::Illegal(t) => ApiError::IllegalTransition(t),
            OrderActionError::Store(s) => s.into(),
        }
    }
}
