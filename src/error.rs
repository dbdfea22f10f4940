//! # Error Handling
//!
//! Domain error types for the queue adapters, the message store and the
//! ingestion pipeline, plus the problem+json `ApiError` returned by the HTTP
//! surface.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::telemetry;

/// Failure talking to the queue or pub/sub service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Network, timeout, throttling or any other retryable upstream failure.
    #[error("{operation} failed: {details}")]
    Transient {
        operation: &'static str,
        details: String,
    },
    #[error("{resource} not found")]
    NotFound { resource: String },
    /// Missing or unusable region, credentials or endpoint.
    #[error("service configuration error: {details}")]
    Configuration { details: String },
}

impl ServiceError {
    pub fn transient(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Transient {
            operation,
            details: details.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Failure of an ingestion operation on a single queue.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

impl IngestError {
    /// Only configuration problems stop the polling loop; everything else is
    /// retried on the next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Service(err) if err.is_configuration())
    }
}

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            trace_id: Self::current_trace_id(),
        }
    }

    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Request trace id when serving a request, otherwise a short correlation id.
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

/// Returns true when `error` is a uniqueness violation reported by Postgres,
/// SQLite or MySQL.
pub(crate) fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::{RuntimeErr, SqlErr};

    const PG_UNIQUE: &str = "23505";
    const MYSQL_DUPLICATE_CODES: &[&str] = &["1022", "1062", "1169", "1586"];
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    if matches!(error.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error.code().is_some_and(|code| {
        let code: &str = &code;
        code == PG_UNIQUE
            || MYSQL_DUPLICATE_CODES.contains(&code)
            || SQLITE_DUPLICATE_CODES.contains(&code)
    })
}

/// Upstream AWS failure details carried in a 502 response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpstreamError {
    /// Upstream service, `sqs` or `sns`
    pub service: String,
    pub operation: String,
    /// Error text from the SDK, truncated
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        match error {
            sea_orm::DbErr::RecordNotFound(record) => not_found(&record),
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            other => {
                tracing::error!("Database error: {:?}", other);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(db_err) => db_err.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::NotFound { resource } => not_found(&resource),
            ServiceError::Transient { operation, details } => {
                upstream_error("aws", operation, Some(details))
            }
            ServiceError::Configuration { details } => {
                tracing::error!(%details, "AWS client misconfigured");
                upstream_error("aws", "configure", Some(details))
            }
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(error: IngestError) -> Self {
        match error {
            IngestError::Service(err) => err.into(),
            IngestError::Store(err) => err.into(),
        }
    }
}

/// 502 PROVIDER_ERROR for a failed upstream call.
pub fn upstream_error(service: &str, operation: &str, details: Option<String>) -> ApiError {
    let upstream = UpstreamError {
        service: service.to_string(),
        operation: operation.to_string(),
        details: details.map(|d| {
            if d.chars().count() > 200 {
                let truncated: String = d.chars().take(200).collect();
                format!("{}...", truncated)
            } else {
                d
            }
        }),
    };

    ApiError::new(
        StatusCode::BAD_GATEWAY,
        "PROVIDER_ERROR",
        &format!("Upstream {} call {} failed", service, operation),
    )
    .with_details(json!(upstream))
}

pub fn not_found(resource: &str) -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
        &format!("{} not found", resource),
    )
}
