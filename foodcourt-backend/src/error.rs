use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use foodcourt_config::ConfigError;
use foodcourt_database::error::DatabaseError;
use foodcourt_entitlement::EntitlementError;
use serde::Serialize;
use tracing::{error, warn};

pub const BASIC_REALM: &str = "Basic realm=\"foodcourt\", charset=\"UTF-8\"";

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
    #[error("malformed json body: {0}")]
    Json(#[from] JsonRejection),
    #[error("malformed query string: {0}")]
    Query(#[from] QueryRejection),
    #[error("malformed authorization header")]
    MalformedCredentials,
    #[error("no route for {0}")]
    RouteNotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Entitlement(err) => match err {
                EntitlementError::InvalidInput { .. } | EntitlementError::InvalidSlot { .. } => {
                    StatusCode::BAD_REQUEST
                }
                EntitlementError::DuplicateIdentity(_) => StatusCode::CONFLICT,
                EntitlementError::NotFound(_) => StatusCode::NOT_FOUND,
                EntitlementError::Unauthorized => StatusCode::UNAUTHORIZED,
                EntitlementError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                EntitlementError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Self::Json(_) | Self::Query(_) => StatusCode::BAD_REQUEST,
            Self::MalformedCredentials => StatusCode::UNAUTHORIZED,
            Self::Io(_) | Self::Database(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Entitlement(err) => err.code(),
            Self::Json(_) | Self::Query(_) => "INVALID_INPUT",
            Self::MalformedCredentials => "UNAUTHORIZED",
            Self::RouteNotFound(_) => "ROUTE_NOT_FOUND",
            Self::Io(_) | Self::Database(_) | Self::Config(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {self}");
        } else {
            warn!("request rejected: {self}");
        }
        let mut response = (
            status,
            Json(ErrorBody {
                error: self.to_string(),
                code: self.code(),
            }),
        )
            .into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_REALM));
        } else if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
