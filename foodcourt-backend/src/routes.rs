pub mod admin;
pub mod health;
pub mod meals;
pub mod mobile;
pub mod participants;

use axum::http::Uri;

use crate::error::AppError;

/// Fallback for every path no route matches.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::RouteNotFound(uri.path().to_owned())
}
