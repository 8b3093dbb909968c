use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use foodcourt_entitlement::AdminGateway;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;

#[derive(Deserialize)]
pub struct Login {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct LoggedIn {
    username: String,
    admin: bool,
}

/// Lets the admin console check credentials before it starts sending them
/// with every request.
pub async fn login(
    State(gateway): State<AdminGateway>,
    payload: Result<Json<Login>, JsonRejection>,
) -> Result<Json<LoggedIn>, AppError> {
    let Json(login) = payload?;
    let caller = gateway.authenticate(&login.username, &login.password).await?;
    info!(username = %login.username, "admin logged in");
    Ok(Json(LoggedIn {
        username: login.username,
        admin: caller.is_admin(),
    }))
}
