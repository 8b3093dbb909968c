use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use foodcourt_entitlement::{EntitlementService, ParticipantRecord};
use serde::Deserialize;

use crate::auth::Authenticated;
use crate::error::AppError;

/// Accepts both the current field names and the older `name`, `mobile`
/// and `email` spelling used by the check-in desks.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(alias = "name")]
    display_name: String,
    #[serde(alias = "mobile")]
    contact_phone: String,
    #[serde(alias = "email")]
    identity: String,
}

#[derive(Deserialize)]
pub struct SearchParams {
    search: Option<String>,
}

pub async fn register_participant(
    State(service): State<EntitlementService>,
    Authenticated(caller): Authenticated,
    payload: Result<Json<Registration>, JsonRejection>,
) -> Result<(StatusCode, Json<ParticipantRecord>), AppError> {
    let Json(registration) = payload?;
    let record = service
        .register_participant(
            &registration.identity,
            &registration.display_name,
            &registration.contact_phone,
            caller,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_participant(
    State(service): State<EntitlementService>,
    Path(email): Path<String>,
) -> Result<Json<ParticipantRecord>, AppError> {
    Ok(Json(service.get_participant(&email).await?))
}

pub async fn list_participants(
    State(service): State<EntitlementService>,
    Authenticated(caller): Authenticated,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<ParticipantRecord>>, AppError> {
    let Query(params) = params?;
    let records = match params.search {
        Some(term) => service.search_participants(&term, caller).await?,
        None => service.list_participants(caller).await?,
    };
    Ok(Json(records))
}
