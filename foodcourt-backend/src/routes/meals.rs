use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use foodcourt_entitlement::{EntitlementService, EntitlementStats, ParticipantRecord};
use serde::{Deserialize, Serialize};

use crate::auth::Authenticated;
use crate::error::AppError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealRequest {
    day: String,
    #[serde(alias = "slot")]
    meal_type: String,
}

impl MealRequest {
    #[must_use]
    pub fn day(&self) -> &str {
        &self.day
    }

    #[must_use]
    pub fn meal_type(&self) -> &str {
        &self.meal_type
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetAll {
    modified_count: u64,
}

/// Scanner endpoint, needs no credentials.
pub async fn mark_meal(
    State(service): State<EntitlementService>,
    Path(email): Path<String>,
    payload: Result<Json<MealRequest>, JsonRejection>,
) -> Result<Json<ParticipantRecord>, AppError> {
    let Json(meal) = payload?;
    let record = service
        .mark_consumed(&email, &meal.day, &meal.meal_type, Utc::now())
        .await?;
    Ok(Json(record))
}

pub async fn reset_meal(
    State(service): State<EntitlementService>,
    Authenticated(caller): Authenticated,
    Path(email): Path<String>,
    payload: Result<Json<MealRequest>, JsonRejection>,
) -> Result<Json<ParticipantRecord>, AppError> {
    let Json(meal) = payload?;
    let record = service
        .reset_meal(&email, &meal.day, &meal.meal_type, caller)
        .await?;
    Ok(Json(record))
}

pub async fn reset_all_meals(
    State(service): State<EntitlementService>,
    Authenticated(caller): Authenticated,
) -> Result<Json<ResetAll>, AppError> {
    let modified_count = service.reset_all_meals(caller).await?;
    Ok(Json(ResetAll { modified_count }))
}

pub async fn stats(
    State(service): State<EntitlementService>,
    Authenticated(caller): Authenticated,
) -> Result<Json<EntitlementStats>, AppError> {
    Ok(Json(service.compute_stats(caller).await?))
}
