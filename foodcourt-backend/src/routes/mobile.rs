//! Trimmed responses for the handheld scanners.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use foodcourt_entitlement::{EntitlementService, MealStates, ParticipantRecord};
use serde::Serialize;

use crate::error::AppError;
use crate::routes::meals::MealRequest;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileCheck {
    status: &'static str,
    mobile_support: bool,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct MobileParticipant {
    name: String,
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mobile: Option<String>,
    meals: MealStates,
}

impl MobileParticipant {
    fn new(record: &ParticipantRecord, with_phone: bool) -> Self {
        Self {
            name: record.display_name().to_owned(),
            email: record.identity().to_owned(),
            mobile: with_phone.then(|| record.contact_phone().to_owned()),
            meals: record.meals().clone(),
        }
    }
}

#[derive(Serialize)]
pub struct MobileUpdate {
    status: &'static str,
    participant: MobileParticipant,
}

pub async fn mobile_check() -> Json<MobileCheck> {
    Json(MobileCheck {
        status: "OK",
        mobile_support: true,
        timestamp: Utc::now(),
    })
}

pub async fn get_mobile_participant(
    State(service): State<EntitlementService>,
    Path(email): Path<String>,
) -> Result<Json<MobileParticipant>, AppError> {
    let record = service.get_participant(&email).await?;
    Ok(Json(MobileParticipant::new(&record, true)))
}

pub async fn mark_mobile_meal(
    State(service): State<EntitlementService>,
    Path(email): Path<String>,
    payload: Result<Json<MealRequest>, JsonRejection>,
) -> Result<Json<MobileUpdate>, AppError> {
    let Json(meal) = payload?;
    let record = service
        .mark_consumed(&email, meal.day(), meal.meal_type(), Utc::now())
        .await?;
    Ok(Json(MobileUpdate {
        status: "success",
        participant: MobileParticipant::new(&record, false),
    }))
}
