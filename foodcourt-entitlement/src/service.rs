use core::time::Duration;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::admin::Caller;
use crate::error::EntitlementError;
use crate::meal_schema::MealSchema;
use crate::participant::{MealState, ParticipantRecord};
use crate::store::{within, EntitlementStore, StoreError};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementStats {
    pub total_participants: usize,
    pub total_meals_consumed: usize,
    pub total_possible_meals: usize,
    pub per_cell: Vec<CellStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellStats {
    pub day: &'static str,
    pub slot: &'static str,
    pub consumed: usize,
}

/// Validates every request against the meal schema and the caller's
/// capability, then hands exactly one atomic step to the store. Nothing is
/// cached between calls and nothing is retried.
#[derive(Clone)]
pub struct EntitlementService {
    store: Arc<dyn EntitlementStore>,
    schema: MealSchema,
    store_timeout: Duration,
}

impl EntitlementService {
    pub fn new(store: Arc<dyn EntitlementStore>) -> Self {
        Self {
            store,
            schema: MealSchema::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_schema(self, schema: MealSchema) -> Self {
        Self { schema, ..self }
    }

    #[must_use]
    pub fn with_store_timeout(self, store_timeout: Duration) -> Self {
        Self {
            store_timeout,
            ..self
        }
    }

    #[must_use]
    pub const fn schema(&self) -> &MealSchema {
        &self.schema
    }

    #[instrument(skip(self, display_name, contact_phone))]
    pub async fn register_participant(
        &self,
        identity: &str,
        display_name: &str,
        contact_phone: &str,
        caller: Caller,
    ) -> Result<ParticipantRecord, EntitlementError> {
        require_admin(caller)?;
        let record = ParticipantRecord::new(
            &self.schema,
            identity,
            display_name,
            contact_phone,
            Utc::now(),
        )?;
        self.bounded(self.store.insert(record.clone())).await?;
        info!(identity = record.identity(), "registered participant");
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn get_participant(&self, identity: &str) -> Result<ParticipantRecord, EntitlementError> {
        Ok(self.bounded(self.store.get(identity.trim())).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_participants(
        &self,
        caller: Caller,
    ) -> Result<Vec<ParticipantRecord>, EntitlementError> {
        require_admin(caller)?;
        Ok(self.bounded(self.store.list_all()).await?)
    }

    /// A blank term lists everyone.
    #[instrument(skip(self))]
    pub async fn search_participants(
        &self,
        term: &str,
        caller: Caller,
    ) -> Result<Vec<ParticipantRecord>, EntitlementError> {
        let mut records = self.list_participants(caller).await?;
        let term = term.trim();
        if !term.is_empty() {
            records.retain(|record| record.matches(term));
        }
        debug!(found = records.len(), "searched participants");
        Ok(records)
    }

    /// Re-marking a consumed meal is accepted and moves its timestamp to
    /// `now`, so the record always shows the latest scan.
    #[instrument(skip(self))]
    pub async fn mark_consumed(
        &self,
        identity: &str,
        day: &str,
        slot: &str,
        now: DateTime<Utc>,
    ) -> Result<ParticipantRecord, EntitlementError> {
        let cell = self.schema.resolve(day, slot)?;
        let record = self
            .bounded(
                self.store
                    .mutate_meal(identity.trim(), cell, MealState::consumed(now)),
            )
            .await?;
        info!(identity = record.identity(), %cell, "meal consumed");
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn reset_meal(
        &self,
        identity: &str,
        day: &str,
        slot: &str,
        caller: Caller,
    ) -> Result<ParticipantRecord, EntitlementError> {
        require_admin(caller)?;
        let cell = self.schema.resolve(day, slot)?;
        let record = self
            .bounded(
                self.store
                    .mutate_meal(identity.trim(), cell, MealState::NOT_CONSUMED),
            )
            .await?;
        info!(identity = record.identity(), %cell, "meal reset");
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn reset_all_meals(&self, caller: Caller) -> Result<u64, EntitlementError> {
        require_admin(caller)?;
        let touched = self.bounded(self.store.reset_all_meals()).await?;
        info!(touched, "reset all meals");
        Ok(touched)
    }

    /// Each record's cells come from one read of that record; records may
    /// be slightly apart in time under concurrent scans.
    #[instrument(skip(self))]
    pub async fn compute_stats(&self, caller: Caller) -> Result<EntitlementStats, EntitlementError> {
        require_admin(caller)?;
        let records = self.bounded(self.store.list_all()).await?;

        let per_cell: Vec<_> = self
            .schema
            .cells()
            .map(|cell| CellStats {
                day: cell.day(),
                slot: cell.slot(),
                consumed: records
                    .iter()
                    .filter(|record| {
                        record
                            .meals()
                            .get(cell)
                            .is_some_and(|state| state.is_consumed())
                    })
                    .count(),
            })
            .collect();

        Ok(EntitlementStats {
            total_participants: records.len(),
            total_meals_consumed: per_cell.iter().map(|cell| cell.consumed).sum(),
            total_possible_meals: records.len() * self.schema.cell_count(),
            per_cell,
        })
    }

    /// Succeeds if the store answers in time.
    pub async fn check_store(&self) -> Result<(), EntitlementError> {
        Ok(self.bounded(self.store.ping()).await?)
    }

    async fn bounded<T>(
        &self,
        operation: impl core::future::Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        let result = within(self.store_timeout, operation).await;
        if let Err(err @ (StoreError::Timeout(_) | StoreError::Unavailable(_))) = &result {
            warn!("store call failed: {err}");
        }
        result
    }
}

const fn require_admin(caller: Caller) -> Result<(), EntitlementError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(EntitlementError::Unauthorized)
    }
}
