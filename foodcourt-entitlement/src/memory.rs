use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::admin::AdminCredential;
use crate::meal_schema::MealCell;
use crate::participant::{MealState, ParticipantRecord};
use crate::store::{AdminCredentialStore, EntitlementStore, StoreError};

/// Process-local store, used when no database is configured and in tests.
/// Each operation runs under the map lock, which gives the same per-call
/// atomicity a database statement would.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    participants: RwLock<HashMap<String, ParticipantRecord>>,
    admin: Mutex<Option<AdminCredential>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntitlementStore for InMemoryStore {
    async fn insert(&self, record: ParticipantRecord) -> Result<(), StoreError> {
        let mut participants = self.participants.write().await;
        if participants.contains_key(record.identity()) {
            return Err(StoreError::DuplicateIdentity(record.identity().to_owned()));
        }
        participants.insert(record.identity().to_owned(), record);
        Ok(())
    }

    async fn get(&self, identity: &str) -> Result<ParticipantRecord, StoreError> {
        self.participants
            .read()
            .await
            .get(identity)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(identity.to_owned()))
    }

    async fn mutate_meal(
        &self,
        identity: &str,
        cell: MealCell,
        state: MealState,
    ) -> Result<ParticipantRecord, StoreError> {
        let mut participants = self.participants.write().await;
        let record = participants
            .get_mut(identity)
            .ok_or_else(|| StoreError::NotFound(identity.to_owned()))?;
        if !record.set_meal(cell, state) {
            debug!(identity, %cell, "record has no such cell");
            return Err(StoreError::MissingCell {
                identity: identity.to_owned(),
                cell,
            });
        }
        Ok(record.clone())
    }

    async fn list_all(&self) -> Result<Vec<ParticipantRecord>, StoreError> {
        let mut records: Vec<_> = self.participants.read().await.values().cloned().collect();
        records.sort_by(|left, right| {
            right
                .created_at()
                .cmp(&left.created_at())
                .then_with(|| left.identity().cmp(right.identity()))
        });
        Ok(records)
    }

    async fn reset_all_meals(&self) -> Result<u64, StoreError> {
        let mut participants = self.participants.write().await;
        let mut touched = 0;
        for record in participants.values_mut() {
            if record.reset_meals() {
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl AdminCredentialStore for InMemoryStore {
    async fn admin_credential(&self) -> Result<Option<AdminCredential>, StoreError> {
        Ok(self.admin.lock().await.clone())
    }

    async fn insert_admin_credential(
        &self,
        credential: AdminCredential,
    ) -> Result<bool, StoreError> {
        let mut admin = self.admin.lock().await;
        if admin.is_some() {
            return Ok(false);
        }
        *admin = Some(credential);
        Ok(true)
    }
}
