//! Storage contracts. Implementations own the durable representation and
//! provide the atomicity the service relies on.

use core::future::Future;
use core::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::admin::AdminCredential;
use crate::meal_schema::MealCell;
use crate::participant::{MealState, ParticipantRecord};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("identity {0} already exists")]
    DuplicateIdentity(String),
    #[error("identity {0} does not exist")]
    NotFound(String),
    #[error("store backend failed: {0}")]
    Unavailable(#[source] BoxError),
    #[error("store did not answer within {0:?}")]
    Timeout(Duration),
    /// A permanent backend failure; retrying the same call will not help.
    #[error("store operation failed: {0}")]
    Failed(#[source] BoxError),
    #[error("participant {identity} has no state for {cell}")]
    MissingCell { identity: String, cell: MealCell },
}

/// Participant records keyed by identity.
///
/// Every method is one self-contained, all-or-nothing step. In particular
/// [`EntitlementStore::mutate_meal`] writes exactly one cell and never
/// rewrites the rest of the record, so concurrent updates of sibling cells
/// cannot overwrite each other.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Fails with [`StoreError::DuplicateIdentity`] if the identity is taken.
    /// The uniqueness check and the insert are one atomic step.
    async fn insert(&self, record: ParticipantRecord) -> Result<(), StoreError>;

    async fn get(&self, identity: &str) -> Result<ParticipantRecord, StoreError>;

    async fn mutate_meal(
        &self,
        identity: &str,
        cell: MealCell,
        state: MealState,
    ) -> Result<ParticipantRecord, StoreError>;

    /// Newest first, ties ordered by identity.
    async fn list_all(&self) -> Result<Vec<ParticipantRecord>, StoreError>;

    /// Clears every cell of every record in one atomic step and returns how
    /// many records had at least one consumed cell.
    async fn reset_all_meals(&self) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Holds the single admin credential.
#[async_trait]
pub trait AdminCredentialStore: Send + Sync {
    async fn admin_credential(&self) -> Result<Option<AdminCredential>, StoreError>;

    /// Stores `credential` unless one already exists. Returns whether it was
    /// stored.
    async fn insert_admin_credential(&self, credential: AdminCredential)
        -> Result<bool, StoreError>;
}

pub(crate) async fn within<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, StoreError>> + Send,
) -> Result<T, StoreError> {
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_elapsed| StoreError::Timeout(limit))?
}
