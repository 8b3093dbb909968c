pub mod error;
pub mod models;
pub mod schema;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl, SimpleAsyncConnection as _};
use error::DatabaseError;
use foodcourt_entitlement::{
    AdminCredential, AdminCredentialStore, EntitlementStore, MealCell, MealSchema, MealState,
    ParticipantRecord, StoreError,
};
use schema::{admin_credentials, meal_states, participants};
use tracing::{debug, info, instrument};

use crate::models::{AdminCredentialRow, MealStateRow, ParticipantRow};

// https://github.com/tokio-rs/axum/tree/main/examples/diesel-async-postgres

const CREATE_TABLES: &str =
    include_str!("../migrations/2024-05-01-120000_create_participants/up.sql");

/// Builds the pool lazily; nothing connects until the first checkout.
pub fn get_database_connection(
    database_url: &str,
) -> Result<Pool<AsyncPgConnection>, DatabaseError> {
    let config = AsyncDieselConnectionManager::<diesel_async::AsyncPgConnection>::new(database_url);
    Ok(Pool::builder(config).build()?)
}

/// Creates missing tables. Safe to run on every start.
pub async fn run_migrations(pool: &Pool<AsyncPgConnection>) -> Result<(), DatabaseError> {
    let mut connection = pool.get().await?;
    connection.batch_execute(CREATE_TABLES).await?;
    info!("database schema is up to date");
    Ok(())
}

/// Participants and the admin credential in Postgres.
///
/// Each meal cell is its own row, so marking one meal is a single-row
/// `UPDATE` that cannot clobber a concurrent update of a sibling cell.
#[derive(Clone)]
pub struct PgEntitlementStore {
    pool: Pool<AsyncPgConnection>,
    schema: MealSchema,
}

impl PgEntitlementStore {
    #[must_use]
    pub const fn new(pool: Pool<AsyncPgConnection>, schema: MealSchema) -> Self {
        Self { pool, schema }
    }

    async fn connection(&self) -> Result<Object<AsyncPgConnection>, DatabaseError> {
        Ok(self.pool.get().await?)
    }
}

async fn load_record(
    connection: &mut AsyncPgConnection,
    schema: &MealSchema,
    identity: &str,
) -> Result<Option<ParticipantRecord>, DatabaseError> {
    let Some(row) = participants::table
        .find(identity)
        .select(ParticipantRow::as_select())
        .first(connection)
        .await
        .optional()?
    else {
        return Ok(None);
    };
    let meals = meal_states::table
        .filter(meal_states::identity.eq(identity))
        .select(MealStateRow::as_select())
        .load(connection)
        .await?;
    Ok(Some(row.assemble(schema, &meals)))
}

/// A participant row without the targeted `meal_states` row is a broken
/// record, not an unknown participant.
fn missing_cell_check(
    identity: &str,
    cell: MealCell,
    updated: usize,
    record: Option<ParticipantRecord>,
) -> Result<ParticipantRecord, StoreError> {
    match record {
        None => Err(StoreError::NotFound(identity.to_owned())),
        Some(_) if updated == 0 => Err(StoreError::MissingCell {
            identity: identity.to_owned(),
            cell,
        }),
        Some(record) => Ok(record),
    }
}

#[async_trait]
impl EntitlementStore for PgEntitlementStore {
    #[instrument(skip_all, fields(identity = record.identity()))]
    async fn insert(&self, record: ParticipantRecord) -> Result<(), StoreError> {
        let (row, meals) = ParticipantRow::split(&record);
        let mut connection = self.connection().await?;
        let result = connection
            .transaction::<_, DatabaseError, _>(|conn| {
                async move {
                    diesel::insert_into(participants::table)
                        .values(&row)
                        .execute(conn)
                        .await?;
                    diesel::insert_into(meal_states::table)
                        .values(&meals)
                        .execute(conn)
                        .await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await;
        match result {
            Err(err) if err.is_unique_violation() => {
                debug!("identity already registered");
                Err(StoreError::DuplicateIdentity(record.identity().to_owned()))
            }
            result => Ok(result?),
        }
    }

    async fn get(&self, identity: &str) -> Result<ParticipantRecord, StoreError> {
        let mut connection = self.connection().await?;
        load_record(&mut connection, &self.schema, identity)
            .await?
            .ok_or_else(|| StoreError::NotFound(identity.to_owned()))
    }

    #[instrument(skip(self))]
    async fn mutate_meal(
        &self,
        identity: &str,
        cell: MealCell,
        state: MealState,
    ) -> Result<ParticipantRecord, StoreError> {
        let schema = self.schema;
        let owned_identity = identity.to_owned();
        let mut connection = self.connection().await?;
        let (updated, record) = connection
            .transaction::<_, DatabaseError, _>(|conn| {
                async move {
                    let updated = diesel::update(meal_states::table.find((
                        owned_identity.as_str(),
                        cell.day(),
                        cell.slot(),
                    )))
                    .set((
                        meal_states::consumed.eq(state.is_consumed()),
                        meal_states::consumed_at.eq(state.consumed_at()),
                    ))
                    .execute(conn)
                    .await?;
                    let record = load_record(conn, &schema, &owned_identity).await?;
                    Ok((updated, record))
                }
                .scope_boxed()
            })
            .await?;
        missing_cell_check(identity, cell, updated, record)
    }

    async fn list_all(&self) -> Result<Vec<ParticipantRecord>, StoreError> {
        let schema = self.schema;
        let mut connection = self.connection().await?;
        let records = connection
            .build_transaction()
            .read_only()
            .repeatable_read()
            .run::<_, DatabaseError, _>(|conn| {
                async move {
                    let rows = participants::table
                        .order((participants::created_at.desc(), participants::identity.asc()))
                        .select(ParticipantRow::as_select())
                        .load(conn)
                        .await?;
                    let mut meals: HashMap<String, Vec<MealStateRow>> = HashMap::new();
                    for meal in meal_states::table
                        .select(MealStateRow::as_select())
                        .load(conn)
                        .await?
                    {
                        meals.entry(meal.identity.clone()).or_default().push(meal);
                    }
                    Ok(rows
                        .into_iter()
                        .map(|row| {
                            let cells = meals.remove(&row.identity).unwrap_or_default();
                            row.assemble(&schema, &cells)
                        })
                        .collect())
                }
                .scope_boxed()
            })
            .await?;
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn reset_all_meals(&self) -> Result<u64, StoreError> {
        let mut connection = self.connection().await?;
        let touched: Vec<String> = diesel::update(meal_states::table)
            .filter(meal_states::consumed.eq(true))
            .set((
                meal_states::consumed.eq(false),
                meal_states::consumed_at.eq(None::<DateTime<Utc>>),
            ))
            .returning(meal_states::identity)
            .get_results(&mut connection)
            .await
            .map_err(DatabaseError::from)?;
        let touched = touched.iter().collect::<HashSet<_>>().len();
        Ok(u64::try_from(touched).unwrap_or(u64::MAX))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self.connection().await?;
        diesel::sql_query("SELECT 1")
            .execute(&mut connection)
            .await
            .map_err(DatabaseError::from)?;
        Ok(())
    }
}

#[async_trait]
impl AdminCredentialStore for PgEntitlementStore {
    async fn admin_credential(&self) -> Result<Option<AdminCredential>, StoreError> {
        let mut connection = self.connection().await?;
        let row = admin_credentials::table
            .select(AdminCredentialRow::as_select())
            .first(&mut connection)
            .await
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(row.map(AdminCredential::from))
    }

    async fn insert_admin_credential(
        &self,
        credential: AdminCredential,
    ) -> Result<bool, StoreError> {
        let mut connection = self.connection().await?;
        let inserted = diesel::insert_into(admin_credentials::table)
            .values(AdminCredentialRow::from(credential))
            .on_conflict_do_nothing()
            .execute(&mut connection)
            .await
            .map_err(DatabaseError::from)?;
        Ok(inserted == 1)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use foodcourt_entitlement::EVENT_MEAL_SCHEMA;

    use super::*;

    fn record() -> ParticipantRecord {
        ParticipantRecord::new(
            &EVENT_MEAL_SCHEMA,
            "alice@example.com",
            "Alice",
            "555-0100",
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn an_updated_cell_returns_the_record() {
        let cell = EVENT_MEAL_SCHEMA.resolve("day1", "lunch").unwrap();
        let found = missing_cell_check("alice@example.com", cell, 1, Some(record())).unwrap();
        assert_eq!(found.identity(), "alice@example.com");
    }

    #[test]
    fn an_unknown_participant_is_not_found() {
        let cell = EVENT_MEAL_SCHEMA.resolve("day1", "lunch").unwrap();
        assert!(matches!(
            missing_cell_check("nobody@example.com", cell, 0, None),
            Err(StoreError::NotFound(identity)) if identity == "nobody@example.com"
        ));
    }

    #[test]
    fn a_participant_without_the_cell_row_is_reported_as_broken() {
        let cell = EVENT_MEAL_SCHEMA.resolve("day2", "dinner").unwrap();
        assert!(matches!(
            missing_cell_check("alice@example.com", cell, 0, Some(record())),
            Err(StoreError::MissingCell { cell: missing, .. }) if missing == cell
        ));
    }
}
