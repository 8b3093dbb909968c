use chrono::{DateTime, Utc};
use diesel::prelude::*;
use foodcourt_entitlement::{AdminCredential, MealSchema, MealState, MealStates, ParticipantRecord};

use crate::schema::{admin_credentials, meal_states, participants};

/// The only row `admin_credentials` may hold.
pub const ADMIN_CREDENTIAL_ID: i32 = 1;

#[derive(Queryable, Selectable, Insertable, Debug)]
#[diesel(table_name = participants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ParticipantRow {
    pub identity: String,
    pub display_name: String,
    pub contact_phone: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Debug)]
#[diesel(table_name = meal_states)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MealStateRow {
    pub identity: String,
    pub day: String,
    pub slot: String,
    pub consumed: bool,
    pub consumed_at: Option<DateTime<Utc>>,
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = admin_credentials)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AdminCredentialRow {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
}

impl ParticipantRow {
    /// The participant row and one meal row per schema cell.
    pub fn split(record: &ParticipantRecord) -> (Self, Vec<MealStateRow>) {
        let meals = record
            .meals()
            .iter()
            .map(|(cell, state)| MealStateRow {
                identity: record.identity().to_owned(),
                day: cell.day().to_owned(),
                slot: cell.slot().to_owned(),
                consumed: state.is_consumed(),
                consumed_at: state.consumed_at(),
            })
            .collect();
        let row = Self {
            identity: record.identity().to_owned(),
            display_name: record.display_name().to_owned(),
            contact_phone: record.contact_phone().to_owned(),
            created_at: record.created_at(),
        };
        (row, meals)
    }

    /// Rows for cells outside `schema` are ignored.
    pub fn assemble(self, schema: &MealSchema, meals: &[MealStateRow]) -> ParticipantRecord {
        let meals = MealStates::from_states(schema, |cell| {
            meals
                .iter()
                .find(|row| row.day == cell.day() && row.slot == cell.slot())
                .map_or(MealState::NOT_CONSUMED, |row| MealState::from(row.consumed_at))
        });
        ParticipantRecord::from_parts(
            self.identity,
            self.display_name,
            self.contact_phone,
            meals,
            self.created_at,
        )
    }
}

impl From<AdminCredential> for AdminCredentialRow {
    fn from(value: AdminCredential) -> Self {
        Self {
            id: ADMIN_CREDENTIAL_ID,
            username: value.username().to_owned(),
            password_hash: value.password_hash().to_owned(),
        }
    }
}

impl From<AdminCredentialRow> for AdminCredential {
    fn from(value: AdminCredentialRow) -> Self {
        Self::from_parts(value.username, value.password_hash)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use foodcourt_entitlement::EVENT_MEAL_SCHEMA;

    use super::*;

    #[test]
    fn rows_cover_every_cell_and_reassemble() {
        let created = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let record = ParticipantRecord::new(
            &EVENT_MEAL_SCHEMA,
            "alice@example.com",
            "Alice",
            "555-0100",
            created,
        )
        .unwrap();

        let (row, mut meals) = ParticipantRow::split(&record);
        assert_eq!(meals.len(), EVENT_MEAL_SCHEMA.cell_count());
        assert!(meals.iter().all(|meal| !meal.consumed && meal.consumed_at.is_none()));

        let scanned = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        let lunch = meals
            .iter_mut()
            .find(|meal| meal.day == "day2" && meal.slot == "lunch")
            .unwrap();
        lunch.consumed = true;
        lunch.consumed_at = Some(scanned);
        meals.push(MealStateRow {
            identity: "alice@example.com".to_owned(),
            day: "day3".to_owned(),
            slot: "lunch".to_owned(),
            consumed: true,
            consumed_at: Some(scanned),
        });

        let restored = row.assemble(&EVENT_MEAL_SCHEMA, &meals);
        assert_eq!(restored.identity(), "alice@example.com");
        assert_eq!(restored.created_at(), created);
        assert_eq!(restored.meals().consumed_count(), 1);
        assert_eq!(
            restored.meals().lookup("day2", "lunch"),
            Some(MealState::consumed(scanned))
        );
    }

    #[test]
    fn admin_rows_always_use_the_singleton_key() {
        let row = AdminCredentialRow::from(AdminCredential::new("cscr", "pw").unwrap());
        assert_eq!(row.id, ADMIN_CREDENTIAL_ID);
        assert!(AdminCredential::from(row).verify("cscr", "pw"));
    }
}
