use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap as _, SerializeStruct as _};
use serde::{Serialize, Serializer};

use crate::error::EntitlementError;
use crate::meal_schema::{MealCell, MealSchema};

/// Consumption state of one cell. The timestamp is the only stored fact, so
/// a consumed cell without a timestamp cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MealState {
    consumed_at: Option<DateTime<Utc>>,
}

impl MealState {
    pub const NOT_CONSUMED: Self = Self { consumed_at: None };

    #[must_use]
    pub const fn consumed(at: DateTime<Utc>) -> Self {
        Self {
            consumed_at: Some(at),
        }
    }

    #[must_use]
    pub const fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    #[must_use]
    pub const fn consumed_at(&self) -> Option<DateTime<Utc>> {
        self.consumed_at
    }
}

impl From<Option<DateTime<Utc>>> for MealState {
    fn from(consumed_at: Option<DateTime<Utc>>) -> Self {
        Self { consumed_at }
    }
}

impl Serialize for MealState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("MealState", 2)?;
        state.serialize_field("consumed", &self.is_consumed())?;
        state.serialize_field("consumedAt", &self.consumed_at)?;
        state.end()
    }
}

/// The meal states of one participant, one entry per schema cell in schema
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MealStates {
    cells: Vec<(MealCell, MealState)>,
}

impl MealStates {
    #[must_use]
    pub fn not_consumed(schema: &MealSchema) -> Self {
        Self::from_states(schema, |_| MealState::NOT_CONSUMED)
    }

    /// Builds the states for exactly the cells of `schema`, asking `state_of`
    /// for each one. Cells a store knows nothing about start out unconsumed.
    pub fn from_states(
        schema: &MealSchema,
        mut state_of: impl FnMut(MealCell) -> MealState,
    ) -> Self {
        Self {
            cells: schema.cells().map(|cell| (cell, state_of(cell))).collect(),
        }
    }

    #[must_use]
    pub fn get(&self, cell: MealCell) -> Option<MealState> {
        self.cells
            .iter()
            .find(|(known, _)| *known == cell)
            .map(|(_, state)| *state)
    }

    #[must_use]
    pub fn lookup(&self, day: &str, slot: &str) -> Option<MealState> {
        self.cells
            .iter()
            .find(|(cell, _)| cell.day() == day && cell.slot() == slot)
            .map(|(_, state)| *state)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MealCell, MealState)> + '_ {
        self.cells.iter().copied()
    }

    #[must_use]
    pub fn consumed_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|(_, state)| state.is_consumed())
            .count()
    }

    /// Returns false if `cell` is not part of this record.
    pub(crate) fn set(&mut self, cell: MealCell, state: MealState) -> bool {
        match self.cells.iter_mut().find(|(known, _)| *known == cell) {
            Some((_, current)) => {
                *current = state;
                true
            }
            None => false,
        }
    }

    /// Returns whether any cell was consumed before.
    pub(crate) fn reset(&mut self) -> bool {
        let mut changed = false;
        for (_, state) in &mut self.cells {
            changed |= state.is_consumed();
            *state = MealState::NOT_CONSUMED;
        }
        changed
    }
}

struct DaySlots<'a>(&'a [(MealCell, MealState)]);

impl Serialize for DaySlots<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (cell, state) in self.0 {
            map.serialize_entry(cell.slot(), state)?;
        }
        map.end()
    }
}

// {"day1": {"lunch": {...}, ...}, ...}
impl Serialize for MealStates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for day in self.cells.chunk_by(|left, right| left.0.day() == right.0.day()) {
            map.serialize_entry(day[0].0.day(), &DaySlots(day))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    identity: String,
    display_name: String,
    contact_phone: String,
    meals: MealStates,
    created_at: DateTime<Utc>,
}

impl ParticipantRecord {
    /// Validates and builds a fresh record with every meal unconsumed.
    /// Surrounding whitespace is dropped from all fields.
    pub fn new(
        schema: &MealSchema,
        identity: &str,
        display_name: &str,
        contact_phone: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, EntitlementError> {
        let identity = required("identity", identity)?;
        let display_name = required("displayName", display_name)?;
        let contact_phone = required("contactPhone", contact_phone)?;
        check_identity_shape(identity)?;

        Ok(Self {
            identity: identity.to_owned(),
            display_name: display_name.to_owned(),
            contact_phone: contact_phone.to_owned(),
            meals: MealStates::not_consumed(schema),
            created_at: now,
        })
    }

    /// Reassembles a record a store has persisted. No validation happens here.
    #[must_use]
    pub const fn from_parts(
        identity: String,
        display_name: String,
        contact_phone: String,
        meals: MealStates,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity,
            display_name,
            contact_phone,
            meals,
            created_at,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn contact_phone(&self) -> &str {
        &self.contact_phone
    }

    #[must_use]
    pub const fn meals(&self) -> &MealStates {
        &self.meals
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Case-insensitive on name and identity, verbatim on the phone number.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        self.display_name.to_lowercase().contains(&needle)
            || self.identity.to_lowercase().contains(&needle)
            || self.contact_phone.contains(term)
    }

    pub(crate) fn set_meal(&mut self, cell: MealCell, state: MealState) -> bool {
        self.meals.set(cell, state)
    }

    pub(crate) fn reset_meals(&mut self) -> bool {
        self.meals.reset()
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, EntitlementError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EntitlementError::InvalidInput {
            field,
            reason: "must not be empty",
        });
    }
    Ok(value)
}

// Only what a scanned badge needs, not RFC 5322.
fn check_identity_shape(identity: &str) -> Result<(), EntitlementError> {
    let Some((_, domain)) = identity.split_once('@') else {
        return Err(EntitlementError::InvalidInput {
            field: "identity",
            reason: "must be an email address containing @",
        });
    };
    if !domain.contains('.') {
        return Err(EntitlementError::InvalidInput {
            field: "identity",
            reason: "must contain a . after the @",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use serde_json::json;

    use super::*;
    use crate::meal_schema::EVENT_MEAL_SCHEMA;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn alice() -> ParticipantRecord {
        ParticipantRecord::new(
            &EVENT_MEAL_SCHEMA,
            "alice@example.com",
            "Alice",
            "555-0100",
            at(1_700_000_000),
        )
        .unwrap()
    }

    #[test]
    fn fresh_record_covers_every_cell_unconsumed() {
        let record = alice();
        assert_eq!(record.meals().iter().count(), EVENT_MEAL_SCHEMA.cell_count());
        for cell in EVENT_MEAL_SCHEMA.cells() {
            let state = record.meals().get(cell).unwrap();
            assert!(!state.is_consumed());
            assert_eq!(state.consumed_at(), None);
        }
        assert_eq!(record.meals().consumed_count(), 0);
        assert_eq!(record.created_at(), at(1_700_000_000));
    }

    #[test]
    fn fields_are_trimmed() {
        let record = ParticipantRecord::new(
            &EVENT_MEAL_SCHEMA,
            "  bob@example.org\n",
            " Bob ",
            " 555-0101 ",
            at(0),
        )
        .unwrap();
        assert_eq!(record.identity(), "bob@example.org");
        assert_eq!(record.display_name(), "Bob");
        assert_eq!(record.contact_phone(), "555-0101");
    }

    #[test]
    fn rejects_missing_fields() {
        for (identity, name, phone, field) in [
            ("", "Alice", "555", "identity"),
            ("a@b.c", "  ", "555", "displayName"),
            ("a@b.c", "Alice", "", "contactPhone"),
        ] {
            let err = ParticipantRecord::new(&EVENT_MEAL_SCHEMA, identity, name, phone, at(0))
                .unwrap_err();
            assert!(
                matches!(err, EntitlementError::InvalidInput { field: f, .. } if f == field),
                "{field}"
            );
        }
    }

    #[test]
    fn rejects_identities_that_are_not_email_shaped() {
        for identity in ["alice", "alice@localhost", "alice.example.com", "a.b@c"] {
            let err = ParticipantRecord::new(&EVENT_MEAL_SCHEMA, identity, "A", "1", at(0))
                .unwrap_err();
            assert!(
                matches!(err, EntitlementError::InvalidInput { field: "identity", .. }),
                "{identity}"
            );
        }
        assert!(ParticipantRecord::new(&EVENT_MEAL_SCHEMA, "a@b.c", "A", "1", at(0)).is_ok());
    }

    #[test]
    fn set_touches_only_the_target_cell() {
        let mut record = alice();
        let lunch = EVENT_MEAL_SCHEMA.resolve("day1", "lunch").unwrap();
        assert!(record.set_meal(lunch, MealState::consumed(at(10))));

        for (cell, state) in record.meals().iter() {
            if cell == lunch {
                assert_eq!(state.consumed_at(), Some(at(10)));
            } else {
                assert!(!state.is_consumed(), "{cell}");
            }
        }
        assert_eq!(record.meals().lookup("day1", "lunch"), Some(MealState::consumed(at(10))));
    }

    #[test]
    fn reset_reports_whether_anything_changed() {
        let mut record = alice();
        assert!(!record.reset_meals());
        let dinner = EVENT_MEAL_SCHEMA.resolve("day1", "dinner").unwrap();
        record.set_meal(dinner, MealState::consumed(at(5)));
        assert!(record.reset_meals());
        assert_eq!(record.meals().consumed_count(), 0);
    }

    #[test]
    fn search_matches_name_identity_and_phone() {
        let record = alice();
        assert!(record.matches("ALI"));
        assert!(record.matches("example.com"));
        assert!(record.matches("0100"));
        assert!(!record.matches("bob"));
    }

    #[test]
    fn serializes_nested_by_day_in_schema_order() {
        let mut record = alice();
        let snack = EVENT_MEAL_SCHEMA.resolve("day2", "morningSnack").unwrap();
        record.set_meal(snack, MealState::consumed(at(1_700_000_100)));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["identity"], "alice@example.com");
        assert_eq!(value["displayName"], "Alice");
        assert_eq!(value["contactPhone"], "555-0100");
        assert_eq!(
            value["meals"]["day1"]["dinner"],
            json!({ "consumed": false, "consumedAt": null })
        );
        assert_eq!(value["meals"]["day2"]["morningSnack"]["consumed"], true);
        assert_eq!(
            value["meals"]["day2"]["morningSnack"]["consumedAt"],
            "2023-11-14T22:15:00Z"
        );
        assert!(value["meals"]["day2"].get("dinner").is_none());
    }
}
