//! The closed vocabulary of event days and the meal slots served on each.
//!
//! Every consumer (record construction, slot validation, bulk reset and the
//! statistics) derives its view of the event from one [`MealSchema`] value.

use core::fmt;

use serde::Serialize;

use crate::error::EntitlementError;

const DAY1_SLOTS: &[&str] = &["morningSnack", "lunch", "eveningSnack", "dinner"];
const DAY2_SLOTS: &[&str] = &["morningSnack", "lunch", "eveningSnack"];

/// The two-day conference schedule.
pub const EVENT_MEAL_SCHEMA: MealSchema =
    MealSchema::new(&[("day1", DAY1_SLOTS), ("day2", DAY2_SLOTS)]);

/// One (day, slot) position of a [`MealSchema`]. Only obtainable from a
/// schema, so holding one proves the pair is part of the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MealCell {
    day: &'static str,
    slot: &'static str,
}

impl MealCell {
    #[must_use]
    pub const fn day(self) -> &'static str {
        self.day
    }

    #[must_use]
    pub const fn slot(self) -> &'static str {
        self.slot
    }
}

impl fmt::Display for MealCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.day, self.slot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MealSchema {
    days: &'static [(&'static str, &'static [&'static str])],
}

impl MealSchema {
    #[must_use]
    pub const fn new(days: &'static [(&'static str, &'static [&'static str])]) -> Self {
        Self { days }
    }

    pub fn days(&self) -> impl Iterator<Item = &'static str> {
        let days = self.days;
        days.iter().map(|&(day, _)| day)
    }

    /// Slots of `day` in serving order, `None` for a day outside the event.
    #[must_use]
    pub fn valid_slots(&self, day: &str) -> Option<&'static [&'static str]> {
        self.days
            .iter()
            .find(|(known, _)| *known == day)
            .map(|(_, slots)| *slots)
    }

    #[must_use]
    pub fn is_valid(&self, day: &str, slot: &str) -> bool {
        self.valid_slots(day)
            .is_some_and(|slots| slots.iter().any(|known| *known == slot))
    }

    pub fn resolve(&self, day: &str, slot: &str) -> Result<MealCell, EntitlementError> {
        self.cells()
            .find(|cell| cell.day == day && cell.slot == slot)
            .ok_or_else(|| EntitlementError::InvalidSlot {
                day: day.to_owned(),
                slot: slot.to_owned(),
            })
    }

    /// All cells, day by day, each day in serving order.
    pub fn cells(&self) -> impl Iterator<Item = MealCell> {
        let days = self.days;
        days.iter()
            .flat_map(|&(day, slots)| slots.iter().map(move |&slot| MealCell { day, slot }))
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.days.iter().map(|(_, slots)| slots.len()).sum()
    }
}

impl Default for MealSchema {
    fn default() -> Self {
        EVENT_MEAL_SCHEMA
    }
}
