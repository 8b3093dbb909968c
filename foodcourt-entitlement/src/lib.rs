//! Check-in and meal entitlement tracking for a two-day event.
//!
//! [`EntitlementService`] is the only entry point for mutations. It checks
//! the caller's [`Caller`] capability and the [`MealSchema`], then delegates
//! a single atomic step to an [`EntitlementStore`].

pub mod admin;
pub mod error;
pub mod meal_schema;
pub mod memory;
pub mod participant;
pub mod service;
pub mod store;

pub use admin::{AdminCredential, AdminGateway, Caller};
pub use error::EntitlementError;
pub use meal_schema::{MealCell, MealSchema, EVENT_MEAL_SCHEMA};
pub use memory::InMemoryStore;
pub use participant::{MealState, MealStates, ParticipantRecord};
pub use service::{CellStats, EntitlementService, EntitlementStats, DEFAULT_STORE_TIMEOUT};
pub use store::{AdminCredentialStore, BoxError, EntitlementStore, StoreError};
