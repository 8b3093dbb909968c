use thiserror::Error;

use crate::store::{BoxError, StoreError};

#[derive(Error, Debug)]
pub enum EntitlementError {
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        field: &'static str,
        reason: &'static str,
    },
    #[error("unknown meal slot {day}/{slot}")]
    InvalidSlot { day: String, slot: String },
    #[error("a participant with identity {0} already exists")]
    DuplicateIdentity(String),
    #[error("participant {0} not found")]
    NotFound(String),
    #[error("this operation requires the admin capability")]
    Unauthorized,
    #[error("participant store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error("internal failure: {0}")]
    Internal(#[source] BoxError),
}

impl EntitlementError {
    /// Stable identifier handed to clients so they can tell failures apart
    /// without parsing messages.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::InvalidSlot { .. } => "INVALID_SLOT",
            Self::DuplicateIdentity(_) => "DUPLICATE_IDENTITY",
            Self::NotFound(_) => "PARTICIPANT_NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Only infrastructure failures are worth retrying. Nothing in this crate
    /// retries on its own.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for EntitlementError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateIdentity(identity) => Self::DuplicateIdentity(identity),
            StoreError::NotFound(identity) => Self::NotFound(identity),
            err @ (StoreError::Unavailable(_) | StoreError::Timeout(_)) => {
                Self::StoreUnavailable(err)
            }
            err @ (StoreError::Failed(_) | StoreError::MissingCell { .. }) => {
                Self::Internal(Box::new(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;
    use crate::meal_schema::EVENT_MEAL_SCHEMA;

    #[test]
    fn codes_are_distinct() {
        let errors = [
            EntitlementError::InvalidInput {
                field: "identity",
                reason: "must not be empty",
            },
            EntitlementError::InvalidSlot {
                day: "day3".to_owned(),
                slot: "lunch".to_owned(),
            },
            EntitlementError::DuplicateIdentity("a@b.c".to_owned()),
            EntitlementError::NotFound("a@b.c".to_owned()),
            EntitlementError::Unauthorized,
            EntitlementError::StoreUnavailable(StoreError::Timeout(Duration::from_secs(1))),
            EntitlementError::Internal("broken".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(EntitlementError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn only_store_outages_are_retryable() {
        assert!(
            EntitlementError::from(StoreError::Timeout(Duration::from_millis(10))).is_retryable()
        );
        assert!(EntitlementError::from(StoreError::Unavailable("connection reset".into()))
            .is_retryable());
        assert!(!EntitlementError::from(StoreError::Failed("check violation".into()))
            .is_retryable());
        assert!(!EntitlementError::from(StoreError::NotFound("x@y.z".to_owned())).is_retryable());
        assert!(!EntitlementError::Unauthorized.is_retryable());
    }

    #[test]
    fn store_errors_keep_their_meaning() {
        assert!(matches!(
            EntitlementError::from(StoreError::DuplicateIdentity("x@y.z".to_owned())),
            EntitlementError::DuplicateIdentity(identity) if identity == "x@y.z"
        ));
        assert!(matches!(
            EntitlementError::from(StoreError::NotFound("x@y.z".to_owned())),
            EntitlementError::NotFound(_)
        ));
    }

    #[test]
    fn a_missing_cell_is_not_a_missing_participant() {
        let cell = EVENT_MEAL_SCHEMA.resolve("day2", "lunch").unwrap();
        let err = EntitlementError::from(StoreError::MissingCell {
            identity: "x@y.z".to_owned(),
            cell,
        });
        assert!(matches!(err, EntitlementError::Internal(_)));
        assert_eq!(err.code(), "INTERNAL");
        assert!(!err.is_retryable());
    }
}
