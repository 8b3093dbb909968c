use diesel::result::DatabaseErrorKind;
use diesel_async::pooled_connection::deadpool;
use foodcourt_entitlement::StoreError;
use thiserror::Error;

#[allow(clippy::module_name_repetitions)]
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to create database pool {0}")]
    PoolBuild(#[from] deadpool::BuildError),
    #[error("Database pool failed {0}")]
    Pool(#[from] deadpool::PoolError),
    #[error("Database query failed {0}")]
    Database(#[from] diesel::result::Error),
}

impl DatabaseError {
    #[must_use]
    pub const fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Database(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _
            ))
        )
    }
}

impl DatabaseError {
    /// Pool exhaustion, dropped connections and serialization conflicts go
    /// away on their own. Constraint and query errors do not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::PoolBuild(_)
                | Self::Pool(_)
                | Self::Database(diesel::result::Error::DatabaseError(
                    DatabaseErrorKind::ClosedConnection
                        | DatabaseErrorKind::SerializationFailure,
                    _
                ))
        )
    }
}

impl From<DatabaseError> for StoreError {
    fn from(value: DatabaseError) -> Self {
        if value.is_transient() {
            Self::Unavailable(Box::new(value))
        } else {
            Self::Failed(Box::new(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database_error(kind: DatabaseErrorKind) -> DatabaseError {
        DatabaseError::Database(diesel::result::Error::DatabaseError(
            kind,
            Box::new(String::from("server said no")),
        ))
    }

    #[test]
    fn lost_connections_are_retryable() {
        for kind in [
            DatabaseErrorKind::ClosedConnection,
            DatabaseErrorKind::SerializationFailure,
        ] {
            assert!(matches!(
                StoreError::from(database_error(kind)),
                StoreError::Unavailable(_)
            ));
        }
        assert!(matches!(
            StoreError::from(DatabaseError::Pool(deadpool::PoolError::Closed)),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn query_errors_are_permanent() {
        for err in [
            database_error(DatabaseErrorKind::CheckViolation),
            database_error(DatabaseErrorKind::ForeignKeyViolation),
            DatabaseError::Database(diesel::result::Error::NotFound),
        ] {
            assert!(matches!(StoreError::from(err), StoreError::Failed(_)));
        }
    }

    #[test]
    fn unique_violations_are_recognized() {
        assert!(database_error(DatabaseErrorKind::UniqueViolation).is_unique_violation());
        assert!(!database_error(DatabaseErrorKind::CheckViolation).is_unique_violation());
    }
}
