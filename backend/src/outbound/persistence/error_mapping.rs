//! Diesel and pool error translation for the registry adapters.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::{AccountDirectoryError, StormRegistryError};

use super::pool::PoolError;

/// Classification shared by every registry-facing port error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DieselFailure {
    Connection(String),
    Query(String),
    /// A unique constraint rejected the write; carries the constraint name.
    Unique(Option<String>),
}

pub(crate) fn classify(error: DieselError) -> DieselFailure {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(error = %error, "diesel operation failed"),
    }

    match error {
        DieselError::NotFound => DieselFailure::Query("record not found".to_owned()),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            DieselFailure::Connection(info.message().to_owned())
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            DieselFailure::Unique(info.constraint_name().map(str::to_owned))
        }
        DieselError::DatabaseError(_, info) => DieselFailure::Query(info.message().to_owned()),
        other => DieselFailure::Query(other.to_string()),
    }
}

pub(crate) fn registry_pool_error(error: PoolError) -> StormRegistryError {
    StormRegistryError::connection(error.into_message())
}

pub(crate) fn directory_pool_error(error: PoolError) -> AccountDirectoryError {
    AccountDirectoryError::connection(error.into_message())
}

pub(crate) fn directory_diesel_error(error: DieselError) -> AccountDirectoryError {
    match classify(error) {
        DieselFailure::Connection(message) => AccountDirectoryError::connection(message),
        DieselFailure::Query(message) => AccountDirectoryError::query(message),
        DieselFailure::Unique(constraint) => AccountDirectoryError::query(format!(
            "unique violation on {}",
            constraint.as_deref().unwrap_or("unknown constraint")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn not_found_is_a_query_failure() {
        assert_eq!(
            classify(DieselError::NotFound),
            DieselFailure::Query("record not found".to_owned())
        );
    }

    #[rstest]
    fn rollback_markers_are_query_failures() {
        assert!(matches!(
            classify(DieselError::RollbackTransaction),
            DieselFailure::Query(_)
        ));
    }

    #[rstest]
    fn pool_errors_become_connection_errors() {
        let err = registry_pool_error(PoolError::checkout("timed out"));
        assert!(matches!(err, StormRegistryError::Connection { .. }));
        assert!(err.to_string().contains("timed out"));

        let err = directory_pool_error(PoolError::build("bad url"));
        assert!(matches!(err, AccountDirectoryError::Connection { .. }));
    }
}
