//! Translation of pool and Diesel failures into revision store errors.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::BannerRepositoryError;

use super::pool::PoolError;

pub(crate) fn map_pool_error(error: PoolError) -> BannerRepositoryError {
    BannerRepositoryError::connection(error.into_message())
}

/// Map a Diesel error, logging driver detail at debug level only.
///
/// Callers see stable messages; constraint names and SQL fragments stay in
/// the logs.
pub(crate) fn map_diesel_error(error: DieselError) -> BannerRepositoryError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(
                ?kind,
                message = info.message(),
                constraint = info.constraint_name(),
                "diesel operation failed"
            );
        }
        other => debug!(error = %other, "diesel operation failed"),
    }

    match error {
        DieselError::NotFound => BannerRepositoryError::query("record not found"),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            BannerRepositoryError::connection("database connection error")
        }
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
            BannerRepositoryError::query("transaction serialisation failure")
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            BannerRepositoryError::query("referential integrity violation")
        }
        DieselError::DeserializationError(_) => {
            BannerRepositoryError::query("failed to decode database row")
        }
        _ => BannerRepositoryError::query("database error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_checkout_maps_to_connection_error() {
        let err = map_pool_error(PoolError::checkout("timed out waiting for connection"));

        assert!(matches!(err, BannerRepositoryError::Connection { .. }));
        assert!(err.to_string().contains("timed out waiting for connection"));
    }

    #[rstest]
    fn not_found_maps_to_query_error() {
        let err = map_diesel_error(DieselError::NotFound);

        assert_eq!(err, BannerRepositoryError::query("record not found"));
    }

    #[rstest]
    fn closed_connection_maps_to_connection_error() {
        let err = map_diesel_error(DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new("server closed the connection".to_owned()),
        ));

        assert!(matches!(err, BannerRepositoryError::Connection { .. }));
    }

    #[rstest]
    fn driver_messages_are_not_leaked() {
        let err = map_diesel_error(DieselError::DatabaseError(
            DatabaseErrorKind::Unknown,
            Box::new("relation \"revision_tags\" does not exist".to_owned()),
        ));

        assert_eq!(err, BannerRepositoryError::query("database error"));
    }
}
