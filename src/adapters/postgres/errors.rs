//! sqlx error mapping shared by the PostgreSQL adapters.

use crate::domain::foundation::{DomainError, ErrorCode};

/// SQLSTATE for serialization failures under SERIALIZABLE / REPEATABLE READ.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Maps a sqlx error to a DomainError.
///
/// Serialization failures and deadlocks become `ConcurrentUpdateConflict`
/// so callers retry them; everything else is a `DatabaseError`.
pub(crate) fn map_sqlx_error(context: &str, err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(code) = db_err.code() {
            if code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED {
                return DomainError::conflict(format!("{}: {}", context, db_err.message()));
            }
        }
    }
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, err))
}

/// Name of the violated constraint, if the error is a constraint violation.
pub(crate) fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}

/// A stored value failed to parse back into a domain type.
pub(crate) fn corrupt_row(what: &str, value: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} value in database: {}", what, value),
    )
}
