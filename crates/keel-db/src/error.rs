//! Database-layer error taxonomy. Grounded on
//! `original_source/runtime/actions/query.go`'s `toRuntimeError`, which maps
//! a driver-level constraint violation into one of three named kinds (plus
//! a catch-all) before it ever reaches the dispatcher in `spec.md` §4.G /
//! §7.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("null value in column \"{0}\" violates not-null constraint")]
    NotNull(String),
    #[error("duplicate value violates unique constraint on \"{0}\"")]
    Unique(String),
    #[error("insert or update violates foreign key constraint on \"{0}\"")]
    ForeignKey(String),
    #[error("{0} results returned for a single-row query, which expects 0 or 1")]
    TooManyRows(usize),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Postgres `SQLSTATE` codes the driver surfaces for constraint
/// violations. See https://www.postgresql.org/docs/current/errcodes-appendix.html.
mod sqlstate {
    pub const NOT_NULL_VIOLATION: &str = "23502";
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
}

/// Inspects a raw `sqlx::Error` for a recognized constraint-violation
/// `SQLSTATE` and maps it to the matching [`DbError`] variant; anything
/// else passes through as `DbError::Sqlx`.
pub fn classify(err: sqlx::Error) -> DbError {
    let Some(db_err) = err.as_database_error() else {
        tracing::debug!(error = %err, "non-database sqlx error");
        return DbError::Sqlx(err);
    };

    let Some(code) = db_err.code() else {
        tracing::warn!(message = %db_err.message(), "database error with no SQLSTATE code");
        return DbError::Sqlx(err);
    };

    let column = db_err
        .as_ref()
        .downcast_ref::<sqlx::postgres::PgDatabaseError>()
        .and_then(|e| e.column())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string());

    match code.as_ref() {
        sqlstate::NOT_NULL_VIOLATION => DbError::NotNull(column),
        sqlstate::UNIQUE_VIOLATION => DbError::Unique(column),
        sqlstate::FOREIGN_KEY_VIOLATION => DbError::ForeignKey(column),
        _ => DbError::Sqlx(err),
    }
}
