//! Runtime error taxonomy - `spec.md` §7 ("Error Handling Design").
//! Grounded on `original_source/runtime/actions/query.go`'s
//! `toRuntimeError` and `runtime/common`'s authentication-failure
//! sentinel errors.

use keel_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no matching row")]
    NotFound,
    #[error("caller is not authorized to perform this action")]
    NotAuthorized,
    #[error("null value in column \"{0}\" violates not-null constraint")]
    NotNull(String),
    #[error("duplicate value violates unique constraint on \"{0}\"")]
    UniqueViolation(String),
    #[error("insert or update violates foreign key constraint on \"{0}\"")]
    ForeignKeyViolation(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("authentication failed: {0}")]
    AuthenticationFailed(#[from] AuthFailureKind),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Distinguishes the auth sub-kinds `spec.md` §7 calls out by name so
/// clients can tell "try again" (expired) from "reject and re-auth"
/// (invalid/unknown identity) apart.
#[derive(Debug, Error)]
pub enum AuthFailureKind {
    #[error("token cannot be parsed or verified as a valid JWT")]
    InvalidToken,
    #[error("token has expired")]
    TokenExpired,
    #[error("identity not found")]
    IdentityNotFound,
}

impl From<keel_auth::AuthError> for RuntimeError {
    fn from(err: keel_auth::AuthError) -> Self {
        use keel_auth::AuthError;
        match err {
            AuthError::TokenExpired => RuntimeError::AuthenticationFailed(AuthFailureKind::TokenExpired),
            AuthError::InvalidToken | AuthError::NoSigningKey | AuthError::Jwt(_) => {
                RuntimeError::AuthenticationFailed(AuthFailureKind::InvalidToken)
            }
            AuthError::IdentityNotFound => RuntimeError::AuthenticationFailed(AuthFailureKind::IdentityNotFound),
            other => RuntimeError::Internal(other.to_string()),
        }
    }
}

/// `get` returning more than one row is an invariant violation, not a
/// regular database error - `spec.md` §7 ("must be logged"). The dispatcher
/// logs it via `tracing::error!` before converting it here.
impl From<DbError> for RuntimeError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotNull(col) => RuntimeError::NotNull(col),
            DbError::Unique(col) => RuntimeError::UniqueViolation(col),
            DbError::ForeignKey(col) => RuntimeError::ForeignKeyViolation(col),
            DbError::TooManyRows(n) => RuntimeError::Internal(format!("{n} rows returned for a single-row query")),
            DbError::Sqlx(source) => RuntimeError::Internal(source.to_string()),
        }
    }
}
