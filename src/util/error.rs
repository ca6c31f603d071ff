//! Error taxonomy shared by every stage (spec §7, REDESIGN FLAGS).
//!
//! Replaces the "error-flag booleans scattered across dicts" pattern with a
//! small typed result carrying either the success payload or a classified
//! failure. The orchestrator decides what to do with each variant; a failed
//! item never fails its cluster, a failed cluster never fails the cycle.
//!
//! `StageOutcome`, `is_fatal`, and `is_unique_violation` round out the
//! taxonomy for stages that need it (the DAO currently resolves uniqueness
//! collisions at the SQL level via `ON CONFLICT DO NOTHING`, so nothing
//! calls `is_unique_violation` yet outside its own test).
#![allow(dead_code)]

use anyhow::Error;
use reqwest::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    Retryable,
    NonRetryable,
    Fatal,
}

/// One unit of work's outcome. `T` is the stage-specific success payload.
#[derive(Debug)]
pub(crate) enum StageOutcome<T> {
    Done(T),
    Transient(Error),
    InvalidOutput(Error),
    BudgetExhausted,
    Skipped(&'static str),
    Fatal(Error),
}

impl<T> StageOutcome<T> {
    pub(crate) fn is_done(&self) -> bool {
        matches!(self, StageOutcome::Done(_))
    }
}

#[must_use]
pub(crate) fn classify_error(error: &Error) -> ErrorKind {
    if let Some(reqwest_err) = error.downcast_ref::<reqwest::Error>() {
        if reqwest_err.is_timeout() || reqwest_err.is_connect() {
            return ErrorKind::Retryable;
        }
        if let Some(status) = reqwest_err.status() {
            match status {
                StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                | StatusCode::TOO_MANY_REQUESTS => return ErrorKind::Retryable,
                StatusCode::BAD_REQUEST
                | StatusCode::NOT_FOUND
                | StatusCode::UNPROCESSABLE_ENTITY => return ErrorKind::NonRetryable,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return ErrorKind::Fatal,
                _ => {}
            }
        }
    }

    if let Some(sqlx_err) = error.downcast_ref::<sqlx::Error>() {
        return match sqlx_err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                ErrorKind::Retryable
            }
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ErrorKind::NonRetryable
            }
            sqlx::Error::RowNotFound => ErrorKind::NonRetryable,
            sqlx::Error::Configuration(_) => ErrorKind::Fatal,
            _ => ErrorKind::NonRetryable,
        };
    }

    ErrorKind::NonRetryable
}

#[must_use]
pub(crate) fn is_retryable(error: &Error) -> bool {
    matches!(classify_error(error), ErrorKind::Retryable)
}

#[must_use]
pub(crate) fn is_fatal(error: &Error) -> bool {
    matches!(classify_error(error), ErrorKind::Fatal)
}

/// A unique-key collision on insert is duplicate-suppression, not an error
/// (spec §7: "constraint violation — handled as duplicate-suppression when
/// it is a unique-key collision").
#[must_use]
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn generic_error_is_non_retryable_by_default() {
        let err = anyhow!("validation failed");
        assert!(!is_retryable(&err));
        assert!(!is_fatal(&err));
    }
}
