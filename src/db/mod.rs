//! Persistence gateway.
//!
//! Repository traits live next to the aggregate they store (`users::repo`,
//! `otp::repo`, ...). Every operation runs on a transaction handle the caller
//! already opened; nothing in here begins a transaction on its own except
//! [`Database::begin`], which only the envelope calls.

use async_trait::async_trait;

pub mod envelope;
#[cfg(test)]
pub mod memory;
pub mod patch;
pub mod postgres;

pub use postgres::{PgStore, PgTx};

use crate::{
    donations::repo::DonationRepo, otp::repo::OtpRepo, profiles::repo::ProfileRepo,
    users::repo::UserRepo,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    /// Unique or foreign-key violation.
    #[error("constraint violation: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        let conflict = match &e {
            sqlx::Error::Database(db)
                if matches!(
                    db.code().as_deref(),
                    Some(UNIQUE_VIOLATION) | Some(FOREIGN_KEY_VIOLATION)
                ) =>
            {
                Some(db.message().to_string())
            }
            _ => None,
        };
        if let Some(detail) = conflict {
            return Self::Conflict(detail);
        }
        if matches!(e, sqlx::Error::RowNotFound) {
            return Self::NotFound;
        }
        Self::Database(e)
    }
}

/// Turns `NotFound` into `Ok(None)` for lookups where absence is expected.
pub fn optional<T>(res: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(StoreError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Everything a request handler may touch inside one transaction.
pub trait Gateway: UserRepo + ProfileRepo + DonationRepo + OtpRepo + Send {}

impl<T> Gateway for T where T: UserRepo + ProfileRepo + DonationRepo + OtpRepo + Send {}

/// Source of transaction handles, shared across requests.
#[async_trait]
pub trait Database: Clone + Send + Sync + 'static {
    type Tx: Gateway + Transaction + 'static;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// Finalisation of a transaction handle. Both consume the handle.
#[async_trait]
pub trait Transaction: Send + Sized {
    async fn commit(self) -> Result<(), StoreError>;
    async fn rollback(self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_becomes_not_found() {
        assert!(matches!(StoreError::from(sqlx::Error::RowNotFound), StoreError::NotFound));
    }

    #[test]
    fn other_sqlx_errors_stay_database_errors() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Database(_)
        ));
    }
}
