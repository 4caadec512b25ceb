//! Per-request transaction envelope.
//!
//! One transaction per call: begin, run the handler body against it, commit
//! on `Ok`, roll back on `Err`. The body runs on its own task, so a client that
//! hangs up mid-request cannot leave the transaction half finished; every path
//! ends in an explicit commit or rollback.

use std::{future::Future, pin::Pin, time::Duration};

use tracing::{debug, error, warn, Instrument};

use super::{Database, Transaction};
use crate::error::ApiError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub async fn run<D, T, F>(db: &D, deadline: Duration, f: F) -> Result<T, ApiError>
where
    D: Database,
    T: Send + 'static,
    F: for<'t> FnOnce(&'t mut D::Tx) -> BoxFuture<'t, Result<T, ApiError>> + Send + 'static,
{
    let db = db.clone();
    let span = tracing::Span::current();
    tokio::spawn(async move { in_transaction(&db, deadline, f).await }.instrument(span))
        .await
        .map_err(|e| {
            error!(error = %e, "transaction task aborted");
            ApiError::internal("Internal server error")
        })?
}

async fn in_transaction<D, T, F>(db: &D, deadline: Duration, f: F) -> Result<T, ApiError>
where
    D: Database,
    F: for<'t> FnOnce(&'t mut D::Tx) -> BoxFuture<'t, Result<T, ApiError>>,
{
    let mut tx = db.begin().await.map_err(|e| {
        error!(error = %e, "begin transaction failed");
        ApiError::internal("Failed to start transaction")
    })?;

    let outcome = match tokio::time::timeout(deadline, f(&mut tx)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(?deadline, "transaction deadline exceeded");
            Err(ApiError::internal("Request timed out"))
        }
    };

    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                error!(error = %e, "commit failed");
                ApiError::internal("Failed to commit transaction")
            })?;
            debug!("transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rb) = tx.rollback().await {
                error!(error = %rb, "rollback failed");
            }
            debug!(error = %err, "transaction rolled back");
            Err(err)
        }
    }
}
