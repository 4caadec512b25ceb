//! Periodic removal of expired OTP records.

use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::services;
use crate::{
    db::{envelope, Database},
    error::ApiError,
};

pub fn spawn<D: Database>(db: D, every: Duration, deadline: Duration) -> JoinHandle<()> {
    info!(?every, "otp sweeper started");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sweep_once(&db, deadline, OffsetDateTime::now_utc()).await {
                Ok(0) => debug!("no expired otps"),
                Ok(removed) => info!(removed, "expired otps removed"),
                Err(e) => error!(error = %e, "otp sweep failed"),
            }
        }
    })
}

pub async fn sweep_once<D: Database>(
    db: &D,
    deadline: Duration,
    now: OffsetDateTime,
) -> Result<u64, ApiError> {
    envelope::run(db, deadline, move |tx| {
        Box::pin(async move { Ok(services::sweep(tx, now).await?) })
    })
    .await
}
