//! OTP lifecycle: `NONE -> ISSUED -> {CONSUMED | EXPIRED}`.
//!
//! Several codes may be outstanding for one user at a time (registration,
//! resend, password reset). Validation always matches the exact
//! `(user, code)` pair and consuming a code marks only that record as used;
//! sibling codes stay valid until they expire or are consumed themselves.

use rand::{rngs::OsRng, Rng};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use super::{repo::OtpRepo, repo_types::OtpRecord};
use crate::{db::StoreError, error::ApiError};

/// Validity window of a freshly issued code.
pub const OTP_TTL: Duration = Duration::minutes(5);

const CODE_SPACE: u32 = 1_000_000;

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    /// Wrong code, or a code that was already consumed.
    #[error("no unused code matches")]
    NotFound,
    #[error("code expired")]
    Expired,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for OtpError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => OtpError::NotFound,
            other => OtpError::Store(other),
        }
    }
}

impl From<OtpError> for ApiError {
    fn from(e: OtpError) -> Self {
        match e {
            OtpError::NotFound | OtpError::Expired => ApiError::unauthorized("Invalid or expired OTP"),
            OtpError::Store(e) => e.into(),
        }
    }
}

/// Uniform over `000000..=999999`.
pub fn generate_code() -> String {
    format!("{:06}", OsRng.gen_range(0..CODE_SPACE))
}

pub async fn issue<R>(repo: &mut R, user_id: i64, now: OffsetDateTime) -> Result<OtpRecord, StoreError>
where
    R: OtpRepo + Send,
{
    let code = generate_code();
    let record = repo.insert_otp(user_id, &code, now, now + OTP_TTL).await?;
    debug!(user_id, otp_id = record.id, expires_at = %record.expires_at, "otp issued");
    Ok(record)
}

/// Finds the live record for `(user_id, code)` without consuming it.
/// An expired record stays unused; it can never become valid again.
pub async fn check<R>(
    repo: &mut R,
    user_id: i64,
    code: &str,
    now: OffsetDateTime,
) -> Result<OtpRecord, OtpError>
where
    R: OtpRepo + Send,
{
    let record = repo.find_unused_otp(user_id, code.trim()).await?;
    if record.is_expired(now) {
        warn!(user_id, otp_id = record.id, "otp expired");
        return Err(OtpError::Expired);
    }
    Ok(record)
}

pub async fn consume<R>(repo: &mut R, record: &OtpRecord) -> Result<(), OtpError>
where
    R: OtpRepo + Send,
{
    repo.mark_otp_used(record.id).await?;
    debug!(user_id = record.user_id, otp_id = record.id, "otp consumed");
    Ok(())
}

/// [`check`] then [`consume`].
pub async fn validate<R>(
    repo: &mut R,
    user_id: i64,
    code: &str,
    now: OffsetDateTime,
) -> Result<OtpRecord, OtpError>
where
    R: OtpRepo + Send,
{
    let record = check(repo, user_id, code, now).await?;
    consume(repo, &record).await?;
    Ok(record)
}

/// Housekeeping: drops every expired record. Idempotent.
pub async fn sweep<R>(repo: &mut R, now: OffsetDateTime) -> Result<u64, StoreError>
where
    R: OtpRepo + Send,
{
    repo.delete_expired_otps(now).await
}
