use async_trait::async_trait;
use time::OffsetDateTime;

use super::repo_types::OtpRecord;
use crate::{
    db::{PgTx, StoreError},
    users::repo::expect_one,
};

#[async_trait]
pub trait OtpRepo {
    async fn insert_otp(
        &mut self,
        user_id: i64,
        code: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<OtpRecord, StoreError>;
    /// Unused record matching both `user_id` and `code`. When several match,
    /// the one expiring last wins.
    async fn find_unused_otp(&mut self, user_id: i64, code: &str)
        -> Result<OtpRecord, StoreError>;
    /// Consumes exactly one record.
    async fn mark_otp_used(&mut self, otp_id: i64) -> Result<(), StoreError>;
    /// Deletes every record expired at `now`, used or not. Returns the count.
    async fn delete_expired_otps(&mut self, now: OffsetDateTime) -> Result<u64, StoreError>;
}

const OTP_COLUMNS: &str = "id, user_id, otp_code, created_at, expires_at, is_used";

#[async_trait]
impl OtpRepo for PgTx {
    async fn insert_otp(
        &mut self,
        user_id: i64,
        code: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<OtpRecord, StoreError> {
        let row = sqlx::query_as::<_, OtpRecord>(&format!(
            r#"
            INSERT INTO otp_verification (user_id, otp_code, created_at, expires_at, is_used)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING {OTP_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(code)
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(self.conn())
        .await?;
        Ok(row)
    }

    async fn find_unused_otp(
        &mut self,
        user_id: i64,
        code: &str,
    ) -> Result<OtpRecord, StoreError> {
        sqlx::query_as::<_, OtpRecord>(&format!(
            r#"
            SELECT {OTP_COLUMNS}
              FROM otp_verification
             WHERE user_id = $1 AND otp_code = $2 AND NOT is_used
             ORDER BY expires_at DESC
             LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(code)
        .fetch_optional(self.conn())
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn mark_otp_used(&mut self, otp_id: i64) -> Result<(), StoreError> {
        let done = sqlx::query(
            "UPDATE otp_verification SET is_used = TRUE WHERE id = $1 AND NOT is_used",
        )
        .bind(otp_id)
        .execute(self.conn())
        .await?;
        expect_one(done.rows_affected())
    }

    async fn delete_expired_otps(&mut self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let done = sqlx::query("DELETE FROM otp_verification WHERE expires_at <= $1")
            .bind(now)
            .execute(self.conn())
            .await?;
        Ok(done.rows_affected())
    }
}
