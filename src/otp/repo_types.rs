use sqlx::FromRow;
use time::OffsetDateTime;

/// One issued verification code.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct OtpRecord {
    pub id: i64,
    pub user_id: i64,
    pub otp_code: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub is_used: bool,
}

impl OtpRecord {
    /// Valid strictly before `expires_at`.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}
