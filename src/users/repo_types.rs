use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Account role stored in `users.user_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Member,
    Admin,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Member => "member",
            AccountType::Admin => "admin",
        }
    }
}

impl TryFrom<String> for AccountType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "member" => Ok(AccountType::Member),
            "admin" => Ok(AccountType::Admin),
            other => Err(format!("unknown account type {other:?}")),
        }
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // argon2 PHC string
    pub is_verified: bool,
    #[sqlx(try_from = "String")]
    pub user_type: AccountType,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Insert payload; ids and timestamps come from the database.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub user_type: AccountType,
}
