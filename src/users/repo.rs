use async_trait::async_trait;

use super::repo_types::{NewUser, User};
use crate::db::{PgTx, StoreError};

#[async_trait]
pub trait UserRepo {
    async fn create_user(&mut self, user: &NewUser) -> Result<User, StoreError>;
    async fn find_user_by_id(&mut self, id: i64) -> Result<User, StoreError>;
    async fn find_user_by_phone(&mut self, phone_number: &str) -> Result<User, StoreError>;
    async fn find_user_by_email(&mut self, email: &str) -> Result<User, StoreError>;
    async fn mark_user_verified(&mut self, id: i64) -> Result<(), StoreError>;
    async fn update_password(&mut self, id: i64, password_hash: &str) -> Result<(), StoreError>;
    async fn set_email(&mut self, id: i64, email: &str) -> Result<(), StoreError>;
    async fn set_phone(&mut self, id: i64, phone_number: &str) -> Result<(), StoreError>;
    /// Verified `member` accounts, ordered by id.
    async fn list_verified_members(&mut self) -> Result<Vec<User>, StoreError>;
    async fn delete_user(&mut self, id: i64) -> Result<(), StoreError>;
}

const USER_COLUMNS: &str =
    "id, phone_number, email, password_hash, is_verified, user_type, created_at, updated_at";

#[async_trait]
impl UserRepo for PgTx {
    async fn create_user(&mut self, user: &NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (phone_number, email, password_hash, user_type)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.phone_number.as_deref())
        .bind(user.email.as_deref())
        .bind(user.password_hash.as_deref())
        .bind(user.user_type.as_str())
        .fetch_one(self.conn())
        .await?;
        Ok(row)
    }

    async fn find_user_by_id(&mut self, id: i64) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.conn())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn find_user_by_phone(&mut self, phone_number: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone_number = $1"
        ))
        .bind(phone_number)
        .fetch_optional(self.conn())
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(self.conn())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn mark_user_verified(&mut self, id: i64) -> Result<(), StoreError> {
        let done = sqlx::query(
            "UPDATE users SET is_verified = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(self.conn())
        .await?;
        expect_one(done.rows_affected())
    }

    async fn update_password(&mut self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        let done = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id)
        .execute(self.conn())
        .await?;
        expect_one(done.rows_affected())
    }

    async fn set_email(&mut self, id: i64, email: &str) -> Result<(), StoreError> {
        let done = sqlx::query("UPDATE users SET email = $1, updated_at = now() WHERE id = $2")
            .bind(email)
            .bind(id)
            .execute(self.conn())
            .await?;
        expect_one(done.rows_affected())
    }

    async fn set_phone(&mut self, id: i64, phone_number: &str) -> Result<(), StoreError> {
        let done =
            sqlx::query("UPDATE users SET phone_number = $1, updated_at = now() WHERE id = $2")
                .bind(phone_number)
                .bind(id)
                .execute(self.conn())
                .await?;
        expect_one(done.rows_affected())
    }

    async fn list_verified_members(&mut self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE is_verified AND user_type = 'member'
             ORDER BY id ASC
            "#
        ))
        .fetch_all(self.conn())
        .await?;
        Ok(rows)
    }

    async fn delete_user(&mut self, id: i64) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.conn())
            .await?;
        expect_one(done.rows_affected())
    }
}

pub(crate) fn expect_one(rows_affected: u64) -> Result<(), StoreError> {
    if rows_affected == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}
