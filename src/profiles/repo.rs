use async_trait::async_trait;

use super::repo_types::{ProfilePatch, UserProfile};
use crate::{
    db::{patch::update_query, PgTx, StoreError},
    users::repo::expect_one,
};

#[async_trait]
pub trait ProfileRepo {
    async fn create_profile(
        &mut self,
        user_id: i64,
        fields: &ProfilePatch,
    ) -> Result<UserProfile, StoreError>;
    async fn find_profile_by_user(&mut self, user_id: i64) -> Result<UserProfile, StoreError>;
    /// Overwrites only the columns present in `patch`.
    async fn update_profile(
        &mut self,
        user_id: i64,
        patch: &ProfilePatch,
    ) -> Result<UserProfile, StoreError>;
    async fn delete_profile(&mut self, user_id: i64) -> Result<(), StoreError>;
}

const PROFILE_COLUMNS: &str = "id, user_id, full_name, date_of_birth, marital_status, \
     wedding_anniversary, gender, profession, created_at, updated_at";

#[async_trait]
impl ProfileRepo for PgTx {
    async fn create_profile(
        &mut self,
        user_id: i64,
        fields: &ProfilePatch,
    ) -> Result<UserProfile, StoreError> {
        let row = sqlx::query_as::<_, UserProfile>(&format!(
            r#"
            INSERT INTO user_profile
                (user_id, full_name, date_of_birth, marital_status,
                 wedding_anniversary, gender, profession)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(fields.full_name.as_deref())
        .bind(fields.date_of_birth)
        .bind(fields.marital_status.as_deref())
        .bind(fields.wedding_anniversary)
        .bind(fields.gender.as_deref())
        .bind(fields.profession.as_deref())
        .fetch_one(self.conn())
        .await?;
        Ok(row)
    }

    async fn find_profile_by_user(&mut self, user_id: i64) -> Result<UserProfile, StoreError> {
        sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profile WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.conn())
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn update_profile(
        &mut self,
        user_id: i64,
        patch: &ProfilePatch,
    ) -> Result<UserProfile, StoreError> {
        let mut qb = update_query(
            "user_profile",
            patch.assignments(),
            "user_id",
            user_id,
            PROFILE_COLUMNS,
        );
        qb.build_query_as::<UserProfile>()
            .fetch_optional(self.conn())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete_profile(&mut self, user_id: i64) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM user_profile WHERE user_id = $1")
            .bind(user_id)
            .execute(self.conn())
            .await?;
        expect_one(done.rows_affected())
    }
}
