use async_trait::async_trait;
use rust_decimal::Decimal;

use super::repo_types::{Donation, DonationPatch, NewDonation};
use crate::{
    db::{patch::update_query, PgTx, StoreError},
    users::repo::expect_one,
};

#[async_trait]
pub trait DonationRepo {
    async fn create_donation(&mut self, donation: &NewDonation) -> Result<Donation, StoreError>;
    async fn find_donation(&mut self, id: i64) -> Result<Donation, StoreError>;
    /// Donations of one user in insertion order.
    async fn list_donations_by_user(&mut self, user_id: i64) -> Result<Vec<Donation>, StoreError>;
    async fn list_donations(&mut self) -> Result<Vec<Donation>, StoreError>;
    /// Sum of all amounts; zero when there are no donations.
    async fn total_donations(&mut self) -> Result<Decimal, StoreError>;
    async fn update_donation(
        &mut self,
        id: i64,
        patch: &DonationPatch,
    ) -> Result<Donation, StoreError>;
    async fn delete_donation(&mut self, id: i64) -> Result<(), StoreError>;
}

const DONATION_COLUMNS: &str =
    "id, user_id, amount, purpose, donated_at, created_at, updated_at";

#[async_trait]
impl DonationRepo for PgTx {
    async fn create_donation(&mut self, donation: &NewDonation) -> Result<Donation, StoreError> {
        let row = sqlx::query_as::<_, Donation>(&format!(
            r#"
            INSERT INTO donations (user_id, amount, purpose, donated_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {DONATION_COLUMNS}
            "#
        ))
        .bind(donation.user_id)
        .bind(donation.amount)
        .bind(&donation.purpose)
        .bind(donation.donated_at)
        .fetch_one(self.conn())
        .await?;
        Ok(row)
    }

    async fn find_donation(&mut self, id: i64) -> Result<Donation, StoreError> {
        sqlx::query_as::<_, Donation>(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.conn())
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn list_donations_by_user(&mut self, user_id: i64) -> Result<Vec<Donation>, StoreError> {
        let rows = sqlx::query_as::<_, Donation>(&format!(
            r#"
            SELECT {DONATION_COLUMNS}
              FROM donations
             WHERE user_id = $1
             ORDER BY id ASC
            "#
        ))
        .bind(user_id)
        .fetch_all(self.conn())
        .await?;
        Ok(rows)
    }

    async fn list_donations(&mut self) -> Result<Vec<Donation>, StoreError> {
        let rows = sqlx::query_as::<_, Donation>(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations ORDER BY id ASC"
        ))
        .fetch_all(self.conn())
        .await?;
        Ok(rows)
    }

    async fn total_donations(&mut self) -> Result<Decimal, StoreError> {
        let total: Decimal =
            sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0)::NUMERIC FROM donations")
                .fetch_one(self.conn())
                .await?;
        Ok(total)
    }

    async fn update_donation(
        &mut self,
        id: i64,
        patch: &DonationPatch,
    ) -> Result<Donation, StoreError> {
        let mut qb = update_query("donations", patch.assignments(), "id", id, DONATION_COLUMNS);
        qb.build_query_as::<Donation>()
            .fetch_optional(self.conn())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete_donation(&mut self, id: i64) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM donations WHERE id = $1")
            .bind(id)
            .execute(self.conn())
            .await?;
        expect_one(done.rows_affected())
    }
}
