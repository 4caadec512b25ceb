use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::patch::{Column, PatchValue};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Donation {
    pub id: i64,
    pub user_id: i64,
    pub amount: Decimal,
    pub purpose: String,
    #[serde(with = "time::serde::rfc3339")]
    pub donated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewDonation {
    pub user_id: i64,
    pub amount: Decimal,
    pub purpose: String,
    pub donated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationColumn {
    UserId,
    Amount,
    Purpose,
}

impl Column for DonationColumn {
    fn name(self) -> &'static str {
        match self {
            DonationColumn::UserId => "user_id",
            DonationColumn::Amount => "amount",
            DonationColumn::Purpose => "purpose",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DonationPatch {
    pub user_id: Option<i64>,
    pub amount: Option<Decimal>,
    pub purpose: Option<String>,
}

impl DonationPatch {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.amount.is_none() && self.purpose.is_none()
    }

    pub fn assignments(&self) -> Vec<(DonationColumn, PatchValue)> {
        let mut set = Vec::new();
        if let Some(v) = self.user_id {
            set.push((DonationColumn::UserId, PatchValue::BigInt(v)));
        }
        if let Some(v) = self.amount {
            set.push((DonationColumn::Amount, PatchValue::Decimal(v)));
        }
        if let Some(v) = &self.purpose {
            set.push((DonationColumn::Purpose, PatchValue::Text(v.clone())));
        }
        set
    }
}
