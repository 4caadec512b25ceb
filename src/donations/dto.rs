use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::repo_types::Donation;

#[derive(Debug, Deserialize)]
pub struct CreateDonationRequest {
    /// Defaults to the caller.
    pub user_id: Option<i64>,
    pub amount: Decimal,
    pub purpose: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDonationRequest {
    pub id: i64,
    pub user_id: Option<i64>,
    pub amount: Option<Decimal>,
    pub purpose: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DonationCreatedResponse {
    pub message: &'static str,
    pub donation_id: i64,
}

#[derive(Debug, Serialize)]
pub struct DonationListResponse {
    pub donations: Vec<Donation>,
}

#[derive(Debug, Serialize)]
pub struct DonationTotalResponse {
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct DonationUpdatedResponse {
    pub message: &'static str,
    pub donation: Donation,
}
