use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::{
    dto::{CreateDonationRequest, DonationCreatedResponse, UpdateDonationRequest},
    repo_types::{Donation, DonationPatch, NewDonation},
};
use crate::{
    db::{patch::non_empty, Gateway, StoreError},
    error::ApiError,
    notify::{messages, Outcome},
};

const DEFAULT_PURPOSE: &str = "General";

fn not_found(what: &'static str) -> impl Fn(StoreError) -> ApiError {
    move |e| match e {
        StoreError::NotFound => ApiError::not_found(what),
        other => other.into(),
    }
}

/// `NUMERIC(12, 2)`: at most ten integer digits and two decimal places.
fn check_amount(amount: Decimal) -> Result<Decimal, ApiError> {
    if amount <= Decimal::ZERO {
        return Err(ApiError::bad_input("Amount must be greater than zero"));
    }
    if amount.normalize().scale() > 2 {
        return Err(ApiError::bad_input("Amount can have at most two decimal places"));
    }
    if amount >= Decimal::from(10_000_000_000_i64) {
        return Err(ApiError::bad_input("Amount is too large"));
    }
    Ok(amount)
}

fn check_user_id(id: i64) -> Result<i64, ApiError> {
    if id <= 0 {
        return Err(ApiError::bad_input("Invalid user id"));
    }
    Ok(id)
}

/// Records a donation and queues the thank-you mail. The donor must exist;
/// a missing profile only changes the greeting.
pub async fn create_donation<G: Gateway>(
    tx: &mut G,
    caller: i64,
    req: CreateDonationRequest,
    now: OffsetDateTime,
) -> Result<Outcome<DonationCreatedResponse>, ApiError> {
    let donor_id = check_user_id(req.user_id.unwrap_or(caller))?;
    let amount = check_amount(req.amount)?;
    let purpose = non_empty(req.purpose).unwrap_or_else(|| DEFAULT_PURPOSE.to_string());

    let donor = tx
        .find_user_by_id(donor_id)
        .await
        .map_err(not_found("User not found"))?;

    let donation = tx
        .create_donation(&NewDonation {
            user_id: donor.id,
            amount,
            purpose,
            donated_at: now,
        })
        .await?;
    info!(donation_id = donation.id, user_id = donor.id, recorded_by = caller, "donation added");

    let full_name = match tx.find_profile_by_user(donor.id).await {
        Ok(profile) => profile.full_name,
        Err(StoreError::NotFound) => None,
        Err(e) => {
            warn!(error = %e, user_id = donor.id, "profile lookup for thank-you mail failed");
            None
        }
    };
    let mail = messages::donation_thanks(
        &donor,
        full_name.as_deref(),
        donation.amount,
        &donation.purpose,
        donation.donated_at,
    );

    Ok(Outcome::new(DonationCreatedResponse {
        message: "Donation added",
        donation_id: donation.id,
    })
    .with_mail(mail))
}

pub async fn list_by_user<G: Gateway>(tx: &mut G, user_id: i64) -> Result<Vec<Donation>, ApiError> {
    let user_id = check_user_id(user_id)?;
    Ok(tx.list_donations_by_user(user_id).await?)
}

pub async fn list_all<G: Gateway>(tx: &mut G) -> Result<Vec<Donation>, ApiError> {
    Ok(tx.list_donations().await?)
}

pub async fn total<G: Gateway>(tx: &mut G) -> Result<Decimal, ApiError> {
    Ok(tx.total_donations().await?)
}

/// Zero ids, zero amounts and blank purposes count as "not supplied".
fn patch_from(req: &UpdateDonationRequest) -> Result<DonationPatch, ApiError> {
    let user_id = req.user_id.filter(|v| *v != 0).map(check_user_id).transpose()?;
    let amount = req.amount.filter(|v| !v.is_zero()).map(check_amount).transpose()?;
    Ok(DonationPatch {
        user_id,
        amount,
        purpose: non_empty(req.purpose.clone()),
    })
}

pub async fn update_donation<G: Gateway>(
    tx: &mut G,
    req: UpdateDonationRequest,
) -> Result<Donation, ApiError> {
    if req.id <= 0 {
        return Err(ApiError::bad_input("Invalid donation id"));
    }
    let patch = patch_from(&req)?;
    if patch.is_empty() {
        return Err(ApiError::bad_input("No fields to update"));
    }
    if let Some(user_id) = patch.user_id {
        tx.find_user_by_id(user_id)
            .await
            .map_err(not_found("User not found"))?;
    }
    let donation = tx
        .update_donation(req.id, &patch)
        .await
        .map_err(not_found("Donation not found"))?;
    info!(donation_id = donation.id, "donation updated");
    Ok(donation)
}

pub async fn delete_donation<G: Gateway>(tx: &mut G, id: i64) -> Result<(), ApiError> {
    tx.delete_donation(id)
        .await
        .map_err(not_found("Donation not found"))?;
    info!(donation_id = id, "donation deleted");
    Ok(())
}
