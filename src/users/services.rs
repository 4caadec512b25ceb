use tracing::{info, warn};

use super::dto::{DonorListResponse, DonorSummary};
use crate::{
    db::{Gateway, StoreError},
    error::ApiError,
};

/// Verified members, in id order.
pub async fn list_donors<G: Gateway>(tx: &mut G) -> Result<DonorListResponse, ApiError> {
    let users = tx.list_verified_members().await?;
    Ok(DonorListResponse {
        message: "Donation users retrieved successfully",
        users: users.into_iter().map(DonorSummary::from).collect(),
    })
}

/// Removes the account with its profile and codes. Refused while donations
/// still reference it.
pub async fn delete_account<G: Gateway>(tx: &mut G, user_id: i64) -> Result<(), ApiError> {
    match tx.delete_user(user_id).await {
        Ok(()) => {
            info!(user_id, "account deleted");
            Ok(())
        }
        Err(StoreError::NotFound) => Err(ApiError::not_found("User not found")),
        Err(StoreError::Conflict(detail)) => {
            warn!(user_id, %detail, "account still referenced");
            Err(ApiError::conflict("Account has donations and cannot be deleted"))
        }
        Err(e) => Err(e.into()),
    }
}
