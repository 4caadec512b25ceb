use tracing::{info, warn};

use super::repo_types::{ProfilePatch, UserProfile};
use crate::{
    db::{optional, Gateway, StoreError},
    error::ApiError,
};

fn profile_not_found(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound => ApiError::not_found("Profile not found"),
        other => other.into(),
    }
}

/// One profile per user; a second create is a conflict.
pub async fn create_profile<G: Gateway>(
    tx: &mut G,
    user_id: i64,
    fields: ProfilePatch,
) -> Result<UserProfile, ApiError> {
    if optional(tx.find_user_by_id(user_id).await)?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    if optional(tx.find_profile_by_user(user_id).await)?.is_some() {
        warn!(user_id, "profile already exists");
        return Err(ApiError::conflict("Profile already exists"));
    }
    let profile = tx.create_profile(user_id, &fields).await?;
    info!(user_id, profile_id = profile.id, "profile created");
    Ok(profile)
}

/// Overwrites only the supplied fields.
pub async fn update_profile<G: Gateway>(
    tx: &mut G,
    user_id: i64,
    patch: ProfilePatch,
) -> Result<UserProfile, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::bad_input("No fields to update"));
    }
    let profile = tx
        .update_profile(user_id, &patch)
        .await
        .map_err(profile_not_found)?;
    info!(user_id, fields = patch.assignments().len(), "profile updated");
    Ok(profile)
}

pub async fn get_profile<G: Gateway>(tx: &mut G, user_id: i64) -> Result<UserProfile, ApiError> {
    if user_id <= 0 {
        return Err(ApiError::bad_input("Invalid user id"));
    }
    tx.find_profile_by_user(user_id).await.map_err(profile_not_found)
}

pub async fn delete_profile<G: Gateway>(tx: &mut G, user_id: i64) -> Result<(), ApiError> {
    tx.delete_profile(user_id).await.map_err(profile_not_found)?;
    info!(user_id, "profile deleted");
    Ok(())
}
