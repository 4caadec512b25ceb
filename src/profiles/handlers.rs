use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{ProfileCreatedResponse, ProfileRequest, ProfileResponse},
    repo_types::ProfilePatch,
    services,
};
use crate::{
    auth::{dto::MessageResponse, jwt::AuthUser},
    error::{ApiError, JsonBody},
    state::AppState,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/user-profile",
            post(create_profile).put(update_profile).delete(delete_profile),
        )
        .route("/user-profile/:user_id", get(get_profile))
}

#[instrument(skip(state, payload))]
pub async fn create_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<ProfileRequest>,
) -> Result<Json<ProfileCreatedResponse>, ApiError> {
    let fields = ProfilePatch::try_from(payload)?;
    let profile = state
        .transact(move |tx| Box::pin(services::create_profile(tx, user_id, fields)))
        .await?;
    Ok(Json(ProfileCreatedResponse {
        message: "User Profile added successfully",
        profile_id: profile.id,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<ProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let patch = ProfilePatch::try_from(payload)?;
    let profile = state
        .transact(move |tx| Box::pin(services::update_profile(tx, user_id, patch)))
        .await?;
    Ok(Json(ProfileResponse {
        message: "User Profile updated successfully",
        user_profile: profile,
    }))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state
        .transact(move |tx| Box::pin(services::get_profile(tx, user_id)))
        .await?;
    Ok(Json(ProfileResponse {
        message: "User Profile retrieved successfully",
        user_profile: profile,
    }))
}

#[instrument(skip(state))]
pub async fn delete_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .transact(move |tx| Box::pin(services::delete_profile(tx, user_id)))
        .await?;
    Ok(Json(MessageResponse {
        message: "User Profile deleted successfully",
    }))
}
