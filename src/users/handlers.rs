use axum::{
    extract::State,
    routing::{delete, get},
    Json, Router,
};
use tracing::instrument;

use super::{dto::DonorListResponse, services};
use crate::{
    auth::{dto::MessageResponse, jwt::AuthUser},
    error::ApiError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/donation-user-list", get(donation_user_list))
        .route("/account", delete(delete_account))
}

#[instrument(skip(state))]
pub async fn donation_user_list(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> Result<Json<DonorListResponse>, ApiError> {
    let res = state
        .transact(|tx| Box::pin(services::list_donors(tx)))
        .await?;
    Ok(Json(res))
}

#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .transact(move |tx| Box::pin(services::delete_account(tx, user_id)))
        .await?;
    Ok(Json(MessageResponse {
        message: "Account deleted successfully",
    }))
}
