use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::{
    dto::{
        CreateDonationRequest, DonationCreatedResponse, DonationListResponse,
        DonationTotalResponse, DonationUpdatedResponse, UpdateDonationRequest,
    },
    services,
};
use crate::{
    auth::{dto::MessageResponse, jwt::AuthUser},
    error::{ApiError, JsonBody},
    state::AppState,
};

pub fn donation_routes() -> Router<AppState> {
    Router::new()
        .route("/donation", post(create_donation).put(update_donation))
        .route("/donation/all", get(all_donations))
        .route("/donation/total", get(total_donations))
        // `:id` is the donor for GET and the donation for DELETE.
        .route("/donation/:id", get(donations_by_user).delete(delete_donation))
}

#[instrument(skip(state, payload))]
pub async fn create_donation(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    JsonBody(payload): JsonBody<CreateDonationRequest>,
) -> Result<Json<DonationCreatedResponse>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let out = state
        .transact(move |tx| Box::pin(services::create_donation(tx, caller, payload, now)))
        .await?;
    state.mailer.dispatch(out.mail);
    Ok(Json(out.value))
}

#[instrument(skip(state))]
pub async fn donations_by_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<DonationListResponse>, ApiError> {
    let donations = state
        .transact(move |tx| Box::pin(services::list_by_user(tx, user_id)))
        .await?;
    Ok(Json(DonationListResponse { donations }))
}

#[instrument(skip(state))]
pub async fn all_donations(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> Result<Json<DonationListResponse>, ApiError> {
    let donations = state
        .transact(|tx| Box::pin(services::list_all(tx)))
        .await?;
    Ok(Json(DonationListResponse { donations }))
}

#[instrument(skip(state))]
pub async fn total_donations(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> Result<Json<DonationTotalResponse>, ApiError> {
    let total = state.transact(|tx| Box::pin(services::total(tx))).await?;
    Ok(Json(DonationTotalResponse { total }))
}

#[instrument(skip(state, payload))]
pub async fn update_donation(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    JsonBody(payload): JsonBody<UpdateDonationRequest>,
) -> Result<Json<DonationUpdatedResponse>, ApiError> {
    let donation = state
        .transact(move |tx| Box::pin(services::update_donation(tx, payload)))
        .await?;
    Ok(Json(DonationUpdatedResponse {
        message: "Donation updated successfully",
        donation,
    }))
}

#[instrument(skip(state))]
pub async fn delete_donation(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(donation_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .transact(move |tx| Box::pin(services::delete_donation(tx, donation_id)))
        .await?;
    Ok(Json(MessageResponse {
        message: "Donation deleted successfully",
    }))
}
