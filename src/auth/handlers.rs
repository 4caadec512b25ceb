use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::{
    dto::{
        ForgotPasswordRequest, GenerateOtpRequest, LoginRequest, LoginResponse, MessageResponse,
        OtpSentResponse, RegisterRequest, ResetPasswordRequest, VerifyOtpRequest,
    },
    jwt::JwtKeys,
    services,
};
use crate::{
    error::{ApiError, JsonBody},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/register/verify/otp", post(verify_otp))
        .route("/otp/generate", post(generate_otp))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<Json<OtpSentResponse>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let out = state
        .transact(move |tx| Box::pin(services::register(tx, payload, now)))
        .await?;
    state.mailer.dispatch(out.mail);
    Ok(Json(out.value))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<VerifyOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let out = state
        .transact(move |tx| Box::pin(services::verify_registration(tx, payload, now)))
        .await?;
    state.mailer.dispatch(out.mail);
    Ok(Json(out.value))
}

#[instrument(skip(state, payload))]
pub async fn generate_otp(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<GenerateOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let out = state
        .transact(move |tx| Box::pin(services::generate_otp(tx, payload, now)))
        .await?;
    state.mailer.dispatch(out.mail);
    Ok(Json(out.value))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let res = state
        .transact(move |tx| Box::pin(async move { services::login(tx, payload, &keys).await }))
        .await?;
    Ok(Json(res))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<OtpSentResponse>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let out = state
        .transact(move |tx| Box::pin(services::forgot_password(tx, payload, now)))
        .await?;
    state.mailer.dispatch(out.mail);
    Ok(Json(out.value))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let res = state
        .transact(move |tx| Box::pin(services::reset_password(tx, payload, now)))
        .await?;
    Ok(Json(res))
}
