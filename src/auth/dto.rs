use serde::{Deserialize, Serialize};

use crate::users::repo_types::AccountType;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Reply of every flow that just issued a code.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct OtpSentResponse {
    pub message: &'static str,
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub user_id: i64,
    pub otp_code: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateOtpRequest {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user_id: i64,
    pub token: String,
    pub user_type: AccountType,
    pub profile_exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub user_id: i64,
    pub otp_code: String,
    pub new_password: String,
}

/// Plain `{"message": ...}` body.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: &'static str,
}
