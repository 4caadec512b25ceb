use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date};

use super::repo_types::{ProfilePatch, UserProfile};
use crate::{db::patch::non_empty, error::ApiError};

/// Profile fields as the client sends them; dates are `YYYY-MM-DD`.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileRequest {
    pub full_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub marital_status: Option<String>,
    pub wedding_anniversary: Option<String>,
    pub gender: Option<String>,
    pub profession: Option<String>,
}

fn parse_date(field: &str, raw: Option<String>) -> Result<Option<Date>, ApiError> {
    let Some(raw) = non_empty(raw) else {
        return Ok(None);
    };
    Date::parse(&raw, format_description!("[year]-[month]-[day]"))
        .map(Some)
        .map_err(|_| ApiError::bad_input(format!("Invalid {field}, expected YYYY-MM-DD")))
}

impl TryFrom<ProfileRequest> for ProfilePatch {
    type Error = ApiError;

    fn try_from(req: ProfileRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            full_name: non_empty(req.full_name),
            date_of_birth: parse_date("date_of_birth", req.date_of_birth)?,
            marital_status: non_empty(req.marital_status),
            wedding_anniversary: parse_date("wedding_anniversary", req.wedding_anniversary)?,
            gender: non_empty(req.gender),
            profession: non_empty(req.profession),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileCreatedResponse {
    pub message: &'static str,
    pub profile_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub message: &'static str,
    pub user_profile: UserProfile,
}
