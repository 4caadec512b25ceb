use serde::Serialize;

use super::repo_types::User;

/// Entry of the donor picker.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DonorSummary {
    pub user_id: i64,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

impl From<User> for DonorSummary {
    fn from(u: User) -> Self {
        Self {
            user_id: u.id,
            phone_number: u.phone_number,
            email: u.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DonorListResponse {
    pub message: &'static str,
    pub users: Vec<DonorSummary>,
}
