use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

use crate::db::patch::{Column, PatchValue};

/// Optional 1:1 extension of a user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserProfile {
    pub id: i64,
    pub user_id: i64,
    pub full_name: Option<String>,
    pub date_of_birth: Option<Date>,
    pub marital_status: Option<String>,
    pub wedding_anniversary: Option<Date>,
    pub gender: Option<String>,
    pub profession: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileColumn {
    FullName,
    DateOfBirth,
    MaritalStatus,
    WeddingAnniversary,
    Gender,
    Profession,
}

impl Column for ProfileColumn {
    fn name(self) -> &'static str {
        match self {
            ProfileColumn::FullName => "full_name",
            ProfileColumn::DateOfBirth => "date_of_birth",
            ProfileColumn::MaritalStatus => "marital_status",
            ProfileColumn::WeddingAnniversary => "wedding_anniversary",
            ProfileColumn::Gender => "gender",
            ProfileColumn::Profession => "profession",
        }
    }
}

/// Supplied profile fields; `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub date_of_birth: Option<Date>,
    pub marital_status: Option<String>,
    pub wedding_anniversary: Option<Date>,
    pub gender: Option<String>,
    pub profession: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }

    pub fn assignments(&self) -> Vec<(ProfileColumn, PatchValue)> {
        let mut set = Vec::new();
        if let Some(v) = &self.full_name {
            set.push((ProfileColumn::FullName, PatchValue::Text(v.clone())));
        }
        if let Some(v) = self.date_of_birth {
            set.push((ProfileColumn::DateOfBirth, PatchValue::Date(v)));
        }
        if let Some(v) = &self.marital_status {
            set.push((ProfileColumn::MaritalStatus, PatchValue::Text(v.clone())));
        }
        if let Some(v) = self.wedding_anniversary {
            set.push((ProfileColumn::WeddingAnniversary, PatchValue::Date(v)));
        }
        if let Some(v) = &self.gender {
            set.push((ProfileColumn::Gender, PatchValue::Text(v.clone())));
        }
        if let Some(v) = &self.profession {
            set.push((ProfileColumn::Profession, PatchValue::Text(v.clone())));
        }
        set
    }
}
