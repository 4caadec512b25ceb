//! In-memory gateway for tests.
//!
//! `begin` clones the committed tables into a working copy; `commit` swaps the
//! copy back in, `rollback` drops it. Constraints the schema enforces (unique
//! phone/email, one profile per user, foreign keys) are enforced here too.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use super::{Database, StoreError, Transaction};
use crate::{
    donations::{
        repo::DonationRepo,
        repo_types::{Donation, DonationPatch, NewDonation},
    },
    otp::{repo::OtpRepo, repo_types::OtpRecord},
    profiles::{
        repo::ProfileRepo,
        repo_types::{ProfilePatch, UserProfile},
    },
    users::{
        repo::UserRepo,
        repo_types::{AccountType, NewUser, User},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    Commit,
    Rollback,
    UpdatePassword,
}

#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub users: Vec<User>,
    pub profiles: Vec<UserProfile>,
    pub donations: Vec<Donation>,
    pub otps: Vec<OtpRecord>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user_mut(&mut self, id: i64) -> Result<&mut User, StoreError> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)
    }

    fn user_exists(&self, id: i64) -> bool {
        self.users.iter().any(|u| u.id == id)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail: Arc<Mutex<HashSet<FailPoint>>>,
    open: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn snapshot(&self) -> Tables {
        self.tables.lock().unwrap().clone()
    }

    pub fn fail_at(&self, point: FailPoint) {
        self.fail.lock().unwrap().insert(point);
    }

    /// Transactions begun but neither committed nor rolled back.
    pub fn open_transactions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn seed_user(&self, id: i64, phone: Option<&str>, email: Option<&str>, verified: bool) {
        let now = OffsetDateTime::now_utc();
        let mut tables = self.tables.lock().unwrap();
        tables.next_id = tables.next_id.max(id);
        tables.users.push(User {
            id,
            phone_number: phone.map(str::to_string),
            email: email.map(str::to_string),
            password_hash: None,
            is_verified: verified,
            user_type: AccountType::Member,
            created_at: now,
            updated_at: now,
        });
    }

    fn failing(&self, point: FailPoint) -> bool {
        self.fail.lock().unwrap().contains(&point)
    }
}

fn injected() -> StoreError {
    StoreError::Database(sqlx::Error::Protocol("injected failure".into()))
}

pub struct MemoryTx {
    store: MemoryStore,
    work: Tables,
}

#[async_trait]
impl Database for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        if self.failing(FailPoint::Begin) {
            return Err(injected());
        }
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryTx {
            store: self.clone(),
            work: self.snapshot(),
        })
    }
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn commit(self) -> Result<(), StoreError> {
        self.store.open.fetch_sub(1, Ordering::SeqCst);
        if self.store.failing(FailPoint::Commit) {
            return Err(injected());
        }
        *self.store.tables.lock().unwrap() = self.work;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.store.open.fetch_sub(1, Ordering::SeqCst);
        if self.store.failing(FailPoint::Rollback) {
            return Err(injected());
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepo for MemoryTx {
    async fn create_user(&mut self, user: &NewUser) -> Result<User, StoreError> {
        let t = &mut self.work;
        let taken = t.users.iter().any(|u| {
            (user.phone_number.is_some() && u.phone_number == user.phone_number)
                || (user.email.is_some() && u.email == user.email)
        });
        if taken {
            return Err(StoreError::Conflict("users unique identity".into()));
        }
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: t.next_id(),
            phone_number: user.phone_number.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            is_verified: false,
            user_type: user.user_type,
            created_at: now,
            updated_at: now,
        };
        t.users.push(row.clone());
        Ok(row)
    }

    async fn find_user_by_id(&mut self, id: i64) -> Result<User, StoreError> {
        self.work.user_mut(id).map(|u| u.clone())
    }

    async fn find_user_by_phone(&mut self, phone_number: &str) -> Result<User, StoreError> {
        self.work
            .users
            .iter()
            .find(|u| u.phone_number.as_deref() == Some(phone_number))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<User, StoreError> {
        self.work
            .users
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn mark_user_verified(&mut self, id: i64) -> Result<(), StoreError> {
        let user = self.work.user_mut(id)?;
        user.is_verified = true;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn update_password(&mut self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        if self.store.failing(FailPoint::UpdatePassword) {
            return Err(injected());
        }
        let user = self.work.user_mut(id)?;
        user.password_hash = Some(password_hash.to_string());
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn set_email(&mut self, id: i64, email: &str) -> Result<(), StoreError> {
        if self
            .work
            .users
            .iter()
            .any(|u| u.id != id && u.email.as_deref() == Some(email))
        {
            return Err(StoreError::Conflict("users_email_key".into()));
        }
        let user = self.work.user_mut(id)?;
        user.email = Some(email.to_string());
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn set_phone(&mut self, id: i64, phone_number: &str) -> Result<(), StoreError> {
        if self
            .work
            .users
            .iter()
            .any(|u| u.id != id && u.phone_number.as_deref() == Some(phone_number))
        {
            return Err(StoreError::Conflict("users_phone_number_key".into()));
        }
        let user = self.work.user_mut(id)?;
        user.phone_number = Some(phone_number.to_string());
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn list_verified_members(&mut self) -> Result<Vec<User>, StoreError> {
        let mut rows: Vec<User> = self
            .work
            .users
            .iter()
            .filter(|u| u.is_verified && u.user_type == AccountType::Member)
            .cloned()
            .collect();
        rows.sort_by_key(|u| u.id);
        Ok(rows)
    }

    async fn delete_user(&mut self, id: i64) -> Result<(), StoreError> {
        let t = &mut self.work;
        if !t.user_exists(id) {
            return Err(StoreError::NotFound);
        }
        if t.donations.iter().any(|d| d.user_id == id) {
            return Err(StoreError::Conflict("donations_user_id_fkey".into()));
        }
        t.users.retain(|u| u.id != id);
        t.profiles.retain(|p| p.user_id != id);
        t.otps.retain(|o| o.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl ProfileRepo for MemoryTx {
    async fn create_profile(
        &mut self,
        user_id: i64,
        fields: &ProfilePatch,
    ) -> Result<UserProfile, StoreError> {
        let t = &mut self.work;
        if !t.user_exists(user_id) || t.profiles.iter().any(|p| p.user_id == user_id) {
            return Err(StoreError::Conflict("user_profile_user_id".into()));
        }
        let now = OffsetDateTime::now_utc();
        let row = UserProfile {
            id: t.next_id(),
            user_id,
            full_name: fields.full_name.clone(),
            date_of_birth: fields.date_of_birth,
            marital_status: fields.marital_status.clone(),
            wedding_anniversary: fields.wedding_anniversary,
            gender: fields.gender.clone(),
            profession: fields.profession.clone(),
            created_at: now,
            updated_at: now,
        };
        t.profiles.push(row.clone());
        Ok(row)
    }

    async fn find_profile_by_user(&mut self, user_id: i64) -> Result<UserProfile, StoreError> {
        self.work
            .profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_profile(
        &mut self,
        user_id: i64,
        patch: &ProfilePatch,
    ) -> Result<UserProfile, StoreError> {
        let profile = self
            .work
            .profiles
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        if let Some(v) = &patch.full_name {
            profile.full_name = Some(v.clone());
        }
        if let Some(v) = patch.date_of_birth {
            profile.date_of_birth = Some(v);
        }
        if let Some(v) = &patch.marital_status {
            profile.marital_status = Some(v.clone());
        }
        if let Some(v) = patch.wedding_anniversary {
            profile.wedding_anniversary = Some(v);
        }
        if let Some(v) = &patch.gender {
            profile.gender = Some(v.clone());
        }
        if let Some(v) = &patch.profession {
            profile.profession = Some(v.clone());
        }
        profile.updated_at = OffsetDateTime::now_utc();
        Ok(profile.clone())
    }

    async fn delete_profile(&mut self, user_id: i64) -> Result<(), StoreError> {
        let before = self.work.profiles.len();
        self.work.profiles.retain(|p| p.user_id != user_id);
        if self.work.profiles.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl DonationRepo for MemoryTx {
    async fn create_donation(&mut self, donation: &NewDonation) -> Result<Donation, StoreError> {
        let t = &mut self.work;
        if !t.user_exists(donation.user_id) {
            return Err(StoreError::Conflict("donations_user_id_fkey".into()));
        }
        let now = OffsetDateTime::now_utc();
        let row = Donation {
            id: t.next_id(),
            user_id: donation.user_id,
            amount: donation.amount,
            purpose: donation.purpose.clone(),
            donated_at: donation.donated_at,
            created_at: now,
            updated_at: now,
        };
        t.donations.push(row.clone());
        Ok(row)
    }

    async fn find_donation(&mut self, id: i64) -> Result<Donation, StoreError> {
        self.work
            .donations
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_donations_by_user(&mut self, user_id: i64) -> Result<Vec<Donation>, StoreError> {
        let mut rows: Vec<Donation> = self
            .work
            .donations
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|d| d.id);
        Ok(rows)
    }

    async fn list_donations(&mut self) -> Result<Vec<Donation>, StoreError> {
        let mut rows = self.work.donations.clone();
        rows.sort_by_key(|d| d.id);
        Ok(rows)
    }

    async fn total_donations(&mut self) -> Result<Decimal, StoreError> {
        Ok(self.work.donations.iter().map(|d| d.amount).sum())
    }

    async fn update_donation(
        &mut self,
        id: i64,
        patch: &DonationPatch,
    ) -> Result<Donation, StoreError> {
        if let Some(user_id) = patch.user_id {
            if !self.work.user_exists(user_id) {
                return Err(StoreError::Conflict("donations_user_id_fkey".into()));
            }
        }
        let donation = self
            .work
            .donations
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(v) = patch.user_id {
            donation.user_id = v;
        }
        if let Some(v) = patch.amount {
            donation.amount = v;
        }
        if let Some(v) = &patch.purpose {
            donation.purpose = v.clone();
        }
        donation.updated_at = OffsetDateTime::now_utc();
        Ok(donation.clone())
    }

    async fn delete_donation(&mut self, id: i64) -> Result<(), StoreError> {
        let before = self.work.donations.len();
        self.work.donations.retain(|d| d.id != id);
        if self.work.donations.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl OtpRepo for MemoryTx {
    async fn insert_otp(
        &mut self,
        user_id: i64,
        code: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<OtpRecord, StoreError> {
        let t = &mut self.work;
        if !t.user_exists(user_id) {
            return Err(StoreError::Conflict("otp_verification_user_id_fkey".into()));
        }
        let row = OtpRecord {
            id: t.next_id(),
            user_id,
            otp_code: code.to_string(),
            created_at,
            expires_at,
            is_used: false,
        };
        t.otps.push(row.clone());
        Ok(row)
    }

    async fn find_unused_otp(
        &mut self,
        user_id: i64,
        code: &str,
    ) -> Result<OtpRecord, StoreError> {
        self.work
            .otps
            .iter()
            .filter(|o| o.user_id == user_id && o.otp_code == code && !o.is_used)
            .max_by_key(|o| o.expires_at)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn mark_otp_used(&mut self, otp_id: i64) -> Result<(), StoreError> {
        let otp = self
            .work
            .otps
            .iter_mut()
            .find(|o| o.id == otp_id && !o.is_used)
            .ok_or(StoreError::NotFound)?;
        otp.is_used = true;
        Ok(())
    }

    async fn delete_expired_otps(&mut self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let before = self.work.otps.len();
        self.work.otps.retain(|o| o.expires_at > now);
        Ok((before - self.work.otps.len()) as u64)
    }
}
