//! Registration, verification, login and password reset.
//!
//! Every function runs against a transaction handle the envelope opened and
//! returns the mail to send once that transaction has committed.

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use super::{
    dto::{
        ForgotPasswordRequest, GenerateOtpRequest, LoginRequest, LoginResponse, MessageResponse,
        OtpSentResponse, RegisterRequest, ResetPasswordRequest, VerifyOtpRequest,
    },
    jwt::JwtKeys,
    password::{check_credentials, hash_password, CredentialError},
};
use crate::{
    db::{optional, patch::non_empty, Gateway, StoreError},
    error::ApiError,
    notify::{messages, Outcome},
    otp::services as otp,
    users::repo_types::{AccountType, NewUser, User},
};

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed, lower-cased and checked; blank means "not supplied".
pub(crate) fn normalize_email(raw: Option<String>) -> Result<Option<String>, ApiError> {
    match non_empty(raw).map(|e| e.to_lowercase()) {
        Some(email) if !is_valid_email(&email) => {
            warn!(%email, "invalid email");
            Err(ApiError::bad_input("Invalid email"))
        }
        other => Ok(other),
    }
}

fn check_password(plain: &str) -> Result<(), ApiError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::bad_input("Password must be at least 8 characters"));
    }
    Ok(())
}

fn hash(plain: &str) -> Result<String, ApiError> {
    hash_password(plain).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::internal("Error hashing password")
    })
}

fn user_not_found(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound => ApiError::not_found("User not found"),
        other => other.into(),
    }
}

/// Creates an unverified account, or re-issues a code to an unverified one
/// that already holds this phone number or email.
pub async fn register<G: Gateway>(
    tx: &mut G,
    req: RegisterRequest,
    now: OffsetDateTime,
) -> Result<Outcome<OtpSentResponse>, ApiError> {
    let phone = non_empty(req.phone_number)
        .ok_or_else(|| ApiError::bad_input("Phone number is required"))?;
    let email = normalize_email(req.email)?;
    let password = non_empty(req.password);
    if let Some(p) = &password {
        check_password(p)?;
    }

    let by_phone = optional(tx.find_user_by_phone(&phone).await)?;
    let by_email = match &email {
        Some(e) => optional(tx.find_user_by_email(e).await)?,
        None => None,
    };

    if by_phone.as_ref().is_some_and(|u| u.is_verified) {
        warn!(user_id = by_phone.as_ref().map(|u| u.id), "phone already verified");
        return Err(ApiError::conflict("Phone number already registered"));
    }
    if let Some(owner) = &by_email {
        let other_row = by_phone.as_ref().is_some_and(|u| u.id != owner.id);
        if owner.is_verified || other_row {
            warn!(user_id = owner.id, "email held by another account");
            return Err(ApiError::conflict("Email already registered"));
        }
    }

    let password_hash = password.as_deref().map(hash).transpose()?;

    let user = match by_phone.or(by_email) {
        Some(existing) => {
            if let Some(h) = &password_hash {
                tx.update_password(existing.id, h).await?;
            }
            if existing.phone_number.is_none() {
                tx.set_phone(existing.id, &phone).await?;
            }
            if let (None, Some(e)) = (&existing.email, &email) {
                tx.set_email(existing.id, e).await?;
            }
            info!(user_id = existing.id, "registration retried on unverified account");
            tx.find_user_by_id(existing.id).await?
        }
        None => {
            let user = tx
                .create_user(&NewUser {
                    phone_number: Some(phone),
                    email,
                    password_hash,
                    user_type: AccountType::Member,
                })
                .await?;
            info!(user_id = user.id, "user registered");
            user
        }
    };

    let code = otp::issue(tx, user.id, now).await?;
    Ok(Outcome::new(OtpSentResponse {
        message: "User registered successfully. A confirmation email has been sent.",
        user_id: user.id,
    })
    .with_mail(messages::verification_code(&user, &code.otp_code)))
}

pub async fn verify_registration<G: Gateway>(
    tx: &mut G,
    req: VerifyOtpRequest,
    now: OffsetDateTime,
) -> Result<Outcome<MessageResponse>, ApiError> {
    otp::validate(tx, req.user_id, &req.otp_code, now).await?;
    tx.mark_user_verified(req.user_id).await.map_err(user_not_found)?;
    let user = tx.find_user_by_id(req.user_id).await?;
    info!(user_id = user.id, "user verified");
    Ok(Outcome::new(MessageResponse {
        message: "User verified successfully. A confirmation email has been sent.",
    })
    .with_mail(messages::welcome(&user)))
}

/// Fresh code for an existing account; earlier codes stay valid.
pub async fn generate_otp<G: Gateway>(
    tx: &mut G,
    req: GenerateOtpRequest,
    now: OffsetDateTime,
) -> Result<Outcome<MessageResponse>, ApiError> {
    if req.user_id <= 0 {
        return Err(ApiError::bad_input("Invalid user id"));
    }
    let user = tx.find_user_by_id(req.user_id).await.map_err(user_not_found)?;
    let code = otp::issue(tx, user.id, now).await?;
    Ok(Outcome::new(MessageResponse {
        message: "A new OTP has been sent to your email.",
    })
    .with_mail(messages::verification_code(&user, &code.otp_code)))
}

pub async fn login<G: Gateway>(
    tx: &mut G,
    req: LoginRequest,
    keys: &JwtKeys,
) -> Result<LoginResponse, ApiError> {
    let phone = non_empty(req.phone_number);
    let email = non_empty(req.email).map(|e| e.to_lowercase());
    if phone.is_none() && email.is_none() {
        return Err(ApiError::bad_input("Either phone number or email is required"));
    }
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_input("Password is required"))?;

    let found = match (phone, email) {
        (Some(p), _) => tx.find_user_by_phone(&p).await,
        (None, Some(e)) => tx.find_user_by_email(&e).await,
        (None, None) => return Err(ApiError::bad_input("Either phone number or email is required")),
    };
    let user: User = match found {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            warn!("login for unknown account");
            return Err(ApiError::unauthorized("Invalid credentials"));
        }
        Err(e) => return Err(e.into()),
    };

    if !user.is_verified {
        warn!(user_id = user.id, "login before verification");
        return Err(ApiError::unauthorized(
            "Account not verified. Please complete the registration process",
        ));
    }

    match check_credentials(&password, user.password_hash.as_deref()) {
        Ok(()) => {}
        Err(CredentialError::Mismatch) => {
            warn!(user_id = user.id, "login invalid password");
            return Err(ApiError::unauthorized("Invalid credentials"));
        }
        Err(e) => {
            error!(error = %e, user_id = user.id, "password check failed");
            return Err(ApiError::internal("Internal server error"));
        }
    }

    let profile_exists = optional(tx.find_profile_by_user(user.id).await)?.is_some();
    let token = keys.sign(user.id).map_err(|e| {
        error!(error = %e, user_id = user.id, "jwt sign failed");
        ApiError::internal("Error generating authentication token")
    })?;

    info!(user_id = user.id, "user logged in");
    Ok(LoginResponse {
        message: "Login successful",
        user_id: user.id,
        token,
        user_type: user.user_type,
        profile_exists,
    })
}

pub async fn forgot_password<G: Gateway>(
    tx: &mut G,
    req: ForgotPasswordRequest,
    now: OffsetDateTime,
) -> Result<Outcome<OtpSentResponse>, ApiError> {
    let email = normalize_email(req.email)?;
    let phone = non_empty(req.phone_number);
    let found = match (&email, &phone) {
        (Some(e), _) => tx.find_user_by_email(e).await,
        (None, Some(p)) => tx.find_user_by_phone(p).await,
        (None, None) => {
            return Err(ApiError::bad_input("Either email or phone number is required"))
        }
    };
    let user = found.map_err(user_not_found)?;
    let code = otp::issue(tx, user.id, now).await?;
    info!(user_id = user.id, "password reset requested");
    Ok(Outcome::new(OtpSentResponse {
        message: "OTP sent for password reset.",
        user_id: user.id,
    })
    .with_mail(messages::password_reset_code(&user, &code.otp_code)))
}

/// The code is consumed only after the new hash is stored, so a failed
/// update leaves it usable for a retry.
pub async fn reset_password<G: Gateway>(
    tx: &mut G,
    req: ResetPasswordRequest,
    now: OffsetDateTime,
) -> Result<MessageResponse, ApiError> {
    check_password(&req.new_password)?;
    let record = otp::check(tx, req.user_id, &req.otp_code, now).await?;
    let password_hash = hash(&req.new_password)?;
    tx.update_password(req.user_id, &password_hash)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = req.user_id, "update_password failed");
            ApiError::internal("Error updating password")
        })?;
    otp::consume(tx, &record).await?;
    info!(user_id = req.user_id, "password reset");
    Ok(MessageResponse {
        message: "Password reset successful.",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::JwtConfig,
        db::{
            memory::{FailPoint, MemoryStore},
            Database, Transaction,
        },
        otp::repo::OtpRepo,
        profiles::{repo::ProfileRepo, repo_types::ProfilePatch},
        users::repo::UserRepo,
    };
    use time::{macros::datetime, Duration};

    const T0: OffsetDateTime = datetime!(2024-06-01 10:00 UTC);

    fn keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "church-backend".into(),
            audience: "church-members".into(),
            ttl_minutes: 60,
        })
    }

    fn registration(phone: &str, email: Option<&str>, password: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            phone_number: Some(phone.into()),
            email: email.map(str::to_string),
            password: password.map(str::to_string),
        }
    }

    fn by_phone(phone: &str, password: &str) -> LoginRequest {
        LoginRequest {
            phone_number: Some(phone.into()),
            email: None,
            password: Some(password.into()),
        }
    }

    /// Latest unused code issued to `user_id` in committed state.
    fn latest_code(store: &MemoryStore, user_id: i64) -> String {
        store
            .snapshot()
            .otps
            .into_iter()
            .filter(|o| o.user_id == user_id && !o.is_used)
            .max_by_key(|o| o.id)
            .expect("an issued code")
            .otp_code
    }

    async fn registered(store: &MemoryStore, req: RegisterRequest) -> Outcome<OtpSentResponse> {
        let mut tx = store.begin().await.unwrap();
        let out = register(&mut tx, req, T0).await.unwrap();
        tx.commit().await.unwrap();
        out
    }

    async fn verified_member(store: &MemoryStore) -> i64 {
        let out = registered(store, registration("9998887776", Some("a@x.com"), Some("Secret1!"))).await;
        let user_id = out.value.user_id;
        let code = latest_code(store, user_id);
        let mut tx = store.begin().await.unwrap();
        verify_registration(&mut tx, VerifyOtpRequest { user_id, otp_code: code }, T0)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        user_id
    }

    #[tokio::test]
    async fn register_then_verify() {
        let store = MemoryStore::default();
        let out = registered(
            &store,
            registration(" 9998887776 ", Some(" A@X.com "), Some("Secret1!")),
        )
        .await;
        let user_id = out.value.user_id;

        let user = store.snapshot().users.into_iter().find(|u| u.id == user_id).unwrap();
        assert!(!user.is_verified);
        assert_eq!(user.phone_number.as_deref(), Some("9998887776"));
        assert_eq!(user.email.as_deref(), Some("a@x.com"));
        assert!(user.password_hash.as_deref().unwrap().starts_with("$argon2"));

        let code = latest_code(&store, user_id);
        assert_eq!(out.mail.len(), 1);
        assert_eq!(out.mail[0].to.as_deref(), Some("a@x.com"));
        assert!(out.mail[0].body.contains(&code));

        let mut tx = store.begin().await.unwrap();
        let done = verify_registration(
            &mut tx,
            VerifyOtpRequest { user_id, otp_code: code },
            T0 + Duration::minutes(2),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(done.mail[0].subject, "Welcome to the Church App");
        assert_eq!(done.mail[0].to.as_deref(), Some("a@x.com"));
        let user = store.snapshot().users.into_iter().find(|u| u.id == user_id).unwrap();
        assert!(user.is_verified);
    }

    #[tokio::test]
    async fn verify_with_expired_or_wrong_code_is_unauthorized() {
        let store = MemoryStore::default();
        let user_id = registered(&store, registration("9998887776", None, None)).await.value.user_id;
        let code = latest_code(&store, user_id);

        let mut tx = store.begin().await.unwrap();
        let late = verify_registration(
            &mut tx,
            VerifyOtpRequest { user_id, otp_code: code },
            T0 + Duration::minutes(5),
        )
        .await;
        assert!(matches!(late, Err(ApiError::Unauthorized(ref m)) if m == "Invalid or expired OTP"));

        let wrong = verify_registration(
            &mut tx,
            VerifyOtpRequest { user_id, otp_code: "not-it".into() },
            T0,
        )
        .await;
        assert!(matches!(wrong, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn register_against_verified_phone_conflicts() {
        let store = MemoryStore::default();
        verified_member(&store).await;

        let mut tx = store.begin().await.unwrap();
        let err = register(&mut tx, registration("9998887776", None, Some("Another1!")), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        tx.rollback().await.unwrap();
        assert_eq!(store.snapshot().users.len(), 1);
    }

    #[tokio::test]
    async fn register_against_verified_email_conflicts() {
        let store = MemoryStore::default();
        verified_member(&store).await;

        let mut tx = store.begin().await.unwrap();
        let err = register(&mut tx, registration("1112223334", Some("a@x.com"), None), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "Email already registered"));
    }

    #[tokio::test]
    async fn register_again_reuses_unverified_account() {
        let store = MemoryStore::default();
        let first = registered(&store, registration("9998887776", None, Some("Secret1!"))).await;
        let second = registered(
            &store,
            registration("9998887776", Some("late@x.com"), Some("Changed1!")),
        )
        .await;

        assert_eq!(first.value.user_id, second.value.user_id);
        let snap = store.snapshot();
        assert_eq!(snap.users.len(), 1);
        assert_eq!(snap.users[0].email.as_deref(), Some("late@x.com"));
        assert_eq!(snap.otps.iter().filter(|o| o.user_id == first.value.user_id).count(), 2);
        assert_eq!(second.mail[0].to.as_deref(), Some("late@x.com"));
    }

    #[tokio::test]
    async fn register_reuses_unverified_email_owner() {
        let store = MemoryStore::default();
        store.seed_user(1, None, Some("a@x.com"), false);

        let out = registered(
            &store,
            registration("9998887776", Some("A@x.com"), Some("Secret1!")),
        )
        .await;

        assert_eq!(out.value.user_id, 1);
        let snap = store.snapshot();
        assert_eq!(snap.users.len(), 1);
        assert_eq!(snap.users[0].phone_number.as_deref(), Some("9998887776"));
        assert!(snap.users[0].password_hash.as_deref().unwrap().starts_with("$argon2"));
        assert_eq!(snap.otps.iter().filter(|o| o.user_id == 1).count(), 1);
        assert_eq!(out.mail[0].to.as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn register_keeps_existing_phone_of_email_owner() {
        let store = MemoryStore::default();
        store.seed_user(1, Some("5556667778"), Some("a@x.com"), false);

        let out = registered(&store, registration("9998887776", Some("a@x.com"), None)).await;

        assert_eq!(out.value.user_id, 1);
        let snap = store.snapshot();
        assert_eq!(snap.users.len(), 1);
        assert_eq!(snap.users[0].phone_number.as_deref(), Some("5556667778"));
    }

    #[tokio::test]
    async fn register_with_phone_and_email_of_different_accounts_conflicts() {
        let store = MemoryStore::default();
        store.seed_user(1, Some("9998887776"), None, false);
        store.seed_user(2, None, Some("a@x.com"), false);

        let mut tx = store.begin().await.unwrap();
        let err = register(&mut tx, registration("9998887776", Some("a@x.com"), None), T0)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "Email already registered"));
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let store = MemoryStore::default();
        let mut tx = store.begin().await.unwrap();

        let no_phone = RegisterRequest { phone_number: Some("  ".into()), email: None, password: None };
        assert!(matches!(register(&mut tx, no_phone, T0).await, Err(ApiError::BadInput(_))));

        let bad_email = registration("9998887776", Some("not-an-email"), None);
        assert!(matches!(register(&mut tx, bad_email, T0).await, Err(ApiError::BadInput(_))));

        let short = registration("9998887776", None, Some("short"));
        assert!(matches!(register(&mut tx, short, T0).await, Err(ApiError::BadInput(_))));
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_invalid_credentials() {
        let store = MemoryStore::default();
        verified_member(&store).await;

        let mut tx = store.begin().await.unwrap();
        let err = login(&mut tx, by_phone("9998887776", "wrong"), &keys()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Invalid credentials"));

        let err = login(&mut tx, by_phone("0000000000", "Secret1!"), &keys()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Invalid credentials"));
    }

    #[tokio::test]
    async fn login_before_verification_is_refused() {
        let store = MemoryStore::default();
        registered(&store, registration("9998887776", None, Some("Secret1!"))).await;

        let mut tx = store.begin().await.unwrap();
        let err = login(&mut tx, by_phone("9998887776", "Secret1!"), &keys()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m.starts_with("Account not verified")));
    }

    #[tokio::test]
    async fn login_issues_token_and_reports_profile() {
        let store = MemoryStore::default();
        let user_id = verified_member(&store).await;
        let keys = keys();

        let mut tx = store.begin().await.unwrap();
        let res = login(
            &mut tx,
            LoginRequest { phone_number: None, email: Some("A@x.com".into()), password: Some("Secret1!".into()) },
            &keys,
        )
        .await
        .unwrap();
        assert_eq!(res.user_id, user_id);
        assert_eq!(res.user_type, AccountType::Member);
        assert!(!res.profile_exists);
        assert_eq!(keys.verify(&res.token).unwrap().sub, user_id);

        tx.create_profile(user_id, &ProfilePatch::default()).await.unwrap();
        let res = login(&mut tx, by_phone("9998887776", "Secret1!"), &keys).await.unwrap();
        assert!(res.profile_exists);
    }

    #[tokio::test]
    async fn login_requires_identifier_and_password() {
        let store = MemoryStore::default();
        let mut tx = store.begin().await.unwrap();
        let none = LoginRequest { phone_number: None, email: None, password: Some("x".into()) };
        assert!(matches!(login(&mut tx, none, &keys()).await, Err(ApiError::BadInput(_))));
        let no_pw = LoginRequest { phone_number: Some("1".into()), email: None, password: None };
        assert!(matches!(login(&mut tx, no_pw, &keys()).await, Err(ApiError::BadInput(_))));
    }

    #[tokio::test]
    async fn generate_otp_for_unknown_user_is_not_found() {
        let store = MemoryStore::default();
        let mut tx = store.begin().await.unwrap();
        let err = generate_otp(&mut tx, GenerateOtpRequest { user_id: 77 }, T0).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "User not found"));
    }

    #[tokio::test]
    async fn forgot_then_reset_password() {
        let store = MemoryStore::default();
        let user_id = verified_member(&store).await;

        let mut tx = store.begin().await.unwrap();
        let out = forgot_password(
            &mut tx,
            ForgotPasswordRequest { email: Some("a@x.com".into()), phone_number: None },
            T0,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(out.value.user_id, user_id);
        assert_eq!(out.mail[0].subject, "Password Reset OTP");

        let code = latest_code(&store, user_id);
        let mut tx = store.begin().await.unwrap();
        reset_password(
            &mut tx,
            ResetPasswordRequest { user_id, otp_code: code.clone(), new_password: "NewSecret1!".into() },
            T0 + Duration::minutes(1),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        login(&mut tx, by_phone("9998887776", "NewSecret1!"), &keys()).await.unwrap();
        let reuse = reset_password(
            &mut tx,
            ResetPasswordRequest { user_id, otp_code: code, new_password: "Other123!".into() },
            T0 + Duration::minutes(2),
        )
        .await;
        assert!(matches!(reuse, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn failed_password_update_leaves_code_unused() {
        let store = MemoryStore::default();
        store.seed_user(1, Some("9998887776"), Some("a@x.com"), true);
        let mut tx = store.begin().await.unwrap();
        tx.insert_otp(1, "123456", T0, T0 + otp::OTP_TTL).await.unwrap();
        tx.commit().await.unwrap();

        store.fail_at(FailPoint::UpdatePassword);
        let mut tx = store.begin().await.unwrap();
        let err = reset_password(
            &mut tx,
            ResetPasswordRequest { user_id: 1, otp_code: "123456".into(), new_password: "NewSecret1!".into() },
            T0,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Internal(ref m) if m == "Error updating password"));

        let still_valid = otp::check(&mut tx, 1, "123456", T0).await.unwrap();
        assert!(!still_valid.is_used);
        assert!(tx.find_user_by_id(1).await.unwrap().password_hash.is_none());
    }

    #[tokio::test]
    async fn forgot_password_needs_a_known_identity() {
        let store = MemoryStore::default();
        let mut tx = store.begin().await.unwrap();
        let none = ForgotPasswordRequest { email: None, phone_number: None };
        assert!(matches!(forgot_password(&mut tx, none, T0).await, Err(ApiError::BadInput(_))));
        let unknown = ForgotPasswordRequest { email: None, phone_number: Some("123".into()) };
        assert!(matches!(forgot_password(&mut tx, unknown, T0).await, Err(ApiError::NotFound(_))));
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a b@x.com"));
    }
}
