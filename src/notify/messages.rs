use rust_decimal::Decimal;
use time::{macros::format_description, OffsetDateTime};

use super::Email;
use crate::users::repo_types::User;

fn to_user(user: &User, subject: &str, body: String) -> Email {
    Email {
        user_id: user.id,
        to: user.email.clone(),
        subject: subject.to_string(),
        body,
    }
}

pub fn verification_code(user: &User, code: &str) -> Email {
    to_user(
        user,
        "OTP Verification",
        format!("Your OTP Verification Code: {code}\n\nThe code expires in 5 minutes."),
    )
}

pub fn password_reset_code(user: &User, code: &str) -> Email {
    to_user(
        user,
        "Password Reset OTP",
        format!("Your OTP code is {code}\n\nThe code expires in 5 minutes."),
    )
}

pub fn welcome(user: &User) -> Email {
    to_user(
        user,
        "Welcome to the Church App",
        "Dear User, You have successfully registered to our church application".to_string(),
    )
}

pub fn donation_thanks(
    user: &User,
    full_name: Option<&str>,
    amount: Decimal,
    purpose: &str,
    donated_at: OffsetDateTime,
) -> Email {
    let name = full_name.filter(|n| !n.trim().is_empty()).unwrap_or("Friend");
    let amount = amount.round_dp(2);
    let date = donated_at
        .format(format_description!("[month repr:long] [day padding:none], [year]"))
        .unwrap_or_else(|_| donated_at.date().to_string());
    let body = format!(
        "Dear {name},\n\n\
         We are incredibly grateful for your recent donation of \u{20b9}{amount:.2} towards {purpose}. \
         Your generosity makes a meaningful difference in our mission.\n\n\
         Donation Details:\n\
         - Amount: \u{20b9}{amount:.2}\n\
         - Purpose: {purpose}\n\
         - Date: {date}\n\n\
         Thank you for being a valued part of our community.\n\n\
         Warm regards,\n\
         Church\n"
    );
    to_user(user, "Thank You for Your Donation", body)
}
