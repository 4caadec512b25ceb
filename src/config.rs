use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Outbound mail relay. Absent when `SMTP_HOST` is not set.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub smtp: Option<SmtpConfig>,
    pub tx_timeout_secs: u64,
    pub mail_timeout_secs: u64,
    pub otp_sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "church-backend".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "church-members".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
        };

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host,
                port: env_parse("SMTP_PORT", 587),
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                from: std::env::var("SMTP_FROM")
                    .or_else(|_| std::env::var("SMTP_USERNAME"))
                    .context("SMTP_FROM or SMTP_USERNAME must be set when SMTP_HOST is")?,
            }),
            _ => None,
        };

        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_parse("APP_PORT", 8080);
        let listen_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .with_context(|| format!("APP_HOST {host:?} is not an IP address"))?;

        Ok(Self {
            listen_addr,
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            smtp,
            tx_timeout_secs: env_parse("TX_TIMEOUT_SECS", 15),
            mail_timeout_secs: env_parse("MAIL_TIMEOUT_SECS", 10),
            otp_sweep_interval_secs: env_parse("OTP_SWEEP_INTERVAL_SECS", 300),
        })
    }

    pub fn tx_timeout(&self) -> Duration {
        Duration::from_secs(self.tx_timeout_secs.max(1))
    }

    pub fn mail_timeout(&self) -> Duration {
        Duration::from_secs(self.mail_timeout_secs.max(1))
    }

    /// `None` disables the expired-OTP sweeper.
    pub fn otp_sweep_interval(&self) -> Option<Duration> {
        (self.otp_sweep_interval_secs > 0).then(|| Duration::from_secs(self.otp_sweep_interval_secs))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
