//! Outbound notifications.
//!
//! Services never send mail themselves; they return the messages they want
//! delivered inside an [`Outcome`] and the handler hands them to the
//! [`Mailer`] once the transaction has committed.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument};

pub mod messages;
pub mod smtp;

pub use smtp::SmtpNotifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub user_id: i64,
    /// `None` for phone-only accounts.
    pub to: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Delivery backend.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Development backend: logs the subject instead of delivering anything.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        info!(%to, %subject, "email send stub");
        Ok(())
    }
}

/// Result of a service call plus the mail to send after commit.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub mail: Vec<Email>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            mail: Vec::new(),
        }
    }

    pub fn with_mail(mut self, email: Email) -> Self {
        self.mail.push(email);
        self
    }
}

/// Best-effort, bounded delivery off the request path.
#[derive(Clone)]
pub struct Mailer {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl Mailer {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Sends every message on a background task. Failures and timeouts are
    /// logged; the caller's response is never affected.
    pub fn dispatch(&self, mail: Vec<Email>) -> JoinHandle<()> {
        let notifier = self.notifier.clone();
        let timeout = self.timeout;
        let span = tracing::Span::current();
        tokio::spawn(
            async move {
                for email in mail {
                    let Some(to) = email.to.as_deref() else {
                        warn!(user_id = email.user_id, subject = %email.subject, "no email address, notification skipped");
                        continue;
                    };
                    match tokio::time::timeout(timeout, notifier.send(to, &email.subject, &email.body)).await {
                        Ok(Ok(())) => info!(user_id = email.user_id, subject = %email.subject, "notification sent"),
                        Ok(Err(e)) => error!(error = %e, user_id = email.user_id, "notification failed"),
                        Err(_) => error!(?timeout, user_id = email.user_id, "notification timed out"),
                    }
                }
            }
            .instrument(span),
        )
    }
}
