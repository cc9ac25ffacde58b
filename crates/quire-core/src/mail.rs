//! # Outgoing Mail
//!
//! Mail is an external collaborator: the core only decides *which* message
//! goes to *whom*. Delivery is behind the [`Mailer`] trait.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Templates the platform sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum MailTemplate {
    /// Sent once to a user created through an institution login.
    WelcomeInstitution,
    /// Email confirmation for the prereg campaign.
    ConfirmPrereg,
    /// Email confirmation for the election research campaign.
    ConfirmErpc,
    /// Email confirmation for a preprint provider campaign.
    ConfirmPreprints { provider: String, name: String },
}

impl MailTemplate {
    /// Stable template name, used by delivery backends.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::WelcomeInstitution => "welcome_osf4i".to_string(),
            Self::ConfirmPrereg => "confirm_prereg".to_string(),
            Self::ConfirmErpc => "confirm_erpc".to_string(),
            Self::ConfirmPreprints { provider, .. } => format!("confirm_preprints_{}", provider),
        }
    }
}

/// A rendered-enough message: recipient, template and template context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mail {
    pub to: String,
    pub template: MailTemplate,
    pub context: BTreeMap<String, String>,
}

impl Mail {
    #[must_use]
    pub fn new(to: impl Into<String>, template: MailTemplate) -> Self {
        Self {
            to: to.into(),
            template,
            context: BTreeMap::new(),
        }
    }

    /// Add a template variable.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// Mail delivery backend.
pub trait Mailer: Send + Sync {
    /// Hand a message to the backend. Delivery is fire-and-forget.
    fn send(&self, mail: Mail);
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMailer;

impl Mailer for NullMailer {
    fn send(&self, _mail: Mail) {}
}

/// Keeps every message in memory, for inspection.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Mail>>,
}

impl RecordingMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, mail: Mail) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(mail);
    }
}
