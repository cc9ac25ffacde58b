//! # Mail Delivery
//!
//! The server has no mail transport; messages are written to the log.

use quire_core::{Mail, Mailer};

/// Logs every message at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: Mail) {
        tracing::info!(
            to = %mail.to,
            template = %mail.template.name(),
            context = ?mail.context,
            "Mail queued"
        );
    }
}
