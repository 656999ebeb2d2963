//! Minimal SMTP submission client.
//!
//! [`send_mail`] drives one complete session against one server: greeting,
//! EHLO, opportunistic STARTTLS, optional AUTH, envelope, DATA and QUIT.
//! Recipient refusals are reported per recipient in the returned
//! [`TransactionReport`]; anything else that goes wrong aborts the session
//! and comes back as an [`SmtpError`].

mod auth;
mod error;
mod options;
mod session;
mod types;

pub use error::SmtpError;
pub use options::SmtpOptions;
pub use types::{
    Credentials, Extensions, RecipientRejection, SmtpReply, Stage, TransactionReport,
};

use crate::mx::Endpoint;
use crate::validator::check_line;
use session::SmtpSession;

/// Delivers `message` from `from` to every address in `to` through
/// `endpoint`.
///
/// Line breaks in any address are refused before a connection is opened.
/// Exactly one connection is opened and it is closed on every path.
pub fn send_mail(
    endpoint: &Endpoint,
    credentials: Option<&Credentials>,
    from: &str,
    to: &[String],
    message: &[u8],
    options: &SmtpOptions,
) -> Result<TransactionReport, SmtpError> {
    check_line(from).map_err(|_| SmtpError::LineBreak { field: "sender" })?;
    for recipient in to {
        check_line(recipient).map_err(|_| SmtpError::LineBreak { field: "recipient" })?;
    }

    let mut session = SmtpSession::connect(endpoint, options)?;
    session.read_greeting()?;
    let helo = options.helo_name();
    session.hello(&helo)?;

    if session.extensions().has("STARTTLS") {
        let connector = options.tls_connector()?;
        session.starttls(&connector)?;
        session.hello(&helo)?;
    } else {
        tracing::debug!(server = %endpoint, "STARTTLS not offered, continuing in the clear");
    }

    if let Some(credentials) = credentials {
        if !session.extensions().has("AUTH") {
            return Err(SmtpError::AuthUnsupported {
                host: endpoint.to_string(),
            });
        }
        if !session.is_tls() && !endpoint.is_loopback() {
            return Err(SmtpError::InsecureAuth {
                host: endpoint.to_string(),
            });
        }
        session.authenticate(credentials)?;
    }

    session.mail_from(from)?;

    let mut report = TransactionReport::new(endpoint.clone(), session.is_tls());
    for recipient in to {
        let reply = session.rcpt_to(recipient)?;
        if reply.is_positive_completion() {
            report.accepted.push(recipient.clone());
        } else {
            tracing::debug!(server = %endpoint, %recipient, code = reply.code, "recipient refused");
            report.rejected.push(RecipientRejection {
                recipient: recipient.clone(),
                reply,
            });
        }
    }

    if !report.accepted.is_empty() {
        session.data(message)?;
    }
    session.quit();
    Ok(report)
}
