//! Delivery paths and the result stream they feed.
//!
//! [`send_direct`] fans out one thread per recipient domain and walks each
//! domain's MX candidates in order. [`send_smarthost`] pushes everything
//! through a single relay. Both return a [`Results`] stream carrying one
//! terminal [`SendResult`] per recipient.

mod direct;
mod error;
mod options;
mod result;
mod smarthost;
mod stream;

pub use direct::send_direct;
pub use error::DeliveryError;
pub use options::DeliveryOptions;
pub use result::{Fields, Level, Outcome, SendResult};
pub use smarthost::send_smarthost;
pub use stream::Results;

use crate::config::RelayConfig;
use crate::envelope::Envelope;
use crate::mx::MxResolver;
use crate::smtp::{SmtpError, TransactionReport};
use stream::Reporter;

/// Uses the relay when one is configured, direct delivery through the
/// system resolver otherwise.
pub fn send(
    envelope: &Envelope,
    relay: &RelayConfig,
    options: &DeliveryOptions,
) -> Result<Results, DeliveryError> {
    if relay.is_configured() {
        return send_smarthost(envelope, relay, options);
    }
    let resolver = MxResolver::from_system_conf(options.port)?;
    send_direct(envelope, resolver, options)
}

fn domain_of(recipient: &str) -> &str {
    recipient
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .unwrap_or_default()
}

/// One terminal result per recipient named in a completed session.
fn report_transaction(report: &TransactionReport, reporter: &Reporter) {
    for recipient in &report.accepted {
        let (level, message) = if report.tls {
            (Level::Info, format!("{recipient} accepted by {}", report.server))
        } else {
            (
                Level::Warn,
                format!("{recipient} accepted by {} without TLS", report.server),
            )
        };
        reporter.emit(
            SendResult::new(level, Outcome::Accepted, message)
                .field("recipient", recipient)
                .field("domain", domain_of(recipient))
                .field("server", &report.server)
                .field("tls", report.tls),
        );
    }
    for rejection in &report.rejected {
        let reply = &rejection.reply;
        let level = if reply.is_permanent_failure() {
            Level::Fatal
        } else {
            Level::Error
        };
        reporter.emit(
            SendResult::new(
                level,
                Outcome::Rejected,
                format!("{} rejected by {}", rejection.recipient, report.server),
            )
            .with_error(format_args!("{} {}", reply.code, reply.message()))
            .field("recipient", &rejection.recipient)
            .field("domain", domain_of(&rejection.recipient))
            .field("server", &report.server)
            .field("code", reply.code),
        );
    }
}

/// One terminal failure per recipient once no server is left to try.
fn exhausted(recipients: &[String], last_error: Option<&SmtpError>, reporter: &Reporter) {
    let level = match last_error {
        Some(err) if err.is_permanent() => Level::Fatal,
        _ => Level::Error,
    };
    for recipient in recipients {
        let mut result = SendResult::new(
            level,
            Outcome::Failed,
            format!("delivery to {recipient} failed"),
        )
        .field("recipient", recipient)
        .field("domain", domain_of(recipient));
        result = match last_error {
            Some(err) => {
                if let Some(code) = err.code() {
                    result = result.field("code", code);
                }
                result.with_error(err)
            }
            None => result.with_error("no candidate server to try"),
        };
        reporter.emit(result);
    }
}
