//! Envelope construction: sender, recipients, headers and body ready for
//! delivery.

mod error;
mod headers;
mod message;

pub use error::EnvelopeError;
pub use headers::Headers;

use std::collections::BTreeMap;

use crate::validator::{self, AddressError, ValidationMode};

/// What the caller knows before the message is parsed. Empty strings count
/// as unset.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeConfig {
    pub sender: Option<String>,
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub body: Vec<u8>,
}

/// A message ready for delivery. Immutable once built.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    headers: Headers,
    body: Vec<u8>,
    sender: String,
    recipients: Vec<String>,
}

impl Envelope {
    /// Parses `config.body` (or wraps it in a minimal message when it has no
    /// header block) and resolves sender and recipients.
    ///
    /// The sender comes from `config.sender`, then the `From` header, then
    /// `$USER@hostname`. Recipients come from `config.recipients`, or from
    /// `To`, `Cc` and `Bcc` when that list is empty. Every address is
    /// validated and its domain converted to ASCII.
    pub fn new(config: &EnvelopeConfig) -> Result<Self, EnvelopeError> {
        if config.body.is_empty() {
            return Err(EnvelopeError::EmptyBody);
        }
        let explicit_sender = non_empty(config.sender.as_deref());
        for raw in &config.recipients {
            refuse_line_break(raw)?;
        }
        if let Some(sender) = explicit_sender {
            refuse_line_break(sender)?;
        }

        let message = match message::parse(&config.body)? {
            Some(message) => message,
            None if !config.recipients.is_empty() => {
                message::synthesize(explicit_sender, &config.recipients, &config.body)
            }
            None => return Err(EnvelopeError::MissingHeaders),
        };
        let message::Message { mut headers, body } = message;

        let sender = match explicit_sender {
            Some(sender) => {
                headers.set("From", sender);
                first_address("From", sender)?.unwrap_or_else(|| sender.to_string())
            }
            None => match headers.first("From") {
                Some(from) => first_address("From", from)?.ok_or(EnvelopeError::MissingSender)?,
                None => {
                    let sender = local_sender().ok_or(EnvelopeError::MissingSender)?;
                    headers.set("From", sender.clone());
                    sender
                }
            },
        };
        let sender = checked_mailbox(&sender)?;

        if let Some(subject) = non_empty(config.subject.as_deref()) {
            headers.set("Subject", message::encode_subject(subject));
        }

        let mut listed = Vec::new();
        if config.recipients.is_empty() {
            if let Some(to) = headers.first("To") {
                listed.extend(message::addresses("To", to)?);
            }
            for field in ["Cc", "Bcc"] {
                for value in headers.get(field).unwrap_or_default() {
                    match message::addresses(field, value) {
                        Ok(found) => listed.extend(found),
                        Err(err) => tracing::debug!(%field, error = %err, "ignoring unparsable header"),
                    }
                }
            }
        } else {
            for raw in &config.recipients {
                listed.extend(message::addresses("recipients", raw)?);
            }
        }

        let mut recipients: Vec<String> = Vec::with_capacity(listed.len());
        for address in &listed {
            let mailbox = checked_mailbox(address)?;
            if !recipients.contains(&mailbox) {
                recipients.push(mailbox);
            }
        }
        if recipients.is_empty() {
            return Err(EnvelopeError::NoRecipients);
        }

        Ok(Self {
            headers,
            body,
            sender,
            recipients,
        })
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn sender_domain(&self) -> Option<&str> {
        domain_of(&self.sender)
    }

    /// Recipients grouped by lower-cased domain; each group keeps the
    /// original recipient order and local-part case.
    pub fn recipients_by_domain(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for recipient in &self.recipients {
            let domain = domain_of(recipient).unwrap_or_default().to_ascii_lowercase();
            groups.entry(domain).or_default().push(recipient.clone());
        }
        groups
    }

    /// The bytes sent after DATA: sorted headers (without `Bcc`), an empty
    /// line and the body, ending with CRLF.
    pub fn generate_message(&self) -> Vec<u8> {
        message::render(&self.headers, &self.body)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn domain_of(address: &str) -> Option<&str> {
    address.rsplit_once('@').map(|(_, domain)| domain)
}

fn refuse_line_break(address: &str) -> Result<(), EnvelopeError> {
    validator::check_line(address).map_err(|_| EnvelopeError::LineBreak {
        address: address.to_string(),
    })
}

fn first_address(field: &str, value: &str) -> Result<Option<String>, EnvelopeError> {
    Ok(message::addresses(field, value)?.into_iter().next())
}

/// Validates `address` and returns it with an ASCII domain.
fn checked_mailbox(address: &str) -> Result<String, EnvelopeError> {
    let normalized =
        validator::normalize_address(address, ValidationMode::Relaxed).map_err(|err| match err {
            AddressError::LineBreak => EnvelopeError::LineBreak {
                address: address.to_string(),
            },
            AddressError::Empty => EnvelopeError::InvalidAddress {
                address: address.to_string(),
                reasons: err.to_string(),
            },
        })?;
    if !normalized.valid {
        return Err(EnvelopeError::InvalidAddress {
            address: address.to_string(),
            reasons: normalized.reasons.join("; "),
        });
    }
    Ok(normalized.mailbox())
}

/// `$USER@hostname`, the last-resort sender.
fn local_sender() -> Option<String> {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .ok()
        .filter(|u| !u.is_empty())?;
    let host = gethostname::gethostname().into_string().ok()?;
    if host.is_empty() {
        return None;
    }
    Some(format!("{user}@{host}"))
}
