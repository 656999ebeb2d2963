use std::fmt;

use secrecy::SecretString;

use crate::mx::Endpoint;

/// Protocol step a failure is attributed to.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Greeting,
    Ehlo,
    StartTls,
    Auth,
    MailFrom,
    RcptTo,
    Data,
    Quit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Greeting => "greeting",
            Self::Ehlo => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth => "AUTH",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Data => "DATA",
            Self::Quit => "QUIT",
        })
    }
}

/// A raw SMTP reply, preserving the numeric status code and every text line.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_positive_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }

    pub fn message(&self) -> String {
        self.lines.join(" ")
    }
}

/// EHLO keywords advertised by the server, with their parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    entries: Vec<(String, Vec<String>)>,
}

impl Extensions {
    /// Parses an EHLO reply; the first line is the server greeting and
    /// carries no keyword.
    pub fn from_ehlo(reply: &SmtpReply) -> Self {
        let entries = reply
            .lines
            .iter()
            .skip(1)
            .filter_map(|line| {
                let mut tokens = line.split_whitespace();
                let keyword = tokens.next()?.to_ascii_uppercase();
                let params = tokens.map(str::to_ascii_uppercase).collect();
                Some((keyword, params))
            })
            .collect();
        Self { entries }
    }

    pub fn has(&self, keyword: &str) -> bool {
        self.entries
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(keyword))
    }

    pub fn params(&self, keyword: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(keyword))
            .map(|(_, params)| params.as_slice())
            .unwrap_or(&[])
    }
}

/// Login/password pair for `AUTH PLAIN` or `AUTH LOGIN`.
#[derive(Debug)]
pub struct Credentials {
    pub login: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: SecretString::new(password.into()),
        }
    }
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientRejection {
    pub recipient: String,
    pub reply: SmtpReply,
}

/// What one completed session did with each recipient.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReport {
    pub server: Endpoint,
    /// Whether STARTTLS was negotiated before the envelope was sent.
    pub tls: bool,
    pub accepted: Vec<String>,
    pub rejected: Vec<RecipientRejection>,
}

impl TransactionReport {
    pub(crate) fn new(server: Endpoint, tls: bool) -> Self {
        Self {
            server,
            tls,
            accepted: Vec::new(),
            rejected: Vec::new(),
        }
    }
}
