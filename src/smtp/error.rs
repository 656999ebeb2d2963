use thiserror::Error;

use super::types::Stage;

#[derive(Debug, Error)]
pub enum SmtpError {
    #[error("smtp: {field} must not contain CR or LF")]
    LineBreak { field: &'static str },
    #[error("no socket address resolved for {host}")]
    NoAddress { host: String },
    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error during {stage}: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },
    #[error("TLS handshake failed: {source}")]
    Tls {
        #[source]
        source: native_tls::Error,
    },
    #[error("{stage} rejected with {code}: {message}")]
    Reply {
        stage: Stage,
        code: u16,
        message: String,
    },
    #[error("smtp: server {host} doesn't support AUTH")]
    AuthUnsupported { host: String },
    #[error("refusing to send credentials to {host} over an unencrypted connection")]
    InsecureAuth { host: String },
    #[error("authentication failed with {code}: {message}")]
    Auth { code: u16, message: String },
}

impl SmtpError {
    pub(crate) fn io(stage: Stage, source: std::io::Error) -> Self {
        Self::Io { stage, source }
    }

    pub(crate) fn tls(source: native_tls::Error) -> Self {
        Self::Tls { source }
    }

    /// Reply code carried by the error, if the server produced one.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Reply { code, .. } | Self::Auth { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Permanent errors will fail again on retry: 5xx replies, refused
    /// credentials, missing capabilities and rejected input.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::LineBreak { .. }
            | Self::AuthUnsupported { .. }
            | Self::InsecureAuth { .. }
            | Self::Auth { .. } => true,
            Self::Reply { code, .. } => (500..600).contains(code),
            Self::NoAddress { .. } | Self::Connect { .. } | Self::Io { .. } | Self::Tls { .. } => {
                false
            }
        }
    }
}
