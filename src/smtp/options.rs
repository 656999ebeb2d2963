use std::borrow::Cow;
use std::time::Duration;

use native_tls::TlsConnector;

use super::SmtpError;

/// Configuration knobs for one SMTP session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpOptions {
    pub helo_domain: Option<String>,
    pub connect_timeout: Duration,
    /// Applies to every read and write, so an unresponsive server cannot
    /// stall a delivery thread forever.
    pub command_timeout: Duration,
    /// Mail servers routinely present self-signed or mismatched
    /// certificates; opportunistic STARTTLS accepts them unless this is
    /// turned off.
    pub accept_invalid_certs: bool,
}

impl Default for SmtpOptions {
    fn default() -> Self {
        Self {
            helo_domain: None,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
            accept_invalid_certs: true,
        }
    }
}

impl SmtpOptions {
    /// Returns the hostname used in `EHLO`/`HELO`. Defaults to the local
    /// host name, then `localhost`.
    pub fn helo_name(&self) -> Cow<'_, str> {
        if let Some(name) = self.helo_domain.as_deref().filter(|n| !n.trim().is_empty()) {
            return Cow::Borrowed(name);
        }
        match gethostname::gethostname().into_string() {
            Ok(host) if !host.is_empty() => Cow::Owned(host),
            _ => Cow::Borrowed("localhost"),
        }
    }

    pub(crate) fn tls_connector(&self) -> Result<TlsConnector, SmtpError> {
        let mut builder = TlsConnector::builder();
        if self.accept_invalid_certs {
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(SmtpError::tls)
    }
}
