use base64::{Engine as _, engine::general_purpose::STANDARD};

use super::types::Extensions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mechanism {
    Plain,
    Login,
}

impl Mechanism {
    /// PLAIN when advertised, LOGIN otherwise. `None` when the server
    /// offers neither.
    pub(crate) fn choose(extensions: &Extensions) -> Option<Self> {
        let offered = extensions.params("AUTH");
        if offered.iter().any(|m| m == "PLAIN") {
            Some(Self::Plain)
        } else if offered.iter().any(|m| m == "LOGIN") {
            Some(Self::Login)
        } else {
            None
        }
    }
}

/// RFC 4616 initial response: `\0login\0password`.
pub(crate) fn plain_response(login: &str, password: &str) -> String {
    let mut raw = Vec::with_capacity(login.len() + password.len() + 2);
    raw.push(0);
    raw.extend_from_slice(login.as_bytes());
    raw.push(0);
    raw.extend_from_slice(password.as_bytes());
    STANDARD.encode(raw)
}

pub(crate) fn encode(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}
