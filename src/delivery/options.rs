use crate::smtp::SmtpOptions;

/// Knobs shared by both delivery paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOptions {
    /// Destination port for MX hosts, and the relay port when the relay
    /// host names none.
    pub port: u16,
    /// Upper bound on candidate servers tried per domain. `None` tries all.
    pub max_servers: Option<usize>,
    pub smtp: SmtpOptions,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            port: 25,
            max_servers: None,
            smtp: SmtpOptions::default(),
        }
    }
}
