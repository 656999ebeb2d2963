#![forbid(unsafe_code)]
//! direct_mta: deliver mail straight to recipient domains or through a
//! smart host, reporting one severity-tagged result per recipient.

pub mod config;
pub mod delivery;
pub mod envelope;
pub mod mx;
pub mod smtp;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, RelayConfig};
pub use delivery::{
    DeliveryError, DeliveryOptions, Fields, Level, Outcome, Results, SendResult, send,
    send_direct, send_smarthost,
};
pub use envelope::{Envelope, EnvelopeConfig, EnvelopeError, Headers};
pub use mx::{DeliveryTarget, Endpoint, Error as MxError, MxRecord, MxResolver, Resolve};
pub use smtp::{Credentials, SmtpError, SmtpOptions, TransactionReport, send_mail};
pub use validator::{ValidationMode, ValidationReport, normalize_address, validate_address};
