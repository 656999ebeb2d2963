use std::thread;

use super::error::DeliveryError;
use super::options::DeliveryOptions;
use super::stream::{self, Results};
use super::{exhausted, report_transaction};
use crate::config::RelayConfig;
use crate::envelope::Envelope;
use crate::mx::Endpoint;
use crate::smtp;

/// Sends the whole envelope through the configured relay in one
/// transaction. Results map one to one onto the envelope's recipients.
pub fn send_smarthost(
    envelope: &Envelope,
    relay: &RelayConfig,
    options: &DeliveryOptions,
) -> Result<Results, DeliveryError> {
    let endpoint = Endpoint::parse(&relay.host, options.port).ok_or_else(|| {
        DeliveryError::RelayHost {
            value: relay.host.clone(),
        }
    })?;
    let credentials = relay.credentials();
    let sender = envelope.sender().to_string();
    let recipients = envelope.recipients().to_vec();
    let message = envelope.generate_message();
    let smtp_options = options.smtp.clone();
    let (reporter, results) = stream::channel();

    tracing::debug!(relay = %endpoint, recipients = recipients.len(), "sending through smart host");
    thread::Builder::new()
        .name("smarthost-delivery".into())
        .spawn(move || {
            match smtp::send_mail(
                &endpoint,
                credentials.as_ref(),
                &sender,
                &recipients,
                &message,
                &smtp_options,
            ) {
                Ok(report) => report_transaction(&report, &reporter),
                Err(err) => {
                    tracing::warn!(relay = %endpoint, error = %err, "smart host delivery failed");
                    exhausted(&recipients, Some(&err), &reporter);
                }
            }
        })
        .map_err(|source| DeliveryError::Spawn { source })?;

    Ok(results)
}
