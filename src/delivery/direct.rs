use std::collections::BTreeMap;
use std::thread;

use super::error::DeliveryError;
use super::options::DeliveryOptions;
use super::result::{Level, Outcome, SendResult};
use super::stream::{self, Reporter, Results};
use super::{exhausted, report_transaction};
use crate::envelope::Envelope;
use crate::mx::Resolve;
use crate::smtp::{self, SmtpError};

/// Delivers `envelope` straight to each recipient domain's mail servers.
///
/// One thread runs per domain; they share nothing but the returned stream,
/// which ends once every domain thread has finished. A domain whose servers
/// all fail never holds up another domain.
pub fn send_direct<R>(
    envelope: &Envelope,
    resolver: R,
    options: &DeliveryOptions,
) -> Result<Results, DeliveryError>
where
    R: Resolve + Send + Sync + 'static,
{
    let groups = envelope.recipients_by_domain();
    let sender = envelope.sender().to_string();
    let message = envelope.generate_message();
    let options = options.clone();
    let (reporter, results) = stream::channel();

    tracing::debug!(domains = groups.len(), %sender, "starting direct delivery");
    thread::Builder::new()
        .name("direct-delivery".into())
        .spawn(move || {
            let jobs = DomainJobs {
                groups: &groups,
                sender: &sender,
                message: &message,
                resolver: &resolver,
                options: &options,
            };
            jobs.run_all(&reporter);
        })
        .map_err(|source| DeliveryError::Spawn { source })?;

    Ok(results)
}

struct DomainJobs<'a, R> {
    groups: &'a BTreeMap<String, Vec<String>>,
    sender: &'a str,
    message: &'a [u8],
    resolver: &'a R,
    options: &'a DeliveryOptions,
}

impl<R: Resolve + Sync> DomainJobs<'_, R> {
    /// Returns once every domain thread has joined.
    fn run_all(&self, reporter: &Reporter) {
        thread::scope(|scope| {
            for (domain, recipients) in self.groups {
                let worker = reporter.clone();
                let spawned = thread::Builder::new()
                    .name(format!("deliver-{domain}"))
                    .spawn_scoped(scope, move || {
                        self.deliver_domain(domain, recipients, &worker);
                    });
                if let Err(err) = spawned {
                    tracing::error!(%domain, error = %err, "failed to spawn delivery thread");
                    for recipient in recipients {
                        reporter.emit(
                            SendResult::new(
                                Level::Fatal,
                                Outcome::Failed,
                                format!("delivery to {recipient} could not be started"),
                            )
                            .with_error(&err)
                            .field("recipient", recipient)
                            .field("domain", domain),
                        );
                    }
                }
            }
        });
    }

    fn deliver_domain(&self, domain: &str, recipients: &[String], reporter: &Reporter) {
        let target = match self.resolver.resolve(domain) {
            Ok(target) => target,
            Err(err) => {
                tracing::warn!(%domain, error = %err, "destination resolution failed");
                for recipient in recipients {
                    reporter.emit(
                        SendResult::new(
                            Level::Fatal,
                            Outcome::Unresolved,
                            format!("no destination for {recipient}"),
                        )
                        .with_error(&err)
                        .field("recipient", recipient)
                        .field("domain", domain),
                    );
                }
                return;
            }
        };

        let limit = self.options.max_servers.unwrap_or(usize::MAX);
        let mut last_error: Option<SmtpError> = None;
        for endpoint in target.endpoints().iter().take(limit) {
            let span = tracing::debug_span!("attempt", %domain, server = %endpoint);
            let _guard = span.enter();
            match smtp::send_mail(
                endpoint,
                None,
                self.sender,
                recipients,
                self.message,
                &self.options.smtp,
            ) {
                Ok(report) => {
                    report_transaction(&report, reporter);
                    return;
                }
                Err(err) => {
                    tracing::info!(error = %err, "server failed, trying next candidate");
                    reporter.emit(
                        SendResult::new(
                            Level::Warn,
                            Outcome::AttemptFailed,
                            format!("delivery to {domain} via {endpoint} failed"),
                        )
                        .with_error(&err)
                        .field("domain", domain)
                        .field("server", endpoint),
                    );
                    last_error = Some(err);
                }
            }
        }

        exhausted(recipients, last_error.as_ref(), reporter);
    }
}
