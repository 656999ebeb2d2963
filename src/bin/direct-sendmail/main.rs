mod args;
mod input;
mod output;

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use direct_mta::{Envelope, EnvelopeConfig, RelayConfig, send};
use tracing_subscriber::EnvFilter;

use args::Cli;
use output::Reporter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

/// `Ok(false)` when delivery ran but some recipient failed.
fn run(cli: &Cli) -> Result<bool> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        bail!("no stdin input");
    }
    if cli.read_headers {
        tracing::debug!("-t given; headers are read whenever no recipient is listed");
    }
    let body = input::read_message(stdin.lock(), cli.ignore_dot).context("read stdin")?;
    if body.is_empty() {
        bail!("empty message body");
    }

    let envelope = Envelope::new(&EnvelopeConfig {
        sender: cli.sender.clone(),
        recipients: cli.recipients.clone(),
        subject: cli.subject.clone(),
        body,
    })
    .context("build envelope")?;

    let sender_domain = envelope.sender_domain().unwrap_or_default();
    if !cli.sender_domain_allowed(sender_domain) {
        bail!("attempt to send from unauthorized domain {sender_domain}");
    }

    let relay = RelayConfig::resolve(&cli.config)?;
    let mut reporter = Reporter::new(cli.format, cli.verbose)?;
    let results = send(&envelope, &relay, &cli.delivery_options()).context("failed to send")?;
    for result in results {
        reporter.report(&result)?;
    }
    Ok(!reporter.failed())
}
