use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use direct_mta::config::DEFAULT_CONFIG_PATH;
use direct_mta::{DeliveryOptions, SmtpOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Human,
    Ndjson,
}

/// Drop-in sendmail replacement: reads a message on stdin and delivers it
/// directly, or through the relay named in the config file.
#[derive(Debug, Parser)]
#[command(name = "direct-sendmail", version)]
pub struct Cli {
    /// envelope sender address
    #[arg(short = 'f', value_name = "ADDRESS")]
    pub sender: Option<String>,

    /// subject, overriding the message header
    #[arg(short = 's')]
    pub subject: Option<String>,

    /// don't treat a line with only "." as the end of input
    #[arg(short = 'i')]
    pub ignore_dot: bool,

    /// extract recipients from message headers (ignored, always on when no
    /// recipient is given)
    #[arg(short = 't')]
    pub read_headers: bool,

    /// verbose logging, result fields included
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// sender domain allowed to send (repeatable, default: any)
    #[arg(long = "sender-domain", value_name = "DOMAIN")]
    pub sender_domains: Vec<String>,

    /// relay configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// destination SMTP port
    #[arg(long, default_value_t = 25)]
    pub port: u16,

    /// per-command timeout in seconds
    #[arg(long = "timeout", default_value_t = 60)]
    pub timeout_secs: u64,

    /// output format for results
    #[arg(long, value_enum, default_value_t = Format::Human)]
    pub format: Format,

    pub recipients: Vec<String>,
}

impl Cli {
    pub fn delivery_options(&self) -> DeliveryOptions {
        DeliveryOptions {
            port: self.port,
            smtp: SmtpOptions {
                command_timeout: Duration::from_secs(self.timeout_secs),
                ..SmtpOptions::default()
            },
            ..DeliveryOptions::default()
        }
    }

    /// Empty allow-list means every sender domain is allowed.
    pub fn sender_domain_allowed(&self, domain: &str) -> bool {
        self.sender_domains.is_empty()
            || self
                .sender_domains
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(domain))
    }
}
