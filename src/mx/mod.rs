//! Destination resolution: recipient domain → ordered SMTP endpoints.
//!
//! [`MxResolver`] wraps the system resolver (or any [`LookupMx`]) and turns
//! MX answers into a [`DeliveryTarget`], falling back to the domain itself
//! when no MX exists. Nothing is cached between calls.

mod error;
mod resolver;
mod types;

pub use error::MxError as Error;
pub use resolver::{LookupMx, SystemLookup};
pub use types::{DeliveryTarget, Endpoint, MxRecord, MxStatus};

use trust_dns_resolver::system_conf::read_system_conf;

/// Anything that can map a domain to candidate servers. The delivery
/// scheduler shares one instance across all domain threads, so a lookup for
/// one domain must not wait on another.
pub trait Resolve {
    fn resolve(&self, domain: &str) -> Result<DeliveryTarget, Error>;
}

/// MX-preference resolver with implicit-MX fallback.
pub struct MxResolver<L = SystemLookup> {
    lookup: L,
    port: u16,
}

impl MxResolver<SystemLookup> {
    /// Uses `/etc/resolv.conf`.
    pub fn from_system_conf(port: u16) -> Result<Self, Error> {
        let (config, opts) = read_system_conf().map_err(Error::resolver_init)?;
        Ok(Self::with_lookup(SystemLookup::new(config, opts), port))
    }
}

impl<L: LookupMx> MxResolver<L> {
    pub fn with_lookup(lookup: L, port: u16) -> Self {
        Self { lookup, port }
    }
}

impl<L: LookupMx> Resolve for MxResolver<L> {
    fn resolve(&self, domain: &str) -> Result<DeliveryTarget, Error> {
        let target = resolver::target_with(&self.lookup, domain, self.port)?;
        tracing::debug!(
            domain = %target.domain,
            candidates = target.endpoints.len(),
            implicit = target.implicit,
            "resolved delivery target"
        );
        Ok(target)
    }
}

#[cfg(test)]
pub(crate) mod tests;
