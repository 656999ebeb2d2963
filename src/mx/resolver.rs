use trust_dns_resolver::{
    Resolver,
    config::{ResolverConfig, ResolverOpts},
    error::{ResolveError, ResolveErrorKind},
};

use super::{DeliveryTarget, Endpoint, Error, MxRecord, MxStatus};

pub(crate) fn resolve_with<R>(resolver: &R, ascii_domain: &str) -> Result<MxStatus, Error>
where
    R: LookupMx + ?Sized,
{
    let mut records = resolver.lookup_mx(ascii_domain).map_err(Error::lookup)?;

    // Derived ordering is (preference, exchange): equal preferences resolve
    // the same way on every call.
    records.sort();
    records.dedup();

    if records.is_empty() {
        Ok(MxStatus::NoRecords)
    } else {
        Ok(MxStatus::Records(records))
    }
}

/// Builds the ordered candidate list for `domain`: MX exchanges by ascending
/// preference, or the domain itself when it has no MX but does have an
/// address record.
pub(crate) fn target_with<R>(resolver: &R, domain: &str, port: u16) -> Result<DeliveryTarget, Error>
where
    R: LookupMx + ?Sized,
{
    let ascii = normalize_domain(domain)?;
    match resolve_with(resolver, &ascii)? {
        MxStatus::Records(records) => {
            if records.iter().all(MxRecord::is_null) {
                return Err(Error::NullMx { domain: ascii });
            }
            let endpoints = records
                .into_iter()
                .filter(|record| !record.is_null())
                .map(|record| Endpoint::new(record.exchange, port))
                .collect();
            Ok(DeliveryTarget {
                domain: ascii,
                endpoints,
                implicit: false,
            })
        }
        MxStatus::NoRecords => {
            let has_address = resolver.has_address(&ascii).map_err(Error::lookup)?;
            if !has_address {
                return Err(Error::no_mail_server(&ascii));
            }
            Ok(DeliveryTarget {
                endpoints: vec![Endpoint::new(ascii.clone(), port)],
                domain: ascii,
                implicit: true,
            })
        }
    }
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, Error> {
    let trimmed = domain.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(Error::EmptyDomain);
    }
    idna::domain_to_ascii(trimmed).map_err(Error::idna)
}

pub(crate) fn normalize_exchange(exchange: String) -> String {
    if exchange == "." {
        return exchange;
    }
    let trimmed = exchange.trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}

pub trait LookupMx {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError>;

    /// Whether `host` has at least one A/AAAA record.
    fn has_address(&self, host: &str) -> Result<bool, ResolveError>;
}

/// System lookups without shared state between callers.
///
/// The sync [`Resolver`] drives every query through one locked runtime, so
/// a shared instance makes a slow domain hold up all the others. Each call
/// here builds its own resolver from the stored configuration instead.
#[derive(Debug, Clone)]
pub struct SystemLookup {
    config: ResolverConfig,
    opts: ResolverOpts,
}

impl SystemLookup {
    pub fn new(config: ResolverConfig, opts: ResolverOpts) -> Self {
        Self { config, opts }
    }

    fn resolver(&self) -> Result<Resolver, ResolveError> {
        Ok(Resolver::new(self.config.clone(), self.opts)?)
    }
}

impl LookupMx for SystemLookup {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        self.resolver()?.lookup_mx(domain)
    }

    fn has_address(&self, host: &str) -> Result<bool, ResolveError> {
        self.resolver()?.has_address(host)
    }
}

impl LookupMx for Resolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        let lookup = match Resolver::mx_lookup(self, domain) {
            Ok(lookup) => lookup,
            Err(err) if is_no_records(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut records = Vec::new();
        for mx in lookup.iter() {
            let exchange = normalize_exchange(mx.exchange().to_utf8());
            records.push(MxRecord::new(mx.preference(), exchange));
        }
        Ok(records)
    }

    fn has_address(&self, host: &str) -> Result<bool, ResolveError> {
        match Resolver::lookup_ip(self, host) {
            Ok(lookup) => Ok(lookup.iter().next().is_some()),
            Err(err) if is_no_records(&err) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

fn is_no_records(err: &ResolveError) -> bool {
    matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. })
}
