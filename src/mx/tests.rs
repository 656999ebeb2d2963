use super::{
    DeliveryTarget, Endpoint, Error, LookupMx, MxRecord, MxResolver, MxStatus, Resolve,
    SystemLookup, resolver,
};
use std::net::UdpSocket;
use std::thread;
use std::time::{Duration, Instant};
use trust_dns_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveError;

type LookupResult = Result<Vec<MxRecord>, ResolveError>;
type LookupFn = dyn Fn(&str) -> LookupResult + Send + Sync;

pub(crate) struct StubResolver {
    pub on_lookup: Box<LookupFn>,
    pub hosts: Vec<String>,
}

impl StubResolver {
    fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> LookupResult + Send + Sync + 'static,
    {
        Self {
            on_lookup: Box::new(f),
            hosts: Vec::new(),
        }
    }

    fn with_host(mut self, host: &str) -> Self {
        self.hosts.push(host.to_string());
        self
    }
}

impl LookupMx for StubResolver {
    fn lookup_mx(&self, domain: &str) -> LookupResult {
        (self.on_lookup)(domain)
    }

    fn has_address(&self, host: &str) -> Result<bool, ResolveError> {
        Ok(self.hosts.iter().any(|h| h == host))
    }
}

#[test]
fn normalize_domain_rejects_empty() {
    let err = resolver::normalize_domain("").expect_err("empty domain should fail");
    assert!(matches!(err, Error::EmptyDomain));
}

#[test]
fn resolve_with_sorts_and_dedups_records() {
    let stub = StubResolver::new(|domain| {
        assert_eq!(domain, "example.com");
        Ok(vec![
            MxRecord::new(20, "mx2.example.com"),
            MxRecord::new(10, "mx1.example.com"),
            MxRecord::new(10, "mx1.example.com"),
            MxRecord::new(30, "mx3.example.com"),
        ])
    });

    let status = resolver::resolve_with(&stub, "example.com").expect("lookup succeeds");
    let records = match status {
        MxStatus::Records(records) => records,
        MxStatus::NoRecords => panic!("expected records"),
    };
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].preference, 10);
    assert_eq!(records[0].exchange, "mx1.example.com");
    assert_eq!(records[2].preference, 30);
}

#[test]
fn resolve_with_handles_no_records() {
    let stub = StubResolver::new(|domain| {
        assert_eq!(domain, "example.com");
        Ok(Vec::new())
    });

    let status = resolver::resolve_with(&stub, "example.com").expect("lookup succeeds");
    assert!(matches!(status, MxStatus::NoRecords));
}

#[test]
fn normalize_exchange_trims_dot_and_lowercases() {
    let out = resolver::normalize_exchange("Mail.EXAMPLE.com.".to_string());
    assert_eq!(out, "mail.example.com");
}

#[test]
fn equal_preferences_are_ordered_deterministically() {
    let stub = StubResolver::new(|_| {
        Ok(vec![
            MxRecord::new(10, "b.example.com"),
            MxRecord::new(10, "a.example.com"),
        ])
    });
    let resolver = MxResolver::with_lookup(stub, 25);
    let first = resolver.resolve("example.com").expect("target");
    let second = resolver.resolve("example.com").expect("target");
    assert_eq!(first, second);
    assert_eq!(first.endpoints[0], Endpoint::new("a.example.com", 25));
}

#[test]
fn target_uses_configured_port_in_preference_order() {
    let stub = StubResolver::new(|_| {
        Ok(vec![
            MxRecord::new(20, "backup.example.com"),
            MxRecord::new(5, "primary.example.com"),
        ])
    });
    let target = MxResolver::with_lookup(stub, 2525)
        .resolve("Example.COM")
        .expect("target");
    assert_eq!(
        target,
        DeliveryTarget {
            domain: "example.com".to_string(),
            endpoints: vec![
                Endpoint::new("primary.example.com", 2525),
                Endpoint::new("backup.example.com", 2525),
            ],
            implicit: false,
        }
    );
}

#[test]
fn falls_back_to_domain_host_without_mx() {
    let stub = StubResolver::new(|_| Ok(Vec::new())).with_host("example.org");
    let target = MxResolver::with_lookup(stub, 25)
        .resolve("example.org")
        .expect("implicit target");
    assert!(target.implicit);
    assert_eq!(target.endpoints, vec![Endpoint::new("example.org", 25)]);
}

#[test]
fn no_mx_and_no_host_is_a_domain_failure() {
    let stub = StubResolver::new(|_| Ok(Vec::new()));
    let err = MxResolver::with_lookup(stub, 25)
        .resolve("nowhere.invalid")
        .expect_err("no target");
    assert!(matches!(err, Error::NoMailServer { .. }));
}

#[test]
fn null_mx_is_refused() {
    let stub = StubResolver::new(|_| Ok(vec![MxRecord::new(0, ".")]));
    let err = MxResolver::with_lookup(stub, 25)
        .resolve("example.net")
        .expect_err("null MX");
    assert!(matches!(err, Error::NullMx { .. }));
}

#[test]
fn endpoint_parse_accepts_host_and_port_forms() {
    assert_eq!(Endpoint::parse("relay.example.com", 25), Some(Endpoint::new("relay.example.com", 25)));
    assert_eq!(Endpoint::parse("relay.example.com:587", 25), Some(Endpoint::new("relay.example.com", 587)));
    assert_eq!(Endpoint::parse("[::1]:2525", 25), Some(Endpoint::new("::1", 2525)));
    assert_eq!(Endpoint::parse("relay:notaport", 25), None);
    assert_eq!(Endpoint::parse("  ", 25), None);
    assert_eq!(Endpoint::new("::1", 25).to_string(), "[::1]:25");
}

/// Nameserver that receives queries and never answers.
fn silent_nameserver(timeout: Duration) -> (UdpSocket, SystemLookup) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind udp");
    let server = NameServerConfig::new(socket.local_addr().expect("addr"), Protocol::Udp);
    let config = ResolverConfig::from_parts(None, Vec::new(), vec![server]);
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 0;
    (socket, SystemLookup::new(config, opts))
}

#[test]
fn slow_lookups_for_different_domains_run_side_by_side() {
    let timeout = Duration::from_secs(1);
    let (_socket, lookup) = silent_nameserver(timeout);
    let resolver = MxResolver::with_lookup(lookup, 25);

    let started = Instant::now();
    let elapsed: Vec<Duration> = thread::scope(|scope| {
        let handles: Vec<_> = ["slow-a.test", "fast-b.test"]
            .into_iter()
            .map(|domain| {
                let resolver = &resolver;
                scope.spawn(move || {
                    let err = resolver.resolve(domain).expect_err("nobody answers");
                    assert!(matches!(err, Error::Lookup { .. }), "{err:?}");
                    started.elapsed()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("join")).collect()
    });

    for took in elapsed {
        assert!(
            took < timeout * 3 / 2,
            "lookup waited on its sibling: {took:?}"
        );
    }
}
