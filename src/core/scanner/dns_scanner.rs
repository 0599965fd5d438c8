// src/core/scanner/dns_scanner.rs

use tracing::{debug, info, warn};

use crate::core::models::{DnsRecordSet, MxRecord, SoaRecord};
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;

/// Builds the Tokio-based resolver shared by every DNS scan.
pub fn build_resolver() -> TokioAsyncResolver {
    TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
}

/// Resolves A, AAAA, MX, TXT, NS, CNAME and SOA records for `target`.
///
/// The seven lookups run concurrently and fail independently: a lookup that
/// errors (NXDOMAIN, SERVFAIL, no records) leaves its sequence empty.
pub async fn run_dns_scan(resolver: &TokioAsyncResolver, target: &str) -> DnsRecordSet {
    info!(target, "Starting DNS scan.");

    let (a, aaaa, mx, txt, ns, cname, soa) = tokio::join!(
        lookup(resolver, target, RecordType::A, |rdata| match rdata {
            RData::A(addr) => Some(addr.to_string()),
            _ => None,
        }),
        lookup(resolver, target, RecordType::AAAA, |rdata| match rdata {
            RData::AAAA(addr) => Some(addr.to_string()),
            _ => None,
        }),
        lookup(resolver, target, RecordType::MX, |rdata| match rdata {
            RData::MX(mx) => Some(MxRecord {
                exchange: trim_root(mx.exchange().to_string()),
                priority: mx.preference(),
            }),
            _ => None,
        }),
        lookup(resolver, target, RecordType::TXT, |rdata| match rdata {
            // A TXT record may be split into several strings; join them back.
            RData::TXT(txt) => Some(
                txt.iter()
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .collect::<Vec<_>>()
                    .join(""),
            ),
            _ => None,
        }),
        lookup(resolver, target, RecordType::NS, |rdata| match rdata {
            RData::NS(ns) => Some(trim_root(ns.to_string())),
            _ => None,
        }),
        lookup(resolver, target, RecordType::CNAME, |rdata| match rdata {
            RData::CNAME(cname) => Some(trim_root(cname.to_string())),
            _ => None,
        }),
        lookup(resolver, target, RecordType::SOA, |rdata| match rdata {
            RData::SOA(soa) => Some(SoaRecord {
                nsname: trim_root(soa.mname().to_string()),
                hostmaster: trim_root(soa.rname().to_string()),
                serial: soa.serial(),
                refresh: soa.refresh() as i64,
                retry: soa.retry() as i64,
                expire: soa.expire() as i64,
                minttl: soa.minimum(),
            }),
            _ => None,
        }),
    );

    let mut mx = mx;
    mx.sort_by_key(|record| record.priority);

    let records = DnsRecordSet { a, aaaa, mx, txt, ns, cname, soa };
    info!(
        a = records.a.len(),
        aaaa = records.aaaa.len(),
        mx = records.mx.len(),
        ns = records.ns.len(),
        "DNS scan finished."
    );
    records
}

/// Runs one lookup and keeps the answers `extract` recognises. Answers of
/// other types (a CNAME in front of an A record, say) are skipped.
async fn lookup<T>(
    resolver: &TokioAsyncResolver,
    target: &str,
    record_type: RecordType,
    extract: impl Fn(&RData) -> Option<T>,
) -> Vec<T> {
    debug!(target, %record_type, "Looking up records.");
    match resolver.lookup(target, record_type).await {
        Ok(answers) => {
            let records: Vec<T> = answers.iter().filter_map(&extract).collect();
            debug!(target, %record_type, count = records.len(), "Lookup finished.");
            records
        }
        Err(e) => {
            warn!(target, %record_type, error = %e, "DNS lookup failed.");
            Vec::new()
        }
    }
}

/// Drops the trailing root dot of a fully-qualified name.
fn trim_root(name: String) -> String {
    match name.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}
