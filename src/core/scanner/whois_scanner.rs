// src/core/scanner/whois_scanner.rs

use tracing::{debug, info, warn};

use crate::core::error::ProbeError;
use crate::core::models::WhoisRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const WHOIS_PORT: u16 = 43;
const MAX_RESPONSE_BYTES: u64 = 256 * 1024;

/// `key: value` lines. Keys may contain spaces ("Registry Expiry Date").
static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*([A-Za-z][A-Za-z0-9 ./_()-]*?)[ \t]*:[ \t]*(\S.*?)[ \t]*$")
        .expect("WHOIS field pattern is valid")
});

const CREATED_KEYS: &[&str] = &[
    "creation date",
    "created",
    "created on",
    "registered on",
    "registration time",
    "domain registration date",
    "registered",
];
const EXPIRY_KEYS: &[&str] = &[
    "registrar registration expiration date",
    "registry expiry date",
    "expiration date",
    "expiry date",
    "paid-till",
    "expires",
    "expire date",
];
const UPDATED_KEYS: &[&str] = &[
    "updated date",
    "last updated",
    "last modified",
    "changed",
    "modified",
];
const REGISTRAR_KEYS: &[&str] = &["registrar", "sponsoring registrar", "registrar name"];
const NAME_SERVER_KEYS: &[&str] = &["name server", "nserver", "nameserver"];
const REFERRAL_KEYS: &[&str] = &["refer", "whois"];
const REGISTRAR_SERVER_KEY: &str = "registrar whois server";

/// Looks up the registration record of `domain` over port 43.
///
/// The bootstrap server names the TLD registry; the registry may in turn point
/// at the registrar's server, whose fields win over the registry's.
pub async fn run_whois_scan(
    bootstrap: &str,
    domain: &str,
    deadline: Duration,
) -> Result<WhoisRecord, ProbeError> {
    info!(domain, "Starting WHOIS scan.");

    if domain.parse::<IpAddr>().is_ok() {
        return Err(ProbeError::Whois(format!(
            "{domain} is an IP address, not a registered domain"
        )));
    }
    let tld = domain
        .rsplit('.')
        .next()
        .filter(|tld| !tld.is_empty())
        .ok_or_else(|| ProbeError::Whois(format!("{domain} has no top-level domain")))?;

    let iana = query(bootstrap, tld, deadline).await?;
    let registry_server = first_value(&parse_fields(&iana), REFERRAL_KEYS)
        .map(normalize_server)
        .ok_or_else(|| ProbeError::Whois(format!("no WHOIS server known for .{tld}")))?;
    debug!(tld, server = %registry_server, "Resolved registry WHOIS server.");

    let registry_text = query(&registry_server, domain, deadline).await?;
    let registry_fields = parse_fields(&registry_text);
    let registry_record = record_from_fields(&registry_fields);

    let registrar_server = first_value(&registry_fields, &[REGISTRAR_SERVER_KEY])
        .map(normalize_server)
        .filter(|server| !server.is_empty() && !server.eq_ignore_ascii_case(&registry_server));

    let record = match registrar_server {
        Some(server) => match query(&server, domain, deadline).await {
            Ok(text) => record_from_fields(&parse_fields(&text)).or(registry_record),
            Err(e) => {
                warn!(domain, %server, error = %e, "Registrar WHOIS referral failed, keeping registry data.");
                registry_record
            }
        },
        None => registry_record,
    };

    info!(
        domain,
        registrar = record.registrar.as_deref().unwrap_or("unknown"),
        created = record.domain_created.is_some(),
        "WHOIS scan finished."
    );
    Ok(record)
}

/// Sends one query line and reads the reply until the server closes.
async fn query(server: &str, query: &str, deadline: Duration) -> Result<String, ProbeError> {
    debug!(server, query, "Sending WHOIS query.");
    let mut stream = timeout(deadline, TcpStream::connect((server, WHOIS_PORT)))
        .await
        .map_err(|_| ProbeError::Timeout(deadline))?
        .map_err(|e| ProbeError::Connect(format!("{server}: {e}")))?;

    timeout(deadline, stream.write_all(format!("{query}\r\n").as_bytes()))
        .await
        .map_err(|_| ProbeError::Timeout(deadline))??;

    let mut response = Vec::new();
    timeout(
        deadline,
        (&mut stream).take(MAX_RESPONSE_BYTES).read_to_end(&mut response),
    )
    .await
    .map_err(|_| ProbeError::Timeout(deadline))??;

    debug!(server, bytes = response.len(), "Received WHOIS response.");
    Ok(String::from_utf8_lossy(&response).replace('\r', ""))
}

/// Strips URL decorations some registries put around server names.
fn normalize_server(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("whois://")
        .trim_start_matches("rwhois://")
        .trim_end_matches('/')
        .to_ascii_lowercase()
}

/// Every `key: value` pair in order, keys lower-cased.
pub fn parse_fields(text: &str) -> Vec<(String, String)> {
    FIELD_RE
        .captures_iter(text)
        .map(|caps| (caps[1].trim().to_ascii_lowercase(), caps[2].to_string()))
        .collect()
}

/// Value of the first key in `keys` (precedence order) that is present.
fn first_value<'a>(fields: &'a [(String, String)], keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| {
        fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    })
}

pub fn record_from_fields(fields: &[(String, String)]) -> WhoisRecord {
    let mut name_servers: Vec<String> = Vec::new();
    for (_, value) in fields
        .iter()
        .filter(|(name, _)| NAME_SERVER_KEYS.contains(&name.as_str()))
    {
        // Some registries append glue addresses after the host name.
        let Some(host) = value.split_whitespace().next() else {
            continue;
        };
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if !host.is_empty() && !name_servers.contains(&host) {
            name_servers.push(host);
        }
    }

    WhoisRecord {
        domain_created: first_value(fields, CREATED_KEYS).and_then(parse_date_string),
        registrar: first_value(fields, REGISTRAR_KEYS).map(str::to_string),
        expiry_date: first_value(fields, EXPIRY_KEYS).and_then(parse_date_string),
        updated_date: first_value(fields, UPDATED_KEYS).and_then(parse_date_string),
        name_servers,
        dnssec: first_value(fields, &["dnssec"]).map(str::to_string),
    }
}

/// Attempts to parse a date string in the formats registries commonly use.
pub fn parse_date_string(date_str: &str) -> Option<DateTime<Utc>> {
    let date_str = date_str.trim();
    parse_exact(date_str).or_else(|| {
        // "2001-02-03 (YYYY-MM-DD)", "2020-01-01T00:00:00Z UTC" and friends.
        date_str
            .split_whitespace()
            .next()
            .filter(|token| *token != date_str)
            .and_then(parse_exact)
    })
}

fn parse_exact(date_str: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }

    let datetime_formats = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];
    for format in &datetime_formats {
        if let Ok(naive_dt) = NaiveDateTime::parse_from_str(date_str, format) {
            return Some(naive_dt.and_utc());
        }
    }

    let date_formats = [
        "%Y-%m-%d", "%d-%b-%Y", "%Y.%m.%d", "%d.%m.%Y", "%Y/%m/%d", "%d/%m/%Y", "%Y%m%d",
    ];
    for format in &date_formats {
        if let Ok(naive_date) = NaiveDate::parse_from_str(date_str, format) {
            return Some(naive_date.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const IANA_COM: &str = "\
% IANA WHOIS server
% for more information on IANA, visit http://www.iana.org

refer:        whois.verisign-grs.com

domain:       COM

organisation: VeriSign Global Registry Services
status:       ACTIVE
";

    const REGISTRY_EXAMPLE: &str = "\
   Domain Name: EXAMPLE.COM
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN
   Registrar WHOIS Server: whois.registrar.example
   Registrar URL: http://www.registrar.example
   Updated Date: 2024-08-14T07:01:34Z
   Creation Date: 1995-08-14T04:00:00Z
   Registry Expiry Date: 2025-08-13T04:00:00Z
   Registrar: RESERVED-Internet Assigned Numbers Authority
   Name Server: A.IANA-SERVERS.NET
   Name Server: B.IANA-SERVERS.NET
   DNSSEC: signedDelegation
>>> Last update of whois database: 2024-09-01T10:00:00Z <<<
";

    #[test]
    fn test_referral_from_bootstrap_answer() {
        let fields = parse_fields(IANA_COM);
        assert_eq!(
            first_value(&fields, REFERRAL_KEYS).map(normalize_server),
            Some("whois.verisign-grs.com".to_string())
        );
    }

    #[test]
    fn test_registry_record_fields() {
        let record = record_from_fields(&parse_fields(REGISTRY_EXAMPLE));
        assert_eq!(
            record.domain_created.map(|d| d.to_rfc3339()),
            Some("1995-08-14T04:00:00+00:00".to_string())
        );
        assert_eq!(
            record.expiry_date.map(|d| d.format("%Y-%m-%d").to_string()),
            Some("2025-08-13".to_string())
        );
        assert!(record.updated_date.is_some());
        assert_eq!(
            record.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
        assert_eq!(record.name_servers, vec!["a.iana-servers.net", "b.iana-servers.net"]);
        assert_eq!(record.dnssec.as_deref(), Some("signedDelegation"));
    }

    #[test]
    fn test_registrar_server_referral_is_found() {
        let fields = parse_fields(REGISTRY_EXAMPLE);
        assert_eq!(
            first_value(&fields, &[REGISTRAR_SERVER_KEY]),
            Some("whois.registrar.example")
        );
    }

    #[test]
    fn test_field_precedence_and_name_server_dedup() {
        let text = "\
created: 2001-02-03
Creation Date: 1999-01-01T00:00:00Z
nserver: NS1.EXAMPLE.RU. 192.0.2.1
nserver: ns1.example.ru
nserver: ns2.example.ru.
paid-till: 2030-02-03T21:00:00Z
";
        let record = record_from_fields(&parse_fields(text));
        // "creation date" outranks "created" regardless of line order.
        assert_eq!(
            record.domain_created.map(|d| d.format("%Y").to_string()),
            Some("1999".to_string())
        );
        assert_eq!(record.name_servers, vec!["ns1.example.ru", "ns2.example.ru"]);
        assert!(record.expiry_date.is_some());
        assert!(record.registrar.is_none());
    }

    #[test]
    fn test_unparsable_creation_date_is_absent() {
        let record = record_from_fields(&parse_fields("Creation Date: before the war\n"));
        assert!(record.domain_created.is_none());
    }

    #[test]
    fn test_empty_answer_is_empty_record() {
        assert!(record_from_fields(&parse_fields("")).is_empty());
        assert!(record_from_fields(&parse_fields("No match for \"NOPE.COM\".\n")).is_empty());
    }

    #[test]
    fn test_parse_date_string_formats() {
        for input in [
            "2024-01-15T10:30:45Z",
            "2024-01-15T10:30:45.123Z",
            "2024-01-15T10:30:45+0000",
            "2024-01-15 10:30:45",
            "2024-01-15",
            "15-Jan-2024",
            "2024.01.15",
            "15.01.2024",
            "2024/01/15",
            "20240115",
            "2024-01-15 (YYYY-MM-DD)",
        ] {
            let parsed = parse_date_string(input);
            assert_eq!(
                parsed.map(|d| d.format("%Y-%m-%d").to_string()),
                Some("2024-01-15".to_string()),
                "failed to parse {input:?}"
            );
        }
        assert!(parse_date_string("").is_none());
        assert!(parse_date_string("not a date").is_none());
    }

    #[test]
    fn test_normalize_server() {
        assert_eq!(normalize_server(" whois://Whois.Nic.IO/ "), "whois.nic.io");
    }

    #[tokio::test]
    async fn test_ip_address_is_rejected_without_io() {
        let err = run_whois_scan("whois.iana.org", "192.0.2.1", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Whois(_)));
    }
}
