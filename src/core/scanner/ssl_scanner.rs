// src/core/scanner/ssl_scanner.rs

use tracing::{debug, error, info, warn};

use crate::core::error::ProbeError;
use crate::core::models::CertificateInfo;
use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use sha2::{Digest, Sha256};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tokio::task::spawn_blocking;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

const TLS_PORT: u16 = 443;
const FINGERPRINT_PREFIX_LEN: usize = 30;

/// Opens a TLS connection to `target:443` (SNI = `target`) and reports the
/// leaf certificate. native-tls is blocking, so the work runs on the
/// blocking pool; `timeout` bounds the TCP connect and each socket read/write.
pub async fn run_ssl_scan(target: &str, timeout: Duration) -> Result<CertificateInfo, ProbeError> {
    info!(target, "Starting SSL/TLS scan.");
    let target_owned = target.to_string();

    debug!("Spawning blocking task for TLS connection.");
    let result = spawn_blocking(move || perform_tls_scan(&target_owned, timeout))
        .await
        .unwrap_or_else(|e| {
            error!(panic = %e, "Blocking SSL scan task panicked!");
            Err(ProbeError::Task(e.to_string()))
        });

    match &result {
        Ok(cert) => info!(
            valid = cert.valid,
            days_remaining = cert.days_remaining,
            "SSL/TLS scan finished."
        ),
        Err(e) => warn!(target, error = %e, "SSL/TLS scan failed."),
    }
    result
}

fn perform_tls_scan(target: &str, timeout: Duration) -> Result<CertificateInfo, ProbeError> {
    debug!(target, "Performing TLS connection and handshake.");

    let connector = TlsConnector::new().map_err(|e| {
        error!(error = %e, "Failed to create TlsConnector");
        ProbeError::Handshake(format!("TlsConnector: {e}"))
    })?;

    let addrs = (target, TLS_PORT)
        .to_socket_addrs()
        .map_err(|e| ProbeError::Connect(format!("{target}: {e}")))?;
    let stream = connect_first(addrs, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    debug!(target, "Performing TLS handshake.");
    let stream = connector
        .connect(target, stream)
        .map_err(|e| ProbeError::Handshake(e.to_string()))?;

    let cert = stream
        .peer_certificate()
        .map_err(|e| ProbeError::Certificate(format!("could not read peer certificate: {e}")))?
        .ok_or_else(|| ProbeError::Certificate("server did not provide a certificate".to_string()))?;

    let cert_der = cert
        .to_der()
        .map_err(|e| ProbeError::Certificate(format!("could not convert certificate to DER: {e}")))?;

    certificate_info(&cert_der, Utc::now())
}

/// Tries each resolved address in turn; the last connect error wins.
fn connect_first(
    addrs: impl Iterator<Item = SocketAddr>,
    timeout: Duration,
) -> Result<TcpStream, ProbeError> {
    let mut last_error = None;
    for addr in addrs {
        debug!(%addr, "Connecting TCP stream.");
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%addr, error = %e, "TCP connect failed, trying next address.");
                last_error = Some(e);
            }
        }
    }
    Err(ProbeError::Connect(
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no addresses resolved".to_string()),
    ))
}

/// Extracts the reported fields from a DER-encoded leaf certificate.
pub fn certificate_info(cert_der: &[u8], now: DateTime<Utc>) -> Result<CertificateInfo, ProbeError> {
    let (_, x509) = parse_x509_certificate(cert_der).map_err(|e| {
        error!(error = %e, "Failed to parse X.509 certificate");
        ProbeError::Certificate(format!("X.509 parse error: {e}"))
    })?;

    info!(subject = %x509.subject(), issuer = %x509.issuer(), "Successfully parsed certificate.");

    let validity = x509.validity();
    let valid_from = asn1_time_to_chrono_utc(&validity.not_before);
    let valid_to = asn1_time_to_chrono_utc(&validity.not_after);

    let issuer = first_attr(x509.issuer().iter_organization())
        .or_else(|| first_attr(x509.issuer().iter_common_name()))
        .unwrap_or_else(|| "Unknown".to_string());
    let subject =
        first_attr(x509.subject().iter_common_name()).unwrap_or_else(|| "Unknown".to_string());

    let alt_names = match x509.subject_alternative_name() {
        Ok(Some(san)) => san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(CertificateInfo {
        valid: now >= valid_from && now <= valid_to,
        issuer,
        subject,
        alt_names,
        // native-tls does not expose the negotiated protocol version.
        protocol: None,
        serial_number: x509.raw_serial_as_string(),
        bits: key_bits(&x509),
        fingerprint: fingerprint_prefix(cert_der),
        valid_from,
        valid_to,
        days_remaining: days_until(valid_to, now),
    })
}

fn first_attr<'a, 'b: 'a>(
    mut attrs: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>,
) -> Option<String> {
    attrs
        .find_map(|attr| attr.as_str().ok())
        .map(str::to_string)
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

/// Size of the subject key in bits, for RSA and EC keys.
fn key_bits(x509: &X509Certificate<'_>) -> Option<u32> {
    match x509.public_key().parsed() {
        Ok(PublicKey::RSA(rsa)) => u32::try_from(rsa.key_size()).ok(),
        Ok(PublicKey::EC(point)) => u32::try_from(point.key_size()).ok(),
        _ => None,
    }
}

/// Whole days from `now` until `valid_to`, rounded toward negative infinity.
pub fn days_until(valid_to: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let delta = valid_to - now;
    let days = delta.num_days();
    // num_days truncates toward zero.
    if delta < chrono::Duration::days(days) {
        days - 1
    } else {
        days
    }
}

/// SHA-256 of the DER bytes as colon-separated upper hex, truncated.
fn fingerprint_prefix(cert_der: &[u8]) -> String {
    let digest = Sha256::digest(cert_der);
    let hex = digest
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(":");
    format!("{}...", &hex[..FINGERPRINT_PREFIX_LEN])
}
