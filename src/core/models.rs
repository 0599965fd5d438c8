// src/core/models.rs

use crate::core::error::{AnalysisError, ErrorPayload, ProbeError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use strum::Display;
use url::Url;

// --- Target ---

/// A validated analysis target: the absolute URL that HTTP probes hit and the
/// normalised host that DNS, TLS, WHOIS and the cache key are derived from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisTarget {
    pub url: Url,
    /// Lower-cased, without a leading `www.`, never empty.
    pub host: String,
}

impl AnalysisTarget {
    /// Parses user input into a target. A missing scheme defaults to `https://`.
    pub fn parse(input: &str) -> Result<Self, AnalysisError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AnalysisError::InvalidInput("URL is required".to_string()));
        }

        let lowered = trimmed.to_ascii_lowercase();
        let with_scheme = if lowered.starts_with("http://") || lowered.starts_with("https://") {
            trimmed.to_string()
        } else if let Some((scheme, _)) = lowered.split_once("://") {
            return Err(AnalysisError::InvalidInput(format!(
                "unsupported scheme '{scheme}'"
            )));
        } else {
            format!("https://{trimmed}")
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| AnalysisError::InvalidInput(format!("{trimmed}: {e}")))?;

        let raw_host = url
            .host_str()
            .ok_or_else(|| AnalysisError::InvalidInput(format!("{trimmed}: missing host")))?
            .to_ascii_lowercase();
        // `www.` goes first so a bare "www." cannot leave "www" behind.
        let host = raw_host
            .strip_prefix("www.")
            .unwrap_or(&raw_host)
            .trim_end_matches('.')
            .to_string();

        if host.is_empty() {
            return Err(AnalysisError::InvalidInput(format!("{trimmed}: empty host")));
        }

        Ok(Self { url, host })
    }
}

// --- Probe Results ---

/// Outcome of a single probe. A failed probe never aborts the others.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum ProbeResult<T> {
    Ok(T),
    Failed(String),
}

impl<T> ProbeResult<T> {
    pub fn ok(&self) -> Option<&T> {
        match self {
            ProbeResult::Ok(value) => Some(value),
            ProbeResult::Failed(_) => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeResult::Ok(_))
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            ProbeResult::Ok(_) => None,
            ProbeResult::Failed(reason) => Some(reason),
        }
    }
}

impl<T> From<Result<T, ProbeError>> for ProbeResult<T> {
    fn from(result: Result<T, ProbeError>) -> Self {
        match result {
            Ok(value) => ProbeResult::Ok(value),
            Err(e) => ProbeResult::Failed(e.to_string()),
        }
    }
}

// --- DNS ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MxRecord {
    pub exchange: String,
    pub priority: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SoaRecord {
    pub nsname: String,
    pub hostmaster: String,
    pub serial: u32,
    pub refresh: i64,
    pub retry: i64,
    pub expire: i64,
    pub minttl: u32,
}

/// Records per type. A failed sub-lookup leaves its sequence empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnsRecordSet {
    #[serde(rename = "A")]
    pub a: Vec<String>,
    #[serde(rename = "AAAA")]
    pub aaaa: Vec<String>,
    #[serde(rename = "MX")]
    pub mx: Vec<MxRecord>,
    #[serde(rename = "TXT")]
    pub txt: Vec<String>,
    #[serde(rename = "NS")]
    pub ns: Vec<String>,
    #[serde(rename = "CNAME")]
    pub cname: Vec<String>,
    #[serde(rename = "SOA")]
    pub soa: Vec<SoaRecord>,
}

// --- TLS ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    /// Handshake succeeded and the current time is inside the validity window.
    pub valid: bool,
    pub issuer: String,
    pub subject: String,
    pub alt_names: Vec<String>,
    pub protocol: Option<String>,
    pub serial_number: String,
    /// Public key size; `None` for key types other than RSA and EC.
    pub bits: Option<u32>,
    pub fingerprint: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    /// Whole days until `valid_to`, rounded down; negative once expired.
    pub days_remaining: i64,
}

// --- HTTP ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HeadResponse {
    pub status_code: u16,
    /// Lower-cased names; a repeated header keeps its last value.
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RedirectHop {
    pub url: String,
    /// `0` marks a hop whose request never got a response.
    pub status: u16,
    pub status_text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum PerformanceRating {
    Fast,
    Average,
    Slow,
    Unreachable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub response_time_ms: Option<u64>,
    pub rating: PerformanceRating,
}

impl PerformanceReport {
    pub fn unreachable() -> Self {
        Self {
            response_time_ms: None,
            rating: PerformanceRating::Unreachable,
        }
    }
}

// --- WHOIS ---

/// Registration metadata. Every field is optional because registries disagree
/// on what they publish; a failed lookup is simply the default (empty) record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WhoisRecord {
    pub domain_created: Option<DateTime<Utc>>,
    pub registrar: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub updated_date: Option<DateTime<Utc>>,
    pub name_servers: Vec<String>,
    pub dnssec: Option<String>,
}

impl WhoisRecord {
    pub fn is_empty(&self) -> bool {
        *self == WhoisRecord::default()
    }

    /// Fills every field this record lacks from `fallback`.
    pub fn or(self, fallback: WhoisRecord) -> WhoisRecord {
        WhoisRecord {
            domain_created: self.domain_created.or(fallback.domain_created),
            registrar: self.registrar.or(fallback.registrar),
            expiry_date: self.expiry_date.or(fallback.expiry_date),
            updated_date: self.updated_date.or(fallback.updated_date),
            name_servers: if self.name_servers.is_empty() {
                fallback.name_servers
            } else {
                self.name_servers
            },
            dnssec: self.dnssec.or(fallback.dnssec),
        }
    }
}

// --- Derived Signals ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TechMatch {
    pub name: String,
    pub category: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TyposquatMatch {
    pub domain: String,
    pub similar_to: String,
    pub distance: usize,
    pub warning: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum RiskLevel {
    Safe,
    Suspicious,
    #[serde(rename = "High Risk")]
    #[strum(serialize = "High Risk")]
    HighRisk,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub score: f64,
    pub max_score: f64,
    pub percentage: u8,
    pub level: RiskLevel,
    pub reasons: Vec<String>,
    pub positives: Vec<String>,
}

// --- Main Report ---

/// The composed result of one orchestration run. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub domain: String,
    pub url: String,
    pub status_code: Option<u16>,
    #[serde(flatten)]
    pub whois: WhoisRecord,
    pub cdn: bool,
    pub headers: ProbeResult<HeadResponse>,
    pub ssl: ProbeResult<CertificateInfo>,
    pub dns: ProbeResult<DnsRecordSet>,
    pub redirect_chain: ProbeResult<Vec<RedirectHop>>,
    pub phishing: Vec<TyposquatMatch>,
    pub technologies: Vec<TechMatch>,
    pub performance: PerformanceReport,
    pub risk: RiskAssessment,
    pub scanned_at: DateTime<Utc>,
}

/// What `analyze` hands back: the shared record plus whether it came from cache.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    #[serde(flatten)]
    pub record: Arc<AnalysisRecord>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cached: bool,
}

/// One entry of a bulk response, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BulkEntry {
    pub url: String,
    pub status: &'static str,
    pub data: Option<AnalysisOutcome>,
    pub error: Option<ErrorPayload>,
}

impl BulkEntry {
    pub fn new(url: String, result: Result<AnalysisOutcome, AnalysisError>) -> Self {
        match result {
            Ok(outcome) => Self {
                url,
                status: "ok",
                data: Some(outcome),
                error: None,
            },
            Err(e) => Self {
                url,
                status: "error",
                data: None,
                error: Some(e.payload()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub time: DateTime<Utc>,
    pub cached_entries: usize,
    pub tracked_clients: usize,
}
