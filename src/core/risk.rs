// src/core/risk.rs

//! Deterministic weighted aggregation of every signal into one risk score.
//!
//! Deductions add to the score and each one appends a reason. Positives are
//! recorded for display only and never subtract. Evaluation order is fixed:
//! domain age, CDN, security headers (table order), TLS, lookalikes, redirects.

use crate::core::fingerprint::header_set;
use crate::core::models::{
    CertificateInfo, ProbeResult, RiskAssessment, RiskLevel, TyposquatMatch,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

pub const MAX_SCORE: f64 = 20.0;
pub const HIGH_RISK_THRESHOLD: f64 = 8.0;
pub const SUSPICIOUS_THRESHOLD: f64 = 4.0;

/// (header, weight when missing, display label)
pub const SECURITY_HEADERS: &[(&str, f64, &str)] = &[
    ("content-security-policy", 1.0, "Content-Security-Policy (CSP)"),
    ("strict-transport-security", 1.0, "HSTS header"),
    ("x-frame-options", 1.0, "X-Frame-Options"),
    ("x-content-type-options", 0.5, "X-Content-Type-Options"),
    ("x-xss-protection", 0.5, "X-XSS-Protection"),
    ("referrer-policy", 0.5, "Referrer-Policy"),
    ("permissions-policy", 0.5, "Permissions-Policy"),
];

const WEIGHT_AGE_UNDER_WEEK: f64 = 4.0;
const WEIGHT_AGE_UNDER_MONTH: f64 = 3.0;
const WEIGHT_AGE_UNDER_QUARTER: f64 = 1.0;
const WEIGHT_AGE_UNKNOWN: f64 = 2.0;
const WEIGHT_NO_CDN: f64 = 1.0;
const WEIGHT_CERT_INVALID: f64 = 3.0;
const WEIGHT_CERT_UNDER_TWO_WEEKS: f64 = 2.0;
const WEIGHT_CERT_UNDER_MONTH: f64 = 1.0;
const WEIGHT_LOOKALIKE: f64 = 3.0;
const WEIGHT_EXCESSIVE_REDIRECTS: f64 = 2.0;
const WEIGHT_SOME_REDIRECTS: f64 = 0.5;

/// Everything the scorer looks at. `headers` is empty when the HEAD probe failed.
pub struct RiskInputs<'a> {
    pub domain_created: Option<DateTime<Utc>>,
    pub cdn: bool,
    pub headers: &'a BTreeMap<String, String>,
    pub ssl: &'a ProbeResult<CertificateInfo>,
    pub phishing: &'a [TyposquatMatch],
    pub redirect_hops: usize,
    pub now: DateTime<Utc>,
}

struct Tally {
    score: f64,
    reasons: Vec<String>,
    positives: Vec<String>,
}

impl Tally {
    fn deduct(&mut self, weight: f64, reason: impl Into<String>) {
        self.score += weight;
        self.reasons.push(reason.into());
    }

    fn credit(&mut self, positive: impl Into<String>) {
        self.positives.push(positive.into());
    }
}

pub fn level_for(score: f64) -> RiskLevel {
    if score >= HIGH_RISK_THRESHOLD {
        RiskLevel::HighRisk
    } else if score >= SUSPICIOUS_THRESHOLD {
        RiskLevel::Suspicious
    } else {
        RiskLevel::Safe
    }
}

pub fn calculate_risk(inputs: &RiskInputs<'_>) -> RiskAssessment {
    let mut tally = Tally {
        score: 0.0,
        reasons: Vec::new(),
        positives: Vec::new(),
    };

    match inputs.domain_created {
        Some(created) => {
            let age_days = (inputs.now - created).num_milliseconds() as f64 / 86_400_000.0;
            if age_days < 7.0 {
                tally.deduct(WEIGHT_AGE_UNDER_WEEK, "Domain is extremely new (< 7 days)");
            } else if age_days < 30.0 {
                tally.deduct(WEIGHT_AGE_UNDER_MONTH, "Domain is relatively new (< 30 days)");
            } else if age_days < 90.0 {
                tally.deduct(WEIGHT_AGE_UNDER_QUARTER, "Domain is less than 3 months old");
            } else if age_days > 1825.0 {
                tally.credit("Domain is over 5 years old, established");
            } else if age_days > 365.0 {
                tally.credit("Domain is over 1 year old");
            }
        }
        None => tally.deduct(WEIGHT_AGE_UNKNOWN, "WHOIS creation date could not be verified"),
    }

    if inputs.cdn {
        tally.credit("Major CDN / DDoS protection detected");
    } else {
        tally.deduct(WEIGHT_NO_CDN, "No major CDN detected");
    }

    for (header, weight, label) in SECURITY_HEADERS {
        if header_set(inputs.headers, header) {
            tally.credit(format!("{label} enabled"));
        } else {
            tally.deduct(*weight, format!("Missing {label}"));
        }
    }

    match inputs.ssl {
        ProbeResult::Ok(cert) if cert.valid => {
            tally.credit("Valid SSL certificate");
            if cert.days_remaining < 14 {
                tally.deduct(
                    WEIGHT_CERT_UNDER_TWO_WEEKS,
                    format!("SSL expires in {} days", cert.days_remaining),
                );
            } else if cert.days_remaining < 30 {
                tally.deduct(
                    WEIGHT_CERT_UNDER_MONTH,
                    format!("SSL expires in {} days", cert.days_remaining),
                );
            }
        }
        _ => tally.deduct(WEIGHT_CERT_INVALID, "SSL certificate is invalid or missing"),
    }

    if !inputs.phishing.is_empty() {
        tally.score += WEIGHT_LOOKALIKE;
        for lookalike in inputs.phishing {
            tally.reasons.push(lookalike.warning.clone());
        }
    }

    if inputs.redirect_hops > 3 {
        tally.deduct(
            WEIGHT_EXCESSIVE_REDIRECTS,
            format!("Excessive redirects ({} hops)", inputs.redirect_hops),
        );
    } else if inputs.redirect_hops > 1 {
        tally.deduct(
            WEIGHT_SOME_REDIRECTS,
            format!("{} redirects detected", inputs.redirect_hops),
        );
    }

    let score = (tally.score * 10.0).round() / 10.0;
    let percentage = (score * 100.0 / MAX_SCORE).round().min(100.0) as u8;
    let level = level_for(score);
    debug!(score, percentage, level = %level, reasons = tally.reasons.len(), "Risk calculated.");

    RiskAssessment {
        score,
        max_score: MAX_SCORE,
        percentage,
        level,
        reasons: tally.reasons,
        positives: tally.positives,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::models::{
        AnalysisRecord, DnsRecordSet, HeadResponse, PerformanceReport, WhoisRecord,
    };
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    pub(crate) fn valid_cert(days_remaining: i64) -> CertificateInfo {
        CertificateInfo {
            valid: true,
            issuer: "Let's Encrypt".into(),
            subject: "example.com".into(),
            alt_names: vec!["example.com".into()],
            protocol: None,
            serial_number: "03:a1".into(),
            bits: Some(2048),
            fingerprint: "AB:CD:EF...".into(),
            valid_from: now() - Duration::days(90),
            valid_to: now() + Duration::days(days_remaining),
            days_remaining,
        }
    }

    pub(crate) fn sample_record() -> AnalysisRecord {
        let ssl = ProbeResult::Ok(valid_cert(200));
        let headers = BTreeMap::new();
        let risk = calculate_risk(&RiskInputs {
            domain_created: Some(now() - Duration::days(2000)),
            cdn: true,
            headers: &headers,
            ssl: &ssl,
            phishing: &[],
            redirect_hops: 1,
            now: now(),
        });
        AnalysisRecord {
            domain: "example.com".into(),
            url: "https://example.com/".into(),
            status_code: Some(200),
            whois: WhoisRecord::default(),
            cdn: true,
            headers: ProbeResult::Ok(HeadResponse::default()),
            ssl,
            dns: ProbeResult::Ok(DnsRecordSet::default()),
            redirect_chain: ProbeResult::Ok(Vec::new()),
            phishing: Vec::new(),
            technologies: Vec::new(),
            performance: PerformanceReport::unreachable(),
            risk,
            scanned_at: now(),
        }
    }

    fn all_headers() -> BTreeMap<String, String> {
        SECURITY_HEADERS
            .iter()
            .map(|(h, _, _)| (h.to_string(), "1".to_string()))
            .collect()
    }

    #[test]
    fn test_established_domain_missing_all_headers() {
        let headers = BTreeMap::new();
        let ssl = ProbeResult::Ok(valid_cert(200));
        let risk = calculate_risk(&RiskInputs {
            domain_created: Some(now() - Duration::days(2001)),
            cdn: true,
            headers: &headers,
            ssl: &ssl,
            phishing: &[],
            redirect_hops: 1,
            now: now(),
        });

        // 1 + 1 + 1 + 0.5 * 4: the header table alone crosses the Suspicious line.
        assert_eq!(risk.score, 5.0);
        assert_eq!(risk.percentage, 25);
        assert_eq!(risk.level, RiskLevel::Suspicious);
        assert_eq!(risk.max_score, 20.0);
        assert_eq!(
            risk.reasons,
            vec![
                "Missing Content-Security-Policy (CSP)",
                "Missing HSTS header",
                "Missing X-Frame-Options",
                "Missing X-Content-Type-Options",
                "Missing X-XSS-Protection",
                "Missing Referrer-Policy",
                "Missing Permissions-Policy",
            ]
        );
        assert_eq!(
            risk.positives,
            vec![
                "Domain is over 5 years old, established",
                "Major CDN / DDoS protection detected",
                "Valid SSL certificate",
            ]
        );
    }

    #[test]
    fn test_blank_header_values_count_as_missing() {
        let headers: BTreeMap<String, String> = SECURITY_HEADERS
            .iter()
            .map(|(name, _, _)| (name.to_string(), "on".to_string()))
            .chain([
                ("content-security-policy".to_string(), String::new()),
                ("x-frame-options".to_string(), "   ".to_string()),
            ])
            .collect();
        let ssl = ProbeResult::Ok(valid_cert(200));
        let risk = calculate_risk(&RiskInputs {
            domain_created: Some(now() - Duration::days(2001)),
            cdn: true,
            headers: &headers,
            ssl: &ssl,
            phishing: &[],
            redirect_hops: 1,
            now: now(),
        });

        assert_eq!(risk.score, 2.0);
        assert_eq!(
            risk.reasons,
            vec!["Missing Content-Security-Policy (CSP)", "Missing X-Frame-Options"]
        );
    }

    #[test]
    fn test_worst_case_is_high_risk_and_ordered() {
        let headers = BTreeMap::new();
        let ssl = ProbeResult::Failed("TLS handshake error: refused".into());
        let phishing = vec![TyposquatMatch {
            domain: "paypa1.com".into(),
            similar_to: "paypal.com".into(),
            distance: 1,
            warning: "lookalike".into(),
        }];
        let risk = calculate_risk(&RiskInputs {
            domain_created: Some(now() - Duration::days(2)),
            cdn: false,
            headers: &headers,
            ssl: &ssl,
            phishing: &phishing,
            redirect_hops: 5,
            now: now(),
        });

        // 4 + 1 + 5 + 3 + 3 + 2
        assert_eq!(risk.score, 18.0);
        assert_eq!(risk.percentage, 90);
        assert_eq!(risk.level, RiskLevel::HighRisk);
        assert_eq!(risk.reasons.first().unwrap(), "Domain is extremely new (< 7 days)");
        assert_eq!(risk.reasons[1], "No major CDN detected");
        assert_eq!(risk.reasons[9], "SSL certificate is invalid or missing");
        assert_eq!(risk.reasons[10], "lookalike");
        assert_eq!(risk.reasons.last().unwrap(), "Excessive redirects (5 hops)");
        assert!(risk.positives.is_empty());
    }

    #[test]
    fn test_positives_never_reduce_score() {
        let headers = all_headers();
        let ssl = ProbeResult::Ok(valid_cert(365));
        let risk = calculate_risk(&RiskInputs {
            domain_created: Some(now() - Duration::days(4000)),
            cdn: true,
            headers: &headers,
            ssl: &ssl,
            phishing: &[],
            redirect_hops: 0,
            now: now(),
        });
        assert_eq!(risk.score, 0.0);
        assert_eq!(risk.level, RiskLevel::Safe);
        assert!(risk.reasons.is_empty());
        assert_eq!(risk.positives.len(), 3 + SECURITY_HEADERS.len());
    }

    #[test]
    fn test_unknown_age_and_expiring_cert() {
        let headers = all_headers();
        let ssl = ProbeResult::Ok(valid_cert(10));
        let risk = calculate_risk(&RiskInputs {
            domain_created: None,
            cdn: true,
            headers: &headers,
            ssl: &ssl,
            phishing: &[],
            redirect_hops: 2,
            now: now(),
        });
        // 2 + 2 + 0.5
        assert_eq!(risk.score, 4.5);
        assert_eq!(risk.percentage, 23);
        assert_eq!(
            risk.reasons,
            vec![
                "WHOIS creation date could not be verified",
                "SSL expires in 10 days",
                "2 redirects detected",
            ]
        );
    }

    #[test]
    fn test_expired_certificate_counts_as_invalid() {
        let headers = all_headers();
        let mut cert = valid_cert(-3);
        cert.valid = false;
        let ssl = ProbeResult::Ok(cert);
        let risk = calculate_risk(&RiskInputs {
            domain_created: Some(now() - Duration::days(400)),
            cdn: true,
            headers: &headers,
            ssl: &ssl,
            phishing: &[],
            redirect_hops: 0,
            now: now(),
        });
        assert_eq!(risk.score, 3.0);
        assert_eq!(risk.positives[0], "Domain is over 1 year old");
        assert_eq!(risk.reasons, vec!["SSL certificate is invalid or missing"]);
    }

    #[test]
    fn test_level_boundaries_are_exact() {
        assert_eq!(level_for(3.9), RiskLevel::Safe);
        assert_eq!(level_for(4.0), RiskLevel::Suspicious);
        assert_eq!(level_for(7.9), RiskLevel::Suspicious);
        assert_eq!(level_for(8.0), RiskLevel::HighRisk);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let headers: BTreeMap<String, String> =
            [("x-frame-options".to_string(), "DENY".to_string())].into();
        let ssl = ProbeResult::Ok(valid_cert(20));
        let inputs = RiskInputs {
            domain_created: Some(now() - Duration::days(45)),
            cdn: false,
            headers: &headers,
            ssl: &ssl,
            phishing: &[],
            redirect_hops: 3,
            now: now(),
        };
        assert_eq!(calculate_risk(&inputs), calculate_risk(&inputs));
    }
}
