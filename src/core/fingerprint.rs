// src/core/fingerprint.rs

use crate::core::models::TechMatch;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Where a rule looks for its needle. All comparisons are lower-case.
enum Check<'a> {
    /// Substring of the `server` header.
    Server(&'a str),
    /// Substring of the `x-powered-by` header.
    PoweredBy(&'a str),
    /// Substring anywhere in the serialised header set, names included.
    Blob(&'a str),
    /// The named header is present.
    HeaderPresent(&'a str),
}

struct FingerprintRule<'a> {
    tech_name: &'a str,
    category: &'a str,
    icon: &'a str,
    check: Check<'a>,
}

/// Categories that count as a CDN sitting in front of the origin.
pub const CDN_CATEGORIES: &[&str] = &["CDN/Security", "CDN"];

/// Evaluated top to bottom; the first rule to emit a name wins.
static RULES: &[FingerprintRule] = &[
    // Web servers
    FingerprintRule { tech_name: "Nginx", category: "Web Server", icon: "server", check: Check::Server("nginx") },
    FingerprintRule { tech_name: "Apache", category: "Web Server", icon: "server", check: Check::Server("apache") },
    FingerprintRule { tech_name: "LiteSpeed", category: "Web Server", icon: "server", check: Check::Server("litespeed") },
    FingerprintRule { tech_name: "IIS", category: "Web Server", icon: "server", check: Check::Server("microsoft") },
    FingerprintRule { tech_name: "IIS", category: "Web Server", icon: "server", check: Check::Server("iis") },
    // Frameworks and languages
    FingerprintRule { tech_name: "Express.js", category: "Framework", icon: "code", check: Check::PoweredBy("express") },
    FingerprintRule { tech_name: "PHP", category: "Language", icon: "code", check: Check::PoweredBy("php") },
    FingerprintRule { tech_name: "ASP.NET", category: "Framework", icon: "code", check: Check::PoweredBy("asp.net") },
    FingerprintRule { tech_name: "Next.js", category: "Framework", icon: "code", check: Check::PoweredBy("next") },
    FingerprintRule { tech_name: "Nuxt.js", category: "Framework", icon: "code", check: Check::PoweredBy("nuxt") },
    // CDN, cache and WAF
    FingerprintRule { tech_name: "Cloudflare", category: "CDN/Security", icon: "shield", check: Check::Blob("cloudflare") },
    FingerprintRule { tech_name: "Akamai", category: "CDN", icon: "cloud", check: Check::Blob("akamai") },
    FingerprintRule { tech_name: "Fastly", category: "CDN", icon: "cloud", check: Check::Blob("fastly") },
    FingerprintRule { tech_name: "Varnish", category: "Cache", icon: "database", check: Check::Blob("varnish") },
    FingerprintRule { tech_name: "Sucuri", category: "WAF", icon: "shield", check: Check::Blob("sucuri") },
    // Hosting and cloud
    FingerprintRule { tech_name: "Vercel", category: "Hosting", icon: "cloud", check: Check::Blob("vercel") },
    FingerprintRule { tech_name: "Netlify", category: "Hosting", icon: "cloud", check: Check::Blob("netlify") },
    FingerprintRule { tech_name: "Heroku", category: "Hosting", icon: "cloud", check: Check::Blob("heroku") },
    FingerprintRule { tech_name: "AWS", category: "Cloud", icon: "cloud", check: Check::Blob("x-amz") },
    FingerprintRule { tech_name: "AWS", category: "Cloud", icon: "cloud", check: Check::Blob("amazons3") },
    FingerprintRule { tech_name: "Google", category: "Cloud", icon: "cloud", check: Check::Blob("x-goog") },
    FingerprintRule { tech_name: "Google", category: "Cloud", icon: "cloud", check: Check::Server("gws") },
    FingerprintRule { tech_name: "Azure", category: "Cloud", icon: "cloud", check: Check::Blob("x-azure") },
    // Security features
    FingerprintRule { tech_name: "CSP", category: "Security", icon: "shield-check", check: Check::HeaderPresent("content-security-policy") },
    FingerprintRule { tech_name: "HSTS", category: "Security", icon: "lock", check: Check::HeaderPresent("strict-transport-security") },
    FingerprintRule { tech_name: "XSS-P", category: "Security", icon: "shield", check: Check::HeaderPresent("x-xss-protection") },
    FingerprintRule { tech_name: "Perm-P", category: "Security", icon: "shield", check: Check::HeaderPresent("permissions-policy") },
];

/// Lower-cased `name: value` lines, one per header.
fn serialize_headers(headers: &BTreeMap<String, String>) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase()
}

/// Classifies a response's headers into technologies, de-duplicated by name
/// in first-match order.
pub fn detect_technologies(headers: &BTreeMap<String, String>) -> Vec<TechMatch> {
    let blob = serialize_headers(headers);
    let server = headers.get("server").map(|s| s.to_lowercase()).unwrap_or_default();
    let powered_by = headers
        .get("x-powered-by")
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for rule in RULES {
        let matched = match rule.check {
            Check::Server(needle) => server.contains(needle),
            Check::PoweredBy(needle) => powered_by.contains(needle),
            Check::Blob(needle) => blob.contains(needle),
            Check::HeaderPresent(name) => header_set(headers, name),
        };
        if matched && seen.insert(rule.tech_name) {
            debug!(tech = rule.tech_name, category = rule.category, "Rule matched.");
            found.push(TechMatch {
                name: rule.tech_name.to_string(),
                category: rule.category.to_string(),
                icon: rule.icon.to_string(),
            });
        }
    }
    found
}

/// A header counts only when it carries a non-blank value.
pub fn header_set(headers: &BTreeMap<String, String>, name: &str) -> bool {
    headers.get(name).is_some_and(|value| !value.trim().is_empty())
}

pub fn has_cdn(technologies: &[TechMatch]) -> bool {
    technologies
        .iter()
        .any(|t| CDN_CATEGORIES.contains(&t.category.as_str()))
}
