// src/core/typosquat.rs

//! Edit-distance comparison of a host against well-known, frequently
//! impersonated domains.

use crate::core::models::TyposquatMatch;
use tracing::debug;

/// High-value impersonation targets: search, social, banks, exchanges, shops.
pub const POPULAR_DOMAINS: &[&str] = &[
    "google.com", "facebook.com", "amazon.com", "apple.com", "microsoft.com",
    "netflix.com", "paypal.com", "instagram.com", "twitter.com", "linkedin.com",
    "youtube.com", "whatsapp.com", "telegram.org", "discord.com", "github.com",
    "stackoverflow.com", "reddit.com", "twitch.tv", "spotify.com", "dropbox.com",
    "yahoo.com", "bing.com", "outlook.com", "office.com", "live.com",
    "bankofamerica.com", "chase.com", "wellsfargo.com", "citibank.com",
    "steam.com", "steampowered.com", "epicgames.com", "roblox.com",
    "binance.com", "coinbase.com", "blockchain.com", "metamask.io",
    "trendyol.com", "hepsiburada.com", "sahibinden.com", "n11.com",
    "garanti.com.tr", "akbank.com.tr", "isbank.com.tr", "ziraatbank.com.tr",
];

/// Largest edit distance still reported as a lookalike.
pub const MAX_TYPO_DISTANCE: usize = 2;

/// Levenshtein distance over Unicode scalar values, two-row variant.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// The host without its last label: `paypa1.com` -> `paypa1`.
fn base_label(host: &str) -> String {
    let host = host.strip_prefix("www.").unwrap_or(host);
    let labels: Vec<&str> = host.split('.').collect();
    labels[..labels.len().saturating_sub(1)].join(".")
}

pub struct TyposquatDetector {
    references: Vec<&'static str>,
    max_distance: usize,
}

impl Default for TyposquatDetector {
    fn default() -> Self {
        Self::new(POPULAR_DOMAINS.to_vec(), MAX_TYPO_DISTANCE)
    }
}

impl TyposquatDetector {
    pub fn new(references: Vec<&'static str>, max_distance: usize) -> Self {
        Self {
            references,
            max_distance,
        }
    }

    /// Every reference whose first label is within `(0, max_distance]` edits
    /// of the host's base label, in reference-list order.
    pub fn check(&self, host: &str) -> Vec<TyposquatMatch> {
        let base = base_label(host);
        let matches: Vec<TyposquatMatch> = self
            .references
            .iter()
            .filter_map(|reference| {
                let reference_base = reference.split('.').next().unwrap_or(reference);
                let distance = levenshtein(&base, reference_base);
                (distance > 0 && distance <= self.max_distance).then(|| TyposquatMatch {
                    domain: host.to_string(),
                    similar_to: reference.to_string(),
                    distance,
                    warning: format!(
                        "\"{host}\" looks very similar to \"{reference}\": possible typosquatting"
                    ),
                })
            })
            .collect();

        debug!(host, matches = matches.len(), "Typosquatting check finished.");
        matches
    }
}
