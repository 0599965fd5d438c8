// src/core/analyzer.rs

//! The coordinating unit: validate, consult the cache, admit, fan out the
//! probes, derive lookalikes and technologies, score, and write the result
//! back to the cache.

use crate::config::EngineConfig;
use crate::core::cache::ResultCache;
use crate::core::clock::{Clock, SystemClock};
use crate::core::error::{AnalysisError, ProbeError};
use crate::core::fingerprint::{detect_technologies, has_cdn};
use crate::core::models::{
    AnalysisOutcome, AnalysisRecord, AnalysisTarget, BulkEntry, HealthReport,
};
use crate::core::rate_limiter::RateLimiter;
use crate::core::risk::{RiskInputs, calculate_risk};
use crate::core::scanner::{NetworkProbes, ProbeOutputs, ProbeSet, run_full_scan};
use crate::core::typosquat::{POPULAR_DOMAINS, TyposquatDetector};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{error, info, warn};

pub struct Analyzer<P: ProbeSet = NetworkProbes> {
    config: EngineConfig,
    probes: Arc<P>,
    cache: ResultCache,
    limiter: RateLimiter,
    typosquat: Arc<TyposquatDetector>,
    clock: Arc<dyn Clock>,
}

impl Analyzer<NetworkProbes> {
    /// An analyzer wired to the real network and the system clock.
    pub fn from_config(config: EngineConfig) -> Result<Self, ProbeError> {
        let probes = NetworkProbes::new(&config)?;
        Ok(Self::with_parts(config, probes, Arc::new(SystemClock)))
    }
}

impl<P: ProbeSet> Analyzer<P> {
    pub fn with_parts(config: EngineConfig, probes: P, clock: Arc<dyn Clock>) -> Self {
        let cache = ResultCache::new(config.cache_ttl, Arc::clone(&clock));
        let limiter = RateLimiter::new(
            config.rate_limit_window,
            config.rate_limit_max_requests,
            Arc::clone(&clock),
        );
        let typosquat = TyposquatDetector::new(POPULAR_DOMAINS.to_vec(), config.typo_max_distance);

        Self {
            config,
            probes: Arc::new(probes),
            cache,
            limiter,
            typosquat: Arc::new(typosquat),
            clock,
        }
    }

    /// Analyzes one URL on behalf of `client_key`.
    ///
    /// A cached result is returned without consuming quota. Invalid input and
    /// rate-limit rejections fail before any network I/O.
    pub async fn analyze(
        &self,
        input: &str,
        client_key: &str,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        self.analyze_inner(input, Some(client_key)).await
    }

    /// Analyzes 1 to `max_bulk_urls` URLs concurrently, in input order.
    ///
    /// The call is admitted once; after that each entry succeeds or fails on
    /// its own.
    pub async fn analyze_bulk(
        &self,
        urls: &[String],
        client_key: &str,
    ) -> Result<Vec<BulkEntry>, AnalysisError> {
        if urls.is_empty() {
            return Err(AnalysisError::InvalidInput("URLs array is required".to_string()));
        }
        if urls.len() > self.config.max_bulk_urls {
            return Err(AnalysisError::InvalidInput(format!(
                "Maximum {} URLs per request",
                self.config.max_bulk_urls
            )));
        }
        self.admit(client_key)?;

        info!(count = urls.len(), client = client_key, "Starting bulk analysis.");
        let entries = join_all(urls.iter().map(|url| async move {
            BulkEntry::new(url.clone(), self.analyze_inner(url, None).await)
        }))
        .await;

        let failed = entries.iter().filter(|entry| entry.error.is_some()).count();
        info!(count = entries.len(), failed, "Bulk analysis finished.");
        Ok(entries)
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            time: self.clock.utc_now(),
            cached_entries: self.cache.len(),
            tracked_clients: self.limiter.tracked_clients(),
        }
    }

    /// `client_key` is `None` when the caller already holds an admission.
    async fn analyze_inner(
        &self,
        input: &str,
        client_key: Option<&str>,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let target = AnalysisTarget::parse(input).inspect_err(|e| {
            warn!(input, error = %e, "Rejected analysis input.");
        })?;

        if let Some(record) = self.cache.get(&target.host) {
            info!(domain = %target.host, "Serving cached analysis.");
            return Ok(AnalysisOutcome {
                record,
                cached: true,
            });
        }

        if let Some(client_key) = client_key {
            self.admit(client_key)?;
        }

        let record = self.run(target).await?;
        Ok(AnalysisOutcome {
            record,
            cached: false,
        })
    }

    fn admit(&self, client_key: &str) -> Result<(), AnalysisError> {
        self.limiter.try_admit(client_key).map_err(|retry_after| {
            AnalysisError::RateLimited {
                // Round up so a caller never retries into the same rejection.
                retry_after_secs: retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0),
            }
        })
    }

    async fn run(&self, target: AnalysisTarget) -> Result<Arc<AnalysisRecord>, AnalysisError> {
        let outputs = run_full_scan(&self.probes, &target, &self.config.timeouts).await;

        let detector = Arc::clone(&self.typosquat);
        let now = self.clock.utc_now();
        let record = spawn_blocking(move || compose_record(target, outputs, &detector, now))
            .await
            .map_err(|e| {
                error!(error = %e, "Deriving or scoring the analysis panicked!");
                AnalysisError::Aggregation(e.to_string())
            })?;

        info!(
            domain = %record.domain,
            score = record.risk.score,
            level = %record.risk.level,
            "Analysis finished."
        );
        let record = Arc::new(record);
        self.cache.put(&record.domain, Arc::clone(&record));
        Ok(record)
    }
}

/// Derives lookalikes and technologies from the probe outputs, scores them,
/// and assembles the final record.
pub fn compose_record(
    target: AnalysisTarget,
    outputs: ProbeOutputs,
    detector: &TyposquatDetector,
    now: DateTime<Utc>,
) -> AnalysisRecord {
    let ProbeOutputs {
        dns,
        ssl,
        headers,
        redirects,
        performance,
        whois,
    } = outputs;

    let no_headers = BTreeMap::new();
    let header_map = headers.ok().map_or(&no_headers, |head| &head.headers);

    let phishing = detector.check(&target.host);
    let technologies = detect_technologies(header_map);
    let cdn = has_cdn(&technologies);
    let redirect_hops = redirects.ok().map_or(0, Vec::len);

    let risk = calculate_risk(&RiskInputs {
        domain_created: whois.domain_created,
        cdn,
        headers: header_map,
        ssl: &ssl,
        phishing: &phishing,
        redirect_hops,
        now,
    });

    AnalysisRecord {
        domain: target.host,
        url: target.url.to_string(),
        status_code: headers.ok().map(|head| head.status_code),
        whois,
        cdn,
        headers,
        ssl,
        dns,
        redirect_chain: redirects,
        phishing,
        technologies,
        performance,
        risk,
        scanned_at: now,
    }
}
