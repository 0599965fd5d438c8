// src/core/scanner/mod.rs

// One file per signal source. `run_full_scan` fans them out concurrently.
pub mod dns_scanner;
pub mod headers_scanner;
pub mod performance_scanner;
pub mod redirect_scanner;
pub mod ssl_scanner;
pub mod whois_scanner;

use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, ProbeTimeouts};
use crate::core::error::ProbeError;
use crate::core::models::{
    AnalysisTarget, CertificateInfo, DnsRecordSet, HeadResponse, PerformanceReport, ProbeResult,
    RedirectHop, WhoisRecord,
};
use hickory_resolver::TokioAsyncResolver;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use self::dns_scanner::{build_resolver, run_dns_scan};
use self::headers_scanner::run_headers_scan;
use self::performance_scanner::run_performance_scan;
use self::redirect_scanner::run_redirect_scan;
use self::ssl_scanner::run_ssl_scan;
use self::whois_scanner::run_whois_scan;

/// Head start the redirect walk's own budget keeps over its task deadline.
const REDIRECT_WALK_MARGIN: Duration = Duration::from_millis(250);

/// The six signal sources behind an analysis.
///
/// `NetworkProbes` talks to the real network; tests swap in their own set.
/// Implementations report errors freely: `run_full_scan` bounds each call by
/// its deadline and folds every failure into the probe's own result slot.
pub trait ProbeSet: Send + Sync + 'static {
    fn dns(
        &self,
        target: &AnalysisTarget,
    ) -> impl Future<Output = Result<DnsRecordSet, ProbeError>> + Send;

    fn tls(
        &self,
        target: &AnalysisTarget,
    ) -> impl Future<Output = Result<CertificateInfo, ProbeError>> + Send;

    fn head(
        &self,
        target: &AnalysisTarget,
    ) -> impl Future<Output = Result<HeadResponse, ProbeError>> + Send;

    fn redirects(
        &self,
        target: &AnalysisTarget,
    ) -> impl Future<Output = Result<Vec<RedirectHop>, ProbeError>> + Send;

    fn performance(
        &self,
        target: &AnalysisTarget,
    ) -> impl Future<Output = Result<PerformanceReport, ProbeError>> + Send;

    fn whois(
        &self,
        target: &AnalysisTarget,
    ) -> impl Future<Output = Result<WhoisRecord, ProbeError>> + Send;
}

/// Probes backed by hickory, native-tls, reqwest and raw port-43 WHOIS.
pub struct NetworkProbes {
    resolver: TokioAsyncResolver,
    /// Follows redirects; used for HEAD and the timing request.
    client: reqwest::Client,
    /// Never follows redirects; used for the manual redirect walk.
    manual_client: reqwest::Client,
    timeouts: ProbeTimeouts,
    redirect_hop_timeout: Duration,
    max_redirects: usize,
    whois_bootstrap: String,
}

impl NetworkProbes {
    pub fn new(config: &EngineConfig) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        let manual_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            resolver: build_resolver(),
            client,
            manual_client,
            timeouts: config.timeouts.clone(),
            redirect_hop_timeout: config.redirect_hop_timeout,
            max_redirects: config.max_redirects,
            whois_bootstrap: config.whois_bootstrap.clone(),
        })
    }
}

impl ProbeSet for NetworkProbes {
    async fn dns(&self, target: &AnalysisTarget) -> Result<DnsRecordSet, ProbeError> {
        Ok(run_dns_scan(&self.resolver, &target.host).await)
    }

    async fn tls(&self, target: &AnalysisTarget) -> Result<CertificateInfo, ProbeError> {
        run_ssl_scan(&target.host, self.timeouts.tls).await
    }

    async fn head(&self, target: &AnalysisTarget) -> Result<HeadResponse, ProbeError> {
        run_headers_scan(&self.client, &target.url, self.timeouts.head).await
    }

    async fn redirects(&self, target: &AnalysisTarget) -> Result<Vec<RedirectHop>, ProbeError> {
        // Finish inside the outer deadline so the partial chain survives.
        let walk_budget = self.timeouts.redirects.saturating_sub(REDIRECT_WALK_MARGIN);
        Ok(run_redirect_scan(
            &self.manual_client,
            &target.url,
            self.max_redirects,
            self.redirect_hop_timeout,
            walk_budget,
        )
        .await)
    }

    async fn performance(&self, target: &AnalysisTarget) -> Result<PerformanceReport, ProbeError> {
        Ok(run_performance_scan(&self.client, &target.url, self.timeouts.performance).await)
    }

    async fn whois(&self, target: &AnalysisTarget) -> Result<WhoisRecord, ProbeError> {
        run_whois_scan(&self.whois_bootstrap, &target.host, self.timeouts.whois).await
    }
}

/// Raw probe outputs of one analysis, before derivation and scoring.
#[derive(Debug, Clone)]
pub struct ProbeOutputs {
    pub dns: ProbeResult<DnsRecordSet>,
    pub ssl: ProbeResult<CertificateInfo>,
    pub headers: ProbeResult<HeadResponse>,
    pub redirects: ProbeResult<Vec<RedirectHop>>,
    /// A failed timing probe is reported as `Unreachable`.
    pub performance: PerformanceReport,
    /// A failed WHOIS lookup is reported as an empty record.
    pub whois: WhoisRecord,
}

/// Runs one probe on its own task under its own deadline.
///
/// Errors, timeouts and panics all end up as `ProbeResult::Failed`, so a
/// broken probe never touches its siblings.
async fn spawn_probe<P, T, F, Fut>(
    probes: &Arc<P>,
    target: &AnalysisTarget,
    name: &'static str,
    deadline: Duration,
    run: F,
) -> ProbeResult<T>
where
    P: ProbeSet,
    T: Send + 'static,
    F: FnOnce(Arc<P>, AnalysisTarget) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ProbeError>> + Send + 'static,
{
    let probes = Arc::clone(probes);
    let target = target.clone();
    let handle = tokio::spawn(async move {
        match tokio::time::timeout(deadline, run(probes, target)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(deadline)),
        }
    });

    match handle.await {
        Ok(Ok(value)) => {
            debug!(probe = name, "Probe succeeded.");
            ProbeResult::Ok(value)
        }
        Ok(Err(e)) => {
            warn!(probe = name, error = %e, "Probe failed.");
            ProbeResult::Failed(e.to_string())
        }
        Err(e) => {
            error!(probe = name, error = %e, "Probe task panicked!");
            ProbeResult::Failed("probe task panicked".to_string())
        }
    }
}

/// Executes every probe in parallel and waits for all of them.
///
/// Each probe carries its own deadline, so the whole call is bounded by the
/// largest one rather than their sum.
pub async fn run_full_scan<P: ProbeSet>(
    probes: &Arc<P>,
    target: &AnalysisTarget,
    timeouts: &ProbeTimeouts,
) -> ProbeOutputs {
    info!(target = %target.host, "Starting full scan.");

    let (dns, ssl, headers, redirects, performance, whois) = tokio::join!(
        spawn_probe(probes, target, "dns", timeouts.dns, |p, t| async move {
            p.dns(&t).await
        }),
        spawn_probe(probes, target, "tls", timeouts.tls, |p, t| async move {
            p.tls(&t).await
        }),
        spawn_probe(probes, target, "head", timeouts.head, |p, t| async move {
            p.head(&t).await
        }),
        spawn_probe(probes, target, "redirects", timeouts.redirects, |p, t| async move {
            p.redirects(&t).await
        }),
        spawn_probe(probes, target, "performance", timeouts.performance, |p, t| async move {
            p.performance(&t).await
        }),
        spawn_probe(probes, target, "whois", timeouts.whois, |p, t| async move {
            p.whois(&t).await
        }),
    );

    let outputs = ProbeOutputs {
        dns,
        ssl,
        headers,
        redirects,
        performance: match performance {
            ProbeResult::Ok(report) => report,
            ProbeResult::Failed(_) => PerformanceReport::unreachable(),
        },
        whois: match whois {
            ProbeResult::Ok(record) => record,
            ProbeResult::Failed(_) => WhoisRecord::default(),
        },
    };
    info!(
        target = %target.host,
        dns = outputs.dns.is_ok(),
        ssl = outputs.ssl.is_ok(),
        headers = outputs.headers.is_ok(),
        redirects = outputs.redirects.is_ok(),
        "Full scan finished."
    );
    outputs
}
