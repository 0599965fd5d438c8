// src/core/scanner/redirect_scanner.rs

use tracing::{debug, info, warn};

use crate::core::models::RedirectHop;
use reqwest::header::LOCATION;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// Walks the redirect chain starting at `start`, one GET per hop.
///
/// `client` must have automatic redirects disabled. The walk stops on a
/// non-redirect status, a redirect without a usable `Location`, a transport
/// failure (recorded as a final hop with status 0), or after `max_hops` hops.
///
/// Each hop gets at most `hop_timeout`, and never more than what is left of
/// `walk_budget`. Running out of budget ends the walk like a transport
/// failure, so the hops already seen are kept.
pub async fn run_redirect_scan(
    client: &reqwest::Client,
    start: &Url,
    max_hops: usize,
    hop_timeout: Duration,
    walk_budget: Duration,
) -> Vec<RedirectHop> {
    info!(url = %start, max_hops, "Starting redirect scan.");
    let walk_deadline = Instant::now() + walk_budget;
    let mut chain = Vec::new();
    let mut current = start.clone();

    while chain.len() < max_hops {
        let remaining = walk_deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            warn!(url = %current, hops = chain.len(), "Redirect walk ran out of time.");
            chain.push(failed_hop(&current));
            break;
        }

        let request = client.get(current.clone()).timeout(hop_timeout.min(remaining));
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %current, error = %e, "Redirect hop failed.");
                chain.push(failed_hop(&current));
                break;
            }
        };

        let status = response.status();
        debug!(url = %current, status = status.as_u16(), "Received redirect hop.");
        chain.push(RedirectHop {
            url: current.to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        });

        if !REDIRECT_STATUSES.contains(&status.as_u16()) {
            break;
        }

        let next = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|location| current.join(location).ok());
        match next {
            Some(next) => current = next,
            None => {
                debug!(url = %current, "Redirect without a usable Location header.");
                break;
            }
        }
    }

    info!(hops = chain.len(), "Redirect scan finished.");
    chain
}

fn failed_hop(url: &Url) -> RedirectHop {
    RedirectHop {
        url: url.to_string(),
        status: 0,
        status_text: "Connection failed".to_string(),
    }
}
