// src/core/scanner/performance_scanner.rs

use tracing::{info, warn};

use crate::core::models::{PerformanceRating, PerformanceReport};
use std::time::{Duration, Instant};
use url::Url;

const FAST_BELOW_MS: u64 = 1000;
const AVERAGE_BELOW_MS: u64 = 3000;

/// Maps an elapsed time to its rating.
pub fn rate(elapsed_ms: u64) -> PerformanceRating {
    if elapsed_ms < FAST_BELOW_MS {
        PerformanceRating::Fast
    } else if elapsed_ms < AVERAGE_BELOW_MS {
        PerformanceRating::Average
    } else {
        PerformanceRating::Slow
    }
}

/// Times a full GET, body included. Any failure is reported as unreachable.
pub async fn run_performance_scan(
    client: &reqwest::Client,
    url: &Url,
    timeout: Duration,
) -> PerformanceReport {
    info!(%url, "Starting performance scan.");
    let start = Instant::now();

    let result = async {
        let response = client.get(url.clone()).timeout(timeout).send().await?;
        response.bytes().await
    }
    .await;

    match result {
        Ok(body) => {
            let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            let rating = rate(elapsed_ms);
            info!(elapsed_ms, bytes = body.len(), %rating, "Performance scan finished.");
            PerformanceReport {
                response_time_ms: Some(elapsed_ms),
                rating,
            }
        }
        Err(e) => {
            warn!(%url, error = %e, "Performance request failed.");
            PerformanceReport::unreachable()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_boundaries() {
        assert_eq!(rate(0), PerformanceRating::Fast);
        assert_eq!(rate(999), PerformanceRating::Fast);
        assert_eq!(rate(1000), PerformanceRating::Average);
        assert_eq!(rate(2999), PerformanceRating::Average);
        assert_eq!(rate(3000), PerformanceRating::Slow);
        assert_eq!(rate(60_000), PerformanceRating::Slow);
    }
}
