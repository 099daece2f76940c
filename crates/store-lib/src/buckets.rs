//! Histogram buckets sized around the scrape timeout
//!
//! The Prometheus default buckets are a sane starting point for small
//! latencies, but they stop at 10s. Scrapes that run into their timeout
//! should land in a bucket of their own so timeouts are easy to pinpoint.

use std::time::Duration;

/// Default buckets with extra boundaries around `scrape_timeout`, in seconds
///
/// * Above the largest default: appends the halfway point, the timeout,
///   1.5x and 2x the timeout.
/// * Below it: inserts the timeout in order, unless it is closer than the
///   smallest default bucket to an existing boundary.
/// * Equal to it (or zero): the defaults already cover it.
///
/// The result is always strictly increasing.
pub fn buckets_for(scrape_timeout: Duration) -> Vec<f64> {
    let mut buckets = prometheus::DEFAULT_BUCKETS.to_vec();
    let max_bucket = buckets[buckets.len() - 1];
    let min_gap = buckets[0];
    let timeout = scrape_timeout.as_secs_f64();

    if timeout > max_bucket {
        let halfway = max_bucket + (timeout - max_bucket) / 2.0;
        buckets.extend_from_slice(&[halfway, timeout, timeout * 1.5, timeout * 2.0]);
    } else if timeout > 0.0 && timeout < max_bucket {
        // Some bucket is always larger since timeout < max_bucket
        let i = buckets
            .iter()
            .position(|&b| b > timeout)
            .unwrap_or(buckets.len() - 1);

        let too_close_above = buckets[i] - timeout < min_gap;
        let too_close_below = i > 0 && timeout - buckets[i - 1] < min_gap;
        if too_close_above || too_close_below {
            return buckets;
        }

        buckets.insert(i, timeout);
    }

    buckets
}
