//! Broker metrics
//!
//! Emitted through the `metrics` facade. Without an installed recorder these
//! are no-ops, so the host process decides whether and where they land.
//!
//! - `broker_token_requests_total` (counter): label `source` = `cache` | `exchange` | `coalesced`
//! - `broker_exchange_failures_total` (counter): label `reason`
//! - `broker_credential_wipes_total` (counter)

/// Record a `get_token()` call and how it was served.
pub fn record_token_request(source: &'static str) {
    metrics::counter!("broker_token_requests_total", "source" => source).increment(1);
}

/// Record a failed exchange with a short reason label.
pub fn record_exchange_failure(reason: &'static str) {
    metrics::counter!("broker_exchange_failures_total", "reason" => reason).increment(1);
}

/// Record a credential wipe triggered by an unauthorized response.
pub fn record_credential_wipe() {
    metrics::counter!("broker_credential_wipes_total").increment(1);
}
