//! Metric names and the Prometheus recorder.

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const FORUM_VOTES: &str = "forum_votes_total";
pub const FORUM_REPORTS: &str = "forum_reports_total";
pub const ASSESSMENTS: &str = "assessments_total";
pub const CHAT_REQUESTS: &str = "chat_requests_total";
pub const RATE_LIMITED: &str = "rate_limited_total";

fn describe() {
    describe_counter!(FORUM_VOTES, "Votes applied to posts and comments.");
    describe_counter!(FORUM_REPORTS, "Content reports filed.");
    describe_counter!(ASSESSMENTS, "Assessment submissions accepted.");
    describe_counter!(CHAT_REQUESTS, "Chat requests answered or failed, by outcome.");
    describe_counter!(RATE_LIMITED, "Forum mutations refused by the rate limiter.");
}

/// Installs the global recorder. Call once at startup; the handle renders the
/// `/metrics` page.
pub fn install() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    Ok(handle)
}
