//! A single pooled `reqwest::Client` shared by the Tool Manager and LLM
//! Manager (spec §5: "pool size ≈ 100 total, ≈ 20 keep-alive, 30 s idle
//! expiry"). Grounded on `tool_source::web_tools_source::WebToolsSource::with_client`
//! — both take a pre-built client rather than constructing their own, so
//! every HTTP-speaking component in a process shares one pool.

use std::time::Duration;

/// Builds the process-wide pooled client. Panics only on a malformed
/// builder configuration (e.g. an invalid TLS backend), never at request
/// time.
pub fn build_shared_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(20)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .expect("building the shared HTTP client with static configuration cannot fail")
}
