use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Timeout for one outbound hop to a peer agent.
pub const AGENT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Global shared HTTP client singleton.
///
/// Reuses a single connection pool across connectors and the LLM client.
/// Callers needing a different timeout override it per request via `.timeout()`.
static SHARED_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .pool_max_idle_per_host(5)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(Duration::from_secs(120))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        })
});

/// Returns a reference to the global shared HTTP client.
pub fn shared_client() -> &'static Client {
    &SHARED_CLIENT
}
