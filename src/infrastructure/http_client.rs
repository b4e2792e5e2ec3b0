use std::time::Duration;

use once_cell::sync::Lazy;

static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .pool_max_idle_per_host(10)
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build reqwest client")
});

/// Shared outbound HTTP client, one connection pool for the whole process.
pub fn client() -> &'static reqwest::Client {
    &CLIENT
}
