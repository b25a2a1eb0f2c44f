use anyhow::{bail, Context, Result};
use colored::*;
use std::time::Duration;
use tracing::info;

/// Fixed deadline for the root-page fetch. No retries.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Fetches the HTML content of a URL.
pub async fn fetch_html(url: &str) -> Result<String> {
    info!("Fetching: {}", url.green());

    let client = reqwest::Client::builder()
        .user_agent(concat!("sdxbook/", env!("CARGO_PKG_VERSION")))
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

    if !response.status().is_success() {
        bail!("Fetching {} returned {}", url, response.status());
    }

    response
        .text()
        .await
        .with_context(|| format!("Failed to read body of {}", url))
}
