//! Shared HTTP plumbing for the network checks

use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use shipcheck_core::{Result, ShipcheckError};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("shipcheck/", env!("CARGO_PKG_VERSION"));

/// A fetched response: status plus the full body text
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// HTTP client with a hard per-request timeout
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ShipcheckError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// GET `url` with cache-busting headers, returning the response whatever its status
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| self.request_error(url, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.request_error(url, e))?;

        debug!("GET {} -> {} ({} bytes)", url, status, body.len());

        Ok(FetchedPage {
            url: url.to_string(),
            status,
            body,
        })
    }

    /// Like [`Fetcher::fetch`], but any status other than 200 is an error
    pub async fn fetch_ok(&self, url: &str) -> Result<FetchedPage> {
        let page = self.fetch(url).await?;
        if page.is_ok() {
            Ok(page)
        } else {
            Err(ShipcheckError::HttpStatus {
                url: url.to_string(),
                status: page.status,
            })
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> ShipcheckError {
        if e.is_timeout() {
            ShipcheckError::Timeout {
                operation: format!("GET {}", url),
                seconds: self.timeout.as_secs(),
            }
        } else {
            ShipcheckError::Http {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// Join a path such as `/version.json` onto a base URL
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://example.com/", "/version.json"),
            "https://example.com/version.json"
        );
        assert_eq!(
            join_url("https://example.com", "version.json"),
            "https://example.com/version.json"
        );
    }

    #[test]
    fn test_fetcher_keeps_timeout() {
        let fetcher = Fetcher::new(Duration::from_secs(10)).unwrap();
        assert_eq!(fetcher.timeout(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient_error() {
        let fetcher = Fetcher::new(Duration::from_secs(2)).unwrap();
        // Port 9 (discard) on localhost is closed in test environments
        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(err.is_transient());
    }
}
