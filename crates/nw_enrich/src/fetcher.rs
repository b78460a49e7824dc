use nw_core::{Error, Result};
use std::time::Duration;

/// The collect job probes quickly; the enrich job reads whole pages and
/// gets a little longer.
pub const COLLECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const ENRICH_TIMEOUT: Duration = Duration::from_secs(15);

pub struct FetchedPage {
    pub url: String,
    pub html: String,
}

/// The single I/O primitive every extractor shares. TLS verification stays
/// on; there is no insecure fallback.
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Fetches a page, folding DNS/connect failures, timeouts and non-2xx
    /// statuses into `Error::Connectivity`. The caller skips the article for
    /// this run; it stays eligible for the next one.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self.client.get(url).send().await.map_err(connectivity)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Connectivity(format!("{} returned {}", url, status)));
        }
        let html = response.text().await.map_err(connectivity)?;
        Ok(FetchedPage {
            url: url.to_string(),
            html,
        })
    }
}

fn connectivity(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Connectivity(format!("request timed out: {}", e))
    } else if e.is_connect() {
        Error::Connectivity(format!("connection failed: {}", e))
    } else {
        Error::Connectivity(e.to_string())
    }
}
