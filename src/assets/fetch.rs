//! Attachment download seam

use crate::error::FetchError;
use crate::extract::links::is_web_url;

#[cfg(feature = "http")]
pub use http::HttpFetcher;

/// `Accept` header sent with every attachment request
pub const ACCEPT_ATTACHMENTS: &str = "image/*,application/pdf;q=0.9,*/*;q=0.1";

/// A successfully downloaded body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl FetchedBody {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        FetchedBody {
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

pub type FetchResult = std::result::Result<FetchedBody, FetchError>;

/// Source of attachment bytes.
///
/// Implementations must be idempotent; results are cached per export.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> FetchResult;
}

impl<F> Fetcher for F
where
    F: Fn(&str) -> FetchResult + Send + Sync,
{
    fn fetch(&self, url: &str) -> FetchResult {
        self(url)
    }
}

/// Fetcher that never downloads anything; every attachment degrades to a link
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl Fetcher for OfflineFetcher {
    fn fetch(&self, url: &str) -> FetchResult {
        if !is_web_url(url) {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }
        Err(FetchError::Offline)
    }
}

#[cfg(feature = "http")]
mod http {
    use super::{FetchResult, FetchedBody, Fetcher, ACCEPT_ATTACHMENTS};
    use crate::config::ExportOptions;
    use crate::error::{ExportError, FetchError, Result};
    use crate::extract::links::is_web_url;
    use reqwest::blocking::Client;
    use reqwest::header::{ACCEPT, CONTENT_TYPE};
    use std::time::Duration;

    /// Blocking HTTP fetcher with a per-request timeout
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        client: Client,
        retries: u32,
    }

    impl HttpFetcher {
        pub fn new(timeout: Duration, retries: u32) -> Result<Self> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| ExportError::HttpClient(e.to_string()))?;
            Ok(HttpFetcher {
                client,
                retries: retries.min(1),
            })
        }

        pub fn from_options(options: &ExportOptions) -> Result<Self> {
            Self::new(options.fetch_timeout, options.fetch_retries)
        }

        fn fetch_once(&self, url: &str) -> FetchResult {
            let response = self
                .client
                .get(url)
                .header(ACCEPT, ACCEPT_ATTACHMENTS)
                .send()
                .map_err(|e| FetchError::Network(e.to_string()))?;

            let status = response.status();
            if status.is_client_error() || status.is_server_error() {
                return Err(FetchError::Status(status.as_u16()));
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let bytes = response
                .bytes()
                .map_err(|e| FetchError::Network(e.to_string()))?;

            if bytes.is_empty() {
                return Err(FetchError::EmptyBody);
            }

            Ok(FetchedBody {
                bytes: bytes.to_vec(),
                content_type,
            })
        }
    }

    impl Fetcher for HttpFetcher {
        fn fetch(&self, url: &str) -> FetchResult {
            if !is_web_url(url) {
                return Err(FetchError::InvalidUrl(url.to_string()));
            }

            let mut attempt = 0;
            loop {
                match self.fetch_once(url) {
                    Err(FetchError::Network(_)) | Err(FetchError::Status(500..=599))
                        if attempt < self.retries =>
                    {
                        attempt += 1;
                        log::debug!("retrying {} (attempt {})", url, attempt + 1);
                    }
                    result => return result,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_fetcher() {
        let fetcher = |url: &str| -> FetchResult {
            if url.ends_with(".pdf") {
                Ok(FetchedBody::new(b"%PDF-1.4".to_vec()).with_content_type("application/pdf"))
            } else {
                Err(FetchError::Status(404))
            }
        };
        assert_eq!(fetcher.fetch("https://x.example/a.pdf").unwrap().bytes, b"%PDF-1.4");
        assert_eq!(
            fetcher.fetch("https://x.example/a.png"),
            Err(FetchError::Status(404))
        );
    }

    #[test]
    fn test_offline_fetcher() {
        assert_eq!(
            OfflineFetcher.fetch("https://x.example/a.png"),
            Err(FetchError::Offline)
        );
        assert!(matches!(
            OfflineFetcher.fetch("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }
}
