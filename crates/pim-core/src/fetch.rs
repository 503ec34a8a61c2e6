//! Artifact fetching.
//!
//! `Fetcher` streams a URL's body into a writer. The default implementation
//! uses libcurl (via the `curl` crate), which serves `http`, `https` and
//! `file` URLs alike. Fetches are blocking; batch installs run them on
//! blocking worker tasks.

use std::io::{self, Write};
use std::time::Duration;

use url::Url;

use crate::config::PimConfig;
use crate::error::Error;

/// Source of artifact bytes.
pub trait Fetcher: Send + Sync {
    /// Streams the body of `url` into `out` and returns the number of bytes written.
    ///
    /// A failure to write into `out` is a local error and must surface as
    /// `Error::Permission` labelled with `out_label`; everything else is `Error::Fetch`.
    fn fetch(&self, url: &Url, out: &mut dyn Write, out_label: &std::path::Path) -> Result<u64, Error>;
}

/// Transport settings for `CurlFetcher`.
#[derive(Debug, Clone)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self::from_config(&PimConfig::default())
    }
}

impl CurlOptions {
    pub fn from_config(cfg: &PimConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            timeout: Duration::from_secs(cfg.timeout_secs),
            user_agent: cfg
                .user_agent
                .clone()
                .unwrap_or_else(|| format!("pim/{}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

/// libcurl-backed fetcher.
#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    opts: CurlOptions,
}

impl CurlFetcher {
    pub fn new(opts: CurlOptions) -> Self {
        Self { opts }
    }
}

fn curl_err(url: &Url, e: curl::Error) -> Error {
    Error::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

/// True if the scheme carries an HTTP status code worth checking.
fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

impl Fetcher for CurlFetcher {
    fn fetch(&self, url: &Url, out: &mut dyn Write, out_label: &std::path::Path) -> Result<u64, Error> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url.as_str()).map_err(|e| curl_err(url, e))?;
        easy.follow_location(true).map_err(|e| curl_err(url, e))?;
        easy.max_redirections(10).map_err(|e| curl_err(url, e))?;
        easy.connect_timeout(self.opts.connect_timeout)
            .map_err(|e| curl_err(url, e))?;
        easy.timeout(self.opts.timeout).map_err(|e| curl_err(url, e))?;
        easy.useragent(&self.opts.user_agent)
            .map_err(|e| curl_err(url, e))?;

        let mut written = 0u64;
        let mut write_err: Option<io::Error> = None;
        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| match out.write_all(data) {
                    Ok(()) => {
                        written += data.len() as u64;
                        Ok(data.len())
                    }
                    Err(e) => {
                        write_err = Some(e);
                        Ok(0) // abort transfer
                    }
                })
                .map_err(|e| curl_err(url, e))?;
            transfer.perform()
        };

        if let Some(e) = write_err {
            return Err(Error::permission(out_label, format!("write: {e}")));
        }
        performed.map_err(|e| curl_err(url, e))?;

        if is_http(url) {
            let code = easy.response_code().map_err(|e| curl_err(url, e))?;
            if !(200..300).contains(&code) {
                return Err(Error::Fetch {
                    url: url.to_string(),
                    reason: format!("HTTP {code}"),
                });
            }
        }
        out.flush()
            .map_err(|e| Error::permission(out_label, format!("flush: {e}")))?;
        Ok(written)
    }
}
