//! Remote JWK set retrieval over HTTP.

use std::io::Read;
use std::sync::Arc;

use time::OffsetDateTime;
use url::Url;

use super::{JWKSetSource, SourceError};
use crate::jwk::JWKSet;

/// Fetches a JWK set from an HTTPS endpoint with connect/read timeouts and
/// a response size cap. Transport failures are transient
/// ([`SourceError::Unavailable`]); a body that is not a JWK set is fatal
/// ([`SourceError::Parse`]).
pub struct UrlJWKSetSource {
    url: Url,
    client: reqwest::blocking::Client,
    size_limit: usize,
}

impl UrlJWKSetSource {
    pub fn new(
        url: Url,
        connect_timeout: std::time::Duration,
        read_timeout: std::time::Duration,
        size_limit: usize,
    ) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|e| SourceError::Unavailable(format!("HTTP client setup failed: {e}")))?;
        Ok(UrlJWKSetSource {
            url,
            client,
            size_limit,
        })
    }

    /// The endpoint this source reads from.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl JWKSetSource for UrlJWKSetSource {
    fn jwk_set(
        &self,
        _force_refresh: bool,
        _now: OffsetDateTime,
    ) -> Result<Arc<JWKSet>, SourceError> {
        tracing::debug!(url = %self.url, "fetching JWK set");
        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "unexpected HTTP status {status}"
            )));
        }

        // content-type sniff: a JSON flavor or nothing at all
        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if !content_type.contains("json") {
                return Err(SourceError::Parse(format!(
                    "unexpected content type `{content_type}`"
                )));
            }
        }

        let mut body = Vec::new();
        response
            .take(self.size_limit as u64 + 1)
            .read_to_end(&mut body)
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        if body.len() > self.size_limit {
            return Err(SourceError::Unavailable(format!(
                "response exceeds the size limit of {} bytes",
                self.size_limit
            )));
        }

        let text =
            std::str::from_utf8(&body).map_err(|_| SourceError::Parse("not UTF-8".to_string()))?;
        let set = JWKSet::parse(text).map_err(|e| SourceError::Parse(e.to_string()))?;
        Ok(Arc::new(set))
    }
}
