//! Single-request HTTP fetcher with a hard wall-clock deadline.

use std::time::Duration;

use crate::error::FetchError;

/// Performs one outbound GET under a hard deadline, returning the raw body.
///
/// The deadline is enforced twice: as the reqwest per-request timeout and as an
/// outer [`tokio::time::timeout`] covering connect, headers, and body read, so
/// a slow-trickling body cannot hold a pipeline past the deadline.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    /// Fetch `url` with the given extra headers. Non-2xx is an error carrying
    /// the status code; deadline overruns surface as [`FetchError::Timeout`].
    pub async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Vec<u8>, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let deadline = self.timeout;
        let exchange = async move {
            let response =
                request.send().await.map_err(|e| classify_reqwest_error(e, deadline))?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    reason: status.canonical_reason().unwrap_or("unknown").to_string(),
                });
            }
            let body = response
                .bytes()
                .await
                .map_err(|e| classify_reqwest_error(e, deadline))?;
            Ok(body.to_vec())
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }
}

fn classify_reqwest_error(err: reqwest::Error, deadline: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(deadline)
    } else {
        FetchError::Network(err.to_string())
    }
}
