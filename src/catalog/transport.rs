use std::time::Duration;

use async_trait::async_trait;

use crate::config::AuthMode;
use crate::error::CatalogError;

/// Status code and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// One authenticated GET against the catalog. Retries live above this.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Reply, CatalogError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    auth_mode: AuthMode,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        api_key: &str,
        auth_mode: AuthMode,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(HttpTransport {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            auth_mode,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Reply, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .query(query);

        req = match self.auth_mode {
            AuthMode::Bearer => req.bearer_auth(&self.api_key),
            AuthMode::QueryKey => req.query(&[("api_key", self.api_key.as_str())]),
        };

        let transport_err = |source| CatalogError::Transport {
            path: path.to_string(),
            source,
        };
        let response = req.send().await.map_err(transport_err)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_err)?;
        Ok(Reply { status, body })
    }
}
