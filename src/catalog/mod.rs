pub mod models;
#[cfg(test)]
pub mod testing;
pub mod transport;

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::config::Settings;
use crate::error::CatalogError;
use models::{Credits, DiscoverPage, GenreEntry, GenreList, RawMovie};
use transport::{Reply, Transport};

const GENRES_PATH: &str = "/genre/movie/list";
const DISCOVER_PATH: &str = "/discover/movie";

/// Result of asking the discovery feed for one page.
#[derive(Debug)]
pub enum PageOutcome {
    Records(Vec<RawMovie>),
    EndOfStream,
}

/// Backoff settings for 429 handling.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub backoff: Duration,
    pub backoff_max: Duration,
    pub max_attempts: u32,
    pub detail_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        RetryPolicy {
            backoff: settings.page_backoff(),
            backoff_max: settings.page_backoff_max(),
            max_attempts: settings.page_max_attempts,
            detail_backoff: settings.detail_backoff(),
        }
    }

    /// Delay before retry number `attempt` (0-based), doubling up to the cap.
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff.saturating_mul(factor).min(self.backoff_max)
    }
}

pub struct CatalogClient<T> {
    transport: T,
    sort_by: String,
    retry: RetryPolicy,
}

impl<T: Transport> CatalogClient<T> {
    pub fn new(transport: T, sort_by: &str, retry: RetryPolicy) -> Self {
        CatalogClient {
            transport,
            sort_by: sort_by.to_string(),
            retry,
        }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Full genre list. Must be loaded before any movie references it.
    pub async fn fetch_taxonomy(&self) -> Result<Vec<GenreEntry>, CatalogError> {
        let reply = self.get_with_backoff(GENRES_PATH, &[]).await?;
        let list: GenreList = decode(GENRES_PATH, &reply)?;
        Ok(list.genres)
    }

    pub async fn fetch_page(&self, page: u32) -> Result<PageOutcome, CatalogError> {
        let query = [("page", page.to_string()), ("sort_by", self.sort_by.clone())];
        let reply = self.get_with_backoff(DISCOVER_PATH, &query).await?;
        let parsed: DiscoverPage = decode(DISCOVER_PATH, &reply)?;
        if parsed.results.is_empty() {
            return Ok(PageOutcome::EndOfStream);
        }
        Ok(PageOutcome::Records(parsed.results))
    }

    /// Credits for one movie. A 429 gets exactly one retry.
    pub async fn fetch_detail(&self, movie_id: i64) -> Result<Credits, CatalogError> {
        let path = format!("/movie/{}/credits", movie_id);
        let mut reply = self.transport.get(&path, &[]).await?;
        if reply.is_rate_limited() {
            warn!(
                "Rate limited on credits for movie {}, retrying once in {:.1}s",
                movie_id,
                self.retry.detail_backoff.as_secs_f64()
            );
            tokio::time::sleep(self.retry.detail_backoff).await;
            reply = self.transport.get(&path, &[]).await?;
            if reply.is_rate_limited() {
                return Err(CatalogError::RateLimited { path, attempts: 2 });
            }
        }
        check_status(&path, &reply)?;
        decode(&path, &reply)
    }

    async fn get_with_backoff(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Reply, CatalogError> {
        for attempt in 0..self.retry.max_attempts {
            let reply = self.transport.get(path, query).await?;
            if !reply.is_rate_limited() {
                check_status(path, &reply)?;
                return Ok(reply);
            }
            if attempt + 1 == self.retry.max_attempts {
                break;
            }
            let backoff = self.retry.delay(attempt);
            warn!(
                "Rate limited on {} (attempt {}/{}), backing off {:.1}s",
                path,
                attempt + 1,
                self.retry.max_attempts,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
        }
        Err(CatalogError::RateLimited {
            path: path.to_string(),
            attempts: self.retry.max_attempts,
        })
    }
}

fn check_status(path: &str, reply: &Reply) -> Result<(), CatalogError> {
    if reply.is_success() {
        return Ok(());
    }
    Err(CatalogError::Status {
        path: path.to_string(),
        status: reply.status,
        body: reply.body.chars().take(200).collect(),
    })
}

fn decode<D: DeserializeOwned>(path: &str, reply: &Reply) -> Result<D, CatalogError> {
    serde_json::from_str(&reply.body).map_err(|source| CatalogError::Decode {
        path: path.to_string(),
        source,
    })
}
