//! Scripted catalog responses for tests.
//!
//! Each request key (`path`, or `path?page=N` for the discovery feed) holds a
//! queue of replies. Replies are consumed in order and the last one repeats,
//! so `[429, 200]` means "rate limited once, then fine forever". Unscripted
//! keys answer 404. `stall_on_credits_call(n)` makes the n-th credits request
//! hang forever, for cancelling a run at a known point.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::transport::{Reply, Transport};
use super::RetryPolicy;
use crate::error::CatalogError;

#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
    stall_at: Mutex<Option<usize>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, key: &str, status: u16, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(Reply {
                status,
                body: body.to_string(),
            });
    }

    pub fn script_genres(&self, genres: &[(i64, &str)]) {
        let genres: Vec<Value> = genres
            .iter()
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect();
        self.push("/genre/movie/list", 200, &json!({ "genres": genres }).to_string());
    }

    pub fn script_page(&self, page: u32, movies: &[Value]) {
        let body = json!({ "page": page, "results": movies, "total_pages": 500 });
        self.push(&page_key(page), 200, &body.to_string());
    }

    pub fn script_rate_limit_page(&self, page: u32) {
        self.push(&page_key(page), 429, r#"{"status_code":25}"#);
    }

    pub fn script_credits(&self, movie_id: i64, cast: &[Value], producers: &[(i64, &str, &str)]) {
        let crew: Vec<Value> = producers
            .iter()
            .map(|(id, name, job)| json!({ "id": id, "name": name, "job": job }))
            .collect();
        let body = json!({ "id": movie_id, "cast": cast, "crew": crew });
        self.push(&format!("/movie/{}/credits", movie_id), 200, &body.to_string());
    }

    pub fn stall_on_credits_call(&self, n: usize) {
        *self.stall_at.lock().unwrap() = Some(n);
    }

    pub fn calls_to(&self, key: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|k| *k == key).count()
    }

    pub fn page_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.starts_with("/discover/movie"))
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Reply, CatalogError> {
        let key = match query.iter().find(|(k, _)| *k == "page") {
            Some((_, page)) => format!("{}?page={}", path, page),
            None => path.to_string(),
        };
        let stall = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(key.clone());
            let credits_calls = calls.iter().filter(|k| k.ends_with("/credits")).count();
            key.ends_with("/credits") && *self.stall_at.lock().unwrap() == Some(credits_calls)
        };
        if stall {
            std::future::pending::<()>().await;
        }

        let mut replies = self.replies.lock().unwrap();
        let reply = match replies.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(reply.unwrap_or(Reply {
            status: 404,
            body: r#"{"status_code":34}"#.to_string(),
        }))
    }
}

fn page_key(page: u32) -> String {
    format!("/discover/movie?page={}", page)
}

pub fn instant_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        backoff: Duration::ZERO,
        backoff_max: Duration::ZERO,
        max_attempts,
        detail_backoff: Duration::ZERO,
    }
}

pub fn movie(id: i64, genre_ids: &[i64]) -> Value {
    json!({
        "id": id,
        "title": format!("Movie {}", id),
        "release_date": "2021-06-04",
        "popularity": 12.5,
        "vote_average": 7.1,
        "vote_count": 340,
        "overview": "A film.",
        "original_language": "en",
        "genre_ids": genre_ids,
    })
}

/// `n` cast entries with ids 1000.. and cast order descending, so ordering
/// has to come from the `order` field rather than list position.
pub fn cast(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            let order = (n - 1 - i) as i64;
            json!({
                "id": 1000 + order,
                "name": format!("Actor {}", order),
                "gender": 2,
                "character": format!("Role {}", order),
                "order": order,
            })
        })
        .collect()
}

/// Twenty distinct movies for `page`, ids `page * 100 ..`.
pub fn full_page(page: u32, genre_ids: &[i64]) -> Vec<Value> {
    (0..20)
        .map(|i| movie(page as i64 * 100 + i, genre_ids))
        .collect()
}
