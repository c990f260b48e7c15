//! REST client for fetching a mark snapshot from the hosted store.
//!
//! The store exposes a PostgREST API. A snapshot is fetched as:
//! - the acting user's mark rows (newest first)
//! - the friendship rows involving the user
//! - per friend, their profile (via RPC) and their mark rows, fetched with
//!   bounded concurrency while keeping friendship order
//!
//! 429 responses and transport errors are retried with exponential backoff.
//! A friend whose profile or rows cannot be loaded is skipped with a warning.

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::ingest::{FriendMarks, FriendProfile, MarkRow};

const MAX_RETRIES: u32 = 3;
const DEFAULT_MAX_CONCURRENCY: usize = 8;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Public API key sent as the `apikey` header
    pub api_key: String,
    /// Session token of the acting user (bearer auth)
    pub access_token: String,
    /// Table holding city marks.
    /// Default: `marques_villes`
    pub marks_table: String,
    /// Table holding friendships.
    /// Default: `amis`
    pub friendships_table: String,
    /// RPC returning a user's public profile.
    /// Default: `get_user_info_by_id`
    pub profile_rpc: String,
    /// Friends fetched concurrently.
    /// Default: 8
    pub max_concurrency: usize,
}

impl FetchConfig {
    pub fn new(base_url: &str, api_key: &str, access_token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token: access_token.to_string(),
            marks_table: "marques_villes".to_string(),
            friendships_table: "amis".to_string(),
            profile_rpc: "get_user_info_by_id".to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn rpc_url(&self) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, self.profile_rpc)
    }
}

/// Errors from snapshot fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} still rate limited after retrying")]
    RateLimited { url: String },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Rows fetched for one snapshot, not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub own_rows: Vec<MarkRow>,
    pub friends: Vec<FriendMarks>,
}

#[derive(Debug, Deserialize)]
struct FriendshipRow {
    auth_user_id_1: Option<String>,
    auth_user_id_2: Option<String>,
}

impl FriendshipRow {
    /// The party that is not `user_id`.
    fn other_party(&self, user_id: &str) -> Option<&str> {
        let (a, b) = (self.auth_user_id_1.as_deref()?, self.auth_user_id_2.as_deref()?);
        if a == user_id && b != user_id {
            Some(b)
        } else if b == user_id && a != user_id {
            Some(a)
        } else {
            None
        }
    }
}

/// Friend ids in friendship order, without duplicates.
fn friend_ids(rows: &[FriendshipRow], user_id: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::with_capacity(rows.len());
    for id in rows.iter().filter_map(|row| row.other_party(user_id)) {
        if !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// Delay before retrying a failed transport attempt: 400ms, 800ms, 1.6s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(200 * (1 << attempt.min(4)))
}

/// Tracks consecutive 429s across all in-flight requests.
struct RateLimitBackoff {
    consecutive_429s: AtomicU32,
}

impl RateLimitBackoff {
    fn new() -> Self {
        Self { consecutive_429s: AtomicU32::new(0) }
    }

    fn record_success(&self) {
        self.consecutive_429s.store(0, Ordering::Relaxed);
    }

    /// 1s, 2s, then 4s max.
    fn record_429(&self) -> Duration {
        let count = self.consecutive_429s.fetch_add(1, Ordering::Relaxed) + 1;
        Duration::from_millis(500 * (1 << count.min(3)))
    }
}

/// Fetches mark snapshots from the store.
pub struct SnapshotFetcher {
    client: Client,
    config: FetchConfig,
    backoff: RateLimitBackoff,
}

impl SnapshotFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.max_concurrency.max(1) * 2)
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            config,
            backoff: RateLimitBackoff::new(),
        })
    }

    /// Fetch the acting user's rows and every friend's rows.
    pub async fn fetch_snapshot(&self, user_id: &str) -> Result<RawSnapshot, FetchError> {
        let start = Instant::now();

        let own_rows = self.fetch_own_rows(user_id).await?;
        let friendships = self.fetch_friendships(user_id).await?;
        let ids = friend_ids(&friendships, user_id);

        info!(
            "[SnapshotFetcher] {} own rows, {} friends for user {}",
            own_rows.len(),
            ids.len(),
            user_id
        );

        let friends: Vec<FriendMarks> = stream::iter(ids)
            .map(|friend_id| async move {
                let result = self.fetch_friend(&friend_id).await;
                (friend_id, result)
            })
            .buffered(self.config.max_concurrency.max(1))
            .filter_map(|(friend_id, result)| async move {
                match result {
                    Ok(Some(friend)) => Some(friend),
                    Ok(None) => {
                        warn!("[SnapshotFetcher] No profile for friend {}, skipping", friend_id);
                        None
                    }
                    Err(e) => {
                        warn!("[SnapshotFetcher] Skipping friend {}: {}", friend_id, e);
                        None
                    }
                }
            })
            .collect()
            .await;

        info!(
            "[SnapshotFetcher] Snapshot for {} fetched in {:.2}s ({} friends loaded)",
            user_id,
            start.elapsed().as_secs_f64(),
            friends.len()
        );

        Ok(RawSnapshot { own_rows, friends })
    }

    async fn fetch_own_rows(&self, user_id: &str) -> Result<Vec<MarkRow>, FetchError> {
        let url = self.config.table_url(&self.config.marks_table);
        let owner = format!("eq.{}", user_id);
        self.execute(&url, || {
            self.client.get(&url).query(&[
                ("select", "*"),
                ("auth_user_id", owner.as_str()),
                ("order", "created_at.desc"),
            ])
        })
        .await
    }

    async fn fetch_friendships(&self, user_id: &str) -> Result<Vec<FriendshipRow>, FetchError> {
        let url = self.config.table_url(&self.config.friendships_table);
        let either = format!("(auth_user_id_1.eq.{0},auth_user_id_2.eq.{0})", user_id);
        self.execute(&url, || {
            self.client.get(&url).query(&[
                ("select", "auth_user_id_1,auth_user_id_2"),
                ("or", either.as_str()),
            ])
        })
        .await
    }

    /// Profile and rows of one friend, or `None` when the profile is missing.
    async fn fetch_friend(&self, friend_id: &str) -> Result<Option<FriendMarks>, FetchError> {
        let rpc_url = self.config.rpc_url();
        let body = serde_json::json!({ "user_id_search": friend_id });
        let profiles: Vec<FriendProfile> = self
            .execute(&rpc_url, || self.client.post(&rpc_url).json(&body))
            .await?;

        let Some(mut profile) = profiles.into_iter().next() else {
            return Ok(None);
        };
        profile.id = friend_id.to_string();

        let url = self.config.table_url(&self.config.marks_table);
        let owner = format!("eq.{}", friend_id);
        let rows: Vec<MarkRow> = self
            .execute(&url, || {
                self.client
                    .get(&url)
                    .query(&[("select", "*"), ("auth_user_id", owner.as_str())])
            })
            .await?;

        debug!("[SnapshotFetcher] Friend {}: {} rows", friend_id, rows.len());
        Ok(Some(FriendMarks { profile, rows }))
    }

    /// Send a request built by `build`, retrying on 429 and transport errors.
    async fn execute<T, F>(&self, url: &str, build: F) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;

        loop {
            let response = build()
                .header("apikey", &self.config.api_key)
                .bearer_auth(&self.config.access_token)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        retries += 1;
                        if retries > MAX_RETRIES {
                            return Err(FetchError::RateLimited { url: url.to_string() });
                        }
                        let wait = self.backoff.record_429();
                        warn!("[Fetch {}] 429 Too Many Requests, retry {} after {:?}", url, retries, wait);
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    self.backoff.record_success();

                    if !status.is_success() {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }

                    let bytes = resp.bytes().await.map_err(|source| FetchError::Transport {
                        url: url.to_string(),
                        source,
                    })?;
                    return serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
                        url: url.to_string(),
                        source,
                    });
                }
                Err(e) => {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        return Err(FetchError::Transport {
                            url: url.to_string(),
                            source: e,
                        });
                    }
                    let wait = backoff_delay(retries);
                    warn!("[Fetch {}] Error: {}, retry {} after {:?}", url, e, retries, wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

/// Synchronous wrapper for FFI and command-line callers.
pub fn fetch_snapshot_sync(config: FetchConfig, user_id: &str) -> Result<RawSnapshot, FetchError> {
    use tokio::runtime::Builder;

    info!("[FFI] fetch_snapshot_sync called for user {}", user_id);

    let rt = Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .map_err(FetchError::Runtime)?;

    let fetcher = SnapshotFetcher::new(config)?;
    rt.block_on(fetcher.fetch_snapshot(user_id))
}
