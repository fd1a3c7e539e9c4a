use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use snafu::{ensure, Location, ResultExt as _, Snafu};
use tracing::instrument;

use crate::model::{now, LeaderboardEntry, Rank, RankedEntry, Timestamp};

pub use memory::*;
pub use store::*;

mod memory;
mod store;

const SCORES_KEY: &str = "tv:leaderboard:zset";
const SUBMISSIONS_KEY: &str = "tv:stats:submissions";
const MAX_PAGE: usize = 100;

fn profile_key(username: &str) -> String {
    format!("tv:user:{username}")
}

fn rate_key(username: &str) -> String {
    format!("tv:rate:{username}")
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LeaderboardError {
    #[snafu(display("invalid submission: {reason}"))]
    InvalidSubmission { reason: &'static str },

    #[snafu(display("`{username}` submitted too recently"))]
    Throttled { username: String },

    #[snafu(display("leaderboard storage failed: {source}"))]
    Storage {
        source: StoreError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("profile of `{username}` is not valid JSON: {source}"))]
    ProfileFormat {
        username: String,
        source: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

/// What a creator sends to publish their total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub username: String,
    pub display_name: String,
    pub total_views: u64,
    #[serde(default)]
    pub video_count: u64,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    #[serde(flatten)]
    pub rank: Rank,
    pub is_update: bool,
}

/// Everything but the score, which lives in the sorted set.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Profile {
    display_name: String,
    video_count: u64,
    #[serde(default)]
    avatar_url: Option<String>,
    submitted_at: Timestamp,
}

/// The shared leaderboard, persisted in an injected [KeyValueStore].
#[derive(Debug, Clone)]
pub struct Leaderboard {
    store: Arc<dyn KeyValueStore>,
    throttle: Duration,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn KeyValueStore>, throttle: Duration) -> Self {
        Self { store, throttle }
    }

    pub fn in_memory(throttle: Duration) -> Self {
        Self::new(Arc::new(MemoryStore::new()), throttle)
    }

    /// Publish (or overwrite) a creator's total and return their new rank.
    #[instrument(skip(self), fields(username = %submission.username))]
    pub async fn submit(&self, submission: Submission) -> Result<SubmitReceipt, LeaderboardError> {
        let Submission {
            username,
            display_name,
            total_views,
            video_count,
            avatar_url,
        } = submission;

        ensure!(
            !username.trim().is_empty(),
            InvalidSubmissionSnafu {
                reason: "username is required"
            }
        );
        ensure!(
            !display_name.trim().is_empty(),
            InvalidSubmissionSnafu {
                reason: "display_name is required"
            }
        );

        let allowed = self
            .store
            .set(
                &rate_key(&username),
                "1".to_string(),
                SetOptions::expiring(self.throttle).if_absent(),
            )
            .await
            .context(StorageSnafu)?;
        ensure!(allowed, ThrottledSnafu { username });

        let is_update = self
            .store
            .zscore(SCORES_KEY, &username)
            .await
            .context(StorageSnafu)?
            .is_some();

        let profile = Profile {
            display_name,
            video_count,
            avatar_url,
            submitted_at: now(),
        };
        let profile = serde_json::to_string(&profile).context(ProfileFormatSnafu {
            username: username.clone(),
        })?;
        self.store
            .set(&profile_key(&username), profile, SetOptions::default())
            .await
            .context(StorageSnafu)?;

        // the score goes in last so a listed user always has a profile
        self.store
            .zadd(SCORES_KEY, &username, total_views)
            .await
            .context(StorageSnafu)?;

        let submissions = self
            .store
            .increment(SUBMISSIONS_KEY, 1)
            .await
            .context(StorageSnafu)?;

        let rank = self.rank(&username).await?.unwrap_or(Rank {
            rank: 0,
            total_views,
        });

        tracing::info!(
            rank = rank.rank,
            total_views,
            is_update,
            submissions,
            "leaderboard submission stored"
        );

        Ok(SubmitReceipt { rank, is_update })
    }

    /// The 1-based rank of `username`, if listed.
    pub async fn rank(&self, username: &str) -> Result<Option<Rank>, LeaderboardError> {
        let Some(total_views) = self
            .store
            .zscore(SCORES_KEY, username)
            .await
            .context(StorageSnafu)?
        else {
            return Ok(None);
        };

        let position = self
            .store
            .zrank_desc(SCORES_KEY, username)
            .await
            .context(StorageSnafu)?;

        Ok(position.map(|position| Rank {
            rank: position + 1,
            total_views,
        }))
    }

    pub async fn is_listed(&self, username: &str) -> Result<bool, LeaderboardError> {
        Ok(self
            .store
            .zscore(SCORES_KEY, username)
            .await
            .context(StorageSnafu)?
            .is_some())
    }

    /// Take `username` off the board, returning whether they were on it.
    #[instrument(skip(self))]
    pub async fn remove(&self, username: &str) -> Result<bool, LeaderboardError> {
        let removed = self
            .store
            .zrem(SCORES_KEY, username)
            .await
            .context(StorageSnafu)?;
        self.store
            .delete(&profile_key(username))
            .await
            .context(StorageSnafu)?;

        tracing::info!(removed, "leaderboard entry removed");
        Ok(removed)
    }

    /// Entries ordered by total views, highest first. `limit` is clamped to 1..=100.
    pub async fn top(
        &self, limit: usize, offset: usize,
    ) -> Result<Vec<RankedEntry>, LeaderboardError> {
        let limit = limit.clamp(1, MAX_PAGE);
        let scores = self
            .store
            .zrange_desc(SCORES_KEY, offset, limit)
            .await
            .context(StorageSnafu)?;

        let mut entries = Vec::with_capacity(scores.len());
        for (index, (username, total_views)) in scores.into_iter().enumerate() {
            let Some(profile) = self
                .store
                .get(&profile_key(&username))
                .await
                .context(StorageSnafu)?
            else {
                tracing::warn!("`{}` has a score but no profile, skipping", username);
                continue;
            };

            let profile: Profile = serde_json::from_str(&profile).context(ProfileFormatSnafu {
                username: username.clone(),
            })?;

            entries.push(RankedEntry {
                rank: offset + index + 1,
                entry: LeaderboardEntry {
                    username,
                    display_name: profile.display_name,
                    total_views,
                    video_count: profile.video_count,
                    avatar_url: profile.avatar_url,
                    submitted_at: profile.submitted_at,
                },
            });
        }

        Ok(entries)
    }

    pub async fn len(&self) -> Result<usize, LeaderboardError> {
        self.store.zcard(SCORES_KEY).await.context(StorageSnafu)
    }

    pub async fn submissions(&self) -> Result<i64, LeaderboardError> {
        let count = self
            .store
            .get(SUBMISSIONS_KEY)
            .await
            .context(StorageSnafu)?;
        Ok(count.and_then(|count| count.parse().ok()).unwrap_or(0))
    }
}
