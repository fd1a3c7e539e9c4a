use std::time::Duration;

use async_trait::async_trait;
use snafu::{Location, Snafu};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("key `{key}` does not hold an integer"))]
    NotAnInteger {
        key: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("incrementing `{key}` by {by} overflows"))]
    Overflow {
        key: String,
        by: i64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("the store is unavailable: {message}"))]
    Unavailable {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// expire the key after this long
    pub ttl: Option<Duration>,
    /// only write when the key does not exist yet
    pub only_if_absent: bool,
}

impl SetOptions {
    pub fn expiring(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            only_if_absent: false,
        }
    }

    pub fn if_absent(self) -> Self {
        Self {
            only_if_absent: true,
            ..self
        }
    }
}

/// A managed key-value store with sorted sets, the way the leaderboard is persisted.
///
/// Implementations provide their own atomicity; [KeyValueStore::increment] and writes with
/// [SetOptions::only_if_absent] must be atomic.
#[async_trait]
pub trait KeyValueStore: std::fmt::Debug + Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write `value` under `key`, returning whether the write happened.
    async fn set(&self, key: &str, value: String, options: SetOptions) -> StoreResult<bool>;

    /// Remove `key`, returning whether it existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Add `by` to the integer at `key` (missing keys count as zero) and return the new value.
    async fn increment(&self, key: &str, by: i64) -> StoreResult<i64>;

    /// Set the score of `member` in the sorted set at `key`, overwriting any previous score.
    async fn zadd(&self, key: &str, member: &str, score: u64) -> StoreResult<()>;

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<u64>>;

    async fn zrem(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Members ordered by score, highest first; equal scores order by member.
    async fn zrange_desc(
        &self, key: &str, offset: usize, limit: usize,
    ) -> StoreResult<Vec<(String, u64)>>;

    /// Zero-based position of `member` in [KeyValueStore::zrange_desc] order.
    async fn zrank_desc(&self, key: &str, member: &str) -> StoreResult<Option<usize>>;

    async fn zcard(&self, key: &str) -> StoreResult<usize>;
}
