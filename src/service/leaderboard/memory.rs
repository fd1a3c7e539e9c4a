use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use snafu::OptionExt as _;
use tokio::time::Instant;

use super::store::*;

#[derive(Debug, Clone)]
struct Value {
    text: String,
    expires_at: Option<Instant>,
}

impl Value {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process [KeyValueStore]. Every operation locks a single map shard, which keeps
/// increments and conditional writes atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<String, Value>,
    sorted: DashMap<String, HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ordered(&self, key: &str) -> Vec<(String, u64)> {
        let mut members: Vec<(String, u64)> = self
            .sorted
            .get(key)
            .map(|set| set.iter().map(|(m, s)| (m.clone(), *s)).collect())
            .unwrap_or_default();

        members.sort_by(|(a_member, a_score), (b_member, b_score)| {
            b_score.cmp(a_score).then_with(|| a_member.cmp(b_member))
        });
        members
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let value = self
            .values
            .get(key)
            .filter(|value| !value.is_expired(now))
            .map(|value| value.text.clone());

        if value.is_none() {
            self.values.remove_if(key, |_, value| value.is_expired(now));
        }

        Ok(value)
    }

    async fn set(&self, key: &str, text: String, options: SetOptions) -> StoreResult<bool> {
        let now = Instant::now();
        let value = Value {
            text,
            expires_at: options.ttl.map(|ttl| now + ttl),
        };

        match self.values.entry(key.to_string()) {
            Entry::Occupied(existing)
                if options.only_if_absent && !existing.get().is_expired(now) =>
            {
                Ok(false)
            }
            Entry::Occupied(mut existing) => {
                existing.insert(value);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(value);
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let removed_value = self.values.remove(key).is_some();
        let removed_set = self.sorted.remove(key).is_some();
        Ok(removed_value || removed_set)
    }

    async fn increment(&self, key: &str, by: i64) -> StoreResult<i64> {
        let now = Instant::now();
        let mut entry = self.values.entry(key.to_string()).or_insert_with(|| Value {
            text: "0".to_string(),
            expires_at: None,
        });

        if entry.is_expired(now) {
            *entry = Value {
                text: "0".to_string(),
                expires_at: None,
            };
        }

        let current: i64 = entry.text.parse().ok().context(NotAnIntegerSnafu { key })?;
        let next = current
            .checked_add(by)
            .context(OverflowSnafu { key, by })?;
        entry.text = next.to_string();

        Ok(next)
    }

    async fn zadd(&self, key: &str, member: &str, score: u64) -> StoreResult<()> {
        self.sorted
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<u64>> {
        Ok(self
            .sorted
            .get(key)
            .and_then(|set| set.get(member).copied()))
    }

    async fn zrem(&self, key: &str, member: &str) -> StoreResult<bool> {
        Ok(self
            .sorted
            .get_mut(key)
            .is_some_and(|mut set| set.remove(member).is_some()))
    }

    async fn zrange_desc(
        &self, key: &str, offset: usize, limit: usize,
    ) -> StoreResult<Vec<(String, u64)>> {
        Ok(self
            .ordered(key)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn zrank_desc(&self, key: &str, member: &str) -> StoreResult<Option<usize>> {
        Ok(self
            .ordered(key)
            .iter()
            .position(|(candidate, _)| candidate == member))
    }

    async fn zcard(&self, key: &str) -> StoreResult<usize> {
        Ok(self.sorted.get(key).map(|set| set.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn set_if_absent_only_writes_once() {
        let store = MemoryStore::new();
        let options = SetOptions::default().if_absent();

        assert!(store.set("k", "1".into(), options).await.unwrap());
        assert!(!store.set("k", "2".into(), options).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_keys_disappear() {
        let store = MemoryStore::new();
        let options = SetOptions::expiring(Duration::from_secs(10)).if_absent();

        assert!(store.set("rate", "1".into(), options).await.unwrap());
        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(store.get("rate").await.unwrap(), None);
        assert!(store.set("rate", "1".into(), options).await.unwrap());
    }

    #[tokio::test]
    async fn increment_starts_from_zero() {
        let store = MemoryStore::new();

        assert_eq!(store.increment("n", 1).await.unwrap(), 1);
        assert_eq!(store.increment("n", 5).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn increment_rejects_text() {
        let store = MemoryStore::new();
        store.set("n", "abc".into(), SetOptions::default()).await.unwrap();

        let err = store.increment("n", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::NotAnInteger { .. }));
    }

    #[tokio::test]
    async fn increment_refuses_to_wrap() {
        let store = MemoryStore::new();
        store
            .set("n", i64::MAX.to_string(), SetOptions::default())
            .await
            .unwrap();

        let err = store.increment("n", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Overflow { .. }), "{err:?}");
        assert_eq!(store.get("n").await.unwrap(), Some(i64::MAX.to_string()));
    }

    #[tokio::test]
    async fn sorted_set_orders_by_score_then_member() {
        let store = MemoryStore::new();
        store.zadd("z", "carol", 10).await.unwrap();
        store.zadd("z", "alice", 30).await.unwrap();
        store.zadd("z", "bob", 10).await.unwrap();
        store.zadd("z", "carol", 5).await.unwrap();

        let all = store.zrange_desc("z", 0, 10).await.unwrap();
        assert_eq!(
            all,
            vec![
                ("alice".to_string(), 30),
                ("bob".to_string(), 10),
                ("carol".to_string(), 5)
            ]
        );
        assert_eq!(store.zrank_desc("z", "carol").await.unwrap(), Some(2));
        assert_eq!(store.zrange_desc("z", 1, 1).await.unwrap().len(), 1);
        assert_eq!(store.zcard("z").await.unwrap(), 3);

        assert!(store.zrem("z", "bob").await.unwrap());
        assert!(!store.zrem("z", "bob").await.unwrap());
        assert_eq!(store.zscore("z", "bob").await.unwrap(), None);
    }
}
