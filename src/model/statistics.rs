use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{VideoId, VideoStatistics};

/// Statistics keyed by video id, as produced by the statistics endpoint.
///
/// Looking up an id that has no entry yields zeroed statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatisticsMap(HashMap<VideoId, VideoStatistics>);

impl StatisticsMap {
    pub fn get(&self, id: &VideoId) -> VideoStatistics {
        self.0.get(id).copied().unwrap_or_default()
    }

    pub fn contains(&self, id: &VideoId) -> bool {
        self.0.contains_key(id)
    }

    pub fn insert(&mut self, id: VideoId, statistics: VideoStatistics) {
        self.0.insert(id, statistics);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(VideoId, VideoStatistics)> for StatisticsMap {
    fn from_iter<T: IntoIterator<Item = (VideoId, VideoStatistics)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
