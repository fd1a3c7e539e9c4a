use derive_new::new;
use serde::{Deserialize, Serialize};

use super::Timestamp;

/// Identifier of a video, unique per account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl From<&str> for VideoId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A video as returned by the listing endpoint.
///
/// Which of the optional fields are filled depends on the field-set that produced the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct VideoRecord {
    pub id: VideoId,
    #[new(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[new(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<Timestamp>,
    #[new(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[new(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    #[new(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct VideoStatistics {
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
}

impl VideoStatistics {
    pub fn with_views(view_count: u64) -> Self {
        Self {
            view_count,
            ..Self::default()
        }
    }
}

/// A listed video joined with its statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct AggregatedVideo {
    #[serde(flatten)]
    pub video: VideoRecord,
    pub statistics: VideoStatistics,
}

impl AggregatedVideo {
    pub fn view_count(&self) -> u64 {
        self.statistics.view_count
    }
}
