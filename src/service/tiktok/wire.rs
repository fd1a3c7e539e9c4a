//! Shapes of the provider's JSON bodies. Everything optional is defaulted here so nothing
//! loosely typed travels past the client.

use serde::Deserialize;
use serde_with::{serde_as, DefaultOnNull};

use crate::model::{Cursor, Timestamp, VideoRecord, VideoStatistics};

#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<ApiStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ApiStatus {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ApiStatus {
    pub fn is_ok(&self) -> bool {
        self.code.is_empty() || self.code == "ok"
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub open_id: Option<String>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl TokenResponse {
    pub fn has_error(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.error) || present(&self.error_description)
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub(super) struct VideoListData {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub videos: Vec<RawVideo>,
    #[serde(default)]
    pub cursor: Option<Cursor>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawVideo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub create_time: Option<i64>,
    pub duration: Option<u64>,
    pub cover_image_url: Option<String>,
    pub share_url: Option<String>,
}

impl RawVideo {
    pub fn into_record(self) -> Option<VideoRecord> {
        let id = self.id.filter(|id| !id.is_empty())?;

        Some(VideoRecord {
            id: id.as_str().into(),
            title: self.title,
            create_time: self.create_time.and_then(Timestamp::from_unix),
            duration: self.duration,
            cover_image_url: self.cover_image_url,
            share_url: self.share_url,
        })
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub(super) struct VideoQueryData {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub videos: Vec<RawStatistics>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawStatistics {
    pub id: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub view_count: u64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub like_count: u64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub comment_count: u64,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub share_count: u64,
}

impl RawStatistics {
    pub fn statistics(&self) -> VideoStatistics {
        VideoStatistics::new(
            self.view_count,
            self.like_count,
            self.comment_count,
            self.share_count,
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct UserInfoData {
    #[serde(default)]
    pub user: RawUser,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawUser {
    pub open_id: Option<String>,
    pub union_id: Option<String>,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}
