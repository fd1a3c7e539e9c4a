use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{AggregatedVideo, Cursor, StatisticsMap, VideoId, VideoRecord};

/// Total views across every aggregated video, plus the per-video breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub total_views: u64,
    pub video_count: usize,
    pub cursor: Option<Cursor>,
    pub has_more: bool,
    pub videos: Vec<AggregatedVideo>,
}

/// Join `videos` with `statistics` and sum their views.
///
/// Videos without a statistics entry count as zero views.
pub fn aggregate(videos: &[VideoRecord], statistics: &StatisticsMap) -> AggregationResult {
    let mut aggregator = Aggregator::default();
    aggregator.push_page(videos, statistics);
    aggregator.finish(None, false)
}

/// Running aggregation over several listing pages.
///
/// A video id already seen on an earlier page is skipped, so pages that overlap never count a
/// video twice.
#[derive(Debug, Default)]
pub struct Aggregator {
    seen: HashSet<VideoId>,
    videos: Vec<AggregatedVideo>,
}

impl Aggregator {
    pub fn push_page(&mut self, videos: &[VideoRecord], statistics: &StatisticsMap) {
        for video in videos {
            if !self.seen.insert(video.id.clone()) {
                tracing::debug!("skipping duplicate video `{}`", video.id);
                continue;
            }

            let statistics = statistics.get(&video.id);
            self.videos
                .push(AggregatedVideo::new(video.clone(), statistics));
        }
    }

    pub fn finish(self, cursor: Option<Cursor>, has_more: bool) -> AggregationResult {
        let total_views = self
            .videos
            .iter()
            .map(AggregatedVideo::view_count)
            .fold(0, u64::saturating_add);

        AggregationResult {
            total_views,
            video_count: self.videos.len(),
            cursor,
            has_more,
            videos: self.videos,
        }
    }
}
