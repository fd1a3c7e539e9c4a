use serde::{Deserialize, Serialize};

use super::tiktok::TikTokError;
use crate::model::{AggregatedVideo, AggregationResult};

/// Sample total shown whenever live numbers are unavailable.
pub const PLACEHOLDER_TOTAL_VIEWS: u64 = 12_345_678;
pub const PLACEHOLDER_VIDEO_COUNT: usize = 42;

/// How a pipeline run ended, from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    LiveSuccess,
    EmptyAccount,
    Unauthorized,
    TokenExchangeError,
    ProviderError,
    NetworkError,
    ConfigError,
}

impl Outcome {
    pub fn classify(result: &Result<AggregationResult, TikTokError>) -> Outcome {
        match result {
            Ok(result) if result.video_count > 0 => Outcome::LiveSuccess,
            Ok(_) => Outcome::EmptyAccount,
            Err(err) => Outcome::from_error(err),
        }
    }

    pub fn from_error(err: &TikTokError) -> Outcome {
        match err {
            TikTokError::Configuration { .. } => Outcome::ConfigError,
            TikTokError::TokenExchange { .. } => Outcome::TokenExchangeError,
            TikTokError::Unauthorized { .. } => Outcome::Unauthorized,
            TikTokError::Network { .. } => Outcome::NetworkError,
            TikTokError::Provider { .. }
            | TikTokError::Decode { .. }
            | TikTokError::AggregationInvariant { .. } => Outcome::ProviderError,
        }
    }

    /// Whether the numbers come from the provider.
    pub fn is_live_data(self) -> bool {
        matches!(self, Outcome::LiveSuccess | Outcome::EmptyAccount)
    }

    /// Degraded outcomes show the sample total instead of an error screen.
    pub fn uses_placeholder(self) -> bool {
        matches!(self, Outcome::Unauthorized | Outcome::ConfigError)
    }

    pub fn message(self) -> &'static str {
        match self {
            Outcome::LiveSuccess => "Live data fetched from TikTok.",
            Outcome::EmptyAccount => "Your account has no public videos yet.",
            Outcome::Unauthorized => {
                "Unable to fetch live data, this is expected while the app is in sandbox mode. Showing sample data instead."
            }
            Outcome::TokenExchangeError => {
                "Your TikTok login could not be completed. Please sign in again."
            }
            Outcome::ProviderError => "TikTok returned an error while fetching your videos.",
            Outcome::NetworkError => "Could not reach TikTok. Please try again in a moment.",
            Outcome::ConfigError => {
                "TikTok login is not configured on this server. Showing sample data instead."
            }
        }
    }
}

/// The uniform result handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewsEnvelope {
    pub total_views: u64,
    pub video_count: usize,
    pub is_live_data: bool,
    pub is_placeholder: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<Outcome>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub videos: Option<Vec<AggregatedVideo>>,
}

/// Turn a pipeline result into the envelope. `per_video` keeps the per-video breakdown.
pub fn present(result: Result<AggregationResult, TikTokError>, per_video: bool) -> ViewsEnvelope {
    let outcome = Outcome::classify(&result);

    if let Err(err) = &result {
        tracing::warn!(outcome = ?outcome, error = %err, "pipeline did not produce live data");
    }

    let (total_views, video_count, videos) = match result {
        Ok(result) => (result.total_views, result.video_count, Some(result.videos)),
        Err(_) if outcome.uses_placeholder() => {
            (PLACEHOLDER_TOTAL_VIEWS, PLACEHOLDER_VIDEO_COUNT, None)
        }
        Err(_) => (0, 0, None),
    };

    ViewsEnvelope {
        total_views,
        video_count,
        is_live_data: outcome.is_live_data(),
        is_placeholder: outcome.uses_placeholder(),
        error_kind: (outcome != Outcome::LiveSuccess).then_some(outcome),
        message: outcome.message().to_string(),
        videos: videos.filter(|_| per_video),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use snafu::Location;

    use super::*;
    use crate::model::{aggregate, StatisticsMap, VideoRecord, VideoStatistics};
    use crate::service::tiktok::Endpoint;

    fn location() -> Location {
        Location::new(file!(), line!(), column!())
    }

    fn live() -> AggregationResult {
        let videos = vec![VideoRecord::new("v1".into()), VideoRecord::new("v2".into())];
        let statistics: StatisticsMap = [("v1".into(), VideoStatistics::with_views(100))]
            .into_iter()
            .collect();
        aggregate(&videos, &statistics)
    }

    #[test]
    fn live_result_is_reported_as_is() {
        let envelope = present(Ok(live()), false);

        assert_eq!(envelope.total_views, 100);
        assert_eq!(envelope.video_count, 2);
        assert!(envelope.is_live_data);
        assert!(!envelope.is_placeholder);
        assert_eq!(envelope.error_kind, None);
        assert_eq!(envelope.videos, None);
    }

    #[test]
    fn per_video_breakdown_is_optional() {
        let envelope = present(Ok(live()), true);
        assert_eq!(envelope.videos.map(|v| v.len()), Some(2));
    }

    #[test]
    fn empty_account_is_live_but_flagged() {
        let envelope = present(Ok(AggregationResult::default()), false);

        assert_eq!(envelope.total_views, 0);
        assert!(envelope.is_live_data);
        assert_eq!(envelope.error_kind, Some(Outcome::EmptyAccount));
    }

    #[test]
    fn unauthorized_falls_back_to_placeholder() {
        let err = TikTokError::Unauthorized {
            endpoint: Endpoint::VideoList,
            details: json!({}),
            location: location(),
        };
        let envelope = present(Err(err), false);

        assert_eq!(envelope.total_views, PLACEHOLDER_TOTAL_VIEWS);
        assert_eq!(envelope.video_count, PLACEHOLDER_VIDEO_COUNT);
        assert!(!envelope.is_live_data);
        assert!(envelope.is_placeholder);
        assert_eq!(envelope.error_kind, Some(Outcome::Unauthorized));
    }

    #[test]
    fn missing_configuration_falls_back_to_placeholder() {
        let err = TikTokError::Configuration {
            field: "TIKTOK_CLIENT_KEY",
            location: location(),
        };
        let envelope = present(Err(err), false);

        assert!(envelope.is_placeholder);
        assert_eq!(envelope.error_kind, Some(Outcome::ConfigError));
    }

    #[test]
    fn provider_failures_are_explicit_errors() {
        let err = TikTokError::Provider {
            endpoint: Endpoint::VideoQuery,
            status: 500,
            details: json!("boom"),
            location: location(),
        };
        let envelope = present(Err(err), false);

        assert_eq!(envelope.total_views, 0);
        assert!(!envelope.is_live_data);
        assert!(!envelope.is_placeholder);
        assert_eq!(envelope.error_kind, Some(Outcome::ProviderError));
    }

    #[test]
    fn invariant_breach_counts_as_provider_error() {
        let err = TikTokError::AggregationInvariant {
            reason: "statistics entry without an id".to_string(),
            location: location(),
        };
        assert_eq!(Outcome::from_error(&err), Outcome::ProviderError);
    }

    #[test]
    fn every_outcome_has_its_own_message() {
        let outcomes = [
            Outcome::LiveSuccess,
            Outcome::EmptyAccount,
            Outcome::Unauthorized,
            Outcome::TokenExchangeError,
            Outcome::ProviderError,
            Outcome::NetworkError,
            Outcome::ConfigError,
        ];
        let messages: std::collections::HashSet<_> =
            outcomes.iter().map(|outcome| outcome.message()).collect();

        assert_eq!(messages.len(), outcomes.len());
    }

    #[test]
    fn envelope_serializes_in_camel_case() {
        let value = serde_json::to_value(present(Ok(AggregationResult::default()), false)).unwrap();

        assert_eq!(value["totalViews"], 0);
        assert_eq!(value["isLiveData"], true);
        assert_eq!(value["errorKind"], "empty_account");
        assert!(value.get("videos").is_none());
    }
}
