use std::future::Future;
use std::time::Duration;

use derive_new::new;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;
use tracing::instrument;

use super::tiktok::{Result, TikTok, TikTokError, VideoPage};
use crate::model::{
    AccessToken, AggregationResult, Aggregator, AuthorizationCode, Cursor, StatisticsMap,
};

/// Upper bound on listing pages per run, guarding against a provider that keeps saying
/// `has_more`.
pub const MAX_PAGES: usize = 5;

/// One listing page with its statistics merged in.
#[derive(Debug, Clone)]
pub struct PageTotal {
    pub page: VideoPage,
    pub result: AggregationResult,
}

/// Runs the whole pipeline: list every page, fetch statistics for each page and sum the views.
#[derive(Debug, Clone, new)]
pub struct ViewCounter {
    tiktok: TikTok,
    page_size: u32,
    #[new(value = "Duration::from_millis(250)")]
    retry_delay: Duration,
}

impl ViewCounter {
    pub fn tiktok(&self) -> &TikTok {
        &self.tiktok
    }

    /// Exchange `code` and count the views of the account it grants access to.
    ///
    /// The exchange itself is never retried, the code is single-use.
    #[instrument(skip_all, fields(code = %code.masked()))]
    pub async fn count_views_with_code(
        &self, code: &AuthorizationCode, code_verifier: Option<&str>,
    ) -> Result<AggregationResult> {
        let grant = self.tiktok.exchange_token(code, code_verifier).await?;
        self.count_views(&grant.access_token).await
    }

    #[instrument(skip_all)]
    pub async fn count_views(&self, token: &AccessToken) -> Result<AggregationResult> {
        let mut aggregator = Aggregator::default();
        let mut cursor: Option<Cursor> = None;
        let mut has_more = false;

        for page_number in 1..=MAX_PAGES {
            let PageTotal { page, .. } = self
                .count_page_into(&mut aggregator, token, cursor.as_ref(), self.page_size)
                .await?;

            tracing::info!(
                page = page_number,
                videos = page.videos.len(),
                has_more = page.has_more,
                "counted a page of videos"
            );

            cursor = page.cursor;
            has_more = page.has_more;

            if !has_more {
                break;
            }

            if page_number == MAX_PAGES {
                tracing::warn!("stopping after {} pages although more are available", MAX_PAGES);
            }
        }

        let result = aggregator.finish(cursor, has_more);
        tracing::info!(
            total_views = result.total_views,
            videos = result.video_count,
            "finished counting views"
        );

        Ok(result)
    }

    /// List a single page and merge its statistics, without following the cursor.
    #[instrument(skip(self, token))]
    pub async fn count_page(
        &self, token: &AccessToken, cursor: Option<&Cursor>, page_size: u32,
    ) -> Result<PageTotal> {
        let mut aggregator = Aggregator::default();
        self.count_page_into(&mut aggregator, token, cursor, page_size)
            .await
    }

    async fn count_page_into(
        &self, aggregator: &mut Aggregator, token: &AccessToken, cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<PageTotal> {
        let page = self
            .retry_network(|| self.tiktok.list_videos_page(token, cursor, page_size))
            .await?;

        let ids = page.ids();
        let statistics: StatisticsMap = self
            .retry_network(|| self.tiktok.fetch_statistics(token, &ids))
            .await?;

        let mut page_aggregator = Aggregator::default();
        page_aggregator.push_page(&page.videos, &statistics);
        aggregator.push_page(&page.videos, &statistics);

        let result = page_aggregator.finish(page.cursor.clone(), page.has_more);
        Ok(PageTotal { page, result })
    }

    /// Run `action`, trying once more when it fails at the transport level.
    async fn retry_network<T, F, Fut>(&self, action: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let strategy = FixedInterval::new(self.retry_delay).take(1);

        RetryIf::spawn(strategy, action, |err: &TikTokError| {
            if err.is_network() {
                tracing::warn!(error = %err, "network failure, retrying once");
            }
            err.is_network()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use mockito::{Matcher, Server};
    use serde_json::json;
    use tokio::net::TcpListener;
    use url::Url;

    use super::*;
    use crate::config::TikTokConfig;
    use crate::model::VideoId;
    use crate::service::presenter::Outcome;
    use crate::service::tiktok::tests::{client_for, list_body, list_path, query_path, stats_body};
    use crate::service::tiktok::Endpoint;

    fn counter(tiktok: TikTok) -> ViewCounter {
        ViewCounter::new(tiktok, 20)
    }

    fn token() -> AccessToken {
        AccessToken::new("act.token")
    }

    /// A provider that accepts connections and never answers. With `hold` the connections stay
    /// open until the client gives up, otherwise they are closed right away.
    async fn unresponsive_provider(hold: bool, timeout: Duration) -> (TikTok, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = connections.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                if hold {
                    held.push(stream);
                }
            }
        });

        let config = TikTokConfig {
            api_base: Url::parse(&format!("http://{address}/")).unwrap(),
            timeout,
            ..TikTokConfig::default()
        };

        (TikTok::from_config(&config).unwrap(), connections)
    }

    #[tokio::test]
    async fn follows_the_cursor_across_pages() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("POST", list_path())
            .match_body(Matcher::PartialJson(json!({ "cursor": 0 })))
            .with_body(list_body(&["v1", "v2"], json!("c1"), true))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("POST", list_path())
            .match_body(Matcher::PartialJson(json!({ "cursor": "c1" })))
            .with_body(list_body(&["v3"], json!("c2"), false))
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", query_path())
            .match_body(Matcher::PartialJson(json!({ "filters": { "video_ids": ["v1", "v2"] } })))
            .with_body(stats_body(&[("v1", 10), ("v2", 20)]))
            .create_async()
            .await;
        server
            .mock("POST", query_path())
            .match_body(Matcher::PartialJson(json!({ "filters": { "video_ids": ["v3"] } })))
            .with_body(stats_body(&[("v3", 30)]))
            .create_async()
            .await;

        let result = counter(client_for(&server))
            .count_views(&token())
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(result.total_views, 60);
        assert_eq!(result.video_count, 3);
        assert!(!result.has_more);
        assert_eq!(result.cursor, Some(Cursor::new("c2")));

        let ids: Vec<VideoId> = result.videos.iter().map(|v| v.video.id.clone()).collect();
        assert_eq!(ids, vec!["v1".into(), "v2".into(), "v3".into()]);
    }

    #[tokio::test]
    async fn stops_after_the_page_cap() {
        let mut server = Server::new_async().await;
        let list = server
            .mock("POST", list_path())
            .with_body(list_body(&["v1"], json!(1), true))
            .expect(MAX_PAGES)
            .create_async()
            .await;
        let stats = server
            .mock("POST", query_path())
            .with_body(stats_body(&[("v1", 7)]))
            .expect(MAX_PAGES)
            .create_async()
            .await;

        let result = counter(client_for(&server))
            .count_views(&token())
            .await
            .unwrap();

        list.assert_async().await;
        stats.assert_async().await;
        assert!(result.has_more);
        assert_eq!(result.video_count, 1, "the repeated video is counted once");
        assert_eq!(result.total_views, 7);
    }

    #[tokio::test]
    async fn missing_statistics_count_as_zero() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", list_path())
            .with_body(list_body(&["v1", "v2"], json!(0), false))
            .create_async()
            .await;
        server
            .mock("POST", query_path())
            .with_body(stats_body(&[("v1", 100)]))
            .create_async()
            .await;

        let result = counter(client_for(&server))
            .count_views(&token())
            .await
            .unwrap();

        assert_eq!(result.total_views, 100);
        assert_eq!(result.video_count, 2);
        assert_eq!(result.videos[1].statistics.view_count, 0);
    }

    #[tokio::test]
    async fn rejected_code_never_lists() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v2/oauth/token/")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;
        let list = server
            .mock("POST", list_path())
            .expect(0)
            .create_async()
            .await;

        let err = counter(client_for(&server))
            .count_views_with_code(&AuthorizationCode::new("code"), None)
            .await
            .unwrap_err();

        list.assert_async().await;
        assert!(matches!(err, TikTokError::TokenExchange { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn code_exchange_feeds_the_listing() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v2/oauth/token/")
            .with_body(r#"{"access_token":"act.granted","expires_in":60}"#)
            .create_async()
            .await;
        let list = server
            .mock("POST", list_path())
            .match_header("authorization", "Bearer act.granted")
            .with_body(list_body(&["v1"], json!(0), false))
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", query_path())
            .with_body(stats_body(&[("v1", 5)]))
            .create_async()
            .await;

        let result = counter(client_for(&server))
            .count_views_with_code(&AuthorizationCode::new("code"), None)
            .await
            .unwrap();

        list.assert_async().await;
        assert_eq!(result.total_views, 5);
    }

    #[tokio::test]
    async fn statistics_failure_aborts_the_run() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", list_path())
            .with_body(list_body(&["v1"], json!(0), false))
            .create_async()
            .await;
        server
            .mock("POST", query_path())
            .with_status(500)
            .create_async()
            .await;

        let err = counter(client_for(&server))
            .count_views(&token())
            .await
            .unwrap_err();

        assert!(
            matches!(err, TikTokError::Provider { endpoint: Endpoint::VideoQuery, status: 500, .. }),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn listing_401_surfaces_unauthorized() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", list_path())
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let err = counter(client_for(&server))
            .count_views(&token())
            .await
            .unwrap_err();

        assert!(matches!(err, TikTokError::Unauthorized { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn single_page_reports_its_own_total() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", list_path())
            .match_body(Matcher::PartialJson(json!({ "cursor": "c1", "max_count": 5 })))
            .with_body(list_body(&["v4"], json!("c2"), true))
            .create_async()
            .await;
        server
            .mock("POST", query_path())
            .with_body(stats_body(&[("v4", 44)]))
            .create_async()
            .await;

        let PageTotal { page, result } = counter(client_for(&server))
            .count_page(&token(), Some(&Cursor::new("c1")), 5)
            .await
            .unwrap();

        assert_eq!(page.cursor, Some(Cursor::new("c2")));
        assert_eq!(result.total_views, 44);
        assert!(result.has_more);
    }

    #[tokio::test]
    async fn dropped_connections_are_retried_once() {
        let (tiktok, connections) = unresponsive_provider(false, Duration::from_secs(5)).await;

        let err = counter(tiktok).count_views(&token()).await.unwrap_err();

        assert!(err.is_network(), "{err:?}");
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_provider_times_out_as_network_error() {
        let (tiktok, connections) = unresponsive_provider(true, Duration::from_millis(200)).await;

        let err = counter(tiktok).count_views(&token()).await.unwrap_err();

        assert!(
            matches!(err, TikTokError::Network { endpoint: Endpoint::VideoList, .. }),
            "{err:?}"
        );
        assert_eq!(Outcome::from_error(&err), Outcome::NetworkError);
        assert_eq!(connections.load(Ordering::SeqCst), 2, "a timeout is retried like any network error");
    }

    #[tokio::test]
    async fn provider_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let list = server
            .mock("POST", list_path())
            .with_status(503)
            .with_body(r#"{"error":{"code":"internal_error"}}"#)
            .expect(1)
            .create_async()
            .await;

        let err = counter(client_for(&server))
            .count_views(&token())
            .await
            .unwrap_err();

        list.assert_async().await;
        assert!(
            matches!(err, TikTokError::Provider { endpoint: Endpoint::VideoList, status: 503, .. }),
            "{err:?}"
        );
    }
}
