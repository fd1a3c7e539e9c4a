use axum::extract::State;
use axum::Json;
use axum_extra::extract::Query;
use serde::{Deserialize, Serialize};
use snafu::OptionExt as _;

use super::{App, Result, StorageUnavailableSnafu};
use crate::model::{Rank, RankedEntry};
use crate::service::leaderboard::{Leaderboard, Submission, SubmitReceipt};

const DEFAULT_LIMIT: usize = 50;

fn board(app: &App) -> Result<&Leaderboard> {
    app.leaderboard.as_ref().context(StorageUnavailableSnafu)
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TopResponse {
    ok: bool,
    rows: Vec<RankedEntry>,
    total_entries: usize,
}

pub async fn top(State(app): State<App>, Query(query): Query<TopQuery>) -> Result<Json<TopResponse>> {
    let board = board(&app)?;
    let rows = board
        .top(query.limit.unwrap_or(DEFAULT_LIMIT), query.offset.unwrap_or(0))
        .await?;

    Ok(Json(TopResponse {
        ok: true,
        rows,
        total_entries: board.len().await?,
    }))
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    ok: bool,
    #[serde(flatten)]
    receipt: SubmitReceipt,
}

pub async fn submit(
    State(app): State<App>, Json(submission): Json<Submission>,
) -> Result<Json<SubmitResponse>> {
    let receipt = board(&app)?.submit(submission).await?;
    Ok(Json(SubmitResponse { ok: true, receipt }))
}

#[derive(Debug, Deserialize)]
pub struct UsernameRequest {
    username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    ok: bool,
    on_leaderboard: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    rank: Option<Rank>,
}

pub async fn status(
    State(app): State<App>, Json(request): Json<UsernameRequest>,
) -> Result<Json<StatusResponse>> {
    let rank = board(&app)?.rank(&request.username).await?;

    Ok(Json(StatusResponse {
        ok: true,
        on_leaderboard: rank.is_some(),
        rank,
    }))
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    ok: bool,
    removed: bool,
}

pub async fn remove(
    State(app): State<App>, Json(request): Json<UsernameRequest>,
) -> Result<Json<RemoveResponse>> {
    let removed = board(&app)?.remove(&request.username).await?;
    Ok(Json(RemoveResponse { ok: true, removed }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use mockito::Server;
    use serde_json::{json, Value};

    use super::super::tests::{app_for, server_for};

    fn submission(username: &str, total_views: u64) -> Value {
        json!({
            "username": username,
            "display_name": format!("{username}!"),
            "total_views": total_views,
            "video_count": 4,
        })
    }

    #[tokio::test]
    async fn submitted_totals_show_up_ranked() {
        let provider = Server::new_async().await;
        let server = server_for(app_for(&provider));

        server
            .post("/api/leaderboard/submit")
            .json(&submission("low", 10))
            .await
            .assert_status_ok();
        let body: Value = server
            .post("/api/leaderboard/submit")
            .json(&submission("high", 1000))
            .await
            .json();
        assert_eq!(body["ok"], true);
        assert_eq!(body["rank"], 1);
        assert_eq!(body["is_update"], false);

        let top: Value = server
            .get("/api/leaderboard/top")
            .add_query_param("limit", 10)
            .await
            .json();
        assert_eq!(top["total_entries"], 2);
        assert_eq!(top["rows"][0]["username"], "high");
        assert_eq!(top["rows"][1]["rank"], 2);
        assert_eq!(top["rows"][1]["display_name"], "low!");
    }

    #[tokio::test]
    async fn repeated_submission_is_throttled() {
        let provider = Server::new_async().await;
        let server = server_for(app_for(&provider));

        server
            .post("/api/leaderboard/submit")
            .json(&submission("eager", 10))
            .await
            .assert_status_ok();
        let response = server
            .post("/api/leaderboard/submit")
            .json(&submission("eager", 20))
            .await;

        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.json::<Value>()["ok"], false);
    }

    #[tokio::test]
    async fn status_and_removal() {
        let provider = Server::new_async().await;
        let server = server_for(app_for(&provider));
        server
            .post("/api/leaderboard/submit")
            .json(&submission("alice", 5))
            .await
            .assert_status_ok();

        let status: Value = server
            .post("/api/leaderboard/status")
            .json(&json!({ "username": "alice" }))
            .await
            .json();
        assert_eq!(status["onLeaderboard"], true);
        assert_eq!(status["rank"]["rank"], 1);

        let removed: Value = server
            .post("/api/leaderboard/remove")
            .json(&json!({ "username": "alice" }))
            .await
            .json();
        assert_eq!(removed["removed"], true);

        let status: Value = server
            .post("/api/leaderboard/status")
            .json(&json!({ "username": "alice" }))
            .await
            .json();
        assert_eq!(status["onLeaderboard"], false);
    }

    #[tokio::test]
    async fn disabled_storage_is_unavailable() {
        let provider = Server::new_async().await;
        let mut app = app_for(&provider);
        app.leaderboard = None;
        let server = server_for(app);

        let response = server.get("/api/leaderboard/top").await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.json::<Value>()["message"], "storage unavailable");
    }
}
