use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use snafu::Snafu;

use crate::service::leaderboard::LeaderboardError;
use crate::service::presenter::Outcome;
use crate::service::tiktok::TikTokError;
use crate::Located as _;

#[derive(Debug, Snafu, Serialize)]
#[snafu(visibility(pub(crate)))]
#[serde(tag = "error", content = "data")]
pub enum ApiError {
    #[snafu(display("access token is missing, sign in first"))]
    MissingAccessToken {},

    #[snafu(display("authorization code is missing"))]
    MissingCode {},

    #[snafu(display("request body is not valid JSON: {reason}"))]
    MalformedBody {
        reason: String,
        #[serde(skip)]
        status: StatusCode,
    },

    #[snafu(display("the login state does not match, start the sign in again"))]
    StateMismatch {},

    #[snafu(display("{message}"))]
    TikTok {
        kind: Outcome,
        message: String,
        #[serde(skip)]
        status: StatusCode,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },

    #[snafu(display("storage unavailable"))]
    StorageUnavailable {},

    #[snafu(display("{message}"))]
    Leaderboard {
        message: String,
        #[serde(skip)]
        status: StatusCode,
    },
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingAccessToken {} | ApiError::MissingCode {} | ApiError::StateMismatch {} => {
                StatusCode::BAD_REQUEST
            }
            ApiError::MalformedBody { status, .. }
            | ApiError::TikTok { status, .. }
            | ApiError::Leaderboard { status, .. } => *status,
            ApiError::StorageUnavailable {} => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<TikTokError> for ApiError {
    fn from(err: TikTokError) -> Self {
        let location = err.location();
        tracing::warn!(error = %err, %location, "provider call failed");

        let kind = Outcome::from_error(&err);
        let status = match kind {
            Outcome::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,
            Outcome::NetworkError => StatusCode::BAD_GATEWAY,
            _ => err
                .status()
                .filter(|status| *status >= 400)
                .and_then(|status| StatusCode::from_u16(status).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),
        };

        ApiError::TikTok {
            kind,
            message: err.to_string(),
            status,
            details: err.details().cloned(),
        }
    }
}

impl From<LeaderboardError> for ApiError {
    fn from(err: LeaderboardError) -> Self {
        let status = match &err {
            LeaderboardError::InvalidSubmission { .. } => StatusCode::BAD_REQUEST,
            LeaderboardError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            LeaderboardError::Storage { .. } | LeaderboardError::ProfileFormat { .. } => {
                tracing::error!(error = %err, "leaderboard storage failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        ApiError::Leaderboard {
            message: err.to_string(),
            status,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    ok: bool,
    message: String,
    #[serde(flatten)]
    data: ApiError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let content = ErrorResponse {
            ok: false,
            message: self.to_string(),
            data: self,
        };

        (status, Json(content)).into_response()
    }
}
