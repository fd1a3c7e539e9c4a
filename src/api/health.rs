use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::App;
use crate::model::{now, Timestamp};

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    version: &'static str,
    timestamp: Timestamp,
    leaderboard: bool,
}

pub async fn health(State(app): State<App>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: now(),
        leaderboard: app.leaderboard.is_some(),
    })
}

#[derive(Debug, Serialize)]
pub struct PerVideoFlag {
    enabled: bool,
    source: &'static str,
}

pub async fn per_video(State(app): State<App>) -> Json<PerVideoFlag> {
    Json(PerVideoFlag {
        enabled: app.flags.per_video,
        source: "env",
    })
}
