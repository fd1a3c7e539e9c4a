use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::*;
pub use state::*;

mod auth;
mod error;
mod health;
mod leaderboard;
mod state;
mod videos;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

pub fn create_router(app: App) -> Router {
    Router::new()
        .route("/auth/login", get(auth::login))
        .route("/api/auth/callback", get(auth::callback))
        .route("/api/auth/token", post(auth::token))
        .route("/api/auth/logout", get(auth::logout).post(auth::logout))
        .route("/api/auth/config", get(auth::config))
        .route("/api/tiktok/whoami", get(auth::whoami))
        .route("/api/videos", get(videos::page_query).post(videos::page_body))
        .route(
            "/api/fetch-videos",
            get(videos::fetch_query).post(videos::fetch_body),
        )
        .route("/api/leaderboard/top", get(leaderboard::top))
        .route("/api/leaderboard/submit", post(leaderboard::submit))
        .route("/api/leaderboard/status", post(leaderboard::status))
        .route("/api/leaderboard/remove", post(leaderboard::remove))
        .route("/api/health", get(health::health))
        .route("/api/flags/per-video", get(health::per_video))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use axum_test::TestServer;
    use mockito::ServerGuard;

    use super::*;
    use crate::service::leaderboard::Leaderboard;
    use crate::service::tiktok::tests::client_for;
    use crate::service::views::ViewCounter;

    pub(crate) fn app_for(provider: &ServerGuard) -> App {
        let views = ViewCounter::new(client_for(provider), 20);
        let leaderboard = Leaderboard::in_memory(Duration::from_secs(10));
        App::new(views, Some(leaderboard), Flags::new(false))
    }

    pub(crate) fn server_for(app: App) -> TestServer {
        let mut server = TestServer::new(create_router(app)).unwrap();
        server.do_save_cookies();
        server
    }
}
