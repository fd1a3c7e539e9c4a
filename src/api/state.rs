use derive_new::new;
use snafu::ResultExt as _;

use crate::config::Config;
use crate::error::{ApplicationError, HttpClientSnafu};
use crate::service::leaderboard::Leaderboard;
use crate::service::tiktok::TikTok;
use crate::service::views::ViewCounter;

/// Feature switches read from the server configuration.
#[derive(Debug, Clone, Copy, Default, new)]
pub struct Flags {
    pub per_video: bool,
}

#[derive(Debug, Clone, new)]
pub struct App {
    pub views: ViewCounter,
    /// `None` when leaderboard storage is switched off
    pub leaderboard: Option<Leaderboard>,
    pub flags: Flags,
}

impl App {
    pub fn tiktok(&self) -> &TikTok {
        self.views.tiktok()
    }
}

pub fn create_app(config: &Config) -> Result<App, ApplicationError> {
    let tiktok = TikTok::from_config(&config.tiktok).context(HttpClientSnafu)?;
    let views = ViewCounter::new(tiktok, config.tiktok.page_size());

    let leaderboard = config
        .server
        .leaderboard_enabled
        .then(|| Leaderboard::in_memory(config.server.leaderboard_throttle));

    let flags = Flags::new(config.server.enable_per_video);

    Ok(App::new(views, leaderboard, flags))
}
