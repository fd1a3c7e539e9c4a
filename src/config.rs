use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use snafu::ResultExt as _;
use url::Url;

use crate::error::{ApplicationError, ConfigLoadSnafu};

/// Largest page the provider's listing endpoint will return.
pub const MAX_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub tiktok: TikTokConfig,
}

impl Config {
    pub fn from_env() -> Result<Config, ApplicationError> {
        let server = envy::from_env::<ServerConfig>().context(ConfigLoadSnafu { prefix: "" })?;
        let tiktok = envy::prefixed("TIKTOK_")
            .from_env::<TikTokConfig>()
            .context(ConfigLoadSnafu { prefix: "TIKTOK_" })?;

        Ok(Config { server, tiktok })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(rename = "host_address", default = "default_host")]
    pub host: SocketAddr,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// include the per-video breakdown in the views envelope
    #[serde(default, deserialize_with = "switch")]
    pub enable_per_video: bool,
    #[serde(default = "default_true", deserialize_with = "switch")]
    pub leaderboard_enabled: bool,
    #[serde(
        default = "default_throttle",
        deserialize_with = "humantime_duration"
    )]
    pub leaderboard_throttle: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            log_dir: default_log_dir(),
            enable_per_video: false,
            leaderboard_enabled: true,
            leaderboard_throttle: default_throttle(),
        }
    }
}

/// Credentials and endpoints of the video platform.
///
/// The credentials are optional here; the client reports them as missing when it needs them.
#[derive(Debug, Deserialize, Clone)]
pub struct TikTokConfig {
    #[serde(default)]
    pub client_key: Option<String>,
    #[serde(default)]
    pub client_secret: Option<SecretString>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default = "default_scopes")]
    pub scopes: String,
    #[serde(default = "default_api_base")]
    pub api_base: Url,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: Url,
    #[serde(default = "default_timeout", deserialize_with = "humantime_duration")]
    pub timeout: Duration,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default, deserialize_with = "switch")]
    pub prompt_consent: bool,
}

impl TikTokConfig {
    /// Page size clamped to what the provider accepts.
    pub fn page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

impl Default for TikTokConfig {
    fn default() -> Self {
        Self {
            client_key: None,
            client_secret: None,
            redirect_uri: None,
            scopes: default_scopes(),
            api_base: default_api_base(),
            authorize_url: default_authorize_url(),
            timeout: default_timeout(),
            page_size: default_page_size(),
            prompt_consent: false,
        }
    }
}

fn default_host() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_true() -> bool {
    true
}

fn default_throttle() -> Duration {
    Duration::from_secs(10)
}

fn default_scopes() -> String {
    "user.info.basic,video.list".to_string()
}

fn default_api_base() -> Url {
    Url::parse("https://open.tiktokapis.com/").expect("static url is valid")
}

fn default_authorize_url() -> Url {
    Url::parse("https://www.tiktok.com/v2/auth/authorize/").expect("static url is valid")
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn humantime_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

/// Accepts `1` as well as `true`, deployments set the flag either way.
fn switch<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let text = String::deserialize(deserializer)?;
    match text.trim() {
        "1" | "true" => Ok(true),
        "" | "0" | "false" => Ok(false),
        other => Err(serde::de::Error::custom(format!("`{other}` is not a switch"))),
    }
}
