use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret as _, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use snafu::{OptionExt as _, ResultExt as _};
use tracing::instrument;
use url::Url;

use crate::config::{TikTokConfig, MAX_PAGE_SIZE};
use crate::model::{
    AccessToken, AuthorizationCode, Cursor, StatisticsMap, TokenGrant, VideoId, VideoRecord,
    VideoStatistics,
};

pub use error::*;
pub use fields::*;

mod error;
mod fields;
mod wire;

use wire::{Envelope, TokenResponse, UserInfoData, VideoListData, VideoQueryData};

/// The provider endpoints this client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    OAuthToken,
    VideoList,
    VideoQuery,
    UserInfo,
}

impl Endpoint {
    fn path(self) -> &'static str {
        match self {
            Endpoint::OAuthToken => "v2/oauth/token/",
            Endpoint::VideoList => "v2/video/list/",
            Endpoint::VideoQuery => "v2/video/query/",
            Endpoint::UserInfo => "v2/user/info/",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::OAuthToken => write!(f, "oauth/token"),
            Endpoint::VideoList => write!(f, "video/list"),
            Endpoint::VideoQuery => write!(f, "video/query"),
            Endpoint::UserInfo => write!(f, "user/info"),
        }
    }
}

/// One page of the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPage {
    pub videos: Vec<VideoRecord>,
    pub cursor: Option<Cursor>,
    pub has_more: bool,
    pub field_set: FieldSet,
}

impl VideoPage {
    pub fn ids(&self) -> Vec<VideoId> {
        self.videos.iter().map(|video| video.id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub open_id: Option<String>,
    pub union_id: Option<String>,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

/// Client for the video platform's public API.
///
/// Every call is bounded by the configured timeout; a timed out call surfaces as
/// [TikTokError::Network].
#[derive(Debug, Clone)]
pub struct TikTok {
    http: reqwest::Client,
    config: Arc<TikTokConfig>,
}

impl TikTok {
    pub fn from_config(config: &TikTokConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            config: Arc::new(config.clone()),
        })
    }

    pub fn config(&self) -> &TikTokConfig {
        &self.config
    }

    fn url(&self, endpoint: Endpoint) -> Result<Url> {
        self.config
            .api_base
            .join(endpoint.path())
            .ok()
            .context(ConfigurationSnafu {
                field: "TIKTOK_API_BASE",
            })
    }

    fn client_key(&self) -> Result<&str> {
        self.config
            .client_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .context(ConfigurationSnafu {
                field: "TIKTOK_CLIENT_KEY",
            })
    }

    fn client_secret(&self) -> Result<&SecretString> {
        self.config
            .client_secret
            .as_ref()
            .filter(|secret| !secret.expose_secret().is_empty())
            .context(ConfigurationSnafu {
                field: "TIKTOK_CLIENT_SECRET",
            })
    }

    fn redirect_uri(&self) -> Result<&str> {
        self.config
            .redirect_uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .context(ConfigurationSnafu {
                field: "TIKTOK_REDIRECT_URI",
            })
    }

    /// Where to send the user to grant access. `code_challenge` is passed through untouched for
    /// PKCE flows; the matching verifier must come back with [TikTok::exchange_token].
    pub fn authorize_url(&self, state: &str, code_challenge: Option<&str>) -> Result<Url> {
        let mut url = self.config.authorize_url.clone();

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_key", self.client_key()?)
                .append_pair("response_type", "code")
                .append_pair("scope", &self.config.scopes)
                .append_pair("redirect_uri", self.redirect_uri()?)
                .append_pair("state", state);

            if self.config.prompt_consent {
                query.append_pair("prompt", "consent");
            }

            if let Some(challenge) = code_challenge {
                query
                    .append_pair("code_challenge", challenge)
                    .append_pair("code_challenge_method", "S256");
            }
        }

        Ok(url)
    }

    /// Trade an authorization code for an access token.
    #[instrument(skip(self, code, code_verifier), fields(code = %code.masked(), pkce = code_verifier.is_some()))]
    pub async fn exchange_token(
        &self, code: &AuthorizationCode, code_verifier: Option<&str>,
    ) -> Result<TokenGrant> {
        let client_key = self.client_key()?;
        let client_secret = self.client_secret()?;
        let redirect_uri = self.redirect_uri()?;

        let mut form = vec![
            ("client_key", client_key),
            ("client_secret", client_secret.expose_secret().as_str()),
            ("code", code.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }

        let endpoint = Endpoint::OAuthToken;
        let response = self
            .http
            .post(self.url(endpoint)?)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .context(NetworkSnafu { endpoint })?;

        let (status, body) = read_body(endpoint, response).await?;
        tracing::info!(status = status.as_u16(), "token endpoint answered");

        if !status.is_success() {
            return TokenExchangeSnafu {
                status: status.as_u16(),
                details: body,
            }
            .fail();
        }

        let token: TokenResponse = decode(endpoint, status, &body)?;
        if token.has_error() {
            return TokenExchangeSnafu {
                status: status.as_u16(),
                details: body,
            }
            .fail();
        }

        let Some(access_token) = token.access_token.filter(|token| !token.is_empty()) else {
            return TokenExchangeSnafu {
                status: status.as_u16(),
                details: json!({ "error": "response is missing access_token" }),
            }
            .fail();
        };

        Ok(TokenGrant {
            access_token: AccessToken::new(access_token),
            refresh_token: token.refresh_token.map(SecretString::new),
            expires_in: token.expires_in.unwrap_or(3600),
            open_id: token.open_id,
            scope: token.scope,
        })
    }

    /// Fetch one page of the user's videos, falling back from the full field-set to the minimal
    /// one when the full request succeeds with zero videos.
    #[instrument(skip(self, token))]
    pub async fn list_videos_page(
        &self, token: &AccessToken, cursor: Option<&Cursor>, page_size: u32,
    ) -> Result<VideoPage> {
        let cursor = cursor.cloned().unwrap_or_default();
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

        let page = self
            .list_page(token, FieldSet::Full, &cursor, page_size)
            .await?;

        if !page.videos.is_empty() {
            return Ok(page);
        }

        let Some(fallback) = page.field_set.fallback() else {
            return Ok(page);
        };

        tracing::info!(
            "{} field-set returned no videos, retrying with {}",
            page.field_set,
            fallback
        );

        match self.list_page(token, fallback, &cursor, page_size).await {
            Ok(retry) if !retry.videos.is_empty() => Ok(retry),
            Ok(_) => {
                tracing::info!("both field-sets returned no videos");
                Ok(page)
            }
            Err(err) => {
                tracing::warn!(error = %err, "{} field-set retry failed, keeping the empty page", fallback);
                Ok(page)
            }
        }
    }

    async fn list_page(
        &self, token: &AccessToken, field_set: FieldSet, cursor: &Cursor, page_size: u32,
    ) -> Result<VideoPage> {
        let endpoint = Endpoint::VideoList;
        let response = self
            .http
            .post(self.url(endpoint)?)
            .query(&[("fields", join(field_set.fields()))])
            .header(AUTHORIZATION, token.bearer())
            .header(ACCEPT, "application/json")
            .json(&json!({ "cursor": cursor.to_json(), "max_count": page_size }))
            .send()
            .await
            .context(NetworkSnafu { endpoint })?;

        let (status, body) = read_body(endpoint, response).await?;
        if status == StatusCode::UNAUTHORIZED {
            return UnauthorizedSnafu {
                endpoint,
                details: body,
            }
            .fail();
        }

        let data: VideoListData = unwrap_envelope(endpoint, status, body)?;
        let listed = data.videos.len();
        let videos: Vec<VideoRecord> = data
            .videos
            .into_iter()
            .filter_map(wire::RawVideo::into_record)
            .collect();

        if videos.len() != listed {
            tracing::warn!("dropped {} listed videos without an id", listed - videos.len());
        }

        tracing::debug!(
            field_set = %field_set,
            videos = videos.len(),
            has_more = data.has_more,
            "listed a page of videos"
        );

        Ok(VideoPage {
            videos,
            cursor: data.cursor,
            has_more: data.has_more,
            field_set,
        })
    }

    /// Fetch statistics for `ids`. Requested ids the provider leaves out come back zeroed.
    #[instrument(skip(self, token, ids), fields(videos = ids.len()))]
    pub async fn fetch_statistics(
        &self, token: &AccessToken, ids: &[VideoId],
    ) -> Result<StatisticsMap> {
        if ids.is_empty() {
            return Ok(StatisticsMap::default());
        }

        let endpoint = Endpoint::VideoQuery;
        let response = self
            .http
            .post(self.url(endpoint)?)
            .query(&[("fields", join(STATISTICS_FIELDS))])
            .header(AUTHORIZATION, token.bearer())
            .header(ACCEPT, "application/json")
            .json(&json!({ "filters": { "video_ids": ids } }))
            .send()
            .await
            .context(NetworkSnafu { endpoint })?;

        let (status, body) = read_body(endpoint, response).await?;
        let data: VideoQueryData = unwrap_envelope(endpoint, status, body)?;

        let mut statistics: StatisticsMap = ids
            .iter()
            .map(|id| (id.clone(), VideoStatistics::default()))
            .collect();

        for raw in data.videos {
            let id: VideoId = raw
                .id
                .as_deref()
                .filter(|id| !id.is_empty())
                .context(AggregationInvariantSnafu {
                    reason: "statistics entry without an id",
                })?
                .into();

            if !statistics.contains(&id) {
                tracing::debug!("ignoring statistics for unrequested video `{}`", id);
                continue;
            }

            statistics.insert(id, raw.statistics());
        }

        Ok(statistics)
    }

    #[instrument(skip(self, token))]
    pub async fn user_info(&self, token: &AccessToken) -> Result<UserInfo> {
        let endpoint = Endpoint::UserInfo;
        let response = self
            .http
            .get(self.url(endpoint)?)
            .query(&[("fields", join(USER_INFO_FIELDS))])
            .header(AUTHORIZATION, token.bearer())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .context(NetworkSnafu { endpoint })?;

        let (status, body) = read_body(endpoint, response).await?;
        if status == StatusCode::UNAUTHORIZED {
            return UnauthorizedSnafu {
                endpoint,
                details: body,
            }
            .fail();
        }

        let UserInfoData { user } = unwrap_envelope(endpoint, status, body)?;

        Ok(UserInfo {
            open_id: user.open_id,
            union_id: user.union_id,
            display_name: user.display_name,
            username: user.username,
            avatar_url: user.avatar_url,
        })
    }
}

/// Read the whole body. Bodies that are not JSON are kept as a JSON string so they can still be
/// attached to errors.
async fn read_body(endpoint: Endpoint, response: Response) -> Result<(StatusCode, Value)> {
    let status = response.status();
    let bytes = response.bytes().await.context(NetworkSnafu { endpoint })?;

    if bytes.is_empty() {
        return Ok((status, Value::Null));
    }

    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

    Ok((status, body))
}

fn decode<T: DeserializeOwned>(endpoint: Endpoint, status: StatusCode, body: &Value) -> Result<T> {
    T::deserialize(body).context(DecodeSnafu {
        endpoint,
        status: status.as_u16(),
    })
}

/// Check the status and the `{data, error}` envelope and hand back `data`.
fn unwrap_envelope<T: DeserializeOwned + Default>(
    endpoint: Endpoint, status: StatusCode, body: Value,
) -> Result<T> {
    if !status.is_success() {
        return ProviderSnafu {
            endpoint,
            status: status.as_u16(),
            details: body,
        }
        .fail();
    }

    let envelope: Envelope<T> = decode(endpoint, status, &body)?;

    if let Some(error) = &envelope.error {
        if !error.is_ok() {
            tracing::warn!(code = %error.code, message = %error.message, "{} reported an error", endpoint);
            return ProviderSnafu {
                endpoint,
                status: status.as_u16(),
                details: body,
            }
            .fail();
        }
    }

    Ok(envelope.data.unwrap_or_default())
}
