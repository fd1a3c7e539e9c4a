use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use secrecy::ExposeSecret as _;
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt as _};
use tracing::instrument;

use super::{App, MissingAccessTokenSnafu, MissingCodeSnafu, Result, StateMismatchSnafu};
use crate::model::{AccessToken, AuthorizationCode};
use crate::service::tiktok::UserInfo;

pub(super) const ACCESS_COOKIE: &str = "tt_access";
pub(super) const OPEN_ID_COOKIE: &str = "tt_open_id";
pub(super) const STATE_COOKIE: &str = "tt_state";

const STATE_MAX_AGE: time::Duration = time::Duration::minutes(10);

fn session_cookie(name: &'static str, value: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

/// The token supplied with the request, falling back to the session cookie.
pub(super) fn access_token(jar: &CookieJar, supplied: Option<String>) -> Result<AccessToken> {
    supplied
        .or_else(|| jar.get(ACCESS_COOKIE).map(|cookie| cookie.value().to_string()))
        .filter(|token| !token.trim().is_empty())
        .map(AccessToken::new)
        .context(MissingAccessTokenSnafu)
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    code_challenge: Option<String>,
}

/// Start the sign in: remember a fresh state value and hand the user to the provider.
#[instrument(skip_all)]
pub async fn login(
    State(app): State<App>, jar: CookieJar, Query(query): Query<LoginQuery>,
) -> Result<(CookieJar, Redirect)> {
    let state = uuid::Uuid::new_v4().to_string();
    let url = app
        .tiktok()
        .authorize_url(&state, query.code_challenge.as_deref())?;

    let jar = jar.add(session_cookie(STATE_COOKIE, state, STATE_MAX_AGE));
    Ok((jar, Redirect::to(url.as_str())))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[instrument(skip_all, fields(provider_error = ?query.error))]
pub async fn callback(
    State(app): State<App>, jar: CookieJar, Query(query): Query<CallbackQuery>,
) -> Result<(CookieJar, Redirect)> {
    let expected = jar.get(STATE_COOKIE).map(|cookie| cookie.value().to_string());
    ensure!(
        expected.is_some() && expected == query.state,
        StateMismatchSnafu
    );

    let code = query
        .code
        .filter(|code| !code.is_empty())
        .map(AuthorizationCode::new)
        .context(MissingCodeSnafu)?;

    let grant = app.tiktok().exchange_token(&code, None).await?;
    let max_age = time::Duration::seconds(grant.expires_in.try_into().unwrap_or(i64::MAX));

    let mut jar = jar.remove(removal(STATE_COOKIE)).add(session_cookie(
        ACCESS_COOKIE,
        grant.access_token.expose().to_string(),
        max_age,
    ));
    if let Some(open_id) = grant.open_id {
        jar = jar.add(session_cookie(OPEN_ID_COOKIE, open_id, max_age));
    }

    tracing::info!(expires_in = grant.expires_in, "signed in");
    Ok((jar, Redirect::to("/")))
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    code: String,
    #[serde(default)]
    code_verifier: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: u64,
    open_id: Option<String>,
    scope: Option<String>,
}

/// Exchange a code the client obtained itself, e.g. in a PKCE flow.
#[instrument(skip_all)]
pub async fn token(State(app): State<App>, Json(request): Json<TokenRequest>) -> Result<Json<TokenResponse>> {
    let code = Some(request.code)
        .filter(|code| !code.is_empty())
        .map(AuthorizationCode::new)
        .context(MissingCodeSnafu)?;

    let grant = app
        .tiktok()
        .exchange_token(&code, request.code_verifier.as_deref())
        .await?;

    Ok(Json(TokenResponse {
        access_token: grant.access_token.expose().to_string(),
        refresh_token: grant
            .refresh_token
            .map(|token| token.expose_secret().to_string()),
        expires_in: grant.expires_in,
        open_id: grant.open_id,
        scope: grant.scope,
    }))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar
        .remove(removal(ACCESS_COOKIE))
        .remove(removal(OPEN_ID_COOKIE))
        .remove(removal(STATE_COOKIE));

    (jar, Redirect::to("/"))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStatus {
    is_valid: bool,
    has_client_key: bool,
    has_client_secret: bool,
    has_redirect_uri: bool,
    has_scopes: bool,
}

/// Which credentials are configured. Never exposes the values.
pub async fn config(State(app): State<App>) -> Json<ConfigStatus> {
    let config = app.tiktok().config();

    let has_client_key = config.client_key.as_deref().is_some_and(|key| !key.is_empty());
    let has_client_secret = config
        .client_secret
        .as_ref()
        .is_some_and(|secret| !secret.expose_secret().is_empty());
    let has_redirect_uri = config.redirect_uri.as_deref().is_some_and(|uri| !uri.is_empty());
    let has_scopes = !config.scopes.is_empty();

    Json(ConfigStatus {
        is_valid: has_client_key && has_client_secret && has_redirect_uri && has_scopes,
        has_client_key,
        has_client_secret,
        has_redirect_uri,
        has_scopes,
    })
}

#[derive(Debug, Deserialize)]
pub struct WhoAmIQuery {
    access_token: Option<String>,
}

#[instrument(skip_all)]
pub async fn whoami(
    State(app): State<App>, jar: CookieJar, Query(query): Query<WhoAmIQuery>,
) -> Result<Json<UserInfo>> {
    let token = access_token(&jar, query.access_token)?;
    let user = app.tiktok().user_info(&token).await?;

    Ok(Json(user))
}
