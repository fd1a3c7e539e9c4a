use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use axum_extra::extract::{CookieJar, Query};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::auth::access_token;
use super::{ApiError, App, Result};
use crate::config::MAX_PAGE_SIZE;
use crate::model::{AggregatedVideo, Cursor};
use crate::service::presenter::{present, ViewsEnvelope};
use crate::service::tiktok::FieldSet;
use crate::service::views::PageTotal;

/// An empty body means "use the defaults", anything else has to be valid JSON.
fn body_or_default<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    let Json(request) = Json::<T>::from_bytes(body).map_err(|rejection| ApiError::MalformedBody {
        reason: rejection.body_text(),
        status: rejection.status(),
    })?;
    Ok(request)
}

#[derive(Debug, Default, Deserialize)]
pub struct PageRequest {
    access_token: Option<String>,
    cursor: Option<Cursor>,
    max_count: Option<u32>,
}

/// One listing page with statistics merged, plus which field-set produced it.
#[derive(Debug, Serialize)]
pub struct PageResponse {
    cursor: Cursor,
    has_more: bool,
    list_mode: FieldSet,
    fieldset_used: &'static [&'static str],
    total_views: u64,
    video_count: usize,
    videos: Vec<AggregatedVideo>,
}

pub async fn page_query(
    State(app): State<App>, jar: CookieJar, Query(request): Query<PageRequest>,
) -> Result<Json<PageResponse>> {
    page(&app, &jar, request).await
}

pub async fn page_body(
    State(app): State<App>, jar: CookieJar, body: Bytes,
) -> Result<Json<PageResponse>> {
    let request: PageRequest = body_or_default(&body)?;
    page(&app, &jar, request).await
}

#[instrument(skip_all, fields(cursor = ?request.cursor, max_count = ?request.max_count))]
async fn page(app: &App, jar: &CookieJar, request: PageRequest) -> Result<Json<PageResponse>> {
    let token = access_token(jar, request.access_token)?;
    let page_size = request
        .max_count
        .map_or(app.tiktok().config().page_size(), |count| {
            count.clamp(1, MAX_PAGE_SIZE)
        });

    let PageTotal { page, result } = app
        .views
        .count_page(&token, request.cursor.as_ref(), page_size)
        .await?;

    Ok(Json(PageResponse {
        cursor: page.cursor.unwrap_or_default(),
        has_more: page.has_more,
        list_mode: page.field_set,
        fieldset_used: page.field_set.fields(),
        total_views: result.total_views,
        video_count: result.video_count,
        videos: result.videos,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct FetchRequest {
    access_token: Option<String>,
}

pub async fn fetch_query(
    State(app): State<App>, jar: CookieJar, Query(request): Query<FetchRequest>,
) -> Result<Json<ViewsEnvelope>> {
    fetch(&app, &jar, request).await
}

pub async fn fetch_body(
    State(app): State<App>, jar: CookieJar, body: Bytes,
) -> Result<Json<ViewsEnvelope>> {
    let request: FetchRequest = body_or_default(&body)?;
    fetch(&app, &jar, request).await
}

/// Run the whole pipeline. Provider failures are part of the envelope, not an HTTP error.
#[instrument(skip_all)]
async fn fetch(app: &App, jar: &CookieJar, request: FetchRequest) -> Result<Json<ViewsEnvelope>> {
    let token = access_token(jar, request.access_token)?;
    let result = app.views.count_views(&token).await;

    Ok(Json(present(result, app.flags.per_video)))
}
