// Shortcode editor helpers: autocomplete search and quick stub creation.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use super::{require_campaign, AppState};
use crate::error::{ApiError, ApiResult};
use crate::shortcode::{self, kinds, EntityKind, StubPolicy};

/// Autocomplete results are capped at this many rows.
const SEARCH_LIMIT: i64 = 10;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
}

#[derive(Deserialize)]
pub struct QuickCreateRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct QuickCreated {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub url: String,
}

/// `GET /api/campaigns/{cid}/entity-search?type=loc&q=port`
///
/// Unknown or non-mentionable types yield an empty list rather than an error
/// so the autocomplete panel can fire requests while the user is typing.
pub async fn entity_search(
    State(state): State<AppState>,
    Path(cid): Path<i64>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<SearchHit>>> {
    require_campaign(&state.db, cid).await?;

    let Some(kind) = EntityKind::from_shortcode(params.kind.trim().to_lowercase().as_str()) else {
        return Ok(Json(Vec::new()));
    };

    let mut conn = state.db.pool().acquire().await?;
    let rows = kinds::search_by_name(&mut conn, kind, cid, params.q.trim(), SEARCH_LIMIT).await?;
    Ok(Json(
        rows.into_iter()
            .map(|(id, name)| SearchHit { id, name, kind })
            .collect(),
    ))
}

/// `POST /api/campaigns/{cid}/quick-create/{code}` with `{"name": "..."}`.
///
/// Returns the existing entity (200) when the name already resolves,
/// otherwise creates a stub (201).
pub async fn quick_create(
    State(state): State<AppState>,
    Path((cid, code)): Path<(i64, String)>,
    Json(req): Json<QuickCreateRequest>,
) -> ApiResult<(StatusCode, Json<QuickCreated>)> {
    let kind = EntityKind::from_shortcode(&code)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown entity type: {code}")))?;
    if kind.spec().stub == StubPolicy::LookupOnly {
        return Err(ApiError::bad_request(format!(
            "{} records cannot be quick-created",
            kind.label()
        )));
    }
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Name is required."));
    }

    let mut tx = state.db.begin().await?;
    if !crate::db::campaign_exists(&mut tx, cid).await? {
        return Err(ApiError::not_found("Campaign not found"));
    }
    let resolved = shortcode::resolve(&mut tx, kind, name, cid)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("{} could not be created", kind.label())))?;
    tx.commit().await?;

    let status = if resolved.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(QuickCreated {
            id: resolved.id,
            url: kind.detail_url(resolved.id),
            name: resolved.display_name,
            kind,
        }),
    ))
}
