// Wiki record handlers. Every write runs in one transaction together with
// shortcode processing, so stub entities and mention edges commit or roll
// back with the edit.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde::Serialize;
use sqlx::SqliteConnection;

use super::{require_campaign, AppState};
use crate::db::{self, BestiaryEntry, BestiaryEntryInput, WikiRecord};
use crate::error::{ApiError, ApiResult};
use crate::shortcode::{self, Backlink, EntityRef, LinkedEntity};

/// A record together with both directions of its mention edges.
#[derive(Debug, Serialize)]
pub struct RecordDetail<R> {
    pub record: R,
    pub linked_entities: Vec<LinkedEntity>,
    pub referenced_by: Vec<Backlink>,
}

fn not_found<R: WikiRecord>() -> ApiError {
    ApiError::not_found(format!("{} not found", R::KIND.label()))
}

/// The row `id` of kind `R`, provided it belongs to `campaign_id`.
async fn fetch_in_campaign<R: WikiRecord>(
    conn: &mut SqliteConnection,
    campaign_id: i64,
    id: i64,
) -> ApiResult<R> {
    db::fetch_record::<R>(conn, id)
        .await?
        .filter(|record| record.campaign_id() == Some(campaign_id))
        .ok_or_else(not_found::<R>)
}

async fn detail<R: WikiRecord>(conn: &mut SqliteConnection, record: R) -> ApiResult<RecordDetail<R>> {
    let entity = EntityRef::new(R::KIND, record.id());
    let linked_entities = shortcode::mentions_referenced_by(conn, entity).await?;
    let referenced_by = shortcode::mentions_referencing(conn, entity).await?;
    Ok(RecordDetail {
        record,
        linked_entities,
        referenced_by,
    })
}

/// Store `input` on row `id`, then rewrite the shortcodes in its text fields
/// and store them again. The first write lands a rename before resolution so
/// a record that names itself links to its own row.
async fn reindex_and_store<R: WikiRecord>(
    conn: &mut SqliteConnection,
    campaign_id: i64,
    id: i64,
    input: &mut R::Input,
) -> ApiResult<()> {
    if !R::update(&mut *conn, id, input).await? {
        return Err(not_found::<R>());
    }

    let source = EntityRef::new(R::KIND, id);
    let edges =
        shortcode::reindex_fields(&mut *conn, campaign_id, source, &mut R::text_fields(input))
            .await?;
    tracing::debug!(kind = %R::KIND, id, edges, "reindexed mentions");

    if !R::update(&mut *conn, id, input).await? {
        return Err(not_found::<R>());
    }
    Ok(())
}

// ── Campaign-scoped records ───────────────────────────────────────────

pub async fn list_records<R: WikiRecord>(
    State(state): State<AppState>,
    Path(cid): Path<i64>,
) -> ApiResult<Json<Vec<R>>> {
    require_campaign(&state.db, cid).await?;
    Ok(Json(state.db.list_records::<R>(cid).await?))
}

pub async fn get_record<R: WikiRecord>(
    State(state): State<AppState>,
    Path((cid, id)): Path<(i64, i64)>,
) -> ApiResult<Json<RecordDetail<R>>> {
    let mut conn = state.db.pool().acquire().await?;
    let record = fetch_in_campaign::<R>(&mut conn, cid, id).await?;
    Ok(Json(detail(&mut conn, record).await?))
}

pub async fn create_record<R: WikiRecord>(
    State(state): State<AppState>,
    Path(cid): Path<i64>,
    Json(mut input): Json<R::Input>,
) -> ApiResult<(StatusCode, Json<R>)> {
    R::normalize(&mut input).map_err(ApiError::BadRequest)?;

    let mut tx = state.db.begin().await?;
    if !db::campaign_exists(&mut tx, cid).await? {
        return Err(ApiError::not_found("Campaign not found"));
    }

    let id = R::insert(&mut tx, cid, &input).await?;
    reindex_and_store::<R>(&mut tx, cid, id, &mut input).await?;
    let record = db::fetch_record::<R>(&mut tx, id)
        .await?
        .ok_or_else(not_found::<R>)?;
    tx.commit().await?;

    tracing::info!(kind = %R::KIND, id, campaign_id = cid, "record created");
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_record<R: WikiRecord>(
    State(state): State<AppState>,
    Path((cid, id)): Path<(i64, i64)>,
    Json(mut input): Json<R::Input>,
) -> ApiResult<Json<R>> {
    R::normalize(&mut input).map_err(ApiError::BadRequest)?;

    let mut tx = state.db.begin().await?;
    fetch_in_campaign::<R>(&mut tx, cid, id).await?;
    reindex_and_store::<R>(&mut tx, cid, id, &mut input).await?;
    let record = db::fetch_record::<R>(&mut tx, id)
        .await?
        .ok_or_else(not_found::<R>)?;
    tx.commit().await?;

    Ok(Json(record))
}

pub async fn delete_record<R: WikiRecord>(
    State(state): State<AppState>,
    Path((cid, id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let entity = EntityRef::new(R::KIND, id);

    let mut tx = state.db.begin().await?;
    fetch_in_campaign::<R>(&mut tx, cid, id).await?;
    // Inbound edges stay; readers skip them once the row is gone.
    shortcode::clear(&mut tx, entity).await?;
    db::delete_record(&mut tx, entity).await?;
    tx.commit().await?;

    tracing::info!(kind = %R::KIND, id, campaign_id = cid, "record deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Bestiary ──────────────────────────────────────────────────────────
//
// Entries are global. A write that names a campaign resolves the stat
// block's shortcodes against that campaign; otherwise the text is stored
// verbatim and existing edges are kept.

pub async fn list_bestiary(State(state): State<AppState>) -> ApiResult<Json<Vec<BestiaryEntry>>> {
    Ok(Json(state.db.list_records::<BestiaryEntry>(0).await?))
}

pub async fn get_bestiary(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<RecordDetail<BestiaryEntry>>> {
    let mut conn = state.db.pool().acquire().await?;
    let entry = db::fetch_record::<BestiaryEntry>(&mut conn, id)
        .await?
        .ok_or_else(not_found::<BestiaryEntry>)?;
    Ok(Json(detail(&mut conn, entry).await?))
}

async fn check_scope(conn: &mut SqliteConnection, input: &BestiaryEntryInput) -> ApiResult<()> {
    if let Some(cid) = input.campaign_id {
        if !db::campaign_exists(conn, cid).await? {
            return Err(ApiError::not_found("Campaign not found"));
        }
    }
    Ok(())
}

pub async fn create_bestiary(
    State(state): State<AppState>,
    Json(mut input): Json<BestiaryEntryInput>,
) -> ApiResult<(StatusCode, Json<BestiaryEntry>)> {
    BestiaryEntry::normalize(&mut input).map_err(ApiError::BadRequest)?;

    let mut tx = state.db.begin().await?;
    check_scope(&mut tx, &input).await?;

    let id = BestiaryEntry::insert(&mut tx, input.campaign_id.unwrap_or_default(), &input).await?;
    if let Some(cid) = input.campaign_id {
        reindex_and_store::<BestiaryEntry>(&mut tx, cid, id, &mut input).await?;
    }
    let entry = db::fetch_record::<BestiaryEntry>(&mut tx, id)
        .await?
        .ok_or_else(not_found::<BestiaryEntry>)?;
    tx.commit().await?;

    tracing::info!(id, "bestiary entry created");
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn update_bestiary(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut input): Json<BestiaryEntryInput>,
) -> ApiResult<Json<BestiaryEntry>> {
    BestiaryEntry::normalize(&mut input).map_err(ApiError::BadRequest)?;

    let mut tx = state.db.begin().await?;
    check_scope(&mut tx, &input).await?;

    match input.campaign_id {
        Some(cid) => reindex_and_store::<BestiaryEntry>(&mut tx, cid, id, &mut input).await?,
        None => {
            if !BestiaryEntry::update(&mut tx, id, &input).await? {
                return Err(not_found::<BestiaryEntry>());
            }
        }
    }
    let entry = db::fetch_record::<BestiaryEntry>(&mut tx, id)
        .await?
        .ok_or_else(not_found::<BestiaryEntry>)?;
    tx.commit().await?;

    Ok(Json(entry))
}

pub async fn delete_bestiary(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let entity = EntityRef::new(BestiaryEntry::KIND, id);

    let mut tx = state.db.begin().await?;
    shortcode::clear(&mut tx, entity).await?;
    if !db::delete_record(&mut tx, entity).await? {
        return Err(not_found::<BestiaryEntry>());
    }
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
