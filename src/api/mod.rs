// HTTP API routes (campaigns, wiki records, shortcode helpers).

mod lookup;
mod records;

use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::{
    AdventureSite, Campaign, CampaignInput, CompendiumEntry, Database, GameSession, Item,
    Location, Npc, PlayerCharacter, Quest, WikiRecord,
};
use crate::error::{ApiError, ApiResult};
use crate::metrics;

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
}

/// 404 unless the campaign exists.
async fn require_campaign(db: &Database, campaign_id: i64) -> ApiResult<Campaign> {
    db.get_campaign(campaign_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign not found"))
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(db: Arc<Database>) -> Router {
    let state = AppState { db };

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        // Campaigns
        .route("/api/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/api/campaigns/{cid}",
            get(get_campaign)
                .put(update_campaign)
                .delete(delete_campaign),
        )
        // Campaign-scoped wiki records
        .merge(record_routes::<Npc>())
        .merge(record_routes::<Location>())
        .merge(record_routes::<Item>())
        .merge(record_routes::<Quest>())
        .merge(record_routes::<CompendiumEntry>())
        .merge(record_routes::<PlayerCharacter>())
        .merge(record_routes::<AdventureSite>())
        .merge(record_routes::<GameSession>())
        // Bestiary (global)
        .route(
            "/api/bestiary",
            get(records::list_bestiary).post(records::create_bestiary),
        )
        .route(
            "/api/bestiary/{id}",
            get(records::get_bestiary)
                .put(records::update_bestiary)
                .delete(records::delete_bestiary),
        )
        // Shortcode helpers
        .route(
            "/api/campaigns/{cid}/entity-search",
            get(lookup::entity_search),
        )
        .route(
            "/api/campaigns/{cid}/quick-create/{code}",
            post(lookup::quick_create),
        )
        .with_state(state)
}

/// List/create/detail/update/delete routes for one campaign-scoped kind,
/// mounted under the kind's route prefix.
fn record_routes<R: WikiRecord>() -> Router<AppState> {
    let prefix = R::KIND.spec().route;
    Router::new()
        .route(
            &format!("/api/campaigns/{{cid}}{prefix}"),
            get(records::list_records::<R>).post(records::create_record::<R>),
        )
        .route(
            &format!("/api/campaigns/{{cid}}{prefix}/{{id}}"),
            get(records::get_record::<R>)
                .put(records::update_record::<R>)
                .delete(records::delete_record::<R>),
        )
}

// ── Service handlers ──────────────────────────────────────────────────

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "gm-wiki-backend" }))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

// ── Campaign handlers ─────────────────────────────────────────────────

fn validate_campaign(input: &mut CampaignInput) -> ApiResult<()> {
    input.name = input.name.trim().to_string();
    if input.name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    Ok(())
}

async fn list_campaigns(State(state): State<AppState>) -> ApiResult<Json<Vec<Campaign>>> {
    Ok(Json(state.db.list_campaigns().await?))
}

async fn create_campaign(
    State(state): State<AppState>,
    Json(mut req): Json<CampaignInput>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    validate_campaign(&mut req)?;
    let campaign = state.db.create_campaign(&req).await?;
    tracing::info!(id = campaign.id, name = %campaign.name, "campaign created");
    Ok((StatusCode::CREATED, Json(campaign)))
}

async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Campaign>> {
    Ok(Json(require_campaign(&state.db, id).await?))
}

async fn update_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut req): Json<CampaignInput>,
) -> ApiResult<Json<Campaign>> {
    validate_campaign(&mut req)?;
    state
        .db
        .update_campaign(id, &req)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Campaign not found"))
}

async fn delete_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if state.db.delete_campaign(id).await? {
        tracing::info!(id, "campaign deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Campaign not found"))
    }
}
