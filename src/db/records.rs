// Wiki record types: one row struct and one editor input per entity kind.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;

use crate::shortcode::EntityKind;

/// A stored entity kind together with its editor contract.
#[async_trait]
pub trait WikiRecord:
    for<'r> sqlx::FromRow<'r, SqliteRow> + Serialize + Send + Sync + Unpin + 'static
{
    const KIND: EntityKind;
    type Input: DeserializeOwned + Send + Sync + 'static;

    fn id(&self) -> i64;

    /// Owning campaign; `None` for global kinds.
    fn campaign_id(&self) -> Option<i64>;

    /// Trim and validate editor input, returning a user-facing message on failure.
    fn normalize(input: &mut Self::Input) -> Result<(), String>;

    /// Free-text fields that carry shortcodes.
    fn text_fields(input: &mut Self::Input) -> Vec<&mut Option<String>>;

    async fn insert(
        conn: &mut SqliteConnection,
        campaign_id: i64,
        input: &Self::Input,
    ) -> Result<i64, sqlx::Error>;

    /// Replace every editable column. Returns false when the row is gone.
    async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        input: &Self::Input,
    ) -> Result<bool, sqlx::Error>;
}

/// Trim surrounding whitespace, turning blank strings into `None`.
fn tidy(field: &mut Option<String>) {
    if let Some(value) = field.take() {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            *field = Some(trimmed.to_string());
        }
    }
}

fn tidy_all(fields: Vec<&mut Option<String>>) {
    for field in fields {
        tidy(field);
    }
}

fn required(field: &mut String, what: &str) -> Result<(), String> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Err(format!("{what} is required"));
    }
    *field = trimmed.to_string();
    Ok(())
}

// ── NPCs ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Npc {
    pub id: i64,
    pub campaign_id: i64,
    pub name: String,
    pub role: Option<String>,
    pub status: String,
    pub faction: Option<String>,
    pub physical_description: Option<String>,
    pub personality: Option<String>,
    pub secrets: Option<String>,
    pub notes: Option<String>,
    pub home_location_id: Option<i64>,
    pub is_player_visible: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NpcInput {
    pub name: String,
    pub role: Option<String>,
    pub status: Option<String>,
    pub faction: Option<String>,
    pub physical_description: Option<String>,
    pub personality: Option<String>,
    pub secrets: Option<String>,
    pub notes: Option<String>,
    pub home_location_id: Option<i64>,
    pub is_player_visible: bool,
}

#[async_trait]
impl WikiRecord for Npc {
    const KIND: EntityKind = EntityKind::Npc;
    type Input = NpcInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn campaign_id(&self) -> Option<i64> {
        Some(self.campaign_id)
    }

    fn normalize(input: &mut NpcInput) -> Result<(), String> {
        required(&mut input.name, "name")?;
        tidy(&mut input.role);
        tidy(&mut input.status);
        tidy(&mut input.faction);
        tidy_all(Self::text_fields(input));
        Ok(())
    }

    fn text_fields(input: &mut NpcInput) -> Vec<&mut Option<String>> {
        vec![
            &mut input.physical_description,
            &mut input.personality,
            &mut input.secrets,
            &mut input.notes,
        ]
    }

    async fn insert(
        conn: &mut SqliteConnection,
        campaign_id: i64,
        input: &NpcInput,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO npcs (campaign_id, name, role, status, faction, physical_description, personality, secrets, notes, home_location_id, is_player_visible) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(campaign_id)
        .bind(&input.name)
        .bind(&input.role)
        .bind(input.status.as_deref().unwrap_or("alive"))
        .bind(&input.faction)
        .bind(&input.physical_description)
        .bind(&input.personality)
        .bind(&input.secrets)
        .bind(&input.notes)
        .bind(input.home_location_id)
        .bind(input.is_player_visible)
        .fetch_one(&mut *conn)
        .await
    }

    async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        input: &NpcInput,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE npcs SET name = ?, role = ?, status = ?, faction = ?, physical_description = ?, personality = ?, secrets = ?, notes = ?, home_location_id = ?, is_player_visible = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(&input.name)
        .bind(&input.role)
        .bind(input.status.as_deref().unwrap_or("alive"))
        .bind(&input.faction)
        .bind(&input.physical_description)
        .bind(&input.personality)
        .bind(&input.secrets)
        .bind(&input.notes)
        .bind(input.home_location_id)
        .bind(input.is_player_visible)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Locations ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: i64,
    pub campaign_id: i64,
    pub name: String,
    pub location_type: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub gm_notes: Option<String>,
    pub parent_location_id: Option<i64>,
    pub is_player_visible: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LocationInput {
    pub name: String,
    pub location_type: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub gm_notes: Option<String>,
    pub parent_location_id: Option<i64>,
    pub is_player_visible: bool,
}

#[async_trait]
impl WikiRecord for Location {
    const KIND: EntityKind = EntityKind::Location;
    type Input = LocationInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn campaign_id(&self) -> Option<i64> {
        Some(self.campaign_id)
    }

    fn normalize(input: &mut LocationInput) -> Result<(), String> {
        required(&mut input.name, "name")?;
        tidy(&mut input.location_type);
        tidy_all(Self::text_fields(input));
        Ok(())
    }

    fn text_fields(input: &mut LocationInput) -> Vec<&mut Option<String>> {
        vec![
            &mut input.description,
            &mut input.notes,
            &mut input.gm_notes,
        ]
    }

    async fn insert(
        conn: &mut SqliteConnection,
        campaign_id: i64,
        input: &LocationInput,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO locations (campaign_id, name, location_type, description, notes, gm_notes, parent_location_id, is_player_visible) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(campaign_id)
        .bind(&input.name)
        .bind(&input.location_type)
        .bind(&input.description)
        .bind(&input.notes)
        .bind(&input.gm_notes)
        .bind(input.parent_location_id)
        .bind(input.is_player_visible)
        .fetch_one(&mut *conn)
        .await
    }

    async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        input: &LocationInput,
    ) -> Result<bool, sqlx::Error> {
        // A location cannot be its own parent.
        let parent = input.parent_location_id.filter(|p| *p != id);
        let result = sqlx::query(
            "UPDATE locations SET name = ?, location_type = ?, description = ?, notes = ?, gm_notes = ?, parent_location_id = ?, is_player_visible = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(&input.name)
        .bind(&input.location_type)
        .bind(&input.description)
        .bind(&input.notes)
        .bind(&input.gm_notes)
        .bind(parent)
        .bind(input.is_player_visible)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Items ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    pub campaign_id: i64,
    pub name: String,
    pub item_type: Option<String>,
    pub rarity: Option<String>,
    pub description: Option<String>,
    pub gm_notes: Option<String>,
    pub owner_npc_id: Option<i64>,
    pub origin_location_id: Option<i64>,
    pub is_player_visible: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemInput {
    pub name: String,
    pub item_type: Option<String>,
    pub rarity: Option<String>,
    pub description: Option<String>,
    pub gm_notes: Option<String>,
    pub owner_npc_id: Option<i64>,
    pub origin_location_id: Option<i64>,
    pub is_player_visible: bool,
}

#[async_trait]
impl WikiRecord for Item {
    const KIND: EntityKind = EntityKind::Item;
    type Input = ItemInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn campaign_id(&self) -> Option<i64> {
        Some(self.campaign_id)
    }

    fn normalize(input: &mut ItemInput) -> Result<(), String> {
        required(&mut input.name, "name")?;
        tidy(&mut input.item_type);
        tidy(&mut input.rarity);
        tidy_all(Self::text_fields(input));
        Ok(())
    }

    fn text_fields(input: &mut ItemInput) -> Vec<&mut Option<String>> {
        vec![
            &mut input.description,
            &mut input.gm_notes,
        ]
    }

    async fn insert(
        conn: &mut SqliteConnection,
        campaign_id: i64,
        input: &ItemInput,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO items (campaign_id, name, item_type, rarity, description, gm_notes, owner_npc_id, origin_location_id, is_player_visible) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(campaign_id)
        .bind(&input.name)
        .bind(&input.item_type)
        .bind(&input.rarity)
        .bind(&input.description)
        .bind(&input.gm_notes)
        .bind(input.owner_npc_id)
        .bind(input.origin_location_id)
        .bind(input.is_player_visible)
        .fetch_one(&mut *conn)
        .await
    }

    async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        input: &ItemInput,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE items SET name = ?, item_type = ?, rarity = ?, description = ?, gm_notes = ?, owner_npc_id = ?, origin_location_id = ?, is_player_visible = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(&input.name)
        .bind(&input.item_type)
        .bind(&input.rarity)
        .bind(&input.description)
        .bind(&input.gm_notes)
        .bind(input.owner_npc_id)
        .bind(input.origin_location_id)
        .bind(input.is_player_visible)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Quests ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Quest {
    pub id: i64,
    pub campaign_id: i64,
    pub name: String,
    pub status: String,
    pub hook: Option<String>,
    pub description: Option<String>,
    pub outcome: Option<String>,
    pub gm_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QuestInput {
    pub name: String,
    pub status: Option<String>,
    pub hook: Option<String>,
    pub description: Option<String>,
    pub outcome: Option<String>,
    pub gm_notes: Option<String>,
}

#[async_trait]
impl WikiRecord for Quest {
    const KIND: EntityKind = EntityKind::Quest;
    type Input = QuestInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn campaign_id(&self) -> Option<i64> {
        Some(self.campaign_id)
    }

    fn normalize(input: &mut QuestInput) -> Result<(), String> {
        required(&mut input.name, "name")?;
        tidy(&mut input.status);
        tidy_all(Self::text_fields(input));
        Ok(())
    }

    fn text_fields(input: &mut QuestInput) -> Vec<&mut Option<String>> {
        vec![
            &mut input.hook,
            &mut input.description,
            &mut input.outcome,
            &mut input.gm_notes,
        ]
    }

    async fn insert(
        conn: &mut SqliteConnection,
        campaign_id: i64,
        input: &QuestInput,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO quests (campaign_id, name, status, hook, description, outcome, gm_notes) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(campaign_id)
        .bind(&input.name)
        .bind(input.status.as_deref().unwrap_or("active"))
        .bind(&input.hook)
        .bind(&input.description)
        .bind(&input.outcome)
        .bind(&input.gm_notes)
        .fetch_one(&mut *conn)
        .await
    }

    async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        input: &QuestInput,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE quests SET name = ?, status = ?, hook = ?, description = ?, outcome = ?, gm_notes = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(&input.name)
        .bind(input.status.as_deref().unwrap_or("active"))
        .bind(&input.hook)
        .bind(&input.description)
        .bind(&input.outcome)
        .bind(&input.gm_notes)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Compendium ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompendiumEntry {
    pub id: i64,
    pub campaign_id: i64,
    pub title: String,
    pub category: Option<String>,
    pub content: Option<String>,
    pub is_gm_only: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompendiumEntryInput {
    pub title: String,
    pub category: Option<String>,
    pub content: Option<String>,
    pub is_gm_only: bool,
}

#[async_trait]
impl WikiRecord for CompendiumEntry {
    const KIND: EntityKind = EntityKind::Compendium;
    type Input = CompendiumEntryInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn campaign_id(&self) -> Option<i64> {
        Some(self.campaign_id)
    }

    fn normalize(input: &mut CompendiumEntryInput) -> Result<(), String> {
        required(&mut input.title, "title")?;
        tidy(&mut input.category);
        tidy(&mut input.content);
        Ok(())
    }

    fn text_fields(input: &mut CompendiumEntryInput) -> Vec<&mut Option<String>> {
        vec![&mut input.content]
    }

    async fn insert(
        conn: &mut SqliteConnection,
        campaign_id: i64,
        input: &CompendiumEntryInput,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO compendium_entries (campaign_id, title, category, content, is_gm_only) VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(campaign_id)
        .bind(&input.title)
        .bind(&input.category)
        .bind(&input.content)
        .bind(input.is_gm_only)
        .fetch_one(&mut *conn)
        .await
    }

    async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        input: &CompendiumEntryInput,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE compendium_entries SET title = ?, category = ?, content = ?, is_gm_only = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(&input.title)
        .bind(&input.category)
        .bind(&input.content)
        .bind(input.is_gm_only)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Player characters ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayerCharacter {
    pub id: i64,
    pub campaign_id: i64,
    pub character_name: String,
    pub player_name: String,
    pub level_or_rank: Option<String>,
    pub class_or_role: Option<String>,
    pub status: String,
    pub backstory: Option<String>,
    pub gm_hooks: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlayerCharacterInput {
    pub character_name: String,
    pub player_name: String,
    pub level_or_rank: Option<String>,
    pub class_or_role: Option<String>,
    pub status: Option<String>,
    pub backstory: Option<String>,
    pub gm_hooks: Option<String>,
    pub notes: Option<String>,
}

#[async_trait]
impl WikiRecord for PlayerCharacter {
    const KIND: EntityKind = EntityKind::PlayerCharacter;
    type Input = PlayerCharacterInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn campaign_id(&self) -> Option<i64> {
        Some(self.campaign_id)
    }

    fn normalize(input: &mut PlayerCharacterInput) -> Result<(), String> {
        required(&mut input.character_name, "character_name")?;
        required(&mut input.player_name, "player_name")?;
        tidy(&mut input.level_or_rank);
        tidy(&mut input.class_or_role);
        tidy(&mut input.status);
        tidy(&mut input.backstory);
        tidy(&mut input.gm_hooks);
        tidy(&mut input.notes);
        Ok(())
    }

    fn text_fields(_input: &mut PlayerCharacterInput) -> Vec<&mut Option<String>> {
        Vec::new()
    }

    async fn insert(
        conn: &mut SqliteConnection,
        campaign_id: i64,
        input: &PlayerCharacterInput,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO player_characters (campaign_id, character_name, player_name, level_or_rank, class_or_role, status, backstory, gm_hooks, notes) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(campaign_id)
        .bind(&input.character_name)
        .bind(&input.player_name)
        .bind(&input.level_or_rank)
        .bind(&input.class_or_role)
        .bind(input.status.as_deref().unwrap_or("active"))
        .bind(&input.backstory)
        .bind(&input.gm_hooks)
        .bind(&input.notes)
        .fetch_one(&mut *conn)
        .await
    }

    async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        input: &PlayerCharacterInput,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE player_characters SET character_name = ?, player_name = ?, level_or_rank = ?, class_or_role = ?, status = ?, backstory = ?, gm_hooks = ?, notes = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(&input.character_name)
        .bind(&input.player_name)
        .bind(&input.level_or_rank)
        .bind(&input.class_or_role)
        .bind(input.status.as_deref().unwrap_or("active"))
        .bind(&input.backstory)
        .bind(&input.gm_hooks)
        .bind(&input.notes)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Adventure sites ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdventureSite {
    pub id: i64,
    pub campaign_id: i64,
    pub name: String,
    pub subtitle: Option<String>,
    pub status: Option<String>,
    pub estimated_sessions: Option<i64>,
    pub content: Option<String>,
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdventureSiteInput {
    pub name: String,
    pub subtitle: Option<String>,
    pub status: Option<String>,
    pub estimated_sessions: Option<i64>,
    pub content: Option<String>,
    pub sort_order: i64,
}

#[async_trait]
impl WikiRecord for AdventureSite {
    const KIND: EntityKind = EntityKind::AdventureSite;
    type Input = AdventureSiteInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn campaign_id(&self) -> Option<i64> {
        Some(self.campaign_id)
    }

    fn normalize(input: &mut AdventureSiteInput) -> Result<(), String> {
        required(&mut input.name, "name")?;
        tidy(&mut input.subtitle);
        tidy(&mut input.status);
        tidy_all(Self::text_fields(input));
        if input.estimated_sessions.is_some_and(|n| n < 0) {
            return Err("estimated_sessions must not be negative".to_string());
        }
        Ok(())
    }

    fn text_fields(input: &mut AdventureSiteInput) -> Vec<&mut Option<String>> {
        vec![&mut input.content]
    }

    async fn insert(
        conn: &mut SqliteConnection,
        campaign_id: i64,
        input: &AdventureSiteInput,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO adventure_sites (campaign_id, name, subtitle, status, estimated_sessions, content, sort_order) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(campaign_id)
        .bind(&input.name)
        .bind(&input.subtitle)
        .bind(&input.status)
        .bind(input.estimated_sessions)
        .bind(&input.content)
        .bind(input.sort_order)
        .fetch_one(&mut *conn)
        .await
    }

    async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        input: &AdventureSiteInput,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE adventure_sites SET name = ?, subtitle = ?, status = ?, estimated_sessions = ?, content = ?, sort_order = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(&input.name)
        .bind(&input.subtitle)
        .bind(&input.status)
        .bind(input.estimated_sessions)
        .bind(&input.content)
        .bind(input.sort_order)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Sessions ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GameSession {
    pub id: i64,
    pub campaign_id: i64,
    pub number: Option<i64>,
    pub title: Option<String>,
    pub date_played: Option<String>,
    pub summary: Option<String>,
    pub gm_notes: Option<String>,
    pub prep_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameSessionInput {
    pub number: Option<i64>,
    pub title: Option<String>,
    /// `YYYY-MM-DD`.
    pub date_played: Option<String>,
    pub summary: Option<String>,
    pub gm_notes: Option<String>,
    pub prep_notes: Option<String>,
}

#[async_trait]
impl WikiRecord for GameSession {
    const KIND: EntityKind = EntityKind::Session;
    type Input = GameSessionInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn campaign_id(&self) -> Option<i64> {
        Some(self.campaign_id)
    }

    fn normalize(input: &mut GameSessionInput) -> Result<(), String> {
        tidy(&mut input.title);
        tidy(&mut input.date_played);
        tidy_all(Self::text_fields(input));
        if let Some(date) = &input.date_played {
            chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|_| format!("date_played '{date}' is not a YYYY-MM-DD date"))?;
        }
        Ok(())
    }

    fn text_fields(input: &mut GameSessionInput) -> Vec<&mut Option<String>> {
        vec![
            &mut input.summary,
            &mut input.gm_notes,
            &mut input.prep_notes,
        ]
    }

    async fn insert(
        conn: &mut SqliteConnection,
        campaign_id: i64,
        input: &GameSessionInput,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO sessions (campaign_id, number, title, date_played, summary, gm_notes, prep_notes) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(campaign_id)
        .bind(input.number)
        .bind(&input.title)
        .bind(&input.date_played)
        .bind(&input.summary)
        .bind(&input.gm_notes)
        .bind(&input.prep_notes)
        .fetch_one(&mut *conn)
        .await
    }

    async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        input: &GameSessionInput,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET number = ?, title = ?, date_played = ?, summary = ?, gm_notes = ?, prep_notes = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(input.number)
        .bind(&input.title)
        .bind(&input.date_played)
        .bind(&input.summary)
        .bind(&input.gm_notes)
        .bind(&input.prep_notes)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Bestiary ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BestiaryEntry {
    pub id: i64,
    pub name: String,
    pub system: Option<String>,
    pub cr_level: Option<String>,
    pub stat_block: String,
    pub source: Option<String>,
    pub visible_to_players: bool,
    pub tags: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BestiaryEntryInput {
    pub name: String,
    pub system: Option<String>,
    pub cr_level: Option<String>,
    pub stat_block: Option<String>,
    pub source: Option<String>,
    pub visible_to_players: bool,
    /// Comma separated; stored lowercased without blanks.
    pub tags: Option<String>,
    /// Campaign whose entities the stat block's shortcodes resolve against.
    /// Bestiary entries themselves are global.
    pub campaign_id: Option<i64>,
}

#[async_trait]
impl WikiRecord for BestiaryEntry {
    const KIND: EntityKind = EntityKind::Bestiary;
    type Input = BestiaryEntryInput;

    fn id(&self) -> i64 {
        self.id
    }

    fn campaign_id(&self) -> Option<i64> {
        None
    }

    fn normalize(input: &mut BestiaryEntryInput) -> Result<(), String> {
        required(&mut input.name, "name")?;
        tidy(&mut input.stat_block);
        if input.stat_block.is_none() {
            return Err("stat_block is required".to_string());
        }
        tidy(&mut input.system);
        tidy(&mut input.cr_level);
        tidy(&mut input.source);
        input.tags = input.tags.as_deref().and_then(|raw| {
            let tags: Vec<String> = raw
                .split(',')
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
            (!tags.is_empty()).then(|| tags.join(","))
        });
        Ok(())
    }

    fn text_fields(input: &mut BestiaryEntryInput) -> Vec<&mut Option<String>> {
        vec![&mut input.stat_block]
    }

    async fn insert(
        conn: &mut SqliteConnection,
        _campaign_id: i64,
        input: &BestiaryEntryInput,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO bestiary_entries (name, system, cr_level, stat_block, source, visible_to_players, tags) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&input.name)
        .bind(&input.system)
        .bind(&input.cr_level)
        .bind(input.stat_block.as_deref().unwrap_or_default())
        .bind(&input.source)
        .bind(input.visible_to_players)
        .bind(&input.tags)
        .fetch_one(&mut *conn)
        .await
    }

    async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        input: &BestiaryEntryInput,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bestiary_entries SET name = ?, system = ?, cr_level = ?, stat_block = ?, source = ?, visible_to_players = ?, tags = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(&input.name)
        .bind(&input.system)
        .bind(&input.cr_level)
        .bind(input.stat_block.as_deref().unwrap_or_default())
        .bind(&input.source)
        .bind(input.visible_to_players)
        .bind(&input.tags)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fetch_record, CampaignInput, Database};

    #[test]
    fn test_normalize_trims_and_requires_name() {
        let mut input = NpcInput {
            name: "  Marv  ".into(),
            role: Some("   ".into()),
            ..NpcInput::default()
        };
        Npc::normalize(&mut input).unwrap();
        assert_eq!(input.name, "Marv");
        assert!(input.role.is_none());

        let mut blank = NpcInput::default();
        assert_eq!(Npc::normalize(&mut blank).unwrap_err(), "name is required");
    }

    #[test]
    fn test_blank_text_fields_become_none() {
        let mut input = LocationInput {
            name: "Neverwinter".into(),
            description: Some("  A city of skilled artisans.\n".into()),
            notes: Some("   ".into()),
            gm_notes: Some(String::new()),
            ..LocationInput::default()
        };
        Location::normalize(&mut input).unwrap();
        assert_eq!(input.description.as_deref(), Some("A city of skilled artisans."));
        assert!(input.notes.is_none());
        assert!(input.gm_notes.is_none());
    }

    #[test]
    fn test_session_date_must_parse() {
        let mut ok = GameSessionInput {
            date_played: Some("2026-03-14".into()),
            ..GameSessionInput::default()
        };
        assert!(GameSession::normalize(&mut ok).is_ok());

        let mut bad = GameSessionInput {
            date_played: Some("last tuesday".into()),
            ..GameSessionInput::default()
        };
        assert!(GameSession::normalize(&mut bad).is_err());
    }

    #[test]
    fn test_bestiary_tags_are_normalized() {
        let mut input = BestiaryEntryInput {
            name: "Owlbear".into(),
            stat_block: Some("AC 13".into()),
            tags: Some(" Beast, ,FOREST ".into()),
            ..BestiaryEntryInput::default()
        };
        BestiaryEntry::normalize(&mut input).unwrap();
        assert_eq!(input.tags.as_deref(), Some("beast,forest"));

        let mut missing = BestiaryEntryInput {
            name: "Ghost".into(),
            ..BestiaryEntryInput::default()
        };
        assert!(BestiaryEntry::normalize(&mut missing).is_err());
    }

    #[tokio::test]
    async fn test_insert_update_fetch_quest() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let c = db.create_campaign(&CampaignInput::named("Quests")).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let mut input = QuestInput {
            name: "Rescue the Smith".into(),
            hook: Some("A letter arrives".into()),
            ..QuestInput::default()
        };
        let id = Quest::insert(&mut conn, c.id, &input).await.unwrap();
        let quest: Quest = fetch_record(&mut conn, id).await.unwrap().unwrap();
        assert_eq!(quest.status, "active");
        assert_eq!(quest.hook.as_deref(), Some("A letter arrives"));

        input.status = Some("completed".into());
        assert!(Quest::update(&mut conn, id, &input).await.unwrap());
        assert!(!Quest::update(&mut conn, id + 100, &input).await.unwrap());
        let quest: Quest = fetch_record(&mut conn, id).await.unwrap().unwrap();
        assert_eq!(quest.status, "completed");
    }
}
