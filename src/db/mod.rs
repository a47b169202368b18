// Database access layer (SQLite via sqlx).

pub mod records;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, Transaction};

use crate::shortcode::EntityRef;

pub use records::{
    AdventureSite, AdventureSiteInput, BestiaryEntry, BestiaryEntryInput, CompendiumEntry,
    CompendiumEntryInput, GameSession, GameSessionInput, Item, ItemInput, Location, LocationInput,
    Npc, NpcInput, PlayerCharacter, PlayerCharacterInput, Quest, QuestInput, WikiRecord,
};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub system: Option<String>,
    pub status: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignInput {
    pub name: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CampaignInput {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.foreign_keys(true);

        // Every connection to `:memory:` is its own database, so keep exactly one alive.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start the unit of work an editor save runs in.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS campaigns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                system TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                description TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                location_type TEXT,
                description TEXT,
                notes TEXT,
                gm_notes TEXT,
                parent_location_id INTEGER REFERENCES locations(id) ON DELETE SET NULL,
                is_player_visible INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS npcs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                role TEXT,
                status TEXT NOT NULL DEFAULT 'alive',
                faction TEXT,
                physical_description TEXT,
                personality TEXT,
                secrets TEXT,
                notes TEXT,
                home_location_id INTEGER REFERENCES locations(id) ON DELETE SET NULL,
                is_player_visible INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                item_type TEXT,
                rarity TEXT,
                description TEXT,
                gm_notes TEXT,
                owner_npc_id INTEGER REFERENCES npcs(id) ON DELETE SET NULL,
                origin_location_id INTEGER REFERENCES locations(id) ON DELETE SET NULL,
                is_player_visible INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS quests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                hook TEXT,
                description TEXT,
                outcome TEXT,
                gm_notes TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS compendium_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                category TEXT,
                content TEXT,
                is_gm_only INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS player_characters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                character_name TEXT NOT NULL,
                player_name TEXT NOT NULL,
                level_or_rank TEXT,
                class_or_role TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                backstory TEXT,
                gm_hooks TEXT,
                notes TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS adventure_sites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                subtitle TEXT,
                status TEXT,
                estimated_sessions INTEGER,
                content TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                number INTEGER,
                title TEXT,
                date_played TEXT,
                summary TEXT,
                gm_notes TEXT,
                prep_notes TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS bestiary_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                system TEXT,
                cr_level TEXT,
                stat_block TEXT NOT NULL,
                source TEXT,
                visible_to_players INTEGER NOT NULL DEFAULT 0,
                tags TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS entity_mentions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                source_type TEXT NOT NULL,
                source_id INTEGER NOT NULL,
                target_type TEXT NOT NULL,
                target_id INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS ix_entity_mentions_source ON entity_mentions (source_type, source_id)",
            "CREATE INDEX IF NOT EXISTS ix_entity_mentions_target ON entity_mentions (target_type, target_id)",
        ];

        for sql in statements {
            sqlx::query(sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ── Campaign CRUD ─────────────────────────────────────────────────

    pub async fn create_campaign(&self, input: &CampaignInput) -> Result<Campaign, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            "INSERT INTO campaigns (name, system, status, description) VALUES (?, ?, ?, ?) RETURNING id, name, system, status, description, created_at",
        )
        .bind(&input.name)
        .bind(&input.system)
        .bind(input.status.as_deref().unwrap_or("active"))
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn list_campaigns(&self) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            "SELECT id, name, system, status, description, created_at FROM campaigns ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            "SELECT id, name, system, status, description, created_at FROM campaigns WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn update_campaign(
        &self,
        id: i64,
        input: &CampaignInput,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns SET name = ?, system = ?, status = ?, description = ? WHERE id = ?",
        )
        .bind(&input.name)
        .bind(&input.system)
        .bind(input.status.as_deref().unwrap_or("active"))
        .bind(&input.description)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_campaign(id).await
    }

    /// Deletes the campaign and, through `ON DELETE CASCADE`, everything it owns.
    pub async fn delete_campaign(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM campaigns WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Wiki records ──────────────────────────────────────────────────

    pub async fn get_record<R: WikiRecord>(&self, id: i64) -> Result<Option<R>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        fetch_record::<R>(&mut conn, id).await
    }

    /// Records of one kind, ordered by display name. `campaign_id` is
    /// ignored for kinds that are not campaign scoped.
    pub async fn list_records<R: WikiRecord>(
        &self,
        campaign_id: i64,
    ) -> Result<Vec<R>, sqlx::Error> {
        let spec = R::KIND.spec();
        if spec.campaign_scoped {
            let sql = format!(
                "SELECT * FROM {} WHERE campaign_id = ? ORDER BY {} COLLATE NOCASE, id",
                spec.table, spec.name_column
            );
            sqlx::query_as::<_, R>(&sql)
                .bind(campaign_id)
                .fetch_all(&self.pool)
                .await
        } else {
            let sql = format!(
                "SELECT * FROM {} ORDER BY {} COLLATE NOCASE, id",
                spec.table, spec.name_column
            );
            sqlx::query_as::<_, R>(&sql).fetch_all(&self.pool).await
        }
    }
}

pub async fn campaign_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM campaigns WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

pub async fn fetch_record<R: WikiRecord>(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<R>, sqlx::Error> {
    let sql = format!("SELECT * FROM {} WHERE id = ?", R::KIND.spec().table);
    sqlx::query_as::<_, R>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Delete one row of `entity.kind`. Mention edges are the caller's concern.
pub async fn delete_record(
    conn: &mut SqliteConnection,
    entity: EntityRef,
) -> Result<bool, sqlx::Error> {
    let sql = format!("DELETE FROM {} WHERE id = ?", entity.kind.spec().table);
    let result = sqlx::query(&sql)
        .bind(entity.id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
