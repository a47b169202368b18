// Entity kind registry: the closed set of record kinds that shortcodes and
// mention edges can refer to, plus the per-kind storage lookups.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

/// Every record kind that can appear on either end of a mention edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "npc")]
    Npc,
    #[serde(rename = "loc")]
    Location,
    #[serde(rename = "item")]
    Item,
    #[serde(rename = "quest")]
    Quest,
    #[serde(rename = "comp")]
    Compendium,
    #[serde(rename = "pc")]
    PlayerCharacter,
    #[serde(rename = "site")]
    AdventureSite,
    #[serde(rename = "session")]
    Session,
    #[serde(rename = "bestiary")]
    Bestiary,
}

/// What happens when a shortcode names an entity that does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubPolicy {
    /// Never auto-created; an unmatched marker is left as literal text.
    LookupOnly,
    /// Created with the display name, campaign id and these column defaults.
    Create(&'static [(&'static str, &'static str)]),
    /// Not a shortcode target at all (mention sources only).
    NotMentionable,
}

/// Static description of one entity kind.
#[derive(Debug)]
pub struct KindSpec {
    pub kind: EntityKind,
    /// Code used in `#code[Name]` markers and in `entity_mentions` rows.
    pub code: &'static str,
    pub table: &'static str,
    /// Column holding the human-facing name.
    pub name_column: &'static str,
    pub label: &'static str,
    /// Path prefix of the detail view, e.g. `/npcs`.
    pub route: &'static str,
    pub campaign_scoped: bool,
    pub stub: StubPolicy,
}

static REGISTRY: [KindSpec; 9] = [
    KindSpec {
        kind: EntityKind::Npc,
        code: "npc",
        table: "npcs",
        name_column: "name",
        label: "NPC",
        route: "/npcs",
        campaign_scoped: true,
        stub: StubPolicy::Create(&[("status", "alive")]),
    },
    KindSpec {
        kind: EntityKind::Location,
        code: "loc",
        table: "locations",
        name_column: "name",
        label: "Location",
        route: "/locations",
        campaign_scoped: true,
        stub: StubPolicy::Create(&[]),
    },
    KindSpec {
        kind: EntityKind::Item,
        code: "item",
        table: "items",
        name_column: "name",
        label: "Item",
        route: "/items",
        campaign_scoped: true,
        stub: StubPolicy::Create(&[]),
    },
    KindSpec {
        kind: EntityKind::Quest,
        code: "quest",
        table: "quests",
        name_column: "name",
        label: "Quest",
        route: "/quests",
        campaign_scoped: true,
        stub: StubPolicy::Create(&[("status", "active")]),
    },
    KindSpec {
        kind: EntityKind::Compendium,
        code: "comp",
        table: "compendium_entries",
        name_column: "title",
        label: "Compendium",
        route: "/compendium",
        campaign_scoped: true,
        stub: StubPolicy::Create(&[]),
    },
    KindSpec {
        kind: EntityKind::PlayerCharacter,
        code: "pc",
        table: "player_characters",
        name_column: "character_name",
        label: "PC",
        route: "/pcs",
        campaign_scoped: true,
        stub: StubPolicy::LookupOnly,
    },
    KindSpec {
        kind: EntityKind::AdventureSite,
        code: "site",
        table: "adventure_sites",
        name_column: "name",
        label: "Adventure Site",
        route: "/sites",
        campaign_scoped: true,
        stub: StubPolicy::Create(&[]),
    },
    KindSpec {
        kind: EntityKind::Session,
        code: "session",
        table: "sessions",
        name_column: "title",
        label: "Session",
        route: "/sessions",
        campaign_scoped: true,
        stub: StubPolicy::NotMentionable,
    },
    KindSpec {
        kind: EntityKind::Bestiary,
        code: "bestiary",
        table: "bestiary_entries",
        name_column: "name",
        label: "Bestiary",
        route: "/bestiary",
        campaign_scoped: false,
        stub: StubPolicy::NotMentionable,
    },
];

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Npc,
        EntityKind::Location,
        EntityKind::Item,
        EntityKind::Quest,
        EntityKind::Compendium,
        EntityKind::PlayerCharacter,
        EntityKind::AdventureSite,
        EntityKind::Session,
        EntityKind::Bestiary,
    ];

    pub fn spec(self) -> &'static KindSpec {
        // REGISTRY is declared in the same order as the enum.
        &REGISTRY[self as usize]
    }

    pub fn code(self) -> &'static str {
        self.spec().code
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    /// Whether `#code[...]` markers of this kind are recognized.
    pub fn is_mentionable(self) -> bool {
        self.spec().stub != StubPolicy::NotMentionable
    }

    /// Parse any stored kind code (mention sources included).
    pub fn from_code(code: &str) -> Option<Self> {
        REGISTRY.iter().find(|s| s.code == code).map(|s| s.kind)
    }

    /// Parse a shortcode type; only mentionable kinds qualify.
    pub fn from_shortcode(code: &str) -> Option<Self> {
        Self::from_code(code).filter(|k| k.is_mentionable())
    }

    pub fn detail_url(self, id: i64) -> String {
        format!("{}/{}", self.spec().route, id)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| format!("unknown entity kind '{s}'"))
    }
}

/// A typed pointer to one row of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }
}

// ── Storage lookups ───────────────────────────────────────────────────
//
// Table and column names below come from REGISTRY, never from user input.

/// Case-insensitive exact match on the display column within a campaign.
/// Duplicate names resolve to the lowest id.
pub async fn lookup_by_name(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    name: &str,
    campaign_id: i64,
) -> Result<Option<(i64, String)>, sqlx::Error> {
    let spec = kind.spec();
    if !spec.campaign_scoped {
        return Ok(None);
    }
    let sql = format!(
        "SELECT id, {col} FROM {table} WHERE campaign_id = ? AND {col} = ? COLLATE NOCASE ORDER BY id LIMIT 1",
        col = spec.name_column,
        table = spec.table,
    );
    sqlx::query_as::<_, (i64, String)>(&sql)
        .bind(campaign_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
}

/// Insert a minimal row for `name` and return its id. `None` when the kind
/// may not be auto-created.
pub async fn create_stub(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    name: &str,
    campaign_id: i64,
) -> Result<Option<i64>, sqlx::Error> {
    let spec = kind.spec();
    let defaults = match spec.stub {
        StubPolicy::Create(defaults) if spec.campaign_scoped => defaults,
        _ => return Ok(None),
    };

    let mut columns = vec!["campaign_id", spec.name_column];
    columns.extend(defaults.iter().map(|(col, _)| *col));
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
        spec.table,
        columns.join(", "),
        placeholders,
    );

    let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(campaign_id).bind(name);
    for (_, value) in defaults {
        query = query.bind(*value);
    }
    let id = query.fetch_one(&mut *conn).await?;
    Ok(Some(id))
}

/// Current display name of a live row, or `None` if it no longer exists.
pub async fn display_name(
    conn: &mut SqliteConnection,
    entity: EntityRef,
) -> Result<Option<String>, sqlx::Error> {
    let spec = entity.kind.spec();
    let sql = format!(
        "SELECT COALESCE({}, '') FROM {} WHERE id = ?",
        spec.name_column, spec.table
    );
    sqlx::query_scalar::<_, String>(&sql)
        .bind(entity.id)
        .fetch_optional(&mut *conn)
        .await
}

/// Rows of a mentionable kind whose display name contains `q`
/// (case-insensitive), ordered by name. Backs the shortcode autocomplete.
pub async fn search_by_name(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    campaign_id: i64,
    q: &str,
    limit: i64,
) -> Result<Vec<(i64, String)>, sqlx::Error> {
    let spec = kind.spec();
    let sql = format!(
        "SELECT id, {col} FROM {table} WHERE campaign_id = ? AND instr(lower({col}), lower(?)) > 0 ORDER BY {col} COLLATE NOCASE, id LIMIT ?",
        col = spec.name_column,
        table = spec.table,
    );
    sqlx::query_as::<_, (i64, String)>(&sql)
        .bind(campaign_id)
        .bind(q)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await
}
