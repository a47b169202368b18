// Mention index: directed (source -> target) edges written by shortcode
// processing and read back for "Linked entities" / "Referenced by" panels.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::SqliteConnection;

use super::kinds::{self, EntityKind, EntityRef};
use crate::metrics;

/// An edge produced by processing, not yet stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewMention {
    pub campaign_id: i64,
    pub source: EntityRef,
    pub target: EntityRef,
}

/// A target the source links to, resolved to its live name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedEntity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: i64,
    pub label: String,
    pub type_label: &'static str,
    pub url: String,
}

/// A source that links to the target, labelled `"<Kind>: <name>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backlink {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: i64,
    pub label: String,
    pub url: String,
}

#[derive(sqlx::FromRow)]
struct EdgeRow {
    kind: String,
    id: i64,
}

/// Delete every edge whose source is `source`. Returns the number removed.
pub async fn clear(conn: &mut SqliteConnection, source: EntityRef) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM entity_mentions WHERE source_type = ? AND source_id = ?")
        .bind(source.kind.code())
        .bind(source.id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Store edges returned by processing.
pub async fn record(conn: &mut SqliteConnection, mentions: &[NewMention]) -> Result<(), sqlx::Error> {
    for m in mentions {
        sqlx::query(
            "INSERT INTO entity_mentions (campaign_id, source_type, source_id, target_type, target_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(m.campaign_id)
        .bind(m.source.kind.code())
        .bind(m.source.id)
        .bind(m.target.kind.code())
        .bind(m.target.id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Outgoing edges of `source`, each resolved to the target's current name.
/// Edges whose target row is gone are skipped.
pub async fn mentions_referenced_by(
    conn: &mut SqliteConnection,
    source: EntityRef,
) -> Result<Vec<LinkedEntity>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EdgeRow>(
        "SELECT target_type AS kind, target_id AS id FROM entity_mentions WHERE source_type = ? AND source_id = ? ORDER BY id",
    )
    .bind(source.kind.code())
    .bind(source.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut linked = Vec::with_capacity(rows.len());
    for (target, name) in live_endpoints(conn, rows).await? {
        linked.push(LinkedEntity {
            kind: target.kind,
            id: target.id,
            label: name,
            type_label: target.kind.label(),
            url: target.kind.detail_url(target.id),
        });
    }
    Ok(linked)
}

/// Every live entity whose text currently mentions `target`, once per source.
pub async fn mentions_referencing(
    conn: &mut SqliteConnection,
    target: EntityRef,
) -> Result<Vec<Backlink>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EdgeRow>(
        "SELECT source_type AS kind, source_id AS id FROM entity_mentions WHERE target_type = ? AND target_id = ? ORDER BY id",
    )
    .bind(target.kind.code())
    .bind(target.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut backlinks = Vec::with_capacity(rows.len());
    for (source, name) in live_endpoints(conn, rows).await? {
        backlinks.push(Backlink {
            kind: source.kind,
            id: source.id,
            label: format!("{}: {}", source.kind.label(), name),
            url: source.kind.detail_url(source.id),
        });
    }
    Ok(backlinks)
}

/// Resolve edge endpoints to live rows, dropping duplicates, unknown kind
/// codes and rows that have been deleted.
async fn live_endpoints(
    conn: &mut SqliteConnection,
    rows: Vec<EdgeRow>,
) -> Result<Vec<(EntityRef, String)>, sqlx::Error> {
    let mut seen = HashSet::new();
    let mut live = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(kind) = EntityKind::from_code(&row.kind) else {
            tracing::warn!(kind = %row.kind, id = row.id, "skipping mention with unknown kind");
            continue;
        };
        let entity = EntityRef::new(kind, row.id);
        if !seen.insert(entity) {
            continue;
        }
        match kinds::display_name(conn, entity).await? {
            Some(name) => live.push((entity, name)),
            None => {
                tracing::debug!(kind = %kind, id = row.id, "skipping dangling mention");
                metrics::DANGLING_MENTIONS_SKIPPED_TOTAL.inc();
            }
        }
    }
    Ok(live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CampaignInput, Database};

    async fn setup() -> (Database, i64) {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let campaign = db
            .create_campaign(&CampaignInput::named("Iron Marches"))
            .await
            .unwrap();
        (db, campaign.id)
    }

    async fn insert_npc(conn: &mut SqliteConnection, cid: i64, name: &str) -> i64 {
        sqlx::query_scalar("INSERT INTO npcs (campaign_id, name) VALUES (?, ?) RETURNING id")
            .bind(cid)
            .bind(name)
            .fetch_one(&mut *conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_and_query_both_directions() {
        let (db, cid) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let a = EntityRef::new(EntityKind::Npc, insert_npc(&mut conn, cid, "Aldric").await);
        let b = EntityRef::new(EntityKind::Npc, insert_npc(&mut conn, cid, "Brenna").await);
        record(
            &mut conn,
            &[NewMention {
                campaign_id: cid,
                source: a,
                target: b,
            }],
        )
        .await
        .unwrap();

        let forward = mentions_referenced_by(&mut conn, a).await.unwrap();
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].label, "Brenna");
        assert_eq!(forward[0].type_label, "NPC");
        assert_eq!(forward[0].url, format!("/npcs/{}", b.id));

        let back = mentions_referencing(&mut conn, b).await.unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].label, "NPC: Aldric");
        assert_eq!(back[0].id, a.id);
    }

    #[tokio::test]
    async fn test_clear_only_touches_one_source() {
        let (db, cid) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let target = EntityRef::new(EntityKind::Npc, insert_npc(&mut conn, cid, "Target").await);
        let s1 = EntityRef::new(EntityKind::Session, 10);
        let s2 = EntityRef::new(EntityKind::Session, 11);
        let edges: Vec<NewMention> = [s1, s1, s2]
            .into_iter()
            .map(|source| NewMention {
                campaign_id: cid,
                source,
                target,
            })
            .collect();
        record(&mut conn, &edges).await.unwrap();

        assert_eq!(clear(&mut conn, s1).await.unwrap(), 2);
        assert_eq!(clear(&mut conn, s1).await.unwrap(), 0);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entity_mentions")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn test_backlinks_skip_deleted_and_duplicate_sources() {
        let (db, cid) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let target = EntityRef::new(EntityKind::Npc, insert_npc(&mut conn, cid, "Target").await);
        let kept = EntityRef::new(EntityKind::Npc, insert_npc(&mut conn, cid, "Kept").await);
        let gone = EntityRef::new(EntityKind::Npc, insert_npc(&mut conn, cid, "Gone").await);
        let edges: Vec<NewMention> = [kept, kept, gone]
            .into_iter()
            .map(|source| NewMention {
                campaign_id: cid,
                source,
                target,
            })
            .collect();
        record(&mut conn, &edges).await.unwrap();

        sqlx::query("DELETE FROM npcs WHERE id = ?")
            .bind(gone.id)
            .execute(&mut *conn)
            .await
            .unwrap();

        let back = mentions_referencing(&mut conn, target).await.unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].label, "NPC: Kept");
    }

    #[tokio::test]
    async fn test_unknown_kind_rows_are_ignored() {
        let (db, cid) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let source = EntityRef::new(EntityKind::Quest, 1);
        sqlx::query(
            "INSERT INTO entity_mentions (campaign_id, source_type, source_id, target_type, target_id) VALUES (?, 'quest', 1, 'faction', 5)",
        )
        .bind(cid)
        .execute(&mut *conn)
        .await
        .unwrap();

        let forward = mentions_referenced_by(&mut conn, source).await.unwrap();
        assert!(forward.is_empty());
    }
}
