// End-to-end tests for shortcode processing: stub creation, deduplication,
// reindexing on edit, case-insensitive matching and dangling-edge tolerance.

use gm_wiki_backend::db::{CampaignInput, Database};
use gm_wiki_backend::shortcode::{
    self, clear, mentions_referenced_by, mentions_referencing, process, record, reindex_fields,
    EntityKind, EntityRef,
};
use sqlx::SqliteConnection;

async fn test_db() -> (Database, i64) {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let campaign = db
        .create_campaign(&CampaignInput::named("Waterdeep"))
        .await
        .unwrap();
    (db, campaign.id)
}

async fn count(conn: &mut SqliteConnection, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(&mut *conn).await.unwrap()
}

async fn insert_named(conn: &mut SqliteConnection, table: &str, cid: i64, name: &str) -> i64 {
    let sql = format!("INSERT INTO {table} (campaign_id, name) VALUES (?, ?) RETURNING id");
    sqlx::query_scalar(&sql)
        .bind(cid)
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .unwrap()
}

fn session(id: i64) -> EntityRef {
    EntityRef::new(EntityKind::Session, id)
}

// ── Stubs ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_npc_becomes_one_stub() {
    let (db, cid) = test_db().await;
    let mut conn = db.pool().acquire().await.unwrap();

    let out = process(&mut conn, "We met #npc[Volo] at the inn.", cid, session(1))
        .await
        .unwrap();

    assert_eq!(count(&mut conn, "SELECT COUNT(*) FROM npcs").await, 1);
    let (id, name, status): (i64, String, String) =
        sqlx::query_as("SELECT id, name, status FROM npcs")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
    assert_eq!(name, "Volo");
    assert_eq!(status, "alive");

    assert_eq!(
        out.text,
        format!(
            "We met <a href=\"/npcs/{id}\" class=\"shortcode-link\" data-preview-type=\"npc\" data-preview-id=\"{id}\">Volo</a> at the inn."
        )
    );
    assert_eq!(out.mentions.len(), 1);
    assert_eq!(out.mentions[0].target, EntityRef::new(EntityKind::Npc, id));
}

#[tokio::test]
async fn test_repeated_marker_yields_one_edge_and_two_links() {
    let (db, cid) = test_db().await;
    let mut conn = db.pool().acquire().await.unwrap();

    let out = process(&mut conn, "#loc[Town] and #loc[Town] again", cid, session(1))
        .await
        .unwrap();

    assert_eq!(count(&mut conn, "SELECT COUNT(*) FROM locations").await, 1);
    assert_eq!(out.mentions.len(), 1);
    assert_eq!(out.text.matches("class=\"shortcode-link\"").count(), 2);
    assert!(!out.text.contains("#loc["));
    assert!(out.text.contains(" and "));
    assert!(out.text.ends_with(" again"));
}

#[tokio::test]
async fn test_case_insensitive_match_keeps_stored_casing() {
    let (db, cid) = test_db().await;
    let mut conn = db.pool().acquire().await.unwrap();
    let king = insert_named(&mut conn, "npcs", cid, "Goblin King").await;

    let out = process(&mut conn, "Beware #npc[goblin king].", cid, session(1))
        .await
        .unwrap();

    assert_eq!(count(&mut conn, "SELECT COUNT(*) FROM npcs").await, 1);
    assert!(out.text.contains(">Goblin King</a>"));
    assert_eq!(out.mentions[0].target.id, king);
}

#[tokio::test]
async fn test_missing_player_character_is_left_literal() {
    let (db, cid) = test_db().await;
    let mut conn = db.pool().acquire().await.unwrap();

    let out = process(&mut conn, "Ask #pc[NoSuchHero] later", cid, session(1))
        .await
        .unwrap();

    assert_eq!(out.text, "Ask #pc[NoSuchHero] later");
    assert!(out.mentions.is_empty());
    assert_eq!(
        count(&mut conn, "SELECT COUNT(*) FROM player_characters").await,
        0
    );
}

#[tokio::test]
async fn test_existing_player_character_links() {
    let (db, cid) = test_db().await;
    let mut conn = db.pool().acquire().await.unwrap();
    let pc: i64 = sqlx::query_scalar(
        "INSERT INTO player_characters (campaign_id, character_name, player_name) VALUES (?, 'Tamsin', 'Alex') RETURNING id",
    )
    .bind(cid)
    .fetch_one(&mut *conn)
    .await
    .unwrap();

    let out = process(&mut conn, "#pc[tamsin]", cid, session(1)).await.unwrap();
    assert!(out.text.contains(&format!("href=\"/pcs/{pc}\"")));
    assert!(out.text.contains(">Tamsin</a>"));
}

// ── Edges ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_clear_then_plain_text_leaves_no_edges() {
    let (db, cid) = test_db().await;
    let mut conn = db.pool().acquire().await.unwrap();
    let source = session(7);

    let first = process(&mut conn, "#npc[A] #item[B] #quest[C]", cid, source)
        .await
        .unwrap();
    record(&mut conn, &first.mentions).await.unwrap();
    record(&mut conn, &first.mentions).await.unwrap();
    assert_eq!(mentions_referenced_by(&mut conn, source).await.unwrap().len(), 3);

    clear(&mut conn, source).await.unwrap();
    let second = process(&mut conn, "nothing to see", cid, source).await.unwrap();
    record(&mut conn, &second.mentions).await.unwrap();

    assert!(mentions_referenced_by(&mut conn, source).await.unwrap().is_empty());
    assert_eq!(
        count(&mut conn, "SELECT COUNT(*) FROM entity_mentions").await,
        0
    );
}

#[tokio::test]
async fn test_edit_removing_marker_drops_edge() {
    let (db, cid) = test_db().await;
    let mut conn = db.pool().acquire().await.unwrap();
    let quest = insert_named(&mut conn, "quests", cid, "Rescue").await;
    let source = EntityRef::new(EntityKind::Quest, quest);

    let mut hook = Some("#npc[Bob] hires the party".to_string());
    reindex_fields(&mut conn, cid, source, &mut [&mut hook])
        .await
        .unwrap();
    let linked = mentions_referenced_by(&mut conn, source).await.unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].label, "Bob");

    let bob = EntityRef::new(EntityKind::Npc, linked[0].id);
    let back = mentions_referencing(&mut conn, bob).await.unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].label, "Quest: Rescue");
    assert_eq!(back[0].url, format!("/quests/{quest}"));

    let mut hook = Some("Someone hires the party".to_string());
    reindex_fields(&mut conn, cid, source, &mut [&mut hook])
        .await
        .unwrap();
    assert!(mentions_referenced_by(&mut conn, source).await.unwrap().is_empty());
    assert!(mentions_referencing(&mut conn, bob).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleted_target_is_skipped() {
    let (db, cid) = test_db().await;
    let mut conn = db.pool().acquire().await.unwrap();
    let source = session(1);

    let mut summary = Some("#npc[Keeper] guards #loc[Gate]".to_string());
    reindex_fields(&mut conn, cid, source, &mut [&mut summary])
        .await
        .unwrap();

    sqlx::query("DELETE FROM npcs WHERE name = 'Keeper'")
        .execute(&mut *conn)
        .await
        .unwrap();

    let linked = mentions_referenced_by(&mut conn, source).await.unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].kind, EntityKind::Location);
    assert_eq!(linked[0].label, "Gate");
    assert_eq!(linked[0].type_label, "Location");
}

#[tokio::test]
async fn test_campaigns_do_not_share_entities() {
    let (db, cid) = test_db().await;
    let other = db
        .create_campaign(&CampaignInput::named("Baldur's Gate"))
        .await
        .unwrap();
    let mut conn = db.pool().acquire().await.unwrap();
    insert_named(&mut conn, "items", other.id, "Orb").await;

    let out = shortcode::process(&mut conn, "#item[Orb]", cid, session(1))
        .await
        .unwrap();
    let stubs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE campaign_id = ?")
        .bind(cid)
        .fetch_one(&mut *conn)
        .await
        .unwrap();
    assert_eq!(stubs, 1);
    assert_eq!(out.mentions.len(), 1);
}
