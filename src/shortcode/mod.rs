// Shortcode processing for inline entity linking.
//
// Syntax: `#type[Name]`, e.g. `#loc[Loracos]`, `#npc[Marv]`,
// `#item[Sword of Destiny]`. On save each marker is looked up by name in the
// campaign, created as a stub when missing (except PCs), rewritten into a
// preview link, and recorded as a mention edge for back-reference panels.

pub mod kinds;
pub mod mentions;
pub mod render;
pub mod resolve;

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use sqlx::SqliteConnection;

pub use kinds::{EntityKind, EntityRef, KindSpec, StubPolicy};
pub use mentions::{
    clear, mentions_referenced_by, mentions_referencing, record, Backlink, LinkedEntity,
    NewMention,
};
pub use render::render_link;
pub use resolve::{resolve, Resolved};

use crate::metrics;

lazy_static! {
    /// Recognized markers. Type codes outside this set never match and pass
    /// through as literal text.
    static ref SHORTCODE_RE: Regex =
        Regex::new(r"#(npc|loc|item|quest|comp|pc|site)\[([^\]]+)\]").unwrap();
}

/// One `#code[name]` occurrence, as byte offsets into the scanned text.
struct Marker<'t> {
    start: usize,
    end: usize,
    raw: &'t str,
    code: &'t str,
    name: &'t str,
}

impl<'t> Marker<'t> {
    fn from_captures(caps: &Captures<'t>) -> Option<Self> {
        let whole = caps.get(0)?;
        Some(Self {
            start: whole.start(),
            end: whole.end(),
            raw: whole.as_str(),
            code: caps.get(1)?.as_str(),
            name: caps.get(2)?.as_str(),
        })
    }
}

/// Result of processing one block of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    pub text: String,
    pub mentions: Vec<NewMention>,
}

/// Rewrites shortcodes for one mention source, accumulating deduplicated
/// edges across every text field handed to it.
pub struct ShortcodeProcessor {
    campaign_id: i64,
    source: EntityRef,
    seen: HashSet<EntityRef>,
    mentions: Vec<NewMention>,
}

impl ShortcodeProcessor {
    pub fn new(campaign_id: i64, source: EntityRef) -> Self {
        Self {
            campaign_id,
            source,
            seen: HashSet::new(),
            mentions: Vec::new(),
        }
    }

    /// Replace every marker in `text` in a single left-to-right pass.
    ///
    /// Markers are resolved one at a time as the scan reaches them, so a stub
    /// created for an early marker is found again by a later one. Markers
    /// that cannot be resolved are copied through unchanged.
    pub async fn process_text(
        &mut self,
        conn: &mut SqliteConnection,
        text: &str,
    ) -> Result<String, sqlx::Error> {
        // Collected up front so no regex iterator state lives across an await.
        let markers: Vec<Marker<'_>> = SHORTCODE_RE
            .captures_iter(text)
            .filter_map(|caps| Marker::from_captures(&caps))
            .collect();

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for marker in markers {
            out.push_str(&text[last..marker.start]);
            last = marker.end;

            match self.replace_marker(conn, &marker).await? {
                Some(link) => out.push_str(&link),
                None => out.push_str(marker.raw),
            }
        }

        out.push_str(&text[last..]);
        Ok(out)
    }

    async fn replace_marker(
        &mut self,
        conn: &mut SqliteConnection,
        marker: &Marker<'_>,
    ) -> Result<Option<String>, sqlx::Error> {
        let Some(kind) = EntityKind::from_shortcode(marker.code) else {
            return Ok(None);
        };
        let name = marker.name.trim();
        if name.is_empty() {
            metrics::SHORTCODE_SOFT_MISSES_TOTAL
                .with_label_values(&[kind.code()])
                .inc();
            return Ok(None);
        }

        let Some(entity) = resolve(conn, kind, name, self.campaign_id).await? else {
            tracing::debug!(kind = %kind, name, campaign_id = self.campaign_id, "shortcode target not found");
            metrics::SHORTCODE_SOFT_MISSES_TOTAL
                .with_label_values(&[kind.code()])
                .inc();
            return Ok(None);
        };
        metrics::SHORTCODES_RESOLVED_TOTAL
            .with_label_values(&[kind.code()])
            .inc();

        let link = match render_link(&entity) {
            Ok(link) => link,
            Err(err) => {
                tracing::warn!(kind = %kind, id = entity.id, error = %err, "failed to render shortcode link");
                return Ok(None);
            }
        };

        let target = EntityRef::new(entity.kind, entity.id);
        if self.seen.insert(target) {
            self.mentions.push(NewMention {
                campaign_id: self.campaign_id,
                source: self.source,
                target,
            });
        }

        Ok(Some(link))
    }

    /// Edges implied by everything processed so far, one per target.
    pub fn finish(self) -> Vec<NewMention> {
        self.mentions
    }
}

/// Rewrite the markers in `text` and return the edges it implies.
///
/// Prior edges of `source` are left alone and the returned edges are not
/// stored; editors call [`clear`] first and [`record`] afterwards.
pub async fn process(
    conn: &mut SqliteConnection,
    text: &str,
    campaign_id: i64,
    source: EntityRef,
) -> Result<Processed, sqlx::Error> {
    if text.is_empty() {
        return Ok(Processed {
            text: String::new(),
            mentions: Vec::new(),
        });
    }
    let mut processor = ShortcodeProcessor::new(campaign_id, source);
    let text = processor.process_text(conn, text).await?;
    Ok(Processed {
        text,
        mentions: processor.finish(),
    })
}

/// Clear the edges of `source`, rewrite every non-empty field in place and
/// store the new edge set. Returns how many edges were stored.
///
/// Run inside the editor's transaction so stubs, edges and the edited row
/// commit together.
pub async fn reindex_fields(
    conn: &mut SqliteConnection,
    campaign_id: i64,
    source: EntityRef,
    fields: &mut [&mut Option<String>],
) -> Result<usize, sqlx::Error> {
    clear(conn, source).await?;

    let mut processor = ShortcodeProcessor::new(campaign_id, source);
    for field in fields.iter_mut() {
        if let Some(text) = field.as_deref().filter(|t| !t.is_empty()) {
            let rewritten = processor.process_text(conn, text).await?;
            **field = Some(rewritten);
        }
    }

    let mentions = processor.finish();
    record(conn, &mentions).await?;
    Ok(mentions.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CampaignInput, Database};

    async fn setup() -> (Database, i64) {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let campaign = db
            .create_campaign(&CampaignInput::named("Shattered Coast"))
            .await
            .unwrap();
        (db, campaign.id)
    }

    fn source() -> EntityRef {
        EntityRef::new(EntityKind::Session, 1)
    }

    #[test]
    fn test_pattern_covers_every_mentionable_kind() {
        for kind in EntityKind::ALL {
            let marker = format!("#{}[X]", kind.code());
            assert_eq!(
                SHORTCODE_RE.is_match(&marker),
                kind.is_mentionable(),
                "{marker}"
            );
        }
    }

    #[tokio::test]
    async fn test_plain_text_passes_through() {
        let (db, cid) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let text = "No markers here, just #hashtags and [brackets].";
        let out = process(&mut conn, text, cid, source()).await.unwrap();
        assert_eq!(out.text, text);
        assert!(out.mentions.is_empty());

        let empty = process(&mut conn, "", cid, source()).await.unwrap();
        assert_eq!(empty.text, "");
        assert!(empty.mentions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_code_is_left_alone() {
        let (db, cid) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let out = process(&mut conn, "Beware #dragon[Smaug]!", cid, source())
            .await
            .unwrap();
        assert_eq!(out.text, "Beware #dragon[Smaug]!");
        assert!(out.mentions.is_empty());
    }

    #[tokio::test]
    async fn test_name_is_trimmed_before_lookup() {
        let (db, cid) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let out = process(&mut conn, "#item[  Sword of Destiny ]", cid, source())
            .await
            .unwrap();
        assert_eq!(out.mentions.len(), 1);
        assert!(out.text.contains(">Sword of Destiny</a>"));
    }

    #[tokio::test]
    async fn test_blank_name_is_a_soft_miss() {
        let (db, cid) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let out = process(&mut conn, "#npc[   ]", cid, source()).await.unwrap();
        assert_eq!(out.text, "#npc[   ]");
        assert!(out.mentions.is_empty());
    }

    #[tokio::test]
    async fn test_mixed_markers_in_one_pass() {
        let (db, cid) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let text = "#npc[Marv] met #pc[Ghost] at #loc[Loracos] for #quest[The Heist].";
        let out = process(&mut conn, text, cid, source()).await.unwrap();

        assert!(out.text.starts_with("<a href=\"/npcs/"));
        assert!(out.text.contains("#pc[Ghost]"));
        assert!(out.text.contains("data-preview-type=\"loc\""));
        assert!(out.text.contains(">The Heist</a>."));

        let kinds: Vec<EntityKind> = out.mentions.iter().map(|m| m.target.kind).collect();
        assert_eq!(
            kinds,
            vec![EntityKind::Npc, EntityKind::Location, EntityKind::Quest]
        );
    }

    #[tokio::test]
    async fn test_processor_dedupes_across_fields() {
        let (db, cid) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let mut processor = ShortcodeProcessor::new(cid, source());
        processor
            .process_text(&mut conn, "#comp[Calendar]")
            .await
            .unwrap();
        processor
            .process_text(&mut conn, "see #comp[calendar] again")
            .await
            .unwrap();
        assert_eq!(processor.finish().len(), 1);
    }

    #[tokio::test]
    async fn test_reindex_fields_rewrites_in_place() {
        let (db, cid) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let mut summary = Some("The party reached #site[Sunken Vault].".to_string());
        let mut notes = None;
        let mut empty = Some(String::new());
        let stored = reindex_fields(
            &mut conn,
            cid,
            source(),
            &mut [&mut summary, &mut notes, &mut empty],
        )
        .await
        .unwrap();

        assert_eq!(stored, 1);
        assert!(summary.unwrap().contains("class=\"shortcode-link\""));
        assert!(notes.is_none());
        assert_eq!(empty.as_deref(), Some(""));

        let linked = mentions_referenced_by(&mut conn, source()).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].label, "Sunken Vault");
    }
}
