// Find-or-create resolution of a shortcode's target entity.

use sqlx::SqliteConnection;

use super::kinds::{self, EntityKind};
use crate::metrics;

/// The entity a marker points at after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub kind: EntityKind,
    pub id: i64,
    /// Name as stored, which may differ in casing from the marker text.
    pub display_name: String,
    /// True when the row was created by this resolution.
    pub created: bool,
}

/// Look `name` up within the campaign; if absent, create a stub unless the
/// kind is lookup-only. The stub is written on `conn`, so it is committed or
/// rolled back together with whatever transaction the caller holds.
pub async fn resolve(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    name: &str,
    campaign_id: i64,
) -> Result<Option<Resolved>, sqlx::Error> {
    if let Some((id, display_name)) = kinds::lookup_by_name(conn, kind, name, campaign_id).await? {
        return Ok(Some(Resolved {
            kind,
            id,
            display_name,
            created: false,
        }));
    }

    match kinds::create_stub(conn, kind, name, campaign_id).await? {
        Some(id) => {
            tracing::debug!(kind = %kind, id, name, campaign_id, "created stub entity");
            metrics::STUB_ENTITIES_CREATED_TOTAL
                .with_label_values(&[kind.code()])
                .inc();
            Ok(Some(Resolved {
                kind,
                id,
                display_name: name.to_string(),
                created: true,
            }))
        }
        None => Ok(None),
    }
}
