//! Row mapping for the `sites` table.

use chantier_core::{CoreError, Site};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `sites` table. The id and version live in columns; the
/// rest of the site is the JSONB document.
#[derive(Debug, Clone, FromRow)]
pub struct SiteRow {
    pub id: String,
    pub version: i64,
    pub document: Json<Value>,
}

impl SiteRow {
    /// Decode the document and overlay the column-managed fields.
    pub fn into_site(self) -> Result<Site, CoreError> {
        let mut site: Site = serde_json::from_value(self.document.0).map_err(|e| {
            CoreError::Internal(format!("Malformed site document {}: {e}", self.id))
        })?;
        site.id = self.id;
        site.version = self.version;
        Ok(site)
    }
}

/// Encode a site as its stored document, without the column-managed
/// `id` and `version` fields.
pub fn to_document(site: &Site) -> Result<Value, CoreError> {
    let mut doc = serde_json::to_value(site)
        .map_err(|e| CoreError::Internal(format!("Failed to encode site: {e}")))?;
    if let Value::Object(fields) = &mut doc {
        fields.remove("id");
        fields.remove("version");
    }
    Ok(doc)
}
