//! Seeding the catalog store from a JSON document.
//!
//! ```json
//! {
//!   "bundles": [{ "file_id": "...", "title": "...", "chat_id": -100, "msg_id": 7 }],
//!   "catalog_files": [{ "content_id": "tt01", "media_type": "movie",
//!                       "quality_index": 0, "chat_id": -100, "msg_id": 8 }]
//! }
//! ```

use reelstream_common::{Error, Result};
use reelstream_db::models::{NewBundle, NewCatalogFile, UpsertOutcome};
use reelstream_db::pool::{get_conn, DbPool};
use reelstream_db::queries::{bundles, catalog_files};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::streaming::short_identity;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ImportDocument {
    #[serde(default)]
    pub bundles: Vec<NewBundle>,
    #[serde(default)]
    pub catalog_files: Vec<NewCatalogFile>,
}

impl ImportDocument {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::invalid_input(format!("bad import document {:?}: {}", path, e)))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub updated: usize,
}

impl ImportReport {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }
}

/// Upsert every record of `document` in one transaction.
///
/// A bundle given with a unique id but no hash gets its hash derived from
/// the unique id.
pub fn import_document(db: &DbPool, document: &ImportDocument) -> Result<ImportReport> {
    let mut conn = get_conn(db)?;
    let tx = conn
        .transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let mut report = ImportReport::default();
    for bundle in &document.bundles {
        let mut bundle = bundle.clone();
        if bundle.file_hash.as_deref().map_or(true, str::is_empty) {
            bundle.file_hash = bundle
                .file_unique_id
                .as_deref()
                .filter(|u| !u.is_empty())
                .map(|u| short_identity(u).to_string());
        }
        report.record(bundles::upsert_bundle(&tx, &bundle)?);
    }
    for file in &document.catalog_files {
        report.record(catalog_files::upsert_catalog_file(&tx, file)?);
    }

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(report)
}
