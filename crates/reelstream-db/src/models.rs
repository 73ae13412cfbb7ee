//! Rust models matching the database schema.
//!
//! Optional columns are `Option` fields: a missing hash or season is
//! explicitly absent, never a falsy default.

use chrono::{DateTime, Utc};
use reelstream_common::{ChatId, FileLocation, MediaType, MessageId};
use serde::{Deserialize, Serialize};

/// A bundle (season pack) stored as a single upstream file.
///
/// `file_id` is the natural key. `file_hash` is the 6-character prefix of the
/// upstream unique id, used both as a short link and as a tamper check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleRecord {
    pub file_id: String,
    pub file_unique_id: Option<String>,
    pub file_hash: Option<String>,
    pub title: String,
    pub show_id: Option<i64>,
    pub season: Option<u32>,
    pub episode_range: Option<String>,
    pub chat_id: ChatId,
    pub msg_id: MessageId,
    pub size_bytes: Option<u64>,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BundleRecord {
    pub fn location(&self) -> FileLocation {
        FileLocation::new(self.chat_id, self.msg_id)
    }
}

/// Input for inserting or updating a bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBundle {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: Option<String>,
    #[serde(default)]
    pub file_hash: Option<String>,
    pub title: String,
    #[serde(default)]
    pub show_id: Option<i64>,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub episode_range: Option<String>,
    pub chat_id: ChatId,
    pub msg_id: MessageId,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// One quality option of a catalog movie or show episode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogFile {
    pub id: i64,
    pub content_id: String,
    pub media_type: MediaType,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    pub quality_index: u32,
    pub quality_label: Option<String>,
    pub chat_id: ChatId,
    pub msg_id: MessageId,
    pub file_hash: Option<String>,
    pub size_bytes: Option<u64>,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogFile {
    pub fn location(&self) -> FileLocation {
        FileLocation::new(self.chat_id, self.msg_id)
    }
}

/// Input for inserting or updating a catalog file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCatalogFile {
    pub content_id: String,
    pub media_type: MediaType,
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub episode_number: Option<u32>,
    pub quality_index: u32,
    #[serde(default)]
    pub quality_label: Option<String>,
    pub chat_id: ChatId,
    pub msg_id: MessageId,
    #[serde(default)]
    pub file_hash: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Whether an upsert created a new row or changed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}
