//! Core domain types shared by the gateway and the catalog store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::{ChatId, MessageId};

/// Kind of content a stream request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// A catalog movie, addressed by content id and quality index.
    Movie,
    /// A catalog show episode, addressed by content id, season, episode, and quality.
    Show,
    /// A bundle file (season pack), addressed by its own file identity.
    Bundle,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Show => "show",
            Self::Bundle => "bundle",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" => Ok(Self::Movie),
            "show" | "tv" => Ok(Self::Show),
            "bundle" => Ok(Self::Bundle),
            other => Err(format!("Unknown media type: {other}")),
        }
    }
}

/// A resolved, authorized reference to one playable file.
///
/// Produced once per request by the token authority; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentReference {
    /// Catalog content id, or the bundle hash / file id for bundles.
    pub content_id: String,
    /// File reference the token explicitly authorizes, if any.
    pub file_reference_id: Option<String>,
    pub media_type: MediaType,
    pub quality_index: u32,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
}

impl ContentReference {
    /// Reference to a bundle addressed by short hash or long file id.
    pub fn bundle(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            content_id: key.clone(),
            file_reference_id: Some(key),
            media_type: MediaType::Bundle,
            quality_index: 0,
            season_number: None,
            episode_number: None,
        }
    }

    pub fn is_bundle(&self) -> bool {
        self.media_type == MediaType::Bundle
    }
}

/// Upstream address of a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileLocation {
    pub chat_id: ChatId,
    pub msg_id: MessageId,
}

impl FileLocation {
    pub fn new(chat_id: impl Into<ChatId>, msg_id: impl Into<MessageId>) -> Self {
        Self {
            chat_id: chat_id.into(),
            msg_id: msg_id.into(),
        }
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.msg_id)
    }
}

/// Metadata of an upstream file, fetched per request and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileProperties {
    /// Stable unique identifier assigned by the upstream store.
    pub unique_id: String,
    /// Total size in bytes.
    pub file_size: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}
