//! One streaming request, from content reference to byte stream.
//!
//! ```text
//! ResolvingReference -> VerifyingIdentity -> Planning -> Streaming -> Done
//!          \                   \                 \            \
//!           +-------------------+-----------------+------------+--> Aborted
//! ```
//!
//! Everything up to `Streaming` happens before any header is sent, so every
//! failure there becomes a clean error response. Once the body stream is
//! handed to the HTTP layer a failure can only end the stream early.

use bytes::Bytes;
use futures::Stream;
use reelstream_common::mime::{extension_for, guess_content_type, OCTET_STREAM};
use reelstream_common::{
    ConnectionId, ContentReference, Error, FileLocation, FileProperties, MediaType, Result,
};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use super::identity::{verify_identity, Verification};
use super::planner::{ChunkPlan, DEFAULT_CHUNK_SIZE_CAP};
use super::pool::{ConnectionLease, ConnectionPool};
use super::range::{resolve_range, ResponseRange};
use crate::catalog::Catalog;
use crate::config::StreamConfig;
use crate::upstream::{with_timeout, ChunkSource};

/// Body of a streaming response.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Per-process streaming settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub chunk_size_cap: u64,
    pub upstream_timeout: Duration,
    pub require_identity_hash: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            chunk_size_cap: DEFAULT_CHUNK_SIZE_CAP,
            upstream_timeout: Duration::from_secs(30),
            require_identity_hash: false,
        }
    }
}

impl From<&StreamConfig> for StreamSettings {
    fn from(config: &StreamConfig) -> Self {
        Self {
            chunk_size_cap: config.chunk_size_cap,
            upstream_timeout: config.upstream_timeout(),
            require_identity_hash: config.require_identity_hash,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    ResolvingReference,
    VerifyingIdentity,
    Planning,
    Streaming,
    Done,
    Aborted,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResolvingReference => "resolving_reference",
            Self::VerifyingIdentity => "verifying_identity",
            Self::Planning => "planning",
            Self::Streaming => "streaming",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a content reference points upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    pub location: FileLocation,
    /// Stored short identity hash, if the record has one.
    pub identity_hash: Option<String>,
    /// File name recorded in the catalog, used when upstream has none.
    pub file_name: Option<String>,
}

/// Locate the upstream file for a reference.
///
/// Bundles are looked up by hash, then by legacy file id. Shows need both a
/// season and an episode.
pub async fn resolve_target(
    catalog: &dyn Catalog,
    reference: &ContentReference,
) -> Result<StreamTarget> {
    match reference.media_type {
        MediaType::Bundle => {
            let bundle = catalog
                .resolve_bundle(&reference.content_id)
                .await?
                .ok_or_else(|| Error::not_found(format!("bundle {}", reference.content_id)))?;
            Ok(StreamTarget {
                location: bundle.location(),
                identity_hash: bundle.file_hash,
                file_name: bundle.file_name,
            })
        }
        media_type @ (MediaType::Movie | MediaType::Show) => {
            if media_type == MediaType::Show
                && (reference.season_number.is_none() || reference.episode_number.is_none())
            {
                return Err(Error::not_found(format!(
                    "show {} without season and episode",
                    reference.content_id
                )));
            }

            let file = catalog
                .resolve_catalog_file(
                    &reference.content_id,
                    media_type,
                    reference.quality_index,
                    reference.season_number,
                    reference.episode_number,
                )
                .await?
                .ok_or_else(|| {
                    Error::not_found(format!(
                        "{} {} quality {}",
                        media_type, reference.content_id, reference.quality_index
                    ))
                })?;
            Ok(StreamTarget {
                location: file.location(),
                identity_hash: file.file_hash,
                file_name: file.file_name,
            })
        }
    }
}

/// A response ready to send: headers are fixed, the body is lazy.
pub struct PreparedStream {
    pub range: ResponseRange,
    pub total_size: u64,
    pub content_type: String,
    pub file_name: String,
    pub verification: Verification,
    pub connection: ConnectionId,
    pub body: ByteStream,
}

impl fmt::Debug for PreparedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStream")
            .field("range", &self.range)
            .field("total_size", &self.total_size)
            .field("content_type", &self.content_type)
            .field("file_name", &self.file_name)
            .field("verification", &self.verification)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

pub struct StreamSession<'a> {
    pool: &'a Arc<ConnectionPool>,
    catalog: &'a dyn Catalog,
    settings: &'a StreamSettings,
    reference: ContentReference,
    state: SessionState,
}

impl<'a> StreamSession<'a> {
    pub fn new(
        pool: &'a Arc<ConnectionPool>,
        catalog: &'a dyn Catalog,
        settings: &'a StreamSettings,
        reference: ContentReference,
    ) -> Self {
        Self {
            pool,
            catalog,
            settings,
            reference,
            state: SessionState::ResolvingReference,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session up to the point where the body can be streamed.
    pub async fn prepare(mut self, range_header: Option<&str>) -> Result<PreparedStream> {
        let result = self.drive(range_header).await;
        if let Err(e) = &result {
            tracing::debug!(
                content_id = %self.reference.content_id,
                error = %e,
                "Stream session failed before streaming"
            );
            self.transition(SessionState::Aborted);
        }
        result
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(
            content_id = %self.reference.content_id,
            from = %self.state,
            to = %next,
            "Stream session transition"
        );
        self.state = next;
    }

    async fn drive(&mut self, range_header: Option<&str>) -> Result<PreparedStream> {
        let target = resolve_target(self.catalog, &self.reference).await?;

        let lease = self.pool.select()?;
        let handle = lease.handle()?;

        self.transition(SessionState::VerifyingIdentity);
        let properties = with_timeout(
            self.settings.upstream_timeout,
            "file properties",
            handle.file_properties(target.location),
        )
        .await?;

        let verification = verify_identity(
            target.identity_hash.as_deref(),
            &properties,
            self.settings.require_identity_hash,
        )?;
        if verification == Verification::Unverified {
            tracing::warn!(
                content_id = %self.reference.content_id,
                location = %target.location,
                "Streaming file without identity hash"
            );
        }

        self.transition(SessionState::Planning);
        let range = resolve_range(range_header, properties.file_size)?;
        let plan = range
            .window()
            .map(|window| ChunkPlan::for_window(window, self.settings.chunk_size_cap))
            .transpose()?;

        let content_type = content_type_for(&properties, target.file_name.as_deref());
        let file_name = download_name(&properties, target.file_name.as_deref());
        let connection = lease.id();

        self.transition(SessionState::Streaming);
        let guard = StreamGuard {
            content_id: self.reference.content_id.clone(),
            connection,
            expected: range.content_length(),
            sent: 0,
            finished: false,
        };
        let body = chunk_stream(
            handle,
            lease,
            target.location,
            plan,
            self.settings.upstream_timeout,
            guard,
        );

        Ok(PreparedStream {
            range,
            total_size: properties.file_size,
            content_type,
            file_name,
            verification,
            connection,
            body,
        })
    }
}

/// Logs the terminal state when the body is finished or dropped.
struct StreamGuard {
    content_id: String,
    connection: ConnectionId,
    expected: u64,
    sent: u64,
    finished: bool,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if self.finished {
            tracing::debug!(
                content_id = %self.content_id,
                connection = %self.connection,
                bytes_sent = self.sent,
                state = %SessionState::Done,
                "Stream complete"
            );
        } else {
            tracing::info!(
                content_id = %self.content_id,
                connection = %self.connection,
                bytes_sent = self.sent,
                bytes_expected = self.expected,
                state = %SessionState::Aborted,
                "Stream ended early"
            );
        }
    }
}

/// Lazily fetch, trim, and yield the planned chunks in order.
///
/// The lease lives as long as the stream, so dropping the body releases the
/// connection's load and stops further fetches.
fn chunk_stream(
    handle: Arc<dyn ChunkSource>,
    lease: ConnectionLease,
    location: FileLocation,
    plan: Option<ChunkPlan>,
    timeout: Duration,
    guard: StreamGuard,
) -> ByteStream {
    Box::pin(async_stream::stream! {
        let _lease = lease;
        let mut guard = guard;
        let chunk_size = plan.map(|p| p.chunk_size).unwrap_or_default();

        for part in plan.iter().flat_map(ChunkPlan::parts) {
            let fetched = with_timeout(
                timeout,
                "chunk fetch",
                handle.fetch_chunk(location, part.offset, chunk_size),
            )
            .await;

            let chunk = match fetched {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!(
                        location = %location,
                        offset = part.offset,
                        error = %e,
                        "Chunk fetch failed mid-stream"
                    );
                    yield Err(e);
                    return;
                }
            };

            if chunk.len() < part.keep.end {
                tracing::warn!(
                    location = %location,
                    offset = part.offset,
                    got = chunk.len(),
                    needed = part.keep.end,
                    "Upstream returned a short chunk"
                );
                yield Err(Error::upstream(format!(
                    "short chunk at offset {} of {}",
                    part.offset, location
                )));
                return;
            }

            let piece = chunk.slice(part.keep.clone());
            guard.sent += piece.len() as u64;
            yield Ok(piece);
        }

        guard.finished = true;
    })
}

/// Explicit MIME type, else a guess from the file name, else octet-stream.
fn content_type_for(properties: &FileProperties, fallback_name: Option<&str>) -> String {
    if let Some(mime) = properties.mime_type.as_deref().filter(|m| !m.is_empty()) {
        return mime.to_string();
    }
    properties
        .file_name
        .as_deref()
        .or(fallback_name)
        .and_then(guess_content_type)
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

/// Name for `Content-Disposition`.
///
/// Uses the known file name, or a short random token plus an extension
/// derived from the MIME type.
fn download_name(properties: &FileProperties, fallback_name: Option<&str>) -> String {
    let known = properties
        .file_name
        .as_deref()
        .or(fallback_name)
        .map(sanitize_file_name)
        .filter(|name| !name.is_empty());
    if let Some(name) = known {
        return name;
    }

    let token = hex::encode(rand::random::<[u8; 2]>());
    let extension = properties
        .mime_type
        .as_deref()
        .map(extension_for)
        .unwrap_or("unknown");
    format!("{}.{}", token, extension)
}

/// Strip characters that cannot appear in a quoted header parameter.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect::<String>()
        .trim()
        .to_string()
}
