//! HTTP chunk source.
//!
//! Talks to a chunk-source bridge that exposes stored files over HTTP:
//!
//! - `GET {base}/files/{chat_id}/{msg_id}` returns file properties as JSON
//! - `GET {base}/files/{chat_id}/{msg_id}/content` returns bytes for a `Range`
//!
//! Each handle owns its own `reqwest::Client` and keep-alive pool.

use bytes::Bytes;
use reelstream_common::{ConnectionId, Error, FileLocation, FileProperties, Result};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use super::{ChunkSource, SourceFactory};
use crate::config::ConnectionConfig;

/// Connect timeout for bridge requests; whole-call bounds are applied by the caller.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle keep-alive connections are closed after this long.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

pub struct HttpChunkSource {
    name: String,
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpChunkSource {
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::configuration(format!(
                    "Failed to build HTTP client for connection '{}': {}",
                    config.name, e
                ))
            })?;

        Ok(Self {
            name: config.name.clone(),
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn url(&self, location: FileLocation, suffix: &str) -> String {
        format!(
            "{}/files/{}/{}{}",
            self.base_url, location.chat_id, location.msg_id, suffix
        )
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        location: FileLocation,
    ) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            Error::upstream(format!("{}: request for {} failed: {}", self.name, location, e))
        })?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(Error::not_found(format!("file {}", location))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::upstream(format!(
                    "{}: {} for {}: {}",
                    self.name, status, location, body
                )))
            }
        }
    }
}

#[async_trait::async_trait]
impl ChunkSource for HttpChunkSource {
    async fn file_properties(&self, location: FileLocation) -> Result<FileProperties> {
        let request = self.get(self.url(location, ""));
        let response = self.send(request, location).await?;

        response.json::<FileProperties>().await.map_err(|e| {
            Error::upstream(format!(
                "{}: invalid file properties for {}: {}",
                self.name, location, e
            ))
        })
    }

    async fn fetch_chunk(&self, location: FileLocation, offset: u64, size: u64) -> Result<Bytes> {
        if size == 0 {
            return Ok(Bytes::new());
        }

        let range = format!("bytes={}-{}", offset, offset + size - 1);
        let request = self
            .get(self.url(location, "/content"))
            .header(reqwest::header::RANGE, range);
        let response = self.send(request, location).await?;

        // A bridge that ignores Range answers 200 with the file from byte 0
        let status = response.status();
        let start = match status {
            StatusCode::PARTIAL_CONTENT => content_range_start(response.headers()),
            StatusCode::OK => Some(0),
            _ => None,
        };
        if start != Some(offset) {
            return Err(Error::upstream(format!(
                "{}: chunk at {} of {} answered with {} starting at {:?}",
                self.name, offset, location, status, start
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            Error::upstream(format!(
                "{}: chunk at {} of {} interrupted: {}",
                self.name, offset, location, e
            ))
        })?;

        let size = usize::try_from(size).unwrap_or(usize::MAX);
        match status {
            StatusCode::OK => Ok(body.slice(..body.len().min(size))),
            _ if body.len() > size => Err(Error::upstream(format!(
                "{}: chunk at {} of {} is {} bytes, asked for {}",
                self.name,
                offset,
                location,
                body.len(),
                size
            ))),
            _ => Ok(body),
        }
    }
}

/// First byte of a `Content-Range: bytes a-b/total` header.
fn content_range_start(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::CONTENT_RANGE)?
        .to_str()
        .ok()?
        .trim()
        .strip_prefix("bytes ")?
        .split_once('-')?
        .0
        .trim()
        .parse()
        .ok()
}

/// Builds one [`HttpChunkSource`] per configured connection.
///
/// Identities are assigned in configuration order starting at 0.
pub struct HttpSourceFactory {
    connections: Vec<ConnectionConfig>,
}

impl HttpSourceFactory {
    pub fn new(connections: Vec<ConnectionConfig>) -> Self {
        Self { connections }
    }

    fn config(&self, id: ConnectionId) -> Option<&ConnectionConfig> {
        self.connections.get(id.get() as usize)
    }
}

impl SourceFactory for HttpSourceFactory {
    fn identities(&self) -> Vec<ConnectionId> {
        (0..self.connections.len() as u32)
            .map(ConnectionId::new)
            .collect()
    }

    fn build(&self, id: ConnectionId) -> Result<Arc<dyn ChunkSource>> {
        let config = self
            .config(id)
            .ok_or_else(|| Error::configuration(format!("no upstream connection {}", id)))?;
        tracing::debug!(connection = %config.name, "Building upstream HTTP client");
        let source: Arc<dyn ChunkSource> = Arc::new(HttpChunkSource::new(config)?);
        Ok(source)
    }

    fn name(&self, id: ConnectionId) -> String {
        self.config(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}
