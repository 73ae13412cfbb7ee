//! HTTP `Range` header parsing.
//!
//! Turns the optional request header into the byte window to serve. Anything
//! that cannot be served exactly (multi-range, malformed, past EOF) is
//! `RangeNotSatisfiable`; the caller answers 416 with `bytes */{total}`.

use reelstream_common::{Error, Result};

/// Inclusive byte window inside a file: `from <= until <= total_size - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeWindow {
    pub from: u64,
    pub until: u64,
    pub total_size: u64,
}

impl RangeWindow {
    /// Validate a window against the file size.
    pub fn new(from: u64, until: u64, total_size: u64) -> Result<Self> {
        if total_size == 0 || until < from || until > total_size - 1 {
            return Err(Error::RangeNotSatisfiable { total_size });
        }
        Ok(Self {
            from,
            until,
            total_size,
        })
    }

    /// The whole file, or `None` for an empty file.
    pub fn full(total_size: u64) -> Option<Self> {
        (total_size > 0).then(|| Self {
            from: 0,
            until: total_size - 1,
            total_size,
        })
    }

    /// Number of bytes in the window.
    pub fn len(&self) -> u64 {
        self.until - self.from + 1
    }

    /// A window always holds at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` value for this window.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.from, self.until, self.total_size)
    }
}

/// What the response will carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseRange {
    /// No `Range` header: 200 with the whole file (`None` when the file is empty).
    Full(Option<RangeWindow>),
    /// 206 with the requested window.
    Partial(RangeWindow),
}

impl ResponseRange {
    pub fn window(&self) -> Option<RangeWindow> {
        match self {
            Self::Full(window) => *window,
            Self::Partial(window) => Some(*window),
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial(_))
    }

    /// Bytes the body will carry; the `Content-Length` value.
    pub fn content_length(&self) -> u64 {
        self.window().map(|w| w.len()).unwrap_or(0)
    }
}

/// Decide the response window for an optional `Range` header.
///
/// Supported forms:
/// - `bytes=500-999`
/// - `bytes=500-` (to end of file)
/// - `bytes=-500` (last 500 bytes)
pub fn resolve_range(header: Option<&str>, total_size: u64) -> Result<ResponseRange> {
    match header {
        None => Ok(ResponseRange::Full(RangeWindow::full(total_size))),
        Some(value) => parse_range_header(value, total_size).map(ResponseRange::Partial),
    }
}

/// Parse a single-range `Range` header against a file size.
pub fn parse_range_header(header: &str, total_size: u64) -> Result<RangeWindow> {
    let unsatisfiable = || Error::RangeNotSatisfiable { total_size };

    let range_set = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(unsatisfiable)?;
    if range_set.contains(',') {
        return Err(unsatisfiable());
    }

    let (start, end) = range_set.split_once('-').ok_or_else(unsatisfiable)?;
    let (start, end) = (start.trim(), end.trim());

    match (start.is_empty(), end.is_empty()) {
        // bytes=-500
        (true, false) => {
            let suffix: u64 = end.parse().map_err(|_| unsatisfiable())?;
            if suffix == 0 {
                return Err(unsatisfiable());
            }
            let from = total_size.saturating_sub(suffix);
            RangeWindow::new(from, total_size.saturating_sub(1), total_size)
        }
        // bytes=500-
        (false, true) => {
            let from: u64 = start.parse().map_err(|_| unsatisfiable())?;
            RangeWindow::new(from, total_size.saturating_sub(1), total_size)
        }
        // bytes=0-499
        (false, false) => {
            let from: u64 = start.parse().map_err(|_| unsatisfiable())?;
            let until: u64 = end.parse().map_err(|_| unsatisfiable())?;
            RangeWindow::new(from, until, total_size)
        }
        (true, true) => Err(unsatisfiable()),
    }
}
