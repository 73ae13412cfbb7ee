//! Chunk planning.
//!
//! Maps a byte window onto fixed-size upstream chunks. Pure arithmetic, no I/O.

use std::ops::Range;

use reelstream_common::{Error, Result};

use super::range::RangeWindow;

/// Default upper bound on the chunk size (1 MiB).
pub const DEFAULT_CHUNK_SIZE_CAP: u64 = 1024 * 1024;

/// Chunk size for a file: a tenth of the file, capped at `cap`, never zero.
///
/// Small files get at least ~10 chunks so seeks stay cheap.
pub fn chunk_size_for(total_size: u64, cap: u64) -> u64 {
    (total_size / 10).min(cap).max(1)
}

/// How to serve one window from fixed-size chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Offset of the first chunk; a multiple of `chunk_size`, `<= from`.
    pub aligned_offset: u64,
    /// Bytes to drop from the front of the first chunk.
    pub first_chunk_trim: u64,
    /// Bytes to keep from the front of the last chunk.
    pub last_chunk_trim: u64,
    pub chunk_count: u64,
    /// Exact body length (`until - from + 1`).
    pub requested_length: u64,
    pub chunk_size: u64,
}

impl ChunkPlan {
    /// Plan a validated window with an explicit chunk size.
    pub fn new(window: RangeWindow, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::configuration("chunk size must be greater than 0"));
        }

        let RangeWindow { from, until, .. } = window;
        let aligned_offset = from - from % chunk_size;

        Ok(Self {
            aligned_offset,
            first_chunk_trim: from - aligned_offset,
            last_chunk_trim: until % chunk_size + 1,
            chunk_count: until / chunk_size - aligned_offset / chunk_size + 1,
            requested_length: until - from + 1,
            chunk_size,
        })
    }

    /// Plan a window using the size-scaled chunk size.
    pub fn for_window(window: RangeWindow, chunk_size_cap: u64) -> Result<Self> {
        Self::new(window, chunk_size_for(window.total_size, chunk_size_cap))
    }

    /// Validate raw bounds and plan them.
    pub fn plan(from: u64, until: u64, total_size: u64, chunk_size: u64) -> Result<Self> {
        Self::new(RangeWindow::new(from, until, total_size)?, chunk_size)
    }

    /// The chunks to fetch, in ascending offset order.
    pub fn parts(&self) -> ChunkParts {
        ChunkParts {
            plan: *self,
            next: 0,
        }
    }
}

/// One chunk fetch and the slice of it that belongs in the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPart {
    pub index: u64,
    pub offset: u64,
    /// Byte range to keep, relative to the chunk start.
    pub keep: Range<usize>,
}

impl ChunkPart {
    pub fn len(&self) -> usize {
        self.keep.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keep.is_empty()
    }
}

/// Iterator over the chunks of a [`ChunkPlan`].
#[derive(Debug, Clone)]
pub struct ChunkParts {
    plan: ChunkPlan,
    next: u64,
}

impl Iterator for ChunkParts {
    type Item = ChunkPart;

    fn next(&mut self) -> Option<ChunkPart> {
        let plan = &self.plan;
        if self.next >= plan.chunk_count {
            return None;
        }

        let index = self.next;
        self.next += 1;

        let start = if index == 0 { plan.first_chunk_trim } else { 0 };
        let end = if index + 1 == plan.chunk_count {
            plan.last_chunk_trim
        } else {
            plan.chunk_size
        };

        Some(ChunkPart {
            index,
            offset: plan.aligned_offset + index * plan.chunk_size,
            keep: start as usize..end as usize,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.plan.chunk_count.saturating_sub(self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ChunkParts {}
