//! Range-addressable streaming over chunked upstream storage.
//!
//! - [`range`]: `Range` header parsing and response windows
//! - [`planner`]: mapping a window onto fixed-size chunks
//! - [`pool`]: least-loaded connection selection and handle caching
//! - [`identity`]: short identity hash check against upstream file ids
//! - [`session`]: per-request orchestration producing a lazy body stream

pub mod identity;
pub mod planner;
pub mod pool;
pub mod range;
pub mod session;

pub use identity::{short_identity, verify_identity, Verification, IDENTITY_HASH_LEN};
pub use planner::{chunk_size_for, ChunkPart, ChunkPlan, DEFAULT_CHUNK_SIZE_CAP};
pub use pool::{start_sweep_task, ConnectionLease, ConnectionPool};
pub use range::{parse_range_header, resolve_range, RangeWindow, ResponseRange};
pub use session::{
    resolve_target, ByteStream, PreparedStream, SessionState, StreamSession, StreamSettings,
    StreamTarget,
};
