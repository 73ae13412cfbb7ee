//! Reelstream-Common: Shared types, identifiers, and errors.
//!
//! This crate provides common functionality used across reelstream:
//!
//! - **Typed IDs**: wrappers for upstream chat/message ids and connection ids
//! - **Core Types**: media types, content references, file locations and properties
//! - **MIME Utilities**: content-type guessing from file names
//! - **Error Handling**: the gateway error taxonomy and result alias
//!
//! # Examples
//!
//! ```
//! use reelstream_common::{ContentReference, Error, FileLocation, MediaType, Result};
//!
//! let location = FileLocation::new(-100i64, 42i64);
//! assert_eq!(location.to_string(), "-100/42");
//!
//! let reference = ContentReference::bundle("abc123");
//! assert_eq!(reference.media_type, MediaType::Bundle);
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("bundle"))
//! }
//! assert_eq!(example().unwrap_err().http_status(), 404);
//! ```

pub mod error;
pub mod ids;
pub mod mime;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
