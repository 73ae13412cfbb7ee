//! Reelstream - range-addressable streaming gateway for chunked upstream storage
//!
//! The library crate exposes the gateway for the binary and for integration
//! tests.

pub mod backfill;
pub mod catalog;
pub mod config;
pub mod import;
pub mod server;
pub mod streaming;
pub mod upstream;
