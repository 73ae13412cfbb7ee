use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelstream")]
#[command(author, version, about = "Range-addressable streaming gateway for chunked upstream storage")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming gateway
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Sign a stream token with the configured secret
    IssueToken {
        /// Content id (movie, show or bundle key) the token is for
        id: String,

        /// Bundle hash or file id this token may also open
        #[arg(long)]
        file_id: Option<String>,

        /// movie, show or bundle
        #[arg(long, default_value = "movie")]
        media_type: String,

        /// Quality option to stream
        #[arg(long)]
        quality_index: Option<u32>,

        #[arg(long)]
        season: Option<u32>,

        #[arg(long)]
        episode: Option<u32>,

        /// Token lifetime in seconds
        #[arg(long, default_value = "86400")]
        ttl_secs: u64,
    },

    /// Fill in content hashes for bundles stored without one
    BackfillHashes,

    /// Seed bundles and catalog files from a JSON document
    Import {
        /// JSON file with `bundles` and `catalog_files` arrays
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Generate a random secret for signing stream tokens
    GenerateSecret,

    /// Display version information
    Version,
}
