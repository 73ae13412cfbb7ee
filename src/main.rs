mod cli;

use reelstream::{
    backfill, config, import,
    server::{self, auth},
    streaming::ConnectionPool,
    upstream::HttpSourceFactory,
};
use reelstream_common::{ContentReference, MediaType};
use reelstream_db::pool::init_pool;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting reelstream");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelstream=trace,reelstream_db=debug,reelstream_common=debug,tower_http=debug"
                .to_string()
        } else {
            "reelstream=info,reelstream_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::IssueToken {
            id,
            file_id,
            media_type,
            quality_index,
            season,
            episode,
            ttl_secs,
        } => issue_token(
            cli.config.as_deref(),
            TokenRequest {
                id,
                file_id,
                media_type,
                quality_index,
                season,
                episode,
                ttl_secs,
            },
        ),
        Commands::BackfillHashes => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(backfill_hashes(cli.config.as_deref()))
        }
        Commands::Import { file } => import_file(&file, cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::GenerateSecret => {
            println!("{}", auth::generate_secret());
            Ok(())
        }
        Commands::Version => {
            println!("reelstream {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

struct TokenRequest {
    id: String,
    file_id: Option<String>,
    media_type: String,
    quality_index: Option<u32>,
    season: Option<u32>,
    episode: Option<u32>,
    ttl_secs: u64,
}

fn issue_token(config_path: Option<&Path>, request: TokenRequest) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    if config.stream.token_secret.is_empty() {
        anyhow::bail!("stream.token_secret is not set; run `reelstream generate-secret` first");
    }

    let media_type: MediaType = request
        .media_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let reference = if media_type == MediaType::Bundle {
        ContentReference::bundle(request.id.as_str())
    } else {
        ContentReference {
            content_id: request.id.clone(),
            file_reference_id: None,
            media_type,
            quality_index: request.quality_index.unwrap_or(0),
            season_number: request.season,
            episode_number: request.episode,
        }
    };

    let mut claims = auth::StreamClaims::for_reference(&reference, request.ttl_secs);
    if request.file_id.is_some() {
        claims.file_id = request.file_id;
    }

    let authority = auth::TokenAuthority::new(config.stream.token_secret.clone());
    let token = authority.issue(&claims)?;
    println!("{}", token);
    Ok(())
}

async fn backfill_hashes(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    if config.upstream.connections.is_empty() {
        anyhow::bail!("No upstream connections configured; nothing to fetch hashes from");
    }

    let db_path = config.database.resolved_path();
    let db = init_pool(&db_path.to_string_lossy())
        .with_context(|| format!("Failed to open database {:?}", db_path))?;
    let factory = Arc::new(HttpSourceFactory::new(config.upstream.connections.clone()));
    let connections = Arc::new(ConnectionPool::new(factory, config.stream.handle_ttl()));

    let report =
        backfill::backfill_hashes(&db, &connections, config.stream.upstream_timeout()).await?;

    println!("Scanned: {}", report.scanned);
    println!("Updated: {}", report.updated);
    if report.failed > 0 {
        println!("Failed:  {} (see log for details)", report.failed);
    }
    Ok(())
}

fn import_file(file: &Path, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("Import file does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let document = import::ImportDocument::from_file(file)?;

    let db_path = config.database.resolved_path();
    let db = init_pool(&db_path.to_string_lossy())
        .with_context(|| format!("Failed to open database {:?}", db_path))?;

    let report = import::import_document(&db, &document)?;
    println!(
        "Imported {} bundles and {} catalog files ({} new, {} updated)",
        document.bundles.len(),
        document.catalog_files.len(),
        report.inserted,
        report.updated
    );
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Database: {}", config.database.resolved_path().display());
            println!(
                "  Token secret: {}",
                if config.stream.token_secret.is_empty() {
                    "not set"
                } else {
                    "set"
                }
            );
            println!("  Chunk size cap: {} bytes", config.stream.chunk_size_cap);
            println!(
                "  Require identity hash: {}",
                config.stream.require_identity_hash
            );
            println!(
                "  Upstream connections: {}",
                config.upstream.connections.len()
            );
            for conn in &config.upstream.connections {
                println!("    {} -> {}", conn.name, conn.base_url);
            }
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
