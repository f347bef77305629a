mod cli;

use mediashift::{
    config,
    conversion::{ConversionOptions, ConversionRequest, MediaConversionManager},
    repository::SqliteRepository,
    security::RoleAuthorizer,
};
use mediashift_common::{ConversionDirection, ItemId, MediaReference, Principal};
use mediashift_db::pool::init_pool;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// How often a running conversion reports progress.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediashift=trace,mediashift_db=debug,mediashift_common=debug".to_string()
        } else {
            "mediashift=debug,mediashift_db=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            to,
            recursive,
            database,
            principal,
            json,
            items,
        } => {
            let requests = parse_requests(&items, &database, recursive)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert(
                cli.config.as_deref(),
                to,
                requests,
                Principal::new(principal),
                json,
            ))
        }
        Commands::Status { json } => show_status(cli.config.as_deref(), json),
        Commands::CleanBlobs => clean_blobs(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediashift {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn parse_requests(
    items: &[String],
    database: &str,
    recursive: bool,
) -> Result<Vec<ConversionRequest>> {
    items
        .iter()
        .map(|raw| {
            let id: ItemId = raw
                .parse()
                .with_context(|| format!("Invalid item id: {}", raw))?;
            Ok(ConversionRequest::new(
                MediaReference::new(id, database),
                recursive,
            ))
        })
        .collect()
}

fn open_repository(config: &config::Config) -> Result<SqliteRepository> {
    let db_path = config.database.path.to_string_lossy();
    tracing::info!("Opening database at {}", db_path);
    let pool = init_pool(&db_path)?;
    Ok(SqliteRepository::new(pool))
}

async fn convert(
    config_path: Option<&Path>,
    direction: ConversionDirection,
    requests: Vec<ConversionRequest>,
    principal: Principal,
    json: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let repository = Arc::new(open_repository(&config)?);
    let authorizer = Arc::new(RoleAuthorizer::from_config(&config.security));

    let manager = MediaConversionManager::new(
        repository,
        authorizer,
        config,
        tokio::runtime::Handle::current(),
    );

    let options = ConversionOptions::new(direction);
    let force_stop = options.force_stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current item");
            force_stop.set();
        }
    });

    let handle = manager.start_conversion(requests, options, principal);

    let mut last_message = None;
    while !handle.is_done() {
        let message = handle.latest_message();
        if message.is_some() && message != last_message {
            tracing::info!(
                "{} ({})",
                handle.progress_text(),
                message.as_deref().unwrap_or_default()
            );
            last_message = message;
        }
        tokio::time::sleep(PROGRESS_INTERVAL).await;
    }
    handle.wait().await;

    let outcome = handle.progress_text();
    let summary = manager.forget(handle.id());
    manager.shutdown().await;

    let Some(summary) = summary else {
        anyhow::bail!("{}", outcome);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for message in &summary.messages {
            println!("{}", message);
        }
    }

    if let Some(error) = summary.error {
        anyhow::bail!("Conversion aborted: {}", error);
    }

    Ok(())
}

fn show_status(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let counts = open_repository(&config)?.storage_counts()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        println!("Inline:   {}", counts.inline);
        println!("External: {}", counts.external);
        println!("Both:     {}", counts.both);
        println!("Empty:    {}", counts.empty);
    }

    Ok(())
}

fn clean_blobs(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let removed = open_repository(&config)?.remove_orphaned_blobs()?;
    println!("Removed {} orphaned blobs", removed);
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Database: {}", config.database.path.display());
    println!(
        "  Media: {}{}",
        config.media.root.display(),
        config.media.folder
    );
    println!(
        "  Max inline size: {} bytes",
        config.media.max_inline_size
    );
    println!(
        "  Consecutive error limit: {}",
        config.conversion.consecutive_error_limit
    );
    println!("  Cleanup workers: {}", config.cleanup.workers);
    println!("  Principals: {}", config.security.principals.len());

    Ok(())
}
