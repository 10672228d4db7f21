//! Raster Tiler - render web-map tiles from geospatial rasters.
//!
//! This binary renders single tiles through a full [`TileEngine`], mostly to
//! inspect stretch behaviour and warm the disk cache.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use raster_tiler::{
    config::{Cli, Command, EngineArgs, RenderConfig, StatsConfig, TileArgs},
    DatasetOpener, DirectoryLocator, RasterId, TileCoord, TileEngine, TileRequest,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Render(config) => run_render(config).await,
        Command::Stats(config) => run_stats(config).await,
    }
}

// =============================================================================
// Render Command
// =============================================================================

async fn run_render(config: RenderConfig) -> ExitCode {
    let (engine, request) = match prepare(&config.tile, &config.engine).await {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let encoded = match engine.render_png(&request).await {
        Ok(encoded) => encoded,
        Err(e) => {
            error!("Render failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::fs::write(&config.output, &encoded.data).await {
        error!("Failed to write {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    info!(
        "Wrote {} ({} bytes, {:?})",
        config.output.display(),
        encoded.data.len(),
        encoded.source
    );
    ExitCode::SUCCESS
}

// =============================================================================
// Stats Command
// =============================================================================

async fn run_stats(config: StatsConfig) -> ExitCode {
    let (engine, request) = match prepare(&config.tile, &config.engine).await {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let stats = match engine.stats(&request).await {
        Ok(stats) => stats,
        Err(e) => {
            error!("Stats resolution failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&stats) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize stats: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Build an engine rooted at the raster's directory and the request for it.
async fn prepare(tile: &TileArgs, engine: &EngineArgs) -> Result<(TileEngine, TileRequest), String> {
    let (root, name) = split_raster_path(&tile.raster)?;
    let coord = TileCoord::new(tile.z, tile.x, tile.y).map_err(|e| e.to_string())?;

    let engine = TileEngine::builder(Arc::new(DirectoryLocator::new(root)), dataset_opener()?)
        .config(engine.to_engine_config())
        .build()
        .await
        .map_err(|e| e.to_string())?;

    let mut request = TileRequest::new(RasterId::Name(name), coord);
    request.bands = tile.bands.clone();
    request.stats_override = tile.stats_override();

    Ok((engine, request))
}

/// Split a raster path into the locator root and the identity under it.
fn split_raster_path(path: &Path) -> Result<(&Path, String), String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Not a raster file path: {}", path.display()))?;
    let root = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    Ok((root, name.to_string()))
}

#[cfg(feature = "gdal")]
fn dataset_opener() -> Result<Arc<dyn DatasetOpener>, String> {
    Ok(Arc::new(raster_tiler::GdalOpener))
}

#[cfg(not(feature = "gdal"))]
fn dataset_opener() -> Result<Arc<dyn DatasetOpener>, String> {
    Err("raster-tiler was built without GDAL support; rebuild with --features gdal".to_string())
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "raster_tiler=debug"
    } else {
        "raster_tiler=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
