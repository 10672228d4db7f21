//! Configuration for the tile engine and the `raster-tiler` binary.
//!
//! [`EngineConfig`] is the library-facing settings struct. The binary builds
//! one from its command line via [`Cli`], where every engine option can also
//! be set through an environment variable with the `RT_` prefix:
//!
//! - `RT_TILE_SIZE` - Output tile edge in pixels (default: 256)
//! - `RT_CACHE_L1_SIZE` - Tiles kept in memory (default: 1024)
//! - `RT_CACHE_L2_DIR` - Disk cache directory (default: disabled)
//! - `RT_CACHE_L2_SIZE_LIMIT` - Disk cache ceiling in bytes (default: 5 GiB)
//! - `RT_DEFAULT_BANDS` - Bands used when a request names none (default: 1,2,3)
//! - `RT_RENDERER` - Compose backend: auto, scalar or parallel (default: auto)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::cache::{DEFAULT_DISK_MAX_BYTES, DEFAULT_MEMORY_CAPACITY};
use crate::render::RendererKind;
use crate::stats::{StatsOverride, StretchRange};

// =============================================================================
// Default Values
// =============================================================================

/// Default output tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Largest accepted tile edge.
pub const MAX_TILE_SIZE: u32 = 4096;

/// Smallest accepted disk cache ceiling (1 MiB).
pub const MIN_DISK_MAX_BYTES: u64 = 1024 * 1024;

/// Bands rendered when a request does not name any.
pub const DEFAULT_BANDS: [usize; 3] = [1, 2, 3];

// =============================================================================
// Engine Configuration
// =============================================================================

/// Settings for a [`TileEngine`](crate::tile::TileEngine).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Output tile edge in pixels
    pub tile_size: u32,

    /// Maximum number of tiles in the memory tier
    pub memory_capacity: usize,

    /// Disk tier directory; `None` disables the tier
    pub disk_dir: Option<PathBuf>,

    /// Disk tier size ceiling in bytes
    pub disk_max_bytes: u64,

    /// Band selection used when a request names none
    pub default_bands: Vec<usize>,

    /// Stretch/compose backend
    pub renderer: RendererKind,

    /// Let caller overrides win over the binary-mask and normalized-index cases
    pub override_beats_special_cases: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            disk_dir: None,
            disk_max_bytes: DEFAULT_DISK_MAX_BYTES,
            default_bands: DEFAULT_BANDS.to_vec(),
            renderer: RendererKind::Auto,
            override_beats_special_cases: false,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(format!("tile_size must be between 1 and {MAX_TILE_SIZE}"));
        }

        if self.memory_capacity == 0 {
            return Err("memory_capacity must be greater than 0".to_string());
        }

        if self.disk_dir.is_some() && self.disk_max_bytes < MIN_DISK_MAX_BYTES {
            return Err("disk_max_bytes must be at least 1 MiB".to_string());
        }

        if self.default_bands.is_empty() {
            return Err("default_bands must name at least one band".to_string());
        }
        if self.default_bands.contains(&0) {
            return Err("default_bands are 1-based; 0 is not a band".to_string());
        }

        Ok(())
    }

    /// Builder-style setter for the disk tier directory.
    pub fn with_disk_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.disk_dir = Some(dir.into());
        self
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Raster Tiler - render web-map tiles from geospatial rasters.
#[derive(Parser, Debug, Clone)]
#[command(name = "raster-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render one tile and write it as PNG.
    Render(RenderConfig),

    /// Print the stretch ranges a tile would be rendered with, as JSON.
    Stats(StatsConfig),
}

/// Tile address and raster shared by both subcommands.
#[derive(Args, Debug, Clone)]
pub struct TileArgs {
    /// Raster file to render from.
    #[arg(long)]
    pub raster: PathBuf,

    /// Zoom level.
    #[arg(short, long)]
    pub z: u8,

    /// Tile column.
    #[arg(short, long)]
    pub x: u32,

    /// Tile row (XYZ, 0 at the top).
    #[arg(short, long)]
    pub y: u32,

    /// 1-based bands to compose (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub bands: Option<Vec<usize>>,

    /// Per-band stretch overrides, e.g. `1=10:200,2=0:5000`.
    #[arg(long, value_delimiter = ',', value_parser = parse_band_range)]
    pub stats: Vec<(usize, StretchRange)>,
}

impl TileArgs {
    /// The `--stats` entries as an override, if any were given.
    pub fn stats_override(&self) -> Option<StatsOverride> {
        if self.stats.is_empty() {
            None
        } else {
            Some(self.stats.iter().copied().collect())
        }
    }
}

/// Engine settings exposed on the command line.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Output tile edge in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "RT_TILE_SIZE")]
    pub tile_size: u32,

    /// Maximum number of tiles kept in memory.
    #[arg(long, default_value_t = DEFAULT_MEMORY_CAPACITY, env = "RT_CACHE_L1_SIZE")]
    pub cache_l1_size: usize,

    /// Directory for the on-disk tile cache. Disabled when unset.
    #[arg(long, env = "RT_CACHE_L2_DIR")]
    pub cache_l2_dir: Option<PathBuf>,

    /// Size ceiling of the on-disk tile cache in bytes.
    #[arg(long, default_value_t = DEFAULT_DISK_MAX_BYTES, env = "RT_CACHE_L2_SIZE_LIMIT")]
    pub cache_l2_size_limit: u64,

    /// Bands used when `--bands` is not given (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "1,2,3", env = "RT_DEFAULT_BANDS")]
    pub default_bands: Vec<usize>,

    /// Stretch/compose backend.
    #[arg(long, value_enum, default_value_t = RendererKind::Auto, env = "RT_RENDERER")]
    pub renderer: RendererKind,
}

impl EngineArgs {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            tile_size: self.tile_size,
            memory_capacity: self.cache_l1_size,
            disk_dir: self.cache_l2_dir.clone(),
            disk_max_bytes: self.cache_l2_size_limit,
            default_bands: self.default_bands.clone(),
            renderer: self.renderer,
            override_beats_special_cases: false,
        }
    }
}

/// Arguments of the `render` subcommand.
#[derive(Args, Debug, Clone)]
pub struct RenderConfig {
    #[command(flatten)]
    pub tile: TileArgs,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Output PNG path.
    #[arg(short, long, default_value = "tile.png")]
    pub output: PathBuf,
}

/// Arguments of the `stats` subcommand.
#[derive(Args, Debug, Clone)]
pub struct StatsConfig {
    #[command(flatten)]
    pub tile: TileArgs,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Parse one `band=low:high` override entry.
fn parse_band_range(s: &str) -> Result<(usize, StretchRange), String> {
    let (band, range) = s
        .split_once('=')
        .ok_or_else(|| format!("expected band=low:high, got '{s}'"))?;
    let band: usize = band
        .trim()
        .parse()
        .map_err(|e| format!("invalid band '{band}': {e}"))?;
    if band == 0 {
        return Err("bands are 1-based".to_string());
    }
    Ok((band, range.parse()?))
}

// =============================================================================
// Tests
// =============================================================================
