//! Tile engine orchestrating the render pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           TileEngine                              │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                     render() / render_png()                 │  │
//! │  │  1. Check cache        4. Map tile → window, boundless read │  │
//! │  │  2. Resolve path       5. Resolve stats, stretch, compose   │  │
//! │  │  3. Lock handle slot   6. Encode, cache & return            │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │        │               │                │                │        │
//! │        ▼               ▼                ▼                ▼        │
//! │  ┌───────────┐ ┌───────────────┐ ┌──────────────┐ ┌──────────┐   │
//! │  │ TileCache │ │ RasterRegistry│ │ StatsResolver│ │ Renderer │   │
//! │  └───────────┘ └───────────────┘ └──────────────┘ └──────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps 4 and 5 run on the blocking pool while the raster's handle slot
//! is held, so requests against one raster are serialized and requests
//! against different rasters run in parallel.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::cache::{DiskTier, MemoryTier, TileCache, TileCacheKey};
use crate::config::EngineConfig;
use crate::error::{ConfigError, ProjectionError, RasterError, TileError};
use crate::geo::TileCoord;
use crate::raster::{DatasetOpener, HandleError, RasterHandle, RasterId, RasterLocator, RasterRegistry};
use crate::render::{PngTileEncoder, RenderedTile, Renderer};
use crate::stats::{BandStats, BandStatsResolver, StatsCache, StatsOverride, StretchRange};

use super::request::{BandSelection, EncodedTile, TileRequest, TileResponse, TileSource};

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`TileEngine`].
pub struct TileEngineBuilder {
    locator: Arc<dyn RasterLocator>,
    opener: Arc<dyn DatasetOpener>,
    config: EngineConfig,
    stats_cache: Option<Arc<StatsCache>>,
}

impl TileEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a stats cache with other engines. A fresh one is created otherwise.
    pub fn stats_cache(mut self, cache: Arc<StatsCache>) -> Self {
        self.stats_cache = Some(cache);
        self
    }

    /// Validate the configuration and open the cache tiers.
    ///
    /// A disk tier that fails to open is logged and left out; the engine
    /// then runs with the memory tier only.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub async fn build(self) -> Result<TileEngine, ConfigError> {
        self.config.validate().map_err(ConfigError)?;

        let capacity = NonZeroUsize::new(self.config.memory_capacity)
            .ok_or_else(|| ConfigError("memory_capacity must be greater than 0".to_string()))?;
        let memory = MemoryTier::with_capacity(capacity);

        let disk = match &self.config.disk_dir {
            Some(dir) => match DiskTier::open(dir, self.config.disk_max_bytes).await {
                Ok(disk) => Some(disk),
                Err(e) => {
                    warn!(
                        directory = %dir.display(),
                        error = %e,
                        "Disk cache unavailable, using memory tier only"
                    );
                    None
                }
            },
            None => None,
        };

        let stats_cache = self.stats_cache.unwrap_or_default();
        let resolver = BandStatsResolver::new(stats_cache)
            .with_override_precedence(self.config.override_beats_special_cases);
        let renderer = self.config.renderer.build();

        debug!(
            tile_size = self.config.tile_size,
            memory_capacity = self.config.memory_capacity,
            disk_tier = disk.is_some(),
            renderer = renderer.name(),
            "Tile engine ready"
        );

        Ok(TileEngine {
            config: self.config,
            locator: self.locator,
            registry: Arc::new(RasterRegistry::new(self.opener)),
            resolver,
            renderer,
            cache: TileCache::new(memory, disk),
            encoder: PngTileEncoder::new(),
        })
    }
}

// =============================================================================
// Tile Engine
// =============================================================================

/// Renders and caches tiles for any number of rasters.
///
/// The engine owns one lazily opened handle per raster identity. Handles are
/// released by [`release`](Self::release), [`close`](Self::close), or when
/// the engine is dropped.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use raster_tiler::{DirectoryLocator, GdalOpener, TileCoord, TileEngine, TileRequest};
///
/// let engine = TileEngine::builder(
///     Arc::new(DirectoryLocator::new("/data/rasters")),
///     Arc::new(GdalOpener),
/// )
/// .build()
/// .await?;
///
/// let request = TileRequest::new(42, TileCoord::new(10, 512, 340)?).with_bands([4, 3, 2]);
/// let png = engine.render_png(&request).await?;
/// ```
pub struct TileEngine {
    config: EngineConfig,
    locator: Arc<dyn RasterLocator>,
    registry: Arc<RasterRegistry>,
    resolver: BandStatsResolver,
    renderer: Arc<dyn Renderer>,
    cache: TileCache,
    encoder: PngTileEncoder,
}

/// Output of the blocking part of the pipeline.
struct BlockOutput {
    tile: RenderedTile,
    stats: Vec<BandStats>,
}

impl BlockOutput {
    fn empty(size: u32) -> Self {
        Self {
            tile: RenderedTile::empty(size),
            stats: Vec::new(),
        }
    }
}

impl TileEngine {
    /// Start building an engine with the default configuration.
    pub fn builder(
        locator: Arc<dyn RasterLocator>,
        opener: Arc<dyn DatasetOpener>,
    ) -> TileEngineBuilder {
        TileEngineBuilder {
            locator,
            opener,
            config: EngineConfig::default(),
            stats_cache: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn stats_cache(&self) -> &Arc<StatsCache> {
        self.resolver.cache()
    }

    pub fn registry(&self) -> &RasterRegistry {
        &self.registry
    }

    /// Name of the active compose backend.
    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    /// Render a tile, using the cache when available.
    ///
    /// Missing rasters and windows without positive data produce
    /// [`RenderedTile::Empty`] rather than an error.
    ///
    /// # Errors
    ///
    /// - [`TileError::UnsupportedProjection`] if the raster's CRS cannot be used
    /// - [`TileError::Locator`] if the path lookup fails
    /// - [`TileError::Render`] for any failure while reading or composing
    pub async fn render(&self, request: &TileRequest) -> Result<TileResponse, TileError> {
        let key = self.cache_key(request);

        if let Some((data, tier)) = self.cache.get(&key).await {
            match self.encoder.decode(&data) {
                Ok(tile) => {
                    return Ok(TileResponse {
                        tile,
                        source: tier.into(),
                    })
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Dropping undecodable cached tile");
                    self.cache.remove(&key).await;
                }
            }
        }

        let (output, source) = self.produce(request).await?;
        if source == TileSource::Rendered {
            match self.encoder.encode(&output.tile) {
                Ok(data) => self.cache.put(key, data).await,
                Err(e) => warn!(key = %key, error = %e, "Rendered tile not cached"),
            }
        }

        Ok(TileResponse {
            tile: output.tile,
            source,
        })
    }

    /// Render a tile as PNG bytes. Cache hits return the stored bytes as-is.
    ///
    /// # Errors
    ///
    /// As [`render`](Self::render), plus [`TileError::Encode`].
    pub async fn render_png(&self, request: &TileRequest) -> Result<EncodedTile, TileError> {
        let key = self.cache_key(request);

        if let Some((data, tier)) = self.cache.get(&key).await {
            return Ok(EncodedTile {
                data,
                source: tier.into(),
            });
        }

        let (output, source) = self.produce(request).await?;
        let data = self.encoder.encode(&output.tile)?;
        if source == TileSource::Rendered {
            self.cache.put(key, data.clone()).await;
        }

        Ok(EncodedTile { data, source })
    }

    /// Resolve the stretch ranges a tile would be rendered with.
    ///
    /// Bypasses the tile cache. Returns no entries when the raster is
    /// missing or the tile has no positive data.
    pub async fn stats(&self, request: &TileRequest) -> Result<Vec<BandStats>, TileError> {
        let (output, _) = self.produce(request).await?;
        Ok(output.stats)
    }

    /// Close the handle of one raster. Returns whether one was held.
    pub async fn release(&self, raster_id: &RasterId) -> bool {
        self.registry.release(raster_id).await
    }

    /// Close every handle.
    pub async fn close(&self) {
        self.registry.clear().await;
    }

    fn requested_bands<'a>(&'a self, request: &'a TileRequest) -> &'a [usize] {
        request
            .bands
            .as_deref()
            .unwrap_or(self.config.default_bands.as_slice())
    }

    fn cache_key(&self, request: &TileRequest) -> TileCacheKey {
        TileCacheKey::new(
            &request.raster_id,
            request.tile,
            self.requested_bands(request),
            request.stats_override.as_ref(),
        )
    }

    /// Resolve a raster identity to an existing file.
    async fn locate(&self, raster_id: &RasterId) -> Result<Option<PathBuf>, TileError> {
        let path = self
            .locator
            .resolve_path(raster_id)
            .await
            .map_err(|message| TileError::Locator {
                raster_id: raster_id.clone(),
                message,
            })?;

        let Some(path) = path else {
            debug!(raster_id = %raster_id, "Raster identity not found");
            return Ok(None);
        };

        // Filesystem checks stay off the async workers
        let opener = Arc::clone(self.registry.opener());
        let check_path = path.clone();
        let exists = tokio::task::spawn_blocking(move || opener.exists(&check_path))
            .await
            .map_err(|e| TileError::Locator {
                raster_id: raster_id.clone(),
                message: format!("existence check failed: {e}"),
            })?;

        if !exists {
            debug!(raster_id = %raster_id, path = %path.display(), "Raster file missing");
            return Ok(None);
        }
        Ok(Some(path))
    }

    /// Run the uncached pipeline.
    async fn produce(&self, request: &TileRequest) -> Result<(BlockOutput, TileSource), TileError> {
        let size = self.config.tile_size;

        let Some(path) = self.locate(&request.raster_id).await? else {
            return Ok((BlockOutput::empty(size), TileSource::Missing));
        };

        let slot = self.registry.slot(&request.raster_id).await;
        let opener = Arc::clone(self.registry.opener());
        let resolver = self.resolver.clone();
        let renderer = Arc::clone(&self.renderer);
        let raster_id = request.raster_id.clone();
        let tile = request.tile;
        let bands = self.requested_bands(request).to_vec();
        let overrides = request.stats_override.clone();

        let task = tokio::task::spawn_blocking(move || {
            slot.with_handle(&raster_id, &path, &*opener, |handle| {
                render_block(
                    handle,
                    tile,
                    &bands,
                    overrides.as_ref(),
                    size,
                    &resolver,
                    &*renderer,
                )
            })
        });

        let result = match task.await {
            Ok(result) => result,
            Err(e) => return Err(self.render_failure(request, format!("render task failed: {e}"))),
        };

        match result {
            Ok(output) => Ok((output, TileSource::Rendered)),
            Err(HandleError::Raster(RasterError::NotFound(path))) => {
                debug!(raster_id = %request.raster_id, path = %path, "Raster file vanished");
                Ok((BlockOutput::empty(size), TileSource::Missing))
            }
            Err(HandleError::Projection(ProjectionError::Transform(message))) => {
                Err(self.render_failure(request, message))
            }
            Err(HandleError::Projection(source)) => {
                error!(
                    raster_id = %request.raster_id,
                    error = %source,
                    "Unsupported raster projection"
                );
                Err(TileError::UnsupportedProjection {
                    raster_id: request.raster_id.clone(),
                    source,
                })
            }
            Err(HandleError::Raster(e)) => Err(self.render_failure(request, e.to_string())),
        }
    }

    fn render_failure(&self, request: &TileRequest, message: String) -> TileError {
        let TileCoord { z, x, y } = request.tile;
        error!(
            raster_id = %request.raster_id,
            z,
            x,
            y,
            error = %message,
            "Tile render failed"
        );
        TileError::Render {
            raster_id: request.raster_id.clone(),
            z,
            x,
            y,
            message,
        }
    }
}

/// Read, resolve and compose one tile against an open handle.
fn render_block(
    handle: &RasterHandle,
    tile: TileCoord,
    requested: &[usize],
    overrides: Option<&StatsOverride>,
    size: u32,
    resolver: &BandStatsResolver,
    renderer: &dyn Renderer,
) -> Result<BlockOutput, HandleError> {
    let bands = BandSelection::resolve(requested, handle.band_count());
    let window = handle.mapper().tile_window(&tile)?;

    let (width, height) = handle.dataset().size();
    if !window.intersects(width, height) {
        debug!(raster_id = %handle.raster_id(), tile = %tile, "Tile outside raster extent");
        return Ok(BlockOutput::empty(size));
    }

    let stack = handle
        .dataset()
        .read_window(bands.as_slice(), &window, size as usize, size as usize)?;
    if !stack.has_positive() {
        debug!(raster_id = %handle.raster_id(), tile = %tile, "No positive data in window");
        return Ok(BlockOutput::empty(size));
    }

    let stats = resolver.resolve(
        handle.raster_id(),
        bands.as_slice(),
        &stack,
        handle.dataset(),
        overrides,
    );
    let ranges: Vec<StretchRange> = stats.iter().map(|s| s.range).collect();

    Ok(BlockOutput {
        tile: renderer.render(&stack, &ranges),
        stats,
    })
}

// =============================================================================
// Tests
// =============================================================================
