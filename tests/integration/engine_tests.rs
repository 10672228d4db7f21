//! End-to-end render tests through [`TileEngine`].

use std::sync::Arc;

use raster_tiler::error::{ProjectionError, TileError};
use raster_tiler::{
    Crs, GeoTransform, MemoryDataset, RenderedTile, StatsOverride, StretchRange, TileEngine,
    TileSource,
};

use super::test_utils::*;

// =============================================================================
// Happy Path
// =============================================================================

#[tokio::test]
async fn test_render_composes_rgb() {
    let (engine, _) = engine_for(rgb_raster(), small_tiles()).await;

    let response = engine.render(&request(0, 0, 0)).await.unwrap();
    assert_eq!(response.source, TileSource::Rendered);
    assert_eq!(response.tile.size(), 4);

    // 100/200 → 127, 200/200 → 255, 50/200 → 63 (truncated)
    for (x, y) in [(0, 0), (3, 3), (1, 2)] {
        assert_eq!(response.tile.pixel(x, y), Some([127, 255, 63, 255]));
    }
}

#[tokio::test]
async fn test_second_render_served_from_memory_without_read() {
    let (engine, opener) = engine_for(rgb_raster(), small_tiles()).await;

    let first = engine.render_png(&request(0, 0, 0)).await.unwrap();
    assert_eq!(first.source, TileSource::Rendered);
    assert_eq!(opener.reads(), 1);

    let second = engine.render_png(&request(0, 0, 0)).await.unwrap();
    assert_eq!(second.source, TileSource::MemoryCache);
    assert_eq!(second.data, first.data);
    assert_eq!(opener.reads(), 1);
}

#[tokio::test]
async fn test_default_tile_size() {
    let (engine, _) = engine_for(rgb_raster(), Default::default()).await;
    let response = engine.render(&request(2, 1, 1)).await.unwrap();

    assert_eq!(response.tile.size(), 256);
    assert_eq!(response.tile.to_rgba().len(), 256 * 256 * 4);
}

#[tokio::test]
async fn test_single_band_is_gray() {
    let dataset = mercator_raster(4, constant_bands(4, &[100.0]))
        .with_statistics(1, StretchRange::new(0.0, 200.0));
    let (engine, _) = engine_for(dataset, small_tiles()).await;

    let response = engine.render(&request(0, 0, 0)).await.unwrap();
    assert_eq!(response.tile.pixel(2, 2), Some([127, 127, 127, 255]));
}

#[tokio::test]
async fn test_two_bands_leave_blue_empty() {
    let dataset = mercator_raster(4, constant_bands(4, &[100.0, 200.0]))
        .with_statistics(1, StretchRange::new(0.0, 200.0))
        .with_statistics(2, StretchRange::new(0.0, 200.0));
    let (engine, _) = engine_for(dataset, small_tiles()).await;

    let response = engine
        .render(&request(0, 0, 0).with_bands([1, 2]))
        .await
        .unwrap();
    assert_eq!(response.tile.pixel(0, 0), Some([127, 255, 0, 255]));
}

#[tokio::test]
async fn test_partial_window_is_padded_with_transparency() {
    let overrides = StatsOverride::new().with(1, StretchRange::new(0.0, 200.0));
    let (engine, _) = engine_for(north_west_raster(4, 100.0), small_tiles()).await;

    let response = engine
        .render(&request(0, 0, 0).with_bands([1]).with_stats(overrides))
        .await
        .unwrap();

    // Only the north-west quarter of the world tile has data
    assert_eq!(response.tile.pixel(0, 0), Some([127, 127, 127, 255]));
    assert_eq!(response.tile.pixel(1, 1), Some([127, 127, 127, 255]));
    assert_eq!(response.tile.pixel(2, 0), Some([0, 0, 0, 0]));
    assert_eq!(response.tile.pixel(3, 3), Some([0, 0, 0, 0]));
}

// =============================================================================
// Empty Tiles
// =============================================================================

#[tokio::test]
async fn test_unknown_identity_returns_transparent_tile() {
    let (engine, opener) = engine_for(rgb_raster(), small_tiles()).await;

    let response = engine
        .render(&raster_tiler::TileRequest::new(
            99i64,
            raster_tiler::TileCoord::new(0, 0, 0).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.source, TileSource::Missing);
    assert_eq!(response.tile, RenderedTile::empty(4));
    assert_eq!(opener.opens(), 0);
}

#[tokio::test]
async fn test_missing_file_returns_transparent_tile_uncached() {
    // Locator knows the identity, but nothing exists at its path
    let opener = Arc::new(CountingOpener::new());
    let engine = TileEngine::builder(fixture_locator(), opener.clone())
        .config(small_tiles())
        .build()
        .await
        .unwrap();

    let response = engine.render_png(&request(0, 0, 0)).await.unwrap();
    assert_eq!(response.source, TileSource::Missing);
    assert_eq!(opener.opens(), 0);
    assert!(engine.cache().memory().is_empty().await);

    let decoded = raster_tiler::PngTileEncoder::new()
        .decode(&response.data)
        .unwrap();
    assert_eq!(decoded, RenderedTile::empty(4));
}

#[tokio::test]
async fn test_window_outside_extent_is_empty_and_cached() {
    let (engine, opener) = engine_for(north_west_raster(4, 100.0), small_tiles()).await;

    let response = engine.render(&request(1, 1, 1)).await.unwrap();
    assert_eq!(response.source, TileSource::Rendered);
    assert!(response.tile.is_empty());
    assert_eq!(opener.reads(), 0);

    let again = engine.render(&request(1, 1, 1)).await.unwrap();
    assert_eq!(again.source, TileSource::MemoryCache);
    assert!(again.tile.is_empty());
}

#[tokio::test]
async fn test_non_positive_block_is_empty() {
    let dataset = mercator_raster(4, constant_bands(4, &[0.0, -5.0, 0.0]));
    let (engine, opener) = engine_for(dataset, small_tiles()).await;

    let response = engine.render(&request(0, 0, 0)).await.unwrap();
    assert_eq!(response.tile, RenderedTile::empty(4));
    assert_eq!(opener.reads(), 1);
    assert!(engine.stats_cache().is_empty());
}

// =============================================================================
// Band Selection
// =============================================================================

#[tokio::test]
async fn test_out_of_range_bands_are_dropped() {
    let dataset = mercator_raster(4, constant_bands(4, &[10.0, 20.0]));
    let (engine, _) = engine_for(dataset, small_tiles()).await;

    let stats = engine
        .stats(&request(0, 0, 0).with_bands([2, 9]))
        .await
        .unwrap();
    assert_eq!(stats.iter().map(|s| s.band).collect::<Vec<_>>(), vec![2]);

    let stats = engine
        .stats(&request(0, 0, 0).with_bands([7, 8]))
        .await
        .unwrap();
    assert_eq!(stats.iter().map(|s| s.band).collect::<Vec<_>>(), vec![1]);
}

#[tokio::test]
async fn test_default_bands_clamped_on_single_band_raster() {
    let dataset = mercator_raster(4, constant_bands(4, &[10.0]));
    let (engine, _) = engine_for(dataset, small_tiles()).await;

    // Default selection 1,2,3 keeps only band 1
    let stats = engine.stats(&request(0, 0, 0)).await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].band, 1);
}

// =============================================================================
// Cache Keys
// =============================================================================

#[tokio::test]
async fn test_override_renders_are_cached_separately() {
    let (engine, opener) = engine_for(rgb_raster(), small_tiles()).await;
    let overrides = StatsOverride::new().with(1, StretchRange::new(0.0, 100.0));

    let plain = engine.render(&request(0, 0, 0)).await.unwrap();
    let stretched = engine
        .render(&request(0, 0, 0).with_stats(overrides.clone()))
        .await
        .unwrap();

    assert_eq!(stretched.source, TileSource::Rendered);
    assert_eq!(plain.tile.pixel(0, 0), Some([127, 255, 63, 255]));
    assert_eq!(stretched.tile.pixel(0, 0), Some([255, 255, 63, 255]));
    assert_eq!(opener.reads(), 2);

    let cached = engine
        .render(&request(0, 0, 0).with_stats(overrides))
        .await
        .unwrap();
    assert_eq!(cached.source, TileSource::MemoryCache);
    assert_eq!(cached.tile, stretched.tile);
}

#[tokio::test]
async fn test_band_order_is_part_of_key() {
    let (engine, _) = engine_for(rgb_raster(), small_tiles()).await;

    let rgb = engine
        .render(&request(0, 0, 0).with_bands([1, 2, 3]))
        .await
        .unwrap();
    let bgr = engine
        .render(&request(0, 0, 0).with_bands([3, 2, 1]))
        .await
        .unwrap();

    assert_eq!(bgr.source, TileSource::Rendered);
    assert_eq!(rgb.tile.pixel(0, 0), Some([127, 255, 63, 255]));
    assert_eq!(bgr.tile.pixel(0, 0), Some([63, 255, 127, 255]));
}

// =============================================================================
// Handles
// =============================================================================

#[tokio::test]
async fn test_handle_reused_across_tiles() {
    let (engine, opener) = engine_for(rgb_raster(), small_tiles()).await;

    engine.render(&request(0, 0, 0)).await.unwrap();
    engine.render(&request(1, 0, 0)).await.unwrap();
    engine.render(&request(1, 1, 1)).await.unwrap();
    assert_eq!(opener.opens(), 1);
    assert_eq!(opener.reads(), 3);

    assert!(engine.release(&raster_tiler::RasterId::Int(RASTER_ID)).await);
    engine.render(&request(2, 0, 0)).await.unwrap();
    assert_eq!(opener.opens(), 2);
}

#[tokio::test]
async fn test_release_keeps_cached_tiles() {
    let (engine, opener) = engine_for(rgb_raster(), small_tiles()).await;
    engine.render(&request(0, 0, 0)).await.unwrap();

    assert!(engine.release(&raster_tiler::RasterId::Int(RASTER_ID)).await);
    let response = engine.render(&request(0, 0, 0)).await.unwrap();
    assert_eq!(response.source, TileSource::MemoryCache);
    assert_eq!(opener.opens(), 1);
}

#[tokio::test]
async fn test_concurrent_renders_share_one_handle() {
    let (engine, opener) = engine_for(rgb_raster(), small_tiles()).await;
    let engine = Arc::new(engine);

    let mut tasks = Vec::new();
    for x in 0..4u32 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            engine.render(&request(2, x, 1)).await
        }));
    }
    for task in tasks {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.source, TileSource::Rendered);
    }

    assert_eq!(opener.opens(), 1);
    assert_eq!(engine.registry().len().await, 1);
}

#[tokio::test]
async fn test_close_releases_every_handle() {
    let (engine, opener) = engine_for(rgb_raster(), small_tiles()).await;
    engine.render(&request(0, 0, 0)).await.unwrap();

    engine.close().await;
    assert!(engine.registry().is_empty().await);

    engine.render(&request(1, 0, 0)).await.unwrap();
    assert_eq!(opener.opens(), 2);
}

#[tokio::test]
async fn test_existence_check_runs_off_the_runtime_thread() {
    let (engine, opener) = engine_for(rgb_raster(), small_tiles()).await;
    engine.render(&request(0, 0, 0)).await.unwrap();
    engine.render(&request(1, 0, 0)).await.unwrap();

    let runtime_thread = std::thread::current().id();
    let threads = opener.exists_threads();
    assert_eq!(threads.len(), 2);
    assert!(threads.iter().all(|id| *id != runtime_thread));
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_undefined_crs_is_surfaced() {
    let dataset = MemoryDataset::new(
        4,
        4,
        constant_bands(4, &[1.0]),
        None,
        GeoTransform::north_up(0.0, 4.0, 1.0, 1.0),
    )
    .unwrap();
    let (engine, _) = engine_for(dataset, small_tiles()).await;

    let err = engine.render(&request(0, 0, 0)).await.unwrap_err();
    assert!(matches!(
        err,
        TileError::UnsupportedProjection {
            source: ProjectionError::UndefinedCrs,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unknown_epsg_is_surfaced() {
    let dataset = MemoryDataset::new(
        4,
        4,
        constant_bands(4, &[1.0]),
        Some(Crs::Epsg(1)),
        GeoTransform::north_up(0.0, 4.0, 1.0, 1.0),
    )
    .unwrap();
    let (engine, _) = engine_for(dataset, small_tiles()).await;

    let err = engine.render(&request(0, 0, 0)).await.unwrap_err();
    assert!(matches!(
        err,
        TileError::UnsupportedProjection {
            source: ProjectionError::UnsupportedEpsg(1),
            ..
        }
    ));
}

#[tokio::test]
async fn test_read_failure_is_recoverable() {
    let opener = Arc::new(BrokenReadOpener::new());
    let engine = TileEngine::builder(fixture_locator(), opener.clone())
        .config(small_tiles())
        .build()
        .await
        .unwrap();

    let err = engine.render(&request(3, 2, 5)).await.unwrap_err();
    match err {
        TileError::Render { z, x, y, message, .. } => {
            assert_eq!((z, x, y), (3, 2, 5));
            assert!(message.contains("simulated"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // The failed handle is dropped and re-opened on the next request
    assert!(engine.render(&request(3, 2, 5)).await.is_err());
    assert_eq!(opener.opens(), 2);
    assert!(engine.cache().memory().is_empty().await);
}

#[tokio::test]
async fn test_locator_failure_is_surfaced() {
    let engine = TileEngine::builder(Arc::new(FailingLocator), Arc::new(CountingOpener::new()))
        .build()
        .await
        .unwrap();

    let err = engine.render(&request(0, 0, 0)).await.unwrap_err();
    assert!(matches!(err, TileError::Locator { .. }));
}
