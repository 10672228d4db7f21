//! Stretch-range resolution through the engine.

use std::sync::Arc;

use raster_tiler::{
    EngineConfig, RasterId, StatsCache, StatsOverride, StatsSource, StretchRange, TileEngine,
};

use super::test_utils::*;

/// 4x4 single-band raster holding 1..=16.
fn ramp_raster() -> raster_tiler::MemoryDataset {
    mercator_raster(4, vec![(1..=16).map(|v| v as f32).collect()])
}

#[tokio::test]
async fn test_embedded_statistics_preferred_and_cached() {
    let dataset = ramp_raster().with_statistics(1, StretchRange::new(10.0, 200.0));
    let (engine, _) = engine_for(dataset, small_tiles()).await;

    let stats = engine
        .stats(&request(0, 0, 0).with_bands([1]))
        .await
        .unwrap();
    assert_eq!(stats[0].source, StatsSource::Embedded);
    assert_eq!(stats[0].range, StretchRange::new(10.0, 200.0));

    let id = RasterId::Int(RASTER_ID);
    assert_eq!(
        engine.stats_cache().get(&id, 1),
        Some(StretchRange::new(10.0, 200.0))
    );

    // Any other tile of the raster reuses the cached range
    let stats = engine
        .stats(&request(1, 1, 0).with_bands([1]))
        .await
        .unwrap();
    assert_eq!(stats[0].source, StatsSource::Cached);
    assert_eq!(stats[0].range, StretchRange::new(10.0, 200.0));
}

#[tokio::test]
async fn test_sampled_range_uses_valid_pixels() {
    let (engine, _) = engine_for(ramp_raster(), small_tiles()).await;

    let stats = engine
        .stats(&request(0, 0, 0).with_bands([1]))
        .await
        .unwrap();
    assert_eq!(stats[0].source, StatsSource::Sampled);
    assert_eq!(stats[0].range, StretchRange::new(1.0, 16.0));

    let response = engine
        .render(&request(0, 0, 0).with_bands([1]))
        .await
        .unwrap();
    // Lowest value maps to 0 but is still opaque; highest maps to 255
    assert_eq!(response.tile.pixel(0, 0), Some([0, 0, 0, 255]));
    assert_eq!(response.tile.pixel(3, 3), Some([255, 255, 255, 255]));
}

#[tokio::test]
async fn test_binary_mask_forces_unit_range() {
    let mask: Vec<f32> = (0..16).map(|i| (i % 2) as f32).collect();
    let (engine, _) = engine_for(mercator_raster(4, vec![mask]), small_tiles()).await;

    let stats = engine
        .stats(&request(0, 0, 0).with_bands([1]))
        .await
        .unwrap();
    assert_eq!(stats[0].source, StatsSource::BinaryMask);
    assert_eq!(stats[0].range, StretchRange::UNIT);

    let response = engine
        .render(&request(0, 0, 0).with_bands([1]))
        .await
        .unwrap();
    assert_eq!(response.tile.pixel(0, 0), Some([0, 0, 0, 0]));
    assert_eq!(response.tile.pixel(1, 0), Some([255, 255, 255, 255]));
    assert!(engine.stats_cache().is_empty());
}

#[tokio::test]
async fn test_normalized_index_forces_signed_range() {
    let ndvi: Vec<f32> = (0..16).map(|i| (i as f32 - 8.0) / 8.0).collect();
    let (engine, _) = engine_for(mercator_raster(4, vec![ndvi]), small_tiles()).await;

    let stats = engine
        .stats(&request(0, 0, 0).with_bands([1]))
        .await
        .unwrap();
    assert_eq!(stats[0].source, StatsSource::NormalizedIndex);
    assert_eq!(stats[0].range, StretchRange::SIGNED_UNIT);
}

#[tokio::test]
async fn test_special_case_beats_override_by_default() {
    let mask: Vec<f32> = (0..16).map(|i| (i % 2) as f32).collect();
    let overrides = StatsOverride::new().with(1, StretchRange::new(0.0, 5.0));

    let (engine, _) = engine_for(mercator_raster(4, vec![mask.clone()]), small_tiles()).await;
    let stats = engine
        .stats(&request(0, 0, 0).with_bands([1]).with_stats(overrides.clone()))
        .await
        .unwrap();
    assert_eq!(stats[0].source, StatsSource::BinaryMask);

    let config = EngineConfig {
        override_beats_special_cases: true,
        ..small_tiles()
    };
    let (engine, _) = engine_for(mercator_raster(4, vec![mask]), config).await;
    let stats = engine
        .stats(&request(0, 0, 0).with_bands([1]).with_stats(overrides))
        .await
        .unwrap();
    assert_eq!(stats[0].source, StatsSource::Override);
    assert_eq!(stats[0].range, StretchRange::new(0.0, 5.0));
}

#[tokio::test]
async fn test_degenerate_override_blanks_band() {
    let overrides = StatsOverride::new().with(1, StretchRange::new(50.0, 50.0));
    let (engine, _) = engine_for(rgb_raster(), small_tiles()).await;

    let response = engine
        .render(&request(0, 0, 0).with_stats(overrides))
        .await
        .unwrap();
    assert_eq!(response.tile.pixel(0, 0), Some([0, 255, 63, 255]));
}

#[tokio::test]
async fn test_stats_cache_shared_between_engines() {
    let shared = Arc::new(StatsCache::new());

    let first = TileEngine::builder(
        fixture_locator(),
        Arc::new(CountingOpener::new().with(RASTER_PATH, ramp_raster())),
    )
    .config(small_tiles())
    .stats_cache(shared.clone())
    .build()
    .await
    .unwrap();
    first
        .stats(&request(0, 0, 0).with_bands([1]))
        .await
        .unwrap();
    assert_eq!(shared.len(), 1);

    let second = TileEngine::builder(
        fixture_locator(),
        Arc::new(CountingOpener::new().with(RASTER_PATH, ramp_raster())),
    )
    .config(small_tiles())
    .stats_cache(shared.clone())
    .build()
    .await
    .unwrap();
    let stats = second
        .stats(&request(0, 0, 0).with_bands([1]))
        .await
        .unwrap();
    assert_eq!(stats[0].source, StatsSource::Cached);

    assert_eq!(shared.invalidate(&RasterId::Int(RASTER_ID)), 1);
    let stats = second
        .stats(&request(0, 0, 0).with_bands([1]))
        .await
        .unwrap();
    assert_eq!(stats[0].source, StatsSource::Sampled);
}
