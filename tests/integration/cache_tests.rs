//! Two-tier tile cache behaviour as seen through the engine.

use std::sync::Arc;

use tempfile::TempDir;

use raster_tiler::{EngineConfig, RasterId, TileCacheKey, TileCoord, TileEngine, TileSource};

use super::test_utils::*;

fn disk_config(dir: &TempDir) -> EngineConfig {
    small_tiles().with_disk_dir(dir.path())
}

#[tokio::test]
async fn test_disk_tier_survives_engine_restart() {
    let dir = TempDir::new().unwrap();

    let (engine, _) = engine_for(rgb_raster(), disk_config(&dir)).await;
    let rendered = engine.render_png(&request(0, 0, 0)).await.unwrap();
    assert_eq!(rendered.source, TileSource::Rendered);
    drop(engine);

    let (engine, opener) = engine_for(rgb_raster(), disk_config(&dir)).await;
    let from_disk = engine.render_png(&request(0, 0, 0)).await.unwrap();
    assert_eq!(from_disk.source, TileSource::DiskCache);
    assert_eq!(from_disk.data, rendered.data);
    assert_eq!(opener.opens(), 0);

    // Promoted into memory by the disk hit
    let promoted = engine.render_png(&request(0, 0, 0)).await.unwrap();
    assert_eq!(promoted.source, TileSource::MemoryCache);

    let stats = engine.cache().stats().await;
    assert_eq!(stats.disk_hits, 1);
    assert_eq!(stats.memory_hits, 1);
    assert_eq!(stats.memory_entries, 1);
}

#[tokio::test]
async fn test_disk_hit_decodes_to_same_tile() {
    let dir = TempDir::new().unwrap();

    let (engine, _) = engine_for(rgb_raster(), disk_config(&dir)).await;
    let rendered = engine.render(&request(1, 0, 1)).await.unwrap();
    drop(engine);

    let (engine, _) = engine_for(rgb_raster(), disk_config(&dir)).await;
    let cached = engine.render(&request(1, 0, 1)).await.unwrap();
    assert_eq!(cached.source, TileSource::DiskCache);
    assert_eq!(cached.tile, rendered.tile);
}

#[tokio::test]
async fn test_corrupt_disk_entry_is_rerendered() {
    let dir = TempDir::new().unwrap();
    let (engine, opener) = engine_for(rgb_raster(), disk_config(&dir)).await;

    let key = TileCacheKey::new(
        &RasterId::Int(RASTER_ID),
        TileCoord::new(0, 0, 0).unwrap(),
        &[1, 2, 3],
        None,
    );
    let path = engine.cache().disk().unwrap().path_for(&key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"not a png").unwrap();

    let response = engine.render(&request(0, 0, 0)).await.unwrap();
    assert_eq!(response.source, TileSource::Rendered);
    assert_eq!(response.tile.pixel(0, 0), Some([127, 255, 63, 255]));
    assert_eq!(opener.reads(), 1);

    // The re-rendered tile replaced the bad entry
    let stored = std::fs::read(&path).unwrap();
    assert!(stored.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn test_unusable_disk_dir_falls_back_to_memory() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();

    let config = small_tiles().with_disk_dir(&blocker);
    let (engine, _) = engine_for(rgb_raster(), config).await;
    assert!(engine.cache().disk().is_none());

    let first = engine.render(&request(0, 0, 0)).await.unwrap();
    assert_eq!(first.source, TileSource::Rendered);
    let second = engine.render(&request(0, 0, 0)).await.unwrap();
    assert_eq!(second.source, TileSource::MemoryCache);
}

#[tokio::test]
async fn test_memory_tier_is_bounded() {
    let config = EngineConfig {
        memory_capacity: 2,
        ..small_tiles()
    };
    let (engine, opener) = engine_for(rgb_raster(), config).await;

    for x in 0..3 {
        engine.render(&request(2, x, 0)).await.unwrap();
    }
    assert_eq!(engine.cache().memory().len().await, 2);

    // Tile 0 was evicted and must be read again
    let response = engine.render(&request(2, 0, 0)).await.unwrap();
    assert_eq!(response.source, TileSource::Rendered);
    assert_eq!(opener.reads(), 4);
}

#[tokio::test]
async fn test_missing_tiles_are_not_cached() {
    let dir = TempDir::new().unwrap();
    let opener = Arc::new(CountingOpener::new());
    let engine = TileEngine::builder(fixture_locator(), opener)
        .config(disk_config(&dir))
        .build()
        .await
        .unwrap();

    engine.render(&request(0, 0, 0)).await.unwrap();
    let again = engine.render(&request(0, 0, 0)).await.unwrap();

    assert_eq!(again.source, TileSource::Missing);
    assert!(engine.cache().memory().is_empty().await);
    assert_eq!(engine.cache().disk().unwrap().size_bytes(), 0);
}
