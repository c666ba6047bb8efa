//! Canopy - headless forest scene loader
//!
//! Usage:
//!     canopy [SCENE_JSON]
//!
//! Without a scene file the built-in defaults are used. Logging follows
//! `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::time::Instant;

use canopy::core::logging;
use canopy::scene::{ForestScene, FsAssetLoader, LoadOutcome, LodTier, RenderSettings, SceneConfig};

#[tokio::main]
async fn main() {
    logging::init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => match SceneConfig::from_json_file(&path) {
            Ok(config) => {
                log::info!("Loaded scene config from {}", path.display());
                config
            }
            Err(e) => {
                log::error!("Failed to read {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => SceneConfig::default(),
    };

    let settings = RenderSettings::default();
    let loader = FsAssetLoader::new(&config.asset_dir);
    let start = Instant::now();

    let scene = match ForestScene::load(&config, settings, &loader).await {
        Ok(scene) => scene,
        Err(e) => {
            log::error!("Scene load failed: {}", e);
            std::process::exit(1);
        }
    };

    let camera = scene.settings().camera(16.0 / 9.0);
    let sun = scene.settings().sun_rig.follow(camera.position);
    log::info!("Camera at {:?}, sun at {:?}", camera.position, sun.position);

    if let Some(extents) = scene.terrain().extents() {
        log::info!(
            "Terrain spans x {:.0}..{:.0}, z {:.0}..{:.0}, height {:.1}..{:.1}",
            extents.min.x,
            extents.max.x,
            extents.min.z,
            extents.max.z,
            extents.min.y,
            extents.max.y
        );
    }

    if let Some(trees) = scene.trees() {
        let buckets = trees.lod.bucket(trees.instances.iter().map(|t| t.position), camera.position);
        for tier in LodTier::ALL {
            log::info!("{:?}: {} trees", tier, buckets.get(tier).len());
        }
    }

    match scene.outcome() {
        LoadOutcome::Complete => log::info!("Scene complete in {:.2}s", start.elapsed().as_secs_f64()),
        LoadOutcome::Partial { omitted } => {
            log::warn!("Scene loaded without {} asset(s)", omitted.len())
        }
    }
}
