//! Forest layout utility
//!
//! Generates the terrain grid and tree placements for a scene configuration
//! and prints terrain and placement statistics.
//!
//! Usage:
//!     generate_forest [OPTIONS]
//!
//! Options:
//!     -c, --config <FILE>         Scene config JSON (default: built-in defaults)
//!     -n, --count <N>             Number of trees (default: from config)
//!     --seed <SEED>               Placement seed (default: from config)
//!     --chunks <N>                Chunk grid size N x N (default: from config)
//!     --max-slope <DEG>           Reject placements steeper than this
//!     --write-config <FILE>       Write the effective config as JSON
//!     -h, --help                  Show this help message

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use canopy::core::logging;
use canopy::scene::SceneConfig;
use canopy::terrain::{SurfaceSampler, TerrainChunkStore, scatter_instances};

fn print_help() {
    eprintln!("generate_forest - Forest layout utility");
    eprintln!();
    eprintln!("Usage: generate_forest [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("    -c, --config <FILE>         Scene config JSON (default: built-in defaults)");
    eprintln!("    -n, --count <N>             Number of trees (default: from config)");
    eprintln!("    --seed <SEED>               Placement seed (default: from config)");
    eprintln!("    --chunks <N>                Chunk grid size N x N (default: from config)");
    eprintln!("    --max-slope <DEG>           Reject placements steeper than this");
    eprintln!("    --write-config <FILE>       Write the effective config as JSON");
    eprintln!("    -h, --help                  Show this help message");
    eprintln!();
    eprintln!("Example:");
    eprintln!("    generate_forest -n 10000 --chunks 8");
    eprintln!("    generate_forest -c scene.json --seed 7");
}

#[derive(Debug)]
struct Args {
    config: SceneConfig,
    write_config: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut config_path: Option<PathBuf> = None;
    let mut count: Option<u32> = None;
    let mut seed: Option<u64> = None;
    let mut chunks: Option<u32> = None;
    let mut max_slope: Option<f64> = None;
    let mut write_config: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --config".to_string());
                }
                config_path = Some(PathBuf::from(&args[i]));
            }
            "-n" | "--count" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --count".to_string());
                }
                count = Some(args[i].parse().map_err(|_| format!("Invalid count: {}", args[i]))?);
            }
            "--seed" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --seed".to_string());
                }
                seed = Some(args[i].parse().map_err(|_| format!("Invalid seed: {}", args[i]))?);
            }
            "--chunks" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --chunks".to_string());
                }
                chunks = Some(args[i].parse().map_err(|_| format!("Invalid chunk count: {}", args[i]))?);
            }
            "--max-slope" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --max-slope".to_string());
                }
                max_slope = Some(args[i].parse().map_err(|_| format!("Invalid slope: {}", args[i]))?);
            }
            "--write-config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --write-config".to_string());
                }
                write_config = Some(PathBuf::from(&args[i]));
            }
            other => {
                return Err(format!("Unknown option: {}", other));
            }
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => SceneConfig::from_json_file(&path).map_err(|e| format!("{}: {}", path.display(), e))?,
        None => SceneConfig::default(),
    };
    if let Some(count) = count {
        config.tree_count = count;
    }
    if seed.is_some() {
        config.sampler.seed = seed;
    }
    if let Some(n) = chunks {
        config.terrain.max_chunks_x = n;
        config.terrain.max_chunks_z = n;
    }
    if let Some(deg) = max_slope {
        config.sampler.policy.max_slope_degrees = deg;
    }
    config.validate().map_err(|e| e.to_string())?;

    Ok(Args { config, write_config })
}

fn main() {
    logging::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };
    let config = &args.config;

    println!("Forest Layout Generator");
    println!("=======================");
    println!("Chunk grid: {}x{}", config.terrain.max_chunks_x, config.terrain.max_chunks_z);
    println!("Chunk size: {}m, {} segments", config.terrain.chunk_size, config.terrain.segments);
    println!("Trees: {}", config.tree_count);
    match config.sampler.seed {
        Some(seed) => println!("Seed: {}", seed),
        None => println!("Seed: random"),
    }
    println!();

    if let Some(path) = &args.write_config {
        if let Err(e) = config.save_json_file(path) {
            eprintln!("Error writing config: {}", e);
            std::process::exit(1);
        }
        println!("Wrote config to {}", path.display());
    }

    let mut store = match TerrainChunkStore::new(config.terrain.clone()) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let generated = match store.populate_centered() {
        Ok(generated) => generated,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let triangles: usize = store.chunks().iter().map(|c| c.triangle_count()).sum();
    println!(
        "Generated {} chunks ({} triangles) in {:.2}s",
        generated,
        triangles,
        start.elapsed().as_secs_f64()
    );
    if let Some(extents) = store.extents() {
        println!(
            "  Extents: x {:.0}..{:.0}, z {:.0}..{:.0}",
            extents.min.x, extents.max.x, extents.min.z, extents.max.z
        );
        println!("  Height: {:.1}..{:.1}m", extents.min.y, extents.max.y);
    }

    let start = Instant::now();
    let positions = match SurfaceSampler::new(&store, config.sampler.clone()).generate_trees(config.tree_count) {
        Ok(positions) => positions,
        Err(e) => {
            eprintln!("Error placing trees: {}", e);
            std::process::exit(1);
        }
    };
    let instances = scatter_instances(&positions, config.sampler.seed.map(|s| s.wrapping_add(1)));
    let elapsed = start.elapsed();
    println!(
        "Placed {} trees in {:.2}s ({:.0} trees/sec)",
        instances.len(),
        elapsed.as_secs_f64(),
        instances.len() as f64 / elapsed.as_secs_f64().max(1e-9)
    );

    if !instances.is_empty() {
        let n = instances.len() as f32;
        let (min_y, max_y, sum_y) = instances.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0f32),
            |(lo, hi, sum), t| (lo.min(t.position.y), hi.max(t.position.y), sum + t.position.y),
        );
        let mean_scale = instances.iter().map(|t| t.scale).sum::<f32>() / n;
        println!("  Tree elevation: {:.1}..{:.1}m (mean {:.1}m)", min_y, max_y, sum_y / n);
        println!("  Mean scale: {:.3}", mean_scale);
    }
}
