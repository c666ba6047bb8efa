//! Impostor atlas baking utility
//!
//! Bakes the octahedral albedo and normal/depth atlases of a model and
//! writes them as PNG files.
//!
//! Usage:
//!     bake_impostor [OPTIONS] <MODEL>
//!
//! Options:
//!     -o, --output <DIR>          Output directory (default: ./atlas)
//!     -s, --sprites <N>           Sprites per side (default: 16)
//!     -t, --texture-size <N>      Atlas size in pixels (default: 2048)
//!     -a, --alpha-clamp <A>       Alpha clamp (default: 0.4)
//!     --transparent               Keep baked alpha instead of forcing opaque
//!     --procedural                Bake the built-in test tree instead of a model
//!     -h, --help                  Show this help message

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use glam::Vec4;

use canopy::core::logging;
use canopy::impostor::{ImpostorConfig, ImpostorMaterial, SoftwareRasterizer, TargetMesh, procedural_tree};

fn print_help() {
    eprintln!("bake_impostor - Impostor atlas baking utility");
    eprintln!();
    eprintln!("Usage: bake_impostor [OPTIONS] <MODEL>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("    -o, --output <DIR>          Output directory (default: ./atlas)");
    eprintln!("    -s, --sprites <N>           Sprites per side (default: 16)");
    eprintln!("    -t, --texture-size <N>      Atlas size in pixels (default: 2048)");
    eprintln!("    -a, --alpha-clamp <A>       Alpha clamp (default: 0.4)");
    eprintln!("    --transparent               Keep baked alpha instead of forcing opaque");
    eprintln!("    --procedural                Bake the built-in test tree instead of a model");
    eprintln!("    -h, --help                  Show this help message");
    eprintln!();
    eprintln!("Example:");
    eprintln!("    bake_impostor -s 24 -t 3072 assets/Pine_5.gltf");
    eprintln!("    bake_impostor --procedural -o ./atlas");
}

#[derive(Debug)]
struct Args {
    model: Option<PathBuf>,
    output_dir: PathBuf,
    config: ImpostorConfig,
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut model: Option<PathBuf> = None;
    let mut procedural = false;
    let mut output_dir = PathBuf::from("atlas");
    let mut config = ImpostorConfig::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --output".to_string());
                }
                output_dir = PathBuf::from(&args[i]);
            }
            "-s" | "--sprites" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --sprites".to_string());
                }
                config.sprites_per_side = args[i].parse().map_err(|_| format!("Invalid sprites: {}", args[i]))?;
            }
            "-t" | "--texture-size" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --texture-size".to_string());
                }
                config.texture_size = args[i].parse().map_err(|_| format!("Invalid texture size: {}", args[i]))?;
            }
            "-a" | "--alpha-clamp" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --alpha-clamp".to_string());
                }
                config.alpha_clamp = args[i].parse().map_err(|_| format!("Invalid alpha clamp: {}", args[i]))?;
            }
            "--transparent" => config.transparent = true,
            "--procedural" => procedural = true,
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            path => {
                if model.is_some() {
                    return Err("Multiple models specified".to_string());
                }
                model = Some(PathBuf::from(path));
            }
        }
        i += 1;
    }

    if model.is_none() && !procedural {
        return Err("Missing model (or pass --procedural)".to_string());
    }
    if model.is_some() && procedural {
        return Err("--procedural cannot be combined with a model".to_string());
    }

    Ok(Args { model, output_dir, config })
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

    println!("Impostor Baker");
    println!("==============");
    match &args.model {
        Some(path) => println!("Model: {}", path.display()),
        None => println!("Model: procedural test tree"),
    }
    println!("Output directory: {}", args.output_dir.display());
    println!("Sprites per side: {}", args.config.sprites_per_side);
    println!("Texture size: {}", args.config.texture_size);
    println!();

    let mesh = match &args.model {
        Some(path) => TargetMesh::import_gltf(path),
        None => procedural_tree(10.0, Vec4::new(0.35, 0.2, 0.1, 1.0), Vec4::new(0.15, 0.45, 0.12, 1.0)),
    };
    let mesh = match mesh {
        Ok(mesh) => mesh,
        Err(e) => {
            eprintln!("Error loading model: {}", e);
            std::process::exit(1);
        }
    };
    println!("Loaded {} primitives, {} triangles", mesh.primitives().len(), mesh.triangle_count());

    let start = Instant::now();
    let material = match ImpostorMaterial::create_impostor(&SoftwareRasterizer::new(&mesh), args.config) {
        Ok(material) => material,
        Err(e) => {
            eprintln!("Error baking atlas: {}", e);
            std::process::exit(1);
        }
    };
    let atlas = material.atlas();
    println!(
        "Baked {} tiles in {:.2}s (bounds radius {:.2})",
        atlas.layout().tile_count(),
        start.elapsed().as_secs_f64(),
        atlas.bounds().radius
    );

    if let Err(e) = atlas.export_png(&args.output_dir) {
        eprintln!("Error writing atlas: {}", e);
        std::process::exit(1);
    }
    println!("Wrote {}/albedo.png and normal_depth.png", args.output_dir.display());
}
