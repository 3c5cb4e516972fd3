//! Worlds Frame Inspector
//!
//! Builds the standard frame graph against a headless uploader, prints the
//! solved pass order with the barriers issued before each pass, then records
//! one frame and reports what the slot tables loaded.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p worlds-frame-inspector -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--assets <DIR>`: Asset root directory (default: none, memory only)
//! - `--material <PATH>`: Material document to draw, relative to the asset root (repeatable)
//! - `--cubemap <PATH>`: Environment cubemap document
//! - `--workers <N>`: Job system worker threads (default: cores - 1)
//! - `--blur`: Add the bloom blur pass
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod args;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use worlds_core::constants::{MISSING_CUBEMAP, MISSING_MATERIAL, MISSING_TEXTURE};
use worlds_jobs::JobSystemConfig;
use worlds_render::{
    CommandLog, EngineConfig, EngineContext, FrameConfig, FrameGraph, SceneDesc,
};
use worlds_resources::HeadlessUploader;

use crate::args::InspectorArgs;

fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = InspectorArgs::from_args();

    let mut jobs = JobSystemConfig::default();
    if let Some(workers) = args.workers {
        jobs = jobs.with_workers(workers);
    }

    let uploader = Arc::new(HeadlessUploader::new());
    let engine = EngineContext::new(
        EngineConfig {
            asset_root: args.assets.clone(),
            jobs,
        },
        uploader.clone(),
    )
    .context("failed to start engine services")?;

    info!(
        workers = engine.jobs.worker_count(),
        job_lists = engine.jobs.job_list_count(),
        "engine started"
    );
    check_placeholders(&engine);

    let config = FrameConfig::default().with_blur(args.blur);
    let scene = SceneDesc {
        materials: args.materials,
        environment: args.cubemap,
        ui_quads: 1,
    };
    let mut graph = FrameGraph::standard_with_scene(&config, scene);
    graph.build(&engine).context("failed to build frame graph")?;

    println!("Pass order:");
    for (position, (id, barriers)) in graph.schedule().enumerate() {
        let name = graph.solver().pass(id)?.name();
        println!("  {position}. {name}");
        for barrier in barriers {
            println!(
                "       {} {:?} -> {:?} ({:?} -> {:?})",
                graph.images().name(barrier.handle),
                barrier.old_layout,
                barrier.new_layout,
                barrier.src_stage,
                barrier.dst_stage,
            );
        }
    }

    let mut log = CommandLog::new();
    graph
        .record(&engine, &mut log)
        .context("failed to record frame")?;
    engine.jobs.complete_frame_jobs()?;

    println!();
    println!("Recorded {} commands", log.commands.len());
    println!(
        "Resident: {} textures, {} materials, {} cubemaps ({} images, {} bytes uploaded)",
        engine.resources.textures.len(),
        engine.resources.materials.len(),
        engine.resources.cubemaps.len(),
        uploader.live_images(),
        uploader.bytes_uploaded(),
    );

    Ok(())
}

/// Warn about placeholders the asset root lacks.
fn check_placeholders(engine: &EngineContext) {
    for path in [MISSING_TEXTURE, MISSING_MATERIAL, MISSING_CUBEMAP] {
        let id = engine.assets.add_or_get_existing(path);
        if !engine.assets.is_available(id) {
            warn!(path, "placeholder asset not found; missing assets will fail to load");
        }
    }
}

fn print_help() {
    eprintln!(
        "Worlds Frame Inspector

Builds the standard frame graph headlessly and prints the pass order and barriers.

USAGE:
    cargo run -p worlds-frame-inspector -- [OPTIONS]

OPTIONS:
    --assets <DIR>          Asset root directory (default: memory only)
    --material <PATH>       Material document to draw (repeatable)
    --cubemap <PATH>        Environment cubemap document
    --workers <N>           Job system worker threads (default: cores - 1)
    --blur                  Add the bloom blur pass
    -h, --help              Print this help message

EXAMPLES:
    # Inspect the bare graph
    cargo run -p worlds-frame-inspector

    # Load a material and a skybox from ./assets
    cargo run -p worlds-frame-inspector -- --assets assets \\
        --material Materials/rock.json --cubemap Cubemaps/sky.json --blur

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
