use std::path::PathBuf;

use anyhow::{bail, Result};
use bbox_engine::device::{BackendKind, GpuInit};
use bbox_engine::logging::{init_logging, LoggingConfig};
use bbox_engine::scene::{RendererConfig, Viewer};
use bbox_engine::window::{Runtime, RuntimeConfig};

/// `reference` or `hardware`.
const BACKEND_VAR: &str = "BBOX_BACKEND";
/// Optional OBJ model shown instead of the cube.
const MESH_VAR: &str = "BBOX_MESH";

fn gpu_init() -> Result<GpuInit> {
    let mut init = GpuInit::default();
    if let Ok(name) = std::env::var(BACKEND_VAR) {
        let Some(backend) = BackendKind::from_name(&name) else {
            bail!("{BACKEND_VAR}={name:?} is not a backend (expected `hardware` or `reference`)");
        };
        init.backend = backend;
    }
    Ok(init)
}

fn renderer_config() -> RendererConfig {
    RendererConfig {
        mesh_path: std::env::var_os(MESH_VAR).map(PathBuf::from),
        ..Default::default()
    }
}

fn run() -> Result<()> {
    let gpu = gpu_init()?;
    log::info!("starting bbox viewer on the {:?} backend", gpu.backend);

    let viewer = Viewer::new(renderer_config(), gpu);
    Runtime::run(RuntimeConfig::default(), viewer)
}

fn main() {
    init_logging(LoggingConfig::default());

    if let Err(e) = run() {
        eprintln!("bbox: {e:#}");
        std::process::exit(1);
    }
}
