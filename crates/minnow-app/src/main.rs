use anyhow::Result;
use minnow_app::renderer::{Renderer, RendererContext};
use minnow_app::terminal::TerminalRenderer;
use minnow_core::{MinnowConfig, WorldState};
use std::sync::{Arc, Mutex};
use tracing::info;

fn main() -> Result<()> {
    init_tracing();
    let world = bootstrap_world()?;
    info!("Starting minnow tank shell");
    let renderer = TerminalRenderer::default();
    renderer.run(RendererContext { world })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn bootstrap_world() -> Result<Arc<Mutex<WorldState>>> {
    let config = MinnowConfig {
        history_capacity: 600,
        ..MinnowConfig::default()
    };
    let world = WorldState::new(config)?;

    info!(
        plankton = world.plankton().len(),
        nodes = world.plankton().node_count(),
        depth = world.plankton().depth(),
        "Seeded plankton cloud"
    );

    Ok(Arc::new(Mutex::new(world)))
}
