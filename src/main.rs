//! Rendering Eras: a city redrawn through five decades of computer graphics

// Module declarations
mod assets;
mod camera;
mod clock;
mod compositor;
mod config;
mod draw;
mod error;
mod field;
mod lightning;
mod math;
mod mesh;
mod phase;
mod rain;
mod renderer;
mod scene;
mod state;
mod style;
mod textures;
mod time;

use anyhow::Context;
use winit::event_loop::EventLoop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let config = config::AppConfig::load();
    let scene = scene::Scene::generate(config.seed, config.tree_count);
    let assets = assets::Assets::load(&config);

    // Create event loop
    let event_loop = EventLoop::new().context("Failed to create event loop")?;

    let renderer = renderer::Renderer::new(&event_loop, &config, scene, &assets)
        .await
        .context("Failed to initialise renderer")?;
    // Textures now live on the GPU.
    drop(assets);

    renderer.run(event_loop).context("Event loop terminated abnormally")?;
    Ok(())
}
