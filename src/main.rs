//! # SSAO Viewer
//!
//! Opens a model in a fly-camera window with the deferred SSAO renderer.
//!
//! ```text
//! ssao-viewer <model.obj> [environment.hdr]
//! ```
//!
//! `SSAO_RENDERER=baseline` switches to the forward renderer, `SSAO_SEED`
//! fixes the occlusion kernel and `SSAO_SHADER_DIR` loads WGSL from disk.
//! Controls: W/A/S/D, Space/Shift, Q/E roll, mouse to look, V toggles vsync.

use anyhow::{bail, Context};
use env_logger::Env;
use ssao_renderer::{RendererConfig, ViewerApp};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let Some(model) = args.next() else {
        bail!("usage: ssao-viewer <model.obj> [environment.hdr]");
    };

    let mut config = RendererConfig::default().from_env();
    if let Some(environment) = args.next() {
        config = config.with_skybox(environment);
    }

    let app = ViewerApp::new(model, config).context("failed to create the event loop")?;
    app.run().context("event loop terminated with an error")?;
    Ok(())
}
