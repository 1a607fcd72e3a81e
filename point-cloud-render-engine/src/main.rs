use std::path::PathBuf;

use clap::Parser;

use crate::engine::assets::render_settings::LaunchOptions;
use crate::engine::core::app_setup::create_app;

mod engine;
mod rpc;

/// Streaming LAS point cloud viewer with frame-rate driven decimation.
#[derive(Parser, Debug, Default)]
#[command(version, about)]
struct Args {
    /// LAS file to stream on startup.
    file: Option<PathBuf>,

    /// Start optimising toward this frame rate once the file is on screen.
    #[arg(long)]
    target_fps: Option<f32>,
}

impl From<Args> for LaunchOptions {
    fn from(args: Args) -> Self {
        Self {
            file: args.file,
            target_fps: args.target_fps,
        }
    }
}

fn main() {
    #[cfg(target_arch = "wasm32")]
    {
        // The host page drives loading over RPC
        let mut app = create_app(LaunchOptions::default());
        wasm_bindgen_futures::spawn_local(async move {
            app.run();
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let mut app = create_app(Args::parse().into());
        app.run();
    }
}
