use std::path::PathBuf;

use bevy::asset::LoadState;
use bevy::prelude::*;
use point_cloud_loader::StreamConfig;
use serde::{Deserialize, Serialize};

use crate::engine::loading::stream_loader::LoadRequest;
use crate::engine::optimisation::feedback_controller::ControllerConfig;
use crate::engine::params::parameter_store::ParameterStore;
use crate::engine::params::render_params::{ParamRanges, RenderParams};
use crate::engine::render::decimation::DecimationRule;

pub const RENDER_SETTINGS_PATH: &str = "render_settings.json";

/// Engine tunables loaded from `render_settings.json`. Missing sections take
/// their defaults, so an empty object is a valid settings file.
#[derive(Asset, TypePath, Resource, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub params: RenderParams,
    pub ranges: ParamRanges,
    pub controller: ControllerConfig,
    pub decimation: DecimationRule,
    pub stream: StreamConfig,
    /// Start optimising toward this frame rate whenever a load completes.
    pub auto_optimise_fps: Option<f32>,
}

/// Command-line choices applied once the settings are in place.
#[derive(Resource, Debug, Clone, Default)]
pub struct LaunchOptions {
    pub file: Option<PathBuf>,
    /// Overrides `auto_optimise_fps` from the settings file.
    pub target_fps: Option<f32>,
}

#[derive(Resource, Default)]
pub struct RenderSettingsLoader {
    handle: Option<Handle<RenderSettings>>,
    applied: bool,
}

pub fn start_settings_load(
    mut settings_loader: ResMut<RenderSettingsLoader>,
    asset_server: Res<AssetServer>,
) {
    settings_loader.handle = Some(asset_server.load(RENDER_SETTINGS_PATH));
}

/// Install the loaded settings, then start the load named on the command line.
/// A missing or malformed settings file falls back to the defaults.
#[allow(clippy::too_many_arguments)]
pub fn apply_render_settings(
    mut commands: Commands,
    mut settings_loader: ResMut<RenderSettingsLoader>,
    mut store: ResMut<ParameterStore>,
    mut launch: ResMut<LaunchOptions>,
    mut load_requests: EventWriter<LoadRequest>,
    asset_server: Res<AssetServer>,
    settings_assets: Res<Assets<RenderSettings>>,
) {
    if settings_loader.applied {
        return;
    }
    let Some(handle) = settings_loader.handle.clone() else {
        return;
    };

    let mut settings = match settings_assets.get(&handle) {
        Some(settings) => {
            info!("✓ Render settings loaded from {}", RENDER_SETTINGS_PATH);
            settings.clone()
        }
        None => {
            if !matches!(asset_server.load_state(handle.id()), LoadState::Failed(_)) {
                return;
            }
            warn!(
                "Could not load {}, using default render settings",
                RENDER_SETTINGS_PATH
            );
            RenderSettings::default()
        }
    };
    settings_loader.applied = true;

    if let Some(target_fps) = launch.target_fps {
        settings.auto_optimise_fps = Some(target_fps);
    }
    if let Err(error) = settings.stream.validate() {
        warn!("Invalid stream settings ({}), using defaults", error);
        settings.stream = StreamConfig::default();
    }
    store.reset(settings.params, settings.ranges);
    commands.insert_resource(settings);

    if let Some(path) = launch.file.take() {
        load_requests.write(LoadRequest { path });
    }
}
