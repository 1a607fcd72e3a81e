use bevy::asset::AssetMetaCheck;
use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::prelude::*;
use bevy_common_assets::json::JsonAssetPlugin;

use crate::engine::assets::render_settings::{
    LaunchOptions, RenderSettings, RenderSettingsLoader, apply_render_settings,
    start_settings_load,
};
use crate::engine::camera::viewport_camera::{ViewportCamera, camera_controller};
use crate::engine::core::app_state::{
    AppState, FpsText, StatusText, log_failed_entered, log_loading_entered,
    log_populating_entered, log_running_entered,
};
use crate::engine::core::window_config::create_window_config;
use crate::engine::loading::point_cloud_creator::{PointCloudScene, spawn_point_chunks};
use crate::engine::loading::progress::LoadingProgress;
use crate::engine::loading::stream_loader::{
    LoadRequest, StreamLoader, handle_load_requests, pump_stream,
};
use crate::engine::optimisation::systems::{
    StartOptimisation, StopOptimisation, drive_optimisation, handle_optimisation_requests,
    sync_decimation_uniforms,
};
use crate::engine::params::parameter_store::ParameterStore;
use crate::engine::render::material::PointCloudMaterial;
use crate::engine::systems::fps_tracking::{
    fps_notification_system, fps_text_update_system, status_text_update_system,
};
use crate::rpc::web_rpc::WebRpcPlugin;

#[cfg(not(target_arch = "wasm32"))]
use crate::engine::systems::param_controls::keyboard_param_controls;

pub fn create_app(launch: LaunchOptions) -> App {
    let mut app = App::new();

    app.add_plugins(create_default_plugins())
        .init_state::<AppState>()
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        // Quads are expanded in the vertex shader, which the prepass would skip
        .add_plugins(MaterialPlugin::<PointCloudMaterial> {
            prepass_enabled: false,
            shadows_enabled: false,
            ..default()
        })
        // Registers RenderSettings as a loadable asset type from JSON files.
        .add_plugins(JsonAssetPlugin::<RenderSettings>::new(&["json"]))
        .add_plugins(WebRpcPlugin);

    app.insert_resource(launch)
        .init_resource::<RenderSettings>()
        .init_resource::<RenderSettingsLoader>()
        .init_resource::<ParameterStore>()
        .init_resource::<LoadingProgress>()
        .init_resource::<StreamLoader>()
        .init_resource::<PointCloudScene>()
        .init_resource::<ViewportCamera>()
        .add_event::<LoadRequest>()
        .add_event::<StartOptimisation>()
        .add_event::<StopOptimisation>();

    app.add_systems(Startup, (setup, start_settings_load))
        .add_systems(OnEnter(AppState::Loading), log_loading_entered)
        .add_systems(OnEnter(AppState::Populating), log_populating_entered)
        .add_systems(OnEnter(AppState::Running), log_running_entered)
        .add_systems(OnEnter(AppState::Failed), log_failed_entered);

    // Requests are accepted in every state; a new load replaces the current one.
    app.add_systems(
        Update,
        (apply_render_settings, handle_load_requests).chain(),
    )
    .add_systems(
        Update,
        pump_stream
            .after(handle_load_requests)
            .run_if(in_state(AppState::Loading)),
    )
    .add_systems(
        Update,
        spawn_point_chunks.run_if(in_state(AppState::Populating)),
    );

    // Optimisation only measures frames once the whole scene is drawn.
    app.add_systems(
        Update,
        (
            handle_optimisation_requests,
            drive_optimisation.run_if(in_state(AppState::Running)),
            sync_decimation_uniforms.run_if(
                resource_changed::<ParameterStore>.or(resource_changed::<RenderSettings>),
            ),
        )
            .chain()
            .after(spawn_point_chunks),
    );

    app.add_systems(
        Update,
        (camera_controller, fps_notification_system),
    );

    #[cfg(not(target_arch = "wasm32"))]
    {
        app.add_systems(
            Update,
            (
                fps_text_update_system,
                status_text_update_system,
                keyboard_param_controls.before(handle_optimisation_requests),
            ),
        );
    }

    app
}

fn spawn_camera(commands: &mut Commands) {
    let viewport_camera = ViewportCamera::default();
    commands.spawn((
        Camera3d::default(),
        Transform::from_translation(viewport_camera.position)
            .with_rotation(viewport_camera.rotation()),
    ));
}

fn setup(mut commands: Commands) {
    commands.insert_resource(ClearColor(Color::srgb(0.05, 0.05, 0.07)));
    spawn_camera(&mut commands);

    #[cfg(not(target_arch = "wasm32"))]
    {
        create_native_overlays(&mut commands);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn create_native_overlays(commands: &mut Commands) {
    commands
        .spawn(Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                Text::new("FPS: "),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(Color::srgb(1., 0., 0.)),
                Node {
                    position_type: PositionType::Absolute,
                    bottom: Val::Px(12.0),
                    right: Val::Px(12.0),
                    ..default()
                },
                FpsText,
            ));
            parent.spawn((
                Text::new("No point cloud loaded"),
                TextFont {
                    font_size: 14.0,
                    ..default()
                },
                TextColor(Color::srgb(0.9, 0.9, 0.9)),
                Node {
                    position_type: PositionType::Absolute,
                    top: Val::Px(12.0),
                    left: Val::Px(12.0),
                    ..default()
                },
                StatusText,
            ));
        });
}

fn create_default_plugins() -> impl PluginGroup {
    let window_config = WindowPlugin {
        primary_window: Some(create_window_config()),
        ..default()
    };

    let asset_config = AssetPlugin {
        meta_check: AssetMetaCheck::Never,
        ..default()
    };

    DefaultPlugins.set(window_config).set(asset_config)
}
