use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use constants::render_settings::FPS_NOTIFY_INTERVAL_SECS;

use crate::engine::core::app_state::{FpsText, StatusText};
use crate::engine::loading::progress::LoadingProgress;
use crate::engine::params::parameter_store::ParameterStore;
use crate::rpc::web_rpc::WebRpcInterface;

/// Smoothed frame rate from Bevy's frame time diagnostics.
pub fn smoothed_fps(diagnostics: &DiagnosticsStore) -> Option<f32> {
    diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|fps| fps.smoothed())
        .map(|value| value as f32)
}

pub fn fps_notification_system(
    mut rpc_interface: ResMut<WebRpcInterface>,
    diagnostics: Res<DiagnosticsStore>,
    mut last_send_time: Local<f32>,
    time: Res<Time>,
) {
    let current_time = time.elapsed_secs();
    if current_time - *last_send_time < FPS_NOTIFY_INTERVAL_SECS {
        return;
    }
    if let Some(fps) = smoothed_fps(&diagnostics) {
        rpc_interface.send_notification("fps_update", serde_json::json!({ "fps": fps }));
        *last_send_time = current_time;
    }
}

pub fn fps_text_update_system(
    diagnostics: Res<DiagnosticsStore>,
    mut query: Query<&mut Text, With<FpsText>>,
) {
    let Some(fps) = smoothed_fps(&diagnostics) else {
        return;
    };
    for mut text in &mut query {
        text.0 = format!("FPS: {fps:.1}");
    }
}

/// Native overlay with load status and the live parameters.
pub fn status_text_update_system(
    progress: Res<LoadingProgress>,
    store: Res<ParameterStore>,
    mut query: Query<&mut Text, With<StatusText>>,
) {
    if !progress.is_changed() && !store.is_changed() {
        return;
    }

    let load_line = match (&progress.source, &progress.error) {
        (_, Some(error)) => format!("Load failed: {error}"),
        (Some(source), None) => format!(
            "{source}: {:.0}% ({} points)",
            progress.progress * 100.0,
            progress.points_loaded
        ),
        (None, None) => "No point cloud loaded".to_string(),
    };
    let params = store.current();
    let mode = match store.target_fps() {
        Some(target) => format!("optimising to {target:.0} fps"),
        None => "manual".to_string(),
    };

    for mut text in &mut query {
        text.0 = format!(
            "{load_line}\ndepth {:.3}  size {:.1}  thinning {:.1}  [{mode}]",
            params.depth_threshold, params.point_size, params.thinning_factor
        );
    }
}
