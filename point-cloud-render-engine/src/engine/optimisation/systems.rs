use bevy::prelude::*;

use crate::engine::assets::render_settings::RenderSettings;
use crate::engine::loading::point_cloud_creator::PointCloudScene;
use crate::engine::mesh::point_chunk_mesh::PointChunk;
use crate::engine::optimisation::feedback_controller::{ControllerEvent, OptimisationProgress};
use crate::engine::params::parameter_store::{ParameterStore, StoreTick};
use crate::engine::render::decimation::{DecimationUniform, shader_point_offset};
use crate::engine::render::material::PointCloudMaterial;
use crate::rpc::web_rpc::WebRpcInterface;

#[derive(Event, Debug, Clone, Copy)]
pub struct StartOptimisation {
    pub target_fps: f32,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct StopOptimisation;

pub fn handle_optimisation_requests(
    mut starts: EventReader<StartOptimisation>,
    mut stops: EventReader<StopOptimisation>,
    mut store: ResMut<ParameterStore>,
    settings: Res<RenderSettings>,
    time: Res<Time>,
) {
    if stops.read().count() > 0 && store.stop_optimisation() {
        info!("Optimisation stopped at {:?}", store.current());
    }
    if let Some(request) = starts.read().last() {
        store.start_optimisation(request.target_fps, settings.controller, time.elapsed());
    }
}

/// Feed every rendered frame to the running controller and report each
/// closed sampling window to the host.
pub fn drive_optimisation(
    mut store: ResMut<ParameterStore>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    time: Res<Time>,
) {
    if !store.is_optimising() {
        return;
    }

    // Counting frames does not change the parameters
    let StoreTick::Event(event) = store.bypass_change_detection().tick(time.elapsed()) else {
        return;
    };
    store.set_changed();

    match event {
        ControllerEvent::Sampled(progress) => {
            debug!(
                "Optimisation sample: {:.1}/{:.1} fps, depth {:.3}, thinning {:.1}",
                progress.current_fps,
                progress.target_fps,
                progress.depth_threshold,
                progress.thinning_factor
            );
            rpc_interface.send_notification("optimisation_progress", progress_json(&progress));
        }
        ControllerEvent::Completed {
            depth_threshold,
            progress,
        } => {
            info!(
                "Optimisation complete at {:.1} fps with depth threshold {:.3}",
                progress.current_fps, depth_threshold
            );
            rpc_interface.send_notification("optimisation_progress", progress_json(&progress));
            rpc_interface.send_notification(
                "optimisation_complete",
                serde_json::json!({
                    "depth_threshold": depth_threshold,
                    "thinning_factor": progress.thinning_factor,
                    "fps": progress.current_fps,
                }),
            );
        }
    }
}

fn progress_json(progress: &OptimisationProgress) -> serde_json::Value {
    serde_json::to_value(progress).unwrap_or(serde_json::Value::Null)
}

/// Push the live parameters into every chunk material.
pub fn sync_decimation_uniforms(
    store: Res<ParameterStore>,
    settings: Res<RenderSettings>,
    scene: Res<PointCloudScene>,
    chunks: Query<(&PointChunk, &MeshMaterial3d<PointCloudMaterial>)>,
    mut materials: ResMut<Assets<PointCloudMaterial>>,
) {
    let params = store.current();
    for (chunk, material) in &chunks {
        let Some(material) = materials.get_mut(&material.0) else {
            continue;
        };
        material.decimation = DecimationUniform::new(
            &settings.decimation,
            params,
            scene.total_points,
            shader_point_offset(chunk.first_point),
        );
    }
}
