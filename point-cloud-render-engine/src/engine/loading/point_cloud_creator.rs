use std::collections::VecDeque;

use bevy::prelude::*;
use bevy::render::view::NoFrustumCulling;
use constants::streaming::SPAWN_CHUNKS_PER_FRAME;
use point_cloud_loader::{Bounds, Chunk, StreamResult};

use crate::engine::assets::render_settings::RenderSettings;
use crate::engine::camera::viewport_camera::ViewportCamera;
use crate::engine::core::app_state::AppState;
use crate::engine::loading::progress::LoadingProgress;
use crate::engine::mesh::point_chunk_mesh::{PointChunk, create_point_chunk_mesh};
use crate::engine::optimisation::systems::StartOptimisation;
use crate::engine::params::parameter_store::ParameterStore;
use crate::engine::render::decimation::{DecimationUniform, shader_point_offset};
use crate::engine::render::material::PointCloudMaterial;
use crate::rpc::web_rpc::WebRpcInterface;

/// LAS files are Z-up, the scene is Y-up.
pub fn las_to_scene() -> Transform {
    Transform::from_rotation(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2))
}

/// The loaded point cloud: scene extents plus chunks still waiting to be spawned.
#[derive(Resource, Debug, Default)]
pub struct PointCloudScene {
    /// Extents in file coordinates.
    pub bounds: Bounds,
    /// Subtracted from every decoded position.
    pub origin: [f64; 3],
    pub total_points: u64,
    pending: VecDeque<Chunk>,
}

impl PointCloudScene {
    pub fn begin(&mut self, result: StreamResult) {
        self.total_points = result.total_points();
        self.bounds = result.bounds;
        self.origin = result.origin;
        self.pending = result.chunks.into();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn pending_chunks(&self) -> usize {
        self.pending.len()
    }

    fn next_chunk(&mut self) -> Option<Chunk> {
        self.pending.pop_front()
    }

    /// Scene-space center and largest extent of the loaded points.
    pub fn framing(&self) -> Option<(Vec3, f32)> {
        if self.bounds.is_empty() {
            return None;
        }
        let (x, y, z) = self.bounds.center();
        let local = Vec3::new(
            (x - self.origin[0]) as f32,
            (y - self.origin[1]) as f32,
            (z - self.origin[2]) as f32,
        );
        Some((
            las_to_scene().transform_point(local),
            self.bounds.max_dimension() as f32,
        ))
    }
}

/// Remove every chunk entity and forget anything not yet spawned.
pub fn despawn_point_chunks(
    commands: &mut Commands,
    chunks: &Query<Entity, With<PointChunk>>,
    scene: &mut PointCloudScene,
) {
    let mut despawned = 0;
    for entity in chunks.iter() {
        commands.entity(entity).despawn();
        despawned += 1;
    }
    if despawned > 0 {
        info!("Disposed {} point chunks", despawned);
    }
    scene.clear();
}

/// Spawn a bounded number of decoded chunks per frame, then frame the camera
/// and hand over to the running state.
#[allow(clippy::too_many_arguments)]
pub fn spawn_point_chunks(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<PointCloudMaterial>>,
    mut scene: ResMut<PointCloudScene>,
    mut progress: ResMut<LoadingProgress>,
    mut viewport_camera: ResMut<ViewportCamera>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    mut next_state: ResMut<NextState<AppState>>,
    mut start_events: EventWriter<StartOptimisation>,
    store: Res<ParameterStore>,
    settings: Res<RenderSettings>,
) {
    for _ in 0..SPAWN_CHUNKS_PER_FRAME {
        let Some(chunk) = scene.next_chunk() else {
            break;
        };
        let point_offset = shader_point_offset(chunk.first_point);
        let decimation = DecimationUniform::new(
            &settings.decimation,
            store.current(),
            scene.total_points,
            point_offset,
        );

        commands.spawn((
            Mesh3d(meshes.add(create_point_chunk_mesh(&chunk))),
            MeshMaterial3d(materials.add(PointCloudMaterial { decimation })),
            las_to_scene(),
            PointChunk {
                index: progress.chunks_spawned,
                first_point: chunk.first_point,
                count: chunk.count,
            },
            // Decimation happens per vertex, so culling whole chunks buys nothing
            NoFrustumCulling,
        ));
        progress.chunks_spawned += 1;
    }

    if scene.pending_chunks() > 0 {
        return;
    }

    if let Some((center, max_dimension)) = scene.framing() {
        *viewport_camera = ViewportCamera::framing(center, max_dimension);
    }
    info!(
        "Point cloud ready: {} points in {} chunks",
        scene.total_points, progress.chunks_spawned
    );
    rpc_interface.send_notification(
        "load_complete",
        serde_json::json!({
            "source": progress.source,
            "points": scene.total_points,
            "chunks": progress.chunks_spawned,
            "truncated": progress.truncated,
            "bounds": {
                "min": scene.bounds.min(),
                "max": scene.bounds.max(),
            },
        }),
    );
    if let Some(target_fps) = settings.auto_optimise_fps {
        start_events.write(StartOptimisation { target_fps });
    }
    next_state.set(AppState::Running);
}

#[cfg(test)]
mod tests {
    use point_cloud_loader::synthetic::SyntheticLas;
    use point_cloud_loader::{MemorySource, StreamConfig, stream_chunks};

    use super::*;

    fn streamed(points: u64) -> StreamResult {
        let bytes = SyntheticLas::new(points).to_bytes();
        let config = StreamConfig {
            points_per_chunk: 64,
            recenter: true,
            ..StreamConfig::default()
        };
        stream_chunks(MemorySource::new(bytes), config, |_| {}).unwrap()
    }

    #[test]
    fn scene_queues_chunks_in_file_order() {
        let mut scene = PointCloudScene::default();
        scene.begin(streamed(200));

        assert_eq!(scene.total_points, 200);
        assert_eq!(scene.pending_chunks(), 4);
        let firsts: Vec<u64> = std::iter::from_fn(|| scene.next_chunk())
            .map(|chunk| chunk.first_point)
            .collect();
        assert_eq!(firsts, vec![0, 64, 128, 192]);
    }

    #[test]
    fn framing_is_relative_to_the_origin_and_y_up() {
        let mut scene = PointCloudScene::default();
        scene.bounds = Bounds::from_min_max([100.0, 200.0, 10.0], [110.0, 240.0, 30.0]);
        scene.origin = [100.0, 200.0, 0.0];

        let (center, max_dimension) = scene.framing().unwrap();
        assert_eq!(max_dimension, 40.0);
        // LAS (5, 20, 20) lands at scene (5, 20, -20)
        assert!((center - Vec3::new(5.0, 20.0, -20.0)).length() < 1e-4);
    }

    #[test]
    fn empty_scene_has_no_framing() {
        let mut scene = PointCloudScene::default();
        scene.begin(streamed(0));
        assert_eq!(scene.framing(), None);
        assert_eq!(scene.pending_chunks(), 0);
    }

    #[test]
    fn clear_drops_pending_chunks() {
        let mut scene = PointCloudScene::default();
        scene.begin(streamed(100));
        scene.clear();
        assert_eq!(scene.pending_chunks(), 0);
        assert_eq!(scene.total_points, 0);
    }
}
