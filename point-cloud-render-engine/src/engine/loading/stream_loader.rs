//! Frame-driven LAS streaming.
//!
//! A load request opens the file and plans its chunks. Every frame after
//! that, [`pump_stream`] advances the session by one tick and reports
//! progress to the host. Decoding runs on a worker pool on native builds
//! and inline on WASM.

use std::path::PathBuf;

use bevy::prelude::*;
use point_cloud_loader::{
    ChunkSource, DecodeWorkerPool, FileSource, LoadError, LoadResult, StreamConfig, StreamResult,
    StreamSession, StreamStep,
};

use crate::engine::assets::render_settings::RenderSettings;
use crate::engine::core::app_state::AppState;
use crate::engine::loading::point_cloud_creator::{PointCloudScene, despawn_point_chunks};
use crate::engine::loading::progress::LoadingProgress;
use crate::engine::mesh::point_chunk_mesh::PointChunk;
use crate::engine::params::parameter_store::ParameterStore;
use crate::rpc::web_rpc::WebRpcInterface;

pub type BoxedSource = Box<dyn ChunkSource + Send + Sync>;

/// Ask the engine to replace the current scene with the file at `path`.
#[derive(Event, Debug, Clone)]
pub struct LoadRequest {
    pub path: PathBuf,
}

/// What one pump of the loader produced.
#[derive(Debug)]
pub enum LoaderStep {
    Idle,
    Pending {
        progress: f32,
        chunks_completed: usize,
    },
    Finished(StreamResult),
}

#[derive(Resource, Default)]
pub struct StreamLoader {
    session: Option<StreamSession<BoxedSource>>,
}

impl StreamLoader {
    /// Start streaming `source`, cancelling any load already in flight.
    /// Returns the number of planned chunks.
    pub fn start(&mut self, source: BoxedSource, config: StreamConfig) -> LoadResult<usize> {
        self.cancel();
        let use_pool = cfg!(not(target_arch = "wasm32")) && config.max_workers > 1;
        let max_workers = config.max_workers;

        let mut session = StreamSession::open(source, config)?;
        if use_pool {
            session = session.with_pool(DecodeWorkerPool::new(max_workers)?);
        }
        let chunks = session.plans().len();
        self.session = Some(session);
        Ok(chunks)
    }

    pub fn cancel(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.cancel();
            info!("Cancelled in-flight load");
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.session.is_some()
    }

    /// Advance the active session by one tick.
    pub fn pump(&mut self) -> LoadResult<LoaderStep> {
        let Some(session) = self.session.as_mut() else {
            return Ok(LoaderStep::Idle);
        };

        match session.tick() {
            Ok(StreamStep::Pending { progress }) => Ok(LoaderStep::Pending {
                progress,
                chunks_completed: session.completed_chunks(),
            }),
            Ok(StreamStep::Finished) => match self.session.take() {
                Some(session) => Ok(LoaderStep::Finished(session.finish())),
                None => Ok(LoaderStep::Idle),
            },
            Err(error) => {
                self.session = None;
                Err(error)
            }
        }
    }
}

fn open_source(path: &std::path::Path) -> LoadResult<BoxedSource> {
    let source = FileSource::open(path).map_err(LoadError::Io)?;
    Ok(Box::new(source))
}

/// Start the most recent load request of this frame.
#[allow(clippy::too_many_arguments)]
pub fn handle_load_requests(
    mut requests: EventReader<LoadRequest>,
    mut commands: Commands,
    mut loader: ResMut<StreamLoader>,
    mut progress: ResMut<LoadingProgress>,
    mut scene: ResMut<PointCloudScene>,
    mut store: ResMut<ParameterStore>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    mut next_state: ResMut<NextState<AppState>>,
    settings: Res<RenderSettings>,
    chunks: Query<Entity, With<PointChunk>>,
) {
    let Some(request) = requests.read().last() else {
        return;
    };

    let source_name = request.path.display().to_string();
    info!("Loading point cloud from {}", source_name);

    // The previous scene is disposed before anything of the new one is drawn
    despawn_point_chunks(&mut commands, &chunks, &mut scene);
    if store.stop_optimisation() {
        info!("Stopped optimisation for the previous scene");
    }
    *progress = LoadingProgress::begin(source_name);

    let started =
        open_source(&request.path).and_then(|source| loader.start(source, settings.stream.clone()));
    match started {
        Ok(chunks_total) => {
            progress.chunks_total = chunks_total;
            rpc_interface.send_notification(
                "load_progress",
                serde_json::json!({
                    "progress": 0.0,
                    "chunks_completed": 0,
                    "chunks_total": chunks_total,
                }),
            );
            next_state.set(AppState::Loading);
        }
        Err(error) => fail_load(&error, &mut progress, &mut rpc_interface, &mut next_state),
    }
}

/// Drive the active stream by one tick per frame.
pub fn pump_stream(
    mut commands: Commands,
    mut loader: ResMut<StreamLoader>,
    mut progress: ResMut<LoadingProgress>,
    mut scene: ResMut<PointCloudScene>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    mut next_state: ResMut<NextState<AppState>>,
    chunks: Query<Entity, With<PointChunk>>,
) {
    match loader.pump() {
        Ok(LoaderStep::Idle) => {}
        Ok(LoaderStep::Pending {
            progress: fraction,
            chunks_completed,
        }) => {
            if progress.advance(fraction, chunks_completed) {
                send_load_progress(&mut rpc_interface, &progress);
            }
        }
        Ok(LoaderStep::Finished(result)) => {
            let total = progress.chunks_total;
            if progress.advance(1.0, total) {
                send_load_progress(&mut rpc_interface, &progress);
            }
            progress.points_loaded = result.total_points();
            progress.truncated = result.truncation.is_some();
            info!(
                "Streamed {} points in {} chunks",
                progress.points_loaded,
                result.chunks.len()
            );
            scene.begin(result);
            next_state.set(AppState::Populating);
        }
        Err(error) => {
            despawn_point_chunks(&mut commands, &chunks, &mut scene);
            fail_load(&error, &mut progress, &mut rpc_interface, &mut next_state);
        }
    }
}

fn send_load_progress(rpc_interface: &mut WebRpcInterface, progress: &LoadingProgress) {
    rpc_interface.send_notification(
        "load_progress",
        serde_json::json!({
            "progress": progress.progress,
            "chunks_completed": progress.chunks_completed,
            "chunks_total": progress.chunks_total,
        }),
    );
}

fn fail_load(
    error: &LoadError,
    progress: &mut LoadingProgress,
    rpc_interface: &mut WebRpcInterface,
    next_state: &mut NextState<AppState>,
) {
    let message = error.to_string();
    error!("Point cloud load failed: {}", message);
    rpc_interface.send_notification(
        "load_failed",
        serde_json::json!({
            "source": progress.source,
            "message": message,
        }),
    );
    progress.error = Some(message);
    next_state.set(AppState::Failed);
}
