use bevy::prelude::*;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum AppState {
    /// Nothing loaded yet.
    #[default]
    Idle,
    /// Streaming and decoding the file.
    Loading,
    /// Turning decoded chunks into entities.
    Populating,
    Running,
    /// The last load failed; the scene is empty.
    Failed,
}

#[derive(Component)]
pub struct FpsText;

#[derive(Component)]
pub struct StatusText;

pub fn log_loading_entered() {
    info!("→ Streaming point cloud");
}

pub fn log_populating_entered() {
    info!("→ Spawning point chunks");
}

pub fn log_running_entered() {
    info!("→ All chunks ready, rendering");
}

pub fn log_failed_entered() {
    info!("→ Load failed, waiting for a new request");
}
