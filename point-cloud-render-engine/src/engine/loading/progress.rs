use bevy::prelude::*;
use serde::Serialize;

/// Status of the current (or last) load, reported to the host on request.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadingProgress {
    pub source: Option<String>,
    /// Fraction of planned chunks read and decoded, non-decreasing per load.
    pub progress: f32,
    pub chunks_completed: usize,
    pub chunks_total: usize,
    pub chunks_spawned: usize,
    pub points_loaded: u64,
    pub truncated: bool,
    pub error: Option<String>,
}

impl LoadingProgress {
    pub fn begin(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    /// Record streamer progress. Returns true when the reported value moved.
    pub fn advance(&mut self, progress: f32, chunks_completed: usize) -> bool {
        let progress = progress.clamp(self.progress, 1.0);
        let moved = progress > self.progress || chunks_completed > self.chunks_completed;
        self.progress = progress;
        self.chunks_completed = self.chunks_completed.max(chunks_completed);
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_never_moves_backwards() {
        let mut progress = LoadingProgress::begin("cloud.las");
        assert!(progress.advance(0.5, 2));
        assert!(!progress.advance(0.25, 1));
        assert_eq!(progress.progress, 0.5);
        assert_eq!(progress.chunks_completed, 2);
        assert!(progress.advance(1.0, 4));
        assert!(!progress.advance(1.0, 4));
    }
}
