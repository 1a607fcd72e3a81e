//! Frame-rate feedback controller.
//!
//! Frames are counted over fixed sampling windows. At the end of each window
//! the measured rate is compared with the target and one parameter is nudged
//! by a single step: the depth threshold first, then the thinning factor once
//! the depth threshold has converged. The session ends when the rate is
//! within the deadband or both parameters can move no further.

use std::time::Duration;

use constants::render_settings::{FPS_DEADBAND, PROGRESS_SMOOTHING, SAMPLE_INTERVAL_MS};
use serde::{Deserialize, Serialize};

use crate::engine::params::render_params::{ParamRanges, RenderParams, StepDirection};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub sample_interval_ms: u64,
    /// Relative distance from the target treated as on target.
    pub fps_deadband: f32,
    /// Relative error at which reported progress reaches zero.
    pub progress_smoothing: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: SAMPLE_INTERVAL_MS,
            fps_deadband: FPS_DEADBAND,
            progress_smoothing: PROGRESS_SMOOTHING,
        }
    }
}

impl ControllerConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }
}

/// Snapshot reported after every sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimisationProgress {
    pub current_fps: f32,
    pub target_fps: f32,
    /// Closeness to the target in `[0, 1]`.
    pub progress: f32,
    pub depth_threshold: f32,
    pub thinning_factor: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerEvent {
    Sampled(OptimisationProgress),
    Completed {
        depth_threshold: f32,
        progress: OptimisationProgress,
    },
}

#[derive(Debug, Clone)]
pub struct FeedbackController {
    target_fps: f32,
    current_fps: f32,
    params: RenderParams,
    ranges: ParamRanges,
    config: ControllerConfig,
    depth_converged: bool,
    thinning_converged: bool,
    window_start: Duration,
    frame_count: u32,
    completed: bool,
}

impl FeedbackController {
    pub fn start(
        target_fps: f32,
        params: RenderParams,
        ranges: ParamRanges,
        config: ControllerConfig,
        now: Duration,
    ) -> Self {
        Self {
            target_fps: target_fps.max(1.0),
            current_fps: 0.0,
            params: params.clamped(&ranges),
            ranges,
            config,
            depth_converged: false,
            thinning_converged: false,
            window_start: now,
            frame_count: 0,
            completed: false,
        }
    }

    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    pub fn target_fps(&self) -> f32 {
        self.target_fps
    }

    /// Record one rendered frame at `now`.
    ///
    /// Returns an event when a sampling window closes. Every call counts as a
    /// frame, even when the clock has not moved since the last one.
    pub fn tick(&mut self, now: Duration) -> Option<ControllerEvent> {
        if self.completed {
            return None;
        }
        self.frame_count += 1;

        let elapsed = now.saturating_sub(self.window_start);
        if elapsed < self.config.sample_interval() {
            return None;
        }

        self.current_fps = self.frame_count as f32 / elapsed.as_secs_f32();
        self.frame_count = 0;
        self.window_start = now;

        self.adjust();
        let progress = self.snapshot();

        let stable = self.within_deadband();
        if stable || (self.depth_converged && self.thinning_converged) {
            self.completed = true;
            return Some(ControllerEvent::Completed {
                depth_threshold: self.params.depth_threshold,
                progress,
            });
        }
        Some(ControllerEvent::Sampled(progress))
    }

    fn within_deadband(&self) -> bool {
        (self.current_fps - self.target_fps).abs() < self.target_fps * self.config.fps_deadband
    }

    fn adjust(&mut self) {
        let on_target = self.within_deadband();
        let too_slow = self.current_fps < self.target_fps;

        if !self.depth_converged {
            // A lower threshold moves the decimation cutoff closer to the camera
            let direction = if too_slow {
                StepDirection::Down
            } else {
                StepDirection::Up
            };
            self.depth_converged = on_target
                || self
                    .ranges
                    .depth_threshold
                    .step_toward(&mut self.params.depth_threshold, direction);
            if !self.depth_converged {
                return;
            }
        }

        if !self.thinning_converged {
            let direction = if too_slow {
                StepDirection::Up
            } else {
                StepDirection::Down
            };
            self.thinning_converged = on_target
                || self
                    .ranges
                    .thinning_factor
                    .step_toward(&mut self.params.thinning_factor, direction);
        }
    }

    fn snapshot(&self) -> OptimisationProgress {
        let error = (self.current_fps - self.target_fps).abs();
        let progress =
            (1.0 - error / (self.target_fps * self.config.progress_smoothing)).clamp(0.0, 1.0);
        OptimisationProgress {
            current_fps: self.current_fps,
            target_fps: self.target_fps,
            progress,
            depth_threshold: self.params.depth_threshold,
            thinning_factor: self.params.thinning_factor,
        }
    }
}
