use std::time::Duration;

use bevy::prelude::*;

use crate::engine::optimisation::feedback_controller::{
    ControllerConfig, ControllerEvent, FeedbackController,
};
use crate::engine::params::render_params::{ParamRanges, RenderParam, RenderParams};

/// Who may write the render parameters.
#[derive(Debug, Clone)]
enum Owner {
    /// Manual control. Parameter edits are accepted.
    Ui(RenderParams),
    /// An optimisation session owns the parameters until it completes or stops.
    Controller(Box<FeedbackController>),
}

/// Single writer for the live render parameters.
///
/// Starting an optimisation moves the parameters into the controller and
/// completion or cancellation moves them back, so manual edits and
/// controller steps can never interleave.
#[derive(Resource, Debug, Clone)]
pub struct ParameterStore {
    owner: Owner,
    ranges: ParamRanges,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(RenderParams::default(), ParamRanges::default())
    }
}

/// Outcome of feeding one frame to the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoreTick {
    Idle,
    Counting,
    Event(ControllerEvent),
}

impl ParameterStore {
    pub fn new(params: RenderParams, ranges: ParamRanges) -> Self {
        Self {
            owner: Owner::Ui(params.clamped(&ranges)),
            ranges,
        }
    }

    /// Parameters for the next frame, whoever owns them.
    pub fn current(&self) -> &RenderParams {
        match &self.owner {
            Owner::Ui(params) => params,
            Owner::Controller(controller) => controller.params(),
        }
    }

    pub fn ranges(&self) -> &ParamRanges {
        &self.ranges
    }

    pub fn is_optimising(&self) -> bool {
        matches!(self.owner, Owner::Controller(_))
    }

    pub fn target_fps(&self) -> Option<f32> {
        match &self.owner {
            Owner::Controller(controller) => Some(controller.target_fps()),
            Owner::Ui(_) => None,
        }
    }

    /// Set one parameter from the UI. Rejected while an optimisation runs.
    pub fn set(&mut self, param: RenderParam, value: f32) -> Option<f32> {
        match &mut self.owner {
            Owner::Ui(params) => Some(params.set(param, value, &self.ranges)),
            Owner::Controller(_) => None,
        }
    }

    /// Replace all parameters and ranges from loaded settings.
    /// Rejected while an optimisation runs.
    pub fn reset(&mut self, params: RenderParams, ranges: ParamRanges) -> bool {
        if self.is_optimising() {
            return false;
        }
        self.ranges = ranges;
        self.owner = Owner::Ui(params.clamped(&ranges));
        true
    }

    /// Hand the parameters to a new controller, stopping any running one first.
    pub fn start_optimisation(&mut self, target_fps: f32, config: ControllerConfig, now: Duration) {
        self.stop_optimisation();
        let params = *self.current();
        let controller = FeedbackController::start(target_fps, params, self.ranges, config, now);
        info!(
            "Optimisation started: target {:.1} fps from depth {:.3}, thinning {:.1}",
            controller.target_fps(),
            params.depth_threshold,
            params.thinning_factor
        );
        self.owner = Owner::Controller(Box::new(controller));
    }

    /// Take the parameters back from the controller, keeping its last values.
    /// Returns false when no optimisation was running.
    pub fn stop_optimisation(&mut self) -> bool {
        let Owner::Controller(controller) = &self.owner else {
            return false;
        };
        let params = *controller.params();
        self.owner = Owner::Ui(params);
        true
    }

    /// Feed one rendered frame to the running controller, if any.
    pub fn tick(&mut self, now: Duration) -> StoreTick {
        let Owner::Controller(controller) = &mut self.owner else {
            return StoreTick::Idle;
        };
        match controller.tick(now) {
            None => StoreTick::Counting,
            Some(event) => {
                if matches!(event, ControllerEvent::Completed { .. }) {
                    self.stop_optimisation();
                }
                StoreTick::Event(event)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_writes_are_rejected_while_optimising() {
        let mut store = ParameterStore::default();
        assert_eq!(store.set(RenderParam::PointSize, 1.5), Some(1.5));

        store.start_optimisation(60.0, ControllerConfig::default(), Duration::ZERO);
        assert!(store.is_optimising());
        assert_eq!(store.set(RenderParam::PointSize, 2.0), None);
        assert!(!store.reset(RenderParams::default(), ParamRanges::default()));
        assert_eq!(store.current().point_size, 1.5);

        assert!(store.stop_optimisation());
        assert!(!store.is_optimising());
        assert_eq!(store.set(RenderParam::PointSize, 2.0), Some(2.0));
    }

    #[test]
    fn stopped_session_no_longer_adjusts() {
        let mut store = ParameterStore::default();
        store.start_optimisation(60.0, ControllerConfig::default(), Duration::ZERO);
        store.stop_optimisation();
        let before = *store.current();

        for frame in 1..1_000u64 {
            assert_eq!(store.tick(Duration::from_millis(frame * 100)), StoreTick::Idle);
        }
        assert_eq!(*store.current(), before);
    }

    #[test]
    fn completion_returns_ownership_with_final_values() {
        let mut store = ParameterStore::default();
        store.start_optimisation(10.0, ControllerConfig::default(), Duration::ZERO);

        let mut completed = None;
        for frame in 1..=100u64 {
            // 10 fps, exactly on target
            if let StoreTick::Event(ControllerEvent::Completed { depth_threshold, .. }) =
                store.tick(Duration::from_millis(frame * 100))
            {
                completed = Some(depth_threshold);
                break;
            }
        }
        assert_eq!(completed, Some(RenderParams::default().depth_threshold));
        assert!(!store.is_optimising());
        assert!(store.set(RenderParam::DepthThreshold, 0.5).is_some());
    }

    #[test]
    fn restarting_replaces_the_running_session() {
        let mut store = ParameterStore::default();
        store.start_optimisation(30.0, ControllerConfig::default(), Duration::ZERO);
        store.start_optimisation(90.0, ControllerConfig::default(), Duration::from_secs(1));
        assert_eq!(store.target_fps(), Some(90.0));
    }
}
