use constants::render_settings::{
    DEFAULT_DEPTH_THRESHOLD, DEFAULT_POINT_SIZE, DEFAULT_THINNING_FACTOR, DEPTH_THRESHOLD_RANGE,
    DEPTH_THRESHOLD_STEP, POINT_SIZE_RANGE, POINT_SIZE_STEP, THINNING_FACTOR_RANGE,
    THINNING_FACTOR_STEP,
};
use serde::{Deserialize, Serialize};

/// Direction a controller moves a parameter in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32, step: f32) -> Self {
        Self { min, max, step }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    /// Move `value` one step and clamp it.
    ///
    /// Returns true when the result sits on the bound it was moving toward,
    /// meaning further steps in that direction cannot change it.
    pub fn step_toward(&self, value: &mut f32, direction: StepDirection) -> bool {
        let (delta, bound) = match direction {
            StepDirection::Up => (self.step, self.max),
            StepDirection::Down => (-self.step, self.min),
        };
        *value = self.clamp(*value + delta);
        (*value - bound).abs() <= f32::EPSILON * bound.abs().max(1.0)
    }
}

/// Live rendering parameters read by the point material every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParams {
    /// Position within the far depth band past which points are decimated.
    pub depth_threshold: f32,
    pub point_size: f32,
    /// How aggressively far points are thinned. Zero keeps every point.
    pub thinning_factor: f32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            depth_threshold: DEFAULT_DEPTH_THRESHOLD,
            point_size: DEFAULT_POINT_SIZE,
            thinning_factor: DEFAULT_THINNING_FACTOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderParam {
    DepthThreshold,
    PointSize,
    ThinningFactor,
}

impl RenderParam {
    pub const ALL: [RenderParam; 3] = [
        RenderParam::DepthThreshold,
        RenderParam::PointSize,
        RenderParam::ThinningFactor,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|param| param.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            RenderParam::DepthThreshold => "depth_threshold",
            RenderParam::PointSize => "point_size",
            RenderParam::ThinningFactor => "thinning_factor",
        }
    }
}

/// Allowed range and step of every parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamRanges {
    pub depth_threshold: ParamRange,
    pub point_size: ParamRange,
    pub thinning_factor: ParamRange,
}

impl Default for ParamRanges {
    fn default() -> Self {
        Self {
            depth_threshold: ParamRange::new(
                DEPTH_THRESHOLD_RANGE.0,
                DEPTH_THRESHOLD_RANGE.1,
                DEPTH_THRESHOLD_STEP,
            ),
            point_size: ParamRange::new(POINT_SIZE_RANGE.0, POINT_SIZE_RANGE.1, POINT_SIZE_STEP),
            thinning_factor: ParamRange::new(
                THINNING_FACTOR_RANGE.0,
                THINNING_FACTOR_RANGE.1,
                THINNING_FACTOR_STEP,
            ),
        }
    }
}

impl ParamRanges {
    pub fn get(&self, param: RenderParam) -> ParamRange {
        match param {
            RenderParam::DepthThreshold => self.depth_threshold,
            RenderParam::PointSize => self.point_size,
            RenderParam::ThinningFactor => self.thinning_factor,
        }
    }
}

impl RenderParams {
    pub fn get(&self, param: RenderParam) -> f32 {
        match param {
            RenderParam::DepthThreshold => self.depth_threshold,
            RenderParam::PointSize => self.point_size,
            RenderParam::ThinningFactor => self.thinning_factor,
        }
    }

    /// Set a parameter, clamped to its range. Returns the stored value.
    pub fn set(&mut self, param: RenderParam, value: f32, ranges: &ParamRanges) -> f32 {
        let value = ranges.get(param).clamp(value);
        match param {
            RenderParam::DepthThreshold => self.depth_threshold = value,
            RenderParam::PointSize => self.point_size = value,
            RenderParam::ThinningFactor => self.thinning_factor = value,
        }
        value
    }

    /// Clamp every parameter into `ranges`.
    pub fn clamped(mut self, ranges: &ParamRanges) -> Self {
        for param in RenderParam::ALL {
            self.set(param, self.get(param), ranges);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_reports_saturation_only_at_target_bound() {
        let range = ParamRange::new(0.0, 1.0, 0.4);
        let mut value = 0.5;

        assert!(!range.step_toward(&mut value, StepDirection::Up));
        assert!((value - 0.9).abs() < 1e-6);
        assert!(range.step_toward(&mut value, StepDirection::Up));
        assert_eq!(value, 1.0);
        assert!(!range.step_toward(&mut value, StepDirection::Down));
    }

    #[test]
    fn set_clamps_into_range() {
        let ranges = ParamRanges::default();
        let mut params = RenderParams::default();

        assert_eq!(params.set(RenderParam::PointSize, 10.0, &ranges), 4.0);
        assert_eq!(params.set(RenderParam::ThinningFactor, -3.0, &ranges), 0.0);
        assert_eq!(params.point_size, 4.0);
        assert_eq!(params.get(RenderParam::ThinningFactor), 0.0);
    }

    #[test]
    fn names_round_trip() {
        for param in RenderParam::ALL {
            assert_eq!(RenderParam::from_name(param.name()), Some(param));
        }
        assert_eq!(RenderParam::from_name("gamma"), None);
    }

    #[test]
    fn defaults_sit_inside_their_ranges() {
        let params = RenderParams::default();
        assert_eq!(params.clamped(&ParamRanges::default()), params);
    }
}
