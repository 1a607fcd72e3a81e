//! Depth-based point decimation.
//!
//! When the scene holds more points than the budget, points beyond a depth
//! cutoff keep only every `bucket`-th point index, where the bucket grows
//! with the thinning factor and with how far past the cutoff the point
//! lies. Points in front of the cutoff are kept and drawn larger the closer
//! they are. The same rule runs in `point_cloud.wgsl`.

use bevy::render::render_resource::ShaderType;
use constants::render_settings::{
    BUCKET_GROWTH, MAX_DEPTH_BUFFER_VALUE, MIN_DEPTH_BUFFER_VALUE, NEAR_POINT_SIZE_GAIN,
    POINTS_BUDGET,
};
use serde::{Deserialize, Serialize};

use crate::engine::params::render_params::RenderParams;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointVisibility {
    Kept { size: f32 },
    Dropped,
}

impl PointVisibility {
    pub fn is_kept(self) -> bool {
        matches!(self, PointVisibility::Kept { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimationRule {
    /// Points drawn without decimation.
    pub points_budget: u64,
    /// Normalized depth range the depth threshold maps onto.
    pub depth_band: [f32; 2],
    pub bucket_growth: f32,
    pub near_size_gain: f32,
}

impl Default for DecimationRule {
    fn default() -> Self {
        Self {
            points_budget: POINTS_BUDGET,
            depth_band: [MIN_DEPTH_BUFFER_VALUE, MAX_DEPTH_BUFFER_VALUE],
            bucket_growth: BUCKET_GROWTH,
            near_size_gain: NEAR_POINT_SIZE_GAIN,
        }
    }
}

impl DecimationRule {
    pub fn budget_ratio(&self, total_points: u64) -> f32 {
        total_points as f32 / self.points_budget.max(1) as f32
    }

    /// Decimation only applies once the scene exceeds the budget.
    pub fn is_active(&self, total_points: u64) -> bool {
        self.budget_ratio(total_points) > 1.0
    }

    pub fn depth_cutoff(&self, depth_threshold: f32) -> f32 {
        let [low, high] = self.depth_band;
        low + depth_threshold.clamp(0.0, 1.0) * (high - low)
    }

    /// Keep one point in `bucket` for a point at `depth` beyond `cutoff`.
    pub fn bucket_size(&self, depth: f32, cutoff: f32, thinning_factor: f32) -> u32 {
        let span = (1.0 - cutoff).max(f32::EPSILON);
        let excess = ((depth - cutoff) / span).clamp(0.0, 1.0);
        let bucket = 1.0 + thinning_factor.max(0.0) * self.bucket_growth * (1.0 + excess);
        (bucket.floor() as u32).max(1)
    }

    /// Decide whether point `index` at normalized `depth` is drawn, and how big.
    pub fn evaluate(
        &self,
        index: u32,
        depth: f32,
        params: &RenderParams,
        total_points: u64,
    ) -> PointVisibility {
        if !self.is_active(total_points) {
            return PointVisibility::Kept {
                size: params.point_size,
            };
        }

        let cutoff = self.depth_cutoff(params.depth_threshold);
        if depth > cutoff {
            let bucket = self.bucket_size(depth, cutoff, params.thinning_factor);
            if index % bucket == 0 {
                PointVisibility::Kept {
                    size: params.point_size,
                }
            } else {
                PointVisibility::Dropped
            }
        } else {
            PointVisibility::Kept {
                size: params.point_size + (1.0 - depth).max(0.0) * self.near_size_gain,
            }
        }
    }
}

/// Global point index as seen by the shader.
///
/// Indices wrap at 2^32, so clouds larger than that restart the thinning
/// pattern at each wrap.
pub fn shader_point_offset(first_point: u64) -> u32 {
    (first_point & u64::from(u32::MAX)) as u32
}

/// Per-chunk uniform consumed by `point_cloud.wgsl`.
#[derive(Debug, Clone, Copy, Default, PartialEq, ShaderType)]
pub struct DecimationUniform {
    pub depth_cutoff: f32,
    pub bucket_growth: f32,
    pub thinning_factor: f32,
    /// 1.0 when the scene exceeds the budget, 0.0 otherwise.
    pub active: f32,
    pub point_size: f32,
    pub near_size_gain: f32,
    /// Global index of the chunk's first point, added to the vertex index.
    pub point_offset: u32,
    pub _padding: u32,
}

impl DecimationUniform {
    pub fn new(
        rule: &DecimationRule,
        params: &RenderParams,
        total_points: u64,
        point_offset: u32,
    ) -> Self {
        Self {
            depth_cutoff: rule.depth_cutoff(params.depth_threshold),
            bucket_growth: rule.bucket_growth,
            thinning_factor: params.thinning_factor,
            active: if rule.is_active(total_points) { 1.0 } else { 0.0 },
            point_size: params.point_size,
            near_size_gain: rule.near_size_gain,
            point_offset,
            _padding: 0,
        }
    }
}
