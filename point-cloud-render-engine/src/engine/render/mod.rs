//! Point rendering: the decimation rule and the material that applies it on the GPU.

/// Depth-based decimation rule and its shader uniform.
pub mod decimation;

/// Material binding the decimation uniform to `point_cloud.wgsl`.
pub mod material;
