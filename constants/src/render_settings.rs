/// Total points the renderer draws without decimation.
pub const POINTS_BUDGET: u64 = 4_000_000;

/// Normalized depth band the depth threshold is mapped onto. Perspective depth
/// packs almost the whole scene into this narrow range near 1.
pub const MIN_DEPTH_BUFFER_VALUE: f32 = 0.999_755;
pub const MAX_DEPTH_BUFFER_VALUE: f32 = 1.0;

/// Bucket growth per unit of thinning factor for far points.
pub const BUCKET_GROWTH: f32 = 10.0;
/// Extra size given to near points, scaled by their distance from the far plane.
pub const NEAR_POINT_SIZE_GAIN: f32 = 1000.0;

pub const DEFAULT_DEPTH_THRESHOLD: f32 = 0.92;
pub const DEFAULT_POINT_SIZE: f32 = 0.6;
pub const DEFAULT_THINNING_FACTOR: f32 = 2.0;

pub const DEPTH_THRESHOLD_RANGE: (f32, f32) = (0.0, 1.0);
pub const DEPTH_THRESHOLD_STEP: f32 = 0.01;
pub const POINT_SIZE_RANGE: (f32, f32) = (0.3, 4.0);
pub const POINT_SIZE_STEP: f32 = 0.1;
pub const THINNING_FACTOR_RANGE: (f32, f32) = (0.0, 5.0);
pub const THINNING_FACTOR_STEP: f32 = 1.0;

/// Length of one frame-rate sampling window.
pub const SAMPLE_INTERVAL_MS: u64 = 1500;
/// Relative distance from the target frame rate treated as on target.
pub const FPS_DEADBAND: f32 = 0.05;
/// Relative error at which reported progress reaches zero.
pub const PROGRESS_SMOOTHING: f32 = 0.5;

/// Seconds between frame-rate notifications.
pub const FPS_NOTIFY_INTERVAL_SECS: f32 = 0.5;
