//! Frame-rate driven tuning of the decimation parameters.

/// Sampling-window feedback controller over depth threshold and thinning.
pub mod feedback_controller;

/// Start/stop events, the per-frame driver and uniform synchronisation.
pub mod systems;
