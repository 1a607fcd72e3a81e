//! Runtime systems for diagnostics and manual control.
//!
//! Provides FPS tracking for the host and native overlays, plus keyboard
//! shortcuts for the render parameters.

/// FPS tracking and notification systems for performance monitoring.
///
/// Sends frame rate updates to the frontend via RPC and updates native UI overlays.
pub mod fps_tracking;

/// Keyboard shortcuts that edit parameters or start and stop optimisation.
pub mod param_controls;
