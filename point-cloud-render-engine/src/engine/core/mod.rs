//! Core application setup and state management.
//!
//! Handles application lifecycle, window configuration, state transitions,
//! and plugin initialisation for both native and WASM targets.

/// Application setup and plugin configuration for the Bevy engine.
///
/// Registers the point material, settings asset, loading pipeline,
/// optimiser and host bridge, plus platform-specific overlays.
pub mod app_setup;

/// Application state machine from idle through streaming and population to running.
pub mod app_state;

/// Platform-specific window configuration for native and WASM builds.
///
/// Configures canvas integration for web targets and present mode.
pub mod window_config;
