//! JSON-backed engine assets.
//!
//! Render settings are loaded through the asset server so the same file
//! works for native and WASM builds.

/// Initial render parameters, controller tuning, decimation budget and stream config.
pub mod render_settings;
