//! Viewport camera for point cloud scene navigation.
//!
//! Frames a freshly loaded scene from its bounds and provides fly controls
//! with smoothed keyboard and mouse input.

/// Viewport camera resource, scene framing and controller system.
pub mod viewport_camera;
