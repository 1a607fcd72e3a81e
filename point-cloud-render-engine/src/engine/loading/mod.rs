//! Point cloud loading, from a load request to spawned chunk entities.
//!
//! Loading runs in two phases: the streamer reads and decodes the file one
//! tick per frame, then the decoded chunks are turned into meshes a few at
//! a time so a large file never stalls a single frame.

/// Scene extents, the queue of decoded chunks and chunk entity spawning.
///
/// Frames the camera and notifies the host once every chunk is on screen.
pub mod point_cloud_creator;

/// Load status resource reported to the host.
pub mod progress;

/// Load requests and the per-frame streaming pump.
pub mod stream_loader;
