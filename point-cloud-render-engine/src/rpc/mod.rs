//! JSON-RPC 2.0 bridge between the viewer and its host page.
//!
//! On wasm the host posts requests to the canvas window with `postMessage`;
//! requests carrying an `id` get a response, requests without one run as
//! notifications. The engine pushes load, optimisation and frame-rate updates
//! back as notifications. Native builds keep the queues but never fill them.
//!
//! Errors use the standard codes (`-32601` unknown method, `-32602` bad
//! params) plus `-32000` for a valid request rejected in the current state,
//! such as `set_render_param` during an optimisation.
//!
//! ## Existing Methods
//!
//! ### Loading
//! - `load_file`: Stream a LAS file (`{ "path": ... }`), replacing the current scene
//! - `get_load_status`: Source, progress, chunk counts, points and last error
//!
//! ### Render Parameters
//! - `get_render_params`: Live parameters, their ranges and optimiser ownership
//! - `set_render_param`: Set `depth_threshold`, `point_size` or `thinning_factor`;
//!   rejected while an optimisation runs
//!
//! ### Optimisation
//! - `start_optimisation`: Tune depth threshold and thinning toward `target_fps`
//! - `stop_optimisation`: Stop tuning and keep the current values
//!
//! ### Diagnostics
//! - `get_fps`: Retrieve current frame rate
//!
//! ## Notifications
//!
//! - `load_progress`, `load_complete`, `load_failed`
//! - `optimisation_progress`, `optimisation_complete`
//! - `fps_update`

pub mod web_rpc;
