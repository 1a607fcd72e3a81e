//! Live render parameters and their single-writer store.

/// Single owner of the live parameters, UI or controller.
pub mod parameter_store;

/// Parameter values, ranges and names.
pub mod render_params;
