pub mod las_layout;
pub mod render_settings;
pub mod streaming;
