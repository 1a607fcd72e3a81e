pub mod assets;
pub mod camera;
pub mod core;
pub mod loading;
pub mod mesh;
pub mod optimisation;
pub mod params;
pub mod render;
pub mod systems;
