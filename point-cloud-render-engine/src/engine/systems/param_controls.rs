use bevy::prelude::*;

use crate::engine::optimisation::systems::{StartOptimisation, StopOptimisation};
use crate::engine::params::parameter_store::ParameterStore;
use crate::engine::params::render_params::RenderParam;

/// Default optimisation target for the keyboard shortcut.
const KEYBOARD_TARGET_FPS: f32 = 60.0;

/// Keys that nudge each parameter down and up by one step.
const PARAM_KEYS: [(RenderParam, KeyCode, KeyCode); 3] = [
    (RenderParam::DepthThreshold, KeyCode::BracketLeft, KeyCode::BracketRight),
    (RenderParam::PointSize, KeyCode::Comma, KeyCode::Period),
    (RenderParam::ThinningFactor, KeyCode::Minus, KeyCode::Equal),
];

/// Native parameter shortcuts. Edits are ignored while an optimisation runs.
pub fn keyboard_param_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut store: ResMut<ParameterStore>,
    mut starts: EventWriter<StartOptimisation>,
    mut stops: EventWriter<StopOptimisation>,
) {
    if keyboard.just_pressed(KeyCode::KeyO) {
        starts.write(StartOptimisation {
            target_fps: KEYBOARD_TARGET_FPS,
        });
    }
    if keyboard.just_pressed(KeyCode::KeyP) {
        stops.write(StopOptimisation);
    }

    for (param, down, up) in PARAM_KEYS {
        let direction = if keyboard.just_pressed(down) {
            -1.0
        } else if keyboard.just_pressed(up) {
            1.0
        } else {
            continue;
        };
        let range = store.ranges().get(param);
        let value = store.current().get(param) + direction * range.step;
        match store.set(param, value) {
            Some(value) => info!("{} = {:.3}", param.name(), value),
            None => warn!("{} is owned by the optimiser, press P to stop it", param.name()),
        }
    }
}
