use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;

/// Distance from the scene center, in multiples of its largest extent.
const FRAMING_DISTANCE: f32 = 1.5;

#[derive(Resource, Debug, Clone, PartialEq)]
pub struct ViewportCamera {
    pub position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    /// Base movement speed in scene units per second.
    pub move_speed: f32,
}

impl Default for ViewportCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 10.0),
            pitch: 0.0,
            yaw: 0.0,
            move_speed: 10.0,
        }
    }
}

impl ViewportCamera {
    /// Look at `center` from `max_dimension * 1.5` in front of it.
    pub fn framing(center: Vec3, max_dimension: f32) -> Self {
        let distance = (max_dimension * FRAMING_DISTANCE).max(1.0);
        Self {
            position: center + Vec3::Z * distance,
            pitch: 0.0,
            yaw: 0.0,
            move_speed: (max_dimension * 0.25).clamp(2.0, 500.0),
        }
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }
}

/// Fly camera: right-drag looks around, WASD/QE moves, wheel dollies.
pub fn camera_controller(
    mut camera_query: Query<&mut Transform, With<Camera3d>>,
    mut viewport_camera: ResMut<ViewportCamera>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: EventReader<MouseMotion>,
    mut scroll_events: EventReader<MouseWheel>,
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
) {
    let Ok(mut camera_transform) = camera_query.single_mut() else {
        return;
    };

    let mouse_delta: Vec2 = mouse_motion.read().map(|motion| motion.delta).sum();
    if mouse_button.pressed(MouseButton::Right) && mouse_delta != Vec2::ZERO {
        viewport_camera.yaw -= mouse_delta.x * 0.0035;
        viewport_camera.pitch = (viewport_camera.pitch - mouse_delta.y * 0.0030).clamp(-1.55, 1.55);
    }

    let scroll: f32 = scroll_events
        .read()
        .map(|event| match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y * 0.05,
        })
        .sum();
    if scroll.abs() > f32::EPSILON {
        let step = viewport_camera.forward() * scroll * viewport_camera.move_speed * 0.2;
        viewport_camera.position += step;
    }

    let mut move_input = Vec3::ZERO;
    if keyboard.pressed(KeyCode::KeyW) {
        move_input.z -= 1.0;
    }
    if keyboard.pressed(KeyCode::KeyS) {
        move_input.z += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyD) {
        move_input.x += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyA) {
        move_input.x -= 1.0;
    }
    if keyboard.pressed(KeyCode::KeyE) {
        move_input.y += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyQ) {
        move_input.y -= 1.0;
    }

    if move_input != Vec3::ZERO {
        let rotation = viewport_camera.rotation();
        let world_delta = rotation * Vec3::new(move_input.x, 0.0, move_input.z) + Vec3::Y * move_input.y;

        let mut speed = viewport_camera.move_speed;
        if keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]) {
            speed *= 3.5;
        }
        if keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]) {
            speed *= 0.25;
        }
        viewport_camera.position += world_delta.normalize_or_zero() * speed * time.delta_secs();
    }

    let lerp_speed = (12.0 * time.delta_secs()).min(1.0);
    camera_transform.translation = camera_transform
        .translation
        .lerp(viewport_camera.position, lerp_speed);
    camera_transform.rotation = camera_transform
        .rotation
        .slerp(viewport_camera.rotation(), lerp_speed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_looks_at_the_center() {
        let center = Vec3::new(5.0, 20.0, -20.0);
        let camera = ViewportCamera::framing(center, 40.0);

        assert_eq!(camera.position, Vec3::new(5.0, 20.0, 40.0));
        let to_center = (center - camera.position).normalize();
        assert!(camera.forward().dot(to_center) > 0.999);
    }

    #[test]
    fn degenerate_scenes_keep_a_minimum_distance() {
        let camera = ViewportCamera::framing(Vec3::ZERO, 0.0);
        assert_eq!(camera.position, Vec3::Z);
    }
}
