use std::str::FromStr;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_YAW: f32 = -90.0;
pub const DEFAULT_PITCH: f32 = 0.0;
pub const DEFAULT_SPEED: f32 = 2.5;
pub const DEFAULT_SENSITIVITY: f32 = 0.1;
pub const DEFAULT_ZOOM: f32 = 45.0;

const PITCH_LIMIT: f32 = 89.0;
const MIN_ZOOM: f32 = 1.0;
const MAX_ZOOM: f32 = 45.0;
const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 100.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("invalid camera direction {0:?}; expected forward, backward, left or right")]
    InvalidDirection(String),
}

/// Direction of keyboard driven camera movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Movement {
    Forward,
    Backward,
    Left,
    Right,
}

impl TryFrom<u8> for Movement {
    type Error = CameraError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Forward),
            1 => Ok(Self::Backward),
            2 => Ok(Self::Left),
            3 => Ok(Self::Right),
            other => Err(CameraError::InvalidDirection(other.to_string())),
        }
    }
}

impl FromStr for Movement {
    type Err = CameraError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "forward" => Ok(Self::Forward),
            "backward" => Ok(Self::Backward),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            _ => Err(CameraError::InvalidDirection(name.to_string())),
        }
    }
}

/// First-person camera driven by Euler angles.
///
/// Angles are stored in degrees. The `front`, `right` and `up` vectors form an
/// orthonormal basis that is rebuilt whenever yaw or pitch changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    movement_speed: f32,
    mouse_sensitivity: f32,
    zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::Y, DEFAULT_YAW, DEFAULT_PITCH)
    }
}

impl Camera {
    pub fn new(position: Vec3, world_up: Vec3, yaw: f32, pitch: f32) -> Self {
        let mut camera = Self {
            position,
            front: Vec3::NEG_Z,
            up: world_up,
            right: Vec3::X,
            world_up,
            yaw,
            pitch,
            movement_speed: DEFAULT_SPEED,
            mouse_sensitivity: DEFAULT_SENSITIVITY,
            zoom: DEFAULT_ZOOM,
        };
        camera.update_vectors();
        camera
    }

    /// Creates a camera at `position` with the default orientation.
    pub fn at(position: Vec3) -> Self {
        Self::new(position, Vec3::Y, DEFAULT_YAW, DEFAULT_PITCH)
    }

    /// Look-at transform from the camera position along `front`.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Perspective projection using the current zoom as vertical field of view.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.zoom.to_radians(),
            aspect.max(0.01),
            NEAR_PLANE,
            FAR_PLANE,
        )
    }

    pub fn process_keyboard(&mut self, direction: Movement, delta_time: f32) {
        let velocity = self.movement_speed * delta_time;
        match direction {
            Movement::Forward => self.position += self.front * velocity,
            Movement::Backward => self.position -= self.front * velocity,
            Movement::Left => self.position -= self.right * velocity,
            Movement::Right => self.position += self.right * velocity,
        }
    }

    /// Applies movement from a raw direction code.
    ///
    /// Unknown codes are rejected before any state is touched.
    pub fn process_keyboard_code(&mut self, code: u8, delta_time: f32) -> Result<(), CameraError> {
        let direction = Movement::try_from(code)?;
        self.process_keyboard(direction, delta_time);
        Ok(())
    }

    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32, constrain_pitch: bool) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch += y_offset * self.mouse_sensitivity;

        // keeps the look-at transform away from the world-up singularity
        if constrain_pitch {
            self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }

        self.update_vectors();
    }

    pub fn process_mouse_scroll(&mut self, y_offset: f32) {
        self.zoom = (self.zoom - y_offset).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn world_up(&self) -> Vec3 {
        self.world_up
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn movement_speed(&self) -> f32 {
        self.movement_speed
    }

    pub fn mouse_sensitivity(&self) -> f32 {
        self.mouse_sensitivity
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_world_up(&mut self, world_up: Vec3) {
        self.world_up = world_up;
        self.update_vectors();
    }

    pub fn set_yaw(&mut self, yaw: f32) {
        self.yaw = yaw;
        self.update_vectors();
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch;
        self.update_vectors();
    }

    pub fn set_movement_speed(&mut self, speed: f32) {
        self.movement_speed = speed;
    }

    pub fn set_mouse_sensitivity(&mut self, sensitivity: f32) {
        self.mouse_sensitivity = sensitivity;
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
        // order matters: front x world_up, then right x front
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn assert_orthonormal(camera: &Camera) {
        let (f, r, u) = (camera.front(), camera.right(), camera.up());
        assert!(f.dot(r).abs() < EPS, "front.right = {}", f.dot(r));
        assert!(f.dot(u).abs() < EPS, "front.up = {}", f.dot(u));
        assert!(r.dot(u).abs() < EPS, "right.up = {}", r.dot(u));
        for v in [f, r, u] {
            assert!((v.length() - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = Camera::default();
        assert!((camera.front() - Vec3::NEG_Z).length() < EPS);
        assert!((camera.right() - Vec3::X).length() < EPS);
        assert!((camera.up() - Vec3::Y).length() < EPS);
        assert_eq!(camera.zoom(), DEFAULT_ZOOM);
    }

    #[test]
    fn basis_is_orthonormal_across_angles() {
        let mut camera = Camera::default();
        for yaw in (-360..=360).step_by(15) {
            for pitch in (-89..=89).step_by(7) {
                camera.set_yaw(yaw as f32);
                camera.set_pitch(pitch as f32);
                assert_orthonormal(&camera);
            }
        }
    }

    #[test]
    fn constrained_pitch_stays_in_range() {
        let mut camera = Camera::default();
        for step in 0..200 {
            let dy = if step % 3 == 0 { -1500.0 } else { 900.0 };
            camera.process_mouse_movement(13.0, dy, true);
            assert!(camera.pitch() <= 89.0 && camera.pitch() >= -89.0);
            assert_orthonormal(&camera);
        }
    }

    #[test]
    fn unconstrained_pitch_is_not_clamped() {
        let mut camera = Camera::default();
        camera.process_mouse_movement(0.0, 1000.0, false);
        assert!((camera.pitch() - 100.0).abs() < EPS);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut camera = Camera::default();
        for dy in [3.0, 100.0, -7.5, -200.0, 0.5, 44.0, -1.0] {
            camera.process_mouse_scroll(dy);
            assert!(camera.zoom() >= 1.0 && camera.zoom() <= 45.0);
        }
        camera.process_mouse_scroll(1000.0);
        assert_eq!(camera.zoom(), 1.0);
        camera.process_mouse_scroll(-1000.0);
        assert_eq!(camera.zoom(), 45.0);
    }

    #[test]
    fn keyboard_moves_along_basis() {
        let mut camera = Camera::at(Vec3::new(0.0, 0.0, 3.0));
        camera.process_keyboard(Movement::Forward, 2.0);
        assert!((camera.position() - Vec3::new(0.0, 0.0, -2.0)).length() < EPS);
        camera.process_keyboard(Movement::Right, 1.0);
        assert!((camera.position() - Vec3::new(2.5, 0.0, -2.0)).length() < EPS);
        camera.process_keyboard(Movement::Left, 1.0);
        camera.process_keyboard(Movement::Backward, 2.0);
        assert!((camera.position() - Vec3::new(0.0, 0.0, 3.0)).length() < EPS);
    }

    #[test]
    fn invalid_direction_leaves_camera_untouched() {
        let mut camera = Camera::at(Vec3::new(1.0, 2.0, 3.0));
        let before = camera.clone();
        let err = camera.process_keyboard_code(7, 1.0).unwrap_err();
        assert_eq!(err, CameraError::InvalidDirection("7".into()));
        assert_eq!(camera, before);

        camera.process_keyboard_code(0, 1.0).unwrap();
        assert_ne!(camera, before);
    }

    #[test]
    fn movement_names_parse() {
        assert_eq!("Forward".parse::<Movement>(), Ok(Movement::Forward));
        assert_eq!(" left ".parse::<Movement>(), Ok(Movement::Left));
        assert!("up".parse::<Movement>().is_err());
    }

    #[test]
    fn view_matrix_maps_target_onto_negative_z() {
        let camera = Camera::at(Vec3::new(0.0, 0.0, 3.0));
        let view = camera.view_matrix();
        let target = view.transform_point3(camera.position() + camera.front());
        assert!((target - Vec3::NEG_Z).length() < EPS);
    }
}
