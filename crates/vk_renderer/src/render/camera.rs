//! First-person camera
//!
//! Yaw/pitch angles in degrees drive the view direction; the projection is a
//! right-handed perspective with the Y axis flipped for Vulkan's inverted
//! clip-space Y.

use nalgebra::{Matrix4, Perspective3, Point3, Unit, Vector3};

const PITCH_LIMIT_DEG: f32 = 89.0;

pub struct Camera {
    pub position: Point3<f32>,
    /// Heading in degrees; -90 looks down the negative Z axis
    pub yaw: f32,
    /// Elevation in degrees, clamped to avoid gimbal flip at the poles
    pub pitch: f32,
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub move_speed: f32,
    pub mouse_sensitivity: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Point3::new(0.5, 0.5, 0.5),
            yaw: -90.0,
            pitch: 0.0,
            fov_y_deg: 45.0,
            near: 0.1,
            far: 10.0,
            move_speed: 1.5,
            mouse_sensitivity: 0.1,
        }
    }
}

impl Camera {
    /// Unit view direction derived from yaw and pitch
    pub fn forward(&self) -> Unit<Vector3<f32>> {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();
        Unit::new_normalize(Vector3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        ))
    }

    fn right(&self) -> Unit<Vector3<f32>> {
        Unit::new_normalize(self.forward().cross(&Vector3::y()))
    }

    /// Apply a mouse delta in screen pixels, clamping pitch
    pub fn apply_mouse(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.mouse_sensitivity;
        // Screen Y grows downward, pitch grows upward
        self.pitch = (self.pitch - dy * self.mouse_sensitivity)
            .clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);
    }

    pub fn move_forward(&mut self, dt: f32) {
        self.position += self.forward().into_inner() * self.move_speed * dt;
    }

    pub fn move_backward(&mut self, dt: f32) {
        self.position -= self.forward().into_inner() * self.move_speed * dt;
    }

    pub fn move_right(&mut self, dt: f32) {
        self.position += self.right().into_inner() * self.move_speed * dt;
    }

    pub fn move_left(&mut self, dt: f32) {
        self.position -= self.right().into_inner() * self.move_speed * dt;
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        let target = self.position + self.forward().into_inner();
        Matrix4::look_at_rh(&self.position, &target, &Vector3::y())
    }

    /// Perspective projection with Vulkan's clip-space Y pointing down
    pub fn projection(&self, aspect: f32) -> Matrix4<f32> {
        let mut proj =
            Perspective3::new(aspect, self.fov_y_deg.to_radians(), self.near, self.far)
                .to_homogeneous();
        proj[(1, 1)] *= -1.0;
        proj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_heading_looks_down_negative_z() {
        let camera = Camera::default();
        let forward = camera.forward();
        assert_relative_eq!(forward.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(forward.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(forward.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn pitch_clamps_at_the_poles() {
        let mut camera = Camera::default();
        camera.apply_mouse(0.0, -10_000.0);
        assert_relative_eq!(camera.pitch, 89.0);
        camera.apply_mouse(0.0, 10_000.0);
        assert_relative_eq!(camera.pitch, -89.0);
    }

    #[test]
    fn projection_flips_clip_space_y() {
        let camera = Camera::default();
        let proj = camera.projection(16.0 / 9.0);
        assert!(proj[(1, 1)] < 0.0);
    }

    #[test]
    fn moving_forward_advances_along_view_direction() {
        let mut camera = Camera::default();
        let start_z = camera.position.z;
        camera.move_forward(1.0);
        assert!(camera.position.z < start_z);
        assert_relative_eq!(camera.position.x, 0.5, epsilon = 1e-6);
    }
}
