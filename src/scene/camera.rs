use glam::{Mat4, Vec3};

/// Battlefield camera. The world is Z-up and right-handed.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }
    pub fn proj(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect, self.near, self.far)
    }
    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.proj(aspect) * self.view()
    }
    pub fn position(&self) -> Vec3 {
        self.eye
    }
    pub fn look_at(&self) -> Vec3 {
        self.target
    }

    /// Yaw around the world Z axis in degrees, 0 when looking along +Y.
    pub fn rotation_degrees(&self) -> f32 {
        let forward = self.target - self.eye;
        if forward.x.abs() < f32::EPSILON && forward.y.abs() < f32::EPSILON {
            return 0.0;
        }
        (-forward.x).atan2(forward.y).to_degrees()
    }

    /// Moves the eye along the view direction; negative values move away
    /// from the target.
    pub fn dolly(&mut self, amount: f32) {
        let forward = (self.target - self.eye).normalize_or_zero();
        self.eye += forward * amount;
        self.target += forward * amount;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, -30.0, 40.0),
            target: Vec3::ZERO,
            up: Vec3::Z,
            fov_y_radians: 60f32.to_radians(),
            near: 1.0,
            far: 200.0,
        }
    }
}
