use glam::{Mat4, Vec3};

use super::frustum::Frustum;
use crate::scene::Camera;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Screen-space rectangle in pixels, origin at the top-left of the viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Per-frame camera matrices and the frustum derived from them.
#[derive(Clone, Copy, Debug)]
pub struct GameMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub frustum: Frustum,
    pub viewport: Viewport,
    pub fov_y_radians: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub camera_position: Vec3,
    pub look_at: Vec3,
}

impl GameMatrices {
    pub fn new(camera: &Camera, viewport: Viewport) -> Self {
        let aspect = viewport.aspect();
        let view = camera.view();
        let projection = camera.proj(aspect);
        Self {
            view,
            projection,
            frustum: Frustum::from_view_projection(projection * view),
            viewport,
            fov_y_radians: camera.fov_y_radians,
            aspect,
            near: camera.near,
            far: camera.far,
            camera_position: camera.eye,
            look_at: camera.target,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Projection with the same side planes but the given depth range.
    pub fn projection_with_range(&self, near: f32, far: f32) -> Mat4 {
        let near = near.max(f32::EPSILON);
        let far = far.max(near + 1e-3);
        Mat4::perspective_rh(self.fov_y_radians, self.aspect, near, far)
    }

    /// Frustum of the camera restricted to `near..far` along the view axis.
    pub fn frustum_with_range(&self, near: f32, far: f32) -> Frustum {
        Frustum::from_view_projection(self.projection_with_range(near, far) * self.view)
    }

    /// Camera right and up vectors in world space, taken from the view
    /// matrix rows.
    pub fn billboard_axes(&self) -> (Vec3, Vec3, Vec3) {
        let right = self.view.row(0).truncate();
        let up = self.view.row(1).truncate();
        let back = self.view.row(2).truncate();
        (right, up, back)
    }

    /// Frustum that only covers `rect` of the viewport.
    pub fn pick_frustum(&self, rect: PickRect) -> Frustum {
        let viewport_w = self.viewport.width.max(1) as f32;
        let viewport_h = self.viewport.height.max(1) as f32;
        let width = rect.width.abs().max(1.0);
        let height = rect.height.abs().max(1.0);

        let center_x = rect.x + rect.width * 0.5 - self.viewport.x as f32;
        let center_y = rect.y + rect.height * 0.5 - self.viewport.y as f32;
        let ndc_x = 2.0 * center_x / viewport_w - 1.0;
        let ndc_y = 1.0 - 2.0 * center_y / viewport_h;

        let pick = Mat4::from_scale(Vec3::new(viewport_w / width, viewport_h / height, 1.0))
            * Mat4::from_translation(Vec3::new(-ndc_x, -ndc_y, 0.0));
        Frustum::from_view_projection(pick * self.view_projection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrices() -> GameMatrices {
        let camera = Camera {
            eye: Vec3::new(0.0, -20.0, 20.0),
            target: Vec3::ZERO,
            ..Camera::default()
        };
        GameMatrices::new(&camera, Viewport::new(800, 600))
    }

    #[test]
    fn pick_frustum_of_whole_viewport_matches_view_frustum() {
        let m = matrices();
        let pick = m.pick_frustum(PickRect {
            x: 0.0,
            y: 0.0,
            width: 800.0,
            height: 600.0,
        });
        let center = m.look_at;
        assert!(pick.sphere_distance(center, 0.5) > 0.0);
        assert!(m.frustum.sphere_distance(center, 0.5) > 0.0);
    }

    #[test]
    fn pick_frustum_excludes_points_outside_rect() {
        let m = matrices();
        // top-left corner only; the look-at point projects to the center
        let pick = m.pick_frustum(PickRect {
            x: 0.0,
            y: 0.0,
            width: 40.0,
            height: 40.0,
        });
        assert_eq!(pick.sphere_distance(m.look_at, 0.1), 0.0);
    }

    #[test]
    fn billboard_axes_are_orthonormal() {
        let (right, up, back) = matrices().billboard_axes();
        assert!((right.length() - 1.0).abs() < 1e-4);
        assert!(right.dot(up).abs() < 1e-4);
        assert!(up.dot(back).abs() < 1e-4);
    }
}
