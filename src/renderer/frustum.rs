use glam::{Mat4, Vec3, Vec4};

const PARALLEL_EPSILON: f32 = 1e-6;

/// `normal · p + d = 0`, normal of unit length pointing into the frustum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    fn from_row(coefficients: Vec4) -> Self {
        let normal = coefficients.truncate();
        let length = normal.length();
        if length <= f32::EPSILON {
            return Self::new(Vec3::ZERO, coefficients.w);
        }
        Self::new(normal / length, coefficients.w / length)
    }

    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    /// Line shared by two planes, as `(point, direction)`.
    pub fn intersect_plane(&self, other: &Plane) -> Option<(Vec3, Vec3)> {
        let direction = self.normal.cross(other.normal);
        let length_sq = direction.length_squared();
        if length_sq < PARALLEL_EPSILON {
            return None;
        }
        let h1 = -self.d;
        let h2 = -other.d;
        let point =
            (other.normal.cross(direction) * h1 + direction.cross(self.normal) * h2) / length_sq;
        Some((point, direction))
    }

    pub fn intersect_line(&self, point: Vec3, direction: Vec3) -> Option<Vec3> {
        let denom = self.normal.dot(direction);
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }
        let t = -self.distance(point) / denom;
        Some(point + direction * t)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrustumPlane {
    Right = 0,
    Left = 1,
    Bottom = 2,
    Top = 3,
    Far = 4,
    Near = 5,
}

/// Six-plane view volume. Planes are stored right, left, bottom, top, far,
/// near, so the near plane is tested last.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the planes of a `[0, 1]` depth-range view-projection matrix.
    pub fn from_view_projection(matrix: Mat4) -> Self {
        let r0 = matrix.row(0);
        let r1 = matrix.row(1);
        let r2 = matrix.row(2);
        let r3 = matrix.row(3);

        Self {
            planes: [
                Plane::from_row(r3 - r0),
                Plane::from_row(r3 + r0),
                Plane::from_row(r3 + r1),
                Plane::from_row(r3 - r1),
                Plane::from_row(r3 - r2),
                Plane::from_row(r2),
            ],
        }
    }

    pub fn plane(&self, which: FrustumPlane) -> &Plane {
        &self.planes[which as usize]
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// Returns 0 when the sphere is completely outside. Otherwise returns the
    /// distance of the sphere center from the near plane plus `radius`, which
    /// is always positive.
    pub fn sphere_distance(&self, center: Vec3, radius: f32) -> f32 {
        let mut distance = 0.0;
        for plane in &self.planes {
            distance = plane.distance(center);
            if distance <= -radius {
                return 0.0;
            }
        }
        distance + radius
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance(point) >= 0.0)
    }

    /// Corner points in the order BLF, BRF, BRN, BLN, TLF, TRF, TRN, TLN.
    ///
    /// Edges come from intersecting the side planes with near/far; the corners
    /// are those edges cut by the bottom and top planes. Line-plane cuts are
    /// used instead of line-line ones for accuracy.
    pub fn corners(&self) -> Option<[Vec3; 8]> {
        let left = self.plane(FrustumPlane::Left);
        let right = self.plane(FrustumPlane::Right);
        let bottom = self.plane(FrustumPlane::Bottom);
        let top = self.plane(FrustumPlane::Top);
        let far = self.plane(FrustumPlane::Far);
        let near = self.plane(FrustumPlane::Near);

        let edges = [
            left.intersect_plane(far)?,
            right.intersect_plane(far)?,
            right.intersect_plane(near)?,
            left.intersect_plane(near)?,
        ];

        let mut corners = [Vec3::ZERO; 8];
        for (index, (point, direction)) in edges.iter().enumerate() {
            corners[index] = bottom.intersect_line(*point, *direction)?;
            corners[index + 4] = top.intersect_line(*point, *direction)?;
        }
        Some(corners)
    }
}
