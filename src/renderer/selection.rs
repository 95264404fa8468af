use glam::{Mat4, Vec3, Vec4};
use hecs::World;

use super::draw::{DrawBackend, DrawCommand, LineVertex};
use super::visibility::RenderItem;
use crate::scene::{ItemBody, Selected, UnitStatus};

/// Number of distinct health bar lengths.
pub const POWER_LEVELS: u32 = 15;

const BRACKET_LENGTH: f32 = 0.3;
const BRACKET_COLOR: Vec4 = Vec4::new(0.9, 0.9, 0.9, 1.0);
const BAR_LIFT: f32 = 0.1;

/// Health bar level in `0..POWER_LEVELS`.
pub fn power_level(health_factor: f32) -> u32 {
    let top = (POWER_LEVELS - 1) as f32;
    (top * health_factor.clamp(0.0, 1.0)) as u32
}

fn bar_color(level: u32) -> Vec4 {
    let t = level as f32 / (POWER_LEVELS - 1) as f32;
    Vec4::new(1.0 - t, t, 0.0, 1.0)
}

/// Corner brackets around the unit box `[-0.5, 0.5]² × [0, 1]`, plus the
/// health bar along the top front edge. Local coordinates.
fn indicator_lines(level: Option<u32>) -> Vec<LineVertex> {
    let s = BRACKET_LENGTH;
    let mut lines = Vec::with_capacity(56);
    let mut push = |a: Vec3, b: Vec3, color: Vec4| {
        lines.push(LineVertex { position: a, color });
        lines.push(LineVertex { position: b, color });
    };

    for &z in &[0.0f32, 1.0] {
        for &(x, y) in &[(-0.5f32, -0.5f32), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            let corner = Vec3::new(x, y, z);
            let inward_x = Vec3::new(-x.signum() * s, 0.0, 0.0);
            let inward_y = Vec3::new(0.0, -y.signum() * s, 0.0);
            let inward_z = Vec3::new(0.0, 0.0, if z > 0.5 { -s } else { s });
            push(corner, corner + inward_x, BRACKET_COLOR);
            push(corner, corner + inward_y, BRACKET_COLOR);
            push(corner, corner + inward_z, BRACKET_COLOR);
        }
    }

    if let Some(level) = level {
        let length = level as f32 / (POWER_LEVELS - 1) as f32;
        let z = 1.0 + BAR_LIFT;
        let start = Vec3::new(-0.5, -0.5, z);
        push(start, start + Vec3::new(length, 0.0, 0.0), bar_color(level));
    }
    lines
}

/// Transform from the local indicator box to the world.
pub fn indicator_matrix(body: &ItemBody, camera_rotation: Option<f32>) -> Mat4 {
    let rotation = camera_rotation
        .map(|degrees| Mat4::from_rotation_z(degrees.to_radians()))
        .unwrap_or(Mat4::IDENTITY);
    Mat4::from_translation(body.center) * rotation * Mat4::from_scale(body.size)
}

/// World-space indicator lines for one item.
pub fn selection_lines(
    body: &ItemBody,
    unit: Option<&UnitStatus>,
    camera_rotation: Option<f32>,
) -> Vec<LineVertex> {
    let matrix = indicator_matrix(body, camera_rotation);
    let level = unit.map(|unit| power_level(unit.health_factor()));
    let mut lines = indicator_lines(level);
    for vertex in &mut lines {
        vertex.position = matrix.transform_point3(vertex.position);
    }
    lines
}

/// Draws indicators for every selected item of `items`. Returns the number
/// of indicators drawn.
pub fn draw_selections(
    backend: &mut dyn DrawBackend,
    world: &World,
    items: &[RenderItem],
    camera_rotation: Option<f32>,
) -> usize {
    let mut lines = Vec::new();
    let mut drawn = 0;
    for item in items {
        let Ok(mut query) =
            world.query_one::<(&ItemBody, Option<&UnitStatus>, &Selected)>(item.entity)
        else {
            continue;
        };
        if let Some((body, unit, _)) = query.get() {
            lines.extend(selection_lines(body, unit, camera_rotation));
            drawn += 1;
        }
    }
    if lines.is_empty() {
        return 0;
    }

    backend.submit(DrawCommand::SetLighting(false));
    backend.submit(DrawCommand::BindTexture {
        unit: 0,
        texture: None,
    });
    backend.submit(DrawCommand::SetModel(Mat4::IDENTITY));
    backend.submit(DrawCommand::SetLineWidth(1.0));
    backend.submit(DrawCommand::DrawLines(lines));
    drawn
}
