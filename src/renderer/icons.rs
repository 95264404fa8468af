use glam::{Mat4, Vec2, Vec3, Vec4};
use hecs::{Entity, World};

use super::context::IconTextures;
use super::draw::{BlendMode, DrawBackend, DrawCommand, QuadVertex, TextureId};
use super::matrices::GameMatrices;
use crate::scene::{
    Allegiance, ItemBody, LocalViewer, RadarEmitter, RadarJammer, UnitClass, UnitStatus,
};

const DISTANCE_SCALE: f32 = 70.0;
const UNIT_ICON_FACTOR: f32 = 0.6;
const CONTACT_ICON_FACTOR: f32 = 0.5;
const RADAR_ICON_FACTOR: f32 = 0.02;
const JAMMER_ICON_FACTOR: f32 = 0.06;
const ICON_ALPHA_TEST: f32 = 0.1;

const ENEMY_COLOR: Vec4 = Vec4::new(0.8, 0.0, 0.0, 0.8);
const NEUTRAL_COLOR: Vec4 = Vec4::new(0.0, 0.4, 0.0, 0.3);
const FRIENDLY_COLOR: Vec4 = Vec4::new(0.0, 0.0, 1.0, 0.8);
const EMITTER_COLOR: Vec4 = Vec4::new(1.0, 1.0, 1.0, 0.6);

/// Camera-facing quad. `right`, `up` and `back` are the view axes in world
/// space; the quad is pushed `size` toward the camera.
pub fn billboard(
    center: Vec3,
    size: f32,
    axes: (Vec3, Vec3, Vec3),
    color: Vec4,
) -> [QuadVertex; 4] {
    let (right, up, back) = axes;
    let center = center + back * size;
    let x = right * size;
    let y = up * size;
    [
        QuadVertex::new(center - x + y, Vec2::new(0.0, 1.0), color),
        QuadVertex::new(center + x + y, Vec2::new(1.0, 1.0), color),
        QuadVertex::new(center + x - y, Vec2::new(1.0, 0.0), color),
        QuadVertex::new(center - x - y, Vec2::new(0.0, 0.0), color),
    ]
}

fn allegiance_color(allegiance: Allegiance) -> Vec4 {
    match allegiance {
        Allegiance::Enemy => ENEMY_COLOR,
        Allegiance::Neutral => NEUTRAL_COLOR,
        Allegiance::Own | Allegiance::Allied => FRIENDLY_COLOR,
    }
}

fn class_texture(icons: &IconTextures, class: UnitClass) -> TextureId {
    match class {
        UnitClass::Land => icons.land,
        UnitClass::Aircraft => icons.aircraft,
        UnitClass::Facility => icons.facility,
    }
}

fn icon_center(body: &ItemBody) -> Vec3 {
    body.center + Vec3::new(0.0, 0.0, body.size.z * 0.5)
}

/// Quads grouped into runs of the same texture.
#[derive(Default)]
struct IconBatcher {
    runs: Vec<(TextureId, Vec<QuadVertex>)>,
    count: usize,
}

impl IconBatcher {
    fn push(&mut self, texture: TextureId, quad: [QuadVertex; 4]) {
        match self.runs.last_mut() {
            Some((current, vertices)) if *current == texture => vertices.extend(quad),
            _ => self.runs.push((texture, quad.to_vec())),
        }
        self.count += 1;
    }

    fn flush(self, backend: &mut dyn DrawBackend) -> usize {
        for (texture, vertices) in self.runs {
            backend.submit(DrawCommand::BindTexture {
                unit: 0,
                texture: Some(texture),
            });
            backend.submit(DrawCommand::DrawQuads(vertices));
        }
        self.count
    }
}

/// Draws far units, radar contacts and foreign radar emitters as icons.
/// Returns the number of icons drawn.
pub fn draw_icons(
    backend: &mut dyn DrawBackend,
    world: &World,
    iconic: &[Entity],
    radar_contacts: &[Entity],
    matrices: &GameMatrices,
    viewer: &dyn LocalViewer,
    icons: &IconTextures,
) -> usize {
    let axes = matrices.billboard_axes();
    let camera = matrices.camera_position;
    let mut batcher = IconBatcher::default();

    for &entity in iconic {
        let Ok(mut query) = world.query_one::<(&ItemBody, &UnitStatus)>(entity) else {
            continue;
        };
        let Some((body, unit)) = query.get() else {
            continue;
        };
        let center = icon_center(body);
        let size = UNIT_ICON_FACTOR * (camera.distance(center) / DISTANCE_SCALE)
            * body.width().sqrt();
        let color = allegiance_color(viewer.allegiance(unit.owner));
        batcher.push(
            class_texture(icons, unit.class),
            billboard(center, size, axes, color),
        );
    }

    for &entity in radar_contacts {
        let Ok(entity_ref) = world.entity(entity) else {
            continue;
        };
        if entity_ref.has::<RadarEmitter>() || entity_ref.has::<RadarJammer>() {
            continue;
        }
        let Some(body) = entity_ref.get::<&ItemBody>() else {
            continue;
        };
        let signal = viewer.radar_signal_strength(entity, &body);
        let center = icon_center(&body);
        let size = CONTACT_ICON_FACTOR * (camera.distance(center) / DISTANCE_SCALE)
            * body.width().sqrt();
        let alpha = 0.3 + (signal / 20.0).min(0.5);
        batcher.push(
            icons.facility,
            billboard(center, size, axes, Vec4::new(0.4, 0.4, 0.4, alpha)),
        );
    }

    let mut emitters = Vec::new();
    for (entity, (body, unit, radar)) in world
        .query::<(&ItemBody, &UnitStatus, &RadarEmitter)>()
        .iter()
    {
        emitters.push((entity, *body, unit.owner, radar.transmitted_power, icons.radar, RADAR_ICON_FACTOR));
    }
    for (entity, (body, unit, jammer)) in world
        .query::<(&ItemBody, &UnitStatus, &RadarJammer)>()
        .iter()
    {
        emitters.push((entity, *body, unit.owner, jammer.transmitted_power, icons.jamming, JAMMER_ICON_FACTOR));
    }
    for (entity, body, owner, power, texture, factor) in emitters {
        if owner == viewer.player() || viewer.radar_signal_strength(entity, &body) < 1.0 {
            continue;
        }
        let center = icon_center(&body);
        let size = factor * (camera.distance(center) / DISTANCE_SCALE) * power.max(0.0).sqrt();
        if matrices.frustum.sphere_distance(center, size) == 0.0 {
            continue;
        }
        batcher.push(texture, billboard(center, size, axes, EMITTER_COLOR));
    }

    if batcher.count == 0 {
        return 0;
    }

    backend.submit(DrawCommand::SetLighting(false));
    backend.submit(DrawCommand::SetModel(Mat4::IDENTITY));
    backend.submit(DrawCommand::SetBlend(Some(BlendMode::ALPHA)));
    backend.submit(DrawCommand::SetAlphaTest(Some(ICON_ALPHA_TEST)));
    let drawn = batcher.flush(backend);
    backend.submit(DrawCommand::SetAlphaTest(None));
    drawn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::matrices::Viewport;
    use crate::renderer::recorder::CommandRecorder;
    use crate::scene::{Camera, OmniscientViewer, PlayerId};

    #[test]
    fn billboard_faces_camera() {
        let matrices = GameMatrices::new(&Camera::default(), Viewport::new(800, 600));
        let axes = matrices.billboard_axes();
        let quad = billboard(Vec3::ZERO, 1.0, axes, Vec4::ONE);
        let normal = (quad[1].position - quad[0].position)
            .cross(quad[3].position - quad[0].position)
            .normalize();
        let to_camera = (matrices.camera_position - Vec3::ZERO).normalize();
        assert!(normal.dot(to_camera).abs() > 0.999);
        assert_eq!(quad[0].uv, Vec2::new(0.0, 1.0));
        assert_eq!(quad[3].uv, Vec2::new(0.0, 0.0));
    }

    #[test]
    fn icons_are_batched_by_texture() {
        let mut world = World::new();
        let body = ItemBody::new(Vec3::ZERO, Vec3::ONE);
        let enemy = PlayerId(2);
        let a = world.spawn((body, UnitStatus::new(enemy, UnitClass::Land, 10)));
        let b = world.spawn((body, UnitStatus::new(enemy, UnitClass::Land, 10)));
        let c = world.spawn((body, UnitStatus::new(enemy, UnitClass::Aircraft, 10)));

        let matrices = GameMatrices::new(&Camera::default(), Viewport::new(800, 600));
        let viewer = OmniscientViewer::new(PlayerId(1));
        let mut recorder = CommandRecorder::new();
        let drawn = draw_icons(
            &mut recorder,
            &world,
            &[a, b, c],
            &[],
            &matrices,
            &viewer,
            &IconTextures::default(),
        );
        assert_eq!(drawn, 3);
        assert_eq!(
            recorder.count(|command| matches!(command, DrawCommand::DrawQuads(_))),
            2
        );
    }

    #[test]
    fn enemy_icons_are_red() {
        assert_eq!(allegiance_color(Allegiance::Enemy), ENEMY_COLOR);
        assert_eq!(allegiance_color(Allegiance::Allied), FRIENDLY_COLOR);
    }
}
