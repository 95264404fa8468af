use glam::{Mat4, Vec3, Vec4};
use hecs::{Entity, World};

use super::draw::{BlendMode, DrawBackend, DrawCommand, LineVertex, ModelId, RenderFlags};
use super::matrices::GameMatrices;
use super::selection;
use super::visibility::{RenderItem, RenderItemList};
use crate::scene::{ItemBody, ItemVisual, UnitStatus};

const TRANSPARENT_ALPHA_TEST: f32 = 0.2;
const BOUNDING_BOX_COLOR: Vec4 = Vec4::new(1.0, 1.0, 0.0, 1.0);

/// Per-frame switches for the item pass.
#[derive(Debug, Clone, Copy)]
pub struct ItemPassOptions {
    pub use_lod: bool,
    pub iconify_base_distance: f32,
    pub bounding_boxes: bool,
    pub wireframes: bool,
    /// Camera yaw to align selection indicators with, if any.
    pub selection_rotation: Option<f32>,
}

impl Default for ItemPassOptions {
    fn default() -> Self {
        Self {
            use_lod: true,
            iconify_base_distance: 80.0,
            bounding_boxes: false,
            wireframes: false,
            selection_rotation: None,
        }
    }
}

/// Squared distance beyond which an item of `width` becomes an icon.
pub fn iconify_distance_sq(base: f32, width: f32) -> f32 {
    let distance = base * width.max(0.0).sqrt();
    distance * distance
}

fn bounding_box_lines(body: &ItemBody) -> Vec<LineVertex> {
    let (min, max) = body.bounds();
    let corner = |i: usize| {
        Vec3::new(
            if i & 1 == 0 { min.x } else { max.x },
            if i & 2 == 0 { min.y } else { max.y },
            if i & 4 == 0 { min.z } else { max.z },
        )
    };
    let mut lines = Vec::with_capacity(24);
    for a in 0..8usize {
        for bit in [1usize, 2, 4] {
            if a & bit == 0 {
                for position in [corner(a), corner(a | bit)] {
                    lines.push(LineVertex {
                        position,
                        color: BOUNDING_BOX_COLOR,
                    });
                }
            }
        }
    }
    lines
}

/// Draws the render list: opaque meshes, queued transparent meshes, then
/// selection indicators. Far units are collected for the icon pass.
#[derive(Debug, Default)]
pub struct ItemPass {
    transparent: Vec<(RenderItem, usize)>,
    iconic: Vec<Entity>,
}

impl ItemPass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Far units from the last color pass.
    pub fn iconic(&self) -> &[Entity] {
        &self.iconic
    }

    /// Returns the number of listed items.
    pub fn render(
        &mut self,
        backend: &mut dyn DrawBackend,
        world: &World,
        list: &RenderItemList,
        matrices: &GameMatrices,
        flags: RenderFlags,
        options: &ItemPassOptions,
    ) -> u32 {
        let depth_only = flags.contains(RenderFlags::DEPTH_ONLY);
        self.transparent.clear();
        if !depth_only {
            self.iconic.clear();
        }

        if options.wireframes {
            backend.submit(DrawCommand::SetWireframe(true));
        }

        let camera = matrices.camera_position;
        let mut current_model: Option<ModelId> = None;
        let mut boxes = Vec::new();

        for item in list.items() {
            let Ok(mut query) =
                world.query_one::<(&ItemBody, &ItemVisual, Option<&UnitStatus>)>(item.entity)
            else {
                log::error!("Render item {:?} no longer exists", item.entity);
                continue;
            };
            let Some((body, visual, unit)) = query.get() else {
                log::error!("Render item {:?} lost its body or visual", item.entity);
                continue;
            };

            let distance_sq = camera.distance_squared(body.center);
            let far = distance_sq >= iconify_distance_sq(options.iconify_base_distance, body.width());
            if far && depth_only {
                continue;
            }
            if !depth_only {
                backend.submit(DrawCommand::SetColor(item.tint));
            }

            if far {
                if let Some(unit) = unit {
                    if !unit.destroyed {
                        self.iconic.push(item.entity);
                    }
                }
                continue;
            }

            let renderer = &visual.0;
            let lod = if options.use_lod {
                renderer.preferred_lod(distance_sq.sqrt())
            } else {
                0
            };
            if current_model != Some(item.model) {
                backend.submit(DrawCommand::PrepareModel(item.model));
                current_model = Some(item.model);
            }
            backend.submit(DrawCommand::SetModel(body.model_matrix()));
            renderer.render(backend, lod, false, flags);

            if renderer.has_transparent_meshes(lod) {
                self.transparent.push((*item, lod));
            }
            if options.bounding_boxes && !depth_only {
                boxes.extend(bounding_box_lines(body));
            }
        }

        if !self.transparent.is_empty() {
            self.render_transparent(backend, world, flags);
        }

        if !boxes.is_empty() {
            backend.submit(DrawCommand::SetModel(Mat4::IDENTITY));
            backend.submit(DrawCommand::BindTexture {
                unit: 0,
                texture: None,
            });
            backend.submit(DrawCommand::DrawLines(boxes));
        }

        if !depth_only {
            selection::draw_selections(backend, world, list.items(), options.selection_rotation);
        }

        if options.wireframes {
            backend.submit(DrawCommand::SetWireframe(false));
        }
        list.len() as u32
    }

    // Drawn in list order after all opaque meshes.
    fn render_transparent(
        &self,
        backend: &mut dyn DrawBackend,
        world: &World,
        flags: RenderFlags,
    ) {
        let depth_only = flags.contains(RenderFlags::DEPTH_ONLY);
        if !depth_only {
            backend.submit(DrawCommand::SetBlend(Some(BlendMode::ALPHA)));
        }
        backend.submit(DrawCommand::SetAlphaTest(Some(TRANSPARENT_ALPHA_TEST)));
        backend.submit(DrawCommand::SetCulling(false));

        let mut current_model: Option<ModelId> = None;
        for (item, lod) in &self.transparent {
            let Ok(mut query) = world.query_one::<(&ItemBody, &ItemVisual)>(item.entity) else {
                continue;
            };
            let Some((body, visual)) = query.get() else {
                continue;
            };
            if current_model != Some(item.model) {
                backend.submit(DrawCommand::PrepareModel(item.model));
                current_model = Some(item.model);
            }
            if !depth_only {
                backend.submit(DrawCommand::SetColor(item.tint));
            }
            backend.submit(DrawCommand::SetModel(body.model_matrix()));
            visual.0.render(backend, *lod, true, flags);
        }

        backend.submit(DrawCommand::SetCulling(true));
        backend.submit(DrawCommand::SetAlphaTest(None));
        if !depth_only {
            backend.submit(DrawCommand::SetBlend(None));
        }
    }
}
