use glam::{Vec2, Vec3, Vec4};

use super::draw::{BlendMode, DrawBackend, DrawCommand, QuadVertex, RenderFlags, TextureId};
use super::matrices::GameMatrices;
use crate::scene::Canvas;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroundRendererStatistics {
    /// Closest visible cell, measured from the near plane.
    pub min_distance: f32,
    pub max_distance: f32,
    pub rendered_cells: u32,
}

/// Terrain drawing plugin. Cell lists are regenerated every frame before
/// any pass draws the ground.
pub trait GroundRenderer {
    fn name(&self) -> &str;

    fn initialize(&mut self, canvas: &dyn Canvas);

    fn shutdown(&mut self);

    fn generate_cell_list(&mut self, canvas: &dyn Canvas, matrices: &GameMatrices);

    /// Draws the current cell list; returns the number of cells drawn.
    fn render_cells(
        &mut self,
        canvas: &dyn Canvas,
        flags: RenderFlags,
        backend: &mut dyn DrawBackend,
    ) -> u32;

    fn statistics(&self) -> GroundRendererStatistics;
}

/// Water surface, drawn after items.
pub trait WaterRenderer {
    fn render(&mut self, backend: &mut dyn DrawBackend);
}

#[derive(Debug, Clone, Copy)]
struct GroundCell {
    x: u32,
    y: u32,
}

/// Unit-sized cells following `Canvas::height_at`, one textured quad each.
#[derive(Debug)]
pub struct FlatGroundRenderer {
    texture: TextureId,
    cells: Vec<GroundCell>,
    statistics: GroundRendererStatistics,
}

impl FlatGroundRenderer {
    pub fn new(texture: TextureId) -> Self {
        Self {
            texture,
            cells: Vec::new(),
            statistics: GroundRendererStatistics::default(),
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn corners(canvas: &dyn Canvas, cell: GroundCell) -> [Vec3; 4] {
        let (x, y) = (cell.x as f32, cell.y as f32);
        [(x, y), (x + 1.0, y), (x + 1.0, y + 1.0), (x, y + 1.0)]
            .map(|(cx, cy)| Vec3::new(cx, cy, canvas.height_at(cx, cy)))
    }
}

impl GroundRenderer for FlatGroundRenderer {
    fn name(&self) -> &str {
        "flat"
    }

    fn initialize(&mut self, canvas: &dyn Canvas) {
        log::info!(
            "Ground renderer '{}' ready for {}x{} map",
            self.name(),
            canvas.map_width(),
            canvas.map_height()
        );
        self.cells.clear();
    }

    fn shutdown(&mut self) {
        self.cells = Vec::new();
        self.statistics = GroundRendererStatistics::default();
    }

    fn generate_cell_list(&mut self, canvas: &dyn Canvas, matrices: &GameMatrices) {
        self.cells.clear();
        let mut min_distance = f32::MAX;
        let mut max_distance = 0.0f32;

        for y in 0..canvas.map_height() {
            for x in 0..canvas.map_width() {
                let cell = GroundCell { x, y };
                let corners = Self::corners(canvas, cell);
                let center = corners.iter().copied().sum::<Vec3>() / 4.0;
                let radius = corners
                    .iter()
                    .map(|corner| corner.distance(center))
                    .fold(0.0f32, f32::max);

                let distance = matrices.frustum.sphere_distance(center, radius);
                if distance == 0.0 {
                    continue;
                }
                min_distance = min_distance.min(distance - 2.0 * radius);
                max_distance = max_distance.max(distance);
                self.cells.push(cell);
            }
        }

        if self.cells.is_empty() {
            min_distance = 0.0;
        }
        self.statistics.min_distance = min_distance.max(0.0);
        self.statistics.max_distance = max_distance;
    }

    fn render_cells(
        &mut self,
        canvas: &dyn Canvas,
        flags: RenderFlags,
        backend: &mut dyn DrawBackend,
    ) -> u32 {
        if self.cells.is_empty() {
            self.statistics.rendered_cells = 0;
            return 0;
        }

        let width = canvas.map_width().max(1) as f32;
        let height = canvas.map_height().max(1) as f32;
        let mut vertices = Vec::with_capacity(self.cells.len() * 4);
        for cell in &self.cells {
            for corner in Self::corners(canvas, *cell) {
                vertices.push(QuadVertex::new(
                    corner,
                    Vec2::new(corner.x / width, corner.y / height),
                    Vec4::ONE,
                ));
            }
        }

        if !flags.contains(RenderFlags::DEPTH_ONLY) {
            backend.submit(DrawCommand::BindTexture {
                unit: 0,
                texture: Some(self.texture),
            });
            backend.submit(DrawCommand::SetColor(Vec4::ONE));
        }
        backend.submit(DrawCommand::DrawQuads(vertices));

        let rendered = self.cells.len() as u32;
        self.statistics.rendered_cells = rendered;
        rendered
    }

    fn statistics(&self) -> GroundRendererStatistics {
        self.statistics
    }
}

/// Draws nothing. Useful for views without terrain.
#[derive(Debug, Default)]
pub struct NullGroundRenderer;

impl GroundRenderer for NullGroundRenderer {
    fn name(&self) -> &str {
        "null"
    }

    fn initialize(&mut self, _canvas: &dyn Canvas) {}

    fn shutdown(&mut self) {}

    fn generate_cell_list(&mut self, _canvas: &dyn Canvas, _matrices: &GameMatrices) {}

    fn render_cells(
        &mut self,
        _canvas: &dyn Canvas,
        _flags: RenderFlags,
        _backend: &mut dyn DrawBackend,
    ) -> u32 {
        0
    }

    fn statistics(&self) -> GroundRendererStatistics {
        GroundRendererStatistics::default()
    }
}

type GroundRendererConstructor = Box<dyn Fn() -> Box<dyn GroundRenderer>>;

/// Ground renderers by configuration name.
pub struct GroundRendererRegistry {
    constructors: Vec<(String, GroundRendererConstructor)>,
}

impl GroundRendererRegistry {
    pub const DEFAULT: &'static str = "default";

    /// Registers `default`, `flat` and `null`.
    pub fn with_builtin(ground_texture: TextureId) -> Self {
        let mut registry = Self {
            constructors: Vec::new(),
        };
        registry.register(Self::DEFAULT, move || {
            Box::new(FlatGroundRenderer::new(ground_texture))
        });
        registry.register("flat", move || {
            Box::new(FlatGroundRenderer::new(ground_texture))
        });
        registry.register("null", || Box::new(NullGroundRenderer));
        registry
    }

    /// Replaces an existing entry of the same name.
    pub fn register(
        &mut self,
        name: &str,
        constructor: impl Fn() -> Box<dyn GroundRenderer> + 'static,
    ) {
        self.constructors.retain(|(existing, _)| existing != name);
        self.constructors
            .push((name.to_string(), Box::new(constructor)));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.iter().map(|(name, _)| name.as_str())
    }

    /// Unknown names fall back to the default renderer.
    pub fn create(&self, name: &str) -> Option<Box<dyn GroundRenderer>> {
        if let Some((_, constructor)) = self.constructors.iter().find(|(n, _)| n == name) {
            return Some(constructor());
        }
        log::warn!(
            "Unknown ground renderer '{}', using '{}'",
            name,
            Self::DEFAULT
        );
        self.constructors
            .iter()
            .find(|(n, _)| n == Self::DEFAULT)
            .map(|(_, constructor)| constructor())
    }
}

/// Single translucent quad at a fixed level.
#[derive(Debug, Clone)]
pub struct FlatWaterRenderer {
    pub level: f32,
    pub extent: Vec2,
    pub color: Vec4,
    pub texture: Option<TextureId>,
}

impl FlatWaterRenderer {
    pub fn new(level: f32, extent: Vec2) -> Self {
        Self {
            level,
            extent,
            color: Vec4::new(0.1, 0.3, 0.6, 0.6),
            texture: None,
        }
    }
}

impl WaterRenderer for FlatWaterRenderer {
    fn render(&mut self, backend: &mut dyn DrawBackend) {
        let (w, h, z) = (self.extent.x, self.extent.y, self.level);
        backend.submit(DrawCommand::BindTexture {
            unit: 0,
            texture: self.texture,
        });
        backend.submit(DrawCommand::SetBlend(Some(BlendMode::ALPHA)));
        backend.submit(DrawCommand::SetDepthWrite(false));
        backend.submit(DrawCommand::DrawQuads(vec![
            QuadVertex::new(Vec3::new(0.0, 0.0, z), Vec2::new(0.0, 0.0), self.color),
            QuadVertex::new(Vec3::new(w, 0.0, z), Vec2::new(1.0, 0.0), self.color),
            QuadVertex::new(Vec3::new(w, h, z), Vec2::new(1.0, 1.0), self.color),
            QuadVertex::new(Vec3::new(0.0, h, z), Vec2::new(0.0, 1.0), self.color),
        ]));
        backend.submit(DrawCommand::SetDepthWrite(true));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::matrices::Viewport;
    use crate::renderer::recorder::CommandRecorder;
    use crate::scene::{Camera, FlatCanvas};

    fn overhead_matrices() -> GameMatrices {
        let camera = Camera {
            eye: Vec3::new(8.0, -4.0, 20.0),
            target: Vec3::new(8.0, 8.0, 0.0),
            ..Camera::default()
        };
        GameMatrices::new(&camera, Viewport::new(800, 600))
    }

    #[test]
    fn flat_renderer_culls_and_draws_cells() {
        let canvas = FlatCanvas::new(16, 16);
        let matrices = overhead_matrices();
        let mut ground = FlatGroundRenderer::new(TextureId(7));
        ground.initialize(&canvas);
        ground.generate_cell_list(&canvas, &matrices);
        assert!(ground.cell_count() > 0);

        let stats = ground.statistics();
        assert!(stats.max_distance > stats.min_distance);

        let mut recorder = CommandRecorder::new();
        let cells = ground.render_cells(&canvas, RenderFlags::empty(), &mut recorder);
        assert_eq!(cells as usize, ground.cell_count());
        assert_eq!(recorder.quad_count(), ground.cell_count());
        assert_eq!(recorder.texture_binds(), 1);
    }

    #[test]
    fn depth_only_skips_texture() {
        let canvas = FlatCanvas::new(8, 8);
        let mut ground = FlatGroundRenderer::new(TextureId(7));
        ground.generate_cell_list(&canvas, &overhead_matrices());
        let mut recorder = CommandRecorder::new();
        ground.render_cells(&canvas, RenderFlags::DEPTH_ONLY, &mut recorder);
        assert_eq!(recorder.texture_binds(), 0);
    }

    #[test]
    fn unknown_name_falls_back_to_default() {
        let registry = GroundRendererRegistry::with_builtin(TextureId(7));
        let ground = registry.create("voxel").unwrap();
        assert_eq!(ground.name(), "flat");
        assert_eq!(registry.create("null").unwrap().name(), "null");
        assert_eq!(registry.names().count(), 3);
    }
}
