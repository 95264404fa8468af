use glam::Vec3;

use crate::renderer::draw::{DrawBackend, DrawCommand, ModelId, RenderFlags};
use crate::renderer::frustum::Frustum;

/// Draws the meshes of one item. The caller has already set the model
/// matrix and tint.
pub trait ItemRenderer: Send + Sync {
    fn model_id(&self) -> ModelId;

    fn bounding_sphere_radius(&self) -> f32;

    /// Level of detail for a camera distance. Must not decrease as the
    /// distance grows.
    fn preferred_lod(&self, distance: f32) -> usize;

    fn has_transparent_meshes(&self, lod: usize) -> bool;

    /// 0 when the item is outside, otherwise a positive distance.
    fn item_in_frustum(&self, frustum: &Frustum, center: Vec3) -> f32 {
        frustum.sphere_distance(center, self.bounding_sphere_radius())
    }

    fn render(
        &self,
        backend: &mut dyn DrawBackend,
        lod: usize,
        transparent: bool,
        flags: RenderFlags,
    );
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelLod {
    /// Camera distance from which this level is used.
    pub min_distance: f32,
    pub has_transparent_meshes: bool,
}

/// Levels of a model, index 0 being the most detailed.
#[derive(Debug, Clone)]
pub struct ModelLodTable {
    lods: Vec<ModelLod>,
}

impl ModelLodTable {
    /// Levels are sorted by distance; an empty table gets a single level.
    pub fn new(mut lods: Vec<ModelLod>) -> Self {
        if lods.is_empty() {
            lods.push(ModelLod {
                min_distance: 0.0,
                has_transparent_meshes: false,
            });
        }
        lods.sort_by(|a, b| a.min_distance.total_cmp(&b.min_distance));
        Self { lods }
    }

    /// Evenly spaced levels, `step` apart.
    pub fn uniform(count: usize, step: f32) -> Self {
        Self::new(
            (0..count.max(1))
                .map(|lod| ModelLod {
                    min_distance: lod as f32 * step,
                    has_transparent_meshes: false,
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.lods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lods.is_empty()
    }

    pub fn lod_distance(&self, lod: usize) -> f32 {
        self.lods.get(lod).map_or(f32::MAX, |l| l.min_distance)
    }

    pub fn preferred_lod(&self, distance: f32) -> usize {
        for lod in (1..self.lods.len()).rev() {
            if distance >= self.lods[lod].min_distance {
                return lod;
            }
        }
        0
    }

    pub fn has_transparent_meshes(&self, lod: usize) -> bool {
        self.lods
            .get(lod)
            .is_some_and(|l| l.has_transparent_meshes)
    }

    pub fn set_transparent(&mut self, lod: usize, transparent: bool) {
        if let Some(l) = self.lods.get_mut(lod) {
            l.has_transparent_meshes = transparent;
        }
    }
}

/// Item renderer backed by a shared model with a LOD table.
#[derive(Debug, Clone)]
pub struct ModelItemRenderer {
    model: ModelId,
    radius: f32,
    lods: ModelLodTable,
}

impl ModelItemRenderer {
    pub fn new(model: ModelId, radius: f32, lods: ModelLodTable) -> Self {
        Self {
            model,
            radius,
            lods,
        }
    }

    pub fn lods(&self) -> &ModelLodTable {
        &self.lods
    }
}

impl ItemRenderer for ModelItemRenderer {
    fn model_id(&self) -> ModelId {
        self.model
    }

    fn bounding_sphere_radius(&self) -> f32 {
        self.radius
    }

    fn preferred_lod(&self, distance: f32) -> usize {
        self.lods.preferred_lod(distance)
    }

    fn has_transparent_meshes(&self, lod: usize) -> bool {
        self.lods.has_transparent_meshes(lod)
    }

    fn render(
        &self,
        backend: &mut dyn DrawBackend,
        lod: usize,
        transparent: bool,
        _flags: RenderFlags,
    ) {
        if transparent && !self.lods.has_transparent_meshes(lod) {
            return;
        }
        backend.submit(DrawCommand::DrawMesh {
            model: self.model,
            lod,
            transparent,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn lod_is_monotonic_in_distance() {
        let table = ModelLodTable::new(vec![
            ModelLod {
                min_distance: 0.0,
                has_transparent_meshes: false,
            },
            ModelLod {
                min_distance: 40.0,
                has_transparent_meshes: false,
            },
            ModelLod {
                min_distance: 15.0,
                has_transparent_meshes: true,
            },
        ]);

        let mut rng = SmallRng::seed_from_u64(7);
        let mut distances: Vec<f32> = (0..500).map(|_| rng.gen_range(0.0..120.0)).collect();
        distances.sort_by(f32::total_cmp);

        let mut last = 0;
        for distance in distances {
            let lod = table.preferred_lod(distance);
            assert!(lod >= last, "lod dropped at distance {distance}");
            last = lod;
        }
        assert_eq!(table.preferred_lod(20.0), 1);
        assert!(table.has_transparent_meshes(1));
    }

    #[test]
    fn empty_table_has_single_level() {
        let table = ModelLodTable::new(Vec::new());
        assert_eq!(table.len(), 1);
        assert_eq!(table.preferred_lod(1000.0), 0);
    }
}
