use glam::Vec4;
use hecs::{Entity, World};

use super::draw::ModelId;
use super::feedback::FeedbackArena;
use super::frustum::Frustum;
use crate::scene::{ItemBody, ItemVisual, LocalViewer, UnitStatus, VisibleStatus};

const INITIAL_MIN_DISTANCE: f32 = 1_000_000.0;
const DESTROYED_TINT: f32 = 102.0 / 255.0;

/// One drawable item this frame. Holds the entity, not the item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    pub entity: Entity,
    pub model: ModelId,
    pub tint: Vec4,
}

/// Tint by health: white at full health, down to 70% grey at zero, flat
/// grey for wrecks.
pub fn health_tint(unit: &UnitStatus) -> Vec4 {
    if unit.destroyed {
        return Vec4::new(DESTROYED_TINT, DESTROYED_TINT, DESTROYED_TINT, 1.0);
    }
    let c = (unit.health_factor() * 0.3 + 0.7).min(1.0);
    Vec4::new(c, c, c, 1.0)
}

/// Items to draw this frame, bucketed by model.
#[derive(Debug, Default)]
pub struct RenderItemList {
    items: Vec<RenderItem>,
    radar_contacts: Vec<Entity>,
    min_distance: f32,
    max_distance: f32,
}

impl RenderItemList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild(
        &mut self,
        world: &World,
        frustum: &Frustum,
        viewer: &dyn LocalViewer,
        feedbacks: &FeedbackArena,
    ) {
        self.items.clear();
        self.radar_contacts.clear();

        let mut min_distance = INITIAL_MIN_DISTANCE;
        let mut max_distance = 0.0f32;

        for (entity, (body, visual, unit)) in world
            .query::<(&ItemBody, &ItemVisual, Option<&UnitStatus>)>()
            .iter()
        {
            if !body.visible {
                continue;
            }
            let renderer = &visual.0;
            let distance = renderer.item_in_frustum(frustum, body.center);
            if distance == 0.0 {
                continue;
            }

            match unit {
                Some(unit) => {
                    let status = viewer.visible_status(entity, unit);
                    if status == VisibleStatus::Hidden {
                        if viewer.radar_signal_strength(entity, body) >= 1.0 {
                            self.radar_contacts.push(entity);
                        }
                        continue;
                    }
                }
                None => {
                    if !viewer.can_see_item(entity, body) {
                        continue;
                    }
                }
            }

            let tint = feedbacks
                .item_tint(entity)
                .or_else(|| unit.map(health_tint))
                .unwrap_or(Vec4::ONE);

            min_distance =
                min_distance.min(distance - 2.0 * renderer.bounding_sphere_radius());
            max_distance = max_distance.max(distance);

            self.items.push(RenderItem {
                entity,
                model: renderer.model_id(),
                tint,
            });
        }

        if self.items.is_empty() {
            min_distance = 0.0;
        }
        self.min_distance = min_distance.max(0.0);
        self.max_distance = max_distance.max(0.0);

        // stable: equal models keep their iteration order
        self.items.sort_by_key(|item| item.model);
    }

    pub fn remove_item(&mut self, entity: Entity) {
        self.items.retain(|item| item.entity != entity);
        self.radar_contacts.retain(|contact| *contact != entity);
    }

    pub fn items(&self) -> &[RenderItem] {
        &self.items
    }

    pub fn radar_contacts(&self) -> &[Entity] {
        &self.radar_contacts
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Smallest item distance from the near plane, minus the item's
    /// bounding diameter.
    pub fn min_distance(&self) -> f32 {
        self.min_distance
    }

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    /// Listed items intersecting `frustum`, in list order.
    pub fn pick(&self, world: &World, frustum: &Frustum) -> Vec<Entity> {
        self.items
            .iter()
            .filter(|item| {
                let Ok(mut query) = world.query_one::<(&ItemBody, &ItemVisual)>(item.entity)
                else {
                    return false;
                };
                query.get().is_some_and(|(body, visual)| {
                    visual.0.item_in_frustum(frustum, body.center) > 0.0
                })
            })
            .map(|item| item.entity)
            .collect()
    }
}
