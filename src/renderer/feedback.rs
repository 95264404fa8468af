use std::time::{Duration, Instant};

use glam::{Vec3, Vec4};
use hecs::Entity;
use slotmap::{new_key_type, SlotMap};

use super::draw::{BlendMode, DepthFunc, DrawBackend, DrawCommand, LineVertex};

new_key_type! {
    pub struct FeedbackKey;
}

pub const ATTACK_FEEDBACK_DURATION: Duration = Duration::from_millis(250);
pub const MOVE_FEEDBACK_DURATION: Duration = Duration::from_millis(500);

const GROUND_MARKER_HALF_SIZE: f32 = 0.25;
const GROUND_MARKER_LIFT: f32 = 0.05;

/// What a feedback points at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedbackKind {
    /// Overrides the tint of an item.
    ItemTint { entity: Entity },
    /// Marker lines on the ground.
    GroundMarker { position: Vec3 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualFeedback {
    pub kind: FeedbackKind,
    pub color: Vec4,
    pub expires_at: Instant,
}

/// Time-boxed acknowledgements of player orders.
#[derive(Debug, Default)]
pub struct FeedbackArena {
    feedbacks: SlotMap<FeedbackKey, VisualFeedback>,
}

impl FeedbackArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        kind: FeedbackKind,
        color: Vec4,
        now: Instant,
        duration: Duration,
    ) -> FeedbackKey {
        self.feedbacks.insert(VisualFeedback {
            kind,
            color,
            expires_at: now + duration,
        })
    }

    pub fn remove(&mut self, key: FeedbackKey) -> Option<VisualFeedback> {
        self.feedbacks.remove(key)
    }

    pub fn len(&self) -> usize {
        self.feedbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feedbacks.is_empty()
    }

    /// Most recently added tint for the entity.
    pub fn item_tint(&self, entity: Entity) -> Option<Vec4> {
        self.feedbacks
            .values()
            .filter(|feedback| feedback.kind == FeedbackKind::ItemTint { entity })
            .max_by_key(|feedback| feedback.expires_at)
            .map(|feedback| feedback.color)
    }

    /// Drops feedbacks that reference a removed item.
    pub fn forget_item(&mut self, entity: Entity) {
        self.feedbacks
            .retain(|_, feedback| feedback.kind != FeedbackKind::ItemTint { entity });
    }

    /// Draws every ground marker as four lines from the corners to the
    /// center. Depth test and blending are off.
    pub fn paint(&self, backend: &mut dyn DrawBackend) {
        let mut lines = Vec::new();
        for feedback in self.feedbacks.values() {
            if let FeedbackKind::GroundMarker { position } = feedback.kind {
                let center = position + Vec3::new(0.0, 0.0, GROUND_MARKER_LIFT);
                for (dx, dy) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                    let corner = center
                        + Vec3::new(dx * GROUND_MARKER_HALF_SIZE, dy * GROUND_MARKER_HALF_SIZE, 0.0);
                    lines.push(LineVertex {
                        position: corner,
                        color: feedback.color,
                    });
                    lines.push(LineVertex {
                        position: center,
                        color: feedback.color,
                    });
                }
            }
        }
        if lines.is_empty() {
            return;
        }
        backend.submit(DrawCommand::SetDepthTest(None));
        backend.submit(DrawCommand::SetBlend(None));
        backend.submit(DrawCommand::BindTexture {
            unit: 0,
            texture: None,
        });
        backend.submit(DrawCommand::SetLineWidth(1.0));
        backend.submit(DrawCommand::DrawLines(lines));
        backend.submit(DrawCommand::SetBlend(Some(BlendMode::ALPHA)));
        backend.submit(DrawCommand::SetDepthTest(Some(DepthFunc::LessEqual)));
    }

    /// Removes expired feedbacks; returns how many were dropped.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.feedbacks.len();
        self.feedbacks.retain(|_, feedback| feedback.expires_at > now);
        before - self.feedbacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::recorder::CommandRecorder;

    #[test]
    fn feedback_expires_after_duration() {
        let mut world = hecs::World::new();
        let entity = world.spawn(());
        let now = Instant::now();

        let mut arena = FeedbackArena::new();
        arena.add(
            FeedbackKind::ItemTint { entity },
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            now,
            ATTACK_FEEDBACK_DURATION,
        );
        assert!(arena.item_tint(entity).is_some());

        assert_eq!(arena.sweep(now + Duration::from_millis(100)), 0);
        assert_eq!(arena.sweep(now + Duration::from_millis(300)), 1);
        assert!(arena.item_tint(entity).is_none());
    }

    #[test]
    fn ground_marker_draws_four_lines() {
        let mut arena = FeedbackArena::new();
        arena.add(
            FeedbackKind::GroundMarker {
                position: Vec3::new(5.0, 5.0, 0.0),
            },
            Vec4::new(0.0, 1.0, 0.0, 1.0),
            Instant::now(),
            MOVE_FEEDBACK_DURATION,
        );
        let mut recorder = CommandRecorder::new();
        arena.paint(&mut recorder);

        let lines: Vec<_> = recorder
            .commands()
            .iter()
            .filter_map(|command| match command {
                DrawCommand::DrawLines(lines) => Some(lines.len()),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![8]);
    }

    #[test]
    fn forgetting_an_item_drops_its_tint() {
        let mut world = hecs::World::new();
        let entity = world.spawn(());
        let mut arena = FeedbackArena::new();
        arena.add(
            FeedbackKind::ItemTint { entity },
            Vec4::ONE,
            Instant::now(),
            ATTACK_FEEDBACK_DURATION,
        );
        arena.forget_item(entity);
        assert!(arena.is_empty());
    }
}
