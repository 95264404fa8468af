use hecs::Entity;

use crate::scene::components::{ItemBody, PlayerId, UnitStatus};

/// Map the items live on.
pub trait Canvas {
    fn map_width(&self) -> u32;
    fn map_height(&self) -> u32;
    fn height_at(&self, x: f32, y: f32) -> f32;

    fn on_map(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.map_width() as f32 && y < self.map_height() as f32
    }
}

/// What the local player currently knows about a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibleStatus {
    Visible,
    /// Seen earlier and still remembered at its last position.
    Earlier,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allegiance {
    Own,
    Allied,
    Neutral,
    Enemy,
}

/// Fog-of-war and diplomacy oracle of the local player.
pub trait LocalViewer {
    fn player(&self) -> PlayerId;
    fn can_see_item(&self, entity: Entity, body: &ItemBody) -> bool;
    fn can_see_point(&self, x: f32, y: f32) -> bool;
    fn visible_status(&self, entity: Entity, unit: &UnitStatus) -> VisibleStatus;
    fn radar_signal_strength(&self, entity: Entity, body: &ItemBody) -> f32;
    fn allegiance(&self, owner: PlayerId) -> Allegiance;
}

/// Map with constant ground height.
#[derive(Debug, Clone, Copy)]
pub struct FlatCanvas {
    pub width: u32,
    pub height: u32,
    pub ground_height: f32,
}

impl FlatCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ground_height: 0.0,
        }
    }
}

impl Canvas for FlatCanvas {
    fn map_width(&self) -> u32 {
        self.width
    }

    fn map_height(&self) -> u32 {
        self.height
    }

    fn height_at(&self, _x: f32, _y: f32) -> f32 {
        self.ground_height
    }
}

/// Viewer without fog of war. Every other player is an enemy unless listed
/// as an ally.
#[derive(Debug, Clone)]
pub struct OmniscientViewer {
    pub player: PlayerId,
    pub allies: Vec<PlayerId>,
    pub neutral: Vec<PlayerId>,
}

impl OmniscientViewer {
    pub fn new(player: PlayerId) -> Self {
        Self {
            player,
            allies: Vec::new(),
            neutral: Vec::new(),
        }
    }
}

impl LocalViewer for OmniscientViewer {
    fn player(&self) -> PlayerId {
        self.player
    }

    fn can_see_item(&self, _entity: Entity, _body: &ItemBody) -> bool {
        true
    }

    fn can_see_point(&self, _x: f32, _y: f32) -> bool {
        true
    }

    fn visible_status(&self, _entity: Entity, _unit: &UnitStatus) -> VisibleStatus {
        VisibleStatus::Visible
    }

    fn radar_signal_strength(&self, _entity: Entity, _body: &ItemBody) -> f32 {
        0.0
    }

    fn allegiance(&self, owner: PlayerId) -> Allegiance {
        if owner == self.player {
            Allegiance::Own
        } else if self.allies.contains(&owner) {
            Allegiance::Allied
        } else if self.neutral.contains(&owner) {
            Allegiance::Neutral
        } else {
            Allegiance::Enemy
        }
    }
}
