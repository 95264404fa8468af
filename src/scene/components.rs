// scene/components.rs
// hecs components describing battlefield items

use std::fmt;

use glam::{Mat4, Vec3};

use crate::scene::model::ItemRenderer;

// ============================================================================
// Core Item Components
// ============================================================================

/// Placement and extent of an item on the map
#[derive(Debug, Clone, Copy)]
pub struct ItemBody {
    /// Center on the ground plane; `z` is the bottom of the item.
    pub center: Vec3,
    /// Width (x), height (y) and depth (z) in map units.
    pub size: Vec3,
    /// Rotation around x, y and z in degrees.
    pub rotation: Vec3,
    pub visible: bool,
}

impl ItemBody {
    pub fn new(center: Vec3, size: Vec3) -> Self {
        Self {
            center,
            size,
            rotation: Vec3::ZERO,
            visible: true,
        }
    }

    pub fn with_heading(mut self, degrees: f32) -> Self {
        self.rotation.z = degrees;
        self
    }

    pub fn width(&self) -> f32 {
        self.size.x
    }

    /// Translate to the center, then yaw, pitch and roll.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.center)
            * Mat4::from_rotation_z((-self.rotation.z).to_radians())
            * Mat4::from_rotation_x(self.rotation.x.to_radians())
            * Mat4::from_rotation_y(self.rotation.y.to_radians())
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let half = Vec3::new(self.size.x * 0.5, self.size.y * 0.5, 0.0);
        let min = self.center - half;
        let max = self.center + half + Vec3::new(0.0, 0.0, self.size.z);
        (min, max)
    }
}

/// Mesh renderer of an item. Items without one are never drawn.
pub struct ItemVisual(pub Box<dyn ItemRenderer>);

impl ItemVisual {
    pub fn new(renderer: impl ItemRenderer + 'static) -> Self {
        Self(Box::new(renderer))
    }
}

impl fmt::Debug for ItemVisual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ItemVisual")
            .field(&self.0.model_id())
            .finish()
    }
}

// ============================================================================
// Unit Components
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitClass {
    Land,
    Aircraft,
    Facility,
}

/// Marks an item as a unit and carries what rendering needs from it
#[derive(Debug, Clone, Copy)]
pub struct UnitStatus {
    pub owner: PlayerId,
    pub class: UnitClass,
    pub health: u32,
    pub max_health: u32,
    pub destroyed: bool,
}

impl UnitStatus {
    pub fn new(owner: PlayerId, class: UnitClass, max_health: u32) -> Self {
        Self {
            owner,
            class,
            health: max_health,
            max_health,
            destroyed: false,
        }
    }

    /// Health in `[0, 1]`.
    pub fn health_factor(&self) -> f32 {
        if self.max_health == 0 {
            return 0.0;
        }
        (self.health as f32 / self.max_health as f32).clamp(0.0, 1.0)
    }
}

/// Item is part of the local player's selection
#[derive(Debug, Clone, Copy, Default)]
pub struct Selected;

/// Unit carries a radar
#[derive(Debug, Clone, Copy)]
pub struct RadarEmitter {
    pub transmitted_power: f32,
}

/// Unit carries a radar jammer
#[derive(Debug, Clone, Copy)]
pub struct RadarJammer {
    pub transmitted_power: f32,
}
