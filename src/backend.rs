//! Physics backend abstraction.
//!
//! The controller core never talks to a physics engine directly. Sensors ask
//! a [`TerrainQuery`] for ray and box queries, and the Bevy integration uses a
//! [`CharacterPhysicsBackend`] to read and write the character's transform.
//! This allows swapping between the bundled segment terrain, Rapier2D, or a
//! custom engine.

use bevy::prelude::*;

use crate::collision::SurfaceHit;

/// Layer mask used to filter terrain queries.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollisionMask(pub u32);

impl CollisionMask {
    /// Matches every layer.
    pub const ALL: Self = Self(u32::MAX);
    /// Matches nothing.
    pub const NONE: Self = Self(0);
    /// Default solid terrain layer.
    pub const TERRAIN: Self = Self(1);
    /// Interactive objects (springs, breakable walls, pushable blocks).
    /// Wall contacts next to one are never deferred.
    pub const GIMMICK: Self = Self(2);

    /// Layers present in both masks.
    #[inline]
    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Whether any layer of `layers` is included in this mask.
    #[inline]
    pub fn matches(self, layers: u32) -> bool {
        self.0 & layers != 0
    }
}

impl Default for CollisionMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Terrain and gimmick query service used by every sensor.
///
/// Implementations must return the *nearest* surface along the ray and
/// report a normal that points away from the surface.
pub trait TerrainQuery {
    /// Cast a ray and return the nearest hit within `max_distance`.
    ///
    /// # Arguments
    /// * `origin` - Ray origin in world space
    /// * `direction` - Cast direction (normalized)
    /// * `max_distance` - Maximum cast distance
    /// * `mask` - Layers the ray may hit
    fn raycast(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        mask: CollisionMask,
    ) -> Option<SurfaceHit>;

    /// Return every entity whose collider overlaps the axis-aligned box.
    ///
    /// The wall sensors use it to look for [`CollisionMask::GIMMICK`]
    /// objects at a hit.
    fn overlap_box(&self, center: Vec2, size: Vec2, mask: CollisionMask) -> Vec<Entity>;
}

/// Terrain with nothing in it. Every sensor misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyTerrain;

impl TerrainQuery for EmptyTerrain {
    fn raycast(&self, _: Vec2, _: Vec2, _: f32, _: CollisionMask) -> Option<SurfaceHit> {
        None
    }

    fn overlap_box(&self, _: Vec2, _: Vec2, _: CollisionMask) -> Vec<Entity> {
        Vec::new()
    }
}

/// Helper struct for building raycasts.
#[derive(Debug, Clone, Copy)]
pub struct RaycastRequest {
    /// Origin point of the ray.
    pub origin: Vec2,
    /// Direction of the ray (normalized).
    pub direction: Vec2,
    /// Maximum distance to cast.
    pub max_distance: f32,
    /// Layers to test against.
    pub mask: CollisionMask,
}

impl RaycastRequest {
    /// Create a new raycast request.
    pub fn new(origin: Vec2, direction: Vec2, max_distance: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            max_distance,
            mask: CollisionMask::ALL,
        }
    }

    /// Restrict the request to `mask`.
    pub fn with_mask(mut self, mask: CollisionMask) -> Self {
        self.mask = mask;
        self
    }

    /// Run the request against a terrain.
    pub fn cast(&self, terrain: &dyn TerrainQuery) -> Option<SurfaceHit> {
        if self.direction == Vec2::ZERO || self.max_distance <= 0.0 {
            return None;
        }
        terrain.raycast(self.origin, self.direction, self.max_distance, self.mask)
    }
}

/// Trait for Bevy physics backend implementations.
///
/// The backend owns how a character's simulated position reaches the
/// engine, and contributes a plugin with the system that actually ticks
/// players against its terrain.
pub trait CharacterPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Get the current position of an entity.
    fn get_position(world: &World, entity: Entity) -> Vec2 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation.truncate())
            .unwrap_or(Vec2::ZERO)
    }

    /// Set the position of an entity.
    fn set_position(world: &mut World, entity: Entity, position: Vec2) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation.x = position.x;
            transform.translation.y = position.y;
        }
    }

    /// Set the visual rotation of an entity (radians, counter-clockwise).
    fn set_rotation(world: &mut World, entity: Entity, radians: f32) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.rotation = Quat::from_rotation_z(radians);
        }
    }

    /// Get the fixed timestep delta time.
    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 60.0)
    }
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_matching() {
        assert!(CollisionMask::ALL.matches(4));
        assert!(!CollisionMask::NONE.matches(4));
        assert!(CollisionMask(0b101).matches(0b100));
        assert!(!CollisionMask(0b101).matches(0b010));
        assert_eq!(
            CollisionMask::ALL.intersection(CollisionMask::GIMMICK),
            CollisionMask::GIMMICK
        );
        assert_eq!(
            CollisionMask::TERRAIN.intersection(CollisionMask::GIMMICK),
            CollisionMask::NONE
        );
    }

    #[test]
    fn request_normalizes_direction() {
        let request = RaycastRequest::new(Vec2::ZERO, Vec2::new(0.0, -5.0), 10.0);
        assert!((request.direction.y + 1.0).abs() < 1.0e-6);
    }

    #[test]
    fn degenerate_request_misses() {
        let request = RaycastRequest::new(Vec2::ZERO, Vec2::ZERO, 10.0);
        assert!(request.cast(&EmptyTerrain).is_none());
    }
}
