//! Rapier2D physics backend implementation.
//!
//! This module lets the sensors query real Rapier colliders. Enable with the
//! `rapier2d` feature.

use bevy::prelude::*;
use bevy_rapier2d::geometry::Group;
use bevy_rapier2d::prelude::*;

use crate::backend::{CharacterPhysicsBackend, CollisionMask, TerrainQuery};
use crate::collision::{SurfaceFlags, SurfaceHit};
use crate::config::{CharacterBuild, StageContext};
use crate::intent::PlayerInput;
use crate::player::Player;
use crate::systems::{simulate_player, tick_context};
use crate::HedgeControllerSet;

/// Rapier2D physics backend for the character controller.
///
/// Players are simulated kinematically by the sensors; Rapier only answers
/// ray and overlap queries against the level's colliders. Position writes go
/// to the `Transform`, which Rapier reads for position-based kinematic
/// bodies.
pub struct Rapier2dBackend;

impl CharacterPhysicsBackend for Rapier2dBackend {
    fn plugin() -> impl Plugin {
        Rapier2dBackendPlugin
    }

    fn get_position(world: &World, entity: Entity) -> Vec2 {
        world
            .get::<GlobalTransform>(entity)
            .map(|t| t.translation().truncate())
            .or_else(|| {
                world
                    .get::<Transform>(entity)
                    .map(|t| t.translation.truncate())
            })
            .unwrap_or(Vec2::ZERO)
    }
}

/// Plugin that ticks players against the Rapier colliders.
pub struct Rapier2dBackendPlugin;

impl Plugin for Rapier2dBackendPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<OneWaySurface>();
        app.register_type::<InteractiveSurface>();
        app.add_systems(
            FixedUpdate,
            rapier_player_tick.in_set(HedgeControllerSet::Simulation),
        );
    }
}

/// Marks a collider the player can jump through from below.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct OneWaySurface;

/// Marks a collider as a gimmick whose faces always count as walls.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct InteractiveSurface;

/// [`TerrainQuery`] over a Rapier context.
pub struct RapierTerrain<'a, 'w> {
    context: &'a RapierContext<'w>,
    exclude: Option<Entity>,
    flags: &'a dyn Fn(Entity) -> SurfaceFlags,
}

fn solid(_: Entity) -> SurfaceFlags {
    SurfaceFlags::SOLID
}

impl<'a, 'w> RapierTerrain<'a, 'w> {
    pub fn new(context: &'a RapierContext<'w>) -> Self {
        Self {
            context,
            exclude: None,
            flags: &solid,
        }
    }

    /// Ignore the colliders of `entity`, usually the player itself.
    pub fn excluding(mut self, entity: Entity) -> Self {
        self.exclude = Some(entity);
        self
    }

    /// Resolve surface flags per hit entity.
    pub fn with_flags(mut self, flags: &'a dyn Fn(Entity) -> SurfaceFlags) -> Self {
        self.flags = flags;
        self
    }

    fn filter(&self, mask: CollisionMask) -> QueryFilter<'static> {
        let mut filter = QueryFilter::default()
            .exclude_sensors()
            .groups(CollisionGroups::new(
                Group::ALL,
                Group::from_bits_truncate(mask.0),
            ));
        if let Some(entity) = self.exclude {
            filter = filter.exclude_rigid_body(entity).exclude_collider(entity);
        }
        filter
    }
}

impl TerrainQuery for RapierTerrain<'_, '_> {
    fn raycast(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        mask: CollisionMask,
    ) -> Option<SurfaceHit> {
        let (entity, intersection) = self.context.cast_ray_and_get_normal(
            origin,
            direction,
            max_distance,
            true,
            self.filter(mask),
        )?;
        // Rays starting inside a solid report no normal.
        let normal = if intersection.normal.length_squared() > 0.0 {
            intersection.normal
        } else {
            -direction
        };
        let flags = (self.flags)(entity);
        // One-way surfaces only stop rays falling onto their top face.
        if flags.one_way && !(normal.y > 0.0 && normal.dot(direction) < 0.0) {
            return None;
        }
        Some(
            SurfaceHit::new(
                intersection.time_of_impact,
                normal,
                intersection.point,
                Some(entity),
            )
            .with_flags(flags),
        )
    }

    fn overlap_box(&self, center: Vec2, size: Vec2, mask: CollisionMask) -> Vec<Entity> {
        let shape = Collider::cuboid(size.x / 2.0, size.y / 2.0);
        let mut found = Vec::new();
        self.context
            .intersections_with_shape(center, 0.0, &shape, self.filter(mask), |entity| {
                found.push(entity);
                true
            });
        found
    }
}

fn rapier_player_tick(
    rapier_context: ReadRapierContext,
    time: Res<Time<Fixed>>,
    stage: Res<StageContext>,
    surfaces: Query<(Has<OneWaySurface>, Has<InteractiveSurface>)>,
    mut players: Query<(Entity, &mut Player, &PlayerInput)>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };
    let ctx = tick_context(&time, &stage);
    let flags = |entity: Entity| match surfaces.get(entity) {
        Ok((one_way, interactive)) => SurfaceFlags {
            one_way,
            interactive,
        },
        Err(_) => SurfaceFlags::SOLID,
    };

    for (entity, mut player, input) in &mut players {
        let terrain = RapierTerrain::new(&context)
            .excluding(entity)
            .with_flags(&flags);
        simulate_player(entity, &mut player, input, &ctx, &terrain);
    }
}

/// Bundle of Rapier components for a sensor-driven player.
///
/// The body is position-based kinematic: the controller moves it, and other
/// dynamic bodies and sensors still see its collider.
#[derive(Bundle)]
pub struct Rapier2dPlayerBundle {
    /// Always [`RigidBody::KinematicPositionBased`].
    pub rigid_body: RigidBody,
    /// Box matching the build's standing radii.
    pub collider: Collider,
    pub active_events: ActiveEvents,
}

impl Rapier2dPlayerBundle {
    /// Bundle sized for `build`.
    pub fn new(build: &CharacterBuild) -> Self {
        Self {
            rigid_body: RigidBody::KinematicPositionBased,
            collider: Collider::cuboid(build.width_radius, build.height_radius),
            active_events: ActiveEvents::COLLISION_EVENTS,
        }
    }
}

impl Default for Rapier2dPlayerBundle {
    fn default() -> Self {
        Self::new(&CharacterBuild::default())
    }
}

#[cfg(test)]
mod tests {
    use bevy::ecs::system::RunSystemOnce;

    use super::*;

    fn create_test_app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(TransformPlugin);
        app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default());
        app.insert_resource(Time::<Fixed>::from_hz(60.0));
        app
    }

    fn spawn_floor(app: &mut App) -> Entity {
        app.world_mut()
            .spawn((
                Transform::from_xyz(0.0, -50.0, 0.0),
                RigidBody::Fixed,
                Collider::cuboid(500.0, 50.0),
            ))
            .id()
    }

    #[test]
    fn rapier_backend_get_position() {
        let mut app = create_test_app();

        let entity = app
            .world_mut()
            .spawn((Transform::from_xyz(100.0, 200.0, 0.0), RigidBody::Fixed))
            .id();

        app.update();

        let pos = Rapier2dBackend::get_position(app.world(), entity);
        assert!((pos.x - 100.0).abs() < 0.01);
        assert!((pos.y - 200.0).abs() < 0.01);
    }

    #[test]
    fn terrain_ray_hits_collider_top() {
        let mut app = create_test_app();
        let floor = spawn_floor(&mut app);
        app.update();
        app.update();

        let hit = app
            .world_mut()
            .run_system_once(|rapier_context: ReadRapierContext| {
                let context = rapier_context.single().ok()?;
                RapierTerrain::new(&context).raycast(
                    Vec2::new(0.0, 20.0),
                    Vec2::NEG_Y,
                    100.0,
                    CollisionMask::ALL,
                )
            })
            .expect("system ran")
            .expect("floor below");

        assert_eq!(hit.entity, Some(floor));
        assert!((hit.distance - 20.0).abs() < 0.01);
        assert!((hit.normal - Vec2::Y).length() < 1.0e-3);
    }

    #[test]
    fn excluded_entity_is_invisible() {
        let mut app = create_test_app();
        let floor = spawn_floor(&mut app);
        app.update();
        app.update();

        let hit = app
            .world_mut()
            .run_system_once(move |rapier_context: ReadRapierContext| {
                let context = rapier_context.single().ok()?;
                RapierTerrain::new(&context).excluding(floor).raycast(
                    Vec2::new(0.0, 20.0),
                    Vec2::NEG_Y,
                    100.0,
                    CollisionMask::ALL,
                )
            })
            .expect("system ran");
        assert!(hit.is_none());
    }

    #[test]
    fn player_bundle_is_kinematic() {
        let mut app = create_test_app();
        let entity = app
            .world_mut()
            .spawn((Transform::default(), Rapier2dPlayerBundle::default()))
            .id();
        app.update();
        assert_eq!(
            app.world().get::<RigidBody>(entity),
            Some(&RigidBody::KinematicPositionBased)
        );
        assert!(app.world().get::<Collider>(entity).is_some());
    }
}
