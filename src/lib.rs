//! # `hedge_controller`
//!
//! A sensor-based 2D platformer movement core with physics backend
//! abstraction.
//!
//! This crate provides classic "sensor" platformer physics:
//! - Six raycasts around the body resolve ground, ceiling and walls
//! - Grounded motion is a scalar ground speed projected onto the surface
//! - Ledge detection keeps a single supporting ray from snapping past an edge
//! - Curved landings are smoothed by interpolating the landing angle
//! - Fast bodies are sub-stepped so they never tunnel through thin terrain
//! - A primary/sub action state machine drives jumps, rolls, spindashes...
//! - Terrain queries are abstracted (segment terrain and Rapier2D included)
//!
//! ## Architecture
//!
//! Each fixed tick a [`player::Player`]:
//! 1. Applies ground or air movement rules for the current action's profile
//! 2. Moves through the [`sensors::Sensors`], which resolve every contact
//! 3. Updates its [`actions::ActionManager`]
//! 4. Syncs body size and clamps speed
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use hedge_controller::prelude::*;
//!
//! let mut terrain = SegmentTerrain::new();
//! terrain.add_box(Vec2::new(0.0, -50.0), Vec2::new(500.0, 50.0));
//!
//! let mut player = Player::sonic().with_center(Vec2::new(0.0, 19.0));
//! let mut input = PlayerInput::new();
//! input.set_direction(1, 0);
//!
//! let ctx = TickContext::default();
//! player.tick(&ctx, &input, &terrain).unwrap();
//! assert!(player.body.ground_velocity > 0.0);
//! ```

use bevy::prelude::*;

pub mod actions;
pub mod backend;
pub mod body;
pub mod collision;
pub mod config;
pub mod intent;
pub mod math;
pub mod player;
pub mod sensors;
pub mod state;
pub mod systems;
pub mod terrain;

#[cfg(feature = "rapier2d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::actions::{
        ActionContext, ActionError, ActionKind, ActionManager, ActionRole, ActionType, Climb,
        Crouch, Die, DropDash, Fly, Glide, HedgeAction, Hurt, InstaShield, Jump, LookUp,
        MovementProfile, Roll, Spindash,
    };
    pub use crate::backend::{CharacterPhysicsBackend, CollisionMask, EmptyTerrain, TerrainQuery};
    pub use crate::body::PlayerBody;
    pub use crate::collision::{CollisionInfo, SensorHitSide, SurfaceFlags, SurfaceHit};
    pub use crate::config::{
        CharacterBuild, PhysicsConfig, SensorConfig, StageContext, TickContext,
    };
    pub use crate::intent::{ActionButton, ButtonPhase, PlayerInput};
    pub use crate::player::{Player, TickReport};
    pub use crate::state::{Airborne, BodySize, GroundMode, Grounded, TouchingWall};
    pub use crate::terrain::{SegmentTerrain, SegmentTerrainBackend, TerrainResource};
    pub use crate::{HedgeControllerPlugin, HedgeControllerSet};

    #[cfg(feature = "rapier2d")]
    pub use crate::rapier::{Rapier2dBackend, Rapier2dPlayerBundle};
}

/// Ordering of the controller's work inside `FixedUpdate`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HedgeControllerSet {
    /// Write [`intent::PlayerInput`] here.
    Input,
    /// Backends tick every player against their terrain.
    Simulation,
    /// Transforms and marker components are updated.
    Sync,
}

/// Main plugin for the character controller system.
///
/// This plugin is generic over a physics backend `B` which provides the
/// terrain the sensors query and the way positions reach the engine.
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier2dBackend`)
///
/// # Examples
///
/// With Rapier2D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier2d::prelude::*;
/// use hedge_controller::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(HedgeControllerPlugin::<Rapier2dBackend>::default())
///     .run();
/// ```
pub struct HedgeControllerPlugin<B: backend::CharacterPhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::CharacterPhysicsBackend> Default for HedgeControllerPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::CharacterPhysicsBackend> Plugin for HedgeControllerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::CharacterBuild>();
        app.register_type::<config::PhysicsConfig>();
        app.register_type::<config::SensorConfig>();
        app.register_type::<config::StageContext>();
        app.register_type::<intent::PlayerInput>();
        app.register_type::<intent::ActionButton>();
        app.register_type::<body::PlayerBody>();
        app.register_type::<state::GroundMode>();
        app.register_type::<state::BodySize>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<state::TouchingWall>();

        app.init_resource::<config::StageContext>();

        app.configure_sets(
            FixedUpdate,
            (
                HedgeControllerSet::Input,
                HedgeControllerSet::Simulation,
                HedgeControllerSet::Sync,
            )
                .chain(),
        );

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.add_systems(
            FixedUpdate,
            systems::init_player_positions.before(HedgeControllerSet::Simulation),
        );
        app.add_systems(
            FixedUpdate,
            (
                systems::apply_player_transforms::<B>,
                systems::sync_state_markers,
                systems::advance_inputs,
            )
                .chain()
                .in_set(HedgeControllerSet::Sync),
        );
    }
}
