//! Bevy systems driving [`Player`] components.
//!
//! Backends own the simulation system because only they know where the
//! terrain lives; they call [`simulate_player`] for each character. The
//! systems here place new players, write results back through the backend
//! and keep the marker components in sync.

use bevy::prelude::*;

use crate::backend::{CharacterPhysicsBackend, TerrainQuery};
use crate::collision::SensorHitSide;
use crate::config::{StageContext, TickContext};
use crate::intent::PlayerInput;
use crate::player::Player;
use crate::sensors::PlayerCollisionInfo;
use crate::state::{Airborne, Grounded, TouchingWall};

/// Build the tick context for the current fixed step.
///
/// Falls back to the configured timestep when the fixed clock has not
/// advanced yet, e.g. when a test runs `FixedUpdate` by hand.
pub fn tick_context(time: &Time<Fixed>, stage: &StageContext) -> TickContext {
    let delta = time.delta_secs();
    let delta = if delta > 0.0 {
        delta
    } else {
        time.timestep().as_secs_f32()
    };
    TickContext::new(delta, *stage)
}

/// Advance one player by one tick.
///
/// An action-machine error never aborts the frame: it is logged and the
/// player's actions are reset.
pub fn simulate_player(
    entity: Entity,
    player: &mut Player,
    input: &PlayerInput,
    ctx: &TickContext,
    terrain: &dyn TerrainQuery,
) {
    match player.tick(ctx, input, terrain) {
        Ok(report) => {
            if report.primary_changed {
                trace!("{entity}: primary action now {:?}", report.primary);
            }
        }
        Err(err) => {
            error!("{entity}: {err}, resetting actions");
            player.reset_actions();
        }
    }
}

/// Place newly added players at their transform.
pub fn init_player_positions(mut players: Query<(&mut Player, &Transform), Added<Player>>) {
    for (mut player, transform) in &mut players {
        player.set_entity_position(transform.translation.truncate());
    }
}

/// Write each player's simulated position and ground rotation back through
/// the backend.
pub fn apply_player_transforms<B: CharacterPhysicsBackend>(world: &mut World) {
    let updates: Vec<(Entity, Vec2, f32)> = world
        .query::<(Entity, &Player)>()
        .iter(world)
        .map(|(entity, player)| {
            (
                entity,
                player.entity_position(),
                player.visual_rotation(),
            )
        })
        .collect();

    for (entity, position, rotation) in updates {
        B::set_position(world, entity, position);
        B::set_rotation(world, entity, rotation);
    }
}

/// Roll input signals over once the tick has consumed them.
pub fn advance_inputs(mut inputs: Query<&mut PlayerInput>) {
    for mut input in &mut inputs {
        input.advance();
    }
}

/// Sync [`Grounded`], [`Airborne`] and [`TouchingWall`] with the simulation.
pub fn sync_state_markers(
    mut commands: Commands,
    q_players: Query<(
        Entity,
        &Player,
        Has<Grounded>,
        Has<Airborne>,
        Has<TouchingWall>,
    )>,
) {
    for (entity, player, has_grounded, has_airborne, has_wall) in &q_players {
        let grounded = player.body.grounded;
        if grounded && !has_grounded {
            commands.entity(entity).insert(Grounded);
            commands.entity(entity).remove::<Airborne>();
        } else if !grounded && has_grounded {
            commands.entity(entity).remove::<Grounded>();
            commands.entity(entity).insert(Airborne);
        } else if !grounded && !has_airborne && !has_grounded {
            commands.entity(entity).insert(Airborne);
        }

        let wall = player.sensors().wall();
        let side = wall.pushing();
        if side != SensorHitSide::None {
            let direction = side.sign();
            let normal = wall
                .info()
                .hit()
                .map(|hit| hit.normal)
                .unwrap_or(Vec2::new(-direction, 0.0));
            // Re-inserting replaces a stale side or normal.
            commands
                .entity(entity)
                .insert(TouchingWall::new(direction, normal));
        } else if has_wall {
            commands.entity(entity).remove::<TouchingWall>();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn tick_context_falls_back_to_timestep() {
        let time = Time::<Fixed>::from_hz(60.0);
        let ctx = tick_context(&time, &StageContext::default());
        assert!((ctx.dt_factor() - 1.0).abs() < 1.0e-4);
    }

    #[test]
    fn tick_context_uses_stage() {
        let time = Time::<Fixed>::from_duration(Duration::from_millis(8));
        let stage = StageContext {
            physics_multiplier: 60.0,
            max_block_size: 8.0,
        };
        let ctx = tick_context(&time, &stage);
        assert_eq!(ctx.max_block_size(), 8.0);
        assert!((ctx.dt_factor() - 0.48).abs() < 1.0e-4);
    }
}
