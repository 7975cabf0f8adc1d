//! Damage reactions. Neither action launches on its own; game code starts
//! them through [`Player::hurt`](crate::player::Player::hurt) and
//! [`Player::kill`](crate::player::Player::kill).

use bevy::prelude::*;

use crate::config::PhysicsConfig;

use super::action::{
    ActionContext, ActionKind, ActionType, GroundMovement, HedgeAction, MovementProfile,
};

/// Knocked back after taking damage. Ends on landing and starts the
/// invulnerability window.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hurt;

impl HedgeAction for Hurt {
    fn kind(&self) -> ActionKind {
        ActionKind::Hurt
    }

    fn launch_condition(&self, _ctx: &ActionContext) -> bool {
        false
    }

    fn on_start(&mut self, ctx: &mut ActionContext) {
        let knockback = ctx.physics.hurt_knockback;
        let body = &mut *ctx.body;
        body.velocity = Vec2::new(-body.facing * knockback.x, knockback.y);
        body.ground_velocity = 0.0;
        body.detach();
    }

    fn exit_condition(&self, ctx: &ActionContext) -> bool {
        ctx.body.grounded
    }

    fn on_end(&mut self, ctx: &mut ActionContext) -> Option<ActionKind> {
        let body = &mut *ctx.body;
        body.velocity = Vec2::ZERO;
        body.ground_velocity = 0.0;
        body.invulnerability.start(ctx.physics.invulnerability_ticks);
        None
    }

    fn movement(&self, physics: &PhysicsConfig) -> MovementProfile {
        MovementProfile::RUNNING
            .with_gravity(physics.hurt_gravity)
            .without_air_control()
    }

    fn clone_action(&self) -> Box<dyn HedgeAction> {
        Box::new(*self)
    }
}

impl ActionType for Hurt {
    const KIND: ActionKind = ActionKind::Hurt;
}

/// Pop up and fall through the level. Never ends by itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Die;

impl HedgeAction for Die {
    fn kind(&self) -> ActionKind {
        ActionKind::Die
    }

    fn launch_condition(&self, _ctx: &ActionContext) -> bool {
        false
    }

    fn on_start(&mut self, ctx: &mut ActionContext) {
        let body = &mut *ctx.body;
        body.velocity = Vec2::new(0.0, ctx.physics.death_velocity);
        body.ground_velocity = 0.0;
        body.detach();
        body.ground_angle = 0.0;
        ctx.sensors.clear();
    }

    fn exit_condition(&self, _ctx: &ActionContext) -> bool {
        false
    }

    fn movement(&self, _physics: &PhysicsConfig) -> MovementProfile {
        MovementProfile {
            ground: GroundMovement::Scripted,
            air_control: false,
            gravity: None,
            collides: false,
        }
    }

    fn clone_action(&self) -> Box<dyn HedgeAction> {
        Box::new(*self)
    }
}

impl ActionType for Die {
    const KIND: ActionKind = ActionKind::Die;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EmptyTerrain;
    use crate::body::PlayerBody;
    use crate::config::TickContext;
    use crate::intent::PlayerInput;
    use crate::sensors::Sensors;

    #[test]
    fn hurt_knocks_back_and_grants_invulnerability() {
        let mut body = PlayerBody::at(Vec2::ZERO);
        body.grounded = true;
        body.ground_velocity = 5.0;
        let mut sensors = Sensors::default();
        let input = PlayerInput::new();
        let physics = PhysicsConfig::default();
        let tick = TickContext::default();
        let mut ctx =
            ActionContext::new(&mut body, &mut sensors, &input, &physics, &tick, &EmptyTerrain);

        let mut hurt = Hurt;
        hurt.on_start(&mut ctx);
        assert!(!ctx.body.grounded);
        assert_eq!(ctx.body.velocity, Vec2::new(-2.0, 4.0));
        assert!(!hurt.exit_condition(&ctx));

        ctx.body.grounded = true;
        assert!(hurt.exit_condition(&ctx));
        assert_eq!(hurt.on_end(&mut ctx), None);
        assert_eq!(ctx.body.velocity, Vec2::ZERO);
        assert_eq!(ctx.body.invulnerability.remaining(), physics.invulnerability_ticks);
    }

    #[test]
    fn death_ignores_collision() {
        let profile = Die.movement(&PhysicsConfig::default());
        assert!(!profile.collides);
        assert_eq!(profile.gravity, None);
    }
}
