//! Grounded actions: roll, crouch, look up and spindash.

use crate::intent::ActionButton;
use crate::state::BodySize;

use super::action::{ActionContext, ActionKind, ActionType, HedgeAction, MovementProfile};
use crate::config::PhysicsConfig;

/// Curl into a ball while running.
///
/// Starts with down held, no horizontal input and enough ground speed. Ends
/// once the body is grounded, slow and has headroom to stand up.
#[derive(Debug, Clone, Copy, Default)]
pub struct Roll;

impl HedgeAction for Roll {
    fn kind(&self) -> ActionKind {
        ActionKind::Roll
    }

    fn can_perform(&self, ctx: &ActionContext) -> bool {
        ctx.body.grounded && ctx.active.primary.is_none()
    }

    fn launch_condition(&self, ctx: &ActionContext) -> bool {
        ctx.input.down()
            && ctx.input.horizontal() == 0.0
            && ctx.body.ground_velocity.abs() >= ctx.physics.roll_min_speed
    }

    fn exit_condition(&self, ctx: &ActionContext) -> bool {
        ctx.body.grounded
            && ctx.body.ground_velocity.abs() < ctx.physics.unroll_speed
            && !ctx.sensors.low_ceiling()
    }

    fn body_size(&self) -> BodySize {
        BodySize::Shrunk
    }

    fn attacking(&self) -> bool {
        true
    }

    fn movement(&self, _physics: &PhysicsConfig) -> MovementProfile {
        MovementProfile::ROLLING
    }

    fn clone_action(&self) -> Box<dyn HedgeAction> {
        Box::new(*self)
    }
}

impl ActionType for Roll {
    const KIND: ActionKind = ActionKind::Roll;
}

/// Duck while standing still.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crouch;

impl HedgeAction for Crouch {
    fn kind(&self) -> ActionKind {
        ActionKind::Crouch
    }

    fn can_perform(&self, ctx: &ActionContext) -> bool {
        ctx.body.grounded && ctx.active.primary.is_none()
    }

    fn launch_condition(&self, ctx: &ActionContext) -> bool {
        ctx.input.down() && ctx.body.ground_velocity.abs() < ctx.physics.roll_min_speed
    }

    fn exit_condition(&self, ctx: &ActionContext) -> bool {
        !ctx.input.down() || !ctx.body.grounded
    }

    fn movement(&self, _physics: &PhysicsConfig) -> MovementProfile {
        MovementProfile::BRACED
    }

    fn clone_action(&self) -> Box<dyn HedgeAction> {
        Box::new(*self)
    }
}

impl ActionType for Crouch {
    const KIND: ActionKind = ActionKind::Crouch;
}

/// Look up while standing still.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookUp;

impl HedgeAction for LookUp {
    fn kind(&self) -> ActionKind {
        ActionKind::LookUp
    }

    fn can_perform(&self, ctx: &ActionContext) -> bool {
        ctx.body.grounded && ctx.active.primary.is_none()
    }

    fn launch_condition(&self, ctx: &ActionContext) -> bool {
        ctx.input.up() && ctx.body.ground_velocity.abs() < ctx.physics.roll_min_speed
    }

    fn exit_condition(&self, ctx: &ActionContext) -> bool {
        !ctx.input.up() || !ctx.body.grounded
    }

    fn movement(&self, _physics: &PhysicsConfig) -> MovementProfile {
        MovementProfile::BRACED
    }

    fn clone_action(&self) -> Box<dyn HedgeAction> {
        Box::new(*self)
    }
}

impl ActionType for LookUp {
    const KIND: ActionKind = ActionKind::LookUp;
}

/// Rev in place from a crouch, then release into a roll.
///
/// Every jump press adds [`PhysicsConfig::spindash_charge_step`] to the
/// charge; the charge bleeds off by 1/32 per frame otherwise. Releasing down
/// launches at `spindash_base_speed + floor(charge) / 2` in the facing
/// direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spindash {
    charge: f32,
}

impl Spindash {
    pub fn charge(&self) -> f32 {
        self.charge
    }

    /// Launch speed for the current charge.
    pub fn release_speed(&self, physics: &PhysicsConfig) -> f32 {
        physics.spindash_base_speed + self.charge.floor() / 2.0
    }
}

impl HedgeAction for Spindash {
    fn kind(&self) -> ActionKind {
        ActionKind::Spindash
    }

    fn can_perform(&self, ctx: &ActionContext) -> bool {
        ctx.body.grounded && ctx.active.primary == Some(ActionKind::Crouch)
    }

    fn launch_condition(&self, ctx: &ActionContext) -> bool {
        ctx.input.pressed(ActionButton::Jump)
    }

    fn on_start(&mut self, ctx: &mut ActionContext) {
        self.charge = 0.0;
        ctx.body.ground_velocity = 0.0;
    }

    fn perform(&mut self, ctx: &mut ActionContext) {
        if ctx.input.pressed(ActionButton::Jump) {
            self.charge =
                (self.charge + ctx.physics.spindash_charge_step).min(ctx.physics.spindash_max_charge);
        } else {
            self.charge -= self.charge / 32.0 * ctx.ctx.dt_factor();
            self.charge = self.charge.max(0.0);
        }
    }

    fn exit_condition(&self, ctx: &ActionContext) -> bool {
        !ctx.input.down() || !ctx.body.grounded
    }

    fn on_end(&mut self, ctx: &mut ActionContext) -> Option<ActionKind> {
        if !ctx.body.grounded {
            return None;
        }
        ctx.body.ground_velocity = ctx.body.facing * self.release_speed(ctx.physics);
        Some(ActionKind::Roll)
    }

    fn reset(&mut self) {
        self.charge = 0.0;
    }

    fn body_size(&self) -> BodySize {
        BodySize::Shrunk
    }

    fn attacking(&self) -> bool {
        true
    }

    fn movement(&self, _physics: &PhysicsConfig) -> MovementProfile {
        MovementProfile {
            gravity: None,
            ..MovementProfile::SCRIPTED
        }
    }

    fn clone_action(&self) -> Box<dyn HedgeAction> {
        Box::new(Self { charge: 0.0 })
    }
}

impl ActionType for Spindash {
    const KIND: ActionKind = ActionKind::Spindash;
}

#[cfg(test)]
mod tests {
    use bevy::prelude::*;

    use super::*;
    use crate::actions::ActiveActions;
    use crate::backend::EmptyTerrain;
    use crate::body::PlayerBody;
    use crate::config::TickContext;
    use crate::intent::PlayerInput;
    use crate::sensors::Sensors;

    fn grounded(gsp: f32) -> PlayerBody {
        let mut body = PlayerBody::at(Vec2::new(0.0, 19.0));
        body.grounded = true;
        body.ground_velocity = gsp;
        body
    }

    #[test]
    fn roll_needs_speed_and_down() {
        let mut body = grounded(3.0);
        let mut sensors = Sensors::default();
        let input = PlayerInput::new().with_direction(0, -1);
        let physics = PhysicsConfig::default();
        let tick = TickContext::default();
        let ctx = ActionContext::new(&mut body, &mut sensors, &input, &physics, &tick, &EmptyTerrain);

        assert!(Roll.can_perform(&ctx));
        assert!(Roll.launch_condition(&ctx));
        assert!(!Roll.exit_condition(&ctx));
        assert!(!Crouch.launch_condition(&ctx));
    }

    #[test]
    fn slow_body_crouches_instead() {
        let mut body = grounded(0.0);
        let mut sensors = Sensors::default();
        let input = PlayerInput::new().with_direction(0, -1);
        let physics = PhysicsConfig::default();
        let tick = TickContext::default();
        let ctx = ActionContext::new(&mut body, &mut sensors, &input, &physics, &tick, &EmptyTerrain);

        assert!(!Roll.launch_condition(&ctx));
        assert!(Crouch.launch_condition(&ctx));
        assert!(!LookUp.launch_condition(&ctx));
    }

    #[test]
    fn spindash_charges_and_releases_into_roll() {
        let mut body = grounded(0.0);
        body.facing = -1.0;
        let mut sensors = Sensors::default();
        let input = PlayerInput::new()
            .with_direction(0, -1)
            .with_button(ActionButton::Jump, true);
        let physics = PhysicsConfig::default();
        let tick = TickContext::default();
        let mut ctx =
            ActionContext::new(&mut body, &mut sensors, &input, &physics, &tick, &EmptyTerrain);
        ctx.active = ActiveActions {
            primary: Some(ActionKind::Crouch),
            sub: None,
        };

        let mut dash = Spindash::default();
        assert!(dash.can_perform(&ctx));
        dash.on_start(&mut ctx);
        for _ in 0..6 {
            dash.perform(&mut ctx);
        }
        assert_eq!(dash.charge(), physics.spindash_max_charge);

        let follow_up = dash.on_end(&mut ctx);
        assert_eq!(follow_up, Some(ActionKind::Roll));
        assert_eq!(ctx.body.ground_velocity, -(8.0 + 4.0));
    }

    #[test]
    fn spindash_charge_decays() {
        let mut body = grounded(0.0);
        let mut sensors = Sensors::default();
        let input = PlayerInput::new().with_direction(0, -1);
        let physics = PhysicsConfig::default();
        let tick = TickContext::default();
        let mut ctx =
            ActionContext::new(&mut body, &mut sensors, &input, &physics, &tick, &EmptyTerrain);

        let mut dash = Spindash { charge: 8.0 };
        dash.perform(&mut ctx);
        assert!((dash.charge() - 7.75).abs() < 1.0e-5);
    }
}
