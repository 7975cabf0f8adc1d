//! Sub-actions that ride on a jump.

use crate::config::PhysicsConfig;
use crate::intent::ActionButton;
use crate::math::round_angle;
use crate::state::{BodySize, TickCountdown};

use super::action::{ActionContext, ActionKind, ActionRole, ActionType, HedgeAction};

/// Ticks the insta-shield stays active.
pub const INSTA_SHIELD_TICKS: u32 = 14;

/// Charge a dash mid-jump by holding the button; landing while charged
/// releases it into a roll.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropDash {
    charge_ticks: u32,
}

impl DropDash {
    /// Whether the dash releases on landing.
    pub fn charged(&self, physics: &PhysicsConfig) -> bool {
        self.charge_ticks >= physics.drop_dash_charge_ticks
    }

    /// Ground speed after a release at `ground_velocity` on a surface of
    /// `ground_angle`, dashing toward `direction`.
    pub fn release_speed(
        physics: &PhysicsConfig,
        ground_velocity: f32,
        ground_angle: f32,
        direction: f32,
    ) -> f32 {
        let dash = direction * physics.drop_dash_speed;
        let speed = if ground_velocity * direction >= 0.0 {
            ground_velocity / 4.0 + dash
        } else if round_angle(ground_angle) == 0.0 {
            dash
        } else {
            ground_velocity / 2.0 + dash
        };
        speed.clamp(-physics.drop_dash_max_speed, physics.drop_dash_max_speed)
    }
}

impl HedgeAction for DropDash {
    fn kind(&self) -> ActionKind {
        ActionKind::DropDash
    }

    fn role(&self) -> ActionRole {
        ActionRole::Sub {
            parent: ActionKind::Jump,
        }
    }

    fn can_perform(&self, ctx: &ActionContext) -> bool {
        !ctx.body.grounded
    }

    fn launch_condition(&self, ctx: &ActionContext) -> bool {
        ctx.input.pressed(ActionButton::Jump)
    }

    fn on_start(&mut self, _ctx: &mut ActionContext) {
        self.charge_ticks = 0;
    }

    fn perform(&mut self, ctx: &mut ActionContext) {
        if ctx.input.held(ActionButton::Jump) {
            self.charge_ticks = self.charge_ticks.saturating_add(1);
        }
    }

    fn exit_condition(&self, ctx: &ActionContext) -> bool {
        ctx.body.grounded || !ctx.input.held(ActionButton::Jump)
    }

    fn on_end(&mut self, ctx: &mut ActionContext) -> Option<ActionKind> {
        if !ctx.body.grounded || !self.charged(ctx.physics) {
            return None;
        }
        ctx.body.face(ctx.input.horizontal());
        let body = &mut *ctx.body;
        body.ground_velocity =
            Self::release_speed(ctx.physics, body.ground_velocity, body.ground_angle, body.facing);
        Some(ActionKind::Roll)
    }

    fn reset(&mut self) {
        self.charge_ticks = 0;
    }

    fn body_size(&self) -> BodySize {
        BodySize::Shrunk
    }

    fn attacking(&self) -> bool {
        true
    }

    fn clone_action(&self) -> Box<dyn HedgeAction> {
        Box::new(Self::default())
    }
}

impl ActionType for DropDash {
    const KIND: ActionKind = ActionKind::DropDash;
}

/// Short attack burst that widens the jump's reach.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstaShield {
    timer: TickCountdown,
}

impl HedgeAction for InstaShield {
    fn kind(&self) -> ActionKind {
        ActionKind::InstaShield
    }

    fn role(&self) -> ActionRole {
        ActionRole::Sub {
            parent: ActionKind::Jump,
        }
    }

    fn can_perform(&self, ctx: &ActionContext) -> bool {
        !ctx.body.grounded
    }

    fn launch_condition(&self, ctx: &ActionContext) -> bool {
        ctx.input.pressed(ActionButton::Special)
    }

    fn on_start(&mut self, _ctx: &mut ActionContext) {
        self.timer.start(INSTA_SHIELD_TICKS);
    }

    fn perform(&mut self, _ctx: &mut ActionContext) {
        self.timer.tick();
    }

    fn exit_condition(&self, ctx: &ActionContext) -> bool {
        ctx.body.grounded || !self.timer.is_running()
    }

    fn reset(&mut self) {
        self.timer.stop();
    }

    fn body_size(&self) -> BodySize {
        BodySize::Shrunk
    }

    fn attacking(&self) -> bool {
        true
    }

    fn clone_action(&self) -> Box<dyn HedgeAction> {
        Box::new(Self::default())
    }
}

impl ActionType for InstaShield {
    const KIND: ActionKind = ActionKind::InstaShield;
}
