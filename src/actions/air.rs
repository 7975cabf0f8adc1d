//! Jump and the airborne abilities built on it.

use bevy::prelude::*;

use crate::collision::SensorHitSide;
use crate::config::PhysicsConfig;
use crate::intent::ActionButton;
use crate::sensors::PlayerCollisionInfo;
use crate::state::{BodySize, TickCountdown};

use super::action::{ActionContext, ActionKind, ActionType, HedgeAction, MovementProfile};

/// Fastest rise while flying.
pub const MAX_FLY_RISE: f32 = 1.0;

/// Velocity of a jump off a climbed wall, `x` pointing away from the wall.
pub const WALL_JUMP_VELOCITY: Vec2 = Vec2::new(4.0, 4.0);

/// Fraction of glide speed kept when the glide is released in the air.
const GLIDE_RELEASE_FACTOR: f32 = 0.25;

/// Jump along the surface normal.
///
/// Releasing the button while rising faster than
/// [`PhysicsConfig::jump_release_velocity`] caps the rise, giving variable
/// jump height.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jump {
    from_ground: bool,
}

impl HedgeAction for Jump {
    fn kind(&self) -> ActionKind {
        ActionKind::Jump
    }

    fn can_perform(&self, ctx: &ActionContext) -> bool {
        ctx.body.grounded
            && !matches!(
                ctx.active.primary,
                Some(
                    ActionKind::Jump
                        | ActionKind::Crouch
                        | ActionKind::Spindash
                        | ActionKind::Hurt
                        | ActionKind::Die
                )
            )
    }

    fn launch_condition(&self, ctx: &ActionContext) -> bool {
        ctx.input.pressed(ActionButton::Jump) && !ctx.sensors.low_ceiling()
    }

    fn on_start(&mut self, ctx: &mut ActionContext) {
        self.from_ground = ctx.body.grounded;
        if !ctx.body.grounded {
            return;
        }
        let body = &mut *ctx.body;
        body.velocity = body.ground_velocity_vector() + body.up() * ctx.physics.jump_velocity;
        body.detach();
        debug!("jump launched at {:?}", body.velocity);
    }

    fn perform(&mut self, ctx: &mut ActionContext) {
        let cap = ctx.physics.jump_release_velocity;
        if self.from_ground && !ctx.input.held(ActionButton::Jump) && ctx.body.velocity.y > cap {
            ctx.body.velocity.y = cap;
        }
    }

    fn exit_condition(&self, ctx: &ActionContext) -> bool {
        ctx.body.grounded
    }

    fn reset(&mut self) {
        self.from_ground = false;
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

impl ActionType for Jump {
    const KIND: ActionKind = ActionKind::Jump;
}

/// Fly by flapping out of a jump until tired.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fly {
    stamina: TickCountdown,
}

impl Fly {
    /// Out of flight time; the character only sinks.
    pub fn tired(&self) -> bool {
        !self.stamina.is_running()
    }
}

impl HedgeAction for Fly {
    fn kind(&self) -> ActionKind {
        ActionKind::Fly
    }

    fn can_perform(&self, ctx: &ActionContext) -> bool {
        !ctx.body.grounded && ctx.active.primary == Some(ActionKind::Jump)
    }

    fn launch_condition(&self, ctx: &ActionContext) -> bool {
        ctx.input.pressed(ActionButton::Jump)
    }

    fn on_start(&mut self, ctx: &mut ActionContext) {
        self.stamina.start(ctx.physics.fly_ticks);
    }

    fn perform(&mut self, ctx: &mut ActionContext) {
        if self.stamina.tick() {
            debug!("flight stamina ran out");
        }
        if !self.tired() && ctx.input.held(ActionButton::Jump) {
            let lift = ctx.physics.fly_lift * ctx.ctx.dt_factor();
            ctx.body.velocity.y = (ctx.body.velocity.y + lift).min(MAX_FLY_RISE);
        }
    }

    fn exit_condition(&self, ctx: &ActionContext) -> bool {
        ctx.body.grounded
    }

    fn reset(&mut self) {
        self.stamina.stop();
    }

    fn movement(&self, physics: &PhysicsConfig) -> MovementProfile {
        MovementProfile::RUNNING.with_gravity(physics.fly_gravity)
    }

    fn clone_action(&self) -> Box<dyn HedgeAction> {
        Box::new(Self::default())
    }
}

impl ActionType for Fly {
    const KIND: ActionKind = ActionKind::Fly;
}

/// Glide out of a jump while the button stays held. Gliding into a wall
/// grabs it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Glide {
    speed: f32,
}

impl Glide {
    pub fn speed(&self) -> f32 {
        self.speed
    }
}

impl HedgeAction for Glide {
    fn kind(&self) -> ActionKind {
        ActionKind::Glide
    }

    fn can_perform(&self, ctx: &ActionContext) -> bool {
        !ctx.body.grounded && ctx.active.primary == Some(ActionKind::Jump)
    }

    fn launch_condition(&self, ctx: &ActionContext) -> bool {
        ctx.input.pressed(ActionButton::Jump)
    }

    fn on_start(&mut self, ctx: &mut ActionContext) {
        self.speed = ctx.physics.glide_speed;
        let body = &mut *ctx.body;
        body.velocity = Vec2::new(body.facing * self.speed, body.velocity.y.min(0.0));
    }

    fn perform(&mut self, ctx: &mut ActionContext) {
        let dt = ctx.ctx.dt_factor();
        let physics = ctx.physics;
        let turn = ctx.input.horizontal();
        if turn != 0.0 && turn != ctx.body.facing {
            ctx.body.face(turn);
            self.speed = physics.glide_speed;
        } else {
            self.speed = (self.speed + physics.glide_acceleration * dt).min(physics.glide_top_speed);
        }
        let fall = (ctx.body.velocity.y - physics.gravity * dt).max(-physics.glide_fall_speed);
        ctx.body.velocity = Vec2::new(ctx.body.facing * self.speed, fall);
    }

    fn exit_condition(&self, ctx: &ActionContext) -> bool {
        ctx.body.grounded
            || !ctx.input.held(ActionButton::Jump)
            || ctx.sensors.wall().pushing() != SensorHitSide::None
    }

    fn on_end(&mut self, ctx: &mut ActionContext) -> Option<ActionKind> {
        if ctx.body.grounded {
            return None;
        }
        if ctx.sensors.wall().pushing() != SensorHitSide::None {
            return Some(ActionKind::Climb);
        }
        ctx.body.velocity.x *= GLIDE_RELEASE_FACTOR;
        None
    }

    fn reset(&mut self) {
        self.speed = 0.0;
    }

    fn attacking(&self) -> bool {
        true
    }

    fn movement(&self, _physics: &PhysicsConfig) -> MovementProfile {
        MovementProfile::SCRIPTED
    }

    fn clone_action(&self) -> Box<dyn HedgeAction> {
        Box::new(Self::default())
    }
}

impl ActionType for Glide {
    const KIND: ActionKind = ActionKind::Glide;
}

/// Cling to a wall and climb it. Only started as a glide follow-up.
#[derive(Debug, Clone, Copy, Default)]
pub struct Climb {
    /// Direction toward the wall.
    side: f32,
}

impl Climb {
    pub fn side(&self) -> f32 {
        self.side
    }

    /// The wall sensors still touch a wall on the climbed side.
    fn on_wall(&self, ctx: &ActionContext) -> bool {
        ctx.sensors.wall().info().side().sign() == self.side
    }
}

impl HedgeAction for Climb {
    fn kind(&self) -> ActionKind {
        ActionKind::Climb
    }

    fn launch_condition(&self, _ctx: &ActionContext) -> bool {
        false
    }

    fn on_start(&mut self, ctx: &mut ActionContext) {
        let side = ctx.sensors.wall().pushing().sign();
        self.side = if side == 0.0 { ctx.body.facing } else { side };
        ctx.body.face(self.side);
        // Lean into the wall so the wall sensors keep reporting it.
        ctx.body.velocity = Vec2::new(self.side, 0.0);
    }

    fn perform(&mut self, ctx: &mut ActionContext) {
        let climb = ctx.input.direction.y as f32 * ctx.physics.climb_speed;
        ctx.body.velocity = Vec2::new(self.side, climb);
    }

    fn exit_condition(&self, ctx: &ActionContext) -> bool {
        ctx.input.pressed(ActionButton::Jump) || ctx.body.grounded || !self.on_wall(ctx)
    }

    fn on_end(&mut self, ctx: &mut ActionContext) -> Option<ActionKind> {
        if ctx.body.grounded || !ctx.input.pressed(ActionButton::Jump) {
            return None;
        }
        let away = -self.side;
        ctx.body.velocity = Vec2::new(away * WALL_JUMP_VELOCITY.x, WALL_JUMP_VELOCITY.y);
        ctx.body.face(away);
        Some(ActionKind::Jump)
    }

    fn reset(&mut self) {
        self.side = 0.0;
    }

    fn movement(&self, _physics: &PhysicsConfig) -> MovementProfile {
        MovementProfile::SCRIPTED
    }

    fn clone_action(&self) -> Box<dyn HedgeAction> {
        Box::new(Self::default())
    }
}

impl ActionType for Climb {
    const KIND: ActionKind = ActionKind::Climb;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActiveActions;
    use crate::backend::EmptyTerrain;
    use crate::body::PlayerBody;
    use crate::config::TickContext;
    use crate::intent::PlayerInput;
    use crate::sensors::Sensors;

    #[test]
    fn jump_follows_surface_normal() {
        let mut body = PlayerBody::at(Vec2::new(0.0, 19.0));
        body.grounded = true;
        body.ground_angle = 90.0;
        let mut sensors = Sensors::default();
        let input = PlayerInput::new().with_button(ActionButton::Jump, true);
        let physics = PhysicsConfig::default();
        let tick = TickContext::default();
        let mut ctx =
            ActionContext::new(&mut body, &mut sensors, &input, &physics, &tick, &EmptyTerrain);

        let mut jump = Jump::default();
        assert!(jump.can_perform(&ctx));
        assert!(jump.launch_condition(&ctx));
        jump.on_start(&mut ctx);

        assert!(!ctx.body.grounded);
        assert!((ctx.body.velocity - Vec2::new(6.5, 0.0)).length() < 1.0e-4);
    }

    #[test]
    fn releasing_jump_caps_rise() {
        let mut body = PlayerBody::at(Vec2::ZERO);
        body.grounded = true;
        let mut sensors = Sensors::default();
        let input = PlayerInput::new();
        let physics = PhysicsConfig::default();
        let tick = TickContext::default();
        let mut ctx =
            ActionContext::new(&mut body, &mut sensors, &input, &physics, &tick, &EmptyTerrain);

        let mut jump = Jump::default();
        jump.on_start(&mut ctx);
        assert_eq!(ctx.body.velocity.y, 6.5);
        jump.perform(&mut ctx);
        assert_eq!(ctx.body.velocity.y, physics.jump_release_velocity);
    }

    #[test]
    fn crouching_blocks_jump() {
        let mut body = PlayerBody::at(Vec2::ZERO);
        body.grounded = true;
        let mut sensors = Sensors::default();
        let input = PlayerInput::new();
        let physics = PhysicsConfig::default();
        let tick = TickContext::default();
        let mut ctx =
            ActionContext::new(&mut body, &mut sensors, &input, &physics, &tick, &EmptyTerrain);
        ctx.active = ActiveActions {
            primary: Some(ActionKind::Crouch),
            sub: None,
        };
        assert!(!Jump::default().can_perform(&ctx));
    }

    #[test]
    fn flight_lifts_until_tired() {
        let mut body = PlayerBody::at(Vec2::ZERO);
        body.velocity = Vec2::new(0.0, -2.0);
        let mut sensors = Sensors::default();
        let input = PlayerInput::new().with_button(ActionButton::Jump, true);
        let physics = PhysicsConfig {
            fly_ticks: 2,
            ..PhysicsConfig::default()
        };
        let tick = TickContext::default();
        let mut ctx =
            ActionContext::new(&mut body, &mut sensors, &input, &physics, &tick, &EmptyTerrain);

        let mut fly = Fly::default();
        fly.on_start(&mut ctx);
        fly.perform(&mut ctx);
        assert!((ctx.body.velocity.y + 1.875).abs() < 1.0e-5);
        fly.perform(&mut ctx);
        assert!(fly.tired());
        assert!((ctx.body.velocity.y + 1.875).abs() < 1.0e-5);
    }

    #[test]
    fn glide_holds_speed_and_sinks_slowly() {
        let mut body = PlayerBody::at(Vec2::ZERO);
        body.velocity = Vec2::new(1.0, 3.0);
        let mut sensors = Sensors::default();
        let input = PlayerInput::new().with_button(ActionButton::Jump, true);
        let physics = PhysicsConfig::default();
        let tick = TickContext::default();
        let mut ctx =
            ActionContext::new(&mut body, &mut sensors, &input, &physics, &tick, &EmptyTerrain);

        let mut glide = Glide::default();
        glide.on_start(&mut ctx);
        assert_eq!(ctx.body.velocity, Vec2::new(4.0, 0.0));
        for _ in 0..10 {
            glide.perform(&mut ctx);
        }
        assert_eq!(ctx.body.velocity.y, -physics.glide_fall_speed);
        assert!(glide.speed() > physics.glide_speed);
        assert!(!glide.exit_condition(&ctx));
    }
}
