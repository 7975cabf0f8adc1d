//! Character integrator.
//!
//! [`Player`] owns one character's kinematic state, sensors and action set,
//! and advances them by one fixed tick in [`Player::tick`]:
//!
//! 1. countdowns (control lock, invulnerability)
//! 2. movement formulas for the current [`MovementProfile`]
//! 3. [`Sensors::update`] moves the body and resolves collisions
//! 4. [`ActionManager::update`] runs the action machine
//! 5. body size and attack state follow the running actions, speeds are
//!    capped

use bevy::prelude::*;

use crate::actions::{
    ActionContext, ActionError, ActionKind, ActionManager, ActionType, Climb, Crouch, Die,
    DropDash, Fly, Glide, GroundMovement, Hurt, InstaShield, Jump, LookUp, MovementProfile, Roll,
    Spindash,
};
use crate::backend::TerrainQuery;
use crate::body::PlayerBody;
use crate::config::{CharacterBuild, PhysicsConfig, SensorConfig, TickContext};
use crate::intent::PlayerInput;
use crate::math::{approach, EPSILON};
use crate::sensors::Sensors;
use crate::state::BodySize;

/// Vertical speed range (exclusive) in which air drag applies.
const AIR_DRAG_MAX_RISE: f32 = 4.0;

/// Horizontal speed below which air drag is skipped.
const AIR_DRAG_MIN_SPEED: f32 = 0.125;

/// Slope steepness beyond which a slow character slips.
const SLIP_ANGLE: f32 = 45.0;

/// What happened during one [`Player::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    /// Became grounded this tick.
    pub landed: bool,
    /// Became airborne this tick.
    pub left_ground: bool,
    /// Too slow for the slope; control lock started.
    pub slipped: bool,
    /// Sub-steps taken when the move ran at high speed.
    pub high_speed_steps: Option<u32>,
    /// Primary action after the tick.
    pub primary: Option<ActionKind>,
    /// The primary action changed during the tick.
    pub primary_changed: bool,
}

/// A simulated character.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use hedge_controller::prelude::*;
///
/// let mut terrain = SegmentTerrain::new();
/// terrain.add_box(Vec2::new(0.0, -50.0), Vec2::new(500.0, 50.0));
///
/// let mut player = Player::sonic().with_center(Vec2::new(0.0, 30.0));
/// let input = PlayerInput::new();
/// let ctx = TickContext::default();
/// for _ in 0..30 {
///     player.tick(&ctx, &input, &terrain).unwrap();
/// }
/// assert!(player.body.grounded);
/// ```
#[derive(Component, Debug, Clone)]
pub struct Player {
    /// Kinematic state.
    pub body: PlayerBody,
    /// Movement constants.
    pub physics: PhysicsConfig,
    sensors: Sensors,
    actions: ActionManager,
    pending: Option<ActionKind>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new(CharacterBuild::default(), PhysicsConfig::default())
    }
}

impl Player {
    /// Character with no actions registered.
    pub fn new(build: CharacterBuild, physics: PhysicsConfig) -> Self {
        Self {
            body: PlayerBody::default(),
            physics,
            sensors: Sensors::new(build, SensorConfig::default()),
            actions: ActionManager::new(),
            pending: None,
        }
    }

    /// The hedgehog: spindash, drop dash and insta-shield.
    pub fn sonic() -> Self {
        Self::new(CharacterBuild::sonic(), PhysicsConfig::classic()).with_actions(
            Self::common_actions()
                .with_action(DropDash::default())
                .with_action(InstaShield::default()),
        )
    }

    /// The fox: flight.
    pub fn tails() -> Self {
        Self::new(CharacterBuild::tails(), PhysicsConfig::classic())
            .with_actions(Self::common_actions().with_action(Fly::default()))
    }

    /// The echidna: glide and climb.
    pub fn knuckles() -> Self {
        Self::new(CharacterBuild::knuckles(), PhysicsConfig::classic()).with_actions(
            Self::common_actions()
                .with_action(Glide::default())
                .with_action(Climb::default()),
        )
    }

    fn common_actions() -> ActionManager {
        ActionManager::new()
            .with_action(Jump::default())
            .with_action(Roll)
            .with_action(Crouch)
            .with_action(LookUp)
            .with_action(Spindash::default())
            .with_action(Hurt)
            .with_action(Die)
    }

    pub fn with_actions(mut self, actions: ActionManager) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_sensor_config(mut self, config: SensorConfig) -> Self {
        self.sensors = Sensors::new(*self.sensors.build(), config);
        self
    }

    pub fn with_center(mut self, center: Vec2) -> Self {
        self.body.center = center;
        self
    }

    pub fn sensors(&self) -> &Sensors {
        &self.sensors
    }

    pub fn actions(&self) -> &ActionManager {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut ActionManager {
        &mut self.actions
    }

    pub fn build(&self) -> &CharacterBuild {
        self.sensors.build()
    }

    /// Entity position derived from the body center and the pivot point.
    pub fn entity_position(&self) -> Vec2 {
        self.body.entity_position(self.build().pivot_point)
    }

    /// Place the character so its entity sits at `position`.
    pub fn set_entity_position(&mut self, position: Vec2) {
        let pivot = self.build().pivot_point;
        self.body.set_entity_position(position, pivot);
    }

    /// Sprite rotation in radians, counter-clockwise.
    pub fn visual_rotation(&self) -> f32 {
        -self.body.sensor_angle().to_radians()
    }

    /// Advance one fixed tick.
    ///
    /// Errors only when the action set is misconfigured so that follow-up
    /// actions keep chaining; the caller should reset the actions.
    pub fn tick(
        &mut self,
        ctx: &TickContext,
        input: &PlayerInput,
        terrain: &dyn TerrainQuery,
    ) -> Result<TickReport, ActionError> {
        let was_grounded = self.body.grounded;
        let primary_before = self.actions.current_primary();
        let mut report = TickReport::default();

        self.body.control_lock.tick();
        self.body.invulnerability.tick();

        let profile = self.actions.movement(&self.physics);
        if self.body.grounded {
            report.slipped = self.ground_movement(profile, input, ctx);
        } else {
            self.air_movement(profile, input, ctx);
        }
        if self.body.grounded {
            self.body.velocity = self.body.ground_velocity_vector();
        }

        if profile.collides {
            self.sensors.update(&mut self.body, &self.physics, ctx, terrain);
            report.high_speed_steps = self
                .sensors
                .last_high_speed_move()
                .map(|data| data.steps_taken);
        } else {
            self.body.center += self.body.velocity * ctx.dt_factor();
        }

        let mut action_ctx = ActionContext::new(
            &mut self.body,
            &mut self.sensors,
            input,
            &self.physics,
            ctx,
            terrain,
        );
        if let Some(kind) = self.pending.take() {
            self.actions.perform_kind(kind, &mut action_ctx);
        }
        self.actions.update(&mut action_ctx)?;

        self.sync_action_state();
        self.clamp_speed();

        report.landed = !was_grounded && self.body.grounded;
        report.left_ground = was_grounded && !self.body.grounded;
        report.primary = self.actions.current_primary();
        report.primary_changed = report.primary != primary_before;
        Ok(report)
    }

    /// Start `T` right away, bypassing its conditions.
    pub fn perform_action<T: ActionType>(
        &mut self,
        ctx: &TickContext,
        input: &PlayerInput,
        terrain: &dyn TerrainQuery,
    ) -> bool {
        let mut action_ctx = ActionContext::new(
            &mut self.body,
            &mut self.sensors,
            input,
            &self.physics,
            ctx,
            terrain,
        );
        let started = self.actions.perform_action::<T>(&mut action_ctx);
        self.sync_action_state();
        started
    }

    /// End `T` right away if it is performing.
    pub fn end_action<T: ActionType>(
        &mut self,
        ctx: &TickContext,
        input: &PlayerInput,
        terrain: &dyn TerrainQuery,
    ) -> Result<bool, ActionError> {
        let mut action_ctx = ActionContext::new(
            &mut self.body,
            &mut self.sensors,
            input,
            &self.physics,
            ctx,
            terrain,
        );
        let ended = self.actions.end_action::<T>(&mut action_ctx)?;
        self.sync_action_state();
        Ok(ended)
    }

    /// Start `kind` at the beginning of the next action update.
    pub fn request_action(&mut self, kind: ActionKind) {
        self.pending = Some(kind);
    }

    /// Take a hit from something at `source`. Ignored while invulnerable or
    /// dead. Returns whether the hit landed.
    pub fn hurt(&mut self, source: Vec2) -> bool {
        if self.body.invulnerability.is_running() || self.is_dead() {
            return false;
        }
        // Knockback pushes away from the facing direction.
        self.body.face(source.x - self.body.center.x);
        self.request_action(ActionKind::Hurt);
        true
    }

    pub fn kill(&mut self) {
        if !self.is_dead() {
            self.request_action(ActionKind::Die);
        }
    }

    pub fn is_dead(&self) -> bool {
        self.actions.current_primary() == Some(ActionKind::Die)
            || self.pending == Some(ActionKind::Die)
    }

    /// Put the character back at rest at `center`.
    pub fn respawn(&mut self, center: Vec2) {
        self.reset_actions();
        self.sensors.clear();
        self.sensors.set_body_size(&mut self.body, BodySize::Regular);
        self.body = PlayerBody::at(center);
    }

    /// Stop all actions without end callbacks.
    pub fn reset_actions(&mut self) {
        self.actions.reset();
        self.pending = None;
        self.sync_action_state();
    }

    /// Become another character: take over its build, physics and action
    /// set. Running actions the target lacks are force-ended.
    pub fn swap_character(
        &mut self,
        target: &Player,
        ctx: &TickContext,
        terrain: &dyn TerrainQuery,
    ) {
        self.sensors.set_build(&mut self.body, *target.build());
        self.physics = target.physics;
        let input = PlayerInput::new();
        let mut action_ctx = ActionContext::new(
            &mut self.body,
            &mut self.sensors,
            &input,
            &self.physics,
            ctx,
            terrain,
        );
        self.actions.merge_from(&target.actions, &mut action_ctx);
        self.sync_action_state();
        debug!("swapped character, actions now {:?}", self.actions.kinds().collect::<Vec<_>>());
    }

    fn sync_action_state(&mut self) {
        let size = self.actions.body_size();
        self.sensors.set_body_size(&mut self.body, size);
        self.body.attacking = self.actions.attacking();
    }

    /// Grounded formulas. Returns whether the character slipped.
    fn ground_movement(
        &mut self,
        profile: MovementProfile,
        input: &PlayerInput,
        ctx: &TickContext,
    ) -> bool {
        let physics = &self.physics;
        let body = &mut self.body;
        let dt = ctx.dt_factor();
        let sin = body.ground_angle.to_radians().sin();
        let horizontal = if body.control_lock.is_running() {
            0.0
        } else {
            input.horizontal()
        };
        let gsp = body.ground_velocity;

        body.ground_velocity = match profile.ground {
            GroundMovement::Running => {
                let gsp = run(gsp, horizontal, physics, dt);
                body.face(horizontal);
                gsp + physics.slope_factor * sin * dt
            }
            GroundMovement::Rolling => {
                let mut gsp = gsp;
                if horizontal * gsp < 0.0 {
                    gsp = approach(gsp, 0.0, physics.roll_deceleration * dt);
                }
                gsp = approach(gsp, 0.0, physics.roll_friction * dt);
                // Uphill when the slope pulls against the roll.
                let factor = if gsp * sin < 0.0 {
                    physics.roll_slope_up_factor
                } else {
                    physics.roll_slope_down_factor
                };
                gsp + factor * sin * dt
            }
            GroundMovement::Braced => {
                approach(gsp, 0.0, physics.friction * dt) + physics.slope_factor * sin * dt
            }
            GroundMovement::Scripted => return false,
        };

        let from_flat = body.ground_angle.min(360.0 - body.ground_angle);
        if body.ground_velocity.abs() >= physics.fall_off_speed
            || from_flat <= SLIP_ANGLE
            || body.control_lock.is_running()
        {
            return false;
        }
        body.control_lock.start(physics.control_lock_ticks);
        if body.ground_angle > 90.0 && body.ground_angle < 270.0 {
            body.launch();
        }
        debug!("slipped at {:.1} deg", body.ground_angle);
        true
    }

    fn air_movement(&mut self, profile: MovementProfile, input: &PlayerInput, ctx: &TickContext) {
        let physics = &self.physics;
        let body = &mut self.body;
        let dt = ctx.dt_factor();

        if profile.air_control {
            let horizontal = input.horizontal();
            if horizontal != 0.0 {
                let vx = body.velocity.x;
                let next = vx + horizontal * physics.air_acceleration * dt;
                body.velocity.x = if next.abs() <= physics.top_speed || next.abs() < vx.abs() {
                    next
                } else if vx.abs() < physics.top_speed {
                    horizontal * physics.top_speed
                } else {
                    vx
                };
                body.face(horizontal);
            }
            let vy = body.velocity.y;
            if vy > 0.0 && vy < AIR_DRAG_MAX_RISE && body.velocity.x.abs() >= AIR_DRAG_MIN_SPEED {
                body.velocity.x *= physics.air_drag.powf(dt);
            }
        }

        let gravity = profile.gravity.unwrap_or(physics.gravity);
        body.velocity.y -= gravity * dt;
    }

    fn clamp_speed(&mut self) {
        let max = self.physics.max_speed;
        let body = &mut self.body;
        body.ground_velocity = body.ground_velocity.clamp(-max, max);
        body.velocity = body.velocity.clamp(Vec2::splat(-max), Vec2::splat(max));
        body.velocity.y = body.velocity.y.max(-self.physics.fall_speed_cap);
    }
}

/// Running acceleration, deceleration and friction. Never crosses zero in a
/// single tick and never accelerates past top speed.
fn run(gsp: f32, horizontal: f32, physics: &PhysicsConfig, dt: f32) -> f32 {
    if horizontal == 0.0 {
        return approach(gsp, 0.0, physics.friction * dt);
    }
    if gsp * horizontal < 0.0 {
        return approach(gsp, 0.0, physics.deceleration * dt);
    }
    if gsp.abs() >= physics.top_speed - EPSILON {
        return gsp;
    }
    let next = gsp + horizontal * physics.acceleration * dt;
    next.clamp(-physics.top_speed, physics.top_speed)
}
