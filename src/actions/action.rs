//! Action trait, identifiers and the per-slot state machine.

use bevy::prelude::*;
use thiserror::Error;

use crate::backend::TerrainQuery;
use crate::body::PlayerBody;
use crate::config::{PhysicsConfig, TickContext};
use crate::intent::PlayerInput;
use crate::sensors::Sensors;
use crate::state::BodySize;

/// Identifier of a registered action.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Jump,
    Roll,
    Crouch,
    LookUp,
    Spindash,
    Fly,
    Glide,
    Climb,
    Hurt,
    Die,
    DropDash,
    InstaShield,
    /// Game-defined action.
    Custom(u16),
}

/// Whether an action is exclusive or rides on a parent.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionRole {
    /// At most one primary action performs at a time.
    Primary,
    /// Performs only while `parent` is the current primary action.
    Sub { parent: ActionKind },
}

/// State of one action slot.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ActionPhase {
    /// Not running and not currently allowed to start.
    #[default]
    Inactive,
    /// Allowed to start; waiting for its launch condition.
    ReadyToPerform,
    /// Started this tick.
    Beginning,
    /// Running.
    Performing,
}

impl ActionPhase {
    /// Whether the action counts as performing.
    #[inline]
    pub fn is_performing(self) -> bool {
        matches!(self, Self::Beginning | Self::Performing)
    }

    #[inline]
    pub fn ready_to_perform(self) -> bool {
        self == Self::ReadyToPerform
    }

    /// Started this tick.
    #[inline]
    pub fn begin_action(self) -> bool {
        self == Self::Beginning
    }

    /// Alias of [`Self::is_performing`].
    #[inline]
    pub fn performing_action(self) -> bool {
        self.is_performing()
    }

    /// Track whether an idle action may start. Running actions are unchanged.
    pub fn with_readiness(self, ready: bool) -> Self {
        match self {
            Self::Inactive | Self::ReadyToPerform if ready => Self::ReadyToPerform,
            Self::Inactive | Self::ReadyToPerform => Self::Inactive,
            running => running,
        }
    }

    /// Start performing.
    pub fn launched(self) -> Self {
        Self::Beginning
    }

    /// Advance a running action by one tick.
    pub fn ticked(self) -> Self {
        match self {
            Self::Beginning | Self::Performing => Self::Performing,
            idle => idle,
        }
    }

    /// Stop performing.
    pub fn ended(self) -> Self {
        Self::Inactive
    }
}

/// Errors raised by the action machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Follow-up actions kept ending and requesting new ones within a tick.
    #[error("action cascade from {origin:?} exceeded depth {depth}")]
    CascadeOverflow { origin: ActionKind, depth: usize },
    /// A sub-action whose parent is not registered as a primary action.
    #[error("sub-action {action:?} has unregistered parent {parent:?}")]
    OrphanSubAction {
        action: ActionKind,
        parent: ActionKind,
    },
}

/// Actions currently performing, visible to every action callback.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveActions {
    pub primary: Option<ActionKind>,
    pub sub: Option<ActionKind>,
}

/// Everything an action may read or change during a tick.
pub struct ActionContext<'a> {
    pub body: &'a mut PlayerBody,
    pub sensors: &'a mut Sensors,
    pub input: &'a PlayerInput,
    pub physics: &'a PhysicsConfig,
    pub ctx: &'a TickContext,
    pub terrain: &'a dyn TerrainQuery,
    /// Maintained by the manager.
    pub active: ActiveActions,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        body: &'a mut PlayerBody,
        sensors: &'a mut Sensors,
        input: &'a PlayerInput,
        physics: &'a PhysicsConfig,
        ctx: &'a TickContext,
        terrain: &'a dyn TerrainQuery,
    ) -> Self {
        Self {
            body,
            sensors,
            input,
            physics,
            ctx,
            terrain,
            active: ActiveActions::default(),
        }
    }
}

/// How the integrator treats ground movement while an action runs.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundMovement {
    /// Acceleration, deceleration, friction and slope.
    Running,
    /// Roll friction, deceleration only, roll slope factors.
    Rolling,
    /// Friction and slope, input ignored.
    Braced,
    /// Nothing; the action drives the velocity.
    Scripted,
}

/// Movement rules applied by the integrator while an action is current.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct MovementProfile {
    pub ground: GroundMovement,
    /// Horizontal air acceleration and drag.
    pub air_control: bool,
    /// Gravity override, `None` for the physics default.
    pub gravity: Option<f32>,
    /// Whether sensors run at all.
    pub collides: bool,
}

impl MovementProfile {
    pub const RUNNING: Self = Self {
        ground: GroundMovement::Running,
        air_control: true,
        gravity: None,
        collides: true,
    };

    pub const ROLLING: Self = Self {
        ground: GroundMovement::Rolling,
        ..Self::RUNNING
    };

    pub const BRACED: Self = Self {
        ground: GroundMovement::Braced,
        ..Self::RUNNING
    };

    pub const SCRIPTED: Self = Self {
        ground: GroundMovement::Scripted,
        air_control: false,
        gravity: Some(0.0),
        collides: true,
    };

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = Some(gravity);
        self
    }

    pub fn without_air_control(mut self) -> Self {
        self.air_control = false;
        self
    }

    pub fn without_collision(mut self) -> Self {
        self.collides = false;
        self
    }
}

impl Default for MovementProfile {
    fn default() -> Self {
        Self::RUNNING
    }
}

/// A character action.
///
/// The [`ActionManager`](super::ActionManager) drives each registered action
/// through [`ActionPhase`]: while idle it checks [`can_perform`] and
/// [`launch_condition`]; once started it calls [`on_start`], then
/// [`perform`] every tick until [`exit_condition`] holds, then [`on_end`].
///
/// [`can_perform`]: HedgeAction::can_perform
/// [`launch_condition`]: HedgeAction::launch_condition
/// [`on_start`]: HedgeAction::on_start
/// [`perform`]: HedgeAction::perform
/// [`exit_condition`]: HedgeAction::exit_condition
/// [`on_end`]: HedgeAction::on_end
pub trait HedgeAction: Send + Sync + 'static {
    fn kind(&self) -> ActionKind;

    fn role(&self) -> ActionRole {
        ActionRole::Primary
    }

    /// State preconditions (grounded, current action, timers).
    fn can_perform(&self, _ctx: &ActionContext) -> bool {
        true
    }

    /// Trigger checked each tick while the action is idle and allowed.
    fn launch_condition(&self, ctx: &ActionContext) -> bool;

    fn on_start(&mut self, _ctx: &mut ActionContext) {}

    /// Per-tick behaviour while running.
    fn perform(&mut self, _ctx: &mut ActionContext) {}

    fn exit_condition(&self, ctx: &ActionContext) -> bool;

    /// Called once when the action stops. May name a follow-up action to
    /// start in the same tick.
    fn on_end(&mut self, _ctx: &mut ActionContext) -> Option<ActionKind> {
        None
    }

    /// Clear internal state without running callbacks.
    fn reset(&mut self) {}

    fn body_size(&self) -> BodySize {
        BodySize::Regular
    }

    fn attacking(&self) -> bool {
        false
    }

    fn movement(&self, _physics: &PhysicsConfig) -> MovementProfile {
        MovementProfile::RUNNING
    }

    /// Fresh copy carrying this action's configuration, used when moving
    /// actions between characters.
    fn clone_action(&self) -> Box<dyn HedgeAction>;
}

/// Compile-time link between an action type and its [`ActionKind`].
pub trait ActionType: HedgeAction {
    const KIND: ActionKind;
}
