//! Character action state machine.
//!
//! Actions are split into two levels. A **primary** action (jump, roll,
//! spindash, ...) is exclusive: starting one ends the other. A **sub**
//! action (drop dash, insta-shield) rides on a parent primary and can only
//! run while that parent is current; ending the parent ends the sub first.
//!
//! Each registered action lives in a slot with an explicit [`ActionPhase`].
//! [`ActionManager::update`] runs once per tick after collision resolution:
//!
//! 1. the current sub-action performs and checks its exit condition
//! 2. the current primary action does the same
//! 3. if no primary changed hands, idle primaries are checked for launch in
//!    registration order
//! 4. if the primary did not change, idle sub-actions of the current primary
//!    are checked for launch
//!
//! An action that ends may name a follow-up (spindash release rolls, a glide
//! into a wall climbs). Follow-ups start in the same tick, and a follow-up
//! whose exit condition already holds ends right away. Chains longer than
//! [`MAX_ACTION_CASCADE`] are an [`ActionError::CascadeOverflow`].

mod action;
mod air;
mod damage;
mod ground;
mod sub;

use std::fmt;

use bevy::prelude::*;

pub use action::{
    ActionContext, ActionError, ActionKind, ActionPhase, ActionRole, ActionType, ActiveActions,
    GroundMovement, HedgeAction, MovementProfile,
};
pub use air::{Climb, Fly, Glide, Jump};
pub use damage::{Die, Hurt};
pub use ground::{Crouch, LookUp, Roll, Spindash};
pub use sub::{DropDash, InstaShield};

use crate::config::PhysicsConfig;
use crate::state::BodySize;

/// Longest chain of follow-up actions allowed within one tick.
pub const MAX_ACTION_CASCADE: usize = 1;

struct ActionSlot {
    action: Box<dyn HedgeAction>,
    phase: ActionPhase,
}

enum Step {
    Running,
    Ended(Option<ActionKind>),
}

/// Registry and state machine for one character's actions.
///
/// # Example
///
/// ```rust
/// use hedge_controller::prelude::*;
///
/// let actions = ActionManager::new()
///     .with_action(Jump::default())
///     .with_action(Roll::default())
///     .with_action(DropDash::default());
///
/// assert!(actions.validate().is_ok());
/// assert!(actions.contains(ActionKind::Roll));
/// assert_eq!(actions.current_primary(), None);
/// ```
#[derive(Default)]
pub struct ActionManager {
    slots: Vec<ActionSlot>,
    current_primary: Option<ActionKind>,
    current_sub: Option<ActionKind>,
    previous_primary: Option<ActionKind>,
    previous_sub: Option<ActionKind>,
}

impl ActionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Self::register`].
    pub fn with_action(mut self, action: impl HedgeAction) -> Self {
        self.register(action);
        self
    }

    /// Register an action, replacing any action of the same kind.
    pub fn register(&mut self, action: impl HedgeAction) -> &mut Self {
        self.register_boxed(Box::new(action))
    }

    pub fn register_boxed(&mut self, action: Box<dyn HedgeAction>) -> &mut Self {
        let kind = action.kind();
        match self.slot_mut(kind) {
            Some(slot) => {
                if slot.phase.is_performing() {
                    warn!("replacing {kind:?} while it is performing");
                }
                slot.action = action;
            }
            None => self.slots.push(ActionSlot {
                action,
                phase: ActionPhase::Inactive,
            }),
        }
        self
    }

    /// Take over the action set of `target`, e.g. when swapping characters.
    ///
    /// Actions only `target` has are copied in. Actions `target` lacks are
    /// removed, force-ended first when running. Shared kinds keep their
    /// local state.
    pub fn merge_from(&mut self, target: &ActionManager, ctx: &mut ActionContext) {
        let removed: Vec<ActionKind> = self
            .kinds()
            .filter(|kind| !target.contains(*kind))
            .collect();
        for kind in removed {
            if self.is_performing(kind) {
                if let Some(dropped) = self.finish(kind, ctx) {
                    trace!("{kind:?} removed, dropping follow-up {dropped:?}");
                }
            }
            self.slots.retain(|slot| slot.action.kind() != kind);
            debug!("removed action {kind:?}");
        }

        for slot in &target.slots {
            if !self.contains(slot.action.kind()) {
                self.register_boxed(slot.action.clone_action());
            }
        }
        if self.previous_primary.is_some_and(|kind| !self.contains(kind)) {
            self.previous_primary = None;
        }
        if self.previous_sub.is_some_and(|kind| !self.contains(kind)) {
            self.previous_sub = None;
        }
    }

    /// Check that every sub-action's parent is a registered primary action.
    pub fn validate(&self) -> Result<(), ActionError> {
        for slot in &self.slots {
            if let ActionRole::Sub { parent } = slot.action.role() {
                if self.role(parent) != Some(ActionRole::Primary) {
                    return Err(ActionError::OrphanSubAction {
                        action: slot.action.kind(),
                        parent,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn contains(&self, kind: ActionKind) -> bool {
        self.slot(kind).is_some()
    }

    /// Registered kinds in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = ActionKind> + '_ {
        self.slots.iter().map(|slot| slot.action.kind())
    }

    pub fn role(&self, kind: ActionKind) -> Option<ActionRole> {
        self.slot(kind).map(|slot| slot.action.role())
    }

    pub fn phase(&self, kind: ActionKind) -> Option<ActionPhase> {
        self.slot(kind).map(|slot| slot.phase)
    }

    pub fn is_performing(&self, kind: ActionKind) -> bool {
        self.phase(kind).is_some_and(ActionPhase::is_performing)
    }

    pub fn is_performing_action<T: ActionType>(&self) -> bool {
        self.is_performing(T::KIND)
    }

    pub fn current_primary(&self) -> Option<ActionKind> {
        self.current_primary
    }

    pub fn current_sub(&self) -> Option<ActionKind> {
        self.current_sub
    }

    pub fn previous_primary(&self) -> Option<ActionKind> {
        self.previous_primary
    }

    pub fn previous_sub(&self) -> Option<ActionKind> {
        self.previous_sub
    }

    pub fn active(&self) -> ActiveActions {
        ActiveActions {
            primary: self.current_primary,
            sub: self.current_sub,
        }
    }

    /// Body size requested by the running actions.
    pub fn body_size(&self) -> BodySize {
        let shrunk = [self.current_sub, self.current_primary]
            .into_iter()
            .flatten()
            .filter_map(|kind| self.slot(kind))
            .any(|slot| slot.action.body_size() == BodySize::Shrunk);
        if shrunk {
            BodySize::Shrunk
        } else {
            BodySize::Regular
        }
    }

    /// Whether a running action damages on contact.
    pub fn attacking(&self) -> bool {
        [self.current_sub, self.current_primary]
            .into_iter()
            .flatten()
            .filter_map(|kind| self.slot(kind))
            .any(|slot| slot.action.attacking())
    }

    /// Movement rules of the current primary action.
    pub fn movement(&self, physics: &PhysicsConfig) -> MovementProfile {
        self.current_primary
            .and_then(|kind| self.slot(kind))
            .map(|slot| slot.action.movement(physics))
            .unwrap_or_default()
    }

    /// Stop everything without running end callbacks.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.action.reset();
            slot.phase = ActionPhase::Inactive;
        }
        self.current_primary = None;
        self.current_sub = None;
        self.previous_primary = None;
        self.previous_sub = None;
    }

    /// Run one tick of the state machine.
    pub fn update(&mut self, ctx: &mut ActionContext) -> Result<(), ActionError> {
        let primary_before = self.current_primary;

        if let Some(sub) = self.current_sub {
            if let Step::Ended(next) = self.step(sub, ctx, true) {
                self.follow_up(sub, next, ctx, 1)?;
            }
        }

        if let Some(primary) = self.current_primary {
            if primary_before == Some(primary) {
                if let Step::Ended(next) = self.step(primary, ctx, true) {
                    self.follow_up(primary, next, ctx, 1)?;
                }
            }
        }

        if self.current_primary == primary_before && !self.launch_primary(ctx) {
            self.launch_sub(ctx);
        }
        self.refresh_readiness(ctx);
        Ok(())
    }

    /// Start `T`, force-ending whatever primary (or sub) it replaces.
    pub fn perform_action<T: ActionType>(&mut self, ctx: &mut ActionContext) -> bool {
        self.perform_kind(T::KIND, ctx)
    }

    /// End `T` if it is performing, running its follow-up.
    pub fn end_action<T: ActionType>(
        &mut self,
        ctx: &mut ActionContext,
    ) -> Result<bool, ActionError> {
        self.end_kind(T::KIND, ctx)
    }

    /// Start the action registered as `kind`.
    ///
    /// Returns `false` when it is unknown, already performing, or a
    /// sub-action whose parent is not current. Follow-ups named by the
    /// replaced action are dropped.
    pub fn perform_kind(&mut self, kind: ActionKind, ctx: &mut ActionContext) -> bool {
        if !self.contains(kind) {
            warn!("perform requested for unregistered action {kind:?}");
            return false;
        }
        if self.is_performing(kind) {
            return false;
        }
        self.begin(kind, ctx)
    }

    /// End the action registered as `kind` if it is performing.
    pub fn end_kind(
        &mut self,
        kind: ActionKind,
        ctx: &mut ActionContext,
    ) -> Result<bool, ActionError> {
        if !self.contains(kind) {
            warn!("end requested for unregistered action {kind:?}");
            return Ok(false);
        }
        if !self.is_performing(kind) {
            return Ok(false);
        }
        let next = self.finish(kind, ctx);
        self.follow_up(kind, next, ctx, 1)?;
        Ok(true)
    }

    /// End the current primary action. Without `force` it only ends when
    /// its exit condition holds.
    pub fn end_current_action(
        &mut self,
        force: bool,
        ctx: &mut ActionContext,
    ) -> Result<bool, ActionError> {
        let Some(kind) = self.current_primary else {
            return Ok(false);
        };
        if !force {
            ctx.active = self.active();
            let can_exit = self
                .slot(kind)
                .is_some_and(|slot| slot.action.exit_condition(ctx));
            if !can_exit {
                return Ok(false);
            }
        }
        self.end_kind(kind, ctx)
    }

    fn slot(&self, kind: ActionKind) -> Option<&ActionSlot> {
        self.slots.iter().find(|slot| slot.action.kind() == kind)
    }

    fn slot_mut(&mut self, kind: ActionKind) -> Option<&mut ActionSlot> {
        self.slots.iter_mut().find(|slot| slot.action.kind() == kind)
    }

    fn begin(&mut self, kind: ActionKind, ctx: &mut ActionContext) -> bool {
        let Some(role) = self.role(kind) else {
            warn!("action {kind:?} is not registered");
            return false;
        };
        match role {
            ActionRole::Primary => {
                if let Some(current) = self.current_primary {
                    if let Some(dropped) = self.finish(current, ctx) {
                        trace!("{current:?} replaced by {kind:?}, dropping follow-up {dropped:?}");
                    }
                }
                self.current_primary = Some(kind);
            }
            ActionRole::Sub { parent } => {
                if self.current_primary != Some(parent) {
                    debug!("{kind:?} needs {parent:?} to be performing");
                    return false;
                }
                if let Some(current) = self.current_sub {
                    self.finish(current, ctx);
                }
                self.current_sub = Some(kind);
            }
        }

        ctx.active = self.active();
        let Some(slot) = self.slot_mut(kind) else {
            return false;
        };
        slot.phase = slot.phase.launched();
        slot.action.on_start(ctx);
        debug!("{kind:?} started");
        true
    }

    /// Stop a running action, its sub-action first. Returns the follow-up,
    /// preferring the action's own over its sub-action's.
    fn finish(&mut self, kind: ActionKind, ctx: &mut ActionContext) -> Option<ActionKind> {
        let mut sub_follow_up = None;
        if self.current_primary == Some(kind) {
            if let Some(sub) = self.current_sub {
                sub_follow_up = self.finish(sub, ctx);
            }
            self.current_primary = None;
            self.previous_primary = Some(kind);
        } else if self.current_sub == Some(kind) {
            self.current_sub = None;
            self.previous_sub = Some(kind);
        } else {
            return None;
        }

        ctx.active = self.active();
        let slot = self.slot_mut(kind)?;
        slot.phase = slot.phase.ended();
        let follow_up = slot.action.on_end(ctx);
        slot.action.reset();
        debug!("{kind:?} ended");
        follow_up.or(sub_follow_up)
    }

    fn step(&mut self, kind: ActionKind, ctx: &mut ActionContext, perform: bool) -> Step {
        ctx.active = self.active();
        let Some(slot) = self.slot_mut(kind) else {
            return Step::Ended(None);
        };
        if perform {
            slot.phase = slot.phase.ticked();
            slot.action.perform(ctx);
        }
        if !slot.action.exit_condition(ctx) {
            return Step::Running;
        }
        Step::Ended(self.finish(kind, ctx))
    }

    fn follow_up(
        &mut self,
        origin: ActionKind,
        next: Option<ActionKind>,
        ctx: &mut ActionContext,
        depth: usize,
    ) -> Result<(), ActionError> {
        let Some(next) = next else {
            return Ok(());
        };
        if depth > MAX_ACTION_CASCADE {
            error!("action cascade from {origin:?} into {next:?} exceeded depth {MAX_ACTION_CASCADE}");
            return Err(ActionError::CascadeOverflow { origin, depth });
        }
        debug!("{origin:?} hands over to {next:?}");
        if !self.begin(next, ctx) {
            return Ok(());
        }
        match self.step(next, ctx, false) {
            Step::Running => Ok(()),
            Step::Ended(chained) => self.follow_up(next, chained, ctx, depth + 1),
        }
    }

    fn launch_primary(&mut self, ctx: &mut ActionContext) -> bool {
        ctx.active = self.active();
        let current = self.current_primary;
        let candidate = self
            .slots
            .iter()
            .filter(|slot| slot.action.role() == ActionRole::Primary)
            .map(|slot| &slot.action)
            .find(|action| {
                Some(action.kind()) != current
                    && action.can_perform(ctx)
                    && action.launch_condition(ctx)
            })
            .map(|action| action.kind());
        match candidate {
            Some(kind) => self.begin(kind, ctx),
            None => false,
        }
    }

    fn launch_sub(&mut self, ctx: &mut ActionContext) -> bool {
        let Some(primary) = self.current_primary else {
            return false;
        };
        if self.current_sub.is_some() {
            return false;
        }
        ctx.active = self.active();
        let candidate = self
            .slots
            .iter()
            .map(|slot| &slot.action)
            .find(|action| {
                action.role() == (ActionRole::Sub { parent: primary })
                    && action.can_perform(ctx)
                    && action.launch_condition(ctx)
            })
            .map(|action| action.kind());
        match candidate {
            Some(kind) => self.begin(kind, ctx),
            None => false,
        }
    }

    fn refresh_readiness(&mut self, ctx: &mut ActionContext) {
        ctx.active = self.active();
        let primary = self.current_primary;
        for slot in &mut self.slots {
            let allowed = match slot.action.role() {
                ActionRole::Primary => true,
                ActionRole::Sub { parent } => primary == Some(parent),
            };
            let ready = allowed && slot.action.can_perform(ctx);
            slot.phase = slot.phase.with_readiness(ready);
        }
    }
}

impl Clone for ActionManager {
    fn clone(&self) -> Self {
        Self {
            slots: self
                .slots
                .iter()
                .map(|slot| ActionSlot {
                    action: slot.action.clone_action(),
                    phase: slot.phase,
                })
                .collect(),
            current_primary: self.current_primary,
            current_sub: self.current_sub,
            previous_primary: self.previous_primary,
            previous_sub: self.previous_sub,
        }
    }
}

impl fmt::Debug for ActionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionManager")
            .field(
                "slots",
                &self
                    .slots
                    .iter()
                    .map(|slot| (slot.action.kind(), slot.phase))
                    .collect::<Vec<_>>(),
            )
            .field("current_primary", &self.current_primary)
            .field("current_sub", &self.current_sub)
            .field("previous_primary", &self.previous_primary)
            .field("previous_sub", &self.previous_sub)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::backend::EmptyTerrain;
    use crate::body::PlayerBody;
    use crate::config::TickContext;
    use crate::intent::PlayerInput;
    use crate::sensors::Sensors;

    /// Test action with configurable exits and follow-ups.
    #[derive(Clone)]
    struct Probe {
        kind: ActionKind,
        role: ActionRole,
        exit: bool,
        follow_up: Option<ActionKind>,
        ended: Arc<AtomicUsize>,
    }

    impl Probe {
        fn new(kind: ActionKind) -> Self {
            Self {
                kind,
                role: ActionRole::Primary,
                exit: false,
                follow_up: None,
                ended: Arc::default(),
            }
        }
    }

    impl HedgeAction for Probe {
        fn kind(&self) -> ActionKind {
            self.kind
        }
        fn role(&self) -> ActionRole {
            self.role
        }
        fn launch_condition(&self, _ctx: &ActionContext) -> bool {
            false
        }
        fn exit_condition(&self, _ctx: &ActionContext) -> bool {
            self.exit
        }
        fn on_end(&mut self, _ctx: &mut ActionContext) -> Option<ActionKind> {
            self.ended.fetch_add(1, Ordering::SeqCst);
            self.follow_up
        }
        fn clone_action(&self) -> Box<dyn HedgeAction> {
            Box::new(self.clone())
        }
    }

    fn with_context<R>(f: impl FnOnce(&mut ActionContext) -> R) -> R {
        let mut body = PlayerBody::at(Vec2::new(0.0, 19.0));
        body.grounded = true;
        let mut sensors = Sensors::default();
        let input = PlayerInput::new();
        let physics = PhysicsConfig::default();
        let tick = TickContext::default();
        let mut ctx = ActionContext::new(
            &mut body,
            &mut sensors,
            &input,
            &physics,
            &tick,
            &EmptyTerrain,
        );
        f(&mut ctx)
    }

    #[test]
    fn perform_replaces_primary_and_records_previous() {
        let roll = Probe::new(ActionKind::Roll);
        let roll_ended = roll.ended.clone();
        let mut actions = ActionManager::new()
            .with_action(roll)
            .with_action(Probe::new(ActionKind::Jump));

        with_context(|ctx| {
            assert!(actions.perform_kind(ActionKind::Roll, ctx));
            assert!(actions.is_performing(ActionKind::Roll));
            assert!(actions.perform_kind(ActionKind::Jump, ctx));
        });

        assert_eq!(roll_ended.load(Ordering::SeqCst), 1);
        assert_eq!(actions.current_primary(), Some(ActionKind::Jump));
        assert_eq!(actions.previous_primary(), Some(ActionKind::Roll));
        assert!(!actions.is_performing(ActionKind::Roll));
    }

    #[test]
    fn sub_requires_parent_and_ends_with_it() {
        let mut shield = Probe::new(ActionKind::InstaShield);
        shield.role = ActionRole::Sub {
            parent: ActionKind::Jump,
        };
        let shield_ended = shield.ended.clone();
        let mut actions = ActionManager::new()
            .with_action(Probe::new(ActionKind::Jump))
            .with_action(Probe::new(ActionKind::Roll))
            .with_action(shield);

        with_context(|ctx| {
            assert!(!actions.perform_kind(ActionKind::InstaShield, ctx));
            assert!(actions.perform_kind(ActionKind::Jump, ctx));
            assert!(actions.perform_kind(ActionKind::InstaShield, ctx));
            assert_eq!(actions.current_sub(), Some(ActionKind::InstaShield));

            assert!(actions.perform_kind(ActionKind::Roll, ctx));
        });

        assert_eq!(shield_ended.load(Ordering::SeqCst), 1);
        assert_eq!(actions.current_sub(), None);
        assert_eq!(actions.previous_sub(), Some(ActionKind::InstaShield));
        assert!(!actions.is_performing(ActionKind::InstaShield));
    }

    #[test]
    fn follow_up_starts_in_same_tick() {
        let mut first = Probe::new(ActionKind::Spindash);
        first.exit = true;
        first.follow_up = Some(ActionKind::Roll);
        let mut actions = ActionManager::new()
            .with_action(first)
            .with_action(Probe::new(ActionKind::Roll));

        let result = with_context(|ctx| {
            actions.perform_kind(ActionKind::Spindash, ctx);
            actions.update(ctx)
        });
        assert!(result.is_ok());
        assert_eq!(actions.current_primary(), Some(ActionKind::Roll));
        assert_eq!(actions.previous_primary(), Some(ActionKind::Spindash));
    }

    #[test]
    fn endless_follow_ups_overflow() {
        let mut ping = Probe::new(ActionKind::Custom(1));
        ping.exit = true;
        ping.follow_up = Some(ActionKind::Custom(2));
        let mut pong = Probe::new(ActionKind::Custom(2));
        pong.exit = true;
        pong.follow_up = Some(ActionKind::Custom(1));
        let mut actions = ActionManager::new().with_action(ping).with_action(pong);

        let result = with_context(|ctx| {
            actions.perform_kind(ActionKind::Custom(1), ctx);
            actions.update(ctx)
        });
        assert_eq!(
            result,
            Err(ActionError::CascadeOverflow {
                origin: ActionKind::Custom(2),
                depth: 2,
            })
        );
    }

    #[test]
    fn end_current_respects_exit_condition() {
        let mut actions = ActionManager::new().with_action(Probe::new(ActionKind::Roll));
        with_context(|ctx| {
            actions.perform_kind(ActionKind::Roll, ctx);
            assert_eq!(actions.end_current_action(false, ctx), Ok(false));
            assert!(actions.is_performing(ActionKind::Roll));
            assert_eq!(actions.end_current_action(true, ctx), Ok(true));
        });
        assert_eq!(actions.current_primary(), None);
    }

    #[test]
    fn unknown_kinds_are_ignored() {
        let mut actions = ActionManager::new();
        with_context(|ctx| {
            assert!(!actions.perform_kind(ActionKind::Fly, ctx));
            assert_eq!(actions.end_kind(ActionKind::Fly, ctx), Ok(false));
        });
    }

    #[test]
    fn validate_reports_orphans() {
        let mut drop_dash = Probe::new(ActionKind::DropDash);
        drop_dash.role = ActionRole::Sub {
            parent: ActionKind::Jump,
        };
        let actions = ActionManager::new().with_action(drop_dash);
        assert_eq!(
            actions.validate(),
            Err(ActionError::OrphanSubAction {
                action: ActionKind::DropDash,
                parent: ActionKind::Jump,
            })
        );
    }

    #[test]
    fn merge_adopts_target_set() {
        let roll = Probe::new(ActionKind::Roll);
        let roll_ended = roll.ended.clone();
        let mut actions = ActionManager::new()
            .with_action(Probe::new(ActionKind::Jump))
            .with_action(roll);
        let target = ActionManager::new()
            .with_action(Probe::new(ActionKind::Jump))
            .with_action(Probe::new(ActionKind::Glide));

        with_context(|ctx| {
            actions.perform_kind(ActionKind::Roll, ctx);
            actions.merge_from(&target, ctx);
        });

        assert_eq!(roll_ended.load(Ordering::SeqCst), 1);
        assert_eq!(actions.current_primary(), None);
        assert_eq!(actions.previous_primary(), None);
        assert_eq!(
            actions.kinds().collect::<Vec<_>>(),
            vec![ActionKind::Jump, ActionKind::Glide]
        );
        let copy = actions.clone();
        assert!(copy.contains(ActionKind::Glide));
        assert!(!copy.contains(ActionKind::Roll));
    }

    #[test]
    fn reset_stops_everything_silently() {
        let roll = Probe::new(ActionKind::Roll);
        let ended = roll.ended.clone();
        let mut actions = ActionManager::new().with_action(roll);
        with_context(|ctx| {
            actions.perform_kind(ActionKind::Roll, ctx);
        });
        actions.reset();
        assert_eq!(actions.current_primary(), None);
        assert_eq!(ended.load(Ordering::SeqCst), 0);
    }
}
