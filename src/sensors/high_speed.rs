//! Sub-stepped movement for speeds above one block per tick.

use bevy::prelude::*;

use crate::backend::TerrainQuery;
use crate::body::PlayerBody;
use crate::math::{tangent_from_angle, EPSILON};

use super::info::{PlayerCollisionInfo, SensorFrame};
use super::Sensors;

/// Book-keeping for one sub-stepped move.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq)]
pub struct HighSpeedData {
    /// Distance the tick wanted to cover.
    pub total_distance: f32,
    /// Distance left when the loop stopped.
    pub remaining: f32,
    /// Length of a full sub-step.
    pub step_size: f32,
    /// `ceil(total_distance / step_size)`.
    pub planned_steps: u32,
    pub steps_taken: u32,
    /// Velocity at the start of the move.
    pub initial_velocity: Vec2,
    /// Whether the body was grounded when the move started.
    pub started_grounded: bool,
    /// A collision changed the velocity and ended the move early.
    pub interrupted: bool,
}

impl HighSpeedData {
    pub fn new(velocity: Vec2, total_distance: f32, step_size: f32, grounded: bool) -> Self {
        let step_size = step_size.max(EPSILON);
        Self {
            total_distance,
            remaining: total_distance,
            step_size,
            planned_steps: (total_distance / step_size).ceil() as u32,
            steps_taken: 0,
            initial_velocity: velocity,
            started_grounded: grounded,
            interrupted: false,
        }
    }

    /// Distance actually covered.
    pub fn travelled(&self) -> f32 {
        self.total_distance - self.remaining
    }
}

impl Sensors {
    /// Move `total_distance` in increments no longer than the stage's block
    /// size, resolving collisions after each one.
    ///
    /// Grounded bodies follow the surface tangent, airborne bodies their
    /// velocity. The loop ends early when a collision changes the velocity.
    /// A body that starts grounded and ends airborne keeps its last ground
    /// angle and has its ground velocity re-projected onto it.
    pub fn move_at_high_speed(
        &mut self,
        body: &mut PlayerBody,
        velocity: Vec2,
        total_distance: f32,
        grounded: bool,
        frame: &SensorFrame,
        terrain: &dyn TerrainQuery,
    ) -> HighSpeedData {
        let mut data =
            HighSpeedData::new(velocity, total_distance, frame.ctx.max_block_size(), grounded);
        let limit = data.planned_steps.min(frame.config.max_high_speed_steps);
        let dt_factor = frame.ctx.dt_factor();
        let mut last_ground_angle = body.ground_angle;

        while data.remaining > EPSILON && data.steps_taken < limit {
            let step = data.remaining.min(data.step_size);
            let direction = step_direction(body);
            if direction == Vec2::ZERO {
                break;
            }
            let before = body.velocity;

            // The first increment was pre-checked by the caller.
            if data.steps_taken > 0 && dt_factor > EPSILON {
                let probe = direction * step / dt_factor;
                let position = body.center;
                self.wall.check_for_collision(body, position, probe, frame, terrain);
                if velocity_changed(before, body.velocity) {
                    data.interrupted = true;
                    break;
                }
            }

            let was_grounded = body.grounded;
            body.center += direction * step;
            data.remaining -= step;
            data.steps_taken += 1;
            self.resolve_step(body, frame, terrain);

            if velocity_changed(before, body.velocity) {
                trace!(
                    "high speed move interrupted after {} of {} steps",
                    data.steps_taken,
                    data.planned_steps
                );
                data.interrupted = true;
                break;
            }
            if body.grounded {
                last_ground_angle = body.ground_angle;
            } else if was_grounded {
                // Keep flying off the edge along the last surface.
                body.ground_angle = last_ground_angle;
                body.velocity = tangent_from_angle(last_ground_angle) * body.ground_velocity;
            }
        }

        if grounded && !body.grounded {
            body.ground_angle = last_ground_angle;
            body.velocity = tangent_from_angle(last_ground_angle) * body.ground_velocity;
        }
        if data.steps_taken >= limit && data.remaining > EPSILON {
            warn!(
                "high speed move stopped at the step limit with {:.2} px remaining",
                data.remaining
            );
        }
        data
    }
}

fn step_direction(body: &PlayerBody) -> Vec2 {
    if body.grounded {
        if body.ground_velocity == 0.0 {
            Vec2::ZERO
        } else {
            body.forward() * body.ground_velocity.signum()
        }
    } else {
        body.velocity.normalize_or_zero()
    }
}

fn velocity_changed(before: Vec2, after: Vec2) -> bool {
    (after - before).length_squared() > EPSILON * EPSILON
}
