//! Line-segment terrain.
//!
//! A small, engine-free [`TerrainQuery`] implementation. Level geometry is a
//! list of one-sided segments; rays only hit a segment's front face, so a ray
//! starting inside a solid polygon passes through it. This is what the
//! sensors expect from tile collision and keeps headless simulations and
//! tests deterministic.

use bevy::prelude::*;

use crate::backend::{CharacterPhysicsBackend, CollisionMask, TerrainQuery};
use crate::collision::{SurfaceFlags, SurfaceHit};
use crate::config::StageContext;
use crate::intent::PlayerInput;
use crate::player::Player;
use crate::systems::{simulate_player, tick_context};
use crate::HedgeControllerSet;

/// One solid edge of the terrain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainSegment {
    /// Start point.
    pub a: Vec2,
    /// End point.
    pub b: Vec2,
    /// Front-face normal.
    pub normal: Vec2,
    /// Owning entity, if any.
    pub entity: Option<Entity>,
    /// Layers this segment belongs to.
    pub layers: u32,
    /// Surface properties reported on hit.
    pub flags: SurfaceFlags,
}

impl TerrainSegment {
    /// Segment whose front face is on the left of `a -> b`.
    ///
    /// Draw floors left to right and ceilings right to left.
    pub fn new(a: Vec2, b: Vec2) -> Self {
        let d = (b - a).normalize_or_zero();
        Self {
            a,
            b,
            normal: Vec2::new(-d.y, d.x),
            entity: None,
            layers: CollisionMask::TERRAIN.0,
            flags: SurfaceFlags::SOLID,
        }
    }

    /// Ray intersection against the front face.
    fn intersect(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> Option<(f32, Vec2)> {
        if direction.dot(self.normal) >= 0.0 {
            return None;
        }
        let edge = self.b - self.a;
        let denom = direction.perp_dot(edge);
        if denom.abs() <= f32::EPSILON {
            return None;
        }
        let diff = self.a - origin;
        let t = diff.perp_dot(edge) / denom;
        let s = diff.perp_dot(direction) / denom;
        if !(-1.0e-5..=max_distance).contains(&t) || !(-1.0e-5..=1.0 + 1.0e-5).contains(&s) {
            return None;
        }
        let t = t.max(0.0);
        Some((t, origin + direction * t))
    }

    fn overlaps_box(&self, min: Vec2, max: Vec2) -> bool {
        let inside = |p: Vec2| p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y;
        if inside(self.a) || inside(self.b) {
            return true;
        }
        let corners = [
            min,
            Vec2::new(max.x, min.y),
            max,
            Vec2::new(min.x, max.y),
        ];
        (0..4).any(|i| segments_cross(self.a, self.b, corners[i], corners[(i + 1) % 4]))
    }
}

fn segments_cross(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> bool {
    let d1 = (p2 - p1).perp_dot(q1 - p1);
    let d2 = (p2 - p1).perp_dot(q2 - p1);
    let d3 = (q2 - q1).perp_dot(p1 - q1);
    let d4 = (q2 - q1).perp_dot(p2 - q1);
    d1 * d2 <= 0.0 && d3 * d4 <= 0.0
}

/// Collection of terrain segments.
#[derive(Debug, Clone, Default)]
pub struct SegmentTerrain {
    segments: Vec<TerrainSegment>,
}

impl SegmentTerrain {
    /// Create an empty terrain.
    pub fn new() -> Self {
        Self::default()
    }

    /// All segments in insertion order.
    pub fn segments(&self) -> &[TerrainSegment] {
        &self.segments
    }

    /// Add a raw segment.
    pub fn push(&mut self, segment: TerrainSegment) -> &mut Self {
        self.segments.push(segment);
        self
    }

    /// Add a one-sided surface from `a` to `b` (front face on the left).
    pub fn add_segment(&mut self, a: Vec2, b: Vec2) -> &mut Self {
        self.push(TerrainSegment::new(a, b))
    }

    /// Add a closed polygon given in counter-clockwise order.
    pub fn add_polygon(&mut self, points: &[Vec2]) -> &mut Self {
        self.add_polygon_with(points, None, SurfaceFlags::SOLID)
    }

    /// Add a closed counter-clockwise polygon owned by `entity`.
    pub fn add_polygon_with(
        &mut self,
        points: &[Vec2],
        entity: Option<Entity>,
        flags: SurfaceFlags,
    ) -> &mut Self {
        if points.len() < 2 {
            return self;
        }
        for i in 0..points.len() {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            // Reversed so the front face is the polygon's outside.
            let mut segment = TerrainSegment::new(b, a);
            segment.entity = entity;
            segment.flags = flags;
            self.segments.push(segment);
        }
        self
    }

    /// Add an axis-aligned solid box.
    pub fn add_box(&mut self, center: Vec2, half_extents: Vec2) -> &mut Self {
        self.add_box_with(center, half_extents, None, SurfaceFlags::SOLID)
    }

    /// Add an axis-aligned solid box owned by `entity`.
    pub fn add_box_with(
        &mut self,
        center: Vec2,
        half_extents: Vec2,
        entity: Option<Entity>,
        flags: SurfaceFlags,
    ) -> &mut Self {
        let min = center - half_extents;
        let max = center + half_extents;
        self.add_polygon_with(
            &[min, Vec2::new(max.x, min.y), max, Vec2::new(min.x, max.y)],
            entity,
            flags,
        )
    }

    /// Add a solid quarter or half pipe approximated by `steps` segments.
    ///
    /// The arc runs counter-clockwise from `start_degrees` to `end_degrees`
    /// (standard math angles) around `center`. With `inside = true` the
    /// front faces point toward the center, which is what a loop or a
    /// quarter pipe looks like from the inside.
    pub fn add_arc(
        &mut self,
        center: Vec2,
        radius: f32,
        start_degrees: f32,
        end_degrees: f32,
        steps: usize,
        inside: bool,
    ) -> &mut Self {
        let steps = steps.max(1);
        let point = |i: usize| {
            let t = start_degrees + (end_degrees - start_degrees) * i as f32 / steps as f32;
            center + Vec2::from_angle(t.to_radians()) * radius
        };
        for i in 0..steps {
            let (p, q) = (point(i), point(i + 1));
            if inside {
                self.add_segment(p, q);
            } else {
                self.add_segment(q, p);
            }
        }
        self
    }
}

impl TerrainQuery for SegmentTerrain {
    fn raycast(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        mask: CollisionMask,
    ) -> Option<SurfaceHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec2::ZERO || max_distance <= 0.0 {
            return None;
        }
        let mut best: Option<SurfaceHit> = None;
        for segment in &self.segments {
            if !mask.matches(segment.layers) {
                continue;
            }
            let Some((distance, point)) = segment.intersect(origin, direction, max_distance) else {
                continue;
            };
            // Strictly nearer only: the first segment wins exact ties.
            if best.is_none_or(|b| distance < b.distance) {
                best = Some(
                    SurfaceHit::new(distance, segment.normal, point, segment.entity)
                        .with_flags(segment.flags),
                );
            }
        }
        best
    }

    fn overlap_box(&self, center: Vec2, size: Vec2, mask: CollisionMask) -> Vec<Entity> {
        let half = size.abs() * 0.5;
        let (min, max) = (center - half, center + half);
        let mut found = Vec::new();
        for segment in &self.segments {
            let Some(entity) = segment.entity else {
                continue;
            };
            if mask.matches(segment.layers)
                && !found.contains(&entity)
                && segment.overlaps_box(min, max)
            {
                found.push(entity);
            }
        }
        found
    }
}

/// Resource holding the level geometry for [`SegmentTerrainBackend`].
#[derive(Resource, Debug, Clone, Default, Deref, DerefMut)]
pub struct TerrainResource(pub SegmentTerrain);

/// Backend that simulates players against a [`TerrainResource`].
pub struct SegmentTerrainBackend;

impl CharacterPhysicsBackend for SegmentTerrainBackend {
    fn plugin() -> impl Plugin {
        SegmentTerrainBackendPlugin
    }
}

/// Plugin that ticks players against the [`TerrainResource`].
pub struct SegmentTerrainBackendPlugin;

impl Plugin for SegmentTerrainBackendPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TerrainResource>();
        app.add_systems(
            FixedUpdate,
            segment_terrain_tick.in_set(HedgeControllerSet::Simulation),
        );
    }
}

fn segment_terrain_tick(
    time: Res<Time<Fixed>>,
    stage: Res<StageContext>,
    terrain: Res<TerrainResource>,
    mut players: Query<(Entity, &mut Player, &PlayerInput)>,
) {
    let ctx = tick_context(&time, &stage);
    for (entity, mut player, input) in &mut players {
        simulate_player(entity, &mut player, input, &ctx, &terrain.0);
    }
}
