//! Core world state and the deterministic tick loop for the minnow tank.

use minnow_index::{
    BoundingCube, HitVolume, IndexError, NullObserver, Octree, Point, ResourceObserver,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f32::consts::FRAC_PI_2;
use std::fmt;
use thiserror::Error;

/// Mouth cylinder length as a multiple of fish size.
pub const HIT_LENGTH_FACTOR: f32 = 1.3;

/// Mouth cylinder radius as a multiple of fish size.
pub const HIT_RADIUS_FACTOR: f32 = 0.2;

/// Errors reported while building a world.
#[derive(Debug, Error)]
pub enum WorldStateError {
    /// Configuration values that cannot drive a simulation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The spatial index rejected its parameters.
    #[error("index setup failed: {0}")]
    Index(#[from] IndexError),
}

/// Rotate `point` about the +y axis by `yaw`, then about the +x axis by
/// `pitch`. Both angles are radians, following the right-hand rule.
///
/// The fish's own frame applies pitch before yaw, so one call with the
/// negated angles maps world coordinates into fish-local coordinates, and
/// two chained calls (`(point, 0, pitch)` then `(point, yaw, 0)`) map the
/// other way.
#[must_use]
pub fn rotate_by_angles(point: Point, yaw: f32, pitch: f32) -> Point {
    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    let (sin_pitch, cos_pitch) = pitch.sin_cos();
    let x = cos_yaw * point.x + sin_yaw * point.z;
    let swung = -sin_yaw * point.x + cos_yaw * point.z;
    let y = cos_pitch * point.y - sin_pitch * swung;
    let z = sin_pitch * point.y + cos_pitch * swung;
    Point::new(x, y, z)
}

/// Uniform sample from `[min, max]`, rounded to the nearest hundredth.
/// Rounding never escapes the closed interval.
#[must_use]
pub fn sample_coord<R: Rng>(rng: &mut R, min: f32, max: f32) -> f32 {
    (rng.random_range(min..=max) * 100.0).round() / 100.0
}

/// Monotonic tick counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Tick(pub u64);

impl Tick {
    /// Tick before any stepping has happened.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// The tick after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Player control state sampled once per frame and applied to each tick
/// stepped under it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlIntent {
    pub thrust: bool,
    pub pitch_up: bool,
    pub yaw_left: bool,
    pub pitch_down: bool,
    pub yaw_right: bool,
}

impl ControlIntent {
    /// Nothing held.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            thrust: false,
            pitch_up: false,
            yaw_left: false,
            pitch_down: false,
            yaw_right: false,
        }
    }

    /// Thrust only. Headless runs swim the fish with this.
    #[must_use]
    pub const fn cruise() -> Self {
        Self {
            thrust: true,
            pitch_up: false,
            yaw_left: false,
            pitch_down: false,
            yaw_right: false,
        }
    }
}

/// The player agent. Its mouth is a capped cylinder along the local z axis,
/// scaled by `size`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fish {
    pub position: Point,
    /// Heading about +y, radians, unbounded.
    pub yaw: f32,
    /// Elevation about +x, radians, held within ±π/2.
    pub pitch: f32,
    /// Grows by one per plankton eaten.
    pub size: f32,
    /// Speed in [0, 1].
    pub velocity: f32,
}

impl Fish {
    /// A fresh size-1 fish at rest, facing -z.
    #[must_use]
    pub const fn new(position: Point) -> Self {
        Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            size: 1.0,
            velocity: 0.0,
        }
    }

    /// Mouth cylinder length.
    #[must_use]
    pub fn hit_length(&self) -> f32 {
        HIT_LENGTH_FACTOR * self.size
    }

    /// Mouth cylinder radius.
    #[must_use]
    pub fn hit_radius(&self) -> f32 {
        HIT_RADIUS_FACTOR * self.size
    }

    /// Unit vector the fish swims along: local -z carried into world space.
    #[must_use]
    pub fn forward(&self) -> Point {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Point::new(-sin_yaw * cos_pitch, sin_pitch, -cos_yaw * cos_pitch)
    }

    /// Mouth test in fish-local coordinates: within half the cylinder
    /// length along z and within the radius of the z axis.
    #[must_use]
    pub fn contains_local(&self, x: f32, y: f32, z: f32) -> bool {
        z.abs() <= self.hit_length() / 2.0 && x.hypot(y) <= self.hit_radius()
    }

    /// Mouth test against a world-space point.
    #[must_use]
    pub fn contains_world(&self, point: &Point) -> bool {
        let local = rotate_by_angles(*point - self.position, -self.yaw, -self.pitch);
        self.contains_local(local.x, local.y, local.z)
    }

    /// One plankton swallowed.
    pub fn grow(&mut self) {
        self.size += 1.0;
    }

    /// World-space point a chase camera eases toward, above and behind the
    /// fish and scaled with its size.
    #[must_use]
    pub fn chase_anchor(&self) -> Point {
        let local = Point::new(0.0, 1.4 * self.size, 2.5 * self.size);
        let tilted = rotate_by_angles(local, 0.0, self.pitch);
        self.position + rotate_by_angles(tilted, self.yaw, 0.0)
    }
}

impl Default for Fish {
    fn default() -> Self {
        Self::new(Point::new(0.0, 0.0, 0.0))
    }
}

impl HitVolume for Fish {
    fn center(&self) -> Point {
        self.position
    }

    fn bounding_radius(&self) -> f32 {
        (self.hit_length() / 2.0).hypot(self.hit_radius())
    }

    fn contains_point(&self, point: &Point) -> bool {
        self.contains_world(point)
    }
}

/// Tunable world parameters. `Default` reproduces the reference tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinnowConfig {
    /// Half the edge length of the cubic world.
    pub world_half_extent: f32,
    /// Points held per octree node before it subdivides.
    pub node_capacity: usize,
    /// Plankton seeded at construction; the population stays at this count.
    pub plankton_count: usize,
    /// Velocity gained per thrusting tick.
    pub thrust_acceleration: f32,
    /// Fraction of velocity shed per coasting tick.
    pub drag_coefficient: f32,
    /// Flat velocity shed per coasting tick.
    pub drag_constant: f32,
    /// Exponent mapping velocity to distance covered per tick.
    pub velocity_exponent: f32,
    /// Radians turned per tick per held direction.
    pub turn_rate: f32,
    /// Tick summaries retained for trend displays.
    pub history_capacity: usize,
    /// Fixed RNG seed; `None` draws one from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for MinnowConfig {
    fn default() -> Self {
        Self {
            world_half_extent: 100.0,
            node_capacity: 4,
            plankton_count: 800,
            thrust_acceleration: 0.05,
            drag_coefficient: 0.1,
            drag_constant: 0.001,
            velocity_exponent: 0.6,
            turn_rate: 0.07,
            history_capacity: 256,
            rng_seed: None,
        }
    }
}

impl MinnowConfig {
    /// Validate the parameters and derive the root region. A zero
    /// `plankton_count` is legal and yields an empty tank for scripted
    /// scenarios.
    pub fn world_region(&self) -> Result<BoundingCube, WorldStateError> {
        if !self.world_half_extent.is_finite() || self.world_half_extent <= 0.0 {
            return Err(WorldStateError::InvalidConfig(
                "world_half_extent must be positive and finite",
            ));
        }
        if self.node_capacity == 0 {
            return Err(WorldStateError::InvalidConfig(
                "node_capacity must be at least 1",
            ));
        }
        if !self.thrust_acceleration.is_finite() || self.thrust_acceleration <= 0.0 {
            return Err(WorldStateError::InvalidConfig(
                "thrust_acceleration must be positive and finite",
            ));
        }
        if !(0.0..1.0).contains(&self.drag_coefficient) {
            return Err(WorldStateError::InvalidConfig(
                "drag_coefficient must lie in [0, 1)",
            ));
        }
        if !self.drag_constant.is_finite() || self.drag_constant < 0.0 {
            return Err(WorldStateError::InvalidConfig(
                "drag_constant must be non-negative and finite",
            ));
        }
        if !self.velocity_exponent.is_finite() || self.velocity_exponent <= 0.0 {
            return Err(WorldStateError::InvalidConfig(
                "velocity_exponent must be positive and finite",
            ));
        }
        if !self.turn_rate.is_finite() || self.turn_rate <= 0.0 {
            return Err(WorldStateError::InvalidConfig(
                "turn_rate must be positive and finite",
            ));
        }
        if self.history_capacity == 0 {
            return Err(WorldStateError::InvalidConfig(
                "history_capacity must be at least 1",
            ));
        }
        Ok(BoundingCube::new(
            Point::new(0.0, 0.0, 0.0),
            self.world_half_extent,
        ))
    }

    /// Returns the configured RNG, seeding from entropy when no seed is set.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Outcome of one tick, returned from [`WorldState::step`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickEvents {
    pub tick: Tick,
    /// Plankton swallowed this tick, in removal order.
    pub consumed: Vec<Point>,
    /// Fresh plankton spawned in their place.
    pub replacements: usize,
}

/// Per-tick statistics retained in the world history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSummary {
    pub tick: Tick,
    pub consumed: usize,
    pub size: f32,
    pub velocity: f32,
    pub position: Point,
    pub plankton_count: usize,
}

/// The whole simulation: fish, plankton index, RNG, and rolling history.
///
/// Ticks run to completion on the calling thread; nothing here spawns or
/// locks.
pub struct WorldState {
    config: MinnowConfig,
    tick: Tick,
    fish: Fish,
    plankton: Octree,
    rng: SmallRng,
    history: VecDeque<TickSummary>,
    consumed_total: u64,
}

impl WorldState {
    /// Build a world from `config` with no observer attached.
    pub fn new(config: MinnowConfig) -> Result<Self, WorldStateError> {
        Self::with_observer(config, Box::new(NullObserver))
    }

    /// Build a world whose plankton index notifies `observer`, including
    /// one add per seeded point.
    pub fn with_observer(
        config: MinnowConfig,
        observer: Box<dyn ResourceObserver>,
    ) -> Result<Self, WorldStateError> {
        let region = config.world_region()?;
        let plankton = Octree::with_observer(region, config.node_capacity, observer)?;
        let rng = config.seeded_rng();
        let mut world = Self {
            config,
            tick: Tick::zero(),
            fish: Fish::new(Point::new(0.0, 0.0, 0.0)),
            plankton,
            rng,
            history: VecDeque::new(),
            consumed_total: 0,
        };
        for _ in 0..world.config.plankton_count {
            world.spawn_random_plankton();
        }
        Ok(world)
    }

    /// Advance the world by one tick. Returns what happened.
    pub fn step(&mut self, intent: ControlIntent) -> TickEvents {
        let next_tick = self.tick.next();
        self.stage_swim(intent);
        let (consumed, replacements) = self.stage_feed();
        self.stage_history(next_tick, consumed.len());
        self.tick = next_tick;
        TickEvents {
            tick: next_tick,
            consumed,
            replacements,
        }
    }

    /// Index one plankton at `point`. Returns false when the point falls
    /// outside the world region.
    pub fn spawn_plankton(&mut self, point: Point) -> bool {
        self.plankton.insert(point)
    }

    /// Advance velocity and position, then apply turns. Movement uses the
    /// heading from before this tick's turns, and the turn order is fixed:
    /// pitch up, yaw left, pitch down, yaw right.
    fn stage_swim(&mut self, intent: ControlIntent) {
        if intent.thrust {
            self.fish.velocity = (self.fish.velocity + self.config.thrust_acceleration).min(1.0);
        } else {
            self.fish.velocity = (self.fish.velocity
                - self.fish.velocity * self.config.drag_coefficient
                - self.config.drag_constant)
                .max(0.0);
        }

        let distance = self.fish.velocity.powf(self.config.velocity_exponent);
        let heading = self.fish.forward();
        self.fish.position = self.fish.position + heading * distance;

        let rate = self.config.turn_rate;
        if intent.pitch_up {
            self.fish.pitch = (self.fish.pitch + rate).min(FRAC_PI_2);
        }
        if intent.yaw_left {
            self.fish.yaw += rate;
        }
        if intent.pitch_down {
            self.fish.pitch = (self.fish.pitch - rate).max(-FRAC_PI_2);
        }
        if intent.yaw_right {
            self.fish.yaw -= rate;
        }
    }

    /// Swallow everything inside the mouth. Each consumed point grows the
    /// fish and spawns one replacement, so the population holds steady.
    fn stage_feed(&mut self) -> (Vec<Point>, usize) {
        let consumed = self.plankton.consume(&self.fish);
        let mut replacements = 0;
        for _ in &consumed {
            self.fish.grow();
            if self.spawn_random_plankton() {
                replacements += 1;
            }
        }
        self.consumed_total += consumed.len() as u64;
        (consumed, replacements)
    }

    fn stage_history(&mut self, tick: Tick, consumed: usize) {
        let summary = TickSummary {
            tick,
            consumed,
            size: self.fish.size,
            velocity: self.fish.velocity,
            position: self.fish.position,
            plankton_count: self.plankton.len(),
        };
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }

    fn spawn_random_plankton(&mut self) -> bool {
        let extent = self.config.world_half_extent;
        let point = Point::new(
            sample_coord(&mut self.rng, -extent, extent),
            sample_coord(&mut self.rng, -extent, extent),
            sample_coord(&mut self.rng, -extent, extent),
        );
        self.plankton.insert(point)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &MinnowConfig {
        &self.config
    }

    /// Mutable configuration access for live tuning.
    pub fn config_mut(&mut self) -> &mut MinnowConfig {
        &mut self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// The player fish.
    #[must_use]
    pub const fn fish(&self) -> &Fish {
        &self.fish
    }

    /// Mutable fish access for scripted scenarios.
    pub fn fish_mut(&mut self) -> &mut Fish {
        &mut self.fish
    }

    /// The plankton index.
    #[must_use]
    pub const fn plankton(&self) -> &Octree {
        &self.plankton
    }

    /// Retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Plankton consumed since construction.
    #[must_use]
    pub const fn consumed_total(&self) -> u64 {
        self.consumed_total
    }

    /// Borrow the world RNG mutably for deterministic sampling.
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Replace the plankton observer. Existing contents are not replayed.
    pub fn set_observer(&mut self, observer: Box<dyn ResourceObserver>) {
        self.plankton.set_observer(observer);
    }
}

impl fmt::Debug for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldState")
            .field("tick", &self.tick)
            .field("fish", &self.fish)
            .field("plankton", &self.plankton.len())
            .field("consumed_total", &self.consumed_total)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    fn approx_point(a: Point, b: Point) -> bool {
        approx(a.x, b.x) && approx(a.y, b.y) && approx(a.z, b.z)
    }

    fn empty_tank() -> WorldState {
        let config = MinnowConfig {
            plankton_count: 0,
            rng_seed: Some(7),
            ..MinnowConfig::default()
        };
        WorldState::new(config).expect("world")
    }

    #[test]
    fn yaw_and_pitch_rotate_about_their_axes() {
        let spun = rotate_by_angles(Point::new(0.0, 0.0, -1.0), FRAC_PI_2, 0.0);
        assert!(approx_point(spun, Point::new(-1.0, 0.0, 0.0)), "got {spun:?}");

        let lifted = rotate_by_angles(Point::new(0.0, 0.0, -1.0), 0.0, FRAC_PI_2);
        assert!(approx_point(lifted, Point::new(0.0, 1.0, 0.0)), "got {lifted:?}");

        let fixed = rotate_by_angles(Point::new(0.0, 1.0, 0.0), 1.234, 0.0);
        assert!(approx_point(fixed, Point::new(0.0, 1.0, 0.0)), "got {fixed:?}");
    }

    #[test]
    fn world_to_local_inverts_the_fish_frame() {
        let local = Point::new(0.3, -1.2, 2.1);
        let world = rotate_by_angles(rotate_by_angles(local, 0.0, -0.4), 0.8, 0.0);
        let back = rotate_by_angles(world, -0.8, 0.4);
        assert!(approx_point(back, local), "got {back:?}");
        assert!(
            approx(world.length(), local.length()),
            "rotation must preserve length"
        );

        // A single forward call unwinds through two calls in the reverse
        // per-axis order.
        let spun = rotate_by_angles(local, 0.8, -0.4);
        let unwound = rotate_by_angles(rotate_by_angles(spun, 0.0, 0.4), -0.8, 0.0);
        assert!(approx_point(unwound, local), "got {unwound:?}");
    }

    #[test]
    fn forward_is_a_unit_vector() {
        let mut fish = Fish::default();
        assert!(approx_point(fish.forward(), Point::new(0.0, 0.0, -1.0)));

        fish.yaw = 2.6;
        fish.pitch = -1.1;
        assert!(
            approx(fish.forward().length(), 1.0),
            "heading must stay unit length"
        );

        fish.pitch = FRAC_PI_2;
        assert!(
            approx_point(fish.forward(), Point::new(0.0, 1.0, 0.0)),
            "straight up at full pitch"
        );
    }

    #[test]
    fn mouth_is_a_capped_cylinder() {
        let fish = Fish::default();
        assert!(fish.contains_world(&Point::new(0.0, 0.0, 0.0)));
        assert!(fish.contains_world(&Point::new(0.0, 0.0, -0.65)));
        assert!(fish.contains_world(&Point::new(0.0, 0.0, 0.65)));
        assert!(!fish.contains_world(&Point::new(0.0, 0.0, 0.66)));
        assert!(fish.contains_world(&Point::new(0.2, 0.0, 0.0)));
        assert!(fish.contains_world(&Point::new(0.0, -0.2, 0.3)));
        assert!(
            !fish.contains_world(&Point::new(0.15, 0.15, 0.0)),
            "corner of the bounding box is outside the cylinder"
        );
    }

    #[test]
    fn mouth_follows_the_heading() {
        let mut fish = Fish::default();
        fish.yaw = FRAC_PI_2;
        // Mouth axis now runs along world x.
        assert!(fish.contains_world(&Point::new(0.6, 0.0, 0.0)));
        assert!(fish.contains_world(&Point::new(-0.6, 0.0, 0.0)));
        assert!(!fish.contains_world(&Point::new(0.0, 0.0, 0.6)));
    }

    #[test]
    fn mouth_scales_with_size() {
        let mut fish = Fish::default();
        let far = Point::new(0.0, 0.0, -1.2);
        assert!(!fish.contains_world(&far));

        fish.grow();
        assert_eq!(fish.size, 2.0);
        assert!(approx(fish.hit_length(), 2.6));
        assert!(approx(fish.hit_radius(), 0.4));
        assert!(fish.contains_world(&far), "a bigger fish reaches farther");
    }

    #[test]
    fn chase_anchor_trails_above_and_behind() {
        let mut fish = Fish::default();
        assert!(approx_point(fish.chase_anchor(), Point::new(0.0, 1.4, 2.5)));

        fish.size = 2.0;
        assert!(approx_point(fish.chase_anchor(), Point::new(0.0, 2.8, 5.0)));

        fish.size = 1.0;
        fish.pitch = FRAC_PI_2;
        assert!(
            approx_point(fish.chase_anchor(), Point::new(0.0, -2.5, 1.4)),
            "got {:?}",
            fish.chase_anchor()
        );

        fish.pitch = 0.0;
        fish.position = Point::new(3.0, -1.0, 4.0);
        assert!(approx_point(fish.chase_anchor(), Point::new(3.0, 0.4, 6.5)));
    }

    #[test]
    fn fish_consumes_only_points_inside_its_mouth() {
        let mut world = empty_tank();
        assert!(world.plankton().is_empty());

        // One point dead ahead inside the mouth, the rest just outside it.
        assert!(world.spawn_plankton(Point::new(0.0, 0.0, -0.5)));
        assert!(world.spawn_plankton(Point::new(0.0, 0.0, -0.9)));
        assert!(world.spawn_plankton(Point::new(0.3, 0.0, -0.5)));
        assert!(world.spawn_plankton(Point::new(0.0, 0.3, 0.5)));
        assert!(world.spawn_plankton(Point::new(5.0, 5.0, 5.0)));

        let events = world.step(ControlIntent::idle());
        assert_eq!(events.tick, Tick(1));
        assert_eq!(events.consumed, vec![Point::new(0.0, 0.0, -0.5)]);
        assert_eq!(events.replacements, 1);
        assert_eq!(world.fish().size, 2.0);
        assert_eq!(world.plankton().len(), 5, "replacement keeps the count");
        assert_eq!(world.consumed_total(), 1);
    }

    #[test]
    fn origin_fish_swallows_only_the_origin_point() {
        let region = BoundingCube::new(Point::new(0.0, 0.0, 0.0), 10.0);
        let mut tree = Octree::new(region).expect("tree");
        let points = [
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
            Point::new(0.0, 0.0, 1.0),
            Point::new(5.0, 5.0, 5.0),
        ];
        for point in &points {
            assert!(tree.insert(*point));
        }

        // The axis-unit points fail the radius or half-length bound of the
        // size-1 mouth; only the origin is inside.
        let fish = Fish::default();
        let consumed = tree.consume(&fish);
        assert_eq!(consumed, vec![Point::new(0.0, 0.0, 0.0)]);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn subdivided_cluster_is_fully_reachable_by_a_covering_mouth() {
        let region = BoundingCube::new(Point::new(0.0, 0.0, 0.0), 10.0);
        let mut tree = Octree::new(region).expect("tree");
        let cluster = [
            Point::new(1.0, 1.0, 1.0),
            Point::new(1.5, 1.0, 1.0),
            Point::new(1.0, 1.5, 1.0),
            Point::new(1.0, 1.0, 1.5),
            Point::new(2.0, 2.0, 2.0),
        ];
        for point in &cluster {
            assert!(tree.insert(*point));
        }
        assert!(tree.depth() > 1, "fifth insert in one octant subdivides");

        let mut giant = Fish::default();
        giant.size = 100.0;
        let consumed = tree.consume(&giant);
        assert_eq!(consumed.len(), 5);
        for point in &cluster {
            assert!(consumed.contains(point), "missing {point:?}");
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn thrust_saturates_and_drag_stops() {
        let mut world = empty_tank();

        for _ in 0..40 {
            world.step(ControlIntent::cruise());
        }
        assert_eq!(world.fish().velocity, 1.0, "thrust saturates at full speed");

        for _ in 0..400 {
            world.step(ControlIntent::idle());
        }
        assert_eq!(world.fish().velocity, 0.0, "drag coasts to a stop");
    }

    #[test]
    fn pitch_clamps_at_the_vertical() {
        let mut world = empty_tank();

        let up = ControlIntent {
            pitch_up: true,
            ..ControlIntent::idle()
        };
        for _ in 0..60 {
            world.step(up);
        }
        assert_eq!(world.fish().pitch, FRAC_PI_2, "pitch stops straight up");

        let down = ControlIntent {
            pitch_down: true,
            ..ControlIntent::idle()
        };
        for _ in 0..120 {
            world.step(down);
        }
        assert_eq!(world.fish().pitch, -FRAC_PI_2, "pitch stops straight down");

        // Opposed keys at the stop: the up clamp eats its half, the down
        // turn still applies.
        let both = ControlIntent {
            pitch_up: true,
            pitch_down: true,
            ..ControlIntent::idle()
        };
        world.fish_mut().pitch = FRAC_PI_2;
        world.step(both);
        assert!(
            approx(world.fish().pitch, FRAC_PI_2 - 0.07),
            "got {}",
            world.fish().pitch
        );
    }

    #[test]
    fn movement_uses_the_heading_from_before_the_turn() {
        let mut world = empty_tank();
        world.fish_mut().velocity = 1.0;

        let intent = ControlIntent {
            thrust: true,
            yaw_left: true,
            ..ControlIntent::idle()
        };
        world.step(intent);

        let fish = *world.fish();
        assert!(
            approx_point(fish.position, Point::new(0.0, 0.0, -1.0)),
            "got {:?}",
            fish.position
        );
        assert!(approx(fish.yaw, 0.07));
    }

    #[test]
    fn sample_coord_stays_on_the_hundredth_grid() {
        let mut rng = SmallRng::seed_from_u64(99);
        for _ in 0..2000 {
            let value = sample_coord(&mut rng, -100.0, 100.0);
            assert!((-100.0..=100.0).contains(&value), "got {value}");
            let scaled = value * 100.0;
            assert!((scaled - scaled.round()).abs() < 0.01, "got {value}");
        }
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        let bad_extent = MinnowConfig {
            world_half_extent: 0.0,
            ..MinnowConfig::default()
        };
        assert!(matches!(
            WorldState::new(bad_extent),
            Err(WorldStateError::InvalidConfig(_))
        ));

        let bad_drag = MinnowConfig {
            drag_coefficient: 1.0,
            ..MinnowConfig::default()
        };
        assert!(matches!(
            WorldState::new(bad_drag),
            Err(WorldStateError::InvalidConfig(_))
        ));

        let bad_history = MinnowConfig {
            history_capacity: 0,
            ..MinnowConfig::default()
        };
        assert!(matches!(
            WorldState::new(bad_history),
            Err(WorldStateError::InvalidConfig(_))
        ));

        let empty = MinnowConfig {
            plankton_count: 0,
            ..MinnowConfig::default()
        };
        assert!(WorldState::new(empty).is_ok(), "an empty tank is legal");
    }

    #[test]
    fn seeding_is_deterministic() {
        let config = MinnowConfig {
            rng_seed: Some(0xFEED),
            ..MinnowConfig::default()
        };
        let world_a = WorldState::new(config.clone()).expect("world");
        let world_b = WorldState::new(config).expect("world");

        let mut points_a = Vec::new();
        world_a.plankton().for_each_point(|point| points_a.push(*point));
        let mut points_b = Vec::new();
        world_b.plankton().for_each_point(|point| points_b.push(*point));
        assert_eq!(points_a.len(), 800);
        assert_eq!(points_a, points_b);

        let other = MinnowConfig {
            rng_seed: Some(0xBEEF),
            ..MinnowConfig::default()
        };
        let world_c = WorldState::new(other).expect("world");
        let mut points_c = Vec::new();
        world_c.plankton().for_each_point(|point| points_c.push(*point));
        assert_ne!(points_a, points_c, "different seeds scatter differently");
    }

    #[test]
    fn history_is_bounded_and_ordered() {
        let config = MinnowConfig {
            plankton_count: 0,
            history_capacity: 4,
            rng_seed: Some(7),
            ..MinnowConfig::default()
        };
        let mut world = WorldState::new(config).expect("world");
        for _ in 0..10 {
            world.step(ControlIntent::idle());
        }

        let summaries: Vec<_> = world.history().copied().collect();
        assert_eq!(summaries.len(), 4);
        assert_eq!(summaries.first().map(|s| s.tick), Some(Tick(7)));
        assert_eq!(summaries.last().map(|s| s.tick), Some(Tick(10)));
        assert_eq!(world.tick(), Tick(10));
    }
}
