//! Spatial primitives and the octree index for point resources.

use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by index construction.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive region size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Number of points a node stores before it splits into octants.
pub const DEFAULT_NODE_CAPACITY: usize = 4;

/// A position in world space. Resources carry no identity beyond their coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point {
    /// Create a point from its coordinates.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length of the vector from the origin.
    #[must_use]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: &Point) -> f32 {
        (*self - *other).length()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Point {
    type Output = Point;

    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Octant center offsets in routing order: the four front (+z) children
/// sweeping top-right, top-left, bottom-left, bottom-right, then the same
/// four at the back. Right is +x, top is +y, front is +z.
const OCTANT_OFFSETS: [(f32, f32, f32); 8] = [
    (1.0, 1.0, 1.0),
    (-1.0, 1.0, 1.0),
    (-1.0, -1.0, 1.0),
    (1.0, -1.0, 1.0),
    (1.0, 1.0, -1.0),
    (-1.0, 1.0, -1.0),
    (-1.0, -1.0, -1.0),
    (1.0, -1.0, -1.0),
];

/// Axis-aligned cube described by its center and half-extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingCube {
    pub center: Point,
    pub half_extent: f32,
}

impl BoundingCube {
    /// Create a cube from its center and half-extent.
    #[must_use]
    pub const fn new(center: Point, half_extent: f32) -> Self {
        Self {
            center,
            half_extent,
        }
    }

    /// Closed-interval containment on all three axes. Points on a face,
    /// edge, or corner count as inside.
    #[must_use]
    pub fn contains_point(&self, point: &Point) -> bool {
        (point.x - self.center.x).abs() <= self.half_extent
            && (point.y - self.center.y).abs() <= self.half_extent
            && (point.z - self.center.z).abs() <= self.half_extent
    }

    /// Same center with the half-extent grown by `extra`.
    #[must_use]
    pub fn padded(&self, extra: f32) -> Self {
        Self {
            center: self.center,
            half_extent: self.half_extent + extra,
        }
    }

    /// Conservative overlap pre-test: pads the cube by the volume's
    /// bounding radius and checks the volume's center. Never rejects a
    /// volume that truly overlaps the cube.
    #[must_use]
    pub fn could_intersect(&self, volume: &dyn HitVolume) -> bool {
        self.padded(volume.bounding_radius())
            .contains_point(&volume.center())
    }

    /// Child cube for one of the eight octants, in routing order.
    #[must_use]
    pub fn octant(&self, index: usize) -> Self {
        let (dx, dy, dz) = OCTANT_OFFSETS[index];
        let half = self.half_extent / 2.0;
        Self {
            center: Point::new(
                self.center.x + dx * half,
                self.center.y + dy * half,
                self.center.z + dz * half,
            ),
            half_extent: half,
        }
    }
}

/// Query volume accepted by [`Octree::consume`].
///
/// Implementations provide the exact membership test plus a center and
/// bounding radius used for conservative subtree pruning.
pub trait HitVolume {
    /// World-space center of the volume.
    fn center(&self) -> Point;

    /// Radius of a sphere around [`HitVolume::center`] enclosing the whole volume.
    fn bounding_radius(&self) -> f32;

    /// Exact test: is `point` inside the volume?
    fn contains_point(&self, point: &Point) -> bool;
}

/// View adapter notified as points enter and leave the index.
///
/// Renderers mirror index contents through these callbacks instead of
/// polling the tree.
pub trait ResourceObserver: Send {
    fn on_resource_added(&mut self, point: &Point);
    fn on_resource_removed(&mut self, point: &Point);
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ResourceObserver for NullObserver {
    fn on_resource_added(&mut self, _point: &Point) {}
    fn on_resource_removed(&mut self, _point: &Point) {}
}

#[derive(Debug, Clone)]
struct Node {
    region: BoundingCube,
    points: Vec<Point>,
    children: Option<Box<[Node; 8]>>,
}

impl Node {
    fn new(region: BoundingCube) -> Self {
        Self {
            region,
            points: Vec::new(),
            children: None,
        }
    }

    /// Splits into all eight octants at once. Points already held here
    /// stay put; only later inserts route into the children.
    fn subdivide(&mut self) {
        let children = std::array::from_fn(|index| Node::new(self.region.octant(index)));
        self.children = Some(Box::new(children));
    }

    fn insert(&mut self, point: Point, capacity: usize) -> bool {
        if !self.region.contains_point(&point) {
            return false;
        }
        if self.children.is_none() {
            if self.points.len() < capacity {
                self.points.push(point);
                return true;
            }
            self.subdivide();
        }
        if let Some(children) = self.children.as_deref_mut() {
            for child in children.iter_mut() {
                if child.insert(point, capacity) {
                    return true;
                }
            }
        }
        false
    }

    fn consume(&mut self, volume: &dyn HitVolume, out: &mut Vec<Point>) {
        if !self.region.could_intersect(volume) {
            return;
        }
        self.points.retain(|point| {
            if volume.contains_point(point) {
                out.push(*point);
                false
            } else {
                true
            }
        });
        if let Some(children) = self.children.as_deref_mut() {
            for child in children.iter_mut() {
                child.consume(volume, out);
            }
        }
    }

    fn for_each_point(&self, visit: &mut dyn FnMut(&Point)) {
        for point in &self.points {
            visit(point);
        }
        if let Some(children) = self.children.as_deref() {
            for child in children.iter() {
                child.for_each_point(visit);
            }
        }
    }

    fn node_count(&self) -> usize {
        1 + self
            .children
            .as_deref()
            .map_or(0, |children| children.iter().map(Node::node_count).sum())
    }

    fn depth(&self) -> usize {
        1 + self.children.as_deref().map_or(0, |children| {
            children.iter().map(Node::depth).max().unwrap_or(0)
        })
    }
}

/// Recursive eight-way index over point resources.
///
/// Each node holds up to `capacity` points; the first insert past capacity
/// splits the node into eight octants. Points already stored on a node
/// never migrate into its children, and subdivision is permanent. A point
/// lying on a splitting plane is owned by the first octant in routing
/// order that contains it.
pub struct Octree {
    root: Node,
    capacity: usize,
    len: usize,
    observer: Box<dyn ResourceObserver>,
}

impl Octree {
    /// Create an index over `region` with [`DEFAULT_NODE_CAPACITY`].
    pub fn new(region: BoundingCube) -> Result<Self, IndexError> {
        Self::with_capacity(region, DEFAULT_NODE_CAPACITY)
    }

    /// Create an index with an explicit per-node capacity.
    pub fn with_capacity(region: BoundingCube, capacity: usize) -> Result<Self, IndexError> {
        Self::with_observer(region, capacity, Box::new(NullObserver))
    }

    /// Create an index whose mutations notify `observer`.
    pub fn with_observer(
        region: BoundingCube,
        capacity: usize,
        observer: Box<dyn ResourceObserver>,
    ) -> Result<Self, IndexError> {
        if !region.half_extent.is_finite() || region.half_extent <= 0.0 {
            return Err(IndexError::InvalidConfig(
                "region half_extent must be positive and finite",
            ));
        }
        if capacity == 0 {
            return Err(IndexError::InvalidConfig(
                "node capacity must be at least 1",
            ));
        }
        Ok(Self {
            root: Node::new(region),
            capacity,
            len: 0,
            observer,
        })
    }

    /// Index `point`, returning whether it was stored. Points outside the
    /// root region are dropped without an observer callback.
    pub fn insert(&mut self, point: Point) -> bool {
        if self.root.insert(point, self.capacity) {
            self.len += 1;
            self.observer.on_resource_added(&point);
            true
        } else {
            false
        }
    }

    /// Remove and return every indexed point inside `volume`, pruning
    /// subtrees the volume cannot reach. The observer hears one removal
    /// per returned point, in removal order.
    pub fn consume(&mut self, volume: &dyn HitVolume) -> Vec<Point> {
        let mut consumed = Vec::new();
        self.root.consume(volume, &mut consumed);
        self.len -= consumed.len();
        for point in &consumed {
            self.observer.on_resource_removed(point);
        }
        consumed
    }

    /// Number of points currently indexed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Region covered by the root node.
    #[must_use]
    pub fn region(&self) -> BoundingCube {
        self.root.region
    }

    /// Per-node point capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Visit every indexed point in storage order.
    pub fn for_each_point(&self, mut visit: impl FnMut(&Point)) {
        self.root.for_each_point(&mut visit);
    }

    /// Total allocated nodes, subdivided or not.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Height of the deepest allocated node chain.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Replace the change observer. Existing contents are not replayed.
    pub fn set_observer(&mut self, observer: Box<dyn ResourceObserver>) {
        self.observer = observer;
    }
}

impl fmt::Debug for Octree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Octree")
            .field("region", &self.root.region)
            .field("capacity", &self.capacity)
            .field("len", &self.len)
            .field("node_count", &self.node_count())
            .finish()
    }
}
