//! Geometric primitives shared by rooms and structures.
//!
//! Coordinates are metres in the capture's world frame, Y-up. The
//! horizontal (floor) plane is X/Z.

use serde::{Deserialize, Serialize};

/// A point in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Distance ignoring elevation.
    pub fn horizontal_distance(&self, other: &Point3) -> f64 {
        (self.x - other.x).hypot(self.z - other.z)
    }

    pub fn midpoint(&self, other: &Point3) -> Point3 {
        Point3::new(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
    }

    /// Round every component to a multiple of `step`.
    pub fn rounded(&self, step: f64) -> Point3 {
        let round = |v: f64| (v / step).round() * step;
        Point3::new(round(self.x), round(self.y), round(self.z))
    }

    /// Rotate around a vertical axis passing through `pivot`.
    pub fn rotated_about_y(&self, pivot: &Point3, angle: f64) -> Point3 {
        let (sin, cos) = angle.sin_cos();
        let dx = self.x - pivot.x;
        let dz = self.z - pivot.z;
        Point3::new(
            pivot.x + dx * cos - dz * sin,
            self.y,
            pivot.z + dx * sin + dz * cos,
        )
    }
}

/// Heading of the horizontal segment `a -> b`, in radians.
pub fn horizontal_heading(a: &Point3, b: &Point3) -> f64 {
    (b.z - a.z).atan2(b.x - a.x)
}

/// Signed difference between `angle` and the nearest multiple of a quarter
/// turn measured from `reference`. Result lies in `(-PI/4, PI/4]`.
pub fn quarter_turn_offset(angle: f64, reference: f64) -> f64 {
    let quarter = std::f64::consts::FRAC_PI_2;
    let relative = angle - reference;
    relative - (relative / quarter).round() * quarter
}

/// Smallest angle between two undirected lines, in `[0, PI/2]`.
pub fn line_angle_between(a: f64, b: f64) -> f64 {
    let half = std::f64::consts::PI;
    let mut diff = (a - b).rem_euclid(half);
    if diff > half / 2.0 {
        diff = half - diff;
    }
    diff
}

/// Area of a polygon projected onto the floor plane (shoelace formula).
pub fn horizontal_area(points: &[Point3]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x * q.z - q.x * p.z;
    }
    (twice_area / 2.0).abs()
}

/// Axis-aligned bounds on the floor plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds2 {
    pub min_x: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_z: f64,
}

impl Bounds2 {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Bounds2 {
            min_x: first.x,
            min_z: first.z,
            max_x: first.x,
            max_z: first.z,
        };
        for p in iter {
            bounds.min_x = bounds.min_x.min(p.x);
            bounds.min_z = bounds.min_z.min(p.z);
            bounds.max_x = bounds.max_x.max(p.x);
            bounds.max_z = bounds.max_z.max(p.z);
        }
        Some(bounds)
    }

    pub fn area(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0) * (self.max_z - self.min_z).max(0.0)
    }

    pub fn intersection_area(&self, other: &Bounds2) -> f64 {
        let width = self.max_x.min(other.max_x) - self.min_x.max(other.min_x);
        let depth = self.max_z.min(other.max_z) - self.min_z.max(other.min_z);
        if width <= 0.0 || depth <= 0.0 {
            0.0
        } else {
            width * depth
        }
    }
}
