//! Structured room model produced from one capture session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::geometry::{Bounds2, Point3};

/// Current on-disk format version for room metadata.
pub const ROOM_FORMAT_VERSION: u32 = 1;

/// Detection confidence reported by the capture layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            other => Err(format!("unknown confidence level '{}'", other)),
        }
    }
}

/// Kinds of planar surfaces in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceCategory {
    Wall,
    Floor,
    Door,
    Window,
    Opening,
}

impl SurfaceCategory {
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceCategory::Wall => "wall",
            SurfaceCategory::Floor => "floor",
            SurfaceCategory::Door => "door",
            SurfaceCategory::Window => "window",
            SurfaceCategory::Opening => "opening",
        }
    }
}

/// Furniture and fixture categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectCategory {
    Storage,
    Refrigerator,
    Stove,
    Bed,
    Sink,
    WasherDryer,
    Toilet,
    Bathtub,
    Oven,
    Dishwasher,
    Table,
    Sofa,
    Chair,
    Fireplace,
    Television,
    Stairs,
}

impl ObjectCategory {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectCategory::Storage => "storage",
            ObjectCategory::Refrigerator => "refrigerator",
            ObjectCategory::Stove => "stove",
            ObjectCategory::Bed => "bed",
            ObjectCategory::Sink => "sink",
            ObjectCategory::WasherDryer => "washer_dryer",
            ObjectCategory::Toilet => "toilet",
            ObjectCategory::Bathtub => "bathtub",
            ObjectCategory::Oven => "oven",
            ObjectCategory::Dishwasher => "dishwasher",
            ObjectCategory::Table => "table",
            ObjectCategory::Sofa => "sofa",
            ObjectCategory::Chair => "chair",
            ObjectCategory::Fireplace => "fireplace",
            ObjectCategory::Television => "television",
            ObjectCategory::Stairs => "stairs",
        }
    }
}

/// A planar polygon (wall, floor, door, window or opening).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub id: Uuid,
    pub category: SurfaceCategory,
    /// Polygon corners in world space, in winding order
    pub polygon: Vec<Point3>,
    pub confidence: Confidence,
}

impl Surface {
    pub fn centroid(&self) -> Point3 {
        if self.polygon.is_empty() {
            return Point3::new(0.0, 0.0, 0.0);
        }
        let n = self.polygon.len() as f64;
        let (x, y, z) = self
            .polygon
            .iter()
            .fold((0.0, 0.0, 0.0), |(x, y, z), p| (x + p.x, y + p.y, z + p.z));
        Point3::new(x / n, y / n, z / n)
    }

    /// The horizontal span of a vertical surface: its two corners that are
    /// farthest apart on the floor plane, at floor level.
    pub fn horizontal_segment(&self) -> Option<(Point3, Point3)> {
        let mut best: Option<(Point3, Point3, f64)> = None;
        for (i, a) in self.polygon.iter().enumerate() {
            for b in &self.polygon[i + 1..] {
                let d = a.horizontal_distance(b);
                if best.map_or(true, |(_, _, bd)| d > bd) {
                    best = Some((*a, *b, d));
                }
            }
        }
        let (a, b, d) = best?;
        if d <= f64::EPSILON {
            return None;
        }
        let floor = self.min_elevation();
        Some((Point3::new(a.x, floor, a.z), Point3::new(b.x, floor, b.z)))
    }

    pub fn length(&self) -> f64 {
        self.horizontal_segment()
            .map(|(a, b)| a.horizontal_distance(&b))
            .unwrap_or(0.0)
    }

    pub fn min_elevation(&self) -> f64 {
        self.polygon.iter().map(|p| p.y).fold(f64::INFINITY, f64::min)
    }

    pub fn height(&self) -> f64 {
        let max = self
            .polygon
            .iter()
            .map(|p| p.y)
            .fold(f64::NEG_INFINITY, f64::max);
        (max - self.min_elevation()).max(0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.polygon.iter().all(Point3::is_finite)
    }
}

/// A detected object, represented as an oriented box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomObject {
    pub id: Uuid,
    pub category: ObjectCategory,
    /// Box center in world space
    pub center: Point3,
    /// Width (x), height (y), depth (z) before rotation
    pub dimensions: Point3,
    /// Rotation around the vertical axis, radians
    pub yaw: f64,
    pub confidence: Confidence,
}

impl RoomObject {
    /// Box corners: bottom face first, then top face, both counter-clockwise.
    pub fn corners(&self) -> [Point3; 8] {
        let hx = self.dimensions.x / 2.0;
        let hy = self.dimensions.y / 2.0;
        let hz = self.dimensions.z / 2.0;
        let local = [
            (-hx, -hy, -hz),
            (hx, -hy, -hz),
            (hx, -hy, hz),
            (-hx, -hy, hz),
            (-hx, hy, -hz),
            (hx, hy, -hz),
            (hx, hy, hz),
            (-hx, hy, hz),
        ];
        local.map(|(x, y, z)| {
            Point3::new(self.center.x + x, self.center.y + y, self.center.z + z)
                .rotated_about_y(&self.center, self.yaw)
        })
    }

    pub fn is_finite(&self) -> bool {
        self.center.is_finite() && self.dimensions.is_finite() && self.yaw.is_finite()
    }
}

/// The geometric/semantic payload of a room or structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomGeometry {
    pub walls: Vec<Surface>,
    pub doors: Vec<Surface>,
    pub windows: Vec<Surface>,
    pub openings: Vec<Surface>,
    pub floors: Vec<Surface>,
    pub objects: Vec<RoomObject>,
}

impl RoomGeometry {
    /// All surfaces in a fixed category order.
    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> {
        self.walls
            .iter()
            .chain(&self.doors)
            .chain(&self.windows)
            .chain(&self.openings)
            .chain(&self.floors)
    }

    /// Push a surface into the list matching its category.
    pub fn push_surface(&mut self, surface: Surface) {
        match surface.category {
            SurfaceCategory::Wall => self.walls.push(surface),
            SurfaceCategory::Floor => self.floors.push(surface),
            SurfaceCategory::Door => self.doors.push(surface),
            SurfaceCategory::Window => self.windows.push(surface),
            SurfaceCategory::Opening => self.openings.push(surface),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.surfaces().all(Surface::is_finite) && self.objects.iter().all(RoomObject::is_finite)
    }

    /// Floor-plane bounds, from floors when present, otherwise from walls.
    pub fn footprint(&self) -> Option<Bounds2> {
        let source = if self.floors.is_empty() {
            &self.walls
        } else {
            &self.floors
        };
        Bounds2::from_points(source.iter().flat_map(|s| s.polygon.iter()))
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces().next().is_none() && self.objects.is_empty()
    }
}

/// One processed scan of a single physical room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub identifier: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: u32,
    pub geometry: RoomGeometry,
}

fn default_version() -> u32 {
    ROOM_FORMAT_VERSION
}

impl Room {
    /// Create a room with a fresh identifier.
    pub fn new(geometry: RoomGeometry) -> Self {
        Self {
            identifier: Uuid::new_v4(),
            created_at: Utc::now(),
            version: ROOM_FORMAT_VERSION,
            geometry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall(a: (f64, f64), b: (f64, f64)) -> Surface {
        Surface {
            id: Uuid::new_v4(),
            category: SurfaceCategory::Wall,
            polygon: vec![
                Point3::new(a.0, 0.0, a.1),
                Point3::new(b.0, 0.0, b.1),
                Point3::new(b.0, 2.5, b.1),
                Point3::new(a.0, 2.5, a.1),
            ],
            confidence: Confidence::High,
        }
    }

    #[test]
    fn test_wall_segment_and_height() {
        let w = wall((0.0, 0.0), (3.0, 4.0));
        let (a, b) = w.horizontal_segment().unwrap();
        assert_eq!(a.y, 0.0);
        assert!((a.horizontal_distance(&b) - 5.0).abs() < 1e-9);
        assert!((w.height() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_parses_case_insensitively() {
        assert_eq!("High".parse::<Confidence>(), Ok(Confidence::High));
        assert_eq!(" low ".parse::<Confidence>(), Ok(Confidence::Low));
        assert!("certain".parse::<Confidence>().is_err());
    }

    #[test]
    fn test_push_surface_routes_by_category() {
        let mut geometry = RoomGeometry::default();
        geometry.push_surface(wall((0.0, 0.0), (1.0, 0.0)));
        let mut door = wall((0.2, 0.0), (0.8, 0.0));
        door.category = SurfaceCategory::Door;
        geometry.push_surface(door);
        assert_eq!(geometry.walls.len(), 1);
        assert_eq!(geometry.doors.len(), 1);
        assert_eq!(geometry.surfaces().count(), 2);
    }

    #[test]
    fn test_object_corners_follow_yaw() {
        let object = RoomObject {
            id: Uuid::new_v4(),
            category: ObjectCategory::Table,
            center: Point3::new(1.0, 0.5, 1.0),
            dimensions: Point3::new(2.0, 1.0, 1.0),
            yaw: std::f64::consts::FRAC_PI_2,
            confidence: Confidence::High,
        };
        let corners = object.corners();
        // Width now runs along z after a quarter turn
        let xs: Vec<f64> = corners.iter().map(|c| c.x).collect();
        let span_x = xs.iter().cloned().fold(f64::MIN, f64::max)
            - xs.iter().cloned().fold(f64::MAX, f64::min);
        assert!((span_x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_room_roundtrips_through_json() {
        let mut geometry = RoomGeometry::default();
        geometry.push_surface(wall((0.0, 0.0), (4.0, 0.0)));
        let room = Room::new(geometry);
        let json = serde_json::to_string(&room).unwrap();
        let decoded: Room = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, room);
    }
}
