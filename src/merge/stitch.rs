//! Default structure builder: validates room frames, then stitches shared
//! walls and duplicated doors/openings.

use std::collections::HashSet;

use thiserror::Error;

use crate::model::{
    horizontal_heading, line_angle_between, Point3, Room, RoomAdjacency, Structure, StructureRoom,
    Surface,
};
use crate::settings::MergeSettings;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MergeError {
    /// Rooms cannot coexist in one frame, usually a failed relocalization
    #[error("rooms are geometrically inconsistent: {0}")]
    Inconsistent(String),

    #[error("invalid merge input: {0}")]
    InvalidInput(String),
}

/// Combines several rooms into one structure.
pub trait StructureBuilder: Send + Sync {
    fn build(&self, rooms: &[Room]) -> Result<Structure, MergeError>;

    fn description(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct StitchConfig {
    pub stitch_distance: f64,
    pub stitch_angle_degrees: f64,
    pub max_footprint_overlap: f64,
}

impl From<&MergeSettings> for StitchConfig {
    fn from(settings: &MergeSettings) -> Self {
        Self {
            stitch_distance: settings.stitch_distance,
            stitch_angle_degrees: settings.stitch_angle_degrees,
            max_footprint_overlap: settings.max_footprint_overlap,
        }
    }
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self::from(&MergeSettings::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StitchingStructureBuilder {
    config: StitchConfig,
}

/// A wall already placed in the structure.
struct PlacedWall {
    room_index: usize,
    slot: usize,
    start: Point3,
    end: Point3,
    length: f64,
}

impl StitchingStructureBuilder {
    pub fn new(config: StitchConfig) -> Self {
        Self { config }
    }

    fn validate(&self, rooms: &[Room]) -> Result<(), MergeError> {
        let mut seen = HashSet::new();
        for room in rooms {
            if !room.geometry.is_finite() {
                return Err(MergeError::InvalidInput(format!(
                    "room {} has non-finite coordinates",
                    room.identifier
                )));
            }
            if !seen.insert(room.identifier) {
                return Err(MergeError::InvalidInput(format!(
                    "room {} appears twice",
                    room.identifier
                )));
            }
        }

        let footprints: Vec<_> = rooms.iter().map(|r| r.geometry.footprint()).collect();
        for i in 0..rooms.len() {
            for j in i + 1..rooms.len() {
                let (Some(a), Some(b)) = (&footprints[i], &footprints[j]) else {
                    continue;
                };
                let smaller = a.area().min(b.area());
                if smaller <= 0.0 {
                    continue;
                }
                let overlap = a.intersection_area(b) / smaller;
                if overlap > self.config.max_footprint_overlap {
                    return Err(MergeError::Inconsistent(format!(
                        "rooms {} and {} overlap by {:.0}% of the smaller footprint",
                        rooms[i].identifier,
                        rooms[j].identifier,
                        overlap * 100.0
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether segment `(a, b)` lies on the placed wall within tolerance.
    fn is_same_wall(&self, placed: &PlacedWall, a: &Point3, b: &Point3) -> bool {
        let placed_heading = horizontal_heading(&placed.start, &placed.end);
        let heading = horizontal_heading(a, b);
        if line_angle_between(placed_heading, heading) > self.config.stitch_angle_degrees.to_radians()
        {
            return false;
        }

        let (ux, uz) = (
            (placed.end.x - placed.start.x) / placed.length,
            (placed.end.z - placed.start.z) / placed.length,
        );
        let along = |p: &Point3| (p.x - placed.start.x) * ux + (p.z - placed.start.z) * uz;
        let across = |p: &Point3| ((p.x - placed.start.x) * uz - (p.z - placed.start.z) * ux).abs();

        let mid = a.midpoint(b);
        if across(&mid) > self.config.stitch_distance {
            return false;
        }

        let (t1, t2) = (along(a), along(b));
        let overlap = placed.length.min(t1.max(t2)) - 0f64.max(t1.min(t2));
        overlap > self.config.stitch_distance
    }
}

impl StructureBuilder for StitchingStructureBuilder {
    fn build(&self, rooms: &[Room]) -> Result<Structure, MergeError> {
        self.validate(rooms)?;

        let mut structure = Structure::default();
        let mut placed: Vec<PlacedWall> = Vec::new();
        let mut placed_doors: Vec<Point3> = Vec::new();
        let mut placed_openings: Vec<Point3> = Vec::new();

        for (room_index, room) in rooms.iter().enumerate() {
            let mut geometry = room.geometry.clone();
            let walls = std::mem::take(&mut geometry.walls);
            let mut pending_shared: Vec<(usize, Surface)> = Vec::new();

            for wall in walls {
                let Some((a, b)) = wall.horizontal_segment() else {
                    geometry.walls.push(wall);
                    continue;
                };
                let matched = placed
                    .iter()
                    .position(|p| p.room_index != room_index && self.is_same_wall(p, &a, &b));
                match matched {
                    Some(index) => pending_shared.push((index, wall)),
                    None => {
                        placed.push(PlacedWall {
                            room_index,
                            slot: geometry.walls.len(),
                            length: a.horizontal_distance(&b),
                            start: a,
                            end: b,
                        });
                        geometry.walls.push(wall);
                    }
                }
            }

            for (index, wall) in pending_shared {
                let owner = placed[index].room_index;
                let slot = placed[index].slot;
                let kept = &mut structure.rooms[owner].geometry.walls[slot];
                if wall.length() > kept.length() {
                    let old_id = kept.id;
                    *kept = wall.clone();
                    for adjacency in &mut structure.adjacencies {
                        if adjacency.shared_wall == old_id {
                            adjacency.shared_wall = wall.id;
                        }
                    }
                    if let Some((a, b)) = wall.horizontal_segment() {
                        placed[index].length = a.horizontal_distance(&b);
                        placed[index].start = a;
                        placed[index].end = b;
                    }
                }
                structure.adjacencies.push(RoomAdjacency {
                    first: rooms[owner].identifier,
                    second: room.identifier,
                    shared_wall: structure.rooms[owner].geometry.walls[slot].id,
                });
            }

            let near = |seen: &[Point3], c: &Point3| {
                seen.iter()
                    .any(|p| p.horizontal_distance(c) <= self.config.stitch_distance)
            };
            geometry.doors.retain(|door| !near(&placed_doors, &door.centroid()));
            placed_doors.extend(geometry.doors.iter().map(Surface::centroid));
            geometry
                .openings
                .retain(|opening| !near(&placed_openings, &opening.centroid()));
            placed_openings.extend(geometry.openings.iter().map(Surface::centroid));

            structure.rooms.push(StructureRoom {
                identifier: room.identifier,
                geometry,
            });
        }

        tracing::debug!(
            "[merge] Stitched {} rooms: {} walls, {} adjacencies",
            structure.rooms.len(),
            structure.wall_count(),
            structure.adjacencies.len()
        );
        Ok(structure)
    }

    fn description(&self) -> String {
        format!(
            "stitching (distance {}m, angle {}deg)",
            self.config.stitch_distance, self.config.stitch_angle_degrees
        )
    }
}
