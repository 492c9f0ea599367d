//! Default room refinement: filter, validate, snap, round.

use uuid::Uuid;

use super::RoomBuilder;
use crate::capture::{RawCaptureData, RawObject, RawSurface};
use crate::model::{
    horizontal_heading, quarter_turn_offset, Confidence, Point3, Room, RoomGeometry, RoomObject,
    Surface, SurfaceCategory,
};
use crate::settings::ProcessingSettings;

/// Minimum floor area, in square metres, for a floor polygon to count.
const MIN_FLOOR_AREA: f64 = 1e-4;
/// Minimum wall span on the floor plane, in metres.
const MIN_WALL_LENGTH: f64 = 1e-3;

#[derive(Debug, Clone)]
pub struct BeautifyConfig {
    /// Snap and round; filtering and validation always run
    pub enabled: bool,
    pub angle_snap_degrees: f64,
    pub min_confidence: Confidence,
    pub rounding_step: f64,
}

impl Default for BeautifyConfig {
    fn default() -> Self {
        Self::from(&ProcessingSettings::default())
    }
}

impl From<&ProcessingSettings> for BeautifyConfig {
    fn from(settings: &ProcessingSettings) -> Self {
        let min_confidence = settings.min_confidence.parse().unwrap_or_else(|e| {
            tracing::warn!("[scan] {}, keeping all detections", e);
            Confidence::Low
        });
        Self {
            enabled: settings.beautify,
            angle_snap_degrees: settings.angle_snap_degrees,
            min_confidence,
            rounding_step: settings.rounding_step,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BeautifyRoomBuilder {
    config: BeautifyConfig,
}

impl BeautifyRoomBuilder {
    pub fn new(config: BeautifyConfig) -> Self {
        Self { config }
    }

    fn keep_surface(&self, raw: &RawSurface) -> bool {
        if raw.confidence < self.config.min_confidence {
            return false;
        }
        match raw.category {
            SurfaceCategory::Floor => {
                raw.polygon.len() >= 3
                    && crate::model::horizontal_area(&raw.polygon) > MIN_FLOOR_AREA
            }
            _ => longest_horizontal_span(&raw.polygon) > MIN_WALL_LENGTH,
        }
    }

    /// Heading of the longest wall, used as the room's primary axis.
    fn dominant_heading(walls: &[Surface]) -> Option<f64> {
        walls
            .iter()
            .filter_map(|w| w.horizontal_segment())
            .max_by(|(a1, b1), (a2, b2)| {
                a1.horizontal_distance(b1)
                    .total_cmp(&a2.horizontal_distance(b2))
            })
            .map(|(a, b)| horizontal_heading(&a, &b))
    }

    /// Offset needed to bring `heading` onto the dominant grid, if it is
    /// within the snap tolerance.
    fn snap_offset(&self, heading: f64, dominant: f64) -> Option<f64> {
        let offset = quarter_turn_offset(heading, dominant);
        let tolerance = self.config.angle_snap_degrees.to_radians();
        (offset != 0.0 && offset.abs() <= tolerance).then_some(offset)
    }

    fn snap_surface(&self, surface: &mut Surface, dominant: f64) {
        let heading = match surface.category {
            SurfaceCategory::Floor => longest_edge_heading(&surface.polygon),
            _ => surface
                .horizontal_segment()
                .map(|(a, b)| horizontal_heading(&a, &b)),
        };
        let Some(offset) = heading.and_then(|h| self.snap_offset(h, dominant)) else {
            return;
        };
        let pivot = surface.centroid();
        for point in &mut surface.polygon {
            *point = point.rotated_about_y(&pivot, -offset);
        }
    }

    fn round_point(&self, point: &Point3) -> Point3 {
        if self.config.rounding_step > 0.0 {
            point.rounded(self.config.rounding_step)
        } else {
            *point
        }
    }
}

impl RoomBuilder for BeautifyRoomBuilder {
    fn build(&self, raw: &RawCaptureData) -> Result<Room, String> {
        let finite = raw.surfaces.iter().all(|s| s.polygon.iter().all(Point3::is_finite))
            && raw.objects.iter().all(|o| {
                o.center.is_finite() && o.dimensions.is_finite() && o.yaw.is_finite()
            });
        if !finite {
            return Err("capture contains non-finite coordinates".to_string());
        }

        let mut geometry = RoomGeometry::default();
        let mut dropped = 0usize;
        for raw_surface in &raw.surfaces {
            if !self.keep_surface(raw_surface) {
                dropped += 1;
                continue;
            }
            geometry.push_surface(Surface {
                id: Uuid::new_v4(),
                category: raw_surface.category,
                polygon: raw_surface.polygon.clone(),
                confidence: raw_surface.confidence,
            });
        }
        geometry.objects = raw
            .objects
            .iter()
            .filter(|o| o.confidence >= self.config.min_confidence)
            .map(to_room_object)
            .collect();
        if dropped > 0 {
            tracing::debug!("[scan] Dropped {} low-confidence or degenerate surfaces", dropped);
        }

        if geometry.walls.len() < 3 && geometry.floors.is_empty() {
            return Err(format!(
                "insufficient geometry: {} walls and no floor",
                geometry.walls.len()
            ));
        }

        if self.config.enabled {
            if let Some(dominant) = Self::dominant_heading(&geometry.walls) {
                for surface in geometry
                    .walls
                    .iter_mut()
                    .chain(geometry.doors.iter_mut())
                    .chain(geometry.windows.iter_mut())
                    .chain(geometry.openings.iter_mut())
                    .chain(geometry.floors.iter_mut())
                {
                    self.snap_surface(surface, dominant);
                }
                for object in &mut geometry.objects {
                    if let Some(offset) = self.snap_offset(object.yaw, dominant) {
                        object.yaw -= offset;
                    }
                }
            }

            for surface in geometry
                .walls
                .iter_mut()
                .chain(geometry.doors.iter_mut())
                .chain(geometry.windows.iter_mut())
                .chain(geometry.openings.iter_mut())
                .chain(geometry.floors.iter_mut())
            {
                for point in &mut surface.polygon {
                    *point = self.round_point(point);
                }
            }
            for object in &mut geometry.objects {
                object.center = self.round_point(&object.center);
                object.dimensions = self.round_point(&object.dimensions);
            }
        }

        Ok(Room::new(geometry))
    }

    fn description(&self) -> String {
        if self.config.enabled {
            format!(
                "beautify (snap {}deg, min confidence {:?})",
                self.config.angle_snap_degrees, self.config.min_confidence
            )
        } else {
            "passthrough".to_string()
        }
    }
}

fn to_room_object(raw: &RawObject) -> RoomObject {
    RoomObject {
        id: Uuid::new_v4(),
        category: raw.category,
        center: raw.center,
        dimensions: raw.dimensions,
        yaw: raw.yaw,
        confidence: raw.confidence,
    }
}

fn longest_horizontal_span(polygon: &[Point3]) -> f64 {
    let mut best = 0.0f64;
    for (i, a) in polygon.iter().enumerate() {
        for b in &polygon[i + 1..] {
            best = best.max(a.horizontal_distance(b));
        }
    }
    best
}

fn longest_edge_heading(polygon: &[Point3]) -> Option<f64> {
    (0..polygon.len())
        .map(|i| (&polygon[i], &polygon[(i + 1) % polygon.len()]))
        .filter(|(a, b)| a.horizontal_distance(b) > MIN_WALL_LENGTH)
        .max_by(|(a1, b1), (a2, b2)| {
            a1.horizontal_distance(b1)
                .total_cmp(&a2.horizontal_distance(b2))
        })
        .map(|(a, b)| horizontal_heading(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::rectangular_room;
    use crate::model::ObjectCategory;
    use chrono::Utc;

    fn wall(a: (f64, f64), b: (f64, f64), confidence: Confidence) -> RawSurface {
        RawSurface {
            category: SurfaceCategory::Wall,
            polygon: vec![
                Point3::new(a.0, 0.0, a.1),
                Point3::new(b.0, 0.0, b.1),
                Point3::new(b.0, 2.5, b.1),
                Point3::new(a.0, 2.5, a.1),
            ],
            confidence,
        }
    }

    fn raw(surfaces: Vec<RawSurface>, objects: Vec<RawObject>) -> RawCaptureData {
        RawCaptureData {
            captured_at: Utc::now(),
            surfaces,
            objects,
        }
    }

    #[test]
    fn test_rectangular_room_keeps_everything() {
        let room = BeautifyRoomBuilder::default()
            .build(&rectangular_room(0.0, 0.0, 4.0, 3.0))
            .unwrap();
        assert_eq!(room.geometry.walls.len(), 4);
        assert_eq!(room.geometry.doors.len(), 1);
        assert_eq!(room.geometry.floors.len(), 1);
        assert_eq!(room.geometry.objects.len(), 1);
    }

    #[test]
    fn test_fails_with_insufficient_geometry() {
        let data = raw(
            vec![
                wall((0.0, 0.0), (3.0, 0.0), Confidence::High),
                wall((3.0, 0.0), (3.0, 3.0), Confidence::High),
            ],
            vec![],
        );
        let err = BeautifyRoomBuilder::default().build(&data).unwrap_err();
        assert!(err.contains("insufficient geometry"));
    }

    #[test]
    fn test_rejects_non_finite_coordinates() {
        let mut data = rectangular_room(0.0, 0.0, 4.0, 3.0);
        data.surfaces[0].polygon[0].x = f64::NAN;
        assert!(BeautifyRoomBuilder::default().build(&data).is_err());
    }

    #[test]
    fn test_drops_low_confidence_and_degenerate_surfaces() {
        let config = BeautifyConfig {
            min_confidence: Confidence::Medium,
            ..Default::default()
        };
        let mut data = rectangular_room(0.0, 0.0, 4.0, 3.0);
        data.surfaces.push(wall((1.0, 1.0), (1.0, 1.0), Confidence::High));
        data.surfaces.push(wall((0.0, 5.0), (2.0, 5.0), Confidence::Low));
        data.objects[0].confidence = Confidence::Low;

        let room = BeautifyRoomBuilder::new(config).build(&data).unwrap();
        assert_eq!(room.geometry.walls.len(), 4);
        assert!(room.geometry.objects.is_empty());
    }

    #[test]
    fn test_snaps_near_orthogonal_walls_and_objects() {
        // Longest wall runs along +x; the short wall is 3 degrees off +z
        let tilt = 3.0f64.to_radians();
        let data = raw(
            vec![
                wall((0.0, 0.0), (5.0, 0.0), Confidence::High),
                wall((5.0, 0.0), (5.0 + 3.0 * tilt.sin(), 3.0 * tilt.cos()), Confidence::High),
                wall((0.0, 3.0), (0.0, 0.0), Confidence::High),
            ],
            vec![RawObject {
                category: ObjectCategory::Bed,
                center: Point3::new(2.0, 0.3, 1.5),
                dimensions: Point3::new(2.0, 0.6, 1.6),
                yaw: std::f64::consts::FRAC_PI_2 + 2.0f64.to_radians(),
                confidence: Confidence::High,
            }],
        );

        let room = BeautifyRoomBuilder::default().build(&data).unwrap();
        let (a, b) = room.geometry.walls[1].horizontal_segment().unwrap();
        assert!((a.x - b.x).abs() < 1e-3, "wall should be parallel to z");
        let yaw = room.geometry.objects[0].yaw;
        assert!((yaw - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_leaves_walls_outside_snap_tolerance() {
        let angle = 20.0f64.to_radians();
        let data = raw(
            vec![
                wall((0.0, 0.0), (5.0, 0.0), Confidence::High),
                wall((5.0, 0.0), (5.0 + 3.0 * angle.cos(), 3.0 * angle.sin()), Confidence::High),
                wall((0.0, 3.0), (0.0, 0.0), Confidence::High),
            ],
            vec![],
        );
        let room = BeautifyRoomBuilder::default().build(&data).unwrap();
        let (a, b) = room.geometry.walls[1].horizontal_segment().unwrap();
        let heading = horizontal_heading(&a, &b).abs();
        let expected = angle.min(std::f64::consts::PI - angle);
        assert!((heading.min(std::f64::consts::PI - heading) - expected).abs() < 1e-2);
    }

    #[test]
    fn test_rounds_to_millimetres() {
        let mut data = rectangular_room(0.0, 0.0, 4.0, 3.0);
        data.surfaces[0].polygon[0].x = 0.00042;
        let room = BeautifyRoomBuilder::default().build(&data).unwrap();
        for point in room.geometry.surfaces().flat_map(|s| s.polygon.iter()) {
            let scaled = point.x * 1000.0;
            assert!((scaled - scaled.round()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_floor_alone_is_enough() {
        let data = raw(
            vec![RawSurface {
                category: SurfaceCategory::Floor,
                polygon: vec![
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(2.0, 0.0, 0.0),
                    Point3::new(2.0, 0.0, 2.0),
                ],
                confidence: Confidence::High,
            }],
            vec![],
        );
        let room = BeautifyRoomBuilder::default().build(&data).unwrap();
        assert_eq!(room.geometry.floors.len(), 1);
        assert!(room.geometry.walls.is_empty());
    }

    #[test]
    fn test_unknown_min_confidence_falls_back_to_low() {
        let settings = ProcessingSettings {
            min_confidence: "certain".to_string(),
            ..Default::default()
        };
        assert_eq!(BeautifyConfig::from(&settings).min_confidence, Confidence::Low);
    }
}
