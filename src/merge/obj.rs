//! Wavefront OBJ export.
//!
//! Output is a pure function of the structure: no timestamps, rooms and
//! surfaces in stored order. A one-room structure therefore exports to the
//! same bytes as the room itself.

use std::fmt::Write;

use crate::error::{Result, ScanError};
use crate::model::{Point3, RoomObject, Structure, Surface};

/// Serializes a structure into a model file.
pub trait ModelExporter: Send + Sync {
    /// File extension, without the dot.
    fn extension(&self) -> &str;

    fn encode(&self, structure: &Structure) -> Result<Vec<u8>>;
}

/// Box faces as indices into [`RoomObject::corners`].
const BOX_FACES: [[usize; 4]; 6] = [
    [0, 3, 2, 1],
    [4, 5, 6, 7],
    [0, 1, 5, 4],
    [1, 2, 6, 5],
    [2, 3, 7, 6],
    [3, 0, 4, 7],
];

#[derive(Debug, Clone, Default)]
pub struct ObjExporter;

impl ObjExporter {
    pub fn new() -> Self {
        Self
    }

    fn write_structure(out: &mut String, structure: &Structure) -> std::fmt::Result {
        writeln!(out, "# roomforge structure")?;
        writeln!(
            out,
            "# rooms: {}, adjacencies: {}",
            structure.rooms.len(),
            structure.adjacencies.len()
        )?;
        writeln!(out, "# Coordinate system: Y-up (OBJ convention)")?;
        for adjacency in &structure.adjacencies {
            writeln!(
                out,
                "# adjacent {} {} wall {}",
                adjacency.first, adjacency.second, adjacency.shared_wall
            )?;
        }
        writeln!(out)?;

        // OBJ vertex indices are global and 1-based
        let mut next_vertex = 1usize;
        for room in &structure.rooms {
            writeln!(out, "o room_{}", room.identifier)?;
            for surface in room.geometry.surfaces() {
                write_surface(out, surface, &mut next_vertex)?;
            }
            for object in &room.geometry.objects {
                write_object(out, object, &mut next_vertex)?;
            }
        }
        Ok(())
    }
}

fn write_vertex(out: &mut String, p: &Point3) -> std::fmt::Result {
    writeln!(out, "v {:.6} {:.6} {:.6}", p.x, p.y, p.z)
}

fn write_surface(out: &mut String, surface: &Surface, next_vertex: &mut usize) -> std::fmt::Result {
    if surface.polygon.len() < 3 {
        return Ok(());
    }
    writeln!(out, "g {}_{}", surface.category.name(), surface.id)?;
    for p in &surface.polygon {
        write_vertex(out, p)?;
    }
    write!(out, "f")?;
    for i in 0..surface.polygon.len() {
        write!(out, " {}", *next_vertex + i)?;
    }
    writeln!(out)?;
    *next_vertex += surface.polygon.len();
    Ok(())
}

fn write_object(out: &mut String, object: &RoomObject, next_vertex: &mut usize) -> std::fmt::Result {
    writeln!(out, "g {}_{}", object.category.name(), object.id)?;
    for corner in object.corners() {
        write_vertex(out, &corner)?;
    }
    for face in BOX_FACES {
        let base = *next_vertex;
        writeln!(
            out,
            "f {} {} {} {}",
            base + face[0],
            base + face[1],
            base + face[2],
            base + face[3]
        )?;
    }
    *next_vertex += 8;
    Ok(())
}

impl ModelExporter for ObjExporter {
    fn extension(&self) -> &str {
        "obj"
    }

    fn encode(&self, structure: &Structure) -> Result<Vec<u8>> {
        let mut out = String::new();
        Self::write_structure(&mut out, structure)
            .map_err(|e| ScanError::Encoding(format!("failed to format OBJ: {}", e)))?;
        Ok(out.into_bytes())
    }
}
