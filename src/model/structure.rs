use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::room::{Room, RoomGeometry};

/// Two rooms joined by a wall they share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomAdjacency {
    pub first: Uuid,
    pub second: Uuid,
    /// Id of the wall kept in the structure for this shared boundary
    pub shared_wall: Uuid,
}

/// A single room's contribution to a structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureRoom {
    pub identifier: Uuid,
    pub geometry: RoomGeometry,
}

/// The combined multi-room model for a project.
///
/// Each room keeps its own geometry minus anything stitched into a room
/// earlier in the list, so shared walls appear exactly once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub rooms: Vec<StructureRoom>,
    pub adjacencies: Vec<RoomAdjacency>,
}

impl Structure {
    /// A structure holding exactly one room, unchanged.
    pub fn single(room: &Room) -> Self {
        Self {
            rooms: vec![StructureRoom {
                identifier: room.identifier,
                geometry: room.geometry.clone(),
            }],
            adjacencies: Vec::new(),
        }
    }

    pub fn wall_count(&self) -> usize {
        self.rooms.iter().map(|r| r.geometry.walls.len()).sum()
    }
}
