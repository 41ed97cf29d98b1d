use std::collections::BTreeMap;

use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::map::LevelMap;
use crate::types::{DoorState, Pos, TileKind};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("level document parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("level document has an empty cell grid")]
    EmptyGrid,
    #[error("door at ({0}, {1}) is outside the cell grid")]
    DoorOutOfBounds(i32, i32),
    #[error("room {0} extends outside the cell grid")]
    RoomOutOfBounds(u32),
    #[error("staircase at ({0}, {1}) is not an open floor cell")]
    StairsOffFloor(i32, i32),
    #[error("level document has no walkable cell")]
    NoWalkableTiles,
    #[error("no level document for depth {0}")]
    MissingDepth(u8),
}

/// Authoring-side description of one depth, deserialized from JSON.
/// `cells` is row-major; any non-zero cell is open ground.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelDocument {
    #[serde(default)]
    pub name: Option<String>,
    pub cells: Vec<Vec<u8>>,
    #[serde(default)]
    pub doors: Vec<DoorSpec>,
    #[serde(default)]
    pub rooms: Vec<RoomSpec>,
    #[serde(default)]
    pub stairs_up: Option<CellRef>,
    #[serde(default)]
    pub stairs_down: Option<CellRef>,
    #[serde(default)]
    pub wandering: Vec<WanderingGroup>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CellRef {
    pub row: i32,
    pub col: i32,
}

impl CellRef {
    pub fn pos(self) -> Pos {
        Pos { y: self.row, x: self.col }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DoorSpec {
    pub row: i32,
    pub col: i32,
    #[serde(default)]
    pub open: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomSpec {
    pub id: u32,
    pub row: i32,
    pub col: i32,
    pub width: u32,
    pub height: u32,
    /// Monster names resolved against the content tables at population time.
    #[serde(default)]
    pub monsters: Vec<String>,
    #[serde(default)]
    pub treasure: bool,
    /// Free-form flavor text carried through to the room.
    #[serde(default)]
    pub features: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WanderingGroup {
    #[serde(default)]
    pub label: Option<String>,
    pub monsters: Vec<MonsterCount>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonsterCount {
    pub name: String,
    pub count: u32,
}

/// Grid plus the dynamic door table and the hero entry cell.
pub struct BuiltLevel {
    pub map: LevelMap,
    pub doors: BTreeMap<Pos, DoorState>,
    pub entry: Pos,
}

impl LevelDocument {
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the tile grid for `depth`. The up staircase is only carved
    /// above depth 1 and the down staircase only above the deepest level,
    /// but both anchor positions are always computed: the hero enters at
    /// the up-stair cell regardless of depth.
    pub fn build(
        &self,
        depth: u8,
        max_depth: u8,
        rng: &mut ChaCha8Rng,
    ) -> Result<BuiltLevel, DocumentError> {
        if self.cells.is_empty() || self.cells.iter().all(Vec::is_empty) {
            return Err(DocumentError::EmptyGrid);
        }
        let height = self.cells.len();
        let width = self.cells.iter().map(Vec::len).max().unwrap_or(0);

        // Short rows pad out with wall.
        let mut tiles = vec![TileKind::Wall; width * height];
        for (y, row) in self.cells.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                if *cell != 0 {
                    tiles[y * width + x] = TileKind::Floor;
                }
            }
        }

        let in_bounds =
            |p: Pos| p.y >= 0 && p.x >= 0 && (p.y as usize) < height && (p.x as usize) < width;

        let mut doors = BTreeMap::new();
        for door in &self.doors {
            let p = Pos { y: door.row, x: door.col };
            if !in_bounds(p) {
                return Err(DocumentError::DoorOutOfBounds(door.row, door.col));
            }
            tiles[p.y as usize * width + p.x as usize] =
                if door.open { TileKind::OpenDoor } else { TileKind::ClosedDoor };
            doors.insert(p, if door.open { DoorState::Open } else { DoorState::Closed });
        }

        for room in &self.rooms {
            let last = Pos {
                y: room.row + room.height as i32 - 1,
                x: room.col + room.width as i32 - 1,
            };
            if room.width == 0
                || room.height == 0
                || !in_bounds(Pos { y: room.row, x: room.col })
                || !in_bounds(last)
            {
                return Err(DocumentError::RoomOutOfBounds(room.id));
            }
        }

        let open: Vec<Pos> = (0..height as i32)
            .flat_map(|y| (0..width as i32).map(move |x| Pos { y, x }))
            .filter(|p| tiles[p.y as usize * width + p.x as usize] == TileKind::Floor)
            .collect();
        if open.is_empty() {
            return Err(DocumentError::NoWalkableTiles);
        }

        // Explicit stairs must land on open floor; a wall or door cell
        // would strand the hero on arrival.
        let stair_cell = |cell: CellRef| {
            let p = cell.pos();
            if !in_bounds(p) || tiles[p.y as usize * width + p.x as usize] != TileKind::Floor {
                return Err(DocumentError::StairsOffFloor(cell.row, cell.col));
            }
            Ok(p)
        };

        let up = match self.stairs_up {
            Some(cell) => stair_cell(cell)?,
            None => open[(rng.next_u32() as usize) % open.len()],
        };
        let down = match self.stairs_down {
            Some(cell) => stair_cell(cell)?,
            // Synthesized down stair lands as far from the up stair as the
            // grid allows, first in row-major order on ties.
            None => *open
                .iter()
                .filter(|p| **p != up)
                .max_by_key(|p| (p.manhattan(up), std::cmp::Reverse(**p)))
                .unwrap_or(&up),
        };

        if depth > 1 && in_bounds(up) {
            tiles[up.y as usize * width + up.x as usize] = TileKind::StairsUp;
        }
        if depth < max_depth && in_bounds(down) {
            tiles[down.y as usize * width + down.x as usize] = TileKind::StairsDown;
        }

        let map = LevelMap::new(
            width,
            height,
            tiles,
            if depth > 1 { Some(up) } else { None },
            if depth < max_depth { Some(down) } else { None },
        );
        Ok(BuiltLevel { map, doors, entry: up })
    }
}

#[cfg(test)]
mod tests {
    use rand_chacha::rand_core::SeedableRng;

    use super::*;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(0xD0C)
    }

    fn two_room_doc() -> LevelDocument {
        LevelDocument::from_json(
            r#"{
                "name": "test floor",
                "cells": [
                    [0, 0, 0, 0, 0],
                    [0, 1, 1, 1, 0],
                    [0, 1, 0, 1, 0],
                    [0, 1, 1, 1, 0],
                    [0, 0, 0, 0, 0]
                ],
                "doors": [{"row": 2, "col": 2}],
                "rooms": [
                    {"id": 1, "row": 1, "col": 1, "width": 3, "height": 3,
                     "monsters": ["goblin", "goblin"], "treasure": true}
                ],
                "stairs_up": {"row": 1, "col": 1},
                "stairs_down": {"row": 3, "col": 3},
                "wandering": [
                    {"label": "patrol", "monsters": [{"name": "goblin", "count": 2}]}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn build_marks_doors_and_stairs() {
        let doc = two_room_doc();
        let built = doc.build(2, 3, &mut rng()).unwrap();
        assert_eq!(built.map.tile_at(Pos::new(2, 2)), TileKind::ClosedDoor);
        assert_eq!(built.map.tile_at(Pos::new(1, 1)), TileKind::StairsUp);
        assert_eq!(built.map.tile_at(Pos::new(3, 3)), TileKind::StairsDown);
        assert_eq!(built.doors.get(&Pos::new(2, 2)), Some(&DoorState::Closed));
        assert_eq!(built.entry, Pos::new(1, 1));
    }

    #[test]
    fn first_depth_has_no_up_stair_but_enters_there() {
        let doc = two_room_doc();
        let built = doc.build(1, 3, &mut rng()).unwrap();
        assert_eq!(built.map.tile_at(Pos::new(1, 1)), TileKind::Floor);
        assert_eq!(built.map.stairs_up(), None);
        assert_eq!(built.entry, Pos::new(1, 1));
    }

    #[test]
    fn deepest_depth_has_no_down_stair() {
        let doc = two_room_doc();
        let built = doc.build(3, 3, &mut rng()).unwrap();
        assert_eq!(built.map.tile_at(Pos::new(3, 3)), TileKind::Floor);
        assert_eq!(built.map.stairs_down(), None);
    }

    #[test]
    fn synthesized_stairs_are_distinct_and_deterministic() {
        let mut doc = two_room_doc();
        doc.stairs_up = None;
        doc.stairs_down = None;
        let a = doc.build(2, 3, &mut rng()).unwrap();
        let b = doc.build(2, 3, &mut rng()).unwrap();
        assert_eq!(a.map.stairs_up(), b.map.stairs_up());
        assert_eq!(a.map.stairs_down(), b.map.stairs_down());
        assert_ne!(a.map.stairs_up(), a.map.stairs_down());
    }

    #[test]
    fn empty_grid_is_rejected() {
        let doc = LevelDocument::from_json(r#"{"cells": []}"#).unwrap();
        assert!(matches!(doc.build(1, 1, &mut rng()), Err(DocumentError::EmptyGrid)));
    }

    #[test]
    fn out_of_bounds_room_is_rejected() {
        let mut doc = two_room_doc();
        doc.rooms[0].width = 40;
        assert!(matches!(
            doc.build(1, 3, &mut rng()),
            Err(DocumentError::RoomOutOfBounds(1))
        ));
    }

    #[test]
    fn stairs_outside_the_grid_are_rejected() {
        let mut doc = two_room_doc();
        doc.stairs_up = Some(CellRef { row: 9, col: 9 });
        assert!(matches!(
            doc.build(2, 3, &mut rng()),
            Err(DocumentError::StairsOffFloor(9, 9))
        ));
    }

    #[test]
    fn stairs_on_a_wall_cell_are_rejected() {
        let mut doc = two_room_doc();
        doc.stairs_down = Some(CellRef { row: 0, col: 0 });
        assert!(matches!(
            doc.build(2, 3, &mut rng()),
            Err(DocumentError::StairsOffFloor(0, 0))
        ));
    }

    #[test]
    fn short_rows_pad_with_wall() {
        let doc = LevelDocument::from_json(r#"{"cells": [[1, 1, 1], [1]]}"#).unwrap();
        let built = doc.build(1, 1, &mut rng()).unwrap();
        assert_eq!(built.map.width(), 3);
        assert_eq!(built.map.tile_at(Pos::new(1, 2)), TileKind::Wall);
    }
}
