use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{DoorState, Pos, TileKind};

/// Immutable tile grid for one depth. Door tiles record where a door
/// exists; the *current* leaf position is tracked separately in
/// [`crate::level::Level::doors`] so the grid never mutates after build.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelMap {
    width: usize,
    height: usize,
    tiles: Vec<TileKind>,
    stairs_up: Option<Pos>,
    stairs_down: Option<Pos>,
}

impl LevelMap {
    pub(crate) fn new(
        width: usize,
        height: usize,
        tiles: Vec<TileKind>,
        stairs_up: Option<Pos>,
        stairs_down: Option<Pos>,
    ) -> Self {
        debug_assert_eq!(tiles.len(), width * height);
        Self { width, height, tiles, stairs_up, stairs_down }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stairs_up(&self) -> Option<Pos> {
        self.stairs_up
    }

    pub fn stairs_down(&self) -> Option<Pos> {
        self.stairs_down
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.y >= 0 && pos.x >= 0 && (pos.y as usize) < self.height && (pos.x as usize) < self.width
    }

    /// Out-of-bounds reads as `Wall`.
    pub fn tile_at(&self, pos: Pos) -> TileKind {
        if !self.in_bounds(pos) {
            return TileKind::Wall;
        }
        self.tiles[pos.y as usize * self.width + pos.x as usize]
    }

    pub(crate) fn tiles(&self) -> &[TileKind] {
        &self.tiles
    }

    /// A tile can be entered when it is open ground or a door whose
    /// current state in `doors` is open.
    pub fn is_walkable(&self, pos: Pos, doors: &BTreeMap<Pos, DoorState>) -> bool {
        match self.tile_at(pos) {
            TileKind::Floor | TileKind::StairsUp | TileKind::StairsDown => true,
            TileKind::ClosedDoor | TileKind::OpenDoor => {
                door_state(self, doors, pos) == Some(DoorState::Open)
            }
            TileKind::Wall => false,
        }
    }

    /// Walls and closed doors both block sight and movement.
    pub fn is_opaque(&self, pos: Pos, doors: &BTreeMap<Pos, DoorState>) -> bool {
        match self.tile_at(pos) {
            TileKind::Wall => true,
            TileKind::ClosedDoor | TileKind::OpenDoor => {
                door_state(self, doors, pos) == Some(DoorState::Closed)
            }
            _ => false,
        }
    }

    pub fn obstacles(&self, doors: &BTreeMap<Pos, DoorState>) -> BTreeSet<Pos> {
        let mut out = BTreeSet::new();
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let p = Pos { y, x };
                if self.is_opaque(p, doors) {
                    out.insert(p);
                }
            }
        }
        out
    }

    pub fn walkable_positions(&self, doors: &BTreeMap<Pos, DoorState>) -> Vec<Pos> {
        let mut out = Vec::new();
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let p = Pos { y, x };
                if self.is_walkable(p, doors) {
                    out.push(p);
                }
            }
        }
        out
    }

    pub fn has_door(&self, pos: Pos) -> bool {
        matches!(self.tile_at(pos), TileKind::ClosedDoor | TileKind::OpenDoor)
    }
}

fn door_state(map: &LevelMap, doors: &BTreeMap<Pos, DoorState>, pos: Pos) -> Option<DoorState> {
    if !map.has_door(pos) {
        return None;
    }
    Some(doors.get(&pos).copied().unwrap_or(match map.tile_at(pos) {
        TileKind::OpenDoor => DoorState::Open,
        _ => DoorState::Closed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_from_rows(rows: &[&str]) -> LevelMap {
        let height = rows.len();
        let width = rows[0].len();
        let mut tiles = Vec::with_capacity(width * height);
        for row in rows {
            for ch in row.chars() {
                tiles.push(match ch {
                    '#' => TileKind::Wall,
                    '.' => TileKind::Floor,
                    '+' => TileKind::ClosedDoor,
                    '\'' => TileKind::OpenDoor,
                    '<' => TileKind::StairsUp,
                    '>' => TileKind::StairsDown,
                    other => panic!("bad tile {other:?}"),
                });
            }
        }
        LevelMap::new(width, height, tiles, None, None)
    }

    #[test]
    fn out_of_bounds_reads_as_wall() {
        let map = map_from_rows(&["#.#", "..."]);
        assert_eq!(map.tile_at(Pos::new(-1, 0)), TileKind::Wall);
        assert_eq!(map.tile_at(Pos::new(0, 99)), TileKind::Wall);
        assert_eq!(map.tile_at(Pos::new(1, 1)), TileKind::Floor);
    }

    #[test]
    fn closed_door_blocks_until_opened() {
        let map = map_from_rows(&["#+#", "..."]);
        let mut doors = BTreeMap::new();
        let door = Pos::new(0, 1);
        assert!(!map.is_walkable(door, &doors));
        assert!(map.is_opaque(door, &doors));
        doors.insert(door, DoorState::Open);
        assert!(map.is_walkable(door, &doors));
        assert!(!map.is_opaque(door, &doors));
    }

    #[test]
    fn open_door_tile_defaults_open_and_can_be_shut() {
        let map = map_from_rows(&["#'#", "..."]);
        let mut doors = BTreeMap::new();
        let door = Pos::new(0, 1);
        assert!(map.is_walkable(door, &doors));
        doors.insert(door, DoorState::Closed);
        assert!(!map.is_walkable(door, &doors));
    }

    #[test]
    fn obstacles_cover_walls_and_closed_doors_only() {
        let map = map_from_rows(&["#+.", ".>."]);
        let obstacles = map.obstacles(&BTreeMap::new());
        assert!(obstacles.contains(&Pos::new(0, 0)));
        assert!(obstacles.contains(&Pos::new(0, 1)));
        assert!(!obstacles.contains(&Pos::new(1, 1)));
        assert_eq!(obstacles.len(), 2);
    }

    #[test]
    fn stairs_are_walkable() {
        let map = map_from_rows(&["<>."]);
        let doors = BTreeMap::new();
        assert!(map.is_walkable(Pos::new(0, 0), &doors));
        assert!(map.is_walkable(Pos::new(0, 1), &doors));
    }
}
