use std::collections::{BTreeMap, BTreeSet};

use rand_chacha::ChaCha8Rng;
use slotmap::SlotMap;

use crate::document::{DocumentError, LevelDocument};
use crate::map::LevelMap;
use crate::types::{CombatantId, DoorState, Pos, TreasureId};

#[derive(Clone, Debug)]
pub struct Room {
    pub id: u32,
    pub origin: Pos,
    pub width: u32,
    pub height: u32,
    /// Monster names still waiting to be materialized into the arena.
    pub pending_spawns: Vec<String>,
    pub monsters: Vec<CombatantId>,
    /// Set while the room owes a chest that population has not placed yet.
    pub pending_treasure: bool,
    pub treasure: Option<TreasureId>,
    /// Flavor text straight from the document, untouched by the engine.
    pub features: Option<String>,
}

impl Room {
    pub fn inhabited(&self) -> bool {
        !self.monsters.is_empty() || !self.pending_spawns.is_empty()
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.y >= self.origin.y
            && pos.x >= self.origin.x
            && pos.y < self.origin.y + self.height as i32
            && pos.x < self.origin.x + self.width as i32
    }

    pub fn positions(&self) -> impl Iterator<Item = Pos> + '_ {
        (self.origin.y..self.origin.y + self.height as i32).flat_map(move |y| {
            (self.origin.x..self.origin.x + self.width as i32).map(move |x| Pos { y, x })
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Treasure {
    pub id: TreasureId,
    pub pos: Pos,
    pub gold: u32,
    pub has_item: bool,
}

/// One populated depth: static grid plus everything that changes on it.
#[derive(Clone, Debug)]
pub struct Level {
    pub depth: u8,
    pub name: Option<String>,
    pub map: LevelMap,
    pub doors: BTreeMap<Pos, DoorState>,
    pub rooms: Vec<Room>,
    /// Every live monster on this depth, room-bound and wandering alike.
    pub monsters: Vec<CombatantId>,
    pub treasures: SlotMap<TreasureId, Treasure>,
    pub fountain: Option<Pos>,
    pub fountain_used: bool,
    pub visible: BTreeSet<Pos>,
    pub explored: BTreeSet<Pos>,
    /// Flattened wandering-encounter table: one entry per group.
    pub wandering_groups: Vec<Vec<String>>,
    pub entry: Pos,
}

impl Level {
    pub fn from_document(
        doc: &LevelDocument,
        depth: u8,
        max_depth: u8,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self, DocumentError> {
        let built = doc.build(depth, max_depth, rng)?;
        let rooms = doc
            .rooms
            .iter()
            .map(|spec| Room {
                id: spec.id,
                origin: Pos { y: spec.row, x: spec.col },
                width: spec.width,
                height: spec.height,
                pending_spawns: spec.monsters.clone(),
                monsters: Vec::new(),
                pending_treasure: spec.treasure,
                treasure: None,
                features: spec.features.clone(),
            })
            .collect();
        let wandering_groups = doc
            .wandering
            .iter()
            .map(|group| {
                group
                    .monsters
                    .iter()
                    .flat_map(|mc| std::iter::repeat_n(mc.name.clone(), mc.count as usize))
                    .collect()
            })
            .collect();
        Ok(Self {
            depth,
            name: doc.name.clone(),
            map: built.map,
            doors: built.doors,
            rooms,
            monsters: Vec::new(),
            treasures: SlotMap::with_key(),
            fountain: None,
            fountain_used: false,
            visible: BTreeSet::new(),
            explored: BTreeSet::new(),
            wandering_groups,
            entry: built.entry,
        })
    }

    pub fn room_at(&self, pos: Pos) -> Option<usize> {
        self.rooms.iter().position(|room| room.contains(pos))
    }

    /// Walls plus currently closed doors.
    pub fn obstacles(&self) -> BTreeSet<Pos> {
        self.map.obstacles(&self.doors)
    }

    pub fn open_door(&mut self, pos: Pos) -> bool {
        if !self.map.has_door(pos) {
            return false;
        }
        self.doors.insert(pos, DoorState::Open) != Some(DoorState::Open)
    }

    pub fn close_door(&mut self, pos: Pos) -> bool {
        if !self.map.has_door(pos) {
            return false;
        }
        self.doors.insert(pos, DoorState::Closed) != Some(DoorState::Closed)
    }

    pub fn treasure_at(&self, pos: Pos) -> Option<TreasureId> {
        self.treasures.iter().find(|(_, t)| t.pos == pos).map(|(id, _)| id)
    }

    /// Drops a treasure from the level and its owning room. The single
    /// removal path, so no dangling id survives in a room.
    pub fn remove_treasure(&mut self, id: TreasureId) -> Option<Treasure> {
        let removed = self.treasures.remove(id);
        if removed.is_some() {
            for room in &mut self.rooms {
                if room.treasure == Some(id) {
                    room.treasure = None;
                }
            }
        }
        removed
    }

    /// Forgets a monster id everywhere on this level. Arena removal is the
    /// caller's job; this keeps the level's indexes consistent with it.
    pub fn forget_monster(&mut self, id: CombatantId) {
        self.monsters.retain(|m| *m != id);
        for room in &mut self.rooms {
            room.monsters.retain(|m| *m != id);
        }
    }
}
