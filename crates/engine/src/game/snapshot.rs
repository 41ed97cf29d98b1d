//! Versioned save files. The snapshot structs enumerate exactly what is
//! persisted; nothing else in the session survives a round trip, and a
//! version bump is the only way to change the set.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::SeedableRng;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

use crate::combatant::{Combatant, HeroProfile};
use crate::content::ContentPack;
use crate::document::LevelDocument;
use crate::level::{Level, Room, Treasure};
use crate::map::LevelMap;
use crate::types::{CombatantId, DoorState, Pos, TileKind, TreasureId};

use super::Game;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot format version {0}, expected {FORMAT_VERSION}")]
    UnsupportedVersion(u32),
    #[error("snapshot references room monster index {0} out of range")]
    BadRoomIndex(usize),
    #[error("snapshot depth {0} is out of range")]
    BadDepth(u8),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub seed: u64,
    pub depth: u8,
    pub round_no: u32,
    pub last_combat_round: u32,
    pub hero: Combatant,
    pub profile: HeroProfile,
    pub levels: Vec<LevelSnapshot>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub depth: u8,
    pub name: Option<String>,
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<TileKind>,
    pub stairs_up: Option<Pos>,
    pub stairs_down: Option<Pos>,
    pub doors: Vec<(Pos, DoorState)>,
    pub rooms: Vec<RoomSnapshot>,
    /// Order matters: rooms reference their members by index in here.
    pub monsters: Vec<Combatant>,
    pub treasures: Vec<TreasureSnapshot>,
    pub fountain: Option<Pos>,
    pub fountain_used: bool,
    pub visible: Vec<Pos>,
    pub explored: Vec<Pos>,
    pub wandering_groups: Vec<Vec<String>>,
    pub entry: Pos,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: u32,
    pub origin: Pos,
    pub width: u32,
    pub height: u32,
    pub pending_spawns: Vec<String>,
    /// Indexes into the level's monster list.
    pub monsters: Vec<usize>,
    pub pending_treasure: bool,
    /// Index into the level's treasure list.
    pub treasure: Option<usize>,
    pub features: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreasureSnapshot {
    pub pos: Pos,
    pub gold: u32,
    pub has_item: bool,
}

impl Snapshot {
    pub fn capture(game: &Game) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            seed: game.seed,
            depth: game.depth,
            round_no: game.round_no,
            last_combat_round: game.last_combat_round,
            hero: game.combatants[game.hero_id].clone(),
            profile: game.profile.clone(),
            levels: game.levels.iter().map(|level| capture_level(game, level)).collect(),
        }
    }

    /// Rebuilds a live session. Arena keys are reassigned, so snapshots
    /// taken before and after a round trip compare equal even though the
    /// ids do not.
    pub fn restore(
        self,
        documents: Vec<LevelDocument>,
        content: ContentPack,
    ) -> Result<Game, SnapshotError> {
        if self.format_version != FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.format_version));
        }
        if self.depth == 0 || self.depth as usize > self.levels.len() {
            return Err(SnapshotError::BadDepth(self.depth));
        }
        let mut combatants = SlotMap::with_key();
        let hero_id = combatants.insert(self.hero);
        combatants[hero_id].id = hero_id;

        let mut levels = Vec::with_capacity(self.levels.len());
        for level in self.levels {
            levels.push(restore_level(level, &mut combatants)?);
        }

        Ok(Game {
            rng: reseed(self.seed, self.round_no),
            seed: self.seed,
            content,
            documents,
            combatants,
            hero_id,
            profile: self.profile,
            levels,
            depth: self.depth,
            round_no: self.round_no,
            last_combat_round: self.last_combat_round,
            log: Vec::new(),
        })
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), SnapshotError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, SnapshotError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

/// Restored sessions resume on a stream derived from the seed and the
/// round counter rather than replaying the original stream position.
fn reseed(seed: u64, round_no: u32) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed ^ u64::from(round_no).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn capture_level(game: &Game, level: &Level) -> LevelSnapshot {
    let monsters: Vec<Combatant> = level
        .monsters
        .iter()
        .filter_map(|id| game.combatants.get(*id))
        .cloned()
        .collect();
    let treasure_ids: Vec<_> = level.treasures.keys().collect();
    LevelSnapshot {
        depth: level.depth,
        name: level.name.clone(),
        width: level.map.width(),
        height: level.map.height(),
        tiles: level.map.tiles().to_vec(),
        stairs_up: level.map.stairs_up(),
        stairs_down: level.map.stairs_down(),
        doors: level.doors.iter().map(|(p, s)| (*p, *s)).collect(),
        rooms: level
            .rooms
            .iter()
            .map(|room| RoomSnapshot {
                id: room.id,
                origin: room.origin,
                width: room.width,
                height: room.height,
                pending_spawns: room.pending_spawns.clone(),
                monsters: room
                    .monsters
                    .iter()
                    .filter_map(|id| level.monsters.iter().position(|m| m == id))
                    .collect(),
                pending_treasure: room.pending_treasure,
                treasure: room
                    .treasure
                    .and_then(|id| treasure_ids.iter().position(|t| *t == id)),
                features: room.features.clone(),
            })
            .collect(),
        monsters,
        treasures: level
            .treasures
            .values()
            .map(|t| TreasureSnapshot { pos: t.pos, gold: t.gold, has_item: t.has_item })
            .collect(),
        fountain: level.fountain,
        fountain_used: level.fountain_used,
        visible: level.visible.iter().copied().collect(),
        explored: level.explored.iter().copied().collect(),
        wandering_groups: level.wandering_groups.clone(),
        entry: level.entry,
    }
}

fn restore_level(
    snap: LevelSnapshot,
    combatants: &mut SlotMap<CombatantId, Combatant>,
) -> Result<Level, SnapshotError> {
    let monster_count = snap.monsters.len();
    let mut monster_ids = Vec::with_capacity(monster_count);
    for monster in snap.monsters {
        let id = combatants.insert(monster);
        combatants[id].id = id;
        monster_ids.push(id);
    }

    let mut treasures: SlotMap<TreasureId, Treasure> = SlotMap::with_key();
    let mut treasure_ids = Vec::with_capacity(snap.treasures.len());
    for t in snap.treasures {
        let id = treasures.insert_with_key(|id| Treasure {
            id,
            pos: t.pos,
            gold: t.gold,
            has_item: t.has_item,
        });
        treasure_ids.push(id);
    }

    let mut rooms = Vec::with_capacity(snap.rooms.len());
    for room in snap.rooms {
        let mut members = Vec::with_capacity(room.monsters.len());
        for idx in room.monsters {
            let id = monster_ids
                .get(idx)
                .copied()
                .ok_or(SnapshotError::BadRoomIndex(idx))?;
            members.push(id);
        }
        let treasure = match room.treasure {
            Some(idx) => Some(
                treasure_ids
                    .get(idx)
                    .copied()
                    .ok_or(SnapshotError::BadRoomIndex(idx))?,
            ),
            None => None,
        };
        rooms.push(Room {
            id: room.id,
            origin: room.origin,
            width: room.width,
            height: room.height,
            pending_spawns: room.pending_spawns,
            monsters: members,
            pending_treasure: room.pending_treasure,
            treasure,
            features: room.features,
        });
    }

    Ok(Level {
        depth: snap.depth,
        name: snap.name,
        map: LevelMap::new(snap.width, snap.height, snap.tiles, snap.stairs_up, snap.stairs_down),
        doors: snap.doors.into_iter().collect::<BTreeMap<_, _>>(),
        rooms,
        monsters: monster_ids,
        treasures,
        fountain: snap.fountain,
        fountain_used: snap.fountain_used,
        visible: snap.visible.into_iter().collect(),
        explored: snap.explored.into_iter().collect(),
        wandering_groups: snap.wandering_groups,
        entry: snap.entry,
    })
}

impl Game {
    /// Deterministic digest of the canonical snapshot encoding, for quick
    /// divergence checks between two sessions.
    pub fn state_hash(&self) -> Result<u64, SnapshotError> {
        let bytes = serde_json::to_vec(&Snapshot::capture(self))?;
        Ok(xxh3_64(&bytes))
    }
}
