use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use thiserror::Error;

new_key_type! {
    pub struct CombatantId;
    pub struct TreasureId;
}

/// Feet per grid tile; reach and range figures on stat blocks are in feet.
pub const FEET_PER_TILE: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub y: i32,
    pub x: i32,
}

impl Pos {
    pub const fn new(y: i32, x: i32) -> Self {
        Self { y, x }
    }

    pub fn manhattan(self, other: Pos) -> u32 {
        self.y.abs_diff(other.y) + self.x.abs_diff(other.x)
    }

    pub fn dist_squared(self, other: Pos) -> i64 {
        let dy = i64::from(self.y - other.y);
        let dx = i64::from(self.x - other.x);
        dy * dy + dx * dx
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Wall,
    Floor,
    ClosedDoor,
    OpenDoor,
    StairsUp,
    StairsDown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DoorState {
    Closed,
    Open,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatantKind {
    Hero,
    Monster,
}

/// One intent per round, submitted by the caller for the hero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Move(Pos),
    MeleeAttack(CombatantId),
    RangedAttack(CombatantId),
    CastSpell { spell: usize, target: CombatantId },
    UseSpecialAbility { ability: usize, target: CombatantId },
    OpenDoor(Pos),
    CloseDoor(Pos),
    DrinkPotion,
    Flee,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("no path exists to the requested position")]
    PathNotFound,
    #[error("target is out of range, obstructed, or dead")]
    InvalidTarget,
    #[error("no spell slot, charge, or item is available")]
    OutOfResource,
    #[error("action is not valid for the actor's current state")]
    InvalidAction,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LogEvent {
    HeroMoved { to: Pos },
    DoorOpened { pos: Pos },
    DoorClosed { pos: Pos },
    AttackHit { attacker: CombatantId, target: CombatantId, label: String, damage: i32 },
    AttackMissed { attacker: CombatantId, target: CombatantId, label: String },
    MonsterAdvanced { monster: CombatantId, to: Pos },
    MonsterBlocked { monster: CombatantId },
    MonsterKilled { name: String, xp: u32 },
    HeroDied,
    HeroFled,
    PotionDrunk { name: String, healed: i32 },
    TreasureOpened { gold: u32, item: Option<String> },
    FountainBlessing { slots_restored: bool },
    LevelGained { level: u8 },
    WanderingSpawn { names: Vec<String> },
    DepthChanged { depth: u8 },
}

/// What one actor did with its initiative slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReport {
    pub actor: CombatantId,
    pub target: Option<CombatantId>,
    pub damage_dealt: i32,
    pub target_killed: bool,
    pub blocked: bool,
}

impl TurnReport {
    pub(crate) fn idle(actor: CombatantId) -> Self {
        Self { actor, target: None, damage_dealt: 0, target_killed: false, blocked: false }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    pub reports: Vec<TurnReport>,
    pub hero_error: Option<TurnError>,
    pub combat: bool,
    pub hero_dead: bool,
    pub fled: bool,
}
