pub mod combatant;
pub mod content;
pub mod dice;
pub mod document;
pub mod game;
pub mod level;
pub mod map;
pub mod types;

pub use combatant::{Combatant, HeroProfile, ItemKind};
pub use content::ContentPack;
pub use dice::Dice;
pub use document::LevelDocument;
pub use game::snapshot::{Snapshot, SnapshotError};
pub use game::Game;
pub use level::{Level, Room, Treasure};
pub use map::LevelMap;
pub use types::*;
