use serde::{Deserialize, Serialize};

use crate::dice::{Dice, RechargeRule};
use crate::types::{CombatantId, CombatantKind, Pos};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackKind {
    Melee,
    Ranged,
    /// Thrown weapons, usable in melee and at range.
    Mixed,
}

/// One weapon or natural attack from a stat block. Ranges are in feet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackAction {
    pub name: String,
    pub kind: AttackKind,
    pub attack_bonus: i32,
    pub normal_range: u32,
    pub long_range: Option<u32>,
    pub damages: Vec<Dice>,
}

impl AttackAction {
    pub fn covers(&self, distance_ft: u32) -> bool {
        distance_ft <= self.long_range.unwrap_or(self.normal_range)
    }

    pub fn expected_damage(&self) -> f64 {
        self.damages.iter().map(Dice::expected).sum()
    }
}

/// Damage kept on a successful saving throw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveOutcome {
    Half,
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    pub name: String,
    /// 0 is a cantrip and costs no slot.
    pub level: u8,
    pub reach_ft: u32,
    pub damages: Vec<Dice>,
}

impl Spell {
    pub fn is_cantrip(&self) -> bool {
        self.level == 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spellcasting {
    pub attack_bonus: i32,
    pub learned: Vec<Spell>,
    /// `slots[n]` counts remaining slots of spell level `n + 1`.
    pub slots: Vec<u8>,
    pub max_slots: Vec<u8>,
}

impl Spellcasting {
    pub fn can_cast(&self, spell: &Spell) -> bool {
        spell.is_cantrip()
            || self
                .slots
                .get(spell.level as usize - 1)
                .is_some_and(|remaining| *remaining > 0)
    }

    pub fn spend_slot(&mut self, level: u8) -> bool {
        if level == 0 {
            return true;
        }
        match self.slots.get_mut(level as usize - 1) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn restore_all(&mut self) {
        self.slots = self.max_slots.clone();
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecialAbility {
    pub name: String,
    pub ready: bool,
    pub recharge: Option<RechargeRule>,
    /// The ability still fires on the owner's initiative slot after death
    /// (death bursts and the like).
    pub usable_after_death: bool,
    pub reach_ft: u32,
    pub save_dc: i32,
    pub save_outcome: SaveOutcome,
    pub damages: Vec<Dice>,
}

impl SpecialAbility {
    /// Expected damage weighted by the save outcome, for ranking which
    /// ready ability a monster leads with.
    pub fn expected_damage(&self) -> f64 {
        let raw: f64 = self.damages.iter().map(Dice::expected).sum();
        match self.save_outcome {
            SaveOutcome::Half => raw * 0.75,
            SaveOutcome::None => raw * 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abilities {
    pub dex: u32,
}

impl Abilities {
    pub fn dex_modifier(&self) -> i32 {
        (self.dex as i32 - 10).div_euclid(2)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    #[serde(skip)]
    pub id: CombatantId,
    pub name: String,
    pub kind: CombatantKind,
    pub pos: Pos,
    pub hit_points: i32,
    pub max_hit_points: i32,
    pub armor_class: i32,
    /// Movement speed in feet per round.
    pub speed_ft: u32,
    /// XP awarded to the hero for the kill; zero for the hero itself.
    pub xp_reward: u32,
    pub abilities: Abilities,
    pub actions: Vec<AttackAction>,
    pub spellcasting: Option<Spellcasting>,
    pub special_abilities: Vec<SpecialAbility>,
    /// Consecutive combat turns taken without leaving the hero's view.
    pub attack_round: u32,
}

impl Combatant {
    pub fn is_dead(&self) -> bool {
        self.hit_points <= 0
    }

    /// Negative amounts are ignored; hit points floor at zero.
    pub fn take_damage(&mut self, amount: i32) {
        self.hit_points = (self.hit_points - amount.max(0)).max(0);
    }

    /// Healing never revives the dead and never exceeds the maximum.
    pub fn heal(&mut self, amount: i32) {
        if self.is_dead() {
            return;
        }
        self.hit_points = (self.hit_points + amount.max(0)).min(self.max_hit_points);
    }

    /// Passive defence a spell attack must beat.
    pub fn passive_dc(&self) -> i32 {
        10 + self.abilities.dex_modifier()
    }

    pub fn has_after_death_ability(&self) -> bool {
        self.special_abilities
            .iter()
            .any(|a| a.usable_after_death && a.ready)
    }
}

/// Hero-only progression and economy state, kept apart from the arena
/// entry so monster code never sees it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeroProfile {
    pub level: u8,
    pub xp: u32,
    pub gold: u32,
    pub kills: Vec<String>,
    pub inventory: Vec<ItemKind>,
    pub armor_proficiencies: Vec<String>,
    pub weapon_proficiencies: Vec<String>,
}

impl Default for HeroProfile {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            gold: 0,
            kills: Vec::new(),
            inventory: Vec::new(),
            armor_proficiencies: Vec::new(),
            weapon_proficiencies: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ItemKind {
    Potion { name: String, heal: Dice, min_level: u8 },
    Armor(String),
    Weapon(String),
}
