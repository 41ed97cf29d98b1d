use std::collections::BTreeMap;

use crate::combatant::{
    Abilities, AttackAction, AttackKind, Combatant, HeroProfile, SaveOutcome, SpecialAbility,
    Spell, Spellcasting,
};
use crate::dice::{Dice, RechargeRule};
use crate::types::{CombatantId, CombatantKind, Pos};

/// XP required to reach level `index + 1`.
pub const XP_THRESHOLDS: [u32; 10] =
    [0, 300, 900, 2_700, 6_500, 14_000, 23_000, 34_000, 48_000, 64_000];

pub const ARMOR_TABLE: [&str; 4] = ["leather", "hide", "chain-mail", "half-plate"];
pub const WEAPON_TABLE: [&str; 4] = ["dagger", "mace", "longsword", "halberd"];

#[derive(Clone, Debug, PartialEq)]
pub struct PotionDef {
    pub name: &'static str,
    pub heal: Dice,
    pub min_level: u8,
}

pub const POTION_TABLE: [PotionDef; 3] = [
    PotionDef { name: "potion of healing", heal: Dice::new(2, 4, 2), min_level: 1 },
    PotionDef { name: "potion of greater healing", heal: Dice::new(4, 4, 4), min_level: 4 },
    PotionDef { name: "potion of superior healing", heal: Dice::new(8, 4, 8), min_level: 8 },
];

/// Largest level whose threshold `xp` meets, at least 1.
pub fn level_for_xp(xp: u32) -> u8 {
    XP_THRESHOLDS
        .iter()
        .rposition(|threshold| xp >= *threshold)
        .map_or(1, |i| i as u8 + 1)
}

/// Daily spell slots for a single-class caster of `level`, by slot level.
pub fn caster_slots(level: u8) -> Vec<u8> {
    match level {
        0 => vec![],
        1 => vec![2],
        2 => vec![3],
        3 => vec![4, 2],
        4 => vec![4, 3],
        5..=6 => vec![4, 3, 2],
        7..=8 => vec![4, 3, 3, 1],
        _ => vec![4, 3, 3, 3, 1],
    }
}

/// Bestiary and item tables. Built once per session; monsters come out
/// as prototypes cloned into the arena at spawn time.
#[derive(Clone, Debug)]
pub struct ContentPack {
    monsters: BTreeMap<String, Combatant>,
}

impl ContentPack {
    pub fn baseline() -> Self {
        let mut monsters = BTreeMap::new();
        for proto in baseline_bestiary() {
            monsters.insert(proto.name.clone(), proto);
        }
        Self { monsters }
    }

    pub fn monster(&self, name: &str) -> Option<Combatant> {
        self.monsters.get(name).cloned()
    }

    pub fn monster_names(&self) -> impl Iterator<Item = &str> {
        self.monsters.keys().map(String::as_str)
    }
}

fn melee(name: &str, attack_bonus: i32, damages: Vec<Dice>) -> AttackAction {
    AttackAction {
        name: name.to_owned(),
        kind: AttackKind::Melee,
        attack_bonus,
        normal_range: 5,
        long_range: None,
        damages,
    }
}

fn ranged(name: &str, attack_bonus: i32, normal: u32, long: u32, damages: Vec<Dice>) -> AttackAction {
    AttackAction {
        name: name.to_owned(),
        kind: AttackKind::Ranged,
        attack_bonus,
        normal_range: normal,
        long_range: Some(long),
        damages,
    }
}

fn thrown(name: &str, attack_bonus: i32, normal: u32, long: u32, damages: Vec<Dice>) -> AttackAction {
    AttackAction {
        name: name.to_owned(),
        kind: AttackKind::Mixed,
        attack_bonus,
        normal_range: normal,
        long_range: Some(long),
        damages,
    }
}

fn monster(
    name: &str,
    armor_class: i32,
    hit_points: i32,
    dex: u32,
    speed_ft: u32,
    xp_reward: u32,
    actions: Vec<AttackAction>,
) -> Combatant {
    Combatant {
        id: CombatantId::default(),
        name: name.to_owned(),
        kind: CombatantKind::Monster,
        pos: Pos::new(0, 0),
        hit_points,
        max_hit_points: hit_points,
        armor_class,
        speed_ft,
        xp_reward,
        abilities: Abilities { dex },
        actions,
        spellcasting: None,
        special_abilities: Vec::new(),
        attack_round: 0,
    }
}

fn baseline_bestiary() -> Vec<Combatant> {
    let goblin = monster(
        "goblin",
        15,
        7,
        14,
        30,
        50,
        vec![
            melee("scimitar", 4, vec![Dice::new(1, 6, 2)]),
            ranged("shortbow", 4, 80, 320, vec![Dice::new(1, 6, 2)]),
        ],
    );

    let skeleton = monster(
        "skeleton",
        13,
        13,
        14,
        30,
        50,
        vec![
            melee("shortsword", 4, vec![Dice::new(1, 6, 2)]),
            ranged("shortbow", 4, 80, 320, vec![Dice::new(1, 6, 2)]),
        ],
    );

    let orc = monster(
        "orc",
        13,
        15,
        12,
        30,
        100,
        vec![
            melee("greataxe", 5, vec![Dice::new(1, 12, 3)]),
            thrown("javelin", 5, 30, 120, vec![Dice::new(1, 6, 3)]),
        ],
    );

    let wolf = monster("wolf", 13, 11, 15, 40, 50, vec![melee("bite", 4, vec![Dice::new(2, 4, 2)])]);

    let ghoul = monster(
        "ghoul",
        12,
        22,
        15,
        30,
        200,
        vec![
            melee("bite", 2, vec![Dice::new(2, 6, 2)]),
            melee("claws", 4, vec![Dice::new(2, 4, 2)]),
        ],
    );

    let zombie = monster("zombie", 8, 22, 6, 20, 50, vec![melee("slam", 3, vec![Dice::new(1, 6, 1)])]);

    let mut hell_hound = monster(
        "hell hound",
        15,
        45,
        12,
        50,
        700,
        vec![melee("bite", 5, vec![Dice::new(1, 8, 3), Dice::new(2, 6, 0)])],
    );
    hell_hound.special_abilities.push(SpecialAbility {
        name: "fire breath".to_owned(),
        ready: true,
        recharge: Some(RechargeRule { threshold: 5 }),
        usable_after_death: false,
        reach_ft: 15,
        save_dc: 12,
        save_outcome: SaveOutcome::Half,
        damages: vec![Dice::new(6, 6, 0)],
    });

    let mut gas_spore = monster("gas spore", 5, 1, 1, 10, 100, Vec::new());
    gas_spore.actions.push(melee("touch", 0, vec![Dice::new(1, 6, 0)]));
    gas_spore.special_abilities.push(SpecialAbility {
        name: "death burst".to_owned(),
        ready: true,
        recharge: None,
        usable_after_death: true,
        reach_ft: 20,
        save_dc: 15,
        save_outcome: SaveOutcome::None,
        damages: vec![Dice::new(3, 6, 0)],
    });

    let mut acolyte = monster("acolyte", 10, 9, 10, 30, 50, vec![melee("club", 2, vec![Dice::new(1, 4, 0)])]);
    acolyte.spellcasting = Some(Spellcasting {
        attack_bonus: 4,
        learned: vec![
            Spell {
                name: "sacred flame".to_owned(),
                level: 0,
                reach_ft: 60,
                damages: vec![Dice::new(1, 8, 0)],
            },
            Spell {
                name: "guiding bolt".to_owned(),
                level: 1,
                reach_ft: 120,
                damages: vec![Dice::new(4, 6, 0)],
            },
        ],
        slots: vec![3],
        max_slots: vec![3],
    });

    vec![goblin, skeleton, orc, wolf, ghoul, zombie, hell_hound, gas_spore, acolyte]
}

/// A first-level sword-and-board fighter.
pub fn hero_fighter(name: &str) -> (Combatant, HeroProfile) {
    let combatant = Combatant {
        id: CombatantId::default(),
        name: name.to_owned(),
        kind: CombatantKind::Hero,
        pos: Pos::new(0, 0),
        hit_points: 12,
        max_hit_points: 12,
        armor_class: 16,
        speed_ft: 30,
        xp_reward: 0,
        abilities: Abilities { dex: 13 },
        actions: vec![
            melee("longsword", 5, vec![Dice::new(1, 8, 3)]),
            ranged("light crossbow", 3, 80, 320, vec![Dice::new(1, 8, 1)]),
        ],
        spellcasting: None,
        special_abilities: Vec::new(),
        attack_round: 0,
    };
    let profile = HeroProfile {
        armor_proficiencies: ARMOR_TABLE.iter().map(|s| (*s).to_owned()).collect(),
        weapon_proficiencies: WEAPON_TABLE.iter().map(|s| (*s).to_owned()).collect(),
        ..HeroProfile::default()
    };
    (combatant, profile)
}

/// A first-level cleric with a cantrip and first-level slots.
pub fn hero_cleric(name: &str) -> (Combatant, HeroProfile) {
    let (mut combatant, mut profile) = hero_fighter(name);
    combatant.hit_points = 10;
    combatant.max_hit_points = 10;
    combatant.armor_class = 15;
    combatant.actions = vec![melee("mace", 4, vec![Dice::new(1, 6, 2)])];
    combatant.spellcasting = Some(Spellcasting {
        attack_bonus: 5,
        learned: vec![
            Spell {
                name: "sacred flame".to_owned(),
                level: 0,
                reach_ft: 60,
                damages: vec![Dice::new(1, 8, 0)],
            },
            Spell {
                name: "guiding bolt".to_owned(),
                level: 1,
                reach_ft: 120,
                damages: vec![Dice::new(4, 6, 0)],
            },
        ],
        slots: caster_slots(1),
        max_slots: caster_slots(1),
    });
    profile.weapon_proficiencies = vec!["mace".to_owned(), "warhammer".to_owned()];
    (combatant, profile)
}
