//! Level population and out-of-combat encounters: room spawns, chests,
//! fountains, and the wandering-monster clock.

use crate::combatant::ItemKind;
use crate::content::{self, POTION_TABLE};
use crate::level::Treasure;
use crate::types::*;

use super::pathfinding;
use super::{Game, WANDERING_GRACE_ROUNDS};

impl Game {
    /// Materializes the current level's pending room spawns, places one
    /// chest per flagged room, and picks the fountain cell. Runs once,
    /// right after the level is built.
    pub(super) fn populate_current_level(&mut self) {
        let entry = self.level().entry;

        let open: Vec<Pos> = {
            let level = self.level();
            level
                .map
                .walkable_positions(&level.doors)
                .into_iter()
                .filter(|p| *p != entry && !level.map.has_door(*p))
                .collect()
        };
        if !open.is_empty() {
            let idx = self.next_u32() as usize % open.len();
            self.level_mut().fountain = Some(open[idx]);
        }

        for room_idx in 0..self.level().rooms.len() {
            let spawns = std::mem::take(&mut self.level_mut().rooms[room_idx].pending_spawns);
            for name in &spawns {
                if let Some(pos) = self.free_room_cell(room_idx) {
                    self.spawn_monster(name, pos, Some(room_idx));
                }
            }
            if std::mem::take(&mut self.level_mut().rooms[room_idx].pending_treasure)
                && let Some(pos) = self.free_room_cell(room_idx)
            {
                let depth = u32::from(self.level().depth);
                let gold = (self.roll(6) as u32 + self.roll(6) as u32) * 10 * depth;
                let has_item = self.roll(3) == 1;
                let id = self.level_mut().treasures.insert_with_key(|id| Treasure {
                    id,
                    pos,
                    gold,
                    has_item,
                });
                self.level_mut().rooms[room_idx].treasure = Some(id);
            }
        }
    }

    /// A walkable, unoccupied, non-special cell inside the room, chosen
    /// uniformly.
    fn free_room_cell(&mut self, room_idx: usize) -> Option<Pos> {
        let hero_pos = self.hero().pos;
        let candidates: Vec<Pos> = {
            let level = self.level();
            let room = &level.rooms[room_idx];
            room.positions()
                .filter(|p| level.map.is_walkable(*p, &level.doors))
                .filter(|p| level.map.tile_at(*p) == TileKind::Floor)
                .filter(|p| level.fountain != Some(*p) && level.entry != *p)
                .filter(|p| level.treasure_at(*p).is_none())
                .collect()
        };
        let candidates: Vec<Pos> = candidates
            .into_iter()
            .filter(|p| *p != hero_pos && self.combatant_at(*p).is_none())
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let idx = self.next_u32() as usize % candidates.len();
        Some(candidates[idx])
    }

    /// Unknown names are dropped with a warning rather than failing the
    /// whole level.
    pub(super) fn spawn_monster(
        &mut self,
        name: &str,
        pos: Pos,
        room_idx: Option<usize>,
    ) -> Option<CombatantId> {
        let Some(mut proto) = self.content.monster(name) else {
            log::warn!("no stat block for monster {name:?}, skipping spawn");
            return None;
        };
        proto.pos = pos;
        let id = self.combatants.insert(proto);
        self.combatants[id].id = id;
        self.level_mut().monsters.push(id);
        if let Some(room_idx) = room_idx {
            self.level_mut().rooms[room_idx].monsters.push(id);
        }
        Some(id)
    }

    /// Gold always; one item on a third of the chests, split evenly
    /// between a potion, an armor, and a weapon the hero can use.
    pub(super) fn open_treasure(&mut self, id: TreasureId) {
        let Some(treasure) = self.level_mut().remove_treasure(id) else {
            return;
        };
        self.profile.gold += treasure.gold;
        let item = if treasure.has_item { self.roll_treasure_item() } else { None };
        let label = item.as_ref().map(|item| match item {
            ItemKind::Potion { name, .. } => name.clone(),
            ItemKind::Armor(name) | ItemKind::Weapon(name) => name.clone(),
        });
        if let Some(item) = item {
            self.profile.inventory.push(item);
        }
        self.log.push(LogEvent::TreasureOpened { gold: treasure.gold, item: label });
    }

    fn roll_treasure_item(&mut self) -> Option<ItemKind> {
        match self.roll(3) {
            1 => self.roll_potion(),
            2 => {
                let armors = self.profile.armor_proficiencies.clone();
                self.pick(&armors).map(ItemKind::Armor).or_else(|| self.roll_potion())
            }
            _ => {
                let weapons = self.profile.weapon_proficiencies.clone();
                self.pick(&weapons).map(ItemKind::Weapon).or_else(|| self.roll_potion())
            }
        }
    }

    fn roll_potion(&mut self) -> Option<ItemKind> {
        let eligible: Vec<&content::PotionDef> = POTION_TABLE
            .iter()
            .filter(|p| p.min_level <= self.profile.level)
            .collect();
        if eligible.is_empty() {
            return None;
        }
        let idx = self.next_u32() as usize % eligible.len();
        let def = eligible[idx];
        Some(ItemKind::Potion {
            name: def.name.to_owned(),
            heal: def.heal,
            min_level: def.min_level,
        })
    }

    fn pick(&mut self, names: &[String]) -> Option<String> {
        if names.is_empty() {
            return None;
        }
        let idx = self.next_u32() as usize % names.len();
        Some(names[idx].clone())
    }

    /// Drinking from a fountain refills a caster's slots and cashes in
    /// any banked experience. Each fountain works once.
    pub(super) fn fountain_blessing(&mut self) {
        self.level_mut().fountain_used = true;
        let hero = &mut self.combatants[self.hero_id];
        let slots_restored = match hero.spellcasting.as_mut() {
            Some(casting) => {
                casting.restore_all();
                true
            }
            None => false,
        };
        self.log.push(LogEvent::FountainBlessing { slots_restored });

        while content::level_for_xp(self.profile.xp) > self.profile.level {
            self.profile.level += 1;
            let gained = self.roll(10);
            let hero = &mut self.combatants[self.hero_id];
            hero.max_hit_points += gained;
            hero.hit_points += gained;
            if let Some(casting) = hero.spellcasting.as_mut() {
                casting.max_slots = content::caster_slots(self.profile.level);
                casting.slots = casting.max_slots.clone();
            }
            let level = self.profile.level;
            self.log.push(LogEvent::LevelGained { level });
        }
    }

    /// After ten quiet rounds a natural 18+ on a d20 drops a wandering
    /// group onto visible ground, farthest cells first.
    pub(super) fn maybe_spawn_wandering(&mut self) {
        if self.level().wandering_groups.is_empty() {
            return;
        }
        if self.round_no <= self.last_combat_round + WANDERING_GRACE_ROUNDS {
            return;
        }
        if self.roll(20) < 18 {
            return;
        }
        let group_idx = self.next_u32() as usize % self.level().wandering_groups.len();
        let group = self.level().wandering_groups[group_idx].clone();
        log::debug!("wandering check passed on round {}, group {group_idx}", self.round_no);

        let hero_pos = self.hero().pos;
        let mut cells: Vec<Pos> = {
            let level = self.level();
            level
                .visible
                .iter()
                .copied()
                .filter(|p| level.map.is_walkable(*p, &level.doors))
                .collect()
        };
        cells.retain(|p| *p != hero_pos && self.combatant_at(*p).is_none());
        cells.retain(|p| {
            let obstacles = self.level().obstacles();
            pathfinding::shortest_path_astar(&self.level().map, &obstacles, *p, hero_pos)
                .distance
                .is_some()
        });
        cells.sort_by_key(|p| (p.manhattan(hero_pos), *p));

        let mut spawned = Vec::new();
        for name in &group {
            let Some(pos) = cells.pop() else { break };
            if self.spawn_monster(name, pos, None).is_some() {
                spawned.push(name.clone());
            }
        }
        if !spawned.is_empty() {
            self.log.push(LogEvent::WanderingSpawn { names: spawned });
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::game::test_support::{arena_game_with, patrol_game};

    use super::*;

    #[test]
    fn rooms_spawn_their_roster_inside_their_bounds() {
        let game = patrol_game(21);
        let room = &game.level().rooms[0];
        assert_eq!(room.monsters.len(), 2);
        assert!(room.pending_spawns.is_empty());
        for id in &room.monsters {
            let monster = game.combatant(*id).unwrap();
            assert_eq!(monster.name, "goblin");
            assert!(room.contains(monster.pos));
        }
    }

    #[test]
    fn unknown_monster_names_are_skipped() {
        let mut game = arena_game_with(4, &[]);
        assert!(game.spawn_monster("beholder", Pos::new(1, 2), None).is_none());
        assert!(game.level().monsters.is_empty());
    }

    #[test]
    fn flagged_rooms_get_a_chest_with_gold() {
        let game = patrol_game(21);
        let room = &game.level().rooms[0];
        let id = room.treasure.expect("patrol room is flagged for treasure");
        let treasure = &game.level().treasures[id];
        assert!(treasure.gold >= 20);
        assert!(room.contains(treasure.pos));
    }

    #[test]
    fn opening_a_chest_moves_gold_to_the_profile() {
        let mut game = patrol_game(21);
        let id = game.level().rooms[0].treasure.unwrap();
        let gold = game.level().treasures[id].gold;
        game.open_treasure(id);
        assert_eq!(game.profile().gold, gold);
        assert!(game.level().treasures.is_empty());
        assert_eq!(game.level().rooms[0].treasure, None);
        assert!(game
            .log()
            .iter()
            .any(|e| matches!(e, LogEvent::TreasureOpened { .. })));
    }

    #[test]
    fn fountain_restores_slots_and_cashes_banked_xp() {
        let mut game = arena_game_with(9, &[]);
        let hero = game.hero_id();
        if let Some(casting) = game.combatants[hero].spellcasting.as_mut() {
            casting.slots = vec![0];
        }
        game.profile.xp = 900; // level 3 threshold
        let max_before = game.hero().max_hit_points;
        game.fountain_blessing();
        assert_eq!(game.profile().level, 3);
        assert!(game.hero().max_hit_points > max_before);
        let casting = game.hero().spellcasting.as_ref().unwrap();
        assert_eq!(casting.slots, crate::content::caster_slots(3));
        assert!(game.level().fountain_used);
    }

    #[test]
    fn wandering_monsters_respect_the_grace_period() {
        let mut game = patrol_game(13);
        for _ in 0..WANDERING_GRACE_ROUNDS {
            game.advance_round(None);
            assert!(
                !game
                    .log()
                    .iter()
                    .any(|e| matches!(e, LogEvent::WanderingSpawn { .. })),
                "no spawn inside the grace period"
            );
        }
    }

    #[test]
    fn wandering_monsters_eventually_appear_on_visible_cells() {
        let mut game = arena_game_with(17, &[]);
        let mut spawned_round = None;
        for round in 0..400 {
            let before = game.level().monsters.len();
            game.advance_round(None);
            if game.level().monsters.len() > before {
                spawned_round = Some(round);
                break;
            }
        }
        let round = spawned_round.expect("an 18+ on d20 turns up within 400 rounds");
        assert!(round as u32 > WANDERING_GRACE_ROUNDS);
        for id in &game.level().monsters {
            let pos = game.combatant(*id).unwrap().pos;
            assert_ne!(pos, game.hero().pos);
        }
    }
}
