//! Round resolution: initiative, hero intents, and monster turns driven
//! by the priority rules in [`super::policy`].

use std::cmp::Reverse;

use crate::combatant::{AttackAction, AttackKind, SaveOutcome, SpecialAbility, Spell};
use crate::dice::{RechargeRule, d20};
use crate::types::*;

use super::pathfinding::{self, neighbors};
use super::policy::{self, MonsterDecision, PolicyContext};
use super::Game;

pub(super) enum HeroTurn {
    Report(TurnReport),
    Fled,
}

impl Game {
    /// Runs one full initiative cycle. Order is fixed when the round
    /// starts; actors that die mid-round are skipped when their slot
    /// comes up unless they hold an after-death burst.
    pub(super) fn run_combat_round(
        &mut self,
        action: Option<Action>,
        engaged: Vec<CombatantId>,
        outcome: &mut RoundOutcome,
    ) {
        let order = self.roll_initiative(&engaged);
        for id in order {
            if self.hero().is_dead() || outcome.fled {
                break;
            }
            if id == self.hero_id {
                let Some(action) = action else { continue };
                match self.hero_combat_action(action) {
                    Ok(HeroTurn::Report(report)) => outcome.reports.push(report),
                    Ok(HeroTurn::Fled) => {
                        outcome.fled = true;
                        self.log.push(LogEvent::HeroFled);
                    }
                    Err(err) => outcome.hero_error = Some(err),
                }
            } else if let Some(report) = self.monster_turn(id) {
                outcome.reports.push(report);
            }
        }
        if self.hero().is_dead() {
            self.log.push(LogEvent::HeroDied);
        }
    }

    /// Each participant rolls a die sized by its dexterity score; the
    /// sort is descending and stable, so equal rolls keep hero-first,
    /// then level order.
    pub(super) fn roll_initiative(&mut self, engaged: &[CombatantId]) -> Vec<CombatantId> {
        let mut entries: Vec<(CombatantId, i32)> = Vec::with_capacity(engaged.len() + 1);
        for id in std::iter::once(self.hero_id).chain(engaged.iter().copied()) {
            let dex = self.combatants[id].abilities.dex.max(1);
            let roll = self.roll(dex);
            entries.push((id, roll));
        }
        entries.sort_by_key(|(_, roll)| Reverse(*roll));
        entries.into_iter().map(|(id, _)| id).collect()
    }

    /// Living monsters the hero can currently see, plus dead ones still
    /// owed an after-death burst.
    pub(super) fn engaged_monsters(&self) -> Vec<CombatantId> {
        self.level()
            .monsters
            .iter()
            .copied()
            .filter(|id| {
                let Some(monster) = self.combatants.get(*id) else {
                    return false;
                };
                self.level().visible.contains(&monster.pos)
                    && (!monster.is_dead() || monster.has_after_death_ability())
            })
            .collect()
    }

    fn hero_combat_action(&mut self, action: Action) -> Result<HeroTurn, TurnError> {
        match action {
            Action::Move(to) => {
                self.step_hero_towards(to)?;
                Ok(HeroTurn::Report(TurnReport::idle(self.hero_id)))
            }
            Action::OpenDoor(pos) => {
                self.open_door_intent(pos)?;
                Ok(HeroTurn::Report(TurnReport::idle(self.hero_id)))
            }
            Action::CloseDoor(pos) => {
                self.close_door_intent(pos)?;
                Ok(HeroTurn::Report(TurnReport::idle(self.hero_id)))
            }
            Action::DrinkPotion => {
                self.drink_potion()?;
                Ok(HeroTurn::Report(TurnReport::idle(self.hero_id)))
            }
            Action::MeleeAttack(target) => self.hero_weapon_attack(target, AttackKind::Melee),
            Action::RangedAttack(target) => self.hero_weapon_attack(target, AttackKind::Ranged),
            Action::CastSpell { spell, target } => self.hero_cast(spell, target),
            Action::UseSpecialAbility { ability, target } => self.hero_special(ability, target),
            Action::Flee => {
                self.step_away_from_monsters();
                Ok(HeroTurn::Fled)
            }
        }
    }

    fn hero_weapon_attack(
        &mut self,
        target: CombatantId,
        wanted: AttackKind,
    ) -> Result<HeroTurn, TurnError> {
        let distance_ft = self.target_distance_ft(target)?;
        let hero = &self.combatants[self.hero_id];
        if !hero.actions.iter().any(|a| a.kind == wanted || a.kind == AttackKind::Mixed) {
            return Err(TurnError::InvalidAction);
        }
        if wanted == AttackKind::Melee && distance_ft > FEET_PER_TILE {
            return Err(TurnError::InvalidTarget);
        }
        let action = hero
            .actions
            .iter()
            .filter(|a| (a.kind == wanted || a.kind == AttackKind::Mixed) && a.covers(distance_ft))
            .max_by(|a, b| {
                a.expected_damage()
                    .partial_cmp(&b.expected_damage())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
            .ok_or(TurnError::InvalidTarget)?;
        let report = self.resolve_weapon_attack(self.hero_id, target, &action);
        Ok(HeroTurn::Report(report))
    }

    fn hero_cast(&mut self, spell_idx: usize, target: CombatantId) -> Result<HeroTurn, TurnError> {
        let distance_ft = self.target_distance_ft(target)?;
        let hero = &self.combatants[self.hero_id];
        let casting = hero.spellcasting.as_ref().ok_or(TurnError::InvalidAction)?;
        let spell = casting.learned.get(spell_idx).ok_or(TurnError::InvalidAction)?.clone();
        if !casting.can_cast(&spell) {
            return Err(TurnError::OutOfResource);
        }
        if spell.reach_ft < distance_ft {
            return Err(TurnError::InvalidTarget);
        }
        let bonus = casting.attack_bonus;
        let level = spell.level;
        if let Some(casting) = self.combatants[self.hero_id].spellcasting.as_mut() {
            casting.spend_slot(level);
        }
        let report = self.resolve_spell(self.hero_id, target, &spell, bonus);
        Ok(HeroTurn::Report(report))
    }

    fn hero_special(
        &mut self,
        ability_idx: usize,
        target: CombatantId,
    ) -> Result<HeroTurn, TurnError> {
        let distance_ft = self.target_distance_ft(target)?;
        let hero = &self.combatants[self.hero_id];
        let ability = hero
            .special_abilities
            .get(ability_idx)
            .ok_or(TurnError::InvalidAction)?
            .clone();
        if !ability.ready {
            return Err(TurnError::OutOfResource);
        }
        if ability.reach_ft < distance_ft.max(FEET_PER_TILE) {
            return Err(TurnError::InvalidTarget);
        }
        self.combatants[self.hero_id].special_abilities[ability_idx].ready = false;
        let report = self.resolve_special(self.hero_id, target, &ability);
        Ok(HeroTurn::Report(report))
    }

    /// A target must exist, be alive, and be in the hero's visible set.
    fn target_distance_ft(&self, target: CombatantId) -> Result<u32, TurnError> {
        let monster = self.combatants.get(target).ok_or(TurnError::InvalidTarget)?;
        if target == self.hero_id || monster.is_dead() {
            return Err(TurnError::InvalidTarget);
        }
        if !self.level().visible.contains(&monster.pos) {
            return Err(TurnError::InvalidTarget);
        }
        Ok(self.hero().pos.manhattan(monster.pos) * FEET_PER_TILE)
    }

    fn step_away_from_monsters(&mut self) {
        let hero_pos = self.hero().pos;
        let threats: Vec<Pos> = self
            .engaged_monsters()
            .iter()
            .filter_map(|id| self.combatants.get(*id))
            .filter(|m| !m.is_dead())
            .map(|m| m.pos)
            .collect();
        if threats.is_empty() {
            return;
        }
        let level = self.level();
        let best = neighbors(hero_pos)
            .into_iter()
            .filter(|p| level.map.is_walkable(*p, &level.doors))
            .filter(|p| self.combatant_at(*p).is_none())
            .max_by_key(|p| threats.iter().map(|t| t.manhattan(*p)).min().unwrap_or(0));
        if let Some(to) = best {
            self.combatants[self.hero_id].pos = to;
            self.log.push(LogEvent::HeroMoved { to });
            self.refresh_visibility();
        }
    }

    fn monster_turn(&mut self, id: CombatantId) -> Option<TurnReport> {
        let monster = self.combatants.get(id)?;
        let was_dead = monster.is_dead();
        if was_dead && !monster.has_after_death_ability() {
            return None;
        }

        // Spent recharge abilities re-roll from the second consecutive
        // combat turn onwards.
        if !was_dead && monster.attack_round > 0 {
            let rules: Vec<(usize, RechargeRule)> = monster
                .special_abilities
                .iter()
                .enumerate()
                .filter(|(_, a)| !a.ready)
                .filter_map(|(i, a)| a.recharge.map(|rule| (i, rule)))
                .collect();
            for (idx, rule) in rules {
                let recharged = {
                    let roll = self.roll(6);
                    roll as u32 >= rule.threshold
                };
                if recharged {
                    self.combatants[id].special_abilities[idx].ready = true;
                }
            }
        }

        let hero_pos = self.hero().pos;
        let monster = &self.combatants[id];
        let distance_tiles = monster.pos.manhattan(hero_pos);
        let decision = policy::decide(&PolicyContext {
            monster,
            distance_tiles,
            distance_ft: distance_tiles * FEET_PER_TILE,
        });
        log::trace!("{} at {distance_tiles} tiles picks {decision:?}", monster.name);

        let report = match decision {
            MonsterDecision::AfterDeathBurst(idx) => {
                let ability = self.combatants[id].special_abilities[idx].clone();
                self.combatants[id].special_abilities[idx].ready = false;
                let report = self.resolve_special(id, self.hero_id, &ability);
                self.remove_monster(id);
                Some(report)
            }
            _ if was_dead => {
                self.remove_monster(id);
                None
            }
            MonsterDecision::Cast(idx) => {
                let casting = self.combatants[id].spellcasting.as_ref()?;
                let spell = casting.learned[idx].clone();
                let bonus = casting.attack_bonus;
                if let Some(casting) = self.combatants[id].spellcasting.as_mut() {
                    casting.spend_slot(spell.level);
                }
                Some(self.resolve_spell(id, self.hero_id, &spell, bonus))
            }
            MonsterDecision::Special(idx) => {
                let ability = self.combatants[id].special_abilities[idx].clone();
                self.combatants[id].special_abilities[idx].ready = false;
                Some(self.resolve_special(id, self.hero_id, &ability))
            }
            MonsterDecision::Melee(idx) | MonsterDecision::Ranged(idx) => {
                let action = self.combatants[id].actions[idx].clone();
                Some(self.resolve_weapon_attack(id, self.hero_id, &action))
            }
            MonsterDecision::Advance => Some(self.advance_towards_hero(id)),
        };

        if let Some(monster) = self.combatants.get_mut(id) {
            monster.attack_round += 1;
        }
        report
    }

    /// Moves `min(speed_ratio, path_len - 2)` steps along the route to
    /// the hero, never onto the hero's own cell. Slower monsters still
    /// close one tile.
    fn advance_towards_hero(&mut self, id: CombatantId) -> TurnReport {
        let hero_pos = self.hero().pos;
        let hero_speed = self.hero().speed_ft.max(1);
        let monster = &self.combatants[id];
        let from = monster.pos;
        let ratio =
            ((f64::from(monster.speed_ft) / f64::from(hero_speed)).round() as usize).max(1);

        let mut obstacles = self.level().obstacles();
        obstacles.extend(self.occupied_positions());
        obstacles.remove(&from);
        obstacles.remove(&hero_pos);

        let Ok(path) = pathfinding::find_path(&self.level().map, &obstacles, from, hero_pos)
        else {
            self.log.push(LogEvent::MonsterBlocked { monster: id });
            return TurnReport { blocked: true, ..TurnReport::idle(id) };
        };
        if path.waypoints.len() < 3 {
            // Already adjacent; nowhere legal to step.
            self.log.push(LogEvent::MonsterBlocked { monster: id });
            return TurnReport { blocked: true, ..TurnReport::idle(id) };
        }
        let index = ratio.min(path.waypoints.len() - 2);
        let to = path.waypoints[index];
        self.combatants[id].pos = to;
        self.log.push(LogEvent::MonsterAdvanced { monster: id, to });
        TurnReport::idle(id)
    }

    /// d20 + bonus against armor class; damage dice only on a hit.
    fn resolve_weapon_attack(
        &mut self,
        attacker: CombatantId,
        target: CombatantId,
        action: &AttackAction,
    ) -> TurnReport {
        let roll = d20(&mut self.rng) + action.attack_bonus;
        let armor_class = self.combatants[target].armor_class;
        if roll < armor_class {
            self.log.push(LogEvent::AttackMissed {
                attacker,
                target,
                label: action.name.clone(),
            });
            return TurnReport { target: Some(target), ..TurnReport::idle(attacker) };
        }
        let damage: i32 = action.damages.iter().map(|d| d.roll(&mut self.rng)).sum();
        self.apply_damage(attacker, target, &action.name, damage)
    }

    /// Spell attacks roll against the defender's passive defence.
    fn resolve_spell(
        &mut self,
        attacker: CombatantId,
        target: CombatantId,
        spell: &Spell,
        attack_bonus: i32,
    ) -> TurnReport {
        let roll = d20(&mut self.rng) + attack_bonus;
        let dc = self.combatants[target].passive_dc();
        if roll < dc {
            self.log.push(LogEvent::AttackMissed { attacker, target, label: spell.name.clone() });
            return TurnReport { target: Some(target), ..TurnReport::idle(attacker) };
        }
        let damage: i32 = spell.damages.iter().map(|d| d.roll(&mut self.rng)).sum();
        self.apply_damage(attacker, target, &spell.name, damage)
    }

    /// Save-based abilities always deal their dice; the save halves or
    /// negates them.
    fn resolve_special(
        &mut self,
        attacker: CombatantId,
        target: CombatantId,
        ability: &SpecialAbility,
    ) -> TurnReport {
        let rolled: i32 = ability.damages.iter().map(|d| d.roll(&mut self.rng)).sum();
        let save = d20(&mut self.rng) + self.combatants[target].abilities.dex_modifier();
        let damage = if save >= ability.save_dc {
            match ability.save_outcome {
                SaveOutcome::Half => rolled / 2,
                SaveOutcome::None => 0,
            }
        } else {
            rolled
        };
        if damage == 0 {
            self.log.push(LogEvent::AttackMissed { attacker, target, label: ability.name.clone() });
            return TurnReport { target: Some(target), ..TurnReport::idle(attacker) };
        }
        self.apply_damage(attacker, target, &ability.name, damage)
    }

    fn apply_damage(
        &mut self,
        attacker: CombatantId,
        target: CombatantId,
        label: &str,
        damage: i32,
    ) -> TurnReport {
        self.combatants[target].take_damage(damage);
        self.log.push(LogEvent::AttackHit {
            attacker,
            target,
            label: label.to_owned(),
            damage,
        });
        let killed = self.combatants[target].is_dead();
        if killed && target != self.hero_id {
            self.award_kill(target);
        }
        TurnReport {
            actor: attacker,
            target: Some(target),
            damage_dealt: damage,
            target_killed: killed,
            blocked: false,
        }
    }

    /// Books the kill and removes the corpse, unless it still owes an
    /// after-death burst; then it stays until its initiative slot fires.
    fn award_kill(&mut self, target: CombatantId) {
        let monster = &self.combatants[target];
        let name = monster.name.clone();
        let xp = monster.xp_reward;
        let lingers = monster.has_after_death_ability();
        self.profile.xp += xp;
        self.profile.kills.push(name.clone());
        self.log.push(LogEvent::MonsterKilled { name, xp });
        if !lingers {
            self.remove_monster(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::combatant::ItemKind;
    use crate::dice::Dice;
    use crate::game::test_support::{arena_game_with, place_monster};

    use super::*;

    #[test]
    fn initiative_covers_everyone_and_ties_keep_submission_order() {
        let mut game = arena_game_with(5, &[]);
        // Dexterity 1 forces every roll to 1: pure tie, so the stable
        // sort must preserve hero-first, then the engaged list order.
        let a = place_monster(&mut game, "zombie", Pos::new(1, 3));
        let b = place_monster(&mut game, "zombie", Pos::new(1, 4));
        for id in [game.hero_id(), a, b] {
            game.combatants[id].abilities.dex = 1;
        }
        let order = game.roll_initiative(&[a, b]);
        assert_eq!(order, vec![game.hero_id(), a, b]);
    }

    #[test]
    fn initiative_is_sorted_descending() {
        let mut game = arena_game_with(5, &[]);
        let a = place_monster(&mut game, "goblin", Pos::new(1, 3));
        let b = place_monster(&mut game, "wolf", Pos::new(1, 4));
        for _ in 0..50 {
            let mut rolled = std::collections::BTreeMap::new();
            let order = game.roll_initiative(&[a, b]);
            assert_eq!(order.len(), 3);
            for id in &order {
                rolled.insert(*id, ());
            }
            assert_eq!(rolled.len(), 3, "every participant appears once");
        }
    }

    #[test]
    fn twenty_five_damage_then_heal_ten_lands_on_ten() {
        let mut game = arena_game_with(5, &[]);
        let hero = game.hero_id();
        // Matches a 20 max-hp actor taking 25 then healing 10.
        game.combatants[hero].hit_points = 20;
        game.combatants[hero].max_hit_points = 20;
        game.combatants[hero].take_damage(25);
        assert_eq!(game.hero().hit_points, 0);
        game.combatants[hero].heal(10);
        assert_eq!(game.hero().hit_points, 0, "healing never revives the dead");

        game.combatants[hero].hit_points = 20;
        game.combatants[hero].take_damage(15);
        game.combatants[hero].heal(10);
        assert_eq!(game.hero().hit_points, 15);
    }

    #[test]
    fn melee_attack_out_of_reach_is_invalid_target() {
        let mut game = arena_game_with(5, &[("goblin", Pos::new(1, 6))]);
        let goblin = game.level().monsters[0];
        let outcome = game.advance_round(Some(Action::MeleeAttack(goblin)));
        assert_eq!(outcome.hero_error, Some(TurnError::InvalidTarget));
    }

    #[test]
    fn killing_a_goblin_awards_xp_and_clears_every_index() {
        let mut game = arena_game_with(5, &[("goblin", Pos::new(1, 2))]);
        let goblin = game.level().monsters[0];
        game.combatants[goblin].hit_points = 1;
        // Guarantee the hit lands and the hero survives long enough.
        let hero = game.hero_id();
        game.combatants[hero].actions[0].attack_bonus = 100;
        game.combatants[hero].hit_points = 1000;
        game.combatants[hero].max_hit_points = 1000;
        let mut killed = false;
        for _ in 0..20 {
            let outcome = game.advance_round(Some(Action::MeleeAttack(goblin)));
            if outcome.reports.iter().any(|r| r.target_killed) {
                killed = true;
                break;
            }
        }
        assert!(killed, "a +100 attack bonus cannot miss");
        assert_eq!(game.profile().xp, 50);
        assert_eq!(game.profile().kills, vec!["goblin".to_owned()]);
        assert!(game.combatant(goblin).is_none());
        assert!(game.level().monsters.is_empty());
    }

    #[test]
    fn cast_without_slots_is_out_of_resource() {
        let mut game = arena_game_with(5, &[("goblin", Pos::new(1, 3))]);
        let goblin = game.level().monsters[0];
        let hero = game.hero_id();
        if let Some(casting) = game.combatants[hero].spellcasting.as_mut() {
            casting.slots = vec![0];
        }
        let outcome = game.advance_round(Some(Action::CastSpell { spell: 1, target: goblin }));
        assert_eq!(outcome.hero_error, Some(TurnError::OutOfResource));
    }

    #[test]
    fn flee_ends_the_round_immediately() {
        let mut game = arena_game_with(5, &[("goblin", Pos::new(1, 3))]);
        let outcome = game.advance_round(Some(Action::Flee));
        assert!(outcome.combat);
        assert!(outcome.fled);
        assert!(game.log().contains(&LogEvent::HeroFled));
    }

    #[test]
    fn recharge_never_unreadies_a_ready_ability() {
        let mut game = arena_game_with(5, &[("hell hound", Pos::new(1, 8))]);
        let hound = game.level().monsters[0];
        let hero = game.hero_id();
        game.combatants[hero].hit_points = 100_000;
        game.combatants[hero].max_hit_points = 100_000;
        for _ in 0..30 {
            let was_ready = game.combatants[hound].special_abilities[0].ready;
            let before = game.combatants[hound].attack_round;
            game.advance_round(None);
            if game.combatant(hound).is_none() {
                break;
            }
            let now_ready = game.combatants[hound].special_abilities[0].ready;
            // A ready ability may be spent by use, never by the recharge roll.
            if was_ready && now_ready {
                assert!(game.combatants[hound].attack_round >= before);
            }
            if !was_ready && now_ready {
                // Recharge only happens from the second consecutive turn on.
                assert!(before > 0);
            }
        }
    }

    #[test]
    fn drained_potion_pouch_is_out_of_resource() {
        let mut game = arena_game_with(5, &[]);
        let hero = game.hero_id();
        game.combatants[hero].hit_points -= 5;
        let outcome = game.advance_round(Some(Action::DrinkPotion));
        assert_eq!(outcome.hero_error, Some(TurnError::OutOfResource));
    }

    #[test]
    fn potion_heals_and_is_consumed() {
        let mut game = arena_game_with(5, &[]);
        let hero = game.hero_id();
        game.combatants[hero].hit_points = 2;
        game.profile.inventory.push(ItemKind::Potion {
            name: "potion of healing".to_owned(),
            heal: Dice::new(2, 4, 2),
            min_level: 1,
        });
        let outcome = game.advance_round(Some(Action::DrinkPotion));
        assert_eq!(outcome.hero_error, None);
        assert!(game.hero().hit_points > 2);
        assert!(game.profile().inventory.is_empty());
    }

    #[test]
    fn monster_closes_distance_when_out_of_range() {
        let mut game = arena_game_with(5, &[("zombie", Pos::new(1, 8))]);
        let zombie = game.level().monsters[0];
        let before = game.combatants[zombie].pos;
        game.advance_round(None);
        let after = game.combatants[zombie].pos;
        assert!(after.manhattan(game.hero().pos) < before.manhattan(game.hero().pos));
        assert_ne!(after, game.hero().pos, "monsters never share the hero's cell");
    }

    #[test]
    fn gas_spore_bursts_from_beyond_the_grave() {
        let mut game = arena_game_with(5, &[("gas spore", Pos::new(1, 2))]);
        let spore = game.level().monsters[0];
        let hero = game.hero_id();
        game.combatants[hero].actions[0].attack_bonus = 100;
        game.combatants[hero].hit_points = 1000;
        game.combatants[hero].max_hit_points = 1000;
        let mut burst_seen = false;
        for _ in 0..20 {
            game.advance_round(Some(Action::MeleeAttack(spore)));
            if game.log().iter().any(|e| {
                matches!(e, LogEvent::AttackHit { label, .. } | LogEvent::AttackMissed { label, .. }
                    if label == "death burst")
            }) {
                burst_seen = true;
            }
            if game.combatant(spore).is_none() {
                break;
            }
        }
        assert!(game.combatant(spore).is_none(), "the spore is gone after its slot");
        assert!(burst_seen, "the burst fires exactly once, after death");
    }
}
