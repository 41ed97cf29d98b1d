use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::{Rng, SeedableRng};
use slotmap::SlotMap;

use crate::combatant::{Combatant, HeroProfile, ItemKind};
use crate::content::ContentPack;
use crate::dice::roll_die;
use crate::document::{DocumentError, LevelDocument};
use crate::level::Level;
use crate::types::*;

mod combat;
mod encounters;
pub mod pathfinding;
mod policy;
pub mod snapshot;
#[cfg(test)]
pub(crate) mod test_support;
pub mod visibility;

/// Tiles the hero can see in open ground.
pub const VISION_RANGE: u32 = 10;

/// Rounds without combat before wandering monsters may start appearing.
const WANDERING_GRACE_ROUNDS: u32 = 10;

pub struct Game {
    seed: u64,
    rng: ChaCha8Rng,
    content: ContentPack,
    documents: Vec<LevelDocument>,
    combatants: SlotMap<CombatantId, Combatant>,
    hero_id: CombatantId,
    profile: HeroProfile,
    levels: Vec<Level>,
    depth: u8,
    round_no: u32,
    last_combat_round: u32,
    log: Vec<LogEvent>,
}

impl Game {
    /// Builds depth 1, populates it, and drops the hero at its entry cell.
    pub fn new(
        seed: u64,
        hero: Combatant,
        profile: HeroProfile,
        documents: Vec<LevelDocument>,
        content: ContentPack,
    ) -> Result<Self, DocumentError> {
        if documents.is_empty() {
            return Err(DocumentError::MissingDepth(1));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut combatants = SlotMap::with_key();
        let hero_id = combatants.insert(hero);
        combatants[hero_id].id = hero_id;

        let max_depth = documents.len() as u8;
        let level = Level::from_document(&documents[0], 1, max_depth, &mut rng)?;
        let mut game = Self {
            seed,
            rng,
            content,
            documents,
            combatants,
            hero_id,
            profile,
            levels: vec![level],
            depth: 1,
            round_no: 0,
            last_combat_round: 0,
            log: Vec::new(),
        };
        game.populate_current_level();
        game.combatants[hero_id].pos = game.level().entry;
        game.refresh_visibility();
        Ok(game)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn max_depth(&self) -> u8 {
        self.documents.len() as u8
    }

    pub fn round_no(&self) -> u32 {
        self.round_no
    }

    pub fn hero(&self) -> &Combatant {
        &self.combatants[self.hero_id]
    }

    pub fn hero_id(&self) -> CombatantId {
        self.hero_id
    }

    pub fn profile(&self) -> &HeroProfile {
        &self.profile
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.get(id)
    }

    pub fn level(&self) -> &Level {
        &self.levels[self.depth as usize - 1]
    }

    pub(crate) fn level_mut(&mut self) -> &mut Level {
        &mut self.levels[self.depth as usize - 1]
    }

    pub fn log(&self) -> &[LogEvent] {
        &self.log
    }

    pub fn drain_log(&mut self) -> Vec<LogEvent> {
        std::mem::take(&mut self.log)
    }

    /// Advances one round. With monsters in view the round runs the full
    /// initiative cycle; otherwise the hero's intent resolves alone and
    /// the wandering clock ticks.
    pub fn advance_round(&mut self, action: Option<Action>) -> RoundOutcome {
        let mut outcome = RoundOutcome::default();
        if self.hero().is_dead() {
            outcome.hero_dead = true;
            return outcome;
        }

        let engaged = self.engaged_monsters();
        self.reset_disengaged_attack_rounds(&engaged);

        if engaged.is_empty() {
            let pos_before = self.hero().pos;
            if let Some(action) = action
                && let Err(err) = self.exploration_action(action)
            {
                outcome.hero_error = Some(err);
            }
            self.apply_tile_effects(pos_before);
            self.maybe_spawn_wandering();
        } else {
            outcome.combat = true;
            self.last_combat_round = self.round_no;
            self.run_combat_round(action, engaged, &mut outcome);
        }

        outcome.hero_dead = self.hero().is_dead();
        self.round_no += 1;
        outcome
    }

    fn exploration_action(&mut self, action: Action) -> Result<(), TurnError> {
        match action {
            Action::Move(to) => self.step_hero_towards(to).map(|_| ()),
            Action::OpenDoor(pos) => self.open_door_intent(pos),
            Action::CloseDoor(pos) => self.close_door_intent(pos),
            Action::DrinkPotion => self.drink_potion(),
            Action::MeleeAttack(_)
            | Action::RangedAttack(_)
            | Action::CastSpell { .. }
            | Action::UseSpecialAbility { .. } => {
                // Attacks resolve through the combat path; out here nothing
                // is in view, so there is no legal target.
                Err(TurnError::InvalidTarget)
            }
            Action::Flee => Err(TurnError::InvalidAction),
        }
    }

    /// One step along the best route to `to`. Errors leave the hero where
    /// it was.
    fn step_hero_towards(&mut self, to: Pos) -> Result<Pos, TurnError> {
        let from = self.hero().pos;
        if to == from {
            return Ok(from);
        }
        let level = self.level();
        if !level.map.is_walkable(to, &level.doors) {
            return Err(TurnError::InvalidAction);
        }
        if self.combatant_at(to).is_some() {
            return Err(TurnError::InvalidTarget);
        }
        let mut obstacles = self.level().obstacles();
        obstacles.extend(self.occupied_positions());
        obstacles.remove(&from);
        obstacles.remove(&to);
        let path = pathfinding::find_path(&self.level().map, &obstacles, from, to)?;
        let next = path.waypoints.get(1).copied().ok_or(TurnError::PathNotFound)?;
        self.combatants[self.hero_id].pos = next;
        self.log.push(LogEvent::HeroMoved { to: next });
        self.refresh_visibility();
        Ok(next)
    }

    fn open_door_intent(&mut self, pos: Pos) -> Result<(), TurnError> {
        if self.hero().pos.manhattan(pos) != 1 || !self.level().map.has_door(pos) {
            return Err(TurnError::InvalidAction);
        }
        if !self.level_mut().open_door(pos) {
            return Err(TurnError::InvalidAction);
        }
        self.log.push(LogEvent::DoorOpened { pos });
        self.refresh_visibility();
        Ok(())
    }

    fn close_door_intent(&mut self, pos: Pos) -> Result<(), TurnError> {
        if self.hero().pos.manhattan(pos) != 1
            || !self.level().map.has_door(pos)
            || self.combatant_at(pos).is_some()
        {
            return Err(TurnError::InvalidAction);
        }
        if !self.level_mut().close_door(pos) {
            return Err(TurnError::InvalidAction);
        }
        self.log.push(LogEvent::DoorClosed { pos });
        self.refresh_visibility();
        Ok(())
    }

    /// Picks the smallest eligible potion that covers the missing hit
    /// points, or the biggest one if none does.
    fn drink_potion(&mut self) -> Result<(), TurnError> {
        let hero = &self.combatants[self.hero_id];
        let missing = hero.max_hit_points - hero.hit_points;
        if missing <= 0 {
            return Err(TurnError::InvalidAction);
        }
        let hero_level = self.profile.level;
        let mut best: Option<(usize, i32)> = None;
        for (idx, item) in self.profile.inventory.iter().enumerate() {
            let ItemKind::Potion { heal, min_level, .. } = item else {
                continue;
            };
            if *min_level > hero_level {
                continue;
            }
            let max = heal.max_roll();
            let better = match best {
                None => true,
                Some((_, best_max)) => {
                    if best_max >= missing {
                        max >= missing && max < best_max
                    } else {
                        max > best_max
                    }
                }
            };
            if better {
                best = Some((idx, max));
            }
        }
        let (idx, _) = best.ok_or(TurnError::OutOfResource)?;
        let ItemKind::Potion { name, heal, .. } = self.profile.inventory.remove(idx) else {
            unreachable!("index selected from a potion entry");
        };
        let amount = heal.roll(&mut self.rng);
        let hero = &mut self.combatants[self.hero_id];
        let before = hero.hit_points;
        hero.heal(amount);
        let healed = hero.hit_points - before;
        self.log.push(LogEvent::PotionDrunk { name, healed });
        Ok(())
    }

    /// Treasure, fountains, and staircases trigger from the tile the hero
    /// ends its round on. Staircases fire only on arrival, so idling on
    /// one does not bounce between depths.
    fn apply_tile_effects(&mut self, pos_before: Pos) {
        let pos = self.hero().pos;
        if let Some(id) = self.level().treasure_at(pos) {
            self.open_treasure(id);
        }
        if self.level().fountain == Some(pos) && !self.level().fountain_used {
            self.fountain_blessing();
        }
        if pos == pos_before {
            return;
        }
        match self.level().map.tile_at(pos) {
            TileKind::StairsDown => self.descend(),
            TileKind::StairsUp => self.ascend(),
            _ => {}
        }
    }

    fn descend(&mut self) {
        let next = self.depth + 1;
        if next > self.max_depth() {
            return;
        }
        let max_depth = self.max_depth();
        if self.levels.len() < next as usize {
            match Level::from_document(
                &self.documents[next as usize - 1],
                next,
                max_depth,
                &mut self.rng,
            ) {
                Ok(level) => self.levels.push(level),
                Err(err) => {
                    log::error!("failed to build depth {next}: {err}");
                    return;
                }
            }
            self.depth = next;
            self.populate_current_level();
        } else {
            self.depth = next;
        }
        let entry = self.level().entry;
        self.combatants[self.hero_id].pos = entry;
        self.log.push(LogEvent::DepthChanged { depth: next });
        self.refresh_visibility();
    }

    fn ascend(&mut self) {
        if self.depth <= 1 {
            return;
        }
        self.depth -= 1;
        // Coming up from below lands on the down staircase.
        let landing = self.level().map.stairs_down().unwrap_or(self.level().entry);
        self.combatants[self.hero_id].pos = landing;
        self.log.push(LogEvent::DepthChanged { depth: self.depth });
        self.refresh_visibility();
    }

    pub(crate) fn combatant_at(&self, pos: Pos) -> Option<CombatantId> {
        if self.combatants[self.hero_id].pos == pos {
            return Some(self.hero_id);
        }
        self.level()
            .monsters
            .iter()
            .copied()
            .find(|id| self.combatants.get(*id).is_some_and(|m| !m.is_dead() && m.pos == pos))
    }

    pub(crate) fn occupied_positions(&self) -> Vec<Pos> {
        let mut out = vec![self.combatants[self.hero_id].pos];
        out.extend(
            self.level()
                .monsters
                .iter()
                .filter_map(|id| self.combatants.get(*id))
                .filter(|m| !m.is_dead())
                .map(|m| m.pos),
        );
        out
    }

    /// The single removal path for monsters: arena entry and every level
    /// index drop together.
    pub(crate) fn remove_monster(&mut self, id: CombatantId) {
        self.combatants.remove(id);
        for level in &mut self.levels {
            level.forget_monster(id);
        }
    }

    fn reset_disengaged_attack_rounds(&mut self, engaged: &[CombatantId]) {
        let ids: Vec<CombatantId> = self.level().monsters.clone();
        for id in ids {
            if !engaged.contains(&id)
                && let Some(monster) = self.combatants.get_mut(id)
            {
                monster.attack_round = 0;
            }
        }
    }

    pub(crate) fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    pub(crate) fn roll(&mut self, sides: u32) -> i32 {
        roll_die(&mut self.rng, sides)
    }
}
