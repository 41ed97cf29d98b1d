//! Monster turn policy as an ordered rule table. The first rule that
//! returns a decision wins; the last rule always applies, so `decide`
//! is total.

use crate::combatant::{AttackKind, Combatant};
use crate::types::FEET_PER_TILE;

pub(crate) struct PolicyContext<'a> {
    pub monster: &'a Combatant,
    pub distance_tiles: u32,
    pub distance_ft: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MonsterDecision {
    /// Index into `special_abilities`.
    AfterDeathBurst(usize),
    /// Index into the learned spell list.
    Cast(usize),
    /// Index into `special_abilities`.
    Special(usize),
    /// Index into `actions`.
    Melee(usize),
    /// Index into `actions`.
    Ranged(usize),
    Advance,
}

type Rule = fn(&PolicyContext<'_>) -> Option<MonsterDecision>;

/// Priority order: post-death burst, strongest castable spell, readiest
/// special ability, melee in reach, ranged in reach, close the distance.
pub(crate) const PRIORITY_RULES: &[Rule] = &[
    after_death_rule,
    spell_rule,
    special_rule,
    melee_rule,
    ranged_rule,
    advance_rule,
];

pub(crate) fn decide(ctx: &PolicyContext<'_>) -> MonsterDecision {
    PRIORITY_RULES
        .iter()
        .find_map(|rule| rule(ctx))
        .unwrap_or(MonsterDecision::Advance)
}

/// A dead monster's only move is a burst flagged usable after death.
fn after_death_rule(ctx: &PolicyContext<'_>) -> Option<MonsterDecision> {
    if !ctx.monster.is_dead() {
        return None;
    }
    best_ability(ctx, true)
        .map(MonsterDecision::AfterDeathBurst)
        .or(Some(MonsterDecision::Advance))
}

/// Highest-level spell the monster can still pay for and reach with.
fn spell_rule(ctx: &PolicyContext<'_>) -> Option<MonsterDecision> {
    let casting = ctx.monster.spellcasting.as_ref()?;
    casting
        .learned
        .iter()
        .enumerate()
        .filter(|(_, spell)| casting.can_cast(spell) && spell.reach_ft >= ctx.distance_ft)
        .max_by_key(|(_, spell)| spell.level)
        .map(|(idx, _)| MonsterDecision::Cast(idx))
}

/// Strongest ready special ability that reaches the hero.
fn special_rule(ctx: &PolicyContext<'_>) -> Option<MonsterDecision> {
    best_ability(ctx, false).map(MonsterDecision::Special)
}

fn best_ability(ctx: &PolicyContext<'_>, after_death: bool) -> Option<usize> {
    ctx.monster
        .special_abilities
        .iter()
        .enumerate()
        .filter(|(_, ability)| {
            ability.ready
                && ability.usable_after_death == after_death
                && ability.reach_ft >= ctx.distance_ft.max(FEET_PER_TILE)
        })
        .max_by(|(_, a), (_, b)| {
            a.expected_damage()
                .partial_cmp(&b.expected_damage())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(idx, _)| idx)
}

/// Adjacent targets get the hardest-hitting melee-capable attack.
fn melee_rule(ctx: &PolicyContext<'_>) -> Option<MonsterDecision> {
    if ctx.distance_tiles > 1 {
        return None;
    }
    best_attack(ctx.monster, |kind| kind != AttackKind::Ranged, ctx.distance_ft)
        .map(MonsterDecision::Melee)
}

/// Otherwise any ranged-capable attack whose range covers the gap.
fn ranged_rule(ctx: &PolicyContext<'_>) -> Option<MonsterDecision> {
    best_attack(ctx.monster, |kind| kind != AttackKind::Melee, ctx.distance_ft)
        .map(MonsterDecision::Ranged)
}

fn best_attack(
    monster: &Combatant,
    kind_ok: impl Fn(AttackKind) -> bool,
    distance_ft: u32,
) -> Option<usize> {
    monster
        .actions
        .iter()
        .enumerate()
        .filter(|(_, action)| kind_ok(action.kind) && action.covers(distance_ft))
        .max_by(|(_, a), (_, b)| {
            a.expected_damage()
                .partial_cmp(&b.expected_damage())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(idx, _)| idx)
}

fn advance_rule(_ctx: &PolicyContext<'_>) -> Option<MonsterDecision> {
    Some(MonsterDecision::Advance)
}
