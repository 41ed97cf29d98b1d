//! Shared fixtures: canned level documents and pre-built games.

use std::collections::BTreeMap;

use crate::content::{self, ContentPack};
use crate::document::LevelDocument;
use crate::map::LevelMap;
use crate::types::{CombatantId, DoorState, Pos, TileKind};

use super::Game;

/// Parses an ASCII picture into a map plus its door table.
/// `#` wall, `.` floor, `+` closed door, `'` open door, `<` `>` stairs.
pub(crate) fn map_from_rows(rows: &[&str]) -> (LevelMap, BTreeMap<Pos, DoorState>) {
    let height = rows.len();
    let width = rows.first().map_or(0, |r| r.len());
    let mut tiles = Vec::with_capacity(width * height);
    let mut doors = BTreeMap::new();
    for (y, row) in rows.iter().enumerate() {
        assert_eq!(row.len(), width, "ragged fixture row {y}");
        for (x, ch) in row.chars().enumerate() {
            let pos = Pos { y: y as i32, x: x as i32 };
            tiles.push(match ch {
                '#' => TileKind::Wall,
                '.' => TileKind::Floor,
                '+' => {
                    doors.insert(pos, DoorState::Closed);
                    TileKind::ClosedDoor
                }
                '\'' => {
                    doors.insert(pos, DoorState::Open);
                    TileKind::OpenDoor
                }
                '<' => TileKind::StairsUp,
                '>' => TileKind::StairsDown,
                other => panic!("bad fixture tile {other:?}"),
            });
        }
    }
    (LevelMap::new(width, height, tiles, None, None), doors)
}

/// Two 3x3 rooms joined by a door, goblins and a chest in the west one.
pub(crate) fn patrol_document() -> LevelDocument {
    LevelDocument::from_json(
        r#"{
            "name": "goblin patrol",
            "cells": [
                [0, 0, 0, 0, 0, 0, 0, 0, 0],
                [0, 1, 1, 1, 0, 1, 1, 1, 0],
                [0, 1, 1, 1, 0, 1, 1, 1, 0],
                [0, 1, 1, 1, 0, 1, 1, 1, 0],
                [0, 0, 0, 0, 0, 0, 0, 0, 0]
            ],
            "doors": [{"row": 1, "col": 4}],
            "rooms": [
                {"id": 1, "row": 1, "col": 1, "width": 3, "height": 3,
                 "monsters": ["goblin", "goblin"], "treasure": true},
                {"id": 2, "row": 1, "col": 5, "width": 3, "height": 3}
            ],
            "stairs_up": {"row": 1, "col": 1},
            "stairs_down": {"row": 3, "col": 7},
            "wandering": [
                {"label": "patrol", "monsters": [{"name": "goblin", "count": 2}]}
            ]
        }"#,
    )
    .unwrap()
}

/// An empty walled corridor, 10 cells long, with a wandering table but
/// no room spawns. The hero enters at the west end.
pub(crate) fn arena_document() -> LevelDocument {
    LevelDocument::from_json(
        r#"{
            "name": "arena",
            "cells": [
                [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
                [0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0],
                [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
            ],
            "stairs_up": {"row": 1, "col": 1},
            "wandering": [
                {"label": "strays", "monsters": [{"name": "goblin", "count": 2}]}
            ]
        }"#,
    )
    .unwrap()
}

/// Cleric hero on the patrol level; two depths so the down stair exists.
pub(crate) fn patrol_game(seed: u64) -> Game {
    let (hero, profile) = content::hero_cleric("ellaria");
    Game::new(
        seed,
        hero,
        profile,
        vec![patrol_document(), patrol_document()],
        ContentPack::baseline(),
    )
    .unwrap()
}

/// Cleric hero alone in the corridor, with extra monsters dropped at
/// fixed cells.
pub(crate) fn arena_game_with(seed: u64, placements: &[(&str, Pos)]) -> Game {
    let (hero, profile) = content::hero_cleric("ellaria");
    let mut game = Game::new(
        seed,
        hero,
        profile,
        vec![arena_document()],
        ContentPack::baseline(),
    )
    .unwrap();
    for (name, pos) in placements {
        place_monster(&mut game, name, *pos);
    }
    game.refresh_visibility();
    game
}

pub(crate) fn empty_arena_game(seed: u64) -> Game {
    arena_game_with(seed, &[])
}

pub(crate) fn place_monster(game: &mut Game, name: &str, pos: Pos) -> CombatantId {
    game.spawn_monster(name, pos, None)
        .unwrap_or_else(|| panic!("no stat block for {name:?}"))
}
