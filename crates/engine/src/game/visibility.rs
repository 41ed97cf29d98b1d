//! Fog-of-war: Bresenham line of sight and the per-move visible set.

use std::collections::{BTreeMap, BTreeSet};

use crate::map::LevelMap;
use crate::types::{DoorState, Pos};

use super::{Game, VISION_RANGE};

/// True when no obstacle sits strictly between the endpoints. The walk
/// always starts from the endpoint with the smaller row so that swapping
/// the arguments traces the same cells and the answer is symmetric.
pub fn line_of_sight(obstacles: &BTreeSet<Pos>, a: Pos, b: Pos) -> bool {
    let (start, target) = if a.y <= b.y { (a, b) } else { (b, a) };
    let dy = (target.y - start.y).abs();
    let dx = (target.x - start.x).abs();
    let sy = if start.y < target.y { 1 } else { -1 };
    let sx = if start.x < target.x { 1 } else { -1 };

    let mut err = dx - dy;
    let mut y = start.y;
    let mut x = start.x;
    loop {
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
        if y == target.y && x == target.x {
            return true;
        }
        if obstacles.contains(&Pos { y, x }) {
            return false;
        }
    }
}

/// Every open in-bounds cell within Euclidean `range` of `observer` that
/// a sight line reaches. The observer's own cell is always included;
/// opaque cells themselves are not.
pub fn compute_visible(
    map: &LevelMap,
    doors: &BTreeMap<Pos, DoorState>,
    observer: Pos,
    range: u32,
) -> BTreeSet<Pos> {
    let obstacles = map.obstacles(doors);
    let mut visible = BTreeSet::from([observer]);
    let r = range as i32;
    for y in observer.y - r..=observer.y + r {
        for x in observer.x - r..=observer.x + r {
            let p = Pos { y, x };
            if p == observer || !map.in_bounds(p) || obstacles.contains(&p) {
                continue;
            }
            if p.dist_squared(observer) > i64::from(r) * i64::from(r) {
                continue;
            }
            if line_of_sight(&obstacles, observer, p) {
                visible.insert(p);
            }
        }
    }
    visible
}

impl Game {
    /// Recomputes the visible set from the hero's cell and folds it into
    /// the explored set, which only ever grows.
    pub(crate) fn refresh_visibility(&mut self) {
        let observer = self.hero().pos;
        let level = self.level_mut();
        let visible = compute_visible(&level.map, &level.doors, observer, VISION_RANGE);
        level.explored.extend(visible.iter().copied());
        level.visible = visible;
    }
}
