//! Grid search: BFS for flood distances, A* for point-to-point routes.
//! Both expand neighbours in the same fixed order and tie-break on
//! row-major position, so equal-cost queries always return the same path.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::map::LevelMap;
use crate::types::{Pos, TurnError};

/// Neighbour expansion order: north, east, south, west.
pub fn neighbors(p: Pos) -> [Pos; 4] {
    [
        Pos { y: p.y - 1, x: p.x },
        Pos { y: p.y, x: p.x + 1 },
        Pos { y: p.y + 1, x: p.x },
        Pos { y: p.y, x: p.x - 1 },
    ]
}

pub fn manhattan(a: Pos, b: Pos) -> u32 {
    a.manhattan(b)
}

/// Search output: `distance` in steps when the goal was reached, plus the
/// predecessor map for path reconstruction.
pub struct SearchResult {
    pub distance: Option<u32>,
    came_from: BTreeMap<Pos, Pos>,
}

impl SearchResult {
    /// Walks predecessors back from `goal`. The result starts at `start`
    /// and ends at `goal`; identical endpoints give an empty path.
    pub fn path(&self, start: Pos, goal: Pos) -> Option<Vec<Pos>> {
        if start == goal {
            return Some(Vec::new());
        }
        self.distance?;
        let mut path = vec![goal];
        let mut cursor = goal;
        while cursor != start {
            cursor = *self.came_from.get(&cursor)?;
            path.push(cursor);
        }
        path.reverse();
        Some(path)
    }
}

fn passable(map: &LevelMap, obstacles: &BTreeSet<Pos>, p: Pos) -> bool {
    map.in_bounds(p) && !obstacles.contains(&p)
}

/// Breadth-first flood from `start` until `goal` pops. Cells in
/// `obstacles` are impassable; `start` and `goal` themselves are exempt
/// so an occupied goal can still be routed to.
pub fn shortest_path_bfs(
    map: &LevelMap,
    obstacles: &BTreeSet<Pos>,
    start: Pos,
    goal: Pos,
) -> SearchResult {
    let mut came_from = BTreeMap::new();
    let mut dist = BTreeMap::from([(start, 0u32)]);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        let d = dist[&current];
        if current == goal {
            return SearchResult { distance: Some(d), came_from };
        }
        for next in neighbors(current) {
            if next != goal && !passable(map, obstacles, next) {
                continue;
            }
            if !map.in_bounds(next) || dist.contains_key(&next) {
                continue;
            }
            dist.insert(next, d + 1);
            came_from.insert(next, current);
            queue.push_back(next);
        }
    }
    SearchResult { distance: None, came_from }
}

/// Open-list entry ordered by f, then h, then row-major position. The
/// derived lexicographic `Ord` is the whole tie-break policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct OpenNode {
    f: u32,
    h: u32,
    y: i32,
    x: i32,
}

/// A* with the Manhattan heuristic. Unit step costs keep the heuristic
/// admissible, so the distance always matches BFS.
pub fn shortest_path_astar(
    map: &LevelMap,
    obstacles: &BTreeSet<Pos>,
    start: Pos,
    goal: Pos,
) -> SearchResult {
    let mut came_from = BTreeMap::new();
    let mut g_score = BTreeMap::from([(start, 0u32)]);
    let mut open = BTreeSet::from([OpenNode {
        f: manhattan(start, goal),
        h: manhattan(start, goal),
        y: start.y,
        x: start.x,
    }]);
    while let Some(node) = open.pop_first() {
        let current = Pos { y: node.y, x: node.x };
        let g = g_score[&current];
        if current == goal {
            return SearchResult { distance: Some(g), came_from };
        }
        for next in neighbors(current) {
            if next != goal && !passable(map, obstacles, next) {
                continue;
            }
            if !map.in_bounds(next) {
                continue;
            }
            let tentative = g + 1;
            if g_score.get(&next).is_none_or(|known| tentative < *known) {
                g_score.insert(next, tentative);
                came_from.insert(next, current);
                let h = manhattan(next, goal);
                open.insert(OpenNode { f: tentative + h, h, y: next.y, x: next.x });
            }
        }
    }
    SearchResult { distance: None, came_from }
}

/// First step to last step via A*, as most callers want it.
pub struct PathResult {
    pub distance: u32,
    pub waypoints: Vec<Pos>,
}

pub fn find_path(
    map: &LevelMap,
    obstacles: &BTreeSet<Pos>,
    start: Pos,
    goal: Pos,
) -> Result<PathResult, TurnError> {
    let search = shortest_path_astar(map, obstacles, start, goal);
    let distance = search.distance.ok_or(TurnError::PathNotFound)?;
    let waypoints = search.path(start, goal).ok_or(TurnError::PathNotFound)?;
    Ok(PathResult { distance, waypoints })
}
