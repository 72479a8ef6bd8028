//! Test utilities for Marga integration tests.
//!
//! Grid builders, a reference shortest-path search that shares no code with
//! the planner, and polling helpers for the background engine.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};

use rand::Rng;
use rand::rngs::StdRng;

use marga::planning::AdStarPlanner;
use marga::{GridCoord, GridGeometry, ObstacleBox, ObstacleMap, WorldPoint};

/// Generous wait for the background worker on slow CI machines.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Random blocked cells at the given density, keeping a one-cell margin
/// around every cell in `keep_clear` free.
pub fn random_blocked(
    rng: &mut StdRng,
    geometry: GridGeometry,
    density: f64,
    keep_clear: &[GridCoord],
) -> HashSet<GridCoord> {
    let mut blocked = HashSet::new();
    for y in 0..geometry.height() as i32 {
        for x in 0..geometry.width() as i32 {
            let cell = GridCoord::new(x, y);
            let near_kept = keep_clear
                .iter()
                .any(|k| k.chebyshev_distance(&cell) <= 1);
            if !near_kept && rng.gen_bool(density) {
                blocked.insert(cell);
            }
        }
    }
    blocked
}

/// Random obstacle boxes (cell-aligned) that stay clear of `keep_clear`.
pub fn random_boxes(
    rng: &mut StdRng,
    geometry: GridGeometry,
    count: usize,
    keep_clear: &[GridCoord],
) -> Vec<ObstacleBox> {
    let mut boxes = Vec::new();
    let w = geometry.width() as i32;
    let h = geometry.height() as i32;

    while boxes.len() < count {
        let x0 = rng.gen_range(0..w);
        let y0 = rng.gen_range(0..h);
        let x1 = (x0 + rng.gen_range(0..4)).min(w - 1);
        let y1 = (y0 + rng.gen_range(0..4)).min(h - 1);

        let touches_kept = keep_clear.iter().any(|k| {
            k.x >= x0 - 1 && k.x <= x1 + 1 && k.y >= y0 - 1 && k.y <= y1 + 1
        });
        if touches_kept {
            continue;
        }

        boxes.push(ObstacleBox::new(
            geometry.cell_center(GridCoord::new(x0, y0)),
            geometry.cell_center(GridCoord::new(x1, y1)),
        ));
    }
    boxes
}

#[derive(PartialEq)]
struct Frontier {
    cost: f64,
    cell: GridCoord,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost)
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest 8-connected path cost with no corner cutting (plain Dijkstra).
///
/// Infinite when either endpoint is blocked or the two are disconnected.
pub fn reference_cost(
    geometry: GridGeometry,
    blocked: &HashSet<GridCoord>,
    start: GridCoord,
    goal: GridCoord,
) -> f64 {
    let free = |c: GridCoord| geometry.in_bounds(c) && !blocked.contains(&c);
    if !free(start) || !free(goal) {
        return f64::INFINITY;
    }

    let mut dist: HashMap<GridCoord, f64> = HashMap::new();
    let mut heap = BinaryHeap::new();
    dist.insert(start, 0.0);
    heap.push(Frontier {
        cost: 0.0,
        cell: start,
    });

    while let Some(Frontier { cost, cell }) = heap.pop() {
        if cell == goal {
            return cost;
        }
        if cost > dist[&cell] {
            continue;
        }

        for dx in -1..=1 {
            for dy in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let next = GridCoord::new(cell.x + dx, cell.y + dy);
                if !free(next) {
                    continue;
                }
                let diagonal = dx != 0 && dy != 0;
                if diagonal
                    && (!free(GridCoord::new(cell.x + dx, cell.y))
                        || !free(GridCoord::new(cell.x, cell.y + dy)))
                {
                    continue;
                }

                let step = if diagonal { std::f64::consts::SQRT_2 } else { 1.0 };
                let candidate = cost + step;
                if candidate < *dist.get(&next).unwrap_or(&f64::INFINITY) {
                    dist.insert(next, candidate);
                    heap.push(Frontier {
                        cost: candidate,
                        cell: next,
                    });
                }
            }
        }
    }

    f64::INFINITY
}

/// Run a minor pass and every refinement, returning g(start) after each.
pub fn converge(planner: &mut AdStarPlanner, map: &ObstacleMap) -> Vec<(f64, f64)> {
    let start = planner.start();
    let mut costs = Vec::new();

    planner.improve(start, map).unwrap();
    costs.push((planner.epsilon(), planner.solution_cost()));
    while planner.refine(start, map).unwrap().is_some() {
        costs.push((planner.epsilon(), planner.solution_cost()));
    }
    costs
}

/// Check a straight segment between two cell centers by dense sampling.
pub fn segment_is_clear(map: &ObstacleMap, from: GridCoord, to: GridCoord) -> bool {
    let geometry = map.geometry();
    let a = geometry.cell_center(from);
    let b = geometry.cell_center(to);
    let samples = 400;
    (0..samples).all(|i| {
        let t = (i as f64 + 0.5) / samples as f64;
        !map.is_blocked(geometry.to_cell(a.lerp(&b, t)))
    })
}

/// True when a world point lies inside a blocked cell's footprint.
pub fn in_blocked_cell(map: &ObstacleMap, point: WorldPoint) -> bool {
    map.is_blocked(map.geometry().to_cell(point))
}

/// Poll `condition` until it holds or `timeout` expires.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
