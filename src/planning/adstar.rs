//! Anytime incremental search (AD*-style).
//!
//! The search is rooted at the goal: `rhs(goal) = 0` and costs propagate
//! outward until the start cell is locally consistent. Because the cost
//! field is goal-rooted, a moving start only needs fresh keys, while a new
//! goal or obstacle set needs a full reset.
//!
//! A reset starts with an inflated heuristic (ε > 1) for a fast first path.
//! Each refinement lowers ε, reopens the deferred cells, and re-expands only
//! what the tighter bound requires.

use crate::config::PlannerConfig;
use crate::core::GridCoord;
use crate::error::{MargaError, Result};
use crate::grid::{GridGeometry, ObstacleMap};

use super::search::{SearchKey, SearchState};

/// Configuration for the anytime planner.
#[derive(Clone, Debug)]
pub struct AdStarConfig {
    /// Inflation factor applied at every reset
    pub initial_epsilon: f64,
    /// Inflation decrement per refinement
    pub epsilon_step: f64,
    /// Expansion cap for a single pass
    pub max_expansions: usize,
}

impl Default for AdStarConfig {
    fn default() -> Self {
        Self::from(&PlannerConfig::default())
    }
}

impl From<&PlannerConfig> for AdStarConfig {
    fn from(config: &PlannerConfig) -> Self {
        Self {
            initial_epsilon: config.initial_epsilon,
            epsilon_step: config.epsilon_step,
            max_expansions: config.max_expansions,
        }
    }
}

/// Outcome of one ComputeOrImprovePath pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PassStats {
    /// Cells popped from the open list
    pub expansions: usize,
    /// The termination test held when the pass ended
    pub converged: bool,
    /// The pass stopped at the expansion cap
    pub capped: bool,
}

/// Incremental anytime planner. Owns the search tables.
pub struct AdStarPlanner {
    config: AdStarConfig,
    state: SearchState,
    start: GridCoord,
    goal: GridCoord,
}

impl AdStarPlanner {
    /// Create a planner for a grid of the given geometry.
    pub fn new(config: AdStarConfig, geometry: GridGeometry) -> Self {
        let state = SearchState::new(geometry, config.initial_epsilon);
        Self {
            config,
            state,
            start: GridCoord::default(),
            goal: GridCoord::default(),
        }
    }

    /// Create a planner with default configuration.
    pub fn with_defaults(geometry: GridGeometry) -> Self {
        Self::new(AdStarConfig::default(), geometry)
    }

    #[inline]
    pub fn config(&self) -> &AdStarConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> &SearchState {
        &self.state
    }

    #[inline]
    pub fn start(&self) -> GridCoord {
        self.start
    }

    #[inline]
    pub fn goal(&self) -> GridCoord {
        self.goal
    }

    #[inline]
    pub fn epsilon(&self) -> f64 {
        self.state.epsilon()
    }

    #[inline]
    pub fn g(&self, cell: GridCoord) -> f64 {
        self.state.g(cell)
    }

    #[inline]
    pub fn rhs(&self, cell: GridCoord) -> f64 {
        self.state.rhs(cell)
    }

    /// Current cost-to-goal estimate of the start cell.
    #[inline]
    pub fn solution_cost(&self) -> f64 {
        self.state.g(self.start)
    }

    /// Whether another refinement pass would lower ε.
    #[inline]
    pub fn can_refine(&self) -> bool {
        self.state.epsilon() > 1.0
    }

    /// Priority of a cell against the current start.
    #[inline]
    pub fn key(&self, cell: GridCoord) -> SearchKey {
        self.state.key(cell, self.start)
    }

    /// Discard all search state and root a new episode at `goal`.
    pub fn reset(&mut self, start: GridCoord, goal: GridCoord) -> Result<()> {
        let geometry = self.state.geometry();
        if !geometry.in_bounds(start) {
            return Err(MargaError::OutOfBounds(start));
        }

        self.state.reset(self.config.initial_epsilon);
        self.start = start;
        self.goal = goal;

        self.state.set_rhs(goal, 0.0)?;
        let key = self.key(goal);
        self.state.open.insert(goal, key);

        tracing::debug!(
            "Search reset: start {} goal {} eps {:.2}",
            start,
            goal,
            self.config.initial_epsilon
        );
        Ok(())
    }

    /// Expand cells until the start is consistent and no open key beats it.
    ///
    /// Stops early when the open list empties (start unreachable) or the
    /// expansion cap is hit. Either way the tables hold the best estimates
    /// found so far.
    pub fn compute_or_improve_path(&mut self, obstacles: &ObstacleMap) -> Result<PassStats> {
        let mut stats = PassStats::default();

        loop {
            let Some((cell, top_key)) = self.state.open.peek() else {
                stats.converged = self.state.is_consistent(self.start);
                break;
            };

            if top_key >= self.key(self.start) && self.state.is_consistent(self.start) {
                stats.converged = true;
                break;
            }

            if stats.expansions >= self.config.max_expansions {
                tracing::warn!(
                    "Search pass hit the expansion cap ({}), {} cells still open",
                    self.config.max_expansions,
                    self.state.open.len()
                );
                stats.capped = true;
                break;
            }

            if !top_key.is_finite() {
                return Err(MargaError::Search(format!(
                    "non-finite key {:?} for open cell {}",
                    top_key, cell
                )));
            }

            self.state.open.pop();
            stats.expansions += 1;

            let g = self.state.g(cell);
            let rhs = self.state.rhs(cell);

            if g > rhs {
                self.state.set_g(cell, rhs)?;
                self.state.close(cell)?;
                for neighbor in obstacles.free_neighbors(cell) {
                    self.update_state(neighbor, obstacles)?;
                }
            } else {
                self.state.set_g(cell, f64::INFINITY)?;
                for neighbor in obstacles.free_neighbors(cell) {
                    self.update_state(neighbor, obstacles)?;
                }
                self.update_state(cell, obstacles)?;
            }
        }

        tracing::trace!(
            "Pass done: {} expansions, eps {:.2}, g(start) {:.3}",
            stats.expansions,
            self.state.epsilon(),
            self.solution_cost()
        );
        Ok(stats)
    }

    /// Recompute `rhs` of a cell and route it to open or incons.
    pub fn update_state(&mut self, cell: GridCoord, obstacles: &ObstacleMap) -> Result<()> {
        if cell != self.goal {
            let best = obstacles
                .free_neighbors(cell)
                .map(|n| self.state.g(n) + obstacles.edge_cost(cell, n))
                .fold(f64::INFINITY, f64::min);
            self.state.set_rhs(cell, best)?;
        }

        self.state.open.remove(cell);

        if !self.state.is_consistent(cell) {
            if self.state.is_closed(cell) {
                self.state.defer(cell);
            } else {
                let key = self.key(cell);
                self.state.open.insert(cell, key);
            }
        }
        Ok(())
    }

    /// Minor pass: adopt a (possibly moved) start and improve at the
    /// current ε without discarding any cost estimates.
    pub fn improve(&mut self, start: GridCoord, obstacles: &ObstacleMap) -> Result<PassStats> {
        self.set_start(start)?;
        self.prepare_pass();
        self.compute_or_improve_path(obstacles)
    }

    /// Major pass: lower ε by one step (never below 1.0) and improve.
    ///
    /// Returns `None` when ε is already 1.0.
    pub fn refine(
        &mut self,
        start: GridCoord,
        obstacles: &ObstacleMap,
    ) -> Result<Option<PassStats>> {
        if !self.can_refine() {
            return Ok(None);
        }

        let epsilon = (self.state.epsilon() - self.config.epsilon_step).max(1.0);
        self.state.set_epsilon(epsilon);
        self.set_start(start)?;
        self.prepare_pass();

        let stats = self.compute_or_improve_path(obstacles)?;
        tracing::debug!(
            "Refined to eps {:.2}: {} expansions, g(start) {:.3}",
            epsilon,
            stats.expansions,
            self.solution_cost()
        );
        Ok(Some(stats))
    }

    fn set_start(&mut self, start: GridCoord) -> Result<()> {
        if !self.state.geometry().in_bounds(start) {
            return Err(MargaError::OutOfBounds(start));
        }
        self.start = start;
        Ok(())
    }

    /// Reopen deferred cells, rekey the frontier, start a fresh closed set.
    fn prepare_pass(&mut self) {
        self.state.merge_incons();
        self.state.rekey_open(self.start);
        self.state.clear_closed();
    }
}
