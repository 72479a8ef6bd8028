//! Thread-safe pathfinding facade.
//!
//! [`PathfindingEngine`] owns the obstacle layers, the shared request and
//! result slots, and the planning thread. Every caller-side operation takes
//! a lock only long enough to copy or swap a value; none of them wait on
//! search progress.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::MargaConfig;
use crate::core::WorldPoint;
use crate::grid::{GridGeometry, NavGrid, ObstacleBox, ObstacleMap, OccupancyGrid};
use crate::pathfinder::Pathfinder;
use crate::planning::{GoalEndState, PathConstraints, PlannerPath};
use crate::shared::{
    PlannerShared, PlannerSharedHandle, PlannerStatus, PlanningRequest, PublishedPath,
    RequestFlags,
};
use crate::threads::{PlanningThread, PlanningThreadConfig};

/// Idle observations in a row that count as "all work serviced".
const IDLE_OBSERVATIONS: u32 = 2;

/// Local anytime pathfinder running on its own thread.
pub struct PathfindingEngine {
    geometry: GridGeometry,
    occupancy: Mutex<OccupancyGrid>,
    shared: PlannerSharedHandle,
    worker: PlanningThread,
}

impl PathfindingEngine {
    /// Create an engine for the given map and start its planning thread.
    ///
    /// Start and goal begin at the origin (snapped to free space) with every
    /// request flag raised, so the first iteration builds a search. A
    /// configuration that fails validation is replaced by the defaults.
    pub fn new(config: &MargaConfig, navgrid: NavGrid) -> Self {
        let defaults;
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                tracing::warn!("{}; using default configuration", e);
                defaults = MargaConfig::default();
                &defaults
            }
        };

        let geometry = navgrid.geometry();
        let occupancy = OccupancyGrid::new(&navgrid);
        let obstacles = occupancy.effective();

        let origin = obstacles.nearest_free(geometry.to_cell(WorldPoint::ZERO));
        let request = PlanningRequest {
            start: origin,
            real_start: WorldPoint::ZERO,
            goal: origin,
            real_goal: WorldPoint::ZERO,
            obstacles,
        };

        let shared = Arc::new(PlannerShared::new(
            request,
            RequestFlags::ALL,
            config.planner.initial_epsilon,
        ));
        let worker = PlanningThread::spawn(
            PlanningThreadConfig::from(config),
            geometry,
            Arc::clone(&shared),
        );

        tracing::info!(
            "Pathfinding engine ready: {}x{} cells @ {:.2}m, {} static obstacles",
            geometry.width(),
            geometry.height(),
            geometry.cell_size(),
            navgrid.blocked().len()
        );

        Self {
            geometry,
            occupancy: Mutex::new(occupancy),
            shared,
            worker,
        }
    }

    /// Create an engine, loading the map named by the configuration.
    ///
    /// A missing or malformed map falls back to the default empty field.
    pub fn from_config(config: &MargaConfig) -> Self {
        let navgrid = NavGrid::load_or_default(config.grid.navgrid_path.as_deref());
        Self::new(config, navgrid)
    }

    /// Engine on the default empty field with default settings.
    pub fn with_defaults() -> Self {
        Self::new(&MargaConfig::default(), NavGrid::default())
    }

    #[inline]
    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    /// Snap the start to free space. A minor pass runs only if the cell
    /// changed; the exact position is always recorded for the next publish.
    pub fn set_start_position(&self, position: WorldPoint) {
        if !position.is_finite() {
            tracing::warn!("Ignoring non-finite start position {:?}", position);
            return;
        }

        let obstacles = self.obstacles();
        let cell = obstacles.nearest_free(self.geometry.to_cell(position));

        let changed = {
            let mut state = self.shared.request.lock();
            state.request.real_start = position;
            let changed = state.request.start != cell;
            if changed {
                state.request.start = cell;
                state.flags.minor = true;
            }
            changed
        };

        if changed {
            tracing::trace!("Start moved to {}", cell);
            self.worker.wake();
        }
    }

    /// Snap the goal to free space. A new cell resets the search; a new
    /// position inside the same cell only republishes.
    pub fn set_goal_position(&self, position: WorldPoint) {
        if !position.is_finite() {
            tracing::warn!("Ignoring non-finite goal position {:?}", position);
            return;
        }

        let obstacles = self.obstacles();
        let cell = obstacles.nearest_free(self.geometry.to_cell(position));

        let requested = {
            let mut state = self.shared.request.lock();
            let cell_changed = state.request.goal != cell;
            let moved = cell_changed || state.request.real_goal != position;
            state.request.real_goal = position;
            if cell_changed {
                state.request.goal = cell;
                state.flags = RequestFlags::ALL;
            } else if moved {
                state.flags.minor = true;
            }
            moved
        };

        if requested {
            tracing::debug!("Goal set to {} ({:.3}, {:.3})", cell, position.x, position.y);
            self.worker.wake();
        }
    }

    /// Replace the dynamic obstacle layer.
    ///
    /// An unchanged layer is a no-op. Otherwise the search is reset, the
    /// start is re-seeded from `robot_position` when the robot, the start
    /// cell, or the published path is now blocked, and the goal is re-snapped
    /// when its cell is now blocked.
    pub fn set_dynamic_obstacles(&self, boxes: &[ObstacleBox], robot_position: WorldPoint) {
        // Lock order: occupancy, then request. Both are updated under one
        // occupancy guard.
        let (obstacles, start, goal, real_goal) = {
            let mut occupancy = self.occupancy.lock();
            let cells = occupancy.rasterize(boxes);
            if !occupancy.set_dynamic_cells(cells) {
                tracing::trace!("Dynamic obstacles unchanged");
                return;
            }
            let obstacles = occupancy.effective();

            let mut state = self.shared.request.lock();
            state.request.obstacles = Arc::clone(&obstacles);
            state.flags = RequestFlags::ALL;
            (
                obstacles,
                state.request.start,
                state.request.goal,
                state.request.real_goal,
            )
        };

        let path_blocked = self
            .shared
            .path
            .latest()
            .raw
            .iter()
            .any(|cell| obstacles.is_blocked(*cell));
        let robot_blocked = obstacles.is_blocked(self.geometry.to_cell(robot_position));

        if path_blocked || robot_blocked || obstacles.is_blocked(start) {
            tracing::debug!(
                "Re-seeding start (path blocked: {}, robot blocked: {})",
                path_blocked,
                robot_blocked
            );
            self.set_start_position(robot_position);
        }
        if obstacles.is_blocked(goal) {
            self.set_goal_position(real_goal);
        }

        tracing::debug!("Dynamic obstacles replaced: {} blocked cells", obstacles.len());
        self.worker.wake();
    }

    /// Whether a path was published since the last call. Clears the flag.
    pub fn is_new_path_available(&self) -> bool {
        self.shared.path.take_new()
    }

    /// Latest path wrapped for the trajectory layer. Clears the "new" flag.
    ///
    /// `None` until a path with at least two points has been published.
    pub fn current_path(
        &self,
        constraints: PathConstraints,
        goal_end_state: GoalEndState,
    ) -> Option<PlannerPath> {
        let latest = self.shared.path.latest();
        self.shared.path.clear_new();
        PlannerPath::from_points(&latest.points, constraints, goal_end_state)
    }

    /// Latest published result with every extraction stage.
    pub fn published_path(&self) -> Arc<PublishedPath> {
        self.shared.path.latest()
    }

    /// Copy of the current request.
    pub fn request_snapshot(&self) -> PlanningRequest {
        self.shared.request.lock().request.clone()
    }

    /// Effective obstacle snapshot the next search will use.
    pub fn obstacles(&self) -> Arc<ObstacleMap> {
        Arc::clone(&self.shared.request.lock().request.obstacles)
    }

    /// Worker counters plus the pending request flags.
    pub fn status(&self) -> PlannerStatus {
        let pending = self.shared.request.lock().flags;
        self.shared.stats.snapshot(pending)
    }

    /// Block until every requested pass has run, or the timeout expires.
    ///
    /// Returns `true` when the worker went idle. For tools and tests only.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_idle() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn is_idle(&self) -> bool {
        use std::sync::atomic::Ordering;

        // The worker zeroes the idle counter under the request lock when it
        // takes work, so both values are read consistently here.
        let state = self.shared.request.lock();
        !state.flags.any()
            && self.shared.stats.consecutive_idle.load(Ordering::Acquire) >= IDLE_OBSERVATIONS
    }
}

impl Pathfinder for PathfindingEngine {
    fn is_new_path_available(&self) -> bool {
        PathfindingEngine::is_new_path_available(self)
    }

    fn current_path(
        &self,
        constraints: PathConstraints,
        goal_end_state: GoalEndState,
    ) -> Option<PlannerPath> {
        PathfindingEngine::current_path(self, constraints, goal_end_state)
    }

    fn set_start_position(&self, position: WorldPoint) {
        PathfindingEngine::set_start_position(self, position);
    }

    fn set_goal_position(&self, position: WorldPoint) {
        PathfindingEngine::set_goal_position(self, position);
    }

    fn set_dynamic_obstacles(&self, obstacles: &[ObstacleBox], robot_position: WorldPoint) {
        PathfindingEngine::set_dynamic_obstacles(self, obstacles, robot_position);
    }
}
