//! State shared between the caller and the planning worker.
//!
//! Two independent locks:
//! - The request lock guards the caller's latest intent and its dirty flags.
//!   Callers write it, the worker snapshots it once per iteration.
//! - The path lock guards the published result. The worker swaps in a new
//!   `Arc` wholesale, callers clone the `Arc` out.
//!
//! Neither side ever holds one lock while waiting on the other.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::core::{GridCoord, WorldPoint};
use crate::grid::ObstacleMap;

/// Atomic wrapper for f64 values.
/// Uses AtomicU64 with bit reinterpretation.
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(val: f64) -> Self {
        Self(AtomicU64::new(val.to_bits()))
    }

    pub fn load(&self, order: Ordering) -> f64 {
        f64::from_bits(self.0.load(order))
    }

    pub fn store(&self, val: f64, order: Ordering) {
        self.0.store(val.to_bits(), order);
    }
}

/// Work the worker still owes the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RequestFlags {
    /// Goal or obstacles changed: rebuild the search
    pub reset: bool,
    /// Cheap improve pass (start moved, or follows a reset)
    pub minor: bool,
    /// Another ε refinement pass
    pub major: bool,
}

impl RequestFlags {
    pub const NONE: RequestFlags = RequestFlags {
        reset: false,
        minor: false,
        major: false,
    };

    pub const ALL: RequestFlags = RequestFlags {
        reset: true,
        minor: true,
        major: true,
    };

    #[inline]
    pub fn any(&self) -> bool {
        self.reset || self.minor || self.major
    }
}

/// Latest caller intent.
#[derive(Clone, Debug)]
pub struct PlanningRequest {
    /// Start cell (clamped to free space)
    pub start: GridCoord,
    /// Exact start position the curve must begin at
    pub real_start: WorldPoint,
    /// Goal cell (clamped to free space)
    pub goal: GridCoord,
    /// Exact goal position the curve must end at
    pub real_goal: WorldPoint,
    /// Effective obstacle set
    pub obstacles: Arc<ObstacleMap>,
}

/// Request plus its dirty flags, guarded together by the request lock.
#[derive(Debug)]
pub struct RequestState {
    pub request: PlanningRequest,
    pub flags: RequestFlags,
}

impl RequestState {
    pub fn new(request: PlanningRequest, flags: RequestFlags) -> Self {
        Self { request, flags }
    }

    /// Snapshot the request and clear the flags this iteration will service.
    ///
    /// `reset` is always consumed. `minor` is consumed when set; otherwise
    /// `major` is consumed once the pass about to run brings ε down to 1.0.
    /// `epsilon` is the value the search will hold when the pass starts.
    pub fn take(&mut self, epsilon: f64, epsilon_step: f64) -> (PlanningRequest, RequestFlags) {
        let flags = self.flags;

        if flags.reset {
            self.flags.reset = false;
        }
        if flags.minor {
            self.flags.minor = false;
        } else if flags.major && epsilon - epsilon_step <= 1.0 {
            self.flags.major = false;
        }

        (self.request.clone(), flags)
    }
}

/// One published planning result.
#[derive(Clone, Debug)]
pub struct PublishedPath {
    /// Raw cell path (checked against the next obstacle update)
    pub raw: Vec<GridCoord>,
    /// Bezier chain in world coordinates
    pub control_points: Vec<WorldPoint>,
    /// Sampled curve in world coordinates
    pub points: Vec<WorldPoint>,
    /// g(start) when the path was extracted
    pub solution_cost: f64,
    /// ε of the pass that produced the path
    pub epsilon: f64,
    /// Publish counter, 0 before the first publish
    pub sequence: u64,
}

impl PublishedPath {
    /// Placeholder before anything is published.
    pub fn empty() -> Self {
        Self {
            raw: Vec::new(),
            control_points: Vec::new(),
            points: Vec::new(),
            solution_cost: f64::INFINITY,
            epsilon: 0.0,
            sequence: 0,
        }
    }
}

/// Published result slot with an edge-triggered "new" flag.
#[derive(Debug)]
pub struct PathSlot {
    current: RwLock<Arc<PublishedPath>>,
    new_available: AtomicBool,
}

impl Default for PathSlot {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(PublishedPath::empty())),
            new_available: AtomicBool::new(false),
        }
    }
}

impl PathSlot {
    /// Replace the result and raise the "new" edge.
    pub fn publish(&self, path: PublishedPath) {
        *self.current.write() = Arc::new(path);
        self.new_available.store(true, Ordering::Release);
    }

    /// Latest published result.
    pub fn latest(&self) -> Arc<PublishedPath> {
        Arc::clone(&self.current.read())
    }

    /// Read and clear the "new" edge.
    pub fn take_new(&self) -> bool {
        self.new_available.swap(false, Ordering::AcqRel)
    }

    pub fn clear_new(&self) {
        self.new_available.store(false, Ordering::Release);
    }
}

/// Lock-free worker counters.
#[derive(Debug)]
pub struct PlannerStats {
    pub iterations: AtomicU64,
    pub idle_iterations: AtomicU64,
    pub resets: AtomicU64,
    pub minor_passes: AtomicU64,
    pub refinements: AtomicU64,
    pub extractions: AtomicU64,
    pub faults: AtomicU64,
    pub expansions: AtomicU64,
    pub epsilon: AtomicF64,
    /// Idle iterations since the last one that did work
    pub consecutive_idle: AtomicU32,
}

impl PlannerStats {
    pub fn new(epsilon: f64) -> Self {
        Self {
            iterations: AtomicU64::new(0),
            idle_iterations: AtomicU64::new(0),
            resets: AtomicU64::new(0),
            minor_passes: AtomicU64::new(0),
            refinements: AtomicU64::new(0),
            extractions: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            expansions: AtomicU64::new(0),
            epsilon: AtomicF64::new(epsilon),
            consecutive_idle: AtomicU32::new(0),
        }
    }

    /// Copy every counter. `pending` is filled in by the caller.
    pub fn snapshot(&self, pending: RequestFlags) -> PlannerStatus {
        PlannerStatus {
            iterations: self.iterations.load(Ordering::Relaxed),
            idle_iterations: self.idle_iterations.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            minor_passes: self.minor_passes.load(Ordering::Relaxed),
            refinements: self.refinements.load(Ordering::Relaxed),
            extractions: self.extractions.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            expansions: self.expansions.load(Ordering::Relaxed),
            epsilon: self.epsilon.load(Ordering::Relaxed),
            pending,
        }
    }
}

/// Point-in-time view of the worker counters.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct PlannerStatus {
    pub iterations: u64,
    pub idle_iterations: u64,
    pub resets: u64,
    pub minor_passes: u64,
    pub refinements: u64,
    pub extractions: u64,
    pub faults: u64,
    pub expansions: u64,
    pub epsilon: f64,
    pub pending: RequestFlags,
}

/// Everything the caller and the worker share.
#[derive(Debug)]
pub struct PlannerShared {
    pub request: Mutex<RequestState>,
    pub path: PathSlot,
    pub stats: PlannerStats,
}

impl PlannerShared {
    pub fn new(request: PlanningRequest, flags: RequestFlags, epsilon: f64) -> Self {
        Self {
            request: Mutex::new(RequestState::new(request, flags)),
            path: PathSlot::default(),
            stats: PlannerStats::new(epsilon),
        }
    }
}

/// Thread-safe handle to shared planner state.
pub type PlannerSharedHandle = Arc<PlannerShared>;
