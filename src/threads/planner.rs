//! Planning thread: the background search loop.
//!
//! Each iteration:
//! - Snapshots the request and clears the flags it is about to service
//! - Resets the search if asked to
//! - Runs a minor pass, or else one ε refinement, then extracts and publishes
//! - Sleeps for the poll interval when there was nothing to do
//!
//! The sleep wakes early when a setter sends on the wake channel. A failed
//! or panicking iteration is logged, counted, and turned into a forced reset;
//! the loop itself keeps running until shutdown.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::config::MargaConfig;
use crate::error::{MargaError, Result};
use crate::grid::GridGeometry;
use crate::planning::{AdStarConfig, AdStarPlanner, PassStats, PathSmoother, SmootherConfig};
use crate::shared::{PlannerSharedHandle, PlanningRequest, PublishedPath, RequestFlags};

/// Configuration for the planning thread.
#[derive(Clone, Debug)]
pub struct PlanningThreadConfig {
    pub planner: AdStarConfig,
    pub smoother: SmootherConfig,
    /// Idle sleep between request checks
    pub poll_interval: Duration,
}

impl Default for PlanningThreadConfig {
    fn default() -> Self {
        Self::from(&MargaConfig::default())
    }
}

impl From<&MargaConfig> for PlanningThreadConfig {
    fn from(config: &MargaConfig) -> Self {
        Self {
            planner: AdStarConfig::from(&config.planner),
            smoother: SmootherConfig::from(&config.smoothing),
            poll_interval: config.planner.poll_interval(),
        }
    }
}

/// Planning thread handle. Stops and joins the worker on drop.
pub struct PlanningThread {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    wake: Sender<()>,
}

impl PlanningThread {
    /// Spawn the planning thread.
    pub fn spawn(
        config: PlanningThreadConfig,
        geometry: GridGeometry,
        shared: PlannerSharedHandle,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);

        let worker = PlanningWorker::new(&config, geometry, shared);
        let poll_interval = config.poll_interval;
        let worker_running = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("marga-planner".into())
            .spawn(move || run(worker, worker_running, wake_rx, poll_interval))
            .expect("Failed to spawn planning thread");

        Self {
            handle: Some(handle),
            running,
            wake: wake_tx,
        }
    }

    /// Cut the current idle sleep short.
    pub fn wake(&self) {
        // A pending wake already covers this one.
        let _ = self.wake.try_send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the loop and join the thread.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        self.wake();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("Planning thread panicked outside the iteration guard");
        }
    }
}

impl Drop for PlanningThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    mut worker: PlanningWorker,
    running: Arc<AtomicBool>,
    wake: Receiver<()>,
    poll_interval: Duration,
) {
    tracing::info!("Planning thread started (poll {:?})", poll_interval);
    let shared = Arc::clone(&worker.shared);
    let stats = &shared.stats;

    while running.load(Ordering::Acquire) {
        stats.iterations.fetch_add(1, Ordering::Relaxed);

        match panic::catch_unwind(AssertUnwindSafe(|| worker.iterate())) {
            Ok(Ok(true)) => {
                stats.consecutive_idle.store(0, Ordering::Release);
            }
            Ok(Ok(false)) => {
                stats.idle_iterations.fetch_add(1, Ordering::Relaxed);
                stats.consecutive_idle.fetch_add(1, Ordering::AcqRel);
                let _ = wake.recv_timeout(poll_interval);
            }
            Ok(Err(e)) => {
                tracing::error!("Planning iteration failed: {}; forcing reset", e);
                worker.recover();
                let _ = wake.recv_timeout(poll_interval);
            }
            Err(_) => {
                tracing::error!("Planning iteration panicked; forcing reset");
                worker.recover();
                let _ = wake.recv_timeout(poll_interval);
            }
        }
    }

    tracing::info!("Planning thread stopped");
}

/// Search state and extraction, owned exclusively by the planning thread.
struct PlanningWorker {
    planner: AdStarPlanner,
    smoother: PathSmoother,
    shared: PlannerSharedHandle,
    sequence: u64,
}

impl PlanningWorker {
    fn new(
        config: &PlanningThreadConfig,
        geometry: GridGeometry,
        shared: PlannerSharedHandle,
    ) -> Self {
        Self {
            planner: AdStarPlanner::new(config.planner.clone(), geometry),
            smoother: PathSmoother::new(config.smoother.clone()),
            shared,
            sequence: 0,
        }
    }

    /// One unit of work. Returns `false` when nothing was requested.
    fn iterate(&mut self) -> Result<bool> {
        let (request, flags) = {
            let mut state = self.shared.request.lock();
            let epsilon = if state.flags.reset {
                self.planner.config().initial_epsilon
            } else {
                self.planner.epsilon()
            };
            let taken = state.take(epsilon, self.planner.config().epsilon_step);
            if taken.1.any() {
                self.shared.stats.consecutive_idle.store(0, Ordering::Release);
            }
            taken
        };

        if !flags.any() {
            return Ok(false);
        }

        if flags.reset {
            self.planner.reset(request.start, request.goal)?;
            self.shared.stats.resets.fetch_add(1, Ordering::Relaxed);
        }

        if flags.minor {
            let pass = self.planner.improve(request.start, &request.obstacles)?;
            self.record_pass(&pass);
            self.shared.stats.minor_passes.fetch_add(1, Ordering::Relaxed);
            self.publish(&request)?;
        } else if flags.major
            && let Some(pass) = self.planner.refine(request.start, &request.obstacles)?
        {
            self.record_pass(&pass);
            self.shared.stats.refinements.fetch_add(1, Ordering::Relaxed);
            self.publish(&request)?;
        }

        self.shared
            .stats
            .epsilon
            .store(self.planner.epsilon(), Ordering::Relaxed);
        Ok(true)
    }

    fn record_pass(&self, pass: &PassStats) {
        self.shared
            .stats
            .expansions
            .fetch_add(pass.expansions as u64, Ordering::Relaxed);
    }

    /// Extract, smooth, and swap in a new published path.
    fn publish(&mut self, request: &PlanningRequest) -> Result<()> {
        let smoothed = self.smoother.smooth(
            &self.planner,
            &request.obstacles,
            request.real_start,
            request.real_goal,
        );

        if let Some(bad) = smoothed.points.iter().find(|p| !p.is_finite()) {
            return Err(MargaError::Search(format!(
                "non-finite path point {:?}",
                bad
            )));
        }

        self.sequence += 1;
        let path = PublishedPath {
            raw: smoothed.raw,
            control_points: smoothed.control_points,
            points: smoothed.points,
            solution_cost: self.planner.solution_cost(),
            epsilon: self.planner.epsilon(),
            sequence: self.sequence,
        };

        tracing::debug!(
            "Published path #{}: {} cells, {} control points, {} samples, eps {:.2}, cost {:.3}",
            path.sequence,
            path.raw.len(),
            path.control_points.len(),
            path.points.len(),
            path.epsilon,
            path.solution_cost
        );

        self.shared.path.publish(path);
        self.shared.stats.extractions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Request a full rebuild on the next iteration.
    fn recover(&mut self) {
        self.shared.stats.faults.fetch_add(1, Ordering::Relaxed);
        self.shared.stats.consecutive_idle.store(0, Ordering::Release);
        self.shared.request.lock().flags = RequestFlags::ALL;
    }
}
