//! Per-episode search state for the incremental planner.
//!
//! `g` and `rhs` are dense tables indexed through [`GridGeometry`]. The open
//! list is a binary heap with lazy deletion: a membership map holds the live
//! key of every open cell, and heap entries whose key no longer matches are
//! skipped when they surface.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::core::GridCoord;
use crate::error::{MargaError, Result};
use crate::grid::GridGeometry;

/// Two-part priority: (min(g, rhs) + inflated heuristic, min(g, rhs)).
#[derive(Clone, Copy, Debug)]
pub struct SearchKey {
    pub primary: f64,
    pub secondary: f64,
}

impl SearchKey {
    pub fn new(primary: f64, secondary: f64) -> Self {
        Self { primary, secondary }
    }

    /// Key that sorts after every finite key.
    pub const INFINITE: SearchKey = SearchKey {
        primary: f64::INFINITY,
        secondary: f64::INFINITY,
    };

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.primary.is_finite() && self.secondary.is_finite()
    }
}

impl PartialEq for SearchKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchKey {}

impl Ord for SearchKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.primary
            .total_cmp(&other.primary)
            .then_with(|| self.secondary.total_cmp(&other.secondary))
    }
}

impl PartialOrd for SearchKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Heap entry. Ties on key are broken by cell so pops are deterministic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OpenEntry {
    key: SearchKey,
    cell: GridCoord,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (lower key = higher priority)
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority frontier of locally inconsistent cells.
#[derive(Clone, Debug, Default)]
pub struct OpenList {
    heap: BinaryHeap<OpenEntry>,
    members: HashMap<GridCoord, SearchKey>,
}

impl OpenList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cell or replace its key.
    pub fn insert(&mut self, cell: GridCoord, key: SearchKey) {
        self.members.insert(cell, key);
        self.heap.push(OpenEntry { key, cell });
    }

    /// Remove a cell. Returns `true` if it was open.
    pub fn remove(&mut self, cell: GridCoord) -> bool {
        self.members.remove(&cell).is_some()
    }

    #[inline]
    pub fn contains(&self, cell: GridCoord) -> bool {
        self.members.contains_key(&cell)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.members.clear();
    }

    /// Live cells in no particular order.
    pub fn cells(&self) -> impl Iterator<Item = GridCoord> + '_ {
        self.members.keys().copied()
    }

    /// Minimum-key live entry without removing it.
    pub fn peek(&mut self) -> Option<(GridCoord, SearchKey)> {
        self.discard_stale();
        self.heap.peek().map(|entry| (entry.cell, entry.key))
    }

    /// Remove and return the minimum-key live entry.
    pub fn pop(&mut self) -> Option<(GridCoord, SearchKey)> {
        self.discard_stale();
        let entry = self.heap.pop()?;
        self.members.remove(&entry.cell);
        Some((entry.cell, entry.key))
    }

    /// Recompute every live key and rebuild the heap.
    pub fn rekey(&mut self, mut key_of: impl FnMut(GridCoord) -> SearchKey) {
        for (cell, key) in self.members.iter_mut() {
            *key = key_of(*cell);
        }
        self.heap = self
            .members
            .iter()
            .map(|(&cell, &key)| OpenEntry { key, cell })
            .collect();
    }

    fn discard_stale(&mut self) {
        while let Some(top) = self.heap.peek() {
            let live = self
                .members
                .get(&top.cell)
                .is_some_and(|key| *key == top.key);
            if live {
                return;
            }
            self.heap.pop();
        }
    }
}

#[inline]
fn compute_key(g: f64, rhs: f64, heuristic: f64, epsilon: f64) -> SearchKey {
    if g > rhs {
        SearchKey::new(rhs + epsilon * heuristic, rhs)
    } else {
        SearchKey::new(g + heuristic, g)
    }
}

/// Search tables for one episode (rebuilt on every reset).
#[derive(Clone, Debug)]
pub struct SearchState {
    geometry: GridGeometry,
    g: Vec<f64>,
    rhs: Vec<f64>,
    /// Inconsistent cells awaiting expansion
    pub open: OpenList,
    /// Cells made inconsistent after being expanded in this pass
    incons: HashSet<GridCoord>,
    closed: Vec<bool>,
    epsilon: f64,
}

impl SearchState {
    /// Create tables for the given grid, every value infinite.
    pub fn new(geometry: GridGeometry, epsilon: f64) -> Self {
        let cells = geometry.cell_count();
        Self {
            geometry,
            g: vec![f64::INFINITY; cells],
            rhs: vec![f64::INFINITY; cells],
            open: OpenList::new(),
            incons: HashSet::new(),
            closed: vec![false; cells],
            epsilon,
        }
    }

    /// Clear everything and restore the starting inflation factor.
    pub fn reset(&mut self, epsilon: f64) {
        self.g.fill(f64::INFINITY);
        self.rhs.fill(f64::INFINITY);
        self.open.clear();
        self.incons.clear();
        self.closed.fill(false);
        self.epsilon = epsilon;
    }

    #[inline]
    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    #[inline]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    #[inline]
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }

    /// Cost-to-goal estimate. Infinite outside the grid.
    #[inline]
    pub fn g(&self, cell: GridCoord) -> f64 {
        self.geometry
            .index(cell)
            .map_or(f64::INFINITY, |i| self.g[i])
    }

    /// One-step lookahead estimate. Infinite outside the grid.
    #[inline]
    pub fn rhs(&self, cell: GridCoord) -> f64 {
        self.geometry
            .index(cell)
            .map_or(f64::INFINITY, |i| self.rhs[i])
    }

    pub fn set_g(&mut self, cell: GridCoord, value: f64) -> Result<()> {
        let i = self.index_of(cell)?;
        self.g[i] = value;
        Ok(())
    }

    pub fn set_rhs(&mut self, cell: GridCoord, value: f64) -> Result<()> {
        let i = self.index_of(cell)?;
        self.rhs[i] = value;
        Ok(())
    }

    /// Priority of a cell relative to the current start.
    ///
    /// Over-consistent cells (`g > rhs`) get the inflated heuristic; all
    /// others use the plain one.
    pub fn key(&self, cell: GridCoord, start: GridCoord) -> SearchKey {
        compute_key(
            self.g(cell),
            self.rhs(cell),
            start.euclidean_distance(&cell),
            self.epsilon,
        )
    }

    /// Recompute every open key against `start` and the current epsilon.
    pub fn rekey_open(&mut self, start: GridCoord) {
        let geometry = self.geometry;
        let epsilon = self.epsilon;
        let g = &self.g;
        let rhs = &self.rhs;
        self.open.rekey(|cell| {
            let (g, rhs) = geometry
                .index(cell)
                .map_or((f64::INFINITY, f64::INFINITY), |i| (g[i], rhs[i]));
            compute_key(g, rhs, start.euclidean_distance(&cell), epsilon)
        });
    }

    /// `g == rhs`
    #[inline]
    pub fn is_consistent(&self, cell: GridCoord) -> bool {
        self.g(cell) == self.rhs(cell)
    }

    #[inline]
    pub fn is_closed(&self, cell: GridCoord) -> bool {
        self.geometry.index(cell).is_some_and(|i| self.closed[i])
    }

    pub fn close(&mut self, cell: GridCoord) -> Result<()> {
        let i = self.index_of(cell)?;
        self.closed[i] = true;
        Ok(())
    }

    pub fn clear_closed(&mut self) {
        self.closed.fill(false);
    }

    /// Defer a cell until the next pass.
    pub fn defer(&mut self, cell: GridCoord) {
        self.incons.insert(cell);
    }

    #[inline]
    pub fn incons_len(&self) -> usize {
        self.incons.len()
    }

    /// Move every deferred cell that is still inconsistent back into the
    /// open list.
    ///
    /// Keys are placeholders; callers rekey the whole list afterwards.
    pub fn merge_incons(&mut self) {
        for cell in std::mem::take(&mut self.incons) {
            if !self.is_consistent(cell) {
                self.open.insert(cell, SearchKey::INFINITE);
            }
        }
    }

    fn index_of(&self, cell: GridCoord) -> Result<usize> {
        self.geometry
            .index(cell)
            .ok_or(MargaError::OutOfBounds(cell))
    }
}
