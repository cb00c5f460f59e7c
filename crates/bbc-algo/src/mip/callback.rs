//! Thread-aware generic callback contract of the branch-and-cut driver.
//!
//! ```text
//!   solve()
//!     ├─ thread_up(k)  ──►  Worker            (once per search thread)
//!     │    ├─ relaxation(ctx, &mut Worker)  ── fractional node, user cuts
//!     │    └─ candidate(ctx, &mut Worker)   ── integral point, lazy cuts
//!     └─ thread_down(Worker)                (on scope exit, also on error)
//! ```
//!
//! A worker is owned by exactly one search thread, so callbacks never need to
//! lock their per-thread state. Shared state lives in the callback itself,
//! which must be `Sync`.

use thiserror::Error;

use super::model::Row;

/// Which hook a context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Relaxation,
    Candidate,
}

/// Read-only view of the point being separated.
#[derive(Debug, Clone, Copy)]
pub struct CallbackContext<'a> {
    pub(crate) kind: ContextKind,
    pub(crate) values: &'a [f64],
    pub(crate) objective: f64,
    pub(crate) candidate_point: bool,
    pub(crate) thread: usize,
    pub(crate) depth: usize,
}

impl<'a> CallbackContext<'a> {
    /// Context for an integral point outside of a search, e.g. a MIP start.
    pub fn candidate_at(values: &'a [f64], objective: f64) -> Self {
        Self {
            kind: ContextKind::Candidate,
            values,
            objective,
            candidate_point: true,
            thread: 0,
            depth: 0,
        }
    }

    pub fn relaxation_at(values: &'a [f64], objective: f64) -> Self {
        Self {
            kind: ContextKind::Relaxation,
            ..Self::candidate_at(values, objective)
        }
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    /// False when the node LP was unbounded and no point exists.
    pub fn is_candidate_point(&self) -> bool {
        self.candidate_point
    }

    /// Column values at the point, empty for an unbounded ray.
    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    pub fn value(&self, column: usize) -> f64 {
        self.values[column]
    }

    /// Objective of the master at the point.
    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn thread(&self) -> usize {
        self.thread
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Cuts returned by a callback invocation.
///
/// Setting `reject` on a candidate is the equivalent of rejecting it: the
/// driver adds `cuts` and re-solves the node instead of accepting the point.
#[derive(Debug, Clone, Default)]
pub struct CutBatch {
    pub cuts: Vec<Row>,
    pub reject: bool,
}

impl CutBatch {
    pub fn accept() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty() && !self.reject
    }
}

#[derive(Debug, Error)]
pub enum CallbackError {
    /// A worker LP did not reach optimality
    #[error("worker LP for customer {customer}, draw {draw} failed: {reason}")]
    WorkerLp {
        customer: usize,
        draw: usize,
        reason: String,
    },

    /// The candidate stems from an unbounded ray
    #[error("candidate is an unbounded ray, separation is only defined for bounded points")]
    UnboundedCandidate,

    #[error("{0}")]
    Failed(String),
}

/// Hooks invoked by [`crate::mip::BranchAndCut`].
pub trait GenericCallback: Sync {
    /// Per-thread state, created by `thread_up` and released by `thread_down`
    type Worker: Send;

    fn thread_up(&self, index: usize) -> Result<Self::Worker, CallbackError>;

    fn thread_down(&self, _worker: Self::Worker) {}

    /// Whether `relaxation` should be called at fractional nodes.
    fn separates_relaxations(&self) -> bool {
        false
    }

    fn relaxation(
        &self,
        _ctx: &CallbackContext<'_>,
        _worker: &mut Self::Worker,
    ) -> Result<CutBatch, CallbackError> {
        Ok(CutBatch::accept())
    }

    fn candidate(
        &self,
        ctx: &CallbackContext<'_>,
        worker: &mut Self::Worker,
    ) -> Result<CutBatch, CallbackError>;
}

/// Callback that accepts every candidate, turning the driver into a plain
/// LP-based branch and bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallback;

impl GenericCallback for NoCallback {
    type Worker = ();

    fn thread_up(&self, _index: usize) -> Result<(), CallbackError> {
        Ok(())
    }

    fn candidate(&self, ctx: &CallbackContext<'_>, _worker: &mut ()) -> Result<CutBatch, CallbackError> {
        if !ctx.is_candidate_point() {
            return Err(CallbackError::UnboundedCandidate);
        }
        Ok(CutBatch::accept())
    }
}

/// Scoped worker ownership: `thread_down` runs when the guard drops.
pub(crate) struct WorkerGuard<'c, C: GenericCallback> {
    callback: &'c C,
    worker: Option<C::Worker>,
}

impl<'c, C: GenericCallback> WorkerGuard<'c, C> {
    pub(crate) fn up(callback: &'c C, index: usize) -> Result<Self, CallbackError> {
        let worker = callback.thread_up(index)?;
        Ok(Self {
            callback,
            worker: Some(worker),
        })
    }

    pub(crate) fn get(&mut self) -> &mut C::Worker {
        // only `drop` takes the worker out
        self.worker
            .as_mut()
            .unwrap_or_else(|| unreachable!("worker released before guard drop"))
    }
}

impl<C: GenericCallback> Drop for WorkerGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.callback.thread_down(worker);
        }
    }
}
