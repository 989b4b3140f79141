//! Engine run metrics.
//!
//! Every analysis collects a small set of timings and counters so hosts can
//! see where time went and spot grammars that make the search explode.
//!
//! - `RunMetrics` covers one analysis end to end.
//! - `PassMetrics` covers the segmentation pass and each saturation pass.
//!
//! Counters are cheap increments; nothing here allocates per node.

use crate::api::{ParseTree, SearchChart};
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time of the analysis.
    pub total: Duration,
    /// Allomorph rules over the reachable positions.
    pub segmentation: PassMetrics,
    pub saturation: SaturationMetrics,
    /// Time spent building result trees (and the chart, when retained).
    pub resolve: Duration,
    /// Budget steps consumed.
    pub steps: u64,
}

/// Timings for the saturation phase.
#[derive(Debug, Default, Clone)]
pub struct SaturationMetrics {
    pub total: Duration,
    /// One entry per pass; the last one produced nothing.
    pub iterations: Vec<PassMetrics>,
}

/// Timing and counts for a single pass.
#[derive(Debug, Default, Clone)]
pub struct PassMetrics {
    pub duration: Duration,
    /// New nodes added to the stash.
    pub produced: usize,
    /// Rule applications attempted (allomorph rules at a position, or
    /// combination rules over a route).
    pub attempts: usize,
    /// Combination attempts whose unification failed.
    pub rejected: usize,
    /// Combination routes skipped because they were attempted before.
    pub skipped: usize,
}

/// Analyzer output bundled with timing information.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Accepting nodes as trees, in discovery order.
    pub trees: Vec<ParseTree>,
    /// Full chart, when it was asked for.
    pub chart: Option<SearchChart>,
    pub metrics: RunMetrics,
}
