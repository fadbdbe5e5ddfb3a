use serde::Deserialize;

/// Limits and observability switches for one instantiation's solve.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Upper bound on passes of one fixpoint group. Relation extents only
    /// grow over a finite universe, so this guards engine bugs, not rules.
    pub max_fixpoint_passes: usize,
    /// Record a structured [`SolveTrace`](crate::SolveTrace).
    pub trace: bool,
    /// Tuple-level trace steps kept per relation.
    pub trace_limit: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_fixpoint_passes: 1_000_000,
            trace: false,
            trace_limit: 8,
        }
    }
}
