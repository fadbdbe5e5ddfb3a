//! Structured solve traces.
//!
//! A trace records what the statement solver did for one instantiation:
//! seeding, layer scheduling, fixpoint passes, and the tuples each relation
//! gained. Recording is opt-in through [`SolverConfig::trace`]; when off,
//! nothing is allocated.
//!
//! [`SolverConfig::trace`]: crate::SolverConfig::trace

use std::collections::BTreeMap;

use serde::Serialize;

use crate::SolverConfig;

/// One step of a solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolveStep {
    pub step: usize,
    pub action: SolveAction,
    pub relation: String,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveAction {
    /// A built-in relation was seeded from program facts.
    Seed,
    /// A dependency layer was scheduled.
    Layer,
    /// One pass over a fixpoint group finished.
    FixpointPass,
    /// A relation gained a tuple.
    TupleAdded,
    /// A singleton was resolved to its unique tuple.
    SingletonResolved,
    /// A local statement synthesized an entity.
    Generated,
    /// A guard clause did not hold.
    GuardFailed,
}

impl SolveAction {
    fn is_tuple_level(self) -> bool {
        matches!(self, SolveAction::TupleAdded | SolveAction::Generated)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SolveTrace {
    enabled: bool,
    limit: usize,
    steps: Vec<SolveStep>,
    per_relation: BTreeMap<String, usize>,
}

impl SolveTrace {
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            enabled: config.trace,
            limit: config.trace_limit,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a step. Tuple-level steps stop after `trace_limit` per relation.
    pub fn record(&mut self, action: SolveAction, relation: &str, detail: impl FnOnce() -> String) {
        if !self.enabled {
            return;
        }
        if action.is_tuple_level() {
            let seen = self.per_relation.entry(relation.to_string()).or_default();
            if *seen >= self.limit {
                return;
            }
            *seen += 1;
        }
        self.steps.push(SolveStep {
            step: self.steps.len(),
            action,
            relation: relation.to_string(),
            detail: detail(),
        });
    }

    pub fn steps(&self) -> &[SolveStep] {
        &self.steps
    }

    pub fn count(&self, action: SolveAction, relation: &str) -> usize {
        self.steps
            .iter()
            .filter(|step| step.action == action && step.relation == relation)
            .count()
    }
}
