//! Statement solving for option instantiations.
//!
//! An [`OptionMatchTable`] is built for one option of a rule module together
//! with its constructor arguments. Solving it runs every realization
//! statement of the option's interface and of the option itself, in
//! dependency order:
//!
//! - singleton statements are evaluated once and must match exactly once,
//! - local statements are evaluated once and synthesize program entities,
//! - plain statements are grouped with the traits they recurse through and
//!   re-run until no relation gains a tuple.
//!
//! Any dependency cycle is rejected before a single statement runs. Guard
//! clauses are checked after solving and report every violation at once.

mod config;
mod eval;
mod facts;
mod goal;
mod graph;
mod guard;
mod solver;
mod statement;
mod store;
mod table;
mod trace;

pub use config::SolverConfig;
pub use eval::Evaluator;
pub use facts::{
    BuiltinRelation, CALL_TARGET, COPIED_TO, DECLARED_BY, DECLARES_FIELD, DECLARES_METHOD,
    HAS_ANNOTATION, INVOKES, ProgramFacts, ProgramIndex, SUPERCLASS_OF,
};
pub use goal::{Goal, GoalCompiler, GoalTerm, Scope};
pub use graph::{DependencyGraph, Group, GroupKind};
pub use statement::{DependencyContext, Level, RealizationStatement};
pub use store::{FactStore, TraitValue};
pub use table::{ConstructorArg, GeneratedEntity, NoRelations, OptionMatchTable, RelationResolver};
pub use trace::{SolveAction, SolveStep, SolveTrace};

#[cfg(test)]
mod fixtures;
