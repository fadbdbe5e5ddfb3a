//! Rule-driven pattern matching and code generation over program facts.
//!
//! A [`Session`] pairs a rule module with an analyzed program. Each option of
//! the module is instantiated into an [`OptionMatchTable`], solved to a
//! fixpoint, and may then feed its relations to later instantiations.

mod session;

pub use session::Session;

pub use tenet_ast as ast;
pub use tenet_diag as diag;
pub use tenet_diag::{Diagnostic, DiagnosticError, EngineError, InternalError};
pub use tenet_solve::{
    CALL_TARGET, COPIED_TO, ConstructorArg, DECLARED_BY, DECLARES_FIELD, DECLARES_METHOD,
    GeneratedEntity, HAS_ANNOTATION, INVOKES, OptionMatchTable, ProgramFacts, ProgramIndex,
    RelationResolver, SUPERCLASS_OF, SolveAction, SolveStep, SolveTrace, SolverConfig, TraitValue,
};
pub use tenet_types::{BindingMap, BindingsSet, EntityTuple, EntityType, TraitSignature};

#[cfg(test)]
mod prop_tests;
