//! Error reporting and diagnostics for tenet.
//!
//! This crate provides structured diagnostics with source location tracking,
//! and the split between the two error classes the engine produces:
//!
//! - user errors ([`Diagnostic`], wrapped in [`DiagnosticError`]) carry a
//!   location and a formatted message and are shown to the rule author;
//! - internal errors ([`InternalError`]) signal a gap in the engine itself
//!   and are never caused by rule input.
//!
//! Diagnostics are created by other crates (for example `tenet-match` and
//! `tenet-solve`) and rendered here for display.

use std::fmt;

// ---------------------------------------------------------------------------
// Diagnostic severity and categories
// ---------------------------------------------------------------------------

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Broad category for diagnostics. Used for filtering and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// A referenced variable, trait, or option is undefined.
    UndefinedName,
    /// A constructor argument or variable could not be resolved to an entity.
    UnresolvedBinding,
    /// A textual argument resolves to more than one entity.
    AmbiguousBinding,
    /// A singleton trait matched zero or several tuples.
    SingletonCardinality,
    /// Statements depend on each other through a non-monotonic construct.
    DependencyCycle,
    /// A `requires` guard evaluated to false.
    ConstraintViolation,
    /// Two declarations share a name in one scope.
    NameClash,
    /// No option with the requested name exists.
    MissingConstructor,
    /// Argument count does not match a parameter list.
    ArityMismatch,
    /// An entity is not of the expected category or program type.
    TypeMismatch,
    /// The wildcard variable was used where a value is required.
    InvalidWildcard,
    /// A pattern uses a shape the fragment compiler does not support.
    UnsupportedPattern,
    /// An abstract trait was never realized by the option.
    NotRealized,
    /// A statement is malformed (realized set, level, or kind).
    InvalidStatement,
}

impl Category {
    pub const ALL: [Category; 14] = [
        Category::UndefinedName,
        Category::UnresolvedBinding,
        Category::AmbiguousBinding,
        Category::SingletonCardinality,
        Category::DependencyCycle,
        Category::ConstraintViolation,
        Category::NameClash,
        Category::MissingConstructor,
        Category::ArityMismatch,
        Category::TypeMismatch,
        Category::InvalidWildcard,
        Category::UnsupportedPattern,
        Category::NotRealized,
        Category::InvalidStatement,
    ];

    pub fn all() -> &'static [Category] {
        &Self::ALL
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::UndefinedName => "undefined_name",
            Category::UnresolvedBinding => "unresolved_binding",
            Category::AmbiguousBinding => "ambiguous_binding",
            Category::SingletonCardinality => "singleton_cardinality",
            Category::DependencyCycle => "dependency_cycle",
            Category::ConstraintViolation => "constraint_violation",
            Category::NameClash => "name_clash",
            Category::MissingConstructor => "missing_constructor",
            Category::ArityMismatch => "arity_mismatch",
            Category::TypeMismatch => "type_mismatch",
            Category::InvalidWildcard => "invalid_wildcard",
            Category::UnsupportedPattern => "unsupported_pattern",
            Category::NotRealized => "not_realized",
            Category::InvalidStatement => "invalid_statement",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::UndefinedName => "E0101",
            Category::UnresolvedBinding => "E0102",
            Category::AmbiguousBinding => "E0103",
            Category::SingletonCardinality => "E0104",
            Category::DependencyCycle => "E0105",
            Category::ConstraintViolation => "E0106",
            Category::NameClash => "E0107",
            Category::MissingConstructor => "E0108",
            Category::ArityMismatch => "E0109",
            Category::TypeMismatch => "E0110",
            Category::InvalidWildcard => "E0111",
            Category::UnsupportedPattern => "E0112",
            Category::NotRealized => "E0113",
            Category::InvalidStatement => "E0114",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::UndefinedName => "A referenced variable, trait, or option is undefined.",
            Category::UnresolvedBinding => "An argument or variable does not resolve to an entity.",
            Category::AmbiguousBinding => "An argument resolves to more than one entity.",
            Category::SingletonCardinality => {
                "A singleton trait must be satisfied by exactly one tuple."
            }
            Category::DependencyCycle => {
                "Rules depend on each other through negation, forall, or equivalence."
            }
            Category::ConstraintViolation => "A `requires` clause does not hold.",
            Category::NameClash => "Two declarations in one scope share a name.",
            Category::MissingConstructor => "No option with the requested name exists.",
            Category::ArityMismatch => "An argument list does not match the declared parameters.",
            Category::TypeMismatch => "An entity does not have the expected category or type.",
            Category::InvalidWildcard => "The wildcard `_` cannot be used in this position.",
            Category::UnsupportedPattern => "The pattern shape is not supported by the matcher.",
            Category::NotRealized => "An abstract trait of the interface has no realization.",
            Category::InvalidStatement => "A realize or define statement is malformed.",
        }
    }

    pub fn example_fix(self) -> &'static str {
        match self {
            Category::UndefinedName => "Declare the name or fix the spelling.",
            Category::UnresolvedBinding => "Pass an argument that names an existing program entity.",
            Category::AmbiguousBinding => "Qualify the argument, e.g. `Type.field`.",
            Category::SingletonCardinality => {
                "Tighten or loosen the pattern so exactly one match remains."
            }
            Category::DependencyCycle => {
                "Break the cycle or move the negated part into its own trait."
            }
            Category::ConstraintViolation => "Change the program or relax the constraint.",
            Category::NameClash => "Rename one of the clashing declarations.",
            Category::MissingConstructor => "Use the name of a declared option.",
            Category::ArityMismatch => "Pass one argument per declared parameter.",
            Category::TypeMismatch => "Pass an entity of the declared category.",
            Category::InvalidWildcard => "Replace `_` with a named variable.",
            Category::UnsupportedPattern => "Use at most one free variable in a modifier list.",
            Category::NotRealized => "Add a `realize` statement for the trait.",
            Category::InvalidStatement => "Split the statement or fix its realized traits.",
        }
    }
}

// ---------------------------------------------------------------------------
// Source locations (independent of tenet-ast's Span)
// ---------------------------------------------------------------------------

/// A source location for diagnostics.
///
/// Uses byte offsets. Callers convert from `tenet-ast` spans to this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file_id: u32,
    pub start: u32,
    pub end: u32,
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Stable diagnostic code (e.g. E0104).
    pub code: Option<String>,
    pub severity: Severity,
    pub category: Category,
    /// Primary message: what went wrong.
    pub message: String,
    /// Where it went wrong.
    pub location: Option<SourceLocation>,
    /// Additional labeled spans (e.g., "statement declared here").
    pub labels: Vec<DiagLabel>,
    /// Suggested fix, if any.
    pub help: Option<String>,
}

/// A labeled source span within a diagnostic.
#[derive(Debug, Clone)]
pub struct DiagLabel {
    pub location: SourceLocation,
    pub message: String,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Error,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Warning,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Attach a location only when one is known.
    pub fn at_opt(mut self, location: Option<SourceLocation>) -> Self {
        if location.is_some() {
            self.location = location;
        }
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_label(mut self, location: SourceLocation, message: impl Into<String>) -> Self {
        self.labels.push(DiagLabel {
            location,
            message: message.into(),
        });
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        if let Some(code) = &self.code {
            write!(f, "{prefix}[{code}]: {}", self.message)?;
        } else {
            write!(f, "{prefix}: {}", self.message)?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error types for crates that produce diagnostics
// ---------------------------------------------------------------------------

/// Error type wrapping one or more diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.first().map(|d| d.to_string()).unwrap_or_default())]
pub struct DiagnosticError(pub Vec<Diagnostic>);

impl DiagnosticError {
    pub fn single(diag: Diagnostic) -> Self {
        Self(vec![diag])
    }

    pub fn multiple(diags: Vec<Diagnostic>) -> Self {
        Self(diags)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl From<Diagnostic> for DiagnosticError {
    fn from(diag: Diagnostic) -> Self {
        Self::single(diag)
    }
}

/// An assertion-style failure inside the engine.
///
/// Internal errors are never caused by rule input: they mean a fragment
/// compiler gap, a broken invariant in the fact store, or a scheduling bug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal error in {component}: {message}")]
pub struct InternalError {
    pub component: &'static str,
    pub message: String,
}

impl InternalError {
    pub fn new(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            component,
            message: message.into(),
        }
    }
}

/// Either class of failure, as propagated through the engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Internal(#[from] InternalError),
    #[error(transparent)]
    User(#[from] DiagnosticError),
}

impl From<Diagnostic> for EngineError {
    fn from(diag: Diagnostic) -> Self {
        EngineError::User(DiagnosticError::single(diag))
    }
}

impl EngineError {
    pub fn is_internal(&self) -> bool {
        matches!(self, EngineError::Internal(_))
    }

    /// User-facing diagnostics, or an empty slice for internal errors.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            EngineError::User(err) => err.diagnostics(),
            EngineError::Internal(_) => &[],
        }
    }
}
