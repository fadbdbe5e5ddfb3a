//! Syntax definitions and source spans for tenet.
//!
//! This crate defines two trees:
//!
//! - the analyzed program's syntax ([`Node`], wrapped in the closed
//!   [`Entity`] union together with type descriptors, modifier tokens,
//!   signatures, and literal values), and
//! - the rule language's abstract syntax ([`rules`]), produced by an external
//!   parser.
//!
//! Every program node carries a [`NodeId`] (its location identity) and a
//! [`Span`]. Comparisons on [`Node`] are structural and ignore both; use
//! [`Entity::identical`] when location matters.

pub mod provenance;
pub mod rules;
mod syntax;

pub use provenance::{NodeFactory, Provenance, ProvenanceArena};
pub use syntax::*;

/// Identifies a source file in the analysis session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// A byte offset range within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub file: FileId,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// Create a span that covers both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        debug_assert_eq!(
            self.file, other.file,
            "cannot merge spans from different files"
        );
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// A synthetic span for engine-generated nodes.
    pub fn synthetic() -> Self {
        Self {
            file: FileId(u32::MAX),
            start: 0,
            end: 0,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.file == FileId(u32::MAX)
    }
}

/// A value paired with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    /// Wrap a value with a synthetic span.
    pub fn synthetic(node: T) -> Self {
        Self {
            node,
            span: Span::synthetic(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }
}
