//! Compiled patterns over program syntax.
//!
//! A rule pattern ([`tenet_ast::rules::Pattern`]) is compiled once into a
//! [`Fragment`] tree. Every fragment supports two directions:
//!
//! - **match**: concrete [`Entity`] -> [`BindingMap`], or no match;
//! - **generate**: [`BindingMap`] -> fresh [`Entity`], with new node ids and
//!   recorded provenance for every reused subtree.
//!
//! For any pattern `P` and entity `E`, when `P` matches `E` the entity
//! generated from the resulting bindings is structurally equal to `E`.

mod compile;
mod generate;
mod matching;
mod unordered;

pub use compile::{CompileError, FragmentCompiler};
pub use generate::{GenerateError, Generator};

use std::fmt;

use tenet_ast::{Entity, Node, NodeId, NodeKind, Span, TypeDesc};
use tenet_diag::SourceLocation;
use tenet_types::{BindingMap, ParamType, TypeOracle};

// ---------------------------------------------------------------------------
// Fragments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// A node of one kind with one fragment per slot.
    Structure {
        tag: tenet_ast::NodeTag,
        slots: Vec<Fragment>,
    },
    /// A list matched element-wise, same length, in order.
    Ordered(Vec<Fragment>),
    /// A modifier set. The access specifier is taken out first and matched
    /// by `access` (when the pattern constrains it); `fixed` fragments pair
    /// with the remaining items in any order; `rest` takes what is left.
    Unordered {
        access: Option<Box<Fragment>>,
        fixed: Vec<Fragment>,
        rest: Option<Box<Fragment>>,
    },
    /// A known entity, matched by structural equality.
    Resolved(Entity),
    /// A free variable.
    Var { name: String, ty: ParamType },
    Wildcard,
    Empty,
    /// `receiver.field`. Unless `as_lhs`, refuses accesses that are the
    /// target of an assignment.
    FieldAccess {
        receiver: Box<Fragment>,
        field: Box<Fragment>,
        as_lhs: bool,
    },
    /// `target = value` where the target is a field access.
    FieldAssign {
        target: Box<Fragment>,
        value: Box<Fragment>,
    },
}

impl Fragment {
    pub fn var(name: impl Into<String>, ty: ParamType) -> Self {
        Fragment::Var {
            name: name.into(),
            ty,
        }
    }

    /// Names of the free variables in this fragment, in first-seen order.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Fragment::Var { name, .. } => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Fragment::Structure { slots: items, .. } | Fragment::Ordered(items) => {
                for item in items {
                    item.collect_variables(out);
                }
            }
            Fragment::Unordered {
                access,
                fixed,
                rest,
            } => {
                for item in access.iter().map(Box::as_ref).chain(fixed).chain(rest.as_deref()) {
                    item.collect_variables(out);
                }
            }
            Fragment::FieldAccess {
                receiver, field, ..
            } => {
                receiver.collect_variables(out);
                field.collect_variables(out);
            }
            Fragment::FieldAssign { target, value } => {
                target.collect_variables(out);
                value.collect_variables(out);
            }
            Fragment::Resolved(_) | Fragment::Wildcard | Fragment::Empty => {}
        }
    }

    /// True when some position holds the wildcard.
    pub fn has_wildcard(&self) -> bool {
        match self {
            Fragment::Wildcard => true,
            Fragment::Structure { slots: items, .. } | Fragment::Ordered(items) => {
                items.iter().any(Fragment::has_wildcard)
            }
            Fragment::Unordered {
                access,
                fixed,
                rest,
            } => access
                .iter()
                .map(Box::as_ref)
                .chain(fixed)
                .chain(rest.as_deref())
                .any(Fragment::has_wildcard),
            Fragment::FieldAccess {
                receiver, field, ..
            } => receiver.has_wildcard() || field.has_wildcard(),
            Fragment::FieldAssign { target, value } => {
                target.has_wildcard() || value.has_wildcard()
            }
            Fragment::Resolved(_) | Fragment::Var { .. } | Fragment::Empty => false,
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Fragment]) -> fmt::Result {
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }
        match self {
            Fragment::Structure { tag, slots } => {
                write!(f, "{}(", tag.as_str())?;
                join(f, slots)?;
                write!(f, ")")
            }
            Fragment::Ordered(items) => {
                write!(f, "[")?;
                join(f, items)?;
                write!(f, "]")
            }
            Fragment::Unordered {
                access,
                fixed,
                rest,
            } => {
                write!(f, "{{")?;
                let mut first = true;
                let parts = access.iter().map(Box::as_ref).chain(fixed).chain(rest.as_deref());
                for part in parts {
                    if !first {
                        write!(f, " ")?;
                    }
                    first = false;
                    write!(f, "{part}")?;
                }
                write!(f, "}}")
            }
            Fragment::Resolved(entity) => write!(f, "{entity}"),
            Fragment::Var { name, .. } => write!(f, "`{name}"),
            Fragment::Wildcard => write!(f, "_"),
            Fragment::Empty => write!(f, "<empty>"),
            Fragment::FieldAccess {
                receiver, field, ..
            } => write!(f, "{receiver}.{field}"),
            Fragment::FieldAssign { target, value } => write!(f, "{target} = {value}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Compilation scope
// ---------------------------------------------------------------------------

/// What a name in a pattern refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Already bound: the pattern treats it as a constant.
    Bound(Entity),
    /// A declared variable still to be bound.
    Free(ParamType),
    /// Not declared anywhere: a pattern-local variable of any type.
    Unknown,
}

pub trait VariableScope {
    fn lookup(&self, name: &str) -> Lookup;
}

impl VariableScope for BindingMap {
    fn lookup(&self, name: &str) -> Lookup {
        match self.lookup_entity(name) {
            Some(entity) => Lookup::Bound(entity.clone()),
            None => Lookup::Unknown,
        }
    }
}

/// A scope in which every name is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyScope;

impl VariableScope for EmptyScope {
    fn lookup(&self, _name: &str) -> Lookup {
        Lookup::Unknown
    }
}

// ---------------------------------------------------------------------------
// Match environment
// ---------------------------------------------------------------------------

/// The type and staticness of the member enclosing a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosing {
    pub ty: TypeDesc,
    pub is_static: bool,
}

/// Syntactic context the matcher needs about concrete program nodes.
pub trait SyntaxContext {
    fn enclosing(&self, id: NodeId) -> Option<Enclosing>;

    /// The node is the left-hand side of an assignment.
    fn is_assignment_target(&self, id: NodeId) -> bool;

    /// The node is a bare name that refers to a field.
    fn is_field_reference(&self, id: NodeId) -> bool;
}

/// Context for detached entities: nothing encloses anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl SyntaxContext for NoContext {
    fn enclosing(&self, _id: NodeId) -> Option<Enclosing> {
        None
    }

    fn is_assignment_target(&self, _id: NodeId) -> bool {
        false
    }

    fn is_field_reference(&self, _id: NodeId) -> bool {
        false
    }
}

#[derive(Clone, Copy)]
pub struct MatchEnv<'a> {
    pub context: &'a dyn SyntaxContext,
    pub types: &'a dyn TypeOracle,
}

impl<'a> MatchEnv<'a> {
    pub fn new(context: &'a dyn SyntaxContext, types: &'a dyn TypeOracle) -> Self {
        Self { context, types }
    }

    /// The explicit stand-in for the omitted receiver of `owner`, or nothing
    /// when the enclosing member is unknown.
    pub(crate) fn implicit_receiver(&self, owner: &Node) -> Entity {
        match self.context.enclosing(owner.id) {
            Some(Enclosing { ty, is_static }) => Entity::Node(Node::new(
                owner.id,
                owner.span,
                NodeKind::ImplicitReceiver { ty, is_static },
            )),
            None => Entity::Empty,
        }
    }
}

impl fmt::Debug for MatchEnv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchEnv").finish_non_exhaustive()
    }
}

/// Diagnostic location of a span; synthetic spans have none.
pub fn span_location(span: Span) -> Option<SourceLocation> {
    if span.is_synthetic() {
        return None;
    }
    Some(SourceLocation {
        file_id: span.file.0,
        start: span.start,
        end: span.end,
    })
}

#[cfg(test)]
mod prop_tests;
