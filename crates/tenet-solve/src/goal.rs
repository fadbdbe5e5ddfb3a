//! Compiled constraint expressions.
//!
//! A [`Goal`] is an [`Expr`] with every pattern compiled to a [`Fragment`]
//! and every name resolved against the scope it is compiled in: names bound
//! at compile time (resolved singletons, constructor arguments, guard
//! tuples) become constants, declared parameters and binders stay typed
//! variables, anything else is a pattern-local variable.
//!
//! Compilation happens as late as possible, right before the goal is
//! evaluated, so that singletons resolved by earlier layers are constants.

use std::collections::BTreeMap;
use std::fmt;

use tenet_ast::rules::{Builtin, Expr, ExprKind, Term, WILDCARD};
use tenet_ast::{Entity, Span};
use tenet_diag::{Category, Diagnostic};
use tenet_match::{Fragment, FragmentCompiler, Lookup, VariableScope, span_location};
use tenet_types::{BindingMap, ParamType};

use crate::FactStore;

#[derive(Debug, Clone, PartialEq)]
pub enum Goal {
    True,
    False,
    And(Vec<Goal>),
    Or(Vec<Goal>),
    Not(Box<Goal>),
    Implies(Box<Goal>, Box<Goal>),
    Iff(Box<Goal>, Box<Goal>),
    Exists {
        binders: Vec<String>,
        body: Box<Goal>,
    },
    Forall {
        binders: Vec<String>,
        range: Box<Goal>,
        body: Box<Goal>,
    },
    Trait {
        name: String,
        args: Vec<GoalTerm>,
        span: Span,
    },
    Matches {
        subject: GoalTerm,
        fragment: Fragment,
        span: Span,
    },
    Eq {
        left: GoalTerm,
        right: GoalTerm,
        span: Span,
    },
    Ne {
        left: GoalTerm,
        right: GoalTerm,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GoalTerm {
    Wildcard,
    Var { name: String, ty: ParamType },
    Const(Entity),
    Pattern(Fragment),
    Apply { func: Builtin, args: Vec<GoalTerm> },
}

impl fmt::Display for GoalTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalTerm::Wildcard => write!(f, "_"),
            GoalTerm::Var { name, .. } => write!(f, "{name}"),
            GoalTerm::Const(entity) => write!(f, "{entity}"),
            GoalTerm::Pattern(fragment) => write!(f, "{fragment}"),
            GoalTerm::Apply { func, args } => {
                write!(f, "{}(", func.as_str())?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Names visible while compiling one expression.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    bound: &'a BindingMap,
    declared: BTreeMap<String, ParamType>,
}

impl<'a> Scope<'a> {
    pub fn new(bound: &'a BindingMap) -> Self {
        Self {
            bound,
            declared: BTreeMap::new(),
        }
    }

    pub fn declare(&mut self, name: impl Into<String>, ty: ParamType) {
        self.declared.insert(name.into(), ty);
    }
}

impl VariableScope for Scope<'_> {
    fn lookup(&self, name: &str) -> Lookup {
        if let Some(ty) = self.declared.get(name) {
            return Lookup::Free(ty.clone());
        }
        match self.bound.lookup_entity(name) {
            Some(entity) => Lookup::Bound(entity.clone()),
            None => Lookup::Unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

pub struct GoalCompiler<'a> {
    store: &'a FactStore,
}

impl<'a> GoalCompiler<'a> {
    /// Trait references are checked against the relations in `store`.
    pub fn new(store: &'a FactStore) -> Self {
        Self { store }
    }

    pub fn compile(&self, expr: &Expr, scope: &Scope<'_>) -> Result<Goal, Diagnostic> {
        Ok(match &expr.node {
            ExprKind::True => Goal::True,
            ExprKind::False => Goal::False,
            ExprKind::And(items) => Goal::And(self.compile_all(items, scope)?),
            ExprKind::Or(items) => Goal::Or(self.compile_all(items, scope)?),
            ExprKind::Not(inner) => Goal::Not(Box::new(self.compile(inner, scope)?)),
            ExprKind::Implies(left, right) => Goal::Implies(
                Box::new(self.compile(left, scope)?),
                Box::new(self.compile(right, scope)?),
            ),
            ExprKind::Iff(left, right) => Goal::Iff(
                Box::new(self.compile(left, scope)?),
                Box::new(self.compile(right, scope)?),
            ),
            ExprKind::Exists { binders, body } => {
                let inner = self.bind(scope, binders, expr.span)?;
                Goal::Exists {
                    binders: binders.iter().map(|b| b.name.clone()).collect(),
                    body: Box::new(self.compile(body, &inner)?),
                }
            }
            ExprKind::Forall {
                binders,
                range,
                body,
            } => {
                let inner = self.bind(scope, binders, expr.span)?;
                Goal::Forall {
                    binders: binders.iter().map(|b| b.name.clone()).collect(),
                    range: Box::new(self.compile(range, &inner)?),
                    body: Box::new(self.compile(body, &inner)?),
                }
            }
            ExprKind::Trait { name, args } => {
                let relation = self.store.get(name).ok_or_else(|| {
                    Diagnostic::error(Category::UndefinedName, format!("unknown trait `{name}`"))
                        .at_opt(span_location(expr.span))
                })?;
                if relation.signature.arity() != args.len() {
                    return Err(Diagnostic::error(
                        Category::ArityMismatch,
                        format!(
                            "trait `{name}` takes {} arguments, found {}",
                            relation.signature.arity(),
                            args.len()
                        ),
                    )
                    .at_opt(span_location(expr.span)));
                }
                Goal::Trait {
                    name: name.clone(),
                    args: self.terms(args, scope)?,
                    span: expr.span,
                }
            }
            ExprKind::Matches { subject, pattern } => Goal::Matches {
                subject: self.term(subject, scope)?,
                fragment: FragmentCompiler::new(scope)
                    .compile(pattern)
                    .map_err(|err| err.to_diagnostic())?,
                span: expr.span,
            },
            ExprKind::Eq(left, right) => Goal::Eq {
                left: self.term(left, scope)?,
                right: self.term(right, scope)?,
                span: expr.span,
            },
            ExprKind::Ne(left, right) => Goal::Ne {
                left: self.term(left, scope)?,
                right: self.term(right, scope)?,
                span: expr.span,
            },
        })
    }

    fn compile_all(&self, items: &[Expr], scope: &Scope<'_>) -> Result<Vec<Goal>, Diagnostic> {
        items.iter().map(|item| self.compile(item, scope)).collect()
    }

    fn bind<'s>(
        &self,
        scope: &Scope<'s>,
        binders: &[tenet_ast::rules::Binder],
        span: Span,
    ) -> Result<Scope<'s>, Diagnostic> {
        let mut inner = scope.clone();
        for binder in binders {
            let ty = ParamType::resolve(&binder.ty, &binder.name).map_err(|err| {
                Diagnostic::error(Category::UndefinedName, err.to_string())
                    .at_opt(span_location(span))
            })?;
            inner.declare(binder.name.clone(), ty);
        }
        Ok(inner)
    }

    fn terms(&self, terms: &[Term], scope: &Scope<'_>) -> Result<Vec<GoalTerm>, Diagnostic> {
        terms.iter().map(|term| self.term(term, scope)).collect()
    }

    fn term(&self, term: &Term, scope: &Scope<'_>) -> Result<GoalTerm, Diagnostic> {
        Ok(match term {
            Term::Var(name) if name == WILDCARD => GoalTerm::Wildcard,
            Term::Var(name) => match scope.lookup(name) {
                Lookup::Bound(entity) => GoalTerm::Const(entity),
                Lookup::Free(ty) => GoalTerm::Var {
                    name: name.clone(),
                    ty,
                },
                Lookup::Unknown => GoalTerm::Var {
                    name: name.clone(),
                    ty: ParamType::any(),
                },
            },
            Term::Entity(entity) => GoalTerm::Const(entity.clone()),
            Term::Pattern(pattern) => GoalTerm::Pattern(
                FragmentCompiler::new(scope)
                    .compile(pattern)
                    .map_err(|err| err.to_diagnostic())?,
            ),
            Term::Apply { func, args } => GoalTerm::Apply {
                func: *func,
                args: self.terms(args, scope)?,
            },
        })
    }
}
