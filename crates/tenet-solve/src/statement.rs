//! Realization statements and the relations they depend on.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tenet_ast::Span;
use tenet_ast::rules::{
    Binder, Expr, ExprKind, Pattern, PatternKind, Require, Statement, StatementKind, Term,
    WILDCARD,
};
use tenet_diag::{Category, Diagnostic};
use tenet_match::span_location;
use tenet_types::TraitSignature;

/// Where a statement was declared. Interface statements run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Interface,
    Option,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Interface => write!(f, "interface"),
            Level::Option => write!(f, "option"),
        }
    }
}

/// A validated statement with its realized signatures resolved.
#[derive(Debug, Clone)]
pub struct RealizationStatement {
    pub owner: String,
    pub level: Level,
    pub kind: StatementKind,
    pub realizes: Vec<Arc<TraitSignature>>,
    pub body: Expr,
    pub requires: Vec<Require>,
    /// Reported when a singleton does not match exactly once.
    pub message: Option<String>,
    pub span: Span,
}

/// What statement references are resolved against.
#[derive(Debug, Clone, Default)]
pub struct DependencyContext {
    /// Every relation visible at this level, by name.
    pub signatures: BTreeMap<String, Arc<TraitSignature>>,
    /// Relations already complete when this level starts.
    pub predefined: BTreeSet<String>,
    /// Variables bound by singleton traits, mapped to their trait.
    pub singleton_params: BTreeMap<String, String>,
}

fn invalid(message: String, span: Span) -> Diagnostic {
    Diagnostic::error(Category::InvalidStatement, message).at_opt(span_location(span))
}

impl RealizationStatement {
    /// Resolve and validate `stmt`. `lookup` yields the signatures the
    /// statement may realize.
    pub fn new(
        owner: &str,
        level: Level,
        stmt: &Statement,
        lookup: impl Fn(&str) -> Option<Arc<TraitSignature>>,
    ) -> Result<Self, Diagnostic> {
        if stmt.realizes.is_empty() {
            return Err(invalid(
                "a statement must realize at least one trait".to_string(),
                stmt.span,
            ));
        }

        let mut realizes: Vec<Arc<TraitSignature>> = Vec::with_capacity(stmt.realizes.len());
        for name in &stmt.realizes {
            let sig = lookup(&name.node).ok_or_else(|| {
                Diagnostic::error(
                    Category::UndefinedName,
                    format!("statement realizes unknown trait `{}`", name.node),
                )
                .at_opt(span_location(name.span).or_else(|| span_location(stmt.span)))
            })?;
            if sig.is_builtin() {
                return Err(invalid(
                    format!("built-in trait `{}` cannot be realized", sig.name),
                    name.span,
                ));
            }
            if realizes.iter().any(|prev| prev.name == sig.name) {
                return Err(invalid(
                    format!("trait `{}` is listed twice", sig.name),
                    name.span,
                ));
            }
            realizes.push(sig);
        }

        let (singletons, others): (Vec<_>, Vec<_>) =
            realizes.iter().partition(|sig| sig.is_singleton());
        if let (Some(single), Some(other)) = (singletons.first(), others.first()) {
            return Err(invalid(
                format!(
                    "singleton `{}` cannot be realized together with non-singleton `{}`",
                    single.name, other.name
                ),
                stmt.span,
            ));
        }
        if let [first, second, ..] = others.as_slice() {
            return Err(invalid(
                format!(
                    "a statement realizes at most one non-singleton trait, found `{}` and `{}`",
                    first.name, second.name
                ),
                stmt.span,
            ));
        }

        if level == Level::Interface
            && stmt.kind == StatementKind::Realize
            && let Some(sig) = realizes.iter().find(|sig| !sig.is_static())
        {
            return Err(invalid(
                format!(
                    "interface `{owner}` can only realize static traits, `{}` is not static",
                    sig.name
                ),
                stmt.span,
            ));
        }

        Ok(Self {
            owner: owner.to_string(),
            level,
            kind: stmt.kind,
            realizes,
            body: stmt.body.clone(),
            requires: stmt.requires.clone(),
            message: stmt.message.clone(),
            span: stmt.span,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.realizes.iter().map(|sig| sig.name.as_str())
    }

    pub fn realizes_name(&self, name: &str) -> bool {
        self.realizes.iter().any(|sig| sig.name == name)
    }

    pub fn is_singleton(&self) -> bool {
        self.realizes.iter().all(|sig| sig.is_singleton())
    }

    pub fn is_local(&self) -> bool {
        self.realizes.iter().any(|sig| sig.is_local())
    }

    /// Relations that must be complete before this statement runs.
    ///
    /// Singleton and local statements wait for everything they mention.
    /// Plain statements only wait for singletons and locals, except that
    /// anything mentioned under negation, universal quantification,
    /// implication, or equivalence is always waited for, including the
    /// statement's own relations.
    pub fn dependencies(&self, ctx: &DependencyContext) -> Result<BTreeSet<String>, Diagnostic> {
        let refs = References::collect(&self.body);
        if refs.wildcard_value && self.kind != StatementKind::Define {
            return Err(Diagnostic::error(
                Category::InvalidWildcard,
                format!(
                    "`{WILDCARD}` cannot be used as a value in the statement realizing `{}`",
                    self.names().collect::<Vec<_>>().join("`, `")
                ),
            )
            .at_opt(span_location(self.span)));
        }

        let unconditional = self.is_singleton() || self.is_local();
        let mut deps = BTreeSet::new();
        for name in refs.relations(false, ctx) {
            if self.realizes_name(&name) {
                continue;
            }
            if let Some(sig) = candidate(&name, ctx)
                && (unconditional || !sig.is_plain())
            {
                deps.insert(name);
            }
        }
        for name in refs.relations(true, ctx) {
            if candidate(&name, ctx).is_some() {
                deps.insert(name);
            }
        }
        Ok(deps)
    }

    /// Plain relations this statement reads monotonically, its own
    /// included. They are solved in the same fixpoint as the statement.
    pub fn fixpoint_peers(&self, ctx: &DependencyContext) -> BTreeSet<String> {
        References::collect(&self.body)
            .relations(false, ctx)
            .into_iter()
            .filter(|name| candidate(name, ctx).is_some_and(|sig| sig.is_plain()))
            .collect()
    }
}

fn candidate<'c>(name: &str, ctx: &'c DependencyContext) -> Option<&'c Arc<TraitSignature>> {
    if ctx.predefined.contains(name) {
        return None;
    }
    ctx.signatures.get(name).filter(|sig| !sig.is_builtin())
}

// ---------------------------------------------------------------------------
// Reference collection
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Polarity {
    monotone: BTreeSet<String>,
    non_monotone: BTreeSet<String>,
}

impl Polarity {
    fn insert(&mut self, name: &str, negated: bool) {
        let set = if negated {
            &mut self.non_monotone
        } else {
            &mut self.monotone
        };
        set.insert(name.to_string());
    }

    fn get(&self, negated: bool) -> &BTreeSet<String> {
        if negated {
            &self.non_monotone
        } else {
            &self.monotone
        }
    }
}

/// Names an expression mentions, split by whether they occur under a
/// non-monotonic construct. Binder names are not collected.
#[derive(Debug, Default)]
pub(crate) struct References {
    traits: Polarity,
    vars: Polarity,
    /// Variables in comparisons and builtin arguments.
    pub value_vars: BTreeSet<String>,
    /// Variables that matching or a join can bind.
    pub binding_vars: BTreeSet<String>,
    pub wildcard_value: bool,
}

impl References {
    pub fn collect(expr: &Expr) -> Self {
        let mut refs = Self::default();
        refs.expr(expr, false, &mut Vec::new());
        refs
    }

    /// Relation names, with variables bound by singletons mapped to their
    /// trait.
    fn relations(&self, negated: bool, ctx: &DependencyContext) -> BTreeSet<String> {
        let mut out = self.traits.get(negated).clone();
        out.extend(
            self.vars
                .get(negated)
                .iter()
                .filter_map(|var| ctx.singleton_params.get(var).cloned()),
        );
        out
    }

    fn expr(&mut self, expr: &Expr, negated: bool, binders: &mut Vec<String>) {
        match &expr.node {
            ExprKind::True | ExprKind::False => {}
            ExprKind::And(items) | ExprKind::Or(items) => {
                for item in items {
                    self.expr(item, negated, binders);
                }
            }
            ExprKind::Not(inner) => self.expr(inner, true, binders),
            ExprKind::Implies(left, right) | ExprKind::Iff(left, right) => {
                self.expr(left, true, binders);
                self.expr(right, true, binders);
            }
            ExprKind::Exists { binders: bound, body } => {
                let depth = push_binders(bound, binders);
                self.expr(body, negated, binders);
                binders.truncate(depth);
            }
            ExprKind::Forall {
                binders: bound,
                range,
                body,
            } => {
                let depth = push_binders(bound, binders);
                self.expr(range, true, binders);
                self.expr(body, true, binders);
                binders.truncate(depth);
            }
            ExprKind::Trait { name, args } => {
                self.traits.insert(name, negated);
                for arg in args {
                    self.term(arg, negated, binders, false);
                }
            }
            ExprKind::Matches { subject, pattern } => {
                self.term(subject, negated, binders, false);
                self.pattern(pattern, negated, binders);
            }
            ExprKind::Eq(left, right) | ExprKind::Ne(left, right) => {
                self.term(left, negated, binders, true);
                self.term(right, negated, binders, true);
            }
        }
    }

    fn term(&mut self, term: &Term, negated: bool, binders: &[String], value: bool) {
        match term {
            Term::Var(name) => self.var(name, negated, binders, value),
            Term::Entity(_) => {}
            Term::Pattern(pattern) => self.pattern(pattern, negated, binders),
            Term::Apply { args, .. } => {
                for arg in args {
                    self.term(arg, negated, binders, true);
                }
            }
        }
    }

    fn pattern(&mut self, pattern: &Pattern, negated: bool, binders: &[String]) {
        match &pattern.node {
            PatternKind::Var(name) | PatternKind::AccessSlot(Some(name)) => {
                self.var(name, negated, binders, false)
            }
            PatternKind::Node { slots: items, .. }
            | PatternKind::List(items)
            | PatternKind::Unordered(items) => {
                for item in items {
                    self.pattern(item, negated, binders);
                }
            }
            PatternKind::Resolved(_) | PatternKind::AccessSlot(None) | PatternKind::Empty => {}
        }
    }

    fn var(&mut self, name: &str, negated: bool, binders: &[String], value: bool) {
        if name == WILDCARD {
            self.wildcard_value |= value;
            return;
        }
        if binders.iter().any(|bound| bound == name) {
            return;
        }
        self.vars.insert(name, negated);
        if value {
            self.value_vars.insert(name.to_string());
        } else {
            self.binding_vars.insert(name.to_string());
        }
    }
}

fn push_binders(bound: &[Binder], binders: &mut Vec<String>) -> usize {
    let depth = binders.len();
    binders.extend(bound.iter().map(|binder| binder.name.clone()));
    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenet_ast::rules::{TraitModifiers, build};

    fn sig(name: &str, params: &[&str], modifiers: TraitModifiers) -> Arc<TraitSignature> {
        let params = params
            .iter()
            .map(|param| build::param(param, build::category("any")))
            .collect();
        Arc::new(TraitSignature::from_decl(&build::trait_decl(name, params, modifiers)).unwrap())
    }

    fn context() -> DependencyContext {
        let mut ctx = DependencyContext::default();
        for sig in [
            sig("attr", &["attrName"], build::singleton()),
            sig("getter", &["f", "m"], build::plain()),
            sig("setter", &["f", "m"], build::plain()),
            sig("helper", &["m"], build::local()),
            sig("declares-field", &["t", "f"], TraitModifiers {
                is_builtin: true,
                is_static: true,
                ..TraitModifiers::default()
            }),
        ] {
            ctx.signatures.insert(sig.name.clone(), sig);
        }
        ctx.singleton_params
            .insert("attrName".to_string(), "attr".to_string());
        ctx
    }

    fn statement(realizes: &[&str], body: Expr) -> Result<RealizationStatement, Diagnostic> {
        let ctx = context();
        RealizationStatement::new("Accessors", Level::Option, &build::realize(realizes, body), |name| {
            ctx.signatures.get(name).cloned()
        })
    }

    fn deps(stmt: &RealizationStatement) -> Vec<String> {
        stmt.dependencies(&context()).unwrap().into_iter().collect()
    }

    #[test]
    fn plain_statements_wait_only_for_singletons_and_locals() {
        let stmt = statement(
            &["getter"],
            build::and(vec![
                build::trait_app("setter", vec![build::tvar("f"), build::tvar("m")]),
                build::trait_app("helper", vec![build::tvar("m")]),
                build::trait_app("declares-field", vec![build::tvar("t"), build::tvar("f")]),
                build::matches(build::tvar("f"), build::var("attrName")),
            ]),
        )
        .unwrap();
        assert_eq!(deps(&stmt), vec!["attr", "helper"]);
        assert_eq!(
            stmt.fixpoint_peers(&context()).into_iter().collect::<Vec<_>>(),
            vec!["setter"]
        );
    }

    #[test]
    fn singleton_statements_wait_for_everything_they_mention() {
        let stmt = statement(
            &["attr"],
            build::and(vec![
                build::trait_app("getter", vec![build::tvar("attrName"), build::tvar("_")]),
                build::matches(build::tvar("attrName"), build::wildcard()),
            ]),
        )
        .unwrap();
        assert_eq!(deps(&stmt), vec!["getter"]);
    }

    #[test]
    fn negated_references_are_always_dependencies() {
        let stmt = statement(
            &["getter"],
            build::and(vec![
                build::trait_app("declares-field", vec![build::tvar("t"), build::tvar("f")]),
                build::not(build::trait_app(
                    "getter",
                    vec![build::tvar("f"), build::tvar("_")],
                )),
                build::forall(
                    vec![build::binder("x", "method")],
                    build::trait_app("setter", vec![build::tvar("f"), build::tvar("x")]),
                    build::expr(ExprKind::True),
                ),
            ]),
        )
        .unwrap();
        assert_eq!(deps(&stmt), vec!["getter", "setter"]);
        assert!(stmt.fixpoint_peers(&context()).is_empty());
    }

    #[test]
    fn predefined_relations_are_not_dependencies() {
        let stmt = statement(
            &["getter"],
            build::not(build::trait_app("helper", vec![build::tvar("m")])),
        )
        .unwrap();
        let mut ctx = context();
        ctx.predefined.insert("helper".to_string());
        assert!(stmt.dependencies(&ctx).unwrap().is_empty());
    }

    #[test]
    fn wildcard_values_are_rejected_outside_define() {
        let body = build::eq(build::tvar("f"), build::tvar("_"));
        let stmt = statement(&["getter"], body.clone()).unwrap();
        let err = stmt.dependencies(&context()).unwrap_err();
        assert_eq!(err.category, Category::InvalidWildcard);

        let ctx = context();
        let define = RealizationStatement::new(
            "Accessors",
            Level::Option,
            &build::define(&["getter"], body),
            |name| ctx.signatures.get(name).cloned(),
        )
        .unwrap();
        assert!(define.dependencies(&ctx).is_ok());
    }

    #[test]
    fn realized_traits_are_validated() {
        let truth = || build::expr(ExprKind::True);
        let err = statement(&["missing"], truth()).unwrap_err();
        assert_eq!(err.category, Category::UndefinedName);

        let err = statement(&["attr", "getter"], truth()).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"error[E0114]: singleton `attr` cannot be realized together with non-singleton `getter`");

        let err = statement(&["getter", "setter"], truth()).unwrap_err();
        assert!(err.message.contains("at most one non-singleton"));

        let err = statement(&["declares-field"], truth()).unwrap_err();
        assert!(err.message.contains("built-in"));

        let err = statement(&["getter", "getter"], truth()).unwrap_err();
        assert!(err.message.contains("listed twice"));
    }

    #[test]
    fn interface_statements_realize_static_traits() {
        let ctx = context();
        let stmt = build::realize(&["getter"], build::expr(ExprKind::True));
        let err = RealizationStatement::new("Accessors", Level::Interface, &stmt, |name| {
            ctx.signatures.get(name).cloned()
        })
        .unwrap_err();
        assert!(err.message.contains("static"));
    }
}
