//! Guard clauses checked once an option match table is solved.
//!
//! Every `require` of a statement or trait is evaluated against each tuple of
//! the relations it guards. All violations are reported together.

use tenet_ast::Span;
use tenet_ast::rules::Require;
use tenet_diag::{Category, Diagnostic, DiagnosticError, EngineError};
use tenet_match::span_location;
use tenet_types::{BindingMap, EntityTuple};

use crate::goal::{GoalCompiler, Scope};
use crate::statement::References;
use crate::{Evaluator, OptionMatchTable, SolveAction};

const DEFAULT_MESSAGE: &str = "cannot satisfy constraint";

/// Replace each `{name}` in `template` with the entity bound to `name`.
///
/// Declarations show their declared name. Placeholders naming nothing bound
/// are kept as written.
pub(crate) fn interpolate(template: &str, bindings: &BindingMap) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match bindings.lookup_entity(name) {
            Some(entity) => match entity.as_node().and_then(|node| node.name()) {
                Some(declared) => out.push_str(declared),
                None => out.push_str(&entity.to_string()),
            },
            None => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

struct GuardCheck {
    relation: String,
    require: Require,
    tuple: EntityTuple,
    /// Where the guard was written: the statement, or the trait's require.
    span: Span,
}

impl OptionMatchTable {
    pub(crate) fn check_guards(&mut self) -> Result<(), EngineError> {
        let checks = self.guard_checks();
        if checks.is_empty() {
            return Ok(());
        }
        tracing::debug!(checks = checks.len(), "checking guards");

        let mut failures = Vec::new();
        for check in &checks {
            match self.check_guard(check) {
                Ok(()) => {}
                Err(EngineError::User(err)) => failures.extend(err.into_diagnostics()),
                Err(internal) => return Err(internal),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiagnosticError::multiple(failures).into())
        }
    }

    fn guard_checks(&self) -> Vec<GuardCheck> {
        let mut checks = Vec::new();
        let mut push = |relation: &str, require: &Require, span: Span| {
            let Some(value) = self.store.get(relation) else {
                return;
            };
            for tuple in value.tuples() {
                checks.push(GuardCheck {
                    relation: relation.to_string(),
                    require: require.clone(),
                    tuple: tuple.clone(),
                    span,
                });
            }
        };
        for stmt in &self.statements {
            for require in &stmt.requires {
                for name in stmt.names() {
                    push(name, require, stmt.span);
                }
            }
        }
        for guard in &self.trait_guards {
            for require in &guard.requires {
                push(&guard.relation, require, require.span);
            }
        }
        checks
    }

    fn check_guard(&mut self, check: &GuardCheck) -> Result<(), EngineError> {
        let location = check
            .tuple
            .root()
            .and_then(|root| span_location(root.span))
            .or_else(|| span_location(check.span))
            .or_else(|| span_location(self.span));

        let mut bindings = check.tuple.to_bindings();
        for (name, value) in self.globals.iter() {
            if !bindings.contains(name) {
                bindings.bind(name, value.clone());
            }
        }

        let refs = References::collect(&check.require.expr);
        if let Some(name) = refs
            .value_vars
            .iter()
            .find(|name| !bindings.contains(name) && !refs.binding_vars.contains(*name))
        {
            return Err(Diagnostic::error(
                Category::UndefinedName,
                format!("undefined variable `{name}`"),
            )
            .at_opt(location)
            .into());
        }

        let goal = GoalCompiler::new(&self.store).compile(&check.require.expr, &Scope::new(&bindings))?;
        let holds = Evaluator::new(
            &self.store,
            self.facts.as_ref(),
            &self.overlay,
            &mut self.arena,
        )
        .holds(&goal, &bindings)?;
        if holds {
            return Ok(());
        }

        let message = check
            .require
            .message
            .as_deref()
            .map_or_else(|| DEFAULT_MESSAGE.to_string(), |template| interpolate(template, &bindings));
        self.trace
            .record(SolveAction::GuardFailed, &check.relation, || {
                format!("{}: {message}", check.tuple)
            });
        tracing::debug!(relation = %check.relation, tuple = %check.tuple, "guard failed");
        Err(Diagnostic::error(Category::ConstraintViolation, message)
            .at_opt(location)
            .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SolverConfig;
    use crate::fixtures;
    use tenet_ast::rules::{Term, build};
    use tenet_ast::{Entity, Literal};

    #[test]
    fn placeholders_use_declared_names() {
        let mut bindings = BindingMap::new();
        bindings.bind("owner", Entity::Type(tenet_ast::TypeDesc::named("Person")));
        bindings.bind("label", Entity::Value(Literal::Str("nick".into())));
        insta::assert_snapshot!(
            interpolate("{owner} has no {label} {missing} {", &bindings),
            @r#"Person has no "nick" {missing} {"#
        );
    }

    fn guarded_fields(requires: Vec<Require>) -> OptionMatchTable {
        let interface = fixtures::interface("Fields", vec![], vec![]);
        let mut stmt = build::realize(
            &["stringField"],
            build::matches(
                build::tvar("f"),
                build::field(
                    build::wildcard(),
                    build::wildcard(),
                    build::ty("String"),
                    build::var("n"),
                    build::wildcard(),
                ),
            ),
        );
        stmt.requires = requires;
        let option = fixtures::option(
            "Strings",
            "Fields",
            vec![],
            vec![build::trait_decl(
                "stringField",
                vec![build::param("f", build::category("field"))],
                build::plain(),
            )],
            vec![stmt],
        );
        fixtures::table(&interface, &option, vec![], SolverConfig::default())
    }

    #[test]
    fn every_violation_is_reported() {
        let no_init = build::matches(
            build::tvar("f"),
            build::field(
                build::wildcard(),
                build::wildcard(),
                build::wildcard(),
                build::wildcard(),
                build::empty(),
            ),
        );
        let mut table = guarded_fields(vec![build::require(no_init, Some("{f} is initialized"))]);
        let err = table.solve().unwrap_err();
        let messages: Vec<&str> = err.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, ["nickName is initialized"]);
        assert_eq!(err.diagnostics()[0].category, Category::ConstraintViolation);
        assert!(!table.is_solved());
    }

    #[test]
    fn failing_guards_accumulate() {
        let mut table = guarded_fields(vec![build::require(build::expr(tenet_ast::rules::ExprKind::False), None)]);
        let err = table.solve().unwrap_err();
        assert_eq!(err.diagnostics().len(), 3);
        assert!(err.diagnostics().iter().all(|d| d.message == DEFAULT_MESSAGE));
    }

    #[test]
    fn unbound_comparison_operands_are_undefined() {
        let mut table = guarded_fields(vec![build::require(
            build::ne(build::tvar("other"), Term::Entity(Entity::Empty)),
            None,
        )]);
        let err = table.solve().unwrap_err();
        let diag = &err.diagnostics()[0];
        assert_eq!(diag.category, Category::UndefinedName);
        assert_eq!(diag.message, "undefined variable `other`");
    }

    #[test]
    fn satisfied_guards_leave_the_table_solved() {
        let mut table = guarded_fields(vec![build::require(
            build::trait_app(crate::DECLARED_BY, vec![build::tvar("f"), build::tvar("_")]),
            None,
        )]);
        table.solve().unwrap();
        assert!(table.is_solved());
    }
}
