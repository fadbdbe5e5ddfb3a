//! Running the statements of an option match table.
//!
//! Each level (interface, then option) gets its own dependency graph. Groups
//! run layer by layer: a singleton group is evaluated once and must yield
//! exactly one tuple, a local group is evaluated once and registers what it
//! synthesized, and a fixpoint group is re-run until no relation grows.

use std::collections::BTreeSet;
use std::sync::Arc;

use tenet_ast::{Entity, Node, NodeId, TypeDesc};
use tenet_diag::{Category, Diagnostic, EngineError, InternalError};
use tenet_match::span_location;
use tenet_types::{BindingMap, BindingsSet, EntityTuple, TraitSignature};

use crate::goal::{Goal, GoalCompiler, Scope};
use crate::graph::{DependencyGraph, Group, GroupKind};
use crate::guard::interpolate;
use crate::statement::{DependencyContext, Level, RealizationStatement};
use crate::{COPIED_TO, Evaluator, GeneratedEntity, OptionMatchTable, SolveAction};

const COMPONENT: &str = "statement solver";

impl OptionMatchTable {
    /// Run every statement, then check every guard clause.
    ///
    /// Solving a solved table does nothing.
    pub fn solve(&mut self) -> Result<(), EngineError> {
        if self.solved {
            return Ok(());
        }
        let _span = tracing::debug_span!("solve", option = %self.option).entered();

        let mut predefined = self.nested.clone();
        for level in [Level::Interface, Level::Option] {
            let statements: Vec<RealizationStatement> = self
                .statements
                .iter()
                .filter(|stmt| stmt.level == level)
                .cloned()
                .collect();
            if statements.is_empty() {
                continue;
            }
            self.solve_level(level, &statements, &predefined)?;
            predefined.extend(
                statements
                    .iter()
                    .flat_map(|stmt| stmt.names().map(str::to_string)),
            );
        }

        self.check_guards()?;
        self.solved = true;
        tracing::debug!(
            tuples = self.store.total_tuples(),
            generated = self.generated.len(),
            "solved option"
        );
        Ok(())
    }

    fn dependency_context(&self, predefined: &BTreeSet<String>) -> DependencyContext {
        DependencyContext {
            signatures: self
                .store
                .names()
                .filter_map(|name| self.store.get(name))
                .map(|value| (value.name.clone(), Arc::clone(&value.signature)))
                .collect(),
            predefined: predefined.clone(),
            singleton_params: self.singleton_params.clone(),
        }
    }

    fn solve_level(
        &mut self,
        level: Level,
        statements: &[RealizationStatement],
        predefined: &BTreeSet<String>,
    ) -> Result<(), EngineError> {
        let graph = DependencyGraph::build(statements, &self.dependency_context(predefined))?;
        for (depth, layer) in graph.layers()?.into_iter().enumerate() {
            for idx in layer {
                let group = graph.group(idx);
                let label = group
                    .relations
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(",");
                self.trace
                    .record(SolveAction::Layer, &label, || format!("{level} layer {depth}"));
                tracing::debug!(%level, depth, relations = %label, "scheduling group");
                self.solve_group(statements, group, &label)?;
            }
        }
        Ok(())
    }

    fn solve_group(
        &mut self,
        statements: &[RealizationStatement],
        group: &Group,
        label: &str,
    ) -> Result<(), EngineError> {
        let members: Vec<&RealizationStatement> =
            group.statements.iter().map(|&idx| &statements[idx]).collect();
        match (group.kind, members.as_slice()) {
            (GroupKind::Singleton, [stmt]) => self.solve_singleton(stmt),
            (GroupKind::Local, [stmt]) => self.solve_local(stmt),
            (GroupKind::Fixpoint, _)
                if members
                    .iter()
                    .all(|stmt| !stmt.is_singleton() && !stmt.is_local()) =>
            {
                self.solve_fixpoint(&members, group.recursive, label)
            }
            _ => Err(InternalError::new(
                COMPONENT,
                format!(
                    "group `{label}` of {} statements mixes singleton or local statements",
                    members.len()
                ),
            )
            .into()),
        }
    }

    /// Compile a statement body now that everything it depends on is known:
    /// resolved singletons and constructor arguments become constants.
    fn compile(&self, stmt: &RealizationStatement) -> Result<Goal, Diagnostic> {
        let mut scope = Scope::new(&self.globals);
        for sig in &stmt.realizes {
            for param in &sig.params {
                scope.declare(param.name.clone(), param.ty.clone());
            }
        }
        GoalCompiler::new(&self.store).compile(&stmt.body, &scope)
    }

    fn evaluate(&mut self, goal: &Goal) -> Result<BindingsSet, EngineError> {
        let mut evaluator = Evaluator::new(
            &self.store,
            self.facts.as_ref(),
            &self.overlay,
            &mut self.arena,
        );
        evaluator.solve(goal, self.globals.clone())
    }

    fn tuple_for(
        &self,
        sig: &Arc<TraitSignature>,
        map: &BindingMap,
        stmt: &RealizationStatement,
    ) -> Result<EntityTuple, Diagnostic> {
        let location = span_location(stmt.span).or_else(|| span_location(self.span));
        let tuple = EntityTuple::from_bindings(Arc::clone(sig), map).map_err(|err| {
            Diagnostic::error(Category::UnresolvedBinding, err.to_string()).at_opt(location)
        })?;
        for (param, value) in sig.params.iter().zip(tuple.ordered_values()) {
            if !param.ty.accepts(value, self.facts.as_ref()) {
                return Err(Diagnostic::error(
                    Category::TypeMismatch,
                    format!(
                        "`{}` of `{}` is bound to `{value}`, which is not a {}",
                        param.name, sig.name, param.ty
                    ),
                )
                .at_opt(location));
            }
        }
        Ok(tuple)
    }

    // -----------------------------------------------------------------------
    // Singletons
    // -----------------------------------------------------------------------

    fn solve_singleton(&mut self, stmt: &RealizationStatement) -> Result<(), EngineError> {
        let goal = self.compile(stmt)?;
        let solutions = self.evaluate(&goal)?;
        for sig in &stmt.realizes {
            let tuples = solutions
                .iter()
                .map(|map| self.tuple_for(sig, map, stmt))
                .collect::<Result<BTreeSet<_>, _>>()?;
            let count = tuples.len();
            let mut tuples = tuples.into_iter();
            let tuple = match (tuples.next(), tuples.next()) {
                (Some(tuple), None) => tuple,
                _ => return Err(self.cardinality_error(stmt, sig, count).into()),
            };

            for (name, value) in tuple.values() {
                if !self.globals.bind(name, value.clone()) {
                    return Err(InternalError::new(
                        COMPONENT,
                        format!("singleton variable `{name}` is already bound"),
                    )
                    .into());
                }
            }
            self.trace
                .record(SolveAction::SingletonResolved, &sig.name, || tuple.to_string());
            tracing::debug!(singleton = %sig.name, %tuple, "resolved singleton");
            self.store.add_singleton(tuple)?;
        }
        Ok(())
    }

    fn cardinality_error(
        &self,
        stmt: &RealizationStatement,
        sig: &TraitSignature,
        count: usize,
    ) -> Diagnostic {
        let base = match &stmt.message {
            Some(message) => interpolate(message, &self.globals),
            None => format!("singleton `{}` must match exactly once", sig.name),
        };
        Diagnostic::error(
            Category::SingletonCardinality,
            format!("{base} (found {count} matches)"),
        )
        .at_opt(span_location(stmt.span).or_else(|| span_location(self.span)))
    }

    // -----------------------------------------------------------------------
    // Local generation
    // -----------------------------------------------------------------------

    fn solve_local(&mut self, stmt: &RealizationStatement) -> Result<(), EngineError> {
        let goal = self.compile(stmt)?;
        let solutions = self.evaluate(&goal)?;
        let mut added = 0;
        for map in &solutions {
            for sig in &stmt.realizes {
                let tuple = self.tuple_for(sig, map, stmt)?;
                if !self.store.add_trait_instance(&sig.name, tuple.clone())? {
                    continue;
                }
                added += 1;
                self.trace
                    .record(SolveAction::TupleAdded, &sig.name, || tuple.to_string());
                self.register_generated(sig, &tuple, map)?;
            }
        }
        tracing::debug!(
            relations = %stmt.names().collect::<Vec<_>>().join(","),
            added,
            "evaluated local statement"
        );
        Ok(())
    }

    /// Record the synthesized values of a new local tuple: their host type,
    /// what they were copied from, and their visibility to later matching.
    fn register_generated(
        &mut self,
        sig: &TraitSignature,
        tuple: &EntityTuple,
        map: &BindingMap,
    ) -> Result<(), InternalError> {
        let host = self.host_type(tuple);
        for (param, value) in sig.param_names().zip(tuple.ordered_values()) {
            let Some(root) = value.as_node() else {
                continue;
            };
            if !self.arena.contains(root.id)
                || self.overlay.iter().any(|seen| seen.node_id() == Some(root.id))
            {
                continue;
            }
            if let Some(host) = &host {
                self.arena.set_declaring_type(root.id, host.clone());
            }
            for replacement in map.replacements() {
                let original = self.facts.node(replacement.original).cloned();
                if let (Some(original), Some(copy)) = (original, find_node(root, replacement.replacement)) {
                    self.record_copy(original, copy)?;
                }
            }

            let replaces = self.arena.origin(root.id);
            self.overlay.push(value.clone());
            self.trace
                .record(SolveAction::Generated, &sig.name, || format!("{param} = {value}"));
            self.generated.push(GeneratedEntity {
                relation: sig.name.clone(),
                param: param.to_string(),
                entity: value.clone(),
                host: host.clone(),
                replaces,
            });
        }
        Ok(())
    }

    /// The type a generated member belongs to: a type-valued parameter of
    /// the tuple, else the declaring type of a program node in it.
    fn host_type(&self, tuple: &EntityTuple) -> Option<TypeDesc> {
        tuple
            .ordered_values()
            .find_map(|value| match value {
                Entity::Type(ty) => Some(ty.clone()),
                _ => None,
            })
            .or_else(|| {
                tuple
                    .ordered_values()
                    .filter_map(Entity::node_id)
                    .filter(|id| !self.arena.contains(*id))
                    .find_map(|id| {
                        self.facts
                            .declaring_type(id)
                            .or_else(|| self.facts.enclosing(id).map(|enclosing| enclosing.ty))
                    })
            })
    }

    fn record_copy(&mut self, original: Node, copy: Node) -> Result<(), InternalError> {
        let Some(sig) = self
            .store
            .get(COPIED_TO)
            .map(|value| Arc::clone(&value.signature))
        else {
            return Ok(());
        };
        let tuple = EntityTuple::positional(sig, vec![Entity::Node(original), Entity::Node(copy)])
            .map_err(|err| InternalError::new(COMPONENT, err.to_string()))?;
        self.store.add_trait_instance(COPIED_TO, tuple)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Fixpoint groups
    // -----------------------------------------------------------------------

    fn solve_fixpoint(
        &mut self,
        members: &[&RealizationStatement],
        recursive: bool,
        label: &str,
    ) -> Result<(), EngineError> {
        let goals = members
            .iter()
            .map(|stmt| self.compile(stmt))
            .collect::<Result<Vec<_>, _>>()?;

        let mut pass = 0;
        loop {
            if pass == self.config.max_fixpoint_passes {
                return Err(InternalError::new(
                    COMPONENT,
                    format!(
                        "fixpoint over `{label}` did not settle within {pass} passes"
                    ),
                )
                .into());
            }
            pass += 1;

            let mut added = 0;
            for (stmt, goal) in members.iter().zip(&goals) {
                let solutions = self.evaluate(goal)?;
                added += self.realize(stmt, &solutions)?;
            }
            self.trace.record(SolveAction::FixpointPass, label, || {
                format!("pass {pass}: {added} new tuples")
            });
            tracing::debug!(relations = label, pass, added, "fixpoint pass");

            if added == 0 || !recursive {
                return Ok(());
            }
        }
    }

    /// Insert one tuple per solution; the number of new tuples.
    fn realize(
        &mut self,
        stmt: &RealizationStatement,
        solutions: &BindingsSet,
    ) -> Result<usize, EngineError> {
        let mut added = 0;
        for map in solutions {
            for sig in &stmt.realizes {
                let tuple = self.tuple_for(sig, map, stmt)?;
                if self.store.add_trait_instance(&sig.name, tuple.clone())? {
                    added += 1;
                    self.trace
                        .record(SolveAction::TupleAdded, &sig.name, || tuple.to_string());
                }
            }
        }
        Ok(added)
    }
}

fn find_node(root: &Node, id: NodeId) -> Option<Node> {
    let mut found = None;
    root.walk(&mut |node, _| {
        if found.is_none() && node.id == id {
            found = Some(node.clone());
        }
    });
    found
}
