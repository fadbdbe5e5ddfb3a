//! Goal evaluation against the fact store and program facts.
//!
//! `solve(goal, bindings)` returns every extension of `bindings` under which
//! the goal holds. Conjunction joins left to right, so a later conjunct sees
//! the variables bound by earlier ones. `Not`, `Forall`, `Implies`, and `Iff`
//! are tests: they either keep the input bindings unchanged or drop them.

use tenet_ast::rules::Builtin;
use tenet_ast::{Entity, NodeTag, ProvenanceArena, Span};
use tenet_diag::{Category, Diagnostic, EngineError, InternalError};
use tenet_match::{Fragment, Generator, MatchEnv, span_location};
use tenet_types::{BindingMap, BindingsSet, EntityType, ParamType};

use crate::goal::{Goal, GoalTerm};
use crate::{FactStore, ProgramFacts};

const COMPONENT: &str = "goal evaluator";

pub struct Evaluator<'a> {
    store: &'a FactStore,
    facts: &'a dyn ProgramFacts,
    /// Entities synthesized earlier in this instantiation.
    overlay: &'a [Entity],
    arena: &'a mut ProvenanceArena,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        store: &'a FactStore,
        facts: &'a dyn ProgramFacts,
        overlay: &'a [Entity],
        arena: &'a mut ProvenanceArena,
    ) -> Self {
        Self {
            store,
            facts,
            overlay,
            arena,
        }
    }

    fn env(&self) -> MatchEnv<'a> {
        MatchEnv::new(self.facts, self.facts)
    }

    /// True when the goal has at least one solution.
    pub fn holds(&mut self, goal: &Goal, input: &BindingMap) -> Result<bool, EngineError> {
        Ok(!self.solve(goal, input.clone())?.is_empty())
    }

    pub fn solve(&mut self, goal: &Goal, input: BindingMap) -> Result<BindingsSet, EngineError> {
        match goal {
            Goal::True => Ok(BindingsSet::single(input)),
            Goal::False => Ok(BindingsSet::new()),
            Goal::And(items) => {
                let mut current = BindingsSet::single(input);
                for item in items {
                    let mut next = BindingsSet::new();
                    for map in current {
                        next.union(self.solve(item, map)?);
                    }
                    if next.is_empty() {
                        return Ok(next);
                    }
                    current = next;
                }
                Ok(current)
            }
            Goal::Or(items) => {
                let mut out = BindingsSet::new();
                for item in items {
                    out.union(self.solve(item, input.clone())?);
                }
                Ok(out)
            }
            Goal::Not(inner) => {
                let holds = !self.holds(inner, &input)?;
                Ok(test(holds, input))
            }
            Goal::Implies(left, right) => {
                let mut holds = true;
                for map in self.solve(left, input.clone())? {
                    if !self.holds(right, &map)? {
                        holds = false;
                        break;
                    }
                }
                Ok(test(holds, input))
            }
            Goal::Iff(left, right) => {
                let holds = self.holds(left, &input)? == self.holds(right, &input)?;
                Ok(test(holds, input))
            }
            Goal::Exists { binders, body } => {
                let names = binders.iter().map(String::as_str);
                let inner = input.clone().project_out(names.clone());
                let mut out = BindingsSet::new();
                for map in self.solve(body, inner)? {
                    if let Some(merged) = map.project_out(names.clone()).consistent_merge(&input) {
                        out.insert(merged);
                    }
                }
                Ok(out)
            }
            Goal::Forall {
                binders,
                range,
                body,
            } => {
                let inner = input.clone().project_out(binders.iter().map(String::as_str));
                let mut holds = true;
                for map in self.solve(range, inner)? {
                    if !self.holds(body, &map)? {
                        holds = false;
                        break;
                    }
                }
                Ok(test(holds, input))
            }
            Goal::Trait { name, args, span } => self.solve_trait(name, args, input, *span),
            Goal::Matches {
                subject,
                fragment,
                span,
            } => self.solve_matches(subject, fragment, input, *span),
            Goal::Eq { left, right, span } => self.solve_eq(left, right, input, *span),
            Goal::Ne { left, right, span } => {
                let (Some(l), Some(r)) = (
                    self.value_of(left, &input, *span)?,
                    self.value_of(right, &input, *span)?,
                ) else {
                    return Err(unbound_comparison(left, right, *span));
                };
                Ok(test(l != r, input))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Atoms
    // -----------------------------------------------------------------------

    fn solve_trait(
        &mut self,
        name: &str,
        args: &[GoalTerm],
        input: BindingMap,
        span: Span,
    ) -> Result<BindingsSet, EngineError> {
        let store = self.store;
        let relation = store.get(name).ok_or_else(|| {
            InternalError::new(COMPONENT, format!("relation `{name}` is not registered"))
        })?;
        if relation.signature.arity() != args.len() {
            return Err(InternalError::new(
                COMPONENT,
                format!("trait `{name}` applied to {} arguments", args.len()),
            )
            .into());
        }
        let mut out = BindingsSet::new();
        'tuples: for tuple in relation.tuples() {
            let mut map = input.clone();
            for (arg, value) in args.iter().zip(tuple.ordered_values()) {
                match self.unify(arg, value, map, span)? {
                    Some(next) => map = next,
                    None => continue 'tuples,
                }
            }
            out.insert(map);
        }
        Ok(out)
    }

    fn solve_matches(
        &mut self,
        subject: &GoalTerm,
        fragment: &Fragment,
        input: BindingMap,
        span: Span,
    ) -> Result<BindingsSet, EngineError> {
        if let Some(value) = self.value_of(subject, &input, span)? {
            let mut out = BindingsSet::new();
            out.extend(self.match_into(fragment, &value, &input)?);
            return Ok(out);
        }
        let ty = match subject {
            GoalTerm::Var { ty, .. } => ty.clone(),
            GoalTerm::Wildcard => ParamType::any(),
            other => {
                return Err(Diagnostic::error(
                    Category::UnsupportedPattern,
                    format!("`{other}` cannot be the subject of `matches`"),
                )
                .at_opt(span_location(span))
                .into());
            }
        };
        let mut out = BindingsSet::new();
        for candidate in self.candidates(&ty, fragment) {
            let Some(mut map) = self.match_into(fragment, &candidate, &input)? else {
                continue;
            };
            if let GoalTerm::Var { name, .. } = subject
                && !map.bind(name, candidate)
            {
                continue;
            }
            out.insert(map);
        }
        Ok(out)
    }

    fn solve_eq(
        &mut self,
        left: &GoalTerm,
        right: &GoalTerm,
        input: BindingMap,
        span: Span,
    ) -> Result<BindingsSet, EngineError> {
        let l = self.value_of(left, &input, span)?;
        let r = self.value_of(right, &input, span)?;
        let out = match (l, r) {
            (Some(l), Some(r)) => (l == r).then_some(input),
            (Some(value), None) => self.unify(right, &value, input, span)?,
            (None, Some(value)) => self.unify(left, &value, input, span)?,
            (None, None) => match (left, right) {
                (GoalTerm::Var { name, ty }, GoalTerm::Pattern(fragment))
                | (GoalTerm::Pattern(fragment), GoalTerm::Var { name, ty }) => {
                    Some(self.generate(name, ty, fragment, input, span)?)
                }
                _ => return Err(unbound_comparison(left, right, span)),
            },
        };
        Ok(out.into_iter().collect())
    }

    /// Bind `name` to a fresh entity generated from `fragment`.
    fn generate(
        &mut self,
        name: &str,
        ty: &ParamType,
        fragment: &Fragment,
        input: BindingMap,
        span: Span,
    ) -> Result<BindingMap, EngineError> {
        let mut generator = Generator::new(&mut *self.arena, self.facts);
        let mut out = fragment
            .instantiate(&input, &mut generator)
            .map_err(|err| err.into_engine_error(span))?;
        let value = out
            .take_result()
            .ok_or_else(|| InternalError::new(COMPONENT, "generation produced no entity"))?;
        if !ty.accepts(&value, self.facts) {
            return Err(Diagnostic::error(
                Category::TypeMismatch,
                format!("generated `{value}` is not a {ty} as `{name}` requires"),
            )
            .at_opt(span_location(span))
            .into());
        }
        out.bind(name, value);
        Ok(out)
    }

    fn match_into(
        &self,
        fragment: &Fragment,
        value: &Entity,
        input: &BindingMap,
    ) -> Result<Option<BindingMap>, EngineError> {
        let env = self.env();
        Ok(fragment
            .match_entity(value, &env)?
            .and_then(|map| map.without_result().consistent_merge(input)))
    }

    /// Extend `map` so that `term` denotes `value`. Bound values must be the
    /// same entity at the same program location, so joins never pair a fact
    /// with a look-alike declared elsewhere.
    fn unify(
        &mut self,
        term: &GoalTerm,
        value: &Entity,
        mut map: BindingMap,
        span: Span,
    ) -> Result<Option<BindingMap>, EngineError> {
        Ok(match term {
            GoalTerm::Wildcard => Some(map),
            GoalTerm::Var { name, ty } => match map.lookup_entity(name) {
                Some(bound) => bound.aliases(value).then_some(map),
                None if ty.accepts(value, self.facts) => {
                    map.bind(name, value.clone());
                    Some(map)
                }
                None => None,
            },
            GoalTerm::Const(entity) => entity.aliases(value).then_some(map),
            GoalTerm::Pattern(fragment) => self.match_into(fragment, value, &map)?,
            GoalTerm::Apply { .. } => {
                let computed = self.value_of(term, &map, span)?;
                (computed.as_ref() == Some(value)).then_some(map)
            }
        })
    }

    /// The entity a term denotes under `map`, when it is ground.
    fn value_of(
        &mut self,
        term: &GoalTerm,
        map: &BindingMap,
        span: Span,
    ) -> Result<Option<Entity>, EngineError> {
        Ok(match term {
            GoalTerm::Wildcard | GoalTerm::Pattern(_) => None,
            GoalTerm::Var { name, .. } => map.lookup_entity(name).cloned(),
            GoalTerm::Const(entity) => Some(entity.clone()),
            GoalTerm::Apply { func, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    match self.value_of(arg, map, span)? {
                        Some(value) => values.push(value),
                        None => {
                            return Err(Diagnostic::error(
                                Category::UnresolvedBinding,
                                format!("argument `{arg}` of `{}` is not bound", func.as_str()),
                            )
                            .at_opt(span_location(span))
                            .into());
                        }
                    }
                }
                Some(self.apply(*func, &values, span)?)
            }
        })
    }

    /// Built-in functions. An undefined result is `Empty`.
    fn apply(&self, func: Builtin, args: &[Entity], span: Span) -> Result<Entity, EngineError> {
        let [arg] = args else {
            return Err(Diagnostic::error(
                Category::ArityMismatch,
                format!("`{}` takes 1 argument, found {}", func.as_str(), args.len()),
            )
            .at_opt(span_location(span))
            .into());
        };
        let node = arg.as_node();
        let value = match func {
            Builtin::TypeOf => self.facts.type_of(arg).map(Entity::Type),
            Builtin::DeclarationOf => match arg {
                Entity::Type(ty) => self.facts.declaration_of(ty).cloned().map(Entity::Node),
                _ => None,
            },
            Builtin::NameOf => node.and_then(|node| node.name()).map(Entity::name),
            Builtin::SignatureOf => node.and_then(|node| node.signature()).map(Entity::Signature),
            Builtin::DeclaringType => node
                .and_then(|node| {
                    self.arena
                        .get(node.id)
                        .and_then(|prov| prov.declaring_type.clone())
                        .or_else(|| self.facts.declaring_type(node.id))
                })
                .map(Entity::Type),
        };
        Ok(value.unwrap_or(Entity::Empty))
    }

    /// Entities an unbound subject of type `ty` may take for `fragment`.
    fn candidates(&self, ty: &ParamType, fragment: &Fragment) -> Vec<Entity> {
        let category = ty.category();
        let tags = match fragment {
            Fragment::Structure { tag, .. } => vec![*tag],
            Fragment::FieldAccess { .. } => vec![NodeTag::FieldAccess, NodeTag::Name],
            Fragment::FieldAssign { .. } => vec![NodeTag::Assign],
            _ => Vec::new(),
        };
        let mut out: Vec<Entity> = if tags.is_empty() {
            self.facts.candidates(category, None).to_vec()
        } else {
            tags.iter()
                .flat_map(|tag| self.facts.candidates(category, Some(*tag)))
                .cloned()
                .collect()
        };
        out.extend(
            self.overlay
                .iter()
                .filter(|entity| accepts_root(category, &tags, entity))
                .cloned(),
        );
        out.retain(|entity| ty.accepts(entity, self.facts));
        out
    }
}

fn test(holds: bool, input: BindingMap) -> BindingsSet {
    if holds {
        BindingsSet::single(input)
    } else {
        BindingsSet::new()
    }
}

fn accepts_root(category: EntityType, tags: &[NodeTag], entity: &Entity) -> bool {
    if !category.accepts(entity) {
        return false;
    }
    tags.is_empty() || entity.as_node().is_some_and(|node| tags.contains(&node.tag()))
}

fn unbound_comparison(left: &GoalTerm, right: &GoalTerm, span: Span) -> EngineError {
    Diagnostic::error(
        Category::UnresolvedBinding,
        format!("cannot compare `{left}` with `{right}`: a side is not bound"),
    )
    .at_opt(span_location(span))
    .into()
}
