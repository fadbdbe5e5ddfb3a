use tenet_ast::{
    Entity, Literal, Node, NodeKind, NodeTag, Provenance, ProvenanceArena, SlotError, Span,
};
use tenet_diag::{Category, Diagnostic, EngineError, InternalError};
use tenet_types::{BindingMap, Replacement, TypeOracle};

use crate::{Fragment, span_location};

const COMPONENT: &str = "fragment generator";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("the wildcard `_` cannot stand where a value must be generated")]
    Wildcard,
    #[error("variable `{name}` is not bound")]
    Unbound { name: String },
    #[error("variable `{name}` is bound to `{value}`, which is not a {expected}")]
    TypeMismatch {
        name: String,
        value: String,
        expected: String,
    },
    #[error("cannot build a {tag}: {reason}")]
    IllTyped { tag: &'static str, reason: String },
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl GenerateError {
    /// User-facing errors become diagnostics at `span`.
    pub fn into_engine_error(self, span: Span) -> EngineError {
        let category = match &self {
            GenerateError::Wildcard => Category::InvalidWildcard,
            GenerateError::Unbound { .. } => Category::UndefinedName,
            GenerateError::TypeMismatch { .. } | GenerateError::IllTyped { .. } => {
                Category::TypeMismatch
            }
            GenerateError::Internal(err) => return EngineError::Internal(err.clone()),
        };
        Diagnostic::error(category, self.to_string())
            .at_opt(span_location(span))
            .into()
    }
}

/// Allocates synthesized nodes and copies of reused subtrees.
///
/// Every produced node gets a fresh id from the arena; copies record the
/// node they were copied from.
pub struct Generator<'a> {
    arena: &'a mut ProvenanceArena,
    types: &'a dyn TypeOracle,
    copies: Vec<Replacement>,
}

impl<'a> Generator<'a> {
    pub fn new(arena: &'a mut ProvenanceArena, types: &'a dyn TypeOracle) -> Self {
        Self {
            arena,
            types,
            copies: Vec::new(),
        }
    }

    /// Roots of the subtrees copied so far, with their copies.
    pub fn copies(&self) -> &[Replacement] {
        &self.copies
    }

    pub fn fresh(&mut self, kind: NodeKind) -> Node {
        let id = self.arena.alloc(Provenance::default());
        Node::new(id, Span::synthetic(), kind)
    }

    /// A deep copy of `entity` with fresh ids for every node.
    pub fn copy(&mut self, entity: &Entity) -> Result<Entity, InternalError> {
        let copied = self.deep_copy(entity)?;
        if let (Some(original), Some(replacement)) = (entity.node_id(), copied.node_id()) {
            self.copies.push(Replacement {
                original,
                replacement,
            });
        }
        Ok(copied)
    }

    fn deep_copy(&mut self, entity: &Entity) -> Result<Entity, InternalError> {
        match entity {
            Entity::Node(node) => {
                let slots = node
                    .slots()
                    .iter()
                    .map(|slot| self.deep_copy(slot))
                    .collect::<Result<Vec<_>, _>>()?;
                let kind = NodeKind::from_slots(node.tag(), slots)
                    .map_err(|err| InternalError::new(COMPONENT, err.to_string()))?;
                let id = self.arena.alloc(Provenance {
                    copied_from: Some(node.id),
                    declaring_type: None,
                });
                Ok(Entity::Node(Node::new(id, Span::synthetic(), kind)))
            }
            Entity::List(items) => Ok(Entity::List(
                items
                    .iter()
                    .map(|item| self.deep_copy(item))
                    .collect::<Result<_, _>>()?,
            )),
            other => Ok(other.clone()),
        }
    }

    fn build(&mut self, tag: NodeTag, slots: Vec<Entity>) -> Result<Entity, GenerateError> {
        match NodeKind::from_slots(tag, slots) {
            Ok(kind) => Ok(Entity::Node(self.fresh(kind))),
            Err(err @ SlotError::Count { .. }) => {
                Err(InternalError::new(COMPONENT, err.to_string()).into())
            }
            Err(err @ SlotError::Kind { .. }) => Err(GenerateError::IllTyped {
                tag: tag.as_str(),
                reason: err.to_string(),
            }),
        }
    }
}

impl Fragment {
    /// Synthesize an entity from bound variables.
    pub fn generate(
        &self,
        bindings: &BindingMap,
        generator: &mut Generator<'_>,
    ) -> Result<Entity, GenerateError> {
        match self {
            Fragment::Wildcard => Err(GenerateError::Wildcard),
            Fragment::Empty => Ok(Entity::Empty),
            Fragment::Resolved(entity) => Ok(generator.copy(entity)?),
            Fragment::Var { name, ty } => {
                let value = bindings.lookup_entity(name).ok_or_else(|| {
                    GenerateError::Unbound { name: name.clone() }
                })?;
                if !value.is_empty() && !ty.accepts(value, generator.types) {
                    return Err(GenerateError::TypeMismatch {
                        name: name.clone(),
                        value: value.to_string(),
                        expected: ty.to_string(),
                    });
                }
                Ok(generator.copy(value)?)
            }
            Fragment::Ordered(items) => Ok(Entity::List(
                items
                    .iter()
                    .map(|item| item.generate(bindings, generator))
                    .collect::<Result<_, _>>()?,
            )),
            Fragment::Unordered {
                access,
                fixed,
                rest,
            } => {
                let mut items = Vec::new();
                for part in access.iter().map(Box::as_ref).chain(fixed).chain(rest.as_deref()) {
                    match part.generate(bindings, generator)? {
                        Entity::Empty => {}
                        Entity::List(more) => items.extend(more),
                        item => items.push(item),
                    }
                }
                if items.iter().all(|item| matches!(item, Entity::Modifier(_))) {
                    items.sort();
                }
                Ok(Entity::List(items))
            }
            Fragment::Structure { tag, slots } => {
                let values = slots
                    .iter()
                    .map(|slot| slot.generate(bindings, generator))
                    .collect::<Result<Vec<_>, _>>()?;
                generator.build(*tag, values)
            }
            Fragment::FieldAccess {
                receiver, field, ..
            } => {
                let receiver = receiver.generate(bindings, generator)?;
                let field = match field.generate(bindings, generator)? {
                    Entity::Value(Literal::Name(name)) => name,
                    other => {
                        return Err(GenerateError::IllTyped {
                            tag: NodeTag::FieldAccess.as_str(),
                            reason: format!("`{other}` is not a field name"),
                        });
                    }
                };
                let implicit = match &receiver {
                    Entity::Empty => true,
                    Entity::Node(node) => {
                        matches!(node.kind, NodeKind::ImplicitReceiver { .. })
                    }
                    _ => false,
                };
                if implicit {
                    generator.build(NodeTag::Name, vec![Entity::name(field)])
                } else {
                    generator.build(NodeTag::FieldAccess, vec![receiver, Entity::name(field)])
                }
            }
            Fragment::FieldAssign { target, value } => {
                let target = target.generate(bindings, generator)?;
                let value = value.generate(bindings, generator)?;
                generator.build(NodeTag::Assign, vec![target, value])
            }
        }
    }

    /// Generate and return `bindings` extended with the result and with the
    /// copies made along the way.
    pub fn instantiate(
        &self,
        bindings: &BindingMap,
        generator: &mut Generator<'_>,
    ) -> Result<BindingMap, GenerateError> {
        let start = generator.copies.len();
        let entity = self.generate(bindings, generator)?;
        let mut out = bindings.clone().without_result();
        out.set_result(entity);
        for copy in &generator.copies[start..] {
            out.record_replacement(copy.original, copy.replacement);
        }
        Ok(out)
    }
}
