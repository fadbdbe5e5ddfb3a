use tenet_ast::{Entity, NodeKind, NodeTag};
use tenet_diag::InternalError;
use tenet_types::BindingMap;

use crate::{Fragment, MatchEnv};

pub(crate) const COMPONENT: &str = "fragment matcher";

impl Fragment {
    /// Match a concrete entity.
    ///
    /// `Ok(None)` is an ordinary mismatch. On success the returned map binds
    /// every free variable of this fragment and holds `entity` as result.
    pub fn match_entity(
        &self,
        entity: &Entity,
        env: &MatchEnv<'_>,
    ) -> Result<Option<BindingMap>, InternalError> {
        match self {
            Fragment::Wildcard => Ok(Some(BindingMap::with_result(entity.clone()))),
            Fragment::Var { name, ty } => {
                if !ty.accepts(entity, env.types) {
                    return Ok(None);
                }
                let mut map = BindingMap::with_result(entity.clone());
                map.bind(name, entity.clone());
                Ok(Some(map))
            }
            Fragment::Resolved(expected) => {
                Ok((expected == entity).then(|| BindingMap::with_result(entity.clone())))
            }
            Fragment::Empty => {
                Ok(entity.is_empty().then(|| BindingMap::with_result(Entity::Empty)))
            }
            Fragment::Ordered(items) => match_ordered(items, entity, env),
            Fragment::Unordered {
                access,
                fixed,
                rest,
            } => crate::unordered::match_unordered(
                access.as_deref(),
                fixed,
                rest.as_deref(),
                entity,
                env,
            ),
            Fragment::Structure { tag, slots } => match_structure(*tag, slots, entity, env),
            Fragment::FieldAccess {
                receiver,
                field,
                as_lhs,
            } => match_field_access(receiver, field, *as_lhs, entity, env),
            Fragment::FieldAssign { target, value } => {
                let Some(node) = entity.as_node() else {
                    return Ok(None);
                };
                let NodeKind::Assign {
                    target: lhs,
                    value: rhs,
                } = &node.kind
                else {
                    return Ok(None);
                };
                let parts = [
                    (target.as_ref(), Entity::Node((**lhs).clone())),
                    (value.as_ref(), Entity::Node((**rhs).clone())),
                ];
                merge_children(parts.iter().map(|(f, e)| (*f, e)), entity, env)
            }
        }
    }
}

/// Match every `(fragment, entity)` pair and merge the child maps with their
/// results stripped; `whole` becomes the result.
pub(crate) fn merge_children<'f, 'e>(
    pairs: impl IntoIterator<Item = (&'f Fragment, &'e Entity)>,
    whole: &Entity,
    env: &MatchEnv<'_>,
) -> Result<Option<BindingMap>, InternalError> {
    let mut merged = BindingMap::with_result(whole.clone());
    for (fragment, entity) in pairs {
        let Some(child) = fragment.match_entity(entity, env)? else {
            return Ok(None);
        };
        match merged.unify_merge(&child.without_result()) {
            Some(next) => merged = next,
            None => return Ok(None),
        }
    }
    Ok(Some(merged))
}

fn match_ordered(
    items: &[Fragment],
    entity: &Entity,
    env: &MatchEnv<'_>,
) -> Result<Option<BindingMap>, InternalError> {
    let elements: &[Entity] = match entity {
        Entity::List(elements) => elements,
        Entity::Empty => &[],
        _ => return Ok(None),
    };
    if elements.len() != items.len() {
        return Ok(None);
    }
    merge_children(items.iter().zip(elements), entity, env)
}

fn match_structure(
    tag: NodeTag,
    slots: &[Fragment],
    entity: &Entity,
    env: &MatchEnv<'_>,
) -> Result<Option<BindingMap>, InternalError> {
    if slots.len() != tag.slot_count() {
        return Err(InternalError::new(
            COMPONENT,
            format!(
                "{} fragment has {} slots, expected {}",
                tag.as_str(),
                slots.len(),
                tag.slot_count()
            ),
        ));
    }
    let Some(node) = entity.as_node() else {
        return Ok(None);
    };
    // `this` written in a pattern also matches an implicit instance receiver.
    if tag == NodeTag::This
        && matches!(
            node.kind,
            NodeKind::ImplicitReceiver {
                is_static: false,
                ..
            }
        )
    {
        return Ok(Some(BindingMap::with_result(entity.clone())));
    }
    if node.tag() != tag {
        return Ok(None);
    }
    let mut values = node.slots();
    if values.len() != slots.len() {
        return Err(InternalError::new(
            COMPONENT,
            format!(
                "{} node has {} slots, fragment has {}",
                tag.as_str(),
                values.len(),
                slots.len()
            ),
        ));
    }
    if tag == NodeTag::Call && values[0].is_empty() && slots[0] != Fragment::Empty {
        values[0] = env.implicit_receiver(node);
    }
    merge_children(slots.iter().zip(&values), entity, env)
}

fn match_field_access(
    receiver: &Fragment,
    field: &Fragment,
    as_lhs: bool,
    entity: &Entity,
    env: &MatchEnv<'_>,
) -> Result<Option<BindingMap>, InternalError> {
    let Some(node) = entity.as_node() else {
        return Ok(None);
    };
    if !as_lhs && env.context.is_assignment_target(node.id) {
        return Ok(None);
    }
    let (target, name) = match &node.kind {
        NodeKind::FieldAccess {
            receiver: target,
            field: name,
        } => (Entity::Node((**target).clone()), name),
        NodeKind::Name(name) if env.context.is_field_reference(node.id) => {
            (env.implicit_receiver(node), name)
        }
        _ => return Ok(None),
    };
    let name = Entity::name(name.clone());
    merge_children([(receiver, &target), (field, &name)], entity, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenet_ast::rules::build;
    use tenet_ast::{FileId, Modifier, NodeFactory, NodeId, TypeDesc};
    use tenet_types::{EntityType, IntrinsicTypes, ParamType};

    use crate::{EmptyScope, Enclosing, FragmentCompiler, NoContext, SyntaxContext};

    /// Context where every node sits in an instance method of `Person`, and
    /// the listed ids are assignment targets or field references.
    struct InPerson {
        targets: Vec<NodeId>,
        field_refs: Vec<NodeId>,
    }

    impl SyntaxContext for InPerson {
        fn enclosing(&self, _id: NodeId) -> Option<Enclosing> {
            Some(Enclosing {
                ty: TypeDesc::named("Person"),
                is_static: false,
            })
        }

        fn is_assignment_target(&self, id: NodeId) -> bool {
            self.targets.contains(&id)
        }

        fn is_field_reference(&self, id: NodeId) -> bool {
            self.field_refs.contains(&id)
        }
    }

    fn compile(pattern: &tenet_ast::rules::Pattern) -> Fragment {
        FragmentCompiler::new(&EmptyScope).compile(pattern).unwrap()
    }

    fn detached() -> MatchEnv<'static> {
        MatchEnv::new(&NoContext, &IntrinsicTypes)
    }

    #[test]
    fn structure_binds_every_slot_variable() {
        let mut f = NodeFactory::new(FileId(0));
        let init = f.lit_str("nickName");
        let field = f.field(vec![Modifier::Private], TypeDesc::string(), "name", Some(init));
        let pattern = compile(&build::field(
            build::var("mods"),
            build::list(vec![]),
            build::ty("String"),
            build::var("n"),
            build::var("init"),
        ));
        let map = pattern
            .match_entity(&Entity::Node(field.clone()), &detached())
            .unwrap()
            .unwrap();
        assert_eq!(map.lookup_entity("n"), Some(&Entity::name("name")));
        assert_eq!(
            map.lookup_entity("mods"),
            Some(&Entity::List(vec![Entity::Modifier(Modifier::Private)]))
        );
        assert_eq!(map.result(), Some(&Entity::Node(field)));
    }

    #[test]
    fn repeated_variables_must_agree() {
        let mut f = NodeFactory::new(FileId(0));
        let a = f.name("a");
        let b = f.name("b");
        let a2 = f.name("a");
        let pattern = compile(&build::node(
            NodeTag::Assign,
            vec![build::var("x"), build::var("x")],
        ));
        let same = f.assign(a.clone(), a2);
        let different = f.assign(a, b);
        assert!(pattern.match_entity(&Entity::Node(same), &detached()).unwrap().is_some());
        assert!(pattern
            .match_entity(&Entity::Node(different), &detached())
            .unwrap()
            .is_none());
    }

    #[test]
    fn typed_variables_check_categories() {
        let mut f = NodeFactory::new(FileId(0));
        let lit = Entity::Node(f.lit_int(1));
        let field_var = Fragment::var("f", ParamType::Category(EntityType::Field));
        assert!(field_var.match_entity(&lit, &detached()).unwrap().is_none());
        let expr_var = Fragment::var("e", ParamType::Category(EntityType::Expression));
        assert!(expr_var.match_entity(&lit, &detached()).unwrap().is_some());
    }

    #[test]
    fn ordered_lists_need_equal_length() {
        let pattern = Fragment::Ordered(vec![Fragment::Wildcard]);
        let one = Entity::List(vec![Entity::name("a")]);
        let two = Entity::List(vec![Entity::name("a"), Entity::name("b")]);
        assert!(pattern.match_entity(&one, &detached()).unwrap().is_some());
        assert!(pattern.match_entity(&two, &detached()).unwrap().is_none());
        assert!(Fragment::Ordered(vec![])
            .match_entity(&Entity::Empty, &detached())
            .unwrap()
            .is_some());
    }

    #[test]
    fn field_reads_skip_assignment_targets() {
        let mut f = NodeFactory::new(FileId(0));
        let this = f.this();
        let target = f.field_access(this, "count");
        let one = f.lit_int(1);
        let target_id = target.id;
        let assign = f.assign(target.clone(), one);
        let ctx = InPerson {
            targets: vec![target_id],
            field_refs: vec![],
        };
        let env = MatchEnv::new(&ctx, &IntrinsicTypes);

        let read = compile(&build::node(
            NodeTag::FieldAccess,
            vec![build::var("r"), build::var("f")],
        ));
        assert!(read.match_entity(&Entity::Node(target), &env).unwrap().is_none());

        let write = compile(&build::node(
            NodeTag::Assign,
            vec![
                build::node(NodeTag::FieldAccess, vec![build::var("r"), build::var("f")]),
                build::var("v"),
            ],
        ));
        let map = write.match_entity(&Entity::Node(assign), &env).unwrap().unwrap();
        assert_eq!(map.lookup_entity("f"), Some(&Entity::name("count")));
    }

    #[test]
    fn bare_field_names_match_with_an_implicit_receiver() {
        let mut f = NodeFactory::new(FileId(0));
        let name = f.name("count");
        let ctx = InPerson {
            targets: vec![],
            field_refs: vec![name.id],
        };
        let env = MatchEnv::new(&ctx, &IntrinsicTypes);
        let read = compile(&build::node(
            NodeTag::FieldAccess,
            vec![build::var("r"), build::ident("count")],
        ));
        let map = read.match_entity(&Entity::Node(name), &env).unwrap().unwrap();
        let receiver = map.lookup_entity("r").and_then(Entity::as_node).unwrap();
        assert_eq!(
            receiver.kind,
            NodeKind::ImplicitReceiver {
                ty: TypeDesc::named("Person"),
                is_static: false
            }
        );
    }

    #[test]
    fn omitted_call_receiver_binds_implicit_this() {
        let mut f = NodeFactory::new(FileId(0));
        let call = f.call(None, "save", vec![]);
        let ctx = InPerson {
            targets: vec![],
            field_refs: vec![],
        };
        let env = MatchEnv::new(&ctx, &IntrinsicTypes);

        let with_var = compile(&build::node(
            NodeTag::Call,
            vec![build::var("r"), build::ident("save"), build::list(vec![])],
        ));
        let map = with_var
            .match_entity(&Entity::Node(call.clone()), &env)
            .unwrap()
            .unwrap();
        assert!(matches!(
            map.lookup_entity("r").and_then(Entity::as_node).map(|n| &n.kind),
            Some(NodeKind::ImplicitReceiver { is_static: false, .. })
        ));

        let with_this = compile(&build::node(
            NodeTag::Call,
            vec![
                build::node(NodeTag::This, vec![]),
                build::ident("save"),
                build::list(vec![]),
            ],
        ));
        assert!(with_this.match_entity(&Entity::Node(call.clone()), &env).unwrap().is_some());

        // Without context the receiver stays empty and only untyped variables take it.
        let map = with_var
            .match_entity(&Entity::Node(call), &detached())
            .unwrap()
            .unwrap();
        assert_eq!(map.lookup_entity("r"), Some(&Entity::Empty));
    }

    #[test]
    fn malformed_structure_is_an_internal_error() {
        let broken = Fragment::Structure {
            tag: NodeTag::Param,
            slots: vec![Fragment::Wildcard],
        };
        let err = broken
            .match_entity(&Entity::name("x"), &detached())
            .unwrap_err();
        assert_eq!(err.component, COMPONENT);
    }
}
