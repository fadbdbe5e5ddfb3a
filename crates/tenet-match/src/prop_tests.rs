//! Property tests for match/generate.
//!
//! 1. A pattern obtained by abstracting arbitrary subtrees of an expression
//!    into variables matches that expression, and generating from the
//!    resulting bindings rebuilds it structurally with fresh ids.
//!    Declarations whose modifier sets are matched by an unordered pattern
//!    rebuild equal to the original, whatever the written modifier order.
//! 2. Modifier sets: the access slot always receives the access specifier,
//!    whatever the written order.

use proptest::prelude::*;
use tenet_ast::rules::{Pattern, build};
use tenet_ast::{BinOp, Entity, FileId, Modifier, Node, NodeFactory, TypeDesc};
use tenet_types::IntrinsicTypes;

use crate::{EmptyScope, FragmentCompiler, Generator, MatchEnv, NoContext};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Shape {
    Int(i64),
    Str(String),
    Name(String),
    Binary(BinOp, Box<Shape>, Box<Shape>),
    Call(Option<Box<Shape>>, String, Vec<Shape>),
    Field(Box<Shape>, String),
}

fn arb_ident() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "name", "count"]).prop_map(str::to_string)
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        (-5i64..5).prop_map(Shape::Int),
        arb_ident().prop_map(Shape::Str),
        arb_ident().prop_map(Shape::Name),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            (
                prop::sample::select(vec![BinOp::Add, BinOp::Eq, BinOp::And]),
                inner.clone(),
                inner.clone()
            )
                .prop_map(|(op, l, r)| Shape::Binary(op, Box::new(l), Box::new(r))),
            (
                prop::option::of(inner.clone()),
                arb_ident(),
                prop::collection::vec(inner.clone(), 0..3)
            )
                .prop_map(|(recv, m, args)| Shape::Call(recv.map(Box::new), m, args)),
            (inner, arb_ident()).prop_map(|(recv, f)| Shape::Field(Box::new(recv), f)),
        ]
    })
}

fn build_node(f: &mut NodeFactory, shape: &Shape) -> Node {
    match shape {
        Shape::Int(n) => f.lit_int(*n),
        Shape::Str(s) => f.lit_str(s),
        Shape::Name(n) => f.name(n),
        Shape::Binary(op, l, r) => {
            let l = build_node(f, l);
            let r = build_node(f, r);
            f.binary(*op, l, r)
        }
        Shape::Call(recv, m, args) => {
            let recv = recv.as_ref().map(|r| build_node(f, r));
            let args = args.iter().map(|a| build_node(f, a)).collect();
            f.call(recv, m, args)
        }
        Shape::Field(recv, name) => {
            let recv = build_node(f, recv);
            f.field_access(recv, name)
        }
    }
}

/// Mirror `entity` as a pattern, replacing node positions whose pre-order
/// index has its bit set in `mask` with variables.
fn abstract_pattern(entity: &Entity, mask: u64, counter: &mut u32) -> Pattern {
    let idx = *counter;
    *counter += 1;
    match entity {
        Entity::Node(_) if (mask >> (idx % 64)) & 1 == 1 => build::var(&format!("v{idx}")),
        Entity::Node(node) => build::node(
            node.tag(),
            node.slots()
                .iter()
                .map(|slot| abstract_pattern(slot, mask, counter))
                .collect(),
        ),
        Entity::List(items) => build::list(
            items
                .iter()
                .map(|item| abstract_pattern(item, mask, counter))
                .collect(),
        ),
        Entity::Empty => build::empty(),
        other => build::resolved(other.clone()),
    }
}

fn arb_modifiers() -> impl Strategy<Value = Vec<Modifier>> {
    (
        prop::sample::select(vec![Modifier::Public, Modifier::Protected, Modifier::Private]),
        prop::sample::select(vec![Modifier::Static, Modifier::Final, Modifier::Abstract]),
        any::<bool>(),
    )
        .prop_map(|(access, other, access_first)| {
            if access_first {
                vec![access, other]
            } else {
                vec![other, access]
            }
        })
}

proptest! {
    #[test]
    fn generate_inverts_match(shape in arb_shape(), mask in any::<u64>()) {
        let mut factory = NodeFactory::new(FileId(0));
        let node = build_node(&mut factory, &shape);
        let entity = Entity::Node(node.clone());
        let pattern = abstract_pattern(&entity, mask, &mut 0);
        let fragment = FragmentCompiler::new(&EmptyScope).compile(&pattern).unwrap();

        let env = MatchEnv::new(&NoContext, &IntrinsicTypes);
        let bindings = fragment.match_entity(&entity, &env).unwrap();
        prop_assert!(bindings.is_some(), "{} does not match {}", fragment, node);
        let bindings = bindings.unwrap();

        let mut arena = factory.arena();
        let mut generator = Generator::new(&mut arena, &IntrinsicTypes);
        let rebuilt = fragment.generate(&bindings, &mut generator).unwrap();
        prop_assert_eq!(&rebuilt, &entity);

        let original_ids = node.ids();
        let rebuilt_ids = rebuilt.as_node().map(Node::ids).unwrap_or_default();
        prop_assert!(rebuilt_ids.iter().all(|id| !original_ids.contains(id)));
    }

    #[test]
    fn generate_inverts_match_on_modifier_sets(mods in arb_modifiers(), value in -5i64..5) {
        let mut factory = NodeFactory::new(FileId(0));
        let init = factory.lit_int(value);
        let field = factory.field(mods, TypeDesc::named("int"), "count", Some(init));
        let entity = Entity::Node(field);
        let pattern = build::field(
            build::unordered(vec![build::access(Some("access")), build::var("m")]),
            build::list(vec![]),
            build::ty("int"),
            build::ident("count"),
            build::var("init"),
        );
        let fragment = FragmentCompiler::new(&EmptyScope).compile(&pattern).unwrap();

        let env = MatchEnv::new(&NoContext, &IntrinsicTypes);
        let bindings = fragment.match_entity(&entity, &env).unwrap().unwrap();

        let mut arena = factory.arena();
        let mut generator = Generator::new(&mut arena, &IntrinsicTypes);
        let rebuilt = fragment.generate(&bindings, &mut generator).unwrap();
        prop_assert_eq!(&rebuilt, &entity);
    }

    #[test]
    fn access_slot_takes_the_access_specifier(mods in arb_modifiers()) {
        let access = mods.iter().copied().find(|m| m.is_access()).unwrap();
        let other = mods.iter().copied().find(|m| !m.is_access()).unwrap();
        let fragment = FragmentCompiler::new(&EmptyScope)
            .compile(&build::unordered(vec![build::access(Some("access")), build::var("m")]))
            .unwrap();
        let entity = Entity::List(mods.into_iter().map(Entity::Modifier).collect());
        let env = MatchEnv::new(&NoContext, &IntrinsicTypes);
        let map = fragment.match_entity(&entity, &env).unwrap().unwrap();
        prop_assert_eq!(map.lookup_entity("access"), Some(&Entity::Modifier(access)));
        prop_assert_eq!(map.lookup_entity("m"), Some(&Entity::Modifier(other)));
    }
}
