//! Property tests for sessions.
//!
//! 1. Singleton resolution is deterministic: fresh sessions over the same
//!    program pick the same node and synthesize structurally equal copies,
//!    whatever order the class members were written in.

use proptest::prelude::*;
use tenet_ast::rules::{InterfaceDecl, OptionDecl, RuleModule, Term, build};
use tenet_ast::{Entity, FileId, Modifier, NodeFactory, Span, Spanned, TypeDesc};
use tenet_solve::{DECLARES_FIELD, ProgramIndex};

use crate::Session;

/// `class Person { private String name; private String nickName = "nick";
/// int age; }` with members in `order`, and `class Student extends Person
/// { private String name; }`.
fn program(order: &[usize]) -> ProgramIndex {
    let mut f = NodeFactory::new(FileId(0));
    let mut members = Vec::new();
    for idx in order {
        let member = match idx {
            0 => f.field(vec![Modifier::Private], TypeDesc::string(), "name", None),
            1 => {
                let init = f.lit_str("nick");
                f.field(vec![Modifier::Private], TypeDesc::string(), "nickName", Some(init))
            }
            _ => f.field(vec![], TypeDesc::named("int"), "age", None),
        };
        members.push(member);
    }
    let person = f.class("Person", vec![], None, members);
    let shadow = f.field(vec![Modifier::Private], TypeDesc::string(), "name", None);
    let student = f.class("Student", vec![], Some(TypeDesc::named("Person")), vec![shadow]);
    ProgramIndex::new(vec![person, student])
}

/// `Property(owner)` with the singleton `attr(f)`; `PublicCopy(attrName)`
/// picks the field and synthesizes a public copy of it for `owner`.
fn module() -> RuleModule {
    let interface = InterfaceDecl {
        name: Spanned::synthetic("Property".into()),
        params: vec![build::param("owner", build::category("type"))],
        traits: vec![build::trait_decl(
            "attr",
            vec![build::param("f", build::category("field"))],
            build::singleton(),
        )],
        statements: vec![],
        span: Span::synthetic(),
    };
    let field = |modifiers, ty, name, init| {
        build::field(modifiers, build::list(vec![]), ty, name, init)
    };
    let option = OptionDecl {
        name: Spanned::synthetic("PublicCopy".into()),
        interface: Spanned::synthetic("Property".into()),
        params: vec![build::param("attrName", build::category("value"))],
        traits: vec![build::trait_decl(
            "copy",
            vec![
                build::param("host", build::category("type")),
                build::param("c", build::category("field")),
            ],
            build::local(),
        )],
        statements: vec![
            build::realize(
                &["attr"],
                build::and(vec![
                    build::trait_app(DECLARES_FIELD, vec![build::tvar("owner"), build::tvar("f")]),
                    build::matches(
                        build::tvar("f"),
                        field(
                            build::wildcard(),
                            build::wildcard(),
                            build::var("attrName"),
                            build::wildcard(),
                        ),
                    ),
                ]),
            ),
            build::realize(
                &["copy"],
                build::and(vec![
                    build::eq(build::tvar("host"), build::tvar("owner")),
                    build::matches(
                        build::tvar("f"),
                        field(
                            build::wildcard(),
                            build::var("ty"),
                            build::wildcard(),
                            build::var("init"),
                        ),
                    ),
                    build::eq(
                        build::tvar("c"),
                        Term::Pattern(field(
                            build::unordered(vec![build::modifier(Modifier::Public)]),
                            build::var("ty"),
                            build::var("attrName"),
                            build::var("init"),
                        )),
                    ),
                ]),
            ),
        ],
        span: Span::synthetic(),
    };
    RuleModule {
        interfaces: vec![interface],
        options: vec![option],
    }
}

struct Outcome {
    solved: bool,
    attr: Option<Entity>,
    generated: Vec<(Entity, Option<TypeDesc>)>,
}

fn run(order: &[usize], owner: &str, attr: &str) -> Outcome {
    let session = Session::new(module(), program(order));
    let mut table = session
        .construct("PublicCopy", vec![owner.into(), attr.into()])
        .unwrap();
    let solved = session.solve(&mut table).is_ok();
    Outcome {
        solved,
        attr: table.lookup_entity("f").cloned(),
        generated: session
            .generate_locals(&table)
            .into_iter()
            .map(|entity| (entity.entity, entity.host))
            .collect(),
    }
}

fn arb_order() -> impl Strategy<Value = Vec<usize>> {
    Just(vec![0, 1, 2]).prop_shuffle()
}

fn arb_target() -> impl Strategy<Value = (&'static str, &'static str)> {
    prop::sample::select(vec![
        ("Person", "name"),
        ("Person", "nickName"),
        ("Person", "age"),
        ("Student", "name"),
        ("Student", "age"),
    ])
}

proptest! {
    #[test]
    fn fresh_sessions_resolve_the_same_singleton(
        order in arb_order(),
        (owner, attr) in arb_target(),
    ) {
        let first = run(&order, owner, attr);
        let second = run(&order, owner, attr);

        prop_assert_eq!(first.solved, second.solved);
        prop_assert_eq!(first.solved, !(owner == "Student" && attr == "age"));
        prop_assert_eq!(&first.attr, &second.attr);
        prop_assert_eq!(
            first.attr.as_ref().and_then(Entity::node_id),
            second.attr.as_ref().and_then(Entity::node_id)
        );
        prop_assert_eq!(&first.generated, &second.generated);

        if first.solved {
            let field = first.attr.as_ref().and_then(Entity::as_node).unwrap();
            prop_assert_eq!(field.name(), Some(attr));
            prop_assert_eq!(first.generated.len(), 1);
            let (copy, host) = &first.generated[0];
            prop_assert_eq!(host.as_ref(), Some(&TypeDesc::named(owner)));
            let copy = copy.as_node().unwrap();
            prop_assert_eq!(copy.modifiers(), &[Modifier::Public]);
            prop_assert_eq!(copy.name(), Some(attr));
        }
    }
}
