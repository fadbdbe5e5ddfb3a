//! Shared program and rule fixtures for unit tests.

use std::sync::Arc;

use tenet_ast::rules::{
    InterfaceDecl, OptionDecl, ParamDecl, Statement, TraitDecl, build,
};
use tenet_ast::{FileId, Modifier, NodeFactory, NodeTag, Span, Spanned, TypeDesc};

use crate::{
    ConstructorArg, NoRelations, OptionMatchTable, ProgramFacts, ProgramIndex, SolverConfig,
};

/// ```text
/// class Person {
///     private String name;
///     private String nickName = "nick";
///     int age;
///     public String getName() { return name; }
///     static String key() { return "nickName"; }
/// }
/// class Student extends Person { private String name; }
/// ```
pub(crate) fn program() -> Arc<dyn ProgramFacts> {
    let mut f = NodeFactory::new(FileId(0));
    let name = f.field(vec![Modifier::Private], TypeDesc::string(), "name", None);
    let nick_init = f.lit_str("nick");
    let nick = f.field(
        vec![Modifier::Private],
        TypeDesc::string(),
        "nickName",
        Some(nick_init),
    );
    let age = f.field(vec![], TypeDesc::named("int"), "age", None);

    let read = f.name("name");
    let ret = f.ret(Some(read));
    let body = f.block(vec![ret]);
    let getter = f.method(
        vec![Modifier::Public],
        TypeDesc::string(),
        "getName",
        vec![],
        Some(body),
    );
    let key_lit = f.lit_str("nickName");
    let ret = f.ret(Some(key_lit));
    let body = f.block(vec![ret]);
    let key = f.method(vec![Modifier::Static], TypeDesc::string(), "key", vec![], Some(body));
    let person = f.class(
        "Person",
        vec![],
        None,
        vec![name, nick, age, getter, key],
    );

    let shadow = f.field(vec![Modifier::Private], TypeDesc::string(), "name", None);
    let student = f.class(
        "Student",
        vec![],
        Some(TypeDesc::named("Person")),
        vec![shadow],
    );
    Arc::new(ProgramIndex::new(vec![person, student]))
}

pub(crate) fn interface(
    name: &str,
    traits: Vec<TraitDecl>,
    statements: Vec<Statement>,
) -> InterfaceDecl {
    InterfaceDecl {
        name: Spanned::synthetic(name.to_string()),
        params: Vec::new(),
        traits,
        statements,
        span: Span::synthetic(),
    }
}

pub(crate) fn option(
    name: &str,
    interface: &str,
    params: Vec<ParamDecl>,
    traits: Vec<TraitDecl>,
    statements: Vec<Statement>,
) -> OptionDecl {
    OptionDecl {
        name: Spanned::synthetic(name.to_string()),
        interface: Spanned::synthetic(interface.to_string()),
        params,
        traits,
        statements,
        span: Span::synthetic(),
    }
}

pub(crate) fn table(
    interface: &InterfaceDecl,
    option: &OptionDecl,
    args: Vec<ConstructorArg>,
    config: SolverConfig,
) -> OptionMatchTable {
    OptionMatchTable::construct(interface, option, args, program(), &NoRelations, config)
        .unwrap_or_else(|err| panic!("construction failed: {err}"))
}

/// The singleton `attr(attrName)` picks the `"nickName"` literal; the plain
/// `holder(m)` finds the method returning it.
pub(crate) fn nick_name_table(config: SolverConfig) -> OptionMatchTable {
    let interface = interface(
        "Property",
        vec![build::trait_decl(
            "attr",
            vec![build::param("attrName", build::category("expr"))],
            build::singleton(),
        )],
        vec![],
    );
    let returns_attr = build::node(
        NodeTag::Method,
        vec![
            build::wildcard(),
            build::wildcard(),
            build::wildcard(),
            build::wildcard(),
            build::wildcard(),
            build::node(
                NodeTag::Block,
                vec![build::list(vec![build::node(
                    NodeTag::Return,
                    vec![build::var("attrName")],
                )])],
            ),
        ],
    );
    let option = option(
        "Named",
        "Property",
        vec![],
        vec![build::trait_decl(
            "holder",
            vec![build::param("m", build::category("method"))],
            build::plain(),
        )],
        vec![
            build::realize(
                &["attr"],
                build::matches(build::tvar("attrName"), build::lit_str("nickName")),
            ),
            build::realize(&["holder"], build::matches(build::tvar("m"), returns_attr)),
        ],
    );
    table(&interface, &option, vec![], config)
}
