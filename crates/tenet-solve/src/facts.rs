//! Program facts consumed by the solver.
//!
//! [`ProgramFacts`] is the seam to whatever extracted the analyzed program:
//! per-category entity collections, indexed candidates for pattern roots,
//! the built-in relations, and the lookup services (types, declarations,
//! enclosing members). [`ProgramIndex`] is the in-memory implementation
//! built from class declaration trees.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tenet_ast::{
    BinOp, Entity, Node, NodeId, NodeKind, NodeTag, Primitive, Span, TypeDesc,
};
use tenet_match::{Enclosing, SyntaxContext};
use tenet_types::{
    EntityTuple, EntityType, ParamType, TraitFlags, TraitSignature, TypeOracle, Variable,
    intrinsic_type,
};

/// A built-in relation with its pre-populated tuples.
#[derive(Debug, Clone)]
pub struct BuiltinRelation {
    pub signature: Arc<TraitSignature>,
    pub tuples: Vec<EntityTuple>,
}

pub const DECLARES_FIELD: &str = "declares-field";
pub const DECLARES_METHOD: &str = "declares-method";
pub const HAS_ANNOTATION: &str = "has-annotation";
pub const INVOKES: &str = "invokes";
pub const CALL_TARGET: &str = "call-target";
pub const DECLARED_BY: &str = "declared-by";
pub const SUPERCLASS_OF: &str = "superclass-of";
pub const COPIED_TO: &str = "copied-to";

pub trait ProgramFacts: TypeOracle + SyntaxContext {
    /// Every entity of one category.
    fn collection(&self, category: EntityType) -> &[Entity];

    /// Entities worth trying against a pattern whose root has node kind
    /// `tag`. Without a tag this is the whole collection of `category`.
    fn candidates(&self, category: EntityType, tag: Option<NodeTag>) -> &[Entity];

    fn builtin_relations(&self) -> &[BuiltinRelation];

    /// Declaration node of a program type.
    fn declaration_of(&self, ty: &TypeDesc) -> Option<&Node>;

    /// Type declaration by simple or qualified name.
    fn find_declaration(&self, name: &str) -> Option<&Node>;

    /// Fields and methods named `name`; `Type.member` restricts the owner.
    fn find_members(&self, name: &str) -> Vec<&Node>;

    /// The type declaring a member node.
    fn declaring_type(&self, member: NodeId) -> Option<TypeDesc>;

    fn node(&self, id: NodeId) -> Option<&Node>;

    fn span_of(&self, id: NodeId) -> Option<Span>;

    /// First id free for synthesized nodes.
    fn id_base(&self) -> u32;
}

// ---------------------------------------------------------------------------
// In-memory index
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ProgramIndex {
    classes: BTreeMap<String, Node>,
    by_category: BTreeMap<EntityType, Vec<Entity>>,
    by_tag: BTreeMap<NodeTag, Vec<Entity>>,
    nodes: BTreeMap<NodeId, Node>,
    parents: BTreeMap<NodeId, NodeId>,
    enclosing: BTreeMap<NodeId, Enclosing>,
    declaring: BTreeMap<NodeId, TypeDesc>,
    facts: Inferred,
    builtins: Vec<BuiltinRelation>,
    id_base: u32,
}

/// Facts derived by walking method bodies with their local scopes.
#[derive(Debug, Clone, Default)]
struct Inferred {
    expr_types: BTreeMap<NodeId, TypeDesc>,
    field_refs: BTreeMap<NodeId, NodeId>,
    assignment_targets: BTreeSet<NodeId>,
    call_targets: BTreeMap<NodeId, NodeId>,
}

impl ProgramIndex {
    pub fn new(classes: Vec<Node>) -> Self {
        let mut index = ProgramIndex::default();
        for class in classes {
            if let NodeKind::Class { name, .. } = &class.kind {
                index.classes.insert(name.clone(), class);
            }
        }
        let classes: Vec<Node> = index.classes.values().cloned().collect();
        for class in &classes {
            index.index_class(class);
        }

        let table = ClassTable {
            classes: &index.classes,
        };
        let mut facts = Inferred::default();
        for class in &classes {
            infer_class(&table, class, &mut facts);
        }
        index.facts = facts;
        index.collect_types(&classes);
        index.builtins = index.build_builtins(&classes);
        index.id_base = index.nodes.keys().last().map_or(0, |id| id.0 + 1);
        index
    }

    /// Reserve ids below `base` for nodes built outside the indexed classes.
    pub fn with_id_base(mut self, base: u32) -> Self {
        self.id_base = self.id_base.max(base);
        self
    }

    pub fn classes(&self) -> impl Iterator<Item = &Node> {
        self.classes.values()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<&Node> {
        self.parents.get(&id).and_then(|parent| self.nodes.get(parent))
    }

    fn index_class(&mut self, class: &Node) {
        let class_ty = class_type(class);
        class.walk(&mut |node, parent| {
            self.nodes.insert(node.id, node.clone());
            if let Some(parent) = parent {
                self.parents.insert(node.id, parent.id);
            }
            let entity = Entity::Node(node.clone());
            self.by_tag.entry(node.tag()).or_default().push(entity.clone());
            self.push_value(entity);
        });

        for annotation in class.annotations() {
            self.enclosing.insert(
                annotation.id,
                Enclosing {
                    ty: class_ty.clone(),
                    is_static: false,
                },
            );
        }
        let NodeKind::Class { members, .. } = &class.kind else {
            return;
        };
        for member in members {
            self.declaring.insert(member.id, class_ty.clone());
            let context = Enclosing {
                ty: class_ty.clone(),
                is_static: member.is_static(),
            };
            member.walk(&mut |node, _| {
                self.enclosing.insert(node.id, context.clone());
            });
        }
    }

    /// Type descriptors and signatures form their own collections.
    fn collect_types(&mut self, classes: &[Node]) {
        let mut types = BTreeSet::new();
        let mut signatures = BTreeSet::new();
        for class in classes {
            types.insert(class_type(class));
            class.walk(&mut |node, _| {
                if let Some(ty) = declared_type(node) {
                    types.insert(ty);
                }
                if let Some(sig) = node.signature() {
                    signatures.insert(sig);
                }
            });
        }
        for ty in types {
            self.push_value(Entity::Type(ty));
        }
        for sig in signatures {
            self.push_value(Entity::Signature(sig));
        }
    }

    fn push_value(&mut self, entity: Entity) {
        let category = EntityType::of(&entity);
        for target in EntityType::ALL {
            if category.is_assignable_to(target) {
                self.by_category.entry(target).or_default().push(entity.clone());
            }
        }
    }

    fn build_builtins(&self, classes: &[Node]) -> Vec<BuiltinRelation> {
        let mut declares_field = Vec::new();
        let mut declares_method = Vec::new();
        let mut has_annotation = Vec::new();
        let mut invokes = Vec::new();
        let mut declared_by = Vec::new();
        let mut superclass_of = Vec::new();

        for class in classes {
            let class_ty = Entity::Type(class_type(class));
            if let NodeKind::Class {
                superclass: Some(sup),
                ..
            } = &class.kind
            {
                superclass_of.push(vec![Entity::Type(sup.clone()), class_ty.clone()]);
            }
            class.walk(&mut |node, _| {
                for annotation in node.annotations() {
                    has_annotation.push(vec![node.clone().into(), annotation.clone().into()]);
                }
            });
            let NodeKind::Class { members, .. } = &class.kind else {
                continue;
            };
            for member in members {
                let entity = Entity::Node(member.clone());
                match member.tag() {
                    NodeTag::Field => declares_field.push(vec![class_ty.clone(), entity.clone()]),
                    NodeTag::Method => {
                        declares_method.push(vec![class_ty.clone(), entity.clone()]);
                        member.walk(&mut |node, _| {
                            if node.tag() == NodeTag::Call {
                                invokes.push(vec![entity.clone(), node.clone().into()]);
                            }
                        });
                    }
                    _ => {}
                }
                declared_by.push(vec![entity, class_ty.clone()]);
            }
        }

        let call_target = self
            .facts
            .call_targets
            .iter()
            .filter_map(|(call, method)| {
                Some(vec![
                    Entity::Node(self.nodes.get(call)?.clone()),
                    Entity::Node(self.nodes.get(method)?.clone()),
                ])
            })
            .collect();

        use EntityType as E;
        vec![
            builtin(DECLARES_FIELD, &[("type", E::Type), ("field", E::Field)], declares_field),
            builtin(DECLARES_METHOD, &[("type", E::Type), ("method", E::Method)], declares_method),
            builtin(
                HAS_ANNOTATION,
                &[("decl", E::Declaration), ("annotation", E::Annotation)],
                has_annotation,
            ),
            builtin(INVOKES, &[("method", E::Method), ("call", E::Expression)], invokes),
            builtin(CALL_TARGET, &[("call", E::Expression), ("method", E::Method)], call_target),
            builtin(DECLARED_BY, &[("member", E::Declaration), ("type", E::Type)], declared_by),
            builtin(SUPERCLASS_OF, &[("super", E::Type), ("sub", E::Type)], superclass_of),
            builtin(COPIED_TO, &[("original", E::Any), ("copy", E::Any)], Vec::new()),
        ]
    }

    fn class_chain(&self, name: &str) -> Vec<&Node> {
        ClassTable {
            classes: &self.classes,
        }
        .chain(name)
    }
}

/// Built-in signatures are fixed and their parameter names distinct.
fn builtin(name: &str, params: &[(&str, EntityType)], rows: Vec<Vec<Entity>>) -> BuiltinRelation {
    let signature = Arc::new(TraitSignature {
        name: name.to_string(),
        params: params
            .iter()
            .map(|(param, category)| Variable::new(*param, ParamType::Category(*category)))
            .collect(),
        flags: TraitFlags {
            is_builtin: true,
            is_static: true,
            ..TraitFlags::default()
        },
    });
    let tuples = rows
        .into_iter()
        .filter_map(|row| EntityTuple::positional(signature.clone(), row).ok())
        .collect();
    BuiltinRelation { signature, tuples }
}

fn class_type(class: &Node) -> TypeDesc {
    TypeDesc::named(class.name().unwrap_or_default())
}

fn declared_type(node: &Node) -> Option<TypeDesc> {
    match &node.kind {
        NodeKind::Field { ty, .. } | NodeKind::Param { ty, .. } | NodeKind::Local { ty, .. } => {
            Some(ty.clone())
        }
        NodeKind::Method { ret, .. } => Some(ret.clone()),
        _ => None,
    }
}

fn class_members(class: &Node) -> &[Node] {
    match &class.kind {
        NodeKind::Class { members, .. } => members,
        _ => &[],
    }
}

fn lookup_class<'a>(classes: &'a BTreeMap<String, Node>, name: &str) -> Option<&'a Node> {
    let simple = name.rsplit('.').next().unwrap_or(name);
    classes.get(name).or_else(|| classes.get(simple))
}

// ---------------------------------------------------------------------------
// Body inference
// ---------------------------------------------------------------------------

struct ClassTable<'a> {
    classes: &'a BTreeMap<String, Node>,
}

impl<'a> ClassTable<'a> {
    /// The class and its superclasses that are part of the program.
    fn chain(&self, name: &str) -> Vec<&'a Node> {
        let mut out: Vec<&'a Node> = Vec::new();
        let mut current = lookup_class(self.classes, name);
        while let Some(class) = current {
            if out.iter().any(|seen| seen.id == class.id) {
                break;
            }
            out.push(class);
            current = match &class.kind {
                NodeKind::Class {
                    superclass: Some(sup),
                    ..
                } => lookup_class(self.classes, &sup.base_name()),
                _ => None,
            };
        }
        out
    }

    fn members(&self, ty: &TypeDesc) -> impl Iterator<Item = &'a Node> {
        self.chain(&ty.base_name())
            .into_iter()
            .flat_map(|class| class_members(class).iter())
    }

    fn field(&self, ty: &TypeDesc, name: &str) -> Option<&'a Node> {
        self.members(ty)
            .find(|member| member.tag() == NodeTag::Field && member.name() == Some(name))
    }

    fn method(&self, ty: &TypeDesc, name: &str, arity: usize) -> Option<&'a Node> {
        self.members(ty).find(|member| match &member.kind {
            NodeKind::Method {
                name: found,
                params,
                ..
            } => found == name && params.len() == arity,
            _ => false,
        })
    }
}

fn infer_class(table: &ClassTable<'_>, class: &Node, facts: &mut Inferred) {
    let class_ty = class_type(class);
    let NodeKind::Class { members, .. } = &class.kind else {
        return;
    };
    for member in members {
        let mut scope = Vec::new();
        match &member.kind {
            NodeKind::Field {
                init: Some(init), ..
            } => {
                infer(table, &class_ty, init, &mut scope, facts);
            }
            NodeKind::Method {
                params,
                body: Some(body),
                ..
            } => {
                for param in params {
                    if let NodeKind::Param { ty, name } = &param.kind {
                        scope.push((name.clone(), ty.clone()));
                    }
                }
                infer(table, &class_ty, body, &mut scope, facts);
            }
            _ => {}
        }
    }
}

fn infer(
    table: &ClassTable<'_>,
    class_ty: &TypeDesc,
    node: &Node,
    scope: &mut Vec<(String, TypeDesc)>,
    facts: &mut Inferred,
) -> Option<TypeDesc> {
    let ty = match &node.kind {
        NodeKind::Literal(lit) => lit.static_type(),
        NodeKind::Name(name) => match scope.iter().rev().find(|(local, _)| local == name) {
            Some((_, ty)) => Some(ty.clone()),
            None => {
                let field = table.field(class_ty, name)?;
                facts.field_refs.insert(node.id, field.id);
                declared_type(field)
            }
        },
        NodeKind::This => Some(class_ty.clone()),
        NodeKind::ImplicitReceiver { ty, .. } => Some(ty.clone()),
        NodeKind::FieldAccess { receiver, field } => {
            let receiver_ty = infer(table, class_ty, receiver, scope, facts)?;
            table.field(&receiver_ty, field).and_then(declared_type)
        }
        NodeKind::Assign { target, value } => {
            facts.assignment_targets.insert(target.id);
            infer(table, class_ty, value, scope, facts);
            infer(table, class_ty, target, scope, facts)
        }
        NodeKind::Call {
            receiver,
            method,
            args,
        } => {
            for arg in args {
                infer(table, class_ty, arg, scope, facts);
            }
            let receiver_ty = match receiver {
                Some(receiver) => infer(table, class_ty, receiver, scope, facts)?,
                None => class_ty.clone(),
            };
            let target = table.method(&receiver_ty, method, args.len())?;
            facts.call_targets.insert(node.id, target.id);
            declared_type(target)
        }
        NodeKind::New { ty, args } => {
            for arg in args {
                infer(table, class_ty, arg, scope, facts);
            }
            Some(ty.clone())
        }
        NodeKind::Binary { op, left, right } => {
            let left = infer(table, class_ty, left, scope, facts);
            let right = infer(table, class_ty, right, scope, facts);
            match op {
                BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::And | BinOp::Or => {
                    Some(TypeDesc::Primitive(Primitive::Boolean))
                }
                BinOp::Add
                    if left.as_ref() == Some(&TypeDesc::string())
                        || right.as_ref() == Some(&TypeDesc::string()) =>
                {
                    Some(TypeDesc::string())
                }
                _ => left,
            }
        }
        NodeKind::Block(stmts) => {
            let depth = scope.len();
            for stmt in stmts {
                infer(table, class_ty, stmt, scope, facts);
            }
            scope.truncate(depth);
            None
        }
        NodeKind::ExprStmt(expr) => {
            infer(table, class_ty, expr, scope, facts);
            None
        }
        NodeKind::Return(value) => {
            if let Some(value) = value {
                infer(table, class_ty, value, scope, facts);
            }
            None
        }
        NodeKind::Local { ty, name, init } => {
            if let Some(init) = init {
                infer(table, class_ty, init, scope, facts);
            }
            scope.push((name.clone(), ty.clone()));
            None
        }
        NodeKind::Class { .. }
        | NodeKind::Field { .. }
        | NodeKind::Method { .. }
        | NodeKind::Param { .. }
        | NodeKind::Annotation { .. } => None,
    };
    if let Some(ty) = &ty {
        facts.expr_types.insert(node.id, ty.clone());
    }
    ty
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

impl TypeOracle for ProgramIndex {
    fn type_of(&self, entity: &Entity) -> Option<TypeDesc> {
        match entity {
            Entity::Type(ty) => Some(ty.clone()),
            Entity::Node(node) => self
                .facts
                .expr_types
                .get(&node.id)
                .filter(|_| self.nodes.get(&node.id).is_some_and(|known| known == node))
                .cloned()
                .or_else(|| intrinsic_type(entity)),
            _ => None,
        }
    }

    fn is_subtype(&self, sub: &TypeDesc, sup: &TypeDesc) -> bool {
        if sub == sup || sup.simple_name() == Some("Object") {
            return true;
        }
        let target = sup.base_name();
        let simple = sup.simple_name();
        self.class_chain(&sub.base_name()).iter().any(|class| {
            class.name() == Some(target.as_str()) || (simple.is_some() && class.name() == simple)
        })
    }
}

impl SyntaxContext for ProgramIndex {
    fn enclosing(&self, id: NodeId) -> Option<Enclosing> {
        self.enclosing.get(&id).cloned()
    }

    fn is_assignment_target(&self, id: NodeId) -> bool {
        self.facts.assignment_targets.contains(&id)
    }

    fn is_field_reference(&self, id: NodeId) -> bool {
        self.facts.field_refs.contains_key(&id)
    }
}

impl ProgramFacts for ProgramIndex {
    fn collection(&self, category: EntityType) -> &[Entity] {
        self.by_category.get(&category).map_or(&[], Vec::as_slice)
    }

    fn candidates(&self, category: EntityType, tag: Option<NodeTag>) -> &[Entity] {
        match tag {
            Some(tag) => self.by_tag.get(&tag).map_or(&[], Vec::as_slice),
            None => self.collection(category),
        }
    }

    fn builtin_relations(&self) -> &[BuiltinRelation] {
        &self.builtins
    }

    fn declaration_of(&self, ty: &TypeDesc) -> Option<&Node> {
        match ty {
            TypeDesc::Named { name, .. } => lookup_class(&self.classes, name),
            _ => None,
        }
    }

    fn find_declaration(&self, name: &str) -> Option<&Node> {
        lookup_class(&self.classes, name)
    }

    fn find_members(&self, name: &str) -> Vec<&Node> {
        let (owner, member) = match name.rsplit_once('.') {
            Some((owner, member)) => (Some(owner), member),
            None => (None, name),
        };
        self.classes
            .values()
            .filter(|class| match owner {
                Some(owner) => lookup_class(&self.classes, owner).is_some_and(|c| c.id == class.id),
                None => true,
            })
            .flat_map(|class| class_members(class).iter())
            .filter(|node| {
                matches!(node.tag(), NodeTag::Field | NodeTag::Method) && node.name() == Some(member)
            })
            .collect()
    }

    fn declaring_type(&self, member: NodeId) -> Option<TypeDesc> {
        self.declaring.get(&member).cloned()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn span_of(&self, id: NodeId) -> Option<Span> {
        self.nodes.get(&id).map(|node| node.span)
    }

    fn id_base(&self) -> u32 {
        self.id_base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenet_ast::{FileId, Modifier, NodeFactory};

    /// `class Person { String name; String nickName = "nick"; void setName(String n) { name = n; } }`
    /// and `class Student extends Person { String greet() { return name + "!"; } }`.
    fn people() -> (ProgramIndex, BTreeMap<&'static str, NodeId>) {
        let mut f = NodeFactory::new(FileId(0));
        let mut ids = BTreeMap::new();
        let name_field = f.field(vec![Modifier::Private], TypeDesc::string(), "name", None);
        let nick_init = f.lit_str("nick");
        let nick = f.field(vec![], TypeDesc::string(), "nickName", Some(nick_init));
        let param = f.param(TypeDesc::string(), "n");
        let target = f.name("name");
        let value = f.name("n");
        ids.insert("target", target.id);
        ids.insert("value", value.id);
        let assign = f.assign(target, value);
        let stmt = f.expr_stmt(assign);
        let body = f.block(vec![stmt]);
        let setter = f.method(vec![Modifier::Public], TypeDesc::Void, "setName", vec![param], Some(body));
        ids.insert("setter", setter.id);
        let person = f.class("Person", vec![Modifier::Public], None, vec![name_field, nick, setter]);

        let read = f.name("name");
        ids.insert("read", read.id);
        let bang = f.lit_str("!");
        let concat = f.binary(BinOp::Add, read, bang);
        ids.insert("concat", concat.id);
        let ret = f.ret(Some(concat));
        let body = f.block(vec![ret]);
        let greet = f.method(vec![], TypeDesc::string(), "greet", vec![], Some(body));
        let call = f.call(None, "greet", vec![]);
        ids.insert("call", call.id);
        let stmt = f.expr_stmt(call);
        let body = f.block(vec![stmt]);
        let run = f.method(vec![Modifier::Static], TypeDesc::Void, "run", vec![], Some(body));
        ids.insert("run", run.id);
        let student = f.class(
            "Student",
            vec![],
            Some(TypeDesc::named("Person")),
            vec![greet, run],
        );
        (ProgramIndex::new(vec![person, student]), ids)
    }

    #[test]
    fn names_resolve_to_fields_through_superclasses() {
        let (index, ids) = people();
        assert!(index.is_field_reference(ids["target"]));
        assert!(index.is_field_reference(ids["read"]));
        assert!(!index.is_field_reference(ids["value"]));
        assert!(index.is_assignment_target(ids["target"]));
        assert_eq!(
            index.parent_of(ids["target"]).map(Node::tag),
            Some(NodeTag::Assign)
        );
        assert!(!index.is_assignment_target(ids["read"]));
    }

    #[test]
    fn expression_types_are_inferred() {
        let (index, ids) = people();
        let concat = Entity::Node(index.node(ids["concat"]).unwrap().clone());
        assert_eq!(index.type_of(&concat), Some(TypeDesc::string()));
        assert!(index.is_subtype(&TypeDesc::named("Student"), &TypeDesc::named("Person")));
        assert!(!index.is_subtype(&TypeDesc::named("Person"), &TypeDesc::named("Student")));
    }

    #[test]
    fn enclosing_context_tracks_static_members() {
        let (index, ids) = people();
        assert_eq!(
            index.enclosing(ids["call"]),
            Some(Enclosing {
                ty: TypeDesc::named("Student"),
                is_static: true,
            })
        );
        assert_eq!(
            index.declaring_type(ids["setter"]),
            Some(TypeDesc::named("Person"))
        );
    }

    #[test]
    fn builtins_are_seeded() {
        let (index, ids) = people();
        let count = |name: &str| {
            index
                .builtin_relations()
                .iter()
                .find(|rel| rel.signature.name == name)
                .map(|rel| rel.tuples.len())
                .unwrap()
        };
        assert_eq!(count(DECLARES_FIELD), 2);
        assert_eq!(count(DECLARES_METHOD), 3);
        assert_eq!(count(SUPERCLASS_OF), 1);
        assert_eq!(count(INVOKES), 1);
        assert_eq!(count(COPIED_TO), 0);

        let target = index
            .builtin_relations()
            .iter()
            .find(|rel| rel.signature.name == CALL_TARGET)
            .unwrap();
        let tuple = target.tuples.first().unwrap();
        assert_eq!(tuple.get("call").and_then(Entity::node_id), Some(ids["call"]));
        assert_eq!(
            tuple.get("method").and_then(|m| m.as_node()).and_then(Node::name),
            Some("greet")
        );
    }

    #[test]
    fn members_resolve_by_simple_or_qualified_name() {
        let (index, _) = people();
        assert_eq!(index.find_members("name").len(), 1);
        assert_eq!(index.find_members("Person.nickName").len(), 1);
        assert!(index.find_members("Student.nickName").is_empty());
        assert!(index.find_declaration("com.example.Person").is_some());
    }

    #[test]
    fn candidates_are_indexed_by_tag_and_category() {
        let (index, _) = people();
        assert_eq!(index.candidates(EntityType::Field, Some(NodeTag::Field)).len(), 2);
        assert_eq!(index.collection(EntityType::Declaration).len(), 2 + 2 + 3 + 1);
        assert!(
            index
                .collection(EntityType::Type)
                .contains(&Entity::Type(TypeDesc::named("Student")))
        );
        assert!(index.id_base() > 0);
    }
}
