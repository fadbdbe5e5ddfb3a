use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::Span;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Location identity of a program node.
///
/// Ids below a [`ProvenanceArena`](crate::ProvenanceArena)'s base belong to the
/// analyzed program; ids at or above it index synthesized nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Type descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl Primitive {
    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Byte => "byte",
            Primitive::Char => "char",
            Primitive::Short => "short",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Double => "double",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "boolean" => Primitive::Boolean,
            "byte" => Primitive::Byte,
            "char" => Primitive::Char,
            "short" => Primitive::Short,
            "int" => Primitive::Int,
            "long" => Primitive::Long,
            "float" => Primitive::Float,
            "double" => Primitive::Double,
            _ => return None,
        })
    }
}

/// A program-level type, as written or as resolved by the fact supplier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeDesc {
    Void,
    Primitive(Primitive),
    Named { name: String, args: Vec<TypeDesc> },
    Array(Box<TypeDesc>),
}

impl TypeDesc {
    /// A named type without type arguments; primitive names map to primitives.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == "void" {
            return TypeDesc::Void;
        }
        match Primitive::from_name(&name) {
            Some(prim) => TypeDesc::Primitive(prim),
            None => TypeDesc::Named {
                name,
                args: Vec::new(),
            },
        }
    }

    pub fn string() -> Self {
        TypeDesc::named("String")
    }

    /// The unqualified name of a named type (`java.util.List` -> `List`).
    pub fn simple_name(&self) -> Option<&str> {
        match self {
            TypeDesc::Named { name, .. } => name.rsplit('.').next(),
            _ => None,
        }
    }

    /// The written name without type arguments.
    pub fn base_name(&self) -> String {
        match self {
            TypeDesc::Void => "void".to_string(),
            TypeDesc::Primitive(prim) => prim.as_str().to_string(),
            TypeDesc::Named { name, .. } => name.clone(),
            TypeDesc::Array(inner) => format!("{}[]", inner.base_name()),
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Void => write!(f, "void"),
            TypeDesc::Primitive(prim) => write!(f, "{}", prim.as_str()),
            TypeDesc::Named { name, args } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (idx, arg) in args.iter().enumerate() {
                        if idx > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeDesc::Array(inner) => write!(f, "{inner}[]"),
        }
    }
}

// ---------------------------------------------------------------------------
// Modifiers, literals, operators, signatures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    Public,
    Protected,
    Private,
    Static,
    Final,
    Abstract,
    Synchronized,
    Transient,
    Volatile,
    Native,
}

impl Modifier {
    /// Access specifiers are extracted before the rest of a modifier set.
    pub fn is_access(self) -> bool {
        matches!(
            self,
            Modifier::Public | Modifier::Protected | Modifier::Private
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Modifier::Public => "public",
            Modifier::Protected => "protected",
            Modifier::Private => "private",
            Modifier::Static => "static",
            Modifier::Final => "final",
            Modifier::Abstract => "abstract",
            Modifier::Synchronized => "synchronized",
            Modifier::Transient => "transient",
            Modifier::Volatile => "volatile",
            Modifier::Native => "native",
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A simple literal value: identifiers and expression literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    /// An identifier (declaration name, field name, method name).
    Name(String),
    Str(String),
    Int(i64),
    Bool(bool),
    Char(char),
    Null,
}

impl Literal {
    /// The program type of an expression literal. Names have no type.
    pub fn static_type(&self) -> Option<TypeDesc> {
        match self {
            Literal::Str(_) => Some(TypeDesc::string()),
            Literal::Int(_) => Some(TypeDesc::Primitive(Primitive::Int)),
            Literal::Bool(_) => Some(TypeDesc::Primitive(Primitive::Boolean)),
            Literal::Char(_) => Some(TypeDesc::Primitive(Primitive::Char)),
            Literal::Name(_) | Literal::Null => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Name(name) => write!(f, "{name}"),
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Char(c) => write!(f, "{c:?}"),
            Literal::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "<" => BinOp::Lt,
            ">" => BinOp::Gt,
            "&&" => BinOp::And,
            "||" => BinOp::Or,
            _ => return None,
        })
    }
}

/// A method signature descriptor: name plus parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    pub name: String,
    pub params: Vec<TypeDesc>,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ")")
    }
}

// ---------------------------------------------------------------------------
// Syntax nodes
// ---------------------------------------------------------------------------

/// A program syntax node.
///
/// Equality, ordering, and hashing are structural: `id` and `span` are
/// ignored so that unification compares shapes, not locations.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub span: Span,
    pub kind: NodeKind,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind.cmp(&other.kind)
    }
}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    // -- Declarations --
    Class {
        name: String,
        modifiers: Vec<Modifier>,
        annotations: Vec<Node>,
        superclass: Option<TypeDesc>,
        members: Vec<Node>,
    },
    Field {
        modifiers: Vec<Modifier>,
        annotations: Vec<Node>,
        ty: TypeDesc,
        name: String,
        init: Option<Box<Node>>,
    },
    Method {
        modifiers: Vec<Modifier>,
        annotations: Vec<Node>,
        ret: TypeDesc,
        name: String,
        params: Vec<Node>,
        body: Option<Box<Node>>,
    },
    Param {
        ty: TypeDesc,
        name: String,
    },
    Annotation {
        name: String,
        args: Vec<Node>,
    },

    // -- Statements --
    Block(Vec<Node>),
    ExprStmt(Box<Node>),
    Return(Option<Box<Node>>),
    Local {
        ty: TypeDesc,
        name: String,
        init: Option<Box<Node>>,
    },

    // -- Expressions --
    Literal(Literal),
    Name(String),
    This,
    /// The receiver of an unqualified call or field reference, made explicit
    /// during matching. Never written by the program itself.
    ImplicitReceiver {
        ty: TypeDesc,
        is_static: bool,
    },
    FieldAccess {
        receiver: Box<Node>,
        field: String,
    },
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    Call {
        receiver: Option<Box<Node>>,
        method: String,
        args: Vec<Node>,
    },
    New {
        ty: TypeDesc,
        args: Vec<Node>,
    },
    Binary {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Field-less mirror of [`NodeKind`], used to index and compile patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeTag {
    Class,
    Field,
    Method,
    Param,
    Annotation,
    Block,
    ExprStmt,
    Return,
    Local,
    Literal,
    Name,
    This,
    ImplicitReceiver,
    FieldAccess,
    Assign,
    Call,
    New,
    Binary,
}

impl NodeTag {
    /// Number of entries in this node kind's slot view.
    pub fn slot_count(self) -> usize {
        match self {
            NodeTag::Class => 5,
            NodeTag::Field => 5,
            NodeTag::Method => 6,
            NodeTag::Param => 2,
            NodeTag::Annotation => 2,
            NodeTag::Block => 1,
            NodeTag::ExprStmt => 1,
            NodeTag::Return => 1,
            NodeTag::Local => 3,
            NodeTag::Literal => 1,
            NodeTag::Name => 1,
            NodeTag::This => 0,
            NodeTag::ImplicitReceiver => 2,
            NodeTag::FieldAccess => 2,
            NodeTag::Assign => 2,
            NodeTag::Call => 3,
            NodeTag::New => 2,
            NodeTag::Binary => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeTag::Class => "class",
            NodeTag::Field => "field",
            NodeTag::Method => "method",
            NodeTag::Param => "param",
            NodeTag::Annotation => "annotation",
            NodeTag::Block => "block",
            NodeTag::ExprStmt => "expression statement",
            NodeTag::Return => "return",
            NodeTag::Local => "local variable",
            NodeTag::Literal => "literal",
            NodeTag::Name => "name",
            NodeTag::This => "this",
            NodeTag::ImplicitReceiver => "implicit receiver",
            NodeTag::FieldAccess => "field access",
            NodeTag::Assign => "assignment",
            NodeTag::Call => "call",
            NodeTag::New => "instance creation",
            NodeTag::Binary => "binary expression",
        }
    }
}

/// A slot view could not be turned back into a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    Count {
        tag: NodeTag,
        expected: usize,
        found: usize,
    },
    Kind {
        tag: NodeTag,
        index: usize,
        expected: &'static str,
        found: String,
    },
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotError::Count {
                tag,
                expected,
                found,
            } => write!(
                f,
                "{} takes {expected} slots, got {found}",
                tag.as_str()
            ),
            SlotError::Kind {
                tag,
                index,
                expected,
                found,
            } => write!(
                f,
                "slot {index} of {} expects {expected}, got `{found}`",
                tag.as_str()
            ),
        }
    }
}

impl Node {
    /// Modifier sets are unordered; they are stored in canonical order so
    /// that structural equality does not depend on the written order.
    pub fn new(id: NodeId, span: Span, mut kind: NodeKind) -> Self {
        if let NodeKind::Class { modifiers, .. }
        | NodeKind::Field { modifiers, .. }
        | NodeKind::Method { modifiers, .. } = &mut kind
        {
            modifiers.sort();
        }
        Self { id, span, kind }
    }

    pub fn tag(&self) -> NodeTag {
        self.kind.tag()
    }

    /// Declared name of a declaration-like node.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Class { name, .. }
            | NodeKind::Field { name, .. }
            | NodeKind::Method { name, .. }
            | NodeKind::Param { name, .. }
            | NodeKind::Annotation { name, .. }
            | NodeKind::Local { name, .. } => Some(name),
            NodeKind::Name(name) => Some(name),
            NodeKind::FieldAccess { field, .. } => Some(field),
            NodeKind::Call { method, .. } => Some(method),
            _ => None,
        }
    }

    pub fn modifiers(&self) -> &[Modifier] {
        match &self.kind {
            NodeKind::Class { modifiers, .. }
            | NodeKind::Field { modifiers, .. }
            | NodeKind::Method { modifiers, .. } => modifiers,
            _ => &[],
        }
    }

    pub fn annotations(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Class { annotations, .. }
            | NodeKind::Field { annotations, .. }
            | NodeKind::Method { annotations, .. } => annotations,
            _ => &[],
        }
    }

    pub fn is_static(&self) -> bool {
        self.modifiers().contains(&Modifier::Static)
    }

    /// Signature descriptor of a method declaration.
    pub fn signature(&self) -> Option<Signature> {
        let NodeKind::Method { name, params, .. } = &self.kind else {
            return None;
        };
        let params = params
            .iter()
            .filter_map(|param| match &param.kind {
                NodeKind::Param { ty, .. } => Some(ty.clone()),
                _ => None,
            })
            .collect();
        Some(Signature {
            name: name.clone(),
            params,
        })
    }

    /// Direct child nodes in source order.
    pub fn children(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        match &self.kind {
            NodeKind::Class {
                annotations,
                members,
                ..
            } => {
                out.extend(annotations);
                out.extend(members);
            }
            NodeKind::Field {
                annotations, init, ..
            } => {
                out.extend(annotations);
                out.extend(init.as_deref());
            }
            NodeKind::Method {
                annotations,
                params,
                body,
                ..
            } => {
                out.extend(annotations);
                out.extend(params);
                out.extend(body.as_deref());
            }
            NodeKind::Annotation { args, .. } => out.extend(args),
            NodeKind::Block(stmts) => out.extend(stmts),
            NodeKind::ExprStmt(expr) => out.push(expr),
            NodeKind::Return(value) => out.extend(value.as_deref()),
            NodeKind::Local { init, .. } => out.extend(init.as_deref()),
            NodeKind::FieldAccess { receiver, .. } => out.push(receiver),
            NodeKind::Assign { target, value } => {
                out.push(target);
                out.push(value);
            }
            NodeKind::Call { receiver, args, .. } => {
                out.extend(receiver.as_deref());
                out.extend(args);
            }
            NodeKind::New { args, .. } => out.extend(args),
            NodeKind::Binary { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            NodeKind::Param { .. }
            | NodeKind::Literal(_)
            | NodeKind::Name(_)
            | NodeKind::This
            | NodeKind::ImplicitReceiver { .. } => {}
        }
        out
    }

    /// Pre-order walk; `visit` receives each node and its parent.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node, Option<&'a Node>)) {
        fn go<'a>(
            node: &'a Node,
            parent: Option<&'a Node>,
            visit: &mut impl FnMut(&'a Node, Option<&'a Node>),
        ) {
            visit(node, parent);
            for child in node.children() {
                go(child, Some(node), visit);
            }
        }
        go(self, None, visit);
    }

    /// Node ids of this subtree in pre-order.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.walk(&mut |node, _| ids.push(node.id));
        ids
    }

    /// The uniform slot view used by fragments.
    pub fn slots(&self) -> Vec<Entity> {
        self.kind.slots()
    }
}

fn node_list(nodes: &[Node]) -> Entity {
    Entity::List(nodes.iter().cloned().map(Entity::Node).collect())
}

fn modifier_list(modifiers: &[Modifier]) -> Entity {
    Entity::List(modifiers.iter().copied().map(Entity::Modifier).collect())
}

fn opt_node(node: &Option<Box<Node>>) -> Entity {
    match node {
        Some(node) => Entity::Node((**node).clone()),
        None => Entity::Empty,
    }
}

impl NodeKind {
    pub fn tag(&self) -> NodeTag {
        match self {
            NodeKind::Class { .. } => NodeTag::Class,
            NodeKind::Field { .. } => NodeTag::Field,
            NodeKind::Method { .. } => NodeTag::Method,
            NodeKind::Param { .. } => NodeTag::Param,
            NodeKind::Annotation { .. } => NodeTag::Annotation,
            NodeKind::Block(_) => NodeTag::Block,
            NodeKind::ExprStmt(_) => NodeTag::ExprStmt,
            NodeKind::Return(_) => NodeTag::Return,
            NodeKind::Local { .. } => NodeTag::Local,
            NodeKind::Literal(_) => NodeTag::Literal,
            NodeKind::Name(_) => NodeTag::Name,
            NodeKind::This => NodeTag::This,
            NodeKind::ImplicitReceiver { .. } => NodeTag::ImplicitReceiver,
            NodeKind::FieldAccess { .. } => NodeTag::FieldAccess,
            NodeKind::Assign { .. } => NodeTag::Assign,
            NodeKind::Call { .. } => NodeTag::Call,
            NodeKind::New { .. } => NodeTag::New,
            NodeKind::Binary { .. } => NodeTag::Binary,
        }
    }

    pub fn slots(&self) -> Vec<Entity> {
        match self {
            NodeKind::Class {
                name,
                modifiers,
                annotations,
                superclass,
                members,
            } => vec![
                Entity::name(name),
                modifier_list(modifiers),
                node_list(annotations),
                superclass.clone().map_or(Entity::Empty, Entity::Type),
                node_list(members),
            ],
            NodeKind::Field {
                modifiers,
                annotations,
                ty,
                name,
                init,
            } => vec![
                modifier_list(modifiers),
                node_list(annotations),
                Entity::Type(ty.clone()),
                Entity::name(name),
                opt_node(init),
            ],
            NodeKind::Method {
                modifiers,
                annotations,
                ret,
                name,
                params,
                body,
            } => vec![
                modifier_list(modifiers),
                node_list(annotations),
                Entity::Type(ret.clone()),
                Entity::name(name),
                node_list(params),
                opt_node(body),
            ],
            NodeKind::Param { ty, name } => vec![Entity::Type(ty.clone()), Entity::name(name)],
            NodeKind::Annotation { name, args } => vec![Entity::name(name), node_list(args)],
            NodeKind::Block(stmts) => vec![node_list(stmts)],
            NodeKind::ExprStmt(expr) => vec![Entity::Node((**expr).clone())],
            NodeKind::Return(value) => vec![opt_node(value)],
            NodeKind::Local { ty, name, init } => {
                vec![Entity::Type(ty.clone()), Entity::name(name), opt_node(init)]
            }
            NodeKind::Literal(lit) => vec![Entity::Value(lit.clone())],
            NodeKind::Name(name) => vec![Entity::name(name)],
            NodeKind::This => vec![],
            NodeKind::ImplicitReceiver { ty, is_static } => vec![
                Entity::Type(ty.clone()),
                Entity::Value(Literal::Bool(*is_static)),
            ],
            NodeKind::FieldAccess { receiver, field } => {
                vec![Entity::Node((**receiver).clone()), Entity::name(field)]
            }
            NodeKind::Assign { target, value } => vec![
                Entity::Node((**target).clone()),
                Entity::Node((**value).clone()),
            ],
            NodeKind::Call {
                receiver,
                method,
                args,
            } => vec![opt_node(receiver), Entity::name(method), node_list(args)],
            NodeKind::New { ty, args } => vec![Entity::Type(ty.clone()), node_list(args)],
            NodeKind::Binary { op, left, right } => vec![
                Entity::name(op.symbol()),
                Entity::Node((**left).clone()),
                Entity::Node((**right).clone()),
            ],
        }
    }

    /// Rebuild a node kind from its slot view.
    pub fn from_slots(tag: NodeTag, slots: Vec<Entity>) -> Result<NodeKind, SlotError> {
        if slots.len() != tag.slot_count() {
            return Err(SlotError::Count {
                tag,
                expected: tag.slot_count(),
                found: slots.len(),
            });
        }
        let mut r = SlotReader {
            tag,
            index: 0,
            slots: slots.into_iter(),
        };
        let kind = match tag {
            NodeTag::Class => NodeKind::Class {
                name: r.name()?,
                modifiers: r.modifiers()?,
                annotations: r.nodes()?,
                superclass: r.opt_ty()?,
                members: r.nodes()?,
            },
            NodeTag::Field => NodeKind::Field {
                modifiers: r.modifiers()?,
                annotations: r.nodes()?,
                ty: r.ty()?,
                name: r.name()?,
                init: r.opt_node()?,
            },
            NodeTag::Method => NodeKind::Method {
                modifiers: r.modifiers()?,
                annotations: r.nodes()?,
                ret: r.ty()?,
                name: r.name()?,
                params: r.nodes()?,
                body: r.opt_node()?,
            },
            NodeTag::Param => NodeKind::Param {
                ty: r.ty()?,
                name: r.name()?,
            },
            NodeTag::Annotation => NodeKind::Annotation {
                name: r.name()?,
                args: r.nodes()?,
            },
            NodeTag::Block => NodeKind::Block(r.nodes()?),
            NodeTag::ExprStmt => NodeKind::ExprStmt(r.node()?),
            NodeTag::Return => NodeKind::Return(r.opt_node()?),
            NodeTag::Local => NodeKind::Local {
                ty: r.ty()?,
                name: r.name()?,
                init: r.opt_node()?,
            },
            NodeTag::Literal => NodeKind::Literal(r.literal()?),
            NodeTag::Name => NodeKind::Name(r.name()?),
            NodeTag::This => NodeKind::This,
            NodeTag::ImplicitReceiver => {
                let ty = r.ty()?;
                let is_static = match r.literal()? {
                    Literal::Bool(flag) => flag,
                    other => return Err(r.mismatch("a boolean", &Entity::Value(other))),
                };
                NodeKind::ImplicitReceiver { ty, is_static }
            }
            NodeTag::FieldAccess => NodeKind::FieldAccess {
                receiver: r.node()?,
                field: r.name()?,
            },
            NodeTag::Assign => NodeKind::Assign {
                target: r.node()?,
                value: r.node()?,
            },
            NodeTag::Call => NodeKind::Call {
                receiver: r.opt_node()?,
                method: r.name()?,
                args: r.nodes()?,
            },
            NodeTag::New => NodeKind::New {
                ty: r.ty()?,
                args: r.nodes()?,
            },
            NodeTag::Binary => {
                let symbol = r.name()?;
                let op = BinOp::from_symbol(&symbol)
                    .ok_or_else(|| r.mismatch("an operator", &Entity::name(&symbol)))?;
                NodeKind::Binary {
                    op,
                    left: r.node()?,
                    right: r.node()?,
                }
            }
        };
        Ok(kind)
    }
}

struct SlotReader {
    tag: NodeTag,
    index: usize,
    slots: std::vec::IntoIter<Entity>,
}

impl SlotReader {
    fn next(&mut self) -> Entity {
        self.index += 1;
        // Slot count is checked before reading.
        self.slots.next().unwrap_or(Entity::Empty)
    }

    fn mismatch(&self, expected: &'static str, found: &Entity) -> SlotError {
        SlotError::Kind {
            tag: self.tag,
            index: self.index.saturating_sub(1),
            expected,
            found: found.to_string(),
        }
    }

    fn name(&mut self) -> Result<String, SlotError> {
        match self.next() {
            Entity::Value(Literal::Name(name)) => Ok(name),
            other => Err(self.mismatch("a name", &other)),
        }
    }

    fn literal(&mut self) -> Result<Literal, SlotError> {
        match self.next() {
            Entity::Value(lit) => Ok(lit),
            other => Err(self.mismatch("a literal", &other)),
        }
    }

    fn ty(&mut self) -> Result<TypeDesc, SlotError> {
        match self.next() {
            Entity::Type(ty) => Ok(ty),
            other => Err(self.mismatch("a type", &other)),
        }
    }

    fn opt_ty(&mut self) -> Result<Option<TypeDesc>, SlotError> {
        match self.next() {
            Entity::Type(ty) => Ok(Some(ty)),
            Entity::Empty => Ok(None),
            other => Err(self.mismatch("a type or nothing", &other)),
        }
    }

    fn node(&mut self) -> Result<Box<Node>, SlotError> {
        match self.next() {
            Entity::Node(node) => Ok(Box::new(node)),
            other => Err(self.mismatch("a syntax node", &other)),
        }
    }

    fn opt_node(&mut self) -> Result<Option<Box<Node>>, SlotError> {
        match self.next() {
            Entity::Node(node) if matches!(node.kind, NodeKind::ImplicitReceiver { .. }) => {
                Ok(None)
            }
            Entity::Node(node) => Ok(Some(Box::new(node))),
            Entity::Empty => Ok(None),
            other => Err(self.mismatch("a syntax node or nothing", &other)),
        }
    }

    fn nodes(&mut self) -> Result<Vec<Node>, SlotError> {
        match self.next() {
            Entity::List(items) => {
                let mut nodes = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Entity::Node(node) => nodes.push(node),
                        other => return Err(self.mismatch("a list of syntax nodes", &other)),
                    }
                }
                Ok(nodes)
            }
            Entity::Empty => Ok(Vec::new()),
            other => Err(self.mismatch("a list of syntax nodes", &other)),
        }
    }

    fn modifiers(&mut self) -> Result<Vec<Modifier>, SlotError> {
        match self.next() {
            Entity::List(items) => {
                let mut mods = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Entity::Modifier(modifier) => mods.push(modifier),
                        Entity::Empty => {}
                        other => return Err(self.mismatch("a modifier set", &other)),
                    }
                }
                Ok(mods)
            }
            Entity::Empty => Ok(Vec::new()),
            other => Err(self.mismatch("a modifier set", &other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Anything a pattern variable can be bound to.
///
/// The derived comparisons are structural (node ids are ignored); see
/// [`Entity::identical`] for identity with location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Entity {
    Node(Node),
    Type(TypeDesc),
    List(Vec<Entity>),
    Modifier(Modifier),
    Signature(Signature),
    Value(Literal),
    /// An absent optional child (no initializer, no receiver, no superclass).
    Empty,
}

impl Entity {
    pub fn name(name: impl Into<String>) -> Self {
        Entity::Value(Literal::Name(name.into()))
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Entity::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.as_node().map(|node| node.id)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Entity::Empty)
    }

    /// Ids of the program-rooted nodes in this entity, in pre-order.
    /// Synthesized nodes carry synthetic spans and are skipped.
    pub fn locations(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.collect_locations(&mut ids);
        ids
    }

    fn collect_locations(&self, ids: &mut Vec<NodeId>) {
        match self {
            Entity::Node(node) => node.walk(&mut |node, _| {
                if !node.span.is_synthetic() {
                    ids.push(node.id);
                }
            }),
            Entity::List(items) => items.iter().for_each(|item| item.collect_locations(ids)),
            _ => {}
        }
    }

    /// Structural order, then program location. Two structurally equal
    /// declarations at different places in the program stay distinct.
    pub fn cmp_located(&self, other: &Entity) -> Ordering {
        self.cmp(other)
            .then_with(|| self.locations().cmp(&other.locations()))
    }

    /// The same entity at the same program location.
    pub fn aliases(&self, other: &Entity) -> bool {
        self.cmp_located(other) == Ordering::Equal
    }

    /// Structural equality plus equal node ids everywhere.
    pub fn identical(&self, other: &Entity) -> bool {
        if self != other {
            return false;
        }
        match (self, other) {
            (Entity::Node(a), Entity::Node(b)) => a.ids() == b.ids(),
            (Entity::List(a), Entity::List(b)) => {
                a.iter().zip(b.iter()).all(|(x, y)| x.identical(y))
            }
            _ => true,
        }
    }
}

impl From<Node> for Entity {
    fn from(node: Node) -> Self {
        Entity::Node(node)
    }
}

impl From<TypeDesc> for Entity {
    fn from(ty: TypeDesc) -> Self {
        Entity::Type(ty)
    }
}

impl From<Modifier> for Entity {
    fn from(modifier: Modifier) -> Self {
        Entity::Modifier(modifier)
    }
}

impl From<Literal> for Entity {
    fn from(lit: Literal) -> Self {
        Entity::Value(lit)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Node(node) => write!(f, "{node}"),
            Entity::Type(ty) => write!(f, "{ty}"),
            Entity::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Entity::Modifier(modifier) => write!(f, "{modifier}"),
            Entity::Signature(sig) => write!(f, "{sig}"),
            Entity::Value(lit) => write!(f, "{lit}"),
            Entity::Empty => write!(f, "<empty>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Display (Java-like, single line)
// ---------------------------------------------------------------------------

fn write_prefix(
    f: &mut fmt::Formatter<'_>,
    annotations: &[Node],
    modifiers: &[Modifier],
) -> fmt::Result {
    for annotation in annotations {
        write!(f, "{annotation} ")?;
    }
    for modifier in modifiers {
        write!(f, "{modifier} ")?;
    }
    Ok(())
}

fn write_joined(f: &mut fmt::Formatter<'_>, nodes: &[Node], sep: &str) -> fmt::Result {
    for (idx, node) in nodes.iter().enumerate() {
        if idx > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{node}")?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Class {
                name,
                modifiers,
                annotations,
                superclass,
                members,
            } => {
                write_prefix(f, annotations, modifiers)?;
                write!(f, "class {name}")?;
                if let Some(superclass) = superclass {
                    write!(f, " extends {superclass}")?;
                }
                write!(f, " {{ ")?;
                write_joined(f, members, " ")?;
                write!(f, " }}")
            }
            NodeKind::Field {
                modifiers,
                annotations,
                ty,
                name,
                init,
            } => {
                write_prefix(f, annotations, modifiers)?;
                write!(f, "{ty} {name}")?;
                if let Some(init) = init {
                    write!(f, " = {init}")?;
                }
                write!(f, ";")
            }
            NodeKind::Method {
                modifiers,
                annotations,
                ret,
                name,
                params,
                body,
            } => {
                write_prefix(f, annotations, modifiers)?;
                write!(f, "{ret} {name}(")?;
                write_joined(f, params, ", ")?;
                write!(f, ")")?;
                match body {
                    Some(body) => write!(f, " {body}"),
                    None => write!(f, ";"),
                }
            }
            NodeKind::Param { ty, name } => write!(f, "{ty} {name}"),
            NodeKind::Annotation { name, args } => {
                write!(f, "@{name}")?;
                if !args.is_empty() {
                    write!(f, "(")?;
                    write_joined(f, args, ", ")?;
                    write!(f, ")")?;
                }
                Ok(())
            }
            NodeKind::Block(stmts) => {
                if stmts.is_empty() {
                    return write!(f, "{{ }}");
                }
                write!(f, "{{ ")?;
                write_joined(f, stmts, " ")?;
                write!(f, " }}")
            }
            NodeKind::ExprStmt(expr) => write!(f, "{expr};"),
            NodeKind::Return(Some(value)) => write!(f, "return {value};"),
            NodeKind::Return(None) => write!(f, "return;"),
            NodeKind::Local { ty, name, init } => {
                write!(f, "{ty} {name}")?;
                if let Some(init) = init {
                    write!(f, " = {init}")?;
                }
                write!(f, ";")
            }
            NodeKind::Literal(lit) => write!(f, "{lit}"),
            NodeKind::Name(name) => write!(f, "{name}"),
            NodeKind::This => write!(f, "this"),
            NodeKind::ImplicitReceiver { ty, is_static } => {
                if *is_static {
                    write!(f, "{ty}")
                } else {
                    write!(f, "this")
                }
            }
            NodeKind::FieldAccess { receiver, field } => write!(f, "{receiver}.{field}"),
            NodeKind::Assign { target, value } => write!(f, "{target} = {value}"),
            NodeKind::Call {
                receiver,
                method,
                args,
            } => {
                if let Some(receiver) = receiver {
                    write!(f, "{receiver}.")?;
                }
                write!(f, "{method}(")?;
                write_joined(f, args, ", ")?;
                write!(f, ")")
            }
            NodeKind::New { ty, args } => {
                write!(f, "new {ty}(")?;
                write_joined(f, args, ", ")?;
                write!(f, ")")
            }
            NodeKind::Binary { op, left, right } => {
                write!(f, "{left} {} {right}", op.symbol())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileId, NodeFactory};

    fn factory() -> NodeFactory {
        NodeFactory::new(FileId(0))
    }

    #[test]
    fn structural_equality_ignores_location() {
        let mut f = factory();
        let a = f.lit_str("nickName");
        let b = f.lit_str("nickName");
        assert_ne!(a.id, b.id);
        assert_eq!(a, b);
        assert!(!Entity::Node(a.clone()).identical(&Entity::Node(b)));
        assert!(Entity::Node(a.clone()).identical(&Entity::Node(a)));
    }

    #[test]
    fn located_order_separates_equal_declarations() {
        let mut f = factory();
        let mut name = || {
            Entity::Node(f.field(vec![Modifier::Private], TypeDesc::string(), "name", None))
        };
        let a = name();
        let b = name();
        assert_eq!(a, b);
        assert!(!a.aliases(&b));
        assert!(a.aliases(&a.clone()));
        assert_ne!(a.cmp_located(&b), Ordering::Equal);

        let synthetic = |entity: &Entity| {
            let kind = entity.as_node().map(|node| node.kind.clone()).unwrap();
            Entity::Node(Node::new(NodeId(99), crate::Span::synthetic(), kind))
        };
        assert!(synthetic(&a).locations().is_empty());
        assert!(synthetic(&a).aliases(&synthetic(&b)));
    }

    #[test]
    fn modifier_sets_are_stored_in_canonical_order() {
        let mut f = factory();
        let mut key = |modifiers| f.method(modifiers, TypeDesc::string(), "key", vec![], None);
        let a = key(vec![Modifier::Static, Modifier::Public]);
        let b = key(vec![Modifier::Public, Modifier::Static]);
        assert_eq!(a.modifiers(), &[Modifier::Public, Modifier::Static]);
        assert_eq!(a, b);
    }

    #[test]
    fn slots_round_trip_for_every_declaration_kind() {
        let mut f = factory();
        let init = f.lit_int(3);
        let field = f.field(
            vec![Modifier::Private, Modifier::Static],
            TypeDesc::named("int"),
            "count",
            Some(init),
        );
        let this = f.this();
        let access = f.field_access(this, "count");
        let one = f.lit_int(1);
        let assign = f.assign(access, one);
        let stmt = f.expr_stmt(assign);
        let body = f.block(vec![stmt]);
        let method = f.method(
            vec![Modifier::Public],
            TypeDesc::Void,
            "reset",
            vec![],
            Some(body),
        );
        let class = f.class("Counter", vec![Modifier::Public], None, vec![field, method]);

        class.walk(&mut |node, _| {
            let rebuilt = NodeKind::from_slots(node.tag(), node.slots()).unwrap();
            assert_eq!(rebuilt, node.kind, "slot round trip for {}", node.tag().as_str());
        });
    }

    #[test]
    fn from_slots_rejects_wrong_count_and_kind() {
        let err = NodeKind::from_slots(NodeTag::Param, vec![Entity::Empty]).unwrap_err();
        assert!(matches!(err, SlotError::Count { expected: 2, found: 1, .. }));

        let err = NodeKind::from_slots(
            NodeTag::Param,
            vec![Entity::name("x"), Entity::name("y")],
        )
        .unwrap_err();
        assert!(matches!(err, SlotError::Kind { index: 0, .. }));
    }

    #[test]
    fn implicit_receiver_collapses_to_absent_receiver() {
        let receiver = Node::new(
            NodeId(9),
            crate::Span::synthetic(),
            NodeKind::ImplicitReceiver {
                ty: TypeDesc::named("A"),
                is_static: false,
            },
        );
        let kind = NodeKind::from_slots(
            NodeTag::Call,
            vec![
                Entity::Node(receiver),
                Entity::name("run"),
                Entity::List(vec![]),
            ],
        )
        .unwrap();
        assert!(matches!(kind, NodeKind::Call { receiver: None, .. }));
    }

    #[test]
    fn display_is_java_like() {
        let mut f = factory();
        let lit = f.lit_str("x");
        let field = f.field(
            vec![Modifier::Private],
            TypeDesc::string(),
            "name",
            Some(lit),
        );
        assert_eq!(field.to_string(), "private String name = \"x\";");

        let args = vec![f.name("a"), f.lit_int(2)];
        let call = f.call(None, "put", args);
        assert_eq!(call.to_string(), "put(a, 2)");
        assert_eq!(
            Entity::Signature(Signature {
                name: "put".into(),
                params: vec![TypeDesc::string(), TypeDesc::named("int")],
            })
            .to_string(),
            "put(String, int)"
        );
    }

    #[test]
    fn method_signature_collects_param_types() {
        let mut f = factory();
        let p = f.param(TypeDesc::named("long"), "id");
        let m = f.method(vec![], TypeDesc::Void, "load", vec![p], None);
        let sig = m.signature().unwrap();
        assert_eq!(sig.name, "load");
        assert_eq!(sig.params, vec![TypeDesc::Primitive(Primitive::Long)]);
    }
}
