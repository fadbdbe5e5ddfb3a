//! Semantic types for tenet.
//!
//! This crate defines the categories entities belong to, the signatures of
//! traits (relations) and their ground tuples, and the binding-map algebra
//! shared by the matcher and the solver. Written type expressions live in
//! `tenet-ast`; they are resolved to these types here.

mod bindings;

pub use bindings::{BindingMap, BindingsSet, Replacement, UnboundVariable};

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tenet_ast::rules::{ParamDecl, TraitDecl, TypeExpr};
use tenet_ast::{Entity, NodeId, NodeKind, NodeTag, Span, TypeDesc};

pub use tenet_ast::rules::TraitModifiers as TraitFlags;
pub use tenet_ast::rules::WILDCARD;

// ---------------------------------------------------------------------------
// Entity categories
// ---------------------------------------------------------------------------

/// Syntactic category of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    Any,
    Expression,
    Statement,
    Field,
    Method,
    Type,
    ModifierSet,
    Modifier,
    AccessSpecifier,
    Annotation,
    Declaration,
    Signature,
    /// Identifiers and other simple literal values.
    Value,
    List,
}

impl EntityType {
    pub const ALL: [EntityType; 14] = [
        EntityType::Any,
        EntityType::Expression,
        EntityType::Statement,
        EntityType::Field,
        EntityType::Method,
        EntityType::Type,
        EntityType::ModifierSet,
        EntityType::Modifier,
        EntityType::AccessSpecifier,
        EntityType::Annotation,
        EntityType::Declaration,
        EntityType::Signature,
        EntityType::Value,
        EntityType::List,
    ];

    /// Resolve a category written in a rule.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "any" => EntityType::Any,
            "expr" | "expression" => EntityType::Expression,
            "stmt" | "statement" => EntityType::Statement,
            "field" => EntityType::Field,
            "method" => EntityType::Method,
            "type" => EntityType::Type,
            "modifiers" | "modifier-set" => EntityType::ModifierSet,
            "modifier" => EntityType::Modifier,
            "access" | "access-specifier" => EntityType::AccessSpecifier,
            "annotation" => EntityType::Annotation,
            "decl" | "declaration" => EntityType::Declaration,
            "signature" => EntityType::Signature,
            "value" | "name" | "identifier" => EntityType::Value,
            "list" => EntityType::List,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Any => "any",
            EntityType::Expression => "expression",
            EntityType::Statement => "statement",
            EntityType::Field => "field",
            EntityType::Method => "method",
            EntityType::Type => "type",
            EntityType::ModifierSet => "modifier-set",
            EntityType::Modifier => "modifier",
            EntityType::AccessSpecifier => "access-specifier",
            EntityType::Annotation => "annotation",
            EntityType::Declaration => "declaration",
            EntityType::Signature => "signature",
            EntityType::Value => "value",
            EntityType::List => "list",
        }
    }

    /// The most specific category of a node kind.
    pub fn of_tag(tag: NodeTag) -> Self {
        match tag {
            NodeTag::Class | NodeTag::Param => EntityType::Declaration,
            NodeTag::Field => EntityType::Field,
            NodeTag::Method => EntityType::Method,
            NodeTag::Annotation => EntityType::Annotation,
            NodeTag::Block | NodeTag::ExprStmt | NodeTag::Return | NodeTag::Local => {
                EntityType::Statement
            }
            NodeTag::Literal
            | NodeTag::Name
            | NodeTag::This
            | NodeTag::ImplicitReceiver
            | NodeTag::FieldAccess
            | NodeTag::Assign
            | NodeTag::Call
            | NodeTag::New
            | NodeTag::Binary => EntityType::Expression,
        }
    }

    /// The most specific category of an entity.
    pub fn of(entity: &Entity) -> Self {
        match entity {
            Entity::Node(node) => Self::of_tag(node.tag()),
            Entity::Type(_) => EntityType::Type,
            Entity::List(items) => {
                if items.iter().all(|item| matches!(item, Entity::Modifier(_))) {
                    EntityType::ModifierSet
                } else {
                    EntityType::List
                }
            }
            Entity::Modifier(modifier) if modifier.is_access() => EntityType::AccessSpecifier,
            Entity::Modifier(_) => EntityType::Modifier,
            Entity::Signature(_) => EntityType::Signature,
            Entity::Value(_) => EntityType::Value,
            Entity::Empty => EntityType::Any,
        }
    }

    /// Subtyping between categories.
    pub fn is_assignable_to(self, target: EntityType) -> bool {
        self == target
            || target == EntityType::Any
            || matches!(
                (self, target),
                (EntityType::Field | EntityType::Method, EntityType::Declaration)
                    | (EntityType::AccessSpecifier, EntityType::Modifier)
                    | (EntityType::ModifierSet, EntityType::List)
            )
    }

    pub fn accepts(self, entity: &Entity) -> bool {
        Self::of(entity).is_assignable_to(self)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Program types
// ---------------------------------------------------------------------------

/// Answers program-type questions for typed parameters.
pub trait TypeOracle {
    fn type_of(&self, entity: &Entity) -> Option<TypeDesc>;

    fn is_subtype(&self, sub: &TypeDesc, sup: &TypeDesc) -> bool {
        sub == sup
    }
}

/// The type an entity carries on its own, without name resolution.
pub fn intrinsic_type(entity: &Entity) -> Option<TypeDesc> {
    let node = entity.as_node()?;
    match &node.kind {
        NodeKind::Literal(lit) => lit.static_type(),
        NodeKind::Field { ty, .. } | NodeKind::Local { ty, .. } | NodeKind::Param { ty, .. } => {
            Some(ty.clone())
        }
        NodeKind::Method { ret, .. } => Some(ret.clone()),
        NodeKind::New { ty, .. } | NodeKind::ImplicitReceiver { ty, .. } => Some(ty.clone()),
        NodeKind::Class { name, .. } => Some(TypeDesc::named(name.clone())),
        _ => None,
    }
}

/// Oracle that knows only intrinsic types.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntrinsicTypes;

impl TypeOracle for IntrinsicTypes {
    fn type_of(&self, entity: &Entity) -> Option<TypeDesc> {
        intrinsic_type(entity)
    }
}

// ---------------------------------------------------------------------------
// Parameters and signatures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Category(EntityType),
    /// An expression whose static type is a subtype of this program type.
    Program(TypeDesc),
    /// A relation-valued parameter.
    Relation(Arc<TraitSignature>),
}

impl ParamType {
    pub fn any() -> Self {
        ParamType::Category(EntityType::Any)
    }

    pub fn accepts(&self, entity: &Entity, oracle: &dyn TypeOracle) -> bool {
        match self {
            ParamType::Category(category) => category.accepts(entity),
            ParamType::Program(expected) => match oracle.type_of(entity) {
                Some(actual) => {
                    EntityType::Expression.accepts(entity) && oracle.is_subtype(&actual, expected)
                }
                None => false,
            },
            ParamType::Relation(_) => false,
        }
    }

    /// The category to enumerate when a variable of this type is unbound.
    pub fn category(&self) -> EntityType {
        match self {
            ParamType::Category(category) => *category,
            ParamType::Program(_) => EntityType::Expression,
            ParamType::Relation(_) => EntityType::Any,
        }
    }

    /// Resolve a written type expression. `owner` names the declaration for
    /// nested relation signatures.
    pub fn resolve(expr: &TypeExpr, owner: &str) -> Result<ParamType, SignatureError> {
        match expr {
            TypeExpr::Category(name) => EntityType::from_name(name)
                .map(ParamType::Category)
                .ok_or_else(|| SignatureError::UnknownCategory {
                    trait_name: owner.to_string(),
                    category: name.clone(),
                }),
            TypeExpr::Program(ty) => Ok(ParamType::Program(ty.clone())),
            TypeExpr::Relation(params) => {
                let signature = TraitSignature::from_params(
                    owner,
                    params,
                    TraitFlags {
                        is_abstract: true,
                        ..TraitFlags::default()
                    },
                )?;
                Ok(ParamType::Relation(Arc::new(signature)))
            }
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Category(category) => write!(f, "{category}"),
            ParamType::Program(ty) => write!(f, "{ty}"),
            ParamType::Relation(sig) => write!(f, "{sig}"),
        }
    }
}

/// A named, typed variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub ty: ParamType,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == WILDCARD
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("parameter `{param}` is declared twice in trait `{trait_name}`")]
    DuplicateParam { trait_name: String, param: String },
    #[error("unknown category `{category}` in trait `{trait_name}`")]
    UnknownCategory { trait_name: String, category: String },
}

/// Name, formal parameters, and modifier flags of a trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitSignature {
    pub name: String,
    pub params: Vec<Variable>,
    pub flags: TraitFlags,
}

impl TraitSignature {
    pub fn new(
        name: impl Into<String>,
        params: Vec<Variable>,
        flags: TraitFlags,
    ) -> Result<Self, SignatureError> {
        let name = name.into();
        for (idx, param) in params.iter().enumerate() {
            if params[..idx].iter().any(|prev| prev.name == param.name) {
                return Err(SignatureError::DuplicateParam {
                    trait_name: name,
                    param: param.name.clone(),
                });
            }
        }
        Ok(Self {
            name,
            params,
            flags,
        })
    }

    pub fn from_decl(decl: &TraitDecl) -> Result<Self, SignatureError> {
        Self::from_params(&decl.name.node, &decl.params, decl.modifiers)
    }

    fn from_params(
        name: &str,
        params: &[ParamDecl],
        flags: TraitFlags,
    ) -> Result<Self, SignatureError> {
        let params = params
            .iter()
            .map(|param| {
                let ty = ParamType::resolve(&param.ty, &param.name.node)?;
                Ok(Variable::new(param.name.node.clone(), ty))
            })
            .collect::<Result<Vec<_>, SignatureError>>()?;
        Self::new(name, params, flags)
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn param(&self, name: &str) -> Option<&Variable> {
        self.params.iter().find(|param| param.name == name)
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|param| param.name.as_str())
    }

    pub fn is_singleton(&self) -> bool {
        self.flags.is_singleton
    }

    pub fn is_local(&self) -> bool {
        self.flags.is_local
    }

    pub fn is_builtin(&self) -> bool {
        self.flags.is_builtin
    }

    pub fn is_static(&self) -> bool {
        self.flags.is_static
    }

    /// Neither singleton nor local: solved by fixpoint with its peers.
    pub fn is_plain(&self) -> bool {
        !self.flags.is_singleton && !self.flags.is_local
    }

    /// Same shape (names and types, in order) as `other`, ignoring names of
    /// the traits themselves.
    pub fn same_shape(&self, other: &TraitSignature) -> bool {
        self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty == b.ty)
    }
}

impl fmt::Display for TraitSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", param.name, param.ty)?;
        }
        write!(f, ")")
    }
}

// ---------------------------------------------------------------------------
// Entity tuples
// ---------------------------------------------------------------------------

/// Location of the syntax node a tuple was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleRoot {
    pub id: NodeId,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TupleError {
    #[error("parameter `{param}` of trait `{trait_name}` is unbound")]
    Missing { trait_name: String, param: String },
    #[error("trait `{trait_name}` has no parameter `{param}`")]
    Unexpected { trait_name: String, param: String },
    #[error("trait `{trait_name}` takes {expected} values, got {found}")]
    Arity {
        trait_name: String,
        expected: usize,
        found: usize,
    },
}

/// One ground fact of a trait.
///
/// Tuples are ordered by trait name, then by their values in formal
/// parameter order, then by the program locations of those values. Two
/// structurally equal declarations at different places are distinct facts;
/// synthesized nodes compare by shape. The root takes no part in comparisons.
#[derive(Debug, Clone)]
pub struct EntityTuple {
    signature: Arc<TraitSignature>,
    values: BTreeMap<String, Entity>,
    root: Option<TupleRoot>,
}

impl EntityTuple {
    pub fn new(
        signature: Arc<TraitSignature>,
        values: BTreeMap<String, Entity>,
    ) -> Result<Self, TupleError> {
        if let Some(extra) = values.keys().find(|name| signature.param(name).is_none()) {
            return Err(TupleError::Unexpected {
                trait_name: signature.name.clone(),
                param: extra.clone(),
            });
        }
        if let Some(missing) = signature.param_names().find(|name| !values.contains_key(*name)) {
            return Err(TupleError::Missing {
                trait_name: signature.name.clone(),
                param: missing.to_string(),
            });
        }
        let mut tuple = Self {
            signature,
            values,
            root: None,
        };
        tuple.root = tuple.infer_root();
        Ok(tuple)
    }

    /// Build a tuple from values given in formal parameter order.
    pub fn positional(
        signature: Arc<TraitSignature>,
        values: Vec<Entity>,
    ) -> Result<Self, TupleError> {
        if values.len() != signature.arity() {
            return Err(TupleError::Arity {
                trait_name: signature.name.clone(),
                expected: signature.arity(),
                found: values.len(),
            });
        }
        let map = signature
            .param_names()
            .map(str::to_string)
            .zip(values)
            .collect();
        Self::new(signature, map)
    }

    /// Take the formal parameters of `signature` out of a binding map.
    pub fn from_bindings(
        signature: Arc<TraitSignature>,
        bindings: &BindingMap,
    ) -> Result<Self, TupleError> {
        let mut values = BTreeMap::new();
        for name in signature.param_names() {
            let value = bindings
                .lookup_entity(name)
                .ok_or_else(|| TupleError::Missing {
                    trait_name: signature.name.clone(),
                    param: name.to_string(),
                })?;
            values.insert(name.to_string(), value.clone());
        }
        Self::new(signature, values)
    }

    /// The same values under another signature with the same arity.
    pub fn retarget(&self, signature: Arc<TraitSignature>) -> Result<Self, TupleError> {
        Self::positional(signature, self.ordered_values().cloned().collect())
            .map(|tuple| tuple.with_root(self.root))
    }

    pub fn with_root(mut self, root: Option<TupleRoot>) -> Self {
        self.root = root;
        self
    }

    pub fn signature(&self) -> &Arc<TraitSignature> {
        &self.signature
    }

    pub fn trait_name(&self) -> &str {
        &self.signature.name
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.values.get(name)
    }

    pub fn values(&self) -> &BTreeMap<String, Entity> {
        &self.values
    }

    /// Values in formal parameter order.
    pub fn ordered_values(&self) -> impl Iterator<Item = &Entity> {
        self.signature
            .param_names()
            .filter_map(|name| self.values.get(name))
    }

    pub fn root(&self) -> Option<TupleRoot> {
        self.root
    }

    /// A binding map binding every formal parameter to its value.
    pub fn to_bindings(&self) -> BindingMap {
        let mut map = BindingMap::new();
        for (name, value) in &self.values {
            map.bind(name, value.clone());
        }
        map
    }

    /// Program locations of the values, in formal parameter order.
    fn locations(&self) -> Vec<Vec<NodeId>> {
        self.ordered_values().map(Entity::locations).collect()
    }

    /// The first node-valued parameter, in formal order.
    fn infer_root(&self) -> Option<TupleRoot> {
        self.ordered_values().find_map(|value| {
            value.as_node().map(|node| TupleRoot {
                id: node.id,
                span: node.span,
            })
        })
    }
}

impl PartialEq for EntityTuple {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EntityTuple {}

impl PartialOrd for EntityTuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityTuple {
    fn cmp(&self, other: &Self) -> Ordering {
        self.trait_name()
            .cmp(other.trait_name())
            .then_with(|| self.ordered_values().cmp(other.ordered_values()))
            .then_with(|| self.locations().cmp(&other.locations()))
    }
}

impl fmt::Display for EntityTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.trait_name())?;
        for (idx, (name, value)) in self
            .signature
            .param_names()
            .filter_map(|name| self.values.get(name).map(|value| (name, value)))
            .enumerate()
        {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name} = {value}")?;
        }
        write!(f, ")")
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
