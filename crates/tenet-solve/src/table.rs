//! The match table of one option instantiation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tenet_ast::rules::{InterfaceDecl, OptionDecl, ParamDecl, Require};
use tenet_ast::{
    Entity, Literal, Node, NodeId, NodeKind, Primitive, Provenance, ProvenanceArena, Span,
    Spanned, TypeDesc,
};
use tenet_diag::{Category, Diagnostic, EngineError, InternalError};
use tenet_match::span_location;
use tenet_types::{BindingMap, EntityType, ParamType, SignatureError, TraitSignature};

use crate::statement::{Level, RealizationStatement};
use crate::{FactStore, ProgramFacts, SolveAction, SolveTrace, SolverConfig, TraitValue};

const COMPONENT: &str = "option match table";

/// One constructor argument as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstructorArg {
    Entity(Entity),
    /// Resolved against the parameter's type: a type or member name, a
    /// literal for program-typed parameters, `instance.trait` for relations.
    Text(String),
}

impl From<Entity> for ConstructorArg {
    fn from(entity: Entity) -> Self {
        ConstructorArg::Entity(entity)
    }
}

impl From<&str> for ConstructorArg {
    fn from(text: &str) -> Self {
        ConstructorArg::Text(text.to_string())
    }
}

/// Relations of instantiations solved earlier, for relation-valued
/// constructor arguments.
pub trait RelationResolver {
    fn resolve_relation(&self, instance: &str, relation: &str) -> Option<&TraitValue>;
}

/// Resolves nothing.
pub struct NoRelations;

impl RelationResolver for NoRelations {
    fn resolve_relation(&self, _instance: &str, _relation: &str) -> Option<&TraitValue> {
        None
    }
}

/// An entity synthesized by a local statement.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedEntity {
    pub relation: String,
    pub param: String,
    pub entity: Entity,
    /// The type the entity is meant to be inserted into.
    pub host: Option<TypeDesc>,
    /// The program node this entity is a fresh copy of.
    pub replaces: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub(crate) struct TraitGuard {
    pub relation: String,
    pub requires: Vec<Require>,
}

pub struct OptionMatchTable {
    pub(crate) option: String,
    pub(crate) interface: String,
    pub(crate) span: Span,
    pub(crate) facts: Arc<dyn ProgramFacts>,
    pub(crate) config: SolverConfig,
    pub(crate) store: FactStore,
    /// Constructor arguments and resolved singleton variables.
    pub(crate) globals: BindingMap,
    pub(crate) arena: ProvenanceArena,
    /// Entities synthesized so far, visible to later matching.
    pub(crate) overlay: Vec<Entity>,
    pub(crate) generated: Vec<GeneratedEntity>,
    pub(crate) statements: Vec<RealizationStatement>,
    pub(crate) trait_guards: Vec<TraitGuard>,
    pub(crate) singleton_params: BTreeMap<String, String>,
    /// Relations bound from constructor arguments.
    pub(crate) nested: BTreeSet<String>,
    pub(crate) trace: SolveTrace,
    pub(crate) solved: bool,
}

impl fmt::Debug for OptionMatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionMatchTable")
            .field("option", &self.option)
            .field("interface", &self.interface)
            .field("relations", &self.store.names().collect::<Vec<_>>())
            .field("globals", &self.globals)
            .field("solved", &self.solved)
            .finish_non_exhaustive()
    }
}

fn signature_error(err: SignatureError, span: Span) -> Diagnostic {
    let category = match err {
        SignatureError::DuplicateParam { .. } => Category::NameClash,
        SignatureError::UnknownCategory { .. } => Category::UndefinedName,
    };
    Diagnostic::error(category, err.to_string()).at_opt(span_location(span))
}

fn clash(message: String, span: Span, first: Option<Span>) -> Diagnostic {
    let diag = Diagnostic::error(Category::NameClash, message).at_opt(span_location(span));
    match first.and_then(span_location) {
        Some(location) => diag.with_label(location, "first declared here"),
        None => diag,
    }
}

impl OptionMatchTable {
    /// Prepare `option` of `interface` for solving.
    ///
    /// Declares every trait of both levels, seeds the built-in relations,
    /// binds the constructor arguments, and validates the statements. No
    /// statement runs until [`solve`](Self::solve).
    pub fn construct(
        interface: &InterfaceDecl,
        option: &OptionDecl,
        args: Vec<ConstructorArg>,
        facts: Arc<dyn ProgramFacts>,
        resolver: &dyn RelationResolver,
        config: SolverConfig,
    ) -> Result<Self, EngineError> {
        let _span = tracing::debug_span!("construct", option = %option.name.node).entered();
        if option.interface.node != interface.name.node {
            return Err(InternalError::new(
                COMPONENT,
                format!(
                    "option `{}` implements `{}`, not `{}`",
                    option.name.node, option.interface.node, interface.name.node
                ),
            )
            .into());
        }

        let mut table = Self {
            option: option.name.node.clone(),
            interface: interface.name.node.clone(),
            span: option.span,
            arena: ProvenanceArena::new(facts.id_base()),
            facts,
            trace: SolveTrace::new(&config),
            config,
            store: FactStore::new(),
            globals: BindingMap::new(),
            overlay: Vec::new(),
            generated: Vec::new(),
            statements: Vec::new(),
            trait_guards: Vec::new(),
            singleton_params: BTreeMap::new(),
            nested: BTreeSet::new(),
            solved: false,
        };
        table.seed_builtins()?;
        let declared = table.declare_traits(interface, option)?;
        table.bind_arguments(interface, option, args, resolver, &declared)?;
        table.build_statements(interface, option, &declared)?;
        tracing::debug!(
            relations = table.store.names().count(),
            statements = table.statements.len(),
            "constructed option match table"
        );
        Ok(table)
    }

    fn seed_builtins(&mut self) -> Result<(), InternalError> {
        let facts = Arc::clone(&self.facts);
        for relation in facts.builtin_relations() {
            let name = relation.signature.name.as_str();
            self.store.add_builtin_trait(relation.signature.clone());
            for tuple in &relation.tuples {
                self.store.add_trait_instance(name, tuple.clone())?;
            }
            self.trace.record(SolveAction::Seed, name, || {
                format!("{} tuples", relation.tuples.len())
            });
        }
        Ok(())
    }

    fn declare_traits(
        &mut self,
        interface: &InterfaceDecl,
        option: &OptionDecl,
    ) -> Result<BTreeMap<String, Arc<TraitSignature>>, Diagnostic> {
        let mut declared: BTreeMap<String, (Arc<TraitSignature>, Span)> = BTreeMap::new();
        for decl in interface.traits.iter().chain(&option.traits) {
            let name = &decl.name.node;
            if let Some((_, first)) = declared.get(name) {
                return Err(clash(
                    format!("trait `{name}` is declared twice"),
                    decl.name.span,
                    Some(*first),
                ));
            }
            if self.store.contains(name) {
                return Err(clash(
                    format!("trait `{name}` clashes with a built-in relation"),
                    decl.name.span,
                    None,
                ));
            }
            let sig = TraitSignature::from_decl(decl).map_err(|err| signature_error(err, decl.span))?;
            declared.insert(name.clone(), (Arc::new(sig), decl.name.span));
            if !decl.requires.is_empty() {
                self.trait_guards.push(TraitGuard {
                    relation: name.clone(),
                    requires: decl.requires.clone(),
                });
            }
        }

        for (sig, span) in declared.values().filter(|(sig, _)| sig.is_singleton()) {
            for param in &sig.params {
                if declared.contains_key(&param.name) {
                    return Err(clash(
                        format!(
                            "variable `{}` of singleton `{}` clashes with a trait",
                            param.name, sig.name
                        ),
                        *span,
                        None,
                    ));
                }
                if let Some(owner) = self
                    .singleton_params
                    .insert(param.name.clone(), sig.name.clone())
                {
                    return Err(clash(
                        format!(
                            "variable `{}` is bound by singletons `{owner}` and `{}`",
                            param.name, sig.name
                        ),
                        *span,
                        None,
                    ));
                }
            }
        }

        let mut out = BTreeMap::new();
        for (name, (sig, _)) in declared {
            self.store.add_trait(sig.clone(), false, sig.is_static());
            out.insert(name, sig);
        }
        Ok(out)
    }

    fn bind_arguments(
        &mut self,
        interface: &InterfaceDecl,
        option: &OptionDecl,
        args: Vec<ConstructorArg>,
        resolver: &dyn RelationResolver,
        declared: &BTreeMap<String, Arc<TraitSignature>>,
    ) -> Result<(), Diagnostic> {
        let params: Vec<&ParamDecl> = interface.params.iter().chain(&option.params).collect();
        let mut seen: BTreeMap<&str, Span> = BTreeMap::new();
        for param in &params {
            let name = param.name.node.as_str();
            if let Some(first) = seen.insert(name, param.name.span) {
                return Err(clash(
                    format!("constructor parameter `{name}` is declared twice"),
                    param.name.span,
                    Some(first),
                ));
            }
            if declared.contains_key(name)
                || self.singleton_params.contains_key(name)
                || self.store.contains(name)
            {
                return Err(clash(
                    format!("constructor parameter `{name}` clashes with a trait or singleton variable"),
                    param.name.span,
                    None,
                ));
            }
        }
        if params.len() != args.len() {
            return Err(Diagnostic::error(
                Category::ArityMismatch,
                format!(
                    "option `{}` takes {} arguments, found {}",
                    self.option,
                    params.len(),
                    args.len()
                ),
            )
            .at_opt(span_location(self.span)));
        }

        for (param, arg) in params.into_iter().zip(args) {
            let name = &param.name;
            let ty = ParamType::resolve(&param.ty, &name.node)
                .map_err(|err| signature_error(err, name.span))?;
            if let ParamType::Relation(sig) = &ty {
                let value = self.relation_argument(name, sig, arg, resolver)?;
                self.nested.insert(name.node.clone());
                self.store.add_value(value);
                continue;
            }
            let entity = match arg {
                ConstructorArg::Entity(entity) => entity,
                ConstructorArg::Text(text) => self.resolve_text(name, &ty, &text)?,
            };
            if !ty.accepts(&entity, self.facts.as_ref()) {
                return Err(Diagnostic::error(
                    Category::TypeMismatch,
                    format!("argument `{entity}` for `{}` is not a {ty}", name.node),
                )
                .at_opt(span_location(name.span)));
            }
            tracing::trace!(param = %name.node, value = %entity, "bound constructor argument");
            self.globals.bind(&name.node, entity);
        }
        Ok(())
    }

    fn relation_argument(
        &self,
        param: &Spanned<String>,
        sig: &Arc<TraitSignature>,
        arg: ConstructorArg,
        resolver: &dyn RelationResolver,
    ) -> Result<TraitValue, Diagnostic> {
        let unresolved = |message: String| {
            Diagnostic::error(Category::UnresolvedBinding, message).at_opt(span_location(param.span))
        };
        let ConstructorArg::Text(text) = arg else {
            return Err(unresolved(format!(
                "relation parameter `{}` needs an `instance.trait` argument",
                param.node
            )));
        };
        let (instance, relation) = text.split_once('.').ok_or_else(|| {
            unresolved(format!(
                "relation parameter `{}` needs an `instance.trait` argument, found `{text}`",
                param.node
            ))
        })?;
        let source = resolver
            .resolve_relation(instance, relation)
            .ok_or_else(|| unresolved(format!("no solved relation `{text}`")))?;
        if source.signature.arity() != sig.arity() {
            return Err(Diagnostic::error(
                Category::ArityMismatch,
                format!(
                    "relation `{text}` has {} parameters, `{}` expects {}",
                    source.signature.arity(),
                    param.node,
                    sig.arity()
                ),
            )
            .at_opt(span_location(param.span)));
        }

        let mut value = TraitValue::new(sig.clone(), true, true);
        for tuple in source.tuples() {
            let tuple = tuple.retarget(sig.clone()).map_err(|err| {
                Diagnostic::error(Category::TypeMismatch, err.to_string())
                    .at_opt(span_location(param.span))
            })?;
            let mismatch = sig
                .params
                .iter()
                .zip(tuple.ordered_values())
                .find(|(p, entity)| !p.ty.accepts(entity, self.facts.as_ref()));
            if let Some((p, entity)) = mismatch {
                return Err(Diagnostic::error(
                    Category::TypeMismatch,
                    format!("relation `{text}` binds `{}` to `{entity}`, which is not a {}", p.name, p.ty),
                )
                .at_opt(span_location(param.span)));
            }
            value.insert(tuple);
        }
        Ok(value)
    }

    /// Resolve a textual argument by the parameter's type.
    fn resolve_text(
        &mut self,
        param: &Spanned<String>,
        ty: &ParamType,
        text: &str,
    ) -> Result<Entity, Diagnostic> {
        let unresolved = |what: &str| {
            Diagnostic::error(
                Category::UnresolvedBinding,
                format!("cannot resolve `{text}` as a {what} for `{}`", param.node),
            )
            .at_opt(span_location(param.span))
        };
        match ty {
            ParamType::Category(EntityType::Type) => {
                if let Some(name) = self.facts.find_declaration(text).and_then(Node::name) {
                    return Ok(Entity::Type(TypeDesc::named(name)));
                }
                match TypeDesc::named(text) {
                    ty @ (TypeDesc::Primitive(_) | TypeDesc::Void) => Ok(Entity::Type(ty)),
                    _ => Err(unresolved("type")),
                }
            }
            ParamType::Category(category @ (EntityType::Field | EntityType::Method | EntityType::Declaration)) => {
                if *category == EntityType::Declaration
                    && let Some(decl) = self.facts.find_declaration(text)
                {
                    return Ok(Entity::Node(decl.clone()));
                }
                let members: Vec<&Node> = self
                    .facts
                    .find_members(text)
                    .into_iter()
                    .filter(|node| category.accepts(&Entity::Node((*node).clone())))
                    .collect();
                match members.as_slice() {
                    [member] => Ok(Entity::Node((*member).clone())),
                    [] => Err(unresolved(category.as_str())),
                    many => Err(Diagnostic::error(
                        Category::AmbiguousBinding,
                        format!(
                            "`{text}` names {} members; qualify it as `Type.{text}`",
                            many.len()
                        ),
                    )
                    .at_opt(span_location(param.span))),
                }
            }
            ParamType::Category(EntityType::Value | EntityType::Any) => Ok(Entity::name(text)),
            ParamType::Program(expected) => match literal_for(expected, text) {
                Some(literal) => {
                    let id = self.arena.alloc(Provenance::default());
                    Ok(Entity::Node(Node::new(
                        id,
                        Span::synthetic(),
                        NodeKind::Literal(literal),
                    )))
                }
                None => Err(unresolved(&format!("`{expected}` literal"))),
            },
            other => Err(Diagnostic::error(
                Category::TypeMismatch,
                format!("a {other} argument for `{}` cannot be given as text", param.node),
            )
            .at_opt(span_location(param.span))),
        }
    }

    fn build_statements(
        &mut self,
        interface: &InterfaceDecl,
        option: &OptionDecl,
        declared: &BTreeMap<String, Arc<TraitSignature>>,
    ) -> Result<(), Diagnostic> {
        let interface_traits: BTreeSet<&str> = interface
            .traits
            .iter()
            .map(|decl| decl.name.node.as_str())
            .collect();
        for stmt in &interface.statements {
            self.statements.push(RealizationStatement::new(
                &interface.name.node,
                Level::Interface,
                stmt,
                |name| {
                    interface_traits
                        .contains(name)
                        .then(|| declared.get(name).cloned())
                        .flatten()
                },
            )?);
        }
        for stmt in &option.statements {
            self.statements.push(RealizationStatement::new(
                &option.name.node,
                Level::Option,
                stmt,
                |name| declared.get(name).cloned(),
            )?);
        }

        let mut singleton_owner: BTreeMap<&str, Span> = BTreeMap::new();
        for stmt in self.statements.iter().filter(|stmt| stmt.is_singleton()) {
            for name in stmt.names() {
                if let Some(first) = singleton_owner.insert(name, stmt.span) {
                    let diag = Diagnostic::error(
                        Category::InvalidStatement,
                        format!("singleton `{name}` is realized by more than one statement"),
                    )
                    .at_opt(span_location(stmt.span));
                    return Err(match span_location(first) {
                        Some(location) => diag.with_label(location, "first realized here"),
                        None => diag,
                    });
                }
            }
        }

        for decl in interface.traits.iter().filter(|decl| decl.modifiers.is_abstract) {
            let realized = self
                .statements
                .iter()
                .any(|stmt| stmt.level == Level::Option && stmt.realizes_name(&decl.name.node));
            if !realized {
                return Err(Diagnostic::error(
                    Category::NotRealized,
                    format!(
                        "option `{}` does not realize abstract trait `{}` of `{}`",
                        self.option, decl.name.node, self.interface
                    ),
                )
                .at_opt(span_location(self.span).or_else(|| span_location(decl.span))));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn option_name(&self) -> &str {
        &self.option
    }

    pub fn interface_name(&self) -> &str {
        &self.interface
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn is_solved(&self) -> bool {
        self.solved
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn store(&self) -> &FactStore {
        &self.store
    }

    pub fn relation(&self, name: &str) -> Option<&TraitValue> {
        self.store.get(name)
    }

    /// A constructor argument or resolved singleton variable.
    pub fn lookup_entity(&self, name: &str) -> Option<&Entity> {
        self.globals.lookup_entity(name)
    }

    /// Like [`lookup_entity`](Self::lookup_entity), for contexts where the
    /// variable must be bound.
    pub fn require_entity(&self, name: &str) -> Result<&Entity, Diagnostic> {
        self.globals.require(name).map_err(|err| {
            Diagnostic::error(Category::UndefinedName, err.to_string())
                .at_opt(span_location(self.span))
        })
    }

    /// The declaring type recorded for a synthesized node, else the
    /// program's static type of the node.
    pub fn lookup_type_binding(&self, node: &Node) -> Option<TypeDesc> {
        self.arena
            .get(node.id)
            .and_then(|prov| prov.declaring_type.clone())
            .or_else(|| self.facts.type_of(&Entity::Node(node.clone())))
    }

    /// Every global binding, for message formatting.
    pub fn extract_as_bindings(&self) -> BindingMap {
        self.globals.clone()
    }

    pub fn generated_locals(&self) -> &[GeneratedEntity] {
        &self.generated
    }

    pub fn provenance(&self) -> &ProvenanceArena {
        &self.arena
    }

    pub fn trace(&self) -> &SolveTrace {
        &self.trace
    }
}

fn literal_for(ty: &TypeDesc, text: &str) -> Option<Literal> {
    match ty {
        TypeDesc::Primitive(Primitive::Boolean) => text.parse().ok().map(Literal::Bool),
        TypeDesc::Primitive(Primitive::Int) => text.parse().ok().map(Literal::Int),
        TypeDesc::Primitive(Primitive::Char) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Literal::Char(c)),
                _ => None,
            }
        }
        TypeDesc::Named { .. } if ty.simple_name() == Some("String") => {
            Some(Literal::Str(text.to_string()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use tenet_ast::rules::{ExprKind, build};

    fn construct(
        interface: &InterfaceDecl,
        option: &OptionDecl,
        args: Vec<ConstructorArg>,
    ) -> Result<OptionMatchTable, EngineError> {
        OptionMatchTable::construct(
            interface,
            option,
            args,
            fixtures::program(),
            &NoRelations,
            SolverConfig::default(),
        )
    }

    fn first_diagnostic(err: EngineError) -> Diagnostic {
        err.diagnostics()
            .first()
            .cloned()
            .unwrap_or_else(|| panic!("expected a user error, got {err}"))
    }

    #[test]
    fn builtins_are_seeded_and_arguments_bound() {
        let interface = fixtures::interface("Property", vec![], vec![]);
        let option = fixtures::option(
            "Named",
            "Property",
            vec![
                build::param("owner", build::category("type")),
                build::param("attr", build::category("field")),
                build::param("label", build::program_type("String")),
            ],
            vec![],
            vec![],
        );
        let table = construct(
            &interface,
            &option,
            vec!["Person".into(), "Person.nickName".into(), "nick".into()],
        )
        .unwrap();

        assert!(table.relation(crate::DECLARES_FIELD).is_some_and(|rel| !rel.is_empty()));
        assert_eq!(
            table.lookup_entity("owner"),
            Some(&Entity::Type(TypeDesc::named("Person")))
        );
        let attr = table.lookup_entity("attr").and_then(Entity::as_node).unwrap();
        assert_eq!(attr.name(), Some("nickName"));
        let label = table.lookup_entity("label").and_then(Entity::as_node).unwrap();
        assert_eq!(label.kind, NodeKind::Literal(Literal::Str("nick".into())));
        assert!(table.provenance().contains(label.id));
        assert_eq!(table.lookup_type_binding(label), Some(TypeDesc::string()));
        assert!(table.extract_as_bindings().contains("attr"));
        assert!(table.require_entity("missing").is_err());
    }

    #[test]
    fn ambiguous_and_unknown_members_are_reported() {
        let interface = fixtures::interface("Property", vec![], vec![]);
        let option = fixtures::option(
            "Named",
            "Property",
            vec![build::param("attr", build::category("field"))],
            vec![],
            vec![],
        );
        let err = construct(&interface, &option, vec!["name".into()]).unwrap_err();
        assert_eq!(first_diagnostic(err).category, Category::AmbiguousBinding);

        let err = construct(&interface, &option, vec!["Person.missing".into()]).unwrap_err();
        assert_eq!(first_diagnostic(err).category, Category::UnresolvedBinding);

        let err = construct(&interface, &option, vec![]).unwrap_err();
        insta::assert_snapshot!(first_diagnostic(err).to_string(), @"error[E0109]: option `Named` takes 1 arguments, found 0");
    }

    #[test]
    fn name_clashes_are_rejected() {
        let interface = fixtures::interface(
            "Property",
            vec![build::trait_decl(
                "attr",
                vec![build::param("attrName", build::category("value"))],
                build::singleton(),
            )],
            vec![],
        );
        let twice = fixtures::option(
            "Named",
            "Property",
            vec![],
            vec![build::trait_decl("attr", vec![], build::plain())],
            vec![],
        );
        let err = construct(&interface, &twice, vec![]).unwrap_err();
        insta::assert_snapshot!(first_diagnostic(err).to_string(), @"error[E0107]: trait `attr` is declared twice");

        let shared_variable = fixtures::option(
            "Named",
            "Property",
            vec![],
            vec![build::trait_decl(
                "other",
                vec![build::param("attrName", build::category("value"))],
                build::singleton(),
            )],
            vec![],
        );
        let err = construct(&interface, &shared_variable, vec![]).unwrap_err();
        assert_eq!(first_diagnostic(err).category, Category::NameClash);

        let param_clash = fixtures::option(
            "Named",
            "Property",
            vec![build::param("attrName", build::category("value"))],
            vec![],
            vec![],
        );
        let err = construct(&interface, &param_clash, vec!["x".into()]).unwrap_err();
        assert_eq!(first_diagnostic(err).category, Category::NameClash);
    }

    #[test]
    fn abstract_traits_must_be_realized_by_the_option() {
        let interface = fixtures::interface(
            "Property",
            vec![build::trait_decl(
                "attr",
                vec![build::param("attrName", build::category("value"))],
                tenet_ast::rules::TraitModifiers {
                    is_abstract: true,
                    is_singleton: true,
                    ..Default::default()
                },
            )],
            vec![],
        );
        let option = fixtures::option("Named", "Property", vec![], vec![], vec![]);
        let err = construct(&interface, &option, vec![]).unwrap_err();
        assert_eq!(first_diagnostic(err).category, Category::NotRealized);

        let realized = fixtures::option(
            "Named",
            "Property",
            vec![],
            vec![],
            vec![build::realize(&["attr"], build::expr(ExprKind::True))],
        );
        assert!(construct(&interface, &realized, vec![]).is_ok());
    }

    #[test]
    fn relation_arguments_come_from_the_resolver() {
        struct Solved(TraitValue);
        impl RelationResolver for Solved {
            fn resolve_relation(&self, instance: &str, relation: &str) -> Option<&TraitValue> {
                (instance == "first" && relation == "pairs").then_some(&self.0)
            }
        }

        let source_sig = Arc::new(
            TraitSignature::from_decl(&build::trait_decl(
                "pairs",
                vec![build::param("a", build::category("value"))],
                build::plain(),
            ))
            .unwrap(),
        );
        let mut source = TraitValue::new(source_sig.clone(), false, false);
        source.insert(
            tenet_types::EntityTuple::positional(source_sig, vec![Entity::name("x")]).unwrap(),
        );

        let interface = fixtures::interface("Property", vec![], vec![]);
        let option = fixtures::option(
            "Named",
            "Property",
            vec![build::param(
                "known",
                tenet_ast::rules::TypeExpr::Relation(vec![build::param(
                    "v",
                    build::category("value"),
                )]),
            )],
            vec![],
            vec![],
        );
        let table = OptionMatchTable::construct(
            &interface,
            &option,
            vec!["first.pairs".into()],
            fixtures::program(),
            &Solved(source),
            SolverConfig::default(),
        )
        .unwrap();
        let known = table.relation("known").unwrap();
        assert!(known.is_nested);
        assert_eq!(
            known.tuples().next().and_then(|t| t.get("v")),
            Some(&Entity::name("x"))
        );

        let err = construct(&interface, &option, vec!["first.pairs".into()]).unwrap_err();
        assert_eq!(first_diagnostic(err).category, Category::UnresolvedBinding);
    }
}
