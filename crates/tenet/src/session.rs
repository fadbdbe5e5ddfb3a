use std::collections::BTreeMap;
use std::sync::Arc;

use tenet_ast::rules::RuleModule;
use tenet_diag::{Category, Diagnostic, EngineError, InternalError};
use tenet_match::span_location;
use tenet_solve::{
    ConstructorArg, GeneratedEntity, OptionMatchTable, ProgramFacts, ProgramIndex,
    RelationResolver, SolverConfig, TraitValue,
};

const COMPONENT: &str = "session";

/// One rule module applied to one analyzed program.
///
/// Solved tables can be registered under an instance name so that later
/// instantiations take their relations as `instance.trait` arguments.
pub struct Session {
    module: RuleModule,
    facts: Arc<dyn ProgramFacts>,
    config: SolverConfig,
    instances: BTreeMap<String, OptionMatchTable>,
}

impl Session {
    pub fn new(module: RuleModule, program: ProgramIndex) -> Self {
        Self::with_facts(module, Arc::new(program))
    }

    /// A session over any fact supplier.
    pub fn with_facts(module: RuleModule, facts: Arc<dyn ProgramFacts>) -> Self {
        Self {
            module,
            facts,
            config: SolverConfig::default(),
            instances: BTreeMap::new(),
        }
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn module(&self) -> &RuleModule {
        &self.module
    }

    /// Build the match table of `option` with its constructor arguments,
    /// interface parameters first.
    pub fn construct(
        &self,
        option: &str,
        args: Vec<ConstructorArg>,
    ) -> Result<OptionMatchTable, EngineError> {
        let decl = self.module.find_option(option).ok_or_else(|| {
            Diagnostic::error(Category::MissingConstructor, format!("unknown option `{option}`"))
        })?;
        let interface = self.module.find_interface(&decl.interface.node).ok_or_else(|| {
            Diagnostic::error(
                Category::UndefinedName,
                format!(
                    "option `{option}` implements unknown interface `{}`",
                    decl.interface.node
                ),
            )
            .at_opt(span_location(decl.interface.span))
        })?;
        OptionMatchTable::construct(
            interface,
            decl,
            args,
            Arc::clone(&self.facts),
            self,
            self.config.clone(),
        )
    }

    pub fn solve(&self, table: &mut OptionMatchTable) -> Result<(), EngineError> {
        table.solve()
    }

    /// Entities synthesized by the local statements of a solved table.
    pub fn generate_locals(&self, table: &OptionMatchTable) -> Vec<GeneratedEntity> {
        table.generated_locals().to_vec()
    }

    /// Make a solved table's relations available to later instantiations.
    pub fn register(
        &mut self,
        instance: impl Into<String>,
        table: OptionMatchTable,
    ) -> Result<(), EngineError> {
        let instance = instance.into();
        if !table.is_solved() {
            return Err(InternalError::new(
                COMPONENT,
                format!("instance `{instance}` registered before it was solved"),
            )
            .into());
        }
        if self.instances.contains_key(&instance) {
            return Err(Diagnostic::error(
                Category::NameClash,
                format!("instance `{instance}` is already registered"),
            )
            .into());
        }
        tracing::debug!(%instance, option = table.option_name(), "registered instance");
        self.instances.insert(instance, table);
        Ok(())
    }

    /// Construct, solve, and register in one step.
    pub fn instantiate(
        &mut self,
        instance: &str,
        option: &str,
        args: Vec<ConstructorArg>,
    ) -> Result<&OptionMatchTable, EngineError> {
        let mut table = self.construct(option, args)?;
        table.solve()?;
        self.register(instance, table)?;
        self.instances
            .get(instance)
            .ok_or_else(|| InternalError::new(COMPONENT, format!("instance `{instance}` vanished")).into())
    }

    pub fn instance(&self, name: &str) -> Option<&OptionMatchTable> {
        self.instances.get(name)
    }
}

impl RelationResolver for Session {
    fn resolve_relation(&self, instance: &str, relation: &str) -> Option<&TraitValue> {
        self.instances.get(instance)?.relation(relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenet_ast::rules::{InterfaceDecl, OptionDecl, build};
    use tenet_ast::{FileId, Modifier, NodeFactory, Span, Spanned, TypeDesc};

    fn session() -> Session {
        let mut f = NodeFactory::new(FileId(0));
        let name = f.field(vec![Modifier::Private], TypeDesc::string(), "name", None);
        let person = f.class("Person", vec![], None, vec![name]);
        let module = RuleModule {
            interfaces: vec![InterfaceDecl {
                name: Spanned::synthetic("Fields".into()),
                params: vec![],
                traits: vec![],
                statements: vec![],
                span: Span::synthetic(),
            }],
            options: vec![OptionDecl {
                name: Spanned::synthetic("All".into()),
                interface: Spanned::synthetic("Fields".into()),
                params: vec![],
                traits: vec![build::trait_decl(
                    "field",
                    vec![build::param("f", build::category("field"))],
                    build::plain(),
                )],
                statements: vec![build::realize(
                    &["field"],
                    build::trait_app(
                        tenet_solve::DECLARES_FIELD,
                        vec![build::tvar("_"), build::tvar("f")],
                    ),
                )],
                span: Span::synthetic(),
            }],
        };
        Session::new(module, ProgramIndex::new(vec![person]))
    }

    #[test]
    fn unknown_options_have_no_constructor() {
        let err = session().construct("Missing", vec![]).unwrap_err();
        insta::assert_snapshot!(err, @"error[E0108]: unknown option `Missing`");
    }

    #[test]
    fn registered_relations_resolve_by_instance() {
        let mut session = session();
        assert!(session.resolve_relation("all", "field").is_none());
        session.instantiate("all", "All", vec![]).unwrap();
        assert_eq!(session.resolve_relation("all", "field").map(TraitValue::len), Some(1));
        assert!(session.resolve_relation("all", "missing").is_none());
    }

    #[test]
    fn instances_are_registered_once_and_only_when_solved() {
        let mut session = session();
        let table = session.construct("All", vec![]).unwrap();
        assert!(session.register("all", table).unwrap_err().is_internal());

        session.instantiate("all", "All", vec![]).unwrap();
        let mut again = session.construct("All", vec![]).unwrap();
        session.solve(&mut again).unwrap();
        let err = session.register("all", again).unwrap_err();
        assert_eq!(err.diagnostics()[0].category, Category::NameClash);
    }
}
