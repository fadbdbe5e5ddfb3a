use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tenet_diag::InternalError;
use tenet_types::{EntityTuple, TraitSignature};

const COMPONENT: &str = "fact store";

/// The extent of one trait within an instantiation.
#[derive(Debug, Clone)]
pub struct TraitValue {
    pub name: String,
    pub signature: Arc<TraitSignature>,
    tuples: BTreeSet<EntityTuple>,
    pub is_static: bool,
    /// Bound from a relation-valued constructor argument.
    pub is_nested: bool,
}

impl TraitValue {
    pub fn new(signature: Arc<TraitSignature>, is_nested: bool, is_static: bool) -> Self {
        Self {
            name: signature.name.clone(),
            signature,
            tuples: BTreeSet::new(),
            is_static,
            is_nested,
        }
    }

    pub fn tuples(&self) -> impl Iterator<Item = &EntityTuple> {
        self.tuples.iter()
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn contains(&self, tuple: &EntityTuple) -> bool {
        self.tuples.contains(tuple)
    }

    /// Insert a tuple; false when an equal tuple is already present.
    pub fn insert(&mut self, tuple: EntityTuple) -> bool {
        self.tuples.insert(tuple)
    }
}

/// All relations of one instantiation: built-ins, declared traits, and
/// relation-valued arguments. Extents only grow.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    traits: BTreeMap<String, TraitValue>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_builtin_trait(&mut self, signature: Arc<TraitSignature>) {
        self.traits
            .entry(signature.name.clone())
            .or_insert_with(|| TraitValue::new(signature, false, true));
    }

    pub fn add_trait(&mut self, signature: Arc<TraitSignature>, is_nested: bool, is_static: bool) {
        self.traits
            .entry(signature.name.clone())
            .or_insert_with(|| TraitValue::new(signature, is_nested, is_static));
    }

    /// Register a complete relation value under its own name.
    pub fn add_value(&mut self, value: TraitValue) {
        self.traits.insert(value.name.clone(), value);
    }

    /// Add a tuple to a known relation; `Ok(false)` when it was present.
    pub fn add_trait_instance(
        &mut self,
        name: &str,
        tuple: EntityTuple,
    ) -> Result<bool, InternalError> {
        let value = self.traits.get_mut(name).ok_or_else(|| {
            InternalError::new(COMPONENT, format!("relation `{name}` is not registered"))
        })?;
        Ok(value.insert(tuple))
    }

    /// Write the only tuple of a singleton.
    pub fn add_singleton(&mut self, tuple: EntityTuple) -> Result<(), InternalError> {
        let name = tuple.trait_name().to_string();
        let value = self.traits.get_mut(&name).ok_or_else(|| {
            InternalError::new(COMPONENT, format!("singleton `{name}` is not registered"))
        })?;
        if !value.is_empty() {
            return Err(InternalError::new(
                COMPONENT,
                format!("singleton `{name}` is written twice"),
            ));
        }
        value.insert(tuple);
        Ok(())
    }

    pub fn get_singleton(&self, name: &str) -> Result<&EntityTuple, InternalError> {
        let value = self.traits.get(name).ok_or_else(|| {
            InternalError::new(COMPONENT, format!("singleton `{name}` is not registered"))
        })?;
        match (value.len(), value.tuples().next()) {
            (1, Some(tuple)) => Ok(tuple),
            (count, _) => Err(InternalError::new(
                COMPONENT,
                format!("singleton `{name}` read with {count} tuples"),
            )),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TraitValue> {
        self.traits.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.traits.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.traits.keys().map(String::as_str)
    }

    pub fn total_tuples(&self) -> usize {
        self.traits.values().map(TraitValue::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenet_ast::Entity;
    use tenet_types::{EntityType, ParamType, TraitFlags, Variable};

    fn signature(name: &str, flags: TraitFlags) -> Arc<TraitSignature> {
        Arc::new(
            TraitSignature::new(
                name,
                vec![Variable::new("x", ParamType::Category(EntityType::Value))],
                flags,
            )
            .unwrap(),
        )
    }

    fn tuple(sig: &Arc<TraitSignature>, value: &str) -> EntityTuple {
        EntityTuple::positional(sig.clone(), vec![Entity::name(value)]).unwrap()
    }

    #[test]
    fn instances_are_idempotent() {
        let sig = signature("named", TraitFlags::default());
        let mut store = FactStore::new();
        store.add_trait(sig.clone(), false, false);
        assert!(store.add_trait_instance("named", tuple(&sig, "a")).unwrap());
        assert!(!store.add_trait_instance("named", tuple(&sig, "a")).unwrap());
        assert!(store.add_trait_instance("named", tuple(&sig, "b")).unwrap());
        assert_eq!(store.total_tuples(), 2);
    }

    #[test]
    fn unknown_relation_is_internal() {
        let sig = signature("named", TraitFlags::default());
        let mut store = FactStore::new();
        let err = store.add_trait_instance("named", tuple(&sig, "a")).unwrap_err();
        assert_eq!(err.component, COMPONENT);
    }

    #[test]
    fn singletons_are_write_once() {
        let sig = signature(
            "attr",
            TraitFlags {
                is_singleton: true,
                ..TraitFlags::default()
            },
        );
        let mut store = FactStore::new();
        store.add_trait(sig.clone(), false, false);
        assert!(store.get_singleton("attr").is_err());
        store.add_singleton(tuple(&sig, "nickName")).unwrap();
        assert_eq!(
            store.get_singleton("attr").unwrap().get("x"),
            Some(&Entity::name("nickName"))
        );
        let err = store.add_singleton(tuple(&sig, "other")).unwrap_err();
        assert!(err.message.contains("written twice"));
    }

    #[test]
    fn registration_keeps_the_first_value() {
        let sig = signature("declares", TraitFlags::default());
        let mut store = FactStore::new();
        store.add_builtin_trait(sig.clone());
        store.add_trait_instance("declares", tuple(&sig, "a")).unwrap();
        store.add_builtin_trait(sig);
        assert_eq!(store.get("declares").map(TraitValue::len), Some(1));
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["declares"]);
    }
}
