//! Binding maps and sets of binding maps.
//!
//! A [`BindingMap`] is one consistent assignment of variables to entities,
//! plus an optional result slot used while matching and generating
//! fragments. A [`BindingsSet`] is a set of alternative assignments; it is a
//! monoid under [`BindingsSet::product`] with [`BindingsSet::unit`] as
//! identity.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use tenet_ast::{Entity, NodeId};

use crate::WILDCARD;

/// A program node superseded by a freshly generated copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Replacement {
    pub original: NodeId,
    pub replacement: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("variable `{name}` is not bound")]
pub struct UnboundVariable {
    pub name: String,
}

/// Variable name -> entity, plus a result slot.
///
/// Equality, ordering, and hashing look at the bindings and the result,
/// including the program locations of bound nodes; recorded replacements ride
/// along without distinguishing maps. [`BindingMap::bind`] itself unifies by
/// shape, as does [`BindingMap::unify_merge`]; [`BindingMap::consistent_merge`]
/// joins by location.
#[derive(Debug, Clone, Default)]
pub struct BindingMap {
    bindings: BTreeMap<String, Entity>,
    result: Option<Entity>,
    replacements: BTreeSet<Replacement>,
}

impl BindingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map holding only a result.
    pub fn with_result(result: Entity) -> Self {
        Self {
            result: Some(result),
            ..Self::default()
        }
    }

    /// Bind `name` to `value`. Returns false when `name` is already bound to
    /// a different entity; the wildcard never binds.
    pub fn bind(&mut self, name: &str, value: Entity) -> bool {
        if name == WILDCARD {
            return true;
        }
        match self.bindings.get(name) {
            Some(existing) => *existing == value,
            None => {
                self.bindings.insert(name.to_string(), value);
                true
            }
        }
    }

    /// Set the result. Returns false when a different result is present.
    pub fn set_result(&mut self, value: Entity) -> bool {
        match &self.result {
            Some(existing) => *existing == value,
            None => {
                self.result = Some(value);
                true
            }
        }
    }

    pub fn result(&self) -> Option<&Entity> {
        self.result.as_ref()
    }

    pub fn take_result(&mut self) -> Option<Entity> {
        self.result.take()
    }

    /// This map with the result slot cleared.
    pub fn without_result(mut self) -> Self {
        self.result = None;
        self
    }

    pub fn lookup_entity(&self, name: &str) -> Option<&Entity> {
        self.bindings.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Entity, UnboundVariable> {
        self.lookup_entity(name).ok_or_else(|| UnboundVariable {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.result.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entity)> {
        self.bindings.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Union of two maps when every shared name (and the result) agrees.
    /// Agreement includes program location: a join never pairs a node with
    /// a look-alike declared elsewhere.
    pub fn consistent_merge(&self, other: &BindingMap) -> Option<BindingMap> {
        self.merge_with(other, Entity::aliases)
    }

    /// Union of two maps when every shared name (and the result) agrees in
    /// shape. Sub-results of one pattern combine this way, so a repeated
    /// pattern variable matches equal subtrees wherever they sit.
    pub fn unify_merge(&self, other: &BindingMap) -> Option<BindingMap> {
        self.merge_with(other, |a, b| a == b)
    }

    fn merge_with(
        &self,
        other: &BindingMap,
        agree: impl Fn(&Entity, &Entity) -> bool,
    ) -> Option<BindingMap> {
        let (mut merged, smaller) = if self.bindings.len() >= other.bindings.len() {
            (self.clone(), other)
        } else {
            (other.clone(), self)
        };
        for (name, value) in &smaller.bindings {
            match merged.bindings.get(name) {
                Some(existing) if !agree(existing, value) => return None,
                Some(_) => {}
                None => {
                    merged.bind(name, value.clone());
                }
            }
        }
        if let Some(result) = &smaller.result {
            match &merged.result {
                Some(existing) if !agree(existing, result) => return None,
                Some(_) => {}
                None => merged.result = Some(result.clone()),
            }
        }
        merged
            .replacements
            .extend(smaller.replacements.iter().copied());
        Some(merged)
    }

    pub fn record_replacement(&mut self, original: NodeId, replacement: NodeId) {
        self.replacements.insert(Replacement {
            original,
            replacement,
        });
    }

    pub fn replacements(&self) -> impl Iterator<Item = &Replacement> {
        self.replacements.iter()
    }

    fn locations(&self) -> Vec<Vec<NodeId>> {
        self.bindings
            .values()
            .chain(&self.result)
            .map(Entity::locations)
            .collect()
    }

    /// Drop the named variables (quantified variables leaving scope).
    pub fn project_out<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        for name in names {
            self.bindings.remove(name);
        }
        self
    }

    /// Keep only the named variables.
    pub fn restrict_to<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut out = Self {
            replacements: self.replacements.clone(),
            ..Self::default()
        };
        for name in names {
            if let Some(value) = self.bindings.get(name) {
                out.bindings.insert(name.to_string(), value.clone());
            }
        }
        out
    }
}

impl PartialEq for BindingMap {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BindingMap {}

impl PartialOrd for BindingMap {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BindingMap {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bindings
            .cmp(&other.bindings)
            .then_with(|| self.result.cmp(&other.result))
            .then_with(|| self.locations().cmp(&other.locations()))
    }
}

impl Hash for BindingMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bindings.hash(state);
        self.result.hash(state);
        self.locations().hash(state);
    }
}

impl fmt::Display for BindingMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (name, value)) in self.bindings.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name} = {value}")?;
        }
        if let Some(result) = &self.result {
            if !self.bindings.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "=> {result}")?;
        }
        write!(f, "}}")
    }
}

// ---------------------------------------------------------------------------
// Sets of alternatives
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingsSet {
    maps: BTreeSet<BindingMap>,
}

impl BindingsSet {
    /// The empty set: no solutions.
    pub fn new() -> Self {
        Self::default()
    }

    /// The set holding one empty map: identity of [`BindingsSet::product`].
    pub fn unit() -> Self {
        Self::single(BindingMap::new())
    }

    pub fn single(map: BindingMap) -> Self {
        let mut maps = BTreeSet::new();
        maps.insert(map);
        Self { maps }
    }

    pub fn insert(&mut self, map: BindingMap) -> bool {
        self.maps.insert(map)
    }

    pub fn union(&mut self, other: BindingsSet) {
        self.maps.extend(other.maps);
    }

    /// Every consistent merge of one map from each side.
    pub fn product(&self, other: &BindingsSet) -> BindingsSet {
        let mut out = BindingsSet::new();
        for left in &self.maps {
            for right in &other.maps {
                if let Some(merged) = left.consistent_merge(right) {
                    out.maps.insert(merged);
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BindingMap> {
        self.maps.iter()
    }

    pub fn map(self, mut f: impl FnMut(BindingMap) -> BindingMap) -> BindingsSet {
        self.maps.into_iter().map(&mut f).collect()
    }
}

impl FromIterator<BindingMap> for BindingsSet {
    fn from_iter<I: IntoIterator<Item = BindingMap>>(iter: I) -> Self {
        Self {
            maps: iter.into_iter().collect(),
        }
    }
}

impl Extend<BindingMap> for BindingsSet {
    fn extend<I: IntoIterator<Item = BindingMap>>(&mut self, iter: I) {
        self.maps.extend(iter);
    }
}

impl IntoIterator for BindingsSet {
    type Item = BindingMap;
    type IntoIter = std::collections::btree_set::IntoIter<BindingMap>;

    fn into_iter(self) -> Self::IntoIter {
        self.maps.into_iter()
    }
}

impl<'a> IntoIterator for &'a BindingsSet {
    type Item = &'a BindingMap;
    type IntoIter = std::collections::btree_set::Iter<'a, BindingMap>;

    fn into_iter(self) -> Self::IntoIter {
        self.maps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BindingMap {
        let mut m = BindingMap::new();
        for (name, value) in pairs {
            assert!(m.bind(name, Entity::name(*value)));
        }
        m
    }

    #[test]
    fn bind_rejects_conflicts_and_ignores_wildcard() {
        let mut m = map(&[("x", "a")]);
        assert!(m.bind("x", Entity::name("a")));
        assert!(!m.bind("x", Entity::name("b")));
        assert!(m.bind(WILDCARD, Entity::name("z")));
        assert!(!m.contains(WILDCARD));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn merge_fails_on_conflicting_names_or_results() {
        let a = map(&[("x", "a"), ("y", "b")]);
        let b = map(&[("y", "b"), ("z", "c")]);
        let merged = a.consistent_merge(&b).unwrap();
        assert_eq!(merged, map(&[("x", "a"), ("y", "b"), ("z", "c")]));

        let c = map(&[("y", "other")]);
        assert!(a.consistent_merge(&c).is_none());

        let r1 = BindingMap::with_result(Entity::name("p"));
        let r2 = BindingMap::with_result(Entity::name("q"));
        assert!(r1.consistent_merge(&r2).is_none());
        assert!(r1.consistent_merge(&r1.clone()).is_some());
    }

    #[test]
    fn replacements_do_not_affect_equality() {
        let mut a = map(&[("x", "a")]);
        let b = a.clone();
        a.record_replacement(NodeId(1), NodeId(9));
        assert_eq!(a, b);
        let merged = b.consistent_merge(&a).unwrap();
        assert_eq!(merged.replacements().count(), 1);
    }

    #[test]
    fn sets_keep_equal_shapes_at_distinct_locations() {
        let mut f = tenet_ast::NodeFactory::new(tenet_ast::FileId(0));
        let mut field = || {
            let node = f.field(vec![], tenet_ast::TypeDesc::string(), "name", None);
            let mut m = BindingMap::new();
            m.bind("f", Entity::Node(node.clone()));
            (node, m)
        };
        let (person, a) = field();
        let (_, b) = field();
        assert_ne!(a, b);
        let set: BindingsSet = [a.clone(), b.clone(), a.clone()].into_iter().collect();
        assert_eq!(set.len(), 2);

        // Joins need the same location; pattern unification goes by shape.
        assert!(a.consistent_merge(&b).is_none());
        assert!(a.consistent_merge(&a.clone()).is_some());
        assert!(a.unify_merge(&b).is_some());
        let mut again = b.clone();
        assert!(again.bind("f", Entity::Node(person)));
    }

    #[test]
    fn require_reports_unbound_names() {
        let m = map(&[("x", "a")]);
        assert_eq!(m.require("x"), Ok(&Entity::name("a")));
        assert_eq!(
            m.require("y").unwrap_err().to_string(),
            "variable `y` is not bound"
        );
    }

    #[test]
    fn projection_and_restriction() {
        let m = map(&[("x", "a"), ("y", "b"), ("z", "c")]);
        assert_eq!(m.clone().project_out(["y"]), map(&[("x", "a"), ("z", "c")]));
        assert_eq!(m.restrict_to(["y", "missing"]), map(&[("y", "b")]));
    }

    #[test]
    fn product_keeps_only_consistent_pairs() {
        let left: BindingsSet = [map(&[("x", "a")]), map(&[("x", "b")])].into_iter().collect();
        let right: BindingsSet = [map(&[("x", "a"), ("y", "1")]), map(&[("y", "2")])]
            .into_iter()
            .collect();
        let product = left.product(&right);
        let expected: BindingsSet = [
            map(&[("x", "a"), ("y", "1")]),
            map(&[("x", "a"), ("y", "2")]),
            map(&[("x", "b"), ("y", "2")]),
        ]
        .into_iter()
        .collect();
        assert_eq!(product, expected);
        assert!(left.product(&BindingsSet::new()).is_empty());
        assert_eq!(left.product(&BindingsSet::unit()), left);
    }

    #[test]
    fn display_lists_bindings_then_result() {
        let mut m = map(&[("x", "a")]);
        m.set_result(Entity::name("r"));
        assert_eq!(m.to_string(), "{x = a, => r}");
    }
}
