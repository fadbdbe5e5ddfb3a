//! Dependency scheduling of realization statements.
//!
//! Statements are grouped before they are ordered. Every singleton and every
//! local statement is a group of its own; plain statements that realize the
//! same trait or read each other's traits monotonically share one fixpoint
//! group. Edges run from the group realizing a dependency to the group that
//! needs it, and groups are run in Kahn layers.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use tenet_diag::{Category, Diagnostic, InternalError};
use tenet_match::span_location;

use crate::statement::{DependencyContext, RealizationStatement};

const COMPONENT: &str = "dependency graph";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Singleton,
    Local,
    Fixpoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub kind: GroupKind,
    /// Indices into the statements the graph was built from.
    pub statements: Vec<usize>,
    pub relations: BTreeSet<String>,
    /// Some statement reads a relation realized in this group.
    pub recursive: bool,
}

impl Group {
    fn new(kind: GroupKind) -> Self {
        Self {
            kind,
            statements: Vec::new(),
            relations: BTreeSet::new(),
            recursive: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<Group, ()>,
}

impl DependencyGraph {
    /// Group and connect `statements`. Any cycle is a user error.
    pub fn build(
        statements: &[RealizationStatement],
        ctx: &DependencyContext,
    ) -> Result<Self, Diagnostic> {
        let is_plain = |idx: usize| !statements[idx].is_singleton() && !statements[idx].is_local();

        let mut deps = Vec::with_capacity(statements.len());
        let mut peers = Vec::with_capacity(statements.len());
        for (idx, stmt) in statements.iter().enumerate() {
            deps.push(stmt.dependencies(ctx)?);
            peers.push(if is_plain(idx) {
                stmt.fixpoint_peers(ctx)
            } else {
                BTreeSet::new()
            });
        }

        let mut realizers: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, stmt) in statements.iter().enumerate() {
            for name in stmt.names() {
                realizers.entry(name).or_default().push(idx);
            }
        }

        let mut sets = UnionFind::new(statements.len());
        for (idx, stmt) in statements.iter().enumerate() {
            if !is_plain(idx) {
                continue;
            }
            for name in stmt.names().chain(peers[idx].iter().map(String::as_str)) {
                for &other in realizers.get(name).into_iter().flatten() {
                    if is_plain(other) {
                        sets.union(idx, other);
                    }
                }
            }
        }

        let mut graph: DiGraph<Group, ()> = DiGraph::new();
        let mut fixpoints: BTreeMap<usize, NodeIndex> = BTreeMap::new();
        let mut group_of = Vec::with_capacity(statements.len());
        for (idx, stmt) in statements.iter().enumerate() {
            let node = if is_plain(idx) {
                *fixpoints
                    .entry(sets.find(idx))
                    .or_insert_with(|| graph.add_node(Group::new(GroupKind::Fixpoint)))
            } else if stmt.is_singleton() {
                graph.add_node(Group::new(GroupKind::Singleton))
            } else {
                graph.add_node(Group::new(GroupKind::Local))
            };
            graph[node].statements.push(idx);
            graph[node]
                .relations
                .extend(stmt.names().map(str::to_string));
            group_of.push(node);
        }
        for (idx, &node) in group_of.iter().enumerate() {
            let recursive = peers[idx]
                .iter()
                .any(|name| graph[node].relations.contains(name));
            graph[node].recursive |= recursive;
        }

        for (idx, stmt_deps) in deps.iter().enumerate() {
            let target = group_of[idx];
            for dep in stmt_deps {
                for &source_stmt in realizers.get(dep.as_str()).into_iter().flatten() {
                    let source = group_of[source_stmt];
                    if source == target {
                        return Err(cycle(&graph, &[target], statements));
                    }
                    graph.update_edge(source, target, ());
                }
            }
        }

        if let Some(scc) = tarjan_scc(&graph).into_iter().find(|scc| scc.len() > 1) {
            return Err(cycle(&graph, &scc, statements));
        }

        tracing::debug!(
            statements = statements.len(),
            groups = graph.node_count(),
            edges = graph.edge_count(),
            "built dependency graph"
        );
        Ok(Self { graph })
    }

    pub fn group(&self, index: usize) -> &Group {
        &self.graph[NodeIndex::new(index)]
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.graph.node_weights()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Group indices in Kahn layers: every group comes after all groups it
    /// depends on.
    pub fn layers(&self) -> Result<Vec<Vec<usize>>, InternalError> {
        let mut pending: BTreeMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|node| {
                let incoming = self
                    .graph
                    .neighbors_directed(node, Direction::Incoming)
                    .count();
                (node, incoming)
            })
            .collect();

        let mut layers = Vec::new();
        while !pending.is_empty() {
            let ready: Vec<NodeIndex> = pending
                .iter()
                .filter(|(_, incoming)| **incoming == 0)
                .map(|(node, _)| *node)
                .collect();
            if ready.is_empty() {
                return Err(InternalError::new(
                    COMPONENT,
                    format!("{} groups left unscheduled", pending.len()),
                ));
            }
            for node in &ready {
                pending.remove(node);
                for next in self.graph.neighbors_directed(*node, Direction::Outgoing) {
                    if let Some(incoming) = pending.get_mut(&next) {
                        *incoming -= 1;
                    }
                }
            }
            layers.push(ready.into_iter().map(NodeIndex::index).collect());
        }
        Ok(layers)
    }
}

fn cycle(
    graph: &DiGraph<Group, ()>,
    nodes: &[NodeIndex],
    statements: &[RealizationStatement],
) -> Diagnostic {
    let relations: BTreeSet<&str> = nodes
        .iter()
        .flat_map(|node| graph[*node].relations.iter().map(String::as_str))
        .collect();
    let location = nodes
        .iter()
        .flat_map(|node| graph[*node].statements.iter())
        .find_map(|&idx| span_location(statements[idx].span));
    let names = relations
        .iter()
        .map(|name| format!("`{name}`"))
        .collect::<Vec<_>>()
        .join(", ");
    Diagnostic::error(
        Category::DependencyCycle,
        format!("cyclic dependency among traits {names}"),
    )
    .at_opt(location)
    .with_help(
        "traits may only recurse through references outside negation, universal quantification, implication, and equivalence",
    )
}
