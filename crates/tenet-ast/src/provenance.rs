//! Node id allocation and provenance of synthesized nodes.
//!
//! Program trees get sequential ids from a [`NodeFactory`]. Every node the
//! engine synthesizes afterwards gets its id from a [`ProvenanceArena`] whose
//! base is the factory's next id, so the id itself indexes the record that
//! says where the node was copied from and which type declares it.

use crate::{
    BinOp, FileId, Literal, Modifier, Node, NodeId, NodeKind, Span, TypeDesc,
};

/// Where a synthesized node came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Provenance {
    /// The program (or earlier synthesized) node this one is a fresh copy of.
    pub copied_from: Option<NodeId>,
    /// The type the synthesized member is intended to live in.
    pub declaring_type: Option<TypeDesc>,
}

#[derive(Debug, Clone, Default)]
pub struct ProvenanceArena {
    base: u32,
    entries: Vec<Provenance>,
}

impl ProvenanceArena {
    pub fn new(base: u32) -> Self {
        Self {
            base,
            entries: Vec::new(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Allocate a fresh id for a synthesized node.
    pub fn alloc(&mut self, provenance: Provenance) -> NodeId {
        let id = NodeId(self.base + self.entries.len() as u32);
        self.entries.push(provenance);
        id
    }

    /// True when `id` was allocated by this arena.
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 >= self.base && ((id.0 - self.base) as usize) < self.entries.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&Provenance> {
        if !self.contains(id) {
            return None;
        }
        self.entries.get((id.0 - self.base) as usize)
    }

    pub fn set_declaring_type(&mut self, id: NodeId, ty: TypeDesc) {
        if self.contains(id) {
            let idx = (id.0 - self.base) as usize;
            self.entries[idx].declaring_type = Some(ty);
        }
    }

    /// Follow `copied_from` links back to the first node outside the arena.
    pub fn origin(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.get(id)?.copied_from?;
        while let Some(prov) = self.get(current) {
            match prov.copied_from {
                Some(prev) => current = prev,
                None => break,
            }
        }
        Some(current)
    }

    /// Original -> replacement pairs, in allocation order.
    pub fn replacements(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.entries.iter().enumerate().filter_map(|(idx, prov)| {
            prov.copied_from
                .map(|original| (original, NodeId(self.base + idx as u32)))
        })
    }
}

/// Builds program trees with sequential node ids.
///
/// Each node gets a one-byte span at its id's offset in the factory's file, so
/// distinct nodes always have distinct locations.
#[derive(Debug, Clone)]
pub struct NodeFactory {
    file: FileId,
    next: u32,
}

impl NodeFactory {
    pub fn new(file: FileId) -> Self {
        Self { file, next: 0 }
    }

    pub fn next_id(&self) -> u32 {
        self.next
    }

    /// An arena for nodes synthesized after this program was built.
    pub fn arena(&self) -> ProvenanceArena {
        ProvenanceArena::new(self.next)
    }

    pub fn node(&mut self, kind: NodeKind) -> Node {
        let id = NodeId(self.next);
        self.next += 1;
        Node::new(id, Span::new(self.file, id.0, id.0 + 1), kind)
    }

    pub fn class(
        &mut self,
        name: &str,
        modifiers: Vec<Modifier>,
        superclass: Option<TypeDesc>,
        members: Vec<Node>,
    ) -> Node {
        self.node(NodeKind::Class {
            name: name.to_string(),
            modifiers,
            annotations: Vec::new(),
            superclass,
            members,
        })
    }

    pub fn field(
        &mut self,
        modifiers: Vec<Modifier>,
        ty: TypeDesc,
        name: &str,
        init: Option<Node>,
    ) -> Node {
        self.node(NodeKind::Field {
            modifiers,
            annotations: Vec::new(),
            ty,
            name: name.to_string(),
            init: init.map(Box::new),
        })
    }

    pub fn method(
        &mut self,
        modifiers: Vec<Modifier>,
        ret: TypeDesc,
        name: &str,
        params: Vec<Node>,
        body: Option<Node>,
    ) -> Node {
        self.node(NodeKind::Method {
            modifiers,
            annotations: Vec::new(),
            ret,
            name: name.to_string(),
            params,
            body: body.map(Box::new),
        })
    }

    /// Attach annotations to a class, field, or method built by this factory.
    pub fn annotate(&mut self, mut decl: Node, names: &[&str]) -> Node {
        let built: Vec<Node> = names.iter().map(|name| self.annotation(name)).collect();
        match &mut decl.kind {
            NodeKind::Class { annotations, .. }
            | NodeKind::Field { annotations, .. }
            | NodeKind::Method { annotations, .. } => annotations.extend(built),
            _ => {}
        }
        decl
    }

    pub fn param(&mut self, ty: TypeDesc, name: &str) -> Node {
        self.node(NodeKind::Param {
            ty,
            name: name.to_string(),
        })
    }

    pub fn annotation(&mut self, name: &str) -> Node {
        self.node(NodeKind::Annotation {
            name: name.to_string(),
            args: Vec::new(),
        })
    }

    pub fn block(&mut self, stmts: Vec<Node>) -> Node {
        self.node(NodeKind::Block(stmts))
    }

    pub fn expr_stmt(&mut self, expr: Node) -> Node {
        self.node(NodeKind::ExprStmt(Box::new(expr)))
    }

    pub fn ret(&mut self, value: Option<Node>) -> Node {
        self.node(NodeKind::Return(value.map(Box::new)))
    }

    pub fn local(&mut self, ty: TypeDesc, name: &str, init: Option<Node>) -> Node {
        self.node(NodeKind::Local {
            ty,
            name: name.to_string(),
            init: init.map(Box::new),
        })
    }

    pub fn lit_str(&mut self, value: &str) -> Node {
        self.node(NodeKind::Literal(Literal::Str(value.to_string())))
    }

    pub fn lit_int(&mut self, value: i64) -> Node {
        self.node(NodeKind::Literal(Literal::Int(value)))
    }

    pub fn name(&mut self, name: &str) -> Node {
        self.node(NodeKind::Name(name.to_string()))
    }

    pub fn this(&mut self) -> Node {
        self.node(NodeKind::This)
    }

    pub fn field_access(&mut self, receiver: Node, field: &str) -> Node {
        self.node(NodeKind::FieldAccess {
            receiver: Box::new(receiver),
            field: field.to_string(),
        })
    }

    pub fn assign(&mut self, target: Node, value: Node) -> Node {
        self.node(NodeKind::Assign {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn call(&mut self, receiver: Option<Node>, method: &str, args: Vec<Node>) -> Node {
        self.node(NodeKind::Call {
            receiver: receiver.map(Box::new),
            method: method.to_string(),
            args,
        })
    }

    pub fn new_object(&mut self, ty: TypeDesc, args: Vec<Node>) -> Node {
        self.node(NodeKind::New { ty, args })
    }

    pub fn binary(&mut self, op: BinOp, left: Node, right: Node) -> Node {
        self.node(NodeKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_ids_start_after_program_ids() {
        let mut factory = NodeFactory::new(FileId(0));
        let lit = factory.lit_int(1);
        let mut arena = factory.arena();
        let copy = arena.alloc(Provenance {
            copied_from: Some(lit.id),
            declaring_type: None,
        });
        assert_eq!(copy, NodeId(1));
        assert!(arena.contains(copy));
        assert!(!arena.contains(lit.id));
        assert_eq!(arena.get(lit.id), None);
        assert_eq!(arena.replacements().collect::<Vec<_>>(), vec![(lit.id, copy)]);
    }

    #[test]
    fn origin_follows_copy_chains() {
        let mut arena = ProvenanceArena::new(10);
        let first = arena.alloc(Provenance {
            copied_from: Some(NodeId(3)),
            declaring_type: None,
        });
        let second = arena.alloc(Provenance {
            copied_from: Some(first),
            declaring_type: None,
        });
        assert_eq!(arena.origin(second), Some(NodeId(3)));
        assert_eq!(arena.origin(NodeId(3)), None);
    }

    #[test]
    fn declaring_type_is_recorded_per_node() {
        let mut arena = ProvenanceArena::new(0);
        let id = arena.alloc(Provenance::default());
        arena.set_declaring_type(id, TypeDesc::named("Person"));
        assert_eq!(
            arena.get(id).and_then(|p| p.declaring_type.clone()),
            Some(TypeDesc::named("Person"))
        );
    }
}
