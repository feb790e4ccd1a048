//! Execution order
//!
//! The order nodes execute in is kept beside the tree, never inside it.
//! `ExecOrder::sequence` derives it from a statement root by a post-order
//! walk over the use-slot protocol, so it always agrees with the operand
//! order passes observe. The links do not own nodes.

use log::trace;
use rustc_hash::FxHashMap;

use crate::arena::IrArena;
use crate::error::{IrError, IrResult};
use crate::node::NodeId;

#[derive(Debug, Clone, Copy, Default)]
struct Links {
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

/// Doubly linked execution order of one statement
#[derive(Debug, Clone, Default)]
pub struct ExecOrder {
    first: Option<NodeId>,
    last: Option<NodeId>,
    links: FxHashMap<NodeId, Links>,
}

impl ExecOrder {
    pub fn new() -> Self {
        ExecOrder::default()
    }

    /// Post-order of the tree rooted at `root`
    pub fn sequence(arena: &IrArena, root: NodeId) -> IrResult<Self> {
        let mut order = ExecOrder::new();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push_back(id);
                continue;
            }
            stack.push((id, true));
            let children: Vec<NodeId> = arena.operands(id)?.collect();
            stack.extend(children.into_iter().rev().map(|child| (child, false)));
        }
        trace!("sequenced {} nodes under {}", order.len(), root);
        Ok(order)
    }

    /// Recompute the order after the tree under `root` changed
    pub fn resequence(&mut self, arena: &IrArena, root: NodeId) -> IrResult<()> {
        *self = ExecOrder::sequence(arena, root)?;
        Ok(())
    }

    pub fn first(&self) -> Option<NodeId> {
        self.first
    }

    pub fn last(&self) -> Option<NodeId> {
        self.last
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.links.get(&id).and_then(|links| links.next)
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.links.get(&id).and_then(|links| links.prev)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.links.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> ExecOrderIter<'_> {
        ExecOrderIter { order: self, cursor: self.first }
    }

    fn push_back(&mut self, id: NodeId) {
        let links = Links { prev: self.last, next: None };
        match self.last {
            Some(last) => self.set_next(last, Some(id)),
            None => self.first = Some(id),
        }
        self.last = Some(id);
        self.links.insert(id, links);
    }

    fn set_next(&mut self, id: NodeId, next: Option<NodeId>) {
        if let Some(links) = self.links.get_mut(&id) {
            links.next = next;
        }
    }

    fn set_prev(&mut self, id: NodeId, prev: Option<NodeId>) {
        if let Some(links) = self.links.get_mut(&id) {
            links.prev = prev;
        }
    }

    /// Insert `id` right before `anchor`. A node already in the order is
    /// moved.
    pub fn insert_before(&mut self, anchor: NodeId, id: NodeId) -> IrResult<()> {
        let anchor_links = *self.links.get(&anchor).ok_or(IrError::NotSequenced(anchor))?;
        if anchor == id {
            return Ok(());
        }
        if self.contains(id) {
            self.remove(id)?;
            return self.insert_before(anchor, id);
        }
        match anchor_links.prev {
            Some(prev) => self.set_next(prev, Some(id)),
            None => self.first = Some(id),
        }
        self.set_prev(anchor, Some(id));
        self.links.insert(id, Links { prev: anchor_links.prev, next: Some(anchor) });
        Ok(())
    }

    /// Insert `id` right after `anchor`. A node already in the order is
    /// moved.
    pub fn insert_after(&mut self, anchor: NodeId, id: NodeId) -> IrResult<()> {
        let anchor_links = *self.links.get(&anchor).ok_or(IrError::NotSequenced(anchor))?;
        if anchor == id {
            return Ok(());
        }
        if self.contains(id) {
            self.remove(id)?;
            return self.insert_after(anchor, id);
        }
        match anchor_links.next {
            Some(next) => self.set_prev(next, Some(id)),
            None => self.last = Some(id),
        }
        self.set_next(anchor, Some(id));
        self.links.insert(id, Links { prev: Some(anchor), next: anchor_links.next });
        Ok(())
    }

    pub fn remove(&mut self, id: NodeId) -> IrResult<()> {
        let links = self.links.remove(&id).ok_or(IrError::NotSequenced(id))?;
        match links.prev {
            Some(prev) => self.set_next(prev, links.next),
            None => self.first = links.next,
        }
        match links.next {
            Some(next) => self.set_prev(next, links.prev),
            None => self.last = links.prev,
        }
        Ok(())
    }
}

/// Iterator over an `ExecOrder`, first to last
pub struct ExecOrderIter<'a> {
    order: &'a ExecOrder,
    cursor: Option<NodeId>,
}

impl Iterator for ExecOrderIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.cursor?;
        self.cursor = self.order.next(current);
        Some(current)
    }
}

impl<'a> IntoIterator for &'a ExecOrder {
    type Item = NodeId;
    type IntoIter = ExecOrderIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A statement: a root node and the order its tree executes in
#[derive(Debug, Clone)]
pub struct Statement {
    root: NodeId,
    order: ExecOrder,
}

impl Statement {
    pub fn new(arena: &IrArena, root: NodeId) -> IrResult<Self> {
        Ok(Statement { root, order: ExecOrder::sequence(arena, root)? })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn order(&self) -> &ExecOrder {
        &self.order
    }

    pub fn order_mut(&mut self) -> &mut ExecOrder {
        &mut self.order
    }

    /// Replace the root and recompute the order
    pub fn set_root(&mut self, arena: &IrArena, root: NodeId) -> IrResult<()> {
        self.root = root;
        self.order.resequence(arena, root)
    }

    pub fn resequence(&mut self, arena: &IrArena) -> IrResult<()> {
        self.order.resequence(arena, self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::GenFlags;
    use crate::oper::Oper;
    use crate::types::{LclNum, VarType};

    fn sum(arena: &mut IrArena) -> (NodeId, NodeId, NodeId) {
        let a = arena.new_lcl_var(LclNum(0), VarType::Int).unwrap();
        let b = arena.new_icon(3, VarType::Int).unwrap();
        let add = arena.new_binop(Oper::Add, VarType::Int, a, b).unwrap();
        (a, b, add)
    }

    #[test]
    fn test_sequence_is_post_order() {
        let mut arena = IrArena::new();
        let (a, b, add) = sum(&mut arena);
        let order = ExecOrder::sequence(&arena, add).unwrap();
        assert_eq!(order.iter().collect::<Vec<_>>(), vec![a, b, add]);
        assert_eq!(order.first(), Some(a));
        assert_eq!(order.last(), Some(add));
        assert_eq!(order.prev(b), Some(a));
        assert_eq!(order.next(add), None);
    }

    #[test]
    fn test_sequence_follows_reverse_ops() {
        let mut arena = IrArena::new();
        let (a, b, add) = sum(&mut arena);
        arena[add].add_flags(GenFlags::REVERSE_OPS);
        let mut stmt = Statement::new(&arena, add).unwrap();
        stmt.resequence(&arena).unwrap();
        assert_eq!(stmt.order().iter().collect::<Vec<_>>(), vec![b, a, add]);
    }

    #[test]
    fn test_insert_and_remove() {
        let mut arena = IrArena::new();
        let (a, b, add) = sum(&mut arena);
        let extra = arena.new_icon(9, VarType::Int).unwrap();
        let mut order = ExecOrder::sequence(&arena, add).unwrap();

        order.insert_before(a, extra).unwrap();
        assert_eq!(order.first(), Some(extra));
        order.insert_after(add, extra).unwrap();
        assert_eq!(order.iter().collect::<Vec<_>>(), vec![a, b, add, extra]);
        order.remove(b).unwrap();
        assert_eq!(order.next(a), Some(add));
        assert_eq!(order.len(), 3);
        assert_eq!(order.remove(b).unwrap_err(), IrError::NotSequenced(b));
        assert_eq!(order.insert_after(b, extra).unwrap_err(), IrError::NotSequenced(b));
    }
}
