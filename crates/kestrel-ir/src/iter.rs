//! Operand and use-edge iteration
//!
//! `Node::use_slots` is the only place that knows which payload fields
//! hold operands and in what order they execute. Everything else (operand
//! iteration, use-edge rewriting, effect recomputation, execution order,
//! subtree cloning) goes through it.
//!
//! A `UseSlot` names a position inside a node. Together with the user's
//! `NodeId` it forms a `UseEdge`, which stays meaningful while the arena is
//! mutated as long as the user's shape does not change.

use smallvec::SmallVec;

use crate::error::{IrError, IrResult};
use crate::arena::IrArena;
use crate::flags::GenFlags;
use crate::node::{Node, NodeId, NodeKind, VisitResult};

/// Operand position inside a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseSlot {
    Op1,
    Op2,
    Op3,
    /// Element of an operand list (PHI, FIELD_LIST, SIMD, ARR_ELEM indices)
    List(u32),
    /// Early node of the call argument at this evaluation-order index
    CallArg(u32),
    /// Late node of the call argument at this placement-order index
    CallLateArg(u32),
    CallControlExpr,
    CallCookie,
    CallTarget,
}

impl std::fmt::Display for UseSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UseSlot::Op1 => write!(f, "op1"),
            UseSlot::Op2 => write!(f, "op2"),
            UseSlot::Op3 => write!(f, "op3"),
            UseSlot::List(index) => write!(f, "list[{}]", index),
            UseSlot::CallArg(index) => write!(f, "arg[{}]", index),
            UseSlot::CallLateArg(index) => write!(f, "late[{}]", index),
            UseSlot::CallControlExpr => write!(f, "control"),
            UseSlot::CallCookie => write!(f, "cookie"),
            UseSlot::CallTarget => write!(f, "target"),
        }
    }
}

pub type UseSlots = SmallVec<[UseSlot; 4]>;

/// A use of one node by another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UseEdge {
    pub user: NodeId,
    pub slot: UseSlot,
}

fn list_slots(len: usize) -> impl Iterator<Item = UseSlot> {
    (0..len as u32).map(UseSlot::List)
}

impl Node {
    /// Live operand slots, in execution order
    pub fn use_slots(&self) -> UseSlots {
        let reversed = self.is_reverse_op();
        let mut slots = UseSlots::new();
        match self.kind() {
            NodeKind::LclVar(lcl) => slots.extend(lcl.data.map(|_| UseSlot::Op1)),
            NodeKind::LclFld(fld) => slots.extend(fld.data.map(|_| UseSlot::Op1)),
            NodeKind::StoreDynBlk(blk) => {
                let (first, second) = if reversed { (UseSlot::Op2, UseSlot::Op1) } else { (UseSlot::Op1, UseSlot::Op2) };
                if blk.eval_size_first {
                    slots.extend([UseSlot::Op3, first, second]);
                } else {
                    slots.extend([first, second, UseSlot::Op3]);
                }
            }
            NodeKind::Select(_) | NodeKind::CmpXchg(_) | NodeKind::ArrOffs(_) => {
                slots.extend([UseSlot::Op1, UseSlot::Op2, UseSlot::Op3]);
            }
            NodeKind::ArrElem(elem) => {
                slots.push(UseSlot::Op1);
                slots.extend(list_slots(elem.indices.len()));
            }
            NodeKind::MultiOp(multi) => {
                if reversed && multi.operands.len() == 2 {
                    slots.extend([UseSlot::List(1), UseSlot::List(0)]);
                } else {
                    slots.extend(list_slots(multi.operands.len()));
                }
            }
            NodeKind::Phi(phi) => slots.extend(list_slots(phi.uses.len())),
            NodeKind::FieldList(list) => slots.extend(list_slots(list.uses.len())),
            NodeKind::Call(call) => {
                let args = call.args();
                for (index, arg) in args.args.iter().enumerate() {
                    if arg.early.is_some() {
                        slots.push(UseSlot::CallArg(index as u32));
                    }
                }
                for (index, id) in args.late.iter().enumerate() {
                    if args.get(*id).and_then(|arg| arg.late).is_some() {
                        slots.push(UseSlot::CallLateArg(index as u32));
                    }
                }
                if call.control_expr.is_some() {
                    slots.push(UseSlot::CallControlExpr);
                }
                if call.cookie().is_some() {
                    slots.push(UseSlot::CallCookie);
                }
                if call.indirect_target().is_some() {
                    slots.push(UseSlot::CallTarget);
                }
            }
            kind => {
                if let Some((op1, op2)) = kind.op_pair() {
                    match (op1, op2) {
                        (Some(_), Some(_)) if reversed => slots.extend([UseSlot::Op2, UseSlot::Op1]),
                        _ => {
                            slots.extend(op1.map(|_| UseSlot::Op1));
                            slots.extend(op2.map(|_| UseSlot::Op2));
                        }
                    }
                }
            }
        }
        slots
    }

    /// Operand held in `slot`, if the slot exists and is occupied
    pub fn operand(&self, slot: UseSlot) -> Option<NodeId> {
        match (self.kind(), slot) {
            (NodeKind::LclVar(lcl), UseSlot::Op1) => lcl.data,
            (NodeKind::LclFld(fld), UseSlot::Op1) => fld.data,
            (NodeKind::StoreDynBlk(blk), UseSlot::Op1) => Some(blk.addr),
            (NodeKind::StoreDynBlk(blk), UseSlot::Op2) => Some(blk.data),
            (NodeKind::StoreDynBlk(blk), UseSlot::Op3) => Some(blk.size),
            (NodeKind::Select(sel), UseSlot::Op1) => Some(sel.cond),
            (NodeKind::Select(sel), UseSlot::Op2) => Some(sel.then_val),
            (NodeKind::Select(sel), UseSlot::Op3) => Some(sel.else_val),
            (NodeKind::CmpXchg(cx), UseSlot::Op1) => Some(cx.location),
            (NodeKind::CmpXchg(cx), UseSlot::Op2) => Some(cx.value),
            (NodeKind::CmpXchg(cx), UseSlot::Op3) => Some(cx.comparand),
            (NodeKind::ArrOffs(offs), UseSlot::Op1) => Some(offs.offset),
            (NodeKind::ArrOffs(offs), UseSlot::Op2) => Some(offs.index),
            (NodeKind::ArrOffs(offs), UseSlot::Op3) => Some(offs.arr),
            (NodeKind::ArrElem(elem), UseSlot::Op1) => Some(elem.arr),
            (NodeKind::ArrElem(elem), UseSlot::List(i)) => elem.indices.get(i as usize).copied(),
            (NodeKind::MultiOp(multi), UseSlot::List(i)) => multi.operands.get(i as usize).copied(),
            (NodeKind::Phi(phi), UseSlot::List(i)) => phi.uses.get(i as usize).copied(),
            (NodeKind::FieldList(list), UseSlot::List(i)) => list.uses.get(i as usize).map(|u| u.node),
            (NodeKind::Call(call), UseSlot::CallArg(i)) => call.args.args.get(i as usize).and_then(|arg| arg.early),
            (NodeKind::Call(call), UseSlot::CallLateArg(i)) => call
                .args
                .late
                .get(i as usize)
                .and_then(|id| call.args.get(*id))
                .and_then(|arg| arg.late),
            (NodeKind::Call(call), UseSlot::CallControlExpr) => call.control_expr,
            (NodeKind::Call(call), UseSlot::CallCookie) => call.cookie(),
            (NodeKind::Call(call), UseSlot::CallTarget) => call.indirect_target(),
            (kind, UseSlot::Op1) => kind.op_pair().and_then(|(op1, _)| op1),
            (kind, UseSlot::Op2) => kind.op_pair().and_then(|(_, op2)| op2),
            _ => None,
        }
    }

    /// Mutable reference to the operand held in `slot`
    pub(crate) fn operand_mut(&mut self, slot: UseSlot) -> Option<&mut NodeId> {
        use crate::call::CallType;

        match (self.kind_mut(), slot) {
            (NodeKind::LclVar(lcl), UseSlot::Op1) => lcl.data.as_mut(),
            (NodeKind::LclFld(fld), UseSlot::Op1) => fld.data.as_mut(),
            (NodeKind::StoreDynBlk(blk), UseSlot::Op1) => Some(&mut blk.addr),
            (NodeKind::StoreDynBlk(blk), UseSlot::Op2) => Some(&mut blk.data),
            (NodeKind::StoreDynBlk(blk), UseSlot::Op3) => Some(&mut blk.size),
            (NodeKind::Select(sel), UseSlot::Op1) => Some(&mut sel.cond),
            (NodeKind::Select(sel), UseSlot::Op2) => Some(&mut sel.then_val),
            (NodeKind::Select(sel), UseSlot::Op3) => Some(&mut sel.else_val),
            (NodeKind::CmpXchg(cx), UseSlot::Op1) => Some(&mut cx.location),
            (NodeKind::CmpXchg(cx), UseSlot::Op2) => Some(&mut cx.value),
            (NodeKind::CmpXchg(cx), UseSlot::Op3) => Some(&mut cx.comparand),
            (NodeKind::ArrOffs(offs), UseSlot::Op1) => Some(&mut offs.offset),
            (NodeKind::ArrOffs(offs), UseSlot::Op2) => Some(&mut offs.index),
            (NodeKind::ArrOffs(offs), UseSlot::Op3) => Some(&mut offs.arr),
            (NodeKind::ArrElem(elem), UseSlot::Op1) => Some(&mut elem.arr),
            (NodeKind::ArrElem(elem), UseSlot::List(i)) => elem.indices.get_mut(i as usize),
            (NodeKind::MultiOp(multi), UseSlot::List(i)) => multi.operands.get_mut(i as usize),
            (NodeKind::Phi(phi), UseSlot::List(i)) => phi.uses.get_mut(i as usize),
            (NodeKind::FieldList(list), UseSlot::List(i)) => list.uses.get_mut(i as usize).map(|u| &mut u.node),
            (NodeKind::Call(call), UseSlot::CallArg(i)) => {
                call.args.args.get_mut(i as usize).and_then(|arg| arg.early.as_mut())
            }
            (NodeKind::Call(call), UseSlot::CallLateArg(i)) => {
                let id = call.args.late.get(i as usize).copied()?;
                call.args.get_mut(id).and_then(|arg| arg.late.as_mut())
            }
            (NodeKind::Call(call), UseSlot::CallControlExpr) => call.control_expr.as_mut(),
            (NodeKind::Call(call), UseSlot::CallCookie) => match &mut call.call_type {
                CallType::Indirect { cookie, .. } => cookie.as_mut(),
                _ => None,
            },
            (NodeKind::Call(call), UseSlot::CallTarget) => match &mut call.call_type {
                CallType::Indirect { addr, .. } => Some(addr),
                _ => None,
            },
            (kind, slot @ (UseSlot::Op1 | UseSlot::Op2)) => {
                let (op1, op2) = op_pair_mut(kind)?;
                match slot {
                    UseSlot::Op1 => op1.as_mut(),
                    _ => op2.and_then(|op2| op2.as_mut()),
                }
            }
            _ => None,
        }
    }

    /// Visit every use edge in execution order, allowing the operand to be
    /// replaced in place. Stops early when the visitor returns `Abort`.
    ///
    /// Composite effects are not refreshed; use `IrArena::replace_use`
    /// when the new operand may carry different effects.
    pub fn visit_use_edges_mut<F>(&mut self, mut visitor: F) -> VisitResult
    where
        F: FnMut(&mut NodeId) -> VisitResult,
    {
        for slot in self.use_slots() {
            if let Some(operand) = self.operand_mut(slot) {
                if visitor(operand) == VisitResult::Abort {
                    return VisitResult::Abort;
                }
            }
        }
        VisitResult::Continue
    }
}

/// Operand slots of op-like payloads; `op2` is absent for unary payloads
fn op_pair_mut(kind: &mut NodeKind) -> Option<(&mut Option<NodeId>, Option<&mut Option<NodeId>>)> {
    Some(match kind {
        NodeKind::Op(n) => (&mut n.op1, Some(&mut n.op2)),
        NodeKind::Cast(n) => (&mut n.op1, None),
        NodeKind::Box(n) => (&mut n.op1, None),
        NodeKind::Field(n) => (&mut n.obj, None),
        NodeKind::Indir(n) => (&mut n.addr, Some(&mut n.data)),
        NodeKind::Blk(n) => (&mut n.addr, Some(&mut n.data)),
        NodeKind::Intrinsic(n) => (&mut n.op1, Some(&mut n.op2)),
        NodeKind::Index(n) => (&mut n.arr, Some(&mut n.index)),
        NodeKind::ArrLen(n) => (&mut n.array, None),
        NodeKind::BoundsChk(n) => (&mut n.index, Some(&mut n.length)),
        NodeKind::AddrMode(n) => (&mut n.base, Some(&mut n.index)),
        NodeKind::PutArgStk(n) => (&mut n.op1, None),
        NodeKind::PutArgSplit(n) => (&mut n.op1, None),
        NodeKind::CopyOrReload(n) => (&mut n.op1, None),
        NodeKind::AllocObj(n) => (&mut n.op1, None),
        _ => return None,
    })
}

// ===== By-value iteration =====

/// Operands of a node in execution order
#[derive(Debug, Clone)]
pub struct Operands<'a> {
    owner: NodeId,
    node: &'a Node,
    slots: UseSlots,
    pos: usize,
}

impl<'a> Operands<'a> {
    fn new(owner: NodeId, node: &'a Node) -> Self {
        Operands { owner, node, slots: node.use_slots(), pos: 0 }
    }

    fn is_exhausted(&self) -> bool {
        self.pos >= self.slots.len()
    }
}

impl Iterator for Operands<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(slot) = self.slots.get(self.pos).copied() {
            self.pos += 1;
            if let Some(operand) = self.node.operand(slot) {
                return Some(operand);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.slots.len().saturating_sub(self.pos)))
    }
}

impl PartialEq for Operands<'_> {
    /// Exhausted iterators are equal regardless of owner; otherwise two
    /// iterators are equal when they walk the same node and sit at the same
    /// position.
    fn eq(&self, other: &Self) -> bool {
        match (self.is_exhausted(), other.is_exhausted()) {
            (true, true) => true,
            (false, false) => self.owner == other.owner && self.pos == other.pos,
            _ => false,
        }
    }
}

// ===== By-reference iteration =====

/// Use edges of a node in execution order. Holds no borrow of the arena,
/// so the edges can be rewritten while iterating.
#[derive(Debug, Clone)]
pub struct UseEdges {
    user: NodeId,
    slots: UseSlots,
    pos: usize,
}

impl Iterator for UseEdges {
    type Item = UseEdge;

    fn next(&mut self) -> Option<UseEdge> {
        let slot = self.slots.get(self.pos).copied()?;
        self.pos += 1;
        Some(UseEdge { user: self.user, slot })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.slots.len().saturating_sub(self.pos);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for UseEdges {}

impl IrArena {
    pub fn operands(&self, id: NodeId) -> IrResult<Operands<'_>> {
        Ok(Operands::new(id, self.node(id)?))
    }

    pub fn use_edges(&self, id: NodeId) -> IrResult<UseEdges> {
        Ok(UseEdges { user: id, slots: self.node(id)?.use_slots(), pos: 0 })
    }

    /// Operand slot an edge refers to
    pub fn use_edge_mut(&mut self, edge: UseEdge) -> IrResult<&mut NodeId> {
        self.node_mut(edge.user)?
            .operand_mut(edge.slot)
            .ok_or_else(|| IrError::DeadUseSlot { user: edge.user, slot: edge.slot.to_string() })
    }

    /// Node an edge currently points at
    pub fn use_edge_target(&self, edge: UseEdge) -> IrResult<NodeId> {
        self.node(edge.user)?
            .operand(edge.slot)
            .ok_or_else(|| IrError::DeadUseSlot { user: edge.user, slot: edge.slot.to_string() })
    }

    /// Point `edge` at `new` and refresh the user's composite effects.
    /// Returns the node that was replaced. Ancestors of the user are not
    /// refreshed.
    pub fn replace_use(&mut self, edge: UseEdge, new: NodeId) -> IrResult<NodeId> {
        self.node(new)?;
        let slot = self.use_edge_mut(edge)?;
        let old = std::mem::replace(slot, new);
        self.refresh_effects(edge.user)?;
        Ok(old)
    }

    pub fn set_operand(&mut self, user: NodeId, slot: UseSlot, new: NodeId) -> IrResult<NodeId> {
        self.replace_use(UseEdge { user, slot }, new)
    }

    /// Union of the composite effects of a node's operands
    pub fn operand_effects(&self, id: NodeId) -> IrResult<GenFlags> {
        let mut effects = GenFlags::empty();
        for operand in self.operands(id)? {
            effects |= self.node(operand)?.effects();
        }
        Ok(effects)
    }

    /// Find the edge through which `user` uses `operand`
    pub fn find_use(&self, user: NodeId, operand: NodeId) -> IrResult<Option<UseEdge>> {
        let node = self.node(user)?;
        Ok(node
            .use_slots()
            .into_iter()
            .find(|slot| node.operand(*slot) == Some(operand))
            .map(|slot| UseEdge { user, slot }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{OpNode, SelectNode};
    use crate::oper::Oper;
    use crate::types::VarType;

    fn binary(op1: u32, op2: u32) -> Node {
        Node::new(
            Oper::Add,
            VarType::Int,
            NodeKind::Op(OpNode { op1: Some(NodeId(op1)), op2: Some(NodeId(op2)), ..OpNode::default() }),
        )
    }

    #[test]
    fn test_binary_slots_follow_reverse_ops() {
        let mut node = binary(1, 2);
        assert_eq!(node.use_slots().as_slice(), &[UseSlot::Op1, UseSlot::Op2]);
        node.add_flags(GenFlags::REVERSE_OPS);
        assert_eq!(node.use_slots().as_slice(), &[UseSlot::Op2, UseSlot::Op1]);
    }

    #[test]
    fn test_unary_ignores_reverse_ops() {
        let mut node = Node::new(
            Oper::Neg,
            VarType::Int,
            NodeKind::Op(OpNode { op1: Some(NodeId(4)), ..OpNode::default() }),
        );
        node.add_flags(GenFlags::REVERSE_OPS);
        assert_eq!(node.use_slots().as_slice(), &[UseSlot::Op1]);
    }

    #[test]
    fn test_select_slots() {
        let node = Node::new(
            Oper::Select,
            VarType::Int,
            NodeKind::Select(SelectNode { cond: NodeId(1), then_val: NodeId(2), else_val: NodeId(3) }),
        );
        let operands: Vec<_> = node.use_slots().into_iter().filter_map(|s| node.operand(s)).collect();
        assert_eq!(operands, vec![NodeId(1), NodeId(2), NodeId(3)]);
    }

    #[test]
    fn test_visit_use_edges_can_abort() {
        let mut node = binary(1, 2);
        let mut seen = Vec::new();
        let result = node.visit_use_edges_mut(|operand| {
            seen.push(*operand);
            VisitResult::Abort
        });
        assert_eq!(result, VisitResult::Abort);
        assert_eq!(seen, vec![NodeId(1)]);
    }

    #[test]
    fn test_visit_use_edges_rewrites() {
        let mut node = binary(1, 2);
        node.visit_use_edges_mut(|operand| {
            operand.0 += 10;
            VisitResult::Continue
        });
        assert_eq!(node.op1(), Some(NodeId(11)));
        assert_eq!(node.op2(), Some(NodeId(12)));
    }

    #[test]
    fn test_missing_slot_is_none() {
        let node = binary(1, 2);
        assert_eq!(node.operand(UseSlot::Op3), None);
        assert_eq!(node.operand(UseSlot::CallTarget), None);
    }
}
