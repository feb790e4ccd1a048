//! Node arena
//!
//! Every node of one compilation lives in an `IrArena` and is addressed by
//! `NodeId`. Nodes are never freed individually; a node that is no longer
//! reachable from any statement is simply dead.
//!
//! Mutations that can change what a subtree does (operator changes,
//! operand replacement, argument list edits) go through the arena so the
//! composite side-effect flags of the mutated node are recomputed.

use std::ops::{Index, IndexMut};

use crate::error::{IrError, IrResult};
use crate::flags::{CallMoreFlags, GenFlags, IndexFlags, IndirFlags, OpFlags};
use crate::node::{IntConNode, LclFldNode, LclVarNode, Node, NodeId, NodeKind, Shape};
use crate::oper::Oper;
use crate::types::VarType;
use crate::verify::sync_lowering;

/// IR form the arena's trees are in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrPhase {
    /// Tree form: assignments, no explicit stores
    Hir,
    /// Linear form after rationalization
    Lir,
}

impl IrPhase {
    pub fn name(self) -> &'static str {
        match self {
            IrPhase::Hir => "HIR",
            IrPhase::Lir => "LIR",
        }
    }
}

/// Node storage for one compilation
#[derive(Debug)]
pub struct IrArena {
    nodes: Vec<Node>,
    phase: IrPhase,
}

impl Default for IrArena {
    fn default() -> Self {
        IrArena::new()
    }
}

impl IrArena {
    pub fn new() -> Self {
        IrArena { nodes: Vec::new(), phase: IrPhase::Hir }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        IrArena { nodes: Vec::with_capacity(capacity), phase: IrPhase::Hir }
    }

    pub fn phase(&self) -> IrPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: IrPhase) {
        self.phase = phase;
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> IrResult<&Node> {
        self.nodes.get(id.index()).ok_or(IrError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> IrResult<&mut Node> {
        self.nodes.get_mut(id.index()).ok_or(IrError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes ever allocated, live or dead
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.iter().enumerate().map(|(index, node)| (NodeId(index as u32), node))
    }

    // ===== Side effects =====

    /// Recompute the composite effects of `id` from its operator, its own
    /// effects and its operands' composite effects
    pub fn refresh_effects(&mut self, id: NodeId) -> IrResult<()> {
        let operand_effects = self.operand_effects(id)?;
        let node = self.node_mut(id)?;
        let effects = node.intrinsic_effects() | node.own_effects() | operand_effects;
        node.set_effects(effects);
        Ok(())
    }

    /// Set the composite effects of `id` to the union of the effects of
    /// `sources`
    pub fn set_all_effects_flags(&mut self, id: NodeId, sources: &[NodeId]) -> IrResult<()> {
        let mut effects = GenFlags::empty();
        for source in sources {
            effects |= self.node(*source)?.effects();
        }
        self.node_mut(id)?.set_effects(effects & GenFlags::ALL_EFFECT);
        Ok(())
    }

    // ===== Effect-bearing payload state =====
    //
    // Payload bits that change what a node can do are written only here,
    // so the node's composite effects are current when a parent is built.

    /// Retype `id`; integer division throws, floating division does not
    pub fn set_type(&mut self, id: NodeId, ty: VarType) -> IrResult<()> {
        self.node_mut(id)?.set_type(ty);
        self.refresh_effects(id)
    }

    /// Make an `ADD`, `SUB`, `MUL` or `CAST` overflow-checked, or not
    pub fn set_overflow(&mut self, id: NodeId, overflow: bool) -> IrResult<()> {
        let node = self.node_mut(id)?;
        let oper = node.oper();
        match node.kind_mut() {
            NodeKind::Op(op) if oper.may_overflow() => op.flags.set(OpFlags::OVERFLOW, overflow),
            NodeKind::Cast(cast) => cast.overflow = overflow,
            _ => return Err(IrError::FlagNotApplicable { oper, flag: "OVERFLOW" }),
        }
        self.refresh_effects(id)
    }

    /// Replace the operator flags of a generic operator
    pub fn set_op_flags(&mut self, id: NodeId, flags: OpFlags) -> IrResult<()> {
        let node = self.node_mut(id)?;
        let oper = node.oper();
        if flags.contains(OpFlags::OVERFLOW) && !oper.may_overflow() {
            return Err(IrError::FlagNotApplicable { oper, flag: "OVERFLOW" });
        }
        node.as_op_mut()?.flags = flags;
        self.refresh_effects(id)
    }

    /// Replace the flags of an `IND`, `BLK` or dynamic block store
    pub fn set_indir_flags(&mut self, id: NodeId, flags: IndirFlags) -> IrResult<()> {
        let node = self.node_mut(id)?;
        let oper = node.oper();
        match node.kind_mut() {
            NodeKind::Indir(indir) => indir.flags = flags,
            NodeKind::Blk(blk) => blk.flags = flags,
            NodeKind::StoreDynBlk(blk) => blk.flags = flags,
            _ => return Err(IrError::ShapeMismatch { oper, expected: Shape::Indir }),
        }
        self.refresh_effects(id)
    }

    /// Record whether a memory access is known not to fault
    pub fn set_nonfaulting(&mut self, id: NodeId, nonfaulting: bool) -> IrResult<()> {
        let node = self.node_mut(id)?;
        let oper = node.oper();
        match node.kind_mut() {
            NodeKind::Indir(indir) => indir.flags.set(IndirFlags::NONFAULTING, nonfaulting),
            NodeKind::Blk(blk) => blk.flags.set(IndirFlags::NONFAULTING, nonfaulting),
            NodeKind::StoreDynBlk(blk) => blk.flags.set(IndirFlags::NONFAULTING, nonfaulting),
            NodeKind::ArrLen(len) => len.nonfaulting = nonfaulting,
            NodeKind::Index(index) => index.flags.set(IndexFlags::NOFAULT, nonfaulting),
            _ => return Err(IrError::FlagNotApplicable { oper, flag: "NONFAULTING" }),
        }
        self.refresh_effects(id)
    }

    pub fn set_index_flags(&mut self, id: NodeId, flags: IndexFlags) -> IrResult<()> {
        self.node_mut(id)?.as_index_mut()?.flags = flags;
        self.refresh_effects(id)
    }

    pub fn set_call_more_flags(&mut self, id: NodeId, flags: CallMoreFlags) -> IrResult<()> {
        self.node_mut(id)?.as_call_mut()?.more_flags = flags;
        self.refresh_effects(id)
    }

    /// Mark a call as unable to throw, dropping its `EXCEPT` effect
    pub fn set_call_no_throw(&mut self, id: NodeId, no_throw: bool) -> IrResult<()> {
        self.node_mut(id)?.as_call_mut()?.more_flags.set(CallMoreFlags::NOTHROW, no_throw);
        self.refresh_effects(id)
    }

    // ===== Header copies =====

    pub fn copy_costs(&mut self, dst: NodeId, src: NodeId) -> IrResult<()> {
        let costs = self.node(src)?.costs()?;
        self.node_mut(dst)?.copy_costs(costs);
        Ok(())
    }

    pub fn copy_vn(&mut self, dst: NodeId, src: NodeId) -> IrResult<()> {
        let vn = self.node(src)?.vn_pair();
        self.node_mut(dst)?.set_vn_pair(vn);
        Ok(())
    }

    // ===== Operator changes =====

    /// Change the operator of `id`, clearing its value numbers and every
    /// operator-specific flag. The non-faulting bit survives a change
    /// between indirections.
    pub fn change_oper(&mut self, id: NodeId, oper: Oper) -> IrResult<()> {
        self.change_oper_masked(id, oper, GenFlags::COMMON_MASK, false)
    }

    /// Like `change_oper`, but keeps the value numbers
    pub fn change_oper_preserve_vn(&mut self, id: NodeId, oper: Oper) -> IrResult<()> {
        self.change_oper_masked(id, oper, GenFlags::COMMON_MASK, true)
    }

    /// Change the operator and reset the common flags to the node mask
    pub fn set_oper_reset_flags(&mut self, id: NodeId, oper: Oper) -> IrResult<()> {
        self.change_oper_masked(id, oper, GenFlags::COLON_COND, false)
    }

    /// Switch between operators that share a shape, keeping flags, payload
    /// and value numbers untouched
    pub fn change_oper_unchecked(&mut self, id: NodeId, oper: Oper) -> IrResult<()> {
        let node = self.node_mut(id)?;
        let from = node.oper();
        if from.shape() != oper.shape() {
            return Err(IrError::IncompatibleOperChange { from, to: oper, reason: "operators use different shapes" });
        }
        self.check_phase(oper)?;
        self.node_mut(id)?.set_oper_raw(oper);
        self.refresh_effects(id)
    }

    fn change_oper_masked(&mut self, id: NodeId, oper: Oper, keep: GenFlags, preserve_vn: bool) -> IrResult<()> {
        self.check_phase(oper)?;
        let phase = self.phase;
        let node = self.node_mut(id)?;
        let from = node.oper();
        if oper.size_class() > node.size_class() {
            return Err(IrError::IncompatibleOperChange { from, to: oper, reason: "node is too small for the new shape" });
        }

        let new_shape = oper.shape();
        if new_shape != node.shape() {
            let kind = rebash_kind(node.kind(), new_shape).ok_or(IrError::IncompatibleOperChange {
                from,
                to: oper,
                reason: "shape cannot be produced by an operator change",
            })?;
            node.set_kind(kind);
            sync_lowering(node.kind_mut(), phase);
        }

        let keep_nonfaulting = is_indir_like(from) && is_indir_like(oper);
        node.kind_mut().clear_oper_flags(keep_nonfaulting);
        node.set_oper_raw(oper);
        node.reset_flags(keep);
        if !oper.is_binary() {
            node.remove_flags(GenFlags::REVERSE_OPS);
        }
        if !preserve_vn {
            node.clear_vn();
        }
        self.refresh_effects(id)
    }

    pub(crate) fn check_phase(&self, oper: Oper) -> IrResult<()> {
        use crate::oper::DebugOperKind;

        let banned = match self.phase {
            IrPhase::Hir => DebugOperKind::NOT_HIR,
            IrPhase::Lir => DebugOperKind::NOT_LIR,
        };
        if oper.debug_kind().contains(banned) {
            return Err(IrError::InvalidInPhase { oper, phase: self.phase.name() });
        }
        Ok(())
    }

    /// Turn any node into an integer constant in place
    pub fn bash_to_int_const(&mut self, id: NodeId, value: i64, ty: VarType) -> IrResult<()> {
        if !ty.is_integral() && !ty.is_gc() {
            return Err(IrError::UnsupportedOperType { oper: Oper::CnsInt, ty });
        }
        let node = self.node_mut(id)?;
        node.set_kind(NodeKind::IntCon(IntConNode { value, ..IntConNode::default() }));
        node.set_oper_raw(Oper::CnsInt);
        node.set_type(ty);
        node.reset_flags(GenFlags::COLON_COND);
        node.clear_vn();
        node.clear_other_regs();
        self.refresh_effects(id)
    }

    // ===== Cloning =====

    /// Deep copy of the tree rooted at `root`. Header state (type, flags,
    /// costs, value numbers) is copied; register assignments are not.
    pub fn clone_tree(&mut self, root: NodeId) -> IrResult<NodeId> {
        let copy = self.node(root)?.duplicate();
        let root_copy = self.alloc(copy);
        // Copies whose operands still name the original children
        let mut pending = vec![root_copy];
        while let Some(id) = pending.pop() {
            let slots = self.node(id)?.use_slots();
            for slot in slots {
                let Some(child) = self.node(id)?.operand(slot) else {
                    continue;
                };
                let child_copy = self.node(child)?.duplicate();
                let child_copy = self.alloc(child_copy);
                if let Some(operand) = self.node_mut(id)?.operand_mut(slot) {
                    *operand = child_copy;
                }
                pending.push(child_copy);
            }
        }
        Ok(root_copy)
    }
}

fn is_indir_like(oper: Oper) -> bool {
    oper.is_indir() || oper == Oper::ArrLength
}

/// Payload for `shape` built from an existing payload. Operands of
/// op-like payloads carry over, and locals keep their identity when moving
/// between the whole-local and field forms.
fn rebash_kind(kind: &NodeKind, shape: Shape) -> Option<NodeKind> {
    match (kind, shape) {
        (NodeKind::LclVar(lcl), Shape::LclFld) => Some(NodeKind::LclFld(LclFldNode {
            lcl: lcl.lcl,
            ssa: lcl.ssa,
            data: lcl.data,
            ..LclFldNode::default()
        })),
        (NodeKind::LclFld(fld), Shape::LclVar) => Some(NodeKind::LclVar(LclVarNode {
            lcl: fld.lcl,
            ssa: fld.ssa,
            data: fld.data,
            ..LclVarNode::default()
        })),
        (kind, shape) if shape.is_op_like() => {
            let (op1, op2) = kind.op_pair().unwrap_or((None, None));
            NodeKind::rebash(shape, op1, op2)
        }
        (_, shape) => NodeKind::rebash(shape, None, None),
    }
}

impl Index<NodeId> for IrArena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl IndexMut<NodeId> for IrArena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{IndirNode, OpNode};
    use crate::value_num::{ValueNum, ValueNumPair};

    fn leaf(arena: &mut IrArena) -> NodeId {
        arena.alloc(Node::new(Oper::CnsInt, VarType::Int, NodeKind::IntCon(IntConNode::default())))
    }

    fn add(arena: &mut IrArena, op1: NodeId, op2: NodeId) -> NodeId {
        let id = arena.alloc(Node::new(
            Oper::Add,
            VarType::Int,
            NodeKind::Op(OpNode { op1: Some(op1), op2: Some(op2), ..OpNode::default() }),
        ));
        arena.refresh_effects(id).unwrap();
        id
    }

    #[test]
    fn test_unknown_node() {
        let arena = IrArena::new();
        assert_eq!(arena.node(NodeId(3)).unwrap_err(), IrError::UnknownNode(NodeId(3)));
    }

    #[test]
    fn test_change_oper_clears_vn_and_oper_flags() {
        let mut arena = IrArena::new();
        let (a, b) = (leaf(&mut arena), leaf(&mut arena));
        let id = add(&mut arena, a, b);
        arena.set_overflow(id, true).unwrap();
        arena[id].set_vn_pair(ValueNumPair::both(ValueNum(7)));
        assert!(arena[id].effects().contains(GenFlags::EXCEPT));

        arena.change_oper(id, Oper::Sub).unwrap();
        assert_eq!(arena[id].oper(), Oper::Sub);
        assert!(arena[id].as_op().unwrap().flags().is_empty());
        assert!(arena[id].effects().is_empty());
        assert_eq!(arena[id].vn_pair(), ValueNumPair::default());
        assert_eq!(arena[id].op1(), Some(a));
    }

    #[test]
    fn test_change_oper_into_other_op_like_shape_keeps_operands() {
        let mut arena = IrArena::new();
        let addr = leaf(&mut arena);
        let id = arena.alloc(Node::new(
            Oper::Neg,
            VarType::Int,
            NodeKind::Op(OpNode { op1: Some(addr), ..OpNode::default() }),
        ));
        arena.change_oper(id, Oper::Ind).unwrap();
        assert_eq!(arena[id].as_indir().unwrap().addr(), Some(addr));
        assert!(arena[id].effects().contains(GenFlags::EXCEPT | GenFlags::GLOB_REF));
    }

    #[test]
    fn test_indir_change_keeps_nonfaulting() {
        let mut arena = IrArena::new();
        let addr = leaf(&mut arena);
        let id = arena.alloc(Node::new(
            Oper::Ind,
            VarType::Int,
            NodeKind::Indir(IndirNode {
                addr: Some(addr),
                flags: IndirFlags::NONFAULTING | IndirFlags::VOLATILE,
                ..IndirNode::default()
            }),
        ));
        arena.change_oper(id, Oper::NullCheck).unwrap();
        assert_eq!(arena[id].as_indir().unwrap().flags(), IndirFlags::NONFAULTING);
        arena.change_oper(id, Oper::Neg).unwrap();
        arena.change_oper(id, Oper::Ind).unwrap();
        assert!(arena[id].as_indir().unwrap().flags().is_empty());
    }

    #[test]
    fn test_change_oper_rejects_large_shape() {
        let mut arena = IrArena::new();
        let id = leaf(&mut arena);
        let err = arena.change_oper(id, Oper::Call).unwrap_err();
        assert!(matches!(err, IrError::IncompatibleOperChange { from: Oper::CnsInt, to: Oper::Call, .. }));
    }

    #[test]
    fn test_change_oper_unchecked_requires_same_shape() {
        let mut arena = IrArena::new();
        let (a, b) = (leaf(&mut arena), leaf(&mut arena));
        let id = add(&mut arena, a, b);
        arena.set_overflow(id, true).unwrap();
        arena.change_oper_unchecked(id, Oper::Mul).unwrap();
        assert!(arena[id].as_op().unwrap().is_overflow());
        assert!(arena[id].effects().contains(GenFlags::EXCEPT));
        assert!(arena.change_oper_unchecked(id, Oper::Ind).is_err());
    }

    #[test]
    fn test_bash_to_int_const() {
        let mut arena = IrArena::new();
        let (a, b) = (leaf(&mut arena), leaf(&mut arena));
        let id = add(&mut arena, a, b);
        arena[id].add_flags(GenFlags::COLON_COND | GenFlags::ORDER_SIDEEFF);
        arena.refresh_effects(id).unwrap();
        arena.bash_to_int_const(id, 5, VarType::Int).unwrap();
        assert_eq!(arena[id].icon_value(), Some(5));
        assert!(arena[id].effects().is_empty());
        assert!(arena[id].has_flags(GenFlags::COLON_COND));
        assert!(arena.bash_to_int_const(id, 5, VarType::Double).is_err());
    }

    #[test]
    fn test_clone_tree_copies_header_not_registers() {
        let mut arena = IrArena::new();
        let (a, b) = (leaf(&mut arena), leaf(&mut arena));
        let id = add(&mut arena, a, b);
        arena[id].set_costs(2, 3);
        arena[id].set_reg(Some(crate::types::RegNum(1)));

        let copy = arena.clone_tree(id).unwrap();
        assert_ne!(copy, id);
        assert_eq!(arena[copy].costs(), arena[id].costs());
        assert_eq!(arena[copy].reg(), None);
        let children: Vec<_> = arena.operands(copy).unwrap().collect();
        assert_eq!(children.len(), 2);
        assert!(!children.contains(&a) && !children.contains(&b));
    }

    #[test]
    fn test_clone_deep_chain() {
        let mut arena = IrArena::new();
        let mut root = leaf(&mut arena);
        for _ in 0..200_000 {
            root = arena.alloc(Node::new(
                Oper::Neg,
                VarType::Int,
                NodeKind::Op(OpNode { op1: Some(root), ..OpNode::default() }),
            ));
        }
        let before = arena.len();
        let copy = arena.clone_tree(root).unwrap();
        assert_eq!(arena.len(), before * 2);
        assert_eq!(arena[copy].oper(), Oper::Neg);
        let child = arena[copy].op1().unwrap();
        assert!(child.index() >= before);
    }

    #[test]
    fn test_payload_setters_refresh_effects() {
        let mut arena = IrArena::new();
        let (a, b) = (leaf(&mut arena), leaf(&mut arena));
        let div = arena.alloc(Node::new(
            Oper::Div,
            VarType::Double,
            NodeKind::Op(OpNode { op1: Some(a), op2: Some(b), ..OpNode::default() }),
        ));
        arena.refresh_effects(div).unwrap();
        assert!(arena[div].effects().is_empty());
        arena.set_type(div, VarType::Int).unwrap();
        assert_eq!(arena[div].effects(), GenFlags::EXCEPT);

        let ind = arena.alloc(Node::new(
            Oper::Ind,
            VarType::Int,
            NodeKind::Indir(IndirNode { addr: Some(a), ..IndirNode::default() }),
        ));
        arena.refresh_effects(ind).unwrap();
        arena.set_nonfaulting(ind, true).unwrap();
        assert_eq!(arena[ind].effects(), GenFlags::GLOB_REF);
        arena.set_indir_flags(ind, IndirFlags::VOLATILE).unwrap();
        assert!(arena[ind].effects().contains(GenFlags::EXCEPT));
    }

    #[test]
    fn test_overflow_only_on_checked_arithmetic() {
        let mut arena = IrArena::new();
        let (a, b) = (leaf(&mut arena), leaf(&mut arena));
        let id = add(&mut arena, a, b);
        arena.change_oper(id, Oper::Or).unwrap();
        assert_eq!(
            arena.set_overflow(id, true).unwrap_err(),
            IrError::FlagNotApplicable { oper: Oper::Or, flag: "OVERFLOW" }
        );
        assert!(arena.set_op_flags(id, OpFlags::OVERFLOW).is_err());
        assert!(arena.set_nonfaulting(a, true).is_err());
        assert!(arena[id].effects().is_empty());
    }
}
