//! Phase checks
//!
//! HIR and LIR accept different operator sets, and an indirection's
//! lowering state means something different in each. `enter_lir` is the
//! one place the arena switches phase: it checks every statement first and
//! only then converts the lowering state of every indirection.

use log::debug;
use rustc_hash::FxHashSet;

use crate::arena::{IrArena, IrPhase};
use crate::error::{IrError, IrResult};
use crate::node::{BlkNode, IndirLowering, IndirNode, NodeId, NodeKind};
use crate::oper::DebugOperKind;

/// Bring an indirection's lowering state in line with `phase`
pub(crate) fn sync_lowering(kind: &mut NodeKind, phase: IrPhase) {
    let lowering = match kind {
        NodeKind::Indir(indir) => &mut indir.lowering,
        NodeKind::Blk(blk) => &mut blk.lowering,
        _ => return,
    };
    match (phase, *lowering) {
        (IrPhase::Lir, IndirLowering::Hir { .. }) => *lowering = IndirLowering::Lir { req_addr_in_reg: false },
        (IrPhase::Hir, IndirLowering::Lir { .. }) => *lowering = IndirLowering::Hir { asg_lhs: false },
        _ => {}
    }
}

impl IrArena {
    /// Check every node reachable from `roots` against the current phase
    pub fn validate_phase(&self, roots: &[NodeId]) -> IrResult<()> {
        let banned = match self.phase() {
            IrPhase::Hir => DebugOperKind::NOT_HIR,
            IrPhase::Lir => DebugOperKind::NOT_LIR,
        };
        for id in self.reachable(roots)? {
            let oper = self.node(id)?.oper();
            if oper.debug_kind().contains(banned) {
                return Err(IrError::InvalidInPhase { oper, phase: self.phase().name() });
            }
        }
        Ok(())
    }

    /// Switch the arena to LIR. Every statement must already be free of
    /// HIR-only operators and assignment targets.
    pub fn enter_lir(&mut self, roots: &[NodeId]) -> IrResult<()> {
        if self.phase() == IrPhase::Lir {
            return Ok(());
        }
        let reachable = self.reachable(roots)?;
        for id in &reachable {
            let node = self.node(*id)?;
            if node.oper().debug_kind().contains(DebugOperKind::NOT_LIR) {
                return Err(IrError::InvalidInPhase { oper: node.oper(), phase: IrPhase::Lir.name() });
            }
            let asg_lhs = match node.kind() {
                NodeKind::Indir(indir) => indir.is_asg_lhs(),
                NodeKind::Blk(blk) => blk.is_asg_lhs(),
                _ => false,
            };
            if asg_lhs {
                return Err(IrError::UnloweredAssignTarget { node: *id });
            }
        }

        self.set_phase(IrPhase::Lir);
        let ids: Vec<NodeId> = self.iter().map(|(id, _)| id).collect();
        for id in ids {
            sync_lowering(self.node_mut(id)?.kind_mut(), IrPhase::Lir);
        }
        debug!("entered LIR with {} statements, {} live nodes", roots.len(), reachable.len());
        Ok(())
    }

    /// Each node reachable from `roots`, once, even when subtrees are shared
    fn reachable(&self, roots: &[NodeId]) -> IrResult<Vec<NodeId>> {
        let mut visited = FxHashSet::default();
        let mut seen = Vec::new();
        let mut stack = roots.to_vec();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            seen.push(id);
            stack.extend(self.operands(id)?);
        }
        Ok(seen)
    }
}

impl IndirNode {
    /// Mark the indirection as the target of an assignment (HIR only)
    pub fn set_asg_lhs(&mut self, value: bool) -> IrResult<()> {
        set_asg_lhs(&mut self.lowering, value)
    }

    /// Require the address in a register (LIR only)
    pub fn set_req_addr_in_reg(&mut self, value: bool) -> IrResult<()> {
        set_req_addr_in_reg(&mut self.lowering, value)
    }
}

impl BlkNode {
    pub fn is_asg_lhs(&self) -> bool {
        matches!(self.lowering, IndirLowering::Hir { asg_lhs: true })
    }

    pub fn requires_addr_in_reg(&self) -> bool {
        matches!(self.lowering, IndirLowering::Lir { req_addr_in_reg: true })
    }

    pub fn set_asg_lhs(&mut self, value: bool) -> IrResult<()> {
        set_asg_lhs(&mut self.lowering, value)
    }

    pub fn set_req_addr_in_reg(&mut self, value: bool) -> IrResult<()> {
        set_req_addr_in_reg(&mut self.lowering, value)
    }
}

fn set_asg_lhs(lowering: &mut IndirLowering, value: bool) -> IrResult<()> {
    match lowering {
        IndirLowering::Hir { asg_lhs } => {
            *asg_lhs = value;
            Ok(())
        }
        IndirLowering::Lir { .. } => Err(IrError::WrongIndirPhase { what: "assignment target", phase: "HIR" }),
    }
}

fn set_req_addr_in_reg(lowering: &mut IndirLowering, value: bool) -> IrResult<()> {
    match lowering {
        IndirLowering::Lir { req_addr_in_reg } => {
            *req_addr_in_reg = value;
            Ok(())
        }
        IndirLowering::Hir { .. } => Err(IrError::WrongIndirPhase { what: "address in register", phase: "LIR" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oper::Oper;
    use crate::types::{LclNum, VarType};

    #[test]
    fn test_lowering_bits_are_phase_specific() {
        let mut indir = IndirNode::default();
        indir.set_asg_lhs(true).unwrap();
        assert!(indir.is_asg_lhs());
        let err = indir.set_req_addr_in_reg(true).unwrap_err();
        assert_eq!(err, IrError::WrongIndirPhase { what: "address in register", phase: "LIR" });

        let mut kind = NodeKind::Indir(indir);
        sync_lowering(&mut kind, IrPhase::Lir);
        let NodeKind::Indir(mut lowered) = kind else {
            panic!("shape changed");
        };
        assert!(!lowered.is_asg_lhs());
        lowered.set_req_addr_in_reg(true).unwrap();
        assert!(lowered.requires_addr_in_reg());
        assert!(lowered.set_asg_lhs(true).is_err());
    }

    #[test]
    fn test_enter_lir_rejects_hir_only_opers() {
        let mut arena = IrArena::new();
        let a = arena.new_lcl_var(LclNum(0), VarType::Int).unwrap();
        let b = arena.new_icon(1, VarType::Int).unwrap();
        let comma = arena.new_binop(Oper::Comma, VarType::Int, a, b).unwrap();
        let err = arena.enter_lir(&[comma]).unwrap_err();
        assert_eq!(err, IrError::InvalidInPhase { oper: Oper::Comma, phase: "LIR" });
        assert_eq!(arena.phase(), IrPhase::Hir);
    }

    #[test]
    fn test_enter_lir_rejects_assignment_targets() {
        let mut arena = IrArena::new();
        let addr = arena.new_lcl_var(LclNum(0), VarType::ByRef).unwrap();
        let target = arena.new_indir(VarType::Int, addr).unwrap();
        let value = arena.new_icon(1, VarType::Int).unwrap();
        arena.new_assign(target, value).unwrap();
        let err = arena.enter_lir(&[target]).unwrap_err();
        assert_eq!(err, IrError::UnloweredAssignTarget { node: target });
    }

    #[test]
    fn test_enter_lir_converts_indirections() {
        let mut arena = IrArena::new();
        let addr = arena.new_lcl_var(LclNum(0), VarType::ByRef).unwrap();
        let load = arena.new_indir(VarType::Int, addr).unwrap();
        arena.enter_lir(&[load]).unwrap();
        assert_eq!(arena.phase(), IrPhase::Lir);
        assert_eq!(arena[load].as_indir().unwrap().lowering, IndirLowering::Lir { req_addr_in_reg: false });
        arena.validate_phase(&[load]).unwrap();

        let value = arena.new_icon(1, VarType::Int).unwrap();
        let store = arena.new_store_ind(VarType::Int, addr, value).unwrap();
        assert!(matches!(arena[store].as_indir().unwrap().lowering, IndirLowering::Lir { .. }));
        assert!(arena.new_binop(Oper::Comma, VarType::Int, load, value).is_err());
    }

    #[test]
    fn test_shared_subtrees_are_visited_once() {
        let mut arena = IrArena::new();
        let addr = arena.new_lcl_var(LclNum(0), VarType::ByRef).unwrap();
        let load = arena.new_indir(VarType::Int, addr).unwrap();
        let add = arena.new_binop(Oper::Add, VarType::Int, load, load).unwrap();
        let mul = arena.new_binop(Oper::Mul, VarType::Int, add, add).unwrap();
        let reachable = arena.reachable(&[mul, add]).unwrap();
        assert_eq!(reachable.len(), 4);
        assert_eq!(reachable[0], add);
    }
}
