//! Multi-register values
//!
//! Calls returning structs in several registers, split struct arguments,
//! promoted multi-register locals and the copies/reloads of those all
//! define more than one register. Register 0 is always the node's primary
//! register; the others live in the shape's payload together with a packed
//! spill-state byte pair. The accessors on `Node` hide which shape stores
//! what.

use crate::error::{IrError, IrResult};
use crate::flags::{GenFlags, LclVarFlags};
use crate::node::kind::{CopyOrReloadNode, LclVarNode, NodeKind};
use crate::node::Node;
use crate::oper::Oper;
use crate::types::{RegNum, VarType};

/// Most registers a call can return a value in
pub const MAX_RET_REG_COUNT: usize = 4;
/// Most registers a promoted local can be enregistered in
pub const MAX_MULTIREG_COUNT: usize = 4;
/// Most registers the register part of a split argument can use
pub const MAX_SPLIT_REG_COUNT: usize = 4;

// ===== Packed spill flags =====

const PACKED_SPILL: u16 = 1;
const PACKED_SPILLED: u16 = 2;
const PACKED_BITS: usize = 2;
const PACKED_MASK: u16 = 0b11;

/// Spill state of each register of a multi-register node, two bits apiece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MultiRegSpillFlags(u16);

impl MultiRegSpillFlags {
    /// Registers that fit in the packed representation
    pub const CAPACITY: usize = 16 / PACKED_BITS;

    /// `SPILL`/`SPILLED` state of register `index`
    pub fn get(self, index: usize) -> GenFlags {
        if index >= Self::CAPACITY {
            return GenFlags::empty();
        }
        let bits = (self.0 >> (index * PACKED_BITS)) & PACKED_MASK;
        let mut flags = GenFlags::empty();
        if bits & PACKED_SPILL != 0 {
            flags |= GenFlags::SPILL;
        }
        if bits & PACKED_SPILLED != 0 {
            flags |= GenFlags::SPILLED;
        }
        flags
    }

    /// Replace the spill state of register `index`; other flags are ignored
    pub fn set(&mut self, index: usize, flags: GenFlags) {
        if index >= Self::CAPACITY {
            return;
        }
        let mut bits = 0;
        if flags.contains(GenFlags::SPILL) {
            bits |= PACKED_SPILL;
        }
        if flags.contains(GenFlags::SPILLED) {
            bits |= PACKED_SPILLED;
        }
        let shift = index * PACKED_BITS;
        self.0 = (self.0 & !(PACKED_MASK << shift)) | (bits << shift);
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u16 {
        self.0
    }
}

// ===== Register storage =====

/// Registers 1..=OTHERS of a multi-register node plus per-register spill
/// state for all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiRegs<const OTHERS: usize> {
    others: [Option<RegNum>; OTHERS],
    spill: MultiRegSpillFlags,
}

impl<const OTHERS: usize> Default for MultiRegs<OTHERS> {
    fn default() -> Self {
        MultiRegs { others: [None; OTHERS], spill: MultiRegSpillFlags::default() }
    }
}

impl<const OTHERS: usize> MultiRegs<OTHERS> {
    /// Total register slots, including the primary register
    pub const CAPACITY: usize = OTHERS + 1;

    /// Register at `index` (1-based into the other registers)
    pub fn other(&self, index: usize) -> Option<RegNum> {
        index.checked_sub(1).and_then(|slot| self.others.get(slot).copied().flatten())
    }

    pub fn set_other(&mut self, index: usize, reg: Option<RegNum>) {
        if let Some(slot) = index.checked_sub(1).and_then(|slot| self.others.get_mut(slot)) {
            *slot = reg;
        }
    }

    pub fn spill_flags(&self) -> MultiRegSpillFlags {
        self.spill
    }

    pub fn spill_flags_mut(&mut self) -> &mut MultiRegSpillFlags {
        &mut self.spill
    }

    pub fn clear_others(&mut self) {
        self.others = [None; OTHERS];
    }

    /// Highest index with an assigned register among the others
    fn highest_assigned(&self) -> Option<usize> {
        self.others.iter().rposition(|reg| reg.is_some()).map(|slot| slot + 1)
    }
}

// ===== Shape helpers =====

impl LclVarNode {
    /// Mark the local as living in `field_count` registers. Clears any
    /// stale per-register spill state.
    pub fn set_multi_reg(&mut self, field_count: u8) -> IrResult<()> {
        if field_count as usize > MAX_MULTIREG_COUNT {
            return Err(IrError::RegIndexOutOfRange {
                oper: Oper::LclVar,
                index: field_count as usize - 1,
                capacity: MAX_MULTIREG_COUNT,
            });
        }
        self.flags |= LclVarFlags::MULTIREG;
        self.field_count = field_count;
        self.regs.spill_flags_mut().clear();
        Ok(())
    }

    pub fn clear_multi_reg(&mut self) {
        self.flags.remove(LclVarFlags::MULTIREG);
        self.field_count = 0;
        self.regs.clear_others();
        self.regs.spill_flags_mut().clear();
    }

    pub fn field_count(&self) -> usize {
        self.field_count as usize
    }

    /// Whether promoted field `index` dies at this node
    pub fn is_last_use(&self, index: usize) -> bool {
        self.flags.contains(LclVarFlags::death_of_field(index))
    }

    pub fn set_last_use(&mut self, index: usize) {
        self.flags |= LclVarFlags::death_of_field(index);
    }
}

impl CopyOrReloadNode {
    /// Registers copied, as recorded when the node was built
    pub fn reg_count(&self) -> usize {
        self.reg_count as usize
    }

    /// Live register count derived from the register slots: one past the
    /// highest index that has a register assigned. A copy of a 3-register
    /// value that only needs registers 0 and 2 moved reports 3.
    pub fn reg_count_or_highest_assigned_index_plus_one(&self) -> usize {
        match self.regs.highest_assigned() {
            Some(index) => index + 1,
            None => 1,
        }
    }
}

// ===== Uniform accessors =====

impl Node {
    /// Whether this node currently defines more than one register
    pub fn is_multi_reg_node(&self) -> bool {
        match self.kind() {
            NodeKind::Call(call) => call.has_multi_reg_return(),
            NodeKind::LclVar(lcl) => lcl.is_multi_reg(),
            NodeKind::PutArgSplit(_) => true,
            NodeKind::CopyOrReload(copy) => copy.reg_count() > 1,
            _ => false,
        }
    }

    /// Number of registers this node defines (1 for single-register nodes)
    pub fn multi_reg_count(&self) -> usize {
        match self.kind() {
            NodeKind::Call(call) if call.has_multi_reg_return() => call.return_desc().reg_count(),
            NodeKind::LclVar(lcl) if lcl.is_multi_reg() => lcl.field_count(),
            NodeKind::PutArgSplit(split) => split.num_regs(),
            NodeKind::CopyOrReload(copy) => copy.reg_count(),
            _ => 1,
        }
    }

    /// Highest register index accessors accept, exclusive
    fn reg_index_limit(&self) -> Option<usize> {
        match self.kind() {
            NodeKind::Call(_) => Some(MAX_RET_REG_COUNT),
            NodeKind::LclVar(lcl) if lcl.is_multi_reg() => Some(lcl.field_count().min(MAX_MULTIREG_COUNT)),
            NodeKind::PutArgSplit(split) => Some(split.num_regs().min(MAX_SPLIT_REG_COUNT)),
            // Copies are sized by the registers actually assigned.
            NodeKind::CopyOrReload(_) => Some(MAX_RET_REG_COUNT),
            _ => None,
        }
    }

    fn check_reg_index(&self, index: usize) -> IrResult<()> {
        if index == 0 {
            return Ok(());
        }
        match self.reg_index_limit() {
            Some(limit) if index < limit => Ok(()),
            Some(limit) => Err(IrError::RegIndexOutOfRange { oper: self.oper(), index, capacity: limit }),
            None => Err(IrError::NotMultiReg { oper: self.oper() }),
        }
    }

    /// Register assigned to result register `index`
    pub fn reg_num_by_idx(&self, index: usize) -> IrResult<Option<RegNum>> {
        self.check_reg_index(index)?;
        if index == 0 {
            return Ok(self.reg());
        }
        Ok(match self.kind() {
            NodeKind::Call(call) => call.regs.other(index),
            NodeKind::LclVar(lcl) => lcl.regs.other(index),
            NodeKind::PutArgSplit(split) => split.regs.other(index),
            NodeKind::CopyOrReload(copy) => copy.regs.other(index),
            _ => None,
        })
    }

    pub fn set_reg_num_by_idx(&mut self, reg: Option<RegNum>, index: usize) -> IrResult<()> {
        self.check_reg_index(index)?;
        if index == 0 {
            self.set_reg(reg);
            return Ok(());
        }
        match self.kind_mut() {
            NodeKind::Call(call) => call.regs.set_other(index, reg),
            NodeKind::LclVar(lcl) => lcl.regs.set_other(index, reg),
            NodeKind::PutArgSplit(split) => split.regs.set_other(index, reg),
            NodeKind::CopyOrReload(copy) => copy.regs.set_other(index, reg),
            _ => {}
        }
        Ok(())
    }

    fn packed_spill_flags(&self) -> Option<MultiRegSpillFlags> {
        match self.kind() {
            NodeKind::Call(call) => Some(call.regs.spill_flags()),
            NodeKind::LclVar(lcl) if lcl.is_multi_reg() => Some(lcl.regs.spill_flags()),
            NodeKind::PutArgSplit(split) => Some(split.regs.spill_flags()),
            NodeKind::CopyOrReload(copy) => Some(copy.regs.spill_flags()),
            _ => None,
        }
    }

    fn packed_spill_flags_mut(&mut self) -> Option<&mut MultiRegSpillFlags> {
        match self.kind_mut() {
            NodeKind::Call(call) => Some(call.regs.spill_flags_mut()),
            NodeKind::LclVar(lcl) if lcl.is_multi_reg() => Some(lcl.regs.spill_flags_mut()),
            NodeKind::PutArgSplit(split) => Some(split.regs.spill_flags_mut()),
            NodeKind::CopyOrReload(copy) => Some(copy.regs.spill_flags_mut()),
            _ => None,
        }
    }

    /// `SPILL`/`SPILLED` state of result register `index`
    pub fn reg_spill_flag_by_idx(&self, index: usize) -> IrResult<GenFlags> {
        self.check_reg_index(index)?;
        Ok(match self.packed_spill_flags() {
            Some(packed) => packed.get(index),
            None => self.flags() & GenFlags::SPILL_STATE,
        })
    }

    pub fn set_reg_spill_flag_by_idx(&mut self, flags: GenFlags, index: usize) -> IrResult<()> {
        self.check_reg_index(index)?;
        match self.packed_spill_flags_mut() {
            Some(packed) => packed.set(index, flags),
            None => {
                self.remove_flags(GenFlags::SPILL_STATE);
                self.add_flags(flags & GenFlags::SPILL_STATE);
            }
        }
        Ok(())
    }

    /// Type of result register `index`, where the node records it
    pub fn reg_type_by_idx(&self, index: usize) -> IrResult<VarType> {
        self.check_reg_index(index)?;
        match self.kind() {
            NodeKind::Call(call) if call.has_multi_reg_return() => Ok(call.return_desc().reg_type(index)),
            NodeKind::PutArgSplit(split) => Ok(split.reg_type(index).unwrap_or(VarType::Unknown)),
            _ => Ok(self.ty()),
        }
    }

    /// Drop every register assignment except the primary one
    pub fn clear_other_regs(&mut self) {
        match self.kind_mut() {
            NodeKind::Call(call) => call.regs.clear_others(),
            NodeKind::LclVar(lcl) => lcl.regs.clear_others(),
            NodeKind::PutArgSplit(split) => split.regs.clear_others(),
            NodeKind::CopyOrReload(copy) => copy.regs.clear_others(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_spill_flags_are_independent() {
        let mut packed = MultiRegSpillFlags::default();
        packed.set(0, GenFlags::SPILL);
        packed.set(2, GenFlags::SPILL | GenFlags::SPILLED);
        assert_eq!(packed.get(0), GenFlags::SPILL);
        assert!(packed.get(1).is_empty());
        assert_eq!(packed.get(2), GenFlags::SPILL | GenFlags::SPILLED);

        packed.set(2, GenFlags::SPILLED);
        assert_eq!(packed.get(2), GenFlags::SPILLED);
        assert_eq!(packed.get(0), GenFlags::SPILL);
    }

    #[test]
    fn test_packed_ignores_unrelated_flags() {
        let mut packed = MultiRegSpillFlags::default();
        packed.set(1, GenFlags::CALL | GenFlags::CONTAINED);
        assert!(packed.is_empty());
        packed.set(MultiRegSpillFlags::CAPACITY, GenFlags::SPILL);
        assert!(packed.is_empty());
    }

    #[test]
    fn test_multi_regs_indexing() {
        let mut regs: MultiRegs<3> = MultiRegs::default();
        assert_eq!(MultiRegs::<3>::CAPACITY, 4);
        regs.set_other(2, Some(RegNum(5)));
        assert_eq!(regs.other(2), Some(RegNum(5)));
        assert_eq!(regs.other(1), None);
        assert_eq!(regs.other(0), None);
        assert_eq!(regs.other(9), None);
        assert_eq!(regs.highest_assigned(), Some(2));
        regs.clear_others();
        assert_eq!(regs.highest_assigned(), None);
    }

    #[test]
    fn test_copy_derived_reg_count() {
        let mut copy = CopyOrReloadNode::default();
        assert_eq!(copy.reg_count_or_highest_assigned_index_plus_one(), 1);
        copy.regs.set_other(2, Some(RegNum(3)));
        assert_eq!(copy.reg_count_or_highest_assigned_index_plus_one(), 3);
        assert_eq!(copy.reg_count(), 1);
    }

    #[test]
    fn test_lcl_multi_reg_clears_spill_state() {
        let mut lcl = LclVarNode::default();
        lcl.regs.spill_flags_mut().set(1, GenFlags::SPILL);
        lcl.set_multi_reg(2).unwrap();
        assert!(lcl.is_multi_reg());
        assert_eq!(lcl.field_count(), 2);
        assert!(lcl.regs.spill_flags().is_empty());
        lcl.set_last_use(1);
        assert!(lcl.is_last_use(1));
        assert!(!lcl.is_last_use(0));
    }

    #[test]
    fn test_lcl_multi_reg_count_is_bounded_by_storage() {
        let mut lcl = LclVarNode::default();
        let err = lcl.set_multi_reg(MAX_MULTIREG_COUNT as u8 + 2).unwrap_err();
        assert_eq!(
            err,
            IrError::RegIndexOutOfRange { oper: Oper::LclVar, index: MAX_MULTIREG_COUNT + 1, capacity: MAX_MULTIREG_COUNT }
        );
        assert!(!lcl.is_multi_reg());
        assert_eq!(lcl.field_count(), 0);
    }
}
