//! Node flags
//!
//! `GenFlags` holds the operator-independent bits that live in every node
//! header, including the side-effect subset. Bits whose meaning depends on
//! the operator live in a flag type owned by that shape's payload, so a
//! flag can never be read under the wrong interpretation.

use bitflags::bitflags;

bitflags! {
    /// Flags common to every node
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GenFlags: u32 {
        // ===== Side effects =====
        /// Subtree contains an assignment
        const ASG = 0x0000_0001;
        /// Subtree contains a call
        const CALL = 0x0000_0002;
        /// Subtree may throw
        const EXCEPT = 0x0000_0004;
        /// Subtree reads global or heap state
        const GLOB_REF = 0x0000_0008;
        /// Subtree must keep its position relative to other side effects
        const ORDER_SIDEEFF = 0x0000_0010;

        // ===== Evaluation and codegen state =====
        /// Evaluate op2 before op1
        const REVERSE_OPS = 0x0000_0020;
        /// Folded into its user; generates no code of its own
        const CONTAINED = 0x0000_0040;
        /// Value is currently spilled
        const SPILLED = 0x0000_0080;
        /// Value is used from its spill location rather than reloaded
        const NOREG_AT_USE = 0x0000_0100;
        /// Instruction sets condition flags
        const SET_FLAGS = 0x0000_0200;
        /// Instruction consumes condition flags
        const USE_FLAGS = 0x0000_0400;
        /// Requested CSE candidate
        const MAKE_CSE = 0x0000_0800;
        /// Never CSE this value
        const DONT_CSE = 0x0000_1000;
        /// Only evaluated under one arm of a conditional
        const COLON_COND = 0x0000_2000;
        /// Value is known to be 0 or 1
        const BOOLEAN = 0x0000_4000;
        /// Unsigned comparison or conversion
        const UNSIGNED = 0x0000_8000;
        /// Argument value consumed in the late list
        const LATE_ARG = 0x0001_0000;
        /// Value must be spilled after definition
        const SPILL = 0x0002_0000;

        // ===== Groups =====
        const PERSISTENT_SIDE_EFFECTS = Self::ASG.bits() | Self::CALL.bits();
        const SIDE_EFFECT = Self::PERSISTENT_SIDE_EFFECTS.bits() | Self::EXCEPT.bits();
        const GLOB_EFFECT = Self::SIDE_EFFECT.bits() | Self::GLOB_REF.bits();
        const ALL_EFFECT = Self::GLOB_EFFECT.bits() | Self::ORDER_SIDEEFF.bits();
        const COMMON_MASK = 0x0003_FFFF;
        /// Flags that describe the node itself, not its subtree
        const NODE_MASK = Self::COMMON_MASK.bits() & !Self::ALL_EFFECT.bits();
        const SPILL_STATE = Self::SPILL.bits() | Self::SPILLED.bits();
    }
}

impl GenFlags {
    /// Side-effect subset of these flags
    pub fn effects(self) -> GenFlags {
        self & GenFlags::ALL_EFFECT
    }

    /// Whether a node with these flags can be seen by other threads or
    /// later code, and so may not be removed or reordered freely
    pub fn has_globally_visible_side_effects(self) -> bool {
        self.intersects(GenFlags::CALL | GenFlags::EXCEPT)
            || self.contains(GenFlags::ASG | GenFlags::GLOB_REF)
    }
}

bitflags! {
    /// Local variable flags (LCL_VAR, LCL_FLD and their stores)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LclVarFlags: u32 {
        /// Full definition of the local
        const DEF = 0x0000_0001;
        /// Partial definition; the old value is also used
        const USEASG = 0x0000_0002;
        /// Last use of the local
        const DEATH = 0x0000_0004;
        /// Multi-register local; operates on all promoted fields
        const MULTIREG = 0x0000_0008;
        /// Last use of promoted field 0..3
        const DEATH0 = 0x0000_0010;
        const DEATH1 = 0x0000_0020;
        const DEATH2 = 0x0000_0040;
        const DEATH3 = 0x0000_0080;
        /// Read of a cast-widened local
        const CAST = 0x0000_0100;
        /// Loop iterator variable
        const ITERATOR = 0x0000_0200;
        /// Produced by loop cloning
        const CLONED = 0x0000_0400;
        /// Holds the generic context
        const CONTEXT = 0x0000_0800;
        /// Produced by folding an address-of and an indirection
        const FOLDED_IND = 0x0000_1000;

        const ALL_DEATHS = Self::DEATH0.bits()
            | Self::DEATH1.bits()
            | Self::DEATH2.bits()
            | Self::DEATH3.bits();
    }
}

impl LclVarFlags {
    /// Last-use flag of promoted field `index`
    pub fn death_of_field(index: usize) -> LclVarFlags {
        let bit = u32::try_from(index)
            .ok()
            .and_then(|shift| LclVarFlags::DEATH0.bits().checked_shl(shift))
            .unwrap_or(0);
        LclVarFlags::from_bits_retain(bit) & LclVarFlags::ALL_DEATHS
    }
}

bitflags! {
    /// Flags of generic unary/binary operator nodes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OpFlags: u32 {
        /// Overflow-checked arithmetic (ADD, SUB, MUL)
        const OVERFLOW = 0x0000_0001;
        /// MUL producing a 64-bit result from 32-bit operands
        const MUL_64RSLT = 0x0000_0002;
        /// Division by constant already optimized
        const DIV_BY_CNS_OPT = 0x0000_0004;
        /// Relop: unordered compare (true if either operand is NaN)
        const RELOP_NAN_UN = 0x0000_0008;
        /// Relop: result consumed by a JTRUE
        const RELOP_JMP_USED = 0x0000_0010;
        /// Relop: zero-trip test of a loop
        const RELOP_ZTT = 0x0000_0020;
        /// QMARK: part of an expanded cast/isinst
        const QMARK_CAST_INSTOF = 0x0000_0040;
        /// RETURN: merged into the common return block
        const RET_MERGED = 0x0000_0080;
        /// NOP/COMMA: bounds check known in range
        const CHK_INDEX_INBND = 0x0000_0100;
        /// ADDR: address of a value being boxed
        const BOX_VALUE = 0x0000_0200;
    }
}

bitflags! {
    /// Indirection flags (IND, NULLCHECK, STOREIND, BLK family)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IndirFlags: u32 {
        /// Target is not on the GC heap
        const TGT_NOT_HEAP = 0x0000_0001;
        const VOLATILE = 0x0000_0002;
        /// Address is known non-null; the access cannot fault
        const NONFAULTING = 0x0000_0004;
        /// Target may be anywhere (heap, stack, static)
        const TGT_ANYWHERE = 0x0000_0008;
        /// Thread-local storage access
        const TLS_REF = 0x0000_0010;
        const UNALIGNED = 0x0000_0020;
        /// Target value never changes
        const INVARIANT = 0x0000_0040;
        /// Loaded value is known non-null
        const NONNULL = 0x0000_0080;
    }
}

bitflags! {
    /// INDEX / INDEX_ADDR flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IndexFlags: u32 {
        /// Range check required
        const RNGCHK = 0x0000_0001;
        /// Indexing into a string rather than an array
        const STRING_LAYOUT = 0x0000_0002;
        /// Array reference known non-null
        const NOFAULT = 0x0000_0004;
    }
}

bitflags! {
    /// FIELD and CLS_VAR flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldFlags: u32 {
        const VOLATILE = 0x0000_0001;
        /// Access must run the class constructor first
        const INITCLASS = 0x0000_0002;
    }
}

bitflags! {
    /// Integer constant flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IconFlags: u32 {
        /// Constant is a field offset
        const FIELD_OFF = 0x0000_0001;
        /// Constant is a SIMD element count
        const SIMD_COUNT = 0x0000_0002;
        /// Handle requires class initialization
        const INITCLASS = 0x0000_0004;
    }
}

/// What runtime entity an integer constant is a handle to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconHandleKind {
    Scope,
    Class,
    Method,
    Field,
    Static,
    Str,
    ConstPtr,
    GlobalPtr,
    VarArgsHandle,
    PInvokeCallSite,
    Token,
    Tls,
    FtnAddr,
    CidMid,
    BasicBlockPtr,
    StaticBoxPtr,
}

impl IconHandleKind {
    /// Whether the handle's target may change at run time
    pub fn is_mutable_target(self) -> bool {
        matches!(self, IconHandleKind::GlobalPtr | IconHandleKind::Static)
    }
}

bitflags! {
    /// Call node flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CallFlags: u32 {
        /// Call to unmanaged code
        const UNMANAGED = 0x0000_0001;
        const INLINE_CANDIDATE = 0x0000_0002;
        /// Needs an explicit null check of `this`
        const NULLCHECK = 0x0000_0004;
        /// Callee pops its arguments
        const POP_ARGS = 0x0000_0008;
        /// Pure helper call that can be hoisted
        const HOISTABLE = 0x0000_0010;
    }
}

bitflags! {
    /// Secondary call flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CallMoreFlags: u32 {
        const EXPLICIT_TAILCALL = 0x0000_0001;
        const TAILCALL = 0x0000_0002;
        /// Call returns through a hidden return buffer
        const RETBUFFARG = 0x0000_0004;
        const DELEGATE_INV = 0x0000_0008;
        const PINVOKE = 0x0000_0010;
        const DOES_NOT_RETURN = 0x0000_0020;
        const DEVIRTUALIZED = 0x0000_0040;
        const GUARDED_DEVIRT = 0x0000_0080;
        /// Helper known not to throw
        const NOTHROW = 0x0000_0100;
        const TAILCALL_VIA_JIT_HELPER = 0x0000_0200;
        const WRAPPER_DELEGATE_INV = 0x0000_0400;
        const R2R_REL_INDIRECT = 0x0000_0800;
        const EXPANDED_EARLY = 0x0000_1000;
    }
}

/// How a call is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VirtualCallKind {
    #[default]
    NonVirtual,
    Stub,
    Vtable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_groups() {
        assert_eq!(GenFlags::PERSISTENT_SIDE_EFFECTS, GenFlags::ASG | GenFlags::CALL);
        assert!(GenFlags::ALL_EFFECT.contains(GenFlags::ORDER_SIDEEFF));
        assert!(!GenFlags::NODE_MASK.intersects(GenFlags::ALL_EFFECT));
        assert!(GenFlags::COMMON_MASK.contains(GenFlags::SPILL | GenFlags::LATE_ARG));
    }

    #[test]
    fn test_globally_visible_side_effects() {
        assert!(GenFlags::CALL.has_globally_visible_side_effects());
        assert!(GenFlags::EXCEPT.has_globally_visible_side_effects());
        assert!(!GenFlags::ASG.has_globally_visible_side_effects());
        assert!(!GenFlags::GLOB_REF.has_globally_visible_side_effects());
        assert!((GenFlags::ASG | GenFlags::GLOB_REF).has_globally_visible_side_effects());
        assert!(!GenFlags::ORDER_SIDEEFF.has_globally_visible_side_effects());
    }

    #[test]
    fn test_effects_mask() {
        let flags = GenFlags::CALL | GenFlags::REVERSE_OPS | GenFlags::SPILL;
        assert_eq!(flags.effects(), GenFlags::CALL);
    }

    #[test]
    fn test_field_death_flags() {
        assert_eq!(LclVarFlags::death_of_field(0), LclVarFlags::DEATH0);
        assert_eq!(LclVarFlags::death_of_field(3), LclVarFlags::DEATH3);
        assert!(LclVarFlags::death_of_field(4).is_empty());
    }
}
