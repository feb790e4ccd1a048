//! Call nodes
//!
//! A call carries its argument list (`args`), how it is dispatched
//! (`CallType`), the registers its result comes back in, and the flags
//! that matter to inlining, tail calls and lowering.

pub mod abi;
pub mod args;
mod lower;

pub use abi::{
    AbiClassifier, ArgPlacementRequest, CallArgAbiInfo, LocalAllocator, RegisterAbi, SequentialTemps,
    MAX_ARG_REG_COUNT,
};
pub use args::{ArgsStage, CallArg, CallArgId, CallArgs, NewCallArg, WellKnownArg};

use crate::error::{IrError, IrResult};
use crate::flags::{CallFlags, CallMoreFlags, VirtualCallKind};
use crate::multireg::{MultiRegs, MAX_RET_REG_COUNT};
use crate::node::NodeId;
use crate::oper::Oper;
use crate::types::{ClassHandle, HelperId, MethodHandle, VarType};

/// How the callee is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallType {
    /// Direct or virtual call to a method
    UserFunc { method: MethodHandle },
    /// Runtime helper
    Helper { helper: HelperId },
    /// Call through a computed target address
    Indirect {
        addr: NodeId,
        /// Unmanaged calling-convention cookie
        cookie: Option<NodeId>,
    },
}

/// Registers a call returns its value in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnTypeDesc {
    reg_types: [VarType; MAX_RET_REG_COUNT],
    initialized: bool,
}

impl Default for ReturnTypeDesc {
    fn default() -> Self {
        ReturnTypeDesc { reg_types: [VarType::Unknown; MAX_RET_REG_COUNT], initialized: false }
    }
}

impl ReturnTypeDesc {
    /// Record the register types of the return value, in register order
    pub fn initialize(&mut self, reg_types: &[VarType]) -> IrResult<()> {
        if reg_types.len() > MAX_RET_REG_COUNT {
            return Err(IrError::RegIndexOutOfRange {
                oper: Oper::Call,
                index: reg_types.len() - 1,
                capacity: MAX_RET_REG_COUNT,
            });
        }
        self.reset();
        for (slot, ty) in self.reg_types.iter_mut().zip(reg_types) {
            *slot = *ty;
        }
        self.initialized = true;
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = ReturnTypeDesc::default();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Registers used, counted up to the first unused slot
    pub fn reg_count(&self) -> usize {
        self.reg_types.iter().take_while(|ty| **ty != VarType::Unknown).count()
    }

    pub fn is_multi_reg(&self) -> bool {
        self.reg_count() > 1
    }

    /// Type of return register `index`; `Unknown` past the last register
    pub fn reg_type(&self, index: usize) -> VarType {
        if index < self.reg_count() {
            self.reg_types[index]
        } else {
            VarType::Unknown
        }
    }
}

/// Payload of a CALL node
#[derive(Debug, Clone)]
pub struct CallNode {
    pub(crate) args: CallArgs,
    pub(crate) call_type: CallType,
    /// Expression evaluated before the call, e.g. a virtual stub lookup
    pub(crate) control_expr: Option<NodeId>,
    pub flags: CallFlags,
    pub(crate) more_flags: CallMoreFlags,
    pub virt_kind: VirtualCallKind,
    pub return_type: VarType,
    pub ret_class: Option<ClassHandle>,
    pub(crate) return_desc: ReturnTypeDesc,
    pub(crate) regs: MultiRegs<{ MAX_RET_REG_COUNT - 1 }>,
}

impl CallNode {
    pub fn new(call_type: CallType, return_type: VarType) -> Self {
        CallNode {
            args: CallArgs::new(),
            call_type,
            control_expr: None,
            flags: CallFlags::empty(),
            more_flags: CallMoreFlags::empty(),
            virt_kind: VirtualCallKind::NonVirtual,
            return_type,
            ret_class: None,
            return_desc: ReturnTypeDesc::default(),
            regs: MultiRegs::default(),
        }
    }

    pub fn args(&self) -> &CallArgs {
        &self.args
    }

    pub(crate) fn args_mut(&mut self) -> &mut CallArgs {
        &mut self.args
    }

    pub fn call_type(&self) -> &CallType {
        &self.call_type
    }

    pub fn control_expr(&self) -> Option<NodeId> {
        self.control_expr
    }

    /// Target address of an indirect call
    pub fn indirect_target(&self) -> Option<NodeId> {
        match self.call_type {
            CallType::Indirect { addr, .. } => Some(addr),
            _ => None,
        }
    }

    pub fn cookie(&self) -> Option<NodeId> {
        match self.call_type {
            CallType::Indirect { cookie, .. } => cookie,
            _ => None,
        }
    }

    pub fn method(&self) -> Option<MethodHandle> {
        match self.call_type {
            CallType::UserFunc { method } => Some(method),
            _ => None,
        }
    }

    pub fn helper(&self) -> Option<HelperId> {
        match self.call_type {
            CallType::Helper { helper } => Some(helper),
            _ => None,
        }
    }

    pub fn return_desc(&self) -> &ReturnTypeDesc {
        &self.return_desc
    }

    pub fn return_desc_mut(&mut self) -> &mut ReturnTypeDesc {
        &mut self.return_desc
    }

    pub fn has_multi_reg_return(&self) -> bool {
        !self.has_ret_buf_arg() && self.return_desc.is_multi_reg()
    }

    pub fn is_multi_reg_call(&self) -> bool {
        self.has_multi_reg_return()
    }

    // ===== Predicates =====

    pub fn is_user_func(&self) -> bool {
        matches!(self.call_type, CallType::UserFunc { .. })
    }

    pub fn is_helper(&self) -> bool {
        matches!(self.call_type, CallType::Helper { .. })
    }

    pub fn is_indirect(&self) -> bool {
        matches!(self.call_type, CallType::Indirect { .. })
    }

    pub fn is_virtual(&self) -> bool {
        self.virt_kind != VirtualCallKind::NonVirtual
    }

    pub fn is_virtual_stub(&self) -> bool {
        self.virt_kind == VirtualCallKind::Stub
    }

    pub fn is_tail_call(&self) -> bool {
        self.more_flags.intersects(CallMoreFlags::TAILCALL | CallMoreFlags::EXPLICIT_TAILCALL)
    }

    pub fn more_flags(&self) -> CallMoreFlags {
        self.more_flags
    }

    pub fn is_no_throw(&self) -> bool {
        self.more_flags.contains(CallMoreFlags::NOTHROW)
    }

    pub fn is_unmanaged(&self) -> bool {
        self.flags.contains(CallFlags::UNMANAGED)
    }

    pub fn is_inline_candidate(&self) -> bool {
        self.flags.contains(CallFlags::INLINE_CANDIDATE)
    }

    pub fn has_ret_buf_arg(&self) -> bool {
        self.more_flags.contains(CallMoreFlags::RETBUFFARG)
    }

    pub fn is_no_return(&self) -> bool {
        self.more_flags.contains(CallMoreFlags::DOES_NOT_RETURN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_desc_counts_until_unknown() {
        let mut desc = ReturnTypeDesc::default();
        assert!(!desc.is_initialized());
        assert_eq!(desc.reg_count(), 0);
        desc.initialize(&[VarType::Long, VarType::Double]).unwrap();
        assert_eq!(desc.reg_count(), 2);
        assert!(desc.is_multi_reg());
        assert_eq!(desc.reg_type(1), VarType::Double);
        assert_eq!(desc.reg_type(2), VarType::Unknown);
    }

    #[test]
    fn test_return_desc_rejects_too_many_regs() {
        let mut desc = ReturnTypeDesc::default();
        let err = desc.initialize(&[VarType::Int; MAX_RET_REG_COUNT + 1]).unwrap_err();
        assert!(matches!(err, IrError::RegIndexOutOfRange { .. }));
    }

    #[test]
    fn test_ret_buffer_suppresses_multi_reg() {
        let mut call = CallNode::new(CallType::Helper { helper: HelperId(4) }, VarType::Struct);
        call.return_desc_mut().initialize(&[VarType::Long, VarType::Long]).unwrap();
        assert!(call.has_multi_reg_return());
        call.more_flags |= CallMoreFlags::RETBUFFARG;
        assert!(!call.has_multi_reg_return());
    }

    #[test]
    fn test_call_type_queries() {
        let call = CallNode::new(CallType::Indirect { addr: NodeId(3), cookie: None }, VarType::Int);
        assert!(call.is_indirect());
        assert_eq!(call.indirect_target(), Some(NodeId(3)));
        assert_eq!(call.cookie(), None);
        assert_eq!(call.method(), None);
        assert!(!call.is_virtual());
    }
}
