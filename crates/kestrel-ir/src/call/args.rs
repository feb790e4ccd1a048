//! Call argument lists
//!
//! Arguments are kept in evaluation order. Once ABI placement has run, a
//! second ordering (the late list) records the order in which argument
//! values are put into their final registers and stack slots.
//!
//! The list moves through four stages and never goes back:
//!
//! | stage              | entered by               | allows                        |
//! |--------------------|--------------------------|-------------------------------|
//! | `Open`             | construction             | free editing                  |
//! | `OrderFinalized`   | `IrArena::args_complete` | queries                       |
//! | `AbiAssigned`      | `IrArena::determine_abi` | late insertion of hidden args |
//! | `TempsMaterialized`| `IrArena::eval_args_to_temps` | late insertion of hidden args |

use crate::call::abi::CallArgAbiInfo;
use crate::error::{IrError, IrResult};
use crate::node::NodeId;
use crate::types::{ClassHandle, LclNum, VarType};

/// Special role an argument plays in the calling convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WellKnownArg {
    #[default]
    None,
    ThisPointer,
    VarArgsCookie,
    InstParam,
    RetBuffer,
    PInvokeFrame,
    SecretStubParam,
    WrapperDelegateCell,
    ShiftLow,
    ShiftHigh,
    VirtualStubCell,
    PInvokeCookie,
    PInvokeTarget,
    R2RIndirectionCell,
    ValidateIndirectCallTarget,
    DispatchIndirectCallTarget,
}

impl WellKnownArg {
    /// Roles that lowering may add after ABI placement
    pub fn is_added_late(self) -> bool {
        matches!(
            self,
            WellKnownArg::WrapperDelegateCell
                | WellKnownArg::VirtualStubCell
                | WellKnownArg::PInvokeCookie
                | WellKnownArg::PInvokeTarget
                | WellKnownArg::R2RIndirectionCell
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            WellKnownArg::None => "None",
            WellKnownArg::ThisPointer => "ThisPointer",
            WellKnownArg::VarArgsCookie => "VarArgsCookie",
            WellKnownArg::InstParam => "InstParam",
            WellKnownArg::RetBuffer => "RetBuffer",
            WellKnownArg::PInvokeFrame => "PInvokeFrame",
            WellKnownArg::SecretStubParam => "SecretStubParam",
            WellKnownArg::WrapperDelegateCell => "WrapperDelegateCell",
            WellKnownArg::ShiftLow => "ShiftLow",
            WellKnownArg::ShiftHigh => "ShiftHigh",
            WellKnownArg::VirtualStubCell => "VirtualStubCell",
            WellKnownArg::PInvokeCookie => "PInvokeCookie",
            WellKnownArg::PInvokeTarget => "PInvokeTarget",
            WellKnownArg::R2RIndirectionCell => "R2RIndirectionCell",
            WellKnownArg::ValidateIndirectCallTarget => "ValidateIndirectCallTarget",
            WellKnownArg::DispatchIndirectCallTarget => "DispatchIndirectCallTarget",
        }
    }
}

/// Stage of an argument list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgsStage {
    Open,
    OrderFinalized,
    AbiAssigned,
    TempsMaterialized,
}

/// Stable identity of an argument within its call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallArgId(pub u32);

/// Description of an argument to add
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewCallArg {
    pub node: NodeId,
    pub well_known: WellKnownArg,
    /// Type of the parameter in the callee's signature
    pub sig_type: VarType,
    pub sig_class: Option<ClassHandle>,
    /// Size of a struct argument in bytes
    pub struct_size: Option<u32>,
}

impl NewCallArg {
    pub fn primitive(node: NodeId, sig_type: VarType) -> Self {
        NewCallArg { node, well_known: WellKnownArg::None, sig_type, sig_class: None, struct_size: None }
    }

    pub fn structure(node: NodeId, class: ClassHandle, size: u32) -> Self {
        NewCallArg {
            node,
            well_known: WellKnownArg::None,
            sig_type: VarType::Struct,
            sig_class: Some(class),
            struct_size: Some(size),
        }
    }

    pub fn well_known(mut self, role: WellKnownArg) -> Self {
        self.well_known = role;
        self
    }
}

/// One argument of a call
#[derive(Debug, Clone)]
pub struct CallArg {
    pub(crate) id: CallArgId,
    /// Evaluated in argument order; absent once moved to the late list
    pub(crate) early: Option<NodeId>,
    /// Evaluated in placement order, right before the call
    pub(crate) late: Option<NodeId>,
    pub(crate) well_known: WellKnownArg,
    pub(crate) sig_type: VarType,
    pub(crate) sig_class: Option<ClassHandle>,
    pub(crate) struct_size: Option<u32>,
    pub(crate) abi: CallArgAbiInfo,
    pub(crate) need_tmp: bool,
    pub(crate) need_place: bool,
    pub(crate) is_tmp: bool,
    pub(crate) tmp_num: Option<LclNum>,
    pub(crate) processed: bool,
}

impl CallArg {
    fn new(id: CallArgId, arg: NewCallArg) -> Self {
        CallArg {
            id,
            early: Some(arg.node),
            late: None,
            well_known: arg.well_known,
            sig_type: arg.sig_type,
            sig_class: arg.sig_class,
            struct_size: arg.struct_size,
            abi: CallArgAbiInfo::default(),
            need_tmp: false,
            need_place: false,
            is_tmp: false,
            tmp_num: None,
            processed: false,
        }
    }

    pub fn id(&self) -> CallArgId {
        self.id
    }

    pub fn early_node(&self) -> Option<NodeId> {
        self.early
    }

    pub fn late_node(&self) -> Option<NodeId> {
        self.late
    }

    /// The argument's value: the late node once set, else the early node
    pub fn node(&self) -> Option<NodeId> {
        self.late.or(self.early)
    }

    pub fn well_known(&self) -> WellKnownArg {
        self.well_known
    }

    pub fn sig_type(&self) -> VarType {
        self.sig_type
    }

    pub fn sig_class(&self) -> Option<ClassHandle> {
        self.sig_class
    }

    pub fn struct_size(&self) -> Option<u32> {
        self.struct_size
    }

    pub fn abi(&self) -> &CallArgAbiInfo {
        &self.abi
    }

    pub fn need_tmp(&self) -> bool {
        self.need_tmp
    }

    pub fn need_place(&self) -> bool {
        self.need_place
    }

    pub fn is_tmp(&self) -> bool {
        self.is_tmp
    }

    pub fn tmp_num(&self) -> Option<LclNum> {
        self.tmp_num
    }

    pub fn processed(&self) -> bool {
        self.processed
    }
}

/// Argument list of a call
#[derive(Debug, Clone)]
pub struct CallArgs {
    /// Evaluation order
    pub(crate) args: Vec<CallArg>,
    /// Placement order, by argument id
    pub(crate) late: Vec<CallArgId>,
    pub(crate) stage: ArgsStage,
    next_id: u32,
    pub(crate) next_stack_byte_offset: u32,
    pub(crate) has_this_pointer: bool,
    pub(crate) has_ret_buffer: bool,
    pub(crate) is_var_args: bool,
    pub(crate) has_reg_args: bool,
    pub(crate) has_stack_args: bool,
    pub(crate) needs_temps: bool,
}

impl Default for CallArgs {
    fn default() -> Self {
        CallArgs::new()
    }
}

impl CallArgs {
    pub fn new() -> Self {
        CallArgs {
            args: Vec::new(),
            late: Vec::new(),
            stage: ArgsStage::Open,
            next_id: 0,
            next_stack_byte_offset: 0,
            has_this_pointer: false,
            has_ret_buffer: false,
            is_var_args: false,
            has_reg_args: false,
            has_stack_args: false,
            needs_temps: false,
        }
    }

    pub fn stage(&self) -> ArgsStage {
        self.stage
    }

    fn ensure_open(&self) -> IrResult<()> {
        if self.stage == ArgsStage::Open {
            Ok(())
        } else {
            Err(IrError::ArgsFinalized { stage: self.stage })
        }
    }

    pub(crate) fn expect_stage(&self, expected: ArgsStage) -> IrResult<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(IrError::ArgsStage { expected, found: self.stage })
        }
    }

    fn make_arg(&mut self, arg: NewCallArg) -> CallArg {
        let id = CallArgId(self.next_id);
        self.next_id += 1;
        CallArg::new(id, arg)
    }

    pub(crate) fn insert_at(&mut self, index: usize, arg: NewCallArg) -> CallArgId {
        let arg = self.make_arg(arg);
        let id = arg.id;
        self.args.insert(index, arg);
        id
    }

    // ===== Editing (open lists only) =====

    pub fn push_front(&mut self, arg: NewCallArg) -> IrResult<CallArgId> {
        self.ensure_open()?;
        Ok(self.insert_at(0, arg))
    }

    pub fn push_back(&mut self, arg: NewCallArg) -> IrResult<CallArgId> {
        self.ensure_open()?;
        let index = self.args.len();
        Ok(self.insert_at(index, arg))
    }

    pub fn insert_after(&mut self, after: CallArgId, arg: NewCallArg) -> IrResult<CallArgId> {
        self.ensure_open()?;
        let index = self.index_of(after)?;
        Ok(self.insert_at(index + 1, arg))
    }

    /// Insert right after the `this` argument, or first if there is none
    pub fn insert_after_this_or_first(&mut self, arg: NewCallArg) -> IrResult<CallArgId> {
        self.ensure_open()?;
        match self.this_arg().map(CallArg::id) {
            Some(this) => self.insert_after(this, arg),
            None => self.push_front(arg),
        }
    }

    /// Insert the generic-context argument
    pub fn insert_inst_param(&mut self, node: NodeId) -> IrResult<CallArgId> {
        let arg = NewCallArg::primitive(node, VarType::Ref).well_known(WellKnownArg::InstParam);
        self.insert_after_this_or_first(arg)
    }

    pub fn remove(&mut self, id: CallArgId) -> IrResult<CallArg> {
        self.ensure_open()?;
        let index = self.index_of(id)?;
        Ok(self.args.remove(index))
    }

    /// Reverse the arguments in `index..index + count`
    pub fn reverse(&mut self, index: usize, count: usize) -> IrResult<()> {
        self.ensure_open()?;
        let end = index
            .checked_add(count)
            .filter(|end| *end <= self.args.len())
            .ok_or(IrError::ArgIndexOutOfRange { index: index.saturating_add(count), count: self.args.len() })?;
        self.args[index..end].reverse();
        Ok(())
    }

    pub fn set_var_args(&mut self, is_var_args: bool) {
        self.is_var_args = is_var_args;
    }

    // ===== Queries =====

    pub fn args(&self) -> impl Iterator<Item = &CallArg> + '_ {
        self.args.iter()
    }

    /// Arguments in placement order; empty before ABI assignment
    pub fn late_args(&self) -> impl Iterator<Item = &CallArg> + '_ {
        self.late.iter().filter_map(move |id| self.get(*id))
    }

    pub fn late_ids(&self) -> &[CallArgId] {
        &self.late
    }

    pub fn get(&self, id: CallArgId) -> Option<&CallArg> {
        self.args.iter().find(|arg| arg.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: CallArgId) -> Option<&mut CallArg> {
        self.args.iter_mut().find(|arg| arg.id == id)
    }

    pub fn find_by_node(&self, node: NodeId) -> Option<&CallArg> {
        self.args.iter().find(|arg| arg.early == Some(node) || arg.late == Some(node))
    }

    pub fn find_well_known(&self, role: WellKnownArg) -> Option<&CallArg> {
        self.args.iter().find(|arg| arg.well_known == role)
    }

    pub fn this_arg(&self) -> Option<&CallArg> {
        self.find_well_known(WellKnownArg::ThisPointer)
    }

    pub fn ret_buffer_arg(&self) -> Option<&CallArg> {
        self.find_well_known(WellKnownArg::RetBuffer)
    }

    pub fn arg_by_index(&self, index: usize) -> IrResult<&CallArg> {
        self.args.get(index).ok_or(IrError::ArgIndexOutOfRange { index, count: self.args.len() })
    }

    pub fn index_of(&self, id: CallArgId) -> IrResult<usize> {
        self.args.iter().position(|arg| arg.id == id).ok_or(IrError::UnknownArg(id.0))
    }

    pub fn count_args(&self) -> usize {
        self.args.len()
    }

    /// Arguments that come from the callee's signature
    pub fn count_user_args(&self) -> usize {
        self.args
            .iter()
            .filter(|arg| matches!(arg.well_known, WellKnownArg::None | WellKnownArg::ThisPointer))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn has_this_pointer(&self) -> bool {
        self.has_this_pointer
    }

    pub fn has_ret_buffer(&self) -> bool {
        self.has_ret_buffer
    }

    pub fn is_var_args(&self) -> bool {
        self.is_var_args
    }

    pub fn has_reg_args(&self) -> bool {
        self.has_reg_args
    }

    pub fn has_stack_args(&self) -> bool {
        self.has_stack_args
    }

    pub fn needs_temps(&self) -> bool {
        self.needs_temps
    }

    pub fn is_abi_determined(&self) -> bool {
        self.stage >= ArgsStage::AbiAssigned
    }

    /// Bytes of outgoing stack argument space this call needs
    pub fn outgoing_args_stack_size(&self) -> u32 {
        self.next_stack_byte_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(n: u32) -> NewCallArg {
        NewCallArg::primitive(NodeId(n), VarType::Int)
    }

    fn nodes(args: &CallArgs) -> Vec<u32> {
        args.args().filter_map(|arg| arg.node()).map(|node| node.0).collect()
    }

    #[test]
    fn test_push_and_insert_order() {
        let mut args = CallArgs::new();
        let first = args.push_back(arg(1)).unwrap();
        args.push_back(arg(3)).unwrap();
        args.insert_after(first, arg(2)).unwrap();
        args.push_front(arg(0)).unwrap();
        assert_eq!(nodes(&args), vec![0, 1, 2, 3]);
        assert_eq!(args.count_args(), 4);
    }

    #[test]
    fn test_insert_after_this_or_first() {
        let mut args = CallArgs::new();
        args.push_back(arg(1)).unwrap();
        args.insert_after_this_or_first(arg(5)).unwrap();
        assert_eq!(nodes(&args), vec![5, 1]);

        let mut args = CallArgs::new();
        args.push_back(arg(1)).unwrap();
        args.push_front(arg(0).well_known(WellKnownArg::ThisPointer)).unwrap();
        args.insert_inst_param(NodeId(9)).unwrap();
        assert_eq!(nodes(&args), vec![0, 9, 1]);
        assert_eq!(args.count_user_args(), 2);
        assert_eq!(args.find_well_known(WellKnownArg::InstParam).and_then(CallArg::node), Some(NodeId(9)));
    }

    #[test]
    fn test_reverse_and_remove() {
        let mut args = CallArgs::new();
        let ids: Vec<_> = (0..5).map(|n| args.push_back(arg(n)).unwrap()).collect();
        args.reverse(1, 3).unwrap();
        assert_eq!(nodes(&args), vec![0, 3, 2, 1, 4]);
        assert!(matches!(args.reverse(3, 3), Err(IrError::ArgIndexOutOfRange { .. })));

        let removed = args.remove(ids[2]).unwrap();
        assert_eq!(removed.node(), Some(NodeId(2)));
        assert_eq!(args.index_of(ids[2]), Err(IrError::UnknownArg(ids[2].0)));
    }

    #[test]
    fn test_finalized_list_rejects_edits() {
        let mut args = CallArgs::new();
        args.push_back(arg(1)).unwrap();
        args.stage = ArgsStage::OrderFinalized;
        assert_eq!(args.push_back(arg(2)), Err(IrError::ArgsFinalized { stage: ArgsStage::OrderFinalized }));
        assert!(args.reverse(0, 1).is_err());
        assert_eq!(args.count_args(), 1);
    }

    #[test]
    fn test_lookup() {
        let mut args = CallArgs::new();
        args.push_back(arg(7)).unwrap();
        assert!(args.find_by_node(NodeId(7)).is_some());
        assert!(args.find_by_node(NodeId(8)).is_none());
        assert!(args.arg_by_index(0).is_ok());
        assert_eq!(args.arg_by_index(1).unwrap_err(), IrError::ArgIndexOutOfRange { index: 1, count: 1 });
    }

    #[test]
    fn test_late_roles() {
        assert!(WellKnownArg::VirtualStubCell.is_added_late());
        assert!(WellKnownArg::R2RIndirectionCell.is_added_late());
        assert!(!WellKnownArg::ThisPointer.is_added_late());
        assert!(!WellKnownArg::RetBuffer.is_added_late());
    }
}
