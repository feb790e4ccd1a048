//! Node construction
//!
//! Every node enters the arena through one of the `new_*` methods below.
//! Each one picks the payload for the operator's shape, checks that the
//! operator is valid in the current phase, that required operands are
//! present and belong to this arena, and computes the node's composite
//! side effects from its operator and operands.

use smallvec::SmallVec;

use crate::arena::IrArena;
use crate::call::{CallNode, CallType, NewCallArg};
use crate::error::{IrError, IrResult};
use crate::fieldseq::FieldSeqId;
use crate::flags::{GenFlags, IconHandleKind};
use crate::multireg::{MAX_RET_REG_COUNT, MAX_SPLIT_REG_COUNT};
use crate::node::*;
use crate::oper::Oper;
use crate::types::{
    BlockId, ClassHandle, FieldHandle, HelperId, LclNum, MethodHandle, ModuleHandle, RegNum, SsaNum, VarType,
};
use crate::verify::sync_lowering;

impl IrArena {
    /// Validate and store a freshly built node
    fn finish(&mut self, mut node: Node) -> IrResult<NodeId> {
        self.check_phase(node.oper())?;
        if matches!(node.ty(), VarType::Undef | VarType::Unknown) {
            return Err(IrError::UnsupportedOperType { oper: node.oper(), ty: node.ty() });
        }
        for slot in node.use_slots() {
            if let Some(operand) = node.operand(slot) {
                if !self.contains(operand) {
                    return Err(IrError::UnknownNode(operand));
                }
            }
        }
        sync_lowering(node.kind_mut(), self.phase());
        let id = self.alloc(node);
        self.refresh_effects(id)?;
        Ok(id)
    }

    fn expect_shape(oper: Oper, shape: Shape, builder: &'static str) -> IrResult<()> {
        if oper.shape() != shape {
            return Err(IrError::WrongBuilder { oper, builder });
        }
        Ok(())
    }

    fn expect_type(oper: Oper, ty: VarType, ok: bool) -> IrResult<()> {
        if !ok {
            return Err(IrError::UnsupportedOperType { oper, ty });
        }
        Ok(())
    }

    // ===== Constants =====

    /// Integer constant of any integral or GC type. `CNS_LNG` is only
    /// produced by `new_lng`.
    pub fn new_icon(&mut self, value: i64, ty: VarType) -> IrResult<NodeId> {
        Self::expect_type(Oper::CnsInt, ty, ty.is_integral() || ty.is_gc())?;
        let kind = NodeKind::IntCon(IntConNode { value, ..IntConNode::default() });
        self.finish(Node::new(Oper::CnsInt, ty, kind))
    }

    /// 64-bit constant on targets where longs are register pairs
    pub fn new_lng(&mut self, value: i64) -> IrResult<NodeId> {
        let kind = NodeKind::IntCon(IntConNode { value, ..IntConNode::default() });
        self.finish(Node::new(Oper::CnsLng, VarType::Long, kind))
    }

    pub fn new_icon_handle(
        &mut self,
        value: i64,
        handle: IconHandleKind,
        field_seq: Option<FieldSeqId>,
    ) -> IrResult<NodeId> {
        let kind = NodeKind::IntCon(IntConNode { value, handle: Some(handle), field_seq, ..IntConNode::default() });
        let id = self.finish(Node::new(Oper::CnsInt, VarType::Long, kind))?;
        if handle.is_mutable_target() {
            // Reading through the handle observes global state.
            self.node_mut(id)?.add_side_effects(GenFlags::GLOB_REF);
            self.refresh_effects(id)?;
        }
        Ok(id)
    }

    pub fn new_dcon(&mut self, value: f64, ty: VarType) -> IrResult<NodeId> {
        Self::expect_type(Oper::CnsDbl, ty, ty.is_floating())?;
        self.finish(Node::new(Oper::CnsDbl, ty, NodeKind::DblCon(DblConNode { value })))
    }

    pub fn new_str(&mut self, token: u32, module: ModuleHandle) -> IrResult<NodeId> {
        self.finish(Node::new(Oper::CnsStr, VarType::Ref, NodeKind::StrCon(StrConNode { token, module })))
    }

    // ===== Locals =====

    pub fn new_lcl_var(&mut self, lcl: LclNum, ty: VarType) -> IrResult<NodeId> {
        Self::expect_type(Oper::LclVar, ty, ty != VarType::Void)?;
        let kind = NodeKind::LclVar(LclVarNode { lcl, ..LclVarNode::default() });
        self.finish(Node::new(Oper::LclVar, ty, kind))
    }

    pub fn new_lcl_var_addr(&mut self, lcl: LclNum) -> IrResult<NodeId> {
        let kind = NodeKind::LclVar(LclVarNode { lcl, ..LclVarNode::default() });
        self.finish(Node::new(Oper::LclVarAddr, VarType::ByRef, kind))
    }

    /// Store `value` to a whole local; the node takes the value's type
    pub fn new_store_lcl_var(&mut self, lcl: LclNum, value: NodeId) -> IrResult<NodeId> {
        let ty = self.node(value)?.ty();
        let kind = NodeKind::LclVar(LclVarNode { lcl, data: Some(value), ..LclVarNode::default() });
        self.finish(Node::new(Oper::StoreLclVar, ty, kind))
    }

    pub fn new_lcl_fld(&mut self, lcl: LclNum, ty: VarType, offset: u16) -> IrResult<NodeId> {
        Self::expect_type(Oper::LclFld, ty, ty != VarType::Void)?;
        let kind = NodeKind::LclFld(LclFldNode { lcl, offset, ..LclFldNode::default() });
        self.finish(Node::new(Oper::LclFld, ty, kind))
    }

    pub fn new_lcl_fld_addr(&mut self, lcl: LclNum, offset: u16) -> IrResult<NodeId> {
        let kind = NodeKind::LclFld(LclFldNode { lcl, offset, ..LclFldNode::default() });
        self.finish(Node::new(Oper::LclFldAddr, VarType::ByRef, kind))
    }

    pub fn new_store_lcl_fld(&mut self, lcl: LclNum, ty: VarType, offset: u16, value: NodeId) -> IrResult<NodeId> {
        self.node(value)?;
        let kind = NodeKind::LclFld(LclFldNode { lcl, offset, data: Some(value), ..LclFldNode::default() });
        self.finish(Node::new(Oper::StoreLclFld, ty, kind))
    }

    pub fn new_phi_arg(&mut self, ty: VarType, lcl: LclNum, ssa: SsaNum, pred: BlockId) -> IrResult<NodeId> {
        self.finish(Node::new(Oper::PhiArg, ty, NodeKind::PhiArg(PhiArgNode { lcl, ssa, pred })))
    }

    pub fn new_phi(&mut self, ty: VarType, args: &[NodeId]) -> IrResult<NodeId> {
        for arg in args {
            let node = self.node(*arg)?;
            if node.oper() != Oper::PhiArg {
                return Err(node.shape_mismatch(Shape::PhiArg));
            }
        }
        self.finish(Node::new(Oper::Phi, ty, NodeKind::Phi(PhiNode { uses: args.to_vec() })))
    }

    // ===== Generic operators =====

    /// Leaf operator without a payload (`CATCH_ARG`, `MEMORYBARRIER`, ...)
    pub fn new_leaf(&mut self, oper: Oper, ty: VarType) -> IrResult<NodeId> {
        Self::expect_shape(oper, Shape::Leaf, "new_leaf")?;
        self.finish(Node::new(oper, ty, NodeKind::Leaf))
    }

    /// Generic unary or binary operator
    pub fn new_oper(&mut self, oper: Oper, ty: VarType, op1: Option<NodeId>, op2: Option<NodeId>) -> IrResult<NodeId> {
        Self::expect_shape(oper, Shape::Op, "new_oper")?;
        if op1.is_none() && !oper.null_op1_legal(ty) {
            return Err(IrError::MissingOperand { oper, position: 1 });
        }
        if op2.is_some() && !oper.is_binary() {
            return Err(IrError::UnexpectedOperand { oper, position: 2 });
        }
        if op2.is_none() && !oper.null_op2_legal() {
            return Err(IrError::MissingOperand { oper, position: 2 });
        }
        Self::expect_type(oper, ty, oper_type_ok(oper, ty))?;
        self.finish(Node::new(oper, ty, NodeKind::Op(OpNode { op1, op2, ..OpNode::default() })))
    }

    pub fn new_unop(&mut self, oper: Oper, ty: VarType, op1: NodeId) -> IrResult<NodeId> {
        self.new_oper(oper, ty, Some(op1), None)
    }

    pub fn new_binop(&mut self, oper: Oper, ty: VarType, op1: NodeId, op2: NodeId) -> IrResult<NodeId> {
        self.new_oper(oper, ty, Some(op1), Some(op2))
    }

    pub fn new_assign(&mut self, dst: NodeId, src: NodeId) -> IrResult<NodeId> {
        let ty = self.node(dst)?.ty();
        let id = self.new_binop(Oper::Asg, ty, dst, src)?;
        match self.node_mut(dst)?.kind_mut() {
            NodeKind::Indir(indir) => indir.lowering = IndirLowering::Hir { asg_lhs: true },
            NodeKind::Blk(blk) => blk.lowering = IndirLowering::Hir { asg_lhs: true },
            _ => {}
        }
        Ok(id)
    }

    /// `cond ? then_val : else_val` as `QMARK(cond, COLON(then_val, else_val))`
    pub fn new_qmark(&mut self, ty: VarType, cond: NodeId, then_val: NodeId, else_val: NodeId) -> IrResult<NodeId> {
        let colon = self.new_binop(Oper::Colon, ty, then_val, else_val)?;
        let qmark = self.new_binop(Oper::Qmark, ty, cond, colon)?;
        for arm in [then_val, else_val] {
            self.node_mut(arm)?.add_flags(GenFlags::COLON_COND);
        }
        Ok(qmark)
    }

    pub fn new_cast(&mut self, op1: NodeId, cast_to: VarType, overflow: bool) -> IrResult<NodeId> {
        Self::expect_type(Oper::Cast, cast_to, cast_to.is_arith())?;
        let kind = NodeKind::Cast(CastNode { op1: Some(op1), cast_to, overflow });
        self.finish(Node::new(Oper::Cast, cast_to.actual_type(), kind))
    }

    pub fn new_box(&mut self, op1: NodeId, class: ClassHandle) -> IrResult<NodeId> {
        self.finish(Node::new(Oper::Box, VarType::Ref, NodeKind::Box(BoxNode { op1: Some(op1), class })))
    }

    pub fn new_intrinsic(
        &mut self,
        ty: VarType,
        id: IntrinsicId,
        method: MethodHandle,
        op1: NodeId,
        op2: Option<NodeId>,
    ) -> IrResult<NodeId> {
        let kind = NodeKind::Intrinsic(IntrinsicNode { op1: Some(op1), op2, id, method });
        self.finish(Node::new(Oper::Intrinsic, ty, kind))
    }

    /// `SIMD` or `HWINTRINSIC` over any number of operands
    pub fn new_multi_op(
        &mut self,
        oper: Oper,
        ty: VarType,
        intrinsic: IntrinsicId,
        base_type: VarType,
        simd_size: u8,
        operands: &[NodeId],
    ) -> IrResult<NodeId> {
        Self::expect_shape(oper, Shape::MultiOp, "new_multi_op")?;
        let kind = NodeKind::MultiOp(MultiOpNode {
            operands: SmallVec::from_slice(operands),
            intrinsic,
            base_type,
            simd_size,
        });
        self.finish(Node::new(oper, ty, kind))
    }

    pub fn new_select(&mut self, ty: VarType, cond: NodeId, then_val: NodeId, else_val: NodeId) -> IrResult<NodeId> {
        self.finish(Node::new(Oper::Select, ty, NodeKind::Select(SelectNode { cond, then_val, else_val })))
    }

    pub fn new_cmpxchg(&mut self, ty: VarType, location: NodeId, value: NodeId, comparand: NodeId) -> IrResult<NodeId> {
        Self::expect_type(Oper::CmpXchg, ty, ty.is_integral() || ty.is_gc())?;
        let kind = NodeKind::CmpXchg(CmpXchgNode { location, value, comparand });
        self.finish(Node::new(Oper::CmpXchg, ty, kind))
    }

    // ===== Memory =====

    pub fn new_indir(&mut self, ty: VarType, addr: NodeId) -> IrResult<NodeId> {
        let kind = NodeKind::Indir(IndirNode { addr: Some(addr), ..IndirNode::default() });
        self.finish(Node::new(Oper::Ind, ty, kind))
    }

    pub fn new_null_check(&mut self, addr: NodeId) -> IrResult<NodeId> {
        let kind = NodeKind::Indir(IndirNode { addr: Some(addr), ..IndirNode::default() });
        self.finish(Node::new(Oper::NullCheck, VarType::Byte, kind))
    }

    /// `STOREIND`; only valid in LIR, HIR stores are `ASG(IND, value)`
    pub fn new_store_ind(&mut self, ty: VarType, addr: NodeId, data: NodeId) -> IrResult<NodeId> {
        let kind = NodeKind::Indir(IndirNode { addr: Some(addr), data: Some(data), ..IndirNode::default() });
        self.finish(Node::new(Oper::StoreInd, ty, kind))
    }

    pub fn new_blk(&mut self, addr: NodeId, size: u32) -> IrResult<NodeId> {
        let kind = NodeKind::Blk(BlkNode { addr: Some(addr), size, ..BlkNode::default() });
        self.finish(Node::new(Oper::Blk, VarType::Blk, kind))
    }

    pub fn new_obj(&mut self, addr: NodeId, class: ClassHandle, size: u32) -> IrResult<NodeId> {
        let kind = NodeKind::Blk(BlkNode { addr: Some(addr), size, layout: Some(class), ..BlkNode::default() });
        self.finish(Node::new(Oper::Obj, VarType::Struct, kind))
    }

    /// `STORE_BLK`, or `STORE_OBJ` when a class layout is given
    pub fn new_store_blk(
        &mut self,
        addr: NodeId,
        data: NodeId,
        size: u32,
        layout: Option<ClassHandle>,
    ) -> IrResult<NodeId> {
        let (oper, ty) = match layout {
            Some(_) => (Oper::StoreObj, VarType::Struct),
            None => (Oper::StoreBlk, VarType::Blk),
        };
        let kind = NodeKind::Blk(BlkNode { addr: Some(addr), data: Some(data), size, layout, ..BlkNode::default() });
        self.finish(Node::new(oper, ty, kind))
    }

    pub fn new_store_dyn_blk(
        &mut self,
        addr: NodeId,
        data: NodeId,
        size: NodeId,
        eval_size_first: bool,
    ) -> IrResult<NodeId> {
        let kind = NodeKind::StoreDynBlk(StoreDynBlkNode {
            addr,
            data,
            size,
            flags: Default::default(),
            eval_size_first,
        });
        self.finish(Node::new(Oper::StoreDynBlk, VarType::Void, kind))
    }

    /// Instance field of `obj`, or a static field when `obj` is absent
    pub fn new_field(&mut self, ty: VarType, obj: Option<NodeId>, field: FieldHandle, offset: u32) -> IrResult<NodeId> {
        let kind = NodeKind::Field(FieldNode { obj, field, offset, ..FieldNode::default() });
        self.finish(Node::new(Oper::Field, ty, kind))
    }

    pub fn new_cls_var(&mut self, ty: VarType, field: FieldHandle, field_seq: Option<FieldSeqId>) -> IrResult<NodeId> {
        let kind = NodeKind::ClsVar(ClsVarNode { field, field_seq, ..ClsVarNode::default() });
        self.finish(Node::new(Oper::ClsVar, ty, kind))
    }

    pub fn new_cls_var_addr(&mut self, field: FieldHandle) -> IrResult<NodeId> {
        let kind = NodeKind::ClsVar(ClsVarNode { field, ..ClsVarNode::default() });
        self.finish(Node::new(Oper::ClsVarAddr, VarType::ByRef, kind))
    }

    pub fn new_lea(&mut self, ty: VarType, base: Option<NodeId>, index: Option<NodeId>, scale: u8, offset: i32) -> IrResult<NodeId> {
        if !matches!(scale, 1 | 2 | 4 | 8) {
            return Err(IrError::UnsupportedOperType { oper: Oper::Lea, ty });
        }
        let kind = NodeKind::AddrMode(AddrModeNode { base, index, scale, offset });
        self.finish(Node::new(Oper::Lea, ty, kind))
    }

    // ===== Arrays =====

    /// Range-checked array element read
    pub fn new_index(&mut self, elem_type: VarType, arr: NodeId, index: NodeId, elem_size: u32) -> IrResult<NodeId> {
        let kind = NodeKind::Index(IndexNode {
            arr: Some(arr),
            index: Some(index),
            elem_type,
            elem_size,
            ..IndexNode::default()
        });
        self.finish(Node::new(Oper::Index, elem_type, kind))
    }

    /// Range-checked array element address
    pub fn new_index_addr(&mut self, arr: NodeId, index: NodeId, elem_type: VarType, elem_size: u32) -> IrResult<NodeId> {
        let kind = NodeKind::Index(IndexNode {
            arr: Some(arr),
            index: Some(index),
            elem_type,
            elem_size,
            ..IndexNode::default()
        });
        self.finish(Node::new(Oper::IndexAddr, VarType::ByRef, kind))
    }

    pub fn new_arr_len(&mut self, array: NodeId, len_offset: u8) -> IrResult<NodeId> {
        let kind = NodeKind::ArrLen(ArrLenNode { array: Some(array), len_offset, nonfaulting: false });
        self.finish(Node::new(Oper::ArrLength, VarType::Int, kind))
    }

    pub fn new_bounds_check(&mut self, index: NodeId, length: NodeId, throw_kind: ThrowKind) -> IrResult<NodeId> {
        let kind = NodeKind::BoundsChk(BoundsChkNode { index: Some(index), length: Some(length), throw_kind });
        self.finish(Node::new(Oper::BoundsCheck, VarType::Void, kind))
    }

    pub fn new_arr_elem(&mut self, arr: NodeId, indices: &[NodeId], elem_type: VarType, elem_size: u32) -> IrResult<NodeId> {
        if indices.is_empty() {
            return Err(IrError::MissingOperand { oper: Oper::ArrElem, position: 2 });
        }
        let kind = NodeKind::ArrElem(ArrElemNode { arr, indices: indices.to_vec(), elem_size, elem_type });
        self.finish(Node::new(Oper::ArrElem, VarType::ByRef, kind))
    }

    pub fn new_arr_offset(
        &mut self,
        offset: NodeId,
        index: NodeId,
        arr: NodeId,
        dim: u8,
        rank: u8,
        elem_size: u32,
    ) -> IrResult<NodeId> {
        let kind = NodeKind::ArrOffs(ArrOffsNode { offset, index, arr, dim, rank, elem_size });
        self.finish(Node::new(Oper::ArrOffset, VarType::Long, kind))
    }

    // ===== Outgoing arguments and registers =====

    pub fn new_field_list(&mut self) -> IrResult<NodeId> {
        self.finish(Node::new(Oper::FieldList, VarType::Struct, NodeKind::FieldList(FieldListNode::default())))
    }

    /// Append a use to a `FIELD_LIST`
    pub fn field_list_add(&mut self, list: NodeId, node: NodeId, offset: u16, ty: VarType) -> IrResult<()> {
        self.node(node)?;
        self.node_mut(list)?.as_field_list_mut()?.uses.push(FieldListUse { node, offset, ty });
        self.refresh_effects(list)
    }

    pub fn new_arg_place(&mut self, ty: VarType, class: Option<ClassHandle>) -> IrResult<NodeId> {
        self.finish(Node::new(Oper::ArgPlace, ty, NodeKind::ArgPlace(ArgPlaceNode { class })))
    }

    pub fn new_put_arg_stk(&mut self, value: NodeId, byte_offset: u32, byte_size: u32) -> IrResult<NodeId> {
        let kind = NodeKind::PutArgStk(PutArgStkNode {
            op1: Some(value),
            byte_offset,
            byte_size,
            ..PutArgStkNode::default()
        });
        self.finish(Node::new(Oper::PutArgStk, VarType::Void, kind))
    }

    /// Struct passed in `reg_types.len()` registers plus `byte_size`
    /// bytes of stack
    pub fn new_put_arg_split(
        &mut self,
        value: NodeId,
        byte_offset: u32,
        byte_size: u32,
        reg_types: &[VarType],
    ) -> IrResult<NodeId> {
        if reg_types.len() > MAX_SPLIT_REG_COUNT {
            return Err(IrError::RegIndexOutOfRange {
                oper: Oper::PutArgSplit,
                index: reg_types.len() - 1,
                capacity: MAX_SPLIT_REG_COUNT,
            });
        }
        let ty = self.node(value)?.ty();
        let mut payload = PutArgSplitNode { op1: Some(value), byte_offset, byte_size, ..PutArgSplitNode::default() };
        payload.reg_types[..reg_types.len()].copy_from_slice(reg_types);
        payload.num_regs = reg_types.len() as u8;
        self.finish(Node::new(Oper::PutArgSplit, ty, NodeKind::PutArgSplit(payload)))
    }

    /// `COPY` or `RELOAD` of a value living in `reg_count` registers
    pub fn new_copy_or_reload(&mut self, oper: Oper, ty: VarType, op1: NodeId, reg_count: usize) -> IrResult<NodeId> {
        Self::expect_shape(oper, Shape::CopyOrReload, "new_copy_or_reload")?;
        if reg_count == 0 || reg_count > MAX_RET_REG_COUNT {
            return Err(IrError::RegIndexOutOfRange { oper, index: reg_count, capacity: MAX_RET_REG_COUNT });
        }
        let kind = NodeKind::CopyOrReload(CopyOrReloadNode {
            op1: Some(op1),
            reg_count: reg_count as u8,
            ..CopyOrReloadNode::default()
        });
        self.finish(Node::new(oper, ty, kind))
    }

    pub fn new_phys_reg(&mut self, reg: RegNum, ty: VarType) -> IrResult<NodeId> {
        self.finish(Node::new(Oper::PhysReg, ty, NodeKind::PhysReg(PhysRegNode { reg })))
    }

    // ===== Miscellaneous leaves =====

    pub fn new_ftn_addr(&mut self, method: MethodHandle) -> IrResult<NodeId> {
        self.finish(Node::new(Oper::FtnAddr, VarType::Long, NodeKind::FptrVal(FptrValNode { method })))
    }

    pub fn new_alloc_obj(&mut self, helper: HelperId, class: ClassHandle, op1: NodeId) -> IrResult<NodeId> {
        let kind = NodeKind::AllocObj(AllocObjNode { op1: Some(op1), helper, class });
        self.finish(Node::new(Oper::AllocObj, VarType::Ref, kind))
    }

    /// Placeholder for the value an inline candidate returns
    pub fn new_ret_expr(&mut self, ty: VarType, inline_candidate: NodeId) -> IrResult<NodeId> {
        self.node(inline_candidate)?.as_call()?;
        self.finish(Node::new(Oper::RetExpr, ty, NodeKind::RetExpr(RetExprNode { inline_candidate })))
    }

    pub fn new_il_offset(&mut self, il_offset: u32) -> IrResult<NodeId> {
        self.finish(Node::new(Oper::ILOffset, VarType::Void, NodeKind::ILOffset(ILOffsetNode { il_offset })))
    }

    /// `JMP` or `END_LFIN`
    pub fn new_val(&mut self, oper: Oper, value: u64) -> IrResult<NodeId> {
        Self::expect_shape(oper, Shape::Val, "new_val")?;
        self.finish(Node::new(oper, VarType::Void, NodeKind::Val(ValNode { value })))
    }

    // ===== Calls =====

    fn new_call(&mut self, call_type: CallType, ty: VarType, args: Vec<NewCallArg>) -> IrResult<NodeId> {
        let mut call = CallNode::new(call_type, ty);
        for arg in args {
            self.node(arg.node)?;
            call.args_mut().push_back(arg)?;
        }
        self.finish(Node::new(Oper::Call, ty, NodeKind::Call(Box::new(call))))
    }

    pub fn new_call_user(&mut self, method: MethodHandle, ty: VarType, args: Vec<NewCallArg>) -> IrResult<NodeId> {
        self.new_call(CallType::UserFunc { method }, ty, args)
    }

    pub fn new_helper_call(&mut self, helper: HelperId, ty: VarType, args: Vec<NewCallArg>) -> IrResult<NodeId> {
        self.new_call(CallType::Helper { helper }, ty, args)
    }

    /// Call through a computed target, with an optional unmanaged cookie
    pub fn new_indirect_call(
        &mut self,
        addr: NodeId,
        cookie: Option<NodeId>,
        ty: VarType,
        args: Vec<NewCallArg>,
    ) -> IrResult<NodeId> {
        self.new_call(CallType::Indirect { addr, cookie }, ty, args)
    }
}

/// Result types a generic operator accepts
fn oper_type_ok(oper: Oper, ty: VarType) -> bool {
    if oper.is_compare() {
        return ty.is_integral();
    }
    if oper.is_shift_or_rotate() || matches!(oper, Oper::Not | Oper::Bswap | Oper::Bswap16 | Oper::Or | Oper::Xor | Oper::And) {
        return ty.is_integral() || ty.is_simd();
    }
    if oper.is_arithmetic() || oper == Oper::Neg {
        return ty.is_arith() || ty.is_simd();
    }
    if oper == Oper::CkFinite {
        return ty.is_floating();
    }
    true
}
