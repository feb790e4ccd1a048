//! IR nodes
//!
//! A node is a common header (operator, type, flags, costs, register,
//! value numbers) plus a `NodeKind` payload whose variant is fixed by the
//! operator's shape. Nodes live in an `IrArena` and are referred to by
//! `NodeId`; they are never copied, only cloned as whole subtrees through
//! the arena.

pub mod kind;

pub use kind::*;
pub use crate::oper::{Shape, SizeClass};

use crate::error::{IrError, IrResult};
use crate::flags::{CallMoreFlags, GenFlags, IndexFlags, IndirFlags, OpFlags};
use crate::oper::{Oper, OperKind};
use crate::types::{RegNum, VarType};
use crate::value_num::{ValueNum, ValueNumKind, ValueNumPair};

/// Index of a node in its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:06}]", self.0)
    }
}

/// Largest value either cost counter saturates at
pub const MAX_COST: u32 = u8::MAX as u32;

/// Execution-time and code-size estimates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Costs {
    pub ex: u8,
    pub sz: u8,
}

impl Costs {
    /// Build from unbounded estimates, saturating each at `MAX_COST`
    pub fn saturating(ex: u32, sz: u32) -> Self {
        Costs { ex: ex.min(MAX_COST) as u8, sz: sz.min(MAX_COST) as u8 }
    }
}

/// Assertion attached to a relop or JTRUE by assertion generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssertionInfo {
    pub index: u16,
    /// Assertion holds on the fall-through edge rather than the jump edge
    pub is_next_edge: bool,
}

/// Result of a use-edge visitor callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    Continue,
    Abort,
}

/// An IR node
#[derive(Debug)]
pub struct Node {
    oper: Oper,
    ty: VarType,
    /// Common flags; the side-effect subset is the composite for the subtree
    flags: GenFlags,
    /// Effects added explicitly on top of what the operator implies
    own_effects: GenFlags,
    costs: Option<Costs>,
    reg: Option<RegNum>,
    vn: ValueNumPair,
    size: SizeClass,
    assertion: Option<AssertionInfo>,
    kind: NodeKind,
}

macro_rules! shape_accessors {
    ($($variant:ident => $as_ref:ident, $as_mut:ident, $payload:ty;)*) => {
        impl Node {
            $(
                pub fn $as_ref(&self) -> IrResult<&$payload> {
                    match &self.kind {
                        NodeKind::$variant(payload) => Ok(payload),
                        _ => Err(self.shape_mismatch(Shape::$variant)),
                    }
                }

                pub fn $as_mut(&mut self) -> IrResult<&mut $payload> {
                    let expected = Shape::$variant;
                    let oper = self.oper;
                    match &mut self.kind {
                        NodeKind::$variant(payload) => Ok(payload),
                        _ => Err(IrError::ShapeMismatch { oper, expected }),
                    }
                }
            )*
        }
    };
}

shape_accessors! {
    IntCon => as_int_con, as_int_con_mut, IntConNode;
    DblCon => as_dbl_con, as_dbl_con_mut, DblConNode;
    StrCon => as_str_con, as_str_con_mut, StrConNode;
    LclVar => as_lcl_var, as_lcl_var_mut, LclVarNode;
    LclFld => as_lcl_fld, as_lcl_fld_mut, LclFldNode;
    PhiArg => as_phi_arg, as_phi_arg_mut, PhiArgNode;
    Op => as_op, as_op_mut, OpNode;
    Cast => as_cast, as_cast_mut, CastNode;
    Box => as_box, as_box_mut, BoxNode;
    Field => as_field, as_field_mut, FieldNode;
    Indir => as_indir, as_indir_mut, IndirNode;
    Blk => as_blk, as_blk_mut, BlkNode;
    StoreDynBlk => as_store_dyn_blk, as_store_dyn_blk_mut, StoreDynBlkNode;
    Select => as_select, as_select_mut, SelectNode;
    Intrinsic => as_intrinsic, as_intrinsic_mut, IntrinsicNode;
    MultiOp => as_multi_op, as_multi_op_mut, MultiOpNode;
    PhysReg => as_phys_reg, as_phys_reg_mut, PhysRegNode;
    Phi => as_phi, as_phi_mut, PhiNode;
    FieldList => as_field_list, as_field_list_mut, FieldListNode;
    ArgPlace => as_arg_place, as_arg_place_mut, ArgPlaceNode;
    Index => as_index, as_index_mut, IndexNode;
    ArrLen => as_arr_len, as_arr_len_mut, ArrLenNode;
    BoundsChk => as_bounds_chk, as_bounds_chk_mut, BoundsChkNode;
    ArrElem => as_arr_elem, as_arr_elem_mut, ArrElemNode;
    ArrOffs => as_arr_offs, as_arr_offs_mut, ArrOffsNode;
    AddrMode => as_addr_mode, as_addr_mode_mut, AddrModeNode;
    CmpXchg => as_cmp_xchg, as_cmp_xchg_mut, CmpXchgNode;
    PutArgStk => as_put_arg_stk, as_put_arg_stk_mut, PutArgStkNode;
    PutArgSplit => as_put_arg_split, as_put_arg_split_mut, PutArgSplitNode;
    CopyOrReload => as_copy_or_reload, as_copy_or_reload_mut, CopyOrReloadNode;
    ClsVar => as_cls_var, as_cls_var_mut, ClsVarNode;
    FptrVal => as_fptr_val, as_fptr_val_mut, FptrValNode;
    AllocObj => as_alloc_obj, as_alloc_obj_mut, AllocObjNode;
    RetExpr => as_ret_expr, as_ret_expr_mut, RetExprNode;
    ILOffset => as_il_offset, as_il_offset_mut, ILOffsetNode;
    Val => as_val, as_val_mut, ValNode;
}

impl Node {
    /// Build a node in the size class its operator needs. The payload must
    /// belong to the operator's shape; the arena builders guarantee this.
    pub(crate) fn new(oper: Oper, ty: VarType, kind: NodeKind) -> Self {
        debug_assert_eq!(oper.shape(), kind.shape());
        Node {
            oper,
            ty,
            flags: GenFlags::empty(),
            own_effects: GenFlags::empty(),
            costs: None,
            reg: None,
            vn: ValueNumPair::default(),
            size: oper.size_class(),
            assertion: None,
            kind,
        }
    }

    /// Field-by-field duplicate used by subtree cloning. Register
    /// assignments are not carried over.
    pub(crate) fn duplicate(&self) -> Self {
        let mut copy = Node {
            oper: self.oper,
            ty: self.ty,
            flags: self.flags,
            own_effects: self.own_effects,
            costs: self.costs,
            reg: None,
            vn: self.vn,
            size: self.size,
            assertion: self.assertion,
            kind: self.kind.clone(),
        };
        copy.clear_other_regs();
        copy
    }

    pub(crate) fn shape_mismatch(&self, expected: Shape) -> IrError {
        IrError::ShapeMismatch { oper: self.oper, expected }
    }

    // ===== Header =====

    pub fn oper(&self) -> Oper {
        self.oper
    }

    pub fn ty(&self) -> VarType {
        self.ty
    }

    pub(crate) fn set_type(&mut self, ty: VarType) {
        self.ty = ty;
    }

    pub fn shape(&self) -> Shape {
        self.kind.shape()
    }

    /// Size class the node was allocated in
    pub fn size_class(&self) -> SizeClass {
        self.size
    }

    pub(crate) fn set_size_class(&mut self, size: SizeClass) {
        self.size = size;
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    pub(crate) fn set_kind(&mut self, kind: NodeKind) {
        self.kind = kind;
    }

    pub(crate) fn set_oper_raw(&mut self, oper: Oper) {
        self.oper = oper;
    }

    // ===== Flags =====

    pub fn flags(&self) -> GenFlags {
        self.flags
    }

    /// Composite side effects of the subtree rooted here
    pub fn effects(&self) -> GenFlags {
        self.flags.effects()
    }

    /// Effects recorded explicitly on this node
    pub fn own_effects(&self) -> GenFlags {
        self.own_effects
    }

    /// Set flags. Effect bits are recorded as effects of this node itself
    /// and survive later effect recomputation.
    pub fn add_flags(&mut self, flags: GenFlags) {
        let effects = flags.effects();
        self.own_effects |= effects;
        self.flags |= flags;
    }

    /// Clear flags. Clearing an effect bit only drops it from this node's
    /// own effects; operands may still contribute it.
    pub fn remove_flags(&mut self, flags: GenFlags) {
        self.own_effects.remove(flags.effects());
        self.flags.remove(flags);
    }

    /// Record effects this node introduces beyond its operator's own
    pub fn add_side_effects(&mut self, effects: GenFlags) {
        self.add_flags(effects.effects());
    }

    pub fn has_flags(&self, flags: GenFlags) -> bool {
        self.flags.contains(flags)
    }

    pub(crate) fn set_effects(&mut self, effects: GenFlags) {
        self.flags = (self.flags & !GenFlags::ALL_EFFECT) | effects.effects();
    }

    pub(crate) fn reset_flags(&mut self, keep: GenFlags) {
        self.flags &= keep;
        self.own_effects &= keep;
    }

    pub fn has_globally_visible_side_effects(&self) -> bool {
        self.flags.has_globally_visible_side_effects()
    }

    pub fn is_reverse_op(&self) -> bool {
        self.flags.contains(GenFlags::REVERSE_OPS)
    }

    pub fn is_contained(&self) -> bool {
        self.flags.contains(GenFlags::CONTAINED)
    }

    pub fn set_contained(&mut self) {
        self.flags |= GenFlags::CONTAINED;
    }

    pub fn clear_contained(&mut self) {
        self.flags.remove(GenFlags::CONTAINED);
    }

    /// Effects this operator introduces on its own, independent of its
    /// operands
    pub fn intrinsic_effects(&self) -> GenFlags {
        match &self.kind {
            NodeKind::LclVar(_) | NodeKind::LclFld(_) if self.oper.is_local_store() => GenFlags::ASG,
            NodeKind::Op(op) => self.op_intrinsic_effects(op.flags),
            NodeKind::Cast(cast) if cast.overflow => GenFlags::EXCEPT,
            NodeKind::Indir(indir) => indir_effects(self.oper, indir.flags),
            NodeKind::Blk(blk) => indir_effects(self.oper, blk.flags),
            NodeKind::StoreDynBlk(blk) => indir_effects(self.oper, blk.flags),
            NodeKind::Call(call) => {
                let mut effects = GenFlags::CALL | GenFlags::GLOB_REF;
                if !call.more_flags.contains(CallMoreFlags::NOTHROW) {
                    effects |= GenFlags::EXCEPT;
                }
                effects
            }
            NodeKind::CmpXchg(_) => GenFlags::ASG | GenFlags::GLOB_REF | GenFlags::EXCEPT,
            NodeKind::ClsVar(_) if self.oper == Oper::ClsVar => GenFlags::GLOB_REF,
            NodeKind::Field(field) if field.is_static() => GenFlags::GLOB_REF,
            NodeKind::Field(_) => GenFlags::GLOB_REF | GenFlags::EXCEPT,
            NodeKind::Index(index) => {
                let mut effects = GenFlags::empty();
                if index.flags.contains(IndexFlags::RNGCHK) {
                    effects |= GenFlags::EXCEPT;
                }
                if self.oper == Oper::Index {
                    effects |= GenFlags::GLOB_REF;
                    if !index.flags.contains(IndexFlags::NOFAULT) {
                        effects |= GenFlags::EXCEPT;
                    }
                }
                effects
            }
            NodeKind::ArrLen(len) if len.nonfaulting => GenFlags::GLOB_REF,
            NodeKind::ArrLen(_) => GenFlags::EXCEPT | GenFlags::GLOB_REF,
            NodeKind::BoundsChk(_) | NodeKind::ArrElem(_) | NodeKind::AllocObj(_) => GenFlags::EXCEPT,
            NodeKind::Leaf => match self.oper {
                Oper::MemoryBarrier => GenFlags::ASG | GenFlags::GLOB_REF,
                Oper::CatchArg => GenFlags::ORDER_SIDEEFF,
                _ => GenFlags::empty(),
            },
            _ => GenFlags::empty(),
        }
    }

    fn op_intrinsic_effects(&self, flags: OpFlags) -> GenFlags {
        match self.oper {
            Oper::Asg => GenFlags::ASG,
            Oper::XAdd | Oper::XChg | Oper::LockAdd => GenFlags::ASG | GenFlags::GLOB_REF | GenFlags::EXCEPT,
            Oper::CkFinite | Oper::LclHeap => GenFlags::EXCEPT,
            Oper::Div | Oper::Mod | Oper::UDiv | Oper::UMod if self.ty.is_integral() => GenFlags::EXCEPT,
            Oper::Add | Oper::Sub | Oper::Mul if flags.contains(OpFlags::OVERFLOW) => GenFlags::EXCEPT,
            _ => GenFlags::empty(),
        }
    }

    // ===== Operator predicates =====

    pub fn oper_is(&self, opers: &[Oper]) -> bool {
        opers.contains(&self.oper)
    }

    pub fn oper_kind(&self) -> OperKind {
        self.oper.kind()
    }

    pub fn oper_is_leaf(&self) -> bool {
        self.oper.is_leaf()
    }

    pub fn oper_is_unary(&self) -> bool {
        self.oper.is_unary()
    }

    pub fn oper_is_binary(&self) -> bool {
        self.oper.is_binary()
    }

    pub fn oper_is_simple(&self) -> bool {
        self.oper.is_simple()
    }

    pub fn oper_is_commutative(&self) -> bool {
        self.oper.is_commutative()
    }

    pub fn oper_is_compare(&self) -> bool {
        self.oper.is_compare()
    }

    pub fn oper_is_const(&self) -> bool {
        self.oper.is_const()
    }

    pub fn oper_is_local(&self) -> bool {
        self.oper.is_local()
    }

    pub fn oper_is_indir(&self) -> bool {
        self.oper.is_indir()
    }

    pub fn oper_is_store(&self) -> bool {
        self.oper.is_store()
    }

    /// Whether the node produces a value its user can consume
    pub fn is_value(&self) -> bool {
        self.oper.is_value_producing() && self.ty != VarType::Void
    }

    /// NOP without an operand, or NO_OP
    pub fn is_nothing_node(&self) -> bool {
        match self.oper {
            Oper::NoOp => true,
            Oper::Nop => matches!(&self.kind, NodeKind::Op(op) if op.op1.is_none()),
            _ => false,
        }
    }

    /// Value of an integer constant that is not a handle
    pub fn icon_value(&self) -> Option<i64> {
        match &self.kind {
            NodeKind::IntCon(icon) if icon.handle.is_none() => Some(icon.value),
            _ => None,
        }
    }

    pub fn is_integral_const(&self, value: i64) -> bool {
        self.icon_value() == Some(value)
    }

    pub fn is_cns_zero(&self) -> bool {
        match &self.kind {
            NodeKind::IntCon(icon) => icon.handle.is_none() && icon.value == 0,
            NodeKind::DblCon(dbl) => dbl.value.to_bits() == 0,
            _ => false,
        }
    }

    /// Whether evaluating the node always yields the same value
    pub fn is_invariant(&self) -> bool {
        self.oper.is_const() || self.oper.is_local_addr() || matches!(self.oper, Oper::FtnAddr | Oper::ClsVarAddr)
    }

    // ===== Operands of simple shapes =====

    /// First operand of op-like payloads, the stored value of local
    /// stores
    pub fn op1(&self) -> Option<NodeId> {
        match &self.kind {
            NodeKind::LclVar(lcl) => lcl.data,
            NodeKind::LclFld(fld) => fld.data,
            kind => kind.op_pair().and_then(|(op1, _)| op1),
        }
    }

    pub fn op2(&self) -> Option<NodeId> {
        self.kind.op_pair().and_then(|(_, op2)| op2)
    }

    // ===== Costs =====

    pub fn costs_computed(&self) -> bool {
        self.costs.is_some()
    }

    /// Record cost estimates, saturating each at `MAX_COST`
    pub fn set_costs(&mut self, ex: u32, sz: u32) {
        self.costs = Some(Costs::saturating(ex, sz));
    }

    pub fn costs(&self) -> IrResult<Costs> {
        self.costs.ok_or(IrError::CostsNotComputed { oper: self.oper })
    }

    pub fn cost_ex(&self) -> IrResult<u8> {
        self.costs().map(|costs| costs.ex)
    }

    pub fn cost_sz(&self) -> IrResult<u8> {
        self.costs().map(|costs| costs.sz)
    }

    pub fn copy_costs(&mut self, costs: Costs) {
        self.costs = Some(costs);
    }

    pub fn clear_costs(&mut self) {
        self.costs = None;
    }

    // ===== Registers =====

    pub fn reg(&self) -> Option<RegNum> {
        self.reg
    }

    pub fn set_reg(&mut self, reg: Option<RegNum>) {
        self.reg = reg;
    }

    pub fn clear_reg(&mut self) {
        self.reg = None;
    }

    // ===== Value numbers =====

    pub fn vn_pair(&self) -> ValueNumPair {
        self.vn
    }

    pub fn vn(&self, kind: ValueNumKind) -> ValueNum {
        self.vn.get(kind)
    }

    pub fn set_vn(&mut self, kind: ValueNumKind, vn: ValueNum) {
        self.vn.set(kind, vn);
    }

    pub fn set_vn_pair(&mut self, pair: ValueNumPair) {
        self.vn = pair;
    }

    pub fn copy_vn_from(&mut self, other: &Node) {
        self.vn = other.vn;
    }

    pub fn clear_vn(&mut self) {
        self.vn.clear();
    }

    // ===== Assertions =====

    pub fn assertion(&self) -> Option<AssertionInfo> {
        self.assertion
    }

    pub fn set_assertion(&mut self, info: AssertionInfo) {
        self.assertion = Some(info);
    }

    pub fn clear_assertion(&mut self) {
        self.assertion = None;
    }

    // ===== Downcasts not covered by the accessor macro =====

    pub fn as_call(&self) -> IrResult<&crate::call::CallNode> {
        match &self.kind {
            NodeKind::Call(call) => Ok(call.as_ref()),
            _ => Err(self.shape_mismatch(Shape::Call)),
        }
    }

    /// Mutable call payload. Argument lists are only reachable through
    /// `IrArena::edit_call_args` and the lowering transitions.
    pub fn as_call_mut(&mut self) -> IrResult<&mut crate::call::CallNode> {
        let oper = self.oper;
        match &mut self.kind {
            NodeKind::Call(call) => Ok(call.as_mut()),
            _ => Err(IrError::ShapeMismatch { oper, expected: Shape::Call }),
        }
    }
}

fn indir_effects(oper: Oper, flags: IndirFlags) -> GenFlags {
    let mut effects = GenFlags::GLOB_REF;
    if !flags.contains(IndirFlags::NONFAULTING) {
        effects |= GenFlags::EXCEPT;
    }
    if oper.is_store() {
        effects |= GenFlags::ASG;
    }
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LclNum;

    fn op(oper: Oper, ty: VarType) -> Node {
        Node::new(oper, ty, NodeKind::Op(OpNode::default()))
    }

    #[test]
    fn test_costs_must_be_computed_first() {
        let mut node = op(Oper::Add, VarType::Int);
        assert_eq!(node.cost_ex(), Err(IrError::CostsNotComputed { oper: Oper::Add }));
        node.set_costs(3, 700);
        assert_eq!(node.cost_ex(), Ok(3));
        assert_eq!(node.cost_sz(), Ok(255));
        node.clear_costs();
        assert!(!node.costs_computed());
    }

    #[test]
    fn test_downcast_is_checked() {
        let mut node = op(Oper::Add, VarType::Int);
        assert!(node.as_op().is_ok());
        assert_eq!(
            node.as_lcl_var().unwrap_err(),
            IrError::ShapeMismatch { oper: Oper::Add, expected: Shape::LclVar }
        );
        assert!(node.as_call_mut().is_err());
    }

    #[test]
    fn test_is_value() {
        assert!(op(Oper::Add, VarType::Int).is_value());
        assert!(!op(Oper::Add, VarType::Void).is_value());
        assert!(!op(Oper::JTrue, VarType::Void).is_value());
        assert!(!op(Oper::Asg, VarType::Int).is_value());
    }

    #[test]
    fn test_explicit_effects_are_own_effects() {
        let mut node = op(Oper::Add, VarType::Int);
        node.add_flags(GenFlags::ORDER_SIDEEFF | GenFlags::DONT_CSE);
        assert_eq!(node.own_effects(), GenFlags::ORDER_SIDEEFF);
        assert!(node.has_flags(GenFlags::DONT_CSE));
        node.remove_flags(GenFlags::ORDER_SIDEEFF);
        assert!(node.own_effects().is_empty());
        assert!(node.effects().is_empty());
    }

    #[test]
    fn test_intrinsic_effects() {
        assert_eq!(op(Oper::Div, VarType::Int).intrinsic_effects(), GenFlags::EXCEPT);
        assert!(op(Oper::Div, VarType::Double).intrinsic_effects().is_empty());
        assert_eq!(op(Oper::Asg, VarType::Int).intrinsic_effects(), GenFlags::ASG);

        let mut overflow = op(Oper::Add, VarType::Int);
        assert!(overflow.intrinsic_effects().is_empty());
        overflow.as_op_mut().unwrap().flags |= OpFlags::OVERFLOW;
        assert_eq!(overflow.intrinsic_effects(), GenFlags::EXCEPT);

        let store = Node::new(
            Oper::StoreLclVar,
            VarType::Int,
            NodeKind::LclVar(LclVarNode { lcl: LclNum(1), ..LclVarNode::default() }),
        );
        assert_eq!(store.intrinsic_effects(), GenFlags::ASG);

        let mut ind = Node::new(Oper::Ind, VarType::Int, NodeKind::Indir(IndirNode::default()));
        assert_eq!(ind.intrinsic_effects(), GenFlags::EXCEPT | GenFlags::GLOB_REF);
        ind.as_indir_mut().unwrap().flags |= IndirFlags::NONFAULTING;
        assert_eq!(ind.intrinsic_effects(), GenFlags::GLOB_REF);
    }

    #[test]
    fn test_value_numbers() {
        let mut node = op(Oper::Add, VarType::Int);
        assert!(node.vn(ValueNumKind::Liberal).is_none());
        node.set_vn_pair(ValueNumPair::both(ValueNum(12)));
        assert_eq!(node.vn(ValueNumKind::Conservative), ValueNum(12));
        node.clear_vn();
        assert_eq!(node.vn_pair(), ValueNumPair::default());
    }

    #[test]
    fn test_nothing_node() {
        assert!(op(Oper::Nop, VarType::Void).is_nothing_node());
        assert!(Node::new(Oper::NoOp, VarType::Void, NodeKind::Leaf).is_nothing_node());
        assert!(!op(Oper::Add, VarType::Int).is_nothing_node());
    }
}
