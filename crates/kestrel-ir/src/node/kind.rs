//! Shape payloads
//!
//! One payload type per `Shape`. Operand slots are crate-visible only:
//! changing an operand has to go through `IrArena` so the parent's
//! composite side effects are refreshed. Everything else is plain data.

use smallvec::SmallVec;

use super::NodeId;
use crate::call::CallNode;
use crate::fieldseq::FieldSeqId;
use crate::flags::{FieldFlags, IconFlags, IconHandleKind, IndexFlags, IndirFlags, LclVarFlags, OpFlags};
use crate::multireg::{MultiRegs, MAX_MULTIREG_COUNT, MAX_RET_REG_COUNT, MAX_SPLIT_REG_COUNT};
use crate::oper::Shape;
use crate::types::{BlockId, ClassHandle, FieldHandle, HelperId, LclNum, MethodHandle, ModuleHandle, RegNum, SsaNum, VarType};

/// Named intrinsic or hardware intrinsic identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IntrinsicId(pub u16);

/// Variant payload of a node
#[derive(Debug, Clone)]
pub enum NodeKind {
    Leaf,
    IntCon(IntConNode),
    DblCon(DblConNode),
    StrCon(StrConNode),
    LclVar(LclVarNode),
    LclFld(LclFldNode),
    PhiArg(PhiArgNode),
    Op(OpNode),
    Cast(CastNode),
    Box(BoxNode),
    Field(FieldNode),
    Indir(IndirNode),
    Blk(BlkNode),
    StoreDynBlk(StoreDynBlkNode),
    Select(SelectNode),
    Intrinsic(IntrinsicNode),
    MultiOp(MultiOpNode),
    Call(Box<CallNode>),
    PhysReg(PhysRegNode),
    Phi(PhiNode),
    FieldList(FieldListNode),
    ArgPlace(ArgPlaceNode),
    Index(IndexNode),
    ArrLen(ArrLenNode),
    BoundsChk(BoundsChkNode),
    ArrElem(ArrElemNode),
    ArrOffs(ArrOffsNode),
    AddrMode(AddrModeNode),
    CmpXchg(CmpXchgNode),
    PutArgStk(PutArgStkNode),
    PutArgSplit(PutArgSplitNode),
    CopyOrReload(CopyOrReloadNode),
    ClsVar(ClsVarNode),
    FptrVal(FptrValNode),
    AllocObj(AllocObjNode),
    RetExpr(RetExprNode),
    ILOffset(ILOffsetNode),
    Val(ValNode),
}

impl NodeKind {
    pub fn shape(&self) -> Shape {
        match self {
            NodeKind::Leaf => Shape::Leaf,
            NodeKind::IntCon(_) => Shape::IntCon,
            NodeKind::DblCon(_) => Shape::DblCon,
            NodeKind::StrCon(_) => Shape::StrCon,
            NodeKind::LclVar(_) => Shape::LclVar,
            NodeKind::LclFld(_) => Shape::LclFld,
            NodeKind::PhiArg(_) => Shape::PhiArg,
            NodeKind::Op(_) => Shape::Op,
            NodeKind::Cast(_) => Shape::Cast,
            NodeKind::Box(_) => Shape::Box,
            NodeKind::Field(_) => Shape::Field,
            NodeKind::Indir(_) => Shape::Indir,
            NodeKind::Blk(_) => Shape::Blk,
            NodeKind::StoreDynBlk(_) => Shape::StoreDynBlk,
            NodeKind::Select(_) => Shape::Select,
            NodeKind::Intrinsic(_) => Shape::Intrinsic,
            NodeKind::MultiOp(_) => Shape::MultiOp,
            NodeKind::Call(_) => Shape::Call,
            NodeKind::PhysReg(_) => Shape::PhysReg,
            NodeKind::Phi(_) => Shape::Phi,
            NodeKind::FieldList(_) => Shape::FieldList,
            NodeKind::ArgPlace(_) => Shape::ArgPlace,
            NodeKind::Index(_) => Shape::Index,
            NodeKind::ArrLen(_) => Shape::ArrLen,
            NodeKind::BoundsChk(_) => Shape::BoundsChk,
            NodeKind::ArrElem(_) => Shape::ArrElem,
            NodeKind::ArrOffs(_) => Shape::ArrOffs,
            NodeKind::AddrMode(_) => Shape::AddrMode,
            NodeKind::CmpXchg(_) => Shape::CmpXchg,
            NodeKind::PutArgStk(_) => Shape::PutArgStk,
            NodeKind::PutArgSplit(_) => Shape::PutArgSplit,
            NodeKind::CopyOrReload(_) => Shape::CopyOrReload,
            NodeKind::ClsVar(_) => Shape::ClsVar,
            NodeKind::FptrVal(_) => Shape::FptrVal,
            NodeKind::AllocObj(_) => Shape::AllocObj,
            NodeKind::RetExpr(_) => Shape::RetExpr,
            NodeKind::ILOffset(_) => Shape::ILOffset,
            NodeKind::Val(_) => Shape::Val,
        }
    }

    /// Operand pair of an op-like payload
    pub(crate) fn op_pair(&self) -> Option<(Option<NodeId>, Option<NodeId>)> {
        Some(match self {
            NodeKind::Op(n) => (n.op1, n.op2),
            NodeKind::Cast(n) => (n.op1, None),
            NodeKind::Box(n) => (n.op1, None),
            NodeKind::Field(n) => (n.obj, None),
            NodeKind::Indir(n) => (n.addr, n.data),
            NodeKind::Blk(n) => (n.addr, n.data),
            NodeKind::Intrinsic(n) => (n.op1, n.op2),
            NodeKind::Index(n) => (n.arr, n.index),
            NodeKind::ArrLen(n) => (n.array, None),
            NodeKind::BoundsChk(n) => (n.index, n.length),
            NodeKind::AddrMode(n) => (n.base, n.index),
            NodeKind::PutArgStk(n) => (n.op1, None),
            NodeKind::PutArgSplit(n) => (n.op1, None),
            NodeKind::CopyOrReload(n) => (n.op1, None),
            NodeKind::AllocObj(n) => (n.op1, None),
            _ => return None,
        })
    }

    /// Fresh payload for `shape`, carrying `op1`/`op2` into op-like
    /// payloads. Returns `None` for shapes that cannot be produced by
    /// re-bashing an existing node.
    pub(crate) fn rebash(shape: Shape, op1: Option<NodeId>, op2: Option<NodeId>) -> Option<NodeKind> {
        Some(match shape {
            Shape::Leaf => NodeKind::Leaf,
            Shape::LclVar => NodeKind::LclVar(LclVarNode::default()),
            Shape::LclFld => NodeKind::LclFld(LclFldNode::default()),
            Shape::PhysReg => NodeKind::PhysReg(PhysRegNode::default()),
            Shape::ArgPlace => NodeKind::ArgPlace(ArgPlaceNode::default()),
            Shape::ClsVar => NodeKind::ClsVar(ClsVarNode::default()),
            Shape::FptrVal => NodeKind::FptrVal(FptrValNode::default()),
            Shape::ILOffset => NodeKind::ILOffset(ILOffsetNode::default()),
            Shape::Val => NodeKind::Val(ValNode::default()),
            Shape::Field => NodeKind::Field(FieldNode { obj: op1, ..FieldNode::default() }),
            Shape::Op => NodeKind::Op(OpNode { op1, op2, flags: OpFlags::empty() }),
            Shape::Cast => NodeKind::Cast(CastNode { op1, ..CastNode::default() }),
            Shape::Box => NodeKind::Box(BoxNode { op1, ..BoxNode::default() }),
            Shape::Indir => NodeKind::Indir(IndirNode { addr: op1, data: op2, ..IndirNode::default() }),
            Shape::Blk => NodeKind::Blk(BlkNode { addr: op1, data: op2, ..BlkNode::default() }),
            Shape::Intrinsic => NodeKind::Intrinsic(IntrinsicNode { op1, op2, ..IntrinsicNode::default() }),
            Shape::Index => NodeKind::Index(IndexNode { arr: op1, index: op2, ..IndexNode::default() }),
            Shape::ArrLen => NodeKind::ArrLen(ArrLenNode { array: op1, ..ArrLenNode::default() }),
            Shape::BoundsChk => {
                NodeKind::BoundsChk(BoundsChkNode { index: op1, length: op2, ..BoundsChkNode::default() })
            }
            Shape::AddrMode => NodeKind::AddrMode(AddrModeNode { base: op1, index: op2, ..AddrModeNode::default() }),
            Shape::PutArgStk => NodeKind::PutArgStk(PutArgStkNode { op1, ..PutArgStkNode::default() }),
            Shape::PutArgSplit => NodeKind::PutArgSplit(PutArgSplitNode { op1, ..PutArgSplitNode::default() }),
            Shape::CopyOrReload => {
                NodeKind::CopyOrReload(CopyOrReloadNode { op1, ..CopyOrReloadNode::default() })
            }
            Shape::AllocObj => NodeKind::AllocObj(AllocObjNode { op1, ..AllocObjNode::default() }),
            Shape::IntCon
            | Shape::DblCon
            | Shape::StrCon
            | Shape::PhiArg
            | Shape::StoreDynBlk
            | Shape::Select
            | Shape::MultiOp
            | Shape::Call
            | Shape::Phi
            | Shape::FieldList
            | Shape::ArrElem
            | Shape::ArrOffs
            | Shape::CmpXchg
            | Shape::RetExpr => return None,
        })
    }
}

impl NodeKind {
    /// Clear the operator-specific flags of the payload. An indirection
    /// keeps its non-faulting bit when `keep_nonfaulting` is set.
    pub(crate) fn clear_oper_flags(&mut self, keep_nonfaulting: bool) {
        let keep = if keep_nonfaulting { IndirFlags::NONFAULTING } else { IndirFlags::empty() };
        match self {
            NodeKind::IntCon(n) => n.flags = IconFlags::empty(),
            NodeKind::LclVar(n) => {
                n.clear_multi_reg();
                n.flags = LclVarFlags::empty();
            }
            NodeKind::LclFld(n) => n.flags = LclVarFlags::empty(),
            NodeKind::Op(n) => n.flags = OpFlags::empty(),
            NodeKind::Field(n) => n.flags = FieldFlags::empty(),
            NodeKind::ClsVar(n) => n.flags = FieldFlags::empty(),
            NodeKind::Indir(n) => n.flags &= keep,
            NodeKind::Blk(n) => n.flags &= keep,
            NodeKind::StoreDynBlk(n) => n.flags &= keep,
            NodeKind::ArrLen(n) => n.nonfaulting &= keep_nonfaulting,
            NodeKind::Index(n) => n.flags = IndexFlags::empty(),
            NodeKind::Cast(n) => n.overflow = false,
            _ => {}
        }
    }
}

// ===== Constants =====

/// CNS_INT / CNS_LNG
#[derive(Debug, Clone, Default)]
pub struct IntConNode {
    pub value: i64,
    /// Set when the constant is a runtime handle
    pub handle: Option<IconHandleKind>,
    pub flags: IconFlags,
    /// Fields this constant offset selects
    pub field_seq: Option<FieldSeqId>,
}

/// CNS_DBL
#[derive(Debug, Clone, Default)]
pub struct DblConNode {
    pub value: f64,
}

/// CNS_STR
#[derive(Debug, Clone, Default)]
pub struct StrConNode {
    pub token: u32,
    pub module: ModuleHandle,
}

// ===== Locals =====

/// LCL_VAR, STORE_LCL_VAR, LCL_VAR_ADDR
#[derive(Debug, Clone, Default)]
pub struct LclVarNode {
    pub lcl: LclNum,
    pub ssa: SsaNum,
    pub flags: LclVarFlags,
    pub(crate) data: Option<NodeId>,
    /// Promoted field count while the node is multi-register
    pub(crate) field_count: u8,
    pub(crate) regs: MultiRegs<{ MAX_MULTIREG_COUNT - 1 }>,
}

impl LclVarNode {
    /// Stored value (STORE_LCL_VAR only)
    pub fn data(&self) -> Option<NodeId> {
        self.data
    }

    pub fn is_multi_reg(&self) -> bool {
        self.flags.contains(LclVarFlags::MULTIREG)
    }
}

/// LCL_FLD, STORE_LCL_FLD, LCL_FLD_ADDR
#[derive(Debug, Clone, Default)]
pub struct LclFldNode {
    pub lcl: LclNum,
    pub ssa: SsaNum,
    pub flags: LclVarFlags,
    pub offset: u16,
    pub field_seq: Option<FieldSeqId>,
    pub layout: Option<ClassHandle>,
    pub(crate) data: Option<NodeId>,
}

impl LclFldNode {
    pub fn data(&self) -> Option<NodeId> {
        self.data
    }
}

/// PHI_ARG
#[derive(Debug, Clone)]
pub struct PhiArgNode {
    pub lcl: LclNum,
    pub ssa: SsaNum,
    /// Predecessor the value flows in from; not owned
    pub pred: BlockId,
}

// ===== Generic operators =====

/// Generic unary and binary operators
#[derive(Debug, Clone, Default)]
pub struct OpNode {
    pub(crate) op1: Option<NodeId>,
    pub(crate) op2: Option<NodeId>,
    pub(crate) flags: OpFlags,
}

impl OpNode {
    pub fn op1(&self) -> Option<NodeId> {
        self.op1
    }

    pub fn op2(&self) -> Option<NodeId> {
        self.op2
    }

    pub fn flags(&self) -> OpFlags {
        self.flags
    }

    pub fn is_overflow(&self) -> bool {
        self.flags.contains(OpFlags::OVERFLOW)
    }
}

/// CAST
#[derive(Debug, Clone)]
pub struct CastNode {
    pub(crate) op1: Option<NodeId>,
    pub cast_to: VarType,
    /// Overflow-checked conversion
    pub(crate) overflow: bool,
}

impl Default for CastNode {
    fn default() -> Self {
        CastNode { op1: None, cast_to: VarType::Int, overflow: false }
    }
}

impl CastNode {
    pub fn op1(&self) -> Option<NodeId> {
        self.op1
    }

    pub fn is_overflow(&self) -> bool {
        self.overflow
    }
}

/// BOX
#[derive(Debug, Clone, Default)]
pub struct BoxNode {
    pub(crate) op1: Option<NodeId>,
    pub class: ClassHandle,
}

impl BoxNode {
    pub fn op1(&self) -> Option<NodeId> {
        self.op1
    }
}

/// FIELD
#[derive(Debug, Clone, Default)]
pub struct FieldNode {
    /// Object the field is read from; absent for statics
    pub(crate) obj: Option<NodeId>,
    pub field: FieldHandle,
    pub offset: u32,
    pub flags: FieldFlags,
}

impl FieldNode {
    pub fn obj(&self) -> Option<NodeId> {
        self.obj
    }

    pub fn is_static(&self) -> bool {
        self.obj.is_none()
    }
}

// ===== Indirections =====

/// Phase-specific state of an indirection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirLowering {
    /// Before rationalization
    Hir {
        /// Indirection is the target of an ASG
        asg_lhs: bool,
    },
    /// After rationalization
    Lir {
        /// Address must be materialized in a register
        req_addr_in_reg: bool,
    },
}

impl Default for IndirLowering {
    fn default() -> Self {
        IndirLowering::Hir { asg_lhs: false }
    }
}

/// IND, NULLCHECK, STOREIND
#[derive(Debug, Clone, Default)]
pub struct IndirNode {
    pub(crate) addr: Option<NodeId>,
    pub(crate) data: Option<NodeId>,
    pub(crate) flags: IndirFlags,
    pub lowering: IndirLowering,
}

impl IndirNode {
    pub fn flags(&self) -> IndirFlags {
        self.flags
    }

    pub fn addr(&self) -> Option<NodeId> {
        self.addr
    }

    /// Stored value (STOREIND only)
    pub fn data(&self) -> Option<NodeId> {
        self.data
    }

    pub fn is_asg_lhs(&self) -> bool {
        matches!(self.lowering, IndirLowering::Hir { asg_lhs: true })
    }

    pub fn requires_addr_in_reg(&self) -> bool {
        matches!(self.lowering, IndirLowering::Lir { req_addr_in_reg: true })
    }
}

/// BLK, OBJ, STORE_BLK, STORE_OBJ
#[derive(Debug, Clone, Default)]
pub struct BlkNode {
    pub(crate) addr: Option<NodeId>,
    pub(crate) data: Option<NodeId>,
    pub(crate) flags: IndirFlags,
    pub lowering: IndirLowering,
    /// Size in bytes of the block
    pub size: u32,
    /// Class layout (OBJ family only)
    pub layout: Option<ClassHandle>,
}

impl BlkNode {
    pub fn flags(&self) -> IndirFlags {
        self.flags
    }

    pub fn addr(&self) -> Option<NodeId> {
        self.addr
    }

    pub fn data(&self) -> Option<NodeId> {
        self.data
    }
}

/// STORE_DYN_BLK
#[derive(Debug, Clone)]
pub struct StoreDynBlkNode {
    pub(crate) addr: NodeId,
    pub(crate) data: NodeId,
    pub(crate) size: NodeId,
    pub(crate) flags: IndirFlags,
    /// Evaluate the size before address and data
    pub eval_size_first: bool,
}

impl StoreDynBlkNode {
    pub fn flags(&self) -> IndirFlags {
        self.flags
    }

    pub fn addr(&self) -> NodeId {
        self.addr
    }

    pub fn data(&self) -> NodeId {
        self.data
    }

    pub fn size(&self) -> NodeId {
        self.size
    }
}

// ===== Control and intrinsics =====

/// SELECT
#[derive(Debug, Clone)]
pub struct SelectNode {
    pub(crate) cond: NodeId,
    pub(crate) then_val: NodeId,
    pub(crate) else_val: NodeId,
}

impl SelectNode {
    pub fn cond(&self) -> NodeId {
        self.cond
    }

    pub fn then_val(&self) -> NodeId {
        self.then_val
    }

    pub fn else_val(&self) -> NodeId {
        self.else_val
    }
}

/// INTRINSIC
#[derive(Debug, Clone, Default)]
pub struct IntrinsicNode {
    pub(crate) op1: Option<NodeId>,
    pub(crate) op2: Option<NodeId>,
    pub id: IntrinsicId,
    pub method: MethodHandle,
}

impl IntrinsicNode {
    pub fn op1(&self) -> Option<NodeId> {
        self.op1
    }

    pub fn op2(&self) -> Option<NodeId> {
        self.op2
    }
}

/// SIMD, HWINTRINSIC
#[derive(Debug, Clone)]
pub struct MultiOpNode {
    pub(crate) operands: SmallVec<[NodeId; 3]>,
    pub intrinsic: IntrinsicId,
    /// Element type of the vector
    pub base_type: VarType,
    pub simd_size: u8,
}

impl MultiOpNode {
    pub fn operands(&self) -> &[NodeId] {
        &self.operands
    }

    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }
}

/// PHYSREG
#[derive(Debug, Clone, Default)]
pub struct PhysRegNode {
    pub reg: RegNum,
}

/// PHI
#[derive(Debug, Clone, Default)]
pub struct PhiNode {
    /// PHI_ARG nodes, one per incoming edge
    pub(crate) uses: Vec<NodeId>,
}

impl PhiNode {
    pub fn uses(&self) -> &[NodeId] {
        &self.uses
    }
}

/// One use in a FIELD_LIST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldListUse {
    pub(crate) node: NodeId,
    pub offset: u16,
    pub ty: VarType,
}

impl FieldListUse {
    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// FIELD_LIST
#[derive(Debug, Clone, Default)]
pub struct FieldListNode {
    pub(crate) uses: Vec<FieldListUse>,
}

impl FieldListNode {
    pub fn uses(&self) -> &[FieldListUse] {
        &self.uses
    }

    /// Whether the uses are in ascending offset order
    pub fn is_sorted(&self) -> bool {
        self.uses.windows(2).all(|pair| pair[0].offset <= pair[1].offset)
    }
}

/// ARGPLACE
#[derive(Debug, Clone, Default)]
pub struct ArgPlaceNode {
    pub class: Option<ClassHandle>,
}

// ===== Arrays =====

/// INDEX, INDEX_ADDR
#[derive(Debug, Clone)]
pub struct IndexNode {
    pub(crate) arr: Option<NodeId>,
    pub(crate) index: Option<NodeId>,
    pub elem_type: VarType,
    pub elem_size: u32,
    pub elem_class: Option<ClassHandle>,
    pub(crate) flags: IndexFlags,
    /// Offset of the length field from the array start
    pub len_offset: u8,
    /// Offset of the first element from the array start
    pub data_offset: u8,
}

impl Default for IndexNode {
    fn default() -> Self {
        IndexNode {
            arr: None,
            index: None,
            elem_type: VarType::Int,
            elem_size: 4,
            elem_class: None,
            flags: IndexFlags::RNGCHK,
            len_offset: 8,
            data_offset: 16,
        }
    }
}

impl IndexNode {
    pub fn flags(&self) -> IndexFlags {
        self.flags
    }

    pub fn arr(&self) -> Option<NodeId> {
        self.arr
    }

    pub fn index(&self) -> Option<NodeId> {
        self.index
    }
}

/// ARR_LENGTH
#[derive(Debug, Clone)]
pub struct ArrLenNode {
    pub(crate) array: Option<NodeId>,
    pub len_offset: u8,
    pub(crate) nonfaulting: bool,
}

impl Default for ArrLenNode {
    fn default() -> Self {
        ArrLenNode { array: None, len_offset: 8, nonfaulting: false }
    }
}

impl ArrLenNode {
    pub fn array(&self) -> Option<NodeId> {
        self.array
    }

    pub fn is_nonfaulting(&self) -> bool {
        self.nonfaulting
    }
}

/// Exception a failed bounds check raises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThrowKind {
    #[default]
    RangeCheckFail,
    ArgException,
    ArgRangeException,
}

/// BOUNDS_CHECK
#[derive(Debug, Clone, Default)]
pub struct BoundsChkNode {
    pub(crate) index: Option<NodeId>,
    pub(crate) length: Option<NodeId>,
    pub throw_kind: ThrowKind,
}

impl BoundsChkNode {
    pub fn index(&self) -> Option<NodeId> {
        self.index
    }

    pub fn length(&self) -> Option<NodeId> {
        self.length
    }
}

/// ARR_ELEM (multi-dimensional element address)
#[derive(Debug, Clone)]
pub struct ArrElemNode {
    pub(crate) arr: NodeId,
    pub(crate) indices: Vec<NodeId>,
    pub elem_size: u32,
    pub elem_type: VarType,
}

impl ArrElemNode {
    pub fn arr(&self) -> NodeId {
        self.arr
    }

    pub fn indices(&self) -> &[NodeId] {
        &self.indices
    }

    pub fn rank(&self) -> usize {
        self.indices.len()
    }
}

/// ARR_OFFSET
#[derive(Debug, Clone)]
pub struct ArrOffsNode {
    pub(crate) offset: NodeId,
    pub(crate) index: NodeId,
    pub(crate) arr: NodeId,
    pub dim: u8,
    pub rank: u8,
    pub elem_size: u32,
}

impl ArrOffsNode {
    pub fn offset(&self) -> NodeId {
        self.offset
    }

    pub fn index(&self) -> NodeId {
        self.index
    }

    pub fn arr(&self) -> NodeId {
        self.arr
    }
}

/// LEA: `base + index * scale + offset`
#[derive(Debug, Clone)]
pub struct AddrModeNode {
    pub(crate) base: Option<NodeId>,
    pub(crate) index: Option<NodeId>,
    pub scale: u8,
    pub offset: i32,
}

impl Default for AddrModeNode {
    fn default() -> Self {
        AddrModeNode { base: None, index: None, scale: 1, offset: 0 }
    }
}

impl AddrModeNode {
    pub fn base(&self) -> Option<NodeId> {
        self.base
    }

    pub fn index(&self) -> Option<NodeId> {
        self.index
    }
}

/// CMPXCHG
#[derive(Debug, Clone)]
pub struct CmpXchgNode {
    pub(crate) location: NodeId,
    pub(crate) value: NodeId,
    pub(crate) comparand: NodeId,
}

impl CmpXchgNode {
    pub fn location(&self) -> NodeId {
        self.location
    }

    pub fn value(&self) -> NodeId {
        self.value
    }

    pub fn comparand(&self) -> NodeId {
        self.comparand
    }
}

// ===== Outgoing arguments =====

/// Code sequence used to store a stack argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PutArgStkKind {
    #[default]
    Invalid,
    RepInstr,
    PartialRepInstr,
    Unroll,
    Push,
}

/// PUTARG_STK
#[derive(Debug, Clone, Default)]
pub struct PutArgStkNode {
    pub(crate) op1: Option<NodeId>,
    pub byte_offset: u32,
    pub byte_size: u32,
    /// Stored into the caller's incoming area (fast tail calls)
    pub in_incoming_arg_area: bool,
    pub kind: PutArgStkKind,
}

impl PutArgStkNode {
    pub fn op1(&self) -> Option<NodeId> {
        self.op1
    }

    pub fn stack_slot_count(&self, slot_size: u32) -> u32 {
        self.byte_size.div_ceil(slot_size.max(1))
    }
}

/// PUTARG_SPLIT: struct passed partly in registers, partly on the stack
#[derive(Debug, Clone)]
pub struct PutArgSplitNode {
    pub(crate) op1: Option<NodeId>,
    pub byte_offset: u32,
    /// Size of the stack part
    pub byte_size: u32,
    pub(crate) num_regs: u8,
    pub(crate) reg_types: [VarType; MAX_SPLIT_REG_COUNT],
    pub(crate) regs: MultiRegs<{ MAX_SPLIT_REG_COUNT - 1 }>,
}

impl Default for PutArgSplitNode {
    fn default() -> Self {
        PutArgSplitNode {
            op1: None,
            byte_offset: 0,
            byte_size: 0,
            num_regs: 0,
            reg_types: [VarType::Unknown; MAX_SPLIT_REG_COUNT],
            regs: MultiRegs::default(),
        }
    }
}

impl PutArgSplitNode {
    pub fn op1(&self) -> Option<NodeId> {
        self.op1
    }

    pub fn num_regs(&self) -> usize {
        self.num_regs as usize
    }

    pub fn reg_type(&self, index: usize) -> Option<VarType> {
        self.reg_types[..self.num_regs()].get(index).copied()
    }
}

/// COPY, RELOAD
#[derive(Debug, Clone)]
pub struct CopyOrReloadNode {
    pub(crate) op1: Option<NodeId>,
    /// Number of registers copied, fixed at construction
    pub(crate) reg_count: u8,
    pub(crate) regs: MultiRegs<{ MAX_RET_REG_COUNT - 1 }>,
}

impl Default for CopyOrReloadNode {
    fn default() -> Self {
        CopyOrReloadNode { op1: None, reg_count: 1, regs: MultiRegs::default() }
    }
}

impl CopyOrReloadNode {
    pub fn op1(&self) -> Option<NodeId> {
        self.op1
    }
}

// ===== Handles and misc =====

/// CLS_VAR, CLS_VAR_ADDR
#[derive(Debug, Clone, Default)]
pub struct ClsVarNode {
    pub field: FieldHandle,
    pub field_seq: Option<FieldSeqId>,
    pub flags: FieldFlags,
}

/// FTN_ADDR
#[derive(Debug, Clone, Default)]
pub struct FptrValNode {
    pub method: MethodHandle,
}

/// ALLOCOBJ
#[derive(Debug, Clone, Default)]
pub struct AllocObjNode {
    pub(crate) op1: Option<NodeId>,
    pub helper: HelperId,
    pub class: ClassHandle,
}

impl AllocObjNode {
    pub fn op1(&self) -> Option<NodeId> {
        self.op1
    }
}

/// RET_EXPR: placeholder for the value of an inline candidate
#[derive(Debug, Clone)]
pub struct RetExprNode {
    /// The candidate call; not owned, the call lives in its own statement
    pub inline_candidate: NodeId,
}

/// IL_OFFSET
#[derive(Debug, Clone, Default)]
pub struct ILOffsetNode {
    pub il_offset: u32,
}

/// JMP, END_LFIN
#[derive(Debug, Clone, Default)]
pub struct ValNode {
    pub value: u64,
}
