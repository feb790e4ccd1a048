//! Operator codes and the operator classification table
//!
//! Every operator is declared exactly once in the `define_opers!`
//! invocation below. The enum, the dump name, the payload shape and both
//! kind tables are generated from that single list, so an operator without
//! a table entry cannot exist.

use bitflags::bitflags;

use crate::types::VarType;

bitflags! {
    /// Arity and value classification of an operator
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OperKind: u8 {
        const LEAF = 0x01;
        const UNOP = 0x02;
        const BINOP = 0x04;
        /// Operands may be swapped without changing the result
        const COMMUTE = 0x08;
        /// Payload is wider than the plain unary/binary shape
        const EXOP = 0x10;
        /// Node does not produce a value
        const NOVALUE = 0x20;

        const SMPOP = Self::UNOP.bits() | Self::BINOP.bits();
        const KINDMASK = Self::LEAF.bits() | Self::SMPOP.bits();
    }
}

bitflags! {
    /// Phase legality of an operator, used by IR validation only
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DebugOperKind: u8 {
        /// Only valid after lowering to LIR
        const NOT_HIR = 0x01;
        /// Must be gone before entering LIR
        const NOT_LIR = 0x02;
        /// Can never be contained in its user
        const NO_CONTAIN = 0x04;
    }
}

/// Payload layout used by a family of operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Leaf,
    IntCon,
    DblCon,
    StrCon,
    LclVar,
    LclFld,
    PhiArg,
    Op,
    Cast,
    Box,
    Field,
    Indir,
    Blk,
    StoreDynBlk,
    Select,
    Intrinsic,
    MultiOp,
    Call,
    PhysReg,
    Phi,
    FieldList,
    ArgPlace,
    Index,
    ArrLen,
    BoundsChk,
    ArrElem,
    ArrOffs,
    AddrMode,
    CmpXchg,
    PutArgStk,
    PutArgSplit,
    CopyOrReload,
    ClsVar,
    FptrVal,
    AllocObj,
    RetExpr,
    ILOffset,
    Val,
}

/// Arena size class a node is allocated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SizeClass {
    Small,
    Large,
}

impl Shape {
    /// Size class required to hold this payload
    pub const fn size_class(self) -> SizeClass {
        match self {
            Shape::Call | Shape::MultiOp | Shape::ArrElem | Shape::PutArgSplit => SizeClass::Large,
            _ => SizeClass::Small,
        }
    }

    /// Whether the payload is a plain operand pair (op1, op2) plus extras,
    /// so operands survive a change to another such shape
    pub const fn is_op_like(self) -> bool {
        matches!(
            self,
            Shape::Op
                | Shape::Cast
                | Shape::Box
                | Shape::Field
                | Shape::Indir
                | Shape::Blk
                | Shape::Intrinsic
                | Shape::Index
                | Shape::ArrLen
                | Shape::BoundsChk
                | Shape::AddrMode
                | Shape::PutArgStk
                | Shape::PutArgSplit
                | Shape::CopyOrReload
                | Shape::AllocObj
        )
    }
}

struct OperInfo {
    name: &'static str,
    shape: Shape,
    kind: u8,
    debug: u8,
}

// Raw bits for building the const table.
const LEAF: u8 = OperKind::LEAF.bits();
const UNOP: u8 = OperKind::UNOP.bits();
const BINOP: u8 = OperKind::BINOP.bits();
const SPECIAL: u8 = 0;
const COMMUTE: u8 = OperKind::COMMUTE.bits();
const EXOP: u8 = OperKind::EXOP.bits();
const NOVALUE: u8 = OperKind::NOVALUE.bits();

const ANY: u8 = 0;
const NOTHIR: u8 = DebugOperKind::NOT_HIR.bits();
const NOTLIR: u8 = DebugOperKind::NOT_LIR.bits();
const NOCONTAIN: u8 = DebugOperKind::NO_CONTAIN.bits();

macro_rules! define_opers {
    ($( $variant:ident = $name:literal, $shape:ident, $kind:expr, $debug:expr; )*) => {
        /// IR operator code
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Oper {
            $($variant,)*
        }

        impl Oper {
            /// Every operator, in declaration order
            pub const ALL: &'static [Oper] = &[$(Oper::$variant,)*];
            pub const COUNT: usize = Oper::ALL.len();
        }

        const OPER_INFO: &[OperInfo] = &[
            $(OperInfo { name: $name, shape: Shape::$shape, kind: $kind, debug: $debug },)*
        ];
    };
}

define_opers! {
    // ===== Leaves =====
    PhiArg = "PHI_ARG", PhiArg, LEAF, NOTLIR;
    LclVar = "LCL_VAR", LclVar, LEAF, ANY;
    LclFld = "LCL_FLD", LclFld, LEAF, ANY;
    LclVarAddr = "LCL_VAR_ADDR", LclVar, LEAF, ANY;
    LclFldAddr = "LCL_FLD_ADDR", LclFld, LEAF, ANY;
    CatchArg = "CATCH_ARG", Leaf, LEAF, ANY;
    Label = "LABEL", Leaf, LEAF, ANY;
    FtnAddr = "FTN_ADDR", FptrVal, LEAF, ANY;
    RetExpr = "RET_EXPR", RetExpr, LEAF, NOTLIR;
    CnsInt = "CNS_INT", IntCon, LEAF, ANY;
    CnsLng = "CNS_LNG", IntCon, LEAF, ANY;
    CnsDbl = "CNS_DBL", DblCon, LEAF, ANY;
    CnsStr = "CNS_STR", StrCon, LEAF, ANY;
    ArgPlace = "ARGPLACE", ArgPlace, LEAF, NOTLIR;
    Jmp = "JMP", Val, LEAF | NOVALUE, ANY;
    EndLfin = "END_LFIN", Val, LEAF | NOVALUE, ANY;
    ILOffset = "IL_OFFSET", ILOffset, LEAF | NOVALUE, NOTHIR;
    NoOp = "NO_OP", Leaf, LEAF | NOVALUE, ANY;
    PinvokeProlog = "PINVOKE_PROLOG", Leaf, LEAF | NOVALUE, NOTHIR;
    PinvokeEpilog = "PINVOKE_EPILOG", Leaf, LEAF | NOVALUE, NOTHIR;
    StartNonGc = "START_NONGC", Leaf, LEAF | NOVALUE, NOTHIR;
    StartPreemptGc = "START_PREEMPTGC", Leaf, LEAF | NOVALUE, NOTHIR;
    ProfHook = "PROF_HOOK", Leaf, LEAF | NOVALUE, NOTHIR;
    MemoryBarrier = "MEMORYBARRIER", Leaf, LEAF | NOVALUE, ANY;
    JmpTable = "JMPTABLE", Leaf, LEAF, NOTHIR;
    ClsVar = "CLS_VAR", ClsVar, LEAF, ANY;
    ClsVarAddr = "CLS_VAR_ADDR", ClsVar, LEAF, ANY;
    PhysReg = "PHYSREG", PhysReg, LEAF, NOTHIR;

    // ===== Local stores =====
    StoreLclVar = "STORE_LCL_VAR", LclVar, UNOP | NOVALUE, ANY;
    StoreLclFld = "STORE_LCL_FLD", LclFld, UNOP | NOVALUE, ANY;

    // ===== Unary =====
    Nop = "NOP", Op, UNOP | NOVALUE, ANY;
    Not = "NOT", Op, UNOP, ANY;
    Neg = "NEG", Op, UNOP, ANY;
    Bswap = "BSWAP", Op, UNOP, ANY;
    Bswap16 = "BSWAP16", Op, UNOP, ANY;
    Copy = "COPY", CopyOrReload, UNOP, NOTHIR;
    Reload = "RELOAD", CopyOrReload, UNOP, NOTHIR;
    ArrLength = "ARR_LENGTH", ArrLen, UNOP | EXOP, ANY;
    Cast = "CAST", Cast, UNOP | EXOP, ANY;
    Bitcast = "BITCAST", Op, UNOP, NOTHIR;
    CkFinite = "CKFINITE", Op, UNOP, NOCONTAIN;
    LclHeap = "LCLHEAP", Op, UNOP, NOCONTAIN;
    Addr = "ADDR", Op, UNOP, NOTLIR;
    Ind = "IND", Indir, UNOP, ANY;
    NullCheck = "NULLCHECK", Indir, UNOP | NOVALUE, ANY;
    Blk = "BLK", Blk, UNOP | EXOP, ANY;
    Obj = "OBJ", Blk, UNOP | EXOP, ANY;
    Box = "BOX", Box, UNOP | EXOP, NOTLIR;
    Field = "FIELD", Field, UNOP | EXOP, NOTLIR;
    AllocObj = "ALLOCOBJ", AllocObj, UNOP | EXOP, NOTLIR;
    InitVal = "INIT_VAL", Op, UNOP, ANY;
    JTrue = "JTRUE", Op, UNOP | NOVALUE, ANY;
    Return = "RETURN", Op, UNOP | NOVALUE, ANY;
    Switch = "SWITCH", Op, UNOP | NOVALUE, ANY;
    RetFilt = "RETFILT", Op, UNOP | NOVALUE, ANY;
    ReturnTrap = "RETURNTRAP", Op, UNOP | NOVALUE, ANY;
    KeepAlive = "KEEPALIVE", Op, UNOP | NOVALUE, ANY;
    PutArgReg = "PUTARG_REG", Op, UNOP, NOTHIR;
    PutArgType = "PUTARG_TYPE", Op, UNOP, NOTLIR;
    PutArgStk = "PUTARG_STK", PutArgStk, UNOP | NOVALUE, NOTHIR;
    PutArgSplit = "PUTARG_SPLIT", PutArgSplit, UNOP, NOTHIR;

    // ===== Binary =====
    Add = "ADD", Op, BINOP | COMMUTE, ANY;
    Sub = "SUB", Op, BINOP, ANY;
    Mul = "MUL", Op, BINOP | COMMUTE, ANY;
    Div = "DIV", Op, BINOP, ANY;
    Mod = "MOD", Op, BINOP, ANY;
    UDiv = "UDIV", Op, BINOP, ANY;
    UMod = "UMOD", Op, BINOP, ANY;
    Or = "OR", Op, BINOP | COMMUTE, ANY;
    Xor = "XOR", Op, BINOP | COMMUTE, ANY;
    And = "AND", Op, BINOP | COMMUTE, ANY;
    Lsh = "LSH", Op, BINOP, ANY;
    Rsh = "RSH", Op, BINOP, ANY;
    Rsz = "RSZ", Op, BINOP, ANY;
    Rol = "ROL", Op, BINOP, ANY;
    Ror = "ROR", Op, BINOP, ANY;
    MulHi = "MULHI", Op, BINOP | COMMUTE, NOTHIR;
    Asg = "ASG", Op, BINOP | NOVALUE, NOTLIR;
    Eq = "EQ", Op, BINOP | COMMUTE, ANY;
    Ne = "NE", Op, BINOP | COMMUTE, ANY;
    Lt = "LT", Op, BINOP, ANY;
    Le = "LE", Op, BINOP, ANY;
    Ge = "GE", Op, BINOP, ANY;
    Gt = "GT", Op, BINOP, ANY;
    TestEq = "TEST_EQ", Op, BINOP, NOTHIR;
    TestNe = "TEST_NE", Op, BINOP, NOTHIR;
    Comma = "COMMA", Op, BINOP, NOTLIR;
    Qmark = "QMARK", Op, BINOP | EXOP, NOTLIR;
    Colon = "COLON", Op, BINOP | NOVALUE, NOTLIR;
    MkRefAny = "MKREFANY", Op, BINOP, NOTLIR;
    XAdd = "XADD", Op, BINOP, ANY;
    XChg = "XCHG", Op, BINOP, ANY;
    LockAdd = "LOCKADD", Op, BINOP | NOVALUE, ANY;
    Cmp = "CMP", Op, BINOP | NOVALUE, NOTHIR;
    Test = "TEST", Op, BINOP | NOVALUE, NOTHIR;
    Intrinsic = "INTRINSIC", Intrinsic, BINOP | EXOP, ANY;
    Index = "INDEX", Index, BINOP | EXOP, NOTLIR;
    IndexAddr = "INDEX_ADDR", Index, BINOP | EXOP, ANY;
    Lea = "LEA", AddrMode, BINOP | EXOP, ANY;
    StoreInd = "STOREIND", Indir, BINOP | NOVALUE, NOTHIR;
    StoreBlk = "STORE_BLK", Blk, BINOP | EXOP | NOVALUE, NOTHIR;
    StoreObj = "STORE_OBJ", Blk, BINOP | EXOP | NOVALUE, NOTHIR;
    BoundsCheck = "BOUNDS_CHECK", BoundsChk, BINOP | EXOP | NOVALUE, ANY;

    // ===== Special =====
    Select = "SELECT", Select, SPECIAL, ANY;
    CmpXchg = "CMPXCHG", CmpXchg, SPECIAL, ANY;
    ArrElem = "ARR_ELEM", ArrElem, SPECIAL, NOTLIR;
    ArrOffset = "ARR_OFFSET", ArrOffs, SPECIAL, NOTLIR;
    StoreDynBlk = "STORE_DYN_BLK", StoreDynBlk, SPECIAL | NOVALUE, ANY;
    Call = "CALL", Call, SPECIAL, NOCONTAIN;
    Phi = "PHI", Phi, SPECIAL, NOTLIR;
    FieldList = "FIELD_LIST", FieldList, SPECIAL, ANY;
    Simd = "SIMD", MultiOp, SPECIAL, ANY;
    HwIntrinsic = "HWINTRINSIC", MultiOp, SPECIAL, ANY;
}

impl Oper {
    #[inline]
    fn info(self) -> &'static OperInfo {
        &OPER_INFO[self as usize]
    }

    /// Dump name of the operator
    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn kind(self) -> OperKind {
        OperKind::from_bits_retain(self.info().kind)
    }

    pub fn debug_kind(self) -> DebugOperKind {
        DebugOperKind::from_bits_retain(self.info().debug)
    }

    pub fn shape(self) -> Shape {
        self.info().shape
    }

    pub fn size_class(self) -> SizeClass {
        self.shape().size_class()
    }

    // ===== Kind predicates =====

    pub fn is_leaf(self) -> bool {
        self.kind().contains(OperKind::LEAF)
    }

    pub fn is_unary(self) -> bool {
        self.kind().contains(OperKind::UNOP)
    }

    pub fn is_binary(self) -> bool {
        self.kind().contains(OperKind::BINOP)
    }

    /// Unary or binary
    pub fn is_simple(self) -> bool {
        self.kind().intersects(OperKind::SMPOP)
    }

    pub fn is_special(self) -> bool {
        !self.kind().intersects(OperKind::KINDMASK)
    }

    pub fn is_commutative(self) -> bool {
        self.kind().contains(OperKind::COMMUTE)
    }

    pub fn is_value_producing(self) -> bool {
        !self.kind().contains(OperKind::NOVALUE)
    }

    // ===== Operator families =====

    pub fn is_const(self) -> bool {
        matches!(self, Oper::CnsInt | Oper::CnsLng | Oper::CnsDbl | Oper::CnsStr)
    }

    pub fn is_int_const(self) -> bool {
        matches!(self, Oper::CnsInt | Oper::CnsLng)
    }

    pub fn is_local_read(self) -> bool {
        matches!(self, Oper::LclVar | Oper::LclFld)
    }

    pub fn is_local_store(self) -> bool {
        matches!(self, Oper::StoreLclVar | Oper::StoreLclFld)
    }

    /// Local reads, local stores and PHI arguments
    pub fn is_local(self) -> bool {
        self.is_local_read() || self.is_local_store() || self == Oper::PhiArg
    }

    pub fn is_local_addr(self) -> bool {
        matches!(self, Oper::LclVarAddr | Oper::LclFldAddr)
    }

    pub fn is_indir(self) -> bool {
        matches!(
            self,
            Oper::Ind
                | Oper::StoreInd
                | Oper::NullCheck
                | Oper::Blk
                | Oper::Obj
                | Oper::StoreBlk
                | Oper::StoreObj
                | Oper::StoreDynBlk
        )
    }

    pub fn is_block(self) -> bool {
        matches!(
            self,
            Oper::Blk | Oper::Obj | Oper::StoreBlk | Oper::StoreObj | Oper::StoreDynBlk
        )
    }

    /// Stores in LIR form (HIR uses ASG instead)
    pub fn is_store(self) -> bool {
        matches!(
            self,
            Oper::StoreLclVar
                | Oper::StoreLclFld
                | Oper::StoreInd
                | Oper::StoreBlk
                | Oper::StoreObj
                | Oper::StoreDynBlk
        )
    }

    pub fn is_compare(self) -> bool {
        matches!(
            self,
            Oper::Eq
                | Oper::Ne
                | Oper::Lt
                | Oper::Le
                | Oper::Ge
                | Oper::Gt
                | Oper::TestEq
                | Oper::TestNe
        )
    }

    pub fn is_shift_or_rotate(self) -> bool {
        matches!(self, Oper::Lsh | Oper::Rsh | Oper::Rsz | Oper::Rol | Oper::Ror)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Oper::Add
                | Oper::Sub
                | Oper::Mul
                | Oper::MulHi
                | Oper::Div
                | Oper::Mod
                | Oper::UDiv
                | Oper::UMod
                | Oper::Or
                | Oper::Xor
                | Oper::And
        ) || self.is_shift_or_rotate()
    }

    pub fn is_div_or_mod(self) -> bool {
        matches!(self, Oper::Div | Oper::Mod | Oper::UDiv | Oper::UMod)
    }

    pub fn may_overflow(self) -> bool {
        matches!(self, Oper::Add | Oper::Sub | Oper::Mul | Oper::Cast)
    }

    pub fn is_put_arg(self) -> bool {
        matches!(self, Oper::PutArgReg | Oper::PutArgStk | Oper::PutArgSplit)
    }

    pub fn is_copy_or_reload(self) -> bool {
        matches!(self, Oper::Copy | Oper::Reload)
    }

    pub fn is_hw_intrinsic_like(self) -> bool {
        self.shape() == Shape::MultiOp
    }

    /// Operators whose nodes may define more than one register
    pub fn is_multi_reg_capable(self) -> bool {
        matches!(
            self,
            Oper::Call
                | Oper::LclVar
                | Oper::StoreLclVar
                | Oper::PutArgSplit
                | Oper::Copy
                | Oper::Reload
        )
    }

    pub fn is_atomic(self) -> bool {
        matches!(self, Oper::XAdd | Oper::XChg | Oper::LockAdd | Oper::CmpXchg)
    }

    // ===== Operand presence =====

    /// Whether the first operand of a simple operator may be absent
    pub fn null_op1_legal(self, ty: VarType) -> bool {
        match self {
            Oper::Lea | Oper::RetFilt | Oper::Nop | Oper::Field => true,
            Oper::Return => ty == VarType::Void,
            _ => false,
        }
    }

    /// Whether the second operand of a simple operator may be absent
    pub fn null_op2_legal(self) -> bool {
        if !self.is_binary() {
            return true;
        }
        matches!(self, Oper::Intrinsic | Oper::Lea)
    }

    // ===== Relop transforms =====

    /// Relop with operands exchanged: `a < b` becomes `b > a`
    pub fn swap_relop(self) -> Option<Oper> {
        Some(match self {
            Oper::Eq => Oper::Eq,
            Oper::Ne => Oper::Ne,
            Oper::Lt => Oper::Gt,
            Oper::Le => Oper::Ge,
            Oper::Ge => Oper::Le,
            Oper::Gt => Oper::Lt,
            Oper::TestEq => Oper::TestEq,
            Oper::TestNe => Oper::TestNe,
            _ => return None,
        })
    }

    /// Logical negation of a relop: `a < b` becomes `a >= b`
    pub fn reverse_relop(self) -> Option<Oper> {
        Some(match self {
            Oper::Eq => Oper::Ne,
            Oper::Ne => Oper::Eq,
            Oper::Lt => Oper::Ge,
            Oper::Le => Oper::Gt,
            Oper::Ge => Oper::Lt,
            Oper::Gt => Oper::Le,
            Oper::TestEq => Oper::TestNe,
            Oper::TestNe => Oper::TestEq,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Oper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_complete() {
        assert_eq!(OPER_INFO.len(), Oper::COUNT);
        for (index, oper) in Oper::ALL.iter().enumerate() {
            assert_eq!(*oper as usize, index);
            assert!(!oper.name().is_empty());
        }
    }

    #[test]
    fn test_kind_bits() {
        assert!(Oper::CnsInt.is_leaf());
        assert!(Oper::Neg.is_unary());
        assert!(Oper::Add.is_binary());
        assert!(Oper::Add.is_commutative());
        assert!(!Oper::Sub.is_commutative());
        assert!(Oper::Call.is_special());
        assert!(Oper::Phi.is_special());
        assert!(!Oper::StoreInd.is_value_producing());
        assert!(Oper::Cast.kind().contains(OperKind::EXOP));
    }

    #[test]
    fn test_exactly_one_arity_class() {
        for oper in Oper::ALL {
            let arity = oper.kind() & OperKind::KINDMASK;
            assert!(arity.bits().count_ones() <= 1, "{} has several arity bits", oper);
        }
    }

    #[test]
    fn test_debug_kinds() {
        assert!(Oper::Asg.debug_kind().contains(DebugOperKind::NOT_LIR));
        assert!(Oper::StoreInd.debug_kind().contains(DebugOperKind::NOT_HIR));
        assert!(Oper::Call.debug_kind().contains(DebugOperKind::NO_CONTAIN));
        assert!(Oper::Add.debug_kind().is_empty());
    }

    #[test]
    fn test_null_operand_predicates() {
        assert!(Oper::Lea.null_op1_legal(VarType::ByRef));
        assert!(Oper::Return.null_op1_legal(VarType::Void));
        assert!(!Oper::Return.null_op1_legal(VarType::Int));
        assert!(!Oper::Add.null_op2_legal());
        assert!(Oper::Neg.null_op2_legal());
        assert!(Oper::Intrinsic.null_op2_legal());
    }

    #[test]
    fn test_relops() {
        assert_eq!(Oper::Lt.swap_relop(), Some(Oper::Gt));
        assert_eq!(Oper::Lt.reverse_relop(), Some(Oper::Ge));
        assert_eq!(Oper::TestEq.reverse_relop(), Some(Oper::TestNe));
        assert_eq!(Oper::Add.swap_relop(), None);
    }

    #[test]
    fn test_size_classes() {
        assert_eq!(Oper::Call.size_class(), SizeClass::Large);
        assert_eq!(Oper::HwIntrinsic.size_class(), SizeClass::Large);
        assert_eq!(Oper::Add.size_class(), SizeClass::Small);
        assert!(SizeClass::Small < SizeClass::Large);
    }
}
