//! IR value types and opaque runtime handles
//!
//! Every node carries a small value-type tag. Small integer types only
//! appear on loads, stores and casts; arithmetic is done on the widened
//! actual type. Metadata handles come from the runtime and are stored as
//! uninterpreted tokens.

/// Static value type of an IR node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VarType {
    Undef,
    Void,
    Bool,
    Byte,
    UByte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    /// Object reference (GC tracked)
    Ref,
    /// Interior pointer (GC tracked)
    ByRef,
    Struct,
    /// Opaque block of memory with no class layout
    Blk,
    Simd8,
    Simd12,
    Simd16,
    Simd32,
    /// Marks an unused slot in register-type tables
    Unknown,
}

impl VarType {
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            VarType::Bool
                | VarType::Byte
                | VarType::UByte
                | VarType::Short
                | VarType::UShort
                | VarType::Int
                | VarType::UInt
                | VarType::Long
                | VarType::ULong
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, VarType::Float | VarType::Double)
    }

    /// Whether values of this type are reported to the GC
    pub fn is_gc(self) -> bool {
        matches!(self, VarType::Ref | VarType::ByRef)
    }

    pub fn is_struct(self) -> bool {
        matches!(self, VarType::Struct | VarType::Blk) || self.is_simd()
    }

    pub fn is_simd(self) -> bool {
        matches!(self, VarType::Simd8 | VarType::Simd12 | VarType::Simd16 | VarType::Simd32)
    }

    pub fn is_small_int(self) -> bool {
        matches!(
            self,
            VarType::Bool | VarType::Byte | VarType::UByte | VarType::Short | VarType::UShort
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            VarType::Bool | VarType::UByte | VarType::UShort | VarType::UInt | VarType::ULong
        )
    }

    pub fn is_long(self) -> bool {
        matches!(self, VarType::Long | VarType::ULong)
    }

    /// Whether the type can be the result of an arithmetic node
    pub fn is_arith(self) -> bool {
        self.is_integral() || self.is_floating() || self.is_gc()
    }

    /// Type used once the value is loaded into a register
    pub fn actual_type(self) -> VarType {
        match self {
            VarType::Bool | VarType::Byte | VarType::UByte | VarType::Short | VarType::UShort => {
                VarType::Int
            }
            VarType::UInt => VarType::Int,
            VarType::ULong => VarType::Long,
            other => other,
        }
    }

    /// Size in bytes, or `None` for types without an inherent size
    pub fn size(self, pointer_size: u32) -> Option<u32> {
        match self {
            VarType::Bool | VarType::Byte | VarType::UByte => Some(1),
            VarType::Short | VarType::UShort => Some(2),
            VarType::Int | VarType::UInt | VarType::Float => Some(4),
            VarType::Long | VarType::ULong | VarType::Double => Some(8),
            VarType::Ref | VarType::ByRef => Some(pointer_size),
            VarType::Simd8 => Some(8),
            VarType::Simd12 => Some(12),
            VarType::Simd16 => Some(16),
            VarType::Simd32 => Some(32),
            VarType::Undef | VarType::Void | VarType::Struct | VarType::Blk | VarType::Unknown => {
                None
            }
        }
    }
}

impl std::fmt::Display for VarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VarType::Undef => "undef",
            VarType::Void => "void",
            VarType::Bool => "bool",
            VarType::Byte => "byte",
            VarType::UByte => "ubyte",
            VarType::Short => "short",
            VarType::UShort => "ushort",
            VarType::Int => "int",
            VarType::UInt => "uint",
            VarType::Long => "long",
            VarType::ULong => "ulong",
            VarType::Float => "float",
            VarType::Double => "double",
            VarType::Ref => "ref",
            VarType::ByRef => "byref",
            VarType::Struct => "struct",
            VarType::Blk => "blk",
            VarType::Simd8 => "simd8",
            VarType::Simd12 => "simd12",
            VarType::Simd16 => "simd16",
            VarType::Simd32 => "simd32",
            VarType::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

// ===== Runtime handles =====

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub u64);

        impl $name {
            pub const NULL: $name = $name(0);

            pub fn is_null(self) -> bool {
                self.0 == 0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{:#x}", $prefix, self.0)
            }
        }
    };
}

define_handle!(
    /// Runtime class (type) handle
    ClassHandle,
    "cls"
);
define_handle!(
    /// Runtime field handle
    FieldHandle,
    "fld"
);
define_handle!(
    /// Runtime method handle
    MethodHandle,
    "meth"
);
define_handle!(
    /// Runtime module (scope) handle
    ModuleHandle,
    "mod"
);

/// Runtime helper function identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HelperId(pub u32);

impl std::fmt::Display for HelperId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "help#{}", self.0)
    }
}

// ===== Compiler-side identifiers =====

/// Physical register number, as numbered by the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RegNum(pub u8);

impl std::fmt::Display for RegNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Local variable number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LclNum(pub u32);

impl std::fmt::Display for LclNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V{:02}", self.0)
    }
}

/// SSA definition number of a local; `RESERVED` means "not in SSA"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SsaNum(pub u32);

impl SsaNum {
    pub const RESERVED: SsaNum = SsaNum(0);

    pub fn is_reserved(self) -> bool {
        self == SsaNum::RESERVED
    }
}

/// Basic block identifier (owned by the flow graph, referenced here only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BB{:02}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actual_type_widens_small_ints() {
        assert_eq!(VarType::Byte.actual_type(), VarType::Int);
        assert_eq!(VarType::UShort.actual_type(), VarType::Int);
        assert_eq!(VarType::ULong.actual_type(), VarType::Long);
        assert_eq!(VarType::Ref.actual_type(), VarType::Ref);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(VarType::Short.size(8), Some(2));
        assert_eq!(VarType::Ref.size(4), Some(4));
        assert_eq!(VarType::ByRef.size(8), Some(8));
        assert_eq!(VarType::Simd12.size(8), Some(12));
        assert_eq!(VarType::Struct.size(8), None);
    }

    #[test]
    fn test_classification() {
        assert!(VarType::Simd16.is_struct());
        assert!(VarType::Ref.is_gc());
        assert!(!VarType::Long.is_gc());
        assert!(VarType::UInt.is_unsigned());
        assert!(VarType::Double.is_floating());
        assert!(!VarType::Void.is_arith());
    }

    #[test]
    fn test_handles() {
        assert!(FieldHandle::NULL.is_null());
        assert!(!ClassHandle(0x40).is_null());
        assert_eq!(MethodHandle(0x10).to_string(), "meth0x10");
        assert_eq!(LclNum(3).to_string(), "V03");
    }
}
