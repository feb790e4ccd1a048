//! Kestrel JIT tree IR
//!
//! The node layer of a method-at-a-time optimizing compiler:
//! - **Operators**: the operator table and its per-operator properties (`oper`)
//! - **Nodes**: node header, shape payloads, flags and effects (`node`, `flags`)
//! - **Arena**: node ownership, construction, operator changes and cloning (`arena`)
//! - **Calls**: argument lists, ABI assignment and late-argument lowering (`call`)
//! - **Multi-register values**: per-register types, registers and spill flags (`multireg`)
//! - **Field sequences**: interned field access chains (`fieldseq`)
//! - **Traversal**: operand iteration and use-edge rewriting (`iter`, `order`)
//!
//! # Example
//!
//! ```rust,ignore
//! use kestrel_ir::{IrArena, Oper, VarType};
//!
//! let mut arena = IrArena::new();
//! let two = arena.new_icon(2, VarType::Int)?;
//! let three = arena.new_icon(3, VarType::Int)?;
//! let sum = arena.new_binop(Oper::Add, VarType::Int, two, three)?;
//! assert!(arena[sum].is_value());
//! print!("{}", arena.dump_tree(sum)?);
//! ```

#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

pub mod error;
pub mod types;
pub mod oper;
pub mod flags;
pub mod value_num;
pub mod fieldseq;
pub mod multireg;
pub mod node;
pub mod arena;
pub mod call;
pub mod iter;
pub mod order;
pub mod verify;
pub mod config;

mod builder;
mod display;

// ============================================================================
// Re-exports
// ============================================================================

pub use arena::{IrArena, IrPhase};
pub use call::{
    AbiClassifier, ArgsStage, CallArg, CallArgId, CallArgs, CallNode, CallType, LocalAllocator, NewCallArg,
    RegisterAbi, WellKnownArg,
};
pub use config::{ConfigError, TargetConfig};
pub use error::{IrError, IrResult};
pub use fieldseq::{FieldSeqId, FieldSeqStore};
pub use flags::GenFlags;
pub use iter::{UseEdge, UseSlot};
pub use node::{Node, NodeId, NodeKind, Shape};
pub use oper::Oper;
pub use order::{ExecOrder, Statement};
pub use types::{LclNum, RegNum, VarType};
pub use value_num::{ValueNum, ValueNumPair};
