//! IR construction and mutation errors
//!
//! Two families live here. Contract violations are bugs in the compiler
//! phase that drives the IR (wrong-shape downcast, reading costs too early,
//! mutating a frozen argument list). Construction failures are driven by the
//! input being compiled and are reported back to the front-end or the ABI
//! lowering phase, which decides how to recover.

use thiserror::Error;

use crate::call::ArgsStage;
use crate::node::{NodeId, Shape};
use crate::oper::Oper;
use crate::types::VarType;

pub type IrResult<T> = Result<T, IrError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IrError {
    // ===== Contract violations =====
    #[error("{oper} node does not have the {expected:?} shape")]
    ShapeMismatch { oper: Oper, expected: Shape },

    #[error("costs of {oper} node were read before they were computed")]
    CostsNotComputed { oper: Oper },

    #[error("register index {index} is out of range for {oper} (capacity {capacity})")]
    RegIndexOutOfRange { oper: Oper, index: usize, capacity: usize },

    #[error("{oper} node is not a multi-register node")]
    NotMultiReg { oper: Oper },

    #[error("argument list is in the {stage:?} stage and can no longer be changed this way")]
    ArgsFinalized { stage: ArgsStage },

    #[error("argument list transition expected stage {expected:?}, found {found:?}")]
    ArgsStage { expected: ArgsStage, found: ArgsStage },

    #[error("{role} cannot be inserted after ABI assignment")]
    NotLateInsertable { role: &'static str },

    #[error("argument {index} does not exist (count {count})")]
    ArgIndexOutOfRange { index: usize, count: usize },

    #[error("no argument with id {0}")]
    UnknownArg(u32),

    #[error("cannot change {from} into {to}: {reason}")]
    IncompatibleOperChange { from: Oper, to: Oper, reason: &'static str },

    #[error("{oper} requires operand {position}")]
    MissingOperand { oper: Oper, position: usize },

    #[error("{oper} does not take operand {position}")]
    UnexpectedOperand { oper: Oper, position: usize },

    #[error("node {user} has no live operand in slot {slot}")]
    DeadUseSlot { user: NodeId, slot: String },

    #[error("node {0} is not part of this arena")]
    UnknownNode(NodeId),

    #[error("node {0} is not in the execution order")]
    NotSequenced(NodeId),

    #[error("{oper} is not valid in {phase}")]
    InvalidInPhase { oper: Oper, phase: &'static str },

    #[error("indirection {node} is still an assignment target when entering LIR")]
    UnloweredAssignTarget { node: NodeId },

    #[error("{flag} does not apply to {oper}")]
    FlagNotApplicable { oper: Oper, flag: &'static str },

    #[error("{what} is only meaningful in {phase}")]
    WrongIndirPhase { what: &'static str, phase: &'static str },

    // ===== Construction failures =====
    #[error("{oper} cannot be built with type {ty}")]
    UnsupportedOperType { oper: Oper, ty: VarType },

    #[error("{oper} is not built by {builder}")]
    WrongBuilder { oper: Oper, builder: &'static str },

    #[error("ABI placement failed for argument {arg_num}: {reason}")]
    AbiPlacementFailed { arg_num: usize, reason: String },

    #[error("field sequence cannot be built from a null field handle")]
    NullFieldHandle,
}

impl IrError {
    /// Whether this error reports a bug in the driving compiler phase
    /// rather than a property of the method being compiled.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(
            self,
            IrError::UnsupportedOperType { .. }
                | IrError::WrongBuilder { .. }
                | IrError::AbiPlacementFailed { .. }
                | IrError::NullFieldHandle
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_families() {
        let bad_cast = IrError::ShapeMismatch { oper: Oper::Add, expected: Shape::Call };
        assert!(bad_cast.is_contract_violation());
        assert!(!IrError::NullFieldHandle.is_contract_violation());
        let abi = IrError::AbiPlacementFailed { arg_num: 3, reason: "too large".into() };
        assert!(!abi.is_contract_violation());
    }

    #[test]
    fn test_error_messages() {
        let err = IrError::CostsNotComputed { oper: Oper::Mul };
        assert_eq!(err.to_string(), "costs of MUL node were read before they were computed");
    }
}
