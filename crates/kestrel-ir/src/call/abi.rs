//! ABI placement seam
//!
//! The IR core does not know any calling convention. A target supplies an
//! `AbiClassifier` that places one argument at a time; `RegisterAbi` is a
//! plain register-then-stack classifier configured by `TargetConfig`.

use crate::call::args::WellKnownArg;
use crate::config::TargetConfig;
use crate::error::{IrError, IrResult};
use crate::types::{ClassHandle, LclNum, RegNum, VarType};

/// Most registers a single argument can be passed in
pub const MAX_ARG_REG_COUNT: usize = 4;

/// Where and how one argument is passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallArgAbiInfo {
    /// Position of the argument in evaluation order at placement time
    pub arg_num: usize,
    pub regs: [Option<RegNum>; MAX_ARG_REG_COUNT],
    pub num_regs: u8,
    /// Offset of the stack part in the outgoing argument area
    pub byte_offset: u32,
    /// Total size of the argument
    pub byte_size: u32,
    pub byte_alignment: u32,
    /// Bytes passed on the stack
    pub stack_bytes: u32,
    /// Type the value is passed as
    pub arg_type: VarType,
    pub is_struct: bool,
    pub passed_by_ref: bool,
    pub is_split: bool,
    /// Fills a register skipped earlier for alignment
    pub is_back_filled: bool,
}

impl Default for CallArgAbiInfo {
    fn default() -> Self {
        CallArgAbiInfo {
            arg_num: usize::MAX,
            regs: [None; MAX_ARG_REG_COUNT],
            num_regs: 0,
            byte_offset: 0,
            byte_size: 0,
            byte_alignment: 0,
            stack_bytes: 0,
            arg_type: VarType::Undef,
            is_struct: false,
            passed_by_ref: false,
            is_split: false,
            is_back_filled: false,
        }
    }
}

impl CallArgAbiInfo {
    pub fn is_passed_in_registers(&self) -> bool {
        !self.is_split && self.num_regs != 0
    }

    pub fn is_passed_on_stack(&self) -> bool {
        self.num_regs == 0 || self.is_split
    }

    pub fn is_split(&self) -> bool {
        self.is_split
    }

    pub fn stack_byte_size(&self) -> u32 {
        self.stack_bytes
    }

    /// Stack slots of `slot_size` bytes the stack part occupies
    pub fn stack_slots(&self, slot_size: u32) -> u32 {
        self.stack_bytes.div_ceil(slot_size.max(1))
    }

    pub fn reg_num(&self, index: usize) -> Option<RegNum> {
        self.regs.get(index).copied().flatten()
    }

    pub fn first_reg(&self) -> Option<RegNum> {
        self.reg_num(0)
    }
}

/// What a classifier needs to know about an argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgPlacementRequest {
    pub arg_num: usize,
    pub well_known: WellKnownArg,
    pub arg_type: VarType,
    pub class: Option<ClassHandle>,
    /// Size in bytes; `None` when the type alone gives the size
    pub size: Option<u32>,
}

impl ArgPlacementRequest {
    pub fn is_struct(&self) -> bool {
        self.arg_type.is_struct()
    }
}

/// Places arguments for one call, in evaluation order
pub trait AbiClassifier {
    fn name(&self) -> &str;

    /// Forget all placements; called before the first argument of a call
    fn reset(&mut self);

    fn classify(&mut self, request: &ArgPlacementRequest) -> IrResult<CallArgAbiInfo>;
}

/// Source of temporaries for argument evaluation
pub trait LocalAllocator {
    fn grab_temp(&mut self, ty: VarType) -> LclNum;
}

/// Numbers temporaries sequentially from a starting local
#[derive(Debug, Clone)]
pub struct SequentialTemps {
    next: u32,
    types: Vec<(LclNum, VarType)>,
}

impl SequentialTemps {
    pub fn starting_at(first: LclNum) -> Self {
        SequentialTemps { next: first.0, types: Vec::new() }
    }

    /// Temporaries handed out so far, with their types
    pub fn allocated(&self) -> &[(LclNum, VarType)] {
        &self.types
    }
}

impl LocalAllocator for SequentialTemps {
    fn grab_temp(&mut self, ty: VarType) -> LclNum {
        let lcl = LclNum(self.next);
        self.next += 1;
        self.types.push((lcl, ty));
        lcl
    }
}

/// Register-then-stack placement driven by a `TargetConfig`
#[derive(Debug, Clone)]
pub struct RegisterAbi {
    config: TargetConfig,
    next_int_reg: usize,
    next_float_reg: usize,
    stack_offset: u32,
}

impl RegisterAbi {
    pub fn new(config: TargetConfig) -> Self {
        RegisterAbi { config, next_int_reg: 0, next_float_reg: 0, stack_offset: 0 }
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    fn round_to_slot(&self, size: u32) -> u32 {
        let slot = self.config.stack_slot_size.max(1);
        size.div_ceil(slot) * slot
    }

    fn take_stack(&mut self, bytes: u32) -> u32 {
        let offset = self.stack_offset;
        self.stack_offset += self.round_to_slot(bytes);
        offset
    }

    fn free_int_regs(&self) -> usize {
        self.config.int_arg_regs.len().saturating_sub(self.next_int_reg)
    }
}

impl AbiClassifier for RegisterAbi {
    fn name(&self) -> &str {
        "register"
    }

    fn reset(&mut self) {
        self.next_int_reg = 0;
        self.next_float_reg = 0;
        self.stack_offset = 0;
    }

    fn classify(&mut self, request: &ArgPlacementRequest) -> IrResult<CallArgAbiInfo> {
        let pointer_size = self.config.pointer_size;
        let size = request
            .size
            .or_else(|| request.arg_type.size(pointer_size))
            .ok_or_else(|| IrError::AbiPlacementFailed {
                arg_num: request.arg_num,
                reason: format!("argument of type {} has no known size", request.arg_type),
            })?;
        let is_struct = request.is_struct();
        if is_struct && size > self.config.max_struct_stack_bytes {
            return Err(IrError::AbiPlacementFailed {
                arg_num: request.arg_num,
                reason: format!(
                    "struct of {} bytes exceeds the {} byte limit",
                    size, self.config.max_struct_stack_bytes
                ),
            });
        }

        let mut info = CallArgAbiInfo {
            arg_num: request.arg_num,
            byte_size: size,
            byte_alignment: self.config.stack_slot_size,
            arg_type: request.arg_type,
            is_struct,
            ..CallArgAbiInfo::default()
        };

        if request.well_known == WellKnownArg::RetBuffer {
            if let Some(reg) = self.config.ret_buffer_reg {
                info.regs[0] = Some(RegNum(reg));
                info.num_regs = 1;
                return Ok(info);
            }
        }

        if request.arg_type.is_floating() {
            if let Some(reg) = self.config.float_arg_regs.get(self.next_float_reg) {
                self.next_float_reg += 1;
                info.regs[0] = Some(RegNum(*reg));
                info.num_regs = 1;
                return Ok(info);
            }
        } else if !is_struct || size <= self.config.max_struct_reg_bytes {
            let needed = (size.div_ceil(pointer_size.max(1)) as usize).max(1);
            let free = self.free_int_regs();
            if needed <= free.min(MAX_ARG_REG_COUNT) {
                self.assign_int_regs(&mut info, needed);
                return Ok(info);
            }
            if is_struct && self.config.split_struct_args && free > 0 && free < needed {
                let in_regs = free.min(MAX_ARG_REG_COUNT);
                self.assign_int_regs(&mut info, in_regs);
                let reg_bytes = in_regs as u32 * pointer_size;
                info.is_split = true;
                info.stack_bytes = size.saturating_sub(reg_bytes);
                info.byte_offset = self.take_stack(info.stack_bytes);
                return Ok(info);
            }
        }

        info.stack_bytes = self.round_to_slot(size);
        info.byte_offset = self.take_stack(size);
        Ok(info)
    }
}

impl RegisterAbi {
    fn assign_int_regs(&mut self, info: &mut CallArgAbiInfo, count: usize) {
        for slot in info.regs.iter_mut().take(count) {
            *slot = self.config.int_arg_regs.get(self.next_int_reg).copied().map(RegNum);
            self.next_int_reg += 1;
        }
        info.num_regs = count as u8;
    }
}
