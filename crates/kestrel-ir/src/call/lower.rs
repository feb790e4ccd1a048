//! Argument list transitions
//!
//! The three stage changes of a call's argument list, plus late insertion
//! of hidden arguments. They live on `IrArena` because each one needs to
//! look at (or create) argument nodes while editing the list.

use log::debug;

use super::abi::{AbiClassifier, ArgPlacementRequest, CallArgAbiInfo, LocalAllocator};
use super::args::{ArgsStage, CallArg, CallArgId, CallArgs, NewCallArg, WellKnownArg};
use crate::arena::IrArena;
use crate::error::{IrError, IrResult};
use crate::flags::GenFlags;
use crate::node::NodeId;
use crate::oper::Oper;
use crate::types::{LclNum, VarType};

fn placement_request(arg_num: usize, arg: &CallArg) -> ArgPlacementRequest {
    ArgPlacementRequest {
        arg_num,
        well_known: arg.well_known,
        arg_type: arg.sig_type,
        class: arg.sig_class,
        size: arg.struct_size,
    }
}

/// Late list order: register arguments by first register, then stack
/// arguments by offset
fn placement_key(abi: &CallArgAbiInfo) -> (u8, u32) {
    match abi.first_reg() {
        Some(reg) if abi.num_regs > 0 => (0, reg.0 as u32),
        _ => (1, abi.byte_offset),
    }
}

fn stack_end(args: &CallArgs) -> u32 {
    args.args
        .iter()
        .filter(|arg| arg.abi.is_passed_on_stack())
        .map(|arg| arg.abi.byte_offset + arg.abi.stack_bytes)
        .max()
        .unwrap_or(0)
}

fn update_placement_summary(args: &mut CallArgs) {
    args.has_reg_args = args.args.iter().any(|arg| arg.abi.num_regs > 0);
    args.has_stack_args = args.args.iter().any(|arg| arg.abi.is_passed_on_stack());
    args.next_stack_byte_offset = stack_end(args);
}

/// How one argument is evaluated once temps are introduced
enum ArgEval {
    Temp { value: NodeId, ty: VarType },
    Late { value: NodeId },
    Early,
}

struct ArgUpdate {
    id: CallArgId,
    early: Option<NodeId>,
    late: Option<NodeId>,
    tmp: Option<LclNum>,
}

impl IrArena {
    /// Edit the argument list of `call` and refresh the call's effects. The
    /// edit works on a copy of the list, so a failed edit, or one that
    /// names a node outside the arena, leaves the call unchanged.
    pub fn edit_call_args<R>(
        &mut self,
        call: NodeId,
        edit: impl FnOnce(&mut CallArgs) -> IrResult<R>,
    ) -> IrResult<R> {
        let mut edited = self.node(call)?.as_call()?.args().clone();
        let result = edit(&mut edited)?;
        if let Some(node) = edited.args().filter_map(CallArg::node).find(|node| !self.contains(*node)) {
            return Err(IrError::UnknownNode(node));
        }
        let previous = std::mem::replace(self.node_mut(call)?.as_call_mut()?.args_mut(), edited);
        if let Err(err) = self.refresh_effects(call) {
            *self.node_mut(call)?.as_call_mut()?.args_mut() = previous;
            return Err(err);
        }
        Ok(result)
    }

    pub fn set_call_control_expr(&mut self, call: NodeId, expr: Option<NodeId>) -> IrResult<()> {
        if let Some(expr) = expr {
            self.node(expr)?;
        }
        self.node_mut(call)?.as_call_mut()?.control_expr = expr;
        self.refresh_effects(call)
    }

    /// Freeze the evaluation order and decide which arguments must be
    /// evaluated into temps to keep side effects in order
    pub fn args_complete(&mut self, call: NodeId) -> IrResult<()> {
        let args = self.node(call)?.as_call()?.args();
        args.expect_stage(ArgsStage::Open)?;

        let mut effects = Vec::with_capacity(args.count_args());
        let mut invariant = Vec::with_capacity(args.count_args());
        for arg in args.args() {
            let node = match arg.node() {
                Some(node) => self.node(node)?,
                None => return Err(IrError::MissingOperand { oper: Oper::Call, position: effects.len() }),
            };
            effects.push(node.effects());
            invariant.push(node.is_invariant());
        }

        let count = effects.len();
        let mut need_tmp = vec![false; count];
        for index in 0..count {
            let flags = effects[index];
            if flags.contains(GenFlags::ASG) {
                // Earlier arguments must be read before this one writes.
                need_tmp[index] = true;
                for prev in 0..index {
                    if !invariant[prev] {
                        need_tmp[prev] = true;
                    }
                }
            }
            if flags.contains(GenFlags::CALL) && count > 1 {
                need_tmp[index] = true;
                for prev in 0..index {
                    if effects[prev].contains(GenFlags::GLOB_REF) {
                        need_tmp[prev] = true;
                    }
                }
            }
            if flags.contains(GenFlags::EXCEPT)
                && effects[index + 1..].iter().any(|later| later.intersects(GenFlags::SIDE_EFFECT))
            {
                need_tmp[index] = true;
            }
        }

        let args = self.node_mut(call)?.as_call_mut()?.args_mut();
        for (arg, tmp) in args.args.iter_mut().zip(need_tmp) {
            arg.need_tmp = tmp;
            arg.need_place = arg.sig_type.is_struct() && !tmp;
        }
        args.has_this_pointer = args.this_arg().is_some();
        args.has_ret_buffer = args.ret_buffer_arg().is_some();
        args.needs_temps = args.args.iter().any(|arg| arg.need_tmp);
        args.stage = ArgsStage::OrderFinalized;
        debug!(
            "call {}: {} args complete, {} need temps",
            call,
            args.count_args(),
            args.args.iter().filter(|arg| arg.need_tmp).count()
        );
        Ok(())
    }

    /// Place every argument and build the late list. Nothing is changed
    /// unless every argument could be placed.
    pub fn determine_abi(&mut self, call: NodeId, classifier: &mut dyn AbiClassifier) -> IrResult<()> {
        let args = self.node(call)?.as_call()?.args();
        args.expect_stage(ArgsStage::OrderFinalized)?;

        classifier.reset();
        let mut placed = Vec::with_capacity(args.count_args());
        for (arg_num, arg) in args.args().enumerate() {
            let info = classifier.classify(&placement_request(arg_num, arg))?;
            placed.push((arg.id(), info));
        }
        let mut late: Vec<(CallArgId, (u8, u32))> = placed.iter().map(|(id, info)| (*id, placement_key(info))).collect();
        late.sort_by_key(|(_, key)| *key);

        let args = self.node_mut(call)?.as_call_mut()?.args_mut();
        for (arg, (_, info)) in args.args.iter_mut().zip(placed) {
            arg.abi = info;
        }
        args.late = late.into_iter().map(|(id, _)| id).collect();
        update_placement_summary(args);
        args.stage = ArgsStage::AbiAssigned;
        debug!(
            "call {}: ABI assigned by {}, {} bytes of stack arguments",
            call,
            classifier.name(),
            args.next_stack_byte_offset
        );
        Ok(())
    }

    /// Evaluate marked arguments into temps and move register arguments to
    /// the late list. Every argument is checked before anything is built,
    /// so a failure leaves the call and its argument nodes as they were.
    pub fn eval_args_to_temps(&mut self, call: NodeId, locals: &mut dyn LocalAllocator) -> IrResult<()> {
        let args = self.node(call)?.as_call()?.args();
        args.expect_stage(ArgsStage::AbiAssigned)?;

        let mut plan = Vec::with_capacity(args.count_args());
        for arg in args.args() {
            let eval = match arg.early {
                Some(value) if arg.need_tmp => {
                    let ty = self.node(value)?.ty();
                    if matches!(ty, VarType::Void | VarType::Undef | VarType::Unknown) {
                        return Err(IrError::UnsupportedOperType { oper: Oper::StoreLclVar, ty });
                    }
                    ArgEval::Temp { value, ty }
                }
                Some(value) if arg.abi.num_regs > 0 => {
                    self.node(value)?;
                    ArgEval::Late { value }
                }
                _ => ArgEval::Early,
            };
            plan.push((arg.id(), eval));
        }

        let mut updates = Vec::with_capacity(plan.len());
        for (id, eval) in plan {
            let update = match eval {
                ArgEval::Temp { value, ty } => {
                    let tmp = locals.grab_temp(ty);
                    let store = self.new_store_lcl_var(tmp, value)?;
                    let load = self.new_lcl_var(tmp, ty)?;
                    self.node_mut(load)?.add_flags(GenFlags::LATE_ARG);
                    ArgUpdate { id, early: Some(store), late: Some(load), tmp: Some(tmp) }
                }
                ArgEval::Late { value } => ArgUpdate { id, early: None, late: Some(value), tmp: None },
                ArgEval::Early => ArgUpdate { id, early: None, late: None, tmp: None },
            };
            updates.push(update);
        }

        let args = self.node_mut(call)?.as_call_mut()?.args_mut();
        if let Some(missing) = updates.iter().find(|update| args.get(update.id).is_none()) {
            return Err(IrError::UnknownArg(missing.id.0));
        }
        let mut temps = 0;
        let mut moved_late = Vec::new();
        for update in updates {
            let Some(arg) = args.get_mut(update.id) else {
                continue;
            };
            if let Some(tmp) = update.tmp {
                arg.early = update.early;
                arg.is_tmp = true;
                arg.tmp_num = Some(tmp);
                temps += 1;
            } else if let Some(value) = update.late {
                arg.early = None;
                moved_late.push(value);
            }
            if update.late.is_some() {
                arg.late = update.late;
            }
            arg.processed = true;
        }
        args.stage = ArgsStage::TempsMaterialized;
        for value in moved_late {
            self.node_mut(value)?.add_flags(GenFlags::LATE_ARG);
        }
        debug!("call {}: {} args evaluated to temps", call, temps);
        self.refresh_effects(call)
    }

    /// Add a hidden argument after ABI placement. Only roles lowering adds
    /// late are accepted; the argument goes last in evaluation order and
    /// takes its place in the late list by placement.
    pub fn insert_hidden_arg(
        &mut self,
        call: NodeId,
        node: NodeId,
        role: WellKnownArg,
        classifier: &mut dyn AbiClassifier,
    ) -> IrResult<CallArgId> {
        if !role.is_added_late() {
            return Err(IrError::NotLateInsertable { role: role.name() });
        }
        let ty = self.node(node)?.ty();
        let args = self.node(call)?.as_call()?.args();
        let stage = args.stage();
        if !matches!(stage, ArgsStage::AbiAssigned | ArgsStage::TempsMaterialized) {
            return Err(IrError::ArgsStage { expected: ArgsStage::AbiAssigned, found: stage });
        }

        // Replay existing placements so the classifier's cursors match.
        classifier.reset();
        for (arg_num, arg) in args.args().enumerate() {
            classifier.classify(&placement_request(arg_num, arg))?;
        }
        let new_arg = NewCallArg::primitive(node, ty.actual_type()).well_known(role);
        let arg_num = args.count_args();
        let request = ArgPlacementRequest {
            arg_num,
            well_known: role,
            arg_type: new_arg.sig_type,
            class: None,
            size: None,
        };
        let info = classifier.classify(&request)?;

        let in_regs = info.num_regs > 0;
        if stage == ArgsStage::TempsMaterialized && in_regs {
            self.node_mut(node)?.add_flags(GenFlags::LATE_ARG);
        }

        let args = self.node_mut(call)?.as_call_mut()?.args_mut();
        let id = args.insert_at(arg_num, new_arg);
        let key = placement_key(&info);
        let position = args
            .late
            .iter()
            .position(|late| args.get(*late).is_some_and(|arg| placement_key(&arg.abi) > key))
            .unwrap_or(args.late.len());
        args.late.insert(position, id);
        if let Some(arg) = args.get_mut(id) {
            arg.abi = info;
            if stage == ArgsStage::TempsMaterialized {
                arg.processed = true;
                if in_regs {
                    arg.late = arg.early.take();
                }
            }
        }
        update_placement_summary(args);
        debug!("call {}: inserted {} at late position {}", call, role.name(), position);
        self.refresh_effects(call)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{RegisterAbi, SequentialTemps};
    use crate::config::TargetConfig;
    use crate::types::{MethodHandle, RegNum};

    fn two_reg_target() -> RegisterAbi {
        RegisterAbi::new(TargetConfig { int_arg_regs: vec![0, 1], ..TargetConfig::default() })
    }

    fn int_args(arena: &mut IrArena, count: u32) -> Vec<NewCallArg> {
        (0..count)
            .map(|n| {
                let node = arena.new_lcl_var(LclNum(n), VarType::Int).unwrap();
                NewCallArg::primitive(node, VarType::Int)
            })
            .collect()
    }

    #[test]
    fn test_stages_are_ordered() {
        let mut arena = IrArena::new();
        let args = int_args(&mut arena, 2);
        let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
        let mut abi = two_reg_target();
        assert!(matches!(arena.determine_abi(call, &mut abi), Err(IrError::ArgsStage { .. })));
        arena.args_complete(call).unwrap();
        assert!(matches!(arena.args_complete(call), Err(IrError::ArgsStage { .. })));
        let late = arena.new_icon(1, VarType::Int).unwrap();
        let err = arena
            .edit_call_args(call, |args| args.push_back(NewCallArg::primitive(late, VarType::Int)))
            .unwrap_err();
        assert_eq!(err, IrError::ArgsFinalized { stage: ArgsStage::OrderFinalized });
    }

    #[test]
    fn test_assignment_forces_temps() {
        let mut arena = IrArena::new();
        let a = arena.new_lcl_var(LclNum(0), VarType::Int).unwrap();
        let k = arena.new_icon(7, VarType::Int).unwrap();
        let value = arena.new_icon(1, VarType::Int).unwrap();
        let store = arena.new_store_lcl_var(LclNum(0), value).unwrap();
        let lcl = arena.new_lcl_var(LclNum(0), VarType::Int).unwrap();
        let comma = arena.new_binop(Oper::Comma, VarType::Int, store, lcl).unwrap();
        let args = vec![
            NewCallArg::primitive(a, VarType::Int),
            NewCallArg::primitive(k, VarType::Int),
            NewCallArg::primitive(comma, VarType::Int),
        ];
        let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
        arena.args_complete(call).unwrap();

        let args = arena[call].as_call().unwrap().args();
        let need: Vec<bool> = args.args().map(CallArg::need_tmp).collect();
        assert_eq!(need, vec![true, false, true]);
        assert!(args.needs_temps());
    }

    #[test]
    fn test_call_arg_spills_global_reads() {
        let mut arena = IrArena::new();
        let addr = arena.new_lcl_var(LclNum(0), VarType::ByRef).unwrap();
        let load = arena.new_indir(VarType::Int, addr).unwrap();
        let inner = arena.new_call_user(MethodHandle(2), VarType::Int, Vec::new()).unwrap();
        let args = vec![NewCallArg::primitive(load, VarType::Int), NewCallArg::primitive(inner, VarType::Int)];
        let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
        arena.args_complete(call).unwrap();
        let args = arena[call].as_call().unwrap().args();
        assert!(args.args().all(CallArg::need_tmp));
    }

    #[test]
    fn test_late_list_in_placement_order() {
        let mut arena = IrArena::new();
        let args = int_args(&mut arena, 3);
        let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
        arena.args_complete(call).unwrap();
        arena.determine_abi(call, &mut two_reg_target()).unwrap();

        let args = arena[call].as_call().unwrap().args();
        let eval: Vec<CallArgId> = args.args().map(CallArg::id).collect();
        assert_eq!(args.late_ids(), eval.as_slice());
        assert!(args.has_reg_args() && args.has_stack_args());
        assert_eq!(args.outgoing_args_stack_size(), 8);
        assert_eq!(args.arg_by_index(1).unwrap().abi().reg_num(0), Some(RegNum(1)));
    }

    #[test]
    fn test_failed_placement_changes_nothing() {
        let mut arena = IrArena::new();
        let small = arena.new_lcl_var(LclNum(0), VarType::Int).unwrap();
        let big = arena.new_lcl_var(LclNum(1), VarType::Struct).unwrap();
        let args = vec![
            NewCallArg::primitive(small, VarType::Int),
            NewCallArg::structure(big, crate::types::ClassHandle(9), 1 << 20),
        ];
        let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
        arena.args_complete(call).unwrap();
        let err = arena.determine_abi(call, &mut two_reg_target()).unwrap_err();
        assert!(matches!(err, IrError::AbiPlacementFailed { arg_num: 1, .. }));

        let args = arena[call].as_call().unwrap().args();
        assert_eq!(args.stage(), ArgsStage::OrderFinalized);
        assert!(args.late_ids().is_empty());
        assert_eq!(args.arg_by_index(0).unwrap().abi().num_regs, 0);
    }

    #[test]
    fn test_eval_args_to_temps() {
        let mut arena = IrArena::new();
        let value = arena.new_icon(1, VarType::Int).unwrap();
        let store = arena.new_store_lcl_var(LclNum(0), value).unwrap();
        let lcl = arena.new_lcl_var(LclNum(0), VarType::Int).unwrap();
        let comma = arena.new_binop(Oper::Comma, VarType::Int, store, lcl).unwrap();
        let plain = arena.new_lcl_var(LclNum(1), VarType::Int).unwrap();
        let args = vec![NewCallArg::primitive(comma, VarType::Int), NewCallArg::primitive(plain, VarType::Int)];
        let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
        arena.args_complete(call).unwrap();
        arena.determine_abi(call, &mut two_reg_target()).unwrap();
        let mut temps = SequentialTemps::starting_at(LclNum(20));
        arena.eval_args_to_temps(call, &mut temps).unwrap();

        let args = arena[call].as_call().unwrap().args();
        let first = args.arg_by_index(0).unwrap();
        assert!(first.is_tmp());
        assert_eq!(first.tmp_num(), Some(LclNum(20)));
        let early = first.early_node().unwrap();
        assert_eq!(arena[early].oper(), Oper::StoreLclVar);
        assert_eq!(arena[early].op1(), Some(comma));
        let late = first.late_node().unwrap();
        assert_eq!(arena[late].oper(), Oper::LclVar);
        assert!(arena[late].has_flags(GenFlags::LATE_ARG));

        let second = args.arg_by_index(1).unwrap();
        assert_eq!(second.early_node(), None);
        assert_eq!(second.late_node(), Some(plain));
        assert!(args.args().all(CallArg::processed));
        assert_eq!(args.stage(), ArgsStage::TempsMaterialized);
    }

    #[test]
    fn test_hidden_arg_roles() {
        let mut arena = IrArena::new();
        let args = int_args(&mut arena, 1);
        let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
        let cell = arena.new_icon(0x40, VarType::Long).unwrap();
        let mut abi = two_reg_target();
        let err = arena.insert_hidden_arg(call, cell, WellKnownArg::VirtualStubCell, &mut abi).unwrap_err();
        assert!(matches!(err, IrError::ArgsStage { .. }));

        arena.args_complete(call).unwrap();
        arena.determine_abi(call, &mut abi).unwrap();
        let err = arena.insert_hidden_arg(call, cell, WellKnownArg::ThisPointer, &mut abi).unwrap_err();
        assert_eq!(err, IrError::NotLateInsertable { role: "ThisPointer" });

        let id = arena.insert_hidden_arg(call, cell, WellKnownArg::VirtualStubCell, &mut abi).unwrap();
        let args = arena[call].as_call().unwrap().args();
        assert_eq!(args.late_ids().len(), 2);
        assert_eq!(args.late_ids()[1], id);
        assert_eq!(args.get(id).unwrap().abi().first_reg(), Some(RegNum(1)));
    }
}
