use kestrel_ir::call::SequentialTemps;
use kestrel_ir::types::{ClassHandle, HelperId, MethodHandle};
use kestrel_ir::*;

fn int_args(arena: &mut IrArena, count: u32) -> Vec<NewCallArg> {
    (0..count)
        .map(|n| {
            let node = arena.new_lcl_var(LclNum(n), VarType::Int).unwrap();
            NewCallArg::primitive(node, VarType::Int)
        })
        .collect()
}

fn target(int_regs: Vec<u8>) -> RegisterAbi {
    RegisterAbi::new(TargetConfig { int_arg_regs: int_regs, ..TargetConfig::default() })
}

fn sorted(mut ids: Vec<CallArgId>) -> Vec<CallArgId> {
    ids.sort_by_key(|id| id.0);
    ids
}

// ============================================================================
// Building argument lists
// ============================================================================

#[test]
fn test_push_front_this_pointer() {
    let mut arena = IrArena::new();
    let args = int_args(&mut arena, 3);
    let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
    let obj = arena.new_lcl_var(LclNum(9), VarType::Ref).unwrap();

    let this = arena
        .edit_call_args(call, |args| {
            args.push_front(NewCallArg::primitive(obj, VarType::Ref).well_known(WellKnownArg::ThisPointer))
        })
        .unwrap();

    let args = arena[call].as_call().unwrap().args();
    assert_eq!(args.count_args(), 4);
    assert_eq!(args.arg_by_index(0).unwrap().id(), this);
    assert_eq!(args.this_arg().map(CallArg::node), Some(Some(obj)));
    assert_eq!(args.count_user_args(), 4);
    assert!(!args.has_this_pointer());

    arena.args_complete(call).unwrap();
    assert!(arena[call].as_call().unwrap().args().has_this_pointer());
}

#[test]
fn test_inst_param_goes_after_this() {
    let mut arena = IrArena::new();
    let obj = arena.new_lcl_var(LclNum(0), VarType::Ref).unwrap();
    let mut args = int_args(&mut arena, 1);
    args.insert(0, NewCallArg::primitive(obj, VarType::Ref).well_known(WellKnownArg::ThisPointer));
    let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
    let ctx = arena.new_icon(0x100, VarType::Long).unwrap();

    let inst = arena.edit_call_args(call, |args| args.insert_inst_param(ctx)).unwrap();
    let args = arena[call].as_call().unwrap().args();
    assert_eq!(args.index_of(inst).unwrap(), 1);
    assert_eq!(args.arg_by_index(1).unwrap().well_known(), WellKnownArg::InstParam);
}

#[test]
fn test_call_effects_include_argument_effects() {
    let mut arena = IrArena::new();
    let value = arena.new_icon(1, VarType::Int).unwrap();
    let store = arena.new_store_lcl_var(LclNum(0), value).unwrap();
    let call = arena.new_helper_call(HelperId(3), VarType::Void, Vec::new()).unwrap();
    assert!(!arena[call].has_flags(GenFlags::ASG));

    arena
        .edit_call_args(call, |args| args.push_back(NewCallArg::primitive(store, VarType::Int)))
        .unwrap();
    assert!(arena[call].has_flags(GenFlags::ASG | GenFlags::CALL));
}

#[test]
fn test_reverse_out_of_range() {
    let mut arena = IrArena::new();
    let args = int_args(&mut arena, 2);
    let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
    let err = arena.edit_call_args(call, |args| args.reverse(1, 2)).unwrap_err();
    assert_eq!(err, IrError::ArgIndexOutOfRange { index: 3, count: 2 });
}

// ============================================================================
// Late list
// ============================================================================

#[test]
fn test_late_list_covers_eval_list_and_hidden_args() {
    let mut arena = IrArena::new();
    let args = int_args(&mut arena, 3);
    let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
    let mut abi = target(vec![0, 1, 2, 3]);
    arena.args_complete(call).unwrap();
    arena.determine_abi(call, &mut abi).unwrap();

    let cell = arena.new_icon(0x40, VarType::Long).unwrap();
    let hidden = arena.insert_hidden_arg(call, cell, WellKnownArg::VirtualStubCell, &mut abi).unwrap();

    let args = arena[call].as_call().unwrap().args();
    let eval: Vec<CallArgId> = args.args().map(CallArg::id).collect();
    assert!(eval.contains(&hidden));
    assert_eq!(sorted(args.late_ids().to_vec()), sorted(eval));
    assert_eq!(args.late_args().count(), 4);
}

#[test]
fn test_late_list_puts_registers_before_stack() {
    let mut arena = IrArena::new();
    let args = int_args(&mut arena, 3);
    let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
    arena.args_complete(call).unwrap();
    arena.determine_abi(call, &mut target(vec![5])).unwrap();

    let args = arena[call].as_call().unwrap().args();
    let late: Vec<&CallArg> = args.late_args().collect();
    assert!(late[0].abi().is_passed_in_registers());
    assert!(late[1].abi().is_passed_on_stack());
    assert!(late[1].abi().byte_offset < late[2].abi().byte_offset);
    assert_eq!(args.outgoing_args_stack_size(), 16);
}

#[test]
fn test_struct_args_need_placeholders() {
    let mut arena = IrArena::new();
    let value = arena.new_lcl_var(LclNum(0), VarType::Struct).unwrap();
    let args = vec![NewCallArg::structure(value, ClassHandle(0x30), 24)];
    let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
    arena.args_complete(call).unwrap();

    let arg = arena[call].as_call().unwrap().args().arg_by_index(0).unwrap().clone();
    assert!(arg.need_place());
    assert!(!arg.need_tmp());
    assert_eq!(arg.struct_size(), Some(24));
}

#[test]
fn test_full_lowering_sequence() {
    let mut arena = IrArena::new();
    let inner = arena.new_call_user(MethodHandle(2), VarType::Int, Vec::new()).unwrap();
    let mut args = int_args(&mut arena, 2);
    args.push(NewCallArg::primitive(inner, VarType::Int));
    let call = arena.new_call_user(MethodHandle(1), VarType::Int, args).unwrap();

    arena.args_complete(call).unwrap();
    arena.determine_abi(call, &mut target(vec![0, 1, 2])).unwrap();
    let mut temps = SequentialTemps::starting_at(LclNum(40));
    arena.eval_args_to_temps(call, &mut temps).unwrap();

    let args = arena[call].as_call().unwrap().args();
    assert_eq!(args.stage(), ArgsStage::TempsMaterialized);
    assert!(args.args().all(CallArg::processed));
    assert_eq!(temps.allocated().len(), args.args().filter(|arg| arg.is_tmp()).count());
    for arg in args.late_args() {
        let late = arg.late_node().unwrap();
        assert!(arena[late].has_flags(GenFlags::LATE_ARG));
    }
    // Every argument is still reachable from the call.
    let operands: Vec<NodeId> = arena.operands(call).unwrap().collect();
    for arg in args.args() {
        for node in arg.early_node().into_iter().chain(arg.late_node()) {
            assert!(operands.contains(&node));
        }
    }
}

// ============================================================================
// Failed transitions
// ============================================================================

#[test]
fn test_edit_with_unknown_node_leaves_call_unchanged() {
    let mut arena = IrArena::new();
    let args = int_args(&mut arena, 2);
    let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
    let effects = arena[call].effects();

    let err = arena
        .edit_call_args(call, |args| args.push_back(NewCallArg::primitive(NodeId(9999), VarType::Int)))
        .unwrap_err();
    assert_eq!(err, IrError::UnknownNode(NodeId(9999)));
    assert_eq!(arena[call].as_call().unwrap().args().count_args(), 2);
    arena.refresh_effects(call).unwrap();
    assert_eq!(arena[call].effects(), effects);
}

#[test]
fn test_edit_that_fails_is_rolled_back() {
    let mut arena = IrArena::new();
    let args = int_args(&mut arena, 2);
    let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
    let addr = arena.new_lcl_var(LclNum(7), VarType::ByRef).unwrap();
    let load = arena.new_indir(VarType::Int, addr).unwrap();

    let err = arena
        .edit_call_args(call, |args| {
            args.push_back(NewCallArg::primitive(load, VarType::Int))?;
            args.reverse(0, 5)
        })
        .unwrap_err();
    assert!(matches!(err, IrError::ArgIndexOutOfRange { .. }));
    let args = arena[call].as_call().unwrap().args();
    assert_eq!(args.count_args(), 2);
    assert!(args.args().all(|arg| arg.node() != Some(load)));
    assert!(arena.operands(call).unwrap().all(|operand| operand != load));
}

#[test]
fn test_failed_temp_evaluation_changes_nothing() {
    let mut arena = IrArena::new();
    let plain = arena.new_lcl_var(LclNum(0), VarType::Int).unwrap();
    let no_value = arena.new_helper_call(HelperId(8), VarType::Void, Vec::new()).unwrap();
    let args = vec![NewCallArg::primitive(plain, VarType::Int), NewCallArg::primitive(no_value, VarType::Int)];
    let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
    arena.args_complete(call).unwrap();
    arena.determine_abi(call, &mut target(vec![0, 1])).unwrap();
    assert!(arena[call].as_call().unwrap().args().arg_by_index(1).unwrap().need_tmp());
    let nodes = arena.len();

    let mut temps = SequentialTemps::starting_at(LclNum(40));
    let err = arena.eval_args_to_temps(call, &mut temps).unwrap_err();
    assert!(matches!(err, IrError::UnsupportedOperType { ty: VarType::Void, .. }));

    assert!(!arena[plain].has_flags(GenFlags::LATE_ARG));
    assert!(temps.allocated().is_empty());
    assert_eq!(arena.len(), nodes);
    let args = arena[call].as_call().unwrap().args();
    assert_eq!(args.stage(), ArgsStage::AbiAssigned);
    assert!(args.args().all(|arg| !arg.processed() && arg.late_node().is_none()));
}
