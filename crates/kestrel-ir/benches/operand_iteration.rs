use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kestrel_ir::types::MethodHandle;
use kestrel_ir::*;

/// Left-leaning chain of `depth` additions over locals
fn build_chain(arena: &mut IrArena, depth: u32) -> NodeId {
    let mut root = arena.new_lcl_var(LclNum(0), VarType::Int).unwrap();
    for n in 1..=depth {
        let leaf = arena.new_lcl_var(LclNum(n), VarType::Int).unwrap();
        root = arena.new_binop(Oper::Add, VarType::Int, root, leaf).unwrap();
    }
    root
}

fn bench_operands(c: &mut Criterion) {
    let mut group = c.benchmark_group("operands");

    for depth in [16u32, 256] {
        let mut arena = IrArena::new();
        let root = build_chain(&mut arena, depth);
        group.bench_with_input(BenchmarkId::new("walk_tree", depth), &root, |b, root| {
            b.iter(|| {
                let mut count = 0usize;
                let mut stack = vec![*root];
                while let Some(id) = stack.pop() {
                    count += 1;
                    stack.extend(arena.operands(id).unwrap());
                }
                black_box(count)
            });
        });
    }

    let mut arena = IrArena::new();
    let args = (0..8)
        .map(|n| {
            let node = arena.new_lcl_var(LclNum(n), VarType::Int).unwrap();
            NewCallArg::primitive(node, VarType::Int)
        })
        .collect();
    let call = arena.new_call_user(MethodHandle(1), VarType::Void, args).unwrap();
    group.bench_function("call_operands", |b| {
        b.iter(|| arena.operands(black_box(call)).unwrap().count());
    });

    group.finish();
}

fn bench_sequence(c: &mut Criterion) {
    let mut arena = IrArena::new();
    let root = build_chain(&mut arena, 256);

    c.bench_function("sequence_chain_256", |b| {
        b.iter(|| ExecOrder::sequence(&arena, black_box(root)).unwrap().len());
    });
}

criterion_group!(benches, bench_operands, bench_sequence);
criterion_main!(benches);
