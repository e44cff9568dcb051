//! Benchmarks for the compile and execute phases of the bytecode pipeline.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spike::bytecode::{Compiler, Vm};
use spike::lexer::Lexer;
use spike::parser::Parser;

/// Parse source into an AST.
fn parse(source: &str) -> spike::ast::Program {
    Parser::new(Lexer::new(source))
        .expect("lexer error")
        .parse_program()
        .expect("parse error")
}

/// Compile and execute via the VM.
fn run_vm(source: &str) {
    let program = parse(source);
    let mut compiler = Compiler::new();
    compiler.compile(&program).expect("compile error");
    let mut vm = Vm::new(compiler.bytecode());
    vm.run().expect("vm runtime error");
}

const FIB_RECURSIVE: &str = "
let fib = fn(n) {
    if (n < 2) { n } else { fib(n - 1) + fib(n - 2) }
};
fib(15);
";

const CLOSURE_CHAIN: &str = "
let makeAdder = fn(x) { fn(y) { x + y } };
let addOne = makeAdder(1);
let build = fn(n, acc) {
    if (n == 0) { acc } else { build(n - 1, addOne(acc)) }
};
build(200, 0);
";

const ARRAY_REBUILD: &str = "
let upTo = fn(n, acc) {
    if (n == 0) { acc } else { upTo(n - 1, push(acc, n)) }
};
let built = upTo(100, []);
len(built) + first(built) + last(built);
";

fn fib_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("fib_recursive");
    group.bench_function("vm", |b| b.iter(|| run_vm(black_box(FIB_RECURSIVE))));
    group.finish();
}

fn fib_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("fib_scaling");

    for n in [10, 15, 18].iter() {
        let source = format!(
            "let fib = fn(n) {{ if (n < 2) {{ n }} else {{ fib(n - 1) + fib(n - 2) }} }}; fib({});",
            n
        );
        group.bench_with_input(BenchmarkId::new("vm", n), &source, |b, src| {
            b.iter(|| run_vm(black_box(src)))
        });
    }

    group.finish();
}

fn closure_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("closures");
    group.bench_function("vm", |b| b.iter(|| run_vm(black_box(CLOSURE_CHAIN))));
    group.finish();
}

fn builtin_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_builtins");
    group.bench_function("vm", |b| b.iter(|| run_vm(black_box(ARRAY_REBUILD))));
    group.finish();
}

/// Benchmark compilation time alone (not execution).
fn compilation_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("compilation_overhead");

    let program = parse(FIB_RECURSIVE);
    group.bench_function("compile_fib", |b| {
        b.iter(|| {
            let mut compiler = Compiler::new();
            compiler.compile(black_box(&program)).expect("compile error");
            compiler.bytecode()
        })
    });

    let program = parse(CLOSURE_CHAIN);
    group.bench_function("compile_closures", |b| {
        b.iter(|| {
            let mut compiler = Compiler::new();
            compiler.compile(black_box(&program)).expect("compile error");
            compiler.bytecode()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    fib_execution,
    fib_scaling,
    closure_execution,
    builtin_execution,
    compilation_overhead,
);

criterion_main!(benches);
