//! End-to-end latency benchmark for the compiler's middle end.
//!
//! Measures each stage of the pipeline in isolation and the whole
//! lex-through-dataflow chain together, so a regression in one pass
//! (say, SSA renaming going quadratic) shows up against its own
//! baseline instead of being buried in a single combined number.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// A COOL program with enough branching and recursion to exercise every
/// stage: a recursive method (`fib`), a loop (`sum_to`), and a few
/// arithmetic locals for constant propagation to chew on.
const SOURCE: &str = r#"
class Main inherits IO {
    fib(n: Int): Int {
        if n <= 1 then n else fib(n - 1) + fib(n - 2) fi
    };

    sum_to(n: Int): Int {
        let acc: Int <- 0, i: Int <- 0 in {
            while i <= n loop {
                acc <- acc + i;
                i <- i + 1;
            } pool;
            acc;
        }
    };

    main(): Object {
        let a: Int <- 2, b: Int <- 3, c: Int <- a + b in
            out_int(c)
    };
};
"#;

fn bench_lex(c: &mut Criterion) {
    c.bench_function("lex", |b| b.iter(|| cool_core::lex(black_box(SOURCE))));
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse", |b| b.iter(|| cool_core::parse(black_box(SOURCE)).unwrap()));
}

fn bench_analyze(c: &mut Criterion) {
    let program = cool_core::parse(SOURCE).unwrap();
    c.bench_function("analyze", |b| b.iter(|| cool_core::analyze(black_box(&program)).unwrap()));
}

fn bench_translate(c: &mut Criterion) {
    let program = cool_core::parse(SOURCE).unwrap();
    let graph = cool_core::analyze(&program).unwrap();
    c.bench_function("translate", |b| {
        b.iter(|| cool_core::translate(black_box(&program), black_box(&graph)))
    });
}

fn bench_ssa_and_dataflow(c: &mut Criterion) {
    let program = cool_core::parse(SOURCE).unwrap();
    let graph = cool_core::analyze(&program).unwrap();
    let tac = cool_core::translate(&program, &graph);
    let method = tac.methods.iter().find(|m| m.method_name == "fib").unwrap();
    let cfg = cool_core::build_cfg(method);

    c.bench_function("ssa", |b| b.iter(|| cool_core::convert_to_ssa(black_box(method), black_box(&cfg))));

    let ssa_method = cool_core::convert_to_ssa(method, &cfg);
    let ssa_cfg = cool_core::build_cfg(&ssa_method);

    c.bench_function("constant_propagation", |b| {
        b.iter_batched(
            || ssa_method.clone(),
            |mut m| cool_core::run_constant_propagation(black_box(&mut m), black_box(&ssa_cfg)),
            criterion::BatchSize::SmallInput,
        )
    });

    c.bench_function("liveness", |b| {
        b.iter(|| cool_core::run_liveness(black_box(&ssa_method), black_box(&ssa_cfg)))
    });
}

fn bench_whole_pipeline(c: &mut Criterion) {
    c.bench_function("whole_pipeline", |b| {
        b.iter(|| {
            let program = cool_core::parse(black_box(SOURCE)).unwrap();
            let graph = cool_core::analyze(&program).unwrap();
            let tac = cool_core::translate(&program, &graph);
            for method in &tac.methods {
                let cfg = cool_core::build_cfg(method);
                let ssa_method = cool_core::convert_to_ssa(method, &cfg);
                let ssa_cfg = cool_core::build_cfg(&ssa_method);
                let mut ssa_method = ssa_method;
                cool_core::run_constant_propagation(&mut ssa_method, &ssa_cfg);
                let liveness = cool_core::run_liveness(&ssa_method, &ssa_cfg);
                let _ = cool_core::compute_live_ranges(&ssa_method, &ssa_cfg, &liveness);
            }
        })
    });
}

criterion_group!(
    benches,
    bench_lex,
    bench_parse,
    bench_analyze,
    bench_translate,
    bench_ssa_and_dataflow,
    bench_whole_pipeline,
);
criterion_main!(benches);
