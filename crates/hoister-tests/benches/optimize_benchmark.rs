use criterion::{criterion_group, criterion_main, Criterion};
use hoister::optimizer::optimize;
use hoister::parser::parse_program;
use hoister::{optimize_source, OptimizeOptions};
use hoister_tests::{run, FIXTURES};
use std::fmt::Write;
use std::hint::black_box;

/// A long straight-line program with nested loops and branches, `blocks`
/// repetitions of the same shape.
fn generated_program(blocks: usize) -> String {
    let mut src = String::from("int[] a = new int[8];\nPoint p = new Point();\np.x = 1;\nint s = 0;\n");
    for b in 0..blocks {
        let _ = write!(
            src,
            "for (int i = 0; i < a.length; i++) {{\n\
             \x20   a[i] = a[i] + p.x * {b};\n\
             \x20   if (a[i] > p.x) {{\n\
             \x20       s += a[i] - p.x;\n\
             \x20   }} else {{\n\
             \x20       s += a[i] + p.x;\n\
             \x20   }}\n\
             }}\n\
             p.x = s % 7 + a.length;\n"
        );
    }
    src.push_str("print(s);\n");
    src
}

fn optimize_fixtures_bench(c: &mut Criterion) {
    let options = OptimizeOptions::default();
    c.bench_function("optimize all fixtures", |b| {
        b.iter(|| {
            for (_, source) in FIXTURES {
                black_box(optimize_source(black_box(source), &options).ok());
            }
        })
    });
}

fn optimize_generated_bench(c: &mut Criterion) {
    let source = generated_program(200);
    let Ok(program) = parse_program(&source) else {
        return;
    };
    c.bench_function("optimize generated 200 blocks", |b| {
        b.iter(|| {
            let mut block = program.clone();
            black_box(optimize(&mut block).ok());
        })
    });
}

// ─── Effect of hoisting on the interpreter ───────────────────────────────────

fn run_generated_orig_bench(c: &mut Criterion) {
    let Ok(program) = parse_program(&generated_program(20)) else {
        return;
    };
    c.bench_function("run generated 20 blocks", |b| {
        b.iter(|| black_box(run(&program).ok()))
    });
}

fn run_generated_optimized_bench(c: &mut Criterion) {
    let Ok(mut program) = parse_program(&generated_program(20)) else {
        return;
    };
    if optimize(&mut program).is_err() {
        return;
    }
    c.bench_function("run generated 20 blocks optimized", |b| {
        b.iter(|| black_box(run(&program).ok()))
    });
}

criterion_group!(
    benches,
    optimize_fixtures_bench,
    optimize_generated_bench,
    run_generated_orig_bench,
    run_generated_optimized_bench
);
criterion_main!(benches);
