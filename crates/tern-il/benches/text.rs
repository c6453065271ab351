use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tern_il::{parse_module, verify, write_module};

/// Module with `n` copies of a small looping function
fn generate(n: usize) -> String {
    let mut source = String::from("il 0.2\nextern @rt_print_i64(i64) -> void\n");
    for i in 0..n {
        source.push_str(&format!(
            "
func @f{i}(%n: i64) -> i64 {{
entry:
  .loc 1 {line} 1
  br ^loop(0, 0)
loop(%acc: i64, %k: i64):
  %c = scmp_lt %k, %n
  cbr %c, ^body(%acc, %k), ^exit(%acc)
body(%a: i64, %j: i64):
  %x = mul %j, {i}
  %y = add %a, %x
  %nj = add %j, 1
  call @rt_print_i64(%y)
  br ^loop(%y, %nj)
exit(%r: i64):
  ret %r
}}
",
            i = i,
            line = i + 1
        ));
    }
    source
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for n in [1usize, 16, 128] {
        let source = generate(n);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("functions", n), &source, |b, source| {
            b.iter(|| parse_module(black_box(source)).unwrap());
        });
    }
    group.finish();
}

fn bench_write(c: &mut Criterion) {
    let module = parse_module(&generate(128)).unwrap();
    c.bench_function("write_128", |b| b.iter(|| write_module(black_box(&module))));
}

fn bench_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify");
    for n in [1usize, 16, 128] {
        let module = parse_module(&generate(n)).unwrap();
        group.bench_with_input(BenchmarkId::new("functions", n), &module, |b, module| {
            b.iter(|| verify(black_box(module)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_write, bench_verify);
criterion_main!(benches);
