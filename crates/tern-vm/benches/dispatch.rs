use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tern_il::{parse_module, VerifiedModule};
use tern_vm::{DispatchStrategy, ExternRegistry, Interpreter, Slot, VmOptions};

const LOOP: &str = "il 0.2
func @main(%n: i64) -> i64 {
entry:
  br ^loop(0, 0)
loop(%acc: i64, %i: i64):
  %c = scmp_lt %i, %n
  cbr %c, ^body(%acc, %i), ^exit(%acc)
body(%a: i64, %j: i64):
  %x = mul %j, 3
  %y = xor %x, %a
  %z = add %y, 7
  %nj = add %j, 1
  br ^loop(%z, %nj)
exit(%r: i64):
  ret %r
}
";

const FIB: &str = "il 0.2
func @fib(%n: i64) -> i64 {
entry:
  %c = scmp_lt %n, 2
  cbr %c, ^base(%n), ^rec
base(%b: i64):
  ret %b
rec:
  %n1 = sub %n, 1
  %n2 = sub %n, 2
  %a = call @fib(%n1)
  %b2 = call @fib(%n2)
  %s = add %a, %b2
  ret %s
}
";

fn bench_strategies(c: &mut Criterion, name: &str, source: &str, entry: &str, arg: i64) {
    let module = parse_module(source).unwrap();
    let verified = VerifiedModule::new(&module).unwrap();
    let registry = Arc::new(ExternRegistry::new());

    let mut group = c.benchmark_group(name);
    let steps = {
        let mut vm = Interpreter::new(&verified, Arc::clone(&registry), VmOptions::default());
        vm.run(entry, &[Slot::Int(arg)]).unwrap();
        vm.stats().steps
    };
    group.throughput(Throughput::Elements(steps));

    for strategy in DispatchStrategy::ALL {
        group.bench_with_input(BenchmarkId::new(strategy.name(), arg), &arg, |b, &arg| {
            let mut vm = Interpreter::new(
                &verified,
                Arc::clone(&registry),
                VmOptions::with_dispatch(strategy),
            );
            b.iter(|| vm.run(entry, &[Slot::Int(black_box(arg))]).unwrap());
        });
    }
    group.finish();
}

fn bench_loop(c: &mut Criterion) {
    bench_strategies(c, "loop", LOOP, "main", 10_000);
}

fn bench_calls(c: &mut Criterion) {
    bench_strategies(c, "fib", FIB, "fib", 20);
}

criterion_group!(benches, bench_loop, bench_calls);
criterion_main!(benches);
