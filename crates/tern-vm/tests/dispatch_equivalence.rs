//! Differential tests across dispatch strategies
//!
//! Tests cover:
//! - Every program in the corpus produces the same return value or trap
//!   under every dispatch strategy
//! - Emitted output bytes are identical
//! - Per-opcode execution counts are identical

use tern_il::{parse_module, VerifiedModule};
use tern_vm::{DispatchStrategy, ExternRegistry, Interpreter, Slot, Trap, VmOptions};

struct Case {
    name: &'static str,
    source: &'static str,
    entry: &'static str,
    args: &'static [Slot],
}

const CORPUS: &[Case] = &[
    Case {
        name: "arith",
        source: "il 0.2
func @main(%a: i64, %b: i64) -> i64 {
entry:
  %s = add %a, %b
  %d = sub %s, 3
  %m = mul %d, %b
  %q = sdiv %m, 2
  %r = srem %q, 7
  %u = udiv %m, 3
  %v = urem %u, 11
  %x = xor %r, %v
  %y = shl %x, 65
  %z = ashr %y, 1
  %w = lshr %z, 0
  %o = or %w, 256
  %n = and %o, 4095
  ret %n
}
",
        entry: "main",
        args: &[Slot::Int(17), Slot::Int(-5)],
    },
    Case {
        name: "compare_and_select",
        source: "il 0.2
func @main(%a: i64) -> i64 {
entry:
  %lt = scmp_lt %a, 0
  %ult = ucmp_lt %a, 0
  %f = sitofp %a
  %ne = fcmp_ne %f, 1.5
  %x = zext1 %lt
  %y = zext1 %ult
  %z = zext1 %ne
  %t = add %x, %y
  %r = add %t, %z
  %b = trunc1 %r
  cbr %b, ^odd(%r), ^even(%r)
odd(%o: i64):
  ret %o
even(%e: i64):
  %n = sub 0, %e
  ret %n
}
",
        entry: "main",
        args: &[Slot::Int(-3)],
    },
    Case {
        name: "floats",
        source: "il 0.2
extern @rt_print_f64(f64) -> void

func @main() -> i64 {
entry:
  %a = fadd 0.5, 2.0
  %b = fdiv %a, 4.0
  %c = fmul %b, -8.0
  %d = fsub %c, 0.25
  call @rt_print_f64(%d)
  %i = cast.fp_to_si.rte.chk i64, %d
  ret %i
}
",
        entry: "main",
        args: &[],
    },
    Case {
        name: "loop_and_print",
        source: "il 0.2
extern @rt_print_i64(i64) -> void

func @main(%n: i64) -> i64 {
entry:
  br ^loop(0, 0)
loop(%acc: i64, %i: i64):
  %c = scmp_lt %i, %n
  cbr %c, ^body(%acc, %i), ^exit(%acc)
body(%a: i64, %j: i64):
  %sq = mul %j, %j
  call @rt_print_i64(%sq)
  %na = add %a, %sq
  %nj = add %j, 1
  br ^loop(%na, %nj)
exit(%r: i64):
  ret %r
}
",
        entry: "main",
        args: &[Slot::Int(12)],
    },
    Case {
        name: "switch",
        source: "il 0.2
func @main(%k: i64) -> i64 {
entry:
  br ^loop(0, 0)
loop(%acc: i64, %i: i64):
  %c = scmp_lt %i, %k
  cbr %c, ^dispatch(%acc, %i), ^exit(%acc)
dispatch(%a: i64, %j: i64):
  %m = srem %j, 4
  %n = cast.si_narrow.chk i32, %m
  %nj = add %j, 1
  switch.i32 %n, ^loop(%a, %nj), 0 -> ^zero(%a, %nj), 1 -> ^one(%a, %nj)
zero(%za: i64, %zj: i64):
  %z = add %za, 100
  br ^loop(%z, %zj)
one(%oa: i64, %oj: i64):
  %o = add %oa, 1
  br ^loop(%o, %oj)
exit(%r: i64):
  ret %r
}
",
        entry: "main",
        args: &[Slot::Int(10)],
    },
    Case {
        name: "recursion",
        source: "il 0.2
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
",
        entry: "fib",
        args: &[Slot::Int(15)],
    },
    Case {
        name: "memory",
        source: "il 0.2
global i64 @total = 5

func @main() -> i64 {
entry:
  %p = alloca 24
  %q = gep %p, 16
  store i16, %p, -2
  store f64, %q, 1.25
  %a = load i16, %p
  %b = load f64, %q
  %w = cast.si_widen %a
  %t = load i64, @total
  %s = add %w, %t
  store i64, @total, %s
  %f = sitofp %s
  %g = fadd %f, %b
  %r = cast.fp_to_si.rte.chk i64, %g
  ret %r
}
",
        entry: "main",
        args: &[],
    },
    Case {
        name: "strings",
        source: "il 0.2
extern @rt_str_from_i64(i64) -> str
extern @rt_str_concat(str, str) -> str
extern @rt_str_len(str) -> i64
extern @rt_print_str(str) -> void
extern @rt_str_release(str) -> void

global const str @.L0 = \"value=\"

func @main(%n: i64) -> i64 {
entry:
  %p = const_str @.L0
  %d = call @rt_str_from_i64(%n)
  %s = call @rt_str_concat(%p, %d)
  call @rt_print_str(%s)
  %l = call @rt_str_len(%s)
  call @rt_str_release(%d)
  call @rt_str_release(%s)
  ret %l
}
",
        entry: "main",
        args: &[Slot::Int(-1234)],
    },
    Case {
        name: "divide_by_zero",
        source: "il 0.2
extern @rt_print_i64(i64) -> void

func @main(%a: i64) -> i64 {
entry:
  call @rt_print_i64(%a)
  .loc 1 5 7
  %q = udiv %a, 0
  ret %q
}
",
        entry: "main",
        args: &[Slot::Int(3)],
    },
    Case {
        name: "overflow_in_callee",
        source: "il 0.2
func @grow(%x: i64) -> i64 {
entry:
  %y = imul.ovf %x, %x
  %r = call @grow(%y)
  ret %r
}
",
        entry: "grow",
        args: &[Slot::Int(3)],
    },
    Case {
        name: "bad_cast",
        source: "il 0.2
func @main(%f: f64) -> i16 {
entry:
  %r = cast.fp_to_si.rte.chk i16, %f
  ret %r
}
",
        entry: "main",
        args: &[Slot::Float(40000.0)],
    },
    Case {
        name: "error_values",
        source: "il 0.2
global const str @.L0 = \"bad input\"

func @main() -> void {
entry:
  %m = const_str @.L0
  %e = trap.err 5, %m
  trap.from_err %e
}
",
        entry: "main",
        args: &[],
    },
];

struct Observed {
    result: Result<Slot, Trap>,
    output: Vec<u8>,
    counts: Vec<(tern_il::Opcode, u64)>,
}

fn observe(case: &Case, strategy: DispatchStrategy) -> Observed {
    let module = parse_module(case.source).unwrap_or_else(|e| panic!("{}: {}", case.name, e));
    let verified = VerifiedModule::new(&module)
        .unwrap_or_else(|d| panic!("{}: {:#?}", case.name, d));
    let options = VmOptions {
        count_opcodes: true,
        ..VmOptions::with_dispatch(strategy)
    };
    let mut vm = Interpreter::new(&verified, ExternRegistry::global(), options);
    let result = vm.run(case.entry, case.args);
    Observed {
        result,
        output: vm.take_output(),
        counts: vm.stats().opcode_counts().collect(),
    }
}

#[test]
fn test_corpus_is_strategy_independent() {
    for case in CORPUS {
        let reference = observe(case, DispatchStrategy::Switch);
        for strategy in DispatchStrategy::ALL {
            let other = observe(case, strategy);
            assert_eq!(reference.result, other.result, "{} under {}", case.name, strategy.name());
            assert_eq!(reference.output, other.output, "{} under {}", case.name, strategy.name());
            assert_eq!(reference.counts, other.counts, "{} under {}", case.name, strategy.name());
        }
    }
}

#[test]
fn test_corpus_expected_outcomes() {
    let expect_value = |name: &str, value: Slot| {
        let case = CORPUS.iter().find(|c| c.name == name).unwrap();
        assert_eq!(observe(case, DispatchStrategy::Table).result.unwrap(), value, "{}", name);
    };
    expect_value("recursion", Slot::Int(610));
    expect_value("loop_and_print", Slot::Int(506));
    expect_value("switch", Slot::Int(303));
    expect_value("strings", Slot::Int(11));
    expect_value("floats", Slot::Int(-5));

    let case = CORPUS.iter().find(|c| c.name == "strings").unwrap();
    assert_eq!(observe(case, DispatchStrategy::Switch).output, b"value=-1234\n");

    let trap_kind = |name: &str| {
        let case = CORPUS.iter().find(|c| c.name == name).unwrap();
        observe(case, DispatchStrategy::Table).result.unwrap_err().kind
    };
    use tern_vm::TrapKind;
    assert_eq!(trap_kind("divide_by_zero"), TrapKind::DivideByZero);
    assert_eq!(trap_kind("overflow_in_callee"), TrapKind::Overflow);
    assert_eq!(trap_kind("bad_cast"), TrapKind::InvalidCast);
    assert_eq!(trap_kind("error_values"), TrapKind::NullPointer);
}
