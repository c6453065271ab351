//! Ownership balance tests
//!
//! Tests cover:
//! - Programs with paired retains and releases leave no mortal objects
//! - The ownership log records a free for every runtime allocation
//! - Copy-on-resize of a shared array driven from IL
//! - An unpaired allocation is observable as a leak
//! - String results of calls that bind no register are released

use tern_il::{parse_module, VerifiedModule};
use tern_rt::{HeapConfig, OwnershipOp};
use tern_vm::{ExternRegistry, Interpreter, Slot, VmOptions};

fn debug_options() -> VmOptions {
    VmOptions {
        heap: HeapConfig::debug(),
        ..VmOptions::default()
    }
}

const STRINGS: &str = "il 0.2
extern @rt_str_from_i64(i64) -> str
extern @rt_str_concat(str, str) -> str
extern @rt_str_retain(str) -> void
extern @rt_str_release(str) -> void
extern @rt_str_eq(str, str) -> i1

global const str @.L0 = \"#\"

func @label(%n: i64) -> str {
entry:
  %p = const_str @.L0
  %d = call @rt_str_from_i64(%n)
  %s = call @rt_str_concat(%p, %d)
  call @rt_str_release(%d)
  ret %s
}

func @main(%n: i64) -> i64 {
entry:
  br ^loop(0, 0)
loop(%i: i64, %hits: i64):
  %c = scmp_lt %i, %n
  cbr %c, ^body(%i, %hits), ^exit(%hits)
body(%j: i64, %h: i64):
  %a = call @label(%j)
  %b = call @label(%j)
  call @rt_str_retain(%a)
  %eq = call @rt_str_eq(%a, %b)
  %e = zext1 %eq
  %nh = add %h, %e
  call @rt_str_release(%a)
  call @rt_str_release(%a)
  call @rt_str_release(%b)
  %nj = add %j, 1
  br ^loop(%nj, %nh)
exit(%r: i64):
  ret %r
}
";

#[test]
fn test_paired_strings_balance() {
    let module = parse_module(STRINGS).unwrap();
    let verified = VerifiedModule::new(&module).unwrap();
    let mut vm = Interpreter::new(&verified, ExternRegistry::global(), debug_options());
    assert_eq!(vm.run("main", &[Slot::Int(20)]).unwrap(), Slot::Int(20));
    assert_eq!(vm.heap().mortal_objects(), 0);

    let events = vm.heap().events();
    let allocs = events.iter().filter(|e| e.op == OwnershipOp::Alloc).count();
    let frees = events.iter().filter(|e| e.op == OwnershipOp::Free).count();
    assert_eq!(allocs - frees, module.strings.len());
    assert!(events.iter().any(|e| e.op == OwnershipOp::Retain && e.refcount == 2));
}

#[test]
fn test_copy_on_resize_from_il() {
    let module = parse_module(
        "il 0.2
extern @rt_arr_i64_new(i64) -> ptr
extern @rt_arr_i64_set(ptr, i64, i64) -> void
extern @rt_arr_i64_get(ptr, i64) -> i64
extern @rt_arr_i64_resize(ptr, i64) -> ptr
extern @rt_arr_retain(ptr) -> void
extern @rt_arr_release(ptr) -> void

func @main() -> i64 {
entry:
  %a = call @rt_arr_i64_new(2)
  call @rt_arr_i64_set(%a, 0, 7)
  call @rt_arr_retain(%a)
  %b = call @rt_arr_i64_resize(%a, 4)
  call @rt_arr_i64_set(%b, 0, 99)
  %x = call @rt_arr_i64_get(%a, 0)
  %y = call @rt_arr_i64_get(%b, 0)
  call @rt_arr_release(%a)
  call @rt_arr_release(%b)
  %hi = mul %x, 1000
  %r = add %hi, %y
  ret %r
}
",
    )
    .unwrap();
    let verified = VerifiedModule::new(&module).unwrap();
    let mut vm = Interpreter::new(&verified, ExternRegistry::global(), debug_options());
    assert_eq!(vm.run("main", &[]).unwrap(), Slot::Int(7099));
    assert_eq!(vm.heap().mortal_objects(), 0);
}

#[test]
fn test_unpaired_allocation_is_a_leak() {
    let module = parse_module(
        "il 0.2
extern @rt_str_from_i64(i64) -> str
extern @rt_str_len(str) -> i64

func @main() -> i64 {
entry:
  %s = call @rt_str_from_i64(12345)
  %l = call @rt_str_len(%s)
  ret %l
}
",
    )
    .unwrap();
    let verified = VerifiedModule::new(&module).unwrap();
    let mut vm = Interpreter::new(&verified, ExternRegistry::global(), VmOptions::default());
    assert_eq!(vm.run("main", &[]).unwrap(), Slot::Int(5));
    assert_eq!(vm.heap().mortal_objects(), 1);
}

#[test]
fn test_unbound_string_results_released() {
    let module = parse_module(
        "il 0.2
extern @rt_str_from_i64(i64) -> str
extern @rt_str_concat(str, str) -> str
extern @rt_str_release(str) -> void

global const str @.L0 = \"lit\"

func @make(%n: i64) -> str {
entry:
  %s = call @rt_str_from_i64(%n)
  ret %s
}

func @literal() -> str {
entry:
  %s = const_str @.L0
  ret %s
}

func @main() -> i64 {
entry:
  %s = call @rt_str_from_i64(77)
  call @rt_str_concat(%s, %s)
  call @make(5)
  call @literal()
  call @rt_str_release(%s)
  ret 0
}
",
    )
    .unwrap();
    let verified = VerifiedModule::new(&module).unwrap();
    let mut vm = Interpreter::new(&verified, ExternRegistry::global(), debug_options());
    assert_eq!(vm.run("main", &[]).unwrap(), Slot::Int(0));
    assert_eq!(vm.heap().mortal_objects(), 0);

    let events = vm.heap().events();
    let allocs = events.iter().filter(|e| e.op == OwnershipOp::Alloc).count();
    let frees = events.iter().filter(|e| e.op == OwnershipOp::Free).count();
    assert_eq!(allocs - frees, module.strings.len());
}
