//! Standard runtime externs
//!
//! Printing, strings and `i64` arrays. Array handles travel as `ptr` slots
//! holding the tagged handle bits. Handlers follow the heap's ownership
//! protocol: results are owned by the caller, arguments stay owned by the
//! caller.

use crate::registry::{ExternRegistry, ExternSignature, HostContext, HostError, RegistryError};
use crate::slot::Slot;
use crate::trap::TrapKind;
use tern_il::Type;
use tern_rt::{ElemKind, Element, HeapHandle};

type RuntimeFn = fn(&mut HostContext<'_>, &[Slot]) -> Result<Slot, HostError>;

const RUNTIME: &[(&str, &[Type], Type, RuntimeFn)] = &[
    ("rt_print_i64", &[Type::I64], Type::Void, print_i64),
    ("rt_print_f64", &[Type::F64], Type::Void, print_f64),
    ("rt_print_str", &[Type::Str], Type::Void, print_str),
    ("rt_str_len", &[Type::Str], Type::I64, str_len),
    ("rt_str_concat", &[Type::Str, Type::Str], Type::Str, str_concat),
    ("rt_str_eq", &[Type::Str, Type::Str], Type::I1, str_eq),
    ("rt_str_from_i64", &[Type::I64], Type::Str, str_from_i64),
    ("rt_str_retain", &[Type::Str], Type::Void, str_retain),
    ("rt_str_release", &[Type::Str], Type::Void, str_release),
    ("rt_arr_i64_new", &[Type::I64], Type::Ptr, arr_i64_new),
    ("rt_arr_i64_len", &[Type::Ptr], Type::I64, arr_i64_len),
    ("rt_arr_i64_get", &[Type::Ptr, Type::I64], Type::I64, arr_i64_get),
    ("rt_arr_i64_set", &[Type::Ptr, Type::I64, Type::I64], Type::Void, arr_i64_set),
    ("rt_arr_i64_resize", &[Type::Ptr, Type::I64], Type::Ptr, arr_i64_resize),
    ("rt_arr_retain", &[Type::Ptr], Type::Void, arr_retain),
    ("rt_arr_release", &[Type::Ptr], Type::Void, arr_release),
];

/// Install the standard runtime externs into `registry`
pub fn register_runtime(registry: &ExternRegistry) -> Result<(), RegistryError> {
    for &(name, params, ret, handler) in RUNTIME {
        registry.register(name, ExternSignature::new(params, ret), handler)?;
    }
    Ok(())
}

/// Names and signatures of the standard runtime externs
pub fn runtime_signatures() -> impl Iterator<Item = (&'static str, ExternSignature)> {
    RUNTIME
        .iter()
        .map(|&(name, params, ret, _)| (name, ExternSignature::new(params, ret)))
}

// ---------------------------------------------------------------
// Argument decoding
// ---------------------------------------------------------------

fn arg(args: &[Slot], index: usize) -> Result<Slot, HostError> {
    args.get(index)
        .copied()
        .ok_or_else(|| HostError::Failed(format!("missing argument {}", index)))
}

fn int_arg(args: &[Slot], index: usize) -> Result<i64, HostError> {
    match arg(args, index)? {
        Slot::Int(v) => Ok(v),
        other => Err(HostError::Failed(format!(
            "argument {} must be an integer, found {}",
            index, other
        ))),
    }
}

fn str_arg(args: &[Slot], index: usize) -> Result<HeapHandle, HostError> {
    match arg(args, index)? {
        Slot::Str(Some(h)) => Ok(h),
        Slot::Str(None) => Err(HostError::Trap {
            kind: TrapKind::NullPointer,
            message: format!("argument {} is a null string", index),
        }),
        other => Err(HostError::Failed(format!(
            "argument {} must be a string, found {}",
            index, other
        ))),
    }
}

fn arr_arg(args: &[Slot], index: usize) -> Result<HeapHandle, HostError> {
    match arg(args, index)? {
        Slot::Ptr(0) => Err(HostError::Trap {
            kind: TrapKind::NullPointer,
            message: format!("argument {} is a null array", index),
        }),
        Slot::Ptr(bits) => HeapHandle::from_bits(bits).ok_or_else(|| HostError::Trap {
            kind: TrapKind::InvalidOperation,
            message: format!("argument {} ({:#x}) is not an array handle", index, bits),
        }),
        other => Err(HostError::Failed(format!(
            "argument {} must be an array, found {}",
            index, other
        ))),
    }
}

fn len_arg(args: &[Slot], index: usize) -> Result<usize, HostError> {
    let len = int_arg(args, index)?;
    usize::try_from(len).map_err(|_| HostError::Trap {
        kind: TrapKind::Bounds,
        message: format!("negative array length {}", len),
    })
}

// ---------------------------------------------------------------
// Printing
// ---------------------------------------------------------------

fn print_i64(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    let v = int_arg(args, 0)?;
    ctx.write_line(&v.to_string());
    Ok(Slot::Void)
}

fn print_f64(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    match arg(args, 0)? {
        Slot::Float(v) => {
            ctx.write_line(&v.to_string());
            Ok(Slot::Void)
        }
        other => Err(HostError::Failed(format!(
            "argument 0 must be a float, found {}",
            other
        ))),
    }
}

fn print_str(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    let h = str_arg(args, 0)?;
    let text = ctx.heap().string_as_str(h)?.to_string();
    ctx.write_line(&text);
    Ok(Slot::Void)
}

// ---------------------------------------------------------------
// Strings
// ---------------------------------------------------------------

fn str_len(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    let h = str_arg(args, 0)?;
    Ok(Slot::Int(ctx.heap().string_len(h)? as i64))
}

fn str_concat(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    let a = str_arg(args, 0)?;
    let b = str_arg(args, 1)?;
    Ok(Slot::Str(Some(ctx.heap().string_concat(a, b)?)))
}

fn str_eq(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    let a = str_arg(args, 0)?;
    let b = str_arg(args, 1)?;
    Ok(Slot::bool(ctx.heap().string_eq(a, b)?))
}

fn str_from_i64(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    let v = int_arg(args, 0)?;
    Ok(Slot::Str(Some(ctx.heap().alloc_string(v.to_string()))))
}

fn str_retain(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    // Retaining or releasing the null string is a no-op.
    if let Slot::Str(Some(h)) = arg(args, 0)? {
        ctx.heap().retain(h)?;
    }
    Ok(Slot::Void)
}

fn str_release(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    if let Slot::Str(Some(h)) = arg(args, 0)? {
        ctx.heap().release(h)?;
    }
    Ok(Slot::Void)
}

// ---------------------------------------------------------------
// Arrays
// ---------------------------------------------------------------

fn arr_i64_new(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    let len = len_arg(args, 0)?;
    Ok(Slot::handle_ptr(ctx.heap().array_new(ElemKind::I64, len)?))
}

fn arr_i64_len(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    let h = arr_arg(args, 0)?;
    Ok(Slot::Int(ctx.heap().array_len(h)? as i64))
}

fn arr_i64_get(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    let h = arr_arg(args, 0)?;
    let index = int_arg(args, 1)?;
    match ctx.heap().array_get(h, index)? {
        Element::I64(v) => Ok(Slot::Int(v)),
        other => Err(HostError::Failed(format!(
            "expected an i64 array, found {} elements",
            other.kind()
        ))),
    }
}

fn arr_i64_set(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    let h = arr_arg(args, 0)?;
    let index = int_arg(args, 1)?;
    let value = int_arg(args, 2)?;
    ctx.heap().array_set(h, index, Element::I64(value))?;
    Ok(Slot::Void)
}

fn arr_i64_resize(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    let h = arr_arg(args, 0)?;
    let len = len_arg(args, 1)?;
    Ok(Slot::handle_ptr(ctx.heap().array_resize(h, len)?))
}

fn arr_retain(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    let h = arr_arg(args, 0)?;
    ctx.heap().retain(h)?;
    Ok(Slot::Void)
}

fn arr_release(ctx: &mut HostContext<'_>, args: &[Slot]) -> Result<Slot, HostError> {
    let h = arr_arg(args, 0)?;
    ctx.heap().release(h)?;
    Ok(Slot::Void)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_rt::Heap;

    fn call(heap: &mut Heap, out: &mut Vec<u8>, name: &str, args: &[Slot]) -> Result<Slot, HostError> {
        let registry = ExternRegistry::new();
        register_runtime(&registry).unwrap();
        let entry = registry.resolve(name).unwrap();
        let mut ctx = HostContext::new(heap, out);
        (entry.handler)(&mut ctx, args)
    }

    #[test]
    fn test_every_extern_registered() {
        let registry = ExternRegistry::new();
        register_runtime(&registry).unwrap();
        assert_eq!(registry.len(), 16);
        assert_eq!(runtime_signatures().count(), 16);
        let (_, sig) = runtime_signatures()
            .find(|(name, _)| *name == "rt_arr_i64_set")
            .unwrap();
        assert_eq!(sig.to_string(), "(ptr, i64, i64) -> void");
    }

    #[test]
    fn test_printing() {
        let mut heap = Heap::new();
        let mut out = Vec::new();
        call(&mut heap, &mut out, "rt_print_i64", &[Slot::Int(-7)]).unwrap();
        call(&mut heap, &mut out, "rt_print_f64", &[Slot::Float(2.5)]).unwrap();
        let s = heap.string_new("hi");
        call(&mut heap, &mut out, "rt_print_str", &[Slot::Str(Some(s))]).unwrap();
        assert_eq!(out, b"-7\n2.5\nhi\n");
        let err = call(&mut heap, &mut out, "rt_print_str", &[Slot::Str(None)]).unwrap_err();
        assert_eq!(err.trap_kind(), TrapKind::NullPointer);
    }

    #[test]
    fn test_strings() {
        let mut heap = Heap::new();
        let mut out = Vec::new();
        let a = heap.string_new("ab");
        let n = call(&mut heap, &mut out, "rt_str_from_i64", &[Slot::Int(12)]).unwrap();
        let joined = call(&mut heap, &mut out, "rt_str_concat", &[Slot::Str(Some(a)), n]).unwrap();
        let Slot::Str(Some(j)) = joined else {
            panic!("expected a string, got {}", joined);
        };
        assert_eq!(heap.string_as_str(j).unwrap(), "ab12");
        assert_eq!(
            call(&mut heap, &mut out, "rt_str_len", &[joined]).unwrap(),
            Slot::Int(4)
        );
        assert_eq!(
            call(&mut heap, &mut out, "rt_str_eq", &[joined, joined]).unwrap(),
            Slot::Int(1)
        );
        call(&mut heap, &mut out, "rt_str_retain", &[joined]).unwrap();
        assert_eq!(heap.refcount(j).unwrap(), 2);
        for s in [joined, joined, n, Slot::Str(Some(a)), Slot::Str(None)] {
            call(&mut heap, &mut out, "rt_str_release", &[s]).unwrap();
        }
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn test_arrays() {
        let mut heap = Heap::new();
        let mut out = Vec::new();
        let arr = call(&mut heap, &mut out, "rt_arr_i64_new", &[Slot::Int(2)]).unwrap();
        call(&mut heap, &mut out, "rt_arr_i64_set", &[arr, Slot::Int(1), Slot::Int(9)]).unwrap();
        assert_eq!(
            call(&mut heap, &mut out, "rt_arr_i64_get", &[arr, Slot::Int(1)]).unwrap(),
            Slot::Int(9)
        );
        let err = call(&mut heap, &mut out, "rt_arr_i64_get", &[arr, Slot::Int(2)]).unwrap_err();
        assert_eq!(err.trap_kind(), TrapKind::Bounds);
        let err = call(&mut heap, &mut out, "rt_arr_i64_new", &[Slot::Int(-1)]).unwrap_err();
        assert_eq!(err.trap_kind(), TrapKind::Bounds);

        let grown = call(&mut heap, &mut out, "rt_arr_i64_resize", &[arr, Slot::Int(4)]).unwrap();
        assert_eq!(grown, arr);
        assert_eq!(
            call(&mut heap, &mut out, "rt_arr_i64_len", &[grown]).unwrap(),
            Slot::Int(4)
        );
        call(&mut heap, &mut out, "rt_arr_release", &[grown]).unwrap();
        assert_eq!(heap.live_objects(), 0);

        let err = call(&mut heap, &mut out, "rt_arr_i64_len", &[Slot::Ptr(0)]).unwrap_err();
        assert_eq!(err.trap_kind(), TrapKind::NullPointer);
        let err = call(&mut heap, &mut out, "rt_arr_i64_len", &[Slot::Ptr(4096)]).unwrap_err();
        assert_eq!(err.trap_kind(), TrapKind::InvalidOperation);
    }
}
