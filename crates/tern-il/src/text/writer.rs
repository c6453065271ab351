//! Module serializer

use super::lexer::escape;
use crate::instr::Instr;
use crate::module::{BasicBlock, Function, GlobalInit, Module, Param, Visibility};
use crate::opcode::Opcode;
use crate::value::Value;
use std::fmt::Write;

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{:?}", v)
    }
}

/// Render a value reference
pub fn write_value(module: &Module, func: &Function, value: &Value) -> String {
    match value {
        Value::Temp(id) => format!("%{}", func.value_name(*id)),
        Value::ConstInt(v) => v.to_string(),
        Value::ConstFloat(v) => format_float(*v),
        Value::ConstStr(id) => match module.strings.get(*id) {
            Some(s) => format!("\"{}\"", escape(s)),
            None => format!("<str#{}>", id.0),
        },
        Value::GlobalAddr(name) => format!("@{}", name),
        Value::NullPtr => "null".to_string(),
    }
}

fn write_values(module: &Module, func: &Function, values: &[Value]) -> String {
    values
        .iter()
        .map(|v| write_value(module, func, v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_target(module: &Module, func: &Function, label: &str, args: &[Value]) -> String {
    if args.is_empty() {
        format!("^{}", label)
    } else {
        format!("^{}({})", label, write_values(module, func, args))
    }
}

/// Render one instruction without indentation or location
pub fn write_instr(module: &Module, func: &Function, instr: &Instr) -> String {
    let mut out = String::new();
    if let Some(result) = instr.result {
        let _ = write!(out, "%{} = ", func.value_name(result));
    }
    out.push_str(instr.op.name());

    if instr.op == Opcode::Call {
        let callee = instr.callee.as_deref().unwrap_or("?");
        let _ = write!(
            out,
            " @{}({})",
            callee,
            write_values(module, func, &instr.operands)
        );
        return out;
    }

    let mut items = Vec::new();
    if instr.op.has_type_immediate() {
        items.push(instr.ty.name().to_string());
    }
    if instr.op == Opcode::SwitchI32 {
        if let Some(scrutinee) = instr.operands.first() {
            items.push(write_value(module, func, scrutinee));
        }
        for (i, label) in instr.labels.iter().enumerate() {
            let target = write_target(module, func, label, instr.bundle(i));
            if i == 0 {
                items.push(target);
            } else {
                let case = instr
                    .operands
                    .get(i)
                    .map(|v| write_value(module, func, v))
                    .unwrap_or_else(|| "?".to_string());
                items.push(format!("{} -> {}", case, target));
            }
        }
    } else {
        items.extend(instr.operands.iter().map(|v| write_value(module, func, v)));
        for (i, label) in instr.labels.iter().enumerate() {
            items.push(write_target(module, func, label, instr.bundle(i)));
        }
    }

    if !items.is_empty() {
        out.push(' ');
        out.push_str(&items.join(", "));
    }
    out
}

fn write_params(func: &Function, params: &[Param]) -> String {
    params
        .iter()
        .map(|p| format!("%{}: {}", func.value_name(p.id), p.ty))
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_block(out: &mut String, module: &Module, func: &Function, block: &BasicBlock) {
    out.push_str(&block.label);
    if !block.params.is_empty() {
        let _ = write!(out, "({})", write_params(func, &block.params));
    }
    out.push_str(":\n");
    for instr in &block.instructions {
        if instr.loc.is_known() {
            let _ = writeln!(
                out,
                "  .loc {} {} {}",
                instr.loc.file, instr.loc.line, instr.loc.column
            );
        }
        let _ = writeln!(out, "  {}", write_instr(module, func, instr));
    }
}

fn write_function(out: &mut String, module: &Module, func: &Function) {
    out.push_str("func ");
    if func.visibility == Visibility::Internal {
        out.push_str("internal ");
    }
    let _ = writeln!(
        out,
        "@{}({}) -> {} {{",
        func.name,
        write_params(func, &func.params),
        func.ret
    );
    for block in &func.blocks {
        write_block(out, module, func, block);
    }
    out.push_str("}\n");
}

/// Serialize a module to text
pub fn write_module(module: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "il {}", module.version);
    if let Some(target) = &module.target {
        let _ = writeln!(out, "target \"{}\"", escape(target));
    }

    if !module.externs.is_empty() {
        out.push('\n');
    }
    for ext in &module.externs {
        let params = ext
            .params
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "extern @{}({}) -> {}", ext.name, params, ext.ret);
    }

    if !module.globals.is_empty() {
        out.push('\n');
    }
    for global in &module.globals {
        out.push_str("global ");
        if !global.mutable {
            out.push_str("const ");
        }
        let _ = write!(out, "{} @{}", global.ty, global.name);
        match &global.init {
            GlobalInit::Zero => {}
            GlobalInit::Int(v) => {
                let _ = write!(out, " = {}", v);
            }
            GlobalInit::Float(v) => {
                let _ = write!(out, " = {}", format_float(*v));
            }
            GlobalInit::Str(id) => {
                let text = module.strings.get(*id).unwrap_or("");
                let _ = write!(out, " = \"{}\"", escape(text));
            }
        }
        out.push('\n');
    }

    for func in &module.functions {
        out.push('\n');
        write_function(&mut out, module, func);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{FunctionBuilder, ModuleBuilder};
    use crate::types::Type;
    use crate::value::SourceLoc;

    #[test]
    fn test_write_add_module() {
        let mut fb = FunctionBuilder::new("main", Type::I64);
        let entry = fb.create_block("entry", &[]).unwrap();
        fb.switch_to_block(entry).unwrap();
        let v = fb.binary(Opcode::Add, Type::I64, 2i64, 2i64).unwrap();
        fb.ret(Some(v.into())).unwrap();
        let mut mb = ModuleBuilder::new();
        mb.function(fb.finish().unwrap());
        let text = write_module(&mb.finish());
        assert_eq!(
            text,
            "il 0.2\n\nfunc @main() -> i64 {\nentry:\n  %t0 = add 2, 2\n  ret %t0\n}\n"
        );
    }

    #[test]
    fn test_write_branches_and_memory() {
        let mut fb = FunctionBuilder::new("f", Type::Void);
        let a = fb.param("a", Type::I64);
        let entry = fb.create_block("entry", &[]).unwrap();
        let body = fb.create_block("body", &[("x", Type::I64)]).unwrap();
        let done = fb.create_block("done", &[]).unwrap();
        fb.switch_to_block(entry).unwrap();
        fb.set_loc(SourceLoc::new(1, 2, 3));
        let p = fb.alloca(8i64).unwrap();
        fb.store(Type::I32, p, a).unwrap();
        let c = fb.binary(Opcode::SCmpLt, Type::I1, a, 10i64).unwrap();
        fb.cbr(c, body, vec![a.into()], done, vec![]).unwrap();
        fb.switch_to_block(body).unwrap();
        fb.br(done, vec![]).unwrap();
        fb.switch_to_block(done).unwrap();
        fb.ret(None).unwrap();
        let func = fb.finish().unwrap();
        let module = Module::new();

        let lines: Vec<String> = func.blocks[0]
            .instructions
            .iter()
            .map(|i| write_instr(&module, &func, i))
            .collect();
        assert_eq!(
            lines,
            vec![
                "%t2 = alloca 8",
                "store i32, %t2, %a",
                "%t3 = scmp_lt %a, 10",
                "cbr %t3, ^body(%a), ^done",
            ]
        );
        let mut out = String::new();
        write_block(&mut out, &module, &func, &func.blocks[1]);
        assert_eq!(out, "body(%x: i64):\n  .loc 1 2 3\n  br ^done\n");
    }

    #[test]
    fn test_write_special_floats() {
        assert_eq!(format_float(f64::NAN), "nan");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(1e100), "1e100");
    }
}
