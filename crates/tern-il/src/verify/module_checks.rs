//! Module-level checks

use super::{Diagnostic, DiagnosticCode, Report};
use crate::module::{Extern, Function, Global, GlobalInit, Module};
use crate::types::Type;
use rustc_hash::FxHashMap;

/// Name tables for symbol resolution; the first declaration wins
pub(crate) struct Symbols<'m> {
    pub(crate) functions: FxHashMap<&'m str, &'m Function>,
    pub(crate) externs: FxHashMap<&'m str, &'m Extern>,
    pub(crate) globals: FxHashMap<&'m str, &'m Global>,
}

impl<'m> Symbols<'m> {
    pub(crate) fn collect(module: &'m Module) -> Self {
        let mut functions = FxHashMap::default();
        for func in &module.functions {
            functions.entry(func.name.as_str()).or_insert(func);
        }
        let mut externs = FxHashMap::default();
        for ext in &module.externs {
            externs.entry(ext.name.as_str()).or_insert(ext);
        }
        let mut globals = FxHashMap::default();
        for global in &module.globals {
            globals.entry(global.name.as_str()).or_insert(global);
        }
        Self {
            functions,
            externs,
            globals,
        }
    }
}

fn report_duplicates<'a>(
    names: impl Iterator<Item = &'a str>,
    code: DiagnosticCode,
    what: &str,
    report: &mut Report<'_>,
) {
    let mut seen = FxHashMap::default();
    for name in names {
        let count = seen.entry(name).or_insert(0usize);
        *count += 1;
        if *count == 2 {
            report.push(Diagnostic::error(
                code,
                format!("duplicate {} @{}", what, name),
            ));
        }
    }
}

fn check_global_init(module: &Module, global: &Global, report: &mut Report<'_>) {
    let ok = match (&global.init, global.ty) {
        (_, Type::Void) => false,
        (GlobalInit::Zero, _) => true,
        (GlobalInit::Int(v), ty) => ty.accepts_int_literal(*v),
        (GlobalInit::Float(_), ty) => ty == Type::F64,
        (GlobalInit::Str(id), ty) => {
            if module.strings.get(*id).is_none() {
                report.push(Diagnostic::error(
                    DiagnosticCode::UnknownString,
                    format!("global @{} references missing string #{}", global.name, id.0),
                ));
                return;
            }
            ty == Type::Str
        }
    };
    if !ok {
        let what = match global.init {
            GlobalInit::Zero => "zero",
            GlobalInit::Int(_) => "integer",
            GlobalInit::Float(_) => "float",
            GlobalInit::Str(_) => "string",
        };
        report.push(Diagnostic::error(
            DiagnosticCode::GlobalInit,
            format!(
                "global @{} of type {} cannot hold a {} initializer",
                global.name, global.ty, what
            ),
        ));
    }
}

pub(crate) fn check_module(module: &Module, symbols: &Symbols<'_>, report: &mut Report<'_>) {
    report_duplicates(
        module.externs.iter().map(|e| e.name.as_str()),
        DiagnosticCode::DuplicateExtern,
        "extern",
        report,
    );
    report_duplicates(
        module.globals.iter().map(|g| g.name.as_str()),
        DiagnosticCode::DuplicateGlobal,
        "global",
        report,
    );
    report_duplicates(
        module.functions.iter().map(|f| f.name.as_str()),
        DiagnosticCode::DuplicateFunction,
        "function",
        report,
    );

    // Declarations in layout order.
    for func in &module.functions {
        let first = symbols
            .functions
            .get(func.name.as_str())
            .is_some_and(|f| std::ptr::eq(*f, func));
        if first && symbols.externs.contains_key(func.name.as_str()) {
            report.push(Diagnostic::error(
                DiagnosticCode::SymbolClash,
                format!("@{} is declared both as a function and as an extern", func.name),
            ));
        }
    }
    for global in &module.globals {
        let first = symbols
            .globals
            .get(global.name.as_str())
            .is_some_and(|g| std::ptr::eq(*g, global));
        let name = global.name.as_str();
        if first && (symbols.functions.contains_key(name) || symbols.externs.contains_key(name)) {
            report.push(Diagnostic::error(
                DiagnosticCode::SymbolClash,
                format!("global @{} clashes with a callable symbol", name),
            ));
        }
    }

    for ext in &module.externs {
        if ext.params.contains(&Type::Void) {
            report.push(Diagnostic::error(
                DiagnosticCode::InvalidBlockParam,
                format!("extern @{} declares a void parameter", ext.name),
            ));
        }
    }

    for global in &module.globals {
        check_global_init(module, global, report);
    }
}

#[cfg(test)]
mod tests {
    use super::super::verify;
    use super::*;
    use crate::text::parse_module;

    #[test]
    fn test_duplicate_symbols() {
        let module = parse_module(
            "il 0.2\n\
             extern @f(i64) -> i64\n\
             extern @f(i64) -> i64\n\
             global i64 @g = 1\n\
             global i64 @g = 2\n\
             func @f() -> void {\nentry:\n  ret\n}\n",
        )
        .unwrap();
        let codes: Vec<_> = verify(&module).into_iter().map(|d| d.code).collect();
        assert!(codes.contains(&DiagnosticCode::DuplicateExtern));
        assert!(codes.contains(&DiagnosticCode::DuplicateGlobal));
        assert!(codes.contains(&DiagnosticCode::SymbolClash));
    }

    #[test]
    fn test_global_initializers() {
        let module = parse_module(
            "il 0.2\n\
             global i16 @small = 70000\n\
             global f64 @pi = 3.14\n\
             global i64 @bad = 1.5\n\
             global const str @s = \"ok\"\n",
        )
        .unwrap();
        let diags = verify(&module);
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.code == DiagnosticCode::GlobalInit));
        assert!(diags[0].message.contains("@small"));
        assert!(diags[1].message.contains("@bad"));
    }
}
