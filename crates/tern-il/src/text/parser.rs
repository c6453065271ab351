//! Module parser

use super::lexer::{tokenize, Spanned, Token};
use super::ParseError;
use crate::instr::Instr;
use crate::module::{
    BasicBlock, Extern, Function, Global, GlobalInit, Module, Param, Visibility,
};
use crate::opcode::{Opcode, TypeCategory};
use crate::types::Type;
use crate::value::{SourceLoc, Value, ValueId};
use rustc_hash::FxHashMap;

type PResult<T> = Result<T, ParseError>;

/// Parse a module from text
pub fn parse_module(source: &str) -> Result<Module, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        module: Module::new(),
    };
    parser.parse()?;
    let mut module = parser.module;
    fix_call_types(&mut module);
    Ok(module)
}

/// Calls are written without a type; take it from the callee signature.
fn fix_call_types(module: &mut Module) {
    let returns: FxHashMap<String, Type> = module
        .functions
        .iter()
        .map(|f| (f.name.clone(), f.ret))
        .chain(module.externs.iter().map(|e| (e.name.clone(), e.ret)))
        .collect();
    for func in &mut module.functions {
        for block in &mut func.blocks {
            for instr in &mut block.instructions {
                if instr.op == Opcode::Call {
                    let callee = instr.callee.as_deref().unwrap_or("");
                    instr.ty = returns.get(callee).copied().unwrap_or(Type::Void);
                }
            }
        }
    }
}

/// Per-function register naming
struct Scope {
    ids: FxHashMap<String, ValueId>,
}

impl Scope {
    fn new() -> Self {
        Self {
            ids: FxHashMap::default(),
        }
    }

    fn value(&mut self, func: &mut Function, name: &str) -> ValueId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = ValueId(self.ids.len() as u32);
        self.ids.insert(name.to_string(), id);
        func.set_value_name(id, name);
        id
    }
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Spanned>,
    pos: usize,
    module: Module,
}

impl<'s> Parser<'s> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        match self.tokens.get(self.pos).or_else(|| self.tokens.last()) {
            Some(s) => ParseError::new(s.line, s.column, message),
            None => ParseError::new(1, 1, message),
        }
    }

    fn describe(&self) -> String {
        match self.tokens.get(self.pos) {
            Some(s) if s.token == Token::Newline => "end of line".to_string(),
            Some(s) => format!("'{}'", &self.source[s.span.clone()]),
            None => "end of input".to_string(),
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> PResult<()> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {}", what, self.describe())))
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(s)) if s == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek() == Some(&Token::Newline) {
            self.pos += 1;
        }
    }

    fn end_of_line(&mut self) -> PResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(Token::Newline) => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.error(format!("expected end of line, found {}", self.describe()))),
        }
    }

    fn ident(&mut self, what: &str) -> PResult<String> {
        match self.peek() {
            Some(Token::Ident(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            _ => Err(self.error(format!("expected {}, found {}", what, self.describe()))),
        }
    }

    fn global_name(&mut self) -> PResult<String> {
        match self.peek() {
            Some(Token::Global(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            _ => Err(self.error(format!("expected @name, found {}", self.describe()))),
        }
    }

    fn parse_type(&mut self) -> PResult<Type> {
        let name = self.ident("type")?;
        Type::from_name(&name).ok_or_else(|| {
            self.pos -= 1;
            self.error(format!("unknown type '{}'", name))
        })
    }

    fn int_literal(&mut self) -> PResult<i64> {
        match self.peek() {
            Some(Token::Int(v)) => {
                let v = *v;
                self.pos += 1;
                Ok(v)
            }
            _ => Err(self.error(format!("expected integer, found {}", self.describe()))),
        }
    }

    fn parse(&mut self) -> PResult<()> {
        self.skip_newlines();
        self.parse_header()?;
        loop {
            self.skip_newlines();
            let keyword = match self.peek() {
                None => return Ok(()),
                Some(Token::Ident(s)) => s.clone(),
                Some(_) => {
                    return Err(self.error(format!(
                        "expected declaration, found {}",
                        self.describe()
                    )))
                }
            };
            self.pos += 1;
            match keyword.as_str() {
                "target" => match self.next() {
                    Some(Token::Str(s)) => {
                        self.module.target = Some(s);
                        self.end_of_line()?;
                    }
                    _ => {
                        self.pos -= 1;
                        return Err(self.error("expected target string"));
                    }
                },
                "extern" => self.parse_extern()?,
                "global" => self.parse_global()?,
                "func" => self.parse_function()?,
                other => {
                    self.pos -= 1;
                    return Err(self.error(format!("unknown declaration '{}'", other)));
                }
            }
        }
    }

    fn parse_header(&mut self) -> PResult<()> {
        if !self.eat_keyword("il") {
            return Err(self.error("module must start with 'il <version>'"));
        }
        let start = match self.tokens.get(self.pos) {
            Some(s) if s.token != Token::Newline => s.span.start,
            _ => return Err(self.error("missing IL version")),
        };
        let mut end = start;
        while let Some(s) = self.tokens.get(self.pos) {
            if s.token == Token::Newline {
                break;
            }
            end = s.span.end;
            self.pos += 1;
        }
        self.module.version = self.source[start..end].trim().to_string();
        self.end_of_line()
    }

    fn parse_extern(&mut self) -> PResult<()> {
        let name = self.global_name()?;
        self.expect(Token::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                params.push(self.parse_type()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(Token::Comma, "',' or ')'")?;
            }
        }
        self.expect(Token::Arrow, "'->'")?;
        let ret = self.parse_type()?;
        self.module.externs.push(Extern::new(name, params, ret));
        self.end_of_line()
    }

    fn parse_global(&mut self) -> PResult<()> {
        let mutable = !self.eat_keyword("const");
        let ty = self.parse_type()?;
        let name = self.global_name()?;
        let init = if self.eat(&Token::Equals) {
            match self.next() {
                Some(Token::Int(v)) => GlobalInit::Int(v),
                Some(Token::Float(v)) => GlobalInit::Float(v),
                Some(Token::Ident(s)) if s == "inf" => GlobalInit::Float(f64::INFINITY),
                Some(Token::Ident(s)) if s == "nan" => GlobalInit::Float(f64::NAN),
                Some(Token::Str(s)) => GlobalInit::Str(self.module.strings.intern(&s)),
                _ => {
                    self.pos -= 1;
                    return Err(self.error("expected global initializer"));
                }
            }
        } else {
            GlobalInit::Zero
        };
        self.module.globals.push(Global {
            name,
            ty,
            init,
            mutable,
        });
        self.end_of_line()
    }

    /// `%name: ty` or `ty %name`
    fn parse_param(&mut self, func: &mut Function, scope: &mut Scope) -> PResult<Param> {
        match self.peek().cloned() {
            Some(Token::Local(name)) => {
                self.pos += 1;
                self.expect(Token::Colon, "':'")?;
                let ty = self.parse_type()?;
                let id = scope.value(func, &name);
                Ok(Param { name, ty, id })
            }
            Some(Token::Ident(_)) => {
                let ty = self.parse_type()?;
                match self.next() {
                    Some(Token::Local(name)) => {
                        let id = scope.value(func, &name);
                        Ok(Param { name, ty, id })
                    }
                    _ => {
                        self.pos -= 1;
                        Err(self.error("expected parameter name"))
                    }
                }
            }
            _ => Err(self.error(format!("expected parameter, found {}", self.describe()))),
        }
    }

    fn parse_param_list(&mut self, func: &mut Function, scope: &mut Scope) -> PResult<Vec<Param>> {
        self.expect(Token::LParen, "'('")?;
        let mut params = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(params);
        }
        loop {
            params.push(self.parse_param(func, scope)?);
            if self.eat(&Token::RParen) {
                return Ok(params);
            }
            self.expect(Token::Comma, "',' or ')'")?;
        }
    }

    fn parse_function(&mut self) -> PResult<()> {
        let visibility = if self.eat_keyword("internal") {
            Visibility::Internal
        } else {
            Visibility::Public
        };
        let name = self.global_name()?;
        let mut func = Function::new(name, Vec::new(), Type::Void);
        func.visibility = visibility;
        let mut scope = Scope::new();
        func.params = self.parse_param_list(&mut func, &mut scope)?;
        self.expect(Token::Arrow, "'->'")?;
        func.ret = self.parse_type()?;
        self.expect(Token::LBrace, "'{'")?;
        self.end_of_line()?;

        let mut pending_loc = SourceLoc::UNKNOWN;
        loop {
            self.skip_newlines();
            match self.peek() {
                None => return Err(self.error("unterminated function body")),
                Some(Token::RBrace) => {
                    self.pos += 1;
                    break;
                }
                _ => {}
            }

            if self.at_block_header() {
                let label = match self.next() {
                    Some(Token::Ident(s)) | Some(Token::Label(s)) => s,
                    _ => return Err(self.error("expected block label")),
                };
                let mut block = BasicBlock::new(label);
                if self.peek() == Some(&Token::LParen) {
                    block.params = self.parse_param_list(&mut func, &mut scope)?;
                }
                self.expect(Token::Colon, "':'")?;
                self.end_of_line()?;
                func.blocks.push(block);
                continue;
            }

            if self.eat_keyword(".loc") {
                let file = self.int_literal()?;
                let line = self.int_literal()?;
                let column = self.int_literal()?;
                pending_loc = SourceLoc::new(file as u32, line as u32, column as u32);
                self.end_of_line()?;
                continue;
            }

            if func.blocks.is_empty() {
                return Err(self.error("instruction outside of a block"));
            }
            let mut instr = self.parse_instr(&mut func, &mut scope)?;
            instr.loc = std::mem::replace(&mut pending_loc, SourceLoc::UNKNOWN);
            if let Some(block) = func.blocks.last_mut() {
                block.instructions.push(instr);
            }
            self.end_of_line()?;
        }

        func.renumber();
        self.module.functions.push(func);
        self.end_of_line()
    }

    fn at_block_header(&self) -> bool {
        matches!(self.peek(), Some(Token::Ident(_)) | Some(Token::Label(_)))
            && matches!(self.peek_at(1), Some(Token::Colon) | Some(Token::LParen))
    }

    fn parse_value(&mut self, func: &mut Function, scope: &mut Scope) -> PResult<Value> {
        let value = match self.peek().cloned() {
            Some(Token::Local(name)) => Value::Temp(scope.value(func, &name)),
            Some(Token::Int(v)) => Value::ConstInt(v),
            Some(Token::Float(v)) => Value::ConstFloat(v),
            Some(Token::Str(s)) => Value::ConstStr(self.module.strings.intern(&s)),
            Some(Token::Global(name)) => Value::GlobalAddr(name),
            Some(Token::Ident(s)) => match s.as_str() {
                "null" => Value::NullPtr,
                "true" => Value::ConstInt(1),
                "false" => Value::ConstInt(0),
                "inf" => Value::ConstFloat(f64::INFINITY),
                "nan" => Value::ConstFloat(f64::NAN),
                _ => return Err(self.error(format!("expected value, found '{}'", s))),
            },
            _ => return Err(self.error(format!("expected value, found {}", self.describe()))),
        };
        self.pos += 1;
        Ok(value)
    }

    fn parse_bundle(&mut self, func: &mut Function, scope: &mut Scope) -> PResult<Vec<Value>> {
        let mut args = Vec::new();
        if !self.eat(&Token::LParen) {
            return Ok(args);
        }
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_value(func, scope)?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(Token::Comma, "',' or ')'")?;
        }
    }

    /// A `^label(args)` target, or a bare identifier label
    fn try_target(&mut self, func: &mut Function, scope: &mut Scope) -> PResult<Option<(String, Vec<Value>)>> {
        let label = match self.peek() {
            Some(Token::Label(s)) => s.clone(),
            Some(Token::Ident(s))
                if !matches!(s.as_str(), "null" | "true" | "false" | "inf" | "nan") =>
            {
                s.clone()
            }
            _ => return Ok(None),
        };
        self.pos += 1;
        let args = self.parse_bundle(func, scope)?;
        Ok(Some((label, args)))
    }

    fn parse_instr(&mut self, func: &mut Function, scope: &mut Scope) -> PResult<Instr> {
        let result = match self.peek() {
            Some(Token::Local(name)) => {
                let name = name.clone();
                self.pos += 1;
                self.expect(Token::Equals, "'='")?;
                Some(scope.value(func, &name))
            }
            _ => None,
        };

        let mnemonic = self.ident("opcode")?;
        let op = Opcode::from_name(&mnemonic).ok_or_else(|| {
            self.pos -= 1;
            self.error(format!("unknown opcode '{}'", mnemonic))
        })?;

        let default_ty = match op.info().result_type {
            TypeCategory::Exact(ty) if result.is_some() => ty,
            _ => Type::Void,
        };
        let mut instr = Instr::new(op, default_ty);
        instr.result = result;

        if op == Opcode::Call {
            instr.callee = Some(self.global_name()?);
            instr.operands = self.parse_bundle(func, scope)?;
            return Ok(instr);
        }

        if self.peek() == Some(&Token::Newline) || self.peek().is_none() {
            if op.has_type_immediate() {
                return Err(self.error(format!("'{}' requires a type", op)));
            }
            return Ok(instr);
        }

        if op.has_type_immediate() {
            instr.ty = self.parse_type()?;
            if self.peek() == Some(&Token::Newline) || self.peek().is_none() {
                return Ok(instr);
            }
            self.expect(Token::Comma, "','")?;
        }

        let takes_labels = op.info().terminator || op.is_branch();
        loop {
            if op == Opcode::SwitchI32 && !instr.labels.is_empty() {
                // case `value -> ^label`
                let case = self.parse_value(func, scope)?;
                self.expect(Token::Arrow, "'->'")?;
                match self.try_target(func, scope)? {
                    Some((label, args)) => {
                        instr.operands.push(case);
                        instr.labels.push(label);
                        instr.br_args.push(args);
                    }
                    None => return Err(self.error("expected case label")),
                }
            } else if takes_labels {
                match self.try_target(func, scope)? {
                    Some((label, args)) => {
                        instr.labels.push(label);
                        instr.br_args.push(args);
                    }
                    None => {
                        if !instr.labels.is_empty() {
                            return Err(self.error("operands must precede branch targets"));
                        }
                        let value = self.parse_value(func, scope)?;
                        instr.operands.push(value);
                    }
                }
            } else {
                let value = self.parse_value(func, scope)?;
                instr.operands.push(value);
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(instr)
    }
}
