//! Module data model
//!
//! Modules own their functions, functions own their blocks, blocks own
//! their instructions. Cross references are by name (labels, callees,
//! globals) or by index ([`FuncId`], [`BlockId`], [`ValueId`]), never by
//! pointer, so modules clone and tear down as plain data.

use crate::instr::Instr;
use crate::types::Type;
use crate::value::{StrId, Value, ValueId};
use rustc_hash::FxHashMap;
use std::borrow::Cow;

/// IL version written by this crate
pub const IL_VERSION: &str = "0.2";

/// Index of a function within its module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

impl FuncId {
    /// Table index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a block within its function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    /// The entry block
    pub const ENTRY: BlockId = BlockId(0);

    /// Table index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interned string literals
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    strings: Vec<String>,
    index: FxHashMap<String, StrId>,
}

impl StringTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its id
    pub fn intern(&mut self, s: &str) -> StrId {
        if let Some(id) = self.index.get(s) {
            return *id;
        }
        let id = StrId(self.strings.len() as u32);
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), id);
        id
    }

    /// Resolve an id
    pub fn get(&self, id: StrId) -> Option<&str> {
        self.strings.get(id.index()).map(String::as_str)
    }

    /// Id of an already interned string
    pub fn lookup(&self, s: &str) -> Option<StrId> {
        self.index.get(s).copied()
    }

    /// Number of strings
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterate `(id, string)` pairs in interning order
    pub fn iter(&self) -> impl Iterator<Item = (StrId, &str)> {
        self.strings
            .iter()
            .enumerate()
            .map(|(i, s)| (StrId(i as u32), s.as_str()))
    }
}

impl PartialEq for StringTable {
    fn eq(&self, other: &Self) -> bool {
        self.strings == other.strings
    }
}

/// Function or block parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Source-level name (without `%`)
    pub name: String,
    /// Parameter type
    pub ty: Type,
    /// Register receiving the argument
    pub id: ValueId,
}

/// A labelled sequence of instructions ending in one terminator
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    /// Label, unique within the function
    pub label: String,
    /// Block parameters
    pub params: Vec<Param>,
    /// Instructions, terminator last
    pub instructions: Vec<Instr>,
}

impl BasicBlock {
    /// Empty block
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            params: Vec::new(),
            instructions: Vec::new(),
        }
    }

    /// The terminator, if the last instruction is one
    pub fn terminator(&self) -> Option<&Instr> {
        self.instructions.last().filter(|i| i.is_terminator())
    }
}

/// Function visibility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    /// Callable by hosts
    #[default]
    Public,
    /// Module-private
    Internal,
}

/// An IL function
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Name (without `@`)
    pub name: String,
    /// Parameters
    pub params: Vec<Param>,
    /// Return type
    pub ret: Type,
    /// Blocks, entry first
    pub blocks: Vec<BasicBlock>,
    /// Visibility
    pub visibility: Visibility,
    /// Textual names of registers, indexed by [`ValueId`]; empty when unnamed
    pub value_names: Vec<String>,
}

impl Function {
    /// Function with no blocks
    pub fn new(name: impl Into<String>, params: Vec<Param>, ret: Type) -> Self {
        let mut func = Self {
            name: name.into(),
            params: Vec::new(),
            ret,
            blocks: Vec::new(),
            visibility: Visibility::Public,
            value_names: Vec::new(),
        };
        for param in params {
            func.set_value_name(param.id, &param.name);
            func.params.push(param);
        }
        func
    }

    /// Entry block
    pub fn entry(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    /// Block by id
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    /// Label to block index map
    pub fn block_index(&self) -> FxHashMap<&str, BlockId> {
        let mut map = FxHashMap::default();
        for (i, block) in self.blocks.iter().enumerate() {
            map.entry(block.label.as_str()).or_insert(BlockId(i as u32));
        }
        map
    }

    /// Find a block by label
    pub fn find_block(&self, label: &str) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.label == label)
            .map(|i| BlockId(i as u32))
    }

    /// Parameter types in order
    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|p| p.ty).collect()
    }

    /// Number of registers a frame of this function needs
    pub fn register_count(&self) -> usize {
        let mut count = self.value_names.len();
        let mut bump = |id: ValueId| count = count.max(id.index() + 1);
        for param in &self.params {
            bump(param.id);
        }
        for block in &self.blocks {
            for param in &block.params {
                bump(param.id);
            }
            for instr in &block.instructions {
                if let Some(result) = instr.result {
                    bump(result);
                }
            }
        }
        count
    }

    /// Record the textual name of a register
    pub fn set_value_name(&mut self, id: ValueId, name: &str) {
        if self.value_names.len() <= id.index() {
            self.value_names.resize(id.index() + 1, String::new());
        }
        self.value_names[id.index()] = name.to_string();
    }

    /// Renumber registers into layout order
    ///
    /// Function parameters come first, then each block's parameters followed
    /// by its instruction results. Registers read but never defined follow.
    /// Unnamed registers are named after their new id.
    pub fn renumber(&mut self) {
        let mut numbering = Renumbering {
            old_names: std::mem::take(&mut self.value_names),
            map: FxHashMap::default(),
            names: Vec::new(),
        };
        for param in &mut self.params {
            param.id = numbering.assign(param.id);
        }
        for block in &mut self.blocks {
            for param in &mut block.params {
                param.id = numbering.assign(param.id);
            }
            for instr in &mut block.instructions {
                if let Some(result) = instr.result.as_mut() {
                    *result = numbering.assign(*result);
                }
            }
        }
        for instr in self.blocks.iter_mut().flat_map(|b| b.instructions.iter_mut()) {
            for value in instr.operands.iter_mut().chain(instr.br_args.iter_mut().flatten()) {
                if let Value::Temp(id) = value {
                    *id = numbering.assign(*id);
                }
            }
        }
        self.value_names = numbering.names;
    }

    /// Textual name of a register, `t<id>` when unnamed
    pub fn value_name(&self, id: ValueId) -> Cow<'_, str> {
        match self.value_names.get(id.index()) {
            Some(name) if !name.is_empty() => Cow::Borrowed(name.as_str()),
            _ => Cow::Owned(format!("t{}", id.0)),
        }
    }
}

struct Renumbering {
    old_names: Vec<String>,
    map: FxHashMap<ValueId, ValueId>,
    names: Vec<String>,
}

impl Renumbering {
    fn assign(&mut self, old: ValueId) -> ValueId {
        if let Some(new) = self.map.get(&old) {
            return *new;
        }
        let new = ValueId(self.names.len() as u32);
        let name = match self.old_names.get(old.index()) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("t{}", new.0),
        };
        self.names.push(name);
        self.map.insert(old, new);
        new
    }
}

/// Imported function signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extern {
    /// Symbol name (without `@`)
    pub name: String,
    /// Parameter types
    pub params: Vec<Type>,
    /// Return type
    pub ret: Type,
}

impl Extern {
    /// Create an extern declaration
    pub fn new(name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
        }
    }
}

/// Global initializer
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalInit {
    /// Zero-filled
    Zero,
    /// Integer constant
    Int(i64),
    /// Float constant
    Float(f64),
    /// String literal
    Str(StrId),
}

/// Module-level variable
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    /// Name (without `@`)
    pub name: String,
    /// Value type
    pub ty: Type,
    /// Initial value
    pub init: GlobalInit,
    /// Whether stores are permitted
    pub mutable: bool,
}

/// A complete IL module
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Target identifier
    pub target: Option<String>,
    /// IL version
    pub version: String,
    /// Extern declarations
    pub externs: Vec<Extern>,
    /// Globals
    pub globals: Vec<Global>,
    /// Functions
    pub functions: Vec<Function>,
    /// Interned string literals
    pub strings: StringTable,
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl Module {
    /// Empty module at the current IL version
    pub fn new() -> Self {
        Self {
            target: None,
            version: IL_VERSION.to_string(),
            externs: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
            strings: StringTable::new(),
        }
    }

    /// Function by name
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Function id by name
    pub fn function_id(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| FuncId(i as u32))
    }

    /// Function by id
    pub fn function_by_id(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    /// Extern by name
    pub fn extern_decl(&self, name: &str) -> Option<&Extern> {
        self.externs.iter().find(|e| e.name == name)
    }

    /// Global by name
    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Return type of a named callee (function or extern)
    pub fn callee_return_type(&self, name: &str) -> Option<Type> {
        self.function(name)
            .map(|f| f.ret)
            .or_else(|| self.extern_decl(name).map(|e| e.ret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Instr;
    use crate::opcode::Opcode;

    #[test]
    fn test_string_table_interns() {
        let mut table = StringTable::new();
        let a = table.intern("hello");
        let b = table.intern("world");
        assert_eq!(table.intern("hello"), a);
        assert_ne!(a, b);
        assert_eq!(table.get(b), Some("world"));
        assert_eq!(table.lookup("world"), Some(b));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_register_count_and_names() {
        let mut func = Function::new(
            "f",
            vec![Param {
                name: "a".into(),
                ty: Type::I64,
                id: ValueId(0),
            }],
            Type::I64,
        );
        let mut block = BasicBlock::new("entry");
        block.instructions.push(
            Instr::new(Opcode::Add, Type::I64)
                .with_result(ValueId(4))
                .with_operands([Value::temp(0), Value::ConstInt(1)]),
        );
        func.blocks.push(block);
        assert_eq!(func.register_count(), 5);
        assert_eq!(func.value_name(ValueId(0)), "a");
        assert_eq!(func.value_name(ValueId(4)), "t4");
        assert_eq!(func.find_block("entry"), Some(BlockId::ENTRY));
    }

    #[test]
    fn test_renumber_layout_order() {
        let mut func = Function::new("f", Vec::new(), Type::I64);
        func.set_value_name(ValueId(0), "r");
        func.set_value_name(ValueId(1), "x");
        func.set_value_name(ValueId(2), "y");
        let mut entry = BasicBlock::new("entry");
        entry.instructions.push(
            Instr::new(Opcode::Add, Type::I64)
                .with_result(ValueId(1))
                .with_operands([Value::ConstInt(1), Value::ConstInt(2)]),
        );
        entry.instructions.push(
            Instr::new(Opcode::Br, Type::Void).with_target("exit", vec![Value::temp(1)]),
        );
        let mut exit = BasicBlock::new("exit");
        exit.params.push(Param {
            name: "r".into(),
            ty: Type::I64,
            id: ValueId(0),
        });
        exit.instructions.push(
            Instr::new(Opcode::Ret, Type::Void).with_operands([Value::temp(0)]),
        );
        func.blocks.push(entry);
        func.blocks.push(exit);

        func.renumber();
        assert_eq!(func.blocks[0].instructions[0].result, Some(ValueId(0)));
        assert_eq!(func.blocks[0].instructions[1].br_args[0], vec![Value::temp(0)]);
        assert_eq!(func.blocks[1].params[0].id, ValueId(1));
        assert_eq!(func.blocks[1].instructions[0].operands, vec![Value::temp(1)]);
        assert_eq!(func.value_names, vec!["x".to_string(), "r".to_string()]);

        let before = func.clone();
        func.renumber();
        assert_eq!(func, before);
    }

    #[test]
    fn test_module_lookup() {
        let mut module = Module::new();
        module.externs.push(Extern::new("ext", vec![Type::I64], Type::I64));
        module.functions.push(Function::new("main", vec![], Type::Void));
        assert_eq!(module.function_id("main"), Some(FuncId(0)));
        assert_eq!(module.callee_return_type("ext"), Some(Type::I64));
        assert_eq!(module.callee_return_type("main"), Some(Type::Void));
        assert!(module.callee_return_type("nope").is_none());
    }
}
