//! Opcode definitions and static metadata
//!
//! Every opcode is a variant of the closed [`Opcode`] enum. Its behavior
//! contract lives in an attached [`OpcodeInfo`] descriptor: operand and
//! result categories, side-effect flag, successor count, dispatch category
//! and verification strategy. The verifier and the interpreter both read
//! this table instead of carrying per-opcode knowledge of their own.

use crate::types::Type;
use std::fmt;

/// Upper operand bound used by variadic opcodes
pub const VARIADIC: u8 = u8::MAX;

/// What a single operand slot (or the result) must be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    /// Exactly this type
    Exact(Type),
    /// `i16` or `i32`
    NarrowInt,
    /// Any sized, non-void type
    Any,
    /// The instruction's declared type (`instr.ty`), checked by a specialized rule
    InstrType,
    /// Left entirely to the opcode's specialized checker
    Dynamic,
}

impl TypeCategory {
    /// Whether a value of type `ty` satisfies this category
    ///
    /// `InstrType` and `Dynamic` are never decided here.
    pub fn admits(self, ty: Type) -> bool {
        match self {
            TypeCategory::Exact(expected) => expected == ty,
            TypeCategory::NarrowInt => matches!(ty, Type::I16 | Type::I32),
            TypeCategory::Any => ty != Type::Void,
            TypeCategory::InstrType | TypeCategory::Dynamic => true,
        }
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeCategory::Exact(ty) => write!(f, "{}", ty),
            TypeCategory::NarrowInt => f.write_str("i16|i32"),
            TypeCategory::Any => f.write_str("any"),
            TypeCategory::InstrType => f.write_str("declared type"),
            TypeCategory::Dynamic => f.write_str("dynamic"),
        }
    }
}

/// How many results an opcode produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultArity {
    /// Never produces a result
    None,
    /// Always produces a result
    One,
    /// May produce a result (calls)
    Optional,
}

/// Number of successor labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Successors {
    /// Exactly this many
    Fixed(u8),
    /// One or more, decided by the instruction
    Variadic,
}

/// Interpreter dispatch category
///
/// The table dispatch strategy indexes its handler table with this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DispatchCategory {
    /// Integer arithmetic
    IntArith,
    /// Bitwise and shifts
    Bitwise,
    /// Float arithmetic
    FloatArith,
    /// Comparisons
    Compare,
    /// Conversions
    Cast,
    /// Stack allocation, loads, stores, addresses
    Memory,
    /// Branches, returns and traps
    Control,
    /// Calls
    Call,
    /// Error values
    ErrorOps,
    /// Not executable
    Internal,
}

impl DispatchCategory {
    /// Number of categories
    pub const COUNT: usize = 10;

    /// Table index
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Opcode-specific structural checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialCheck {
    /// `br` / `cbr`: labels exist, bundles match block params
    Branch,
    /// `switch.i32`: case values, labels, bundles
    Switch,
    /// `ret`: value matches the function's return type
    Return,
    /// `call`: callee resolves, signature matches
    Call,
    /// `alloca`: constant size sanity
    Alloca,
    /// `load`: loadable declared type
    Load,
    /// `store`: stored value matches declared type
    Store,
    /// `const_str`: operand names a `str` global
    ConstStr,
    /// Checked narrowing casts: declared target kind
    NarrowCast,
}

/// How the verifier validates an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStrategy {
    /// Generic category matching only
    Default,
    /// Generic matching plus one opcode-specific rule
    Specialized(SpecialCheck),
    /// Never valid in producer-emitted IL
    Reject(&'static str),
}

/// Static description of an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    /// Mnemonic
    pub name: &'static str,
    /// Result arity
    pub result: ResultArity,
    /// Result category, meaningful when `result` is not `None`
    pub result_type: TypeCategory,
    /// Operand categories by slot; slots past the end are `Dynamic`
    pub operands: &'static [TypeCategory],
    /// Minimum operand count
    pub min_operands: u8,
    /// Maximum operand count, or [`VARIADIC`]
    pub max_operands: u8,
    /// Observable side effects (including possible traps)
    pub side_effects: bool,
    /// Successor labels
    pub successors: Successors,
    /// Ends a block
    pub terminator: bool,
    /// Interpreter dispatch category
    pub dispatch: DispatchCategory,
    /// Verification strategy
    pub verify: VerifyStrategy,
}

impl OpcodeInfo {
    const fn new(name: &'static str, dispatch: DispatchCategory) -> Self {
        Self {
            name,
            result: ResultArity::None,
            result_type: TypeCategory::Exact(Type::Void),
            operands: &[],
            min_operands: 0,
            max_operands: 0,
            side_effects: false,
            successors: Successors::Fixed(0),
            terminator: false,
            dispatch,
            verify: VerifyStrategy::Default,
        }
    }

    const fn returns(mut self, category: TypeCategory) -> Self {
        self.result = ResultArity::One;
        self.result_type = category;
        self
    }

    const fn maybe_returns(mut self, category: TypeCategory) -> Self {
        self.result = ResultArity::Optional;
        self.result_type = category;
        self
    }

    const fn operands(mut self, operands: &'static [TypeCategory]) -> Self {
        self.operands = operands;
        self.min_operands = operands.len() as u8;
        self.max_operands = operands.len() as u8;
        self
    }

    const fn operand_range(mut self, min: u8, max: u8) -> Self {
        self.min_operands = min;
        self.max_operands = max;
        self
    }

    const fn effects(mut self) -> Self {
        self.side_effects = true;
        self
    }

    const fn terminates(mut self, successors: Successors) -> Self {
        self.terminator = true;
        self.successors = successors;
        self
    }

    const fn check(mut self, check: SpecialCheck) -> Self {
        self.verify = VerifyStrategy::Specialized(check);
        self
    }

    const fn reject(mut self, reason: &'static str) -> Self {
        self.verify = VerifyStrategy::Reject(reason);
        self
    }

    /// Whether `count` operands are allowed
    pub fn accepts_operand_count(&self, count: usize) -> bool {
        count >= self.min_operands as usize
            && (self.max_operands == VARIADIC || count <= self.max_operands as usize)
    }

    /// Category of operand slot `index`
    pub fn operand_category(&self, index: usize) -> TypeCategory {
        self.operands
            .get(index)
            .copied()
            .unwrap_or(TypeCategory::Dynamic)
    }
}

const I1: TypeCategory = TypeCategory::Exact(Type::I1);
const I32: TypeCategory = TypeCategory::Exact(Type::I32);
const I64: TypeCategory = TypeCategory::Exact(Type::I64);
const F64: TypeCategory = TypeCategory::Exact(Type::F64);
const PTR: TypeCategory = TypeCategory::Exact(Type::Ptr);
const STR: TypeCategory = TypeCategory::Exact(Type::Str);
const ERR: TypeCategory = TypeCategory::Exact(Type::Error);
const TOK: TypeCategory = TypeCategory::Exact(Type::ResumeTok);
const DYN: TypeCategory = TypeCategory::Dynamic;

const fn int_binary(name: &'static str) -> OpcodeInfo {
    OpcodeInfo::new(name, DispatchCategory::IntArith)
        .operands(&[I64, I64])
        .returns(I64)
}

const fn bitwise(name: &'static str) -> OpcodeInfo {
    OpcodeInfo::new(name, DispatchCategory::Bitwise)
        .operands(&[I64, I64])
        .returns(I64)
}

const fn float_binary(name: &'static str) -> OpcodeInfo {
    OpcodeInfo::new(name, DispatchCategory::FloatArith)
        .operands(&[F64, F64])
        .returns(F64)
}

const fn int_compare(name: &'static str) -> OpcodeInfo {
    OpcodeInfo::new(name, DispatchCategory::Compare)
        .operands(&[I64, I64])
        .returns(I1)
}

const fn float_compare(name: &'static str) -> OpcodeInfo {
    OpcodeInfo::new(name, DispatchCategory::Compare)
        .operands(&[F64, F64])
        .returns(I1)
}

const fn internal(name: &'static str) -> OpcodeInfo {
    OpcodeInfo::new(name, DispatchCategory::Internal).effects().reject(
        "exception-handling opcodes are internal to front-end lowering; \
         lower handlers to ordinary control flow before emitting IL",
    )
}

macro_rules! opcodes {
    ($( $(#[$doc:meta])* $variant:ident => $info:expr, )*) => {
        /// IL opcode
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Opcode {
            $( $(#[$doc])* $variant, )*
        }

        impl Opcode {
            /// Every opcode, in discriminant order
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$variant, )* ];

            /// Static descriptor
            pub fn info(self) -> &'static OpcodeInfo {
                match self {
                    $( Opcode::$variant => {
                        const INFO: OpcodeInfo = $info;
                        &INFO
                    } )*
                }
            }
        }
    };
}

opcodes! {
    /// Wrapping integer addition
    Add => int_binary("add"),
    /// Wrapping integer subtraction
    Sub => int_binary("sub"),
    /// Wrapping integer multiplication
    Mul => int_binary("mul"),
    /// Addition trapping on signed overflow
    IAddOvf => int_binary("iadd.ovf").effects(),
    /// Subtraction trapping on signed overflow
    ISubOvf => int_binary("isub.ovf").effects(),
    /// Multiplication trapping on signed overflow
    IMulOvf => int_binary("imul.ovf").effects(),
    /// Signed division
    SDiv => int_binary("sdiv").effects(),
    /// Signed remainder
    SRem => int_binary("srem").effects(),
    /// Unsigned division
    UDiv => int_binary("udiv").effects(),
    /// Unsigned remainder
    URem => int_binary("urem").effects(),

    /// Bitwise and
    And => bitwise("and"),
    /// Bitwise or
    Or => bitwise("or"),
    /// Bitwise xor
    Xor => bitwise("xor"),
    /// Shift left
    Shl => bitwise("shl"),
    /// Logical shift right
    LShr => bitwise("lshr"),
    /// Arithmetic shift right
    AShr => bitwise("ashr"),

    /// Float addition
    FAdd => float_binary("fadd"),
    /// Float subtraction
    FSub => float_binary("fsub"),
    /// Float multiplication
    FMul => float_binary("fmul"),
    /// Float division
    FDiv => float_binary("fdiv"),

    /// Integer equality
    ICmpEq => int_compare("icmp_eq"),
    /// Integer inequality
    ICmpNe => int_compare("icmp_ne"),
    /// Signed less-than
    SCmpLt => int_compare("scmp_lt"),
    /// Signed less-or-equal
    SCmpLe => int_compare("scmp_le"),
    /// Signed greater-than
    SCmpGt => int_compare("scmp_gt"),
    /// Signed greater-or-equal
    SCmpGe => int_compare("scmp_ge"),
    /// Unsigned less-than
    UCmpLt => int_compare("ucmp_lt"),
    /// Unsigned less-or-equal
    UCmpLe => int_compare("ucmp_le"),
    /// Unsigned greater-than
    UCmpGt => int_compare("ucmp_gt"),
    /// Unsigned greater-or-equal
    UCmpGe => int_compare("ucmp_ge"),
    /// Ordered float equality
    FCmpEq => float_compare("fcmp_eq"),
    /// Float inequality (true on NaN)
    FCmpNe => float_compare("fcmp_ne"),
    /// Ordered float less-than
    FCmpLt => float_compare("fcmp_lt"),
    /// Ordered float less-or-equal
    FCmpLe => float_compare("fcmp_le"),
    /// Ordered float greater-than
    FCmpGt => float_compare("fcmp_gt"),
    /// Ordered float greater-or-equal
    FCmpGe => float_compare("fcmp_ge"),

    /// Signed integer to float
    Sitofp => OpcodeInfo::new("sitofp", DispatchCategory::Cast)
        .operands(&[I64])
        .returns(F64),
    /// Float to integer, round half to even, trapping when not representable
    CastFpToSiRteChk => OpcodeInfo::new("cast.fp_to_si.rte.chk", DispatchCategory::Cast)
        .operands(&[F64])
        .returns(TypeCategory::InstrType)
        .effects()
        .check(SpecialCheck::NarrowCast),
    /// `i64` to a narrower integer, trapping when out of range
    CastSiNarrowChk => OpcodeInfo::new("cast.si_narrow.chk", DispatchCategory::Cast)
        .operands(&[I64])
        .returns(TypeCategory::InstrType)
        .effects()
        .check(SpecialCheck::NarrowCast),
    /// Sign-extend `i16`/`i32` to `i64`
    CastSiWiden => OpcodeInfo::new("cast.si_widen", DispatchCategory::Cast)
        .operands(&[TypeCategory::NarrowInt])
        .returns(I64),
    /// `i1` to `i64`
    Zext1 => OpcodeInfo::new("zext1", DispatchCategory::Cast)
        .operands(&[I1])
        .returns(I64),
    /// Low bit of an `i64`
    Trunc1 => OpcodeInfo::new("trunc1", DispatchCategory::Cast)
        .operands(&[I64])
        .returns(I1),

    /// Allocate zeroed bytes in the frame's stack region
    Alloca => OpcodeInfo::new("alloca", DispatchCategory::Memory)
        .operands(&[I64])
        .returns(PTR)
        .effects()
        .check(SpecialCheck::Alloca),
    /// Pointer plus byte offset
    Gep => OpcodeInfo::new("gep", DispatchCategory::Memory)
        .operands(&[PTR, I64])
        .returns(PTR),
    /// Load a value of the declared type
    Load => OpcodeInfo::new("load", DispatchCategory::Memory)
        .operands(&[PTR])
        .returns(TypeCategory::InstrType)
        .effects()
        .check(SpecialCheck::Load),
    /// Store a value of the declared type
    Store => OpcodeInfo::new("store", DispatchCategory::Memory)
        .operands(&[PTR, DYN])
        .effects()
        .check(SpecialCheck::Store),
    /// String handle of a `str` global
    ConstStr => OpcodeInfo::new("const_str", DispatchCategory::Memory)
        .operands(&[DYN])
        .returns(STR)
        .check(SpecialCheck::ConstStr),

    /// Unconditional branch
    Br => OpcodeInfo::new("br", DispatchCategory::Control)
        .terminates(Successors::Fixed(1))
        .check(SpecialCheck::Branch),
    /// Conditional branch on an `i1`
    CBr => OpcodeInfo::new("cbr", DispatchCategory::Control)
        .operands(&[I1])
        .terminates(Successors::Fixed(2))
        .check(SpecialCheck::Branch),
    /// Multi-way branch on an `i32`
    SwitchI32 => OpcodeInfo::new("switch.i32", DispatchCategory::Control)
        .operands(&[I32])
        .operand_range(1, VARIADIC)
        .terminates(Successors::Variadic)
        .check(SpecialCheck::Switch),
    /// Return from the function
    Ret => OpcodeInfo::new("ret", DispatchCategory::Control)
        .operand_range(0, 1)
        .terminates(Successors::Fixed(0))
        .check(SpecialCheck::Return),
    /// Unconditional trap
    Trap => OpcodeInfo::new("trap", DispatchCategory::Control)
        .effects()
        .terminates(Successors::Fixed(0)),
    /// Trap carrying an error value
    TrapFromErr => OpcodeInfo::new("trap.from_err", DispatchCategory::Control)
        .operands(&[ERR])
        .effects()
        .terminates(Successors::Fixed(0)),

    /// Build an error value from a code and message
    TrapErr => OpcodeInfo::new("trap.err", DispatchCategory::ErrorOps)
        .operands(&[I32, STR])
        .returns(ERR),
    /// Code of an error value
    ErrGetCode => OpcodeInfo::new("err.get_code", DispatchCategory::ErrorOps)
        .operands(&[ERR])
        .returns(I32),
    /// Trap kind of an error value
    ErrGetKind => OpcodeInfo::new("err.get_kind", DispatchCategory::ErrorOps)
        .operands(&[ERR])
        .returns(I32),

    /// Call an IL function or extern
    Call => OpcodeInfo::new("call", DispatchCategory::Call)
        .operand_range(0, VARIADIC)
        .maybe_returns(TypeCategory::InstrType)
        .effects()
        .check(SpecialCheck::Call),

    /// Install an exception handler
    EhPush => internal("eh.push").terminates(Successors::Fixed(1)),
    /// Remove the innermost exception handler
    EhPop => internal("eh.pop"),
    /// Marks a handler entry block
    EhEntry => internal("eh.entry"),
    /// Resume at the faulting instruction
    ResumeSame => internal("resume.same")
        .operands(&[TOK])
        .terminates(Successors::Fixed(0)),
    /// Resume after the faulting instruction
    ResumeNext => internal("resume.next")
        .operands(&[TOK])
        .terminates(Successors::Fixed(0)),
    /// Resume at a label
    ResumeLabel => internal("resume.label")
        .operands(&[TOK])
        .terminates(Successors::Fixed(1)),
}

impl Opcode {
    /// Number of opcodes
    pub const COUNT: usize = Opcode::ALL.len();

    /// Mnemonic
    #[inline]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Look up an opcode by mnemonic
    pub fn from_name(name: &str) -> Option<Opcode> {
        Opcode::ALL.iter().copied().find(|op| op.name() == name)
    }

    /// Convert from the raw discriminant
    pub fn from_u8(byte: u8) -> Option<Opcode> {
        Opcode::ALL.get(byte as usize).copied()
    }

    /// Whether this opcode ends a block
    #[inline]
    pub fn is_terminator(self) -> bool {
        self.info().terminator
    }

    /// Whether this opcode has observable side effects
    #[inline]
    pub fn has_side_effects(self) -> bool {
        self.info().side_effects
    }

    /// Whether this opcode transfers control to labels
    pub fn is_branch(self) -> bool {
        matches!(self, Opcode::Br | Opcode::CBr | Opcode::SwitchI32)
    }

    /// Whether loads/stores/casts carry an explicit type immediate in text
    pub fn has_type_immediate(self) -> bool {
        matches!(
            self,
            Opcode::Load | Opcode::Store | Opcode::CastFpToSiRteChk | Opcode::CastSiNarrowChk
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
