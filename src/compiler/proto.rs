// Flat code form produced by the code generator
// One `Proto` per function body; a stack-machine instruction list with
// explicit scope push/pop and spread-aware call/return counts.

use std::rc::Rc;

/// How many values an instruction consumes from the operand stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgCount {
    Fixed(usize),
    /// `n` fixed values plus the pending multi-value group produced by the
    /// immediately preceding spread instruction.
    Variadic(usize),
}

/// How many values a call-like instruction leaves on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetCount {
    Fixed(usize),
    /// All results, recorded as the frame's pending multi-value group.
    Multi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Len,
    BNot,
}

#[derive(Debug, Clone)]
pub enum Instr {
    // literals and stack shuffling
    Nil,
    True,
    False,
    Number(f64),
    Str(Rc<str>),
    Dup,
    Swap,
    Pop(usize),

    // names resolve dynamically through the scope chain
    GetName(Rc<str>),
    SetName(Rc<str>),
    SetLocal(Rc<str>),
    Varargs(RetCount),

    // indexing (metatable-aware)
    Index,
    SetIndex,

    // table constructors (raw writes)
    NewTable,
    TableSet(usize),
    TableSetKeyed,
    TableSpread(usize),

    // operator dispatch
    BinOp(BinOp),
    UnOp(UnOp),

    // control flow
    Jump(usize),
    JumpIfFalse(usize),
    JumpIfFalsePeek(usize),
    JumpIfTruePeek(usize),
    JumpIfNil(usize),
    /// Unwind the scope chain to `depth`, then jump (break and goto).
    LeaveJump { depth: usize, target: usize },
    /// Pops step/limit/init, validates and coerces them, pushes them back.
    ForPrep,
    /// Pops step/limit/index; jumps when the loop is finished.
    ForTest(usize),

    // scopes
    PushScope,
    PopScope,

    // calls
    Call { nargs: ArgCount, ret: RetCount },
    Return(ArgCount),
    Yield { nargs: ArgCount, ret: RetCount },
    Closure(usize),

    // multi-value plumbing
    Adjust { want: usize, have: ArgCount },
    Stash(usize),
    Unstash(usize),
}

/// A compiled function body.
pub struct Proto {
    pub name: String,
    pub params: Vec<Rc<str>>,
    pub is_vararg: bool,
    /// Whether the body block opens its own scope (it declares locals or
    /// binds parameters).
    pub opens_scope: bool,
    pub code: Vec<Instr>,
    pub protos: Vec<Rc<Proto>>,
}

impl Proto {
    pub fn new(name: impl Into<String>) -> Self {
        Proto {
            name: name.into(),
            params: Vec::new(),
            is_vararg: false,
            opens_scope: false,
            code: Vec::new(),
            protos: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Proto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Proto({}, {} instrs, {} children)",
            self.name,
            self.code.len(),
            self.protos.len()
        )
    }
}
