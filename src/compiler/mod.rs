// Chunk compiler
// Parses Lua source with emmylua_parser, runs the scope and goto analysis
// passes, then lowers the AST to flat `Proto` code.

mod expr;
mod goto_pass;
mod proto;
mod scope_pass;
mod stmt;

pub use proto::{ArgCount, BinOp, Instr, Proto, RetCount, UnOp};

use std::rc::Rc;

use emmylua_parser::{LuaLanguageLevel, LuaParser, ParserConfig};
use tracing::debug;

use crate::lua_vm::{LuaError, LuaResult};

/// Compile one chunk to its top-level `Proto`. The chunk is a vararg function
/// whose scope chain hangs off the environment's root scope.
pub fn compile(source: &str, chunk_name: &str) -> LuaResult<Rc<Proto>> {
    let tree = LuaParser::parse(source, ParserConfig::with_level(LuaLanguageLevel::Lua53));
    if tree.has_syntax_errors() {
        let errors: Vec<String> = tree
            .get_errors()
            .iter()
            .map(|e| format!("{:?}", e))
            .collect();
        return Err(LuaError::compile(format!(
            "syntax error: {}",
            errors.join(", ")
        )));
    }
    let chunk = tree.get_chunk_node();

    scope_pass::analyze(&chunk)?;
    goto_pass::validate(&chunk)?;

    let mut fs = FuncState::new(chunk_name, Vec::new(), true);
    // the chunk body always opens a scope: it owns chunk-level locals and the
    // script varargs
    fs.proto.opens_scope = true;
    if let Some(block) = chunk.get_block() {
        stmt::compile_function_body(&mut fs, &block)?;
    }
    fs.emit(Instr::Return(ArgCount::Fixed(0)));

    debug!(
        chunk = chunk_name,
        instrs = fs.proto.code.len(),
        "chunk compiled"
    );
    Ok(Rc::new(fs.proto))
}

/// Per-function compilation state.
pub(crate) struct FuncState {
    pub proto: Proto,
    pub scope_depth: usize,
    pub loops: Vec<LoopCtx>,
    pub blocks: Vec<BlockCtx>,
}

pub(crate) struct LoopCtx {
    /// Scope depth to unwind to on break.
    pub depth: usize,
    /// Positions of `LeaveJump` instructions to patch to the loop exit.
    pub breaks: Vec<usize>,
}

#[derive(Default)]
pub(crate) struct BlockCtx {
    /// (name, code position, scope depth)
    pub labels: Vec<(String, usize, usize)>,
    /// unresolved gotos: (name, position of the placeholder `LeaveJump`)
    pub gotos: Vec<(String, usize)>,
}

impl FuncState {
    pub fn new(name: &str, params: Vec<Rc<str>>, is_vararg: bool) -> Self {
        let mut proto = Proto::new(name);
        proto.params = params;
        proto.is_vararg = is_vararg;
        FuncState {
            proto,
            scope_depth: 0,
            loops: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn emit(&mut self, instr: Instr) {
        self.proto.code.push(instr);
    }

    pub fn here(&self) -> usize {
        self.proto.code.len()
    }

    /// Emit a jump-family instruction with a placeholder target.
    pub fn emit_jump(&mut self, instr: Instr) -> usize {
        let pos = self.proto.code.len();
        self.proto.code.push(instr);
        pos
    }

    /// Point the jump at `pos` to the current position.
    pub fn patch_jump(&mut self, pos: usize) {
        let target = self.proto.code.len();
        match &mut self.proto.code[pos] {
            Instr::Jump(t)
            | Instr::JumpIfFalse(t)
            | Instr::JumpIfFalsePeek(t)
            | Instr::JumpIfTruePeek(t)
            | Instr::JumpIfNil(t)
            | Instr::ForTest(t) => *t = target,
            Instr::LeaveJump { target: t, .. } => *t = target,
            other => unreachable!("patching a non-jump instruction {:?}", other),
        }
    }

    pub fn patch_leave(&mut self, pos: usize, depth: usize, target: usize) {
        match &mut self.proto.code[pos] {
            Instr::LeaveJump {
                depth: d,
                target: t,
            } => {
                *d = depth;
                *t = target;
            }
            other => unreachable!("patching a non-leave instruction {:?}", other),
        }
    }

    pub fn open_block(&mut self) {
        self.blocks.push(BlockCtx::default());
    }

    /// Close the innermost block: resolve its gotos against its labels and
    /// propagate the rest outward.
    pub fn close_block(&mut self) -> LuaResult<()> {
        let ctx = self.blocks.pop().unwrap_or_default();
        for (name, pos) in ctx.gotos {
            if let Some((_, target, depth)) = ctx.labels.iter().find(|(l, _, _)| *l == name) {
                let (target, depth) = (*target, *depth);
                self.patch_leave(pos, depth, target);
            } else if let Some(parent) = self.blocks.last_mut() {
                parent.gotos.push((name, pos));
            } else {
                // the goto pass rejects these before codegen
                return Err(LuaError::compile(format!(
                    "no visible label '{}' for goto",
                    name
                )));
            }
        }
        Ok(())
    }
}
