// Statement lowering

use std::rc::Rc;

use emmylua_parser::{
    LuaAssignStat, LuaBlock, LuaDoStat, LuaExpr, LuaForRangeStat, LuaForStat, LuaFuncStat,
    LuaIfStat, LuaLocalFuncStat, LuaLocalStat, LuaRepeatStat, LuaReturnStat, LuaStat, LuaVarExpr,
    LuaWhileStat,
};

use super::expr::{
    compile_call_expr, compile_closure_expr, compile_expr, compile_expr_list, compile_index_key,
};
use super::scope_pass::{block_opens_scope, BlockKind};
use super::{ArgCount, BinOp, FuncState, Instr, LoopCtx, RetCount};
use crate::lua_vm::{LuaError, LuaResult};

// hidden control bindings; the parentheses keep them out of reach of Lua code
const FOR_INDEX: &str = "(for index)";
const FOR_LIMIT: &str = "(for limit)";
const FOR_STEP: &str = "(for step)";
const FOR_ITER: &str = "(for iterator)";
const FOR_STATE: &str = "(for state)";
const FOR_CONTROL: &str = "(for control)";

/// Compile a function body block. The frame creates the entry scope (binding
/// parameters and varargs), so no scope instruction is emitted here.
pub fn compile_function_body(fs: &mut FuncState, block: &LuaBlock) -> LuaResult<()> {
    fs.open_block();
    for stat in block.get_stats() {
        compile_stat(fs, &stat)?;
    }
    fs.close_block()
}

/// Compile a nested block, opening a scope iff the block declares locals.
pub fn compile_block(fs: &mut FuncState, block: &LuaBlock) -> LuaResult<()> {
    let new_scope = block_opens_scope(BlockKind::Plain, block);
    if new_scope {
        fs.emit(Instr::PushScope);
        fs.scope_depth += 1;
    }
    fs.open_block();
    for stat in block.get_stats() {
        compile_stat(fs, &stat)?;
    }
    fs.close_block()?;
    if new_scope {
        fs.emit(Instr::PopScope);
        fs.scope_depth -= 1;
    }
    Ok(())
}

pub fn compile_stat(fs: &mut FuncState, stat: &LuaStat) -> LuaResult<()> {
    match stat {
        LuaStat::LocalStat(s) => compile_local_stat(fs, s),
        LuaStat::AssignStat(s) => compile_assign_stat(fs, s),
        LuaStat::CallExprStat(s) => {
            let call = s
                .get_call_expr()
                .ok_or_else(|| LuaError::compile("missing call expression"))?;
            compile_call_expr(fs, &call, RetCount::Fixed(0))
        }
        LuaStat::ReturnStat(s) => compile_return_stat(fs, s),
        LuaStat::IfStat(s) => compile_if_stat(fs, s),
        LuaStat::WhileStat(s) => compile_while_stat(fs, s),
        LuaStat::RepeatStat(s) => compile_repeat_stat(fs, s),
        LuaStat::ForStat(s) => compile_for_stat(fs, s),
        LuaStat::ForRangeStat(s) => compile_for_range_stat(fs, s),
        LuaStat::DoStat(s) => compile_do_stat(fs, s),
        LuaStat::BreakStat(_) => compile_break_stat(fs),
        LuaStat::GotoStat(s) => {
            let name = s
                .get_label_name_token()
                .ok_or_else(|| LuaError::compile("goto statement missing label name"))?
                .get_name_text()
                .to_string();
            compile_goto(fs, name)
        }
        LuaStat::LabelStat(s) => {
            let name = s
                .get_label_name_token()
                .ok_or_else(|| LuaError::compile("label statement missing name"))?
                .get_name_text()
                .to_string();
            let pos = fs.here();
            let depth = fs.scope_depth;
            if let Some(block) = fs.blocks.last_mut() {
                block.labels.push((name, pos, depth));
            }
            Ok(())
        }
        LuaStat::FuncStat(s) => compile_function_stat(fs, s),
        LuaStat::LocalFuncStat(s) => compile_local_function_stat(fs, s),
        LuaStat::EmptyStat(_) => Ok(()),
        _ => Ok(()),
    }
}

fn local_names(stat: &LuaLocalStat) -> LuaResult<Vec<Rc<str>>> {
    let mut names = Vec::new();
    for local_name in stat.get_local_name_list() {
        let tok = local_name
            .get_name_token()
            .ok_or_else(|| LuaError::compile("local statement missing name"))?;
        names.push(Rc::from(tok.get_name_text()));
    }
    Ok(names)
}

fn compile_local_stat(fs: &mut FuncState, stat: &LuaLocalStat) -> LuaResult<()> {
    let names = local_names(stat)?;
    let exprs: Vec<LuaExpr> = stat.get_value_exprs().collect();
    let have = compile_expr_list(fs, &exprs)?;
    adjust_to(fs, names.len(), have);
    for name in names.iter().rev() {
        fs.emit(Instr::SetLocal(name.clone()));
    }
    Ok(())
}

fn adjust_to(fs: &mut FuncState, want: usize, have: ArgCount) {
    if have != ArgCount::Fixed(want) {
        fs.emit(Instr::Adjust { want, have });
    }
}

fn compile_assign_stat(fs: &mut FuncState, stat: &LuaAssignStat) -> LuaResult<()> {
    let (vars, exprs) = stat.get_var_and_expr_list();

    // single-target fast path
    if vars.len() == 1 && exprs.len() == 1 {
        match &vars[0] {
            LuaVarExpr::NameExpr(name) => {
                compile_expr(fs, &exprs[0])?;
                let text = name
                    .get_name_text()
                    .ok_or_else(|| LuaError::compile("assignment target missing name"))?;
                fs.emit(Instr::SetName(Rc::from(text.as_str())));
            }
            LuaVarExpr::IndexExpr(idx) => {
                let base = idx
                    .get_prefix_expr()
                    .ok_or_else(|| LuaError::compile("assignment target missing table"))?;
                compile_expr(fs, &base)?;
                compile_index_key(fs, idx)?;
                compile_expr(fs, &exprs[0])?;
                fs.emit(Instr::SetIndex);
            }
        }
        return Ok(());
    }

    // general form: member-target bases and keys evaluate before the RHS so
    // that RHS side effects cannot redirect the stores
    for var in &vars {
        if let LuaVarExpr::IndexExpr(idx) = var {
            let base = idx
                .get_prefix_expr()
                .ok_or_else(|| LuaError::compile("assignment target missing table"))?;
            compile_expr(fs, &base)?;
            compile_index_key(fs, idx)?;
        }
    }

    let have = compile_expr_list(fs, &exprs)?;
    adjust_to(fs, vars.len(), have);
    fs.emit(Instr::Stash(vars.len()));

    for (i, var) in vars.iter().enumerate().rev() {
        fs.emit(Instr::Unstash(i));
        match var {
            LuaVarExpr::NameExpr(name) => {
                let text = name
                    .get_name_text()
                    .ok_or_else(|| LuaError::compile("assignment target missing name"))?;
                fs.emit(Instr::SetName(Rc::from(text.as_str())));
            }
            LuaVarExpr::IndexExpr(_) => {
                fs.emit(Instr::SetIndex);
            }
        }
    }
    Ok(())
}

fn compile_return_stat(fs: &mut FuncState, stat: &LuaReturnStat) -> LuaResult<()> {
    let exprs: Vec<LuaExpr> = stat.get_expr_list().collect();
    let have = compile_expr_list(fs, &exprs)?;
    fs.emit(Instr::Return(have));
    Ok(())
}

fn compile_if_stat(fs: &mut FuncState, stat: &LuaIfStat) -> LuaResult<()> {
    let mut end_jumps = Vec::new();

    if let Some(cond) = stat.get_condition_expr() {
        compile_expr(fs, &cond)?;
        let next = fs.emit_jump(Instr::JumpIfFalse(usize::MAX));
        if let Some(body) = stat.get_block() {
            compile_block(fs, &body)?;
        }
        end_jumps.push(fs.emit_jump(Instr::Jump(usize::MAX)));
        fs.patch_jump(next);
    }

    for clause in stat.get_else_if_clause_list() {
        if let Some(cond) = clause.get_condition_expr() {
            compile_expr(fs, &cond)?;
            let next = fs.emit_jump(Instr::JumpIfFalse(usize::MAX));
            if let Some(body) = clause.get_block() {
                compile_block(fs, &body)?;
            }
            end_jumps.push(fs.emit_jump(Instr::Jump(usize::MAX)));
            fs.patch_jump(next);
        }
    }

    if let Some(clause) = stat.get_else_clause() {
        if let Some(body) = clause.get_block() {
            compile_block(fs, &body)?;
        }
    }

    for jump in end_jumps {
        fs.patch_jump(jump);
    }
    Ok(())
}

fn compile_while_stat(fs: &mut FuncState, stat: &LuaWhileStat) -> LuaResult<()> {
    let top = fs.here();
    let cond = stat
        .get_condition_expr()
        .ok_or_else(|| LuaError::compile("while statement missing condition"))?;
    compile_expr(fs, &cond)?;
    let exit = fs.emit_jump(Instr::JumpIfFalse(usize::MAX));

    fs.loops.push(LoopCtx {
        depth: fs.scope_depth,
        breaks: Vec::new(),
    });
    if let Some(body) = stat.get_block() {
        compile_block(fs, &body)?;
    }
    fs.emit(Instr::Jump(top));
    fs.patch_jump(exit);
    finish_loop(fs);
    Ok(())
}

fn compile_repeat_stat(fs: &mut FuncState, stat: &LuaRepeatStat) -> LuaResult<()> {
    fs.loops.push(LoopCtx {
        depth: fs.scope_depth,
        breaks: Vec::new(),
    });
    let top = fs.here();

    // the until condition sees the body's locals, so the body scope closes
    // only after the condition evaluates
    let body = stat.get_block();
    let new_scope = body
        .as_ref()
        .map(|b| block_opens_scope(BlockKind::Plain, b))
        .unwrap_or(false);
    if new_scope {
        fs.emit(Instr::PushScope);
        fs.scope_depth += 1;
    }
    fs.open_block();
    if let Some(body) = &body {
        for s in body.get_stats() {
            compile_stat(fs, &s)?;
        }
    }
    fs.close_block()?;
    if let Some(cond) = stat.get_condition_expr() {
        compile_expr(fs, &cond)?;
    } else {
        fs.emit(Instr::True);
    }
    if new_scope {
        fs.emit(Instr::PopScope);
        fs.scope_depth -= 1;
    }
    fs.emit(Instr::JumpIfFalse(top));
    finish_loop(fs);
    Ok(())
}

fn compile_for_stat(fs: &mut FuncState, stat: &LuaForStat) -> LuaResult<()> {
    let var = stat
        .get_var_name()
        .ok_or_else(|| LuaError::compile("for loop missing variable name"))?;
    let var: Rc<str> = Rc::from(var.get_name_text());

    let exprs: Vec<LuaExpr> = stat.get_iter_expr().collect();
    if exprs.len() < 2 {
        return Err(LuaError::compile(
            "for loop requires initial and limit values",
        ));
    }
    compile_expr(fs, &exprs[0])?;
    compile_expr(fs, &exprs[1])?;
    if let Some(step) = exprs.get(2) {
        compile_expr(fs, step)?;
    } else {
        fs.emit(Instr::Number(1.0));
    }
    fs.emit(Instr::ForPrep);

    // the loop opens one scope for its control values and variable
    fs.emit(Instr::PushScope);
    fs.scope_depth += 1;
    fs.emit(Instr::SetLocal(Rc::from(FOR_STEP)));
    fs.emit(Instr::SetLocal(Rc::from(FOR_LIMIT)));
    fs.emit(Instr::SetLocal(Rc::from(FOR_INDEX)));

    fs.loops.push(LoopCtx {
        depth: fs.scope_depth - 1,
        breaks: Vec::new(),
    });

    let top = fs.here();
    fs.emit(Instr::GetName(Rc::from(FOR_INDEX)));
    fs.emit(Instr::GetName(Rc::from(FOR_LIMIT)));
    fs.emit(Instr::GetName(Rc::from(FOR_STEP)));
    let exit = fs.emit_jump(Instr::ForTest(usize::MAX));

    fs.emit(Instr::GetName(Rc::from(FOR_INDEX)));
    fs.emit(Instr::SetLocal(var));

    if let Some(body) = stat.get_block() {
        compile_block(fs, &body)?;
    }

    fs.emit(Instr::GetName(Rc::from(FOR_INDEX)));
    fs.emit(Instr::GetName(Rc::from(FOR_STEP)));
    fs.emit(Instr::BinOp(BinOp::Add));
    fs.emit(Instr::SetName(Rc::from(FOR_INDEX)));
    fs.emit(Instr::Jump(top));

    fs.patch_jump(exit);
    fs.emit(Instr::PopScope);
    fs.scope_depth -= 1;
    finish_loop(fs);
    Ok(())
}

fn compile_for_range_stat(fs: &mut FuncState, stat: &LuaForRangeStat) -> LuaResult<()> {
    let names: Vec<Rc<str>> = stat
        .get_var_name_list()
        .map(|tok| Rc::from(tok.get_name_text()))
        .collect();
    if names.is_empty() {
        return Err(LuaError::compile("for-in loop requires a variable"));
    }

    fs.emit(Instr::PushScope);
    fs.scope_depth += 1;

    let exprs: Vec<LuaExpr> = stat.get_expr_list().collect();
    let have = compile_expr_list(fs, &exprs)?;
    adjust_to(fs, 3, have);
    fs.emit(Instr::SetLocal(Rc::from(FOR_CONTROL)));
    fs.emit(Instr::SetLocal(Rc::from(FOR_STATE)));
    fs.emit(Instr::SetLocal(Rc::from(FOR_ITER)));

    fs.loops.push(LoopCtx {
        depth: fs.scope_depth - 1,
        breaks: Vec::new(),
    });

    let top = fs.here();
    fs.emit(Instr::GetName(Rc::from(FOR_ITER)));
    fs.emit(Instr::GetName(Rc::from(FOR_STATE)));
    fs.emit(Instr::GetName(Rc::from(FOR_CONTROL)));
    fs.emit(Instr::Call {
        nargs: ArgCount::Fixed(2),
        ret: RetCount::Fixed(names.len()),
    });
    for name in names.iter().rev() {
        fs.emit(Instr::SetLocal(name.clone()));
    }
    fs.emit(Instr::GetName(names[0].clone()));
    let exit = fs.emit_jump(Instr::JumpIfNil(usize::MAX));
    fs.emit(Instr::GetName(names[0].clone()));
    fs.emit(Instr::SetName(Rc::from(FOR_CONTROL)));

    if let Some(body) = stat.get_block() {
        compile_block(fs, &body)?;
    }
    fs.emit(Instr::Jump(top));

    fs.patch_jump(exit);
    fs.emit(Instr::PopScope);
    fs.scope_depth -= 1;
    finish_loop(fs);
    Ok(())
}

fn compile_do_stat(fs: &mut FuncState, stat: &LuaDoStat) -> LuaResult<()> {
    if let Some(body) = stat.get_block() {
        compile_block(fs, &body)?;
    }
    Ok(())
}

fn compile_break_stat(fs: &mut FuncState) -> LuaResult<()> {
    let depth = match fs.loops.last() {
        Some(l) => l.depth,
        None => return Err(LuaError::compile("break outside a loop")),
    };
    let pos = fs.emit_jump(Instr::LeaveJump {
        depth,
        target: usize::MAX,
    });
    if let Some(l) = fs.loops.last_mut() {
        l.breaks.push(pos);
    }
    Ok(())
}

/// Patch all break jumps of the innermost loop to the current position.
fn finish_loop(fs: &mut FuncState) {
    if let Some(l) = fs.loops.pop() {
        let target = fs.here();
        for pos in l.breaks {
            let depth = l.depth;
            fs.patch_leave(pos, depth, target);
        }
    }
}

fn compile_goto(fs: &mut FuncState, name: String) -> LuaResult<()> {
    // backward (or already-seen) labels resolve immediately
    for block in fs.blocks.iter().rev() {
        if let Some((_, target, depth)) = block.labels.iter().find(|(l, _, _)| *l == name) {
            let (target, depth) = (*target, *depth);
            fs.emit(Instr::LeaveJump { depth, target });
            return Ok(());
        }
    }
    // otherwise leave a placeholder; block close patches or propagates it
    let pos = fs.emit_jump(Instr::LeaveJump {
        depth: usize::MAX,
        target: usize::MAX,
    });
    if let Some(block) = fs.blocks.last_mut() {
        block.gotos.push((name, pos));
    }
    Ok(())
}

fn compile_function_stat(fs: &mut FuncState, stat: &LuaFuncStat) -> LuaResult<()> {
    let target = stat
        .get_func_name()
        .ok_or_else(|| LuaError::compile("function statement missing name"))?;
    let closure = stat
        .get_closure()
        .ok_or_else(|| LuaError::compile("function statement missing body"))?;

    match &target {
        LuaVarExpr::NameExpr(name) => {
            let text = name
                .get_name_text()
                .ok_or_else(|| LuaError::compile("function statement missing name"))?;
            compile_closure_expr(fs, &closure, false, &text)?;
            fs.emit(Instr::SetName(Rc::from(text.as_str())));
        }
        LuaVarExpr::IndexExpr(idx) => {
            let is_method = idx.get_index_token().map(|t| t.is_colon()).unwrap_or(false);
            let base = idx
                .get_prefix_expr()
                .ok_or_else(|| LuaError::compile("function statement missing target"))?;
            compile_expr(fs, &base)?;
            compile_index_key(fs, idx)?;
            compile_closure_expr(fs, &closure, is_method, "method")?;
            fs.emit(Instr::SetIndex);
        }
    }
    Ok(())
}

fn compile_local_function_stat(fs: &mut FuncState, stat: &LuaLocalFuncStat) -> LuaResult<()> {
    let name: Rc<str> = Rc::from(
        stat.get_local_name()
            .and_then(|n| n.get_name_token())
            .ok_or_else(|| LuaError::compile("local function missing name"))?
            .get_name_text(),
    );
    let closure = stat
        .get_closure()
        .ok_or_else(|| LuaError::compile("local function missing body"))?;

    // declare the local first so the body can call itself
    fs.emit(Instr::Nil);
    fs.emit(Instr::SetLocal(name.clone()));
    compile_closure_expr(fs, &closure, false, &name)?;
    fs.emit(Instr::SetLocal(name));
    Ok(())
}
