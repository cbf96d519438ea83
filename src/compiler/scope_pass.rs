// Scope analysis
// Runs before code generation. `block_opens_scope` is the single predicate
// the lowering uses to decide which blocks get their own lexical scope, and
// `analyze` validates vararg usage up front: `...` is only legal inside a
// vararg function.

use emmylua_parser::{
    LuaBlock, LuaChunk, LuaExpr, LuaIndexKey, LuaLiteralToken, LuaStat, LuaVarExpr,
};

use crate::lua_vm::{LuaError, LuaResult};

/// Why a block is being considered; function bodies open scopes for their
/// bindings even without local statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Plain,
    FunctionBody { binds_names: bool },
}

/// A block opens a scope iff it declares a local or binds parameters
/// (`self` and a trailing `...` both count). The chunk body and the loop
/// control scopes are opened by the compiler itself.
pub fn block_opens_scope(kind: BlockKind, block: &LuaBlock) -> bool {
    match kind {
        BlockKind::FunctionBody { binds_names } => binds_names || block_declares_local(block),
        BlockKind::Plain => block_declares_local(block),
    }
}

fn block_declares_local(block: &LuaBlock) -> bool {
    block
        .get_stats()
        .any(|s| matches!(s, LuaStat::LocalStat(_) | LuaStat::LocalFuncStat(_)))
}

pub fn analyze(chunk: &LuaChunk) -> LuaResult<()> {
    if let Some(block) = chunk.get_block() {
        // the chunk body is a vararg function
        walk_block(&block, true)?;
    }
    Ok(())
}

fn walk_block(block: &LuaBlock, in_vararg: bool) -> LuaResult<()> {
    for stat in block.get_stats() {
        walk_stat(&stat, in_vararg)?;
    }
    Ok(())
}

fn walk_stat(stat: &LuaStat, in_vararg: bool) -> LuaResult<()> {
    match stat {
        LuaStat::LocalStat(s) => {
            for expr in s.get_value_exprs() {
                walk_expr(&expr, in_vararg)?;
            }
        }
        LuaStat::AssignStat(s) => {
            let (vars, exprs) = s.get_var_and_expr_list();
            for var in vars {
                if let LuaVarExpr::IndexExpr(idx) = var {
                    if let Some(prefix) = idx.get_prefix_expr() {
                        walk_expr(&prefix, in_vararg)?;
                    }
                    if let Some(LuaIndexKey::Expr(key)) = idx.get_index_key() {
                        walk_expr(&key, in_vararg)?;
                    }
                }
            }
            for expr in exprs {
                walk_expr(&expr, in_vararg)?;
            }
        }
        LuaStat::CallExprStat(s) => {
            if let Some(call) = s.get_call_expr() {
                walk_expr(&LuaExpr::CallExpr(call), in_vararg)?;
            }
        }
        LuaStat::ReturnStat(s) => {
            for expr in s.get_expr_list() {
                walk_expr(&expr, in_vararg)?;
            }
        }
        LuaStat::IfStat(s) => {
            if let Some(cond) = s.get_condition_expr() {
                walk_expr(&cond, in_vararg)?;
            }
            if let Some(body) = s.get_block() {
                walk_block(&body, in_vararg)?;
            }
            for clause in s.get_else_if_clause_list() {
                if let Some(cond) = clause.get_condition_expr() {
                    walk_expr(&cond, in_vararg)?;
                }
                if let Some(body) = clause.get_block() {
                    walk_block(&body, in_vararg)?;
                }
            }
            if let Some(clause) = s.get_else_clause() {
                if let Some(body) = clause.get_block() {
                    walk_block(&body, in_vararg)?;
                }
            }
        }
        LuaStat::WhileStat(s) => {
            if let Some(cond) = s.get_condition_expr() {
                walk_expr(&cond, in_vararg)?;
            }
            if let Some(body) = s.get_block() {
                walk_block(&body, in_vararg)?;
            }
        }
        LuaStat::RepeatStat(s) => {
            if let Some(body) = s.get_block() {
                walk_block(&body, in_vararg)?;
            }
            if let Some(cond) = s.get_condition_expr() {
                walk_expr(&cond, in_vararg)?;
            }
        }
        LuaStat::ForStat(s) => {
            for expr in s.get_iter_expr() {
                walk_expr(&expr, in_vararg)?;
            }
            if let Some(body) = s.get_block() {
                walk_block(&body, in_vararg)?;
            }
        }
        LuaStat::ForRangeStat(s) => {
            for expr in s.get_expr_list() {
                walk_expr(&expr, in_vararg)?;
            }
            if let Some(body) = s.get_block() {
                walk_block(&body, in_vararg)?;
            }
        }
        LuaStat::DoStat(s) => {
            if let Some(body) = s.get_block() {
                walk_block(&body, in_vararg)?;
            }
        }
        LuaStat::FuncStat(s) => {
            if let Some(LuaVarExpr::IndexExpr(idx)) = s.get_func_name() {
                if let Some(prefix) = idx.get_prefix_expr() {
                    walk_expr(&prefix, in_vararg)?;
                }
            }
            if let Some(closure) = s.get_closure() {
                walk_closure(&closure)?;
            }
        }
        LuaStat::LocalFuncStat(s) => {
            if let Some(closure) = s.get_closure() {
                walk_closure(&closure)?;
            }
        }
        LuaStat::BreakStat(_)
        | LuaStat::GotoStat(_)
        | LuaStat::LabelStat(_)
        | LuaStat::EmptyStat(_) => {}
        _ => {}
    }
    Ok(())
}

fn walk_expr(expr: &LuaExpr, in_vararg: bool) -> LuaResult<()> {
    match expr {
        LuaExpr::LiteralExpr(lit) => {
            if matches!(lit.get_literal(), Some(LuaLiteralToken::Dots(_))) && !in_vararg {
                return Err(LuaError::compile(
                    "cannot use '...' outside a vararg function",
                ));
            }
        }
        LuaExpr::NameExpr(_) => {}
        LuaExpr::BinaryExpr(e) => {
            if let Some((l, r)) = e.get_exprs() {
                walk_expr(&l, in_vararg)?;
                walk_expr(&r, in_vararg)?;
            }
        }
        LuaExpr::UnaryExpr(e) => {
            if let Some(inner) = e.get_expr() {
                walk_expr(&inner, in_vararg)?;
            }
        }
        LuaExpr::ParenExpr(e) => {
            if let Some(inner) = e.get_expr() {
                walk_expr(&inner, in_vararg)?;
            }
        }
        LuaExpr::CallExpr(e) => {
            if let Some(prefix) = e.get_prefix_expr() {
                walk_expr(&prefix, in_vararg)?;
            }
            if let Some(args) = e.get_args_list() {
                for a in args.get_args() {
                    walk_expr(&a, in_vararg)?;
                }
            }
        }
        LuaExpr::IndexExpr(e) => {
            if let Some(prefix) = e.get_prefix_expr() {
                walk_expr(&prefix, in_vararg)?;
            }
            if let Some(LuaIndexKey::Expr(key)) = e.get_index_key() {
                walk_expr(&key, in_vararg)?;
            }
        }
        LuaExpr::TableExpr(e) => {
            for field in e.get_fields() {
                if let Some(LuaIndexKey::Expr(key)) = field.get_field_key() {
                    walk_expr(&key, in_vararg)?;
                }
                if let Some(value) = field.get_value_expr() {
                    walk_expr(&value, in_vararg)?;
                }
            }
        }
        LuaExpr::ClosureExpr(e) => {
            walk_closure(e)?;
        }
    }
    Ok(())
}

fn walk_closure(closure: &emmylua_parser::LuaClosureExpr) -> LuaResult<()> {
    let mut is_vararg = false;
    if let Some(params) = closure.get_params_list() {
        for param in params.get_params() {
            if param.is_dots() {
                is_vararg = true;
            }
        }
    }
    if let Some(body) = closure.get_block() {
        walk_block(&body, is_vararg)?;
    }
    Ok(())
}
