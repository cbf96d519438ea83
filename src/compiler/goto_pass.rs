// Goto analysis
// Assigns a goto record to every block that contains labels or gotos and
// validates the Lua legality rules before code generation:
//   - a label name is unique within its block;
//   - every goto must reference a visible label (same block or an enclosing
//     block, stopping at the function boundary);
//   - a forward goto may not jump into the scope of a local declared between
//     the goto and the label, unless the label closes the block (only labels
//     follow it).

use emmylua_parser::{LuaBlock, LuaChunk, LuaExpr, LuaIndexKey, LuaStat};

use crate::lua_vm::{LuaError, LuaResult};

#[derive(Debug)]
enum StmtKind {
    Local,
    Label(String),
    Goto(String),
    Other,
}

#[derive(Debug, Default)]
struct GotoBlock {
    stmts: Vec<StmtKind>,
    /// Nested non-function blocks, keyed by the index of the containing
    /// statement.
    children: Vec<(usize, GotoBlock)>,
}

pub fn validate(chunk: &LuaChunk) -> LuaResult<()> {
    let Some(block) = chunk.get_block() else {
        return Ok(());
    };
    let mut bodies = Vec::new();
    let root = collect(&block, &mut bodies)?;
    check_block(&root, &[])?;
    // each function body terminates goto visibility and is validated on its
    // own
    for body in bodies {
        check_block(&body, &[])?;
    }
    Ok(())
}

/// Build the goto-scope tree of one block, pushing nested function bodies
/// into `bodies` as independent roots.
fn collect(block: &LuaBlock, bodies: &mut Vec<GotoBlock>) -> LuaResult<GotoBlock> {
    let mut out = GotoBlock::default();
    for (i, stat) in block.get_stats().enumerate() {
        let kind = match &stat {
            LuaStat::LocalStat(_) => StmtKind::Local,
            LuaStat::LocalFuncStat(s) => {
                if let Some(closure) = s.get_closure() {
                    collect_closure(&closure, bodies)?;
                }
                StmtKind::Local
            }
            LuaStat::LabelStat(s) => match s.get_label_name_token() {
                Some(tok) => StmtKind::Label(tok.get_name_text().to_string()),
                None => StmtKind::Other,
            },
            LuaStat::GotoStat(s) => match s.get_label_name_token() {
                Some(tok) => StmtKind::Goto(tok.get_name_text().to_string()),
                None => StmtKind::Other,
            },
            other => {
                for nested in nested_blocks(other) {
                    let child = collect(&nested, bodies)?;
                    out.children.push((i, child));
                }
                for expr in stat_exprs(other) {
                    collect_exprs(&expr, bodies)?;
                }
                StmtKind::Other
            }
        };
        // expressions of local statements can still contain closures
        if let LuaStat::LocalStat(s) = &stat {
            for expr in s.get_value_exprs() {
                collect_exprs(&expr, bodies)?;
            }
        }
        out.stmts.push(kind);
    }
    Ok(out)
}

fn collect_closure(
    closure: &emmylua_parser::LuaClosureExpr,
    bodies: &mut Vec<GotoBlock>,
) -> LuaResult<()> {
    if let Some(body) = closure.get_block() {
        let root = collect(&body, bodies)?;
        bodies.push(root);
    }
    Ok(())
}

fn collect_exprs(expr: &LuaExpr, bodies: &mut Vec<GotoBlock>) -> LuaResult<()> {
    match expr {
        LuaExpr::ClosureExpr(c) => collect_closure(c, bodies)?,
        LuaExpr::BinaryExpr(e) => {
            if let Some((l, r)) = e.get_exprs() {
                collect_exprs(&l, bodies)?;
                collect_exprs(&r, bodies)?;
            }
        }
        LuaExpr::UnaryExpr(e) => {
            if let Some(inner) = e.get_expr() {
                collect_exprs(&inner, bodies)?;
            }
        }
        LuaExpr::ParenExpr(e) => {
            if let Some(inner) = e.get_expr() {
                collect_exprs(&inner, bodies)?;
            }
        }
        LuaExpr::CallExpr(e) => {
            if let Some(prefix) = e.get_prefix_expr() {
                collect_exprs(&prefix, bodies)?;
            }
            if let Some(args) = e.get_args_list() {
                for a in args.get_args() {
                    collect_exprs(&a, bodies)?;
                }
            }
        }
        LuaExpr::IndexExpr(e) => {
            if let Some(prefix) = e.get_prefix_expr() {
                collect_exprs(&prefix, bodies)?;
            }
            if let Some(LuaIndexKey::Expr(key)) = e.get_index_key() {
                collect_exprs(&key, bodies)?;
            }
        }
        LuaExpr::TableExpr(e) => {
            for field in e.get_fields() {
                if let Some(LuaIndexKey::Expr(key)) = field.get_field_key() {
                    collect_exprs(&key, bodies)?;
                }
                if let Some(value) = field.get_value_expr() {
                    collect_exprs(&value, bodies)?;
                }
            }
        }
        LuaExpr::LiteralExpr(_) | LuaExpr::NameExpr(_) => {}
    }
    Ok(())
}

/// Blocks nested directly in a statement (function bodies excluded; they are
/// collected separately).
fn nested_blocks(stat: &LuaStat) -> Vec<LuaBlock> {
    let mut out = Vec::new();
    match stat {
        LuaStat::IfStat(s) => {
            out.extend(s.get_block());
            for clause in s.get_else_if_clause_list() {
                out.extend(clause.get_block());
            }
            if let Some(clause) = s.get_else_clause() {
                out.extend(clause.get_block());
            }
        }
        LuaStat::WhileStat(s) => out.extend(s.get_block()),
        LuaStat::RepeatStat(s) => out.extend(s.get_block()),
        LuaStat::ForStat(s) => out.extend(s.get_block()),
        LuaStat::ForRangeStat(s) => out.extend(s.get_block()),
        LuaStat::DoStat(s) => out.extend(s.get_block()),
        _ => {}
    }
    out
}

/// Expressions carried by a statement, for closure discovery.
fn stat_exprs(stat: &LuaStat) -> Vec<LuaExpr> {
    let mut out = Vec::new();
    match stat {
        LuaStat::AssignStat(s) => {
            let (_, exprs) = s.get_var_and_expr_list();
            out.extend(exprs);
        }
        LuaStat::CallExprStat(s) => {
            if let Some(call) = s.get_call_expr() {
                out.push(LuaExpr::CallExpr(call));
            }
        }
        LuaStat::ReturnStat(s) => out.extend(s.get_expr_list()),
        LuaStat::IfStat(s) => {
            out.extend(s.get_condition_expr());
            for clause in s.get_else_if_clause_list() {
                out.extend(clause.get_condition_expr());
            }
        }
        LuaStat::WhileStat(s) => out.extend(s.get_condition_expr()),
        LuaStat::RepeatStat(s) => out.extend(s.get_condition_expr()),
        LuaStat::ForStat(s) => out.extend(s.get_iter_expr()),
        LuaStat::ForRangeStat(s) => out.extend(s.get_expr_list()),
        LuaStat::FuncStat(s) => {
            if let Some(closure) = s.get_closure() {
                out.push(LuaExpr::ClosureExpr(closure));
            }
        }
        _ => {}
    }
    out
}

fn label_index(block: &GotoBlock, name: &str) -> Option<usize> {
    block.stmts.iter().position(|s| match s {
        StmtKind::Label(l) => l == name,
        _ => false,
    })
}

/// A label "closes" its block when only labels follow it.
fn label_closes_block(block: &GotoBlock, label_idx: usize) -> bool {
    block.stmts[label_idx + 1..]
        .iter()
        .all(|s| matches!(s, StmtKind::Label(_)))
}

fn check_forward_jump(
    block: &GotoBlock,
    from: usize,
    label_idx: usize,
    name: &str,
) -> LuaResult<()> {
    if label_idx <= from {
        return Ok(());
    }
    let crosses_local = block.stmts[from + 1..label_idx]
        .iter()
        .any(|s| matches!(s, StmtKind::Local));
    if crosses_local && !label_closes_block(block, label_idx) {
        return Err(LuaError::compile(format!(
            "goto '{}' jumps into the scope of a local",
            name
        )));
    }
    Ok(())
}

fn check_block(block: &GotoBlock, ancestors: &[(&GotoBlock, usize)]) -> LuaResult<()> {
    // duplicate labels within one block
    for (i, stmt) in block.stmts.iter().enumerate() {
        if let StmtKind::Label(name) = stmt {
            let dup = block.stmts[i + 1..].iter().any(|s| match s {
                StmtKind::Label(l) => l == name,
                _ => false,
            });
            if dup {
                return Err(LuaError::compile(format!(
                    "label '{}' already defined",
                    name
                )));
            }
        }
    }

    // goto resolution
    for (i, stmt) in block.stmts.iter().enumerate() {
        if let StmtKind::Goto(name) = stmt {
            if let Some(idx) = label_index(block, name) {
                check_forward_jump(block, i, idx, name)?;
                continue;
            }
            let mut resolved = false;
            // walk outward; `pos` is the statement index of the nested block
            // inside each ancestor
            for (outer, pos) in ancestors.iter().rev() {
                if let Some(idx) = label_index(outer, name) {
                    check_forward_jump(outer, *pos, idx, name)?;
                    resolved = true;
                    break;
                }
            }
            if !resolved {
                return Err(LuaError::compile(format!(
                    "no visible label '{}' for goto",
                    name
                )));
            }
        }
    }

    // recurse
    for (pos, child) in &block.children {
        let mut chain: Vec<(&GotoBlock, usize)> = ancestors.to_vec();
        chain.push((block, *pos));
        check_block(child, &chain)?;
    }
    Ok(())
}
