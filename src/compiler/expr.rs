// Expression lowering
// Every expression leaves exactly one value on the operand stack unless it is
// compiled in a spread position, where calls and `...` keep all their values.

use std::rc::Rc;

use emmylua_parser::{
    BinaryOperator, LuaCallExpr, LuaClosureExpr, LuaExpr, LuaIndexExpr, LuaIndexKey,
    LuaLiteralToken, LuaTableExpr, UnaryOperator,
};

use super::scope_pass::{block_opens_scope, BlockKind};
use super::stmt::compile_function_body;
use super::{ArgCount, BinOp, FuncState, Instr, RetCount, UnOp};
use crate::lua_vm::{LuaError, LuaResult};

pub fn compile_expr(fs: &mut FuncState, expr: &LuaExpr) -> LuaResult<()> {
    match expr {
        LuaExpr::LiteralExpr(e) => {
            let token = e
                .get_literal()
                .ok_or_else(|| LuaError::compile("literal expression missing token"))?;
            match token {
                LuaLiteralToken::Nil(_) => fs.emit(Instr::Nil),
                LuaLiteralToken::Bool(b) => {
                    fs.emit(if b.is_true() { Instr::True } else { Instr::False })
                }
                LuaLiteralToken::Number(n) => {
                    let value = if n.is_float() {
                        n.get_float_value()
                    } else {
                        n.get_int_value() as f64
                    };
                    fs.emit(Instr::Number(value));
                }
                LuaLiteralToken::String(s) => {
                    fs.emit(Instr::Str(Rc::from(s.get_value().as_str())));
                }
                LuaLiteralToken::Dots(_) => {
                    fs.emit(Instr::Varargs(RetCount::Fixed(1)));
                }
                _ => fs.emit(Instr::Nil),
            }
        }
        LuaExpr::NameExpr(e) => {
            let name = e
                .get_name_text()
                .ok_or_else(|| LuaError::compile("name expression missing identifier"))?;
            fs.emit(Instr::GetName(Rc::from(name.as_str())));
        }
        LuaExpr::BinaryExpr(e) => {
            let (left, right) = e
                .get_exprs()
                .ok_or_else(|| LuaError::compile("binary expression missing operands"))?;
            let op = e
                .get_op_token()
                .ok_or_else(|| LuaError::compile("binary expression missing operator"))?
                .get_op();
            match op {
                // short-circuit: the right operand is only evaluated when the
                // left one does not decide the result
                BinaryOperator::OpAnd => {
                    compile_expr(fs, &left)?;
                    let done = fs.emit_jump(Instr::JumpIfFalsePeek(usize::MAX));
                    fs.emit(Instr::Pop(1));
                    compile_expr(fs, &right)?;
                    fs.patch_jump(done);
                }
                BinaryOperator::OpOr => {
                    compile_expr(fs, &left)?;
                    let done = fs.emit_jump(Instr::JumpIfTruePeek(usize::MAX));
                    fs.emit(Instr::Pop(1));
                    compile_expr(fs, &right)?;
                    fs.patch_jump(done);
                }
                other => {
                    compile_expr(fs, &left)?;
                    compile_expr(fs, &right)?;
                    fs.emit(Instr::BinOp(binop_of(other)?));
                }
            }
        }
        LuaExpr::UnaryExpr(e) => {
            let operand = e
                .get_expr()
                .ok_or_else(|| LuaError::compile("unary expression missing operand"))?;
            compile_expr(fs, &operand)?;
            let op = e
                .get_op_token()
                .ok_or_else(|| LuaError::compile("unary expression missing operator"))?
                .get_op();
            match op {
                UnaryOperator::OpUnm => fs.emit(Instr::UnOp(UnOp::Neg)),
                UnaryOperator::OpNot => fs.emit(Instr::UnOp(UnOp::Not)),
                UnaryOperator::OpLen => fs.emit(Instr::UnOp(UnOp::Len)),
                UnaryOperator::OpBNot => fs.emit(Instr::UnOp(UnOp::BNot)),
                UnaryOperator::OpNop => {}
            }
        }
        LuaExpr::ParenExpr(e) => {
            // parentheses truncate a multi-value expression to one value
            let inner = e
                .get_expr()
                .ok_or_else(|| LuaError::compile("paren expression missing inner"))?;
            compile_expr(fs, &inner)?;
        }
        LuaExpr::CallExpr(e) => {
            compile_call_expr(fs, e, RetCount::Fixed(1))?;
        }
        LuaExpr::IndexExpr(e) => {
            let prefix = e
                .get_prefix_expr()
                .ok_or_else(|| LuaError::compile("index expression missing table"))?;
            compile_expr(fs, &prefix)?;
            compile_index_key(fs, e)?;
            fs.emit(Instr::Index);
        }
        LuaExpr::TableExpr(e) => {
            compile_table_expr(fs, e)?;
        }
        LuaExpr::ClosureExpr(e) => {
            compile_closure_expr(fs, e, false, "anonymous")?;
        }
    }
    Ok(())
}

fn binop_of(op: BinaryOperator) -> LuaResult<BinOp> {
    Ok(match op {
        BinaryOperator::OpAdd => BinOp::Add,
        BinaryOperator::OpSub => BinOp::Sub,
        BinaryOperator::OpMul => BinOp::Mul,
        BinaryOperator::OpDiv => BinOp::Div,
        BinaryOperator::OpIDiv => BinOp::IDiv,
        BinaryOperator::OpMod => BinOp::Mod,
        BinaryOperator::OpPow => BinOp::Pow,
        BinaryOperator::OpConcat => BinOp::Concat,
        BinaryOperator::OpEq => BinOp::Eq,
        BinaryOperator::OpNe => BinOp::Ne,
        BinaryOperator::OpLt => BinOp::Lt,
        BinaryOperator::OpLe => BinOp::Le,
        BinaryOperator::OpGt => BinOp::Gt,
        BinaryOperator::OpGe => BinOp::Ge,
        BinaryOperator::OpBAnd => BinOp::BAnd,
        BinaryOperator::OpBOr => BinOp::BOr,
        BinaryOperator::OpBXor => BinOp::BXor,
        BinaryOperator::OpShl => BinOp::Shl,
        BinaryOperator::OpShr => BinOp::Shr,
        other => {
            return Err(LuaError::compile(format!(
                "unsupported binary operator: {:?}",
                other
            )))
        }
    })
}

/// Push the key of an index expression (`a.b`, `a[k]`, `a:m`).
pub fn compile_index_key(fs: &mut FuncState, expr: &LuaIndexExpr) -> LuaResult<()> {
    let key = expr
        .get_index_key()
        .ok_or_else(|| LuaError::compile("index expression missing key"))?;
    match key {
        LuaIndexKey::Name(token) => {
            fs.emit(Instr::Str(Rc::from(token.get_name_text())));
        }
        LuaIndexKey::String(token) => {
            fs.emit(Instr::Str(Rc::from(token.get_value().as_str())));
        }
        LuaIndexKey::Integer(token) => {
            fs.emit(Instr::Number(token.get_int_value() as f64));
        }
        LuaIndexKey::Expr(key_expr) => {
            compile_expr(fs, &key_expr)?;
        }
        LuaIndexKey::Idx(_) => {
            return Err(LuaError::compile("unsupported index key"));
        }
    }
    Ok(())
}

/// True for expressions that produce a value sequence in spread position.
pub fn is_multi_expr(expr: &LuaExpr) -> bool {
    match expr {
        LuaExpr::CallExpr(_) => true,
        LuaExpr::LiteralExpr(lit) => {
            matches!(lit.get_literal(), Some(LuaLiteralToken::Dots(_)))
        }
        _ => false,
    }
}

/// Compile an expression keeping all its values (calls and `...`).
fn compile_expr_spread(fs: &mut FuncState, expr: &LuaExpr) -> LuaResult<()> {
    match expr {
        LuaExpr::CallExpr(e) => compile_call_expr(fs, e, RetCount::Multi),
        LuaExpr::LiteralExpr(lit)
            if matches!(lit.get_literal(), Some(LuaLiteralToken::Dots(_))) =>
        {
            fs.emit(Instr::Varargs(RetCount::Multi));
            Ok(())
        }
        other => compile_expr(fs, other),
    }
}

/// Compile a comma list. The final expression spreads when it is a call or a
/// vararg literal; the returned count reflects that.
pub fn compile_expr_list(fs: &mut FuncState, exprs: &[LuaExpr]) -> LuaResult<ArgCount> {
    let Some((last, init)) = exprs.split_last() else {
        return Ok(ArgCount::Fixed(0));
    };
    for expr in init {
        compile_expr(fs, expr)?;
    }
    if is_multi_expr(last) {
        compile_expr_spread(fs, last)?;
        Ok(ArgCount::Variadic(init.len()))
    } else {
        compile_expr(fs, last)?;
        Ok(ArgCount::Fixed(exprs.len()))
    }
}

/// A call of the syntactic form `coroutine.yield(...)` lowers to a native
/// yield instruction.
fn is_yield_call(prefix: &LuaExpr) -> bool {
    let LuaExpr::IndexExpr(idx) = prefix else {
        return false;
    };
    if idx.get_index_token().map(|t| t.is_colon()).unwrap_or(false) {
        return false;
    }
    let base_is_coroutine = matches!(
        idx.get_prefix_expr(),
        Some(LuaExpr::NameExpr(name)) if name.get_name_text().as_deref() == Some("coroutine")
    );
    let key_is_yield = matches!(
        idx.get_index_key(),
        Some(LuaIndexKey::Name(tok)) if tok.get_name_text() == "yield"
    );
    base_is_coroutine && key_is_yield
}

pub fn compile_call_expr(fs: &mut FuncState, call: &LuaCallExpr, ret: RetCount) -> LuaResult<()> {
    let prefix = call
        .get_prefix_expr()
        .ok_or_else(|| LuaError::compile("call expression missing callee"))?;
    let args: Vec<LuaExpr> = call
        .get_args_list()
        .ok_or_else(|| LuaError::compile("call expression missing arguments"))?
        .get_args()
        .collect();

    if is_yield_call(&prefix) {
        let nargs = compile_expr_list(fs, &args)?;
        fs.emit(Instr::Yield { nargs, ret });
        return Ok(());
    }

    let is_method = match &prefix {
        LuaExpr::IndexExpr(idx) => idx.get_index_token().map(|t| t.is_colon()).unwrap_or(false),
        _ => false,
    };

    if is_method {
        let LuaExpr::IndexExpr(idx) = &prefix else {
            unreachable!("method call without index expression");
        };
        let obj = idx
            .get_prefix_expr()
            .ok_or_else(|| LuaError::compile("method call missing receiver"))?;
        // obj:m(...) -> call(obj.m, obj, ...)
        compile_expr(fs, &obj)?;
        fs.emit(Instr::Dup);
        compile_index_key(fs, idx)?;
        fs.emit(Instr::Index);
        fs.emit(Instr::Swap);
        let nargs = compile_expr_list(fs, &args)?;
        let nargs = match nargs {
            ArgCount::Fixed(n) => ArgCount::Fixed(n + 1),
            ArgCount::Variadic(n) => ArgCount::Variadic(n + 1),
        };
        fs.emit(Instr::Call { nargs, ret });
    } else {
        compile_expr(fs, &prefix)?;
        let nargs = compile_expr_list(fs, &args)?;
        fs.emit(Instr::Call { nargs, ret });
    }
    Ok(())
}

pub fn compile_table_expr(fs: &mut FuncState, table: &LuaTableExpr) -> LuaResult<()> {
    fs.emit(Instr::NewTable);
    let fields: Vec<_> = table.get_fields().collect();
    let count = fields.len();
    let mut next_index = 1usize;

    for (i, field) in fields.iter().enumerate() {
        if field.is_value_field() {
            let value = field
                .get_value_expr()
                .ok_or_else(|| LuaError::compile("table field missing value"))?;
            let is_last = i + 1 == count;
            if is_last && is_multi_expr(&value) {
                compile_expr_spread(fs, &value)?;
                fs.emit(Instr::TableSpread(next_index));
            } else {
                compile_expr(fs, &value)?;
                fs.emit(Instr::TableSet(next_index));
                next_index += 1;
            }
        } else {
            let key = field
                .get_field_key()
                .ok_or_else(|| LuaError::compile("table field missing key"))?;
            match key {
                LuaIndexKey::Name(tok) => fs.emit(Instr::Str(Rc::from(tok.get_name_text()))),
                LuaIndexKey::String(tok) => {
                    fs.emit(Instr::Str(Rc::from(tok.get_value().as_str())))
                }
                LuaIndexKey::Integer(tok) => fs.emit(Instr::Number(tok.get_int_value() as f64)),
                LuaIndexKey::Expr(e) => compile_expr(fs, &e)?,
                LuaIndexKey::Idx(_) => {
                    return Err(LuaError::compile("unsupported table key"));
                }
            }
            match field.get_value_expr() {
                Some(value) => compile_expr(fs, &value)?,
                None => fs.emit(Instr::Nil),
            }
            fs.emit(Instr::TableSetKeyed);
        }
    }
    Ok(())
}

pub fn compile_closure_expr(
    fs: &mut FuncState,
    closure: &LuaClosureExpr,
    is_method: bool,
    name: &str,
) -> LuaResult<()> {
    let mut params: Vec<Rc<str>> = Vec::new();
    if is_method {
        params.push(Rc::from("self"));
    }
    let mut is_vararg = false;
    if let Some(list) = closure.get_params_list() {
        for param in list.get_params() {
            if param.is_dots() {
                is_vararg = true;
            } else if let Some(tok) = param.get_name_token() {
                params.push(Rc::from(tok.get_name_text()));
            }
        }
    }

    let mut child = FuncState::new(name, params, is_vararg);
    let binds_names = !child.proto.params.is_empty() || child.proto.is_vararg;
    if let Some(body) = closure.get_block() {
        child.proto.opens_scope =
            block_opens_scope(BlockKind::FunctionBody { binds_names }, &body);
        compile_function_body(&mut child, &body)?;
    } else {
        child.proto.opens_scope = binds_names;
    }
    child.emit(Instr::Return(ArgCount::Fixed(0)));

    let idx = fs.proto.protos.len();
    fs.proto.protos.push(Rc::new(child.proto));
    fs.emit(Instr::Closure(idx));
    Ok(())
}
