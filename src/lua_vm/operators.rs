// Operator dispatcher
// Every operator the code generator emits funnels through here so that
// metamethods participate. Raw numeric/string cases are computed directly;
// failures fall back to the relevant metamethod and then to a domain error.

use std::rc::Rc;

use crate::compiler::{BinOp, UnOp};
use crate::lua_value::{LuaTable, LuaValue};
use crate::lua_vm::coercion::{number_to_string, to_number};
use crate::lua_vm::{LuaError, LuaResult, LuaVm};

fn metamethod_of(value: &LuaValue, name: &str) -> Option<LuaValue> {
    match value {
        LuaValue::Table(t) => t.borrow().metamethod(name),
        _ => None,
    }
}

fn call_binary_mm(
    vm: &mut LuaVm,
    name: &str,
    a: &LuaValue,
    b: &LuaValue,
) -> LuaResult<Option<LuaValue>> {
    let mm = metamethod_of(a, name).or_else(|| metamethod_of(b, name));
    match mm {
        Some(f) => {
            let results = vm.call_value(f, vec![a.clone(), b.clone()])?;
            Ok(Some(results.into_iter().next().unwrap_or(LuaValue::Nil)))
        }
        None => Ok(None),
    }
}

pub fn binop(vm: &mut LuaVm, op: BinOp, a: LuaValue, b: LuaValue) -> LuaResult<LuaValue> {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::IDiv | BinOp::Mod
        | BinOp::Pow => arith(vm, op, a, b),
        BinOp::BAnd | BinOp::BOr | BinOp::BXor | BinOp::Shl | BinOp::Shr => bitwise(vm, op, a, b),
        BinOp::Concat => concat(vm, a, b),
        BinOp::Eq => Ok(LuaValue::Boolean(eq(vm, &a, &b)?)),
        BinOp::Ne => Ok(LuaValue::Boolean(!eq(vm, &a, &b)?)),
        BinOp::Lt => Ok(LuaValue::Boolean(lt(vm, &a, &b)?)),
        BinOp::Le => Ok(LuaValue::Boolean(le(vm, &a, &b)?)),
        BinOp::Gt => Ok(LuaValue::Boolean(!le(vm, &a, &b)?)),
        BinOp::Ge => Ok(LuaValue::Boolean(!lt(vm, &a, &b)?)),
    }
}

pub fn unop(vm: &mut LuaVm, op: UnOp, v: LuaValue) -> LuaResult<LuaValue> {
    match op {
        UnOp::Not => Ok(LuaValue::Boolean(!v.is_truthy())),
        UnOp::Neg => {
            if let Some(n) = to_number(&v) {
                return Ok(LuaValue::Number(-n));
            }
            if let Some(mm) = metamethod_of(&v, "__unm") {
                let results = vm.call_value(mm, vec![v.clone(), v])?;
                return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
            }
            Err(arith_error(&v))
        }
        UnOp::BNot => {
            if let Some(i) = int_operand(&v) {
                return Ok(LuaValue::Number(!i as f64));
            }
            if let Some(mm) = metamethod_of(&v, "__bnot") {
                let results = vm.call_value(mm, vec![v.clone(), v])?;
                return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
            }
            Err(arith_error(&v))
        }
        UnOp::Len => len(vm, v),
    }
}

fn arith_error(v: &LuaValue) -> LuaError {
    LuaError::runtime(format!(
        "attempt to perform arithmetic on a {} value",
        v.type_name()
    ))
}

fn arith(vm: &mut LuaVm, op: BinOp, a: LuaValue, b: LuaValue) -> LuaResult<LuaValue> {
    if let (Some(x), Some(y)) = (to_number(&a), to_number(&b)) {
        let r = match op {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            BinOp::Mul => x * y,
            BinOp::Div => x / y,
            BinOp::IDiv => (x / y).floor(),
            BinOp::Mod => lua_mod(x, y),
            BinOp::Pow => x.powf(y),
            _ => unreachable!(),
        };
        return Ok(LuaValue::Number(r));
    }
    let name = match op {
        BinOp::Add => "__add",
        BinOp::Sub => "__sub",
        BinOp::Mul => "__mul",
        BinOp::Div => "__div",
        BinOp::IDiv => "__idiv",
        BinOp::Mod => "__mod",
        BinOp::Pow => "__pow",
        _ => unreachable!(),
    };
    if let Some(r) = call_binary_mm(vm, name, &a, &b)? {
        return Ok(r);
    }
    let culprit = if to_number(&a).is_none() { &a } else { &b };
    Err(arith_error(culprit))
}

/// Lua's modulo: the result follows the sign of the divisor. Division by
/// zero and NaN operands yield NaN, as does an infinite divisor.
pub fn lua_mod(a: f64, b: f64) -> f64 {
    if b == 0.0 || a.is_nan() || b.is_nan() || b.is_infinite() {
        return f64::NAN;
    }
    a - (a / b).floor() * b
}

fn int_operand(v: &LuaValue) -> Option<i64> {
    let n = to_number(v)?;
    if n.fract() == 0.0 && n.is_finite() {
        Some(n as i64)
    } else {
        None
    }
}

fn bitwise(vm: &mut LuaVm, op: BinOp, a: LuaValue, b: LuaValue) -> LuaResult<LuaValue> {
    if let (Some(x), Some(y)) = (int_operand(&a), int_operand(&b)) {
        let r = match op {
            BinOp::BAnd => x & y,
            BinOp::BOr => x | y,
            BinOp::BXor => x ^ y,
            BinOp::Shl => shift(x, y),
            BinOp::Shr => shift(x, -y),
            _ => unreachable!(),
        };
        return Ok(LuaValue::Number(r as f64));
    }
    let name = match op {
        BinOp::BAnd => "__band",
        BinOp::BOr => "__bor",
        BinOp::BXor => "__bxor",
        BinOp::Shl => "__shl",
        BinOp::Shr => "__shr",
        _ => unreachable!(),
    };
    if let Some(r) = call_binary_mm(vm, name, &a, &b)? {
        return Ok(r);
    }
    let culprit = if int_operand(&a).is_none() { &a } else { &b };
    if to_number(culprit).is_some() {
        return Err(LuaError::runtime("number has no integer representation"));
    }
    Err(arith_error(culprit))
}

/// Logical shift; positive `by` shifts left, negative shifts right, and a
/// magnitude of 64 or more gives zero.
fn shift(x: i64, by: i64) -> i64 {
    if by <= -64 || by >= 64 {
        0
    } else if by >= 0 {
        ((x as u64) << by) as i64
    } else {
        ((x as u64) >> (-by)) as i64
    }
}

fn concat(vm: &mut LuaVm, a: LuaValue, b: LuaValue) -> LuaResult<LuaValue> {
    let str_of = |v: &LuaValue| -> Option<String> {
        match v {
            LuaValue::Str(s) => Some(s.to_string()),
            LuaValue::Number(n) => Some(number_to_string(*n)),
            _ => None,
        }
    };
    if let (Some(x), Some(y)) = (str_of(&a), str_of(&b)) {
        return Ok(LuaValue::Str(Rc::from(format!("{}{}", x, y).as_str())));
    }
    if let Some(r) = call_binary_mm(vm, "__concat", &a, &b)? {
        return Ok(r);
    }
    let culprit = if str_of(&a).is_none() { &a } else { &b };
    Err(LuaError::runtime(format!(
        "attempt to concatenate a {} value",
        culprit.type_name()
    )))
}

/// Equality: raw equality first; `__eq` is consulted only when both operands
/// are tables with identical metatables that are not reference-equal.
pub fn eq(vm: &mut LuaVm, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
    if a.raw_equals(b) {
        return Ok(true);
    }
    if let (LuaValue::Table(ta), LuaValue::Table(tb)) = (a, b) {
        let same_meta = match (&ta.borrow().metatable, &tb.borrow().metatable) {
            (Some(ma), Some(mb)) => Rc::ptr_eq(ma, mb),
            _ => false,
        };
        if same_meta {
            if let Some(mm) = ta.borrow().metamethod("__eq") {
                let results = vm.call_value(mm, vec![a.clone(), b.clone()])?;
                return Ok(results.first().map(|v| v.is_truthy()).unwrap_or(false));
            }
        }
    }
    Ok(false)
}

fn compare_error(a: &LuaValue, b: &LuaValue) -> LuaError {
    LuaError::runtime(format!(
        "attempt to compare {} with {}",
        a.type_name(),
        b.type_name()
    ))
}

pub fn lt(vm: &mut LuaVm, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
    match (a, b) {
        (LuaValue::Number(x), LuaValue::Number(y)) => Ok(x < y),
        (LuaValue::Str(x), LuaValue::Str(y)) => Ok(x.as_bytes() < y.as_bytes()),
        _ => {
            if let Some(r) = call_binary_mm(vm, "__lt", a, b)? {
                return Ok(r.is_truthy());
            }
            Err(compare_error(a, b))
        }
    }
}

pub fn le(vm: &mut LuaVm, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
    match (a, b) {
        (LuaValue::Number(x), LuaValue::Number(y)) => Ok(x <= y),
        (LuaValue::Str(x), LuaValue::Str(y)) => Ok(x.as_bytes() <= y.as_bytes()),
        _ => {
            if let Some(r) = call_binary_mm(vm, "__le", a, b)? {
                return Ok(r.is_truthy());
            }
            Err(compare_error(a, b))
        }
    }
}

pub fn len(vm: &mut LuaVm, v: LuaValue) -> LuaResult<LuaValue> {
    match &v {
        LuaValue::Str(s) => Ok(LuaValue::Number(s.as_bytes().len() as f64)),
        LuaValue::Table(t) => {
            let mm = t.borrow().metamethod("__len");
            if let Some(mm) = mm {
                let results = vm.call_value(mm, vec![v.clone()])?;
                return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
            }
            let b = t.borrow().border();
            Ok(LuaValue::Number(b as f64))
        }
        _ => Err(LuaError::runtime(
            "attempt to get length of an unsupported value",
        )),
    }
}

// ---- indexing helpers ----

/// `get(base, key)`: tables chase `__index` (tables recursively, functions
/// invoked); strings consult the environment's string metatable.
pub fn index_get(vm: &mut LuaVm, base: LuaValue, key: LuaValue) -> LuaResult<LuaValue> {
    match &base {
        LuaValue::Table(_) => table_get(vm, base, key),
        LuaValue::Str(_) => {
            let handler = vm.string_meta.borrow().get_str("__index");
            match handler {
                LuaValue::Table(_) => table_get(vm, handler, key),
                LuaValue::Nil => Ok(LuaValue::Nil),
                f => {
                    let results = vm.call_value(f, vec![base, key])?;
                    Ok(results.into_iter().next().unwrap_or(LuaValue::Nil))
                }
            }
        }
        _ => Err(LuaError::runtime(format!(
            "attempt to index a {} value",
            base.type_name()
        ))),
    }
}

const META_CHAIN_LIMIT: usize = 100;

fn table_get(vm: &mut LuaVm, mut base: LuaValue, key: LuaValue) -> LuaResult<LuaValue> {
    let mut hops = 0;
    loop {
        hops += 1;
        if hops > META_CHAIN_LIMIT {
            return Err(LuaError::runtime("'__index' chain too long; possible loop"));
        }
        let table = match &base {
            LuaValue::Table(t) => t.clone(),
            _ => return index_get(vm, base, key),
        };
        let raw = table.borrow().raw_get(&key);
        if !raw.is_nil() {
            return Ok(raw);
        }
        let mm = table.borrow().metamethod("__index");
        match mm {
            None => return Ok(LuaValue::Nil),
            Some(LuaValue::Table(t)) => base = LuaValue::Table(t),
            Some(f) => {
                let results = vm.call_value(f, vec![base, key])?;
                return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
            }
        }
    }
}

/// `set(base, key, value)`: `__newindex` is consulted only when the raw slot
/// is currently absent.
pub fn index_set(vm: &mut LuaVm, base: LuaValue, key: LuaValue, value: LuaValue) -> LuaResult<()> {
    let mut target = base;
    let mut hops = 0;
    loop {
        hops += 1;
        if hops > META_CHAIN_LIMIT {
            return Err(LuaError::runtime(
                "'__newindex' chain too long; possible loop",
            ));
        }
        let table = match &target {
            LuaValue::Table(t) => t.clone(),
            _ => {
                return Err(LuaError::runtime(format!(
                    "attempt to index a {} value",
                    target.type_name()
                )))
            }
        };
        let absent = table.borrow().raw_get(&key).is_nil();
        if absent {
            let mm = table.borrow().metamethod("__newindex");
            match mm {
                None => {}
                Some(LuaValue::Table(t)) => {
                    target = LuaValue::Table(t);
                    continue;
                }
                Some(f) => {
                    vm.call_value(f, vec![target, key, value])?;
                    return Ok(());
                }
            }
        }
        table.borrow_mut().raw_set(&key, value)?;
        return Ok(());
    }
}

/// Raw table construction helper used by literals and libraries.
pub fn new_table_value() -> LuaValue {
    LuaValue::table(LuaTable::new())
}
