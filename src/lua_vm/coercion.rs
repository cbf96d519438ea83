// Value coercions and canonical display forms

use crate::lua_value::LuaValue;
use crate::lua_vm::{LuaError, LuaResult};
use std::rc::Rc;

/// Coerce to a number: numbers pass through, strings are parsed with Lua
/// rules (optional sign, hex with 0x, surrounding whitespace).
pub fn to_number(value: &LuaValue) -> Option<f64> {
    match value {
        LuaValue::Number(n) => Some(*n),
        LuaValue::Str(s) => parse_number(s),
        _ => None,
    }
}

pub fn parse_number(text: &str) -> Option<f64> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    let (sign, rest) = match t.as_bytes()[0] {
        b'-' => (-1.0, &t[1..]),
        b'+' => (1.0, &t[1..]),
        _ => (1.0, t),
    };
    if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        if hex.is_empty() {
            return None;
        }
        let mut acc = 0.0f64;
        for c in hex.chars() {
            acc = acc * 16.0 + (c.to_digit(16)? as f64);
        }
        return Some(sign * acc);
    }
    rest.parse::<f64>().ok().map(|n| sign * n)
}

/// Parse in an explicit base 2..=36 (tonumber's second argument).
pub fn parse_number_with_base(text: &str, base: u32) -> Option<f64> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    let (sign, digits) = match t.as_bytes()[0] {
        b'-' => (-1.0, &t[1..]),
        b'+' => (1.0, &t[1..]),
        _ => (1.0, t),
    };
    if digits.is_empty() {
        return None;
    }
    let mut acc = 0.0f64;
    for c in digits.chars() {
        let d = c.to_digit(base)?;
        acc = acc * base as f64 + d as f64;
    }
    Some(sign * acc)
}

/// Canonical textual form of a number: integral finite values print without a
/// fractional part, infinities and NaN use Lua's spellings.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    format!("{}", n)
}

/// Raw display form (tostring without metamethods).
pub fn display(value: &LuaValue) -> String {
    match value {
        LuaValue::Nil => "nil".to_string(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Number(n) => number_to_string(*n),
        LuaValue::Str(s) => s.to_string(),
        LuaValue::Table(t) => format!("table: {:p}", Rc::as_ptr(t)),
        LuaValue::Function(f) => format!("function: {:p}", Rc::as_ptr(f)),
        LuaValue::Native(f) => format!("function: builtin: {:p}", Rc::as_ptr(f)),
        LuaValue::Thread(t) => format!("thread: {:p}", Rc::as_ptr(t)),
    }
}

/// Coerce to an integer-valued number, for APIs that require one.
pub fn to_integer(value: &LuaValue) -> Option<i64> {
    let n = to_number(value)?;
    if n.fract() == 0.0 && n.is_finite() && n.abs() <= i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

// ---- argument checking helpers for library functions ----

pub fn bad_argument(index: usize, func: &str, expected: &str, got: &LuaValue) -> LuaError {
    LuaError::runtime(format!(
        "bad argument #{} to '{}' ({} expected, got {})",
        index,
        func,
        expected,
        got.type_name()
    ))
}

pub fn check_number(args: &[LuaValue], index: usize, func: &str) -> LuaResult<f64> {
    let v = args.get(index - 1).cloned().unwrap_or(LuaValue::Nil);
    to_number(&v).ok_or_else(|| bad_argument(index, func, "number", &v))
}

pub fn check_integer(args: &[LuaValue], index: usize, func: &str) -> LuaResult<i64> {
    let v = args.get(index - 1).cloned().unwrap_or(LuaValue::Nil);
    to_integer(&v).ok_or_else(|| bad_argument(index, func, "number", &v))
}

pub fn check_string(args: &[LuaValue], index: usize, func: &str) -> LuaResult<Rc<str>> {
    let v = args.get(index - 1).cloned().unwrap_or(LuaValue::Nil);
    match &v {
        LuaValue::Str(s) => Ok(s.clone()),
        LuaValue::Number(n) => Ok(Rc::from(number_to_string(*n).as_str())),
        _ => Err(bad_argument(index, func, "string", &v)),
    }
}

pub fn check_table(
    args: &[LuaValue],
    index: usize,
    func: &str,
) -> LuaResult<Rc<std::cell::RefCell<crate::lua_value::LuaTable>>> {
    let v = args.get(index - 1).cloned().unwrap_or(LuaValue::Nil);
    match &v {
        LuaValue::Table(t) => Ok(t.clone()),
        _ => Err(bad_argument(index, func, "table", &v)),
    }
}

pub fn opt_integer(args: &[LuaValue], index: usize, default: i64) -> i64 {
    args.get(index - 1)
        .and_then(to_integer)
        .unwrap_or(default)
}

pub fn arg(args: &[LuaValue], index: usize) -> LuaValue {
    args.get(index - 1).cloned().unwrap_or(LuaValue::Nil)
}
