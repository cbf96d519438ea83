// String library
// Implements: len, sub, upper, lower, rep, reverse, byte, char, format,
// find, match, gmatch, gsub
// All indexing is byte-oriented with Lua's 1-based positions and negative
// offsets (posrelat). gmatch streams matches; nothing is pre-materialized.

use std::cell::RefCell;
use std::rc::Rc;

use crate::lib_registry::LibraryModule;
use crate::lua_value::{LuaValue, NativeFunction};
use crate::lua_vm::coercion::{
    arg, bad_argument, check_integer, check_string, number_to_string, opt_integer,
};
use crate::lua_vm::{LuaError, LuaResult, LuaVm};
use crate::stdlib::pattern::{translate, CaptureValue, LuaPattern, MatchResult};
use crate::stdlib::string_format;

pub fn create_string_lib() -> LibraryModule {
    crate::lib_module!("string", {
        "len" => string_len,
        "sub" => string_sub,
        "upper" => string_upper,
        "lower" => string_lower,
        "rep" => string_rep,
        "reverse" => string_reverse,
        "byte" => string_byte,
        "char" => string_char,
        "format" => string_format_fn,
        "find" => string_find,
        "match" => string_match,
        "gmatch" => string_gmatch,
        "gsub" => string_gsub,
    })
}

/// Lua's posrelat: negative positions count back from the end.
fn posrelat(pos: i64, len: usize) -> i64 {
    if pos >= 0 {
        pos
    } else if (-pos) as usize > len {
        0
    } else {
        len as i64 + pos + 1
    }
}

fn bytes_to_value(bytes: &[u8]) -> LuaValue {
    LuaValue::string(String::from_utf8_lossy(bytes))
}

fn string_len(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(&args, 1, "len")?;
    Ok(vec![LuaValue::Number(s.as_bytes().len() as f64)])
}

fn string_sub(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(&args, 1, "sub")?;
    let bytes = s.as_bytes();
    let len = bytes.len();
    let i = posrelat(opt_integer(&args, 2, 1), len).max(1);
    let j = posrelat(opt_integer(&args, 3, -1), len).min(len as i64);
    if i > j {
        return Ok(vec![LuaValue::string("")]);
    }
    Ok(vec![bytes_to_value(&bytes[(i - 1) as usize..j as usize])])
}

fn string_upper(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(&args, 1, "upper")?;
    Ok(vec![LuaValue::string(s.to_ascii_uppercase())])
}

fn string_lower(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(&args, 1, "lower")?;
    Ok(vec![LuaValue::string(s.to_ascii_lowercase())])
}

fn string_rep(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(&args, 1, "rep")?;
    let n = check_integer(&args, 2, "rep")?;
    let sep = match args.get(2) {
        Some(LuaValue::Str(sep)) => sep.to_string(),
        _ => String::new(),
    };
    if n <= 0 {
        return Ok(vec![LuaValue::string("")]);
    }
    let mut out = String::with_capacity(s.len() * n as usize);
    for i in 0..n {
        if i > 0 {
            out.push_str(&sep);
        }
        out.push_str(&s);
    }
    Ok(vec![LuaValue::string(out)])
}

fn string_reverse(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(&args, 1, "reverse")?;
    let mut bytes = s.as_bytes().to_vec();
    bytes.reverse();
    Ok(vec![bytes_to_value(&bytes)])
}

fn string_byte(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(&args, 1, "byte")?;
    let bytes = s.as_bytes();
    let len = bytes.len();
    let i = posrelat(opt_integer(&args, 2, 1), len).max(1);
    let j = posrelat(opt_integer(&args, 3, i), len).min(len as i64);
    let mut out = Vec::new();
    let mut k = i;
    while k <= j {
        out.push(LuaValue::Number(bytes[(k - 1) as usize] as f64));
        k += 1;
    }
    Ok(out)
}

fn string_char(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let mut bytes = Vec::with_capacity(args.len());
    for i in 1..=args.len() {
        let code = check_integer(&args, i, "char")?;
        if !(0..=255).contains(&code) {
            return Err(LuaError::runtime(format!(
                "bad argument #{} to 'char' (value out of range)",
                i
            )));
        }
        bytes.push(code as u8);
    }
    Ok(vec![bytes_to_value(&bytes)])
}

fn string_format_fn(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let fmt = check_string(&args, 1, "format")?;
    let rest = if args.len() > 1 { &args[1..] } else { &[] };
    let out = string_format::format(vm, &fmt, rest)?;
    Ok(vec![LuaValue::string(out)])
}

/// Clamp find/match's init argument to a byte offset; None means past the
/// end of the subject.
fn init_offset(args: &[LuaValue], index: usize, len: usize) -> Option<usize> {
    let init = posrelat(opt_integer(args, index, 1), len).max(1);
    if init as usize > len + 1 {
        None
    } else {
        Some(init as usize - 1)
    }
}

fn capture_to_value(c: &CaptureValue) -> LuaValue {
    match c {
        CaptureValue::Text(bytes) => bytes_to_value(bytes),
        CaptureValue::Position(p) => LuaValue::Number(*p as f64),
    }
}

fn match_values(subject: &[u8], m: &MatchResult) -> Vec<LuaValue> {
    if m.captures.is_empty() {
        vec![bytes_to_value(&subject[m.start..m.end])]
    } else {
        m.captures.iter().map(capture_to_value).collect()
    }
}

fn string_find(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(&args, 1, "find")?;
    let p = check_string(&args, 2, "find")?;
    let bytes = s.as_bytes();
    let Some(init) = init_offset(&args, 3, bytes.len()) else {
        return Ok(vec![LuaValue::Nil]);
    };
    let plain = arg(&args, 4).is_truthy();

    if plain {
        // plain find ignores all magic characters
        let needle = p.as_bytes();
        let hay = &bytes[init..];
        let found = hay
            .windows(needle.len().max(1))
            .position(|w| w == needle)
            .or(if needle.is_empty() { Some(0) } else { None });
        return Ok(match found {
            Some(at) => vec![
                LuaValue::Number((init + at + 1) as f64),
                LuaValue::Number((init + at + needle.len()) as f64),
            ],
            None => vec![LuaValue::Nil],
        });
    }

    let pat = translate(&p)?;
    match pat.first_match(bytes, init) {
        Some(m) => {
            let mut out = vec![
                LuaValue::Number((m.start + 1) as f64),
                LuaValue::Number(m.end as f64),
            ];
            out.extend(m.captures.iter().map(capture_to_value));
            Ok(out)
        }
        None => Ok(vec![LuaValue::Nil]),
    }
}

fn string_match(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(&args, 1, "match")?;
    let p = check_string(&args, 2, "match")?;
    let bytes = s.as_bytes();
    let Some(init) = init_offset(&args, 3, bytes.len()) else {
        return Ok(vec![LuaValue::Nil]);
    };
    let pat = translate(&p)?;
    match pat.first_match(bytes, init) {
        Some(m) => Ok(match_values(bytes, &m)),
        None => Ok(vec![LuaValue::Nil]),
    }
}

fn string_gmatch(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(&args, 1, "gmatch")?;
    let p = check_string(&args, 2, "gmatch")?;
    let pat = translate(&p)?;
    let subject: Rc<str> = s;
    let pos = RefCell::new(0usize);

    // a streaming iterator: each call advances past the previous match
    let iter = NativeFunction::new("gmatch_iter", move |_vm, _args| {
        let bytes = subject.as_bytes();
        let mut at = pos.borrow_mut();
        if *at > bytes.len() {
            return Ok(vec![LuaValue::Nil]);
        }
        match pat.first_match(bytes, *at) {
            Some(m) => {
                *at = if m.end > m.start { m.end } else { m.end + 1 };
                Ok(match_values(bytes, &m))
            }
            None => {
                *at = bytes.len() + 1;
                Ok(vec![LuaValue::Nil])
            }
        }
    });
    Ok(vec![LuaValue::Native(iter)])
}

fn gsub_expand(
    template: &str,
    whole: &[u8],
    m: &MatchResult,
    out: &mut Vec<u8>,
) -> LuaResult<()> {
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            i += 1;
            match bytes.get(i) {
                Some(b'%') => out.push(b'%'),
                Some(b'0') => out.extend_from_slice(whole),
                Some(d @ b'1'..=b'9') => {
                    let idx = (d - b'1') as usize;
                    if m.captures.is_empty() && idx == 0 {
                        out.extend_from_slice(whole);
                    } else {
                        match m.captures.get(idx) {
                            Some(CaptureValue::Text(t)) => out.extend_from_slice(t),
                            Some(CaptureValue::Position(p)) => {
                                out.extend_from_slice(p.to_string().as_bytes())
                            }
                            None => {
                                return Err(LuaError::runtime(format!(
                                    "invalid capture index %{} in replacement string",
                                    idx + 1
                                )))
                            }
                        }
                    }
                }
                _ => {
                    return Err(LuaError::runtime(
                        "invalid use of '%' in replacement string",
                    ))
                }
            }
            i += 1;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(())
}

fn gsub_replacement(
    vm: &mut LuaVm,
    repl: &LuaValue,
    subject: &[u8],
    m: &MatchResult,
    out: &mut Vec<u8>,
) -> LuaResult<()> {
    let whole = &subject[m.start..m.end];
    match repl {
        LuaValue::Str(template) => gsub_expand(template, whole, m, out),
        LuaValue::Number(n) => gsub_expand(&number_to_string(*n), whole, m, out),
        LuaValue::Table(t) => {
            let key = match_values(subject, m)
                .into_iter()
                .next()
                .unwrap_or(LuaValue::Nil);
            let v = t.borrow().raw_get(&key);
            append_replacement_value(&v, whole, out)
        }
        LuaValue::Function(_) | LuaValue::Native(_) => {
            let call_args = match_values(subject, m);
            let results = vm.call_value(repl.clone(), call_args)?;
            let v = results.into_iter().next().unwrap_or(LuaValue::Nil);
            append_replacement_value(&v, whole, out)
        }
        other => Err(bad_argument(
            3,
            "gsub",
            "string/function/table",
            other,
        )),
    }
}

fn append_replacement_value(v: &LuaValue, whole: &[u8], out: &mut Vec<u8>) -> LuaResult<()> {
    match v {
        LuaValue::Nil | LuaValue::Boolean(false) => out.extend_from_slice(whole),
        LuaValue::Str(s) => out.extend_from_slice(s.as_bytes()),
        LuaValue::Number(n) => out.extend_from_slice(number_to_string(*n).as_bytes()),
        other => {
            return Err(LuaError::runtime(format!(
                "invalid replacement value (a {})",
                other.type_name()
            )))
        }
    }
    Ok(())
}

fn string_gsub(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(&args, 1, "gsub")?;
    let p = check_string(&args, 2, "gsub")?;
    let repl = arg(&args, 3);
    let max_n = opt_integer(&args, 4, i64::MAX);

    let subject = s.as_bytes();
    let pat: LuaPattern = translate(&p)?;

    let mut out: Vec<u8> = Vec::with_capacity(subject.len());
    let mut pos = 0usize;
    let mut count = 0i64;

    while count < max_n && pos <= subject.len() {
        let Some(m) = pat.first_match(subject, pos) else {
            break;
        };
        out.extend_from_slice(&subject[pos..m.start]);
        gsub_replacement(vm, &repl, subject, &m, &mut out)?;
        count += 1;
        if m.end > m.start {
            pos = m.end;
        } else {
            // empty match: copy one byte forward to guarantee progress
            if m.start < subject.len() {
                out.push(subject[m.start]);
            }
            pos = m.start + 1;
        }
        if pat.anchored {
            break;
        }
    }
    if pos <= subject.len() {
        out.extend_from_slice(&subject[pos.min(subject.len())..]);
    }

    Ok(vec![bytes_to_value(&out), LuaValue::Number(count as f64)])
}
