// printf engine for string.format
// Accepts Lua's format-spec syntax: flags '-', '+', ' ', '#', '0', width,
// precision, and the conversion letters AEGXacdefgioqsux. %q quotes with
// escapes for '"' and newline.

use crate::lua_value::LuaValue;
use crate::lua_vm::coercion::{bad_argument, display, to_number};
use crate::lua_vm::{LuaError, LuaResult, LuaVm};
use crate::stdlib::basic::tostring_value;

#[derive(Default)]
struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    hash: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
}

pub fn format(vm: &mut LuaVm, fmt: &str, args: &[LuaValue]) -> LuaResult<String> {
    let bytes = fmt.as_bytes();
    let mut out = String::with_capacity(fmt.len());
    let mut i = 0;
    let mut next_arg = 0usize;

    let mut take = |n: &mut usize| -> LuaValue {
        let v = args.get(*n).cloned().unwrap_or(LuaValue::Nil);
        *n += 1;
        v
    };

    while i < bytes.len() {
        if bytes[i] != b'%' {
            let ch = fmt[i..].chars().next().unwrap_or('\u{fffd}');
            out.push(ch);
            i += ch.len_utf8();
            continue;
        }
        i += 1;
        if bytes.get(i) == Some(&b'%') {
            out.push('%');
            i += 1;
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&f) = bytes.get(i) {
            match f {
                b'-' => spec.minus = true,
                b'+' => spec.plus = true,
                b' ' => spec.space = true,
                b'#' => spec.hash = true,
                b'0' => spec.zero = true,
                _ => break,
            }
            i += 1;
        }
        while let Some(&d) = bytes.get(i) {
            if d.is_ascii_digit() {
                spec.width = spec.width * 10 + (d - b'0') as usize;
                i += 1;
            } else {
                break;
            }
        }
        if bytes.get(i) == Some(&b'.') {
            i += 1;
            let mut p = 0usize;
            while let Some(&d) = bytes.get(i) {
                if d.is_ascii_digit() {
                    p = p * 10 + (d - b'0') as usize;
                    i += 1;
                } else {
                    break;
                }
            }
            spec.precision = Some(p);
        }

        let Some(&conv) = bytes.get(i) else {
            return Err(LuaError::runtime(
                "invalid format string to 'format' (ends with '%')",
            ));
        };
        i += 1;

        let arg_index = next_arg + 1;
        match conv {
            b'd' | b'i' => {
                let n = want_integer(&take(&mut next_arg), arg_index)?;
                out.push_str(&pad_number(&format_signed(n, &spec), &spec));
            }
            b'u' => {
                let n = want_integer(&take(&mut next_arg), arg_index)?;
                out.push_str(&pad_number(&format!("{}", n as u64), &spec));
            }
            b'c' => {
                let n = want_integer(&take(&mut next_arg), arg_index)?;
                out.push((n as u8) as char);
            }
            b'o' => {
                let n = want_integer(&take(&mut next_arg), arg_index)?;
                out.push_str(&pad_number(&format!("{:o}", n as u64), &spec));
            }
            b'x' => {
                let n = want_integer(&take(&mut next_arg), arg_index)?;
                let body = format!("{:x}", n as u64);
                let body = if spec.hash {
                    format!("0x{}", body)
                } else {
                    body
                };
                out.push_str(&pad_number(&body, &spec));
            }
            b'X' => {
                let n = want_integer(&take(&mut next_arg), arg_index)?;
                let body = format!("{:X}", n as u64);
                let body = if spec.hash {
                    format!("0X{}", body)
                } else {
                    body
                };
                out.push_str(&pad_number(&body, &spec));
            }
            b'f' => {
                let x = want_number(&take(&mut next_arg), arg_index)?;
                let prec = spec.precision.unwrap_or(6);
                out.push_str(&pad_number(&with_sign(format!("{:.*}", prec, x), x, &spec), &spec));
            }
            b'e' | b'E' => {
                let x = want_number(&take(&mut next_arg), arg_index)?;
                let prec = spec.precision.unwrap_or(6);
                let body = c_exponent(format!("{:.*e}", prec, x), conv == b'E');
                out.push_str(&pad_number(&with_sign(body, x, &spec), &spec));
            }
            b'g' | b'G' => {
                let x = want_number(&take(&mut next_arg), arg_index)?;
                let body = general_float(x, spec.precision.unwrap_or(6), conv == b'G');
                out.push_str(&pad_number(&with_sign(body, x, &spec), &spec));
            }
            b'a' | b'A' => {
                let x = want_number(&take(&mut next_arg), arg_index)?;
                let body = hex_float(x, conv == b'A');
                out.push_str(&pad_number(&body, &spec));
            }
            b's' => {
                let v = take(&mut next_arg);
                let mut s = tostring_value(vm, &v)?;
                if let Some(p) = spec.precision {
                    s.truncate(p.min(s.len()));
                }
                out.push_str(&pad_text(&s, &spec));
            }
            b'q' => {
                let v = take(&mut next_arg);
                let s = match &v {
                    LuaValue::Str(s) => s.to_string(),
                    other => display(other),
                };
                out.push('"');
                for ch in s.chars() {
                    match ch {
                        '"' => out.push_str("\\\""),
                        '\n' => out.push_str("\\n"),
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            other => {
                return Err(LuaError::runtime(format!(
                    "invalid conversion '%{}' to 'format'",
                    other as char
                )));
            }
        }
    }

    Ok(out)
}

fn want_number(v: &LuaValue, index: usize) -> LuaResult<f64> {
    to_number(v).ok_or_else(|| bad_argument(index, "format", "number", v))
}

fn want_integer(v: &LuaValue, index: usize) -> LuaResult<i64> {
    let n = want_number(v, index)?;
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(LuaError::runtime(format!(
            "bad argument #{} to 'format' (number has no integer representation)",
            index
        )));
    }
    Ok(n as i64)
}

fn format_signed(n: i64, spec: &Spec) -> String {
    if n >= 0 && spec.plus {
        format!("+{}", n)
    } else if n >= 0 && spec.space {
        format!(" {}", n)
    } else {
        format!("{}", n)
    }
}

fn with_sign(body: String, x: f64, spec: &Spec) -> String {
    if x >= 0.0 && spec.plus {
        format!("+{}", body)
    } else if x >= 0.0 && spec.space {
        format!(" {}", body)
    } else {
        body
    }
}

/// Width padding for numeric conversions: '0' pads after the sign unless
/// left-aligned.
fn pad_number(body: &str, spec: &Spec) -> String {
    if body.len() >= spec.width {
        return body.to_string();
    }
    let fill = spec.width - body.len();
    if spec.minus {
        format!("{}{}", body, " ".repeat(fill))
    } else if spec.zero {
        let (sign, digits) = match body.as_bytes().first() {
            Some(b'-') | Some(b'+') | Some(b' ') => body.split_at(1),
            _ => ("", body),
        };
        format!("{}{}{}", sign, "0".repeat(fill), digits)
    } else {
        format!("{}{}", " ".repeat(fill), body)
    }
}

fn pad_text(body: &str, spec: &Spec) -> String {
    if body.len() >= spec.width {
        return body.to_string();
    }
    let fill = " ".repeat(spec.width - body.len());
    if spec.minus {
        format!("{}{}", body, fill)
    } else {
        format!("{}{}", fill, body)
    }
}

/// Rewrite Rust's `1.5e2` exponent form into C's `1.5e+02`.
fn c_exponent(s: String, upper: bool) -> String {
    let Some(epos) = s.find(['e', 'E']) else {
        return s;
    };
    let (mantissa, exp) = s.split_at(epos);
    let exp = &exp[1..];
    let (sign, digits) = match exp.as_bytes().first() {
        Some(b'-') => ("-", &exp[1..]),
        _ => ("+", exp),
    };
    let e = if upper { 'E' } else { 'e' };
    if digits.len() < 2 {
        format!("{}{}{}0{}", mantissa, e, sign, digits)
    } else {
        format!("{}{}{}{}", mantissa, e, sign, digits)
    }
}

/// C's %g: shortest of %e/%f at the given significant-digit count, trailing
/// zeros removed.
fn general_float(x: f64, precision: usize, upper: bool) -> String {
    let prec = precision.max(1);
    if x == 0.0 {
        return "0".to_string();
    }
    let exp = x.abs().log10().floor() as i32;
    if exp < -4 || exp >= prec as i32 {
        let body = format!("{:.*e}", prec - 1, x);
        let trimmed = trim_float_zeros(&body.replace('e', "\u{1}"))
            .replace('\u{1}', "e");
        c_exponent(trimmed, upper)
    } else {
        let after_point = (prec as i32 - 1 - exp).max(0) as usize;
        trim_float_zeros(&format!("{:.*}", after_point, x))
    }
}

fn trim_float_zeros(s: &str) -> String {
    let split = s.find('\u{1}').unwrap_or(s.len());
    let (mantissa, tail) = s.split_at(split);
    if !mantissa.contains('.') {
        return s.to_string();
    }
    let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", trimmed, tail)
}

/// C's %a hexadecimal float form.
fn hex_float(x: f64, upper: bool) -> String {
    let body = if x == 0.0 {
        "0x0p+0".to_string()
    } else {
        let bits = x.to_bits();
        let sign = if bits >> 63 == 1 { "-" } else { "" };
        let exponent = ((bits >> 52) & 0x7ff) as i64 - 1023;
        let mantissa = bits & 0xf_ffff_ffff_ffff;
        let mut hex = format!("{:013x}", mantissa);
        while hex.ends_with('0') && hex.len() > 1 {
            hex.pop();
        }
        if mantissa == 0 {
            format!("{}0x1p{:+}", sign, exponent)
        } else {
            format!("{}0x1.{}p{:+}", sign, hex, exponent)
        }
    };
    if upper {
        body.to_uppercase()
    } else {
        body
    }
}
