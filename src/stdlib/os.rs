// OS library
// Implements: time, date, difftime, exit
// Date arithmetic is calendar-correct (civil-from-days); the engine carries
// no timezone database, so local time equals UTC and "!" is accepted and
// stripped.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::lib_registry::LibraryModule;
use crate::lua_value::{LuaTable, LuaValue};
use crate::lua_vm::coercion::{arg, check_number, to_integer};
use crate::lua_vm::{LuaError, LuaResult, LuaVm};

pub fn create_os_lib() -> LibraryModule {
    crate::lib_module!("os", {
        "time" => os_time,
        "date" => os_date,
        "difftime" => os_difftime,
        "exit" => os_exit,
    })
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Days since the epoch for a civil date (Howard Hinnant's algorithm).
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Civil date for days since the epoch.
fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}

struct BrokenDown {
    year: i64,
    month: i64,
    day: i64,
    hour: i64,
    min: i64,
    sec: i64,
    /// Sunday is 1.
    wday: i64,
    yday: i64,
}

fn broken_down(timestamp: i64) -> BrokenDown {
    let days = timestamp.div_euclid(86_400);
    let secs = timestamp.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    let wday = days.rem_euclid(7) + 4; // epoch day was a Thursday
    let wday = wday % 7 + 1;
    let yday = days - days_from_civil(year, 1, 1) + 1;
    BrokenDown {
        year,
        month,
        day,
        hour: secs / 3600,
        min: secs / 60 % 60,
        sec: secs % 60,
        wday,
        yday,
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn os_time(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let spec = arg(&args, 1);
    let timestamp = match &spec {
        LuaValue::Nil => now(),
        LuaValue::Table(t) => {
            let t = t.borrow();
            let field = |name: &str, default: Option<i64>| -> LuaResult<i64> {
                let v = t.get_str(name);
                match to_integer(&v) {
                    Some(n) => Ok(n),
                    None => default.ok_or_else(|| {
                        LuaError::runtime(format!("field '{}' missing in date table", name))
                    }),
                }
            };
            let year = field("year", None)?;
            let month = field("month", None)?;
            let day = field("day", None)?;
            let hour = field("hour", Some(12))?;
            let min = field("min", Some(0))?;
            let sec = field("sec", Some(0))?;
            days_from_civil(year, month, day) * 86_400 + hour * 3600 + min * 60 + sec
        }
        other => return Err(LuaError::runtime(format!(
            "bad argument #1 to 'time' (table expected, got {})",
            other.type_name()
        ))),
    };
    Ok(vec![LuaValue::Number(timestamp as f64)])
}

fn date_table(b: &BrokenDown) -> LuaValue {
    let mut t = LuaTable::new();
    t.set_str("year", LuaValue::Number(b.year as f64));
    t.set_str("month", LuaValue::Number(b.month as f64));
    t.set_str("day", LuaValue::Number(b.day as f64));
    t.set_str("hour", LuaValue::Number(b.hour as f64));
    t.set_str("min", LuaValue::Number(b.min as f64));
    t.set_str("sec", LuaValue::Number(b.sec as f64));
    t.set_str("wday", LuaValue::Number(b.wday as f64));
    t.set_str("yday", LuaValue::Number(b.yday as f64));
    t.set_str("isdst", LuaValue::Boolean(false));
    LuaValue::table(t)
}

fn strftime(format: &str, b: &BrokenDown) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('a') => out.push_str(&DAY_NAMES[(b.wday - 1) as usize][..3]),
            Some('A') => out.push_str(DAY_NAMES[(b.wday - 1) as usize]),
            Some('b') => out.push_str(&MONTH_NAMES[(b.month - 1) as usize][..3]),
            Some('B') => out.push_str(MONTH_NAMES[(b.month - 1) as usize]),
            Some('c') => {
                out.push_str(&strftime("%a %b %d %H:%M:%S %Y", b));
            }
            Some('d') => out.push_str(&format!("{:02}", b.day)),
            Some('H') => out.push_str(&format!("{:02}", b.hour)),
            Some('I') => {
                let h = b.hour % 12;
                out.push_str(&format!("{:02}", if h == 0 { 12 } else { h }));
            }
            Some('j') => out.push_str(&format!("{:03}", b.yday)),
            Some('m') => out.push_str(&format!("{:02}", b.month)),
            Some('M') => out.push_str(&format!("{:02}", b.min)),
            Some('p') => out.push_str(if b.hour < 12 { "AM" } else { "PM" }),
            Some('S') => out.push_str(&format!("{:02}", b.sec)),
            Some('x') => out.push_str(&strftime("%m/%d/%y", b)),
            Some('X') => out.push_str(&strftime("%H:%M:%S", b)),
            Some('Y') => out.push_str(&b.year.to_string()),
            Some('y') => out.push_str(&format!("{:02}", b.year.rem_euclid(100))),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

fn os_date(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let format = match arg(&args, 1) {
        LuaValue::Str(s) => s.to_string(),
        LuaValue::Nil => "%c".to_string(),
        other => {
            return Err(LuaError::runtime(format!(
                "bad argument #1 to 'date' (string expected, got {})",
                other.type_name()
            )))
        }
    };
    let timestamp = match args.get(1) {
        Some(v) if !v.is_nil() => to_integer(v).ok_or_else(|| {
            LuaError::runtime("bad argument #2 to 'date' (number expected)")
        })?,
        _ => now(),
    };

    // "!" selects UTC; without a timezone database both spellings agree
    let format = format.strip_prefix('!').unwrap_or(&format).to_string();
    let b = broken_down(timestamp);

    if format == "*t" {
        return Ok(vec![date_table(&b)]);
    }
    Ok(vec![LuaValue::string(strftime(&format, &b))])
}

fn os_difftime(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let t2 = check_number(&args, 1, "difftime")?;
    let t1 = args.get(1).and_then(crate::lua_vm::coercion::to_number).unwrap_or(0.0);
    Ok(vec![LuaValue::Number(t2 - t1)])
}

fn os_exit(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let code = match arg(&args, 1) {
        LuaValue::Nil => 0,
        LuaValue::Boolean(true) => 0,
        LuaValue::Boolean(false) => 1,
        v => to_integer(&v)
            .ok_or_else(|| LuaError::runtime("bad argument #1 to 'exit' (number expected)"))?,
    };
    let Some(handler) = vm.config.os_exit.clone() else {
        return Err(LuaError::runtime("os.exit is not available in this environment"));
    };
    handler(code);
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn civil_round_trip() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        let d = days_from_civil(2000, 2, 29);
        assert_eq!(civil_from_days(d), (2000, 2, 29));
        let d = days_from_civil(2024, 12, 31);
        assert_eq!(civil_from_days(d), (2024, 12, 31));
    }

    #[test]
    fn broken_down_fields() {
        // 2000-03-01 12:34:56 UTC
        let ts = days_from_civil(2000, 3, 1) * 86_400 + 12 * 3600 + 34 * 60 + 56;
        let b = broken_down(ts);
        assert_eq!((b.year, b.month, b.day), (2000, 3, 1));
        assert_eq!((b.hour, b.min, b.sec), (12, 34, 56));
        assert_eq!(b.wday, 4); // a Wednesday; Sunday is 1
        assert_eq!(b.yday, 61);
    }

    #[test]
    fn epoch_was_a_thursday() {
        let b = broken_down(0);
        assert_eq!(b.wday, 5);
        assert_eq!(b.yday, 1);
    }
}
