// Tests for the os library
use super::*;
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_time_now_is_integer_seconds() {
    run(r##"
        local t = os.time()
        assert(type(t) == "number")
        assert(t == math.floor(t))
        assert(t > 1000000000)
    "##);
}

#[test]
fn test_time_from_table_is_calendar_correct() {
    run(r##"
        assert(os.time({year = 1970, month = 1, day = 1, hour = 0}) == 0)
        assert(os.time({year = 1970, month = 1, day = 2, hour = 0}) == 86400)
        -- leap day
        local feb29 = os.time({year = 2000, month = 2, day = 29, hour = 0})
        local mar01 = os.time({year = 2000, month = 3, day = 1, hour = 0})
        assert(mar01 - feb29 == 86400)
        -- hour defaults to noon
        assert(os.time({year = 1970, month = 1, day = 1}) == 12 * 3600)
    "##);
}

#[test]
fn test_date_table() {
    run(r##"
        local t = os.date("*t", 951827696)  -- 2000-02-29 12:34:56 UTC
        assert(t.year == 2000)
        assert(t.month == 2)
        assert(t.day == 29)
        assert(t.hour == 12)
        assert(t.min == 34)
        assert(t.sec == 56)
        assert(t.wday == 3)    -- a Tuesday; Sunday is 1
        assert(t.yday == 60)
        assert(t.isdst == false)
    "##);
}

#[test]
fn test_date_formats() {
    run(r##"
        local ts = 0  -- 1970-01-01 00:00:00, a Thursday
        assert(os.date("%Y-%m-%d", ts) == "1970-01-01")
        assert(os.date("%H:%M:%S", ts) == "00:00:00")
        assert(os.date("%a", ts) == "Thu")
        assert(os.date("%A", ts) == "Thursday")
        assert(os.date("%b", ts) == "Jan")
        assert(os.date("%B", ts) == "January")
        assert(os.date("%j", ts) == "001")
        assert(os.date("%y", ts) == "70")
        assert(os.date("%p", ts) == "AM")
        assert(os.date("100%%", ts) == "100%")
    "##);
}

#[test]
fn test_date_utc_prefix() {
    run(r##"
        local plain = os.date("%c", 86400)
        local utc = os.date("!%c", 86400)
        assert(type(plain) == "string" and type(utc) == "string")
        assert(utc == plain)  -- no timezone database: local time is UTC
        local t = os.date("!*t", 0)
        assert(t.year == 1970 and t.hour == 0)
    "##);
}

#[test]
fn test_difftime() {
    run(r##"
        assert(os.difftime(100, 40) == 60)
        assert(os.difftime(40, 100) == -60)
    "##);
}

#[test]
fn test_exit_forwards_codes() {
    let codes = Rc::new(RefCell::new(Vec::new()));
    let sink = codes.clone();
    let config = crate::EnvConfig {
        os_exit: Some(Rc::new(move |code| sink.borrow_mut().push(code))),
        ..crate::EnvConfig::default()
    };
    let mut env = crate::LuaEnv::new(config);
    let script = env
        .parse("os.exit(7) os.exit(true) os.exit(false) os.exit()")
        .unwrap();
    script.exec(&mut env).unwrap();
    assert_eq!(&*codes.borrow(), &[7, 0, 1, 0]);
}

#[test]
fn test_exit_without_handler_raises() {
    let msg = run_err("os.exit(0)");
    assert!(msg.contains("os.exit is not available"));
}
