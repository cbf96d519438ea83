// Tests for the base library
use super::*;

#[test]
fn test_print() {
    let (mut env, out) = env_with_captured_stdout();
    let script = env.parse("print(\"Hello, World!\")\nprint(1, 2, 3)\nprint()").unwrap();
    script.exec(&mut env).unwrap();
    assert_eq!(&*out.borrow(), "Hello, World!\n1\t2\t3\n\n");
}

#[test]
fn test_type() {
    run(r##"
        assert(type(nil) == "nil")
        assert(type(true) == "boolean")
        assert(type(42) == "number")
        assert(type(3.14) == "number")
        assert(type("hello") == "string")
        assert(type({}) == "table")
        assert(type(print) == "function")
        assert(type(coroutine.create(function() end)) == "thread")
    "##);
}

#[test]
fn test_tostring() {
    run(r##"
        assert(tostring(123) == "123")
        assert(tostring(3.5) == "3.5")
        assert(tostring(true) == "true")
        assert(tostring(nil) == "nil")
        assert(tostring(1/0) == "inf")
        assert(tostring(-1/0) == "-inf")
        local s = tostring({})
        assert(type(s) == "string")
    "##);
}

#[test]
fn test_tonumber() {
    run(r##"
        assert(tonumber("123") == 123)
        assert(tonumber("3.14") == 3.14)
        assert(tonumber("  42  ") == 42)
        assert(tonumber("0x10") == 16)
        assert(tonumber("FF", 16) == 255)
        assert(tonumber("777", 8) == 511)
        assert(tonumber("invalid") == nil)
        assert(tonumber(42) == 42)
    "##);
}

#[test]
fn test_tostring_tonumber_round_trip() {
    run(r##"
        for _, v in ipairs({0, 1, -1, 3.5, 1e10, -0.25, 123456789}) do
            assert(tostring(tonumber(tostring(v))) == tostring(v))
        end
    "##);
}

#[test]
fn test_assert_and_error() {
    run(r##"
        local a, b, c = assert(true, "extra", 123)
        assert(a == true and b == "extra" and c == 123)
    "##);
    let msg = run_err("error(\"boom\")");
    assert_eq!(msg, "boom");
    let msg = run_err("assert(false, \"custom\")");
    assert_eq!(msg, "custom");
    let msg = run_err("assert(nil)");
    assert_eq!(msg, "assertion failed!");
}

#[test]
fn test_pcall() {
    run(r##"
        local ok, err = pcall(function() error("inner") end)
        assert(ok == false)
        assert(err == "inner")

        local ok, v1, v2 = pcall(function() return 1, 2 end)
        assert(ok == true and v1 == 1 and v2 == 2)

        -- domain errors from the runtime are caught too
        local ok, err = pcall(function() return {} + 1 end)
        assert(ok == false)
        assert(string.find(err, "arithmetic", 1, true) ~= nil)
    "##);
}

#[test]
fn test_xpcall() {
    run(r##"
        local ok, handled = xpcall(
            function() error("oops") end,
            function(msg) return "handled: " .. msg end)
        assert(ok == false)
        assert(handled == "handled: oops")
    "##);
}

#[test]
fn test_select() {
    run(r##"
        assert(select("#") == 0)
        assert(select("#", 1, 2, 3) == 3)
        local b, c = select(2, "a", "b", "c")
        assert(b == "b" and c == "c")
        local last = select(-1, "x", "y", "z")
        assert(last == "z")
    "##);
}

#[test]
fn test_raw_access() {
    run(r##"
        local t = setmetatable({}, {
            __index = function() return "shadow" end,
            __newindex = function() error("unreachable") end,
        })
        assert(t.missing == "shadow")
        assert(rawget(t, "missing") == nil)
        rawset(t, "real", 1)
        assert(rawget(t, "real") == 1)
        assert(rawlen({1, 2, 3}) == 3)
        assert(rawlen("abcd") == 4)
        assert(rawequal(t, t))
        assert(not rawequal({}, {}))
        assert(rawequal("a", "a"))
        assert(not rawequal(0/0, 0/0))
    "##);
}

#[test]
fn test_next_and_pairs_order() {
    run(r##"
        local t = {10, 20, 30}
        t.alpha = 1
        t.beta = 2
        local keys = {}
        for k in pairs(t) do keys[#keys + 1] = k end
        assert(keys[1] == 1 and keys[2] == 2 and keys[3] == 3)
        assert(keys[4] == "alpha" and keys[5] == "beta")

        local k, v = next({})
        assert(k == nil and v == nil)
    "##);
}

#[test]
fn test_ipairs_stops_at_hole() {
    run(r##"
        local t = {1, 2, nil, 4}
        local count = 0
        for i, v in ipairs(t) do count = i end
        assert(count == 2)
    "##);
}

#[test]
fn test_load() {
    run(r##"
        local f = load("return 6 * 7")
        assert(f() == 42)
        local bad, err = load("return +")
        assert(bad == nil)
        assert(type(err) == "string")
    "##);
}

#[test]
fn test_collectgarbage_noop() {
    run("assert(collectgarbage() == 0)");
}

#[test]
fn test_globals_table() {
    run(r##"
        assert(_G ~= nil)
        assert(_VERSION == "Lua 5.3")
        x = 5
        assert(_G.x == 5)
        _G.y = 6
        assert(y == 6)
    "##);
}
