// Tests for metatable dispatch
use super::*;

#[test]
fn test_add_metamethod() {
    // spec scenario: x + 1 routed through __add
    let values = run_values(
        r##"
        local m = {__add = function(a, b) return 42 end}
        local x = setmetatable({}, m)
        return x + 1
    "##,
    );
    assert_eq!(values[0], crate::LuaValue::Number(42.0));
}

#[test]
fn test_index_table_chain() {
    run(r##"
        local base = {greet = "hi"}
        local mid = setmetatable({}, {__index = base})
        local leaf = setmetatable({}, {__index = mid})
        assert(leaf.greet == "hi")
        assert(rawget(leaf, "greet") == nil)
    "##);
}

#[test]
fn test_index_function() {
    run(r##"
        local t = setmetatable({}, {__index = function(self, k)
            return "computed:" .. k
        end})
        assert(t.abc == "computed:abc")
        t.real = 1
        assert(t.real == 1)
    "##);
}

#[test]
fn test_newindex_redirect() {
    run(r##"
        local store = {}
        local t = setmetatable({}, {__newindex = function(self, k, v)
            rawset(store, k, v)
        end})
        t.a = 10
        assert(store.a == 10)
        assert(rawget(t, "a") == nil)

        -- existing raw slots bypass __newindex
        rawset(t, "b", 1)
        t.b = 2
        assert(rawget(t, "b") == 2)
    "##);
}

#[test]
fn test_newindex_table_redirect() {
    run(r##"
        local backing = {}
        local t = setmetatable({}, {__newindex = backing})
        t.x = 7
        assert(backing.x == 7)
        assert(rawget(t, "x") == nil)
    "##);
}

#[test]
fn test_eq_requires_identical_metatables() {
    run(r##"
        local m = {__eq = function(a, b) return true end}
        local a = setmetatable({}, m)
        local b = setmetatable({}, m)
        assert(a == b)

        local other = setmetatable({}, {__eq = function() return true end})
        assert(not (a == other))

        -- reference equality short-circuits
        assert(a == a)
    "##);
}

#[test]
fn test_comparison_metamethods() {
    run(r##"
        local m = {
            __lt = function(a, b) return a.v < b.v end,
            __le = function(a, b) return a.v <= b.v end,
        }
        local small = setmetatable({v = 1}, m)
        local big = setmetatable({v = 2}, m)
        assert(small < big)
        assert(small <= big)
        assert(big > small)
        assert(big >= small)
        assert(not (big < small))
    "##);
}

#[test]
fn test_len_metamethod() {
    run(r##"
        local t = setmetatable({1, 2, 3}, {__len = function() return 99 end})
        assert(#t == 99)
    "##);
}

#[test]
fn test_call_metamethod() {
    run(r##"
        local t = setmetatable({}, {__call = function(self, a, b)
            return a + b
        end})
        assert(t(3, 4) == 7)
    "##);
    let msg = run_err("local t = {} t()");
    assert!(msg.contains("attempt to call an uncallable type"));
}

#[test]
fn test_concat_metamethod() {
    run(r##"
        local t = setmetatable({}, {__concat = function(a, b) return "joined" end})
        assert(t .. "x" == "joined")
        assert("x" .. t == "joined")
    "##);
}

#[test]
fn test_unm_metamethod() {
    run(r##"
        local t = setmetatable({v = 5}, {__unm = function(self) return -self.v end})
        assert(-t == -5)
    "##);
}

#[test]
fn test_tostring_metamethod() {
    run(r##"
        local t = setmetatable({}, {__tostring = function() return "pretty" end})
        assert(tostring(t) == "pretty")
    "##);
}

#[test]
fn test_protected_metatable() {
    run(r##"
        local t = setmetatable({}, {__metatable = "locked"})
        assert(getmetatable(t) == "locked")
        local ok, err = pcall(setmetatable, t, {})
        assert(ok == false)
        assert(err == "cannot change a protected metatable")
    "##);
}

#[test]
fn test_string_metatable_methods() {
    run(r##"
        assert(("foo"):sub(1, 1) == "f")
        assert(("hello"):upper() == "HELLO")
        assert(("a,b,c"):len() == 5)
        assert(getmetatable("").__index == string)
    "##);
}
