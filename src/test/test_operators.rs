// Tests for the operator dispatcher
use super::*;

#[test]
fn test_arithmetic() {
    run(r##"
        assert(1 + 2 == 3)
        assert(7 - 10 == -3)
        assert(6 * 7 == 42)
        assert(7 / 2 == 3.5)
        assert(7 // 2 == 3)
        assert(-7 // 2 == -4)
        assert(2 ^ 10 == 1024)
        assert(-2 ^ 2 == -4)
    "##);
}

#[test]
fn test_mod_follows_divisor_sign() {
    run(r##"
        assert(5 % 3 == 2)
        assert(-5 % 3 == 1)
        assert(5 % -3 == -1)
        assert(-5 % -3 == -2)
        assert(5.5 % 2 == 1.5)
        -- division by zero and infinite divisors produce nan
        local n = 5 % 0
        assert(n ~= n)
        local m = 5 % (1/0)
        assert(m ~= m)
    "##);
}

#[test]
fn test_string_number_coercion() {
    run(r##"
        assert("10" + 1 == 11)
        assert("3" * "4" == 12)
        assert(10 .. "" == "10")
        assert("a" .. 1 == "a1")
        assert(1 .. 2 == "12")
    "##);
}

#[test]
fn test_arithmetic_errors() {
    let msg = run_err("return {} + 1");
    assert!(msg.contains("attempt to perform arithmetic on a table value"));
    let msg = run_err("return \"x\" .. {}");
    assert!(msg.contains("attempt to concatenate a table value"));
    let msg = run_err("return #5");
    assert!(msg.contains("attempt to get length of an unsupported value"));
}

#[test]
fn test_comparisons() {
    run(r##"
        assert(1 < 2)
        assert(2 <= 2)
        assert(3 > 2)
        assert(3 >= 3)
        assert("a" < "b")
        assert("abc" < "abd")
        assert("Z" < "a")
        assert(not (1 < 1))
        assert(1 == 1.0)
        assert("1" ~= 1)
        assert(nil == nil)
    "##);
    let msg = run_err("return 1 < \"2\"");
    assert!(msg.contains("attempt to compare"));
}

#[test]
fn test_bitwise() {
    run(r##"
        assert(0xF0 & 0x0F == 0)
        assert(0xF0 | 0x0F == 0xFF)
        assert(0xFF ~ 0x0F == 0xF0)
        assert(1 << 4 == 16)
        assert(256 >> 4 == 16)
        assert(1 << 64 == 0)
        assert(~0 == -1)
    "##);
    let msg = run_err("return 1.5 & 1");
    assert!(msg.contains("no integer representation"));
}

#[test]
fn test_length() {
    run(r##"
        assert(#"hello" == 5)
        assert(#"" == 0)
        assert(#{1, 2, 3} == 3)
        assert(#{} == 0)
    "##);
}

#[test]
fn test_short_circuit() {
    run(r##"
        local calls = 0
        local function bump() calls = calls + 1; return true end

        assert((false and bump()) == false)
        assert(calls == 0)
        assert((true or bump()) == true)
        assert(calls == 0)
        assert((nil or "default") == "default")
        assert((false or nil) == nil)
        assert((1 and 2) == 2)
        assert((nil and 2) == nil)
    "##);
}

#[test]
fn test_not_and_truthiness() {
    run(r##"
        assert(not nil)
        assert(not false)
        assert(not not 0)
        assert(not not "")
        assert(not not {})
    "##);
}

#[test]
fn test_unary_minus() {
    run(r##"
        assert(-(5) == -5)
        assert(-"3" == -3)
        local x = 0
        assert(-x == 0)
    "##);
}

#[test]
fn test_nan_comparisons() {
    run(r##"
        local nan = 0/0
        assert(nan ~= nan)
        assert(not (nan == nan))
        assert(not (nan < 1))
        assert(not (nan <= 1))
    "##);
}

#[test]
fn test_concat_chains() {
    run(r##"
        assert("a" .. "b" .. "c" == "abc")
        assert(1 .. 2 .. 3 == "123")
    "##);
}
