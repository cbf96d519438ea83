// Tests for the math library
use super::*;

#[test]
fn test_basics() {
    run(r##"
        assert(math.abs(-5) == 5)
        assert(math.abs(5) == 5)
        assert(math.floor(3.7) == 3)
        assert(math.floor(-3.2) == -4)
        assert(math.ceil(3.2) == 4)
        assert(math.ceil(-3.7) == -3)
        assert(math.sqrt(16) == 4)
        assert(math.exp(0) == 1)
        assert(math.log(1) == 0)
        assert(math.abs(math.log(8, 2) - 3) < 1e-12)
        assert(math.max(3, 1, 4, 1, 5) == 5)
        assert(math.min(3, 1, 4, 1, 5) == 1)
        assert(math.fmod(7, 3) == 1)
        assert(math.fmod(-7, 3) == -1)
    "##);
}

#[test]
fn test_modf() {
    run(r##"
        local int, frac = math.modf(3.25)
        assert(int == 3 and frac == 0.25)
        local int2, frac2 = math.modf(-3.25)
        assert(int2 == -3 and frac2 == -0.25)
    "##);
}

#[test]
fn test_trig() {
    run(r##"
        assert(math.sin(0) == 0)
        assert(math.cos(0) == 1)
        assert(math.abs(math.sin(math.pi)) < 1e-10)
        assert(math.abs(math.tan(0)) < 1e-10)
        assert(math.abs(math.asin(1) - math.pi / 2) < 1e-10)
        assert(math.abs(math.atan(1) - math.pi / 4) < 1e-10)
    "##);
}

#[test]
fn test_constants() {
    run(r##"
        assert(math.huge > 1e300)
        assert(-math.huge < -1e300)
        assert(math.pi > 3.14 and math.pi < 3.15)
        assert(math.maxinteger == -math.mininteger)
    "##);
}

#[test]
fn test_type_and_tointeger() {
    run(r##"
        assert(math.type(1) == "integer")
        assert(math.type(1.5) == "float")
        assert(math.type("1") == nil)
        assert(math.tointeger(3.0) == 3)
        assert(math.tointeger(3.5) == nil)
        assert(math.tointeger("x") == nil)
    "##);
}

#[test]
fn test_random_bounds() {
    run(r##"
        for _ = 1, 100 do
            local r = math.random()
            assert(r >= 0 and r < 1)
        end
        for _ = 1, 100 do
            local r = math.random(6)
            assert(r >= 1 and r <= 6)
            assert(r == math.floor(r))
        end
        for _ = 1, 100 do
            local r = math.random(10, 20)
            assert(r >= 10 and r <= 20)
        end
    "##);
    let msg = run_err("return math.random(5, 1)");
    assert!(msg.contains("interval is empty"));
}

#[test]
fn test_randomseed_reproducible() {
    run(r##"
        math.randomseed(42)
        local a1, a2, a3 = math.random(), math.random(), math.random()
        math.randomseed(42)
        local b1, b2, b3 = math.random(), math.random(), math.random()
        assert(a1 == b1 and a2 == b2 and a3 == b3)

        math.randomseed(7)
        local c1 = math.random()
        assert(c1 ~= a1)
    "##);
}

#[test]
fn test_lcg_sequence_is_park_miller() {
    // seed 1: the minimal-standard generator's first state is 16807
    let mut vm = crate::LuaVm::new(crate::EnvConfig::default());
    vm.open_libs();
    vm.execute_string("math.randomseed(1)").unwrap();
    let r = vm
        .execute_string("return math.random()")
        .unwrap()
        .remove(0);
    let expected = (16807.0 - 1.0) / 2147483646.0;
    match r {
        crate::LuaValue::Number(n) => assert!((n - expected).abs() < 1e-12),
        other => panic!("expected number, got {:?}", other),
    }
}

#[test]
fn test_argument_errors() {
    let msg = run_err("return math.abs({})");
    assert!(msg.contains("bad argument #1 to 'abs'"));
    let msg = run_err("return math.floor()");
    assert!(msg.contains("bad argument #1 to 'floor'"));
}
