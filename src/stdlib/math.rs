// Math library
// Implements: abs, ceil, floor, sqrt, sin, cos, tan, asin, acos, atan, exp,
// log, fmod, modf, max, min, random, randomseed, tointeger, type,
// pi, huge, maxinteger, mininteger
//
// random uses the classic Park-Miller generator so that randomseed gives
// reproducible sequences.

use crate::lib_registry::LibraryModule;
use crate::lua_value::LuaValue;
use crate::lua_vm::coercion::{arg, check_number, to_number};
use crate::lua_vm::{LuaError, LuaResult, LuaVm};

const LCG_MULTIPLIER: i64 = 16807;
const LCG_MODULUS: i64 = 2_147_483_647; // 2^31 - 1

pub fn create_math_lib() -> LibraryModule {
    let mut module = crate::lib_module!("math", {
        "abs" => math_abs,
        "ceil" => math_ceil,
        "floor" => math_floor,
        "sqrt" => math_sqrt,
        "sin" => math_sin,
        "cos" => math_cos,
        "tan" => math_tan,
        "asin" => math_asin,
        "acos" => math_acos,
        "atan" => math_atan,
        "exp" => math_exp,
        "log" => math_log,
        "fmod" => math_fmod,
        "modf" => math_modf,
        "max" => math_max,
        "min" => math_min,
        "random" => math_random,
        "randomseed" => math_randomseed,
        "tointeger" => math_tointeger,
        "type" => math_type,
    });

    module = module.with_value("pi", |_vm| LuaValue::Number(std::f64::consts::PI));
    module = module.with_value("huge", |_vm| LuaValue::Number(f64::INFINITY));
    // the engine keeps one numeric type; these are the largest and smallest
    // integers a double represents without precision loss (2^53 - 1)
    module = module.with_value("maxinteger", |_vm| LuaValue::Number(9007199254740991.0));
    module = module.with_value("mininteger", |_vm| LuaValue::Number(-9007199254740991.0));

    module
}

fn math_abs(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(&args, 1, "abs")?;
    Ok(vec![LuaValue::Number(x.abs())])
}

fn math_ceil(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(&args, 1, "ceil")?;
    Ok(vec![LuaValue::Number(x.ceil())])
}

fn math_floor(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(&args, 1, "floor")?;
    Ok(vec![LuaValue::Number(x.floor())])
}

fn math_sqrt(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(&args, 1, "sqrt")?;
    Ok(vec![LuaValue::Number(x.sqrt())])
}

fn math_sin(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(&args, 1, "sin")?;
    Ok(vec![LuaValue::Number(x.sin())])
}

fn math_cos(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(&args, 1, "cos")?;
    Ok(vec![LuaValue::Number(x.cos())])
}

fn math_tan(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(&args, 1, "tan")?;
    Ok(vec![LuaValue::Number(x.tan())])
}

fn math_asin(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(&args, 1, "asin")?;
    Ok(vec![LuaValue::Number(x.asin())])
}

fn math_acos(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(&args, 1, "acos")?;
    Ok(vec![LuaValue::Number(x.acos())])
}

fn math_atan(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let y = check_number(&args, 1, "atan")?;
    let x = args.get(1).and_then(to_number).unwrap_or(1.0);
    Ok(vec![LuaValue::Number(y.atan2(x))])
}

fn math_exp(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(&args, 1, "exp")?;
    Ok(vec![LuaValue::Number(x.exp())])
}

fn math_log(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(&args, 1, "log")?;
    let result = match args.get(1).and_then(to_number) {
        Some(base) => x.log(base),
        None => x.ln(),
    };
    Ok(vec![LuaValue::Number(result)])
}

fn math_fmod(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let a = check_number(&args, 1, "fmod")?;
    let b = check_number(&args, 2, "fmod")?;
    Ok(vec![LuaValue::Number(a % b)])
}

fn math_modf(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(&args, 1, "modf")?;
    let int = x.trunc();
    Ok(vec![LuaValue::Number(int), LuaValue::Number(x - int)])
}

fn math_max(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let mut best = check_number(&args, 1, "max")?;
    for i in 2..=args.len() {
        let x = check_number(&args, i, "max")?;
        if x > best {
            best = x;
        }
    }
    Ok(vec![LuaValue::Number(best)])
}

fn math_min(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let mut best = check_number(&args, 1, "min")?;
    for i in 2..=args.len() {
        let x = check_number(&args, i, "min")?;
        if x < best {
            best = x;
        }
    }
    Ok(vec![LuaValue::Number(best)])
}

/// Advance the generator and return a float in [0, 1).
fn next_random(vm: &mut LuaVm) -> f64 {
    vm.random_seed = (LCG_MULTIPLIER.wrapping_mul(vm.random_seed)) % LCG_MODULUS;
    if vm.random_seed <= 0 {
        vm.random_seed += LCG_MODULUS - 1;
    }
    (vm.random_seed - 1) as f64 / (LCG_MODULUS - 1) as f64
}

fn math_random(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let r = next_random(vm);
    match args.len() {
        0 => Ok(vec![LuaValue::Number(r)]),
        1 => {
            let m = check_number(&args, 1, "random")?.floor();
            if m < 1.0 {
                return Err(LuaError::runtime(
                    "bad argument #1 to 'random' (interval is empty)",
                ));
            }
            Ok(vec![LuaValue::Number(1.0 + (r * m).floor())])
        }
        _ => {
            let m = check_number(&args, 1, "random")?.floor();
            let n = check_number(&args, 2, "random")?.floor();
            if m > n {
                return Err(LuaError::runtime(
                    "bad argument #2 to 'random' (interval is empty)",
                ));
            }
            Ok(vec![LuaValue::Number(m + (r * (n - m + 1.0)).floor())])
        }
    }
}

fn math_randomseed(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let seed = check_number(&args, 1, "randomseed")?;
    let seed = (seed.abs() as i64) % (LCG_MODULUS - 1) + 1;
    vm.random_seed = seed;
    Ok(Vec::new())
}

fn math_tointeger(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match arg(&args, 1) {
        LuaValue::Number(n) if n.fract() == 0.0 && n.is_finite() => {
            Ok(vec![LuaValue::Number(n)])
        }
        _ => Ok(vec![LuaValue::Nil]),
    }
}

fn math_type(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match arg(&args, 1) {
        LuaValue::Number(n) => {
            let kind = if n.fract() == 0.0 && n.is_finite() {
                "integer"
            } else {
                "float"
            };
            Ok(vec![LuaValue::string(kind)])
        }
        _ => Ok(vec![LuaValue::Nil]),
    }
}
