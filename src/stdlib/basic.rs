// Base library
// Implements: print, type, tostring, tonumber, pairs, ipairs, next, select,
// rawget, rawset, rawequal, rawlen, setmetatable, getmetatable, pcall,
// xpcall, error, assert, collectgarbage, load, require

use crate::lib_registry::LibraryModule;
use crate::lua_value::LuaValue;
use crate::lua_vm::coercion::{
    arg, bad_argument, check_integer, check_string, check_table, display, parse_number_with_base,
    to_number,
};
use crate::lua_vm::{LuaError, LuaResult, LuaVm};

pub fn create_basic_lib() -> LibraryModule {
    crate::lib_module!("_G", {
        "print" => lua_print,
        "type" => lua_type,
        "tostring" => lua_tostring,
        "tonumber" => lua_tonumber,
        "pairs" => lua_pairs,
        "ipairs" => lua_ipairs,
        "next" => lua_next,
        "select" => lua_select,
        "rawget" => lua_rawget,
        "rawset" => lua_rawset,
        "rawequal" => lua_rawequal,
        "rawlen" => lua_rawlen,
        "setmetatable" => lua_setmetatable,
        "getmetatable" => lua_getmetatable,
        "pcall" => lua_pcall,
        "xpcall" => lua_xpcall,
        "error" => lua_error,
        "assert" => lua_assert,
        "collectgarbage" => lua_collectgarbage,
        "load" => lua_load,
        "require" => crate::stdlib::package::lua_require,
    })
}

/// tostring with the `__tostring` metamethod honored.
pub fn tostring_value(vm: &mut LuaVm, value: &LuaValue) -> LuaResult<String> {
    if let LuaValue::Table(t) = value {
        let mm = t.borrow().metamethod("__tostring");
        if let Some(mm) = mm {
            let results = vm.call_value(mm, vec![value.clone()])?;
            let first = results.into_iter().next().unwrap_or(LuaValue::Nil);
            return Ok(display(&first));
        }
    }
    Ok(display(value))
}

fn lua_print(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let mut parts = Vec::with_capacity(args.len());
    for v in &args {
        parts.push(tostring_value(vm, v)?);
    }
    let line = format!("{}\n", parts.join("\t"));
    vm.write_stdout(&line);
    Ok(Vec::new())
}

fn lua_type(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    Ok(vec![LuaValue::string(arg(&args, 1).type_name())])
}

fn lua_tostring(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = tostring_value(vm, &arg(&args, 1))?;
    Ok(vec![LuaValue::string(s)])
}

fn lua_tonumber(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let value = arg(&args, 1);
    let result = match args.get(1) {
        None | Some(LuaValue::Nil) => to_number(&value),
        Some(base) => {
            let base = to_number(base).unwrap_or(10.0) as u32;
            if !(2..=36).contains(&base) {
                return Err(LuaError::runtime(
                    "bad argument #2 to 'tonumber' (base out of range)",
                ));
            }
            match &value {
                LuaValue::Str(s) => parse_number_with_base(s, base),
                _ => return Err(bad_argument(1, "tonumber", "string", &value)),
            }
        }
    };
    Ok(vec![result.map(LuaValue::Number).unwrap_or(LuaValue::Nil)])
}

fn lua_next(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(&args, 1, "next")?;
    let key = arg(&args, 2);
    let result = t.borrow().next(&key);
    match result {
        Some((k, v)) => Ok(vec![k, v]),
        None => Ok(vec![LuaValue::Nil]),
    }
}

fn lua_pairs(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(&args, 1, "pairs")?;
    Ok(vec![
        LuaValue::native("next", lua_next),
        LuaValue::Table(t),
        LuaValue::Nil,
    ])
}

fn ipairs_iter(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let t = arg(&args, 1);
    let i = check_integer(&args, 2, "ipairs")? + 1;
    let v = crate::lua_vm::operators::index_get(vm, t, LuaValue::Number(i as f64))?;
    if v.is_nil() {
        Ok(vec![LuaValue::Nil])
    } else {
        Ok(vec![LuaValue::Number(i as f64), v])
    }
}

fn lua_ipairs(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let t = arg(&args, 1);
    if !t.is_table() {
        return Err(bad_argument(1, "ipairs", "table", &t));
    }
    Ok(vec![
        LuaValue::native("ipairs_iter", ipairs_iter),
        t,
        LuaValue::Number(0.0),
    ])
}

fn lua_select(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let selector = arg(&args, 1);
    let rest = &args[1.min(args.len())..];
    if selector.as_str() == Some("#") {
        return Ok(vec![LuaValue::Number(rest.len() as f64)]);
    }
    let n = crate::lua_vm::coercion::to_integer(&selector)
        .ok_or_else(|| bad_argument(1, "select", "number", &selector))?;
    if n == 0 {
        return Err(LuaError::runtime(
            "bad argument #1 to 'select' (index out of range)",
        ));
    }
    let start = if n < 0 {
        let back = (-n) as usize;
        if back > rest.len() {
            return Err(LuaError::runtime(
                "bad argument #1 to 'select' (index out of range)",
            ));
        }
        rest.len() - back
    } else {
        ((n as usize) - 1).min(rest.len())
    };
    Ok(rest[start..].to_vec())
}

fn lua_rawget(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(&args, 1, "rawget")?;
    let v = t.borrow().raw_get(&arg(&args, 2));
    Ok(vec![v])
}

fn lua_rawset(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(&args, 1, "rawset")?;
    t.borrow_mut().raw_set(&arg(&args, 2), arg(&args, 3))?;
    Ok(vec![LuaValue::Table(t)])
}

fn lua_rawequal(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    Ok(vec![LuaValue::Boolean(
        arg(&args, 1).raw_equals(&arg(&args, 2)),
    )])
}

fn lua_rawlen(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match arg(&args, 1) {
        LuaValue::Str(s) => Ok(vec![LuaValue::Number(s.as_bytes().len() as f64)]),
        LuaValue::Table(t) => Ok(vec![LuaValue::Number(t.borrow().border() as f64)]),
        other => Err(bad_argument(1, "rawlen", "table or string", &other)),
    }
}

fn lua_setmetatable(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(&args, 1, "setmetatable")?;
    let mt = arg(&args, 2);
    let protected = t
        .borrow()
        .metamethod("__metatable")
        .is_some();
    if protected {
        return Err(LuaError::runtime("cannot change a protected metatable"));
    }
    match mt {
        LuaValue::Nil => t.borrow_mut().metatable = None,
        LuaValue::Table(m) => t.borrow_mut().metatable = Some(m),
        other => return Err(bad_argument(2, "setmetatable", "nil or table", &other)),
    }
    Ok(vec![LuaValue::Table(t)])
}

fn lua_getmetatable(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match arg(&args, 1) {
        LuaValue::Table(t) => {
            let guarded = t.borrow().metamethod("__metatable");
            if let Some(v) = guarded {
                return Ok(vec![v]);
            }
            let mt = t.borrow().metatable.clone();
            Ok(vec![mt.map(LuaValue::Table).unwrap_or(LuaValue::Nil)])
        }
        LuaValue::Str(_) => Ok(vec![LuaValue::Table(vm.string_meta.clone())]),
        _ => Ok(vec![LuaValue::Nil]),
    }
}

fn lua_pcall(vm: &mut LuaVm, mut args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    if args.is_empty() {
        return Err(bad_argument(1, "pcall", "value", &LuaValue::Nil));
    }
    let f = args.remove(0);
    match vm.call_value(f, args) {
        Ok(mut results) => {
            let mut out = vec![LuaValue::Boolean(true)];
            out.append(&mut results);
            Ok(out)
        }
        Err(e) => Ok(vec![
            LuaValue::Boolean(false),
            LuaValue::string(e.message()),
        ]),
    }
}

fn lua_xpcall(vm: &mut LuaVm, mut args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    if args.len() < 2 {
        return Err(bad_argument(2, "xpcall", "value", &LuaValue::Nil));
    }
    let f = args.remove(0);
    let handler = args.remove(0);
    match vm.call_value(f, args) {
        Ok(mut results) => {
            let mut out = vec![LuaValue::Boolean(true)];
            out.append(&mut results);
            Ok(out)
        }
        Err(e) => {
            let handled = vm.call_value(handler, vec![LuaValue::string(e.message())])?;
            let first = handled.into_iter().next().unwrap_or(LuaValue::Nil);
            Ok(vec![LuaValue::Boolean(false), first])
        }
    }
}

fn lua_error(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let message = tostring_value(vm, &arg(&args, 1))?;
    Err(LuaError::Runtime(message))
}

fn lua_assert(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    if arg(&args, 1).is_truthy() {
        return Ok(args);
    }
    let message = match args.get(1) {
        Some(LuaValue::Str(s)) => s.to_string(),
        Some(other) if !other.is_nil() => display(other),
        _ => "assertion failed!".to_string(),
    };
    Err(LuaError::Runtime(message))
}

fn lua_collectgarbage(_vm: &mut LuaVm, _args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    // collection is delegated to the host
    Ok(vec![LuaValue::Number(0.0)])
}

fn lua_load(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let source = check_string(&args, 1, "load")?;
    let name = args
        .get(1)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "=(load)".to_string());
    match vm.compile(&source, &name) {
        Ok(proto) => {
            let closure = crate::lua_value::LuaClosure {
                proto,
                scope: vm.root_scope.clone(),
            };
            Ok(vec![LuaValue::Function(std::rc::Rc::new(closure))])
        }
        Err(e) => Ok(vec![LuaValue::Nil, LuaValue::string(e.message())]),
    }
}
