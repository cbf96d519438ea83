// Table library
// Implements: insert, remove, concat, sort, unpack, pack
// Operates directly on the hybrid table's array part with 1-based indices.

use itertools::Itertools;

use crate::lib_registry::LibraryModule;
use crate::lua_value::{LuaTable, LuaValue};
use crate::lua_vm::coercion::{arg, check_table, display, opt_integer, to_integer};
use crate::lua_vm::{operators, LuaError, LuaResult, LuaVm};

pub fn create_table_lib() -> LibraryModule {
    crate::lib_module!("table", {
        "insert" => table_insert,
        "remove" => table_remove,
        "concat" => table_concat,
        "sort" => table_sort,
        "unpack" => table_unpack,
        "pack" => table_pack,
    })
}

fn table_insert(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(&args, 1, "insert")?;
    let len = t.borrow().border();
    match args.len() {
        2 => {
            t.borrow_mut().set_int(len + 1, arg(&args, 2));
        }
        3 => {
            let pos = to_integer(&arg(&args, 2)).ok_or_else(|| {
                LuaError::runtime("bad argument #2 to 'insert' (number expected)")
            })?;
            if pos < 1 || pos as usize > len + 1 {
                return Err(LuaError::runtime(
                    "bad argument #2 to 'insert' (position out of bounds)",
                ));
            }
            let pos = pos as usize;
            let value = arg(&args, 3);
            let mut table = t.borrow_mut();
            if pos == table.array_len() + 1 {
                table.set_int(pos, value);
            } else {
                table.insert_at(pos, value);
            }
        }
        _ => {
            return Err(LuaError::runtime("wrong number of arguments to 'insert'"));
        }
    }
    Ok(Vec::new())
}

fn table_remove(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(&args, 1, "remove")?;
    let len = t.borrow().border();
    let pos = opt_integer(&args, 2, len as i64);
    if len == 0 && (pos == 0 || pos == 1) {
        // removing from an empty sequence is a no-op
        return Ok(vec![LuaValue::Nil]);
    }
    if pos < 1 || pos as usize > len + 1 {
        return Err(LuaError::runtime(
            "bad argument #2 to 'remove' (position out of bounds)",
        ));
    }
    let removed = t.borrow_mut().remove_at(pos as usize);
    Ok(vec![removed])
}

fn table_concat(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(&args, 1, "concat")?;
    let sep = match args.get(1) {
        Some(LuaValue::Str(s)) => s.to_string(),
        Some(LuaValue::Number(n)) => crate::lua_vm::coercion::number_to_string(*n),
        _ => String::new(),
    };
    let first = opt_integer(&args, 3, 1);
    let last = opt_integer(&args, 4, t.borrow().border() as i64);

    let mut parts = Vec::new();
    for i in first..=last {
        let v = t.borrow().get_int(i.max(0) as usize);
        match v {
            LuaValue::Str(_) | LuaValue::Number(_) => parts.push(display(&v)),
            _ => {
                return Err(LuaError::runtime(format!(
                    "invalid value (at index {}) in table for 'concat'",
                    i
                )))
            }
        }
    }
    Ok(vec![LuaValue::string(parts.iter().join(&sep))])
}

fn table_sort(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(&args, 1, "sort")?;
    let comparator = arg(&args, 2);
    let len = t.borrow().border();

    let mut values: Vec<LuaValue> = (1..=len).map(|i| t.borrow().get_int(i)).collect();
    merge_sort(vm, &mut values, &comparator)?;
    {
        let mut table = t.borrow_mut();
        for (i, v) in values.into_iter().enumerate() {
            table.set_int(i + 1, v);
        }
    }
    Ok(Vec::new())
}

fn less_than(vm: &mut LuaVm, cmp: &LuaValue, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
    if cmp.is_nil() {
        operators::lt(vm, a, b)
    } else {
        let results = vm.call_value(cmp.clone(), vec![a.clone(), b.clone()])?;
        Ok(results.first().map(|v| v.is_truthy()).unwrap_or(false))
    }
}

/// Stable merge sort; the comparator may error, so the host sort APIs do not
/// fit here.
fn merge_sort(vm: &mut LuaVm, values: &mut Vec<LuaValue>, cmp: &LuaValue) -> LuaResult<()> {
    let len = values.len();
    if len < 2 {
        return Ok(());
    }
    let mut right = values.split_off(len / 2);
    merge_sort(vm, values, cmp)?;
    merge_sort(vm, &mut right, cmp)?;

    let left = std::mem::take(values);
    let mut li = left.into_iter().peekable();
    let mut ri = right.into_iter().peekable();
    while li.peek().is_some() || ri.peek().is_some() {
        let take_right = match (li.peek(), ri.peek()) {
            (Some(l), Some(r)) => less_than(vm, cmp, r, l)?,
            (None, Some(_)) => true,
            _ => false,
        };
        if take_right {
            values.push(ri.next().unwrap_or(LuaValue::Nil));
        } else {
            values.push(li.next().unwrap_or(LuaValue::Nil));
        }
    }
    Ok(())
}

fn table_unpack(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let t = check_table(&args, 1, "unpack")?;
    let first = opt_integer(&args, 2, 1);
    let last = opt_integer(&args, 3, t.borrow().border() as i64);
    let mut out = Vec::new();
    for i in first..=last {
        if i >= 1 {
            out.push(t.borrow().get_int(i as usize));
        } else {
            out.push(LuaValue::Nil);
        }
    }
    Ok(out)
}

fn table_pack(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let mut t = LuaTable::with_capacity(args.len(), 1);
    let n = args.len();
    for (i, v) in args.into_iter().enumerate() {
        t.set_int(i + 1, v);
    }
    t.set_str("n", LuaValue::Number(n as f64));
    Ok(vec![LuaValue::table(t)])
}
