// Coroutine library
// Implements: create, resume, yield, status, running, wrap, isyieldable
// All entry points wire directly to the scheduler on LuaVm; `coroutine.yield`
// in call syntax is lowered to a native yield instruction by the compiler,
// so the function registered here only fires for indirect calls.

use std::cell::RefCell;
use std::rc::Rc;

use crate::lib_registry::LibraryModule;
use crate::lua_value::{CoroutineStatus, LuaThread, LuaValue, NativeFunction};
use crate::lua_vm::coercion::{arg, bad_argument};
use crate::lua_vm::{LuaError, LuaResult, LuaVm};

pub fn create_coroutine_lib() -> LibraryModule {
    crate::lib_module!("coroutine", {
        "create" => coroutine_create,
        "resume" => coroutine_resume,
        "yield" => coroutine_yield,
        "status" => coroutine_status,
        "running" => coroutine_running,
        "wrap" => coroutine_wrap,
        "isyieldable" => coroutine_isyieldable,
    })
}

fn coroutine_create(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let body = arg(&args, 1);
    if !matches!(body, LuaValue::Function(_) | LuaValue::Native(_)) {
        return Err(bad_argument(1, "create", "function", &body));
    }
    let thread = LuaThread::new(body);
    Ok(vec![LuaValue::Thread(Rc::new(RefCell::new(thread)))])
}

fn coroutine_resume(vm: &mut LuaVm, mut args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    if args.is_empty() {
        return Err(bad_argument(1, "resume", "coroutine", &LuaValue::Nil));
    }
    let thread_val = args.remove(0);
    let Some(thread) = thread_val.as_thread().cloned() else {
        return Err(bad_argument(1, "resume", "coroutine", &thread_val));
    };
    let (ok, mut vals) = vm.resume_thread(&thread, args)?;
    let mut out = vec![LuaValue::Boolean(ok)];
    out.append(&mut vals);
    Ok(out)
}

/// Direct `coroutine.yield(...)` calls never reach this function (the
/// compiler lowers them); a first-class reference cannot suspend across the
/// native boundary.
fn coroutine_yield(vm: &mut LuaVm, _args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    if Rc::ptr_eq(&vm.current_thread, &vm.main_thread) {
        return Err(LuaError::runtime(
            "attempt to yield from outside a coroutine",
        ));
    }
    Err(LuaError::runtime(
        "attempt to yield across a native call boundary",
    ))
}

fn coroutine_status(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let thread_val = arg(&args, 1);
    let Some(thread) = thread_val.as_thread() else {
        return Err(bad_argument(1, "status", "coroutine", &thread_val));
    };
    // a running status only shows as "running" from within the coroutine
    let status = if Rc::ptr_eq(thread, &vm.current_thread) {
        CoroutineStatus::Running
    } else {
        thread.borrow().status
    };
    Ok(vec![LuaValue::string(status.as_str())])
}

fn coroutine_running(vm: &mut LuaVm, _args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let current = vm.current_thread.clone();
    let is_main = Rc::ptr_eq(&current, &vm.main_thread);
    Ok(vec![LuaValue::Thread(current), LuaValue::Boolean(is_main)])
}

fn coroutine_isyieldable(vm: &mut LuaVm, _args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let yieldable = !Rc::ptr_eq(&vm.current_thread, &vm.main_thread);
    Ok(vec![LuaValue::Boolean(yieldable)])
}

fn coroutine_wrap(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let body = arg(&args, 1);
    if !matches!(body, LuaValue::Function(_) | LuaValue::Native(_)) {
        return Err(bad_argument(1, "wrap", "function", &body));
    }
    let thread = Rc::new(RefCell::new(LuaThread::new(body)));

    // the wrapper resumes, unwraps the ok flag and rethrows errors
    let wrapper = NativeFunction::new("wrapped_coroutine", move |vm, call_args| {
        let (ok, vals) = vm.resume_thread(&thread, call_args)?;
        if !ok {
            let message = vals
                .first()
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| "coroutine error".to_string());
            return Err(LuaError::Runtime(message));
        }
        Ok(vals)
    });
    Ok(vec![LuaValue::Native(wrapper)])
}
