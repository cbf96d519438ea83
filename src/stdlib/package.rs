// Package library
// Implements: path, loaded, preload, searchers, and the global require.
// require walks package.searchers: the first searcher consults
// package.preload, the second resolves package.path templates through the
// environment's fileExists/loadFile collaborators.

use itertools::Itertools;
use tracing::debug;

use crate::lib_registry::LibraryModule;
use crate::lua_value::{LuaClosure, LuaTable, LuaValue};
use crate::lua_vm::coercion::check_string;
use crate::lua_vm::{LuaError, LuaResult, LuaVm};

pub fn create_package_lib() -> LibraryModule {
    let mut module = LibraryModule::new("package");
    module = module.with_value("loaded", |_vm| LuaValue::table(LuaTable::new()));
    module = module.with_value("preload", |_vm| LuaValue::table(LuaTable::new()));
    module = module.with_value("path", |vm| LuaValue::string(&vm.config.lua_path));
    module = module.with_value("searchers", create_searchers_table);
    module
}

fn create_searchers_table(_vm: &mut LuaVm) -> LuaValue {
    let mut searchers = LuaTable::with_capacity(2, 0);
    searchers.set_int(1, LuaValue::native("preload_searcher", searcher_preload));
    searchers.set_int(2, LuaValue::native("path_searcher", searcher_lua));
    LuaValue::table(searchers)
}

fn package_field(vm: &LuaVm, field: &str) -> LuaValue {
    let package = vm.get_global("package");
    match package.as_table() {
        Some(t) => t.borrow().get_str(field),
        None => LuaValue::Nil,
    }
}

/// Searcher 1: package.preload.
fn searcher_preload(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let name = check_string(&args, 1, "require")?;
    let preload = package_field(vm, "preload");
    let loader = match preload.as_table() {
        Some(t) => t.borrow().get_str(&name),
        None => LuaValue::Nil,
    };
    if loader.is_nil() {
        Ok(vec![LuaValue::string(format!(
            "\n\tno field package.preload['{}']",
            name
        ))])
    } else {
        Ok(vec![loader])
    }
}

/// Searcher 2: package.path templates resolved through the config
/// collaborators.
fn searcher_lua(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let name = check_string(&args, 1, "require")?;
    let path_value = package_field(vm, "path");
    let search_path = path_value.as_str().unwrap_or("./?.lua").to_string();
    let file_name = name.replace('.', "/");

    let mut missing = Vec::new();
    for template in search_path.split(';').filter(|t| !t.is_empty()) {
        let candidate = template.replace('?', &file_name);
        if !vm.config.file_exists(&candidate) {
            missing.push(format!("\n\tno file '{}'", candidate));
            continue;
        }
        let Some(source) = vm.config.load_file(&candidate) else {
            missing.push(format!("\n\tno file '{}'", candidate));
            continue;
        };
        let proto = vm.compile(&source, &candidate)?;
        let closure = LuaClosure {
            proto,
            scope: vm.root_scope.clone(),
        };
        debug!(module = %name, file = %candidate, "module resolved");
        return Ok(vec![
            LuaValue::Function(std::rc::Rc::new(closure)),
            LuaValue::string(candidate),
        ]);
    }
    Ok(vec![LuaValue::string(missing.iter().join(""))])
}

pub fn lua_require(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let name = check_string(&args, 1, "require")?;

    let loaded = package_field(vm, "loaded");
    let loaded = loaded
        .as_table()
        .cloned()
        .ok_or_else(|| LuaError::runtime("package.loaded is not a table"))?;
    let cached = loaded.borrow().get_str(&name);
    if !cached.is_nil() {
        return Ok(vec![cached]);
    }

    let searchers = package_field(vm, "searchers");
    let searchers = searchers
        .as_table()
        .cloned()
        .ok_or_else(|| LuaError::runtime("package.searchers is not a table"))?;

    let mut messages = String::new();
    let count = searchers.borrow().border();
    for i in 1..=count {
        let searcher = searchers.borrow().get_int(i);
        if searcher.is_nil() {
            continue;
        }
        let mut results = vm.call_value(searcher, vec![LuaValue::Str(name.clone())])?;
        let first = if results.is_empty() {
            LuaValue::Nil
        } else {
            results.remove(0)
        };
        match first {
            LuaValue::Function(_) | LuaValue::Native(_) => {
                let extra = results.into_iter().next().unwrap_or(LuaValue::Nil);
                let loader_results =
                    vm.call_value(first, vec![LuaValue::Str(name.clone()), extra])?;
                let value = loader_results.into_iter().next().unwrap_or(LuaValue::Nil);
                let value = if value.is_nil() {
                    LuaValue::Boolean(true)
                } else {
                    value
                };
                loaded.borrow_mut().set_str(&name, value.clone());
                return Ok(vec![value]);
            }
            LuaValue::Str(msg) => messages.push_str(&msg),
            _ => {}
        }
    }

    Err(LuaError::runtime(format!(
        "Module '{}' not found!{}",
        name, messages
    )))
}
