// Lua 5.3 embedding engine
// emmylua_parser front end, scope/goto analysis, flat-code interpreter with
// full metatable semantics and cooperative coroutines.

#[cfg(test)]
mod test;

pub mod compiler;
pub mod env;
pub mod lib_registry;
pub mod lua_value;
pub mod lua_vm;
pub mod stdlib;

pub use env::{create_env, EnvConfig, LuaEnv, Script};
pub use lib_registry::LibraryRegistry;
pub use lua_value::{LuaClosure, LuaTable, LuaThread, LuaValue};
pub use lua_vm::{LuaError, LuaResult, LuaVm};

/// Run a chunk in a fresh environment and return the first value of its
/// return sequence.
pub fn execute(source: &str) -> LuaResult<LuaValue> {
    let mut vm = LuaVm::new(EnvConfig::default());
    vm.open_libs();
    let proto = vm.compile(source, "=chunk")?;
    let results = vm.execute_proto(proto)?;
    Ok(results.into_iter().next().unwrap_or(LuaValue::Nil))
}

/// Run a chunk against an existing VM.
pub fn execute_with_vm(vm: &mut LuaVm, source: &str) -> LuaResult<LuaValue> {
    let proto = vm.compile(source, "=chunk")?;
    let results = vm.execute_proto(proto)?;
    Ok(results.into_iter().next().unwrap_or(LuaValue::Nil))
}
