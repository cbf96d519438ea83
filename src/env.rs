// Environment façade
// `create_env` ties the configuration collaborator, the root global table,
// the string metatable and the module registries into one embedding surface:
// parse / parse_file / exec / load_lib / extend_lib.

use std::io::Write;
use std::rc::Rc;

use tracing::debug;

use crate::compiler::Proto;
use crate::lib_registry;
use crate::lua_value::LuaValue;
use crate::lua_vm::{LuaError, LuaResult, LuaVm};

/// Host collaborators and options. All I/O of the engine funnels through
/// this object; the defaults reach the real filesystem and process stdout.
#[derive(Clone, Default)]
pub struct EnvConfig {
    /// Search path for require (the LUA_PATH option).
    pub lua_path: String,
    /// Text made available to scripts as standard input.
    pub stdin: String,
    pub file_exists: Option<Rc<dyn Fn(&str) -> bool>>,
    pub load_file: Option<Rc<dyn Fn(&str) -> Option<String>>>,
    pub stdout: Option<Rc<dyn Fn(&str)>>,
    pub os_exit: Option<Rc<dyn Fn(i64)>>,
}

impl EnvConfig {
    pub fn new() -> Self {
        EnvConfig::default()
    }

    pub(crate) fn effective_lua_path(&self) -> String {
        if self.lua_path.is_empty() {
            "./?.lua".to_string()
        } else {
            self.lua_path.clone()
        }
    }

    pub fn file_exists(&self, path: &str) -> bool {
        match &self.file_exists {
            Some(f) => f(path),
            None => std::fs::metadata(path).is_ok(),
        }
    }

    pub fn load_file(&self, path: &str) -> Option<String> {
        match &self.load_file {
            Some(f) => f(path),
            None => std::fs::read_to_string(path).ok(),
        }
    }

    pub fn write_stdout(&self, text: &str) {
        match &self.stdout {
            Some(f) => f(text),
            None => {
                let mut out = std::io::stdout();
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
        }
    }
}

/// A compiled chunk, executable against the environment it was parsed in.
#[derive(Debug)]
pub struct Script {
    pub name: String,
    proto: Rc<Proto>,
}

impl Script {
    pub fn exec(&self, env: &mut LuaEnv) -> LuaResult<LuaValue> {
        env.exec(self)
    }
}

pub struct LuaEnv {
    vm: LuaVm,
}

/// The embedding entry point.
pub fn create_env(config: EnvConfig) -> LuaEnv {
    LuaEnv::new(config)
}

impl LuaEnv {
    pub fn new(mut config: EnvConfig) -> Self {
        config.lua_path = config.effective_lua_path();
        let mut vm = LuaVm::new(config);
        vm.open_libs();
        LuaEnv { vm }
    }

    /// Compile Lua source into a script handle.
    pub fn parse(&mut self, source: &str) -> LuaResult<Script> {
        let proto = self.vm.compile(source, "=input")?;
        Ok(Script {
            name: "=input".to_string(),
            proto,
        })
    }

    /// Compile the file at `path`, read through the config collaborator.
    pub fn parse_file(&mut self, path: &str) -> LuaResult<Script> {
        let Some(source) = self.vm.config.load_file(path) else {
            return Err(LuaError::runtime(format!("cannot open file '{}'", path)));
        };
        let proto = self.vm.compile(&source, path)?;
        Ok(Script {
            name: path.to_string(),
            proto,
        })
    }

    /// Run a script and return the first value of its return sequence.
    pub fn exec(&mut self, script: &Script) -> LuaResult<LuaValue> {
        debug!(script = %script.name, "executing script");
        let results = self.vm.execute_proto(script.proto.clone())?;
        Ok(results.into_iter().next().unwrap_or(LuaValue::Nil))
    }

    /// Register `table` as the global library `name`.
    pub fn load_lib(&mut self, name: &str, table: LuaValue) {
        lib_registry::load_lib(&mut self.vm, name, table);
    }

    /// Merge `table` into the existing global library `name`; loads it fresh
    /// when the global is not a table.
    pub fn extend_lib(&mut self, name: &str, table: LuaValue) {
        lib_registry::extend_lib(&mut self.vm, name, table);
    }

    pub fn vm(&self) -> &LuaVm {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut LuaVm {
        &mut self.vm
    }
}
