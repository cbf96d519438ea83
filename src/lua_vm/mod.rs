// Runtime: VM state, interpreter, scopes, operators, coercions, errors

pub mod coercion;
mod interpreter;
mod lua_error;
pub mod operators;
mod scope;

pub use interpreter::{Frame, RunOutcome};
pub use lua_error::{LuaError, LuaResult};
pub use scope::Scope;

use std::cell::RefCell;
use std::rc::Rc;

use crate::compiler;
use crate::compiler::Proto;
use crate::env::EnvConfig;
use crate::lua_value::{LuaTable, LuaThread, LuaValue};

/// Per-environment engine state: the root global table, the string metatable,
/// the scope chain root and the coroutine scheduler (main/current pointers).
pub struct LuaVm {
    pub globals: Rc<RefCell<LuaTable>>,
    pub root_scope: Rc<RefCell<Scope>>,
    pub string_meta: Rc<RefCell<LuaTable>>,
    pub main_thread: Rc<RefCell<LuaThread>>,
    pub current_thread: Rc<RefCell<LuaThread>>,
    pub config: EnvConfig,
    pub(crate) random_seed: i64,
}

impl LuaVm {
    pub fn new(mut config: EnvConfig) -> Self {
        config.lua_path = config.effective_lua_path();
        let globals = Rc::new(RefCell::new(LuaTable::new()));
        let root_scope = Scope::root(globals.clone());
        let main_thread = Rc::new(RefCell::new(LuaThread::main()));
        LuaVm {
            globals,
            root_scope,
            string_meta: Rc::new(RefCell::new(LuaTable::new())),
            main_thread: main_thread.clone(),
            current_thread: main_thread,
            config,
            random_seed: 1,
        }
    }

    /// Load all standard libraries and the engine globals.
    pub fn open_libs(&mut self) {
        crate::lib_registry::create_standard_registry().load_all(self);

        self.set_global("_G", LuaValue::Table(self.globals.clone()));
        self.set_global("_VERSION", LuaValue::string("Lua 5.3"));

        // all strings share one metatable whose __index is the string library
        let string_lib = self.get_global("string");
        if string_lib.is_table() {
            self.string_meta.borrow_mut().set_str("__index", string_lib);
        }
    }

    pub fn set_global(&mut self, name: &str, value: LuaValue) {
        self.globals.borrow_mut().set_str(name, value);
    }

    pub fn get_global(&self, name: &str) -> LuaValue {
        self.globals.borrow().get_str(name)
    }

    pub fn compile(&self, source: &str, chunk_name: &str) -> LuaResult<Rc<Proto>> {
        compiler::compile(source, chunk_name)
    }

    /// Run a compiled chunk against the environment's globals, returning its
    /// whole return sequence.
    pub fn execute_proto(&mut self, proto: Rc<Proto>) -> LuaResult<Vec<LuaValue>> {
        self.run_chunk(proto, Vec::new())
    }

    pub fn execute_string(&mut self, source: &str) -> LuaResult<Vec<LuaValue>> {
        let proto = self.compile(source, "=chunk")?;
        self.execute_proto(proto)
    }

    pub(crate) fn write_stdout(&mut self, text: &str) {
        self.config.write_stdout(text);
    }
}
