// Library registration
// Standard libraries and host libraries register through the same path: a
// module is a named set of functions and values that becomes a global table
// (or, for "_G", a set of plain globals) and is mirrored in package.loaded.

use crate::lua_value::{LuaTable, LuaValue, NativeFunction};
use crate::lua_vm::{LuaResult, LuaVm};
use crate::stdlib;

/// Plain function entries keep the registry tables `const`-friendly.
pub type CFunction = fn(&mut LuaVm, Vec<LuaValue>) -> LuaResult<Vec<LuaValue>>;

/// Value initializers run when the module loads.
pub type ValueInitializer = fn(&mut LuaVm) -> LuaValue;

pub enum LibraryEntry {
    Function(CFunction),
    Value(ValueInitializer),
}

pub struct LibraryModule {
    pub name: &'static str,
    pub entries: Vec<(&'static str, LibraryEntry)>,
}

impl LibraryModule {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    pub fn with_function(mut self, name: &'static str, func: CFunction) -> Self {
        self.entries.push((name, LibraryEntry::Function(func)));
        self
    }

    pub fn with_value(mut self, name: &'static str, value_init: ValueInitializer) -> Self {
        self.entries.push((name, LibraryEntry::Value(value_init)));
        self
    }
}

#[macro_export]
macro_rules! lib_module {
    ($name:expr, {
        $($item_name:expr => $item:expr),* $(,)?
    }) => {{
        let mut module = $crate::lib_registry::LibraryModule::new($name);
        $(
            module.entries.push((
                $item_name,
                $crate::lib_registry::LibraryEntry::Function($item),
            ));
        )*
        module
    }};
}

pub struct LibraryRegistry {
    modules: Vec<LibraryModule>, // insertion order is load order
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    pub fn register(&mut self, module: LibraryModule) {
        self.modules.push(module);
    }

    pub fn load_all(&self, vm: &mut LuaVm) {
        for module in &self.modules {
            self.load_module(vm, module);
        }
    }

    pub fn load_module(&self, vm: &mut LuaVm, module: &LibraryModule) {
        if module.name == "_G" {
            for (name, entry) in &module.entries {
                let value = materialize(vm, name, entry);
                vm.set_global(name, value);
            }
            return;
        }

        let table = LuaTable::new();
        let table_value = LuaValue::table(table);
        for (name, entry) in &module.entries {
            let value = materialize(vm, name, entry);
            if let Some(t) = table_value.as_table() {
                t.borrow_mut().set_str(name, value);
            }
        }
        vm.set_global(module.name, table_value.clone());
        register_loaded(vm, module.name, table_value);
    }
}

impl Default for LibraryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn materialize(vm: &mut LuaVm, name: &'static str, entry: &LibraryEntry) -> LuaValue {
    match entry {
        LibraryEntry::Function(func) => {
            let f = *func;
            LuaValue::Native(NativeFunction::new(name, move |vm, args| f(vm, args)))
        }
        LibraryEntry::Value(init) => init(vm),
    }
}

/// Mirror a library table into package.loaded so require() finds it.
fn register_loaded(vm: &mut LuaVm, name: &str, value: LuaValue) {
    let package = vm.get_global("package");
    if let Some(pkg) = package.as_table() {
        let loaded = pkg.borrow().get_str("loaded");
        if let Some(loaded) = loaded.as_table() {
            loaded.borrow_mut().set_str(name, value);
        }
    }
}

/// All standard libraries; package goes first so package.loaded exists before
/// the others register themselves.
pub fn create_standard_registry() -> LibraryRegistry {
    let mut registry = LibraryRegistry::new();
    registry.register(stdlib::package::create_package_lib());
    registry.register(stdlib::basic::create_basic_lib());
    registry.register(stdlib::string::create_string_lib());
    registry.register(stdlib::table::create_table_lib());
    registry.register(stdlib::math::create_math_lib());
    registry.register(stdlib::os::create_os_lib());
    registry.register(stdlib::coroutine::create_coroutine_lib());
    registry
}

/// Register `table` as the global library `name` (the embedding surface's
/// loadLib operation).
pub fn load_lib(vm: &mut LuaVm, name: &str, table: LuaValue) {
    vm.set_global(name, table.clone());
    register_loaded(vm, name, table);
}

/// Merge `table` into the existing global library `name`, falling back to
/// `load_lib` when there is nothing to merge into.
pub fn extend_lib(vm: &mut LuaVm, name: &str, table: LuaValue) {
    let existing = vm.get_global(name);
    let (Some(dst), Some(src)) = (existing.as_table(), table.as_table()) else {
        load_lib(vm, name, table);
        return;
    };
    let mut key = LuaValue::Nil;
    loop {
        let pair = src.borrow().next(&key);
        match pair {
            Some((k, v)) => {
                // merged entries overwrite; raw_set only fails on nil/NaN
                // keys, which next() never yields
                let _ = dst.borrow_mut().raw_set(&k, v);
                key = k;
            }
            None => break,
        }
    }
}
