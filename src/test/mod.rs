// Test module organization

pub mod test_basic;
pub mod test_control_flow;
pub mod test_coroutine;
pub mod test_math;
pub mod test_metamethods;
pub mod test_operators;
pub mod test_os;
pub mod test_package;
pub mod test_string;

use std::cell::RefCell;
use std::rc::Rc;

use crate::{EnvConfig, LuaEnv, LuaValue, LuaVm};

/// Run a script with all libraries loaded and panic on failure.
pub fn run(source: &str) {
    let mut vm = LuaVm::new(EnvConfig::default());
    vm.open_libs();
    let result = vm.execute_string(source);
    assert!(result.is_ok(), "script failed: {:?}", result.err());
}

/// Run a script and return its error message.
pub fn run_err(source: &str) -> String {
    let mut vm = LuaVm::new(EnvConfig::default());
    vm.open_libs();
    match vm.execute_string(source) {
        Ok(_) => panic!("script unexpectedly succeeded"),
        Err(e) => e.message().to_string(),
    }
}

/// Run a script and return its return values.
pub fn run_values(source: &str) -> Vec<LuaValue> {
    let mut vm = LuaVm::new(EnvConfig::default());
    vm.open_libs();
    vm.execute_string(source).expect("script failed")
}

/// An environment whose stdout is captured into a buffer.
pub fn env_with_captured_stdout() -> (LuaEnv, Rc<RefCell<String>>) {
    let buffer = Rc::new(RefCell::new(String::new()));
    let sink = buffer.clone();
    let config = EnvConfig {
        stdout: Some(Rc::new(move |text: &str| {
            sink.borrow_mut().push_str(text);
        })),
        ..EnvConfig::default()
    };
    (LuaEnv::new(config), buffer)
}
