// Lua value model

mod lua_table;
mod lua_thread;
mod lua_value;

pub use lua_table::LuaTable;
pub use lua_thread::{CoroutineStatus, LuaThread};
pub use lua_value::{LuaClosure, LuaValue, NativeFunction, NativeImpl};
