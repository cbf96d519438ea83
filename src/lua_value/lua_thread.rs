// Lua thread (coroutine)
// A suspended thread owns its whole frame stack; resume restores it and the
// interpreter continues from the saved instruction pointers.

use super::LuaValue;
use crate::lua_vm::Frame;

pub struct LuaThread {
    pub status: CoroutineStatus,
    /// The callable the thread was created from.
    pub body: LuaValue,
    /// Saved frames while suspended; empty before the first resume and after
    /// the thread dies.
    pub frames: Vec<Frame>,
    /// Whether the body has been entered at least once.
    pub started: bool,
}

impl LuaThread {
    pub fn new(body: LuaValue) -> Self {
        LuaThread {
            status: CoroutineStatus::Suspended,
            body,
            frames: Vec::new(),
            started: false,
        }
    }

    /// The perpetually-running main thread of an environment.
    pub fn main() -> Self {
        LuaThread {
            status: CoroutineStatus::Running,
            body: LuaValue::Nil,
            frames: Vec::new(),
            started: true,
        }
    }

    pub fn can_resume(&self) -> bool {
        matches!(self.status, CoroutineStatus::Suspended)
    }

    pub fn is_dead(&self) -> bool {
        matches!(self.status, CoroutineStatus::Dead)
    }
}

impl std::fmt::Debug for LuaThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LuaThread({})", self.status.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineStatus {
    Suspended,
    Running,
    Dead,
}

impl CoroutineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoroutineStatus::Suspended => "suspended",
            CoroutineStatus::Running => "running",
            CoroutineStatus::Dead => "dead",
        }
    }
}
