// Engine error kinds
// A single domain-error kind carries the Lua-visible message; compile errors
// cover syntax, goto and vararg violations raised before execution.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LuaError {
    /// Lua-level error, catchable by pcall/xpcall
    #[error("{0}")]
    Runtime(String),
    /// Raised while parsing or analyzing a chunk
    #[error("{0}")]
    Compile(String),
}

impl LuaError {
    pub fn runtime(msg: impl Into<String>) -> Self {
        LuaError::Runtime(msg.into())
    }

    pub fn compile(msg: impl Into<String>) -> Self {
        LuaError::Compile(msg.into())
    }

    /// The message as seen by Lua code (pcall's second return value).
    pub fn message(&self) -> &str {
        match self {
            LuaError::Runtime(m) | LuaError::Compile(m) => m,
        }
    }
}

pub type LuaResult<T> = Result<T, LuaError>;
