//! Error types for golite

use std::fmt;

/// Source position (1-based). A zero line means "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Error type for golite operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GoError {
    #[error("{pos}: syntax error: {message}")]
    Syntax { pos: Pos, message: String },

    #[error("{pos}: {message}")]
    Resolve { pos: Pos, message: String },

    #[error("{}", located(.pos, .message))]
    Runtime { pos: Pos, message: String },

    #[error("panic: {0}")]
    Panic(String),

    #[error("{0}")]
    Limit(String),

    #[error("{0}")]
    Load(String),

    #[error("{0}")]
    Stdlib(String),
}

fn located(pos: &Pos, message: &str) -> String {
    if pos.is_known() {
        format!("{}: {}", pos, message)
    } else {
        message.to_string()
    }
}

impl GoError {
    pub fn syntax(pos: Pos, message: impl Into<String>) -> Self {
        GoError::Syntax {
            pos,
            message: message.into(),
        }
    }

    pub fn resolve(pos: Pos, message: impl Into<String>) -> Self {
        GoError::Resolve {
            pos,
            message: message.into(),
        }
    }

    pub fn runtime(pos: Pos, message: impl Into<String>) -> Self {
        GoError::Runtime {
            pos,
            message: message.into(),
        }
    }

    pub fn panic(message: impl Into<String>) -> Self {
        GoError::Panic(message.into())
    }

    /// Attach a position to a runtime error raised without one (native calls).
    pub fn with_pos(self, at: Pos) -> Self {
        match self {
            GoError::Runtime { pos, message } if !pos.is_known() => {
                GoError::Runtime { pos: at, message }
            }
            other => other,
        }
    }
}

/// Result type alias for golite operations
pub type Result<T> = std::result::Result<T, GoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_error_without_position_prints_message_only() {
        let err = GoError::runtime(Pos::default(), "bad call");
        assert_eq!(err.to_string(), "bad call");

        let err = err.with_pos(Pos::new(3, 7));
        assert_eq!(err.to_string(), "3:7: bad call");
    }

    #[test]
    fn with_pos_keeps_existing_position() {
        let err = GoError::runtime(Pos::new(1, 2), "x").with_pos(Pos::new(9, 9));
        assert_eq!(err.to_string(), "1:2: x");
    }

    #[test]
    fn panic_display_is_prefixed() {
        assert_eq!(
            GoError::panic("runtime error: integer divide by zero").to_string(),
            "panic: runtime error: integer divide by zero"
        );
    }
}
