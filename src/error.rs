//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics are kept lightweight on purpose – every message names the
//! offending construct and the 1-based source line it came from, in the
//! style of the classic teaching compilers. The binary maps error classes
//! onto BSD-style exit codes.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

/// Exit status for an invalid invocation (wrong argument count).
pub const EXIT_USAGE: i32 = 64;
/// Exit status for lexical, syntax and semantic errors.
pub const EXIT_COMPILE: i32 = 65;
/// Exit status for I/O and allocation failures.
pub const EXIT_RESOURCE: i32 = 74;

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("Error: Unexpected character '{ch}' at line {line}."))]
  UnexpectedCharacter { ch: char, line: u32 },

  #[snafu(display("Error: {message} at line {line}."))]
  Syntax { message: String, line: u32 },

  #[snafu(display("Error: Variable '{name}' not declared at line {line}."))]
  UndeclaredVariable { name: String, line: u32 },

  #[snafu(display("Error: AST arena capacity exhausted ({capacity} nodes)."))]
  ArenaExhausted { capacity: usize },
}

impl CompileError {
  /// Construct a syntax error anchored at a source line.
  pub fn syntax(message: impl Into<String>, line: u32) -> Self {
    Self::Syntax {
      message: message.into(),
      line,
    }
  }

  /// Exit status class for this error; see the constants above.
  pub fn exit_code(&self) -> i32 {
    match self {
      Self::ArenaExhausted { .. } => EXIT_RESOURCE,
      _ => EXIT_COMPILE,
    }
  }
}
