//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be evolved
//! independently:
//! - `tokenizer` performs lexical analysis and hands the parser one token at a time.
//! - `arena` owns every AST node for the lifetime of one compilation.
//! - `symbol` tracks declared variables, their frame slots and scope depth.
//! - `parser` owns all syntactic knowledge and produces a resolved statement AST.
//! - `codegen` lowers the finished tree into Intel-syntax x86-64 assembly.
//! - `error` centralises the diagnostics shared by the other modules.

use log::debug;

pub mod arena;
pub mod error;
pub mod parser;
pub mod symbol;
pub mod tokenizer;

mod codegen;

pub use error::{CompileError, CompileResult};

/// Compile a source string into Intel-syntax assembly.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  let program = parser::parse(source)?;
  debug!("abstract syntax tree:\n{}", parser::dump(&program, source));
  codegen::generate(&program, source)
}
