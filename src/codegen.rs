//! Code generation: lower the parsed AST into Intel-syntax x86-64 assembly.
//!
//! The emitter uses a simple stack machine: every expression leaves exactly
//! one value on the stack and every statement leaves the stack as it found
//! it. Locals live on the stack frame and are addressed relative to `rbp`;
//! control flow gets fresh `.L` labels from a per-compilation counter.

use crate::arena::NodeId;
use crate::error::{CompileError, CompileResult};
use crate::parser::{BinaryOp, NodeKind, Program};

/// Emit the full assembly text for a parsed program.
pub fn generate(program: &Program, source: &str) -> CompileResult<String> {
  let mut codegen = Codegen {
    program,
    source,
    label_count: 0,
    asm: String::new(),
  };

  codegen.asm.push_str(".intel_syntax noprefix\n");
  codegen.asm.push_str(".section .rodata\n");
  codegen.asm.push_str(".LC0:\n");
  codegen.asm.push_str("  .string \"%d\\n\"\n");
  codegen.asm.push_str(".section .text\n");
  codegen.asm.push_str(".global main\n");
  codegen.asm.push_str("main:\n");
  codegen.asm.push_str("  push rbp\n");
  codegen.asm.push_str("  mov rbp, rsp\n");
  if program.stack_size > 0 {
    codegen.asm.push_str(&format!("  sub rsp, {}\n", program.stack_size));
  }

  codegen.emit_stmt_chain(Some(program.body))?;

  codegen.asm.push_str("  mov rax, 0\n");
  codegen.asm.push_str("  mov rsp, rbp\n");
  codegen.asm.push_str("  pop rbp\n");
  codegen.asm.push_str("  ret\n");

  Ok(codegen.asm)
}

/// Per-compilation emitter state. The label counter lives here, never in
/// process-wide state, so recompiling the same source always numbers the
/// labels identically.
struct Codegen<'a> {
  program: &'a Program,
  source: &'a str,
  label_count: u32,
  asm: String,
}

impl Codegen<'_> {
  fn fresh_label(&mut self) -> u32 {
    let label = self.label_count;
    self.label_count += 1;
    label
  }

  fn kind(&self, id: NodeId) -> NodeKind {
    self.program.arena[id].kind
  }

  fn emit_stmt_chain(&mut self, mut stmt: Option<NodeId>) -> CompileResult<()> {
    while let Some(id) = stmt {
      self.emit_stmt(id)?;
      stmt = self.program.arena[id].next;
    }
    Ok(())
  }

  /// Emit one statement, leaving the evaluation stack untouched.
  fn emit_stmt(&mut self, id: NodeId) -> CompileResult<()> {
    match self.kind(id) {
      NodeKind::Assign { offset, value, .. } => {
        self.emit_expr(value)?;
        self.asm.push_str("  pop rax\n");
        self.asm.push_str(&format!("  mov [rbp - {offset}], rax\n"));
      }
      NodeKind::If { condition, body } => {
        let after = self.fresh_label();
        self.emit_expr(condition)?;
        self.asm.push_str("  pop rax\n");
        self.asm.push_str("  cmp rax, 0\n");
        self.asm.push_str(&format!("  je .L{after}\n"));
        self.emit_stmt(body)?;
        self.asm.push_str(&format!(".L{after}:\n"));
      }
      NodeKind::While { condition, body } => {
        let start = self.fresh_label();
        let end = self.fresh_label();
        self.asm.push_str(&format!(".L{start}:\n"));
        self.emit_expr(condition)?;
        self.asm.push_str("  pop rax\n");
        self.asm.push_str("  cmp rax, 0\n");
        self.asm.push_str(&format!("  je .L{end}\n"));
        self.emit_stmt(body)?;
        self.asm.push_str(&format!("  jmp .L{start}\n"));
        self.asm.push_str(&format!(".L{end}:\n"));
      }
      NodeKind::Block { head } => self.emit_stmt_chain(head)?,
      NodeKind::Print { expr } => {
        self.emit_expr(expr)?;
        self.asm.push_str("  pop rsi\n");
        self.asm.push_str("  lea rdi, [rip + .LC0]\n");
        self.asm.push_str("  mov rax, 0\n");
        self.asm.push_str("  call printf@PLT\n");
      }
      // A bare expression statement: evaluate, then discard the value to
      // keep the stack balanced.
      _ => {
        self.emit_expr(id)?;
        self.asm.push_str("  pop rax\n");
      }
    }
    Ok(())
  }

  /// Emit one expression, net-pushing exactly one value.
  fn emit_expr(&mut self, id: NodeId) -> CompileResult<()> {
    match self.kind(id) {
      NodeKind::Num { value } => {
        self.asm.push_str(&format!("  mov rax, {value}\n"));
        self.asm.push_str("  push rax\n");
      }
      NodeKind::Var { name, offset } => {
        let Some(offset) = offset else {
          return Err(CompileError::UndeclaredVariable {
            name: name.text(self.source).to_string(),
            line: line_at(self.source, name.loc),
          });
        };
        self.asm.push_str(&format!("  mov rax, [rbp - {offset}]\n"));
        self.asm.push_str("  push rax\n");
      }
      NodeKind::Binary { op, lhs, rhs } => {
        self.emit_expr(lhs)?;
        self.emit_expr(rhs)?;
        self.asm.push_str("  pop rbx\n");
        self.asm.push_str("  pop rax\n");
        match op {
          BinaryOp::Add => self.asm.push_str("  add rax, rbx\n"),
          BinaryOp::Sub => self.asm.push_str("  sub rax, rbx\n"),
          BinaryOp::Mul => self.asm.push_str("  imul rax, rbx\n"),
          BinaryOp::Div => {
            self.asm.push_str("  cqo\n");
            self.asm.push_str("  idiv rbx\n");
          }
          BinaryOp::Eq => self.emit_compare("sete"),
          BinaryOp::Ne => self.emit_compare("setne"),
          BinaryOp::Lt => self.emit_compare("setl"),
          BinaryOp::Le => self.emit_compare("setle"),
          BinaryOp::Gt => self.emit_compare("setg"),
          BinaryOp::Ge => self.emit_compare("setge"),
        }
        self.asm.push_str("  push rax\n");
      }
      NodeKind::LogicalAnd { lhs, rhs } => {
        // A literal left operand that is already false decides the result,
        // so the right operand is never lowered or resolved.
        if matches!(self.kind(lhs), NodeKind::Num { value: 0 }) {
          self.asm.push_str("  mov rax, 0\n");
          self.asm.push_str("  push rax\n");
          return Ok(());
        }
        let label_false = self.fresh_label();
        let label_end = self.fresh_label();
        self.emit_expr(lhs)?;
        self.asm.push_str("  pop rax\n");
        self.asm.push_str("  cmp rax, 0\n");
        self.asm.push_str(&format!("  je .L{label_false}\n"));
        self.emit_expr(rhs)?;
        self.asm.push_str("  pop rax\n");
        self.asm.push_str("  cmp rax, 0\n");
        self.asm.push_str(&format!("  je .L{label_false}\n"));
        self.asm.push_str("  mov rax, 1\n");
        self.asm.push_str(&format!("  jmp .L{label_end}\n"));
        self.asm.push_str(&format!(".L{label_false}:\n"));
        self.asm.push_str("  mov rax, 0\n");
        self.asm.push_str(&format!(".L{label_end}:\n"));
        self.asm.push_str("  push rax\n");
      }
      NodeKind::LogicalOr { lhs, rhs } => {
        // Mirror image: a literal true left operand short-circuits to 1.
        if matches!(self.kind(lhs), NodeKind::Num { value } if value != 0) {
          self.asm.push_str("  mov rax, 1\n");
          self.asm.push_str("  push rax\n");
          return Ok(());
        }
        let label_true = self.fresh_label();
        let label_end = self.fresh_label();
        self.emit_expr(lhs)?;
        self.asm.push_str("  pop rax\n");
        self.asm.push_str("  cmp rax, 0\n");
        self.asm.push_str(&format!("  jne .L{label_true}\n"));
        self.emit_expr(rhs)?;
        self.asm.push_str("  pop rax\n");
        self.asm.push_str("  cmp rax, 0\n");
        self.asm.push_str(&format!("  jne .L{label_true}\n"));
        self.asm.push_str("  mov rax, 0\n");
        self.asm.push_str(&format!("  jmp .L{label_end}\n"));
        self.asm.push_str(&format!(".L{label_true}:\n"));
        self.asm.push_str("  mov rax, 1\n");
        self.asm.push_str(&format!(".L{label_end}:\n"));
        self.asm.push_str("  push rax\n");
      }
      _ => unreachable!("statement node in expression position"),
    }
    Ok(())
  }

  /// Compare-and-set-boolean pattern shared by the six relational and
  /// equality operators; normalises the result to 0/1.
  fn emit_compare(&mut self, set: &str) {
    self.asm.push_str("  cmp rax, rbx\n");
    self.asm.push_str(&format!("  {set} al\n"));
    self.asm.push_str("  movzx rax, al\n");
  }
}

/// 1-based line of a byte offset, for diagnostics raised after parsing.
fn line_at(source: &str, loc: usize) -> u32 {
  let loc = loc.min(source.len());
  source[..loc].bytes().filter(|&b| b == b'\n').count() as u32 + 1
}

#[cfg(test)]
mod tests {
  use expect_test::{Expect, expect};

  use super::*;
  use crate::parser::parse;

  fn check(source: &str, expected: Expect) {
    let program = parse(source).unwrap();
    expected.assert_eq(&generate(&program, source).unwrap());
  }

  #[test]
  fn arithmetic_follows_the_stack_discipline() {
    check(
      "print(1 + 2);",
      expect![[r#"
          .intel_syntax noprefix
          .section .rodata
          .LC0:
            .string "%d\n"
          .section .text
          .global main
          main:
            push rbp
            mov rbp, rsp
            mov rax, 1
            push rax
            mov rax, 2
            push rax
            pop rbx
            pop rax
            add rax, rbx
            push rax
            pop rsi
            lea rdi, [rip + .LC0]
            mov rax, 0
            call printf@PLT
            mov rax, 0
            mov rsp, rbp
            pop rbp
            ret
      "#]],
    );
  }

  #[test]
  fn assignments_reserve_and_address_frame_slots() {
    check(
      "x = 1; if (x) { print(x); }",
      expect![[r#"
          .intel_syntax noprefix
          .section .rodata
          .LC0:
            .string "%d\n"
          .section .text
          .global main
          main:
            push rbp
            mov rbp, rsp
            sub rsp, 8
            mov rax, 1
            push rax
            pop rax
            mov [rbp - 8], rax
            mov rax, [rbp - 8]
            push rax
            pop rax
            cmp rax, 0
            je .L0
            mov rax, [rbp - 8]
            push rax
            pop rsi
            lea rdi, [rip + .LC0]
            mov rax, 0
            call printf@PLT
          .L0:
            mov rax, 0
            mov rsp, rbp
            pop rbp
            ret
      "#]],
    );
  }

  #[test]
  fn while_loops_test_at_the_head() {
    check(
      "x = 0; while (x < 2) { x = x + 1; }",
      expect![[r#"
          .intel_syntax noprefix
          .section .rodata
          .LC0:
            .string "%d\n"
          .section .text
          .global main
          main:
            push rbp
            mov rbp, rsp
            sub rsp, 8
            mov rax, 0
            push rax
            pop rax
            mov [rbp - 8], rax
          .L0:
            mov rax, [rbp - 8]
            push rax
            mov rax, 2
            push rax
            pop rbx
            pop rax
            cmp rax, rbx
            setl al
            movzx rax, al
            push rax
            pop rax
            cmp rax, 0
            je .L1
            mov rax, [rbp - 8]
            push rax
            mov rax, 1
            push rax
            pop rbx
            pop rax
            add rax, rbx
            push rax
            pop rax
            mov [rbp - 8], rax
            jmp .L0
          .L1:
            mov rax, 0
            mov rsp, rbp
            pop rbp
            ret
      "#]],
    );
  }

  #[test]
  fn logical_and_short_circuits_through_labels() {
    check(
      "x = 1; print(x && 2);",
      expect![[r#"
          .intel_syntax noprefix
          .section .rodata
          .LC0:
            .string "%d\n"
          .section .text
          .global main
          main:
            push rbp
            mov rbp, rsp
            sub rsp, 8
            mov rax, 1
            push rax
            pop rax
            mov [rbp - 8], rax
            mov rax, [rbp - 8]
            push rax
            pop rax
            cmp rax, 0
            je .L0
            mov rax, 2
            push rax
            pop rax
            cmp rax, 0
            je .L0
            mov rax, 1
            jmp .L1
          .L0:
            mov rax, 0
          .L1:
            push rax
            pop rsi
            lea rdi, [rip + .LC0]
            mov rax, 0
            call printf@PLT
            mov rax, 0
            mov rsp, rbp
            pop rbp
            ret
      "#]],
    );
  }

  #[test]
  fn constant_false_left_operand_skips_the_right_operand() {
    // `y` is never declared; the fold keeps code generation from touching it.
    check(
      "print(0 && y);",
      expect![[r#"
          .intel_syntax noprefix
          .section .rodata
          .LC0:
            .string "%d\n"
          .section .text
          .global main
          main:
            push rbp
            mov rbp, rsp
            mov rax, 0
            push rax
            pop rsi
            lea rdi, [rip + .LC0]
            mov rax, 0
            call printf@PLT
            mov rax, 0
            mov rsp, rbp
            pop rbp
            ret
      "#]],
    );
  }

  #[test]
  fn constant_true_left_operand_skips_the_right_operand() {
    check(
      "print(1 || y);",
      expect![[r#"
          .intel_syntax noprefix
          .section .rodata
          .LC0:
            .string "%d\n"
          .section .text
          .global main
          main:
            push rbp
            mov rbp, rsp
            mov rax, 1
            push rax
            pop rsi
            lea rdi, [rip + .LC0]
            mov rax, 0
            call printf@PLT
            mov rax, 0
            mov rsp, rbp
            pop rbp
            ret
      "#]],
    );
  }

  #[test]
  fn undeclared_variable_reads_fail_naming_the_variable() {
    let program = parse("print(y);").unwrap();
    let err = generate(&program, "print(y);").unwrap_err();
    assert_eq!(err.to_string(), "Error: Variable 'y' not declared at line 1.");
  }

  #[test]
  fn undeclared_variable_line_numbers_survive_to_codegen() {
    let source = "x = 1;\nprint(x);\nprint(missing);";
    let program = parse(source).unwrap();
    let err = generate(&program, source).unwrap_err();
    assert_eq!(err.to_string(), "Error: Variable 'missing' not declared at line 3.");
  }

  #[test]
  fn non_constant_and_still_resolves_the_right_operand() {
    let source = "x = 1; print(x && y);";
    let program = parse(source).unwrap();
    let err = generate(&program, source).unwrap_err();
    assert_eq!(err.to_string(), "Error: Variable 'y' not declared at line 1.");
  }

  #[test]
  fn recompiling_the_same_source_is_byte_identical() {
    let source = "x = 0; while (x < 3) { if (x || 1) { print(x && x); } x = x + 1; }";
    let first = generate(&parse(source).unwrap(), source).unwrap();
    let second = generate(&parse(source).unwrap(), source).unwrap();
    assert_eq!(first, second);
  }
}
