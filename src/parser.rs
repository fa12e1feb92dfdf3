//! Recursive-descent parser producing an arena-backed statement AST.
//!
//! The parser mirrors the classic chibicc structure: a precedence-climbing
//! set of helpers for expressions and a thin statement layer on top so
//! sequencing lives outside the expression tree. Identifiers are resolved
//! against the symbol table while parsing, so the finished tree already
//! carries frame offsets wherever a binding was visible.

use crate::arena::{Arena, NodeId};
use crate::error::{CompileError, CompileResult};
use crate::symbol::SymbolTable;
use crate::tokenizer::{Span, TokenKind, Tokenizer};

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl BinaryOp {
  fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
      Self::Eq => "==",
      Self::Ne => "!=",
      Self::Lt => "<",
      Self::Le => "<=",
      Self::Gt => ">",
      Self::Ge => ">=",
    }
  }
}

/// Payload of one AST node. Child edges are arena handles into the same
/// arena; the tree is acyclic by construction.
#[derive(Debug, Clone, Copy)]
pub enum NodeKind {
  Num {
    value: i64,
  },
  /// A variable read. `offset` stays `None` when no binding was visible;
  /// code generation reports that if the value is ever needed.
  Var {
    name: Span,
    offset: Option<i64>,
  },
  Binary {
    op: BinaryOp,
    lhs: NodeId,
    rhs: NodeId,
  },
  LogicalAnd {
    lhs: NodeId,
    rhs: NodeId,
  },
  LogicalOr {
    lhs: NodeId,
    rhs: NodeId,
  },
  Assign {
    name: Span,
    offset: i64,
    value: NodeId,
  },
  If {
    condition: NodeId,
    body: NodeId,
  },
  While {
    condition: NodeId,
    body: NodeId,
  },
  Block {
    head: Option<NodeId>,
  },
  Print {
    expr: NodeId,
  },
}

/// One arena slot: the node payload plus the intrusive link that sequences
/// statements inside a block, in source order.
#[derive(Debug, Clone, Copy)]
pub struct AstNode {
  pub kind: NodeKind,
  pub next: Option<NodeId>,
}

impl AstNode {
  fn new(kind: NodeKind) -> Self {
    Self { kind, next: None }
  }
}

/// Result of a successful parse: the arena holding every node, the head of
/// the top-level statement chain, and the frame bytes the program needs.
#[derive(Debug)]
pub struct Program {
  pub arena: Arena<AstNode>,
  pub body: NodeId,
  pub stack_size: i64,
}

/// Parse `source` into a [`Program`].
pub fn parse(source: &str) -> CompileResult<Program> {
  let mut parser = Parser {
    tokenizer: Tokenizer::new(source)?,
    arena: Arena::new(),
    symbols: SymbolTable::new(source),
  };

  if parser.tokenizer.current().kind == TokenKind::Eof {
    return Err(CompileError::syntax("Program is empty", 1));
  }

  let body = parse_stmt(&mut parser)?;
  let mut tail = body;
  while parser.tokenizer.current().kind != TokenKind::Eof {
    let stmt = parse_stmt(&mut parser)?;
    parser.arena[tail].next = Some(stmt);
    tail = stmt;
  }

  Ok(Program {
    stack_size: parser.symbols.frame_size(),
    arena: parser.arena,
    body,
  })
}

/// Parsing context: the token cursor plus the arena and symbol table the
/// tree is built against. One instance per compilation unit.
struct Parser<'src> {
  tokenizer: Tokenizer<'src>,
  arena: Arena<AstNode>,
  symbols: SymbolTable<'src>,
}

impl Parser<'_> {
  fn alloc(&mut self, kind: NodeKind) -> CompileResult<NodeId> {
    self.arena.alloc(AstNode::new(kind))
  }
}

fn parse_stmt(p: &mut Parser) -> CompileResult<NodeId> {
  match p.tokenizer.current().kind {
    TokenKind::Print => parse_print(p),
    TokenKind::If => parse_if(p),
    TokenKind::While => parse_while(p),
    TokenKind::LBrace => parse_block(p),
    _ => parse_assign_or_expr(p),
  }
}

fn parse_print(p: &mut Parser) -> CompileResult<NodeId> {
  p.tokenizer.advance()?;
  p.tokenizer.expect(TokenKind::LParen, "Expected '(' after 'print'")?;
  let expr = parse_logic_or(p)?;
  p.tokenizer.expect(TokenKind::RParen, "Expected ')' after expression")?;
  p.tokenizer.expect(TokenKind::Semicolon, "Expected ';' after print statement")?;
  p.alloc(NodeKind::Print { expr })
}

fn parse_if(p: &mut Parser) -> CompileResult<NodeId> {
  p.tokenizer.advance()?;
  p.tokenizer.expect(TokenKind::LParen, "Expected '(' after 'if'")?;
  let condition = parse_logic_or(p)?;
  p.tokenizer.expect(TokenKind::RParen, "Expected ')' after condition")?;
  let body = parse_block(p)?;
  p.alloc(NodeKind::If { condition, body })
}

fn parse_while(p: &mut Parser) -> CompileResult<NodeId> {
  p.tokenizer.advance()?;
  p.tokenizer.expect(TokenKind::LParen, "Expected '(' after 'while'")?;
  let condition = parse_logic_or(p)?;
  p.tokenizer.expect(TokenKind::RParen, "Expected ')' after condition")?;
  let body = parse_block(p)?;
  p.alloc(NodeKind::While { condition, body })
}

/// `{ statement* }`, bracketed by a symbol-table scope.
fn parse_block(p: &mut Parser) -> CompileResult<NodeId> {
  p.tokenizer.expect(TokenKind::LBrace, "Expected '{' at the beginning of block")?;
  p.symbols.begin_scope();

  let mut head = None;
  let mut tail = None;
  while !matches!(p.tokenizer.current().kind, TokenKind::RBrace | TokenKind::Eof) {
    let stmt = parse_stmt(p)?;
    match tail {
      Some(prev) => p.arena[prev].next = Some(stmt),
      None => head = Some(stmt),
    }
    tail = Some(stmt);
  }

  p.tokenizer.expect(TokenKind::RBrace, "Expected '}' at the end of block")?;
  p.symbols.end_scope();
  p.alloc(NodeKind::Block { head })
}

/// Assignment or bare expression statement. The target of an assignment is
/// parsed as an expression first; spotting `=` afterwards re-interprets
/// it, which keeps the grammar single-lookahead.
fn parse_assign_or_expr(p: &mut Parser) -> CompileResult<NodeId> {
  let line = p.tokenizer.current().line;
  let expr = parse_logic_or(p)?;

  if p.tokenizer.current().kind == TokenKind::Assign {
    let NodeKind::Var { name, .. } = p.arena[expr].kind else {
      return Err(CompileError::syntax("Invalid assignment target", line));
    };
    p.tokenizer.advance()?;

    // Rebind a slot declared in this scope, otherwise declare a fresh one;
    // an outer binding of the same name keeps its own slot.
    let offset = match p.symbols.lookup_local(name) {
      Some(offset) => offset,
      None => p.symbols.add(name),
    };

    let value = parse_logic_or(p)?;
    p.tokenizer.expect(TokenKind::Semicolon, "Expected ';' after expression")?;
    return p.alloc(NodeKind::Assign { name, offset, value });
  }

  p.tokenizer.expect(TokenKind::Semicolon, "Expected ';' after expression")?;
  Ok(expr)
}

fn parse_logic_or(p: &mut Parser) -> CompileResult<NodeId> {
  let mut node = parse_logic_and(p)?;

  while p.tokenizer.matches(TokenKind::OrOr)? {
    let rhs = parse_logic_and(p)?;
    node = p.alloc(NodeKind::LogicalOr { lhs: node, rhs })?;
  }

  Ok(node)
}

fn parse_logic_and(p: &mut Parser) -> CompileResult<NodeId> {
  let mut node = parse_relational(p)?;

  while p.tokenizer.matches(TokenKind::AndAnd)? {
    let rhs = parse_relational(p)?;
    node = p.alloc(NodeKind::LogicalAnd { lhs: node, rhs })?;
  }

  Ok(node)
}

/// Equality and relational operators share one left-associative layer.
fn parse_relational(p: &mut Parser) -> CompileResult<NodeId> {
  let mut node = parse_add(p)?;

  loop {
    let op = match p.tokenizer.current().kind {
      TokenKind::EqualEqual => BinaryOp::Eq,
      TokenKind::BangEqual => BinaryOp::Ne,
      TokenKind::Less => BinaryOp::Lt,
      TokenKind::LessEqual => BinaryOp::Le,
      TokenKind::Greater => BinaryOp::Gt,
      TokenKind::GreaterEqual => BinaryOp::Ge,
      _ => break,
    };
    p.tokenizer.advance()?;
    let rhs = parse_add(p)?;
    node = p.alloc(NodeKind::Binary { op, lhs: node, rhs })?;
  }

  Ok(node)
}

fn parse_add(p: &mut Parser) -> CompileResult<NodeId> {
  let mut node = parse_mul(p)?;

  loop {
    let op = match p.tokenizer.current().kind {
      TokenKind::Plus => BinaryOp::Add,
      TokenKind::Minus => BinaryOp::Sub,
      _ => break,
    };
    p.tokenizer.advance()?;
    let rhs = parse_mul(p)?;
    node = p.alloc(NodeKind::Binary { op, lhs: node, rhs })?;
  }

  Ok(node)
}

fn parse_mul(p: &mut Parser) -> CompileResult<NodeId> {
  let mut node = parse_primary(p)?;

  loop {
    let op = match p.tokenizer.current().kind {
      TokenKind::Star => BinaryOp::Mul,
      TokenKind::Slash => BinaryOp::Div,
      _ => break,
    };
    p.tokenizer.advance()?;
    let rhs = parse_primary(p)?;
    node = p.alloc(NodeKind::Binary { op, lhs: node, rhs })?;
  }

  Ok(node)
}

fn parse_primary(p: &mut Parser) -> CompileResult<NodeId> {
  let token = p.tokenizer.current();
  match token.kind {
    TokenKind::LParen => {
      p.tokenizer.advance()?;
      let node = parse_logic_or(p)?;
      p.tokenizer.expect(TokenKind::RParen, "Expected ')' after expression")?;
      Ok(node)
    }
    TokenKind::Number => {
      p.tokenizer.advance()?;
      let text = token.span.text(p.tokenizer.source());
      let value = text
        .parse::<i64>()
        .map_err(|_| CompileError::syntax(format!("Invalid number '{text}'"), token.line))?;
      p.alloc(NodeKind::Num { value })
    }
    TokenKind::Identifier => {
      p.tokenizer.advance()?;
      let offset = p.symbols.lookup(token.span);
      p.alloc(NodeKind::Var {
        name: token.span,
        offset,
      })
    }
    _ => Err(CompileError::syntax("Expected expression", token.line)),
  }
}

/// Render the AST as an indented tree for diagnostics.
pub fn dump(program: &Program, source: &str) -> String {
  let mut out = String::new();
  dump_chain(program, source, Some(program.body), 0, &mut out);
  out
}

fn dump_chain(
  program: &Program,
  source: &str,
  mut node: Option<NodeId>,
  depth: usize,
  out: &mut String,
) {
  while let Some(id) = node {
    let ast_node = &program.arena[id];
    for _ in 0..depth {
      out.push_str("  ");
    }
    match ast_node.kind {
      NodeKind::Num { value } => out.push_str(&format!("Number: {value}\n")),
      NodeKind::Var { name, .. } => {
        out.push_str(&format!("Variable: {}\n", name.text(source)));
      }
      NodeKind::Binary { op, lhs, rhs } => {
        out.push_str(&format!("BinaryOp: [{}]\n", op.symbol()));
        dump_chain(program, source, Some(lhs), depth + 1, out);
        dump_chain(program, source, Some(rhs), depth + 1, out);
      }
      NodeKind::LogicalAnd { lhs, rhs } => {
        out.push_str("LogicalAnd:\n");
        dump_chain(program, source, Some(lhs), depth + 1, out);
        dump_chain(program, source, Some(rhs), depth + 1, out);
      }
      NodeKind::LogicalOr { lhs, rhs } => {
        out.push_str("LogicalOr:\n");
        dump_chain(program, source, Some(lhs), depth + 1, out);
        dump_chain(program, source, Some(rhs), depth + 1, out);
      }
      NodeKind::Assign { name, value, .. } => {
        out.push_str(&format!("Assign: {}\n", name.text(source)));
        dump_chain(program, source, Some(value), depth + 1, out);
      }
      NodeKind::If { condition, body } => {
        out.push_str("If Statement:\n");
        dump_chain(program, source, Some(condition), depth + 1, out);
        dump_chain(program, source, Some(body), depth + 1, out);
      }
      NodeKind::While { condition, body } => {
        out.push_str("While Statement:\n");
        dump_chain(program, source, Some(condition), depth + 1, out);
        dump_chain(program, source, Some(body), depth + 1, out);
      }
      NodeKind::Block { head } => {
        out.push_str("Block:\n");
        dump_chain(program, source, head, depth + 1, out);
      }
      NodeKind::Print { expr } => {
        out.push_str("Print Statement:\n");
        dump_chain(program, source, Some(expr), depth + 1, out);
      }
    }
    node = ast_node.next;
  }
}
