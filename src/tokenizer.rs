//! Lexical analysis: a pull-based tokenizer with one token of lookahead.
//!
//! The tokenizer is intentionally tiny – it knows nothing about semantics
//! beyond recognising operators, keywords and numeric literals. The parser
//! drives it through `advance`/`expect` and inspects `current`/`previous`.
//! All scanning state lives in the cursor, so independent compilations
//! never share anything.

use crate::error::{CompileError, CompileResult};

/// Byte range of a lexeme in the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
  pub loc: usize,
  pub len: usize,
}

impl Span {
  /// The slice of the source that produced this span.
  pub fn text<'a>(&self, source: &'a str) -> &'a str {
    &source[self.loc..self.loc + self.len]
  }
}

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Identifier,
  Number,
  Assign,
  Plus,
  Minus,
  Star,
  Slash,
  LParen,
  RParen,
  LBrace,
  RBrace,
  Semicolon,
  If,
  While,
  Print,
  EqualEqual,
  BangEqual,
  Less,
  LessEqual,
  Greater,
  GreaterEqual,
  AndAnd,
  OrOr,
  Eof,
  Error,
}

/// Thin wrapper for lexical information needed by later stages. Tokens
/// borrow nothing; their span indexes the source buffer, which outlives
/// every token and the AST built from them.
#[derive(Debug, Clone, Copy)]
pub struct Token {
  pub kind: TokenKind,
  pub span: Span,
  pub line: u32,
}

/// Cursor over the raw source with the current and previous tokens.
#[derive(Debug)]
pub struct Tokenizer<'src> {
  source: &'src str,
  start: usize,
  pos: usize,
  line: u32,
  current: Token,
  previous: Token,
}

impl<'src> Tokenizer<'src> {
  /// Build a tokenizer primed with the first token of `source`.
  pub fn new(source: &'src str) -> CompileResult<Self> {
    let placeholder = Token {
      kind: TokenKind::Eof,
      span: Span { loc: 0, len: 0 },
      line: 1,
    };
    let mut tokenizer = Self {
      source,
      start: 0,
      pos: 0,
      line: 1,
      current: placeholder,
      previous: placeholder,
    };
    tokenizer.advance()?;
    Ok(tokenizer)
  }

  pub fn source(&self) -> &'src str {
    self.source
  }

  pub fn current(&self) -> Token {
    self.current
  }

  pub fn previous(&self) -> Token {
    self.previous
  }

  /// Shift current to previous and scan the next token, failing on the
  /// first unrecognised character.
  pub fn advance(&mut self) -> CompileResult<()> {
    self.previous = self.current;
    let token = self.scan_one();
    if token.kind == TokenKind::Error {
      let ch = self.source[token.span.loc..].chars().next().unwrap_or('\0');
      return Err(CompileError::UnexpectedCharacter {
        ch,
        line: token.line,
      });
    }
    self.current = token;
    Ok(())
  }

  /// Consume the current token if it has the expected kind, otherwise fail
  /// with `message` and the current line.
  pub fn expect(&mut self, kind: TokenKind, message: &str) -> CompileResult<()> {
    if self.current.kind == kind {
      return self.advance();
    }
    Err(CompileError::syntax(message, self.current.line))
  }

  /// Consume the current token if it has the given kind.
  pub fn matches(&mut self, kind: TokenKind) -> CompileResult<bool> {
    if self.current.kind == kind {
      self.advance()?;
      return Ok(true);
    }
    Ok(false)
  }

  /// Scan a single raw token, skipping whitespace and tracking lines.
  /// Unrecognised characters come back as `Error` tokens for the caller to
  /// turn into a diagnostic.
  fn scan_one(&mut self) -> Token {
    self.skip_whitespace();
    self.start = self.pos;

    if self.is_at_end() {
      return self.make_token(TokenKind::Eof);
    }

    let c = self.bump();
    match c {
      b'(' => self.make_token(TokenKind::LParen),
      b')' => self.make_token(TokenKind::RParen),
      b'{' => self.make_token(TokenKind::LBrace),
      b'}' => self.make_token(TokenKind::RBrace),
      b';' => self.make_token(TokenKind::Semicolon),
      b'+' => self.make_token(TokenKind::Plus),
      b'-' => self.make_token(TokenKind::Minus),
      b'*' => self.make_token(TokenKind::Star),
      b'/' => self.make_token(TokenKind::Slash),
      b'=' => {
        let kind = if self.eat(b'=') { TokenKind::EqualEqual } else { TokenKind::Assign };
        self.make_token(kind)
      }
      b'!' => {
        let kind = if self.eat(b'=') { TokenKind::BangEqual } else { TokenKind::Error };
        self.make_token(kind)
      }
      b'<' => {
        let kind = if self.eat(b'=') { TokenKind::LessEqual } else { TokenKind::Less };
        self.make_token(kind)
      }
      b'>' => {
        let kind = if self.eat(b'=') { TokenKind::GreaterEqual } else { TokenKind::Greater };
        self.make_token(kind)
      }
      b'&' => {
        let kind = if self.eat(b'&') { TokenKind::AndAnd } else { TokenKind::Error };
        self.make_token(kind)
      }
      b'|' => {
        let kind = if self.eat(b'|') { TokenKind::OrOr } else { TokenKind::Error };
        self.make_token(kind)
      }
      _ if c.is_ascii_digit() => {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
          self.pos += 1;
        }
        self.make_token(TokenKind::Number)
      }
      _ if is_ident_start(c) => {
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
          self.pos += 1;
        }
        self.make_token(self.identifier_kind())
      }
      _ => self.make_token(TokenKind::Error),
    }
  }

  fn skip_whitespace(&mut self) {
    while let Some(c) = self.peek() {
      match c {
        b' ' | b'\r' | b'\t' => self.pos += 1,
        b'\n' => {
          self.line += 1;
          self.pos += 1;
        }
        _ => break,
      }
    }
  }

  /// Keywords are recognised by exact length and content of the scanned
  /// identifier span rather than through a keyword table.
  fn identifier_kind(&self) -> TokenKind {
    let text = &self.source[self.start..self.pos];
    match text.as_bytes()[0] {
      b'i' if text == "if" => TokenKind::If,
      b'p' if text == "print" => TokenKind::Print,
      b'w' if text == "while" => TokenKind::While,
      _ => TokenKind::Identifier,
    }
  }

  fn make_token(&self, kind: TokenKind) -> Token {
    Token {
      kind,
      span: Span {
        loc: self.start,
        len: self.pos - self.start,
      },
      line: self.line,
    }
  }

  fn is_at_end(&self) -> bool {
    self.pos >= self.source.len()
  }

  fn peek(&self) -> Option<u8> {
    self.source.as_bytes().get(self.pos).copied()
  }

  fn bump(&mut self) -> u8 {
    let c = self.source.as_bytes()[self.pos];
    self.pos += 1;
    c
  }

  fn eat(&mut self, expected: u8) -> bool {
    if self.peek() == Some(expected) {
      self.pos += 1;
      return true;
    }
    false
  }
}

fn is_ident_start(c: u8) -> bool {
  c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
  c.is_ascii_alphanumeric() || c == b'_'
}

#[cfg(test)]
mod tests {
  use expect_test::{Expect, expect};

  use super::*;

  fn check(source: &str, expected: Expect) {
    let mut tokenizer = Tokenizer::new(source).unwrap();
    let mut rendered = String::new();
    loop {
      let token = tokenizer.current();
      rendered.push_str(&format!(
        "{:?} {:?} line {}\n",
        token.kind,
        token.span.text(source),
        token.line
      ));
      if token.kind == TokenKind::Eof {
        break;
      }
      tokenizer.advance().unwrap();
    }
    expected.assert_eq(&rendered);
  }

  #[test]
  fn scans_assignment_statement() {
    check(
      "x = 1 + 2;",
      expect![[r#"
          Identifier "x" line 1
          Assign "=" line 1
          Number "1" line 1
          Plus "+" line 1
          Number "2" line 1
          Semicolon ";" line 1
          Eof "" line 1
      "#]],
    );
  }

  #[test]
  fn keywords_need_exact_length_and_content() {
    check(
      "if while print ifx while_ prints _if",
      expect![[r#"
          If "if" line 1
          While "while" line 1
          Print "print" line 1
          Identifier "ifx" line 1
          Identifier "while_" line 1
          Identifier "prints" line 1
          Identifier "_if" line 1
          Eof "" line 1
      "#]],
    );
  }

  #[test]
  fn scans_comparison_and_logical_operators() {
    check(
      "== != <= >= < > && ||",
      expect![[r#"
          EqualEqual "==" line 1
          BangEqual "!=" line 1
          LessEqual "<=" line 1
          GreaterEqual ">=" line 1
          Less "<" line 1
          Greater ">" line 1
          AndAnd "&&" line 1
          OrOr "||" line 1
          Eof "" line 1
      "#]],
    );
  }

  #[test]
  fn newlines_bump_the_line_counter() {
    check(
      "a = 1;\nb = 2;",
      expect![[r#"
          Identifier "a" line 1
          Assign "=" line 1
          Number "1" line 1
          Semicolon ";" line 1
          Identifier "b" line 2
          Assign "=" line 2
          Number "2" line 2
          Semicolon ";" line 2
          Eof "" line 2
      "#]],
    );
  }

  #[test]
  fn unknown_characters_are_fatal_on_advance() {
    let mut tokenizer = Tokenizer::new("a $ b").unwrap();
    let err = tokenizer.advance().unwrap_err();
    assert_eq!(err.to_string(), "Error: Unexpected character '$' at line 1.");
  }

  #[test]
  fn lone_ampersand_is_an_error() {
    let mut tokenizer = Tokenizer::new("a & b").unwrap();
    let err = tokenizer.advance().unwrap_err();
    assert_eq!(err.to_string(), "Error: Unexpected character '&' at line 1.");
  }

  #[test]
  fn priming_fails_on_a_leading_bad_character() {
    let err = Tokenizer::new("\n\n$").unwrap_err();
    assert_eq!(err.to_string(), "Error: Unexpected character '$' at line 3.");
  }

  #[test]
  fn expect_reports_the_caller_message() {
    let mut tokenizer = Tokenizer::new("(1").unwrap();
    tokenizer.advance().unwrap();
    let err = tokenizer
      .expect(TokenKind::RParen, "Expected ')' after expression")
      .unwrap_err();
    assert_eq!(err.to_string(), "Error: Expected ')' after expression at line 1.");
  }

  #[test]
  fn advance_exposes_the_previous_token() {
    let mut tokenizer = Tokenizer::new("x = 1;").unwrap();
    assert_eq!(tokenizer.current().kind, TokenKind::Identifier);
    tokenizer.advance().unwrap();
    assert_eq!(tokenizer.previous().kind, TokenKind::Identifier);
    assert_eq!(tokenizer.current().kind, TokenKind::Assign);
  }
}
