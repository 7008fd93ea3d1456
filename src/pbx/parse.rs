use std::fmt;

use super::{Dict, Value};

#[derive(Debug, PartialEq)]
pub struct SyntaxError {
  pub line:    usize,
  pub message: String
}

impl fmt::Display for SyntaxError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{} at line {}", self.message, self.line)
  }
}

impl std::error::Error for SyntaxError {}

type Parsed<T> = Result<T, SyntaxError>;

/// Parses the text of a property list whose root is a dictionary.
pub fn parse(text: &str) -> Parsed<Dict> {
  let mut p = Parser { src: text.as_bytes(), text, pos: 0, line: 1 };
  p.skip_trivia()?;
  let root = match p.value()? {
    Value::Dict(d) => d,
    _              => return Err(p.error("Expected a dictionary at the root"))
  };
  p.skip_trivia()?;
  if p.pos < p.src.len() {
    return Err(p.error("Unexpected data after the root dictionary"));
  }
  Ok(root)
}

struct Parser<'a> {
  src:  &'a [u8],
  text: &'a str,
  pos:  usize,
  line: usize
}

fn is_bare_byte(b: u8) -> bool {
  b.is_ascii_alphanumeric() || b"_$+/:.-".contains(&b)
}

impl<'a> Parser<'a> {
  fn error<S: Into<String>>(&self, message: S) -> SyntaxError {
    SyntaxError { line: self.line, message: message.into() }
  }

  fn peek(&self) -> Option<u8> {
    self.src.get(self.pos).cloned()
  }

  fn bump(&mut self) {
    if self.src[self.pos] == b'\n' {
      self.line += 1;
    }
    self.pos += 1;
  }

  /// Skips whitespace and both comment styles.
  fn skip_trivia(&mut self) -> Parsed<()> {
    while let Some(b) = self.peek() {
      if b.is_ascii_whitespace() {
        self.bump();
      }
      else if self.src[self.pos ..].starts_with(b"//") {
        while let Some(b) = self.peek() {
          if b == b'\n' {break}
          self.bump();
        }
      }
      else if self.src[self.pos ..].starts_with(b"/*") {
        let line = self.line;
        self.bump();
        self.bump();
        loop {
          if self.pos >= self.src.len() {
            return Err(SyntaxError { line, message: "Unterminated comment".to_string() });
          }
          if self.src[self.pos ..].starts_with(b"*/") {
            self.bump();
            self.bump();
            break;
          }
          self.bump();
        }
      }
      else {
        break;
      }
    }
    Ok(())
  }

  fn expect(&mut self, c: u8) -> Parsed<()> {
    self.skip_trivia()?;
    match self.peek() {
      Some(b) if b == c => {
        self.bump();
        Ok(())
      },
      Some(b) => Err(self.error(format!("Expected '{}' but found '{}'", c as char, b as char))),
      None    => Err(self.error(format!("Expected '{}' but reached the end of file", c as char)))
    }
  }

  fn value(&mut self) -> Parsed<Value> {
    self.skip_trivia()?;
    match self.peek() {
      Some(b'{') => self.dict().map(Value::Dict),
      Some(b'(') => self.array().map(Value::Array),
      Some(_)    => self.token().map(Value::String),
      None       => Err(self.error("Expected a value but reached the end of file"))
    }
  }

  fn dict(&mut self) -> Parsed<Dict> {
    self.expect(b'{')?;
    let mut d = Dict::new();
    loop {
      self.skip_trivia()?;
      if self.peek() == Some(b'}') {
        self.bump();
        return Ok(d);
      }
      let key = self.token()?;
      self.expect(b'=')?;
      let value = self.value()?;
      self.expect(b';')?;
      d.insert(key, value);
    }
  }

  fn array(&mut self) -> Parsed<Vec<Value>> {
    self.expect(b'(')?;
    let mut v = Vec::new();
    loop {
      self.skip_trivia()?;
      if self.peek() == Some(b')') {
        self.bump();
        return Ok(v);
      }
      v.push(self.value()?);
      self.skip_trivia()?;
      match self.peek() {
        Some(b',') => self.bump(),
        Some(b')') => {},
        _          => return Err(self.error("Expected ',' or ')' in array"))
      }
    }
  }

  /// Reads a string or data token, returning it verbatim.
  fn token(&mut self) -> Parsed<String> {
    self.skip_trivia()?;
    let start = self.pos;
    match self.peek() {
      Some(q) if q == b'"' || q == b'\'' => {
        let line = self.line;
        self.bump();
        loop {
          match self.peek() {
            None                => return Err(SyntaxError {
              line, message: "Unterminated string".to_string()
            }),
            Some(b'\\')         => { self.bump(); if self.pos < self.src.len() { self.bump(); } },
            Some(b) if b == q   => { self.bump(); break; },
            Some(_)             => self.bump()
          }
        }
      },
      Some(b'<') => {
        while let Some(b) = self.peek() {
          self.bump();
          if b == b'>' {break}
        }
        if self.src[self.pos - 1] != b'>' {
          return Err(self.error("Unterminated data"));
        }
      },
      Some(b) if is_bare_byte(b) => {
        while let Some(b) = self.peek() {
          if !is_bare_byte(b) || self.src[self.pos ..].starts_with(b"//") ||
             self.src[self.pos ..].starts_with(b"/*") {
            break;
          }
          self.bump();
        }
      },
      Some(b) => return Err(self.error(format!("Unexpected character '{}'", b as char))),
      None    => return Err(self.error("Expected a string but reached the end of file"))
    }
    Ok(self.text[start .. self.pos].to_string())
  }
}
