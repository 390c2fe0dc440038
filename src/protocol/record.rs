//! Parser for GDB/MI output records.
//!
//! Handles the subset of the MI output grammar the supervisor reads:
//!
//! ```text
//! record  = [token] ( "^" | "*" | "+" | "=" ) class ( "," result )*
//! result  = variable "=" value
//! value   = c-string | tuple | list
//! tuple   = "{}" | "{" result ( "," result )* "}"
//! list    = "[]" | "[" value ( "," value )* "]" | "[" result ( "," result )* "]"
//! ```
//!
//! Stream records (`~`, `@`, `&`) and the idle prompt are not records in this
//! sense and are rejected by [`Record::parse`].

use crate::{GdbError, Result};

/// Which kind of out-of-band or result record a line carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// `^`: the result of the last command.
    Result,
    /// `*`: asynchronous execution state change.
    ExecAsync,
    /// `+`: asynchronous progress.
    StatusAsync,
    /// `=`: asynchronous notification.
    NotifyAsync,
}

/// A parsed MI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A c-string constant, unescaped.
    Const(String),
    /// `{key=value,...}`.
    Tuple(Vec<(String, Value)>),
    /// `[value,...]`.
    List(Vec<Value>),
    /// `[key=value,...]`.
    ResultList(Vec<(String, Value)>),
}

impl Value {
    /// The constant text, if this is a constant.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Const(text) => Some(text),
            _ => None,
        }
    }

    /// First field named `key` in a tuple or result list.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Tuple(fields) | Self::ResultList(fields) => lookup(fields, key),
            _ => None,
        }
    }
}

/// One parsed output record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Numeric token echoed from the command, if any.
    pub token: Option<u64>,
    /// Record kind.
    pub kind: RecordKind,
    /// Result or async class (`done`, `error`, `stopped`, ...).
    pub class: String,
    /// Top-level `key=value` pairs.
    pub results: Vec<(String, Value)>,
}

impl Record {
    /// Parse a single output line.
    ///
    /// # Errors
    ///
    /// Returns [`GdbError::MalformedReply`] naming the byte offset where the
    /// line stopped matching the grammar.
    pub fn parse(line: &str) -> Result<Self> {
        Parser::new(line).record()
    }

    /// First top-level field named `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        lookup(&self.results, key)
    }

    /// Whether this is a `^error` result record.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == RecordKind::Result && self.class == "error"
    }

    /// The `msg` field of an error record, or an empty string.
    #[must_use]
    pub fn error_message(&self) -> &str {
        self.get("msg").and_then(Value::as_str).unwrap_or_default()
    }
}

fn lookup<'a>(fields: &'a [(String, Value)], key: &str) -> Option<&'a Value> {
    fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.trim_end(),
            pos: 0,
        }
    }

    fn record(mut self) -> Result<Record> {
        let token = self.token()?;
        let kind = match self.bump() {
            Some('^') => RecordKind::Result,
            Some('*') => RecordKind::ExecAsync,
            Some('+') => RecordKind::StatusAsync,
            Some('=') => RecordKind::NotifyAsync,
            _ => return Err(self.error("expected one of ^ * + =")),
        };
        let class = self.identifier()?;
        let mut results = Vec::new();
        while self.eat(',') {
            results.push(self.result()?);
        }
        if self.pos != self.src.len() {
            return Err(self.error("trailing characters"));
        }
        Ok(Record {
            token,
            kind,
            class,
            results,
        })
    }

    fn token(&mut self) -> Result<Option<u64>> {
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Ok(None);
        }
        digits
            .parse()
            .map(Some)
            .map_err(|_| self.error("token out of range"))
    }

    fn result(&mut self) -> Result<(String, Value)> {
        let key = self.identifier()?;
        if !self.eat('=') {
            return Err(self.error("expected '='"));
        }
        Ok((key, self.value()?))
    }

    fn value(&mut self) -> Result<Value> {
        match self.peek() {
            Some('"') => self.c_string().map(Value::Const),
            Some('{') => self.tuple(),
            Some('[') => self.list(),
            _ => Err(self.error("expected a value")),
        }
    }

    fn tuple(&mut self) -> Result<Value> {
        self.bump();
        let mut fields = Vec::new();
        if self.eat('}') {
            return Ok(Value::Tuple(fields));
        }
        loop {
            fields.push(self.result()?);
            if self.eat('}') {
                return Ok(Value::Tuple(fields));
            }
            if !self.eat(',') {
                return Err(self.error("expected ',' or '}'"));
            }
        }
    }

    fn list(&mut self) -> Result<Value> {
        self.bump();
        if self.eat(']') {
            return Ok(Value::List(Vec::new()));
        }
        if matches!(self.peek(), Some('"' | '{' | '[')) {
            let mut items = Vec::new();
            loop {
                items.push(self.value()?);
                if self.eat(']') {
                    return Ok(Value::List(items));
                }
                if !self.eat(',') {
                    return Err(self.error("expected ',' or ']'"));
                }
            }
        }
        let mut fields = Vec::new();
        loop {
            fields.push(self.result()?);
            if self.eat(']') {
                return Ok(Value::ResultList(fields));
            }
            if !self.eat(',') {
                return Err(self.error("expected ',' or ']'"));
            }
        }
    }

    /// Octal escapes are raw bytes, so a multi-byte character arrives as
    /// several of them; the bytes are decoded as UTF-8 once the string ends.
    fn c_string(&mut self) -> Result<String> {
        self.bump();
        let mut out = Vec::new();
        let mut buf = [0; 4];
        loop {
            let c = match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(String::from_utf8_lossy(&out).into_owned()),
                Some('\\') => match self.bump() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some(d @ '0'..='7') => {
                        let mut code = d.to_digit(8).unwrap_or_default();
                        for _ in 0..2 {
                            match self.peek().and_then(|c| c.to_digit(8)) {
                                Some(next) => {
                                    code = code * 8 + next;
                                    self.bump();
                                }
                                None => break,
                            }
                        }
                        let byte = u8::try_from(code)
                            .map_err(|_| self.error("octal escape out of range"))?;
                        out.push(byte);
                        continue;
                    }
                    Some(other) => other,
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) => c,
            };
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }

    fn identifier(&mut self) -> Result<String> {
        let ident = self.take_while(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if ident.is_empty() {
            return Err(self.error("expected an identifier"));
        }
        Ok(ident.to_owned())
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let src: &'a str = self.src;
        let rest = &src[self.pos..];
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn error(&self, what: &str) -> GdbError {
        GdbError::MalformedReply(format!("{what} at byte {} in {:?}", self.pos, self.src))
    }
}
