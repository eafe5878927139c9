//! Narrow literal parser for the right-hand side of embedded script statements.
//!
//! Only data is recognized: strings, numbers, booleans, `null`/`undefined`, object
//! and array literals, plus the handful of operators pages wrap their data in:
//! `'1' * 1` coercion, `a || b` fallback, `!0`, parentheses, `.slice(a, b)` and
//! `JsDecode(str)`. A dotted identifier such as `window.some_flag` is an
//! unresolved reference and evaluates to `null`. Everything else is rejected.

use crate::error::LiteralError;
use crate::utils::decode_html_entities;
use serde_json::{Map, Number, Value};

/// Maximum nesting of arrays/objects/parentheses/prefix operators
const MAX_DEPTH: usize = 64;

/// Parse `src` as a single expression, allowing a trailing `;`
pub fn parse_value(src: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser::new(src);
    let value = parser.expression()?;
    parser.skip_trivia();
    if parser.peek() == Some(';') {
        parser.bump();
        parser.skip_trivia();
    }
    match parser.peek() {
        None => Ok(value),
        Some(found) => Err(LiteralError::UnexpectedChar {
            found,
            offset: parser.pos,
        }),
    }
}

/// Parse one expression at the start of `src`; returns it with the bytes consumed
pub fn parse_prefix(src: &str) -> Result<(Value, usize), LiteralError> {
    let mut parser = Parser::new(src);
    let value = parser.expression()?;
    Ok((value, parser.pos))
}

/// JavaScript truthiness of a parsed value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
                i64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN)
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0, depth: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn end_error(&self) -> LiteralError {
        LiteralError::UnexpectedEnd { offset: self.pos }
    }

    fn unexpected(&self) -> LiteralError {
        match self.peek() {
            Some(found) => LiteralError::UnexpectedChar {
                found,
                offset: self.pos,
            },
            None => self.end_error(),
        }
    }

    fn unsupported(&self, what: impl Into<String>, offset: usize) -> LiteralError {
        LiteralError::Unsupported {
            what: what.into(),
            offset,
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        self.skip_trivia();
        if self.peek() == Some(expected) {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if trimmed.starts_with("//") {
                let end = trimmed.find('\n').unwrap_or(trimmed.len());
                self.pos += end;
            } else if trimmed.starts_with("/*") {
                match trimmed[2..].find("*/") {
                    Some(end) => self.pos += end + 4,
                    None => self.pos = self.src.len(),
                }
            } else {
                return;
            }
        }
    }

    fn enter(&mut self) -> Result<(), LiteralError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.unsupported("nesting too deep", self.pos));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expression(&mut self) -> Result<Value, LiteralError> {
        let mut value = self.product()?;
        loop {
            self.skip_trivia();
            if self.rest().starts_with("||") {
                self.pos += 2;
                let right = self.product()?;
                if !is_truthy(&value) {
                    value = right;
                }
            } else {
                return Ok(value);
            }
        }
    }

    fn product(&mut self) -> Result<Value, LiteralError> {
        let mut value = self.unary()?;
        loop {
            self.skip_trivia();
            if self.peek() == Some('*') && self.peek_second() != Some('=') {
                self.bump();
                let right = self.unary()?;
                value = number_value(to_number(&value) * to_number(&right));
            } else {
                return Ok(value);
            }
        }
    }

    fn unary(&mut self) -> Result<Value, LiteralError> {
        self.skip_trivia();
        match self.peek() {
            Some('!') if self.peek_second() != Some('=') => {
                self.bump();
                self.enter()?;
                let operand = self.unary()?;
                self.leave();
                Ok(Value::Bool(!is_truthy(&operand)))
            }
            Some('-') | Some('+') => {
                let negative = self.bump() == Some('-');
                self.enter()?;
                let operand = self.unary()?;
                self.leave();
                let n = to_number(&operand);
                Ok(number_value(if negative { -n } else { n }))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Value, LiteralError> {
        let mut value = self.primary()?;
        loop {
            self.skip_trivia();
            let start = self.pos;
            if self.rest().starts_with(".slice") {
                self.pos += ".slice".len();
                let args = self.call_arguments()?;
                value = slice(value, &args).ok_or_else(|| self.unsupported("slice of non-sequence", start))?;
            } else if self.peek() == Some('.') || self.peek() == Some('[') || self.peek() == Some('(') {
                return Err(self.unsupported("member access or call", start));
            } else {
                return Ok(value);
            }
        }
    }

    fn call_arguments(&mut self) -> Result<Vec<Value>, LiteralError> {
        self.expect('(')?;
        self.enter()?;
        let mut args = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek() == Some(')') {
                self.bump();
                break;
            }
            args.push(self.expression()?);
            self.skip_trivia();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(')') => {
                    self.bump();
                    break;
                }
                _ => return Err(self.unexpected()),
            }
        }
        self.leave();
        Ok(args)
    }

    fn primary(&mut self) -> Result<Value, LiteralError> {
        self.skip_trivia();
        let Some(c) = self.peek() else {
            return Err(self.end_error());
        };
        match c {
            '\'' | '"' | '`' => self.string(c).map(Value::String),
            '0'..='9' | '.' => self.number(),
            '{' => self.object(),
            '[' => self.array(),
            '(' => {
                self.bump();
                self.enter()?;
                let value = self.expression()?;
                self.expect(')')?;
                self.leave();
                Ok(value)
            }
            c if is_ident_start(c) => self.identifier_expression(),
            _ => Err(self.unexpected()),
        }
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.bump();
            } else {
                break;
            }
        }
        &self.src[start..self.pos]
    }

    fn identifier_expression(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let name = self.identifier();
        match name {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "null" | "undefined" => return Ok(Value::Null),
            "NaN" => return Ok(Value::Null),
            "JsDecode" => {
                let args = self.call_arguments()?;
                return match args.first() {
                    Some(Value::String(s)) => Ok(Value::String(decode_html_entities(s))),
                    Some(other) => Ok(other.clone()),
                    None => Ok(Value::Null),
                };
            }
            "new" | "function" | "typeof" | "void" | "delete" => {
                return Err(self.unsupported(name, start));
            }
            _ => {}
        }

        // Dotted reference path; `.slice(` is left for the postfix loop
        loop {
            let rest = self.rest();
            if rest.starts_with('.') && !rest.starts_with(".slice") {
                let mut chars = rest[1..].chars();
                if chars.next().is_some_and(is_ident_start) {
                    self.bump();
                    self.identifier();
                    continue;
                }
            }
            break;
        }
        self.skip_trivia();
        if self.peek() == Some('(') {
            return Err(self.unsupported(format!("call of {}", &self.src[start..self.pos].trim_end()), start));
        }
        Ok(Value::Null)
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let rest = self.rest();
        if rest.starts_with("0x") || rest.starts_with("0X") {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let digits = &self.src[digits_start..self.pos];
            return i64::from_str_radix(digits, 16)
                .map(Value::from)
                .map_err(|_| self.unsupported("hex literal", start));
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let save = self.pos;
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.bump();
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            } else {
                self.pos = save;
            }
        }
        let text = &self.src[start..self.pos];
        if text.is_empty() || text == "." {
            return Err(self.unexpected());
        }
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::from(n));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| self.unsupported("number literal", start))
    }

    fn string(&mut self, quote: char) -> Result<String, LiteralError> {
        self.bump();
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.end_error());
            };
            match c {
                c if c == quote => return Ok(out),
                '$' if quote == '`' && self.peek() == Some('{') => {
                    return Err(self.unsupported("template interpolation", self.pos - 1));
                }
                '\n' if quote != '`' => {
                    return Err(LiteralError::UnexpectedChar {
                        found: '\n',
                        offset: self.pos - 1,
                    });
                }
                '\\' => self.escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let Some(c) = self.bump() else {
            return Err(self.end_error());
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !self.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
            'x' => {
                let code = self.hex_digits(2)?;
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            'u' => {
                let code = if self.peek() == Some('{') {
                    self.bump();
                    let start = self.pos;
                    while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                        self.bump();
                    }
                    let code = u32::from_str_radix(&self.src[start..self.pos], 16)
                        .map_err(|_| self.unexpected())?;
                    self.expect('}')?;
                    code
                } else {
                    let high = self.hex_digits(4)?;
                    if (0xD800..0xDC00).contains(&high) && self.rest().starts_with("\\u") {
                        let save = self.pos;
                        self.pos += 2;
                        let low = self.hex_digits(4)?;
                        if (0xDC00..0xE000).contains(&low) {
                            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                        } else {
                            self.pos = save;
                            high
                        }
                    } else {
                        high
                    }
                };
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            // Line continuation
            '\n' => {}
            '\r' => {
                if self.peek() == Some('\n') {
                    self.bump();
                }
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, LiteralError> {
        let start = self.pos;
        for _ in 0..count {
            match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    self.bump();
                }
                _ => return Err(self.unexpected()),
            }
        }
        u32::from_str_radix(&self.src[start..self.pos], 16).map_err(|_| self.unexpected())
    }

    fn array(&mut self) -> Result<Value, LiteralError> {
        self.bump();
        self.enter()?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(']') => {
                    self.bump();
                    break;
                }
                // Hole
                Some(',') => {
                    self.bump();
                    items.push(Value::Null);
                    continue;
                }
                None => return Err(self.end_error()),
                _ => {}
            }
            items.push(self.expression()?);
            self.skip_trivia();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {
                    self.bump();
                    break;
                }
                _ => return Err(self.unexpected()),
            }
        }
        self.leave();
        Ok(Value::Array(items))
    }

    fn object(&mut self) -> Result<Value, LiteralError> {
        self.bump();
        self.enter()?;
        let mut map = Map::new();
        loop {
            self.skip_trivia();
            let key = match self.peek() {
                Some('}') => {
                    self.bump();
                    break;
                }
                Some(q @ ('\'' | '"')) => self.string(q)?,
                Some(c) if c.is_ascii_digit() => match self.number()? {
                    Value::Number(n) => n.to_string(),
                    _ => return Err(self.unexpected()),
                },
                Some(c) if is_ident_start(c) => self.identifier().to_string(),
                None => return Err(self.end_error()),
                _ => return Err(self.unexpected()),
            };
            self.expect(':')?;
            let value = self.expression()?;
            map.insert(key, value);
            self.skip_trivia();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {
                    self.bump();
                    break;
                }
                _ => return Err(self.unexpected()),
            }
        }
        self.leave();
        Ok(Value::Object(map))
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/// `Array.prototype.slice` / `String.prototype.slice`; `None` for other values
fn slice(value: Value, args: &[Value]) -> Option<Value> {
    let bound = |arg: Option<&Value>, len: usize, default: usize| -> usize {
        let Some(arg) = arg.filter(|a| !a.is_null()) else {
            return default;
        };
        let n = to_number(arg);
        if n.is_nan() {
            return 0;
        }
        let n = n.trunc();
        if n < 0.0 {
            (len as f64 + n).max(0.0) as usize
        } else {
            (n as usize).min(len)
        }
    };
    match value {
        Value::Array(items) => {
            let len = items.len();
            let start = bound(args.first(), len, 0);
            let end = bound(args.get(1), len, len);
            Some(Value::Array(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            }))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len();
            let start = bound(args.first(), len, 0);
            let end = bound(args.get(1), len, len);
            Some(Value::String(if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            }))
        }
        _ => None,
    }
}
