//! Small literal language shared by expected strings and shell arguments
//!
//! Test cases and the vendor shell write values the way the rig engineers
//! type them: `28`, `[28,29]`, `[0]*5`, `'0'*64`, `'rc:' + '0'`. This module
//! evaluates that subset: integers, booleans, single- or double-quoted
//! strings, lists, `+ - * / %` and parentheses.

use std::fmt;

use crate::common::{Error, Result};

/// An evaluated literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::List(_) => "list",
        }
    }

    /// Quoted form used inside list rendering
    fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Str(String),
    Ident(String),
    Op(char),
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' => {
                let start = i;
                if c == '0' && matches!(chars.get(i + 1), Some('x') | Some('X')) {
                    i += 2;
                    let hex_start = i;
                    while i < chars.len() && chars[i].is_ascii_hexdigit() {
                        i += 1;
                    }
                    let digits: String = chars[hex_start..i].iter().collect();
                    let value = i64::from_str_radix(&digits, 16)
                        .map_err(|_| Error::Literal(format!("bad hex literal at {}", start)))?;
                    tokens.push(Token::Int(value));
                } else {
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    let digits: String = chars[start..i].iter().collect();
                    let value = digits
                        .parse()
                        .map_err(|_| Error::Literal(format!("integer too large: {}", digits)))?;
                    tokens.push(Token::Int(value));
                }
            }
            '\'' | '"' => {
                let quote = c;
                i += 1;
                let mut s = String::new();
                loop {
                    match chars.get(i) {
                        None => return Err(Error::Literal("unterminated string".to_string())),
                        Some('\\') => {
                            match chars.get(i + 1) {
                                Some('n') => s.push('\n'),
                                Some('t') => s.push('\t'),
                                Some('r') => s.push('\r'),
                                Some(other) => s.push(*other),
                                None => {
                                    return Err(Error::Literal("unterminated string".to_string()))
                                }
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            s.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            '+' | '-' | '*' | '/' | '%' | '(' | ')' | '[' | ']' | ',' => {
                // `//` is integer division, same as `/` here
                if c == '/' && chars.get(i + 1) == Some(&'/') {
                    i += 1;
                }
                tokens.push(Token::Op(c));
                i += 1;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(Error::Literal(format!("unexpected character '{}'", other)));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat_op(&mut self, op: char) -> bool {
        if self.peek() == Some(&Token::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Value> {
        let mut lhs = self.term()?;
        loop {
            if self.eat_op('+') {
                let rhs = self.term()?;
                lhs = add(lhs, rhs)?;
            } else if self.eat_op('-') {
                let rhs = self.term()?;
                lhs = arith(lhs, rhs, '-')?;
            } else {
                return Ok(lhs);
            }
        }
    }

    fn term(&mut self) -> Result<Value> {
        let mut lhs = self.unary()?;
        loop {
            if self.eat_op('*') {
                let rhs = self.unary()?;
                lhs = mul(lhs, rhs)?;
            } else if self.eat_op('/') {
                let rhs = self.unary()?;
                lhs = arith(lhs, rhs, '/')?;
            } else if self.eat_op('%') {
                let rhs = self.unary()?;
                lhs = arith(lhs, rhs, '%')?;
            } else {
                return Ok(lhs);
            }
        }
    }

    fn unary(&mut self) -> Result<Value> {
        if self.eat_op('-') {
            let v = self.unary()?;
            return match v.as_int() {
                Some(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| Error::Literal(format!("integer overflow in -{}", i))),
                None => Err(Error::Literal(format!("cannot negate {}", v.type_name()))),
            };
        }
        if self.eat_op('+') {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Value> {
        match self.next() {
            Some(Token::Int(i)) => Ok(Value::Int(i)),
            Some(Token::Str(s)) => {
                // adjacent string literals concatenate
                let mut s = s;
                while let Some(Token::Str(next)) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Value::Str(s))
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "True" | "true" => Ok(Value::Bool(true)),
                "False" | "false" => Ok(Value::Bool(false)),
                _ => Err(Error::Literal(format!("unknown name '{}'", name))),
            },
            Some(Token::Op('(')) => {
                let v = self.expr()?;
                if !self.eat_op(')') {
                    return Err(Error::Literal("expected ')'".to_string()));
                }
                Ok(v)
            }
            Some(Token::Op('[')) => {
                let mut items = Vec::new();
                if self.eat_op(']') {
                    return Ok(Value::List(items));
                }
                loop {
                    items.push(self.expr()?);
                    if self.eat_op(',') {
                        if self.eat_op(']') {
                            break;
                        }
                        continue;
                    }
                    if self.eat_op(']') {
                        break;
                    }
                    return Err(Error::Literal("expected ',' or ']'".to_string()));
                }
                Ok(Value::List(items))
            }
            Some(tok) => Err(Error::Literal(format!("unexpected token {:?}", tok))),
            None => Err(Error::Literal("unexpected end of input".to_string())),
        }
    }
}

fn add(lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Str(mut a), Value::Str(b)) => {
            a.push_str(&b);
            Ok(Value::Str(a))
        }
        (Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (a, b) => arith(a, b, '+'),
    }
}

/// Upper bound on the elements or bytes a repetition may produce
const MAX_REPEAT: usize = 1 << 20;

/// Repeat count for `len` items `n` times; negative counts give zero
fn repeat_count(len: usize, n: i64) -> Result<usize> {
    let times = usize::try_from(n).unwrap_or(0);
    match len.checked_mul(times) {
        Some(total) if total <= MAX_REPEAT => Ok(times),
        _ => Err(Error::Literal(format!(
            "repetition of {} item(s) {} times is too large",
            len, n
        ))),
    }
}

fn mul(lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Str(s), n) | (n, Value::Str(s)) if n.as_int().is_some() => {
            let times = repeat_count(s.len(), n.as_int().unwrap_or(0))?;
            Ok(Value::Str(s.repeat(times)))
        }
        (Value::List(items), n) | (n, Value::List(items)) if n.as_int().is_some() => {
            let times = repeat_count(items.len(), n.as_int().unwrap_or(0))?;
            let mut out = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                out.extend(items.iter().cloned());
            }
            Ok(Value::List(out))
        }
        (a, b) => arith(a, b, '*'),
    }
}

fn arith(lhs: Value, rhs: Value, op: char) -> Result<Value> {
    let (a, b) = match (lhs.as_int(), rhs.as_int()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(Error::Literal(format!(
                "unsupported operand types for {}: {} and {}",
                op,
                lhs.type_name(),
                rhs.type_name()
            )))
        }
    };
    let overflow = || Error::Literal(format!("integer overflow in {} {} {}", a, op, b));
    let value = match op {
        '+' => a.checked_add(b).ok_or_else(overflow)?,
        '-' => a.checked_sub(b).ok_or_else(overflow)?,
        '*' => a.checked_mul(b).ok_or_else(overflow)?,
        '/' | '%' if b == 0 => return Err(Error::Literal("division by zero".to_string())),
        '/' => a.div_euclid(b),
        '%' => a.rem_euclid(b),
        _ => return Err(Error::Internal(format!("unknown operator {}", op))),
    };
    Ok(Value::Int(value))
}

/// Evaluate one expression
pub fn eval(src: &str) -> Result<Value> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(Error::Literal("empty expression".to_string()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(Error::Literal(format!(
            "trailing input after expression in '{}'",
            src
        )));
    }
    Ok(value)
}

/// Evaluate an expected string after variable substitution
///
/// Text that is not an expression is kept verbatim.
pub fn eval_or_text(src: &str) -> String {
    match eval(src) {
        Ok(value) => value.to_string(),
        Err(_) => src.to_string(),
    }
}

/// Split a shell argument line into literal expressions and evaluate each
///
/// Arguments are separated by whitespace or commas outside brackets,
/// parentheses and quotes, so `[28, 29]` stays one argument.
pub fn eval_args(line: &str) -> Result<Vec<Value>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in line.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '[' | '(' => {
                depth += 1;
                current.push(c);
            }
            ']' | ')' => {
                depth -= 1;
                current.push(c);
            }
            c if (c.is_whitespace() || c == ',') && depth == 0 => {
                if !current.trim().is_empty() {
                    args.push(eval(&current)?);
                }
                current.clear();
            }
            c => current.push(c),
        }
    }

    if quote.is_some() {
        return Err(Error::Literal("unterminated string".to_string()));
    }
    if !current.trim().is_empty() {
        args.push(eval(&current)?);
    }
    Ok(args)
}
