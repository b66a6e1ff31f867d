//! A small CEL-like boolean/list expression language, used by `if:`,
//! `values_from`, and input/global validation rules.
//!
//! This is deliberately a different engine from [`crate::template_string`]:
//! one evaluates booleans and lists for control flow, the other produces
//! strings for interpolation. Both reject references to undefined
//! variables, but `gotmpl` surfaces that as part of template rendering
//! while this module surfaces it directly as [`Error::UnknownVar`] so
//! callers can tell the two failure modes apart.

use crate::errors::{Error, Result};
use crate::scope::Scope;

#[cfg(test)]
#[path = "expr_tests.rs"]
mod tests;

/// A value produced while evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

/// Evaluates `src` against `scope` and requires the result to be a bool
/// (used for `if:` gates and validation rules).
pub fn eval_bool(src: &str, scope: &Scope) -> Result<bool> {
    match eval(src, scope)? {
        Value::Bool(b) => Ok(b),
        other => Err(Error::SpecParse(format!(
            "expression `{src}` did not evaluate to a boolean (got {other:?})"
        ))),
    }
}

/// Evaluates `src` against `scope` and requires the result to be a list of
/// strings (used for `values_from`).
pub fn eval_list(src: &str, scope: &Scope) -> Result<Vec<String>> {
    match eval(src, scope)? {
        Value::List(items) => Ok(items),
        other => Err(Error::SpecParse(format!(
            "expression `{src}` did not evaluate to a list (got {other:?})"
        ))),
    }
}

/// Evaluates `src` against `scope`, returning whatever [`Value`] it
/// produces.
pub fn eval(src: &str, scope: &Scope) -> Result<Value> {
    let tokens = lex(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.parse_or(scope)?;
    if parser.pos != parser.tokens.len() {
        return Err(Error::SpecParse(format!(
            "unexpected trailing tokens in expression `{src}`"
        )));
    }
    Ok(value)
}

// ----------------------------------------------------------------------
// Lexer
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Int(i64),
    Sym(&'static str),
}

fn lex(src: &str) -> Result<Vec<Tok>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '"' {
            let mut j = i + 1;
            let mut s = String::new();
            loop {
                if j >= chars.len() {
                    return Err(Error::SpecParse(format!("unterminated string in `{src}`")));
                }
                match chars[j] {
                    '"' => {
                        j += 1;
                        break;
                    }
                    '\\' if j + 1 < chars.len() => {
                        s.push(chars[j + 1]);
                        j += 2;
                    }
                    c => {
                        s.push(c);
                        j += 1;
                    }
                }
            }
            tokens.push(Tok::Str(s));
            i = j;
            continue;
        }
        if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()))
        {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text
                .parse::<i64>()
                .map_err(|_| Error::SpecParse(format!("invalid integer literal `{text}`")))?;
            tokens.push(Tok::Int(n));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(Tok::Ident(text));
            continue;
        }
        let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        let sym = match two.as_str() {
            "&&" => Some("&&"),
            "||" => Some("||"),
            "==" => Some("=="),
            "!=" => Some("!="),
            "<=" => Some("<="),
            ">=" => Some(">="),
            _ => None,
        };
        if let Some(s) = sym {
            tokens.push(Tok::Sym(s));
            i += 2;
            continue;
        }
        let sym = match c {
            '(' => "(",
            ')' => ")",
            '[' => "[",
            ']' => "]",
            ',' => ",",
            '.' => ".",
            '!' => "!",
            '<' => "<",
            '>' => ">",
            other => {
                return Err(Error::SpecParse(format!(
                    "unexpected character `{other}` in expression `{src}`"
                )))
            }
        };
        tokens.push(Tok::Sym(sym));
        i += 1;
    }
    Ok(tokens)
}

// ----------------------------------------------------------------------
// Parser (recursive descent, one level per precedence tier)
// ----------------------------------------------------------------------

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat_sym(&mut self, sym: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Sym(s)) if *s == sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_sym(&mut self, sym: &str) -> Result<()> {
        if self.eat_sym(sym) {
            Ok(())
        } else {
            Err(Error::SpecParse(format!("expected `{sym}`")))
        }
    }

    fn parse_or(&mut self, scope: &Scope) -> Result<Value> {
        let mut left = self.parse_and(scope)?;
        while self.eat_sym("||") {
            let right = self.parse_and(scope)?;
            left = Value::Bool(as_bool(&left)? || as_bool(&right)?);
        }
        Ok(left)
    }

    fn parse_and(&mut self, scope: &Scope) -> Result<Value> {
        let mut left = self.parse_eq(scope)?;
        while self.eat_sym("&&") {
            let right = self.parse_eq(scope)?;
            left = Value::Bool(as_bool(&left)? && as_bool(&right)?);
        }
        Ok(left)
    }

    fn parse_eq(&mut self, scope: &Scope) -> Result<Value> {
        let left = self.parse_rel(scope)?;
        if self.eat_sym("==") {
            let right = self.parse_rel(scope)?;
            return Ok(Value::Bool(left == right));
        }
        if self.eat_sym("!=") {
            let right = self.parse_rel(scope)?;
            return Ok(Value::Bool(left != right));
        }
        Ok(left)
    }

    fn parse_rel(&mut self, scope: &Scope) -> Result<Value> {
        let left = self.parse_in(scope)?;
        for sym in ["<=", ">=", "<", ">"] {
            if self.eat_sym(sym) {
                let right = self.parse_in(scope)?;
                let (l, r) = (as_int(&left)?, as_int(&right)?);
                let b = match sym {
                    "<=" => l <= r,
                    ">=" => l >= r,
                    "<" => l < r,
                    ">" => l > r,
                    _ => unreachable!(),
                };
                return Ok(Value::Bool(b));
            }
        }
        Ok(left)
    }

    fn parse_in(&mut self, scope: &Scope) -> Result<Value> {
        let left = self.parse_unary(scope)?;
        if matches!(self.peek(), Some(Tok::Ident(i)) if i == "in") {
            self.bump();
            let right = self.parse_unary(scope)?;
            let contained = match (&left, &right) {
                (Value::Str(s), Value::List(items)) => items.contains(s),
                (Value::Str(s), Value::Str(full)) => full.contains(s.as_str()),
                _ => {
                    return Err(Error::SpecParse(
                        "`in` requires a string on the left and a string or list on the right"
                            .to_string(),
                    ))
                }
            };
            return Ok(Value::Bool(contained));
        }
        Ok(left)
    }

    fn parse_unary(&mut self, scope: &Scope) -> Result<Value> {
        if self.eat_sym("!") {
            let v = self.parse_unary(scope)?;
            return Ok(Value::Bool(!as_bool(&v)?));
        }
        self.parse_postfix(scope)
    }

    fn parse_postfix(&mut self, scope: &Scope) -> Result<Value> {
        let mut value = self.parse_primary(scope)?;
        while self.eat_sym(".") {
            let method = match self.bump() {
                Some(Tok::Ident(name)) => name,
                _ => return Err(Error::SpecParse("expected method name after `.`".to_string())),
            };
            self.expect_sym("(")?;
            let mut args = Vec::new();
            if !matches!(self.peek(), Some(Tok::Sym(")"))) {
                loop {
                    args.push(self.parse_or(scope)?);
                    if !self.eat_sym(",") {
                        break;
                    }
                }
            }
            self.expect_sym(")")?;
            value = call_method(&value, &method, args)?;
        }
        Ok(value)
    }

    fn parse_primary(&mut self, scope: &Scope) -> Result<Value> {
        match self.bump() {
            Some(Tok::Str(s)) => Ok(Value::Str(s)),
            Some(Tok::Int(n)) => Ok(Value::Int(n)),
            Some(Tok::Sym("(")) => {
                let v = self.parse_or(scope)?;
                self.expect_sym(")")?;
                Ok(v)
            }
            Some(Tok::Sym("[")) => {
                let mut items = Vec::new();
                if !matches!(self.peek(), Some(Tok::Sym("]"))) {
                    loop {
                        match self.parse_or(scope)? {
                            Value::Str(s) => items.push(s),
                            other => {
                                return Err(Error::SpecParse(format!(
                                    "list literals may only contain strings, found {other:?}"
                                )))
                            }
                        }
                        if !self.eat_sym(",") {
                            break;
                        }
                    }
                }
                self.expect_sym("]")?;
                Ok(Value::List(items))
            }
            Some(Tok::Ident(name)) => {
                if name == "true" {
                    return Ok(Value::Bool(true));
                }
                if name == "false" {
                    return Ok(Value::Bool(false));
                }
                if matches!(self.peek(), Some(Tok::Sym("("))) {
                    self.bump();
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Some(Tok::Sym(")"))) {
                        loop {
                            args.push(self.parse_or(scope)?);
                            if !self.eat_sym(",") {
                                break;
                            }
                        }
                    }
                    self.expect_sym(")")?;
                    return call_function(&name, args);
                }
                let val = scope.get(&name).ok_or_else(|| Error::UnknownVar(name.clone()))?;
                Ok(Value::Str(val.to_string()))
            }
            other => Err(Error::SpecParse(format!("unexpected token {other:?}"))),
        }
    }
}

fn as_bool(v: &Value) -> Result<bool> {
    match v {
        Value::Bool(b) => Ok(*b),
        other => Err(Error::SpecParse(format!("expected boolean, found {other:?}"))),
    }
}

fn as_int(v: &Value) -> Result<i64> {
    match v {
        Value::Int(n) => Ok(*n),
        Value::Str(s) => s
            .parse::<i64>()
            .map_err(|_| Error::SpecParse(format!("expected integer, found string `{s}`"))),
        other => Err(Error::SpecParse(format!("expected integer, found {other:?}"))),
    }
}

fn call_function(name: &str, mut args: Vec<Value>) -> Result<Value> {
    match name {
        "bool" => {
            if args.len() != 1 {
                return Err(Error::SpecParse("bool() takes exactly one argument".to_string()));
            }
            let coerced = match args.remove(0) {
                Value::Bool(b) => b,
                Value::Str(s) => match s.as_str() {
                    "true" => true,
                    "false" | "" => false,
                    other => {
                        return Err(Error::SpecParse(format!(
                            "bool(): cannot coerce `{other}` to a boolean"
                        )))
                    }
                },
                Value::Int(n) => n != 0,
                Value::List(items) => !items.is_empty(),
            };
            Ok(Value::Bool(coerced))
        }
        other => Err(Error::SpecParse(format!("unknown function `{other}`"))),
    }
}

fn call_method(receiver: &Value, method: &str, args: Vec<Value>) -> Result<Value> {
    match (receiver, method) {
        (Value::Str(s), "split") => {
            if args.len() != 1 {
                return Err(Error::SpecParse("split() takes exactly one argument".to_string()));
            }
            let sep = match &args[0] {
                Value::Str(s) => s.clone(),
                other => {
                    return Err(Error::SpecParse(format!(
                        "split() separator must be a string, found {other:?}"
                    )))
                }
            };
            let items = if sep.is_empty() {
                vec![s.clone()]
            } else {
                s.split(sep.as_str()).map(str::to_string).collect()
            };
            Ok(Value::List(items))
        }
        (Value::Str(s), "contains") => {
            if args.len() != 1 {
                return Err(Error::SpecParse("contains() takes exactly one argument".to_string()));
            }
            let needle = match &args[0] {
                Value::Str(s) => s.clone(),
                other => {
                    return Err(Error::SpecParse(format!(
                        "contains() argument must be a string, found {other:?}"
                    )))
                }
            };
            Ok(Value::Bool(s.contains(needle.as_str())))
        }
        (Value::List(items), "contains") => {
            if args.len() != 1 {
                return Err(Error::SpecParse("contains() takes exactly one argument".to_string()));
            }
            let needle = match &args[0] {
                Value::Str(s) => s.clone(),
                other => {
                    return Err(Error::SpecParse(format!(
                        "contains() argument must be a string, found {other:?}"
                    )))
                }
            };
            Ok(Value::Bool(items.contains(&needle)))
        }
        (receiver, other) => Err(Error::SpecParse(format!(
            "no method `{other}` on {receiver:?}"
        ))),
    }
}
