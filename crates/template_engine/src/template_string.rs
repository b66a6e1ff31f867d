//! The `gotmpl` string-template mini-language.
//!
//! Produces a string from a template source by interpolating `{{.name}}`
//! variable references against the current [`Scope`], with a fixed,
//! feature-gated set of pipeline functions (`{{ .name | toUpper }}`) and a
//! single control structure, `{{if COND}}...{{else}}...{{end}}`, for
//! conditionally including literal text.
//!
//! This is a small, purpose-built language, not a Go `text/template`
//! reimplementation: the function set and pipeline syntax are exactly what
//! `spec.md` enumerates, nothing more.

use std::collections::HashMap;

use crate::errors::{Error, Result};
use crate::scope::Scope;

#[cfg(test)]
#[path = "template_string_tests.rs"]
mod tests;

/// Feature gates that change which functions are available, derived from
/// the spec's `api_version`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateFeatures {
    pub skip_time: bool,
}

/// A runtime value produced while evaluating a pipeline stage.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    List(Vec<String>),
}

impl Value {
    fn render(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::List(items) => items.join(","),
        }
    }

    fn as_str(&self) -> String {
        self.render()
    }

    fn is_truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty() && s != "false",
            Value::List(items) => !items.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
enum Term {
    Var(String),
    Str(String),
    Int(i64),
    Call(Box<Call>),
}

#[derive(Debug, Clone)]
struct Call {
    func: String,
    args: Vec<Term>,
}

#[derive(Debug, Clone)]
struct Pipeline {
    stages: Vec<Term>,
}

/// Renders `template` against `scope`, honoring `features`.
pub fn render(template: &str, scope: &Scope, features: TemplateFeatures) -> Result<String> {
    let mut out = String::new();
    render_block(template, scope, features, &mut out)?;
    Ok(out)
}

/// Renders the token stream of `template`, handling `{{if}}/{{else}}/{{end}}`
/// blocks recursively; plain text and `{{ expr }}` tags are handled inline.
fn render_block(
    template: &str,
    scope: &Scope,
    features: TemplateFeatures,
    out: &mut String,
) -> Result<()> {
    let tokens = tokenize(template)?;
    let mut i = 0;
    render_tokens(&tokens, &mut i, scope, features, out, true)?;
    Ok(())
}

#[derive(Debug, Clone)]
enum Token {
    Text(String),
    Action(String),
}

fn tokenize(template: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = template;
    loop {
        match rest.find("{{") {
            None => {
                if !rest.is_empty() {
                    tokens.push(Token::Text(rest.to_string()));
                }
                break;
            }
            Some(start) => {
                if start > 0 {
                    tokens.push(Token::Text(rest[..start].to_string()));
                }
                let after_open = &rest[start + 2..];
                let end = after_open.find("}}").ok_or_else(|| {
                    Error::SpecParse("unterminated {{ action in template".to_string())
                })?;
                tokens.push(Token::Action(after_open[..end].trim().to_string()));
                rest = &after_open[end + 2..];
            }
        }
    }
    Ok(tokens)
}

/// Executes tokens starting at `*i`, writing rendered text to `out` only if
/// `active` is true (used to skip the untaken branch of an `if` while still
/// consuming its tokens, so nested `{{end}}` matching stays correct).
fn render_tokens(
    tokens: &[Token],
    i: &mut usize,
    scope: &Scope,
    features: TemplateFeatures,
    out: &mut String,
    active: bool,
) -> Result<()> {
    while *i < tokens.len() {
        match &tokens[*i] {
            Token::Text(text) => {
                if active {
                    out.push_str(text);
                }
                *i += 1;
            }
            Token::Action(action) => {
                let trimmed = action.trim();
                if trimmed == "end" {
                    *i += 1;
                    return Ok(());
                }
                if trimmed == "else" {
                    *i += 1;
                    return Ok(());
                }
                if let Some(cond_src) = trimmed.strip_prefix("if ") {
                    *i += 1;
                    let cond = if active {
                        eval_pipeline(&parse_pipeline(cond_src)?, scope, features)?.is_truthy()
                    } else {
                        false
                    };
                    render_tokens(tokens, i, scope, features, out, active && cond)?;
                    // `render_tokens` above stopped at `else` or `end`.
                    let consumed_else = *i > 0
                        && matches!(
                            tokens.get(*i - 1),
                            Some(Token::Action(a)) if a.trim() == "else"
                        );
                    if consumed_else {
                        render_tokens(tokens, i, scope, features, out, active && !cond)?;
                    }
                    continue;
                }

                if active {
                    let pipeline = parse_pipeline(trimmed)?;
                    let value = eval_pipeline(&pipeline, scope, features)?;
                    out.push_str(&value.as_str());
                }
                *i += 1;
            }
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Parsing
// ----------------------------------------------------------------------

fn parse_pipeline(src: &str) -> Result<Pipeline> {
    let mut stages = Vec::new();
    for (idx, stage_src) in split_top_level(src, '|').into_iter().enumerate() {
        let stage_src = stage_src.trim();
        if stage_src.is_empty() {
            return Err(Error::SpecParse(format!("empty pipeline stage in `{src}`")));
        }
        let term = if idx == 0 {
            parse_term_chain(stage_src)?
        } else {
            parse_call_missing_last_arg(stage_src)?
        };
        stages.push(term);
    }
    if stages.is_empty() {
        return Err(Error::SpecParse("empty template action".to_string()));
    }
    Ok(Pipeline { stages })
}

/// Splits `src` on `sep` at paren-depth 0 and outside quotes.
fn split_top_level(src: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_str = false;
    let mut current = String::new();
    let mut chars = src.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if !in_str => {
                in_str = true;
                current.push(c);
            }
            '"' if in_str => {
                in_str = false;
                current.push(c);
            }
            '\\' if in_str => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '(' if !in_str => {
                depth += 1;
                current.push(c);
            }
            ')' if !in_str => {
                depth -= 1;
                current.push(c);
            }
            c if c == sep && depth == 0 && !in_str => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Parses `.var`, a literal, a parenthesized call, or `funcName arg...`.
fn parse_term_chain(src: &str) -> Result<Term> {
    let src = src.trim();
    if src.is_empty() {
        return Err(Error::SpecParse("empty expression".to_string()));
    }
    if let Some(rest) = src.strip_prefix('.') {
        if rest.is_empty() || !rest.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(Error::SpecParse(format!("invalid variable reference `{src}`")));
        }
        return Ok(Term::Var(rest.to_string()));
    }
    if src.starts_with('"') {
        return Ok(Term::Str(parse_string_literal(src)?));
    }
    if src.starts_with('(') && src.ends_with(')') {
        return parse_term_chain(&src[1..src.len() - 1]);
    }
    if let Ok(n) = src.parse::<i64>() {
        return Ok(Term::Int(n));
    }
    // A bare function call: `funcName arg1 arg2 ...`
    let args_src = split_top_level(src, ' ')
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>();
    let (func, arg_strs) = args_src
        .split_first()
        .ok_or_else(|| Error::SpecParse(format!("invalid expression `{src}`")))?;
    let mut args = Vec::new();
    for a in arg_strs {
        args.push(parse_term_chain(a)?);
    }
    Ok(Term::Call(Box::new(Call {
        func: func.clone(),
        args,
    })))
}

/// Parses a pipeline stage after the first (`funcName arg...`), leaving the
/// piped-in value to be appended by the caller at evaluation time.
fn parse_call_missing_last_arg(src: &str) -> Result<Term> {
    parse_term_chain(src)
}

fn parse_string_literal(src: &str) -> Result<String> {
    if !src.starts_with('"') {
        return Err(Error::SpecParse(format!("expected string literal: {src}")));
    }
    let mut out = String::new();
    let mut chars = src[1..].chars();
    loop {
        match chars.next() {
            None => return Err(Error::SpecParse(format!("unterminated string literal: {src}"))),
            Some('"') => break,
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(c) => out.push(c),
                None => return Err(Error::SpecParse(format!("unterminated escape: {src}"))),
            },
            Some(c) => out.push(c),
        }
    }
    Ok(out)
}

// ----------------------------------------------------------------------
// Evaluation
// ----------------------------------------------------------------------

fn eval_pipeline(pipeline: &Pipeline, scope: &Scope, features: TemplateFeatures) -> Result<Value> {
    let mut value = eval_term(&pipeline.stages[0], scope, features)?;
    for stage in &pipeline.stages[1..] {
        value = match stage {
            Term::Call(call) => {
                let mut args = Vec::new();
                for a in &call.args {
                    args.push(eval_term(a, scope, features)?);
                }
                args.push(value);
                call_function(&call.func, args, features)?
            }
            other => {
                // A bare term as a pipeline stage ignores the piped value,
                // matching Go template semantics for a literal stage.
                eval_term(other, scope, features)?
            }
        };
    }
    Ok(value)
}

fn eval_term(term: &Term, scope: &Scope, features: TemplateFeatures) -> Result<Value> {
    match term {
        Term::Var(name) => scope
            .get(name)
            .map(|s| Value::Str(s.to_string()))
            .ok_or_else(|| Error::UnknownVar(name.clone())),
        Term::Str(s) => Ok(Value::Str(s.clone())),
        Term::Int(n) => Ok(Value::Str(n.to_string())),
        Term::Call(call) => {
            let mut args = Vec::new();
            for a in &call.args {
                args.push(eval_term(a, scope, features)?);
            }
            call_function(&call.func, args, features)
        }
    }
}

fn call_function(name: &str, args: Vec<Value>, features: TemplateFeatures) -> Result<Value> {
    let strs: Vec<String> = args.iter().map(Value::as_str).collect();
    match name {
        "contains" => {
            require_args(name, &strs, 2)?;
            Ok(bool_value(strs[0].contains(&strs[1])))
        }
        "replace" => {
            require_args(name, &strs, 4)?;
            let n: i64 = strs[3]
                .parse()
                .map_err(|_| Error::SpecParse(format!("replace: invalid count `{}`", strs[3])))?;
            Ok(Value::Str(replace_n(&strs[0], &strs[1], &strs[2], n)))
        }
        "replaceAll" => {
            require_args(name, &strs, 3)?;
            Ok(Value::Str(strs[0].replace(&strs[1], &strs[2])))
        }
        "split" => {
            require_args(name, &strs, 2)?;
            let items = if strs[1].is_empty() {
                vec![strs[0].clone()]
            } else {
                strs[0].split(strs[1].as_str()).map(str::to_string).collect()
            };
            Ok(Value::List(items))
        }
        "sortStrings" => match args.into_iter().next() {
            Some(Value::List(items)) => {
                let mut sorted = items;
                sorted.sort();
                Ok(Value::List(sorted))
            }
            Some(Value::Str(s)) => Ok(Value::Str(s)),
            None => Err(Error::SpecParse("sortStrings requires one argument".to_string())),
        },
        "toLower" => {
            require_args(name, &strs, 1)?;
            Ok(Value::Str(strs[0].to_lowercase()))
        }
        "toUpper" => {
            require_args(name, &strs, 1)?;
            Ok(Value::Str(strs[0].to_uppercase()))
        }
        "trimPrefix" => {
            require_args(name, &strs, 2)?;
            Ok(Value::Str(
                strs[0].strip_prefix(strs[1].as_str()).unwrap_or(&strs[0]).to_string(),
            ))
        }
        "trimSuffix" => {
            require_args(name, &strs, 2)?;
            Ok(Value::Str(
                strs[0].strip_suffix(strs[1].as_str()).unwrap_or(&strs[0]).to_string(),
            ))
        }
        "trimSpace" => {
            require_args(name, &strs, 1)?;
            Ok(Value::Str(strs[0].trim().to_string()))
        }
        "toSnakeCase" => {
            require_args(name, &strs, 1)?;
            Ok(Value::Str(case_convert(&strs[0], '_', Case::Preserve)))
        }
        "toLowerSnakeCase" => {
            require_args(name, &strs, 1)?;
            Ok(Value::Str(case_convert(&strs[0], '_', Case::Lower)))
        }
        "toUpperSnakeCase" => {
            require_args(name, &strs, 1)?;
            Ok(Value::Str(case_convert(&strs[0], '_', Case::Upper)))
        }
        "toHyphenCase" => {
            require_args(name, &strs, 1)?;
            Ok(Value::Str(case_convert(&strs[0], '-', Case::Preserve)))
        }
        "toLowerHyphenCase" => {
            require_args(name, &strs, 1)?;
            Ok(Value::Str(case_convert(&strs[0], '-', Case::Lower)))
        }
        "toUpperHyphenCase" => {
            require_args(name, &strs, 1)?;
            Ok(Value::Str(case_convert(&strs[0], '-', Case::Upper)))
        }
        "formatTime" => {
            if features.skip_time {
                return Err(Error::SpecParse(
                    "formatTime is not available under this api_version".to_string(),
                ));
            }
            require_args(name, &strs, 2)?;
            Ok(Value::Str(format_time(&strs[0], &strs[1])?))
        }
        other => Err(Error::SpecParse(format!("unknown template function `{other}`"))),
    }
}

fn require_args(func: &str, args: &[String], n: usize) -> Result<()> {
    if args.len() != n {
        return Err(Error::SpecParse(format!(
            "{func} requires {n} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn bool_value(b: bool) -> Value {
    Value::Str(if b { "true".to_string() } else { String::new() })
}

fn replace_n(s: &str, old: &str, new: &str, n: i64) -> String {
    if n < 0 {
        return s.replace(old, new);
    }
    if old.is_empty() || n == 0 {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    let mut remaining = n;
    while remaining > 0 {
        match rest.find(old) {
            Some(pos) => {
                out.push_str(&rest[..pos]);
                out.push_str(new);
                rest = &rest[pos + old.len()..];
                remaining -= 1;
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

#[derive(Clone, Copy)]
enum Case {
    Preserve,
    Lower,
    Upper,
}

/// Strips everything outside `[A-Za-z0-9 _-]`, collapses runs of the
/// remaining separators (space, `_`, `-`) into a single `sep`, then applies
/// the requested casing to the whole result.
fn case_convert(input: &str, sep: char, case: Case) -> String {
    let filtered: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '_' || *c == '-')
        .collect();

    let mut out = String::with_capacity(filtered.len());
    let mut last_was_sep = false;
    for c in filtered.chars() {
        if c == ' ' || c == '_' || c == '-' {
            if !last_was_sep && !out.is_empty() {
                out.push(sep);
            }
            last_was_sep = true;
        } else {
            out.push(c);
            last_was_sep = false;
        }
    }
    while out.ends_with(sep) {
        out.pop();
    }

    match case {
        Case::Preserve => out,
        Case::Lower => out.to_lowercase(),
        Case::Upper => out.to_uppercase(),
    }
}

fn format_time(unix_ms: &str, layout: &str) -> Result<String> {
    let ms: i64 = unix_ms
        .parse()
        .map_err(|_| Error::SpecParse(format!("formatTime: invalid unix_ms `{unix_ms}`")))?;
    let dt = chrono::DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| Error::SpecParse(format!("formatTime: out-of-range unix_ms `{unix_ms}`")))?;
    Ok(dt.format(layout).to_string())
}

/// Builds the always-present built-in variables for a render.
pub fn built_in_variables(now_ms: i64) -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("_now_ms".to_string(), now_ms.to_string());
    map
}
