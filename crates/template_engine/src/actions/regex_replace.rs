//! The `regex_replace` action: per-match, template-expanded replacement
//! with named-subgroup support and a hard rejection of numbered subgroup
//! references in `with`.

use regex::Regex;
use std::collections::HashMap;

use crate::errors::{Error, Result};
use crate::spec::RegexReplaceParams;
use crate::template_string::{self, TemplateFeatures};

use super::{walk_and_modify, StepParams};

#[cfg(test)]
#[path = "regex_replace_tests.rs"]
mod tests;

pub fn execute(params: &mut StepParams, action: &RegexReplaceParams) -> Result<()> {
    let features = TemplateFeatures {
        skip_time: params.features.skip_time,
    };

    // Compile each regex after expanding its source, so the pattern can
    // itself reference scope variables. `with` is validated once up front;
    // its per-match expansion happens lazily inside the visitor.
    let mut compiled = Vec::with_capacity(action.replacements.len());
    for r in &action.replacements {
        let pattern = template_string::render(&r.regex, &params.scope, features)?;
        reject_numbered_subgroups(&r.with)?;
        let regex = Regex::new(&pattern)
            .map_err(|e| Error::SpecParse(format!("invalid regex `{pattern}`: {e}")))?;
        compiled.push((regex, r.with.clone(), r.subgroup_to_replace.clone()));
    }

    let scope = params.scope.clone();
    walk_and_modify(params, &action.paths, |bytes| {
        let mut text = String::from_utf8_lossy(bytes).into_owned();
        for (regex, with, subgroup) in &compiled {
            text = apply_one(regex, with, subgroup.as_deref(), &text, &scope, features)?;
        }
        Ok(text.into_bytes())
    })
}

fn apply_one(
    regex: &Regex,
    with: &str,
    subgroup_to_replace: Option<&str>,
    text: &str,
    scope: &crate::scope::Scope,
    features: TemplateFeatures,
) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;

    for caps in regex.captures_iter(text) {
        let whole = caps.get(0).expect("capture 0 always present");

        // First pass: Go-regexp-style `$name`/`${name}` substitution
        // (rejecting `$1`-style numbered references already happened up
        // front). Second pass: the result is itself a gotmpl source, so
        // `{{.var}}` can reach outer scope variables too.
        let mut dollar_expanded = String::new();
        caps.expand(with, &mut dollar_expanded);

        let mut bindings = HashMap::new();
        for name in regex.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                bindings.insert(name.to_string(), m.as_str().to_string());
            }
        }
        let match_scope = scope.with_scope(bindings);
        let expanded = template_string::render(&dollar_expanded, &match_scope, features)?;

        out.push_str(&text[last_end..whole.start()]);

        match subgroup_to_replace {
            None => {
                out.push_str(&expanded);
            }
            Some(name) => {
                let sub = caps.name(name).ok_or_else(|| {
                    Error::SpecParse(format!(
                        "regex_replace: subgroup `{name}` did not participate in the match"
                    ))
                })?;
                out.push_str(&text[whole.start()..sub.start()]);
                out.push_str(&expanded);
                out.push_str(&text[sub.end()..whole.end()]);
            }
        }

        last_end = whole.end();
    }
    out.push_str(&text[last_end..]);
    Ok(out)
}

/// Rejects `$1`, `${1}`, etc. in a `with` string, while tolerating
/// dollar-escaped literals (`$$`). An odd run of consecutive `$` directly
/// before a digit means a numbered subgroup reference.
fn reject_numbered_subgroups(with: &str) -> Result<()> {
    let chars: Vec<char> = with.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '$' {
            let mut run = 0;
            let mut j = i;
            while j < chars.len() && chars[j] == '$' {
                run += 1;
                j += 1;
            }
            let next_is_numbered = matches!(chars.get(j), Some(c) if c.is_ascii_digit())
                || matches!(chars.get(j), Some('{'))
                    && chars
                        .get(j + 1)
                        .is_some_and(|c| c.is_ascii_digit());
            if run % 2 == 1 && next_is_numbered {
                return Err(Error::SpecParse(format!(
                    "regex_replace: `with` references a numbered subgroup in `{with}`; only named subgroups (${{name}}) are permitted"
                )));
            }
            i = j;
        } else {
            i += 1;
        }
    }
    Ok(())
}
