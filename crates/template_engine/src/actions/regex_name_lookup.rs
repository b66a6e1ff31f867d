//! The `regex_name_lookup` action: every capturing group in the regex must
//! be named, and each name must resolve in scope; matches are replaced by
//! the concatenation of those variables' values in group order.

use regex::Regex;

use crate::errors::{Error, Result};
use crate::spec::RegexNameLookupParams;

use super::{walk_and_modify, StepParams};

#[cfg(test)]
#[path = "regex_name_lookup_tests.rs"]
mod tests;

pub fn execute(params: &mut StepParams, action: &RegexNameLookupParams) -> Result<()> {
    let mut compiled = Vec::with_capacity(action.replacements.len());
    for entry in &action.replacements {
        let regex = Regex::new(&entry.regex)
            .map_err(|e| Error::SpecParse(format!("invalid regex `{}`: {e}", entry.regex)))?;
        for i in 1..regex.captures_len() {
            if regex.capture_names().nth(i).flatten().is_none() {
                return Err(Error::SpecParse(format!(
                    "regex_name_lookup: group {i} in `{}` must be named",
                    entry.regex
                )));
            }
        }
        compiled.push(regex);
    }

    let scope = params.scope.clone();
    walk_and_modify(params, &action.paths, |bytes| {
        let mut text = String::from_utf8_lossy(bytes).into_owned();
        for regex in &compiled {
            text = substitute(regex, &text, &scope)?;
        }
        Ok(text.into_bytes())
    })
}

fn substitute(regex: &Regex, text: &str, scope: &crate::scope::Scope) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;
    for caps in regex.captures_iter(text) {
        let whole = caps.get(0).expect("capture 0 always present");
        out.push_str(&text[last_end..whole.start()]);

        let mut replacement = String::new();
        for name in regex.capture_names().flatten() {
            let value = scope
                .get(name)
                .ok_or_else(|| Error::UnknownVar(name.to_string()))?;
            replacement.push_str(value);
        }
        out.push_str(&replacement);
        last_end = whole.end();
    }
    out.push_str(&text[last_end..]);
    Ok(out)
}
