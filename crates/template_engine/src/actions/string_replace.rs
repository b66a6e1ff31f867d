//! The `string_replace` action: literal substring replacement, applied in
//! list order as a sequence of global replaces over each matched file.

use crate::errors::Result;
use crate::spec::StringReplaceParams;
use crate::template_string::{self, TemplateFeatures};

use super::{walk_and_modify, StepParams};

#[cfg(test)]
#[path = "string_replace_tests.rs"]
mod tests;

pub fn execute(params: &mut StepParams, action: &StringReplaceParams) -> Result<()> {
    let features = TemplateFeatures {
        skip_time: params.features.skip_time,
    };

    let mut resolved = Vec::with_capacity(action.replacements.len());
    for r in &action.replacements {
        let to_replace = template_string::render(&r.to_replace, &params.scope, features)?;
        let with = template_string::render(&r.with, &params.scope, features)?;
        resolved.push((to_replace, with));
    }

    walk_and_modify(params, &action.paths, |bytes| {
        let mut text = String::from_utf8_lossy(bytes).into_owned();
        for (to_replace, with) in &resolved {
            text = text.replace(to_replace.as_str(), with.as_str());
        }
        Ok(text.into_bytes())
    })
}
