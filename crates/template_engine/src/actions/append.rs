//! The `append` action: appends templated text to the end of each matched
//! file.

use crate::errors::Result;
use crate::spec::AppendParams;
use crate::template_string::{self, TemplateFeatures};

use super::{walk_and_modify, StepParams};

#[cfg(test)]
#[path = "append_tests.rs"]
mod tests;

pub fn execute(params: &mut StepParams, action: &AppendParams) -> Result<()> {
    let features = TemplateFeatures {
        skip_time: params.features.skip_time,
    };
    let with = template_string::render(&action.with, &params.scope, features)?;
    let mut suffix = with.clone();
    if !action.skip_ensure_newline && !with.ends_with('\n') {
        suffix.push('\n');
    }

    walk_and_modify(params, &action.paths, |bytes| {
        let mut updated = bytes.to_vec();
        updated.extend_from_slice(suffix.as_bytes());
        Ok(updated)
    })
}
