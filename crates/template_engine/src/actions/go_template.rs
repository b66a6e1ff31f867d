//! The `go_template` action: expands each matched file's entire contents
//! as a string template against the current scope.

use crate::errors::Result;
use crate::spec::GoTemplateParams;
use crate::template_string::{self, TemplateFeatures};

use super::{walk_and_modify, StepParams};

#[cfg(test)]
#[path = "go_template_tests.rs"]
mod tests;

pub fn execute(params: &mut StepParams, action: &GoTemplateParams) -> Result<()> {
    let features = TemplateFeatures {
        skip_time: params.features.skip_time,
    };
    let scope = params.scope.clone();

    walk_and_modify(params, &action.paths, |bytes| {
        let source = String::from_utf8_lossy(bytes).into_owned();
        let rendered = template_string::render(&source, &scope, features)?;
        Ok(rendered.into_bytes())
    })
}
