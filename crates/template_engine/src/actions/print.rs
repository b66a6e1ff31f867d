//! The `print` action: writes a templated message to the render's stdout
//! stream, with `_flag_dest`/`_flag_source` additionally in scope.

use std::io::Write;

use crate::errors::Result;
use crate::spec::PrintParams;
use crate::template_string::{self, TemplateFeatures};

use super::StepParams;

#[cfg(test)]
#[path = "print_tests.rs"]
mod tests;

pub fn execute(params: &mut StepParams, action: &PrintParams) -> Result<()> {
    let features = TemplateFeatures {
        skip_time: params.features.skip_time,
    };

    let print_scope = params
        .scope
        .with_binding("_flag_dest", params.flag_dest.clone())
        .with_binding("_flag_source", params.flag_source.clone());

    let mut message = template_string::render(&action.message, &print_scope, features)?;
    if !message.ends_with('\n') {
        message.push('\n');
    }

    if !params.suppress_print {
        params.stdout.write_all(message.as_bytes())?;
    }
    Ok(())
}
