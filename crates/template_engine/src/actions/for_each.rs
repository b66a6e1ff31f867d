//! The `for_each` action: iterates a literal or CEL-derived list, running
//! its nested steps once per element with a child scope binding the loop
//! variable. `for_each` may nest; each iteration's scope is discarded when
//! the iteration ends, so nothing it binds leaks to later iterations or to
//! the parent.

use crate::errors::Result;
use crate::expr;
use crate::spec::ForEachParams;
use crate::template_string::{self, TemplateFeatures};

use super::{execute_step, StepParams};

#[cfg(test)]
#[path = "for_each_tests.rs"]
mod tests;

pub fn execute(params: &mut StepParams, action: &ForEachParams) -> Result<()> {
    action.iterator.validate()?;

    let features = TemplateFeatures {
        skip_time: params.features.skip_time,
    };

    let values = if let Some(literal) = &action.iterator.values {
        let mut out = Vec::with_capacity(literal.len());
        for v in literal {
            out.push(template_string::render(v, &params.scope, features)?);
        }
        out
    } else {
        let expr_src = action
            .iterator
            .values_from
            .as_deref()
            .expect("validated: exactly one of values/values_from is set");
        expr::eval_list(expr_src, &params.scope)?
    };

    let parent_scope = params.scope.clone();
    for value in values {
        params.scope = parent_scope.with_binding(&action.iterator.key, value);
        for step in &action.steps {
            execute_step(step, params)?;
        }
    }
    params.scope = parent_scope;

    Ok(())
}
