//! The parsed template specification: `Spec`, its nested `Step`/`Action`
//! variants, and the feature flags derived from `api_version`.
//!
//! Parsing a `spec.yaml` document is the one place this crate leans on an
//! external format (YAML) for an otherwise internal data model; the
//! orchestrator is free to hand a [`Spec`] value to the driver however it
//! likes, but [`Spec::parse`] is provided so a plain `spec.yaml` string is
//! enough to get one.

use serde::Deserialize;

use crate::errors::{Error, Result, SourcePosition};
use crate::scope::is_reserved_name;

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;

/// Feature flags derived from `api_version`. Older templates predate glob
/// support, git metadata variables, or `formatTime`; this struct is the
/// single place that distinction is resolved into booleans the rest of the
/// crate can branch on without knowing version strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    pub skip_globs: bool,
    pub skip_git_vars: bool,
    pub skip_time: bool,
}

impl Features {
    pub fn from_api_version(api_version: &str) -> Result<Self> {
        match api_version {
            "v1alpha1" => Ok(Features {
                skip_globs: true,
                skip_git_vars: true,
                skip_time: true,
            }),
            "v1alpha2" => Ok(Features {
                skip_globs: true,
                skip_git_vars: true,
                skip_time: false,
            }),
            "v1beta1" => Ok(Features {
                skip_globs: false,
                skip_git_vars: true,
                skip_time: false,
            }),
            "v1beta2" | "v1beta3" => Ok(Features {
                skip_globs: false,
                skip_git_vars: false,
                skip_time: false,
            }),
            other => Err(Error::SpecParse(format!(
                "unsupported api_version `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationRule {
    pub rule: String,
    pub message: String,
}

/// Global rules use the same shape as per-input validation rules.
pub type GlobalRule = ValidationRule;

#[derive(Debug, Clone, Deserialize)]
pub struct InputDecl {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub rules: Vec<ValidationRule>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FromSource {
    #[default]
    Template,
    Destination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncludeEntry {
    pub paths: Vec<String>,
    #[serde(rename = "as", default)]
    pub as_: Vec<String>,
    #[serde(default)]
    pub skip: Vec<String>,
    #[serde(default)]
    pub from: FromSource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncludeParams {
    pub paths: Vec<IncludeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppendParams {
    pub paths: Vec<String>,
    pub with: String,
    #[serde(default)]
    pub skip_ensure_newline: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StringReplacement {
    pub to_replace: String,
    pub with: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StringReplaceParams {
    pub paths: Vec<String>,
    pub replacements: Vec<StringReplacement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegexReplacement {
    pub regex: String,
    pub with: String,
    #[serde(default)]
    pub subgroup_to_replace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegexReplaceParams {
    pub paths: Vec<String>,
    pub replacements: Vec<RegexReplacement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegexNameLookupEntry {
    pub regex: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegexNameLookupParams {
    pub paths: Vec<String>,
    pub replacements: Vec<RegexNameLookupEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoTemplateParams {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrintParams {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForEachIterator {
    pub key: String,
    #[serde(default)]
    pub values: Option<Vec<String>>,
    #[serde(default)]
    pub values_from: Option<String>,
}

impl ForEachIterator {
    /// Exactly one of `values`/`values_from` must be populated.
    pub fn validate(&self) -> Result<()> {
        match (&self.values, &self.values_from) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(Error::SpecParse(
                "for_each iterator must set exactly one of `values` or `values_from`".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForEachParams {
    pub iterator: ForEachIterator,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum Action {
    Include(IncludeParams),
    Append(AppendParams),
    StringReplace(StringReplaceParams),
    RegexReplace(RegexReplaceParams),
    RegexNameLookup(RegexNameLookupParams),
    GoTemplate(GoTemplateParams),
    Print(PrintParams),
    ForEach(ForEachParams),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(rename = "if", default)]
    pub if_expr: Option<String>,
    #[serde(flatten)]
    pub action: Action,
    #[serde(skip)]
    pub position: SourcePosition,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Spec {
    pub api_version: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub inputs: Vec<InputDecl>,
    #[serde(default)]
    pub rules: Vec<GlobalRule>,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(skip)]
    pub features: Features,
}

impl Spec {
    /// Parses a `spec.yaml` document and derives its feature flags.
    ///
    /// Step source positions are recovered with a line-scan over the raw
    /// document text (looking for `action:` keys in document order), not a
    /// structured YAML parse with span tracking; good enough for "at line N
    /// column M" diagnostics, not byte-exact for generated or re-serialized
    /// YAML.
    pub fn parse(yaml_src: &str) -> Result<Spec> {
        let mut spec: Spec =
            serde_yaml::from_str(yaml_src).map_err(|e| Error::SpecParse(e.to_string()))?;

        for input in &spec.inputs {
            if is_reserved_name(&input.name) {
                return Err(Error::SpecParse(format!(
                    "input name `{}` begins with `_`, which is reserved for built-ins",
                    input.name
                )));
            }
        }

        spec.features = Features::from_api_version(&spec.api_version)?;

        let mut positions = collect_action_positions(yaml_src).into_iter();
        assign_positions(&mut spec.steps, &mut positions);

        Ok(spec)
    }
}

fn collect_action_positions(yaml_src: &str) -> Vec<SourcePosition> {
    let mut out = Vec::new();
    for (idx, line) in yaml_src.lines().enumerate() {
        if let Some(col) = line.find("action:") {
            out.push(SourcePosition {
                line: (idx + 1) as u32,
                column: (col + 1) as u32,
            });
        }
    }
    out
}

fn assign_positions(steps: &mut [Step], positions: &mut std::vec::IntoIter<SourcePosition>) {
    for step in steps.iter_mut() {
        step.position = positions.next().unwrap_or_default();
        if let Action::ForEach(params) = &mut step.action {
            assign_positions(&mut params.steps, positions);
        }
    }
}
