//! `template_engine`: the rendering engine behind the `abc` template tool.
//!
//! A render takes a template directory (a `spec.yaml` plus the files it
//! refers to), a set of inputs, and a destination directory, and produces
//! the destination's new contents through a declarative sequence of
//! actions (`include`, `append`, `string_replace`, `regex_replace`,
//! `regex_name_lookup`, `go_template`, `print`, `for_each`), staged through
//! a scratch directory and committed to the destination in two passes.
//!
//! [`driver::render`] is the entry point; everything else in this crate is
//! a collaborator it wires together.

pub mod actions;
pub mod copy;
pub mod debuggit;
pub mod downloader;
pub mod driver;
pub mod errors;
pub mod expr;
pub mod fs;
pub mod manifest;
pub mod patch;
pub mod pathutil;
pub mod prompter;
pub mod scope;
pub mod spec;
pub mod tempdir;
pub mod template_string;

pub use driver::{render, Params, RenderResult};
pub use errors::{Error, Result, SourcePosition};
pub use spec::Spec;
