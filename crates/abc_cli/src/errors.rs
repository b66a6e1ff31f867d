use std::io;

use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

#[derive(Error, Debug)]
pub enum Error {
    #[error("render failed: {0}")]
    Render(#[from] template_engine::Error),

    #[error("failed to read input file {path}: {source}")]
    InputFile { path: String, source: io::Error },

    #[error("failed to determine the current working directory: {0}")]
    Cwd(io::Error),

    #[error("input file {path} is not valid YAML: {source}")]
    InputFileParse {
        path: String,
        source: serde_yaml::Error,
    },
}
