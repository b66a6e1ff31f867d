//! # abc
//!
//! A command-line interface for rendering file-tree templates: declarative
//! `include`/`string_replace`/`go_template`/... steps applied to a template
//! directory and committed into a destination directory.
//!
//! ## Usage
//!
//! ```bash
//! abc templates render --source ./my-template --dest ./my-new-project --input name=demo
//! ```

use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod errors;
use errors::Error;

use template_engine::debuggit::CommandGitCommitter;
use template_engine::downloader::LocalDirDownloader;
use template_engine::fs::OsFs;
use template_engine::patch::CommandDiffPatchGenerator;
use template_engine::prompter::{NullPrompter, StdinPrompter};
use template_engine::{Params, RenderResult};

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

/// abc: render file-tree templates into a destination directory.
#[derive(Parser)]
#[command(name = "abc")]
#[command(about = "Render file-tree templates into a destination directory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Template-related commands.
    #[command(subcommand)]
    Templates(TemplatesCommands),
}

#[derive(Subcommand)]
enum TemplatesCommands {
    /// Render a template into a destination directory.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// The template's source: a local directory (the only acquisition mode
    /// this build supports; remote git/tarball sources are out of scope).
    #[arg(long)]
    source: PathBuf,

    /// The spec file's name within the template directory.
    #[arg(long, default_value = "spec.yaml")]
    spec: String,

    /// The destination directory the render is committed into.
    #[arg(long)]
    dest: PathBuf,

    /// Accepted for parity with the engine's CLI surface; unused by this
    /// build, which only ships a local-directory downloader.
    #[arg(long, value_parser = ["https", "ssh"], default_value = "https")]
    #[allow(dead_code)]
    git_protocol: String,

    /// `key=value` input, repeatable.
    #[arg(long = "input", value_parser = parse_key_val)]
    inputs: Vec<(String, String)>,

    /// YAML file of `key: value` inputs, repeatable; lower precedence than
    /// `--input`.
    #[arg(long = "input-files")]
    input_files: Vec<PathBuf>,

    /// `ABC_LOG`-style filter directive, e.g. `debug` or `template_engine=trace`.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long)]
    force_overwrite: bool,

    #[arg(long)]
    keep_temp_dirs: bool,

    /// Writes a manifest recording this render. Pass `--manifest=false` to
    /// skip.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    manifest: bool,

    #[arg(long)]
    accept_defaults: bool,

    /// Prompts interactively for any input left unresolved after flags,
    /// input files, and defaults.
    #[arg(long)]
    prompt: bool,

    #[arg(long)]
    skip_input_validation: bool,

    #[arg(long)]
    ignore_unknown_inputs: bool,

    #[arg(long)]
    debug_step_diffs: bool,

    /// Keeps the scratch/backup directories and prints their paths, so the
    /// render's staged state can be inspected after the fact.
    #[arg(long)]
    debug_scratch_contents: bool,

    #[arg(long)]
    backfill_manifest_only: bool,

    #[arg(long)]
    continue_without_patches: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Loads every `--input-files` document and merges them into one map, later
/// files taking precedence over earlier ones.
fn load_input_files(paths: &[PathBuf]) -> Result<HashMap<String, String>, Error> {
    let mut merged = HashMap::new();
    for path in paths {
        let contents = std::fs::read(path).map_err(|source| Error::InputFile {
            path: path.display().to_string(),
            source,
        })?;
        let parsed: HashMap<String, String> =
            serde_yaml::from_slice(&contents).map_err(|source| Error::InputFileParse {
                path: path.display().to_string(),
                source,
            })?;
        merged.extend(parsed);
    }
    Ok(merged)
}

fn run_render(args: RenderArgs) -> Result<RenderResult, Error> {
    let inputs: HashMap<String, String> = args.inputs.into_iter().collect();
    let input_file_values = load_input_files(&args.input_files)?;

    // spec.md §6: the prompter is only wired up when the caller asked for
    // `--prompt` *and* stdin is actually a TTY; a non-interactive stdin
    // (piped input, CI) falls back to `NullPrompter` so a missing input
    // surfaces as `MissingInput` instead of blocking on a read that will
    // never be answered.
    let interactive = args.prompt && io::stdin().is_terminal();
    let downloader = LocalDirDownloader::new(&args.source);
    let stdin_prompter = StdinPrompter;
    let null_prompter = NullPrompter;
    let prompter: &dyn template_engine::prompter::Prompter = if interactive {
        &stdin_prompter
    } else {
        &null_prompter
    };
    let git_committer = CommandGitCommitter;
    let patch_generator = CommandDiffPatchGenerator;
    let mut stdout = io::stdout();

    let mut params = Params {
        fs: Arc::new(OsFs),
        downloader: &downloader,
        prompter,
        git_committer: if args.debug_step_diffs {
            Some(&git_committer as &dyn template_engine::debuggit::DebugGitCommitter)
        } else {
            None
        },
        patch_generator: &patch_generator,
        stdout: &mut stdout,
        cwd: std::env::current_dir().map_err(Error::Cwd)?,
        source: args.source.display().to_string(),
        destination_dir: args.dest,
        spec_filename: Some(args.spec),
        inputs,
        input_file_values,
        manifest_inputs: HashMap::new(),
        override_builtin_vars: HashMap::new(),
        accept_defaults: args.accept_defaults,
        prompt: interactive,
        skip_input_validation: args.skip_input_validation,
        ignore_unknown_inputs: args.ignore_unknown_inputs,
        force_overwrite: args.force_overwrite,
        backups_enabled: true,
        keep_temp_dirs: args.keep_temp_dirs || args.debug_scratch_contents,
        write_manifest: args.manifest,
        debug_step_diffs: args.debug_step_diffs,
        backfill_manifest_only: args.backfill_manifest_only,
        continue_without_patches: args.continue_without_patches,
        now_ms_override: None,
    };

    let result = template_engine::render(&mut params)?;

    if args.debug_scratch_contents {
        if let Some(scratch) = &result.scratch_dir {
            println!("scratch directory: {}", scratch.display());
        }
        if let Some(backup) = &result.backup_dir {
            println!("backup directory:  {}", backup.display());
        }
    }

    Ok(result)
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_env("ABC_LOG").unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let args = match cli.command {
        Commands::Templates(TemplatesCommands::Render(args)) => args,
    };

    init_logging(&args.log_level);

    match run_render(args) {
        Ok(result) => {
            println!("Rendered into destination.");
            if let Some(manifest_path) = &result.manifest_path {
                println!("Manifest written to {}", manifest_path.display());
            }
            if !result.included_from_dest.is_empty() {
                println!(
                    "Included from destination and modified in place: {}",
                    result.included_from_dest.join(", ")
                );
            }
            let _ = io::stdout().flush();
            std::process::exit(0);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}
