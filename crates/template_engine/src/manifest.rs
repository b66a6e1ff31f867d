//! The manifest writer (`spec.md` §4.8, §6): a deterministic YAML record of
//! one render — inputs, per-output-file hashes, template version, and
//! reverse patches for any file that was `include`d `from: destination`
//! and then modified in place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::downloader::DownloadMetadata;
use crate::errors::{Error, Result};
use crate::fs::{Fs, WriteMode};
use crate::patch::ReversePatchGenerator;

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;

/// The latest `api_version` this crate writes manifests as. Independent of
/// the *template's* `api_version` (`spec.md` §3) — a manifest always
/// records the render engine's own, current manifest schema version.
pub const MANIFEST_API_VERSION: &str = "v1beta3";

#[derive(Debug, Clone, Serialize)]
pub struct ManifestInput {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestOutputFile {
    pub file: String,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestPatch {
    pub path: String,
    pub patch: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub api_version: String,
    pub kind: String,
    pub creation_time: String,
    pub modification_time: String,
    pub template_location: String,
    pub template_location_type: String,
    pub template_version: String,
    pub template_dirhash: String,
    pub inputs: Vec<ManifestInput>,
    pub output_files: Vec<ManifestOutputFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<ManifestPatch>,
}

const HEADER_COMMENT: &str = "# Generated by the \"abc templates\" command. Do not modify.\n";

/// Builds the deterministic manifest body (everything except the two
/// timestamps, which the caller stamps once at the point of writing).
#[allow(clippy::too_many_arguments)]
pub fn build(
    download_metadata: &DownloadMetadata,
    template_dirhash: String,
    inputs: &HashMap<String, String>,
    output_hashes: &HashMap<String, [u8; 32]>,
    patches: Vec<ManifestPatch>,
    creation_time: String,
    modification_time: String,
) -> Manifest {
    let mut input_list: Vec<ManifestInput> = inputs
        .iter()
        .map(|(name, value)| ManifestInput {
            name: name.clone(),
            value: value.clone(),
        })
        .collect();
    input_list.sort_by(|a, b| a.name.cmp(&b.name));

    let mut output_list: Vec<ManifestOutputFile> = output_hashes
        .iter()
        .map(|(path, digest)| ManifestOutputFile {
            file: path.clone(),
            hash: encode_hash(digest),
        })
        .collect();
    output_list.sort_by(|a, b| a.file.cmp(&b.file));

    let mut patches = patches;
    patches.sort_by(|a, b| a.path.cmp(&b.path));

    Manifest {
        api_version: MANIFEST_API_VERSION.to_string(),
        kind: "Manifest".to_string(),
        creation_time,
        modification_time,
        template_location: download_metadata.canonical_source.clone(),
        template_location_type: download_metadata.location_type.clone(),
        template_version: download_metadata.version.clone(),
        template_dirhash,
        inputs: input_list,
        output_files: output_list,
        patches,
    }
}

/// Renders the YAML body preceded by the fixed header comment.
pub fn to_yaml(manifest: &Manifest) -> Result<String> {
    let body = serde_yaml::to_string(manifest).map_err(|e| Error::SpecParse(e.to_string()))?;
    Ok(format!("{HEADER_COMMENT}{body}"))
}

/// The manifest's destination path: `<destination>/.abc/manifest_<name_part>_<rfc3339nano>.lock.yaml`.
pub fn manifest_path(
    destination: &Path,
    canonical_source: &str,
    is_canonical: bool,
    timestamp_rfc3339_nano: &str,
) -> PathBuf {
    let name_part = if is_canonical && !canonical_source.is_empty() {
        escape_name_part(canonical_source)
    } else {
        "nolocation".to_string()
    };
    destination.join(".abc").join(format!(
        "manifest_{name_part}_{timestamp_rfc3339_nano}.lock.yaml"
    ))
}

/// URL-path-escapes a canonical source string for use inside a filename:
/// keeps `[A-Za-z0-9._-]` and percent-encodes everything else (including
/// `/`, so a multi-segment source like `github.com/org/repo` collapses to
/// one path component).
fn escape_name_part(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    for b in src.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => out.push(b as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

/// Verifies writing the manifest at `path` would not overwrite an existing
/// file, without writing anything. Used on the dry-run commit pass
/// (`spec.md` §4.8: "it verifies it would not overwrite an existing
/// manifest").
pub fn check_would_not_overwrite(fs: &dyn Fs, path: &Path) -> Result<()> {
    match fs.stat(path) {
        Ok(_) => Err(Error::Overwrite(path.display().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Writes the manifest at `path` with create|excl semantics (fails loudly
/// rather than silently clobbering a manifest written between the dry-run
/// check and this call).
pub fn write(fs: &dyn Fs, path: &Path, manifest: &Manifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs.mkdir_all(parent).map_err(Error::Io)?;
    }
    let yaml = to_yaml(manifest)?;
    fs.write_file(path, yaml.as_bytes(), WriteMode::CreateNew)
        .map_err(Error::Io)
}

/// Computes a content hash over an entire directory tree, in the style of
/// Go's module `dirhash.Hash1`: hash every file, format `<hex sha256>  <rel
/// path>\n` per file, sort those lines, then hash the sorted, concatenated
/// lines. Stable under reordering of the walk and independent of file
/// iteration order.
pub fn dirhash(fs: &dyn Fs, root: &Path) -> Result<String> {
    let mut rel_paths: Vec<String> = fs
        .walk_dir(root)
        .map_err(Error::Io)?
        .into_iter()
        .filter(|e| !e.is_dir && !e.is_symlink)
        .map(|e| {
            e.path
                .strip_prefix(root)
                .unwrap_or(&e.path)
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    rel_paths.sort();

    let mut lines = Vec::with_capacity(rel_paths.len());
    for rel in &rel_paths {
        let contents = fs.read_file(&root.join(rel)).map_err(Error::Io)?;
        let digest = Sha256::digest(&contents);
        lines.push(format!("{}  {rel}\n", encode_hex(&digest)));
    }
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
    }
    Ok(format!("h1:{}", BASE64.encode(hasher.finalize())))
}

fn encode_hash(digest: &[u8; 32]) -> String {
    format!("h1:{}", BASE64.encode(digest))
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Error returned when destination-sourced reverse patches cannot be
/// computed because the prior destination state has already been
/// overwritten in memory (`backfill_manifest_only` mode, `spec.md` §4.8).
pub fn backfill_patches_unavailable(paths: &[String]) -> Error {
    Error::SpecParse(format!(
        "cannot generate reverse patches for destination-sourced files in \
         backfill-manifest-only mode (their pre-render content is no longer \
         available): {}. Pass --continue-without-patches to write the \
         manifest without them.",
        paths.join(", ")
    ))
}

/// Computes the reverse patches for every file `include`d `from:
/// destination`, reading its scratch (post-render) bytes as `after` and its
/// backed-up (pre-overwrite) bytes as `before`. The backup copy, not the
/// (by now overwritten) destination file, is the only remaining record of
/// the pre-render content — the real commit pass backs up every
/// destination-sourced file unconditionally before overwriting it, exactly
/// so this step can read it back here.
///
/// In `backfill_manifest_only` mode the destination already holds the
/// post-render (`after`) content from an earlier run of the tool — there is
/// no `before` to diff against — so this returns an error naming every
/// affected path unless the caller has opted into
/// `continue_without_patches`, in which case patches are simply omitted.
pub fn compute_patches(
    fs: &dyn Fs,
    included_from_dest: &HashMap<String, PathBuf>,
    scratch_dir: &Path,
    backup_dir: &Path,
    patch_gen: &dyn ReversePatchGenerator,
    backfill_manifest_only: bool,
    continue_without_patches: bool,
) -> Result<Vec<ManifestPatch>> {
    if included_from_dest.is_empty() {
        return Ok(Vec::new());
    }

    if backfill_manifest_only {
        if continue_without_patches {
            return Ok(Vec::new());
        }
        let mut paths: Vec<String> = included_from_dest.keys().cloned().collect();
        paths.sort();
        return Err(backfill_patches_unavailable(&paths));
    }

    let mut patches = Vec::with_capacity(included_from_dest.len());
    for rel in included_from_dest.keys() {
        let after = fs.read_file(&scratch_dir.join(rel)).map_err(Error::Io)?;
        let before = fs.read_file(&backup_dir.join(rel)).map_err(Error::Io)?;
        let patch_text = patch_gen.reverse_patch(&before, &after, rel)?;
        patches.push(ManifestPatch {
            path: rel.clone(),
            patch: patch_text,
        });
    }
    Ok(patches)
}
