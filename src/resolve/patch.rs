//! Patch application
//!
//! Patches are unified diffs applied in-process, strictly in declared
//! order; a later patch observes the output of an earlier one. A patch
//! file may span several target files; each per-file section is applied
//! independently, with `strip` leading path components removed from the
//! diff's file names.

use crate::error::{PacksmithError, Result};
use crate::tree::{Tree, DEFAULT_FILE_MODE};

/// One per-file section of a unified diff
struct FilePatch {
    /// Target path after stripping, already normalized
    path: String,
    /// `true` when the section deletes the file
    deletes: bool,
    /// The section text including its `---`/`+++` headers
    text: String,
}

/// Apply one patch (possibly spanning several files) to a tree
pub fn apply_patch(
    tree: &mut Tree,
    source: &str,
    patch_name: &str,
    diff: &[u8],
    strip: usize,
) -> Result<()> {
    let fail = |reason: String| PacksmithError::PatchApply {
        source: source.to_string(),
        patch: patch_name.to_string(),
        reason,
    };

    let text = std::str::from_utf8(diff)
        .map_err(|_| fail("patch is not valid UTF-8".to_string()))?;

    let sections = split_sections(text, strip).map_err(fail)?;
    if sections.is_empty() {
        return Err(fail("no file sections found in patch".to_string()));
    }

    for section in sections {
        if section.deletes {
            if tree.file(&section.path).is_none() {
                return Err(fail(format!(
                    "cannot delete '{}': no such file",
                    section.path
                )));
            }
            tree.remove(&section.path);
            continue;
        }

        let parsed = diffy::Patch::from_bytes(section.text.as_bytes())
            .map_err(|e| fail(format!("'{}': {e}", section.path)))?;

        let (original, mode) = match tree.file(&section.path) {
            Some((data, mode)) => (data.to_vec(), mode),
            None => (Vec::new(), DEFAULT_FILE_MODE),
        };

        let patched = diffy::apply_bytes(&original, &parsed)
            .map_err(|e| fail(format!("'{}': {e}", section.path)))?;

        tree.insert_file(&section.path, patched, mode)?;
    }

    Ok(())
}

/// Split a unified diff into per-file sections
fn split_sections(text: &str, strip: usize) -> std::result::Result<Vec<FilePatch>, String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut sections = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if !lines[i].starts_with("--- ") {
            i += 1;
            continue;
        }
        if i + 1 >= lines.len() || !lines[i + 1].starts_with("+++ ") {
            return Err(format!("line {}: '---' header without '+++'", i + 1));
        }

        let old_name = header_name(lines[i]);
        let new_name = header_name(lines[i + 1]);

        let start = i;
        i += 2;
        while i < lines.len()
            && !lines[i].starts_with("--- ")
            && !lines[i].starts_with("diff ")
        {
            i += 1;
        }

        let (path_raw, deletes) = if new_name == "/dev/null" {
            (old_name, true)
        } else {
            (new_name, false)
        };
        let path = strip_components(path_raw, strip)
            .ok_or_else(|| format!("cannot strip {strip} components from '{path_raw}'"))?;

        let mut section = lines[start..i].join("\n");
        section.push('\n');
        sections.push(FilePatch {
            path,
            deletes,
            text: section,
        });
    }

    Ok(sections)
}

/// File name from a `---`/`+++` header line, without timestamp suffix
fn header_name(line: &str) -> &str {
    let rest = &line[4..];
    rest.split('\t').next().unwrap_or(rest).trim()
}

fn strip_components(path: &str, strip: usize) -> Option<String> {
    if path == "/dev/null" {
        return Some(path.to_string());
    }
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() <= strip {
        return None;
    }
    Some(parts[strip..].join("/"))
}
