//! Extraction archives
//!
//! The `bin` extraction flow writes every selected binary into a single
//! `binaries.zip` at the tree root. Entries are keyed by their placement
//! name, carry the source file's permission bits, and use a fixed
//! timestamp so the archive is reproducible byte-for-byte.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::Result;
use crate::tree::Tree;

use super::PlacedArtifact;

/// Name of the archive placed at the output tree root
pub const ARCHIVE_NAME: &str = "binaries.zip";

/// Write placed artifacts into a zip archive
///
/// Entries appear in placement order; flat layouts need no directory
/// entries.
pub fn write_archive(placed: &[PlacedArtifact]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for artifact in placed {
        let options = SimpleFileOptions::default()
            .unix_permissions(artifact.mode)
            .last_modified_time(zip::DateTime::default());
        writer.start_file(artifact.placement.as_str(), options)?;
        writer.write_all(&artifact.data)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// The extraction output: a tree holding just the archive at its root
pub fn archive_tree(placed: &[PlacedArtifact]) -> Result<Tree> {
    let data = write_archive(placed)?;
    let mut tree = Tree::new();
    tree.insert_file(ARCHIVE_NAME, data, 0o644)?;
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::ArtifactKind;
    use std::io::Read;

    fn bin(placement: &str, data: &[u8], mode: u32) -> PlacedArtifact {
        PlacedArtifact {
            kind: ArtifactKind::Binary,
            source_path: format!("src/{placement}"),
            placement: placement.to_string(),
            data: data.to_vec(),
            mode,
        }
    }

    fn read_entries(archive: &[u8]) -> Vec<(String, Vec<u8>, Option<u32>)> {
        let mut zip = zip::ZipArchive::new(Cursor::new(archive.to_vec())).unwrap();
        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).unwrap();
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            entries.push((file.name().to_string(), data, file.unix_mode()));
        }
        entries
    }

    #[test]
    fn test_single_entry_archive() {
        let archive =
            write_archive(&[bin("phony.sh", b"#!/bin/sh\necho 'phony'\n", 0o755)]).unwrap();
        let entries = read_entries(&archive);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "phony.sh");
        assert_eq!(entries[0].1, b"#!/bin/sh\necho 'phony'\n");
        assert_eq!(entries[0].2.map(|m| m & 0o7777), Some(0o755));
    }

    #[test]
    fn test_two_entries_nothing_extra() {
        let archive = write_archive(&[
            bin("phony1.sh", b"one\n", 0o755),
            bin("phony2.sh", b"two\n", 0o700),
        ])
        .unwrap();
        let entries = read_entries(&archive);
        assert_eq!(entries.len(), 2);
        let names: Vec<&str> = entries.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["phony1.sh", "phony2.sh"]);
        assert_eq!(entries[1].2.map(|m| m & 0o7777), Some(0o700));
    }

    #[test]
    fn test_nested_placement_entry() {
        let archive = write_archive(&[bin("nested/unphony.sh", b"x", 0o755)]).unwrap();
        let entries = read_entries(&archive);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "nested/unphony.sh");
    }

    #[test]
    fn test_archive_reproducible() {
        let placed = [bin("tool", b"bits", 0o755)];
        assert_eq!(write_archive(&placed).unwrap(), write_archive(&placed).unwrap());
    }

    #[test]
    fn test_archive_tree_layout() {
        let tree = archive_tree(&[bin("tool", b"bits", 0o755)]).unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.file(ARCHIVE_NAME).is_some());
    }
}
