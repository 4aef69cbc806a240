//! Artifact selection and placement
//!
//! Applies the effective artifact configuration (target-level replacing
//! spec-level when present) to a build output tree. Every selection is
//! verified against the output; a missing path fails assembly naming the
//! path. Placement follows `{sub_path or default}/{name or basename}` and
//! preserves the source file's permission bits. The result is a normalized
//! list the packaging backends and the archive writer both consume.

pub mod archive;

use serde::Serialize;

use crate::error::{PacksmithError, Result};
use crate::spec::{ArtifactConfig, Artifacts};
use crate::tree::{normalize_path, Tree};

/// The artifact kinds a distro backend knows placement conventions for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Binary,
    Libexec,
    Manpage,
    Doc,
    License,
    ConfigFile,
    DataDir,
    SystemdUnit,
    SystemdDropin,
}

impl ArtifactKind {
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Binary => "binaries",
            ArtifactKind::Libexec => "libexec",
            ArtifactKind::Manpage => "manpages",
            ArtifactKind::Doc => "docs",
            ArtifactKind::License => "licenses",
            ArtifactKind::ConfigFile => "config_files",
            ArtifactKind::DataDir => "data_dirs",
            ArtifactKind::SystemdUnit => "systemd_units",
            ArtifactKind::SystemdDropin => "systemd_dropins",
        }
    }
}

/// One selected artifact with its resolved placement
#[derive(Debug, Clone)]
pub struct PlacedArtifact {
    pub kind: ArtifactKind,
    /// Path in the build output the artifact was selected from
    pub source_path: String,
    /// Placement path relative to the kind's conventional directory
    pub placement: String,
    pub data: Vec<u8>,
    pub mode: u32,
}

/// Select and place every declared artifact from a build output tree
pub fn select_artifacts(output: &Tree, artifacts: &Artifacts) -> Result<Vec<PlacedArtifact>> {
    let mut placed = Vec::new();

    let groups: [(ArtifactKind, &std::collections::BTreeMap<String, ArtifactConfig>); 7] = [
        (ArtifactKind::Binary, &artifacts.binaries),
        (ArtifactKind::Libexec, &artifacts.libexec),
        (ArtifactKind::Manpage, &artifacts.manpages),
        (ArtifactKind::Doc, &artifacts.docs),
        (ArtifactKind::License, &artifacts.licenses),
        (ArtifactKind::ConfigFile, &artifacts.config_files),
        (ArtifactKind::DataDir, &artifacts.data_dirs),
    ];

    for (kind, selections) in groups {
        for (path, config) in selections {
            select_one(output, kind, path, config, &mut placed)?;
        }
    }

    if let Some(systemd) = &artifacts.systemd {
        for (path, config) in &systemd.units {
            select_one(output, ArtifactKind::SystemdUnit, path, config, &mut placed)?;
        }
        for (path, config) in &systemd.dropins {
            select_one(output, ArtifactKind::SystemdDropin, path, config, &mut placed)?;
        }
    }

    Ok(placed)
}

fn select_one(
    output: &Tree,
    kind: ArtifactKind,
    path: &str,
    config: &ArtifactConfig,
    placed: &mut Vec<PlacedArtifact>,
) -> Result<()> {
    let normalized = normalize_path(path)?;

    if let Some((data, mode)) = output.file(&normalized) {
        placed.push(PlacedArtifact {
            kind,
            source_path: normalized.clone(),
            placement: config.placement(&normalized),
            data: data.to_vec(),
            mode,
        });
        return Ok(());
    }

    // Directory selections place every contained file under the
    // placement directory, keeping relative structure.
    if output.is_dir(&normalized) {
        let dir_placement = config.placement(&normalized);
        let sub = output.subtree(&normalized)?;
        for (rel, data, mode) in sub.files() {
            placed.push(PlacedArtifact {
                kind,
                source_path: crate::tree::join(&normalized, rel),
                placement: crate::tree::join(&dir_placement, rel),
                data: data.to_vec(),
                mode,
            });
        }
        return Ok(());
    }

    Err(PacksmithError::ArtifactNotFound {
        path: normalized,
    })
}

/// Normalized manifest entry, consumed by a packaging backend
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub source: String,
    pub dest: String,
    pub mode: u32,
}

/// Build the category manifest the packaging backend consumes
pub fn manifest_entries(
    placed: &[PlacedArtifact],
    category_dir: impl Fn(ArtifactKind) -> String,
) -> std::collections::BTreeMap<String, Vec<ManifestEntry>> {
    let mut categories: std::collections::BTreeMap<String, Vec<ManifestEntry>> =
        std::collections::BTreeMap::new();
    for artifact in placed {
        let dir = category_dir(artifact.kind);
        categories
            .entry(artifact.kind.label().to_string())
            .or_default()
            .push(ManifestEntry {
                source: artifact.source_path.clone(),
                dest: format!("{dir}/{}", artifact.placement),
                mode: artifact.mode,
            });
    }
    categories
}
