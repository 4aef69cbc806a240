//! Artifact selection rules
//!
//! Artifacts map build-output paths to placement rules, keyed by kind so
//! the packaging backend can place each kind in the distro's conventional
//! directory. A kind that is absent selects nothing of that kind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// All artifact selections of a spec or target
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Artifacts {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub binaries: BTreeMap<String, ArtifactConfig>,
    /// Helper binaries invoked by the main binaries, not on PATH
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub libexec: BTreeMap<String, ArtifactConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub manpages: BTreeMap<String, ArtifactConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub docs: BTreeMap<String, ArtifactConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub licenses: BTreeMap<String, ArtifactConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config_files: BTreeMap<String, ArtifactConfig>,
    /// Read-only architecture-independent data directories
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data_dirs: BTreeMap<String, ArtifactConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systemd: Option<SystemdArtifacts>,
}

/// Systemd units and drop-in files
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemdArtifacts {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub units: BTreeMap<String, ArtifactConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dropins: BTreeMap<String, ArtifactConfig>,
}

/// Placement rule for one selected path
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactConfig {
    /// Destination subdirectory under the kind's conventional directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
    /// File name to place the artifact under; defaults to the source
    /// file's basename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ArtifactConfig {
    /// The file name the artifact is placed under
    pub fn resolve_name(&self, path: &str) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => crate::tree::basename(path).to_string(),
        }
    }

    /// Placement path relative to the kind's conventional directory
    pub fn placement(&self, path: &str) -> String {
        let name = self.resolve_name(path);
        match self.sub_path.as_deref() {
            Some(sub) if !sub.is_empty() => format!("{sub}/{name}"),
            _ => name,
        }
    }
}

impl Artifacts {
    pub fn is_empty(&self) -> bool {
        self.binaries.is_empty()
            && self.libexec.is_empty()
            && self.manpages.is_empty()
            && self.docs.is_empty()
            && self.licenses.is_empty()
            && self.config_files.is_empty()
            && self.data_dirs.is_empty()
            && self
                .systemd
                .as_ref()
                .is_none_or(|s| s.units.is_empty() && s.dropins.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_with_subpath_and_name() {
        let cfg = ArtifactConfig {
            sub_path: Some("nested".to_string()),
            name: Some("unphony.sh".to_string()),
        };
        assert_eq!(cfg.placement("src/phony.sh"), "nested/unphony.sh");
    }

    #[test]
    fn test_placement_defaults_to_basename() {
        let cfg = ArtifactConfig::default();
        assert_eq!(cfg.placement("src/phony.sh"), "phony.sh");
    }

    #[test]
    fn test_is_empty() {
        assert!(Artifacts::default().is_empty());

        let mut arts = Artifacts::default();
        arts.binaries
            .insert("src/a".to_string(), ArtifactConfig::default());
        assert!(!arts.is_empty());
    }

    #[test]
    fn test_parse_artifacts() {
        let yaml = r#"
binaries:
  src/phony.sh: {}
  src/other.sh:
    sub_path: nested
    name: renamed.sh
systemd:
  units:
    contrib/phony.service: {}
"#;
        let arts: Artifacts = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(arts.binaries.len(), 2);
        assert_eq!(
            arts.binaries["src/other.sh"].placement("src/other.sh"),
            "nested/renamed.sh"
        );
        assert!(arts.systemd.unwrap().units.contains_key("contrib/phony.service"));
    }
}
