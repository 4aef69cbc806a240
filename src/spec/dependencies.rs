//! Package dependency declarations
//!
//! Constraint sets end up in the generated package metadata; the target
//! distro's native tooling does the actual dependency solving.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Dependencies of the generated package
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageDependencies {
    /// Packages required to build, installed into the worker before any
    /// build step runs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub build: BTreeMap<String, Vec<String>>,
    /// Packages required at install/run time
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub runtime: BTreeMap<String, Vec<String>>,
    /// Recommended alongside the generated package; not every package
    /// manager supports this
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub recommends: BTreeMap<String, Vec<String>>,
    /// Capabilities the generated package provides
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<String>,
    /// Packages that cannot be co-installed with the generated package
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conflicts: BTreeMap<String, Vec<String>>,
    /// Packages the generated package replaces
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub replaces: BTreeMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dependencies() {
        let yaml = r#"
build:
  gcc: []
  make: [">= 4.0"]
runtime:
  libc6: []
provides:
  - phony-tool
"#;
        let deps: PackageDependencies = serde_yaml::from_str(yaml).unwrap();
        assert!(deps.build.contains_key("gcc"));
        assert_eq!(deps.build["make"], vec![">= 4.0"]);
        assert_eq!(deps.provides, vec!["phony-tool"]);
    }
}
