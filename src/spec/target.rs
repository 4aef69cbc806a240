//! Target declarations
//!
//! A target is a named build entry point. A plain target may override the
//! spec-level artifacts, tests, dependencies or image config for the distro
//! it names; overrides are full replacements, never merges. A target with a
//! `frontend` forwards the whole sub-target tree to an external frontend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::artifacts::Artifacts;
use super::dependencies::PackageDependencies;
use super::tests::TestSpec;

/// A distro target or a forwarded frontend
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Replaces the spec-level artifacts for this target when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Artifacts>,
    /// Replaces the spec-level tests for this target when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<TestSpec>>,
    /// Replaces the spec-level dependencies for this target when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<PackageDependencies>,
    /// Replaces the spec-level image config for this target when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageConfig>,
    /// Forward this target's sub-tree to an external frontend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend: Option<Frontend>,
}

/// An external frontend to forward a target to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Frontend {
    /// Frontend image reference
    pub image: String,
    /// Command line overriding the image's entrypoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmdline: Option<String>,
}

/// Container image configuration for container outputs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Base image for the output image; build images are unaffected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
}
