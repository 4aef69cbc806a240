//! Build step configuration
//!
//! Build steps run strictly in declared order against an accumulated
//! filesystem: every resolved source is grafted at `/<name>` first, then
//! each step sees the previous step's mutations. Mounts attach other
//! declared sources read-only for the duration of a step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The ordered build configuration of a spec
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    #[serde(default)]
    pub steps: Vec<BuildStep>,
    /// Environment shared by all steps; per-step env overrides it
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Working directory for all steps; defaults to the output root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    /// Mounts attached to every step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<NamedMount>,
}

impl BuildConfig {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// One build command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildStep {
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Extra mounts for this step only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<NamedMount>,
}

/// A declared source mounted read-only at a destination path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedMount {
    /// Name of a source declared in the spec
    pub source: String,
    pub dest: String,
}
