//! The build specification model
//!
//! A [`Spec`] is the typed form of the declarative build document:
//! identity, template args, sources, patches, build steps, artifacts,
//! targets, dependencies and tests. Loading is pure (no I/O): parse,
//! substitute args, validate. Once loaded a spec is immutable; everything
//! downstream derives trees and graphs from it.
//!
//! ## Module organization
//!
//! - `source`: tagged source declarations and patch/generator references
//! - `build`: ordered build steps
//! - `artifacts`: artifact selection rules
//! - `target`: distro targets and forwarded frontends
//! - `dependencies`: package dependency constraint sets
//! - `tests`: declarative test specifications
//! - `args`: literal `${NAME}` substitution

pub mod args;
pub mod artifacts;
pub mod build;
pub mod dependencies;
pub mod source;
pub mod target;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{PacksmithError, Result};
use crate::fingerprint::ContentDigest;

pub use artifacts::{ArtifactConfig, Artifacts, SystemdArtifacts};
pub use build::{BuildConfig, BuildStep, NamedMount};
pub use dependencies::PackageDependencies;
pub use source::{
    BuildSource, ContextSource, GeneratorSpec, GeneratorStep, GitSource, HttpSource, InlineDir,
    InlineFile, InlineSource, ImageSource, PatchSpec, Pipeline, PipelineStep, Source, SourceKind,
    SourceMount,
};
pub use target::{Frontend, ImageConfig, TargetConfig};
pub use tests::{CheckOutput, FileCheck, TestSpec, TestStep};

/// A parsed, substituted and validated build specification
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Spec {
    pub name: String,
    pub version: String,
    pub revision: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub website: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub license: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vendor: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub packager: String,

    /// Marks the package architecture-independent; metadata only
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub noarch: bool,

    /// Template parameters with their default values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, Source>,

    /// Ordered patch lists, keyed by the name of the source they apply to
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub patches: BTreeMap<String, Vec<PatchSpec>>,

    #[serde(default, skip_serializing_if = "BuildConfig::is_empty")]
    pub build: BuildConfig,

    #[serde(default, skip_serializing_if = "Artifacts::is_empty")]
    pub artifacts: Artifacts,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, TargetConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<PackageDependencies>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<TestSpec>,
}

impl Spec {
    /// Load a spec from YAML: parse, substitute build args, validate
    pub fn from_yaml(text: &str, request_args: &BTreeMap<String, String>) -> Result<Spec> {
        let mut spec: Spec = serde_yaml::from_str(text)?;
        let merged = args::merge_args(&spec.args, request_args)?;
        spec.substitute(&merged);
        spec.validate()?;
        Ok(spec)
    }

    /// Serialize the resolved spec back to a YAML document
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Effective artifacts for a target: the target's own when declared,
    /// otherwise the spec-level selection. Full replacement, no merge.
    pub fn artifacts_for(&self, target: &str) -> &Artifacts {
        self.targets
            .get(target)
            .and_then(|t| t.artifacts.as_ref())
            .unwrap_or(&self.artifacts)
    }

    /// Effective tests for a target
    pub fn tests_for(&self, target: &str) -> &[TestSpec] {
        self.targets
            .get(target)
            .and_then(|t| t.tests.as_deref())
            .unwrap_or(&self.tests)
    }

    /// Effective dependencies for a target
    pub fn dependencies_for(&self, target: &str) -> Option<&PackageDependencies> {
        self.targets
            .get(target)
            .and_then(|t| t.dependencies.as_ref())
            .or(self.dependencies.as_ref())
    }

    /// Effective image config for a target
    pub fn image_for(&self, target: &str) -> Option<&ImageConfig> {
        self.targets
            .get(target)
            .and_then(|t| t.image.as_ref())
            .or(self.image.as_ref())
    }

    fn substitute(&mut self, merged: &BTreeMap<String, String>) {
        self.version = args::expand(&self.version, merged);
        self.revision = args::expand(&self.revision, merged);

        for source in self.sources.values_mut() {
            substitute_source(source, merged);
        }

        args::expand_map(&mut self.build.env, merged);
        for step in &mut self.build.steps {
            step.command = args::expand(&step.command, merged);
            args::expand_map(&mut step.env, merged);
        }
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("description", &self.description),
            ("version", &self.version),
            ("revision", &self.revision),
        ] {
            if value.is_empty() {
                return Err(PacksmithError::Validation {
                    message: format!("required field '{field}' is not set"),
                });
            }
        }

        for (name, source) in &self.sources {
            validate_source(name, source)?;
        }

        self.validate_patches()?;
        self.validate_mounts()?;

        for (name, target) in &self.targets {
            if let Some(frontend) = &target.frontend {
                if frontend.image.is_empty() {
                    return Err(PacksmithError::Validation {
                        message: format!("target '{name}': frontend image must not be empty"),
                    });
                }
            }
        }

        Ok(())
    }

    fn validate_patches(&self) -> Result<()> {
        for (target, patches) in &self.patches {
            if !self.sources.contains_key(target) {
                return Err(PacksmithError::Validation {
                    message: format!("patches reference undeclared source '{target}'"),
                });
            }
            for patch in patches {
                if !self.sources.contains_key(&patch.source) {
                    return Err(PacksmithError::Validation {
                        message: format!(
                            "patch for source '{target}' references undeclared source '{}'",
                            patch.source
                        ),
                    });
                }
            }
        }

        // Reject cyclic source-to-source patch references: following the
        // "patched by" edges from any source must never return to it.
        for start in self.patches.keys() {
            let mut visited = BTreeSet::new();
            let mut stack = vec![start.as_str()];
            while let Some(current) = stack.pop() {
                for patch in self.patches.get(current).map(Vec::as_slice).unwrap_or(&[]) {
                    if patch.source == *start {
                        return Err(PacksmithError::Validation {
                            message: format!(
                                "cyclic patch reference involving source '{start}'"
                            ),
                        });
                    }
                    if visited.insert(patch.source.as_str()) {
                        stack.push(patch.source.as_str());
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_mounts(&self) -> Result<()> {
        let check = |mount: &NamedMount| -> Result<()> {
            if !self.sources.contains_key(&mount.source) {
                return Err(PacksmithError::Validation {
                    message: format!(
                        "build mount references undeclared source '{}'",
                        mount.source
                    ),
                });
            }
            Ok(())
        };

        for mount in &self.build.mounts {
            check(mount)?;
        }
        for step in &self.build.steps {
            for mount in &step.mounts {
                check(mount)?;
            }
        }
        Ok(())
    }
}

fn substitute_source(source: &mut Source, merged: &BTreeMap<String, String>) {
    match &mut source.kind {
        SourceKind::Git(git) => {
            git.url = args::expand(&git.url, merged);
            git.commit = args::expand(&git.commit, merged);
        }
        SourceKind::Http(http) => {
            http.url = args::expand(&http.url, merged);
        }
        SourceKind::Image(image) => {
            image.reference = args::expand(&image.reference, merged);
            if let Some(pipeline) = &mut image.pipeline {
                args::expand_map(&mut pipeline.env, merged);
                for step in &mut pipeline.steps {
                    step.command = args::expand(&step.command, merged);
                    args::expand_map(&mut step.env, merged);
                    for mount in &mut step.mounts {
                        substitute_source(&mut mount.spec, merged);
                    }
                }
            }
        }
        SourceKind::Build(build) => {
            substitute_source(&mut build.source, merged);
            args::expand_map(&mut build.args, merged);
        }
        SourceKind::Context(_) | SourceKind::Inline(_) => {}
    }

    for generator in &mut source.generate {
        generator.image = args::expand(&generator.image, merged);
        args::expand_map(&mut generator.env, merged);
        for step in &mut generator.steps {
            step.command = args::expand(&step.command, merged);
            args::expand_map(&mut step.env, merged);
        }
    }
}

fn validate_source(name: &str, source: &Source) -> Result<()> {
    match &source.kind {
        SourceKind::Http(http) => {
            if http.url.is_empty() {
                return Err(PacksmithError::Validation {
                    message: format!("source '{name}': http url must not be empty"),
                });
            }
            if let Some(digest) = &http.digest {
                digest.parse::<ContentDigest>().map_err(|e| {
                    PacksmithError::Validation {
                        message: format!("source '{name}': {e}"),
                    }
                })?;
            }
        }
        SourceKind::Git(git) => {
            if git.url.is_empty() || git.commit.is_empty() {
                return Err(PacksmithError::Validation {
                    message: format!("source '{name}': git url and commit must be set"),
                });
            }
        }
        SourceKind::Inline(InlineSource::Dir(dir)) => {
            for file_name in dir.files.keys() {
                if file_name.contains('/') || file_name.contains('\\') {
                    return Err(PacksmithError::Validation {
                        message: format!(
                            "source '{name}': inline file name '{file_name}' must not contain path separators"
                        ),
                    });
                }
            }
        }
        SourceKind::Image(image) => {
            if image.reference.is_empty() {
                return Err(PacksmithError::Validation {
                    message: format!("source '{name}': image ref must not be empty"),
                });
            }
        }
        SourceKind::Build(build) => {
            validate_source(name, &build.source)?;
        }
        SourceKind::Context(_) | SourceKind::Inline(InlineSource::File(_)) => {}
    }

    for mount_source in pipeline_mounts(source) {
        validate_source(name, mount_source)?;
    }

    Ok(())
}

fn pipeline_mounts(source: &Source) -> Vec<&Source> {
    let SourceKind::Image(image) = &source.kind else {
        return Vec::new();
    };
    let Some(pipeline) = &image.pipeline else {
        return Vec::new();
    };
    pipeline
        .steps
        .iter()
        .flat_map(|s| s.mounts.iter().map(|m| &m.spec))
        .collect()
}
