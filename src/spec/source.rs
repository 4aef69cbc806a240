//! Source declarations
//!
//! A source is a named, typed declaration of how to obtain a filesystem
//! subtree. The variant is a sum type: the YAML form is a map carrying
//! exactly one variant key (`context`, `git`, `http`, `image`, `build`,
//! `inline`) next to the common fields (`path`, `includes`, `excludes`,
//! `generate`). Zero or more than one variant key is rejected at parse
//! time, so a constructed [`Source`] always has a definite kind.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A named source declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Subpath of the resolved tree to select, after everything else ran
    pub path: Option<String>,
    /// Glob filters applied to the selected tree; empty means keep all
    pub includes: Vec<String>,
    /// Glob filters removing matching paths from the selected tree
    pub excludes: Vec<String>,
    /// Generators run against this source after patches are applied
    pub generate: Vec<GeneratorSpec>,
    pub kind: SourceKind,
}

/// The source variant
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    Context(ContextSource),
    Git(GitSource),
    Http(HttpSource),
    Image(ImageSource),
    Build(Box<BuildSource>),
    Inline(InlineSource),
}

impl SourceKind {
    /// Short tag used in error messages and emitted documents
    pub fn tag(&self) -> &'static str {
        match self {
            SourceKind::Context(_) => "context",
            SourceKind::Git(_) => "git",
            SourceKind::Http(_) => "http",
            SourceKind::Image(_) => "image",
            SourceKind::Build(_) => "build",
            SourceKind::Inline(_) => "inline",
        }
    }
}

/// Reference to a build context supplied with the request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextSource {
    /// Context name; the default refers to the main build context
    #[serde(default)]
    pub name: Option<String>,
}

/// A git checkout, resolved by the solver by reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitSource {
    pub url: String,
    /// Commit-ish to check out: tag, branch or commit sha
    pub commit: String,
    /// Keep the `.git` directory in the resolved tree
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub keep_git_dir: bool,
}

/// A file downloaded over HTTP(S)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSource {
    pub url: String,
    /// Declared content digest, `sha256:<hex>`; fetched bytes must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Octal permissions to set on the downloaded file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<u32>,
}

/// A container image filesystem, optionally transformed by a command
/// pipeline run on top of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSource {
    /// Image reference, e.g. `docker.io/library/busybox:latest`
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Pipeline>,
}

/// Sequential command pipeline over an image filesystem
///
/// Steps run strictly in declared order; each step's filesystem state is
/// the input to the next.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Pipeline {
    pub steps: Vec<PipelineStep>,
    /// Environment for all steps; per-step env overrides these and the
    /// image's inherited environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}

/// One pipeline step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineStep {
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Auxiliary trees mounted read-only for this step only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<SourceMount>,
}

/// A nested source mounted at a destination path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceMount {
    pub dest: String,
    pub spec: Source,
}

/// An image built from a build file found in a nested source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSource {
    /// The source tree to build from
    pub source: Source,
    /// Build file path within the nested source; defaults to `Dockerfile`
    /// at the tree root, or the sole file when the nested source is a
    /// single inline file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    /// Build stage to stop at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

/// Inline content declared directly in the spec
#[derive(Debug, Clone, PartialEq)]
pub enum InlineSource {
    File(InlineFile),
    Dir(InlineDir),
}

/// A single inline file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InlineFile {
    #[serde(default)]
    pub contents: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<u32>,
}

/// A directory of named inline files
///
/// File names with path separators are rejected at validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InlineDir {
    #[serde(default)]
    pub files: BTreeMap<String, InlineFile>,
}

/// A generator attached to a source
///
/// Runs after the owning source's patches, inside the named worker image
/// with the patched tree mounted read-only at `/src`. The tree found at
/// `capture` afterwards is grafted into the source at `subpath`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorSpec {
    pub image: String,
    pub steps: Vec<GeneratorStep>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Directory captured from the worker after all steps; default `/out`
    #[serde(default = "default_capture")]
    pub capture: String,
    /// Graft point within the source tree; empty grafts at the root
    #[serde(default)]
    pub subpath: String,
}

fn default_capture() -> String {
    "/out".to_string()
}

/// One generator command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorStep {
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Reference to one patch applied to a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchSpec {
    /// Name of the declared source holding the patch file
    pub source: String,
    /// Path of the patch file within that source, when it is not a
    /// single-file source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Path components stripped from file names in the diff
    #[serde(default = "default_strip")]
    pub strip: usize,
}

fn default_strip() -> usize {
    1
}

// The YAML shape of a source is a single map holding the variant key and
// the common fields side by side. Parsing goes through a raw struct with
// one Option per variant, then checks that exactly one is set; this keeps
// `SourceKind` a real sum type while giving a precise error for a
// malformed declaration.
#[derive(Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<ContextSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    git: Option<GitSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    http: Option<HttpSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<ImageSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    build: Option<BuildSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline: Option<InlineSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    includes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    excludes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    generate: Vec<GeneratorSpec>,
}

impl<'de> Deserialize<'de> for Source {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawSource::deserialize(deserializer)?;

        let mut kinds: Vec<SourceKind> = Vec::new();
        if let Some(v) = raw.context {
            kinds.push(SourceKind::Context(v));
        }
        if let Some(v) = raw.git {
            kinds.push(SourceKind::Git(v));
        }
        if let Some(v) = raw.http {
            kinds.push(SourceKind::Http(v));
        }
        if let Some(v) = raw.image {
            kinds.push(SourceKind::Image(v));
        }
        if let Some(v) = raw.build {
            kinds.push(SourceKind::Build(Box::new(v)));
        }
        if let Some(v) = raw.inline {
            kinds.push(SourceKind::Inline(v));
        }

        if kinds.len() != 1 {
            return Err(D::Error::custom(format!(
                "source must set exactly one of context, git, http, image, build, inline (found {})",
                kinds.len()
            )));
        }

        Ok(Source {
            path: raw.path,
            includes: raw.includes,
            excludes: raw.excludes,
            generate: raw.generate,
            kind: kinds.remove(0),
        })
    }
}

impl Serialize for Source {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut raw = RawSource {
            path: self.path.clone(),
            includes: self.includes.clone(),
            excludes: self.excludes.clone(),
            generate: self.generate.clone(),
            ..RawSource::default()
        };
        match &self.kind {
            SourceKind::Context(v) => raw.context = Some(v.clone()),
            SourceKind::Git(v) => raw.git = Some(v.clone()),
            SourceKind::Http(v) => raw.http = Some(v.clone()),
            SourceKind::Image(v) => raw.image = Some(v.clone()),
            SourceKind::Build(v) => raw.build = Some((**v).clone()),
            SourceKind::Inline(v) => raw.inline = Some(v.clone()),
        }
        raw.serialize(serializer)
    }
}

#[derive(Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawInline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<InlineFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dir: Option<InlineDir>,
}

impl<'de> Deserialize<'de> for InlineSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawInline::deserialize(deserializer)?;
        match (raw.file, raw.dir) {
            (Some(f), None) => Ok(InlineSource::File(f)),
            (None, Some(d)) => Ok(InlineSource::Dir(d)),
            _ => Err(D::Error::custom(
                "inline source must set exactly one of file, dir",
            )),
        }
    }
}

impl Serialize for InlineSource {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut raw = RawInline::default();
        match self {
            InlineSource::File(f) => raw.file = Some(f.clone()),
            InlineSource::Dir(d) => raw.dir = Some(d.clone()),
        }
        raw.serialize(serializer)
    }
}

impl Source {
    /// Construct a source from just a variant, with no common fields set
    pub fn from_kind(kind: SourceKind) -> Self {
        Source {
            path: None,
            includes: Vec::new(),
            excludes: Vec::new(),
            generate: Vec::new(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inline_dir_source() {
        let yaml = r#"
inline:
  dir:
    files:
      app.sh:
        contents: "#!/bin/sh\n"
        permissions: 0o755
"#;
        let src: Source = serde_yaml::from_str(yaml).unwrap();
        let SourceKind::Inline(InlineSource::Dir(dir)) = &src.kind else {
            panic!("expected inline dir, got {:?}", src.kind);
        };
        assert_eq!(dir.files["app.sh"].permissions, Some(0o755));
    }

    #[test]
    fn test_parse_http_source_with_common_fields() {
        let yaml = r#"
http:
  url: https://example.com/a.tar.gz
  digest: sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa
path: sub
includes: ["**/*.c"]
"#;
        let src: Source = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(src.kind, SourceKind::Http(_)));
        assert_eq!(src.path.as_deref(), Some("sub"));
        assert_eq!(src.includes, vec!["**/*.c"]);
    }

    #[test]
    fn test_reject_two_variants() {
        let yaml = r#"
git:
  url: https://example.com/r.git
  commit: main
http:
  url: https://example.com/a
"#;
        let result: Result<Source, _> = serde_yaml::from_str(yaml);
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("exactly one of"), "got: {msg}");
    }

    #[test]
    fn test_reject_zero_variants() {
        let result: Result<Source, _> = serde_yaml::from_str("path: sub");
        assert!(result.is_err());
    }

    #[test]
    fn test_reject_inline_with_file_and_dir() {
        let yaml = r#"
inline:
  file:
    contents: x
  dir:
    files: {}
"#;
        let result: Result<Source, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_source_yaml_round_trip() {
        let yaml = r#"
image:
  ref: docker.io/library/busybox:latest
  pipeline:
    steps:
      - command: make
        env:
          CC: gcc
path: /out
"#;
        let src: Source = serde_yaml::from_str(yaml).unwrap();
        let emitted = serde_yaml::to_string(&src).unwrap();
        let again: Source = serde_yaml::from_str(&emitted).unwrap();
        assert_eq!(src, again);
    }

    #[test]
    fn test_patch_spec_default_strip() {
        let p: PatchSpec = serde_yaml::from_str("source: fix-build").unwrap();
        assert_eq!(p.strip, 1);
        assert_eq!(p.source, "fix-build");
    }
}
