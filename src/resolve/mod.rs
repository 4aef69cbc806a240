//! Source resolution
//!
//! Turns each named source declaration into a filesystem tree plus a
//! content fingerprint: variant dispatch to an op graph, subtree
//! selection, include/exclude filters, strictly ordered patches, then
//! generators. Sources resolve independently of each other; one source's
//! failure never corrupts a sibling's resolution.

pub mod generator;
pub mod patch;

use std::collections::BTreeMap;

use crate::error::{PacksmithError, Result};
use crate::fingerprint::{fingerprint_tree, ContentDigest};
use crate::solve::{ExecMount, ExecSpec, Op, Solver};
use crate::spec::{
    InlineSource, PatchSpec, Source, SourceKind, Spec,
};
use crate::tree::{Tree, DEFAULT_FILE_MODE};

/// Name used for the main build context when a context source does not
/// name one explicitly
pub const DEFAULT_CONTEXT: &str = "context";

/// A resolved source: its tree and content fingerprint
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub tree: Tree,
    pub fingerprint: String,
}

/// Resolves the sources of one spec through a solver
pub struct SourceResolver<'a> {
    spec: &'a Spec,
    solver: &'a dyn Solver,
}

impl<'a> SourceResolver<'a> {
    pub fn new(spec: &'a Spec, solver: &'a dyn Solver) -> Self {
        SourceResolver { spec, solver }
    }

    /// Resolve every declared source
    pub fn resolve_all(&self) -> Result<BTreeMap<String, ResolvedSource>> {
        let mut resolved = BTreeMap::new();
        for name in self.spec.sources.keys() {
            resolved.insert(name.clone(), self.resolve(name)?);
        }
        Ok(resolved)
    }

    /// Resolve one declared source by name
    pub fn resolve(&self, name: &str) -> Result<ResolvedSource> {
        let source = self
            .spec
            .sources
            .get(name)
            .ok_or_else(|| PacksmithError::SourceNotFound {
                name: name.to_string(),
            })?;

        let mut tree = self.resolve_source(name, source)?;

        if let Some(patches) = self.spec.patches.get(name) {
            self.apply_patches(name, &mut tree, patches)?;
        }

        generator::run_generators(name, &mut tree, &source.generate, self.solver)?;

        let fingerprint = fingerprint_tree(&tree);
        Ok(ResolvedSource { tree, fingerprint })
    }

    /// Resolve a source declaration that has no name of its own, e.g. a
    /// pipeline mount or a nested build source
    fn resolve_anonymous(&self, label: &str, source: &Source) -> Result<Tree> {
        self.resolve_source(label, source)
    }

    fn resolve_source(&self, name: &str, source: &Source) -> Result<Tree> {
        let base = self.resolve_kind(name, source)?;
        let selected = match source.path.as_deref() {
            Some(path) => base.subtree(path)?,
            None => base,
        };
        apply_filters(selected, &source.includes, &source.excludes)
    }

    fn resolve_kind(&self, name: &str, source: &Source) -> Result<Tree> {
        match &source.kind {
            SourceKind::Inline(InlineSource::File(file)) => {
                let mut tree = Tree::new();
                tree.insert_file(
                    name,
                    file.contents.as_bytes().to_vec(),
                    file.permissions.unwrap_or(DEFAULT_FILE_MODE),
                )?;
                Ok(tree)
            }
            SourceKind::Inline(InlineSource::Dir(dir)) => {
                let mut tree = Tree::new();
                for (file_name, file) in &dir.files {
                    tree.insert_file(
                        file_name,
                        file.contents.as_bytes().to_vec(),
                        file.permissions.unwrap_or(DEFAULT_FILE_MODE),
                    )?;
                }
                Ok(tree)
            }
            SourceKind::Http(http) => {
                let op = Op::Http {
                    url: http.url.clone(),
                    filename: name.to_string(),
                    mode: http.permissions.unwrap_or(DEFAULT_FILE_MODE),
                };
                let tree = self.solver.solve(&op)?;

                if let Some(declared) = &http.digest {
                    let digest: ContentDigest = declared.parse()?;
                    let (data, _) =
                        tree.file(name)
                            .ok_or_else(|| PacksmithError::FetchFailed {
                                url: http.url.clone(),
                                reason: "fetch produced no file".to_string(),
                            })?;
                    if !digest.matches(data) {
                        // The fetched bytes are dropped with the tree; they
                        // must never reach the build.
                        return Err(PacksmithError::DigestMismatch {
                            source: name.to_string(),
                            expected: digest.to_string(),
                            actual: ContentDigest::of(data).to_string(),
                        });
                    }
                }
                Ok(tree)
            }
            SourceKind::Git(git) => self.solver.solve(&Op::Git {
                url: git.url.clone(),
                commit: git.commit.clone(),
                keep_git_dir: git.keep_git_dir,
            }),
            SourceKind::Context(context) => self.solver.solve(&Op::Context {
                name: context
                    .name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CONTEXT.to_string()),
            }),
            SourceKind::Image(image) => {
                let mut current = Op::Image {
                    reference: image.reference.clone(),
                };
                let Some(pipeline) = &image.pipeline else {
                    return self.solver.solve(&current);
                };

                let image_env = self.solver.image_env(&image.reference)?;
                for (index, step) in pipeline.steps.iter().enumerate() {
                    // image env < pipeline env < step env
                    let mut env = image_env.clone();
                    env.extend(pipeline.env.clone());
                    env.extend(step.env.clone());

                    let mut mounts = Vec::new();
                    for mount in &step.mounts {
                        let label = format!("{name}:mount:{}", mount.dest);
                        let tree = self.resolve_anonymous(&label, &mount.spec)?;
                        mounts.push(ExecMount {
                            dest: mount.dest.clone(),
                            op: Op::Resolved(tree),
                        });
                    }

                    current = Op::Exec {
                        input: Box::new(current),
                        spec: ExecSpec {
                            command: step.command.clone(),
                            env,
                            workdir: pipeline.workdir.clone(),
                            mounts,
                            stdin: None,
                            context: format!(
                                "source '{name}' step {} ({})",
                                index + 1,
                                step.command
                            ),
                        },
                    };
                }
                self.solver.solve(&current)
            }
            SourceKind::Build(build) => {
                let context_label = format!("{name}:build-context");
                let context = self.resolve_anonymous(&context_label, &build.source)?;

                let dockerfile = match &build.dockerfile {
                    Some(path) => path.clone(),
                    // A single inline file is the build file itself; it
                    // resolves under the Dockerfile name below.
                    None => "Dockerfile".to_string(),
                };
                let context = match &build.source.kind {
                    SourceKind::Inline(InlineSource::File(_)) if build.dockerfile.is_none() => {
                        let mut renamed = Tree::new();
                        if let Some((data, mode)) = context.file(&context_label) {
                            renamed.insert_file(&dockerfile, data.to_vec(), mode)?;
                        }
                        renamed
                    }
                    _ => context,
                };

                self.solver.solve(&Op::ImageBuild {
                    input: Box::new(Op::Resolved(context)),
                    dockerfile,
                    target: build.target.clone(),
                    args: build.args.clone(),
                })
            }
        }
    }

    fn apply_patches(
        &self,
        name: &str,
        tree: &mut Tree,
        patches: &[PatchSpec],
    ) -> Result<()> {
        for patch in patches {
            let resolved = self.resolve(&patch.source)?;
            let data = patch_bytes(&resolved.tree, patch).ok_or_else(|| {
                PacksmithError::PatchApply {
                    source: name.to_string(),
                    patch: patch.source.clone(),
                    reason: match &patch.path {
                        Some(path) => format!("no file at '{path}' in patch source"),
                        None => {
                            "patch source holds more than one file; set `path`".to_string()
                        }
                    },
                }
            })?;
            patch::apply_patch(tree, name, &patch.source, &data, patch.strip)?;
        }
        Ok(())
    }
}

/// The patch file bytes within a resolved patch source
fn patch_bytes(tree: &Tree, patch: &PatchSpec) -> Option<Vec<u8>> {
    match &patch.path {
        Some(path) => tree.file(path).map(|(data, _)| data.to_vec()),
        None => {
            let mut files = tree.files();
            let (_, data, _) = files.next()?;
            if files.next().is_some() {
                return None;
            }
            Some(data.to_vec())
        }
    }
}

/// Apply include/exclude glob filters to a tree
fn apply_filters(mut tree: Tree, includes: &[String], excludes: &[String]) -> Result<Tree> {
    use wax::{CandidatePath, Glob, Pattern};

    if includes.is_empty() && excludes.is_empty() {
        return Ok(tree);
    }

    let compile = |patterns: &[String]| -> Result<Vec<Glob<'static>>> {
        patterns
            .iter()
            .map(|p| {
                Glob::new(p)
                    .map(Glob::into_owned)
                    .map_err(|e| PacksmithError::Validation {
                        message: format!("invalid glob '{p}': {e}"),
                    })
            })
            .collect()
    };

    let include_globs = compile(includes)?;
    let exclude_globs = compile(excludes)?;

    tree.retain(|path| {
        let candidate = CandidatePath::from(path);
        let included = include_globs.is_empty()
            || include_globs.iter().any(|g| g.matched(&candidate).is_some());
        let excluded = exclude_globs.iter().any(|g| g.matched(&candidate).is_some());
        included && !excluded
    });
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solve::LocalSolver;
    use std::collections::BTreeMap;

    fn load(yaml: &str) -> Spec {
        let full = format!(
            "name: phony\nversion: \"1.0\"\nrevision: \"1\"\ndescription: d\n{yaml}"
        );
        Spec::from_yaml(&full, &BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_inline_file_resolves_under_source_name() {
        let spec = load(
            r#"
sources:
  script:
    inline:
      file:
        contents: "#!/bin/sh\n"
        permissions: 0o755
"#,
        );
        let solver = LocalSolver::new();
        let resolved = SourceResolver::new(&spec, &solver).resolve("script").unwrap();
        let (data, mode) = resolved.tree.file("script").unwrap();
        assert_eq!(data, b"#!/bin/sh\n");
        assert_eq!(mode, 0o755);
    }

    #[test]
    fn test_inline_resolution_idempotent() {
        let spec = load(
            r#"
sources:
  src:
    inline:
      dir:
        files:
          a.txt:
            contents: alpha
          b.txt:
            contents: beta
            permissions: 0o600
"#,
        );
        let solver = LocalSolver::new();
        let resolver = SourceResolver::new(&spec, &solver);
        let first = resolver.resolve("src").unwrap();
        let second = resolver.resolve("src").unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(first.tree, second.tree);
    }

    #[test]
    fn test_path_selection() {
        let spec = load(
            r#"
sources:
  src:
    inline:
      dir:
        files:
          kept.txt:
            contents: k
    path: kept.txt
"#,
        );
        let solver = LocalSolver::new();
        let resolved = SourceResolver::new(&spec, &solver).resolve("src").unwrap();
        assert_eq!(resolved.tree.len(), 1);
        assert!(resolved.tree.file("kept.txt").is_some());
    }

    #[test]
    fn test_includes_excludes() {
        let spec = load(
            r#"
sources:
  src:
    inline:
      dir:
        files:
          keep.c:
            contents: c
          drop.o:
            contents: o
          keep.h:
            contents: h
    includes: ["*.c", "*.h"]
    excludes: ["keep.h"]
"#,
        );
        let solver = LocalSolver::new();
        let resolved = SourceResolver::new(&spec, &solver).resolve("src").unwrap();
        assert!(resolved.tree.contains("keep.c"));
        assert!(!resolved.tree.contains("drop.o"));
        assert!(!resolved.tree.contains("keep.h"));
    }

    #[test]
    fn test_undeclared_source() {
        let spec = load("");
        let solver = LocalSolver::new();
        let err = SourceResolver::new(&spec, &solver).resolve("nope").unwrap_err();
        assert!(matches!(err, PacksmithError::SourceNotFound { .. }));
    }

    #[test]
    fn test_patch_changes_fingerprint() {
        let base = r#"
sources:
  src:
    inline:
      dir:
        files:
          f.txt:
            contents: "hello\n"
"#;
        let patched = r#"
sources:
  src:
    inline:
      dir:
        files:
          f.txt:
            contents: "hello\n"
  fix:
    inline:
      file:
        contents: "--- a/f.txt\n+++ b/f.txt\n@@ -1 +1 @@\n-hello\n+goodbye\n"
patches:
  src:
    - source: fix
"#;
        let solver = LocalSolver::new();

        let plain = load(base);
        let unpatched = SourceResolver::new(&plain, &solver).resolve("src").unwrap();

        let spec = load(patched);
        let resolved = SourceResolver::new(&spec, &solver).resolve("src").unwrap();

        assert_eq!(resolved.tree.file("f.txt").unwrap().0, b"goodbye\n");
        assert_ne!(unpatched.fingerprint, resolved.fingerprint);
    }
}
