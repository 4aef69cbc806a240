//! Host-side solver
//!
//! Resolves op graphs directly on the local machine: file operations stay
//! in memory, commands run under `/bin/sh` in a temp-directory sandbox,
//! HTTP fetches use a blocking client and git checkouts go through libgit2.
//! Image and context references must be registered up front; there is no
//! registry access. Build-file image builds support the subset of
//! directives a spec's nested build realistically uses (`FROM`, `RUN`,
//! `COPY`, `ENV`, `WORKDIR`, multi-stage with `AS`).

use std::collections::BTreeMap;
use std::io::Write;
use std::process::{Command, Stdio};

use tempfile::TempDir;

use crate::error::{PacksmithError, Result};
use crate::tree::{normalize_path, Tree};

use super::{ExecMount, ExecResult, ExecSpec, Op, Solver};

const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// An image registered with the solver: its filesystem plus baked-in env
#[derive(Debug, Clone, Default)]
pub struct ImageDef {
    pub tree: Tree,
    pub env: BTreeMap<String, String>,
}

/// Solver executing everything on the local machine
#[derive(Debug, Default)]
pub struct LocalSolver {
    images: BTreeMap<String, ImageDef>,
    contexts: BTreeMap<String, Tree>,
}

impl LocalSolver {
    pub fn new() -> Self {
        LocalSolver::default()
    }

    /// Register an image filesystem under a reference
    pub fn with_image(
        mut self,
        reference: &str,
        tree: Tree,
        env: BTreeMap<String, String>,
    ) -> Self {
        self.images
            .insert(reference.to_string(), ImageDef { tree, env });
        self
    }

    /// Register a build context under a name
    pub fn with_context(mut self, name: &str, tree: Tree) -> Self {
        self.contexts.insert(name.to_string(), tree);
        self
    }

    fn image(&self, reference: &str) -> Result<&ImageDef> {
        self.images
            .get(reference)
            .ok_or_else(|| PacksmithError::UnsupportedOp {
                op: format!("image '{reference}' is not registered with the local solver"),
            })
    }

    fn context(&self, name: &str) -> Result<&Tree> {
        self.contexts
            .get(name)
            .ok_or_else(|| PacksmithError::UnsupportedOp {
                op: format!("build context '{name}' is not registered with the local solver"),
            })
    }

    fn fetch_http(&self, url: &str) -> Result<Vec<u8>> {
        let response =
            reqwest::blocking::get(url).map_err(|e| PacksmithError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(PacksmithError::FetchFailed {
                url: url.to_string(),
                reason: format!("server returned {}", response.status()),
            });
        }
        let bytes = response.bytes().map_err(|e| PacksmithError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    fn checkout_git(&self, url: &str, commit: &str, keep_git_dir: bool) -> Result<Tree> {
        let dir = TempDir::new()?;
        let git_err = |e: git2::Error| PacksmithError::GitFailed {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let repo = git2::Repository::clone(url, dir.path()).map_err(git_err)?;
        let object = repo
            .revparse_single(commit)
            .map_err(git_err)?
            .peel(git2::ObjectType::Commit)
            .map_err(git_err)?;
        repo.checkout_tree(&object, Some(git2::build::CheckoutBuilder::new().force()))
            .map_err(git_err)?;
        repo.set_head_detached(object.id()).map_err(git_err)?;
        drop(repo);

        let mut tree = Tree::from_dir(dir.path())?;
        if !keep_git_dir {
            tree.remove(".git");
        }
        Ok(tree)
    }

    fn run_sandboxed(&self, input: Tree, spec: &ExecSpec) -> Result<ExecResult> {
        let sandbox = TempDir::new()?;
        let root = sandbox.path();
        input.write_to(root)?;

        // Materialize mounts; their paths are excluded from the read-back.
        let mut mount_paths = Vec::new();
        for ExecMount { dest, op } in &spec.mounts {
            let dest_rel = normalize_path(dest)?;
            if dest_rel.is_empty() {
                return Err(PacksmithError::InvalidPath {
                    path: dest.clone(),
                    reason: "mount destination cannot be the root".to_string(),
                });
            }
            let tree = self.solve(op)?;
            tree.write_to(&root.join(&dest_rel))?;
            mount_paths.push(dest_rel);
        }

        let workdir = match &spec.workdir {
            Some(dir) => {
                let rel = normalize_path(dir)?;
                let abs = root.join(&rel);
                std::fs::create_dir_all(&abs)?;
                abs
            }
            None => root.to_path_buf(),
        };

        let mut env = spec.env.clone();
        env.entry("PATH".to_string())
            .or_insert_with(|| DEFAULT_PATH.to_string());

        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&spec.command)
            .current_dir(&workdir)
            .env_clear()
            .envs(&env)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(stdin_data) = &spec.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(stdin_data.as_bytes())?;
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(PacksmithError::StepExecution {
                context: spec.context.clone(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let mut tree = Tree::from_dir(root)?;
        for mount in mount_paths {
            tree.remove(&mount);
        }

        Ok(ExecResult {
            tree,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn build_image(
        &self,
        context: &Tree,
        dockerfile: &str,
        target: Option<&str>,
        args: &BTreeMap<String, String>,
    ) -> Result<Tree> {
        let path = normalize_path(dockerfile)?;
        let (data, _) = context
            .file(&path)
            .ok_or_else(|| PacksmithError::InvalidPath {
                path: path.clone(),
                reason: "build file not found in build context".to_string(),
            })?;
        let text = String::from_utf8_lossy(data).into_owned();

        let mut stages: BTreeMap<String, Tree> = BTreeMap::new();
        let mut current: Option<(Option<String>, Tree, BTreeMap<String, String>, String)> = None;
        let mut done: Option<Tree> = None;

        let finish =
            |stage: Option<(Option<String>, Tree, BTreeMap<String, String>, String)>,
             stages: &mut BTreeMap<String, Tree>|
             -> Option<Tree> {
                stage.map(|(name, tree, _, _)| {
                    if let Some(name) = name {
                        stages.insert(name, tree.clone());
                    }
                    tree
                })
            };

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (directive, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let rest = rest.trim();

            match directive.to_ascii_uppercase().as_str() {
                "FROM" => {
                    if let Some(tree) = finish(current.take(), &mut stages) {
                        done = Some(tree);
                    }
                    let mut parts = rest.split_whitespace();
                    let base_ref = parts.next().unwrap_or_default();
                    let stage_name = match (parts.next(), parts.next()) {
                        (Some(kw), Some(name)) if kw.eq_ignore_ascii_case("as") => {
                            Some(name.to_string())
                        }
                        _ => None,
                    };
                    let base_ref = crate::spec::args::expand(base_ref, args);
                    let (tree, env) = if let Some(stage) = stages.get(base_ref.as_str()) {
                        (stage.clone(), BTreeMap::new())
                    } else if base_ref == "scratch" {
                        (Tree::new(), BTreeMap::new())
                    } else {
                        let image = self.image(&base_ref)?;
                        (image.tree.clone(), image.env.clone())
                    };
                    current = Some((stage_name, tree, env, String::new()));
                }
                "RUN" => {
                    let Some((name, tree, env, workdir)) = current.take() else {
                        continue;
                    };
                    let mut full_env = env.clone();
                    for (k, v) in args {
                        full_env.entry(k.clone()).or_insert_with(|| v.clone());
                    }
                    let spec = ExecSpec {
                        command: rest.to_string(),
                        env: full_env,
                        workdir: if workdir.is_empty() {
                            None
                        } else {
                            Some(workdir.clone())
                        },
                        mounts: Vec::new(),
                        stdin: None,
                        context: format!("image build RUN ({rest})"),
                    };
                    let result = self.run_sandboxed(tree, &spec)?;
                    current = Some((name, result.tree, env, workdir));
                }
                "COPY" => {
                    let Some((name, mut tree, env, workdir)) = current.take() else {
                        continue;
                    };
                    let mut parts = rest.split_whitespace();
                    let (src, dst) = match (parts.next(), parts.next()) {
                        (Some(s), Some(d)) => (s, d),
                        _ => {
                            return Err(PacksmithError::Validation {
                                message: format!("malformed COPY directive: {rest}"),
                            });
                        }
                    };
                    let src_norm = normalize_path(src)?;
                    let dst_norm = normalize_path(dst)?;
                    if let Some((data, mode)) = context.file(&src_norm) {
                        // a file copied to a `dir/` lands inside it, to any
                        // other destination it becomes that path
                        let dest_path = if dst.ends_with('/') {
                            crate::tree::join(&dst_norm, crate::tree::basename(&src_norm))
                        } else {
                            dst_norm
                        };
                        tree.insert_file(&dest_path, data.to_vec(), mode)?;
                    } else {
                        let selected = context.subtree(&src_norm)?;
                        tree.merge(&selected, &dst_norm)?;
                    }
                    current = Some((name, tree, env, workdir));
                }
                "ENV" => {
                    if let Some((_, _, env, _)) = &mut current {
                        if let Some((k, v)) = rest.split_once('=') {
                            env.insert(k.trim().to_string(), v.trim().to_string());
                        }
                    }
                }
                "WORKDIR" => {
                    if let Some((_, _, _, workdir)) = &mut current {
                        *workdir = rest.to_string();
                    }
                }
                // Metadata-only directives have no filesystem effect here
                "LABEL" | "EXPOSE" | "CMD" | "ENTRYPOINT" | "USER" | "ARG" | "VOLUME" => {}
                other => {
                    return Err(PacksmithError::UnsupportedOp {
                        op: format!("build file directive '{other}' is not supported"),
                    });
                }
            }
        }

        if let Some(tree) = finish(current, &mut stages) {
            done = Some(tree);
        }

        if let Some(target_name) = target {
            return stages
                .get(target_name)
                .cloned()
                .ok_or_else(|| PacksmithError::Validation {
                    message: format!("build stage '{target_name}' not found in build file"),
                });
        }

        done.ok_or_else(|| PacksmithError::Validation {
            message: "build file contains no stages".to_string(),
        })
    }
}

impl Solver for LocalSolver {
    fn solve(&self, op: &Op) -> Result<Tree> {
        match op {
            Op::Scratch => Ok(Tree::new()),
            Op::Resolved(tree) => Ok(tree.clone()),
            Op::Image { reference } => Ok(self.image(reference)?.tree.clone()),
            Op::Context { name } => Ok(self.context(name)?.clone()),
            Op::Git {
                url,
                commit,
                keep_git_dir,
            } => self.checkout_git(url, commit, *keep_git_dir),
            Op::Http {
                url,
                filename,
                mode,
            } => {
                let bytes = self.fetch_http(url)?;
                let mut tree = Tree::new();
                tree.insert_file(filename, bytes, *mode)?;
                Ok(tree)
            }
            Op::Mkfile {
                input,
                path,
                data,
                mode,
            } => {
                let mut tree = self.solve(input)?;
                tree.insert_file(path, data.clone(), *mode)?;
                Ok(tree)
            }
            Op::Mkdir { input, path, mode } => {
                let mut tree = self.solve(input)?;
                tree.insert_dir(path, *mode)?;
                Ok(tree)
            }
            Op::Merge { inputs } => {
                let mut tree = Tree::new();
                for (at, op) in inputs {
                    let sub = self.solve(op)?;
                    tree.merge(&sub, at)?;
                }
                Ok(tree)
            }
            Op::Subtree { input, path } => {
                let tree = self.solve(input)?;
                tree.subtree(path)
            }
            Op::Exec { input, spec } => Ok(self.exec(input, spec)?.tree),
            Op::ImageBuild {
                input,
                dockerfile,
                target,
                args,
            } => {
                let context = self.solve(input)?;
                self.build_image(&context, dockerfile, target.as_deref(), args)
            }
        }
    }

    fn exec(&self, base: &Op, spec: &ExecSpec) -> Result<ExecResult> {
        let input = self.solve(base)?;
        self.run_sandboxed(input, spec)
    }

    fn image_env(&self, reference: &str) -> Result<BTreeMap<String, String>> {
        Ok(self.image(reference)?.env.clone())
    }
}
