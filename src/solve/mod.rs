//! The execution-graph boundary
//!
//! The compiler never runs anything itself: it describes filesystem-
//! producing operations as an [`Op`] graph and hands the graph to a
//! [`Solver`], the external collaborator that schedules, parallelizes and
//! caches the actual work. Ops carry deterministic content fingerprints so
//! a solver may memoize solves; the core keeps no cache of its own.

pub mod local;

use std::collections::BTreeMap;

use blake3::Hasher;

use crate::error::Result;
use crate::tree::Tree;

pub use local::LocalSolver;

/// A filesystem-producing operation
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// The empty filesystem
    Scratch,
    /// An already-resolved filesystem state, reusable as a reference
    Resolved(Tree),
    /// The root filesystem of a named image
    Image { reference: String },
    /// A named build context supplied with the request
    Context { name: String },
    /// A git checkout, resolved by reference
    Git {
        url: String,
        commit: String,
        keep_git_dir: bool,
    },
    /// A single file downloaded over HTTP(S)
    Http {
        url: String,
        filename: String,
        mode: u32,
    },
    /// The input tree with one file written into it
    Mkfile {
        input: Box<Op>,
        path: String,
        data: Vec<u8>,
        mode: u32,
    },
    /// The input tree with a directory created in it
    Mkdir {
        input: Box<Op>,
        path: String,
        mode: u32,
    },
    /// Trees grafted at paths, later entries overriding earlier ones
    Merge { inputs: Vec<(String, Op)> },
    /// A subtree of the input
    Subtree { input: Box<Op>, path: String },
    /// A command run over the input tree
    Exec { input: Box<Op>, spec: ExecSpec },
    /// An image built from a build file within the input tree
    ImageBuild {
        input: Box<Op>,
        dockerfile: String,
        target: Option<String>,
        args: BTreeMap<String, String>,
    },
}

/// A command to run over a tree
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecSpec {
    pub command: String,
    pub env: BTreeMap<String, String>,
    pub workdir: Option<String>,
    /// Auxiliary trees attached read-only for the duration of the command
    pub mounts: Vec<ExecMount>,
    pub stdin: Option<String>,
    /// Human-readable context used in failure diagnostics,
    /// e.g. `build step 2 (make install)`
    pub context: String,
}

/// One read-only mount for an exec
#[derive(Debug, Clone, PartialEq)]
pub struct ExecMount {
    pub dest: String,
    pub op: Op,
}

/// Output of an exec with captured stdio
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub tree: Tree,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// The graph-execution collaborator
pub trait Solver {
    /// Resolve an op graph into a filesystem tree
    fn solve(&self, op: &Op) -> Result<Tree>;

    /// Run one command over a base graph, capturing stdio
    ///
    /// Used where the caller needs the streams (test steps); `solve` on an
    /// [`Op::Exec`] discards them.
    fn exec(&self, base: &Op, spec: &ExecSpec) -> Result<ExecResult>;

    /// Environment baked into an image, inherited by pipeline steps
    fn image_env(&self, reference: &str) -> Result<BTreeMap<String, String>>;
}

impl Op {
    /// Deterministic content fingerprint of the graph
    ///
    /// Two structurally identical graphs over identical resolved inputs
    /// fingerprint identically, which is what lets a solver memoize.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Hasher::new();
        self.hash_into(&mut hasher);
        format!("op:{}", hasher.finalize().to_hex())
    }

    fn hash_into(&self, hasher: &mut Hasher) {
        match self {
            Op::Scratch => {
                hasher.update(b"scratch");
            }
            Op::Resolved(tree) => {
                hasher.update(b"resolved\0");
                hasher.update(crate::fingerprint::fingerprint_tree(tree).as_bytes());
            }
            Op::Image { reference } => {
                hasher.update(b"image\0");
                hasher.update(reference.as_bytes());
            }
            Op::Context { name } => {
                hasher.update(b"context\0");
                hasher.update(name.as_bytes());
            }
            Op::Git {
                url,
                commit,
                keep_git_dir,
            } => {
                hasher.update(b"git\0");
                hasher.update(url.as_bytes());
                hasher.update(b"\0");
                hasher.update(commit.as_bytes());
                hasher.update(if *keep_git_dir { b"\01" } else { b"\00" });
            }
            Op::Http {
                url,
                filename,
                mode,
            } => {
                hasher.update(b"http\0");
                hasher.update(url.as_bytes());
                hasher.update(b"\0");
                hasher.update(filename.as_bytes());
                hasher.update(&mode.to_le_bytes());
            }
            Op::Mkfile {
                input,
                path,
                data,
                mode,
            } => {
                hasher.update(b"mkfile\0");
                input.hash_into(hasher);
                hasher.update(path.as_bytes());
                hasher.update(b"\0");
                hasher.update(data);
                hasher.update(&mode.to_le_bytes());
            }
            Op::Mkdir { input, path, mode } => {
                hasher.update(b"mkdir\0");
                input.hash_into(hasher);
                hasher.update(path.as_bytes());
                hasher.update(&mode.to_le_bytes());
            }
            Op::Merge { inputs } => {
                hasher.update(b"merge\0");
                for (at, op) in inputs {
                    hasher.update(at.as_bytes());
                    hasher.update(b"\0");
                    op.hash_into(hasher);
                }
            }
            Op::Subtree { input, path } => {
                hasher.update(b"subtree\0");
                input.hash_into(hasher);
                hasher.update(path.as_bytes());
            }
            Op::Exec { input, spec } => {
                hasher.update(b"exec\0");
                input.hash_into(hasher);
                hasher.update(spec.command.as_bytes());
                hasher.update(b"\0");
                for (k, v) in &spec.env {
                    hasher.update(k.as_bytes());
                    hasher.update(b"=");
                    hasher.update(v.as_bytes());
                    hasher.update(b"\0");
                }
                if let Some(workdir) = &spec.workdir {
                    hasher.update(workdir.as_bytes());
                }
                hasher.update(b"\0");
                if let Some(stdin) = &spec.stdin {
                    hasher.update(stdin.as_bytes());
                }
                hasher.update(b"\0");
                for mount in &spec.mounts {
                    hasher.update(mount.dest.as_bytes());
                    hasher.update(b"\0");
                    mount.op.hash_into(hasher);
                }
            }
            Op::ImageBuild {
                input,
                dockerfile,
                target,
                args,
            } => {
                hasher.update(b"imagebuild\0");
                input.hash_into(hasher);
                hasher.update(dockerfile.as_bytes());
                hasher.update(b"\0");
                if let Some(target) = target {
                    hasher.update(target.as_bytes());
                }
                hasher.update(b"\0");
                for (k, v) in args {
                    hasher.update(k.as_bytes());
                    hasher.update(b"=");
                    hasher.update(v.as_bytes());
                    hasher.update(b"\0");
                }
            }
        }
    }
}
