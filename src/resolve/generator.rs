//! Source generators
//!
//! A generator derives auxiliary content from a source after its patches
//! have been applied, e.g. a language module cache vendored next to the
//! code. The patched tree is mounted read-only at `/src` inside the
//! generator's worker image, the declared steps run in order, and whatever
//! ends up under the capture directory is grafted back into the source.
//! Output is deterministic given the patched tree and the declared steps.

use crate::error::{PacksmithError, Result};
use crate::solve::{ExecMount, ExecSpec, Op, Solver};
use crate::spec::GeneratorSpec;
use crate::tree::Tree;

/// Mount point of the patched source inside the worker
pub const SOURCE_MOUNT: &str = "/src";

/// Run every generator of a source against its patched tree
///
/// A failure aborts only this source's generated output; sibling sources
/// are unaffected because each source resolves independently.
pub fn run_generators(
    source_name: &str,
    tree: &mut Tree,
    generators: &[GeneratorSpec],
    solver: &dyn Solver,
) -> Result<()> {
    for generator in generators {
        let generated = run_generator(source_name, tree, generator, solver)?;
        tree.merge(&generated, &generator.subpath)
            .map_err(|e| generator_error(source_name, e))?;
    }
    Ok(())
}

fn run_generator(
    source_name: &str,
    tree: &Tree,
    generator: &GeneratorSpec,
    solver: &dyn Solver,
) -> Result<Tree> {
    let image_env = solver
        .image_env(&generator.image)
        .map_err(|e| generator_error(source_name, e))?;

    let mut current = Op::Image {
        reference: generator.image.clone(),
    };

    for step in &generator.steps {
        let mut env = image_env.clone();
        env.extend(generator.env.clone());
        env.extend(step.env.clone());

        current = Op::Exec {
            input: Box::new(current),
            spec: ExecSpec {
                command: step.command.clone(),
                env,
                workdir: None,
                mounts: vec![ExecMount {
                    dest: SOURCE_MOUNT.to_string(),
                    op: Op::Resolved(tree.clone()),
                }],
                stdin: None,
                context: format!(
                    "generator for source '{source_name}' ({})",
                    step.command
                ),
            },
        };
    }

    let captured = Op::Subtree {
        input: Box::new(current),
        path: generator.capture.clone(),
    };

    solver
        .solve(&captured)
        .map_err(|e| generator_error(source_name, e))
}

fn generator_error(source_name: &str, inner: PacksmithError) -> PacksmithError {
    PacksmithError::Generator {
        source: source_name.to_string(),
        reason: inner.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solve::LocalSolver;
    use crate::spec::GeneratorStep;
    use std::collections::BTreeMap;

    fn generator(steps: &[&str]) -> GeneratorSpec {
        GeneratorSpec {
            image: "worker:latest".to_string(),
            steps: steps
                .iter()
                .map(|c| GeneratorStep {
                    command: c.to_string(),
                    env: BTreeMap::new(),
                })
                .collect(),
            env: BTreeMap::new(),
            capture: "/out".to_string(),
            subpath: "vendor".to_string(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_generator_grafts_captured_output() {
        let solver =
            LocalSolver::new().with_image("worker:latest", Tree::new(), BTreeMap::new());

        let mut tree = Tree::new();
        tree.insert_file("mod.lock", b"dep v1\n".to_vec(), 0o644)
            .unwrap();

        let spec = generator(&["mkdir -p out && cp src/mod.lock out/cached.lock"]);
        run_generators("src", &mut tree, &[spec], &solver).unwrap();

        assert_eq!(tree.file("vendor/cached.lock").unwrap().0, b"dep v1\n");
        assert!(tree.file("mod.lock").is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_generator_deterministic() {
        let solver =
            LocalSolver::new().with_image("worker:latest", Tree::new(), BTreeMap::new());

        let build = || {
            let mut tree = Tree::new();
            tree.insert_file("mod.lock", b"dep v1\n".to_vec(), 0o644)
                .unwrap();
            let spec = generator(&["mkdir -p out && cp src/mod.lock out/cached.lock"]);
            run_generators("src", &mut tree, &[spec], &solver).unwrap();
            crate::fingerprint::fingerprint_tree(&tree)
        };
        assert_eq!(build(), build());
    }

    #[cfg(unix)]
    #[test]
    fn test_generator_failure_is_scoped() {
        let solver =
            LocalSolver::new().with_image("worker:latest", Tree::new(), BTreeMap::new());

        let mut tree = Tree::new();
        let spec = generator(&["exit 9"]);
        let err = run_generators("src", &mut tree, &[spec], &solver).unwrap_err();
        let PacksmithError::Generator { source, .. } = &err else {
            panic!("expected Generator error, got {err:?}");
        };
        assert_eq!(source, "src");
    }

    #[test]
    fn test_unregistered_worker_image() {
        let solver = LocalSolver::new();
        let mut tree = Tree::new();
        let spec = generator(&["true"]);
        let err = run_generators("src", &mut tree, &[spec], &solver).unwrap_err();
        assert!(matches!(err, PacksmithError::Generator { .. }));
    }
}
