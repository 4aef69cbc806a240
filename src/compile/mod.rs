//! Build-graph compilation
//!
//! Turns the spec's ordered build steps plus the resolved source trees
//! into a single output tree. Every resolved source is grafted at
//! `/<name>` first; steps then run strictly in order, each seeing the
//! previous step's filesystem mutations, with declared sources attached
//! as read-only mounts. A step failure is fatal to the whole target; no
//! partial output tree is ever produced.

use std::collections::BTreeMap;

use crate::error::{PacksmithError, Result};
use crate::resolve::ResolvedSource;
use crate::solve::{ExecMount, ExecSpec, Op, Solver};
use crate::spec::{NamedMount, Spec};
use crate::tree::Tree;

/// Compile and run the build, producing the build output tree
pub fn build_output(
    spec: &Spec,
    sources: &BTreeMap<String, ResolvedSource>,
    solver: &dyn Solver,
) -> Result<Tree> {
    let mut tree = Tree::new();
    for (name, resolved) in sources {
        tree.merge(&resolved.tree, name)?;
    }

    for (index, step) in spec.build.steps.iter().enumerate() {
        // accumulated build env, step env last
        let mut env = spec.build.env.clone();
        env.extend(step.env.clone());

        let mut mounts = Vec::new();
        for named in spec.build.mounts.iter().chain(&step.mounts) {
            mounts.push(resolve_mount(named, sources)?);
        }

        let op = Op::Exec {
            input: Box::new(Op::Resolved(tree)),
            spec: ExecSpec {
                command: step.command.clone(),
                env,
                workdir: spec.build.workdir.clone(),
                mounts,
                stdin: None,
                context: format!("build step {} ({})", index + 1, step.command),
            },
        };
        tree = solver.solve(&op)?;
    }

    Ok(tree)
}

fn resolve_mount(
    mount: &NamedMount,
    sources: &BTreeMap<String, ResolvedSource>,
) -> Result<ExecMount> {
    let resolved = sources
        .get(&mount.source)
        .ok_or_else(|| PacksmithError::SourceNotFound {
            name: mount.source.clone(),
        })?;
    Ok(ExecMount {
        dest: mount.dest.clone(),
        op: Op::Resolved(resolved.tree.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::SourceResolver;
    use crate::solve::LocalSolver;

    fn load(yaml: &str) -> Spec {
        let full = format!(
            "name: phony\nversion: \"1.0\"\nrevision: \"1\"\ndescription: d\n{yaml}"
        );
        Spec::from_yaml(&full, &BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_sources_grafted_under_their_names() {
        let spec = load(
            r#"
sources:
  src:
    inline:
      dir:
        files:
          phony.sh:
            contents: "#!/bin/sh\necho 'phony'\n"
            permissions: 0o755
"#,
        );
        let solver = LocalSolver::new();
        let sources = SourceResolver::new(&spec, &solver).resolve_all().unwrap();
        let out = build_output(&spec, &sources, &solver).unwrap();

        let (data, mode) = out.file("src/phony.sh").unwrap();
        assert_eq!(data, b"#!/bin/sh\necho 'phony'\n");
        assert_eq!(mode, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn test_steps_run_in_order_with_state() {
        let spec = load(
            r#"
sources:
  src:
    inline:
      dir:
        files:
          input.txt:
            contents: "payload\n"
build:
  env:
    OUT: out
  steps:
    - command: mkdir -p "$OUT" && cp src/input.txt "$OUT"/copy.txt
    - command: printf done >> "$OUT"/copy.txt
"#,
        );
        let solver = LocalSolver::new();
        let sources = SourceResolver::new(&spec, &solver).resolve_all().unwrap();
        let out = build_output(&spec, &sources, &solver).unwrap();
        assert_eq!(out.file("out/copy.txt").unwrap().0, b"payload\ndone");
    }

    #[cfg(unix)]
    #[test]
    fn test_step_env_overrides_build_env() {
        let spec = load(
            r#"
build:
  env:
    NAME: build-level
  steps:
    - command: printf '%s' "$NAME" > witness.txt
      env:
        NAME: step-level
"#,
        );
        let solver = LocalSolver::new();
        let out = build_output(&spec, &BTreeMap::new(), &solver).unwrap();
        assert_eq!(out.file("witness.txt").unwrap().0, b"step-level");
    }

    #[cfg(unix)]
    #[test]
    fn test_step_failure_is_fatal() {
        let spec = load(
            r#"
build:
  steps:
    - command: exit 7
    - command: touch never.txt
"#,
        );
        let solver = LocalSolver::new();
        let err = build_output(&spec, &BTreeMap::new(), &solver).unwrap_err();
        let PacksmithError::StepExecution { status, context, .. } = err else {
            panic!("expected StepExecution");
        };
        assert_eq!(status, 7);
        assert!(context.contains("build step 1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_named_mounts_attach_sources() {
        let spec = load(
            r#"
sources:
  src:
    inline:
      dir:
        files:
          main.txt:
            contents: main
  extra:
    inline:
      dir:
        files:
          dep.txt:
            contents: dep
build:
  steps:
    - command: cp deps/dep.txt from-mount.txt
      mounts:
        - source: extra
          dest: deps
"#,
        );
        let solver = LocalSolver::new();
        let sources = SourceResolver::new(&spec, &solver).resolve_all().unwrap();
        let out = build_output(&spec, &sources, &solver).unwrap();
        assert_eq!(out.file("from-mount.txt").unwrap().0, b"dep");
        // the mount itself is not part of the output
        assert!(!out.contains("deps"));
    }
}
