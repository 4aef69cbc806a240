//! Declarative test execution
//!
//! Runs a spec's tests against a built filesystem tree: command steps
//! first (through the solver, with stdio checks), then the file-state
//! assertions. Every assertion of a test is evaluated and every failure
//! reported together; a single failing assertion fails the whole test.

use crate::error::{PacksmithError, Result};
use crate::solve::{ExecSpec, Op, Solver};
use crate::spec::{FileCheck, TestSpec};
use crate::tree::{normalize_path, Tree};

/// Run every test against the tree, stopping at the first failing test
pub fn run_tests(tests: &[TestSpec], tree: &Tree, solver: &dyn Solver) -> Result<()> {
    for test in tests {
        run_test(test, tree, solver)?;
    }
    Ok(())
}

fn run_test(test: &TestSpec, tree: &Tree, solver: &dyn Solver) -> Result<()> {
    let mut failures = Vec::new();

    for (index, step) in test.steps.iter().enumerate() {
        let mut env = test.env.clone();
        env.extend(step.env.clone());

        let spec = ExecSpec {
            command: step.command.clone(),
            env,
            workdir: None,
            mounts: Vec::new(),
            stdin: step.stdin.clone(),
            context: format!("test '{}' step {} ({})", test.name, index + 1, step.command),
        };

        match solver.exec(&Op::Resolved(tree.clone()), &spec) {
            Ok(result) => {
                let stdout = String::from_utf8_lossy(&result.stdout);
                let stderr = String::from_utf8_lossy(&result.stderr);
                failures.extend(
                    step.stdout
                        .check(&stdout, &format!("step {} stdout", index + 1)),
                );
                failures.extend(
                    step.stderr
                        .check(&stderr, &format!("step {} stderr", index + 1)),
                );
            }
            Err(PacksmithError::StepExecution {
                status, stderr, ..
            }) => {
                failures.push(format!(
                    "step {} exited with status {status}: {}",
                    index + 1,
                    stderr.trim_end()
                ));
            }
            Err(other) => return Err(other),
        }
    }

    for (path, check) in &test.files {
        check_file(tree, path, check, &mut failures);
    }

    if failures.is_empty() {
        return Ok(());
    }
    Err(PacksmithError::TestFailed {
        name: test.name.clone(),
        failures: failures.join("\n"),
    })
}

/// Evaluate one path assertion, appending failure messages
fn check_file(tree: &Tree, path: &str, check: &FileCheck, failures: &mut Vec<String>) {
    let normalized = match normalize_path(path) {
        Ok(p) => p,
        Err(e) => {
            failures.push(format!("{path}: {e}"));
            return;
        }
    };

    if check.not_exist {
        if tree.contains(&normalized) {
            failures.push(format!("{path}: expected to not exist"));
        }
        return;
    }

    if !tree.contains(&normalized) {
        failures.push(format!("{path}: expected to exist"));
        return;
    }

    if check.is_dir && !tree.is_dir(&normalized) {
        failures.push(format!("{path}: expected a directory"));
    }

    let wants_contents = check.equals.is_some() || !check.contains.is_empty();
    if wants_contents || check.permissions.is_some() {
        let Some((data, mode)) = tree.file(&normalized) else {
            if wants_contents {
                failures.push(format!("{path}: expected a regular file"));
            }
            return;
        };

        if let Some(want) = &check.equals {
            if data != want.as_bytes() {
                failures.push(format!(
                    "{path}: contents mismatch (expected {} bytes, got {} bytes)",
                    want.len(),
                    data.len()
                ));
            }
        }
        let text = String::from_utf8_lossy(data);
        for want in &check.contains {
            if !text.contains(want) {
                failures.push(format!("{path}: expected to contain {want:?}"));
            }
        }
        if let Some(want) = check.permissions {
            if mode != want {
                failures.push(format!(
                    "{path}: expected mode {want:o}, got {mode:o}"
                ));
            }
        }
    }
}
