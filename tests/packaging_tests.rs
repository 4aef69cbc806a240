//! End-to-end packaging scenarios

mod common;

use std::io::Read;

use packsmith::distro::BackendRegistry;
use packsmith::error::PacksmithError;
use packsmith::platform::Platform;
use packsmith::repo::signing;
use packsmith::request::{FrontendRegistry, Session};
use packsmith::router::builtin::build_router;
use packsmith::router::TargetProvider;
use packsmith::solve::LocalSolver;
use packsmith::spec::Spec;
use packsmith::tree::Tree;

use common::spec_with;

fn read_zip_entries(archive: &[u8]) -> Vec<(String, Vec<u8>, u32)> {
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive.to_vec())).unwrap();
    let mut entries = Vec::new();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        let mode = file.unix_mode().unwrap_or(0) & 0o7777;
        entries.push((file.name().to_string(), data, mode));
    }
    entries
}

fn execute(spec: &Spec, target: &str) -> packsmith::request::BuildOutput {
    let solver = LocalSolver::new();
    let frontends = FrontendRegistry::new();
    let session = Session::new(&solver, &frontends);
    let registry = BackendRegistry::builtins();
    build_router(spec, &registry)
        .execute(target, &session)
        .unwrap()
}

#[test]
fn single_binary_extraction_archive() {
    let spec = spec_with(
        r#"
sources:
  src:
    inline:
      dir:
        files:
          phony.sh:
            contents: "#!/bin/sh\necho 'phony'\n"
            permissions: 0o755
artifacts:
  binaries:
    src/phony.sh: {}
"#,
    );
    let output = execute(&spec, "bin/zip");

    let (archive, _) = output.tree.file("binaries.zip").unwrap();
    let entries = read_zip_entries(archive);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "phony.sh");
    assert_eq!(entries[0].1, b"#!/bin/sh\necho 'phony'\n");
    assert_eq!(entries[0].2, 0o755);
}

#[test]
fn two_binary_archive_has_exactly_two_entries() {
    let spec = spec_with(
        r#"
sources:
  src:
    inline:
      dir:
        files:
          phony1.sh:
            contents: "#!/bin/sh\necho 'one'\n"
            permissions: 0o755
          phony2.sh:
            contents: "#!/bin/sh\necho 'two'\n"
            permissions: 0o750
artifacts:
  binaries:
    src/phony1.sh: {}
    src/phony2.sh: {}
"#,
    );
    let output = execute(&spec, "bin/zip");

    let (archive, _) = output.tree.file("binaries.zip").unwrap();
    let mut entries = read_zip_entries(archive);
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].0, "phony1.sh");
    assert_eq!(entries[0].1, b"#!/bin/sh\necho 'one'\n");
    assert_eq!(entries[0].2, 0o755);
    assert_eq!(entries[1].0, "phony2.sh");
    assert_eq!(entries[1].1, b"#!/bin/sh\necho 'two'\n");
    assert_eq!(entries[1].2, 0o750);
}

#[test]
fn subpath_and_rename_placement_in_archive() {
    let spec = spec_with(
        r#"
sources:
  src:
    inline:
      dir:
        files:
          phony.sh:
            contents: "#!/bin/sh\n"
            permissions: 0o755
artifacts:
  binaries:
    src/phony.sh:
      sub_path: nested
      name: unphony.sh
"#,
    );
    let output = execute(&spec, "bin/zip");

    let (archive, _) = output.tree.file("binaries.zip").unwrap();
    let entries = read_zip_entries(archive);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "nested/unphony.sh");
    assert_eq!(entries[0].2, 0o755);
    // no entry under the original basename
    assert!(!entries.iter().any(|(name, _, _)| name == "phony.sh"));
}

#[test]
fn missing_artifact_fails_before_packaging() {
    let spec = spec_with(
        r#"
sources:
  src:
    inline:
      dir: {}
artifacts:
  binaries:
    src/ghost.sh: {}
"#,
    );
    let solver = LocalSolver::new();
    let frontends = FrontendRegistry::new();
    let session = Session::new(&solver, &frontends);
    let registry = BackendRegistry::builtins();
    let err = build_router(&spec, &registry)
        .execute("bin/zip", &session)
        .unwrap_err();
    let PacksmithError::ArtifactNotFound { path } = &err else {
        panic!("expected ArtifactNotFound, got {err:?}");
    };
    assert_eq!(path, "src/ghost.sh");
}

#[test]
fn target_level_artifacts_shadow_spec_level() {
    let spec = spec_with(
        r#"
sources:
  src:
    inline:
      dir:
        files:
          spec-level.sh:
            contents: spec
            permissions: 0o755
          target-level.sh:
            contents: target
            permissions: 0o755
artifacts:
  binaries:
    src/spec-level.sh: {}
targets:
  bin:
    artifacts:
      binaries:
        src/target-level.sh: {}
"#,
    );
    let output = execute(&spec, "bin/zip");

    let (archive, _) = output.tree.file("binaries.zip").unwrap();
    let entries = read_zip_entries(archive);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "target-level.sh");
}

#[test]
fn multi_target_containers_isolate_selections() {
    let spec = spec_with(
        r#"
sources:
  files:
    inline:
      dir:
        files:
          hello.txt:
            contents: "hi\n"
            permissions: 0o755
          contributors.md:
            contents: "crew\n"
            permissions: 0o644
targets:
  fedora:
    artifacts:
      binaries:
        files/hello.txt: {}
    tests:
      - name: only-hello
        files:
          usr/bin/hello.txt: {}
          usr/bin/contributors.md:
            not_exist: true
  debian:
    artifacts:
      binaries:
        files/contributors.md: {}
    tests:
      - name: only-contributors
        files:
          usr/bin/contributors.md: {}
          usr/bin/hello.txt:
            not_exist: true
"#,
    );

    let fedora = execute(&spec, "fedora/container");
    assert!(fedora.tree.file("usr/bin/hello.txt").is_some());
    assert!(fedora.tree.file("usr/bin/contributors.md").is_none());

    let debian = execute(&spec, "debian/container");
    assert!(debian.tree.file("usr/bin/contributors.md").is_some());
    assert!(debian.tree.file("usr/bin/hello.txt").is_none());
}

#[test]
fn container_tests_fail_on_wrong_selection() {
    let spec = spec_with(
        r#"
sources:
  files:
    inline:
      dir:
        files:
          hello.txt:
            contents: "hi\n"
artifacts:
  binaries:
    files/hello.txt: {}
tests:
  - name: expects-the-other-file
    files:
      usr/bin/other.txt: {}
"#,
    );
    let solver = LocalSolver::new();
    let frontends = FrontendRegistry::new();
    let session = Session::new(&solver, &frontends);
    let registry = BackendRegistry::builtins();
    let err = build_router(&spec, &registry)
        .execute("fedora/container", &session)
        .unwrap_err();
    let PacksmithError::TestFailed { name, failures } = &err else {
        panic!("expected TestFailed, got {err:?}");
    };
    assert_eq!(name, "expects-the-other-file");
    assert!(failures.contains("usr/bin/other.txt"));
}

#[test]
fn package_target_merges_platforms_by_key() {
    let spec = spec_with(
        r#"
sources:
  src:
    inline:
      dir:
        files:
          tool:
            contents: bits
            permissions: 0o755
artifacts:
  binaries:
    src/tool: {}
"#,
    );
    let solver = LocalSolver::new();
    let frontends = FrontendRegistry::new();
    let mut session = Session::new(&solver, &frontends);
    // reversed request order; outputs still merge by platform key
    session.platforms = vec![
        Platform::new("linux", "arm64"),
        Platform::new("linux", "amd64"),
    ];

    let registry = BackendRegistry::builtins();
    let output = build_router(&spec, &registry)
        .execute("fedora/pkg", &session)
        .unwrap();

    assert!(output
        .tree
        .file("pkg/phony-1.0.0-1.x86_64.rpm.manifest.json")
        .is_some());
    assert!(output
        .tree
        .file("pkg/phony-1.0.0-1.aarch64.rpm.manifest.json")
        .is_some());
    assert_eq!(
        output.tree.file("staging/x86_64/usr/bin/tool").unwrap().1,
        0o755
    );
    assert_eq!(
        output.tree.file("staging/aarch64/usr/bin/tool").unwrap().1,
        0o755
    );

    let platforms: Vec<&str> = output.metadata["platforms"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(platforms, vec!["linux/amd64", "linux/arm64"]);
}

#[test]
fn repo_target_signs_metadata() {
    let spec = spec_with(
        r#"
sources:
  src:
    inline:
      dir:
        files:
          tool:
            contents: bits
            permissions: 0o755
artifacts:
  binaries:
    src/tool: {}
"#,
    );

    let key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]);
    let mut material = Tree::new();
    material
        .insert_file(
            "repo.key",
            signing::encode_signing_key(&key).into_bytes(),
            0o600,
        )
        .unwrap();

    let solver = LocalSolver::new();
    let frontends = FrontendRegistry::new();
    let mut session = Session::new(&solver, &frontends);
    session.signing_key = Some(material);

    let registry = BackendRegistry::builtins();
    let output = build_router(&spec, &registry)
        .execute("fedora/repo", &session)
        .unwrap();

    let (metadata, _) = output.tree.file("repodata/repomd.json").unwrap();
    let (sig, _) = output.tree.file("repodata/repomd.json.sig").unwrap();
    assert!(signing::verify_detached(
        &key.verifying_key(),
        metadata,
        &String::from_utf8_lossy(sig)
    )
    .unwrap());

    // packages landed in the binary dir before signing ran
    assert!(output
        .tree
        .file("RPMS/phony-1.0.0-1.x86_64.rpm.manifest.json")
        .is_some());
}

#[test]
fn repo_signing_failure_is_fatal_to_stage_only() {
    let spec = spec_with(
        r#"
sources:
  src:
    inline:
      dir:
        files:
          tool:
            contents: bits
artifacts:
  binaries:
    src/tool: {}
"#,
    );

    let solver = LocalSolver::new();
    let frontends = FrontendRegistry::new();

    // a pkg build with the same spec succeeds regardless of key material
    let session = Session::new(&solver, &frontends);
    let registry = BackendRegistry::builtins();
    let router = build_router(&spec, &registry);
    assert!(router.execute("fedora/pkg", &session).is_ok());

    // the repo stage with empty key material fails with a signing error
    let mut signing_session = Session::new(&solver, &frontends);
    signing_session.signing_key = Some(Tree::new());
    let err = router
        .execute("fedora/repo", &signing_session)
        .unwrap_err();
    assert!(matches!(err, PacksmithError::Signing { .. }));
}

#[test]
fn worker_target_lists_build_dependencies() {
    let spec = spec_with(
        r#"
dependencies:
  build:
    gcc: []
    make: []
"#,
    );
    let output = execute(&spec, "debian/worker");
    let (doc, _) = output.tree.file("etc/packsmith/worker.json").unwrap();
    let doc: serde_json::Value = serde_json::from_slice(doc).unwrap();
    assert_eq!(doc["image"], "docker.io/library/debian:bookworm");
    let packages: Vec<&str> = doc["packages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(packages.contains(&"build-essential"));
    assert!(packages.contains(&"gcc"));
    assert!(packages.contains(&"make"));
}
