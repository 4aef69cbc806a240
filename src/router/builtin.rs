//! Built-in target registration and handlers
//!
//! Builds the root router for one spec: the debug targets, the per-distro
//! package/container/worker/repo targets, the `bin` extraction target, and
//! one forwarding route per declared frontend target. Built-in routes obey
//! the spec's target declarations: a spec that declares targets suppresses
//! builtins it does not name, and a declared frontend replaces the builtin
//! for its key.

use std::collections::BTreeSet;

use crate::assemble::{self, archive, ArtifactKind, PlacedArtifact};
use crate::compile;
use crate::distro::{self, BackendRegistry, DistroBackend};
use crate::error::Result;
use crate::platform::Platform;
use crate::repo::{self, RepoEntry};
use crate::request::{BuildOutput, Session, TargetInfo};
use crate::resolve::SourceResolver;
use crate::solve::Op;
use crate::spec::Spec;
use crate::testrunner;
use crate::tree::Tree;

use super::{debug, ForwardedProvider, Handler, Router, TargetProvider};

/// Target key of the extraction target family
pub const BIN_TARGET: &str = "bin";

/// Build the root router for a spec
pub fn build_router<'a>(spec: &'a Spec, registry: &'a BackendRegistry) -> Router<'a> {
    let mut router = Router::new();

    router.add("debug", Box::new(debug::router(spec)), None);

    for backend in registry.iter() {
        if builtin_enabled(spec, backend.key()) {
            router.add(backend.key(), Box::new(distro_router(spec, backend)), None);
        }
    }

    if builtin_enabled(spec, BIN_TARGET) {
        router.add(BIN_TARGET, Box::new(bin_router(spec)), None);
    }

    for (name, target) in &spec.targets {
        if let Some(frontend) = &target.frontend {
            router.add(
                name,
                Box::new(ForwardedProvider {
                    image: frontend.image.clone(),
                }),
                None,
            );
        }
    }

    router
}

/// Whether a builtin for `key` applies to this spec
///
/// A spec with no targets gets every builtin; a spec with targets gets
/// only the builtins it names, and a declared frontend displaces the
/// builtin for that key.
fn builtin_enabled(spec: &Spec, key: &str) -> bool {
    if spec.targets.is_empty() {
        return true;
    }
    spec.targets
        .get(key)
        .is_some_and(|t| t.frontend.is_none())
}

fn distro_router<'a>(spec: &'a Spec, backend: &'a dyn DistroBackend) -> Router<'a> {
    let mut router = Router::new();

    router.add(
        "pkg",
        Box::new(Handler(move |session: &Session| {
            handle_pkg(spec, backend, session)
        })),
        Some(TargetInfo::default_target(
            "pkg",
            "Builds the native package staging and manifest.",
        )),
    );

    router.add(
        "container",
        Box::new(Handler(move |session: &Session| {
            handle_container(spec, backend, session)
        })),
        Some(TargetInfo::new(
            "container",
            "Builds a container filesystem with the artifacts installed.",
        )),
    );

    router.add(
        "worker",
        Box::new(Handler(move |session: &Session| {
            handle_worker(spec, backend, session)
        })),
        Some(TargetInfo::new(
            "worker",
            "Emits the distro build environment definition.",
        )),
    );

    router.add(
        "repo",
        Box::new(Handler(move |session: &Session| {
            handle_repo(spec, backend, session)
        })),
        Some(TargetInfo::new(
            "repo",
            "Builds a signed local package repository.",
        )),
    );

    router
}

fn bin_router(spec: &Spec) -> Router<'_> {
    let mut router = Router::new();
    router.add(
        "zip",
        Box::new(Handler(move |session: &Session| handle_zip(spec, session))),
        Some(TargetInfo::default_target(
            "zip",
            "Builds binaries combined into a zip file.",
        )),
    );
    router
}

/// Resolve sources, run the build, select the target's artifacts
fn assemble_target(
    spec: &Spec,
    target_key: &str,
    session: &Session,
) -> Result<Vec<PlacedArtifact>> {
    let resolver = SourceResolver::new(spec, session.solver);
    let sources = resolver.resolve_all()?;
    let output = compile::build_output(spec, &sources, session.solver)?;
    assemble::select_artifacts(&output, spec.artifacts_for(target_key))
}

fn sorted_platforms(session: &Session) -> BTreeSet<Platform> {
    session.effective_platforms().into_iter().collect()
}

fn handle_pkg(
    spec: &Spec,
    backend: &dyn DistroBackend,
    session: &Session,
) -> Result<BuildOutput> {
    let placed = assemble_target(spec, backend.key(), session)?;

    let mut tree = Tree::new();
    let mut platform_names = Vec::new();
    // platforms merge by key, not completion order
    for platform in sorted_platforms(session) {
        let staged = distro::stage_package(backend, spec, backend.key(), &placed, &platform)?;
        tree.insert_file(
            &format!("pkg/{}.manifest.json", staged.filename),
            staged.manifest,
            0o644,
        )?;
        tree.merge(
            &staged.staging,
            &format!("staging/{}", backend.arch_tag(&platform.arch)),
        )?;
        platform_names.push(platform.to_string());
    }

    Ok(BuildOutput {
        tree,
        metadata: serde_json::json!({ "platforms": platform_names }),
    })
}

fn handle_container(
    spec: &Spec,
    backend: &dyn DistroBackend,
    session: &Session,
) -> Result<BuildOutput> {
    let target_key = backend.key();
    let placed = assemble_target(spec, target_key, session)?;
    let image_config = spec.image_for(target_key);

    let mut rootfs = match image_config.and_then(|c| c.base.as_deref()) {
        Some(base) => session.solver.solve(&Op::Image {
            reference: base.to_string(),
        })?,
        None => Tree::new(),
    };

    for artifact in &placed {
        let dir = backend.category_dir(artifact.kind, &spec.name);
        rootfs.insert_file(
            &format!("{dir}/{}", artifact.placement),
            artifact.data.clone(),
            artifact.mode,
        )?;
    }

    testrunner::run_tests(spec.tests_for(target_key), &rootfs, session.solver)?;

    let metadata = match image_config {
        Some(config) => serde_json::json!({ "image": config }),
        None => serde_json::Value::Null,
    };
    Ok(BuildOutput {
        tree: rootfs,
        metadata,
    })
}

fn handle_worker(
    spec: &Spec,
    backend: &dyn DistroBackend,
    _session: &Session,
) -> Result<BuildOutput> {
    let mut packages: Vec<String> = backend
        .bootstrap_packages()
        .iter()
        .map(ToString::to_string)
        .collect();
    if let Some(deps) = spec.dependencies_for(backend.key()) {
        packages.extend(deps.build.keys().cloned());
    }

    let doc = serde_json::json!({
        "image": backend.worker_image(),
        "packages": packages,
    });

    let mut tree = Tree::new();
    tree.insert_file(
        "etc/packsmith/worker.json",
        serde_json::to_vec_pretty(&doc)?,
        0o644,
    )?;
    Ok(BuildOutput {
        tree,
        metadata: doc,
    })
}

fn handle_repo(
    spec: &Spec,
    backend: &dyn DistroBackend,
    session: &Session,
) -> Result<BuildOutput> {
    let placed = assemble_target(spec, backend.key(), session)?;

    // Package manifests are materialized before the signing stage runs, so
    // a signing failure leaves them valid.
    let mut entries = Vec::new();
    for platform in sorted_platforms(session) {
        let staged = distro::stage_package(backend, spec, backend.key(), &placed, &platform)?;
        entries.push(RepoEntry {
            filename: format!("{}.manifest.json", staged.filename),
            data: staged.manifest,
        });
    }

    let tree = repo::build_repository(
        backend,
        &entries,
        &session.repo_path,
        session.signing_key.as_ref(),
    )?;
    Ok(BuildOutput::from_tree(tree))
}

fn handle_zip(spec: &Spec, session: &Session) -> Result<BuildOutput> {
    let placed = assemble_target(spec, BIN_TARGET, session)?;
    let binaries: Vec<PlacedArtifact> = placed
        .into_iter()
        .filter(|p| p.kind == ArtifactKind::Binary)
        .collect();

    let tree = archive::archive_tree(&binaries)?;
    let entries: Vec<&str> = binaries.iter().map(|b| b.placement.as_str()).collect();
    Ok(BuildOutput {
        tree,
        metadata: serde_json::json!({ "entries": entries }),
    })
}

/// A whole spec compiled behind the frontend protocol
///
/// Registering one of these for a frontend image makes forwarding work
/// end-to-end in-process: the forwarded frontend is a full router over its
/// own spec, which may itself forward further.
pub struct SpecFrontend {
    spec: Spec,
    registry: BackendRegistry,
}

impl SpecFrontend {
    pub fn new(spec: Spec) -> Self {
        SpecFrontend {
            spec,
            registry: BackendRegistry::builtins(),
        }
    }
}

impl TargetProvider for SpecFrontend {
    fn list(&self, session: &Session) -> Result<Vec<TargetInfo>> {
        build_router(&self.spec, &self.registry).list(session)
    }

    fn execute(&self, target: &str, session: &Session) -> Result<BuildOutput> {
        build_router(&self.spec, &self.registry).execute(target, session)
    }
}
