//! Distro packaging backends
//!
//! A backend supplies everything distro-specific the assembler must not
//! embed itself: the native arch naming, the conventional directory for
//! each artifact kind, package file naming and the worker build
//! environment. Backends register in a [`BackendRegistry`]; adding a
//! distro family means implementing [`DistroBackend`] and registering it.

pub mod deb;
pub mod rpm;

use serde::Serialize;

use crate::assemble::{manifest_entries, ArtifactKind, ManifestEntry, PlacedArtifact};
use crate::error::Result;
use crate::platform::Platform;
use crate::spec::Spec;
use crate::tree::Tree;

/// Placement conventions and naming for one distro family
pub trait DistroBackend: Send + Sync {
    /// Target key the backend registers under, e.g. `fedora`
    fn key(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    /// Native package file extension
    fn package_ext(&self) -> &'static str;

    /// Map a request-side architecture identifier to the distro's native
    /// arch naming. Pure and total: unmapped identifiers pass through
    /// unchanged.
    fn arch_tag(&self, arch: &str) -> String;

    /// Conventional directory for an artifact kind
    fn category_dir(&self, kind: ArtifactKind, package: &str) -> String;

    /// Build environment image for this distro's worker
    fn worker_image(&self) -> &'static str;

    /// Toolchain packages installed into the worker
    fn bootstrap_packages(&self) -> &'static [&'static str];

    /// Binary-package directory in a local repository
    fn repo_binary_dir(&self) -> &'static str;

    /// Source-package directory in a local repository
    fn repo_source_dir(&self) -> &'static str;
}

/// Derive the architecture-specific package file name
pub fn package_filename(backend: &dyn DistroBackend, spec: &Spec, platform: &Platform) -> String {
    let arch = if spec.noarch {
        "noarch".to_string()
    } else {
        backend.arch_tag(&platform.arch)
    };
    format!(
        "{}-{}-{}.{}.{}",
        spec.name,
        spec.version,
        spec.revision,
        arch,
        backend.package_ext()
    )
}

/// Package metadata embedded in the normalized manifest
#[derive(Debug, Serialize)]
struct PackageMeta<'a> {
    name: &'a str,
    version: &'a str,
    revision: &'a str,
    arch: String,
    noarch: bool,
    license: &'a str,
    vendor: &'a str,
    packager: &'a str,
    website: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct PackageManifest<'a> {
    package: PackageMeta<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependencies: Option<&'a crate::spec::PackageDependencies>,
    files: std::collections::BTreeMap<String, Vec<ManifestEntry>>,
}

/// A staged native package: its file name, the normalized manifest the
/// distro toolchain consumes, and the staged filesystem
#[derive(Debug)]
pub struct StagedPackage {
    pub filename: String,
    pub manifest: Vec<u8>,
    pub staging: Tree,
}

/// Stage one package for a backend: place files under the distro's
/// category directories and emit the normalized manifest
pub fn stage_package(
    backend: &dyn DistroBackend,
    spec: &Spec,
    target: &str,
    placed: &[PlacedArtifact],
    platform: &Platform,
) -> Result<StagedPackage> {
    let mut staging = Tree::new();
    for artifact in placed {
        let dir = backend.category_dir(artifact.kind, &spec.name);
        let dest = format!("{dir}/{}", artifact.placement);
        staging.insert_file(&dest, artifact.data.clone(), artifact.mode)?;
    }

    let manifest = PackageManifest {
        package: PackageMeta {
            name: &spec.name,
            version: &spec.version,
            revision: &spec.revision,
            arch: backend.arch_tag(&platform.arch),
            noarch: spec.noarch,
            license: &spec.license,
            vendor: &spec.vendor,
            packager: &spec.packager,
            website: &spec.website,
            description: &spec.description,
        },
        dependencies: spec.dependencies_for(target),
        files: manifest_entries(placed, |kind| backend.category_dir(kind, &spec.name)),
    };

    Ok(StagedPackage {
        filename: package_filename(backend, spec, platform),
        manifest: serde_json::to_vec_pretty(&manifest)?,
        staging,
    })
}

/// Registry of available distro backends
pub struct BackendRegistry {
    backends: Vec<Box<dyn DistroBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        BackendRegistry {
            backends: Vec::new(),
        }
    }

    /// Registry holding every built-in backend
    pub fn builtins() -> Self {
        let mut registry = BackendRegistry::new();
        registry.register(Box::new(rpm::RpmBackend));
        registry.register(Box::new(deb::DebBackend));
        registry
    }

    pub fn register(&mut self, backend: Box<dyn DistroBackend>) {
        self.backends.push(backend);
    }

    pub fn get(&self, key: &str) -> Option<&dyn DistroBackend> {
        self.backends
            .iter()
            .find(|b| b.key() == key)
            .map(Box::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn DistroBackend> {
        self.backends.iter().map(Box::as_ref)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        BackendRegistry::builtins()
    }
}
