//! Local package repositories
//!
//! Lays out produced packages as a local repository (binary and source
//! package directories), generates a metadata document over their
//! digests, and signs the metadata with the imported key. The repository
//! identity carries a short hash of its filesystem path so several local
//! repositories can coexist without collision. Signing failures are fatal
//! to this stage only; the packages themselves are already materialized
//! and stay valid unsigned.

pub mod signing;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::distro::DistroBackend;
use crate::error::Result;
use crate::fingerprint::ContentDigest;
use crate::tree::{Tree, DEFAULT_DIR_MODE};

/// Relative path of the repository metadata document
pub const METADATA_PATH: &str = "repodata/repomd.json";

/// Relative path of the detached signature over the metadata
pub const SIGNATURE_PATH: &str = "repodata/repomd.json.sig";

/// Relative path of the public key published with the repository
pub const PUBKEY_PATH: &str = "repodata/repomd.pub";

/// Short identity suffix derived from the repository's filesystem path
pub fn repo_suffix(repo_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repo_path.as_bytes());
    hex::encode(hasher.finalize())[..8].to_string()
}

#[derive(Debug, Serialize)]
struct RepoPackage {
    filename: String,
    size: usize,
    digest: String,
}

#[derive(Debug, Serialize)]
struct RepoMetadata<'a> {
    id: String,
    name: &'a str,
    path: &'a str,
    packages: Vec<RepoPackage>,
}

/// A produced package to publish: its file name and contents
pub struct RepoEntry {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Build the repository tree for a set of produced packages
///
/// With key material supplied, the metadata is signed and the public key
/// published next to it; without, the repository is valid but unsigned.
pub fn build_repository(
    backend: &dyn DistroBackend,
    packages: &[RepoEntry],
    repo_path: &str,
    key_material: Option<&Tree>,
) -> Result<Tree> {
    let suffix = repo_suffix(repo_path);
    let id = format!("local-{suffix}");

    let mut tree = Tree::new();
    tree.insert_dir(backend.repo_binary_dir(), DEFAULT_DIR_MODE)?;
    tree.insert_dir(backend.repo_source_dir(), DEFAULT_DIR_MODE)?;

    let mut listed = Vec::new();
    for entry in packages {
        tree.insert_file(
            &format!("{}/{}", backend.repo_binary_dir(), entry.filename),
            entry.data.clone(),
            0o644,
        )?;
        listed.push(RepoPackage {
            filename: entry.filename.clone(),
            size: entry.data.len(),
            digest: ContentDigest::of(&entry.data).to_string(),
        });
    }

    let metadata = RepoMetadata {
        id: id.clone(),
        name: "Local Repository",
        path: repo_path,
        packages: listed,
    };
    let metadata_bytes = serde_json::to_vec_pretty(&metadata)?;
    tree.insert_file(METADATA_PATH, metadata_bytes.clone(), 0o644)?;

    // Mirrors the dnf-style repo config, identity suffixed by path hash.
    let config = format!(
        "[{id}]\nname=Local Repository\nbaseurl=file://{repo_path}\ngpgcheck={}\nenabled=1\n",
        if key_material.is_some() { 1 } else { 0 }
    );
    tree.insert_file(&format!("{id}.repo"), config.into_bytes(), 0o644)?;

    if let Some(material) = key_material {
        let key = signing::import_signing_key(material)?;
        let signature = signing::sign_detached(&key, &metadata_bytes);
        tree.insert_file(SIGNATURE_PATH, signature.into_bytes(), 0o644)?;
        tree.insert_file(
            PUBKEY_PATH,
            signing::key_fingerprint(&key.verifying_key()).into_bytes(),
            0o644,
        )?;
    }

    Ok(tree)
}
