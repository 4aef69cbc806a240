//! Debug targets
//!
//! `debug/resolve` emits the fully substituted spec as a document at a
//! fixed path; `debug/sources` emits every resolved source tree,
//! unmodified, for inspection.

use crate::error::Result;
use crate::request::{BuildOutput, Session, TargetInfo};
use crate::resolve::SourceResolver;
use crate::spec::Spec;
use crate::tree::Tree;

use super::{Handler, Router};

/// Fixed path of the resolved spec document
pub const SPEC_DOC_PATH: &str = "spec.yml";

/// The debug sub-router
pub fn router(spec: &Spec) -> Router<'_> {
    let mut router = Router::new();

    router.add(
        "resolve",
        Box::new(Handler(move |_session: &Session| handle_resolve(spec))),
        Some(TargetInfo::new(
            "resolve",
            "Outputs the resolved spec file with build args applied.",
        )),
    );

    router.add(
        "sources",
        Box::new(Handler(move |session: &Session| {
            handle_sources(spec, session)
        })),
        Some(TargetInfo::new(
            "sources",
            "Outputs every resolved source tree from the spec.",
        )),
    );

    router
}

fn handle_resolve(spec: &Spec) -> Result<BuildOutput> {
    let mut tree = Tree::new();
    tree.insert_file(SPEC_DOC_PATH, spec.to_yaml()?.into_bytes(), 0o644)?;
    Ok(BuildOutput::from_tree(tree))
}

fn handle_sources(spec: &Spec, session: &Session) -> Result<BuildOutput> {
    let resolver = SourceResolver::new(spec, session.solver);
    let resolved = resolver.resolve_all()?;

    let mut tree = Tree::new();
    let mut fingerprints = serde_json::Map::new();
    for (name, source) in &resolved {
        tree.merge(&source.tree, name)?;
        fingerprints.insert(
            name.clone(),
            serde_json::Value::String(source.fingerprint.clone()),
        );
    }

    Ok(BuildOutput {
        tree,
        metadata: serde_json::json!({ "fingerprints": fingerprints }),
    })
}
