//! Request and response shapes
//!
//! One request names a target (dotted/sloped for forwarding), optionally
//! asks for a target listing instead, selects platforms, and supplies
//! named build args. The session is the explicit per-request configuration
//! value threaded through every call; there is no process-wide state.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::platform::Platform;
use crate::router::TargetProvider;
use crate::solve::Solver;
use crate::tree::Tree;

/// A single build request
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// Target string, e.g. `fedora/pkg` or `phony/check`
    pub target: String,
    /// List matching targets instead of executing
    pub list_targets: bool,
    pub platforms: Vec<Platform>,
    pub build_args: BTreeMap<String, String>,
}

/// One entry of a target listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetInfo {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub default: bool,
}

impl TargetInfo {
    pub fn new(name: &str, description: &str) -> Self {
        TargetInfo {
            name: name.to_string(),
            description: description.to_string(),
            default: false,
        }
    }

    pub fn default_target(name: &str, description: &str) -> Self {
        TargetInfo {
            default: true,
            ..TargetInfo::new(name, description)
        }
    }
}

/// The result of executing a target: a filesystem plus structured metadata
#[derive(Debug)]
pub struct BuildOutput {
    pub tree: Tree,
    pub metadata: serde_json::Value,
}

impl BuildOutput {
    pub fn from_tree(tree: Tree) -> Self {
        BuildOutput {
            tree,
            metadata: serde_json::Value::Null,
        }
    }
}

/// The response to one request: a listing or a built filesystem
#[derive(Debug)]
pub enum RequestOutcome {
    Listing(Vec<TargetInfo>),
    Built(BuildOutput),
}

/// Registered external frontends, keyed by frontend image reference
///
/// Any provider implementing the list/execute protocol can stand in for a
/// frontend image, including another in-process router, which is how
/// arbitrary nesting is exercised without a container runtime.
#[derive(Default)]
pub struct FrontendRegistry {
    frontends: BTreeMap<String, Box<dyn TargetProvider>>,
}

impl FrontendRegistry {
    pub fn new() -> Self {
        FrontendRegistry::default()
    }

    pub fn register(&mut self, image: &str, provider: Box<dyn TargetProvider>) {
        self.frontends.insert(image.to_string(), provider);
    }

    pub fn get(&self, image: &str) -> Option<&dyn TargetProvider> {
        self.frontends.get(image).map(Box::as_ref)
    }
}

/// Per-request configuration threaded through every call
pub struct Session<'a> {
    pub solver: &'a dyn Solver,
    pub frontends: &'a FrontendRegistry,
    /// Platforms to build for; empty means the default platform
    pub platforms: Vec<Platform>,
    /// Key material for the repository signing stage
    pub signing_key: Option<Tree>,
    /// Filesystem path the local repository is addressed under
    pub repo_path: String,
}

impl<'a> Session<'a> {
    pub fn new(solver: &'a dyn Solver, frontends: &'a FrontendRegistry) -> Self {
        Session {
            solver,
            frontends,
            platforms: Vec::new(),
            signing_key: None,
            repo_path: "/opt/repo/packsmith".to_string(),
        }
    }

    /// Construct the session for one request; build args are consumed
    /// earlier, when the spec is loaded
    pub fn for_request(
        request: &BuildRequest,
        solver: &'a dyn Solver,
        frontends: &'a FrontendRegistry,
    ) -> Self {
        let mut session = Session::new(solver, frontends);
        session.platforms = request.platforms.clone();
        session
    }

    /// The effective platform set: requested, or the default
    pub fn effective_platforms(&self) -> Vec<Platform> {
        if self.platforms.is_empty() {
            vec![Platform::default()]
        } else {
            self.platforms.clone()
        }
    }
}
