//! Command implementations
//!
//! Thin glue between the CLI surface and the library: each command loads
//! the spec, constructs a per-request session, and drives the router.

pub mod build;
pub mod targets;
pub mod version;

use std::collections::BTreeMap;
use std::path::Path;

use packsmith::error::{PacksmithError, Result};
use packsmith::spec::Spec;

/// Parse repeated KEY=VALUE arguments
pub fn parse_build_args(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut args = BTreeMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(PacksmithError::Validation {
                message: format!("build arg '{pair}' must have the form KEY=VALUE"),
            });
        };
        args.insert(key.to_string(), value.to_string());
    }
    Ok(args)
}

/// Load and validate a spec file with the given build args
pub fn load_spec(path: &Path, build_args: &BTreeMap<String, String>) -> Result<Spec> {
    let text = std::fs::read_to_string(path).map_err(|e| PacksmithError::IoError {
        message: format!("cannot read spec '{}': {e}", path.display()),
    })?;
    Spec::from_yaml(&text, build_args)
}
