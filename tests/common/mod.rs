//! Common test utilities for Packsmith integration tests

use std::collections::BTreeMap;

use packsmith::spec::Spec;

/// Identity header prepended to test spec bodies
#[allow(dead_code)]
pub const SPEC_HEADER: &str = "name: phony\nversion: \"1.0.0\"\nrevision: \"1\"\ndescription: A phony package\nlicense: MIT\n";

/// Load a spec from a body appended to the standard identity header
#[allow(dead_code)]
pub fn spec_with(body: &str) -> Spec {
    Spec::from_yaml(&format!("{SPEC_HEADER}{body}"), &BTreeMap::new())
        .expect("test spec should load")
}
