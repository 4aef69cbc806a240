//! Error types and handling for Packsmith
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! One enum covers the whole taxonomy: spec validation, source resolution
//! (digests, patches, generators), build-step execution, artifact assembly,
//! repository signing and target routing. Variants carry enough context
//! (target string, source name, path) to locate the failing declaration.

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for Packsmith operations
#[derive(Error, Diagnostic, Debug)]
pub enum PacksmithError {
    // Spec errors
    #[error("invalid spec: {message}")]
    #[diagnostic(code(packsmith::spec::validation))]
    Validation { message: String },

    #[error("unknown build arg \"{name}\"")]
    #[diagnostic(
        code(packsmith::spec::unknown_arg),
        help("declare the arg with a default value under `args` in the spec")
    )]
    UnknownArg { name: String },

    // Source resolution errors
    #[error("source '{name}' is not declared in the spec")]
    #[diagnostic(code(packsmith::resolve::source_not_found))]
    SourceNotFound { name: String },

    #[error("digest mismatch for source '{source}': expected {expected}, got {actual}")]
    #[diagnostic(
        code(packsmith::resolve::digest_mismatch),
        help("the fetched content does not match the declared digest; it was discarded")
    )]
    DigestMismatch {
        source: String,
        expected: String,
        actual: String,
    },

    #[error("failed to apply patch '{patch}' to source '{source}': {reason}")]
    #[diagnostic(code(packsmith::resolve::patch_apply_failed))]
    PatchApply {
        source: String,
        patch: String,
        reason: String,
    },

    #[error("generator failed for source '{source}': {reason}")]
    #[diagnostic(code(packsmith::resolve::generator_failed))]
    Generator { source: String, reason: String },

    #[error("failed to fetch {url}: {reason}")]
    #[diagnostic(code(packsmith::resolve::fetch_failed))]
    FetchFailed { url: String, reason: String },

    #[error("git operation failed for '{url}': {reason}")]
    #[diagnostic(code(packsmith::resolve::git_failed))]
    GitFailed { url: String, reason: String },

    // Build errors
    #[error("step failed in {context}: exit status {status}\n{stderr}")]
    #[diagnostic(code(packsmith::build::step_failed))]
    StepExecution {
        context: String,
        status: i32,
        stderr: String,
    },

    // Packaging errors
    #[error("artifact path '{path}' not found in build output")]
    #[diagnostic(
        code(packsmith::assemble::artifact_not_found),
        help("check the artifact path against the build output; paths are relative to the output root")
    )]
    ArtifactNotFound { path: String },

    #[error("archive operation failed: {reason}")]
    #[diagnostic(code(packsmith::assemble::archive_failed))]
    Archive { reason: String },

    // Test errors
    #[error("test '{name}' failed:\n{failures}")]
    #[diagnostic(code(packsmith::test::failed))]
    TestFailed { name: String, failures: String },

    // Signing errors
    #[error("signing failed: {reason}")]
    #[diagnostic(
        code(packsmith::repo::signing_failed),
        help("package outputs produced before the signing stage remain valid unsigned")
    )]
    Signing { reason: String },

    // Routing errors
    #[error("no such handler for target \"{target}\": available targets: {available}")]
    #[diagnostic(code(packsmith::router::target_not_found))]
    TargetNotFound { target: String, available: String },

    #[error("no frontend available for image '{image}'")]
    #[diagnostic(
        code(packsmith::router::frontend_unavailable),
        help("forwarded targets need a frontend registered for their image reference")
    )]
    FrontendUnavailable { image: String },

    // Solver errors
    #[error("operation not supported by the solver: {op}")]
    #[diagnostic(code(packsmith::solve::unsupported))]
    UnsupportedOp { op: String },

    #[error("invalid path '{path}': {reason}")]
    #[diagnostic(code(packsmith::solve::invalid_path))]
    InvalidPath { path: String, reason: String },

    // File system errors
    #[error("IO error: {message}")]
    #[diagnostic(code(packsmith::fs::io_error))]
    IoError { message: String },
}

impl From<std::io::Error> for PacksmithError {
    fn from(err: std::io::Error) -> Self {
        PacksmithError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for PacksmithError {
    fn from(err: serde_yaml::Error) -> Self {
        PacksmithError::Validation {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PacksmithError {
    fn from(err: serde_json::Error) -> Self {
        PacksmithError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for PacksmithError {
    fn from(err: zip::result::ZipError) -> Self {
        PacksmithError::Archive {
            reason: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, PacksmithError>;
