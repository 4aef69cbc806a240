//! Packsmith - declarative package build compiler
//!
//! Compiles a single declarative build specification into distro-native
//! package staging trees, container filesystems and extraction archives,
//! for multiple distros and architectures. The core is a small compiler
//! (spec to execution graph), a target router that delegates sub-builds
//! to external frontends with namespaced target trees, and a verification
//! pipeline (content digests, ordered patches, reproducible archives).
//!
//! Execution itself is delegated: the compiler describes filesystem-
//! producing operations ([`solve::Op`]) and a [`solve::Solver`] resolves
//! them. [`solve::LocalSolver`] runs everything on the local machine.

pub mod assemble;
pub mod compile;
pub mod distro;
pub mod error;
pub mod fingerprint;
pub mod platform;
pub mod progress;
pub mod repo;
pub mod request;
pub mod resolve;
pub mod router;
pub mod solve;
pub mod spec;
pub mod testrunner;
pub mod tree;
