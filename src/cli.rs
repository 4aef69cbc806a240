//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Packsmith - declarative package build compiler
#[derive(Parser, Debug)]
#[command(
    name = "packsmith",
    author,
    version,
    color = clap::ColorChoice::Auto,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Compile a declarative build spec into distro-native package outputs",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  packsmith build --target fedora/pkg\n    \
                  packsmith build --target bin/zip --output out/\n    \
                  packsmith build --target debug/resolve\n    \
                  packsmith targets\n"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a target from a spec
    Build(BuildArgs),
    /// List the targets a spec exposes
    Targets(TargetsArgs),
    /// Show version information
    Version,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Path to the build spec
    #[arg(short, long, default_value = "spec.yml")]
    pub spec: PathBuf,

    /// Target to build, e.g. fedora/pkg or phony/check
    #[arg(short, long)]
    pub target: String,

    /// Platform(s) to build for, e.g. linux/amd64 (repeatable)
    #[arg(long)]
    pub platform: Vec<String>,

    /// Build argument KEY=VALUE (repeatable)
    #[arg(long = "build-arg", value_name = "KEY=VALUE")]
    pub build_args: Vec<String>,

    /// Directory the output tree is written to
    #[arg(short, long, default_value = "packsmith-out")]
    pub output: PathBuf,

    /// Build context directory
    #[arg(long, default_value = ".")]
    pub context: PathBuf,

    /// Key file for the repository signing stage
    #[arg(long, value_name = "FILE")]
    pub signing_key: Option<PathBuf>,

    /// Skip the progress display
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct TargetsArgs {
    /// Path to the build spec
    #[arg(short, long, default_value = "spec.yml")]
    pub spec: PathBuf,

    /// Build argument KEY=VALUE (repeatable)
    #[arg(long = "build-arg", value_name = "KEY=VALUE")]
    pub build_args: Vec<String>,
}
