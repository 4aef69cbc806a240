//! The `build` command

use console::style;

use packsmith::distro::BackendRegistry;
use packsmith::error::{PacksmithError, Result};
use packsmith::platform::Platform;
use packsmith::progress::ProgressDisplay;
use packsmith::request::{BuildRequest, FrontendRegistry, RequestOutcome, Session};
use packsmith::resolve::DEFAULT_CONTEXT;
use packsmith::router::builtin::build_router;
use packsmith::router::handle_request;
use packsmith::solve::LocalSolver;
use packsmith::tree::Tree;

use crate::cli::BuildArgs;
use crate::commands::{load_spec, parse_build_args};

pub fn run(args: BuildArgs) -> Result<()> {
    let build_args = parse_build_args(&args.build_args)?;
    let spec = load_spec(&args.spec, &build_args)?;

    let mut platforms = Vec::new();
    for raw in &args.platform {
        platforms.push(raw.parse::<Platform>()?);
    }

    let context = if args.context.is_dir() {
        Tree::from_dir(&args.context)?
    } else {
        Tree::new()
    };
    let solver = LocalSolver::new().with_context(DEFAULT_CONTEXT, context);

    let signing_key = match &args.signing_key {
        Some(path) => {
            let data = std::fs::read(path)?;
            let mut tree = Tree::new();
            tree.insert_file("signing.key", data, 0o600)?;
            Some(tree)
        }
        None => None,
    };

    let request = BuildRequest {
        target: args.target.clone(),
        list_targets: false,
        platforms,
        build_args,
    };

    let frontends = FrontendRegistry::new();
    let mut session = Session::for_request(&request, &solver, &frontends);
    session.signing_key = signing_key;

    let progress = (!args.quiet).then(|| ProgressDisplay::new(&args.target));

    let registry = BackendRegistry::builtins();
    let router = build_router(&spec, &registry);
    let outcome = match handle_request(&router, &request, &session) {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(p) = &progress {
                p.abandon();
            }
            return Err(e);
        }
    };

    if let RequestOutcome::Built(output) = outcome {
        output.tree.write_to(&args.output)?;
        if !output.metadata.is_null() {
            let metadata = serde_json::to_vec_pretty(&output.metadata)
                .map_err(PacksmithError::from)?;
            std::fs::write(args.output.join(".metadata.json"), metadata)?;
        }

        if let Some(p) = &progress {
            p.finish(&format!("built {}", args.target));
        }
        println!(
            "{} {} ({} entries) -> {}",
            style("Built").green().bold(),
            args.target,
            output.tree.len(),
            args.output.display()
        );
    }
    Ok(())
}
