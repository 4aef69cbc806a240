//! The `targets` command

use console::style;

use packsmith::distro::BackendRegistry;
use packsmith::error::Result;
use packsmith::request::{BuildRequest, FrontendRegistry, RequestOutcome, Session};
use packsmith::router::builtin::build_router;
use packsmith::router::handle_request;
use packsmith::solve::LocalSolver;

use crate::cli::TargetsArgs;
use crate::commands::{load_spec, parse_build_args};

pub fn run(args: TargetsArgs) -> Result<()> {
    let build_args = parse_build_args(&args.build_args)?;
    let spec = load_spec(&args.spec, &build_args)?;

    let request = BuildRequest {
        list_targets: true,
        build_args,
        ..BuildRequest::default()
    };

    let solver = LocalSolver::new();
    let frontends = FrontendRegistry::new();
    let session = Session::for_request(&request, &solver, &frontends);

    let registry = BackendRegistry::builtins();
    let router = build_router(&spec, &registry);

    if let RequestOutcome::Listing(listing) = handle_request(&router, &request, &session)? {
        let width = listing.iter().map(|t| t.name.len()).max().unwrap_or(0);
        for target in listing {
            let marker = if target.default { " (default)" } else { "" };
            println!(
                "{:width$}  {}{}",
                style(&target.name).cyan(),
                target.description,
                style(marker).dim(),
            );
        }
    }
    Ok(())
}
