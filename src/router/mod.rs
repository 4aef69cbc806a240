//! Target routing
//!
//! The router resolves a requested target string against registered
//! routes. Lookup order: exact match, then the default route for an empty
//! target, then a first-path-segment prefix match (the route handles the
//! remainder). Routes are themselves providers, so routers nest: a
//! forwarded frontend is just another provider whose listing gets
//! re-emitted under the declaring target's name. Routing holds no state
//! across requests; every request resolves independently.

pub mod builtin;
pub mod debug;

use std::collections::BTreeMap;

use crate::error::{PacksmithError, Result};
use crate::request::{BuildOutput, BuildRequest, RequestOutcome, Session, TargetInfo};
use crate::tree::join;

/// A target provider: the two-operation protocol every build frontend
/// implements, built-in or external
pub trait TargetProvider {
    fn list(&self, session: &Session) -> Result<Vec<TargetInfo>>;
    fn execute(&self, target: &str, session: &Session) -> Result<BuildOutput>;
}

struct Route<'a> {
    provider: Box<dyn TargetProvider + 'a>,
    /// Listing entry for leaf routes; composite routes list themselves
    info: Option<TargetInfo>,
}

/// Name-rewriting dispatch over registered routes
#[derive(Default)]
pub struct Router<'a> {
    routes: BTreeMap<String, Route<'a>>,
    default_key: Option<String>,
}

impl<'a> Router<'a> {
    pub fn new() -> Self {
        Router::default()
    }

    /// Register a route; an `info` marks a leaf target for listings, and
    /// its `default` flag makes the route handle empty target strings
    pub fn add(
        &mut self,
        key: &str,
        provider: Box<dyn TargetProvider + 'a>,
        info: Option<TargetInfo>,
    ) {
        if info.as_ref().is_some_and(|i| i.default) {
            self.default_key = Some(key.to_string());
        }
        self.routes.insert(
            key.to_string(),
            Route { provider, info },
        );
    }

    fn available(&self) -> String {
        self.routes
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn lookup<'r>(&'r self, target: &str) -> Result<(&'r str, &'r Route<'a>, String)> {
        if let Some((key, route)) = self.routes.get_key_value(target) {
            return Ok((key, route, String::new()));
        }

        if target.is_empty() {
            if let Some(default_key) = &self.default_key {
                if let Some(route) = self.routes.get(default_key) {
                    return Ok((default_key, route, String::new()));
                }
            }
        }

        for (key, route) in &self.routes {
            if let Some(rest) = target.strip_prefix(&format!("{key}/")) {
                return Ok((key, route, rest.to_string()));
            }
        }

        Err(PacksmithError::TargetNotFound {
            target: target.to_string(),
            available: self.available(),
        })
    }
}

impl TargetProvider for Router<'_> {
    /// Enumerate every reachable target, forwarded sub-targets re-emitted
    /// under their declaring route's prefix
    fn list(&self, session: &Session) -> Result<Vec<TargetInfo>> {
        let mut targets = Vec::new();
        for (key, route) in &self.routes {
            match &route.info {
                Some(info) => targets.push(TargetInfo {
                    name: key.clone(),
                    description: info.description.clone(),
                    default: info.default,
                }),
                None => {
                    for sub in route.provider.list(session)? {
                        targets.push(TargetInfo {
                            name: join(key, &sub.name),
                            description: sub.description,
                            default: false,
                        });
                    }
                }
            }
        }
        Ok(targets)
    }

    /// Route one execute request, stripping the matched segment before
    /// handing the remainder to the route's provider
    fn execute(&self, target: &str, session: &Session) -> Result<BuildOutput> {
        let (matched, route, remainder) = self.lookup(target)?;
        route
            .provider
            .execute(&remainder, session)
            .map_err(|e| prefix_not_found(matched, e))
    }
}

/// Resolve one request against a provider: a listing when the request
/// asks for one, otherwise the executed target's output
pub fn handle_request(
    provider: &dyn TargetProvider,
    request: &BuildRequest,
    session: &Session,
) -> Result<RequestOutcome> {
    if request.list_targets {
        return Ok(RequestOutcome::Listing(provider.list(session)?));
    }
    Ok(RequestOutcome::Built(
        provider.execute(&request.target, session)?,
    ))
}

/// Re-anchor a nested not-found error under the matched route so the
/// message carries the full target path
fn prefix_not_found(matched: &str, err: PacksmithError) -> PacksmithError {
    match err {
        PacksmithError::TargetNotFound { target, available } => {
            let available = if available.is_empty() {
                matched.to_string()
            } else {
                available
                    .split(", ")
                    .map(|a| join(matched, a))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            PacksmithError::TargetNotFound {
                target: join(matched, &target),
                available,
            }
        }
        other => other,
    }
}

/// A leaf handler wrapping a run function
pub struct Handler<F>(pub F);

impl<F> TargetProvider for Handler<F>
where
    F: Fn(&Session) -> Result<BuildOutput>,
{
    fn list(&self, _session: &Session) -> Result<Vec<TargetInfo>> {
        Ok(Vec::new())
    }

    fn execute(&self, target: &str, session: &Session) -> Result<BuildOutput> {
        if !target.is_empty() {
            return Err(PacksmithError::TargetNotFound {
                target: target.to_string(),
                available: String::new(),
            });
        }
        (self.0)(session)
    }
}

/// Adapter forwarding to an external frontend registered for an image
pub struct ForwardedProvider {
    pub image: String,
}

impl ForwardedProvider {
    fn frontend<'s>(&self, session: &'s Session) -> Result<&'s dyn TargetProvider> {
        session
            .frontends
            .get(&self.image)
            .ok_or_else(|| PacksmithError::FrontendUnavailable {
                image: self.image.clone(),
            })
    }
}

impl TargetProvider for ForwardedProvider {
    fn list(&self, session: &Session) -> Result<Vec<TargetInfo>> {
        self.frontend(session)?.list(session)
    }

    fn execute(&self, target: &str, session: &Session) -> Result<BuildOutput> {
        // nested synchronous call: cancelling the outer request drops
        // this frame and the forwarded sub-request with it
        self.frontend(session)?.execute(target, session)
    }
}
