//! Ordered routing table from source names to adapters
//!
//! Registration order is significant twice over: routing returns the first
//! matching route, and the merge step gives earlier routes precedence.

use super::{Adapter, DynAdapter};
use std::fmt;
use std::sync::Arc;

/// How a route matches a reference's source name (case-sensitive)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMatcher {
    Exact(String),
    Prefix(String),
}

impl SourceMatcher {
    pub fn matches(&self, source_name: &str) -> bool {
        match self {
            SourceMatcher::Exact(name) => source_name == name,
            SourceMatcher::Prefix(prefix) => source_name.starts_with(prefix.as_str()),
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            SourceMatcher::Exact(name) | SourceMatcher::Prefix(name) => name,
        }
    }
}

impl fmt::Display for SourceMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMatcher::Exact(name) => write!(f, "{}", name),
            SourceMatcher::Prefix(prefix) => write!(f, "{}*", prefix),
        }
    }
}

/// One (matcher, adapter) binding
pub struct Route {
    matcher: SourceMatcher,
    adapter: Arc<dyn DynAdapter>,
}

impl Route {
    pub fn matcher(&self) -> &SourceMatcher {
        &self.matcher
    }

    /// Source label used in logs and fragment provenance
    pub fn label(&self) -> &str {
        self.matcher.pattern()
    }

    pub fn adapter(&self) -> &dyn DynAdapter {
        self.adapter.as_ref()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route").field("matcher", &self.matcher).finish()
    }
}

#[derive(Debug, Default)]
pub struct AdapterRegistry {
    routes: Vec<Route>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route names starting with `prefix` to `adapter`
    pub fn with_prefix<A: Adapter + 'static>(self, prefix: impl Into<String>, adapter: A) -> Self {
        self.with_route(SourceMatcher::Prefix(prefix.into()), Arc::new(adapter))
    }

    /// Route exactly `name` to `adapter`
    pub fn with_exact<A: Adapter + 'static>(self, name: impl Into<String>, adapter: A) -> Self {
        self.with_route(SourceMatcher::Exact(name.into()), Arc::new(adapter))
    }

    /// Add a route for an adapter that may already serve other routes
    pub fn with_route(mut self, matcher: SourceMatcher, adapter: Arc<dyn DynAdapter>) -> Self {
        self.register(matcher, adapter);
        self
    }

    pub fn register(&mut self, matcher: SourceMatcher, adapter: Arc<dyn DynAdapter>) {
        self.routes.push(Route { matcher, adapter });
    }

    /// Position of the first route matching `source_name`
    pub fn route_index(&self, source_name: &str) -> Option<usize> {
        self.routes
            .iter()
            .position(|route| route.matcher.matches(source_name))
    }

    /// First route matching `source_name`
    pub fn route(&self, source_name: &str) -> Option<&Route> {
        self.route_index(source_name).map(|index| &self.routes[index])
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
