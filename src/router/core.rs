use http::Method;
use tracing::{debug, info};

/// Which methods a registration answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Only(Method),
}

impl MethodFilter {
    fn matches(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(m) => m == method,
        }
    }
}

/// One `(path, method) -> handler` registration.
#[derive(Debug, Clone)]
pub struct Route<H> {
    pub path: &'static str,
    pub method: MethodFilter,
    pub handler_name: &'static str,
    pub handler: H,
}

/// Static routing table with exact path matching.
///
/// Resolution for `(method, path)`:
/// 1. the first registration for `path` whose method equals the request method;
/// 2. otherwise the first method-agnostic registration for `path`;
/// 3. otherwise nothing, and the caller falls through to static files.
///
/// Registration order only decides between entries of the same class, so
/// `/edit` can have both a catch-all GET and method-specific PUT/DELETE/POST
/// handlers regardless of which was added first.
#[derive(Debug, Clone)]
pub struct RouteTable<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H: Copy> RouteTable<H> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one method.
    pub fn on(
        &mut self,
        path: &'static str,
        method: Method,
        handler_name: &'static str,
        handler: H,
    ) -> &mut Self {
        self.routes.push(Route {
            path,
            method: MethodFilter::Only(method),
            handler_name,
            handler,
        });
        self
    }

    /// Register a handler for every method.
    pub fn any(&mut self, path: &'static str, handler_name: &'static str, handler: H) -> &mut Self {
        self.routes.push(Route {
            path,
            method: MethodFilter::Any,
            handler_name,
            handler,
        });
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&Route<H>> {
        let mut fallback = None;
        for route in self.routes.iter().filter(|r| r.path == path) {
            match &route.method {
                MethodFilter::Only(_) if route.method.matches(method) => {
                    debug!(%method, path, handler = route.handler_name, "Route matched");
                    return Some(route);
                }
                MethodFilter::Any if fallback.is_none() => fallback = Some(route),
                _ => {}
            }
        }
        if let Some(route) = fallback {
            debug!(%method, path, handler = route.handler_name, "Route matched (any method)");
        }
        fallback
    }

    /// Log the table once at startup.
    pub fn log_routes(&self) {
        let summary: Vec<String> = self
            .routes
            .iter()
            .map(|r| match &r.method {
                MethodFilter::Any => format!("* {} -> {}", r.path, r.handler_name),
                MethodFilter::Only(m) => format!("{m} {} -> {}", r.path, r.handler_name),
            })
            .collect();
        info!(routes_count = self.routes.len(), routes = ?summary, "Routing table loaded");
    }
}
