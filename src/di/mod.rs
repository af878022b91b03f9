//! # Dependency Injection
//!
//! Dependencies are named providers with parameter specs of their own. A
//! dependency's name is its identity: memoization, cycle detection, and
//! late-bound references all key on it.
//!
//! ## Resolution model
//!
//! Providers run during the dependency-resolution stage, after every
//! parameter in the route's tree has been extracted and validated. Each
//! dependency resolves at most once per invocation; a second reference to
//! the same name observes the memoized value. References may be inline
//! (`Arc` to the dependency) or by name, looked up in the app registry at
//! build time. The registration graph is verified acyclic when the app is
//! built; the resolver still carries an in-progress stack so a cycle that
//! survives construction surfaces as an error instead of unbounded
//! recursion.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::errors::{ApiError, BuildError, HandlerError};
use crate::handler::Args;
use crate::params::{ParamSource, ParamSpec};
use crate::request::Request;
use crate::security::SecurityScheme;

/// Produces a dependency's value for one invocation.
pub trait Provide: Send + Sync + 'static {
    fn provide(&self, req: &Request, args: Args) -> Result<Value, HandlerError>;
}

struct FnProvider<F>(F);

impl<F> Provide for FnProvider<F>
where
    F: Fn(&Request, Args) -> Result<Value, HandlerError> + Send + Sync + 'static,
{
    fn provide(&self, req: &Request, args: Args) -> Result<Value, HandlerError> {
        (self.0)(req, args)
    }
}

/// Wrap a closure as a provider.
pub fn provide_fn<F>(f: F) -> Arc<dyn Provide>
where
    F: Fn(&Request, Args) -> Result<Value, HandlerError> + Send + Sync + 'static,
{
    Arc::new(FnProvider(f))
}

/// A named dependency node: provider plus the parameters it wants bound.
pub struct Dependency {
    name: String,
    params: Vec<ParamSpec>,
    provider: Arc<dyn Provide>,
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Dependency {
    #[must_use]
    pub fn new(name: impl Into<String>, provider: Arc<dyn Provide>) -> Self {
        Dependency {
            name: name.into(),
            params: Vec::new(),
            provider,
        }
    }

    /// Declare a parameter the provider wants bound.
    #[must_use]
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }
}

/// Reference to a dependency from a parameter spec.
#[derive(Debug, Clone)]
pub enum DependencyRef {
    /// Direct reference.
    Inline(Arc<Dependency>),
    /// Late-bound through the app registry. Lets two dependencies refer to
    /// each other's names, which is why cycle detection exists at all.
    Named(String),
}

impl DependencyRef {
    #[must_use]
    pub fn inline(dep: Dependency) -> Self {
        DependencyRef::Inline(Arc::new(dep))
    }

    #[must_use]
    pub fn shared(dep: Arc<Dependency>) -> Self {
        DependencyRef::Inline(dep)
    }

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        DependencyRef::Named(name.into())
    }
}

/// Dependency registry: name to node, shared by the whole app.
pub(crate) type Registry = HashMap<String, Arc<Dependency>>;

/// Verify every reference reachable from `roots` resolves, names are not
/// claimed by two distinct nodes, and the graph has no cycles.
pub(crate) fn verify_graph<'a>(
    roots: impl Iterator<Item = &'a DependencyRef>,
    registry: &Registry,
) -> Result<(), BuildError> {
    let mut seen: HashMap<String, Arc<Dependency>> = HashMap::new();
    let mut visited: Vec<String> = Vec::new();
    let mut visiting: Vec<String> = Vec::new();

    fn claim(
        seen: &mut HashMap<String, Arc<Dependency>>,
        dep: &Arc<Dependency>,
    ) -> Result<(), BuildError> {
        match seen.get(dep.name()) {
            Some(existing) if Arc::ptr_eq(existing, dep) => Ok(()),
            Some(_) => Err(BuildError::DuplicateDependency(dep.name().to_string())),
            None => {
                seen.insert(dep.name().to_string(), Arc::clone(dep));
                Ok(())
            }
        }
    }

    fn visit(
        dep_ref: &DependencyRef,
        registry: &Registry,
        seen: &mut HashMap<String, Arc<Dependency>>,
        visited: &mut Vec<String>,
        visiting: &mut Vec<String>,
    ) -> Result<(), BuildError> {
        let dep = match dep_ref {
            DependencyRef::Inline(dep) => Arc::clone(dep),
            DependencyRef::Named(name) => registry
                .get(name)
                .cloned()
                .ok_or_else(|| BuildError::UnknownDependency(name.clone()))?,
        };
        claim(seen, &dep)?;

        let name = dep.name().to_string();
        if visited.contains(&name) {
            return Ok(());
        }
        if let Some(pos) = visiting.iter().position(|n| *n == name) {
            let mut chain: Vec<String> = visiting[pos..].to_vec();
            chain.push(name);
            return Err(BuildError::DependencyCycle { chain });
        }

        visiting.push(name.clone());
        for param in dep.params() {
            if let ParamSource::Dependency(inner) = &param.source {
                visit(inner, registry, seen, visited, visiting)?;
            }
        }
        visiting.pop();
        visited.push(name);
        Ok(())
    }

    for entry in registry.values() {
        claim(&mut seen, entry)?;
    }
    for root in roots {
        visit(root, registry, &mut seen, &mut visited, &mut visiting)?;
    }
    Ok(())
}

/// Per-invocation resolution state.
pub(crate) struct Resolver<'a> {
    registry: &'a Registry,
    /// Literal arguments bound per dependency name during the binding stage.
    dep_args: HashMap<String, Args>,
    memo: HashMap<String, Value>,
    stack: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(registry: &'a Registry, dep_args: HashMap<String, Args>) -> Self {
        Resolver {
            registry,
            dep_args,
            memo: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Resolve one dependency, memoizing under its name.
    pub(crate) fn resolve(
        &mut self,
        req: &Request,
        dep_ref: &DependencyRef,
    ) -> Result<Value, ApiError> {
        let dep = match dep_ref {
            DependencyRef::Inline(dep) => Arc::clone(dep),
            DependencyRef::Named(name) => self.registry.get(name).cloned().ok_or_else(|| {
                ApiError::unhandled(format!("dependency '{name}' is not registered"))
            })?,
        };
        let name = dep.name().to_string();

        if let Some(value) = self.memo.get(&name) {
            debug!(dependency = %name, "Dependency served from memo");
            return Ok(value.clone());
        }
        if let Some(pos) = self.stack.iter().position(|n| *n == name) {
            let mut chain: Vec<String> = self.stack[pos..].to_vec();
            chain.push(name);
            return Err(ApiError::DependencyCycle { chain });
        }

        self.stack.push(name.clone());
        let mut args = self.dep_args.remove(&name).unwrap_or_default();
        for param in dep.params() {
            match &param.source {
                ParamSource::Dependency(inner) => {
                    let value = self.resolve(req, inner)?;
                    args.0.insert(param.name.clone(), value);
                }
                ParamSource::Security(scheme) => {
                    let value = self.resolve_scheme(req, scheme)?;
                    args.0.insert(param.name.clone(), value);
                }
                ParamSource::RawEvent => {
                    args.0.insert(param.name.clone(), (*req.envelope).clone());
                }
                _ => {}
            }
        }

        let value = dep.provider.provide(req, args).map_err(ApiError::from)?;
        self.stack.pop();
        debug!(dependency = %name, "Dependency resolved");
        self.memo.insert(name, value.clone());
        Ok(value)
    }

    /// Resolve a security scheme's claims, memoized under the scheme name.
    pub(crate) fn resolve_scheme(
        &mut self,
        req: &Request,
        scheme: &Arc<SecurityScheme>,
    ) -> Result<Value, ApiError> {
        if let Some(value) = self.memo.get(scheme.name()) {
            return Ok(value.clone());
        }
        let claims = scheme.resolve(req)?;
        self.memo.insert(scheme.name().to_string(), claims.clone());
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop(name: &str) -> Dependency {
        Dependency::new(name, provide_fn(|_req, _args| Ok(json!(null))))
    }

    #[test]
    fn test_verify_graph_flags_unknown_named_reference() {
        let registry = Registry::new();
        let root = DependencyRef::named("missing");
        let err = verify_graph(std::iter::once(&root), &registry).unwrap_err();
        assert!(matches!(err, BuildError::UnknownDependency(name) if name == "missing"));
    }

    #[test]
    fn test_verify_graph_flags_cycle_through_names() {
        let mut registry = Registry::new();
        registry.insert(
            "a".to_string(),
            Arc::new(
                noop("a").param(crate::params::ParamSpec::dependency(
                    "b",
                    DependencyRef::named("b"),
                )),
            ),
        );
        registry.insert(
            "b".to_string(),
            Arc::new(
                noop("b").param(crate::params::ParamSpec::dependency(
                    "a",
                    DependencyRef::named("a"),
                )),
            ),
        );
        let root = DependencyRef::named("a");
        let err = verify_graph(std::iter::once(&root), &registry).unwrap_err();
        match err {
            BuildError::DependencyCycle { chain } => {
                assert_eq!(chain.first().map(String::as_str), chain.last().map(String::as_str));
                assert!(chain.len() >= 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_verify_graph_flags_two_nodes_with_one_name() {
        let mut registry = Registry::new();
        registry.insert("db".to_string(), Arc::new(noop("db")));
        let rogue = DependencyRef::inline(noop("db"));
        let err = verify_graph(std::iter::once(&rogue), &registry).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateDependency(name) if name == "db"));
    }

    #[test]
    fn test_resolver_memoizes_by_name() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let dep = Arc::new(Dependency::new(
            "counter",
            provide_fn(|_req, _args| {
                let n = CALLS.fetch_add(1, Ordering::SeqCst);
                Ok(json!(n))
            }),
        ));

        let registry = Registry::new();
        let mut resolver = Resolver::new(&registry, HashMap::new());
        let req = crate::request::test_support::blank_request();
        let first = resolver
            .resolve(&req, &DependencyRef::shared(Arc::clone(&dep)))
            .unwrap();
        let second = resolver
            .resolve(&req, &DependencyRef::shared(dep))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }
}
