//! Registry: the `service -> method -> handler` table.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::context::ServiceContext;
use crate::envelope::{valid_token, Datum, Route};
use crate::error::CommandError;
use crate::store::{TransactionMode, UnitOfWork};

/// A registered method handler.
pub type MethodFn<W> =
    Box<dyn Fn(&mut ServiceContext<'_, W>) -> Result<Datum, CommandError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("invalid service name {0:?}")]
    InvalidServiceName(String),

    #[error("invalid method name {method:?} on service {service}")]
    InvalidMethodName { service: String, method: String },

    #[error("service {0} registered twice")]
    DuplicateService(String),

    #[error("method {service}.{method} registered twice")]
    DuplicateMethod { service: String, method: String },

    #[error("service {0} has no methods")]
    EmptyService(String),
}

/// The methods of one service and the transaction mode they run under.
pub struct ServiceTable<W> {
    name: String,
    mode: TransactionMode,
    methods: HashMap<String, MethodFn<W>>,
    problems: Vec<RegistryError>,
}

impl<W: UnitOfWork> ServiceTable<W> {
    fn new(name: &str, mode: TransactionMode) -> Self {
        Self {
            name: name.to_string(),
            mode,
            methods: HashMap::new(),
            problems: Vec::new(),
        }
    }

    /// Register a method handler.
    ///
    /// Uses builder pattern, returns `self` for chaining.
    pub fn method<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&mut ServiceContext<'_, W>) -> Result<Datum, CommandError> + Send + Sync + 'static,
    {
        if !valid_token(name) {
            self.problems.push(RegistryError::InvalidMethodName {
                service: self.name.clone(),
                method: name.to_string(),
            });
        } else if self.methods.contains_key(name) {
            self.problems.push(RegistryError::DuplicateMethod {
                service: self.name.clone(),
                method: name.to_string(),
            });
        } else {
            self.methods.insert(name.to_string(), Box::new(handler));
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub(crate) fn handler(&self, method: &str) -> Option<&MethodFn<W>> {
        self.methods.get(method)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// All services the executor can dispatch to.
///
/// Built once at startup. Registration problems are collected while
/// building and reported by [`ServiceRegistry::validate`], which
/// [`get_factory`](super::get_factory) calls before anything is dispatched.
///
/// ## Example
///
/// ```ignore
/// let registry = ServiceRegistry::new()
///     .service("schools", TransactionMode::NonTransactional, |table| {
///         table
///             .method("createSchool", schools::create_school)
///             .method("getSchool", schools::get_school)
///     });
/// registry.validate()?;
/// ```
pub struct ServiceRegistry<W> {
    services: HashMap<String, ServiceTable<W>>,
    problems: Vec<RegistryError>,
}

impl<W: UnitOfWork> Default for ServiceRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: UnitOfWork> ServiceRegistry<W> {
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
            problems: Vec::new(),
        }
    }

    /// Register a service; `build` adds its methods.
    pub fn service<F>(mut self, name: &str, mode: TransactionMode, build: F) -> Self
    where
        F: FnOnce(ServiceTable<W>) -> ServiceTable<W>,
    {
        let mut table = build(ServiceTable::new(name, mode));
        self.problems.append(&mut table.problems);

        if !valid_token(name) {
            self.problems
                .push(RegistryError::InvalidServiceName(name.to_string()));
        } else if self.services.contains_key(name) {
            self.problems
                .push(RegistryError::DuplicateService(name.to_string()));
        } else if table.methods.is_empty() {
            self.problems
                .push(RegistryError::EmptyService(name.to_string()));
        } else {
            self.services.insert(name.to_string(), table);
        }
        self
    }

    /// First registration problem, if any.
    pub fn validate(&self) -> Result<(), RegistryError> {
        match self.problems.first() {
            Some(problem) => Err(problem.clone()),
            None => Ok(()),
        }
    }

    pub fn lookup(&self, service: &str) -> Option<&ServiceTable<W>> {
        self.services.get(service)
    }

    /// Whether `route` names a registered method.
    pub fn resolves(&self, route: &Route) -> bool {
        self.lookup(&route.service)
            .map(|table| table.has_method(&route.method))
            .unwrap_or(false)
    }

    /// Registered service names, sorted.
    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Every registered route, as `method_service` event names.
    pub fn events(&self) -> HashSet<String> {
        self.services
            .values()
            .flat_map(|table| {
                table
                    .methods
                    .keys()
                    .map(move |method| format!("{}_{}", method, table.name))
            })
            .collect()
    }
}
