//! service: explicit handler resolution for the command executor.
//!
//! Services are registered by name in a [`ServiceRegistry`], each with a
//! table of named methods. The executor never calls a method by reflection:
//! an envelope's `method_service` event is looked up in the table, and a
//! miss is a routing error.
//!
//! ## Quick Start
//!
//! ```ignore
//! use schoolbus::service::{get_factory, ServiceRegistry};
//! use schoolbus::store::TransactionMode;
//!
//! let registry = ServiceRegistry::new()
//!     .service("schools", TransactionMode::NonTransactional, |table| {
//!         schoolbus::register_methods!(table, handlers::create_school, handlers::get_school)
//!     });
//!
//! let factory = get_factory(store, registry, producer, transport, notifier)?;
//! let mut bundle = factory.bundle("schools")?;
//! let result = bundle.invoke("createSchool", &args)?;
//! bundle.commit()?;
//! bundle.dispose();
//! ```
//!
//! ## Handler Convention
//!
//! Each handler module declares its wire name as a constant:
//!
//! ```ignore
//! // src/handlers/create_school.rs
//!
//! pub const METHOD: &str = "createSchool";
//!
//! pub fn handle<W: UnitOfWork>(
//!     ctx: &mut ServiceContext<'_, W>,
//! ) -> Result<Datum, CommandError> {
//!     let input: CreateSchool = ctx.arg(0)?;
//!     // ...
//! }
//! ```

mod context;
mod factory;
mod registry;

pub use context::{Collaborators, ServiceContext};
pub use factory::{get_factory, HandlerBundle, ServiceFactory};
pub use registry::{MethodFn, RegistryError, ServiceRegistry, ServiceTable};

/// Register handler modules on a service table using the convention pattern.
///
/// Each handler module must export:
/// - `METHOD: &str`, the method's wire name
/// - `handle(ctx) -> Result<Datum, CommandError>`, the handler
///
/// # Example
/// ```ignore
/// let registry = ServiceRegistry::new().service("courses", TransactionMode::Transactional, |table| {
///     schoolbus::register_methods!(table, handlers::enroll, handlers::unenroll)
/// });
/// ```
#[macro_export]
macro_rules! register_methods {
    ($table:expr, $( $($seg:ident)::+ ),+ $(,)?) => {
        $table
        $(
            .method(
                $($seg)::+::METHOD,
                $($seg)::+::handle,
            )
        )+
    };
}
