use schoolbus::store::{InMemoryUnitOfWork, TransactionMode};
use schoolbus::{ServiceContext, ServiceRegistry};

pub type Ctx<'a> = ServiceContext<'a, InMemoryUnitOfWork>;

pub mod create_course;
pub mod create_school;
pub mod enroll;
pub mod get_school;
pub mod record;

/// The school domain as the executor sees it.
pub fn registry() -> ServiceRegistry<InMemoryUnitOfWork> {
    ServiceRegistry::new()
        .service("schools", TransactionMode::NonTransactional, |table| {
            schoolbus::register_methods!(table, create_school, get_school)
        })
        .service("courses", TransactionMode::Transactional, |table| {
            schoolbus::register_methods!(table, create_course, enroll)
        })
        .service("audit", TransactionMode::NonTransactional, |table| {
            schoolbus::register_methods!(table, record)
        })
}
