//! Service factory: one fresh unit of work per command.

use std::sync::Arc;

use log::debug;

use super::context::{Collaborators, ServiceContext};
use super::registry::{RegistryError, ServiceRegistry, ServiceTable};
use crate::envelope::Datum;
use crate::error::CommandError;
use crate::notifier::UpdateNotifier;
use crate::producer::CommandProducer;
use crate::store::{UnitOfWork, UnitOfWorkFactory};
use crate::transport::TransportService;

/// Validate `registry` and bind it to its collaborators.
pub fn get_factory<F: UnitOfWorkFactory>(
    units: F,
    registry: ServiceRegistry<F::Work>,
    producer: Arc<CommandProducer>,
    transport: TransportService,
    notifier: Arc<UpdateNotifier>,
) -> Result<ServiceFactory<F>, RegistryError> {
    registry.validate()?;
    Ok(ServiceFactory {
        units,
        registry,
        collaborators: Collaborators {
            producer,
            transport,
            notifier,
        },
    })
}

/// Resolves a service name to a [`HandlerBundle`].
pub struct ServiceFactory<F: UnitOfWorkFactory> {
    units: F,
    registry: ServiceRegistry<F::Work>,
    collaborators: Collaborators,
}

impl<F: UnitOfWorkFactory> ServiceFactory<F> {
    /// Begin a unit of work for `service` in the service's transaction mode.
    ///
    /// Unknown services fail with [`CommandError::Routing`]; a store that
    /// cannot begin fails with an infrastructure error.
    pub fn bundle(&self, service: &str) -> Result<HandlerBundle<'_, F::Work>, CommandError> {
        let table = self
            .registry
            .lookup(service)
            .ok_or_else(|| CommandError::Routing(service.to_string()))?;
        let work = self.units.begin(table.mode())?;
        debug!("began {:?} unit of work for {}", table.mode(), service);
        Ok(HandlerBundle {
            table,
            work,
            collaborators: &self.collaborators,
        })
    }

    pub fn registry(&self) -> &ServiceRegistry<F::Work> {
        &self.registry
    }

    pub fn producer(&self) -> &Arc<CommandProducer> {
        &self.collaborators.producer
    }

    pub fn transport(&self) -> &TransportService {
        &self.collaborators.transport
    }

    pub fn notifier(&self) -> &Arc<UpdateNotifier> {
        &self.collaborators.notifier
    }
}

/// A service bound to one unit of work.
///
/// The bundle exclusively owns its unit of work. `dispose` releases it;
/// a bundle dropped without `dispose` releases it too.
pub struct HandlerBundle<'a, W: UnitOfWork> {
    table: &'a ServiceTable<W>,
    work: W,
    collaborators: &'a Collaborators,
}

impl<'a, W: UnitOfWork> HandlerBundle<'a, W> {
    pub fn service(&self) -> &str {
        self.table.name()
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.table.has_method(method)
    }

    /// Run `method` with positional `args` inside this bundle's unit of work.
    pub fn invoke(&mut self, method: &str, args: &[Datum]) -> Result<Datum, CommandError> {
        let handler = self.table.handler(method).ok_or_else(|| {
            CommandError::Routing(format!("{}.{}", self.table.name(), method))
        })?;
        let mut ctx = ServiceContext::new(
            self.table.name(),
            method,
            args,
            &mut self.work,
            self.collaborators,
        );
        handler(&mut ctx)
    }

    /// Commit the unit of work.
    pub fn commit(&mut self) -> Result<(), CommandError> {
        self.work.commit().map_err(CommandError::from)
    }

    /// Release the unit of work. Consumes the bundle, so no method can run
    /// after it.
    pub fn dispose(mut self) {
        self.work.dispose();
    }
}

impl<W: UnitOfWork> Drop for HandlerBundle<'_, W> {
    fn drop(&mut self) {
        if !self.work.is_disposed() {
            self.work.dispose();
        }
    }
}
