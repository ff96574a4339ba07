//! Context passed to method handlers.
//!
//! Carries the positional arguments, the command's unit of work, and the
//! collaborators a handler may call on: the producer (to issue follow-up
//! commands), the transport, and the update notifier.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::envelope::Datum;
use crate::error::CommandError;
use crate::notifier::UpdateNotifier;
use crate::producer::CommandProducer;
use crate::store::{Repository, UnitOfWork};
use crate::transport::TransportService;

/// Collaborators shared by every handler invocation.
#[derive(Clone)]
pub struct Collaborators {
    pub producer: Arc<CommandProducer>,
    pub transport: TransportService,
    pub notifier: Arc<UpdateNotifier>,
}

/// The context passed to every method handler.
///
/// Generic over `W` (the unit of work type) so handlers can reach the store
/// through whatever implementation the executor is configured with.
///
/// ## Example
///
/// ```ignore
/// pub fn handle<W: UnitOfWork>(ctx: &mut ServiceContext<'_, W>) -> Result<Datum, CommandError> {
///     let input: CreateSchool = ctx.arg(0)?;
///     let id = ctx.repository("schools").insert(json!({ "_id": input.id(), "name": input.name }))?;
///     Ok(Datum::from(json!({ "_id": id })))
/// }
/// ```
pub struct ServiceContext<'a, W> {
    service: &'a str,
    method: &'a str,
    args: &'a [Datum],
    work: &'a mut W,
    collaborators: &'a Collaborators,
}

impl<'a, W: UnitOfWork> ServiceContext<'a, W> {
    pub(crate) fn new(
        service: &'a str,
        method: &'a str,
        args: &'a [Datum],
        work: &'a mut W,
        collaborators: &'a Collaborators,
    ) -> Self {
        Self {
            service,
            method,
            args,
            work,
            collaborators,
        }
    }

    pub fn service(&self) -> &str {
        self.service
    }

    pub fn method(&self) -> &str {
        self.method
    }

    /// All positional arguments.
    pub fn args(&self) -> &[Datum] {
        self.args
    }

    /// Deserialize the positional argument at `index`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, CommandError> {
        let datum = self.raw_arg(index).ok_or_else(|| {
            CommandError::DecodeFailed(format!(
                "{}.{} expects an argument at position {}",
                self.service, self.method, index
            ))
        })?;
        datum
            .decode()
            .map_err(|e| CommandError::DecodeFailed(format!("argument {}: {}", index, e)))
    }

    pub fn raw_arg(&self, index: usize) -> Option<&Datum> {
        self.args.get(index)
    }

    /// The unit of work this command runs in.
    pub fn work(&mut self) -> &mut W {
        &mut *self.work
    }

    /// One collection of the unit of work.
    pub fn repository(&mut self, name: &str) -> Repository<'_, W> {
        self.work.repository(name)
    }

    pub fn producer(&self) -> &CommandProducer {
        &self.collaborators.producer
    }

    pub fn transport(&self) -> &TransportService {
        &self.collaborators.transport
    }

    pub fn notifier(&self) -> &UpdateNotifier {
        &self.collaborators.notifier
    }
}
