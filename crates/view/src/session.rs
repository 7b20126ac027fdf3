use taskboard_core::config::ViewConfig;
use taskboard_core::protocol::{Ack, DeleteOutcome, Request, Response};
use taskboard_core::{CoreError, Item, ItemEdit, ItemId, NewItem};

use crate::controller::{DropEvent, RefreshOutcome, Resolution, ViewController};
use crate::error::ViewError;

/// One request/response exchange with the engine. Implementations may fail
/// with [`taskboard_core::protocol::ErrorKind::Transport`] without reaching it.
pub trait Transport {
    fn send(&mut self, request: &Request) -> Response;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, request: &Request) -> Response {
        (**self).send(request)
    }
}

fn unexpected(request: &str, ack: &Ack) -> ViewError {
    CoreError::InvalidData(format!("unexpected acknowledgement to {request}: {ack:?}")).into()
}

/// Drives a [`ViewController`] against a transport: propose, send, complete,
/// then reconcile and re-list after a failure.
///
/// Each call blocks until its exchange finishes, so at most one move is ever
/// in flight. Callers that keep the UI responsive while requests are
/// outstanding use the controller's ticket API
/// ([`ViewController::propose`] / [`ViewController::complete`]) directly.
pub struct Session<T: Transport> {
    controller: ViewController,
    transport: T,
    retry_attempts: u32,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: &ViewConfig) -> Self {
        Self {
            controller: ViewController::new(config.target_encoding),
            transport,
            retry_attempts: config.retry_attempts,
        }
    }

    pub fn controller(&self) -> &ViewController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ViewController {
        &mut self.controller
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Fetch the whole board and replace the local snapshots.
    pub fn load(&mut self) -> Result<RefreshOutcome, ViewError> {
        match self.transport.send(&Request::List { group: None })? {
            Ack::Listed(items) => Ok(self.controller.refresh(items)),
            other => Err(unexpected("list", &other)),
        }
    }

    pub fn create(&mut self, new_item: NewItem) -> Result<Item, ViewError> {
        let ack = self.transport.send(&Request::Create(new_item))?;
        self.controller.absorb(&ack);
        match ack {
            Ack::Created(item) => Ok(item),
            other => Err(unexpected("create", &other)),
        }
    }

    pub fn edit(&mut self, item_id: ItemId, edit: ItemEdit) -> Result<Item, ViewError> {
        let ack = self.transport.send(&Request::Edit { item_id, edit })?;
        self.controller.absorb(&ack);
        match ack {
            Ack::Edited(item) => Ok(item),
            other => Err(unexpected("edit", &other)),
        }
    }

    pub fn delete(&mut self, item_id: ItemId) -> Result<DeleteOutcome, ViewError> {
        let ack = self.transport.send(&Request::Delete { item_id })?;
        self.controller.absorb(&ack);
        match ack {
            Ack::Deleted(outcome) => Ok(outcome),
            other => Err(unexpected("delete", &other)),
        }
    }

    /// Handle one drop end to end. `Ok(None)` when the drop changed nothing.
    pub fn drop_item(&mut self, event: DropEvent) -> Result<Option<Resolution>, ViewError> {
        let Some(pending) = self.controller.propose(event)? else {
            return Ok(None);
        };
        let response = self.transport.send(&pending.request);
        let resolution = self.controller.complete(pending.ticket, response)?;

        if let Resolution::RolledBack { recovery, .. } = &resolution {
            if !recovery.is_empty() {
                self.reconcile(recovery.clone());
            }
            self.resync();
        }
        Ok(Some(resolution))
    }

    /// Send recovery requests until none is left or the attempts run out.
    /// A non-retryable failure drops its request. Returns `false` when
    /// retryable requests were still pending at the end.
    pub fn reconcile(&mut self, mut pending: Vec<Request>) -> bool {
        for attempt in 1..=self.retry_attempts {
            let transport = &mut self.transport;
            pending.retain(|request| match transport.send(request) {
                Ok(_) => false,
                Err(failure) => {
                    tracing::warn!(attempt, request = request.name(), "reconciliation failed: {failure}");
                    failure.kind.is_retryable()
                }
            });
            if pending.is_empty() {
                return true;
            }
        }
        tracing::warn!(remaining = pending.len(), "reconciliation abandoned");
        false
    }

    /// Re-list the board after a failure. A failed list leaves the local
    /// state as it is.
    fn resync(&mut self) -> Option<RefreshOutcome> {
        match self.load() {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!("resync after rollback failed: {e}");
                None
            }
        }
    }
}
