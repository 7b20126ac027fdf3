use taskboard_core::protocol::{self, Failure, Request, Response};
use taskboard_engine::Engine;
use taskboard_storage::ItemStore;
use taskboard_view::Transport;

/// Delivers requests to an in-process engine through a MessagePack frame in
/// each direction.
pub struct LoopbackTransport<S: ItemStore> {
    engine: Engine<S>,
}

impl<S: ItemStore> LoopbackTransport<S> {
    pub fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine<S> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<S> {
        &mut self.engine
    }

    pub fn into_engine(self) -> Engine<S> {
        self.engine
    }

    fn round_trip(&mut self, request: &Request) -> Result<Response, Failure> {
        let frame = protocol::to_msgpack(request).map_err(|e| Failure::transport(e.to_string()))?;
        let request: Request =
            protocol::from_msgpack(&frame).map_err(|e| Failure::transport(e.to_string()))?;

        let response = self.engine.handle(request);

        let frame = protocol::to_msgpack(&response).map_err(|e| Failure::transport(e.to_string()))?;
        protocol::from_msgpack(&frame).map_err(|e| Failure::transport(e.to_string()))
    }
}

impl<S: ItemStore> Transport for LoopbackTransport<S> {
    fn send(&mut self, request: &Request) -> Response {
        self.round_trip(request).unwrap_or_else(Err)
    }
}

/// How a [`FaultyTransport`] mistreats the next requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFault {
    /// The request never reaches the engine.
    DropRequest,
    /// The engine applies the request but the reply is lost.
    DropResponse,
}

/// Wraps a transport and fails queued exchanges with a transport error.
pub struct FaultyTransport<T> {
    inner: T,
    queued: Vec<LinkFault>,
}

impl<T: Transport> FaultyTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            queued: Vec::new(),
        }
    }

    /// Apply `fault` to the next `count` exchanges, after any already queued.
    pub fn queue(&mut self, fault: LinkFault, count: usize) {
        self.queued.splice(0..0, std::iter::repeat_n(fault, count));
    }

    pub fn clear(&mut self) {
        self.queued.clear();
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: Transport> Transport for FaultyTransport<T> {
    fn send(&mut self, request: &Request) -> Response {
        match self.queued.pop() {
            None => self.inner.send(request),
            Some(LinkFault::DropRequest) => Err(Failure::transport(format!("{} request lost", request.name()))),
            Some(LinkFault::DropResponse) => {
                let _ = self.inner.send(request);
                Err(Failure::transport(format!("{} response lost", request.name())))
            }
        }
    }
}
