//! In-memory message bus and TCP helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use avaxo_core::{
    BusChannel, BusConnection, Deliveries, Publish, QueueOptions, Transport, TransportError,
};
use avaxo_protocol::Endpoint;

/// How long tests wait for something that should happen promptly
pub const PROMPT: Duration = Duration::from_secs(5);

/// A message accepted by the bus
#[derive(Debug, Clone)]
pub struct Published {
    pub exchange: String,
    pub routing_key: String,
    pub mandatory: bool,
    pub content_type: String,
    pub body: Bytes,
}

struct Queue {
    sender: mpsc::UnboundedSender<Bytes>,
    receiver: Option<mpsc::UnboundedReceiver<Bytes>>,
}

impl Queue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

#[derive(Default)]
struct BusState {
    queues: HashMap<String, Queue>,
    declared: Vec<(String, QueueOptions)>,
    consumed: Vec<String>,
    published: Vec<Published>,
    generated: u64,
    dials: usize,
    open_connections: usize,
    open_channels: usize,
}

/// Broker stand-in implementing the transport traits.
///
/// Queues are single-consumer: whoever consumes a queue first, the agent or
/// the test acting as control plane, owns its messages.
#[derive(Clone, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<BusState>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BusState> {
        self.state.lock().unwrap()
    }

    /// Declare a named queue from the control plane's side
    pub fn declare(&self, name: &str) {
        self.state()
            .queues
            .entry(name.to_string())
            .or_insert_with(Queue::new);
    }

    /// Put a message on a queue as the control plane would
    pub fn send(&self, queue: &str, body: impl Into<Bytes>) {
        let state = self.state();
        let queue = state.queues.get(queue).expect("queue not declared");
        queue.sender.send(body.into()).expect("queue receiver gone");
    }

    /// Take the receiving end of a queue to consume it as the control plane
    pub fn take_receiver(&self, queue: &str) -> mpsc::UnboundedReceiver<Bytes> {
        self.state()
            .queues
            .get_mut(queue)
            .and_then(|q| q.receiver.take())
            .expect("queue missing or already consumed")
    }

    /// Drop every queue, ending all delivery streams
    pub fn shut_down(&self) {
        self.state().queues.clear();
    }

    pub fn published(&self) -> Vec<Published> {
        self.state().published.clone()
    }

    pub fn published_to(&self, routing_key: &str) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|p| p.routing_key == routing_key)
            .collect()
    }

    pub fn declared(&self) -> Vec<(String, QueueOptions)> {
        self.state().declared.clone()
    }

    pub fn consumed(&self) -> Vec<String> {
        self.state().consumed.clone()
    }

    pub fn dials(&self) -> usize {
        self.state().dials
    }

    pub fn open_connections(&self) -> usize {
        self.state().open_connections
    }

    pub fn open_channels(&self) -> usize {
        self.state().open_channels
    }

    /// Wait until every connection and channel has been closed
    pub async fn wait_released(&self) {
        tokio::time::timeout(PROMPT, async {
            while self.open_connections() != 0 || self.open_channels() != 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("bus resources were not released");
    }
}

#[async_trait]
impl Transport for MemoryBus {
    type Connection = MemoryConnection;

    async fn dial(&self, _url: &str) -> Result<Self::Connection, TransportError> {
        let mut state = self.state();
        state.dials += 1;
        state.open_connections += 1;
        Ok(MemoryConnection {
            bus: self.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

pub struct MemoryConnection {
    bus: MemoryBus,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl BusConnection for MemoryConnection {
    type Channel = MemoryChannel;

    async fn open_channel(&self) -> Result<Self::Channel, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Channel("connection closed".to_string()));
        }
        self.bus.state().open_channels += 1;
        Ok(MemoryChannel {
            bus: self.bus.clone(),
            closed: AtomicBool::new(false),
        })
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.bus.state().open_connections -= 1;
        }
        Ok(())
    }
}

pub struct MemoryChannel {
    bus: MemoryBus,
    closed: AtomicBool,
}

#[async_trait]
impl BusChannel for MemoryChannel {
    async fn declare_queue(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> Result<String, TransportError> {
        let mut state = self.bus.state();
        let name = if name.is_empty() {
            state.generated += 1;
            format!("amq.gen-{}", state.generated)
        } else {
            name.to_string()
        };
        state.queues.entry(name.clone()).or_insert_with(Queue::new);
        state.declared.push((name.clone(), options));
        Ok(name)
    }

    async fn publish(&self, message: Publish<'_>) -> Result<(), TransportError> {
        let mut state = self.bus.state();
        let body = Bytes::copy_from_slice(message.body);
        match state.queues.get(message.routing_key) {
            Some(queue) => {
                let _ = queue.sender.send(body.clone());
            }
            None if message.mandatory => {
                return Err(TransportError::Unroutable {
                    routing_key: message.routing_key.to_string(),
                })
            }
            None => return Ok(()),
        }
        state.published.push(Published {
            exchange: message.exchange.to_string(),
            routing_key: message.routing_key.to_string(),
            mandatory: message.mandatory,
            content_type: message.content_type.to_string(),
            body,
        });
        Ok(())
    }

    async fn consume(&self, queue: &str, _auto_ack: bool) -> Result<Deliveries, TransportError> {
        let mut state = self.bus.state();
        let receiver = state
            .queues
            .get_mut(queue)
            .and_then(|q| q.receiver.take())
            .ok_or_else(|| TransportError::Consume(format!("cannot consume {}", queue)))?;
        state.consumed.push(queue.to_string());

        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            receiver
                .recv()
                .await
                .map(|body| (Ok::<_, TransportError>(body), receiver))
        });
        Ok(Box::pin(stream))
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.bus.state().open_channels -= 1;
        }
        Ok(())
    }
}

/// Bind a loopback listener and describe it as a forward endpoint
pub async fn listen() -> (TcpListener, Endpoint) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, Endpoint::new("127.0.0.1", i32::from(port)))
}

/// An endpoint nothing is listening on
pub async fn closed_endpoint() -> Endpoint {
    let (listener, endpoint) = listen().await;
    drop(listener);
    endpoint
}
