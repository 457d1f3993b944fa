//! Topic-indexed publish/subscribe.
//!
//! Fan-out of typed messages between the chain and the consensus
//! components. Subscribers register a bounded channel or a callback and
//! get an id for later removal. Publication snapshots the subscriber
//! list so the lock is never held across deliveries; per-listener
//! failures are logged, never propagated.

use crate::Topic;
use parking_lot::RwLock;
use sable_messages::{GossipFrame, GossipKind, Payload};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Buffer size of channel subscriptions.
const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// A message travelling on the bus.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: Topic,
    pub payload: Payload,
}

/// Handle for removing a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Inspects a message before delivery; an `Err` drops it.
pub trait Preprocessor: Send + Sync {
    fn apply(&self, msg: &BusMessage) -> Result<(), String>;
}

type Callback = Arc<dyn Fn(BusMessage) -> Result<(), String> + Send + Sync>;

enum Listener {
    Channel(mpsc::Sender<BusMessage>),
    Callback(Callback),
}

struct Inner {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<Topic, Vec<(u64, Listener)>>>,
    preprocessors: RwLock<HashMap<Topic, Vec<Arc<dyn Preprocessor>>>>,
}

impl Inner {
    fn publish(&self, topic: Topic, payload: Payload) {
        let msg = BusMessage { topic, payload };

        {
            let pre = self.preprocessors.read();
            if let Some(chain) = pre.get(&topic) {
                for p in chain {
                    if let Err(reason) = p.apply(&msg) {
                        debug!(%topic, reason, "message rejected by preprocessor");
                        return;
                    }
                }
            }
        }

        // Snapshot the listeners so delivery happens outside the lock.
        let targets: Vec<(u64, Listener)> = {
            let subs = self.subscribers.read();
            match subs.get(&topic) {
                Some(list) => list
                    .iter()
                    .map(|(id, l)| {
                        let l = match l {
                            Listener::Channel(tx) => Listener::Channel(tx.clone()),
                            Listener::Callback(cb) => Listener::Callback(cb.clone()),
                        };
                        (*id, l)
                    })
                    .collect(),
                None => Vec::new(),
            }
        };

        if targets.is_empty() {
            trace!(%topic, "no subscribers");
            return;
        }

        for (id, listener) in targets {
            match listener {
                Listener::Channel(tx) => {
                    if let Err(e) = tx.try_send(msg.clone()) {
                        warn!(%topic, subscriber = id, error = %e, "channel delivery failed");
                    }
                }
                Listener::Callback(cb) => {
                    if let Err(e) = cb(msg.clone()) {
                        warn!(%topic, subscriber = id, error = %e, "callback delivery failed");
                    }
                }
            }
        }
    }
}

/// The internal event bus. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(1),
                subscribers: RwLock::new(HashMap::new()),
                preprocessors: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Publish a message to every subscriber of `topic`.
    pub fn publish(&self, topic: Topic, payload: Payload) {
        self.inner.publish(topic, payload);
    }

    /// Subscribe with a bounded channel of the default capacity.
    pub fn subscribe(&self, topic: Topic) -> (SubscriptionId, mpsc::Receiver<BusMessage>) {
        self.subscribe_with_capacity(topic, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Subscribe with a bounded channel of the given capacity.
    pub fn subscribe_with_capacity(
        &self,
        topic: Topic,
        capacity: usize,
    ) -> (SubscriptionId, mpsc::Receiver<BusMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = self.register(topic, Listener::Channel(tx));
        (id, rx)
    }

    /// Subscribe with a callback invoked inline on publish.
    pub fn subscribe_callback<F>(&self, topic: Topic, callback: F) -> SubscriptionId
    where
        F: Fn(BusMessage) -> Result<(), String> + Send + Sync + 'static,
    {
        self.register(topic, Listener::Callback(Arc::new(callback)))
    }

    fn register(&self, topic: Topic, listener: Listener) -> SubscriptionId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .write()
            .entry(topic)
            .or_default()
            .push((id, listener));
        trace!(%topic, subscriber = id, "subscribed");
        SubscriptionId(id)
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, topic: Topic, id: SubscriptionId) -> bool {
        let mut subs = self.inner.subscribers.write();
        if let Some(list) = subs.get_mut(&topic) {
            let before = list.len();
            list.retain(|(sid, _)| *sid != id.0);
            return list.len() < before;
        }
        false
    }

    /// Append a preprocessor to `topic`'s chain.
    pub fn add_preprocessor(&self, topic: Topic, preprocessor: Arc<dyn Preprocessor>) {
        self.inner
            .preprocessors
            .write()
            .entry(topic)
            .or_default()
            .push(preprocessor);
    }

    /// Install the gossip republisher on every peer-visible topic.
    ///
    /// Each Score/Candidate/Reduction/Agreement/Block observation is
    /// re-emitted on [`Topic::Gossip`] exactly once, so the transport
    /// layer propagates it to peers.
    pub fn install_republisher(&self) {
        let republisher = Arc::new(Republisher {
            bus: Arc::downgrade(&self.inner),
        });
        for topic in [
            Topic::Score,
            Topic::Candidate,
            Topic::Reduction,
            Topic::Agreement,
            Topic::Block,
        ] {
            self.add_preprocessor(topic, republisher.clone());
        }
    }
}

/// Re-emits peer-visible traffic on the gossip topic.
///
/// Holds a weak handle so the bus does not own a cycle through its own
/// preprocessor table.
struct Republisher {
    bus: Weak<Inner>,
}

impl Preprocessor for Republisher {
    fn apply(&self, msg: &BusMessage) -> Result<(), String> {
        let Some(bus) = self.bus.upgrade() else {
            return Ok(());
        };
        if let Some(frame) = frame_payload(&msg.payload) {
            bus.publish(Topic::Gossip, Payload::Gossip(frame));
        }
        Ok(())
    }
}

/// Marshal a payload into its peer-facing frame, if it has one.
fn frame_payload(payload: &Payload) -> Option<GossipFrame> {
    let mut bytes = Vec::new();
    let kind = match payload {
        Payload::Score(msg) => {
            msg.marshal(&mut bytes);
            GossipKind::Score
        }
        Payload::Candidate(block) => {
            block.marshal(&mut bytes);
            GossipKind::Candidate
        }
        Payload::Reduction(msg) => {
            msg.marshal(&mut bytes);
            GossipKind::Reduction
        }
        Payload::Agreement(msg) => {
            msg.marshal(&mut bytes);
            GossipKind::Agreement
        }
        Payload::Block(block) => {
            block.marshal(&mut bytes);
            GossipKind::Block
        }
        _ => return None,
    };
    Some(GossipFrame::new(kind, bytes))
}
