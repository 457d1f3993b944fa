//! Internal buses for the sable node.
//!
//! Two backbones connect every component:
//!
//! - [`EventBus`]: topic-indexed fan-out of typed messages
//!   ([`sable_messages::Payload`]) with per-topic preprocessors and a
//!   gossip republisher.
//! - [`RequestBus`]: typed request/response with per-call timeouts and
//!   exactly one handler per topic.
//!
//! Topics are closed enums; no stringly-typed lookups exist at call
//! sites. The buses never reach back into components except through the
//! channel or callback handed to them at subscription time.

mod event_bus;
mod request_bus;
mod topic;

pub use event_bus::{BusMessage, EventBus, Preprocessor, SubscriptionId};
pub use request_bus::{
    BusError, Request, RequestBus, RequestParams, RequestResponse, RequestTopic,
};
pub use topic::Topic;
