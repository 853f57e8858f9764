pub mod bus;
pub mod config;
pub mod demo;
pub mod subscription;
pub mod types;
mod topics;

pub use bus::{BusStats, Delivery, MessageBus, TopicStats};
pub use config::{BusConfig, ErrorPolicy};
pub use subscription::{LivenessToken, WeakSubscription};
pub use types::{HandlerError, HandlerResult, Message, SubscriptionId};
