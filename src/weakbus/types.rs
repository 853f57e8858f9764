use std::any::{Any, TypeId};
use std::fmt;
use uuid::Uuid;

/// Topic = TypeId of the message type
pub type TopicKey = TypeId;

/// Error raised by a subscriber's own handler
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of every subscriber handler
pub type HandlerResult = Result<(), HandlerError>;

/// Any value with a stable type identity can be published
pub trait Message: Any + Send + Sync {}

impl<T: Any + Send + Sync> Message for T {}

/// Identity of one registered subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", &self.0.simple().to_string()[..8])
    }
}
