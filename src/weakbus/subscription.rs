use std::fmt;
use std::sync::{Arc, Weak};

use log::debug;
use crate::weakbus::types::{HandlerError, HandlerResult, Message, SubscriptionId};

/// Non-owning view on whatever keeps a subscription alive
trait Liveness: Send + Sync {
    fn is_alive(&self) -> bool;
}

impl<R: ?Sized + Send + Sync> Liveness for Weak<R> {
    fn is_alive(&self) -> bool {
        self.strong_count() > 0
    }
}

/// Bound call: `None` when the receiver could not be resolved anymore
type Entry<T> = Box<dyn Fn(&T) -> Option<HandlerResult> + Send + Sync>;

/// Owning side of a guarded subscription.
///
/// The subscriber keeps the token, the bus only observes it. Once the token
/// and all of its clones are dropped, every subscription guarded by it is dead.
#[derive(Debug, Clone, Default)]
pub struct LivenessToken(Arc<()>);

impl LivenessToken {
    pub fn new() -> Self {
        Self(Arc::new(()))
    }

    /// Non-owning observer of this token
    pub fn observer(&self) -> Weak<()> {
        Arc::downgrade(&self.0)
    }
}

/// One subscriber callback that does not keep its receiver alive
pub struct WeakSubscription<T> {
    id: SubscriptionId,
    receiver: Option<Box<dyn Liveness>>,
    entry: Entry<T>,
}

impl<T: Message> WeakSubscription<T> {
    /// Wraps a free function. Without a receiver it never dies.
    pub fn free<F>(handler: F) -> Self
    where
        F: Fn(&T) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            id: SubscriptionId::new(),
            receiver: None,
            entry: Box::new(move |message: &T| Some(handler(message))),
        }
    }

    /// Binds `handler` to `receiver`, holding the receiver only weakly.
    pub fn bound<R, F>(receiver: &Arc<R>, handler: F) -> Self
    where
        R: ?Sized + Send + Sync + 'static,
        F: Fn(&R, &T) -> HandlerResult + Send + Sync + 'static,
    {
        let target = Arc::downgrade(receiver);
        let liveness = target.clone();
        Self {
            id: SubscriptionId::new(),
            receiver: Some(Box::new(liveness)),
            entry: Box::new(move |message: &T| target.upgrade().map(|receiver| handler(&*receiver, message))),
        }
    }

    /// Ties `handler` to the lifetime of `token`.
    pub fn guarded<F>(token: &LivenessToken, handler: F) -> Self
    where
        F: Fn(&T) -> HandlerResult + Send + Sync + 'static,
    {
        let target = token.observer();
        let liveness = target.clone();
        Self {
            id: SubscriptionId::new(),
            receiver: Some(Box::new(liveness)),
            // The upgraded token is held for the duration of the call
            entry: Box::new(move |message: &T| target.upgrade().map(|_token| handler(message))),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// True while the receiver still exists. Free functions are always alive.
    pub fn is_alive(&self) -> bool {
        self.receiver.as_ref().map_or(true, |receiver| receiver.is_alive())
    }

    /// Calls the handler with `message`.
    ///
    /// Returns `Ok(false)` without calling anything if the receiver is gone,
    /// `Ok(true)` after a successful call. Handler errors are passed through.
    pub fn invoke(&self, message: &T) -> Result<bool, HandlerError> {
        if !self.is_alive() {
            debug!("Subscription {} is dead, skipping", self.id);
            return Ok(false);
        }

        match (self.entry)(message) {
            Some(result) => result.map(|()| true),
            None => {
                debug!("Receiver of subscription {} dropped before invocation", self.id);
                Ok(false)
            }
        }
    }
}

impl<T> fmt::Debug for WeakSubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakSubscription")
            .field("id", &self.id)
            .field("bound", &self.receiver.is_some())
            .field("alive", &self.receiver.as_ref().map_or(true, |r| r.is_alive()))
            .finish()
    }
}
