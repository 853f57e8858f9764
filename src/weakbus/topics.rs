use std::any::{type_name, Any};
use std::sync::Arc;

use log::{debug, error};
use smallvec::SmallVec;
use crate::weakbus::subscription::WeakSubscription;
use crate::weakbus::types::{Message, SubscriptionId};

/// Subscriptions taken out of a topic.
///
/// Dropping them runs user destructors, so it must happen after the map lock is released.
pub(crate) type Detached = SmallVec<[Box<dyn Any + Send + Sync>; 4]>;

/// Type-erased view on the subscriber list of one topic
trait Subscribers: Send + Sync {
    fn len(&self) -> usize;
    fn alive(&self) -> usize;
    fn remove_ids(&mut self, ids: &[SubscriptionId]) -> Detached;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Subscribers of one message type in registration order
struct SubscriberList<T>(Vec<Arc<WeakSubscription<T>>>);

impl<T: Message> Subscribers for SubscriberList<T> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn alive(&self) -> usize {
        self.0.iter().filter(|sub| sub.is_alive()).count()
    }

    fn remove_ids(&mut self, ids: &[SubscriptionId]) -> Detached {
        let (removed, kept): (Vec<_>, Vec<_>) = self.0.drain(..).partition(|sub| ids.contains(&sub.id()));
        self.0 = kept;
        removed
            .into_iter()
            .map(|sub| Box::new(sub) as Box<dyn Any + Send + Sync>)
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One entry of the topic mapping
pub(crate) struct Topic {
    type_name: &'static str,
    subscribers: Box<dyn Subscribers>,
}

impl Topic {
    pub fn new<T: Message>() -> Self {
        Self {
            type_name: type_name::<T>(),
            subscribers: Box::new(SubscriberList::<T>(Vec::new())),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Appends a subscription at the end of the dispatch order.
    ///
    /// A subscription of a foreign message type is handed back unchanged.
    pub fn push<T: Message>(&mut self, subscription: WeakSubscription<T>) -> Result<(), WeakSubscription<T>> {
        match self.subscribers.as_any_mut().downcast_mut::<SubscriberList<T>>() {
            Some(list) => {
                list.0.push(Arc::new(subscription));
                Ok(())
            }
            None => {
                error!(
                    "Topic {} cannot hold subscribers of {}, rejecting {}",
                    self.type_name,
                    type_name::<T>(),
                    subscription.id()
                );
                Err(subscription)
            }
        }
    }

    /// Copy of the current subscriber list, used for dispatch without holding the map lock
    pub fn snapshot<T: Message>(&self) -> Vec<Arc<WeakSubscription<T>>> {
        match self.subscribers.as_any().downcast_ref::<SubscriberList<T>>() {
            Some(list) => list.0.clone(),
            None => {
                error!("Topic {} requested as {}", self.type_name, type_name::<T>());
                Vec::new()
            }
        }
    }

    /// Takes the given subscriptions out of the topic
    pub fn remove_ids(&mut self, ids: &[SubscriptionId]) -> Detached {
        let removed = self.subscribers.remove_ids(ids);
        debug!("Removed {} subscriptions from topic {}", removed.len(), self.type_name);
        removed
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn alive(&self) -> usize {
        self.subscribers.alive()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
