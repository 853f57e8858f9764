use std::any::{type_name, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{BusError, Result};
use crate::weakbus::config::{BusConfig, ErrorPolicy};
use crate::weakbus::subscription::{LivenessToken, WeakSubscription};
use crate::weakbus::topics::{Detached, Topic};
use crate::weakbus::types::{HandlerResult, Message, SubscriptionId, TopicKey};

/// Outcome of one `publish` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Handlers that ran successfully
    pub delivered: usize,
    /// Dead subscriptions removed from the topic
    pub pruned: usize,
    /// Handlers that failed and were skipped (isolate policy only)
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    pub type_name: String,
    pub subscribers: usize,
    pub alive: usize,
}

/// Snapshot of all topics of a bus
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    pub name: String,
    pub topics: Vec<TopicStats>,
}

impl BusStats {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Routes messages to subscribers by the exact type of the message.
///
/// Subscribers are held weakly. A subscriber whose receiver has been dropped
/// stays in its topic until the next `publish` of that type removes it.
///
/// The bus never holds a lock while a handler runs, so handlers may publish,
/// subscribe or remove topics on the same bus.
pub struct MessageBus {
    topics: DashMap<TopicKey, Topic>,
    config: BusConfig,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        info!("Creating message bus {} ({:?})", config.name, config.error_policy);
        Self {
            topics: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Subscribes a free function to messages of type `T`
    pub fn subscribe<T, F>(&self, handler: F) -> SubscriptionId
    where
        T: Message,
        F: Fn(&T) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe_with(WeakSubscription::free(handler))
    }

    /// Subscribes `handler` bound to `receiver`; the bus keeps only a weak reference to it
    pub fn subscribe_bound<T, R, F>(&self, receiver: &Arc<R>, handler: F) -> SubscriptionId
    where
        T: Message,
        R: ?Sized + Send + Sync + 'static,
        F: Fn(&R, &T) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe_with(WeakSubscription::bound(receiver, handler))
    }

    /// Subscribes `handler` for as long as `token` (or a clone of it) exists
    pub fn subscribe_guarded<T, F>(&self, token: &LivenessToken, handler: F) -> SubscriptionId
    where
        T: Message,
        F: Fn(&T) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe_with(WeakSubscription::guarded(token, handler))
    }

    /// Appends a prepared subscription to the topic of `T`, creating the topic if needed
    pub fn subscribe_with<T: Message>(&self, subscription: WeakSubscription<T>) -> SubscriptionId {
        let id = subscription.id();
        let name = type_name::<T>();

        let rejected = {
            let mut topic = self.topics.entry(TypeId::of::<T>()).or_insert_with(|| {
                info!("Creating topic {}", name);
                Topic::new::<T>()
            });
            let pushed = topic.push(subscription);
            debug!("Added subscription {} to topic {} ({} subscribers)", id, name, topic.len());
            pushed.err()
        };
        // Dropped outside the shard lock
        drop(rejected);
        id
    }

    /// Delivers `message` to every live subscriber of `T`, in registration order.
    ///
    /// Subscribers found dead along the way are removed from the topic.
    /// Publishing a type nobody subscribed to is a no-op.
    pub fn publish<T: Message>(&self, message: &T) -> Result<Delivery> {
        let key = TypeId::of::<T>();
        let name = type_name::<T>();

        let subscribers = match self.topics.get(&key) {
            Some(topic) => topic.snapshot::<T>(),
            None => {
                debug!("No topic for {}, nothing to publish", name);
                return Ok(Delivery::default());
            }
        };
        debug!("Publishing {} to {} subscribers", name, subscribers.len());

        let mut delivery = Delivery::default();
        let mut dead: SmallVec<[SubscriptionId; 4]> = SmallVec::new();
        let mut failure = None;

        for subscription in subscribers.iter() {
            match subscription.invoke(message) {
                Ok(true) => delivery.delivered += 1,
                Ok(false) => dead.push(subscription.id()),
                Err(e) => match self.config.error_policy {
                    ErrorPolicy::FailFast => {
                        warn!("Handler {} for {} failed, aborting publish: {}", subscription.id(), name, e);
                        failure = Some(e);
                        break;
                    }
                    ErrorPolicy::Isolate => {
                        error!("Handler {} for {} failed: {}", subscription.id(), name, e);
                        delivery.failed += 1;
                    }
                },
            }
        }

        if !dead.is_empty() {
            delivery.pruned = self.prune(key, name, &dead);
        }

        match failure {
            Some(source) => Err(BusError::handler(name, source)),
            None => {
                debug!("Published {}: {:?}", name, delivery);
                Ok(delivery)
            }
        }
    }

    /// Deletes the topic of `T` with all of its subscriptions, alive or not.
    ///
    /// Returns whether the topic existed.
    pub fn remove_topic<T: Message>(&self) -> bool {
        let name = type_name::<T>();
        match self.topics.remove(&TypeId::of::<T>()) {
            Some((_, topic)) => {
                info!("Removed topic {} with {} subscriptions", name, topic.len());
                true
            }
            None => {
                debug!("Topic {} not found for removal", name);
                false
            }
        }
    }

    /// Removes a single subscription from the topic of `T`
    pub fn unsubscribe<T: Message>(&self, id: SubscriptionId) -> bool {
        let key = TypeId::of::<T>();
        let detached = match self.topics.get_mut(&key) {
            Some(mut topic) => topic.remove_ids(&[id]),
            None => Detached::new(),
        };
        let removed = !detached.is_empty();
        // The shard lock is released, destructors of the removed handler may use the bus
        drop(detached);

        if removed {
            debug!("Unsubscribed {} from topic {}", id, type_name::<T>());
            self.drop_if_empty(key, type_name::<T>());
        } else {
            debug!("Subscription {} not found in topic {}", id, type_name::<T>());
        }
        removed
    }

    /// Stored subscriptions of `T`, including dead ones not yet pruned
    pub fn subscriber_count<T: Message>(&self) -> usize {
        self.topics.get(&TypeId::of::<T>()).map_or(0, |topic| topic.len())
    }

    /// Subscriptions of `T` whose receiver is still alive
    pub fn alive_count<T: Message>(&self) -> usize {
        self.topics.get(&TypeId::of::<T>()).map_or(0, |topic| topic.alive())
    }

    pub fn has_topic<T: Message>(&self) -> bool {
        self.topics.contains_key(&TypeId::of::<T>())
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn stats(&self) -> BusStats {
        let mut topics: Vec<TopicStats> = self
            .topics
            .iter()
            .map(|entry| TopicStats {
                type_name: entry.value().type_name().to_string(),
                subscribers: entry.value().len(),
                alive: entry.value().alive(),
            })
            .collect();
        topics.sort_by(|a, b| a.type_name.cmp(&b.type_name));

        BusStats {
            name: self.config.name.clone(),
            topics,
        }
    }

    fn prune(&self, key: TopicKey, name: &'static str, dead: &[SubscriptionId]) -> usize {
        let detached = match self.topics.get_mut(&key) {
            Some(mut topic) => topic.remove_ids(dead),
            // Topic was removed by a handler during this publish
            None => Detached::new(),
        };
        let removed = detached.len();
        drop(detached);
        debug!("Pruned {} dead subscriptions from topic {}", removed, name);

        self.drop_if_empty(key, name);
        removed
    }

    fn drop_if_empty(&self, key: TopicKey, name: &'static str) {
        if !self.config.drop_empty_topics {
            return;
        }
        if self.topics.remove_if(&key, |_, topic| topic.is_empty()).is_some() {
            info!("Removed empty topic {}", name);
        }
    }
}
