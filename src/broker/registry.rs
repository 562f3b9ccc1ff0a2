//! Registry
//!
//! The registry is the single authority over publishers, topics and
//! subscribers. It owns:
//! - the topic collection, indexed by case-folded name
//! - the subscriber table, mapping ids to live connection handles
//! - the publisher and subscriber id counters
//!
//! Concurrency and usage notes:
//! - All state sits behind one `std::sync::Mutex`; every public method takes
//!   `&self`, so the registry is shared as `Arc<Registry>` between the
//!   listener, the sweeper and the management API.
//! - Critical sections only touch maps and sets. `publish` snapshots the
//!   member handles under the lock and sends after releasing it, so a slow
//!   subscriber never stalls other registry operations.
//! - Removing a subscriber drops it from the table and from every topic in
//!   the same critical section; no reader can observe a member without a
//!   table entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::broker::topic::{Topic, topic_key};
use crate::utils::error::RegistryError;

pub type PublisherId = u64;
pub type SubscriberId = u64;

/// What the registry needs from a subscriber's connection.
///
/// Implementations must not block for long: `send` is fire-and-forget and
/// `is_alive` is a quick probe.
pub trait SubscriberHandle: Send + Sync {
    /// Deliver one text message. Failures are handled (logged) by the
    /// implementation and never reported back.
    fn send(&self, message: &str);

    /// Best-effort check whether the peer is still connected.
    fn is_alive(&self) -> bool;

    /// Tell the peer it is being disconnected.
    fn close(&self) {}

    /// Called with the assigned id before the registry lock is released,
    /// so anything sent here precedes every delivery to this subscriber.
    fn registered(&self, _id: SubscriberId) {}
}

struct SubscriberEntry {
    handle: Arc<dyn SubscriberHandle>,
    joined_at: DateTime<Utc>,
}

#[derive(Default)]
struct RegistryState {
    topics: HashMap<String, Topic>,
    subscribers: HashMap<SubscriberId, SubscriberEntry>,
    next_publisher: PublisherId,
    next_subscriber: SubscriberId,
}

impl RegistryState {
    fn topic(&self, name: &str) -> Result<&Topic, RegistryError> {
        self.topics
            .get(&topic_key(name))
            .ok_or_else(|| RegistryError::UnknownTopic(name.to_string()))
    }

    fn topic_mut(&mut self, name: &str) -> Result<&mut Topic, RegistryError> {
        self.topics
            .get_mut(&topic_key(name))
            .ok_or_else(|| RegistryError::UnknownTopic(name.to_string()))
    }

    fn ensure_subscriber(&self, id: SubscriberId) -> Result<(), RegistryError> {
        if self.subscribers.contains_key(&id) {
            Ok(())
        } else {
            Err(RegistryError::UnknownSubscriber(id))
        }
    }

    /// Drop `id` from the table and from every topic.
    fn remove_subscriber(&mut self, id: SubscriberId) -> Option<SubscriberEntry> {
        let entry = self.subscribers.remove(&id)?;
        for topic in self.topics.values_mut() {
            topic.unsubscribe(id);
        }
        Some(entry)
    }
}

#[derive(Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Registry")
            .field("topics", &state.topics.len())
            .field("subscribers", &state.subscribers.len())
            .field("next_publisher", &state.next_publisher)
            .field("next_subscriber", &state.next_subscriber)
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        // Every critical section leaves the state consistent before it can
        // panic, so a poisoned lock is still safe to use.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_publisher(&self) -> PublisherId {
        let mut state = self.state();
        let id = state.next_publisher;
        state.next_publisher += 1;
        debug!("Registered publisher {id}");
        id
    }

    pub fn register_subscriber(&self, handle: Arc<dyn SubscriberHandle>) -> SubscriberId {
        let mut state = self.state();
        let id = state.next_subscriber;
        state.next_subscriber += 1;
        handle.registered(id);
        state.subscribers.insert(
            id,
            SubscriberEntry {
                handle,
                joined_at: Utc::now(),
            },
        );
        info!("Registered subscriber {id}");
        id
    }

    pub fn create_topic(&self, publisher: PublisherId, name: &str) -> Result<(), RegistryError> {
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyTopicName);
        }

        let mut state = self.state();
        if publisher >= state.next_publisher {
            return Err(RegistryError::UnknownPublisher(publisher));
        }

        let key = topic_key(name);
        if state.topics.contains_key(&key) {
            return Err(RegistryError::DuplicateTopic(name.to_string()));
        }

        state.topics.insert(key, Topic::new(name, publisher));
        info!("Publisher {publisher} created topic '{name}'");
        Ok(())
    }

    /// Remove `name` if, and only if, `publisher` owns it.
    pub fn remove_topic(&self, publisher: PublisherId, name: &str) -> Result<(), RegistryError> {
        let mut state = self.state();
        let topic = state.topic(name)?;
        if !topic.is_owned_by(publisher) {
            return Err(RegistryError::NotOwner {
                publisher,
                topic: topic.name.clone(),
            });
        }

        state.topics.remove(&topic_key(name));
        info!("Publisher {publisher} removed topic '{name}'");
        Ok(())
    }

    /// Remove every topic owned by `publisher`, returning how many went away.
    pub fn remove_all_topics(&self, publisher: PublisherId) -> usize {
        let mut state = self.state();
        let before = state.topics.len();
        state.topics.retain(|_, topic| !topic.is_owned_by(publisher));
        let removed = before - state.topics.len();
        if removed > 0 {
            info!("Removed {removed} topics owned by publisher {publisher}");
        }
        removed
    }

    pub fn subscribe(&self, subscriber: SubscriberId, name: &str) -> Result<(), RegistryError> {
        let mut state = self.state();
        state.ensure_subscriber(subscriber)?;
        let topic = state.topic_mut(name)?;
        if !topic.subscribe(subscriber) {
            return Err(RegistryError::AlreadySubscribed {
                subscriber,
                topic: topic.name.clone(),
            });
        }
        debug!("Subscriber {subscriber} joined '{}'", topic.name);
        Ok(())
    }

    pub fn unsubscribe(&self, subscriber: SubscriberId, name: &str) -> Result<(), RegistryError> {
        let mut state = self.state();
        state.ensure_subscriber(subscriber)?;
        let topic = state.topic_mut(name)?;
        if !topic.unsubscribe(subscriber) {
            return Err(RegistryError::NotSubscribed {
                subscriber,
                topic: topic.name.clone(),
            });
        }
        debug!("Subscriber {subscriber} left '{}'", topic.name);
        Ok(())
    }

    /// Push `message` to every current member of `name`.
    ///
    /// Members receive `"[<topic>]: <message>"`. Returns the number of
    /// members the message was handed to; delivery itself is not confirmed.
    pub fn publish(
        &self,
        publisher: PublisherId,
        name: &str,
        message: &str,
    ) -> Result<usize, RegistryError> {
        let (payload, recipients) = {
            let state = self.state();
            let topic = state.topic(name)?;
            if !topic.is_owned_by(publisher) {
                return Err(RegistryError::NotOwner {
                    publisher,
                    topic: topic.name.clone(),
                });
            }

            let recipients: Vec<Arc<dyn SubscriberHandle>> = topic
                .members
                .iter()
                .filter_map(|id| state.subscribers.get(id))
                .map(|entry| Arc::clone(&entry.handle))
                .collect();
            (topic.format_delivery(message), recipients)
        };

        for handle in &recipients {
            handle.send(&payload);
        }
        debug!(
            "Publisher {publisher} published to '{name}' ({} recipients)",
            recipients.len()
        );
        Ok(recipients.len())
    }

    pub fn list_topic_names(&self) -> Vec<String> {
        self.state()
            .topics
            .values()
            .map(|topic| topic.name.clone())
            .collect()
    }

    /// Names of the topics `publisher` owns; empty if it owns none or is unknown.
    pub fn list_topics_for_publisher(&self, publisher: PublisherId) -> Vec<String> {
        self.state()
            .topics
            .values()
            .filter(|topic| topic.is_owned_by(publisher))
            .map(|topic| topic.name.clone())
            .collect()
    }

    pub fn list_topics_for_subscriber(
        &self,
        subscriber: SubscriberId,
    ) -> Result<Vec<String>, RegistryError> {
        let state = self.state();
        state.ensure_subscriber(subscriber)?;
        Ok(state
            .topics
            .values()
            .filter(|topic| topic.has_member(subscriber))
            .map(|topic| topic.name.clone())
            .collect())
    }

    /// Disconnect a subscriber: it is told to close, then dropped from the
    /// table and from every topic it had joined.
    pub fn remove_subscriber(&self, subscriber: SubscriberId) -> Result<(), RegistryError> {
        let entry = self
            .state()
            .remove_subscriber(subscriber)
            .ok_or(RegistryError::UnknownSubscriber(subscriber))?;

        entry.handle.close();
        info!(
            "Removed subscriber {subscriber} after {}s",
            (Utc::now() - entry.joined_at).num_seconds()
        );
        Ok(())
    }

    /// Retire every subscriber whose liveness probe reports it disconnected.
    ///
    /// Probing and removal happen in one critical section, so a subscriber
    /// registered concurrently is either probed and kept, or not seen at all.
    pub fn purge_dead(&self) -> usize {
        let retired: Vec<(SubscriberId, SubscriberEntry)> = {
            let mut state = self.state();
            let dead: Vec<SubscriberId> = state
                .subscribers
                .iter()
                .filter(|(_, entry)| !entry.handle.is_alive())
                .map(|(id, _)| *id)
                .collect();

            dead.into_iter()
                .filter_map(|id| state.remove_subscriber(id).map(|entry| (id, entry)))
                .collect()
        };

        let now = Utc::now();
        for (id, entry) in &retired {
            info!(
                "Purged dead subscriber {id} after {}s",
                (now - entry.joined_at).num_seconds()
            );
        }
        retired.len()
    }

    // Introspection used by tests, outside the broker's operation set.

    #[doc(hidden)]
    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    #[doc(hidden)]
    pub fn topic_count(&self) -> usize {
        self.state().topics.len()
    }

    /// Members of `name`, if it exists.
    #[doc(hidden)]
    pub fn members_of(&self, name: &str) -> Option<Vec<SubscriberId>> {
        let state = self.state();
        let topic = state.topic(name).ok()?;
        let mut members: Vec<SubscriberId> = topic.members.iter().copied().collect();
        members.sort_unstable();
        Some(members)
    }

    #[doc(hidden)]
    pub fn is_subscriber_registered(&self, subscriber: SubscriberId) -> bool {
        self.state().subscribers.contains_key(&subscriber)
    }
}
