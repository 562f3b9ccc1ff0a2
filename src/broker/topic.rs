//! Topic management
//!
//! A `Topic` is a named channel owned by exactly one publisher, holding the
//! set of subscriber ids currently receiving its messages. Membership is a
//! `HashSet`, so a subscriber is a member at most once.
//!
//! Concurrency note: `Topic` has no locking of its own; it is only touched
//! while the registry lock is held.

use std::collections::HashSet;

use crate::broker::registry::{PublisherId, SubscriberId};

#[derive(Debug)]
pub struct Topic {
    pub name: String,
    owner: PublisherId,
    pub members: HashSet<SubscriberId>,
}

impl Topic {
    /// Create a new topic with the given name, owned by `owner`.
    pub fn new(name: &str, owner: PublisherId) -> Self {
        Self {
            name: name.to_string(),
            owner,
            members: HashSet::new(),
        }
    }

    pub fn owner(&self) -> PublisherId {
        self.owner
    }

    pub fn is_owned_by(&self, publisher: PublisherId) -> bool {
        self.owner == publisher
    }

    /// Add a subscriber. Returns `false` if it was already a member.
    pub fn subscribe(&mut self, id: SubscriberId) -> bool {
        self.members.insert(id)
    }

    /// Remove a subscriber. Returns `false` if it was not a member.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.members.remove(&id)
    }

    pub fn has_member(&self, id: SubscriberId) -> bool {
        self.members.contains(&id)
    }

    /// The payload delivered to members for `message`.
    pub fn format_delivery(&self, message: &str) -> String {
        format!("[{}]: {}", self.name, message)
    }
}

/// Key under which a topic is indexed; names are unique ignoring case.
pub fn topic_key(name: &str) -> String {
    name.to_lowercase()
}
