//! Bounded peer directory.
//!
//! A node only remembers a limited number of peers (its "familiarity limit").
//! Growth is advisory: once full, further introductions are ignored rather than
//! evicting anyone.

use std::collections::HashMap;

use crate::{identity::NodeName, message::Mailbox};

/// Default familiarity limit.
pub const DEFAULT_CAPACITY: usize = 30;

#[derive(Debug, Clone)]
pub struct Peer {
    pub name: NodeName,
    pub mailbox: Mailbox,
}

/// Outcome of introducing a peer to the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Added,
    /// The name was already known; its mailbox has been replaced.
    Replaced,
    Full,
    SelfReference,
}

impl Admission {
    pub fn accepted(self) -> bool {
        matches!(self, Admission::Added | Admission::Replaced)
    }
}

#[derive(Debug)]
pub struct PeerDirectory {
    capacity: usize,
    peers: HashMap<String, Peer>,
}

impl PeerDirectory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            peers: HashMap::with_capacity(capacity),
        }
    }

    /// Adds `name` unless the directory is already full or the name is the
    /// node's own. A full directory rejects even names it already holds.
    pub fn admit(&mut self, own_name: &str, name: &str, mailbox: Mailbox) -> Admission {
        if name == own_name {
            return Admission::SelfReference;
        }
        if self.peers.len() >= self.capacity {
            return Admission::Full;
        }
        let peer = Peer {
            name: NodeName::parse(name),
            mailbox,
        };
        match self.peers.insert(name.to_string(), peer) {
            Some(_) => Admission::Replaced,
            None => Admission::Added,
        }
    }

    /// Reverse lookup: which peer does this mailbox belong to? Linear in the
    /// number of peers.
    pub fn name_of(&self, mailbox: &Mailbox) -> Option<&NodeName> {
        self.peers
            .values()
            .find(|peer| &peer.mailbox == mailbox)
            .map(|peer| &peer.name)
    }

    pub fn get(&self, name: &str) -> Option<&Peer> {
        self.peers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.peers.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    /// Peers whose region segment equals `region`.
    pub fn in_region<'a, 'r>(&'a self, region: &'r str) -> impl Iterator<Item = &'a Peer> {
        self.peers
            .values()
            .filter(move |peer| peer.name.region() == Some(region))
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PeerDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
