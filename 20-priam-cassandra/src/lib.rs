//! One replica of a multi-region, eventually consistent key-value store.
//!
//! Every node is a tokio task that owns its state and talks to the rest of
//! the simulation only through mailboxes. The harness names a node, tells it
//! where to report, and introduces it to peers; after that clients write with
//! Put and read with GetRequest while nodes gossip writes to each other with
//! Replicate. Writes that cross a region boundary are relayed once more inside
//! the receiving region.
//!
//! - [`identity`] parses hierarchical `org.region.zone.instance` names.
//! - [`message`] defines the message vocabulary and best-effort mailboxes.
//! - [`directory`] is the bounded peer directory.
//! - [`store`] holds the last-write-wins key-value map.
//! - [`replication`] decides who receives a relayed write.
//! - [`chat`] parses chat-rate duration strings.
//! - [`metrics`] records per-message latency.
//! - [`node`] is the synchronous state machine; [`runtime`] drives it.
//! - [`topology`], [`harness`] and [`cli`] spawn and exercise whole rings.

pub mod chat;
pub mod cli;
pub mod config;
pub mod directory;
pub mod harness;
pub mod identity;
pub mod message;
pub mod metrics;
pub mod node;
pub mod replication;
pub mod runtime;
pub mod store;
pub mod topology;
