use crate::directory::DEFAULT_CAPACITY;

/// Mailbox depth used when nothing else is configured.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

/// Per-node settings fixed at spawn time. Everything else a node knows arrives
/// through its mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Maximum number of peers the node will remember.
    pub familiarity: usize,
    /// Number of undelivered messages the node's mailbox holds before new
    /// sends are dropped.
    pub mailbox_capacity: usize,
    /// Log every message the node handles.
    pub msglog: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            familiarity: DEFAULT_CAPACITY,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            msglog: false,
        }
    }
}

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn familiarity(mut self, limit: usize) -> Self {
        self.familiarity = limit;
        self
    }

    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    pub fn msglog(mut self, enabled: bool) -> Self {
        self.msglog = enabled;
        self
    }
}
