use std::{fmt, time::Instant};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::identity::NodeName;

/// The verb a message carries. Every node, harness and sink speaks the same
/// small vocabulary; the body is interpreted per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Hello,
    Inform,
    NameDrop,
    Chat,
    GetRequest,
    GetResponse,
    Put,
    Replicate,
    Goodbye,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Hello => "hello",
            Kind::Inform => "inform",
            Kind::NameDrop => "name_drop",
            Kind::Chat => "chat",
            Kind::GetRequest => "get_request",
            Kind::GetResponse => "get_response",
            Kind::Put => "put",
            Kind::Replicate => "replicate",
            Kind::Goodbye => "goodbye",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub kind: Kind,
    /// Where answers (or, for NameDrop, the named peer) can be reached.
    pub reply_to: Option<Mailbox>,
    pub sent_at: Instant,
    pub body: String,
    /// Name of the sending node, set on node-originated traffic so receivers do
    /// not have to reverse-map `reply_to` through their directory.
    pub from: Option<String>,
}

impl Message {
    pub fn new(kind: Kind, reply_to: Option<Mailbox>, body: impl Into<String>) -> Self {
        Self {
            kind,
            reply_to,
            sent_at: Instant::now(),
            body: body.into(),
            from: None,
        }
    }

    pub fn from_node(mut self, name: &NodeName) -> Self {
        self.from = Some(name.as_str().to_string());
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind, self.body)
    }
}

/// Receiving half of a node's mailbox.
pub type Inbox = mpsc::Receiver<Message>;

/// Sending half of a mailbox. Cloning is cheap; two clones compare equal when
/// they feed the same inbox.
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::Sender<Message>,
}

impl Mailbox {
    /// Creates a bounded mailbox holding at most `capacity` undelivered messages.
    pub fn channel(capacity: usize) -> (Mailbox, Inbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Mailbox { tx }, rx)
    }

    /// Best-effort delivery. A full or closed mailbox drops the message; the
    /// return value only reports whether it was queued.
    pub fn send(&self, message: Message) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                debug!(kind = %message.kind, "mailbox full, dropping message");
                false
            }
            Err(TrySendError::Closed(message)) => {
                debug!(kind = %message.kind, "mailbox closed, dropping message");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl PartialEq for Mailbox {
    fn eq(&self, other: &Self) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

impl Eq for Mailbox {}
