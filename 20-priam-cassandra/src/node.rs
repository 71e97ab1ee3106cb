//! The replica state machine.
//!
//! A [`Node`] owns everything one replica knows: its name, who created it,
//! its peers, its key-value store and its chat rate. It reacts to exactly one
//! [`Message`] at a time via [`Node::handle`] and never waits on anyone: every
//! outbound message is a fire-and-forget [`Mailbox::send`].
//!
//! Handling is synchronous and free of I/O so the whole protocol can be driven
//! directly in tests. The async event loop that feeds the node lives in
//! [`crate::runtime`].

use std::{collections::BTreeMap, time::Duration};

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::{
    chat,
    config::NodeConfig,
    directory::{Admission, PeerDirectory},
    identity::NodeName,
    message::{Kind, Mailbox, Message},
    metrics::{LatencyHistogram, LatencySummary},
    replication,
    store::KvStore,
};

/// Role announced to the metrics sink.
pub const ROLE: &str = "priamCassandra";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Unregistered,
    Registered,
    Terminated,
}

/// What the event loop should do after a message has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// Replace the chat ticker with one firing at this rate.
    Reschedule(Duration),
    Stop,
}

/// Final state handed back when a node task ends.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub name: String,
    pub lifecycle: Lifecycle,
    pub peers: usize,
    pub store: BTreeMap<String, String>,
    pub latency: LatencySummary,
}

pub struct Node {
    config: NodeConfig,
    /// This node's own mailbox, handed out as the reply address.
    mailbox: Mailbox,
    name: Option<NodeName>,
    creator: Option<Mailbox>,
    sink: Option<Mailbox>,
    requestor: Option<Mailbox>,
    directory: PeerDirectory,
    store: KvStore,
    chat_rate: Option<Duration>,
    latency: LatencyHistogram,
    lifecycle: Lifecycle,
}

impl Node {
    pub fn new(config: NodeConfig, mailbox: Mailbox) -> Self {
        let directory = PeerDirectory::new(config.familiarity);
        Self {
            config,
            mailbox,
            name: None,
            creator: None,
            sink: None,
            requestor: None,
            directory,
            store: KvStore::new(),
            chat_rate: None,
            latency: LatencyHistogram::default(),
            lifecycle: Lifecycle::Unregistered,
        }
    }

    pub fn handle(&mut self, message: Message) -> Step {
        if self.lifecycle == Lifecycle::Terminated {
            return Step::Stop;
        }

        self.latency.record(message.sent_at.elapsed());
        if self.config.msglog {
            info!(node = %self.own_name(), %message, "handling message");
        }

        match message.kind {
            Kind::Hello => self.on_hello(message),
            Kind::Inform => self.on_inform(message),
            Kind::NameDrop => self.on_name_drop(message),
            Kind::Chat => return self.on_chat(&message),
            Kind::GetRequest => self.on_get_request(message),
            Kind::GetResponse => self.on_get_response(message),
            Kind::Put => self.on_put(message),
            Kind::Replicate => self.on_replicate(message),
            Kind::Goodbye => return self.on_goodbye(),
        }
        Step::Continue
    }

    /// Periodic hook driven by the chat ticker. Nothing to do yet.
    pub fn on_tick(&mut self) {
        trace!(node = %self.own_name(), "chat tick");
    }

    fn on_hello(&mut self, message: Message) {
        // An empty name leaves the node unnamed for a later Hello.
        if self.name.is_some() || message.body.is_empty() {
            return;
        }
        let name = NodeName::parse(message.body);
        self.latency.relabel(name.as_str());
        self.creator = message.reply_to;
        self.name = Some(name);
        self.lifecycle = Lifecycle::Registered;
    }

    fn on_inform(&mut self, message: Message) {
        let Some(sink) = message.reply_to else {
            debug!(node = %self.own_name(), "inform without a sink mailbox");
            return;
        };
        let ack = self.outbound(Kind::Hello, None, format!("{} {ROLE}", self.own_name()));
        sink.send(ack);
        self.sink = Some(sink);
    }

    fn on_name_drop(&mut self, message: Message) {
        let Some(peer_mailbox) = message.reply_to else {
            debug!(node = %self.own_name(), peer = %message.body, "name drop without a mailbox");
            return;
        };
        let peer = message.body;
        let own = self.own_name().to_string();
        let admission = self.directory.admit(&own, &peer, peer_mailbox);
        if !admission.accepted() {
            if self.config.msglog {
                debug!(node = %own, %peer, ?admission, "peer not remembered");
            }
            return;
        }
        if let Some(sink) = &self.sink {
            let edge = self.outbound(
                Kind::Inform,
                Some(self.mailbox.clone()),
                format!("{own} {peer}"),
            );
            sink.send(edge);
        }
        if admission == Admission::Replaced {
            debug!(node = %own, %peer, "peer mailbox replaced");
        }
    }

    fn on_chat(&mut self, message: &Message) -> Step {
        match chat::chat_rate(&message.body) {
            Some(rate) => {
                self.chat_rate = Some(rate);
                Step::Reschedule(rate)
            }
            None => {
                debug!(node = %self.own_name(), rate = %message.body, "ignoring chat rate");
                Step::Continue
            }
        }
    }

    fn on_get_request(&mut self, message: Message) {
        let Some(reply_to) = message.reply_to else {
            return;
        };
        let value = self.store.read(&message.body).to_string();
        let response = self.outbound(Kind::GetResponse, Some(self.mailbox.clone()), value);
        reply_to.send(response);
    }

    fn on_get_response(&mut self, message: Message) {
        if let Some(requestor) = &self.requestor {
            let forward = self.outbound(Kind::GetResponse, Some(self.mailbox.clone()), message.body);
            requestor.send(forward);
        }
    }

    fn on_put(&mut self, message: Message) {
        self.requestor = message.reply_to;
        if !self.store.apply(&message.body) {
            return;
        }
        for peer in self.directory.iter() {
            let copy = self.outbound(Kind::Replicate, Some(self.mailbox.clone()), message.body.clone());
            peer.mailbox.send(copy);
        }
    }

    fn on_replicate(&mut self, message: Message) {
        self.store.apply(&message.body);

        let Some(local) = &self.name else {
            return;
        };
        let Some(sender) = replication::sender_of(&message, &self.directory) else {
            return;
        };
        for peer in replication::relay_targets(local, &sender, &self.directory) {
            let copy = self.outbound(Kind::Replicate, Some(self.mailbox.clone()), message.body.clone());
            peer.mailbox.send(copy);
        }
    }

    fn on_goodbye(&mut self) -> Step {
        let name = self.own_name().to_string();
        if self.config.msglog {
            info!(node = %name, keys = self.store.len(), "going away");
        }
        if let Some(creator) = &self.creator {
            creator.send(self.outbound(Kind::Goodbye, None, name));
        }
        self.lifecycle = Lifecycle::Terminated;
        Step::Stop
    }

    fn outbound(&self, kind: Kind, reply_to: Option<Mailbox>, body: impl Into<String>) -> Message {
        let message = Message::new(kind, reply_to, body);
        match &self.name {
            Some(name) => message.from_node(name),
            None => message,
        }
    }

    fn own_name(&self) -> &str {
        self.name.as_ref().map(NodeName::as_str).unwrap_or_default()
    }

    pub fn name(&self) -> Option<&NodeName> {
        self.name.as_ref()
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    pub fn chat_rate(&self) -> Option<Duration> {
        self.chat_rate
    }

    pub fn latency(&self) -> &LatencyHistogram {
        &self.latency
    }

    pub fn report(&self) -> NodeReport {
        NodeReport {
            name: self.own_name().to_string(),
            lifecycle: self.lifecycle,
            peers: self.directory.len(),
            store: self.store.snapshot(),
            latency: self.latency.summary(),
        }
    }
}
