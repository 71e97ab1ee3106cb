//! A small driver that plays the simulation's part: it names nodes, points
//! them at a metrics sink, introduces them to each other, issues reads and
//! writes, and finally says Goodbye and waits for every acknowledgment.

use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use futures::future::join_all;
use serde::Serialize;
use tokio::{task::JoinHandle, time::timeout};
use tracing::{debug, info, warn};

use crate::{
    config::NodeConfig,
    identity::NodeName,
    message::{Inbox, Kind, Mailbox, Message},
    node::NodeReport,
    runtime::{NodeHandle, spawn_node},
    topology::RegionTopology,
};

/// How long a single read waits for its response.
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// What the metrics sink saw over its lifetime.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SinkReport {
    /// Bodies of the Hello acknowledgments, `"<name> <role>"`.
    pub announced: Vec<String>,
    /// `(node, peer)` pairs announced as the nodes learned about each other.
    pub edges: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
pub struct ShutdownReport {
    /// Names carried by the Goodbye acknowledgments, in arrival order.
    pub goodbyes: Vec<String>,
    pub nodes: Vec<NodeReport>,
    pub sink: Option<SinkReport>,
}

struct Sink {
    mailbox: Mailbox,
    task: JoinHandle<SinkReport>,
}

pub struct Harness {
    config: NodeConfig,
    creator: Mailbox,
    creator_inbox: Inbox,
    sink: Option<Sink>,
    nodes: Vec<(NodeName, NodeHandle)>,
}

impl Harness {
    pub fn new(config: NodeConfig) -> Self {
        let (creator, creator_inbox) = Mailbox::channel(config.mailbox_capacity);
        Self {
            config,
            creator,
            creator_inbox,
            sink: None,
            nodes: Vec::new(),
        }
    }

    /// Starts a metrics sink; nodes spawned afterwards are informed of it.
    pub fn with_sink(mut self) -> Self {
        let (mailbox, inbox) = Mailbox::channel(self.config.mailbox_capacity);
        let task = tokio::spawn(run_sink(inbox));
        self.sink = Some(Sink { mailbox, task });
        self
    }

    /// Spawns and names one node per name in `topology`.
    pub fn spawn_topology(&mut self, topology: &RegionTopology) {
        for name in topology.names() {
            self.spawn_named(name);
        }
    }

    /// Spawns a node, sends it its name and, if a sink is running, informs it.
    /// Returns the node's index.
    pub fn spawn_named(&mut self, name: impl Into<NodeName>) -> usize {
        let name = name.into();
        let handle = spawn_node(self.config.clone());
        handle.send(Message::new(
            Kind::Hello,
            Some(self.creator.clone()),
            name.as_str(),
        ));
        if let Some(sink) = &self.sink {
            handle.send(Message::new(Kind::Inform, Some(sink.mailbox.clone()), ""));
        }
        debug!(node = %name, "spawned node");
        self.nodes.push((name, handle));
        self.nodes.len() - 1
    }

    /// Tells node `from` about node `to`.
    pub fn introduce(&self, from: usize, to: usize) -> Result<()> {
        let (_, from_handle) = self.entry(from)?;
        let (to_name, to_handle) = self.entry(to)?;
        from_handle.send(Message::new(
            Kind::NameDrop,
            Some(to_handle.mailbox().clone()),
            to_name.as_str(),
        ));
        Ok(())
    }

    /// Introduces every node to every other node.
    pub fn full_mesh(&self) -> Result<()> {
        for from in 0..self.nodes.len() {
            for to in 0..self.nodes.len() {
                if from != to {
                    self.introduce(from, to)?;
                }
            }
        }
        Ok(())
    }

    /// Sends the same chat rate to every node.
    pub fn chat(&self, rate: &str) {
        for (_, handle) in &self.nodes {
            handle.send(Message::new(Kind::Chat, None, rate));
        }
    }

    /// Writes `key = value` through node `index`. The harness's creator
    /// mailbox is left out as requestor so nothing flows back to it.
    pub fn put(&self, index: usize, key: &str, value: &str) -> Result<()> {
        let (name, handle) = self.entry(index)?;
        ensure!(
            handle.send(Message::new(Kind::Put, None, format!("{key} {value}"))),
            "node {name} did not accept the write"
        );
        Ok(())
    }

    /// Reads `key` from node `index`, waiting up to [`READ_TIMEOUT`].
    pub async fn get(&self, index: usize, key: &str) -> Result<String> {
        let (name, handle) = self.entry(index)?;
        let (reply_to, mut inbox) = Mailbox::channel(1);
        ensure!(
            handle.send(Message::new(Kind::GetRequest, Some(reply_to), key)),
            "node {name} did not accept the read"
        );
        let response = timeout(READ_TIMEOUT, inbox.recv())
            .await
            .with_context(|| format!("timed out reading {key:?} from {name}"))?
            .with_context(|| format!("{name} dropped the read for {key:?}"))?;
        ensure!(
            response.kind == Kind::GetResponse,
            "unexpected {} from {name}",
            response.kind
        );
        Ok(response.body)
    }

    /// Reads `key` from every node, in index order.
    pub async fn get_all(&self, key: &str) -> Result<Vec<String>> {
        let reads = (0..self.nodes.len()).map(|index| self.get(index, key));
        join_all(reads).await.into_iter().collect()
    }

    pub fn node(&self, index: usize) -> Option<&NodeHandle> {
        self.nodes.get(index).map(|(_, handle)| handle)
    }

    pub fn names(&self) -> impl Iterator<Item = &NodeName> {
        self.nodes.iter().map(|(name, _)| name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Says Goodbye to every node, waits for each acknowledgment and task, then
    /// stops the sink.
    pub async fn shutdown(self, deadline: Duration) -> Result<ShutdownReport> {
        let Harness {
            creator,
            mut creator_inbox,
            sink,
            nodes,
            ..
        } = self;
        drop(creator);

        for (_, handle) in &nodes {
            handle.send(Message::new(Kind::Goodbye, None, ""));
        }

        let expected = nodes.len();
        let goodbyes = timeout(deadline, collect_goodbyes(&mut creator_inbox, expected))
            .await
            .context("timed out waiting for goodbye acknowledgments")??;

        let mut reports = Vec::with_capacity(expected);
        for (name, handle) in nodes {
            let report = timeout(deadline, handle.join())
                .await
                .with_context(|| format!("timed out joining {name}"))??;
            reports.push(report);
        }

        let sink = match sink {
            Some(Sink { mailbox, task }) => {
                drop(mailbox);
                let report = timeout(deadline, task)
                    .await
                    .context("timed out stopping the metrics sink")?
                    .context("metrics sink task failed")?;
                Some(report)
            }
            None => None,
        };

        info!(nodes = reports.len(), "harness shut down");
        Ok(ShutdownReport {
            goodbyes,
            nodes: reports,
            sink,
        })
    }

    fn entry(&self, index: usize) -> Result<(&NodeName, &NodeHandle)> {
        match self.nodes.get(index) {
            Some((name, handle)) => Ok((name, handle)),
            None => bail!("no node at index {index} (have {})", self.nodes.len()),
        }
    }
}

async fn collect_goodbyes(inbox: &mut Inbox, expected: usize) -> Result<Vec<String>> {
    let mut goodbyes = Vec::with_capacity(expected);
    while goodbyes.len() < expected {
        let Some(message) = inbox.recv().await else {
            bail!(
                "creator mailbox closed after {} of {expected} goodbyes",
                goodbyes.len()
            );
        };
        match message.kind {
            Kind::Goodbye => goodbyes.push(message.body),
            other => warn!(kind = %other, "unexpected message at creator mailbox"),
        }
    }
    Ok(goodbyes)
}

async fn run_sink(mut inbox: Inbox) -> SinkReport {
    let mut report = SinkReport::default();
    while let Some(message) = inbox.recv().await {
        match message.kind {
            Kind::Hello => {
                info!(announce = %message.body, "node announced");
                report.announced.push(message.body);
            }
            Kind::Inform => match message.body.split_once(' ') {
                Some((node, peer)) => {
                    debug!(%node, %peer, "new edge");
                    report.edges.push((node.to_string(), peer.to_string()));
                }
                None => warn!(body = %message.body, "malformed edge notice"),
            },
            other => debug!(kind = %other, "metrics sink ignoring message"),
        }
    }
    report
}
