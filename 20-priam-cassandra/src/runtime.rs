//! Event loop and task spawning for nodes.
//!
//! Each node runs as its own tokio task that exclusively owns a [`Node`].
//! The loop waits on two sources, the node's inbox and its optional chat
//! ticker, and handles whichever is ready first. Nothing else can reach the
//! node's state, so no locking is involved; peers and the harness only ever
//! hold a [`Mailbox`].

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{
    select,
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};
use tracing::info;

use crate::{
    config::NodeConfig,
    message::{Inbox, Mailbox, Message},
    node::{Node, NodeReport, Step},
};

/// Handle to a running node task.
///
/// The node's state is only reachable through messages; the handle adds the
/// node's mailbox and a way to wait for the task to finish.
pub struct NodeHandle {
    mailbox: Mailbox,
    task: JoinHandle<NodeReport>,
}

impl NodeHandle {
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Fire-and-forget send to the node.
    pub fn send(&self, message: Message) -> bool {
        self.mailbox.send(message)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the node to terminate and returns its final state.
    pub async fn join(self) -> Result<NodeReport> {
        self.task.await.context("node task panicked or was cancelled")
    }

    /// Stops the task without the Goodbye protocol.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Spawns a node on the current tokio runtime.
pub fn spawn_node(config: NodeConfig) -> NodeHandle {
    let (mailbox, inbox) = Mailbox::channel(config.mailbox_capacity);
    let node = Node::new(config, mailbox.clone());
    let task = tokio::spawn(run(node, inbox));
    NodeHandle { mailbox, task }
}

/// Drives `node` until it handles a Goodbye, which is the only way out: the
/// node keeps a sender to its own inbox, so the channel never drains shut
/// while it runs. Messages still queued after the Goodbye are discarded.
pub async fn run(mut node: Node, mut inbox: Inbox) -> NodeReport {
    let mut ticker: Option<Interval> = None;

    loop {
        select! {
            message = inbox.recv() => {
                // `recv` only yields `None` once every sender is gone, and the
                // node itself still holds one.
                let Some(message) = message else {
                    break;
                };
                match node.handle(message) {
                    Step::Continue => {}
                    Step::Reschedule(rate) => ticker = Some(chat_ticker(rate)),
                    Step::Stop => break,
                }
            }
            _ = next_tick(&mut ticker) => node.on_tick(),
        }
    }

    inbox.close();
    let report = node.report();
    info!(
        node = %report.name,
        keys = report.store.len(),
        peers = report.peers,
        messages = report.latency.count,
        p99_us = report.latency.p99_us,
        "node stopped"
    );
    report
}

/// The first tick fires one full period after the rate is set.
fn chat_ticker(rate: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + rate, rate);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Kind;

    #[tokio::test]
    async fn goodbye_ends_the_task_and_closes_the_mailbox() -> Result<()> {
        let (creator, mut creator_inbox) = Mailbox::channel(8);
        let handle = spawn_node(NodeConfig::default());
        handle.send(Message::new(Kind::Hello, Some(creator), "A.region1.z1"));
        handle.send(Message::new(Kind::Goodbye, None, ""));
        let mailbox = handle.mailbox().clone();

        let report = handle.join().await?;
        assert_eq!(report.name, "A.region1.z1");
        assert!(mailbox.is_closed());
        assert!(!mailbox.send(Message::new(Kind::Put, None, "k v")));

        let goodbye = creator_inbox.recv().await.expect("goodbye acknowledgment");
        assert_eq!(goodbye.kind, Kind::Goodbye);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_outside_senders_does_not_end_the_loop() {
        let (mailbox, inbox) = Mailbox::channel(8);
        let task = tokio::spawn(run(Node::new(NodeConfig::default(), mailbox.clone()), inbox));
        drop(mailbox);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!task.is_finished());
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn chat_ticker_keeps_the_node_responsive() -> Result<()> {
        let (client, mut client_inbox) = Mailbox::channel(8);
        let handle = spawn_node(NodeConfig::default());
        handle.send(Message::new(Kind::Hello, None, "A.region1.z1"));
        handle.send(Message::new(Kind::Chat, None, "5ms"));

        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.send(Message::new(Kind::GetRequest, Some(client), "why?"));
        let response = client_inbox.recv().await.expect("get response");
        assert_eq!(response.body, "because...");

        handle.send(Message::new(Kind::Goodbye, None, ""));
        handle.join().await?;
        Ok(())
    }

    #[tokio::test]
    async fn next_tick_without_a_ticker_never_fires() {
        let mut ticker = None;
        let fired = tokio::time::timeout(Duration::from_millis(20), next_tick(&mut ticker)).await;
        assert!(fired.is_err());
    }
}
