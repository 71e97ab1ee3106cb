use std::time::Duration;

use anyhow::Result;
use priam_cassandra::{
    config::NodeConfig,
    harness::Harness,
    message::{Kind, Mailbox, Message},
    node::Lifecycle,
    runtime::spawn_node,
    topology::RegionTopology,
};
use tokio::time::timeout;

#[tokio::test]
async fn goodbye_is_acknowledged_once_and_ends_processing() -> Result<()> {
    let (creator, mut creator_inbox) = Mailbox::channel(8);
    let node = spawn_node(NodeConfig::default());
    node.send(Message::new(Kind::Hello, Some(creator), "A.region1.z1"));
    node.send(Message::new(Kind::Put, None, "k before"));
    node.send(Message::new(Kind::Goodbye, None, ""));
    node.send(Message::new(Kind::Put, None, "k after"));
    node.send(Message::new(Kind::Goodbye, None, ""));

    let report = node.join().await?;
    assert_eq!(report.lifecycle, Lifecycle::Terminated);
    assert_eq!(report.store.get("k").map(String::as_str), Some("before"));

    let goodbye = creator_inbox.recv().await.expect("one goodbye");
    assert_eq!(goodbye.kind, Kind::Goodbye);
    assert_eq!(goodbye.body, "A.region1.z1");
    assert!(creator_inbox.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn a_second_hello_does_not_rename_or_redirect_goodbye() -> Result<()> {
    let (creator, mut creator_inbox) = Mailbox::channel(8);
    let (impostor, mut impostor_inbox) = Mailbox::channel(8);
    let node = spawn_node(NodeConfig::default());
    node.send(Message::new(Kind::Hello, Some(creator), "A.region1.z1"));
    node.send(Message::new(Kind::Hello, Some(impostor), "Z.region9.z9"));
    node.send(Message::new(Kind::Goodbye, None, ""));

    let report = node.join().await?;
    assert_eq!(report.name, "A.region1.z1");
    let goodbye = creator_inbox.recv().await.expect("goodbye to the first creator");
    assert_eq!(goodbye.body, "A.region1.z1");
    assert!(impostor_inbox.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn unnamed_node_still_shuts_down_quietly() -> Result<()> {
    let node = spawn_node(NodeConfig::default());
    node.send(Message::new(Kind::Chat, None, "not-a-duration"));
    node.send(Message::new(Kind::Replicate, None, "k v"));
    node.send(Message::new(Kind::Goodbye, None, ""));

    let report = timeout(Duration::from_secs(2), node.join()).await??;
    assert_eq!(report.lifecycle, Lifecycle::Terminated);
    assert_eq!(report.name, "");
    assert_eq!(report.store.get("k").map(String::as_str), Some("v"));
    Ok(())
}

#[tokio::test]
async fn harness_collects_every_goodbye() -> Result<()> {
    let topology = RegionTopology::demo()?;
    let mut harness = Harness::new(NodeConfig::default());
    harness.spawn_topology(&topology);
    harness.full_mesh()?;
    harness.chat("10ms");

    let report = harness.shutdown(Duration::from_secs(2)).await?;
    let mut goodbyes = report.goodbyes.clone();
    goodbyes.sort();
    let mut expected: Vec<String> = topology.names().iter().map(|n| n.to_string()).collect();
    expected.sort();
    assert_eq!(goodbyes, expected);
    assert!(report.nodes.iter().all(|n| n.lifecycle == Lifecycle::Terminated));
    assert!(report.nodes.iter().all(|n| n.peers == topology.len() - 1));
    Ok(())
}
