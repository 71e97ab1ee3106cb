//! Replication behaviour across real node tasks.

use std::time::Duration;

use anyhow::Result;
use priam_cassandra::{
    config::NodeConfig,
    harness::Harness,
    message::{Inbox, Kind, Mailbox, Message},
    runtime::spawn_node,
    topology::RegionTopology,
};
use tokio::time::timeout;

const DEADLINE: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(200);

struct Endpoint {
    mailbox: Mailbox,
    inbox: Inbox,
}

impl Endpoint {
    fn new() -> Self {
        let (mailbox, inbox) = Mailbox::channel(64);
        Self { mailbox, inbox }
    }

    async fn next(&mut self) -> Option<Message> {
        timeout(DEADLINE, self.inbox.recv()).await.ok().flatten()
    }

    async fn assert_quiet(&mut self) {
        let received = timeout(QUIET_PERIOD, self.inbox.recv()).await;
        assert!(received.is_err(), "expected no message, got {received:?}");
    }
}

#[tokio::test]
async fn put_then_get_on_the_same_node() -> Result<()> {
    let mut harness = Harness::new(NodeConfig::default());
    harness.spawn_named("A.region1.z1");

    harness.put(0, "color", "blue")?;
    assert_eq!(harness.get(0, "color").await?, "blue");
    assert_eq!(harness.get(0, "size").await?, "");

    harness.shutdown(DEADLINE).await?;
    Ok(())
}

#[tokio::test]
async fn cross_region_write_is_relayed_inside_the_receiving_region_only() -> Result<()> {
    let mut harness = Harness::new(NodeConfig::default());
    let a = harness.spawn_named("A.region1.z1");
    harness.spawn_named("B.region1.z2");
    let c = harness.spawn_named("C.region2.z1");
    harness.full_mesh()?;

    // Stand-ins for further replicas that C knows about.
    let mut region2_peer = Endpoint::new();
    let mut region1_peer = Endpoint::new();
    let c_handle = harness.node(c).expect("C was spawned");
    c_handle.send(Message::new(
        Kind::NameDrop,
        Some(region2_peer.mailbox.clone()),
        "P.region2.z9",
    ));
    c_handle.send(Message::new(
        Kind::NameDrop,
        Some(region1_peer.mailbox.clone()),
        "Q.region1.z9",
    ));

    harness.put(a, "k", "v")?;

    let relayed = region2_peer
        .next()
        .await
        .expect("C relays the cross-region write to its region");
    assert_eq!(relayed.kind, Kind::Replicate);
    assert_eq!(relayed.body, "k v");
    assert_eq!(relayed.from.as_deref(), Some("C.region2.z1"));
    region2_peer.assert_quiet().await;
    region1_peer.assert_quiet().await;

    assert_eq!(harness.get_all("k").await?, vec!["v", "v", "v"]);

    harness.shutdown(DEADLINE).await?;
    Ok(())
}

#[tokio::test]
async fn every_replica_of_a_multi_region_ring_converges() -> Result<()> {
    let topology = RegionTopology::with_default_regions("netflixoss", 3, 2, 2)?;
    let mut harness = Harness::new(NodeConfig::default()).with_sink();
    harness.spawn_topology(&topology);
    harness.full_mesh()?;

    harness.put(0, "alpha", "1")?;
    harness.put(7, "beta", "2")?;
    tokio::time::sleep(QUIET_PERIOD).await;

    for (key, value) in [("alpha", "1"), ("beta", "2")] {
        let values = harness.get_all(key).await?;
        assert_eq!(values.len(), topology.len());
        assert!(values.iter().all(|v| v == value), "{key}: {values:?}");
    }

    let report = harness.shutdown(DEADLINE).await?;
    let sink = report.sink.expect("sink was started");
    let n = topology.len();
    assert_eq!(sink.announced.len(), n);
    assert_eq!(sink.edges.len(), n * (n - 1));
    Ok(())
}

#[tokio::test]
async fn concurrent_writes_can_leave_replicas_diverged() -> Result<()> {
    let mut harness = Harness::new(NodeConfig::default());
    let x = harness.spawn_named("X.region1.z1");
    let y = harness.spawn_named("Y.region1.z2");
    harness.full_mesh()?;

    // Both puts are queued before either node runs, so each node applies its
    // own write first and the peer's replicated write last.
    harness.put(x, "k", "from-x")?;
    harness.put(y, "k", "from-y")?;
    tokio::time::sleep(QUIET_PERIOD).await;

    assert_eq!(harness.get(x, "k").await?, "from-y");
    assert_eq!(harness.get(y, "k").await?, "from-x");

    harness.shutdown(DEADLINE).await?;
    Ok(())
}

#[tokio::test]
async fn replayed_and_reordered_replicates_follow_arrival_order() -> Result<()> {
    let mut client = Endpoint::new();
    let forward = spawn_node(NodeConfig::default());
    let reverse = spawn_node(NodeConfig::default());
    for (handle, name) in [(&forward, "F.region1.z1"), (&reverse, "R.region1.z2")] {
        handle.send(Message::new(Kind::Hello, None, name));
    }

    let v1 = Message::new(Kind::Replicate, None, "k v1");
    let v2 = Message::new(Kind::Replicate, None, "k v2");
    forward.send(v1.clone());
    forward.send(v2.clone());
    forward.send(v2.clone());
    reverse.send(v2);
    reverse.send(v1);

    forward.send(Message::new(Kind::GetRequest, Some(client.mailbox.clone()), "k"));
    assert_eq!(client.next().await.map(|m| m.body).as_deref(), Some("v2"));
    reverse.send(Message::new(Kind::GetRequest, Some(client.mailbox.clone()), "k"));
    assert_eq!(client.next().await.map(|m| m.body).as_deref(), Some("v1"));

    forward.send(Message::new(Kind::Goodbye, None, ""));
    reverse.send(Message::new(Kind::Goodbye, None, ""));
    let forward = forward.join().await?;
    assert_eq!(forward.store.len(), 2);
    reverse.join().await?;
    Ok(())
}

#[tokio::test]
async fn put_fan_out_is_bounded_by_familiarity() -> Result<()> {
    let node = spawn_node(NodeConfig::default().familiarity(3));
    node.send(Message::new(Kind::Hello, None, "A.region1.z1"));

    let mut endpoints: Vec<Endpoint> = (0..5).map(|_| Endpoint::new()).collect();
    node.send(Message::new(
        Kind::NameDrop,
        Some(endpoints[0].mailbox.clone()),
        "A.region1.z1",
    ));
    for (i, endpoint) in endpoints.iter().enumerate() {
        node.send(Message::new(
            Kind::NameDrop,
            Some(endpoint.mailbox.clone()),
            format!("P{i}.region1.z1"),
        ));
    }
    node.send(Message::new(Kind::Put, None, "k v"));

    let mut reached = 0;
    for endpoint in &mut endpoints {
        if timeout(QUIET_PERIOD, endpoint.inbox.recv()).await.is_ok() {
            reached += 1;
        }
    }
    assert_eq!(reached, 3);

    node.send(Message::new(Kind::Goodbye, None, ""));
    let report = node.join().await?;
    assert_eq!(report.peers, 3);
    Ok(())
}
