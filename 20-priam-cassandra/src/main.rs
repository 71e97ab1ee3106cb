use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use priam_cassandra::{
    cli::Cli,
    harness::{Harness, ShutdownReport},
};

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// How one write looks across the ring after the settle period.
#[derive(Debug, Serialize)]
struct KeyReport {
    key: String,
    expected: String,
    written_at: String,
    agreeing: usize,
    replicas: usize,
}

#[derive(Debug, Serialize)]
struct RunReport {
    keys: Vec<KeyReport>,
    shutdown: ShutdownReport,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let topology = cli.topology()?;

    let mut harness = Harness::new(cli.node_config()).with_sink();
    harness.spawn_topology(&topology);
    harness.full_mesh()?;
    harness.chat(&cli.chat);
    info!(nodes = harness.len(), regions = topology.regions().len(), "ring wired");

    let writes = issue_writes(&harness, cli.writes)?;

    tokio::time::sleep(cli.settle).await;

    let names: Vec<String> = harness.names().map(|name| name.to_string()).collect();
    let mut keys = Vec::with_capacity(writes.len());
    for (key, expected, index) in writes {
        let values = harness
            .get_all(&key)
            .await
            .with_context(|| format!("reading {key} back from the ring"))?;
        keys.push(KeyReport {
            agreeing: values.iter().filter(|value| **value == expected).count(),
            replicas: values.len(),
            written_at: names[index].clone(),
            key,
            expected,
        });
    }

    let shutdown = harness.shutdown(SHUTDOWN_DEADLINE).await?;
    let report = RunReport { keys, shutdown };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
    }

    Ok(())
}

/// Writes `key{i} = value{i}` through randomly chosen nodes.
fn issue_writes(harness: &Harness, count: usize) -> Result<Vec<(String, String, usize)>> {
    let mut rng = rand::thread_rng();
    let mut writes = Vec::with_capacity(count);
    for i in 0..count {
        let index = rng.gen_range(0..harness.len());
        let key = format!("key{i}");
        let value = format!("value{i}");
        harness.put(index, &key, &value)?;
        writes.push((key, value, index));
    }
    Ok(writes)
}

fn print_text(report: &RunReport) {
    for key in &report.keys {
        println!(
            "{} = {} (written at {}): {}/{} replicas agree",
            key.key, key.expected, key.written_at, key.agreeing, key.replicas
        );
    }
    let edges = report
        .shutdown
        .sink
        .as_ref()
        .map(|sink| sink.edges.len())
        .unwrap_or_default();
    println!(
        "{} nodes said goodbye, {} edges announced",
        report.shutdown.goodbyes.len(),
        edges
    );
}
