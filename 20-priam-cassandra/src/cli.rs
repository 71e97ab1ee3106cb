use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use crate::{
    chat::parse_duration, config::NodeConfig, directory::DEFAULT_CAPACITY,
    topology::RegionTopology,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulate a multi-region priamCassandra ring", long_about = None)]
pub struct Cli {
    /// Organisation segment of every node name.
    #[arg(long, default_value = "netflixoss")]
    pub org: String,

    /// Number of regions (taken from a fixed list of region names).
    #[arg(long, default_value_t = 3)]
    pub regions: usize,

    /// Availability zones per region.
    #[arg(long, default_value_t = 3)]
    pub zones: usize,

    /// Nodes per zone.
    #[arg(long, default_value_t = 1)]
    pub per_zone: usize,

    /// Maximum number of peers each node remembers.
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub familiarity: usize,

    /// Background chat rate sent to every node, e.g. 500ms or 1m.
    #[arg(long, default_value = "1s")]
    pub chat: String,

    /// Number of writes issued against randomly chosen nodes.
    #[arg(long, default_value_t = 10)]
    pub writes: usize,

    /// Time allowed for replication before reads are issued.
    #[arg(long, default_value = "200ms", value_parser = parse_duration)]
    pub settle: Duration,

    /// Log every message each node handles.
    #[arg(long)]
    pub msglog: bool,

    /// Print the final report as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig::new()
            .familiarity(self.familiarity)
            .msglog(self.msglog)
    }

    pub fn topology(&self) -> Result<RegionTopology> {
        RegionTopology::with_default_regions(
            self.org.clone(),
            self.regions,
            self.zones,
            self.per_zone,
        )
    }
}
