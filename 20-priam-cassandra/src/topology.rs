use anyhow::{Result, ensure};

use crate::{identity::NodeName, node::ROLE};

/// Regions used when a topology is built from a region count.
pub const DEFAULT_REGIONS: &[&str] = &["us-east-1", "us-west-2", "eu-west-1", "ap-southeast-2"];

/// Shape of a multi-region deployment: which regions exist, how many zones
/// each one has, and how many nodes run in every zone.
#[derive(Debug, Clone)]
pub struct RegionTopology {
    org: String,
    regions: Vec<String>,
    zones_per_region: usize,
    nodes_per_zone: usize,
}

impl RegionTopology {
    pub fn new(
        org: impl Into<String>,
        regions: Vec<String>,
        zones_per_region: usize,
        nodes_per_zone: usize,
    ) -> Result<Self> {
        let org = org.into();
        ensure!(
            !org.is_empty() && !org.contains('.'),
            "org name must be non-empty and contain no '.'"
        );
        ensure!(!regions.is_empty(), "topology requires at least one region");
        ensure!(
            regions.iter().all(|r| !r.is_empty() && !r.contains('.')),
            "region names must be non-empty and contain no '.'"
        );
        ensure!(
            (1..=26).contains(&zones_per_region),
            "zones per region must be between 1 and 26"
        );
        ensure!(nodes_per_zone >= 1, "each zone needs at least one node");
        Ok(Self {
            org,
            regions,
            zones_per_region,
            nodes_per_zone,
        })
    }

    /// Picks the first `count` entries of [`DEFAULT_REGIONS`].
    pub fn with_default_regions(
        org: impl Into<String>,
        count: usize,
        zones_per_region: usize,
        nodes_per_zone: usize,
    ) -> Result<Self> {
        ensure!(
            count <= DEFAULT_REGIONS.len(),
            "at most {} default regions are available",
            DEFAULT_REGIONS.len()
        );
        let regions = DEFAULT_REGIONS[..count]
            .iter()
            .map(|r| r.to_string())
            .collect();
        Self::new(org, regions, zones_per_region, nodes_per_zone)
    }

    /// Three regions, three zones each, one node per zone.
    pub fn demo() -> Result<Self> {
        Self::with_default_regions("netflixoss", 3, 3, 1)
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len() * self.zones_per_region * self.nodes_per_zone
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Node names in region, zone, node order. Instance numbers are unique
    /// across the whole topology.
    pub fn names(&self) -> Vec<NodeName> {
        let mut names = Vec::with_capacity(self.len());
        for region in &self.regions {
            for zone in 0..self.zones_per_region {
                let zone = format!("zone{}", char::from(b'A' + zone as u8));
                for _ in 0..self.nodes_per_zone {
                    let instance = format!("{ROLE}{}", names.len());
                    names.push(NodeName::compose(&self.org, region, &zone, &instance));
                }
            }
        }
        names
    }
}
