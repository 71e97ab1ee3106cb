//! Hierarchical node names.
//!
//! Every node in the simulation is named `org.region.zone.instance`, for
//! example `netflixoss.us-east-1.zoneA.priamCassandra3`. Replication routing
//! depends on the region segment (index 1), so the name is parsed once into a
//! structured value instead of being re-split on every message.

use std::fmt;

const SEPARATOR: char = '.';

/// A parsed `org.region.zone.instance` name.
///
/// The full string is kept verbatim: it is what travels on the wire, what the
/// peer directory is keyed by, and what equality is defined on. Names with
/// fewer than four segments are accepted; the missing segments are `None`.
/// Anything past the third separator belongs to the instance segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeName {
    full: String,
    org: String,
    region: Option<String>,
    zone: Option<String>,
    instance: Option<String>,
}

impl NodeName {
    pub fn parse(full: impl Into<String>) -> Self {
        let full = full.into();
        let mut parts = full.splitn(4, SEPARATOR).map(str::to_string);
        let org = parts.next().unwrap_or_default();
        let region = parts.next();
        let zone = parts.next();
        let instance = parts.next();
        Self {
            full,
            org,
            region,
            zone,
            instance,
        }
    }

    /// Builds a four-segment name from its parts.
    pub fn compose(org: &str, region: &str, zone: &str, instance: &str) -> Self {
        Self::parse(format!(
            "{org}{SEPARATOR}{region}{SEPARATOR}{zone}{SEPARATOR}{instance}"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    /// Returns true when both names carry a region and the regions match.
    pub fn same_region(&self, other: &NodeName) -> bool {
        matches!((self.region(), other.region()), (Some(a), Some(b)) if a == b)
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl From<&str> for NodeName {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for NodeName {
    fn from(value: String) -> Self {
        Self::parse(value)
    }
}
