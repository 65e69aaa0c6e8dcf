//! Deployment topologies.
//!
//! A topology is the scope under which provisioned capacity is allocated. Each
//! one has its own minimum and increment per model, and its own SKU name on the
//! management API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    Regional,
    Global,
    DataZone,
}

impl Topology {
    /// All topologies in display order.
    pub const ALL: [Topology; 3] = [Topology::Regional, Topology::Global, Topology::DataZone];

    /// Used when a command does not name a topology.
    pub const DEFAULT: Topology = Topology::Regional;

    /// Parse a topology name. Case-insensitive; `data-zone`, `datazone` and
    /// `data_zone` are all accepted.
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regional" => Ok(Self::Regional),
            "global" => Ok(Self::Global),
            "data-zone" | "datazone" | "data_zone" => Ok(Self::DataZone),
            other => Err(CoreError::invalid_argument(format!(
                "unknown deployment type: {other} (expected regional, global or data-zone)"
            ))),
        }
    }

    /// Canonical kebab-case name, as used on the command line and in catalogs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regional => "regional",
            Self::Global => "global",
            Self::DataZone => "data-zone",
        }
    }

    /// Human label used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Regional => "Regional",
            Self::Global => "Global",
            Self::DataZone => "Data Zone",
        }
    }

    /// SKU name the management API expects for this topology.
    pub fn sku_name(&self) -> &'static str {
        match self {
            Self::Regional => "ProvisionedManaged",
            Self::Global => "GlobalProvisionedManaged",
            Self::DataZone => "DataZoneProvisionedManaged",
        }
    }

    /// Reverse of [`Topology::sku_name`]. Returns `None` for non-provisioned SKUs.
    pub fn from_sku_name(sku: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.sku_name().eq_ignore_ascii_case(sku))
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Topology {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Topology::parse("Regional").unwrap(), Topology::Regional);
        assert_eq!(Topology::parse("GLOBAL").unwrap(), Topology::Global);
        assert_eq!(Topology::parse("Data-Zone").unwrap(), Topology::DataZone);
        assert_eq!(Topology::parse("datazone").unwrap(), Topology::DataZone);
        assert_eq!(Topology::parse(" data_zone ").unwrap(), Topology::DataZone);
    }

    #[test]
    fn parse_unknown() {
        let e = Topology::parse("standard").unwrap_err();
        assert!(e.to_string().contains("unknown deployment type: standard"));
        assert!(e.is_user_input());
    }

    #[test]
    fn sku_names_round_trip() {
        for t in Topology::ALL {
            assert_eq!(Topology::from_sku_name(t.sku_name()), Some(t));
        }
        assert_eq!(
            Topology::from_sku_name("globalprovisionedmanaged"),
            Some(Topology::Global)
        );
        assert_eq!(Topology::from_sku_name("Standard"), None);
    }

    #[test]
    fn default_is_regional() {
        assert_eq!(Topology::default(), Topology::Regional);
    }

    #[test]
    fn serde_uses_kebab_case() {
        let s = serde_json::to_string(&Topology::DataZone).unwrap();
        assert_eq!(s, "\"data-zone\"");
    }
}
