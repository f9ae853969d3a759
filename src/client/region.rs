//! Region table and base URL resolution
//!
//! Every Veracode account lives in one region, and each region has its own
//! pair of base URLs: one for the legacy XML API and one for the REST API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Deployment / data-residency zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Global,
    Eu,
    Fedramp,
}

/// Base URLs for a single region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionEntry {
    pub region: Region,
    pub xml_base_url: &'static str,
    pub rest_base_url: &'static str,
}

const REGIONS: [RegionEntry; 3] = [
    RegionEntry {
        region: Region::Global,
        xml_base_url: "https://analysiscenter.veracode.com/api",
        rest_base_url: "https://api.veracode.com/",
    },
    RegionEntry {
        region: Region::Eu,
        xml_base_url: "https://analysiscenter.veracode.com/eu",
        rest_base_url: "https://api.veracode.eu/",
    },
    RegionEntry {
        region: Region::Fedramp,
        xml_base_url: "https://analysiscenter.veracode.us/api",
        rest_base_url: "https://api.veracode.us/",
    },
];

impl Region {
    pub const ALL: [Region; 3] = [Region::Global, Region::Eu, Region::Fedramp];

    /// Table key for this region
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Global => "global",
            Region::Eu => "eu",
            Region::Fedramp => "fedramp",
        }
    }

    /// Base URLs for this region
    pub fn entry(&self) -> &'static RegionEntry {
        match self {
            Region::Global => &REGIONS[0],
            Region::Eu => &REGIONS[1],
            Region::Fedramp => &REGIONS[2],
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve(s).map(|entry| entry.region)
    }
}

/// Look up a region's base URLs by table key.
///
/// An unknown key is a programming error on the caller's side.
pub fn resolve(key: &str) -> Result<&'static RegionEntry, ConfigError> {
    let key = key.trim().to_ascii_lowercase();
    REGIONS
        .iter()
        .find(|entry| entry.region.as_str() == key)
        .ok_or(ConfigError::UnknownRegion(key))
}

/// Maps an API credential to the region it belongs to.
pub trait RegionLookup: Send + Sync {
    fn region_for(&self, api_key_id: &str) -> Region;
}

/// Derives the region from the key id prefix.
///
/// Key ids look like `vera01ei-0123abcd`; the two characters after `vera01`
/// select the region (`ei` for EU, `es` for FedRAMP). Anything else is global.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixRegionLookup;

impl RegionLookup for PrefixRegionLookup {
    fn region_for(&self, api_key_id: &str) -> Region {
        let Some((prefix, _)) = api_key_id.split_once('-') else {
            return Region::Global;
        };
        if prefix.len() != 8 || !prefix.is_ascii() {
            return Region::Global;
        }
        match &prefix[6..8] {
            "ei" => Region::Eu,
            "es" => Region::Fedramp,
            _ => Region::Global,
        }
    }
}

/// Resolved base URLs for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub region: Region,
    pub xml_base_url: String,
    pub rest_base_url: String,
}

impl Endpoints {
    pub fn for_region(region: Region) -> Self {
        let entry = region.entry();
        Self {
            region,
            xml_base_url: entry.xml_base_url.to_string(),
            rest_base_url: entry.rest_base_url.to_string(),
        }
    }

    /// Resolve the endpoints for a credential through the lookup collaborator.
    pub fn for_credential(api_key_id: &str, lookup: &dyn RegionLookup) -> Self {
        Self::for_region(lookup.region_for(api_key_id))
    }
}
