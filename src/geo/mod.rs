//! Geo module - US state topology, region names and map projection

pub mod fetch;
pub mod fips;
mod projection;
mod topology;

use std::path::PathBuf;
use thiserror::Error;

pub use fetch::load_topology;
pub use projection::{AlbersUsa, ScreenPoint, Viewport};
pub use topology::{GeoFeature, Point, Topology};

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Failed to download topology from {url}: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },
    #[error("Topology cache {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed topology: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Topology has no object named '{0}'")]
    MissingObject(String),
    #[error("Topology references missing arc {0}")]
    InvalidArc(i64),
}

#[cfg(test)]
pub(crate) use topology::tests::TWO_SQUARES as TOPOLOGY_FIXTURE_JSON;

/// Features of the two-square test topology: id 6 (unnamed) and id 32 ("Silver").
#[cfg(test)]
pub(crate) fn topology_fixture() -> Vec<GeoFeature> {
    Topology::from_json(topology::tests::TWO_SQUARES)
        .and_then(|t| t.features("states"))
        .expect("fixture topology decodes")
}
