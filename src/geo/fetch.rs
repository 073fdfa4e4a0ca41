//! Topology acquisition with an explicit on-disk cache.

use crate::config::TopologySource;
use crate::geo::{GeoError, Topology};
use reqwest::blocking::Client;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Read the topology from the cache, downloading it first when the cache is empty.
///
/// A failed download is fatal: there is no bundled fallback and no retry.
pub fn load_topology(source: &TopologySource) -> Result<Topology, GeoError> {
    let text = if source.cache_path.is_file() {
        info!(path = %source.cache_path.display(), "using cached topology");
        read_cache(&source.cache_path)?
    } else {
        let text = download(&source.url)?;
        if let Err(e) = write_cache(&source.cache_path, &text) {
            warn!(error = %e, "could not cache topology");
        }
        text
    };
    Topology::from_json(&text)
}

fn read_cache(path: &Path) -> Result<String, GeoError> {
    fs::read_to_string(path).map_err(|source| GeoError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_cache(path: &Path, text: &str) -> Result<(), GeoError> {
    let io_err = |source| GeoError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, text).map_err(io_err)?;
    info!(path = %path.display(), "cached topology");
    Ok(())
}

fn download(url: &str) -> Result<String, GeoError> {
    info!(url, "downloading topology");
    let network_err = |source| GeoError::Network {
        url: url.to_string(),
        source,
    };

    let client = Client::builder().build().map_err(network_err)?;
    client
        .get(url)
        .send()
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.text())
        .map_err(network_err)
}
