//! Charts module - Choropleth encoding and rendering

pub mod choropleth;
mod html;
mod svg;

use crate::config::{ChartOutput, OutputFormat};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

pub use choropleth::{ChoroplethBuilder, ChoroplethMap, ColorScale};
use html::write_html;
use svg::write_svg;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to draw chart: {0}")]
    Draw(String),
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Write the map in the format implied by the output path.
pub fn write_chart(map: &ChoroplethMap, output: &ChartOutput) -> Result<(), RenderError> {
    match output.format() {
        OutputFormat::Html => write_html(map, &output.path)?,
        OutputFormat::Svg => write_svg(map, &output.path)?,
    }
    info!(path = %output.path.display(), format = ?output.format(), "wrote chart");
    Ok(())
}

/// Legend label: thousands get no decimals, smaller values two.
pub(crate) fn format_value(value: f64) -> String {
    if value.abs() >= 1000.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::topology_fixture;
    use tempfile::tempdir;

    #[test]
    fn test_write_chart_picks_format_from_extension() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let map = ChoroplethBuilder::new().build(&[], &topology_fixture(), &ChartOutput::default());

        for (name, marker) in [("map.html", "<!DOCTYPE html>"), ("map.svg", "<svg")] {
            let output = ChartOutput {
                path: dir.path().join(name),
                ..ChartOutput::default()
            };
            write_chart(&map, &output)?;
            let written = std::fs::read_to_string(&output.path)?;
            assert!(written.contains(marker), "{name} should contain {marker}");
        }
        Ok(())
    }

    #[test]
    fn test_unwritable_path_is_io_error() {
        let map = ChoroplethBuilder::new().build(&[], &topology_fixture(), &ChartOutput::default());
        let output = ChartOutput {
            path: PathBuf::from("/nonexistent/dir/map.html"),
            ..ChartOutput::default()
        };
        assert!(matches!(write_chart(&map, &output), Err(RenderError::Io { .. })));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(123.456), "123.46");
        assert_eq!(format_value(12345.6), "12346");
    }
}
