//! SNAP map pipeline: load -> join/derive -> render.

use crate::charts::{self, ChoroplethBuilder, ChoroplethMap};
use crate::config::PipelineConfig;
use crate::data::{DataLoader, DataProcessor, JoinedRecord, SnapTables, ValueColumns};
use crate::geo::{self, Topology};
use anyhow::{Context, Result};
use tracing::info;

pub struct SnapPipeline {
    config: PipelineConfig,
}

impl SnapPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn load(&self) -> Result<SnapTables> {
        DataLoader::load_all(&self.config).context("loading SNAP tables")
    }

    pub fn join(&self, tables: &SnapTables) -> Result<Vec<JoinedRecord>> {
        DataProcessor::process(tables, &ValueColumns::from_config(&self.config))
            .context("joining SNAP tables")
    }

    pub fn render(
        &self,
        records: &[JoinedRecord],
        topology: &Topology,
    ) -> Result<ChoroplethMap> {
        let features = topology
            .features(&self.config.topology.object)
            .context("decoding state shapes")?;
        Ok(ChoroplethBuilder::new().build(records, &features, &self.config.output))
    }

    /// Run every stage and write the chart. Nothing is written if any stage fails.
    pub fn run(&self) -> Result<ChoroplethMap> {
        let tables = self.load()?;
        let records = self.join(&tables)?;
        info!(states = records.len(), "derived SNAP ratios");

        let topology =
            geo::load_topology(&self.config.topology).context("loading US states topology")?;
        let map = self.render(&records, &topology)?;

        charts::write_chart(&map, &self.config.output).context("writing chart")?;
        Ok(map)
    }
}
