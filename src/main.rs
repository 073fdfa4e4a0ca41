//! SNAP Map - SNAP benefits per household choropleth
//!
//! Joins state-level SNAP benefits, households and persons tables and renders
//! a US map coloured by benefits per household.

mod charts;
mod config;
mod data;
mod geo;
mod pipeline;

use anyhow::{bail, Context, Result};
use config::PipelineConfig;
use pipeline::SnapPipeline;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str = "usage: snap-map [CONFIG.json] [--open]";

/// Command line: an optional config file and whether to open the result.
#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    config: Option<PathBuf>,
    open: bool,
}

impl CliArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = Self::default();
        for arg in args {
            match arg.as_str() {
                "--open" => parsed.open = true,
                "-h" | "--help" => bail!(USAGE),
                flag if flag.starts_with('-') => bail!("unknown option {flag}\n{USAGE}"),
                path if parsed.config.is_none() => parsed.config = Some(PathBuf::from(path)),
                _ => bail!("more than one config file given\n{USAGE}"),
            }
        }
        Ok(parsed)
    }
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args = CliArgs::parse(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => {
            let config = PipelineConfig::default();
            config.validate()?;
            config
        }
    };

    let pipeline = SnapPipeline::new(config);
    let map = pipeline.run()?;

    let output = &pipeline.config().output.path;
    info!(
        regions = map.regions.len(),
        path = %output.display(),
        "map ready"
    );

    if args.open {
        open::that(output).with_context(|| format!("opening {}", output.display()))?;
    }
    Ok(())
}
