//! Choropleth Builder Module
//! Bridges joined SNAP records onto topology regions and encodes them as colours.
//!
//! Layout:
//! 1. Title: centered in a band across the top
//! 2. Map: every covered region drawn grey, matched states filled by value
//! 3. Legend: vertical colour bar on the right with min/max labels

use crate::config::ChartOutput;
use crate::data::{title_case, JoinedRecord};
use crate::geo::{AlbersUsa, GeoFeature, ScreenPoint, Viewport};
use plotters::style::RGBColor;
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const TITLE_HEIGHT: f64 = 40.0;
pub const MARGIN: f64 = 10.0;
pub const LEGEND_WIDTH: f64 = 90.0;
const LEGEND_BAR_WIDTH: f64 = 14.0;
const LEGEND_BAR_HEIGHT: f64 = 160.0;

/// Fill for regions with no data.
pub const BASEMAP_FILL: RGBColor = RGBColor(224, 224, 224);

// Sequential blues, light to dark
const BLUES: [RGBColor; 8] = [
    RGBColor(222, 235, 247),
    RGBColor(198, 219, 239),
    RGBColor(158, 202, 225),
    RGBColor(107, 174, 214),
    RGBColor(66, 146, 198),
    RGBColor(33, 113, 181),
    RGBColor(8, 81, 156),
    RGBColor(8, 48, 107),
];

/// Region name -> region id, keyed by title-cased name so that it matches
/// the title-cased `state` of joined records.
#[derive(Debug, Clone, Default)]
pub struct NameIdMap {
    ids: HashMap<String, i64>,
}

impl NameIdMap {
    pub fn from_features(features: &[GeoFeature]) -> Self {
        let ids = features
            .iter()
            .map(|f| (title_case(&f.region_name), f.region_id))
            .collect();
        Self { ids }
    }

    pub fn get(&self, state: &str) -> Option<i64> {
        self.ids.get(state).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Linear colour scale over a value domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
}

impl ColorScale {
    /// Domain spanning the finite values; `None` when there are none.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<Self>, v| match acc {
                None => Some(Self { min: v, max: v }),
                Some(s) => Some(Self {
                    min: s.min.min(v),
                    max: s.max.max(v),
                }),
            })
    }

    /// Position of `value` in the domain, clamped to [0, 1].
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.5;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }

    pub fn color(&self, value: f64) -> RGBColor {
        Self::ramp(self.normalize(value))
    }

    /// Piecewise-linear interpolation through the blues ramp.
    pub fn ramp(t: f64) -> RGBColor {
        let t = t.clamp(0.0, 1.0) * (BLUES.len() - 1) as f64;
        let lo = (t.floor() as usize).min(BLUES.len() - 2);
        let frac = t - lo as f64;
        let (a, b) = (BLUES[lo], BLUES[lo + 1]);
        let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
        RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
    }
}

/// A region of the base map, projected to output pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseShape {
    pub region_id: i64,
    pub region_name: String,
    pub rings: Vec<Vec<ScreenPoint>>,
}

/// A state with data, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRegion {
    pub region_id: i64,
    pub state: String,
    pub snap_per_household: f64,
    pub snap_per_person: f64,
    pub fill: RGBColor,
    pub rings: Vec<Vec<ScreenPoint>>,
}

impl MapRegion {
    /// Hover text: state and both ratios.
    pub fn tooltip(&self) -> String {
        format!(
            "state: {}\nsnap_per_household: {:.2}\nsnap_per_person: {:.2}",
            self.state, self.snap_per_household, self.snap_per_person
        )
    }
}

/// The rendered chart object.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoroplethMap {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub basemap: Vec<BaseShape>,
    pub regions: Vec<MapRegion>,
    /// `None` when no record matched a region.
    pub scale: Option<ColorScale>,
}

impl ChoroplethMap {
    /// Top-left and bottom-right corners of the legend colour bar.
    pub fn legend_bar(&self) -> [ScreenPoint; 2] {
        let x = self.width as f64 - LEGEND_WIDTH + MARGIN;
        let y = TITLE_HEIGHT + MARGIN;
        [[x, y], [x + LEGEND_BAR_WIDTH, y + LEGEND_BAR_HEIGHT]]
    }

    /// Area available to the map itself.
    pub fn map_extent(width: u32, height: u32) -> [ScreenPoint; 2] {
        let right = (width as f64 - LEGEND_WIDTH - MARGIN).max(MARGIN + 1.0);
        let bottom = (height as f64 - MARGIN).max(TITLE_HEIGHT + 1.0);
        [[MARGIN, TITLE_HEIGHT], [right, bottom]]
    }
}

/// Builds a [`ChoroplethMap`] from joined records and topology features.
pub struct ChoroplethBuilder {
    projection: AlbersUsa,
}

impl Default for ChoroplethBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChoroplethBuilder {
    pub fn new() -> Self {
        Self {
            projection: AlbersUsa::default(),
        }
    }

    /// Project every feature and fill the ones whose name matches a record.
    ///
    /// Records without a matching region are left out of the encoding; this
    /// is never an error, so zero matches gives a map with zero regions.
    pub fn build(
        &self,
        records: &[JoinedRecord],
        features: &[GeoFeature],
        output: &ChartOutput,
    ) -> ChoroplethMap {
        let projected: Vec<BaseShape> = features
            .iter()
            .filter(|f| self.projection.covers(f.region_id))
            .map(|f| self.project_feature(f))
            .collect();

        let viewport = Viewport::fit(
            projected
                .iter()
                .flat_map(|s| s.rings.iter().flatten().copied()),
            ChoroplethMap::map_extent(output.width, output.height),
        );
        let basemap: Vec<BaseShape> = projected
            .into_iter()
            .map(|mut shape| {
                for ring in &mut shape.rings {
                    for p in ring.iter_mut() {
                        *p = viewport.apply(*p);
                    }
                }
                shape
            })
            .collect();

        let names = NameIdMap::from_features(features);
        if names.is_empty() {
            warn!("topology has no named regions; no state can be matched");
        }
        let by_id: HashMap<i64, &BaseShape> =
            basemap.iter().map(|s| (s.region_id, s)).collect();

        let mut matched: Vec<(&JoinedRecord, &BaseShape)> = Vec::new();
        let mut unmatched: Vec<&str> = Vec::new();
        for record in records {
            match names
                .get(&record.state)
                .and_then(|id| by_id.get(&id).copied())
            {
                Some(shape) => matched.push((record, shape)),
                None => unmatched.push(&record.state),
            }
        }
        if !unmatched.is_empty() {
            warn!(
                count = unmatched.len(),
                states = ?unmatched,
                "states with no region on the map"
            );
        }

        let scale = ColorScale::from_values(matched.iter().map(|(r, _)| r.snap_per_household));
        let regions: Vec<MapRegion> = matched
            .into_iter()
            .map(|(record, shape)| MapRegion {
                region_id: shape.region_id,
                state: record.state.clone(),
                snap_per_household: record.snap_per_household,
                snap_per_person: record.snap_per_person,
                fill: scale
                    .map(|s| s.color(record.snap_per_household))
                    .unwrap_or(BASEMAP_FILL),
                rings: shape.rings.clone(),
            })
            .collect();

        debug!(names = names.len(), shapes = basemap.len(), "built base map");
        info!(regions = regions.len(), "encoded choropleth");

        ChoroplethMap {
            title: output.title.clone(),
            width: output.width,
            height: output.height,
            basemap,
            regions,
            scale,
        }
    }

    fn project_feature(&self, feature: &GeoFeature) -> BaseShape {
        let rings = feature
            .shape
            .iter()
            .flatten()
            .map(|ring| {
                ring.iter()
                    .filter_map(|&p| self.projection.project(feature.region_id, p))
                    .collect::<Vec<_>>()
            })
            .collect();
        BaseShape {
            region_id: feature.region_id,
            region_name: feature.region_name.clone(),
            rings,
        }
    }
}
