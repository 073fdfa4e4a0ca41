//! TopoJSON Topology Module
//! Parses a topology and decodes its shared arcs into per-region polygons.

use crate::geo::{fips, GeoError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// `[longitude, latitude]` in degrees.
pub type Point = [f64; 2];
/// Exterior ring first, then holes.
pub type Polygon = Vec<Vec<Point>>;

/// One region (state) of the topology.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    pub region_id: i64,
    pub region_name: String,
    pub shape: Vec<Polygon>,
}

/// Quantization transform: `position = quantized * scale + translate`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    GeometryCollection {
        geometries: Vec<Geometry>,
    },
    Polygon {
        #[serde(default)]
        id: Option<Value>,
        #[serde(default)]
        properties: Option<Properties>,
        arcs: Vec<Vec<i64>>,
    },
    MultiPolygon {
        #[serde(default)]
        id: Option<Value>,
        #[serde(default)]
        properties: Option<Properties>,
        arcs: Vec<Vec<Vec<i64>>>,
    },
    /// Points, lines and null geometries carry no area to fill.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub transform: Option<Transform>,
    pub objects: HashMap<String, Geometry>,
    pub arcs: Vec<Vec<Vec<f64>>>,
}

impl Topology {
    pub fn from_json(text: &str) -> Result<Self, GeoError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode every polygonal geometry of `object` into a [`GeoFeature`].
    ///
    /// Geometries without an id are skipped. The region name comes from the
    /// `name` property, falling back to the FIPS table.
    pub fn features(&self, object: &str) -> Result<Vec<GeoFeature>, GeoError> {
        let root = self
            .objects
            .get(object)
            .ok_or_else(|| GeoError::MissingObject(object.to_string()))?;

        let arcs = self.decode_arcs();
        let mut features = Vec::new();
        self.collect(root, &arcs, &mut features)?;
        debug!(object, features = features.len(), "decoded topology");
        Ok(features)
    }

    fn collect(
        &self,
        geometry: &Geometry,
        arcs: &[Vec<Point>],
        out: &mut Vec<GeoFeature>,
    ) -> Result<(), GeoError> {
        match geometry {
            Geometry::GeometryCollection { geometries } => {
                for g in geometries {
                    self.collect(g, arcs, out)?;
                }
            }
            Geometry::Polygon {
                id,
                properties,
                arcs: rings,
            } => {
                if let Some(region_id) = id.as_ref().and_then(parse_id) {
                    let shape = vec![Self::polygon(rings, arcs)?];
                    out.push(Self::feature(region_id, properties.as_ref(), shape));
                }
            }
            Geometry::MultiPolygon {
                id,
                properties,
                arcs: polygons,
            } => {
                if let Some(region_id) = id.as_ref().and_then(parse_id) {
                    let shape = polygons
                        .iter()
                        .map(|rings| Self::polygon(rings, arcs))
                        .collect::<Result<Vec<_>, _>>()?;
                    out.push(Self::feature(region_id, properties.as_ref(), shape));
                }
            }
            Geometry::Other => {}
        }
        Ok(())
    }

    fn feature(
        region_id: i64,
        properties: Option<&Properties>,
        shape: Vec<Polygon>,
    ) -> GeoFeature {
        let region_name = properties
            .and_then(|p| p.name.clone())
            .or_else(|| fips::state_name(region_id).map(str::to_string))
            .unwrap_or_else(|| region_id.to_string());
        GeoFeature {
            region_id,
            region_name,
            shape,
        }
    }

    /// Absolute positions of every arc, undoing delta encoding when quantized.
    fn decode_arcs(&self) -> Vec<Vec<Point>> {
        self.arcs
            .iter()
            .map(|arc| {
                let mut x = 0.0;
                let mut y = 0.0;
                arc.iter()
                    .filter(|p| p.len() >= 2)
                    .map(|p| match self.transform {
                        Some(t) => {
                            x += p[0];
                            y += p[1];
                            [
                                x * t.scale[0] + t.translate[0],
                                y * t.scale[1] + t.translate[1],
                            ]
                        }
                        None => [p[0], p[1]],
                    })
                    .collect()
            })
            .collect()
    }

    fn polygon(rings: &[Vec<i64>], arcs: &[Vec<Point>]) -> Result<Polygon, GeoError> {
        rings.iter().map(|ring| Self::ring(ring, arcs)).collect()
    }

    /// Stitch arcs into a ring. A negative index `i` means arc `!i` reversed.
    /// Consecutive arcs share an endpoint, which is kept once.
    fn ring(indices: &[i64], arcs: &[Vec<Point>]) -> Result<Vec<Point>, GeoError> {
        let mut points: Vec<Point> = Vec::new();
        for &index in indices {
            let (arc_idx, reversed) = if index < 0 {
                (!index, true)
            } else {
                (index, false)
            };
            let arc = usize::try_from(arc_idx)
                .ok()
                .and_then(|i| arcs.get(i))
                .ok_or(GeoError::InvalidArc(index))?;

            let skip = usize::from(!points.is_empty());
            if reversed {
                points.extend(arc.iter().rev().skip(skip));
            } else {
                points.extend(arc.iter().skip(skip));
            }
        }
        Ok(points)
    }
}

/// Ids are numbers in older topologies and zero-padded strings ("06") in newer ones.
fn parse_id(id: &Value) -> Option<i64> {
    match id {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
