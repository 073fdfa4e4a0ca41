//! Static SVG Renderer
//! Draws the choropleth with plotters' SVG backend: title, map and legend.
//! No hover text; use the HTML writer for that.

use crate::charts::choropleth::{ChoroplethMap, BASEMAP_FILL, TITLE_HEIGHT};
use crate::charts::{format_value, ColorScale, RenderError};
use crate::geo::ScreenPoint;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::fs;
use std::path::Path;

const LEGEND_STEPS: usize = 40;

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

fn to_backend(rings: &[Vec<ScreenPoint>]) -> impl Iterator<Item = Vec<(i32, i32)>> + '_ {
    rings.iter().filter(|r| r.len() >= 3).map(|ring| {
        ring.iter()
            .map(|p| (p[0].round() as i32, p[1].round() as i32))
            .collect::<Vec<_>>()
    })
}

/// Render the map to an SVG document string.
pub fn render_svg(map: &ChoroplethMap) -> Result<String, RenderError> {
    let mut buf = String::new();
    {
        let root =
            SVGBackend::with_string(&mut buf, (map.width, map.height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        for shape in &map.basemap {
            for ring in to_backend(&shape.rings) {
                root.draw(&Polygon::new(ring.clone(), BASEMAP_FILL.filled()))
                    .map_err(draw_err)?;
                root.draw(&PathElement::new(ring, WHITE.stroke_width(1)))
                    .map_err(draw_err)?;
            }
        }

        for region in &map.regions {
            for ring in to_backend(&region.rings) {
                root.draw(&Polygon::new(ring.clone(), region.fill.filled()))
                    .map_err(draw_err)?;
                root.draw(&PathElement::new(ring, WHITE.stroke_width(1)))
                    .map_err(draw_err)?;
            }
        }

        let title_style = ("sans-serif", 18)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        root.draw(&Text::new(
            map.title.clone(),
            ((map.width / 2) as i32, (TITLE_HEIGHT / 2.0) as i32),
            title_style,
        ))
        .map_err(draw_err)?;

        if let Some(scale) = map.scale {
            draw_legend(&root, map, scale)?;
        }

        root.present().map_err(draw_err)?;
    }
    Ok(buf)
}

/// Stacked bands from the darkest colour (max) at the top to the lightest at the bottom.
fn draw_legend<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    map: &ChoroplethMap,
    scale: ColorScale,
) -> Result<(), RenderError> {
    let [[x0, y0], [x1, y1]] = map.legend_bar();
    let band = (y1 - y0) / LEGEND_STEPS as f64;

    for i in 0..LEGEND_STEPS {
        let t = 1.0 - (i as f64 + 0.5) / LEGEND_STEPS as f64;
        let top = y0 + band * i as f64;
        root.draw(&Rectangle::new(
            [
                (x0 as i32, top.floor() as i32),
                (x1 as i32, (top + band).ceil() as i32),
            ],
            ColorScale::ramp(t).filled(),
        ))
        .map_err(draw_err)?;
    }
    root.draw(&Rectangle::new(
        [(x0 as i32, y0 as i32), (x1 as i32, y1 as i32)],
        RGBColor(153, 153, 153).stroke_width(1),
    ))
    .map_err(draw_err)?;

    let label = ("sans-serif", 11).into_font().color(&BLACK);
    root.draw(&Text::new(
        "snap_per_household".to_string(),
        (x0 as i32, (y0 - 14.0) as i32),
        label.clone(),
    ))
    .map_err(draw_err)?;
    for (value, y) in [(scale.max, y0), (scale.min, y1 - 10.0)] {
        root.draw(&Text::new(
            format_value(value),
            ((x1 + 4.0) as i32, y as i32),
            label.clone(),
        ))
        .map_err(draw_err)?;
    }
    Ok(())
}

/// Render and write the SVG file.
pub fn write_svg(map: &ChoroplethMap, path: &Path) -> Result<(), RenderError> {
    let svg = render_svg(map)?;
    fs::write(path, svg).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChoroplethBuilder;
    use crate::config::ChartOutput;
    use crate::data::JoinedRecord;
    use crate::geo::topology_fixture;

    #[test]
    fn test_renders_title_and_shapes() -> anyhow::Result<()> {
        let records = vec![JoinedRecord {
            state: "California".to_string(),
            total_benefits: 1000.0,
            households: 10,
            persons: 40,
            snap_per_household: 100.0,
            snap_per_person: 25.0,
        }];
        let map = ChoroplethBuilder::new().build(
            &records,
            &topology_fixture(),
            &ChartOutput::default(),
        );

        let svg = render_svg(&map)?;
        assert!(svg.contains("<svg"));
        assert!(svg.contains("SNAP per Household"));
        assert!(svg.contains("snap_per_household"));
        assert!(svg.contains("<polygon"));
        Ok(())
    }

    #[test]
    fn test_no_legend_without_matches() -> anyhow::Result<()> {
        let map = ChoroplethBuilder::new().build(&[], &topology_fixture(), &ChartOutput::default());
        let svg = render_svg(&map)?;
        assert!(svg.contains("SNAP per Household"));
        assert!(!svg.contains("snap_per_household"));
        Ok(())
    }
}
