//! Interactive HTML Writer
//! Emits a standalone page with an inline SVG map. Each state path carries a
//! `<title>` child, which browsers show as hover text.

use crate::charts::choropleth::{ChoroplethMap, BASEMAP_FILL, MARGIN, TITLE_HEIGHT};
use crate::charts::{format_value, RenderError};
use crate::geo::ScreenPoint;
use plotters::style::RGBColor;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Render the map as a complete HTML document.
pub fn render_html(map: &ChoroplethMap) -> String {
    let mut svg = String::new();
    let (w, h) = (map.width, map.height);

    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    );
    let _ = writeln!(svg, r#"  <rect width="{w}" height="{h}" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"  <text x="{:.1}" y="{:.1}" text-anchor="middle" font-family="sans-serif" font-size="18" font-weight="bold">{}</text>"#,
        w as f64 / 2.0,
        TITLE_HEIGHT / 2.0 + 6.0,
        escape(&map.title)
    );

    svg.push_str("  <g class=\"basemap\">\n");
    for shape in &map.basemap {
        let _ = writeln!(
            svg,
            r#"    <path d="{}" fill="{}" stroke="white" stroke-width="0.5" fill-rule="evenodd"><title>{}</title></path>"#,
            path_data(&shape.rings),
            hex(BASEMAP_FILL),
            escape(&shape.region_name)
        );
    }
    svg.push_str("  </g>\n");

    svg.push_str("  <g class=\"regions\">\n");
    for region in &map.regions {
        let _ = writeln!(
            svg,
            r#"    <path class="region" d="{}" fill="{}" stroke="white" stroke-width="0.5" fill-rule="evenodd"><title>{}</title></path>"#,
            path_data(&region.rings),
            hex(region.fill),
            escape(&region.tooltip())
        );
    }
    svg.push_str("  </g>\n");

    legend(map, &mut svg);
    svg.push_str("</svg>\n");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
  body {{ margin: {margin}px; font-family: sans-serif; }}
  path.region:hover {{ stroke: #333; stroke-width: 1.5; }}
</style>
</head>
<body>
{svg}</body>
</html>
"#,
        title = escape(&map.title),
        margin = MARGIN,
        svg = svg
    )
}

/// Render and write the HTML page.
pub fn write_html(map: &ChoroplethMap, path: &Path) -> Result<(), RenderError> {
    fs::write(path, render_html(map)).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Vertical gradient bar, dark (max) at the top.
fn legend(map: &ChoroplethMap, svg: &mut String) {
    let Some(scale) = map.scale else {
        return;
    };
    let [[x0, y0], [x1, y1]] = map.legend_bar();

    svg.push_str("  <defs><linearGradient id=\"ramp\" x1=\"0\" y1=\"1\" x2=\"0\" y2=\"0\">\n");
    for step in 0..=10 {
        let t = step as f64 / 10.0;
        let color = crate::charts::ColorScale::ramp(t);
        let _ = writeln!(
            svg,
            r#"    <stop offset="{:.0}%" stop-color="{}"/>"#,
            t * 100.0,
            hex(color)
        );
    }
    svg.push_str("  </linearGradient></defs>\n");

    let _ = writeln!(
        svg,
        r#"  <text x="{x0:.1}" y="{:.1}" font-family="sans-serif" font-size="11">snap_per_household</text>"#,
        y0 - 4.0
    );
    let _ = writeln!(
        svg,
        r##"  <rect x="{x0:.1}" y="{y0:.1}" width="{:.1}" height="{:.1}" fill="url(#ramp)" stroke="#999" stroke-width="0.5"/>"##,
        x1 - x0,
        y1 - y0
    );
    for (value, y) in [(scale.max, y0 + 4.0), (scale.min, y1)] {
        let _ = writeln!(
            svg,
            r#"  <text x="{:.1}" y="{y:.1}" font-family="sans-serif" font-size="10">{}</text>"#,
            x1 + 4.0,
            format_value(value)
        );
    }
}

fn path_data(rings: &[Vec<ScreenPoint>]) -> String {
    let mut d = String::new();
    for ring in rings.iter().filter(|r| r.len() >= 3) {
        for (i, p) in ring.iter().enumerate() {
            let cmd = if i == 0 { 'M' } else { 'L' };
            let _ = write!(d, "{cmd}{:.1},{:.1}", p[0], p[1]);
        }
        d.push('Z');
    }
    d
}

fn hex(c: RGBColor) -> String {
    format!("#{:02x}{:02x}{:02x}", c.0, c.1, c.2)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChoroplethBuilder;
    use crate::config::ChartOutput;
    use crate::data::JoinedRecord;
    use crate::geo::topology_fixture;
    use tempfile::tempdir;

    fn record(state: &str, per_household: f64) -> JoinedRecord {
        JoinedRecord {
            state: state.to_string(),
            total_benefits: per_household * 10.0,
            households: 10,
            persons: 40,
            snap_per_household: per_household,
            snap_per_person: per_household / 4.0,
        }
    }

    #[test]
    fn test_one_hover_title_per_matched_region() {
        let records = vec![record("California", 100.0), record("Atlantis", 1.0)];
        let map = ChoroplethBuilder::new().build(
            &records,
            &topology_fixture(),
            &ChartOutput::default(),
        );
        let html = render_html(&map);

        assert_eq!(html.matches("class=\"region\"").count(), 1);
        assert!(html.contains(
            "state: California\nsnap_per_household: 100.00\nsnap_per_person: 25.00"
        ));
        assert!(html.contains("SNAP per Household"));
        assert!(html.contains("linearGradient"));
    }

    #[test]
    fn test_no_matches_still_renders_basemap() {
        let map = ChoroplethBuilder::new().build(&[], &topology_fixture(), &ChartOutput::default());
        let html = render_html(&map);

        assert_eq!(html.matches("class=\"region\"").count(), 0);
        assert_eq!(html.matches("<path").count(), 2);
        assert!(!html.contains("linearGradient"));
    }

    #[test]
    fn test_title_is_escaped() {
        let output = ChartOutput {
            title: "SNAP <per> Household & Person".to_string(),
            ..ChartOutput::default()
        };
        let map = ChoroplethBuilder::new().build(&[], &topology_fixture(), &output);
        let html = render_html(&map);
        assert!(html.contains("SNAP &lt;per&gt; Household &amp; Person"));
        assert!(!html.contains("<per>"));
    }

    #[test]
    fn test_write_html() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("map.html");
        let map = ChoroplethBuilder::new().build(&[], &topology_fixture(), &ChartOutput::default());

        write_html(&map, &path)?;
        assert!(fs::read_to_string(&path)?.starts_with("<!DOCTYPE html>"));
        Ok(())
    }

    #[test]
    fn test_path_data_closes_rings() {
        let d = path_data(&[vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]], vec![[5.0, 5.0]]]);
        assert_eq!(d, "M0.0,0.0L1.0,0.0L1.0,1.0Z");
    }
}
