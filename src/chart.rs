//! Bar chart of conversions per group.
//!
//! `build_chart` produces a serializable description of the chart;
//! `components` turns it into a `<script>` carrying that description as JSON
//! and a `<div>` holding a self-contained SVG rendering, ready to embed in a
//! host page.

use serde::Serialize;
use uuid::Uuid;

use crate::analytics::ConversionSummary;
use crate::pages::escape_html;

/// Spectral qualitative palette, five colours.
pub const SPECTRAL5: [&str; 5] = ["#2b83ba", "#abdda4", "#ffffbf", "#fdae61", "#d7191c"];

pub const PLOT_HEIGHT: u32 = 350;
pub const PLOT_WIDTH: u32 = 600;

/// Tick label rotation on the category axis, radians.
pub const MAJOR_LABEL_ORIENTATION: f64 = 1.2;

const MARGIN_LEFT: f64 = 56.0;
const MARGIN_RIGHT: f64 = 16.0;
const MARGIN_TOP: f64 = 36.0;
const MARGIN_BOTTOM: f64 = 120.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub label: Option<String>,
    pub start: Option<f64>,
    pub grid_visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub factor: String,
    pub top: u64,
    pub conversion_rate: f64,
    pub fill_color: String,
    pub line_color: String,
}

/// Renderable description of a vertical bar chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub height: u32,
    pub width: u32,
    /// Category axis order.
    pub x_range: Vec<String>,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub major_label_orientation: f64,
    pub outline_visible: bool,
    pub bars: Vec<Bar>,
    pub tooltips: Vec<(String, String)>,
}

/// Embeddable chart artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartComponents {
    pub script: String,
    pub div: String,
}

/// Map each factor to a palette colour. Colours are assigned over the sorted
/// factors and cycle once the palette is exhausted.
pub fn factor_colors<'a>(factors: &[&'a str], palette: &[&str]) -> Vec<(&'a str, String)> {
    let mut sorted: Vec<&str> = factors.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    sorted
        .into_iter()
        .enumerate()
        .map(|(i, f)| (f, palette[i % palette.len()].to_string()))
        .collect()
}

/// Build the chart description for a summary.
pub fn build_chart(summary: &ConversionSummary, column: &str) -> ChartSpec {
    let x_range: Vec<String> = summary.rows.iter().map(|r| r.group.clone()).collect();
    let factors: Vec<&str> = summary.groups();
    let colors = factor_colors(&factors, &SPECTRAL5);

    let bars = summary
        .rows
        .iter()
        .map(|row| {
            let color = colors
                .iter()
                .find(|(f, _)| *f == row.group)
                .map(|(_, c)| c.clone())
                .unwrap_or_else(|| SPECTRAL5[0].to_string());
            Bar {
                factor: row.group.clone(),
                top: row.num_converted,
                conversion_rate: row.conversion_rate,
                fill_color: color.clone(),
                line_color: color,
            }
        })
        .collect();

    ChartSpec {
        title: format!("Conversion by {}", column),
        height: PLOT_HEIGHT,
        width: PLOT_WIDTH,
        x_range,
        x_axis: Axis {
            label: Some(column.to_string()),
            start: None,
            grid_visible: false,
        },
        y_axis: Axis {
            label: None,
            start: Some(0.0),
            grid_visible: true,
        },
        major_label_orientation: MAJOR_LABEL_ORIENTATION,
        outline_visible: false,
        bars,
        tooltips: vec![
            (column.to_string(), "@factor".to_string()),
            ("converted".to_string(), "@top".to_string()),
            ("rate".to_string(), "@conversion_rate{0.00%}".to_string()),
        ],
    }
}

/// Round `max` up to a tick-friendly axis end and return (end, step).
fn axis_extent(max: u64) -> (f64, f64) {
    let max = max.max(1) as f64;
    let raw_step = max / 5.0;
    let magnitude = 10f64.powf(raw_step.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw_step)
        .unwrap_or(10.0 * magnitude)
        .max(1.0);
    ((max / step).ceil() * step, step)
}

fn render_svg(spec: &ChartSpec) -> String {
    let width = spec.width as f64;
    let height = spec.height as f64;
    let inner_w = width - MARGIN_LEFT - MARGIN_RIGHT;
    let inner_h = height - MARGIN_TOP - MARGIN_BOTTOM;
    let baseline = MARGIN_TOP + inner_h;

    let max_top = spec.bars.iter().map(|b| b.top).max().unwrap_or(0);
    let (y_end, y_step) = axis_extent(max_top);
    let band = if spec.x_range.is_empty() {
        inner_w
    } else {
        inner_w / spec.x_range.len() as f64
    };
    let rotate_deg = -spec.major_label_orientation.to_degrees();

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" role="img">"#,
        w = spec.width,
        h = spec.height
    );
    svg.push_str(&format!(
        r#"<text x="{x:.1}" y="20" font-size="14" font-weight="bold">{title}</text>"#,
        x = MARGIN_LEFT,
        title = escape_html(&spec.title)
    ));

    // y gridlines and ticks; the category axis has none.
    let mut tick = 0.0;
    while tick <= y_end + f64::EPSILON {
        let y = baseline - tick / y_end * inner_h;
        svg.push_str(&format!(
            "<line x1=\"{x1:.1}\" y1=\"{y:.1}\" x2=\"{x2:.1}\" y2=\"{y:.1}\" stroke=\"#e5e5e5\"/>\
             <text x=\"{tx:.1}\" y=\"{ty:.1}\" font-size=\"11\" text-anchor=\"end\">{tick}</text>",
            x1 = MARGIN_LEFT,
            x2 = MARGIN_LEFT + inner_w,
            tx = MARGIN_LEFT - 6.0,
            ty = y + 4.0,
            tick = tick as u64
        ));
        tick += y_step;
    }

    for (i, bar) in spec.bars.iter().enumerate() {
        let x = MARGIN_LEFT + i as f64 * band;
        let bar_h = bar.top as f64 / y_end * inner_h;
        let factor = escape_html(&bar.factor);
        svg.push_str(&format!(
            r#"<rect x="{x:.1}" y="{y:.1}" width="{w:.1}" height="{h:.1}" fill="{fill}" stroke="{line}"><title>{factor}&#10;converted: {top}&#10;rate: {rate:.2}%</title></rect>"#,
            y = baseline - bar_h,
            w = band,
            h = bar_h,
            fill = bar.fill_color,
            line = bar.line_color,
            top = bar.top,
            rate = bar.conversion_rate * 100.0
        ));

        let label_x = x + band / 2.0;
        let label_y = baseline + 12.0;
        svg.push_str(&format!(
            r#"<text x="{label_x:.1}" y="{label_y:.1}" font-size="11" text-anchor="end" transform="rotate({rotate_deg:.2} {label_x:.1} {label_y:.1})">{factor}</text>"#
        ));
    }

    svg.push_str(&format!(
        r##"<line x1="{x1:.1}" y1="{y:.1}" x2="{x2:.1}" y2="{y:.1}" stroke="#444"/>"##,
        x1 = MARGIN_LEFT,
        x2 = MARGIN_LEFT + inner_w,
        y = baseline
    ));
    if let Some(label) = &spec.x_axis.label {
        svg.push_str(&format!(
            r#"<text x="{x:.1}" y="{y:.1}" font-size="12" font-style="italic" text-anchor="middle">{label}</text>"#,
            x = MARGIN_LEFT + inner_w / 2.0,
            y = height - 6.0,
            label = escape_html(label)
        ));
    }

    svg.push_str("</svg>");
    svg
}

/// Produce the embeddable `<script>` and `<div>` pair for a chart.
pub fn components(spec: &ChartSpec) -> crate::Result<ChartComponents> {
    let id = Uuid::new_v4();
    let div_id = format!("chart-{}", id);
    // "</" inside a script element would terminate it early.
    let json = serde_json::to_string(spec)?.replace("</", "<\\/");

    let script = format!(
        r#"<script type="application/json" id="{div_id}-spec" data-target="{div_id}">{json}</script>"#
    );
    let div = format!(
        r#"<div class="chart" id="{div_id}">{svg}</div>"#,
        svg = render_svg(spec)
    );
    Ok(ChartComponents { script, div })
}
